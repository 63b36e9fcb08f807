//! Log output for module executables.
//!
//! Logs always go to stderr; stdout is reserved for the result document.

use std::io::IsTerminal as _;

use anyhow::Result;
use tracing_subscriber::{
    fmt::{format::FmtSpan, Layer as FmtLayer},
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
    EnvFilter, Registry,
};

/// Install the global subscriber. `RUST_LOG` selects the levels, unless
/// `verbose` asks for everything down to `debug`.
pub fn set_up(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let span_events = if verbose {
        // announce what we do and when we're done
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = FmtLayer::new()
        .with_writer(std::io::stderr)
        .with_span_events(span_events)
        .with_ansi(std::io::stderr().is_terminal());

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set up tracing: {}", e))
}
