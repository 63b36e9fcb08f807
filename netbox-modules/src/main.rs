//! The netbox-modules executable
//!
//! Each invocation runs one module: it reads the module arguments document,
//! reconciles one NetBox object and prints the result document on stdout.

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory as _, Parser, Subcommand};
use netbox_modules::{ClusterGroup, VirtualChassis};
use netbox_resource::framework::{self, run_main};

fn main() {
    let args = Args::parse();
    match args.command {
        Commands::ClusterGroup(options) => run_main::<ClusterGroup>(options.into()),
        Commands::VirtualChassis(options) => run_main::<VirtualChassis>(options.into()),
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
        }
        Commands::GenerateMan => handle_result(generate_man()),
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(shell, &mut cmd, "netbox-modules", &mut std::io::stdout());
        }
    }
}

fn generate_man() -> Result<()> {
    let cmd = Args::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buffer: Vec<u8> = Default::default();
    man.render(&mut buffer)?;
    println!("{}", String::from_utf8(buffer)?);
    Ok(())
}

fn handle_result(r: Result<()>) {
    if let Err(e) = r {
        eprintln!("netbox-modules error: {:#}", e);
        std::process::exit(1);
    }
}

/// Create, update or delete NetBox objects declaratively
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct ModuleOptions {
    /// Read the module arguments document from FILE instead of stdin
    ///
    /// The document is a JSON object with `netbox_url`, `netbox_token`,
    /// `state` (present or absent), `data` and optionally `query_params`,
    /// `validate_certs`, `cert` and `check_mode`.
    #[arg(long("args"), value_name = "FILE")]
    args_file: Option<PathBuf>,

    /// Report what would change without changing anything
    #[arg(long)]
    check: bool,

    /// Log requests and decisions to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl From<ModuleOptions> for framework::Options {
    fn from(o: ModuleOptions) -> Self {
        framework::Options {
            args_file: o.args_file,
            check: o.check,
            verbose: o.verbose,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, update or delete a cluster group
    ClusterGroup(ModuleOptions),

    /// Create, update or delete a virtual chassis
    VirtualChassis(ModuleOptions),

    /// Generate markdown documentation for netbox-modules
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for netbox-modules
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for netbox-modules
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
