//! Slugs: the short, URL-safe alternate keys NetBox keeps next to names.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

lazy_static! {
    static ref CANONICAL: Regex = Regex::new("^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid regex");
}

/// Whether `slug` is lowercase alphanumerics separated by single hyphens.
pub fn is_canonical(slug: &str) -> bool {
    CANONICAL.is_match(slug)
}

/// Derive a slug from a human readable name.
///
/// Every run of characters outside `[a-z0-9]` (after lowercasing) becomes a
/// single hyphen; hyphens at either end are dropped, also after truncating
/// to `max_len`.
pub fn derive(name: &str, max_len: usize) -> Result<String> {
    let mut slug = String::with_capacity(name.len());
    let mut separator = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if separator && !slug.is_empty() {
                slug.push('-');
            }
            separator = false;
            slug.push(c);
        } else {
            separator = true;
        }
    }

    // ASCII only at this point, so byte truncation is char safe
    if slug.len() > max_len {
        slug.truncate(max_len);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        return Err(Error::validation(format!(
            "cannot derive a slug from name {:?}; supply one explicitly",
            name
        )));
    }
    Ok(slug)
}

/// Check a user supplied slug.
pub fn validate(slug: &str, max_len: usize) -> Result<()> {
    if !is_canonical(slug) {
        return Err(Error::validation(format!(
            "invalid slug {:?}: use lowercase letters, digits and single hyphens only",
            slug
        )));
    }
    if slug.len() > max_len {
        return Err(Error::validation(format!(
            "invalid slug {:?}: longer than {} characters",
            slug, max_len
        )));
    }
    Ok(())
}

/// The slug to use: the explicit one when given (and valid), otherwise one
/// derived from `name`.
pub fn normalize(name: Option<&str>, explicit: Option<&str>, max_len: usize) -> Result<String> {
    match (explicit, name) {
        (Some(slug), _) => {
            validate(slug, max_len)?;
            Ok(slug.to_string())
        }
        (None, Some(name)) => derive(name, max_len),
        (None, None) => Err(Error::validation(
            "either name or slug is required to identify the object",
        )),
    }
}
