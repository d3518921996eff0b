//! Common functionality.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Check whether `value` is syntactically CURIE-shaped (`PREFIX:reference`).
///
/// The prefix must be non-empty, start with a letter or underscore, and only
/// contain letters, digits, underscores, dots, or dashes.  The reference must
/// be non-empty.
pub fn is_curie(value: &str) -> bool {
    match value.split_once(':') {
        Some((prefix, reference)) => {
            !reference.is_empty()
                && prefix
                    .chars()
                    .next()
                    .map(|c| c.is_ascii_alphabetic() || c == '_')
                    .unwrap_or(false)
                && prefix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        None => false,
    }
}
