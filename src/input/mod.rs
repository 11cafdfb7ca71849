//! URL input
//!
//! Turns a line-oriented URL list (file or stdin) into a lazy sequence of
//! tasks. Normalization and deduplication happen here, before sequence
//! numbers are assigned.

mod source;

pub use source::{tasks_from_urls, UrlSource};
