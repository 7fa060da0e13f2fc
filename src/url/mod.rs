//! URL handling for Papermill
//!
//! Canonical normalization for store keys, host allowlist filtering, and the
//! arXiv mirror rewrite applied at fetch time.

mod domain;
mod normalize;

pub use domain::{domain_allowed, extract_domain, fetch_url};
pub use normalize::normalize_url;
