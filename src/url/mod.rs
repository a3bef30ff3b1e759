//! URL handling module
//!
//! Provides URL normalization and domain extraction. Normalization is the
//! basis of frontier deduplication: two URLs that normalize to the same
//! string are the same page as far as the crawler is concerned.

mod domain;
mod normalize;

pub use domain::extract_domain;
pub use normalize::normalize_url;
