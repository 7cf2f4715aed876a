//! Authentication module for API key verification.

mod extractor;

pub use extractor::ApiKeyAuth;
