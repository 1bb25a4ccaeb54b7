pub mod constants;
pub mod url_filter;
pub mod url_norm;

pub use constants::*;
pub use url_filter::{UrlFilter, extension_for_content_type, path_extension};
pub use url_norm::{normalize, normalize_str, resolve_and_normalize};
