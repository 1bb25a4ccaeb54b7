//! Admissibility filtering for crawl candidates.
//!
//! A candidate URL is rejected when its scheme is not http(s), when its path
//! carries an excluded extension, or when a prefix filter is configured and
//! the candidate falls outside it. The extension exclusion is mirrored on
//! the response side through a content-type → extension mapping.

use anyhow::{Result, anyhow};
use url::Url;

/// Decides whether a candidate URL is in scope for the crawl.
#[derive(Debug, Clone)]
pub struct UrlFilter {
    prefix: Option<Url>,
    exclude_extensions: Vec<String>,
}

impl UrlFilter {
    /// Build a filter from configuration.
    ///
    /// `prefix_filter` of `None`, the empty string, or the literal `"none"`
    /// disables prefix filtering. Extension tokens are lowercased and any
    /// leading dot stripped, so `".PDF"`, `"pdf"`, and `"PDF"` are equivalent.
    pub fn new(prefix_filter: Option<&str>, exclude_extensions: &[String]) -> Result<Self> {
        let prefix = match prefix_filter {
            None => None,
            Some(raw) if raw.trim().is_empty() || raw.trim().eq_ignore_ascii_case("none") => None,
            Some(raw) => Some(
                Url::parse(raw.trim())
                    .map_err(|e| anyhow!("invalid prefix filter '{raw}': {e}"))?,
            ),
        };
        let exclude_extensions = exclude_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Ok(Self {
            prefix,
            exclude_extensions,
        })
    }

    /// Whether `url` passes the scheme, extension, and prefix rules.
    #[must_use]
    pub fn admits(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if let Some(ext) = path_extension(url.path())
            && self.exclude_extensions.iter().any(|e| *e == ext)
        {
            return false;
        }

        if let Some(prefix) = &self.prefix {
            if url.host_str() != prefix.host_str() {
                return false;
            }
            let candidate = url.path().trim_end_matches('/');
            let wanted = prefix.path().trim_end_matches('/');
            if !candidate.starts_with(wanted) {
                return false;
            }
        }

        true
    }

    /// Whether a response's declared content type maps into the exclusion
    /// list, either through the canonical-extension mapping or a literal
    /// token match.
    #[must_use]
    pub fn content_type_excluded(&self, content_type: &str) -> bool {
        let ct = content_type.to_ascii_lowercase();
        if let Some(ext) = extension_for_content_type(&ct)
            && self.exclude_extensions.iter().any(|e| e == ext)
        {
            return true;
        }
        self.exclude_extensions.iter().any(|e| ct.contains(e.as_str()))
    }
}

/// Extension of the last path segment, lowercased, without the dot.
#[must_use]
pub fn path_extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Map a content type to its canonical extension.
///
/// Parameters after `;` are ignored. Covers the common web asset types; an
/// unknown type maps to `None` and is judged by token match only.
#[must_use]
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let ext = match essence.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "text/css" => "css",
        "application/javascript" | "text/javascript" | "application/x-javascript" => "js",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/gzip" | "application/x-gzip" => "gz",
        "application/x-tar" => "tar",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "font/woff" | "application/font-woff" => "woff",
        "font/woff2" => "woff2",
        "font/ttf" | "application/x-font-ttf" => "ttf",
        "font/otf" => "otf",
        "application/vnd.ms-fontobject" => "eot",
        "application/octet-stream" => "bin",
        _ => return None,
    };
    Some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(prefix: Option<&str>, exts: &[&str]) -> UrlFilter {
        let exts: Vec<String> = exts.iter().map(|s| (*s).to_string()).collect();
        UrlFilter::new(prefix, &exts).expect("filter must build")
    }

    #[test]
    fn rejects_non_http_schemes() {
        let f = filter(None, &[]);
        assert!(!f.admits(&Url::parse("ftp://example.com/a").unwrap()));
        assert!(!f.admits(&Url::parse("mailto:x@example.com").unwrap()));
        assert!(f.admits(&Url::parse("https://example.com/a").unwrap()));
    }

    #[test]
    fn rejects_excluded_extensions_case_insensitively() {
        let f = filter(None, &["pdf", ".PNG"]);
        assert!(!f.admits(&Url::parse("https://example.com/report.PDF").unwrap()));
        assert!(!f.admits(&Url::parse("https://example.com/img.png").unwrap()));
        assert!(f.admits(&Url::parse("https://example.com/page.html").unwrap()));
    }

    #[test]
    fn prefix_filter_requires_matching_host_and_path() {
        let f = filter(Some("https://example.com/docs"), &[]);
        assert!(f.admits(&Url::parse("https://example.com/docs/intro").unwrap()));
        assert!(f.admits(&Url::parse("https://example.com/docs").unwrap()));
        assert!(!f.admits(&Url::parse("https://example.com/blog").unwrap()));
        assert!(!f.admits(&Url::parse("https://other.com/docs/intro").unwrap()));
    }

    #[test]
    fn prefix_filter_none_or_empty_disables() {
        for raw in [None, Some(""), Some("none"), Some("NONE")] {
            let f = filter(raw, &[]);
            assert!(f.admits(&Url::parse("https://anything.example/whatever").unwrap()));
        }
    }

    #[test]
    fn content_type_mapping_and_token_match() {
        let f = filter(None, &["png", "css"]);
        assert!(f.content_type_excluded("image/png"));
        assert!(f.content_type_excluded("text/css; charset=utf-8"));
        // Literal token containment also excludes.
        assert!(f.content_type_excluded("application/weird-css-bundle"));
        assert!(!f.content_type_excluded("text/html; charset=utf-8"));
    }

    #[test]
    fn path_extension_edge_cases() {
        assert_eq!(path_extension("/a/b.html"), Some("html".to_string()));
        assert_eq!(path_extension("/a/b"), None);
        assert_eq!(path_extension("/a/.hidden"), None);
        assert_eq!(path_extension("/archive.tar.GZ"), Some("gz".to_string()));
    }
}
