//! Persisting crawled pages to the local mirror.
//!
//! Every saved URL produces a raw HTML file, a metadata JSON, and (when
//! extraction is enabled) a readable-content companion, all under the output
//! root at a filesystem-safe path derived from the URL.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Per-page metadata, written next to the raw HTML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetadata {
    pub url: String,
    /// Unix epoch seconds at save time.
    pub timestamp: i64,
    /// Raw body size in bytes.
    pub size: u64,
}

/// Where a page landed on disk.
#[derive(Debug, Clone)]
pub struct SavedPage {
    pub html_path: PathBuf,
    pub content_path: Option<PathBuf>,
    pub meta_path: PathBuf,
    pub size: u64,
}

/// Percent-decode, then replace filesystem-hostile characters, keeping `/`
/// as a separator.
fn sanitize(component: &str) -> String {
    let decoded = urlencoding::decode(component)
        .map_or_else(|_| component.to_string(), |d| d.into_owned());
    decoded
        .chars()
        .map(|c| match c {
            ':' | '?' | '*' | '<' | '>' | '|' | '"' | '&' => '_',
            '=' => '-',
            other => other,
        })
        .collect()
}

/// Derive the mirror-relative path for a URL.
///
/// The URL path maps to a relative file path (interior slashes become
/// subdirectories, the root becomes `index`); a query string is sanitized
/// and appended to the stem so URLs differing only in query values stay
/// distinct; a basename without an extension gets `.html`.
#[must_use]
pub fn relative_path_for(url: &Url) -> PathBuf {
    let trimmed = url.path().trim_matches('/');
    let mut rel = if trimmed.is_empty() {
        "index".to_string()
    } else {
        sanitize(trimmed)
    };

    if let Some(query) = url.query()
        && !query.is_empty()
    {
        let suffix = sanitize(query);
        let (dir, base) = match rel.rsplit_once('/') {
            Some((dir, base)) => (Some(dir.to_string()), base.to_string()),
            None => (None, rel.clone()),
        };
        let with_query = match base.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{suffix}.{ext}"),
            _ => format!("{base}_{suffix}"),
        };
        rel = match dir {
            Some(dir) => format!("{dir}/{with_query}"),
            None => with_query,
        };
    }

    let basename = rel.rsplit('/').next().unwrap_or(&rel);
    if !basename.contains('.') {
        rel.push_str(".html");
    }

    PathBuf::from(rel)
}

/// Companion stem: the relative path minus a trailing `.html`.
fn companion_stem(rel: &Path) -> String {
    let raw = rel.to_string_lossy();
    raw.strip_suffix(".html").unwrap_or(&raw).to_string()
}

/// Write the raw HTML, optional extracted content, and metadata JSON for a
/// page, creating parent directories as needed.
pub async fn save_page(
    output_dir: &Path,
    url: &Url,
    body: &str,
    extracted: Option<&str>,
) -> Result<SavedPage> {
    let rel = relative_path_for(url);
    let html_path = output_dir.join(&rel);
    let stem = companion_stem(&rel);
    let meta_path = output_dir.join(format!("{stem}.meta.json"));

    if let Some(parent) = html_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let size = body.len() as u64;
    tokio::fs::write(&html_path, body)
        .await
        .with_context(|| format!("failed to write {}", html_path.display()))?;

    let content_path = match extracted {
        Some(content) => {
            let path = output_dir.join(format!("{stem}.content.html"));
            tokio::fs::write(&path, content)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            Some(path)
        }
        None => None,
    };

    let metadata = PageMetadata {
        url: url.as_str().to_string(),
        timestamp: Utc::now().timestamp(),
        size,
    };
    let meta_json =
        serde_json::to_string_pretty(&metadata).context("failed to serialize page metadata")?;
    tokio::fs::write(&meta_path, meta_json)
        .await
        .with_context(|| format!("failed to write {}", meta_path.display()))?;

    log::debug!("saved {} -> {}", url, html_path.display());

    Ok(SavedPage {
        html_path,
        content_path,
        meta_path,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(url: &str) -> String {
        relative_path_for(&Url::parse(url).unwrap())
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn root_maps_to_index() {
        assert_eq!(rel("https://example.com/"), "index.html");
    }

    #[test]
    fn nested_paths_become_subdirectories() {
        assert_eq!(rel("https://example.com/docs/intro"), "docs/intro.html");
    }

    #[test]
    fn hostile_characters_are_replaced() {
        let path = relative_path_for(&Url::parse("https://example.com/odd:name").unwrap());
        assert_eq!(path, PathBuf::from("odd_name.html"));
    }

    #[test]
    fn query_values_produce_distinct_paths() {
        let one = rel("https://example.com/page?id=1");
        let two = rel("https://example.com/page?id=2");
        assert_ne!(one, two);
        assert_eq!(one, "page_id-1.html");
    }

    #[test]
    fn query_preserves_existing_extension() {
        assert_eq!(rel("https://example.com/feed.xml?page=2"), "feed_page-2.xml");
    }

    #[test]
    fn existing_extension_is_kept() {
        assert_eq!(rel("https://example.com/data.json"), "data.json");
    }
}
