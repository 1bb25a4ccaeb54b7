//! URL canonicalization for deduplication.
//!
//! Two URLs that differ only in fragment, trailing slash, default port,
//! query-parameter order, empty query values, or scheme/host case must
//! collapse to the same canonical key. The transforms here are idempotent:
//! normalizing an already-normalized URL is a no-op.

use url::Url;
use url::form_urlencoded;

/// Apply the canonicalization transforms to a parsed URL.
///
/// In order: scheme and host are lowercased and the default port stripped
/// (both handled by the `url` parser), the fragment is dropped, query pairs
/// are re-serialized sorted by key with empty-after-trim values removed,
/// percent-escapes in the path are uppercased, and a trailing slash is
/// stripped from every path except the root `/`.
///
/// Path lowercasing is off by default because servers may be case-sensitive;
/// pass `lowercase_paths = true` to opt in.
#[must_use]
pub fn normalize(url: &Url, lowercase_paths: bool) -> Url {
    let mut out = url.clone();

    out.set_fragment(None);

    // Sort query pairs by key, dropping pairs whose value is empty after
    // trimming. Values are taken verbatim; only the order collapses.
    if url.query().is_some() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        if pairs.is_empty() {
            out.set_query(None);
        } else {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            out.set_query(Some(&query));
        }
    }

    let mut path = out.path().to_string();
    if lowercase_paths {
        path = path.to_ascii_lowercase();
    }
    // Escape-case restoration runs after the optional lowercasing so `%2f`
    // always ends up `%2F`.
    let mut path = uppercase_percent_escapes(&path);
    if path.len() > 1 && path.ends_with('/') {
        path.truncate(path.len() - 1);
    }
    out.set_path(&path);

    out
}

/// Parse and normalize a URL string into its canonical form.
pub fn normalize_str(raw: &str, lowercase_paths: bool) -> Result<String, url::ParseError> {
    let url = Url::parse(raw)?;
    Ok(normalize(&url, lowercase_paths).into())
}

/// Resolve `href` against `base`, returning the canonical form when
/// normalization is enabled and the plain resolved form otherwise.
pub fn resolve_and_normalize(
    base: &Url,
    href: &str,
    normalize_urls: bool,
    lowercase_paths: bool,
) -> Result<Url, url::ParseError> {
    let resolved = base.join(href)?;
    if normalize_urls {
        Ok(normalize(&resolved, lowercase_paths))
    } else {
        Ok(resolved)
    }
}

/// Uppercase the hex digits of every `%xx` escape in a path.
///
/// Parsed URL paths are pure ASCII (non-ASCII is already percent-encoded),
/// so byte-wise scanning is safe here.
fn uppercase_percent_escapes(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            out.push('%');
            out.push((bytes[i + 1] as char).to_ascii_uppercase());
            out.push((bytes[i + 2] as char).to_ascii_uppercase());
            i += 3;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str) -> String {
        normalize_str(raw, false).expect("test URL must parse")
    }

    #[test]
    fn lowercases_scheme_and_host() {
        assert_eq!(norm("HTTP://EXAMPLE.com/Path"), "http://example.com/Path");
    }

    #[test]
    fn strips_default_ports() {
        assert_eq!(norm("http://example.com:80/a"), "http://example.com/a");
        assert_eq!(norm("https://example.com:443/a"), "https://example.com/a");
        // Non-default ports survive.
        assert_eq!(norm("http://example.com:8080/a"), "http://example.com:8080/a");
    }

    #[test]
    fn drops_fragment() {
        assert_eq!(norm("https://example.com/a#section"), "https://example.com/a");
    }

    #[test]
    fn sorts_query_pairs_by_key() {
        assert_eq!(
            norm("https://example.com/p?b=2&a=1"),
            norm("https://example.com/p?a=1&b=2")
        );
        assert_eq!(norm("https://example.com/p?b=2&a=1"), "https://example.com/p?a=1&b=2");
    }

    #[test]
    fn drops_empty_query_values() {
        assert_eq!(norm("https://example.com/p?a=1&b="), "https://example.com/p?a=1");
        assert_eq!(norm("https://example.com/p?a=&b="), "https://example.com/p");
    }

    #[test]
    fn query_values_taken_verbatim() {
        // Different values must NOT collapse.
        assert_ne!(norm("https://example.com/p?a=1"), norm("https://example.com/p?a=2"));
    }

    #[test]
    fn strips_trailing_slash_except_root() {
        assert_eq!(norm("https://example.com/a/"), "https://example.com/a");
        assert_eq!(norm("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn uppercases_percent_escapes() {
        assert_eq!(
            norm("https://example.com/a%2fb"),
            "https://example.com/a%2Fb"
        );
    }

    #[test]
    fn path_case_preserved_by_default() {
        assert_eq!(norm("https://example.com/Docs/API"), "https://example.com/Docs/API");
        assert_eq!(
            normalize_str("https://example.com/Docs/API", true).unwrap(),
            "https://example.com/docs/api"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "HTTP://Example.COM:80/A/b/?z=9&a=1&empty=#frag",
            "https://example.com/",
            "https://example.com/x%2fy?k=v",
        ] {
            let once = norm(raw);
            assert_eq!(norm(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn resolve_respects_disabled_normalization() {
        let base = Url::parse("https://example.com/docs/").unwrap();
        let raw = resolve_and_normalize(&base, "Page/#top", false, false).unwrap();
        assert_eq!(raw.as_str(), "https://example.com/docs/Page/#top");
        let canon = resolve_and_normalize(&base, "Page/#top", true, false).unwrap();
        assert_eq!(canon.as_str(), "https://example.com/docs/Page");
    }
}
