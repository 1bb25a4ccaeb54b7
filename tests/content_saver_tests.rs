use tempfile::TempDir;
use url::Url;
use webvault::content_saver::{PageMetadata, relative_path_for, save_page};

const BODY: &str = "<html><body><main><p>Saved page body</p></main></body></html>";

#[tokio::test]
async fn writes_three_companion_files() {
    let dir = TempDir::new().unwrap();
    let url = Url::parse("https://example.com/docs/intro").unwrap();

    let saved = save_page(dir.path(), &url, BODY, Some("<main>extracted</main>"))
        .await
        .unwrap();

    assert_eq!(saved.html_path, dir.path().join("docs/intro.html"));
    assert_eq!(
        saved.content_path.as_deref(),
        Some(dir.path().join("docs/intro.content.html").as_path())
    );
    assert_eq!(saved.meta_path, dir.path().join("docs/intro.meta.json"));

    assert_eq!(tokio::fs::read_to_string(&saved.html_path).await.unwrap(), BODY);
    assert_eq!(
        tokio::fs::read_to_string(saved.content_path.as_ref().unwrap()).await.unwrap(),
        "<main>extracted</main>"
    );

    let meta: PageMetadata =
        serde_json::from_str(&tokio::fs::read_to_string(&saved.meta_path).await.unwrap()).unwrap();
    assert_eq!(meta.url, "https://example.com/docs/intro");
    assert_eq!(meta.size, BODY.len() as u64);
    assert!(meta.timestamp > 0);
}

#[tokio::test]
async fn extraction_disabled_writes_two_files() {
    let dir = TempDir::new().unwrap();
    let url = Url::parse("https://example.com/page").unwrap();

    let saved = save_page(dir.path(), &url, BODY, None).await.unwrap();

    assert!(saved.content_path.is_none());
    assert!(saved.html_path.exists());
    assert!(saved.meta_path.exists());
    assert!(!dir.path().join("page.content.html").exists());
}

#[tokio::test]
async fn root_url_saves_as_index() {
    let dir = TempDir::new().unwrap();
    let url = Url::parse("https://example.com/").unwrap();

    let saved = save_page(dir.path(), &url, BODY, None).await.unwrap();
    assert_eq!(saved.html_path, dir.path().join("index.html"));
    assert_eq!(saved.meta_path, dir.path().join("index.meta.json"));
}

#[tokio::test]
async fn query_values_never_collide() {
    let dir = TempDir::new().unwrap();
    let first = Url::parse("https://example.com/search?q=rust").unwrap();
    let second = Url::parse("https://example.com/search?q=crawler").unwrap();

    let a = save_page(dir.path(), &first, "first result page with enough text", None)
        .await
        .unwrap();
    let b = save_page(dir.path(), &second, "second result page with enough text", None)
        .await
        .unwrap();

    assert_ne!(a.html_path, b.html_path);
    assert!(a.html_path.exists());
    assert!(b.html_path.exists());
}

#[test]
fn sanitization_replacement_table() {
    let cases = [
        ("https://example.com/a:b", "a_b.html"),
        ("https://example.com/a%3Cb%3E", "a_b_.html"),
        ("https://example.com/pipe%7Cchar", "pipe_char.html"),
        ("https://example.com/deep/nested/page", "deep/nested/page.html"),
    ];
    for (input, expected) in cases {
        let url = Url::parse(input).unwrap();
        assert_eq!(
            relative_path_for(&url).to_string_lossy(),
            expected,
            "for {input}"
        );
    }
}
