//! Search tests against a local stand-in STAC API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use scene_catalog::{CatalogError, StacConfig, StacSession};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use videomap_common::{BoundingBox, TimeRange};

/// Serve the pages built by `pages` in order, one per connection.
///
/// `pages` receives the API root so pages can link to each other.
async fn serve_pages(pages: impl FnOnce(&str) -> Vec<String>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let root = format!("http://{}", listener.local_addr().unwrap());
    let pages = pages(&root);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        for body in pages {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            counter.fetch_add(1, Ordering::SeqCst);

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/geo+json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
    });

    (root, hits)
}

/// Consume one request: headers, then `Content-Length` bytes of body.
async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }
}

fn item(id: &str, datetime: &str) -> String {
    format!(
        r#"{{"id":"{}","properties":{{"datetime":"{}"}},"assets":{{"red":{{"href":"file:///red.tif"}}}}}}"#,
        id, datetime
    )
}

fn session(api_url: String) -> StacSession {
    StacSession::open(StacConfig {
        api_url,
        ..StacConfig::default()
    })
    .unwrap()
}

fn query() -> (BoundingBox, TimeRange) {
    (
        BoundingBox::new(-105.3, 39.9, -105.2, 40.0),
        TimeRange::from_dates("2022-01-01", "2022-02-01").unwrap(),
    )
}

#[tokio::test]
async fn test_search_follows_next_links() {
    let (root, hits) = serve_pages(|root| {
        vec![
            format!(
                r#"{{"features":[{}],"links":[{{"rel":"next","href":"{}/search?page=2"}}]}}"#,
                item("late", "2022-01-20T10:00:00Z"),
                root
            ),
            format!(
                r#"{{"features":[{}],"links":[]}}"#,
                item("early", "2022-01-05T10:00:00Z")
            ),
        ]
    })
    .await;

    let (bbox, range) = query();
    let scenes = session(root).search(&bbox, &range).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    let ids: Vec<&str> = scenes.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["early", "late"]);
}

#[tokio::test]
async fn test_search_drops_items_outside_range() {
    let (root, _) = serve_pages(|_| {
        vec![format!(
            r#"{{"features":[{},{}],"links":[]}}"#,
            item("inside", "2022-01-10T10:00:00Z"),
            item("after", "2022-03-10T10:00:00Z")
        )]
    })
    .await;

    let (bbox, range) = query();
    let scenes = session(root).search(&bbox, &range).await.unwrap();
    let ids: Vec<&str> = scenes.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["inside"]);
}

#[test]
fn test_search_without_items_is_no_scenes() {
    tokio_test::block_on(async {
        let (root, _) = serve_pages(|_| vec![r#"{"features":[],"links":[]}"#.to_string()]).await;
        let (bbox, range) = query();

        let result = session(root).search(&bbox, &range).await;
        assert!(matches!(result, Err(CatalogError::NoScenes { .. })));
    });
}

#[test]
fn test_open_rejects_bad_url() {
    let result = StacSession::open(StacConfig {
        api_url: "catalog.local".to_string(),
        ..StacConfig::default()
    });
    assert!(matches!(result, Err(CatalogError::Config(_))));
}
