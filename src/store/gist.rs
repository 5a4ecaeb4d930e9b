//! Bookmark download from a GitHub or Gitee gist.
//!
//! The gist is expected to hold a `bookmarks.json` file in the same format as
//! the local store. Transient failures (timeouts, refused connections, 5xx,
//! 429) are retried with exponential backoff and jitter; everything else
//! fails immediately.

use std::collections::HashMap;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::bookmarks::{Bookmark, parse_bookmarks};
use super::settings::{GistConfig, GistPlatform};
use super::StoreError;

/// File inside the gist that holds the bookmark list.
pub const GIST_BOOKMARKS_FILE: &str = "bookmarks.json";

const GITHUB_API: &str = "https://api.github.com";
const GITEE_API: &str = "https://gitee.com/api/v5";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_MIN_DELAY: Duration = Duration::from_millis(200);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// Retries after the first attempt.
const MAX_RETRIES: usize = 2;

#[derive(Debug, Deserialize)]
struct GistResponse {
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
}

/// Outcome of a single request, split by whether retrying can help.
#[derive(Debug)]
enum FetchError {
    Transient(String),
    Fatal(StoreError),
}

impl FetchError {
    fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transient(msg) => f.write_str(msg),
            FetchError::Fatal(e) => write!(f, "{}", e),
        }
    }
}

impl From<FetchError> for StoreError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transient(msg) => StoreError::Http(msg),
            FetchError::Fatal(e) => e,
        }
    }
}

pub struct GistClient {
    http: reqwest::Client,
    config: GistConfig,
    base_url: String,
}

impl GistClient {
    pub fn new(config: GistConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("ttm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Http(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = match config.platform() {
            GistPlatform::Github => GITHUB_API,
            GistPlatform::Gitee => GITEE_API,
        }
        .to_string();

        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn gist_url(&self) -> String {
        format!(
            "{}/gists/{}",
            self.base_url.trim_end_matches('/'),
            self.config.gist_id
        )
    }

    /// Download and parse the gist's bookmark list.
    pub async fn fetch_bookmarks(&self) -> Result<Vec<Bookmark>, StoreError> {
        if self.config.token.is_empty() {
            return Err(StoreError::MissingToken);
        }
        if self.config.gist_id.is_empty() {
            return Err(StoreError::GistNotFound("no gist_id configured".to_string()));
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(RETRY_MIN_DELAY)
            .with_max_delay(RETRY_MAX_DELAY)
            .with_max_times(MAX_RETRIES)
            .with_jitter();

        let body = (|| async { self.fetch_once().await })
            .retry(backoff)
            .when(FetchError::is_transient)
            .notify(|err, dur| {
                warn!("Gist request failed: {}. Retrying in {:?}", err, dur);
            })
            .await?;

        extract_bookmarks(&body, &self.config.gist_id)
    }

    async fn fetch_once(&self) -> Result<String, FetchError> {
        let request = self.http.get(self.gist_url());
        let request = match self.config.platform() {
            GistPlatform::Github => request
                .header("Authorization", format!("token {}", self.config.token))
                .header("Accept", "application/vnd.github+json"),
            GistPlatform::Gitee => request.query(&[("access_token", self.config.token.as_str())]),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                FetchError::Transient(format!("Gist request failed: {}", e))
            } else {
                FetchError::Fatal(StoreError::Http(format!("Gist request failed: {}", e)))
            }
        })?;

        let status = response.status();
        debug!("Gist {} answered {}", self.config.gist_id, status);

        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::Fatal(StoreError::GistNotFound(
                self.config.gist_id.clone(),
            )));
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Transient(format!(
                "get gist failed, status code: {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(FetchError::Fatal(StoreError::Http(format!(
                "get gist failed, status code: {}",
                status.as_u16()
            ))));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("Failed to read gist body: {}", e)))
    }
}

fn extract_bookmarks(body: &str, gist_id: &str) -> Result<Vec<Bookmark>, StoreError> {
    let gist: GistResponse = serde_json::from_str(body)?;

    let content = gist
        .files
        .get(GIST_BOOKMARKS_FILE)
        .and_then(|file| file.content.as_deref())
        .ok_or_else(|| {
            StoreError::GistNotFound(format!("{} has no {}", gist_id, GIST_BOOKMARKS_FILE))
        })?;

    parse_bookmarks(content)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn config(platform: &str) -> GistConfig {
        GistConfig {
            platform: platform.to_string(),
            token: "t0k".to_string(),
            gist_id: "abc123".to_string(),
        }
    }

    fn gist_body(bookmarks: &str) -> String {
        serde_json::json!({
            "id": "abc123",
            "files": {
                "bookmarks.json": { "filename": "bookmarks.json", "content": bookmarks },
                "notes.md": { "content": "hello" }
            }
        })
        .to_string()
    }

    /// Serve one canned HTTP response per connection, recording each request.
    async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap();
                seen.lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&buf[..n]).to_string());
                let reply = format!(
                    "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        (format!("http://{}", addr), requests)
    }

    mod urls {
        use super::*;

        #[test]
        fn test_github_url() {
            let client = GistClient::new(config("github")).unwrap();
            assert_eq!(client.gist_url(), "https://api.github.com/gists/abc123");
        }

        #[test]
        fn test_gitee_url() {
            let client = GistClient::new(config("gitee")).unwrap();
            assert_eq!(client.gist_url(), "https://gitee.com/api/v5/gists/abc123");
        }

        #[test]
        fn test_base_url_override_trims_slash() {
            let client = GistClient::new(config("github"))
                .unwrap()
                .with_base_url("http://localhost:9/");
            assert_eq!(client.gist_url(), "http://localhost:9/gists/abc123");
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn test_extracts_bookmarks_file() {
            let body = gist_body(r#"[{"id":"1","title":"web","host":"h"}]"#);
            let bookmarks = extract_bookmarks(&body, "abc123").unwrap();
            assert_eq!(bookmarks.len(), 1);
            assert_eq!(bookmarks[0].title, "web");
        }

        #[test]
        fn test_missing_file_is_not_found() {
            let body = serde_json::json!({ "files": { "other.json": { "content": "[]" } } })
                .to_string();
            assert!(matches!(
                extract_bookmarks(&body, "abc123"),
                Err(StoreError::GistNotFound(_))
            ));
        }

        #[test]
        fn test_bad_bookmark_content_is_an_error() {
            let body = gist_body("{oops");
            assert!(matches!(
                extract_bookmarks(&body, "abc123"),
                Err(StoreError::Json(_))
            ));
        }
    }

    mod fetching {
        use super::*;

        #[tokio::test]
        async fn test_empty_token_fails_before_any_request() {
            let client = GistClient::new(GistConfig {
                gist_id: "abc123".to_string(),
                ..Default::default()
            })
            .unwrap();
            assert!(matches!(
                client.fetch_bookmarks().await,
                Err(StoreError::MissingToken)
            ));
        }

        #[tokio::test]
        async fn test_empty_gist_id_is_not_found() {
            let client = GistClient::new(GistConfig {
                token: "t0k".to_string(),
                ..Default::default()
            })
            .unwrap();
            assert!(matches!(
                client.fetch_bookmarks().await,
                Err(StoreError::GistNotFound(_))
            ));
        }

        #[tokio::test]
        async fn test_github_request_uses_token_header() {
            let body = gist_body(r#"[{"title":"web","host":"h"}]"#);
            let (base, requests) = serve(vec![(200, body)]).await;
            let client = GistClient::new(config("github")).unwrap().with_base_url(base);

            let bookmarks = client.fetch_bookmarks().await.unwrap();

            assert_eq!(bookmarks.len(), 1);
            let request = requests.lock().unwrap()[0].to_lowercase();
            assert!(request.starts_with("get /gists/abc123 "));
            assert!(request.contains("authorization: token t0k"));
        }

        #[tokio::test]
        async fn test_gitee_request_uses_query_token() {
            let (base, requests) = serve(vec![(200, gist_body("[]"))]).await;
            let client = GistClient::new(config("gitee")).unwrap().with_base_url(base);

            client.fetch_bookmarks().await.unwrap();

            let request = requests.lock().unwrap()[0].clone();
            assert!(request.starts_with("GET /gists/abc123?access_token=t0k "));
        }

        #[tokio::test]
        async fn test_server_error_is_retried() {
            let (base, requests) = serve(vec![
                (503, String::new()),
                (200, gist_body(r#"[{"title":"db","host":"d"}]"#)),
            ])
            .await;
            let client = GistClient::new(config("github")).unwrap().with_base_url(base);

            let bookmarks = client.fetch_bookmarks().await.unwrap();

            assert_eq!(bookmarks[0].title, "db");
            assert_eq!(requests.lock().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_retries_are_bounded() {
            let (base, requests) = serve(vec![
                (500, String::new()),
                (500, String::new()),
                (500, String::new()),
                (200, gist_body("[]")),
            ])
            .await;
            let client = GistClient::new(config("github")).unwrap().with_base_url(base);

            let err = client.fetch_bookmarks().await.err().unwrap();

            assert!(matches!(err, StoreError::Http(_)));
            assert_eq!(requests.lock().unwrap().len(), 3);
        }

        #[tokio::test]
        async fn test_not_found_is_not_retried() {
            let (base, requests) = serve(vec![(404, String::new()), (200, gist_body("[]"))]).await;
            let client = GistClient::new(config("github")).unwrap().with_base_url(base);

            let err = client.fetch_bookmarks().await.err().unwrap();

            assert!(matches!(err, StoreError::GistNotFound(_)));
            assert_eq!(requests.lock().unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_unauthorized_is_not_retried() {
            let (base, requests) = serve(vec![(401, String::new()), (200, gist_body("[]"))]).await;
            let client = GistClient::new(config("github")).unwrap().with_base_url(base);

            let err = client.fetch_bookmarks().await.err().unwrap();

            assert!(err.to_string().contains("401"));
            assert_eq!(requests.lock().unwrap().len(), 1);
        }
    }
}
