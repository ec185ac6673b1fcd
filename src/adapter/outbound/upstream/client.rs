//! Upstream release service client.
//!
//! Endpoints, relative to the configured base URL:
//! - `GET license/<slug>`: current license sequence, plus an update when it changed
//! - `GET release/<slug>/pending`: updates newer than a cursor on a channel
//! - `GET release/<slug>/<cursor>/archive`: release archive bytes

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client as HttpClient;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use super::dto::{LicenseResponse, PendingUpdatesResponse};
use crate::domain::app::App;
use crate::domain::id::AppId;
use crate::domain::update::{DownloadedUpdate, PendingUpdate};
use crate::error::{Error, Result};
use crate::port::outbound::upstream::{UpdateQuery, UpstreamClient};

/// Archive response header set when the release needs configuration.
const NEEDS_CONFIG_HEADER: &str = "x-needs-config";
/// Archive response header set when the release ships preflight checks.
const HAS_PREFLIGHT_HEADER: &str = "x-has-preflight";

/// Connection settings for [`HttpUpstreamClient`].
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://upstream.example.com/".into(),
            token: None,
            timeout: Duration::from_secs(30),
            retry_max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// HTTP implementation of [`UpstreamClient`].
pub struct HttpUpstreamClient {
    http: HttpClient,
    base_url: Url,
    token: Option<String>,
    retry_max_attempts: u32,
    retry_backoff: Duration,
    license_sequences: Mutex<HashMap<AppId, u64>>,
}

impl HttpUpstreamClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self> {
        let mut endpoint = settings.endpoint.clone();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let base_url = Url::parse(&endpoint)?;

        let http = HttpClient::builder()
            .timeout(settings.timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Ok(Self {
            http,
            base_url,
            token: settings.token.clone(),
            retry_max_attempts: settings.retry_max_attempts,
            retry_backoff: settings.retry_backoff,
            license_sequences: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        let mut attempt = 0;
        let max_attempts = self.retry_max_attempts.max(1);

        loop {
            attempt += 1;
            let mut request = self.http.get(url.clone());
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => return Ok(response.error_for_status()?),
                Err(err) => {
                    if attempt >= max_attempts || !(err.is_timeout() || err.is_connect()) {
                        return Err(err.into());
                    }
                    warn!(attempt, max_attempts, error = %err, "Upstream request failed, retrying");
                    sleep(self.retry_backoff).await;
                }
            }
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    /// Report the license update only when the sequence moved since the last sync.
    ///
    /// Sequences are remembered in memory. The first sync for an app after a
    /// restart only records the baseline, so a change made while the process
    /// was down surfaces with the next license change.
    async fn sync_license(&self, app: &App) -> Result<Option<PendingUpdate>> {
        let url = self.url(&format!("license/{}", app.slug))?;
        let license: LicenseResponse = self.get(&url).await?.json().await?;

        let previous = self
            .license_sequences
            .lock()
            .insert(app.id.clone(), license.license_sequence);
        match previous {
            Some(seq) if seq != license.license_sequence => {
                info!(app = %app.id, from = seq, to = license.license_sequence, "License changed");
                Ok(license.update)
            }
            _ => Ok(None),
        }
    }

    async fn fetch_updates(&self, app: &App, query: &UpdateQuery) -> Result<Vec<PendingUpdate>> {
        let mut url = self.url(&format!("release/{}/pending", app.slug))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("channelId", &query.channel_id);
            if let Some(cursor) = &query.current_cursor {
                pairs.append_pair("channelSequence", cursor);
            }
            if let Some(since) = query.since {
                pairs.append_pair("since", &since.to_rfc3339());
            }
        }

        let response: PendingUpdatesResponse = self.get(&url).await?.json().await?;
        debug!(app = %app.id, count = response.updates.len(), "Fetched pending updates");
        Ok(response.updates)
    }

    async fn download_update(
        &self,
        app: &App,
        update: &PendingUpdate,
    ) -> Result<DownloadedUpdate> {
        let url = self.url(&format!("release/{}/{}/archive", app.slug, update.cursor))?;
        let response = self.get(&url).await?;
        let flag = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        };
        let needs_config = flag(NEEDS_CONFIG_HEADER);
        let has_preflight = flag(HAS_PREFLIGHT_HEADER);

        let archive = response.bytes().await?.to_vec();
        if archive.is_empty() {
            return Err(Error::Upstream(format!(
                "empty archive for {} cursor {}",
                app.slug, update.cursor
            )));
        }

        Ok(DownloadedUpdate {
            update: update.clone(),
            archive,
            needs_config,
            has_preflight,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::testkit::domain::{app, pending_update};

    #[derive(Clone, Default)]
    struct Reply {
        body: String,
        headers: Vec<(&'static str, &'static str)>,
        delay: Option<Duration>,
    }

    impl Reply {
        fn json(body: &str) -> Self {
            Self {
                body: body.to_string(),
                ..Self::default()
            }
        }
    }

    /// Minimal HTTP/1.1 server answering by path; the last reply for a path repeats.
    #[derive(Clone, Default)]
    struct StubUpstream {
        routes: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubUpstream {
        fn route(&self, path: &str, reply: Reply) -> &Self {
            self.routes
                .lock()
                .entry(path.to_string())
                .or_default()
                .push_back(reply);
            self
        }

        /// Request heads received so far.
        fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }

        async fn serve(&self) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let stub = self.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let stub = stub.clone();
                    tokio::spawn(async move { stub.answer(socket).await });
                }
            });
            format!("http://{addr}/api")
        }

        async fn answer(&self, mut socket: TcpStream) {
            let mut head = Vec::new();
            let mut chunk = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => head.extend_from_slice(&chunk[..n]),
                }
            }
            let head = String::from_utf8_lossy(&head).to_string();
            let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
            let path = target.split('?').next().unwrap_or_default().to_string();
            self.requests.lock().push(head);

            let reply = {
                let mut routes = self.routes.lock();
                match routes.get_mut(&path) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                }
            };
            let Some(reply) = reply else {
                let _ = socket
                    .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
                return;
            };

            if let Some(delay) = reply.delay {
                tokio::time::sleep(delay).await;
            }
            let mut response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                reply.body.len()
            );
            for (name, value) in &reply.headers {
                response.push_str(&format!("{name}: {value}\r\n"));
            }
            response.push_str("\r\n");
            response.push_str(&reply.body);
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    }

    fn client(endpoint: String) -> HttpUpstreamClient {
        HttpUpstreamClient::new(&UpstreamSettings {
            endpoint,
            token: Some("secret".into()),
            timeout: Duration::from_millis(300),
            retry_max_attempts: 2,
            retry_backoff: Duration::from_millis(10),
        })
        .unwrap()
    }

    #[test]
    fn endpoint_gets_trailing_slash() {
        let client = HttpUpstreamClient::new(&UpstreamSettings {
            endpoint: "https://up.example.com/api".into(),
            ..UpstreamSettings::default()
        })
        .unwrap();
        assert_eq!(
            client.url("release/web/pending").unwrap().as_str(),
            "https://up.example.com/api/release/web/pending"
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let result = HttpUpstreamClient::new(&UpstreamSettings {
            endpoint: "not a url".into(),
            ..UpstreamSettings::default()
        });
        assert!(matches!(result, Err(Error::Url(_))));
    }

    #[tokio::test]
    async fn first_license_sync_only_sets_the_baseline() {
        let stub = StubUpstream::default();
        let update = r#"{"cursor":"200","versionLabel":"2024.9","channelId":"stable"}"#;
        stub.route(
            "/api/license/web",
            Reply::json(&format!(r#"{{"licenseSequence":1,"update":{update}}}"#)),
        )
        .route(
            "/api/license/web",
            Reply::json(&format!(r#"{{"licenseSequence":2,"update":{update}}}"#)),
        );
        let client = client(stub.serve().await);
        let web = app("web");

        assert_eq!(client.sync_license(&web).await.unwrap(), None);
        let changed = client.sync_license(&web).await.unwrap().unwrap();
        assert_eq!(changed.cursor, "200");
        assert_eq!(client.sync_license(&web).await.unwrap(), None);

        let requests = stub.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0]
            .to_ascii_lowercase()
            .contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn pending_updates_query_carries_channel_cursor_and_since() {
        let stub = StubUpstream::default();
        stub.route(
            "/api/release/web/pending",
            Reply::json(r#"{"updates":[{"cursor":"101","versionLabel":"2024.2","channelId":"stable"}]}"#),
        );
        let client = client(stub.serve().await);
        let query = UpdateQuery {
            current_cursor: Some("100".into()),
            channel_id: "stable".into(),
            since: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        };

        let updates = client.fetch_updates(&app("web"), &query).await.unwrap();

        assert_eq!(updates, vec![pending_update("101", "2024.2")]);
        let request_line = stub.requests()[0].lines().next().unwrap().to_string();
        assert!(request_line.contains("channelId=stable"));
        assert!(request_line.contains("channelSequence=100"));
        assert!(request_line.contains("since=2024-05-01T12%3A00%3A00%2B00%3A00"));
    }

    #[tokio::test]
    async fn archive_headers_become_release_flags() {
        let stub = StubUpstream::default();
        stub.route(
            "/api/release/web/101/archive",
            Reply {
                body: "kind: ConfigMap\n".into(),
                headers: vec![("x-needs-config", "TRUE"), ("x-has-preflight", "true")],
                delay: None,
            },
        )
        .route("/api/release/web/102/archive", Reply::json("kind: Pod\n"));
        let client = client(stub.serve().await);
        let web = app("web");

        let flagged = client
            .download_update(&web, &pending_update("101", "2024.2"))
            .await
            .unwrap();
        assert!(flagged.needs_config);
        assert!(flagged.has_preflight);
        assert_eq!(flagged.archive, b"kind: ConfigMap\n".to_vec());

        let plain = client
            .download_update(&web, &pending_update("102", "2024.3"))
            .await
            .unwrap();
        assert!(!plain.needs_config);
        assert!(!plain.has_preflight);
    }

    #[tokio::test]
    async fn empty_archive_is_an_upstream_error() {
        let stub = StubUpstream::default();
        stub.route("/api/release/web/101/archive", Reply::json(""));
        let client = client(stub.serve().await);

        let result = client
            .download_update(&app("web"), &pending_update("101", "2024.2"))
            .await;

        assert!(matches!(result, Err(Error::Upstream(_))));
    }

    #[tokio::test]
    async fn timed_out_request_is_retried() {
        let stub = StubUpstream::default();
        stub.route(
            "/api/license/web",
            Reply {
                body: r#"{"licenseSequence":1}"#.into(),
                delay: Some(Duration::from_secs(2)),
                ..Reply::default()
            },
        )
        .route("/api/license/web", Reply::json(r#"{"licenseSequence":1}"#));
        let client = client(stub.serve().await);

        assert_eq!(client.sync_license(&app("web")).await.unwrap(), None);
        assert_eq!(stub.requests().len(), 2);
    }

    #[tokio::test]
    async fn error_status_is_not_retried() {
        let stub = StubUpstream::default();
        let client = client(stub.serve().await);

        let result = client.sync_license(&app("web")).await;

        assert!(matches!(result, Err(Error::Http(_))));
        assert_eq!(stub.requests().len(), 1);
    }
}
