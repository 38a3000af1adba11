//! HTTP client for the player-details API.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;
use vigil_core::{PlayerApiConfig, PlayerApiError, PlayerDetails, PlayerDetailsPort};

/// `GET {base}/players/{approvedUserIndex}` backed by reqwest.
pub struct HttpPlayerDetails {
    client: reqwest::Client,
    base: Url,
}

impl HttpPlayerDetails {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PlayerApiError> {
        let mut base = Url::parse(base_url).map_err(|e| PlayerApiError::Request(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlayerApiError::Request(e.to_string()))?;

        Ok(Self { client, base })
    }

    /// Build a client from configuration. `None` when no base URL is set.
    pub fn from_config(config: &PlayerApiConfig) -> Result<Option<Self>, PlayerApiError> {
        config
            .base_url
            .as_deref()
            .map(|base| Self::new(base, Duration::from_secs(config.timeout_secs)))
            .transpose()
    }

    fn player_url(&self, approved_user_index: u32) -> Result<Url, PlayerApiError> {
        self.base
            .join(&format!("players/{approved_user_index}"))
            .map_err(|e| PlayerApiError::Request(e.to_string()))
    }
}

#[async_trait]
impl PlayerDetailsPort for HttpPlayerDetails {
    async fn fetch(
        &self,
        approved_user_index: u32,
    ) -> Result<Option<PlayerDetails>, PlayerApiError> {
        let url = self.player_url(approved_user_index)?;
        debug!(%url, "Fetching player details");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PlayerApiError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PlayerApiError::Status(status.as_u16()));
        }

        response
            .json::<PlayerDetails>()
            .await
            .map(Some)
            .map_err(|e| PlayerApiError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one canned HTTP response and report the request line.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            loop {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                read += n;
                if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let request = String::from_utf8_lossy(&buf[..read]).to_string();
            let request_line = request.lines().next().unwrap_or_default().to_string();
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(request_line);
        });

        (format!("http://{addr}/api"), rx)
    }

    #[tokio::test]
    async fn test_fetch_found() {
        let (base, request) =
            serve_once("200 OK", r#"{"steamID":"111","characterName":"Bob","isAdmin":false}"#)
                .await;
        let client = HttpPlayerDetails::new(&base, Duration::from_secs(5)).unwrap();

        let details = client.fetch(5).await.unwrap().unwrap();
        assert_eq!(details.steam_id.as_deref(), Some("111"));
        assert_eq!(details.character_name.as_deref(), Some("Bob"));
        assert_eq!(details.is_admin, Some(false));

        let line = request.await.unwrap();
        assert!(line.starts_with("GET /api/players/5 "), "{line}");
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_none() {
        let (base, _request) = serve_once("404 Not Found", "{}").await;
        let client = HttpPlayerDetails::new(&base, Duration::from_secs(5)).unwrap();
        assert!(client.fetch(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let (base, _request) = serve_once("500 Internal Server Error", "{}").await;
        let client = HttpPlayerDetails::new(&base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            client.fetch(1).await,
            Err(PlayerApiError::Status(500))
        ));
    }

    #[test]
    fn test_from_config_disabled_without_url() {
        let config = PlayerApiConfig::default();
        assert!(HttpPlayerDetails::from_config(&config).unwrap().is_none());
    }
}
