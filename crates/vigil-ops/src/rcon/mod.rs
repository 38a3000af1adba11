//! RCON client for in-game announcements.
//!
//! Connects on demand, authenticates once per connection and drops the
//! connection after a quiet period.

mod packet;

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_core::{AnnouncerPort, RconConfig, RconError};

use packet::{
    Packet, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE, SERVERDATA_EXECCOMMAND,
    SERVERDATA_RESPONSE_VALUE, read_packet, write_packet,
};

/// Placeholder replaced by the announcement text in the command template.
const MESSAGE_PLACEHOLDER: &str = "{message}";

struct RconInner {
    config: RconConfig,
    conn: Mutex<Option<TcpStream>>,
    next_id: AtomicI32,
    idle: Mutex<Option<CancellationToken>>,
}

/// Source RCON client.
#[derive(Clone)]
pub struct RconClient {
    inner: Arc<RconInner>,
}

impl RconClient {
    pub fn new(config: RconConfig) -> Self {
        Self {
            inner: Arc::new(RconInner {
                config,
                conn: Mutex::new(None),
                next_id: AtomicI32::new(1),
                idle: Mutex::new(None),
            }),
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.inner.config.host, self.inner.config.port)
    }

    fn next_id(&self) -> i32 {
        // Wraps past i32::MAX; -1 is reserved for failed auth.
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if id <= 0 {
            self.inner.next_id.store(2, Ordering::Relaxed);
            1
        } else {
            id
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.conn.lock().await.is_some()
    }

    /// Run one console command and return the server's reply.
    pub async fn execute(&self, command: &str) -> Result<String, RconError> {
        if !self.inner.config.enabled {
            return Err(RconError::Disabled);
        }

        let mut conn = self.inner.conn.lock().await;
        if conn.is_none() {
            *conn = Some(self.connect().await?);
        }
        let Some(stream) = conn.as_mut() else {
            return Err(RconError::Io("connection unavailable".to_string()));
        };

        let id = self.next_id();
        let reply = match self.exchange(stream, id, command).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                // A timed-out read may have consumed part of a packet.
                debug!(id, command, "No RCON reply, dropping connection");
                *conn = None;
                String::new()
            }
            Err(e) => {
                *conn = None;
                return Err(e);
            }
        };
        drop(conn);

        self.arm_idle_disconnect().await;
        Ok(reply)
    }

    /// Close the connection now.
    pub async fn disconnect(&self) {
        if let Some(token) = self.inner.idle.lock().await.take() {
            token.cancel();
        }
        if self.inner.conn.lock().await.take().is_some() {
            debug!(addr = %self.addr(), "RCON disconnected");
        }
    }

    async fn connect(&self) -> Result<TcpStream, RconError> {
        let addr = self.addr();
        let connect_timeout = Duration::from_secs(self.inner.config.connect_timeout_secs);

        let mut stream = match timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(RconError::Connect {
                    addr,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(RconError::Connect {
                    addr,
                    reason: "timed out".to_string(),
                });
            }
        };

        let id = self.next_id();
        write_packet(
            &mut stream,
            &Packet::new(id, SERVERDATA_AUTH, self.inner.config.password.clone()),
        )
        .await?;

        // Servers send an empty RESPONSE_VALUE before the auth response.
        loop {
            let reply = timeout(connect_timeout, read_packet(&mut stream))
                .await
                .map_err(|_| RconError::Protocol("no auth response".to_string()))??;
            if reply.kind != SERVERDATA_AUTH_RESPONSE {
                continue;
            }
            if reply.id == -1 {
                warn!(%addr, "RCON authentication rejected");
                return Err(RconError::AuthFailed);
            }
            if reply.id == id {
                break;
            }
        }

        info!(%addr, "RCON connected");
        Ok(stream)
    }

    async fn exchange(
        &self,
        stream: &mut TcpStream,
        id: i32,
        command: &str,
    ) -> Result<Option<String>, RconError> {
        write_packet(stream, &Packet::new(id, SERVERDATA_EXECCOMMAND, command)).await?;
        debug!(id, command, "RCON command sent");

        let reply_timeout = Duration::from_secs(self.inner.config.connect_timeout_secs);
        loop {
            match timeout(reply_timeout, read_packet(stream)).await {
                Ok(Ok(reply)) if reply.id == id && reply.kind == SERVERDATA_RESPONSE_VALUE => {
                    return Ok(Some(reply.body));
                }
                // Late reply to an earlier command
                Ok(Ok(reply)) => debug!(id = reply.id, "Skipping stale RCON reply"),
                Ok(Err(e)) => return Err(e),
                // Some commands get no reply at all
                Err(_) => return Ok(None),
            }
        }
    }

    async fn arm_idle_disconnect(&self) {
        let token = CancellationToken::new();
        if let Some(previous) = self.inner.idle.lock().await.replace(token.clone()) {
            previous.cancel();
        }

        let inner = Arc::clone(&self.inner);
        let quiet = Duration::from_secs(inner.config.idle_disconnect_secs);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = sleep(quiet) => {
                    if inner.conn.lock().await.take().is_some() {
                        debug!(idle_secs = quiet.as_secs(), "RCON idle, disconnected");
                    }
                }
            }
        });
    }
}

#[async_trait]
impl AnnouncerPort for RconClient {
    async fn send_announce(&self, message: &str) -> Result<(), RconError> {
        let command = self
            .inner
            .config
            .announce_template
            .replace(MESSAGE_PLACEHOLDER, message);
        self.execute(&command).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Minimal RCON server: checks the password, records commands and
    /// reports when the client hangs up.
    async fn fake_server(password: &'static str) -> (u16, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    let auth = read_packet(&mut socket).await.unwrap();
                    assert_eq!(auth.kind, SERVERDATA_AUTH);
                    write_packet(
                        &mut socket,
                        &Packet::new(auth.id, SERVERDATA_RESPONSE_VALUE, ""),
                    )
                    .await
                    .unwrap();
                    let id = if auth.body == password { auth.id } else { -1 };
                    write_packet(&mut socket, &Packet::new(id, SERVERDATA_AUTH_RESPONSE, ""))
                        .await
                        .unwrap();
                    if id == -1 {
                        return;
                    }

                    while let Ok(cmd) = read_packet(&mut socket).await {
                        let _ = tx.send(cmd.body.clone());
                        if cmd.body == "silent" {
                            continue;
                        }
                        write_packet(
                            &mut socket,
                            &Packet::new(cmd.id, SERVERDATA_RESPONSE_VALUE, "ok"),
                        )
                        .await
                        .unwrap();
                    }
                    let _ = tx.send("<closed>".to_string());
                });
            }
        });

        (port, rx)
    }

    fn config(port: u16, password: &str) -> RconConfig {
        RconConfig {
            enabled: true,
            port,
            password: password.to_string(),
            idle_disconnect_secs: 1,
            connect_timeout_secs: 2,
            ..RconConfig::default()
        }
    }

    #[tokio::test]
    async fn test_announce_uses_template() {
        let (port, mut commands) = fake_server("secret").await;
        let client = RconClient::new(config(port, "secret"));

        client.send_announce("Hello there").await.unwrap();
        client.send_restart_announce(3).await.unwrap();

        assert_eq!(commands.recv().await.unwrap(), "say Hello there");
        assert_eq!(
            commands.recv().await.unwrap(),
            "say Server restart in 3 minutes"
        );
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_execute_returns_reply() {
        let (port, _commands) = fake_server("secret").await;
        let client = RconClient::new(config(port, "secret"));
        assert_eq!(client.execute("status").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_reply_timeout_drops_connection() {
        let (port, mut commands) = fake_server("secret").await;
        let mut config = config(port, "secret");
        config.idle_disconnect_secs = 30;
        let client = RconClient::new(config);

        assert_eq!(client.execute("silent").await.unwrap(), "");
        assert!(!client.is_connected().await);
        assert_eq!(commands.recv().await.unwrap(), "silent");
        assert_eq!(commands.recv().await.unwrap(), "<closed>");

        // Next command gets a fresh, correctly framed connection.
        assert_eq!(client.execute("status").await.unwrap(), "ok");
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let (port, _commands) = fake_server("secret").await;
        let client = RconClient::new(config(port, "nope"));
        assert!(matches!(
            client.send_announce("hi").await,
            Err(RconError::AuthFailed)
        ));
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_disabled() {
        let client = RconClient::new(RconConfig::default());
        assert!(matches!(
            client.send_announce("hi").await,
            Err(RconError::Disabled)
        ));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = RconClient::new(config(port, "secret"));
        assert!(matches!(
            client.send_announce("hi").await,
            Err(RconError::Connect { .. })
        ));
    }

    #[tokio::test]
    async fn test_idle_disconnect() {
        let (port, mut commands) = fake_server("secret").await;
        let client = RconClient::new(config(port, "secret"));

        client.send_announce("one").await.unwrap();
        assert_eq!(commands.recv().await.unwrap(), "say one");

        let closed = tokio::time::timeout(Duration::from_secs(5), commands.recv())
            .await
            .unwrap();
        assert_eq!(closed.as_deref(), Some("<closed>"));
        assert!(!client.is_connected().await);

        // Reconnects on demand.
        client.send_announce("two").await.unwrap();
        assert_eq!(commands.recv().await.unwrap(), "say two");
    }
}
