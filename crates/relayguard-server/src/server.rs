//! Accept loop: one handshake line per connection, gate it, then hold or kick.
//!
//! The wire protocol is deliberately small: the relay forwards a single
//! handshake line when a connection arrives; the gate answers `OK <session>`
//! and keeps the session registered until the peer disconnects, or answers
//! `KICK <message>` and closes before anything else is served.

use crate::config::GuardConfig;
use crate::extract::{extractor_for, RawHandshake};
use crate::interceptor::{HandshakeInterceptor, Outcome};
use crate::sessions::{ActiveSessions, DuplicateSessionGuard};
use crate::store::TokenStore;
use relayguard_core::{GuardError, GuardResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Upper bound on the handshake line a client may send.
const MAX_HANDSHAKE_BYTES: u64 = 64 * 1024;

/// The gatekeeper server instance.
pub struct GuardServer {
    config: GuardConfig,
    sessions: Arc<ActiveSessions>,
    interceptor: Arc<HandshakeInterceptor>,
}

impl GuardServer {
    /// Wire up the store, session directory, and interceptor from config.
    pub fn new(config: GuardConfig) -> GuardResult<Self> {
        if config.allowed_tokens.is_empty() {
            warn!("no tokens configured — the first token observed will be trusted and saved");
        } else {
            info!(count = config.allowed_tokens.len(), "loaded allow-set from config");
        }

        let store = Arc::new(TokenStore::new(
            config.allowed_tokens.clone(),
            config.token_persister(),
        ));
        let sessions = Arc::new(ActiveSessions::new());
        let interceptor = Arc::new(HandshakeInterceptor::new(
            store,
            DuplicateSessionGuard::new(sessions.clone()),
            extractor_for(config.format),
            config.messages.clone(),
        ));

        Ok(Self {
            config,
            sessions,
            interceptor,
        })
    }

    /// Accept connections until the task is cancelled.
    pub async fn run(&self) -> GuardResult<()> {
        let addr = format!("{}:{}", self.config.bind, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| GuardError::Transport(format!("bind {addr} failed: {e}")))?;
        info!(addr = %addr, format = ?self.config.format, "relayguard listening");

        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    let interceptor = self.interceptor.clone();
                    let sessions = self.sessions.clone();
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, remote, interceptor, sessions).await
                        {
                            debug!(remote = %remote, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    remote: SocketAddr,
    interceptor: Arc<HandshakeInterceptor>,
    sessions: Arc<ActiveSessions>,
) -> GuardResult<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half).take(MAX_HANDSHAKE_BYTES);

    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(GuardError::InvalidHandshake(
            "connection closed before handshake".into(),
        ));
    }
    let payload = line
        .trim_end_matches(|c| c == '\r' || c == '\n')
        .to_string();
    let raw = RawHandshake {
        remote_addr: remote,
        payload,
    };

    match interceptor.intercept(&raw).await {
        Outcome::Accept(profile) => {
            let session_id = sessions.register(profile.identity, profile.origin.clone(), remote);
            write_half.write_all(format!("OK {session_id}\n").as_bytes()).await?;

            // Hold the session until the peer disconnects, then drop it from
            // the directory so the identity can log in again.
            let mut rest = reader.into_inner();
            let mut sink = [0u8; 1024];
            loop {
                match rest.read(&mut sink).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(remote = %remote, error = %e, "session read error");
                        break;
                    }
                }
            }
            sessions.unregister(&profile.identity);
            Ok(())
        }
        Outcome::Kick { message, .. } => {
            write_half
                .write_all(format!("KICK {message}\n").as_bytes())
                .await?;
            write_half.shutdown().await.ok();
            Ok(())
        }
    }
}
