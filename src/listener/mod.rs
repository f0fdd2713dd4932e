//! Ephemeral local HTTP endpoint that receives the OAuth consent redirect.

mod http;

use std::io::ErrorKind;
use std::net::TcpListener as StdTcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Router, routing::get};
use tokio::net::TcpListener as TokioTcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::Error;
use crate::config::callback_path;

pub use http::CallbackQuery;
use http::{ListenerState, callback_handler, fallback_handler};

/// How long shutdown waits for in-flight requests before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Single-use callback listener for one authorization session.
///
/// The listener receives at most one code-bearing request; later requests are
/// accepted but do not affect the session. `shutdown` must run on every exit
/// path and tolerates being called on an already-stopped listener.
pub struct CallbackListener {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    served: Option<JoinHandle<()>>,
    callback_rx: Option<oneshot::Receiver<CallbackQuery>>,
}

impl CallbackListener {
    /// Bind the first free port starting at `first_port`.
    ///
    /// A port already in use moves probing to the next one; probing stops
    /// with `PortsExhausted` after `max_attempts` ports. Any other bind
    /// error fails the session immediately.
    pub fn start(first_port: u16, max_attempts: u16) -> Result<Self, Error> {
        let (listener, port) = bind_probing(first_port, max_attempts)?;
        listener.set_nonblocking(true).map_err(Error::Listener)?;
        let listener = TokioTcpListener::from_std(listener).map_err(Error::Listener)?;

        let (callback_tx, callback_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let state = ListenerState {
            callback_url_base: format!("http://localhost:{port}{}", callback_path()),
            callback_tx: Arc::new(Mutex::new(Some(callback_tx))),
        };

        let app = Router::new()
            .route(callback_path(), get(callback_handler))
            .fallback(fallback_handler)
            .with_state(state);

        let served = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = server.await {
                tracing::warn!(error = %err, "callback listener terminated early");
            }
        });

        tracing::debug!(port, "callback listener bound");
        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
            served: Some(served),
            callback_rx: Some(callback_rx),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Suspend until a code-bearing callback arrives or the window elapses.
    pub async fn wait_for_code(&mut self, timeout: Duration) -> Result<CallbackQuery, Error> {
        let callback_rx = self
            .callback_rx
            .take()
            .ok_or_else(|| Error::Listener(std::io::Error::other("callback already consumed")))?;

        let callback = tokio::time::timeout(timeout, callback_rx)
            .await
            .map_err(|_| Error::Timeout { timeout })?;

        callback.map_err(|_| Error::Listener(std::io::Error::other("callback channel closed")))
    }

    /// Tear the listener down and release the port, regardless of in-flight
    /// requests. Idempotent.
    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(mut served) = self.served.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut served)
                .await
                .is_err()
            {
                tracing::warn!(port = self.port, "stalled connection, aborting listener");
                served.abort();
                let _ = served.await;
            }
            tracing::debug!(port = self.port, "callback listener shut down");
        }
    }
}

fn bind_probing(first_port: u16, max_attempts: u16) -> Result<(StdTcpListener, u16), Error> {
    let attempts = max_attempts.max(1);
    let last_port = first_port.saturating_add(attempts - 1);

    for port in first_port..=last_port {
        match StdTcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == ErrorKind::AddrInUse => {
                tracing::debug!(port, "port in use, probing next");
            }
            Err(err) => return Err(Error::Listener(err)),
        }
    }

    Err(Error::PortsExhausted {
        first: first_port,
        last: last_port,
    })
}
