//! Read-only HTTP view of a running mesh.
//!
//! `GET /api/graph` returns the current [`StatusSnapshot`] as JSON. The server
//! runs on its own thread with its own tokio runtime so the synchronous
//! session never blocks on it; the session pushes a fresh snapshot into the
//! shared [`StatusFeed`] after every stop or restart.

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, RwLock};
use std::thread;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{error, info};

use crate::status::StatusSnapshot;

/// Address used when `--api` is given without one.
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:8080";

/// Latest snapshot, shared between the session and the HTTP handlers.
#[derive(Debug, Clone)]
pub struct StatusFeed(Arc<RwLock<StatusSnapshot>>);

impl StatusFeed {
    pub fn new(initial: StatusSnapshot) -> Self {
        Self(Arc::new(RwLock::new(initial)))
    }

    pub fn publish(&self, snapshot: StatusSnapshot) {
        match self.0.write() {
            Ok(mut current) => *current = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    pub fn current(&self) -> StatusSnapshot {
        match self.0.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Router serving the status endpoint.
pub fn router(feed: StatusFeed) -> Router {
    Router::new().route("/api/graph", get(graph)).with_state(feed)
}

/// Handle GET /api/graph
async fn graph(State(feed): State<StatusFeed>) -> Json<StatusSnapshot> {
    Json(feed.current())
}

/// A status server running in the background.
pub struct StatusServer {
    feed: StatusFeed,
    local_addr: SocketAddr,
}

impl StatusServer {
    pub fn feed(&self) -> StatusFeed {
        self.feed.clone()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Bind `addr` and serve `feed` until the process exits.
///
/// Binding happens on the calling thread so an unusable address is reported
/// before the mesh is handed to the menu.
pub fn serve(addr: SocketAddr, feed: StatusFeed) -> Result<StatusServer> {
    let listener = TcpListener::bind(addr).wrap_err_with(|| format!("Failed to bind status API on {}", addr))?;
    listener
        .set_nonblocking(true)
        .wrap_err("Failed to configure the status API listener")?;
    let local_addr = listener.local_addr()?;

    let app = router(feed.clone());
    thread::Builder::new()
        .name("status-api".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(err) => {
                    error!("Status API runtime failed to start: {}", err);
                    return;
                }
            };
            let served = rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener)?;
                axum::serve(listener, app).await
            });
            if let Err(err) = served {
                error!("Status API stopped: {}", err);
            }
        })
        .wrap_err("Failed to spawn the status API thread")?;

    info!("Status API listening on http://{}/api/graph", local_addr);
    Ok(StatusServer { feed, local_addr })
}
