//! TCP listeners served with axum-server.
//!
//! # Responsibilities
//! - Bind every validated listener during setup
//! - Register a `listener|<index>` reload callback per listener
//! - Serve purpose-specific routers once started
//! - Graceful shutdown of all servers on stop
//! - Track each server task by address for diagnostic dumps

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{routing::get, Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use serde::Serialize;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::validation::ListenerSpec;
use crate::globals;
use crate::lifecycle::reload::{listener_key, ReloadRegistry};
use crate::net::tls::{load_tls_config, reload_tls_config};
use crate::net::{ListenerError, ListenerSubsystem};
use crate::observability::diagnostics::BackgroundTasks;
use crate::observability::metrics;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub purpose: &'static str,
    pub version: &'static str,
}

async fn api_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        purpose: "api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn cluster_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        purpose: "cluster",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router for one listener from its purposes.
#[allow(deprecated)]
fn build_router(spec: &ListenerSpec) -> Router {
    let mut router = Router::new();
    if spec.purposes.api {
        router = router.route("/v1/health", get(api_health));
    }
    if spec.purposes.cluster {
        router = router.route("/cluster/health", get(cluster_health));
    }
    if spec.purposes.api {
        router = router.layer(TimeoutLayer::new(globals::default_max_request_duration()));
    }
    router
        .layer(ConcurrencyLimitLayer::new(spec.max_connections))
        .layer(TraceLayer::new_for_http())
}

struct TlsFiles {
    config: RustlsConfig,
    cert: PathBuf,
    key: PathBuf,
}

struct BoundListener {
    spec: ListenerSpec,
    socket: Option<std::net::TcpListener>,
    local_addr: SocketAddr,
    tls: Option<Arc<TlsFiles>>,
    handle: Handle,
}

/// The default listener subsystem: real sockets, axum routers.
#[derive(Default)]
pub struct TcpListenerSubsystem {
    bound: Mutex<Vec<BoundListener>>,
    servers: BackgroundTasks,
}

impl TcpListenerSubsystem {
    pub fn new() -> Self {
        Self::default()
    }
}

fn load_tls(spec: &ListenerSpec) -> Result<Option<Arc<TlsFiles>>, ListenerError> {
    if spec.tls_disable {
        return Ok(None);
    }
    let tls_error = |reason: String| ListenerError::Tls {
        address: spec.address.clone(),
        reason,
    };
    let cert = spec
        .tls_cert_file
        .as_deref()
        .map(PathBuf::from)
        .ok_or_else(|| tls_error("tls_cert_file is not set".to_string()))?;
    let key = spec
        .tls_key_file
        .as_deref()
        .map(PathBuf::from)
        .ok_or_else(|| tls_error("tls_key_file is not set".to_string()))?;

    let config = load_tls_config(&cert, &key).map_err(|e| tls_error(e.to_string()))?;
    Ok(Some(Arc::new(TlsFiles { config, cert, key })))
}

impl ListenerSubsystem for TcpListenerSubsystem {
    fn setup(&self, listeners: &[ListenerSpec], registry: &ReloadRegistry) -> Result<(), ListenerError> {
        let mut bound = self.bound.lock().expect("listener mutex poisoned");

        for (index, spec) in listeners.iter().enumerate() {
            let bind_error = |source: std::io::Error| ListenerError::Bind {
                address: spec.address.clone(),
                source,
            };
            let addr: SocketAddr = spec.address.parse().map_err(|e| {
                bind_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
            })?;
            let socket = std::net::TcpListener::bind(addr).map_err(bind_error)?;
            socket.set_nonblocking(true).map_err(bind_error)?;
            let local_addr = socket.local_addr().map_err(bind_error)?;

            let tls = load_tls(spec)?;

            let reload_tls = tls.clone();
            registry.register(listener_key(index), move || {
                match &reload_tls {
                    Some(files) => {
                        reload_tls_config(&files.config, &files.cert, &files.key)?;
                        tracing::info!(address = %local_addr, "TLS material reloaded");
                    }
                    None => tracing::debug!(address = %local_addr, "Plaintext listener, nothing to reload"),
                }
                Ok(())
            });

            tracing::info!(
                address = %local_addr,
                purposes = %spec.purposes,
                tls = !spec.tls_disable,
                max_connections = spec.max_connections,
                "Listener bound"
            );

            bound.push(BoundListener {
                spec: spec.clone(),
                socket: Some(socket),
                local_addr,
                tls,
                handle: Handle::new(),
            });
        }

        Ok(())
    }

    fn start(&self) -> Result<(), ListenerError> {
        let mut bound = self.bound.lock().expect("listener mutex poisoned");

        for listener in bound.iter_mut() {
            let socket = listener.socket.take().ok_or_else(|| {
                ListenerError::Start(listener.local_addr.to_string(), "already started".to_string())
            })?;
            let app = build_router(&listener.spec).into_make_service();
            let handle = listener.handle.clone();
            let address = listener.local_addr;

            let task = match &listener.tls {
                Some(files) => {
                    let server = axum_server::tls_rustls::from_tcp_rustls(socket, files.config.clone())
                        .handle(handle);
                    tokio::spawn(async move {
                        if let Err(e) = server.serve(app).await {
                            tracing::error!(address = %address, error = %e, "Listener failed");
                        }
                    })
                }
                None => {
                    let server = axum_server::from_tcp(socket).handle(handle);
                    tokio::spawn(async move {
                        if let Err(e) = server.serve(app).await {
                            tracing::error!(address = %address, error = %e, "Listener failed");
                        }
                    })
                }
            };
            self.servers.track(format!("listener {}", address), task);

            tracing::info!(address = %address, purposes = %listener.spec.purposes, "Listener serving");
        }

        metrics::set_active_listeners(bound.len());
        Ok(())
    }

    fn stop(&self) -> Result<(), ListenerError> {
        let bound = self.bound.lock().expect("listener mutex poisoned");
        for listener in bound.iter() {
            listener.handle.graceful_shutdown(None);
            tracing::info!(address = %listener.local_addr, "Listener stopping");
        }
        metrics::set_active_listeners(0);
        Ok(())
    }

    fn tasks(&self) -> Vec<(String, bool)> {
        self.servers.snapshot()
    }

    fn local_addrs(&self) -> Vec<SocketAddr> {
        self.bound
            .lock()
            .expect("listener mutex poisoned")
            .iter()
            .map(|l| l.local_addr)
            .collect()
    }
}
