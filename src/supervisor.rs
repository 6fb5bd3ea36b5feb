//! Process lifecycle: one message sink, two listeners, ordered shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::handlers::RelayContext;
use crate::message_store::{MessageSink, MessageStore, StoreError};
use crate::routes::{file_routes, relay_routes};
use crate::static_files::StaticFileResolver;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("message store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("failed to bind {listener} listener on {addr}: {source}")]
    Bind {
        listener: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} listener stopped unexpectedly")]
    ListenerExited(&'static str),
}

/// Owns the shared sink until both listeners are running.
pub struct Supervisor {
    config: AppConfig,
    sink: Arc<dyn MessageSink>,
}

impl Supervisor {
    /// Connect the PostgreSQL store. Nothing is listening yet if this fails.
    pub async fn connect(config: AppConfig) -> Result<Self, SupervisorError> {
        let store = MessageStore::connect(config.store.clone()).await?;
        Ok(Self::with_sink(config, Arc::new(store)))
    }

    pub fn with_sink(config: AppConfig, sink: Arc<dyn MessageSink>) -> Self {
        Self { config, sink }
    }

    /// Bind both listeners. On failure the sink is closed before returning.
    pub async fn bind(self) -> Result<BoundSupervisor, SupervisorError> {
        let http = match bind("http", self.config.http_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.sink.close().await;
                return Err(e);
            }
        };
        let relay = match bind("relay", self.config.relay_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.sink.close().await;
                return Err(e);
            }
        };

        Ok(BoundSupervisor {
            config: self.config,
            sink: self.sink,
            http,
            relay,
        })
    }

    /// Bind and run until `shutdown` resolves or a listener dies.
    pub async fn run<F>(self, shutdown: F) -> Result<(), SupervisorError>
    where
        F: Future<Output = ()>,
    {
        self.bind().await?.run(shutdown).await
    }
}

async fn bind(listener: &'static str, addr: SocketAddr) -> Result<TcpListener, SupervisorError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| SupervisorError::Bind {
            listener,
            addr,
            source,
        })
}

/// Both listeners bound, not yet serving.
pub struct BoundSupervisor {
    config: AppConfig,
    sink: Arc<dyn MessageSink>,
    http: TcpListener,
    relay: TcpListener,
}

impl BoundSupervisor {
    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http.local_addr()
    }

    pub fn relay_addr(&self) -> std::io::Result<SocketAddr> {
        self.relay.local_addr()
    }

    /// Serve until `shutdown` resolves or either listener task ends.
    ///
    /// Shutdown stops both listeners, waits for open relay sessions to finish,
    /// and only then closes the sink, so no insert can follow the close.
    pub async fn run<F>(self, shutdown: F) -> Result<(), SupervisorError>
    where
        F: Future<Output = ()>,
    {
        let BoundSupervisor {
            config,
            sink,
            http,
            relay,
        } = self;

        let token = CancellationToken::new();
        let sessions = TaskTracker::new();

        let resolver = Arc::new(StaticFileResolver::new(&config.static_root));
        let ctx = RelayContext::new(Arc::clone(&sink))
            .with_idle_timeout(config.idle_timeout)
            .with_decode_policy(config.decode_policy)
            .with_shutdown(token.child_token());

        info!(addr = ?http.local_addr().ok(), root = %config.static_root.display(), "Starting HTTP server");
        let http = warp::serve(file_routes(resolver))
            .incoming(http)
            .graceful(token.clone().cancelled_owned())
            .run();

        info!(addr = ?relay.local_addr().ok(), policy = ?config.decode_policy, "Starting relay server");
        let relay = warp::serve(relay_routes(ctx, sessions.clone()))
            .incoming(relay)
            .graceful(token.clone().cancelled_owned())
            .run();

        supervise(http, relay, shutdown, token, sessions, sink).await
    }
}

/// Run both listener futures until `shutdown` resolves or either one ends.
///
/// Teardown order is fixed: cancel `token`, wait for the remaining listener,
/// drain the tasks in `sessions`, then close `sink`. A listener that ends on
/// its own yields [`SupervisorError::ListenerExited`].
pub async fn supervise<H, R, F>(
    http: H,
    relay: R,
    shutdown: F,
    token: CancellationToken,
    sessions: TaskTracker,
    sink: Arc<dyn MessageSink>,
) -> Result<(), SupervisorError>
where
    H: Future<Output = ()> + Send + 'static,
    R: Future<Output = ()> + Send + 'static,
    F: Future<Output = ()>,
{
    let mut http_task = tokio::spawn(http);
    let mut relay_task = tokio::spawn(relay);

    tokio::pin!(shutdown);
    let mut http_done = false;
    let mut relay_done = false;

    let result = tokio::select! {
        _ = &mut shutdown => {
            info!("Shutdown requested");
            Ok(())
        }
        res = &mut http_task => {
            http_done = true;
            listener_exited("http", res)
        }
        res = &mut relay_task => {
            relay_done = true;
            listener_exited("relay", res)
        }
    };

    // Stop accepting on both listeners, then drain relay sessions.
    token.cancel();
    if !http_done {
        if let Err(e) = http_task.await {
            error!(error = %e, "HTTP listener task failed during shutdown");
        }
    }
    if !relay_done {
        if let Err(e) = relay_task.await {
            error!(error = %e, "Relay listener task failed during shutdown");
        }
    }

    sessions.close();
    sessions.wait().await;
    info!("Listeners stopped");

    sink.close().await;
    result
}

fn listener_exited(
    listener: &'static str,
    res: Result<(), JoinError>,
) -> Result<(), SupervisorError> {
    match res {
        Ok(()) => error!(listener, "Listener exited, stopping sibling"),
        Err(e) => error!(listener, error = %e, "Listener crashed, stopping sibling"),
    }
    Err(SupervisorError::ListenerExited(listener))
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
