//! Process teardown shared by stdin EOF and termination signals.

use std::sync::Arc;
use switchboard_mcp::Router;
use tokio::sync::OnceCell;
use tracing::info;

/// Single teardown hook. Every trigger calls [`Shutdown::run`]; the pool is
/// closed by whichever gets there first and later callers wait for it.
#[derive(Clone)]
pub struct Shutdown {
    router: Router,
    done: Arc<OnceCell<()>>,
}

impl Shutdown {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            done: Arc::new(OnceCell::new()),
        }
    }

    pub async fn run(&self, reason: &str) {
        self.done
            .get_or_init(|| async {
                info!("Shutting down ({}), closing suite connections", reason);
                self.router.close_all_clients().await;
            })
            .await;
    }

    pub fn has_run(&self) -> bool {
        self.done.initialized()
    }
}

/// Resolves on SIGINT or SIGTERM and names the signal
#[cfg(unix)]
pub async fn termination_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
pub async fn termination_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "ctrl-c")
}
