//! Upstream side of the switchboard: an MCP server on stdio that exposes
//! one tool per suite and forwards calls to the [`Router`].

use switchboard_core::Result;
use switchboard_mcp::Router;
use tokio::io::BufReader;
use tracing::{error, warn};

pub mod handler;
pub mod protocol;
pub mod server;
pub mod shutdown;

pub use handler::RequestHandler;
pub use shutdown::{termination_signal, Shutdown};

/// Serve on stdin/stdout until EOF or a termination signal, then close
/// every suite connection exactly once.
pub async fn serve(router: Router) -> Result<()> {
    let shutdown = Shutdown::new(router.clone());
    let handler = RequestHandler::new(router);

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let signal = async {
        match termination_signal().await {
            Ok(name) => name,
            Err(e) => {
                warn!("Cannot listen for termination signals: {}", e);
                std::future::pending().await
            }
        }
    };

    tokio::select! {
        result = server::run(handler, stdin, stdout) => {
            if let Err(ref e) = result {
                error!("Upstream connection failed: {}", e);
            }
            shutdown.run("stdin closed").await;
            result
        }
        name = signal => {
            shutdown.run(name).await;
            Ok(())
        }
    }
}
