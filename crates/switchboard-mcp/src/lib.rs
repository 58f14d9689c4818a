//! Routing and connection lifecycle for the switchboard.
//!
//! Each configured suite is exposed upstream as one top-level tool. The
//! [`Router`] resolves a tool name through the [`SuiteRegistry`], borrows
//! the suite's connection from the [`ConnectionPool`] and runs the action
//! through the [`dispatcher`].
//!
//! Downstream suites are reached by an MCP client over stdio or SSE; the
//! [`SuiteConnector`] trait is the seam tests use to replace it.

pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod pool;
pub mod registry;
pub mod router;
pub mod session;
pub mod transport;
pub mod types;

pub use client::McpClient;
pub use connection::SuiteConnection;
pub use pool::ConnectionPool;
pub use registry::{list_top_level_tools, SuiteDescriptor, SuiteRegistry};
pub use router::Router;
pub use session::{McpConnector, SuiteConnector, SuiteSession};
