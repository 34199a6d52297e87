//! The learning reverse proxy: forwarding, capture, and server lifecycle.

pub mod capture;
pub mod client;
pub mod forwarding;
pub mod handler;
pub mod server;

pub use handler::ProxyContext;
pub use server::{LearningProxyServer, ServerState};
