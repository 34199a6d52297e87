//! Admin REST API for operating the proxy.
//!
//! Exposes a metrics snapshot and a health check on a dedicated listener,
//! separate from the recording proxy port.

mod router;
mod server;

pub use server::AdminApiServer;
