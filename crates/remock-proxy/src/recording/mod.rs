//! Recording of proxied traffic.
//!
//! The learning-mode proxy hands every completed request/response cycle to
//! the [`RecordingService`], the single entry point for saving, listing, and
//! removing recorded requests.

mod service;

pub use service::RecordingService;
