// Library exports for integration tests and embedding
#![allow(dead_code)]

pub mod admin_api;
pub mod config;
pub mod events;
pub mod metrics;
pub mod model;
pub mod proxy;
pub mod query;
pub mod recording;
pub mod store;
