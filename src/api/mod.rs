//! HTTP access to the remote conversion engine.

mod client;
mod error;

pub use client::EngineClient;
pub use error::{ApiError, ApiResult};
