//! Scenelink broker library
//!
//! Bridges an HTTP control process to any number of connected viewers:
//! - `GET /events` publish leg (SSE)
//! - `POST /action` fire-and-forget broadcast
//! - `POST /run` broadcast-and-collect under a deadline
//! - `GET /ws` response channels

pub mod api;
pub mod config;
pub mod error;
pub mod relay;
pub mod server;

pub use config::BrokerConfig;
pub use error::{ApiError, BrokerError, BrokerResult};
pub use relay::{ChannelState, ClientId, ClientResponse, CollectOutcome, Relay, RequestId};
pub use server::Server;
