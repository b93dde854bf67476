//! HTTP control plane for a cluster node.
//!
//! This module provides an HTTP API for:
//! - Admitting new members (`POST /join`)
//! - Reading and writing keys (`GET`/`PUT`/`DELETE /kv/{key}`)
//! - Manual snapshots (`POST /snapshot`)
//! - Health and status endpoints
//!
//! # Architecture
//!
//! The API uses plain Hyper 1.x for HTTP handling.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      ApiServer                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐   │
//! │  │   router     │──│   handlers   │──│    state     │   │
//! │  └──────────────┘  └──────────────┘  └──────────────┘   │
//! │         │                  │                 │          │
//! │         ▼                  ▼                 ▼          │
//! │  ┌──────────────────────────────────────────────────┐   │
//! │  │                   ClusterNode                    │   │
//! │  └──────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod client;
mod error;
pub mod handlers;
mod request;
mod response;
mod router;
mod server;
mod state;

pub use client::request_join;
pub use error::ApiError;
pub use handlers::join::JoinRequest;
pub use router::route;
pub use server::ApiServer;
pub use state::AppState;
