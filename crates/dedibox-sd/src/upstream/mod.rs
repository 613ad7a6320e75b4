//! Provider API access.
//!
//! The discovery cycle is written against [`ServerApi`]; [`client::UpstreamClient`]
//! is the HTTP implementation talking to the Online/Dedibox REST API.

pub mod client;

use async_trait::async_trait;

use crate::error::SdError;
use crate::model::ServerDetail;

/// Source of server identifiers and per-server details.
#[async_trait]
pub trait ServerApi: Send + Sync {
    /// Enumerate server identifiers from the listing endpoint.
    async fn list_servers(&self) -> Result<Vec<String>, SdError>;

    /// Fetch and validate the detail document of one server.
    async fn server_detail(&self, server_id: &str) -> Result<ServerDetail, SdError>;
}

pub use client::*;
