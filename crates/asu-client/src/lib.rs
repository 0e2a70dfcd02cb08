//! ASU Image Builder Client Library
//!
//! Typed HTTP client for attended-sysupgrade (ASU) servers, the OpenWrt
//! build service that produces custom firmware images on demand.
//!
//! # Example
//!
//! ```rust,no_run
//! use asu_client::AsuClient;
//!
//! #[tokio::main]
//! async fn main() -> asu_client::Result<()> {
//!     let client = AsuClient::new()?;
//!
//!     // Request an image with LuCI baked in
//!     let response = client
//!         .image_builder("bcm27xx/bcm2711", "rpi-4", "23.05.0")
//!         .packages(["luci"])
//!         .build()
//!         .await?;
//!
//!     // Accepted builds are polled by hash until they complete
//!     if let Some(hash) = response.request_hash() {
//!         let polled = client.check_build(hash).await?;
//!         for image in polled.images() {
//!             println!("{} -> {:?}", image.name, image.url);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! Outcomes the service reports inside the response body (queued, completed,
//! failed) come back as [`BuildResponse`] variants so callers can branch on
//! them; `Err` is reserved for transport and decoding problems.
//!
//! # Testing
//!
//! The `testing` module provides a scriptable in-process mock server:
//!
//! ```rust,ignore
//! use asu_client::testing::{MockBuildServer, TestServer};
//!
//! let mock = MockBuildServer::new();
//! let server = TestServer::start(mock.router()).await?;
//! let overview = server.client.overview_live().await?;
//! ```

mod builder;
mod client;
mod error;
pub mod testing;
mod types;

pub use builder::{ImageBuilder, ImageBuilderProvider};
pub use client::{AsuClient, DEFAULT_ENDPOINT};
pub use error::{AsuClientError, Result};
pub use types::*;
