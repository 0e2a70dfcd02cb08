//! Integration tests for the ASU Image Builder client
//!
//! This crate contains end-to-end tests that exercise the public client API
//! over a real HTTP round-trip against the in-crate mock server
//! (`asu_client::testing`):
//! - Build submission and polling
//! - Metadata routes (overview, revision, latest.json)
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p asu-tests
//! ```
//!
//! # Test Structure
//!
//! - `build_test.rs` - Build request payloads, response classification,
//!   download-URL augmentation
//! - `metadata_test.rs` - Overview (live and static), revision, endpoint
//!   handling

// This crate only contains tests, no library code
