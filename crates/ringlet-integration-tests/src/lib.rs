//! Integration test crate for Ringlet.
//!
//! This crate has no library code — it only contains integration tests
//! that exercise end-to-end webring flows across multiple workspace crates:
//! remote repositories (in-memory fake), the local index, the sync engine,
//! moderation, and navigation.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p ringlet-integration-tests
//! ```
