//! Client code for offgate.
//!
//! This crate provides the upstream HTTP fetch pipeline, URL handling, and
//! bypass classification shared by the gateway server.

pub mod fetch;

pub use fetch::{BypassReason, FetchClient, FetchConfig, FetchResponse};
