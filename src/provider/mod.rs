//! Blockchain data provider integration
//!
//! This module provides the provider trait the sync engine calls once per attempt, the
//! shared request/report/error types, and an HTTP implementation backed by public
//! explorer APIs.

/// HTTP client for explorer APIs
mod client;
/// Scripted provider for tests
#[cfg(test)]
pub(crate) mod mock;
/// Type definitions for provider data structures
mod types;

pub use client::{HttpChainProvider, ProviderEndpoints};
pub use types::*;
