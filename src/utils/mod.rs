//!
//! Utility module for the sync engine.
//!
//! Re-exports formatting helpers used by the providers.
/// Utility functions for formatting and display
pub mod index;

pub use index::format_token_amount;
