pub mod sync;
pub mod types;

pub use sync::WalletSyncEngine;
pub use types::*;
