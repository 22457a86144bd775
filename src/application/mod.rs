// Application layer - the ledger store, the service facade clients talk to,
// read-only reports and the error type surfaced to callers.

pub mod error;
pub mod reporting;
pub mod service;
pub mod store;

pub use error::*;
pub use reporting::*;
pub use service::*;
pub use store::*;
