//! State storage layer: filesystem-backed state documents with an advisory
//! lock per state id.
//! - `backend::StateBackend` is the contract the HTTP layer calls into.
//! - `file::state_store::FileStateStore` implements it on a single directory.
//! - Errors are explicit `StoreError` variants so callers can pick a status code.

pub mod errors;
pub mod backend;
pub mod lock_info;
pub mod file;
pub mod metrics;
