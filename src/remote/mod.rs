//! Remote relational store boundary: trait consumed by the sync engine plus
//! an in-memory implementation for tests and local development.

pub mod memory;
pub mod traits;

pub use memory::InMemoryRemote;
pub use traits::{RemoteError, RemoteStore};
