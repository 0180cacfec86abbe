//! Local persistent storage: host-store trait, in-memory implementation,
//! and the namespaced typed adapter the repositories sit on.

pub mod adapter;
pub mod memory;
pub mod traits;

pub use adapter::StoreAdapter;
pub use memory::MemoryStore;
pub use traits::{LocalStore, StoreChange, StoreError};
