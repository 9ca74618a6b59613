// Adapters: concrete implementations of the domain ports (LLM providers, stores, file storage).

pub mod providers;
pub mod storage;
pub mod store;

pub use storage::{LocalStorage, ResultArchive};
pub use store::{InMemoryStore, StoreProgress};
