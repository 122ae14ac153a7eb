//! Document storage seam for the registry and the distribution engine.
//!
//! [`DocumentStore`] is the only I/O boundary the scheduler suspends on.
//! [`FileStore`] keeps one directory per tenant namespace and one JSON or
//! TOML document per collection.

pub mod file_store;
pub mod store;

pub use file_store::FileStore;
pub use store::{Collection, DocumentStore, IndexSpec};
