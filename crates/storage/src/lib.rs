#![forbid(unsafe_code)]

pub mod catalog;
pub mod records;
pub mod repository;
pub mod sqlite;

pub use repository::{InMemoryStore, PreferenceStore, Storage, StorageError};
