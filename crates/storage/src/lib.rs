//! Storage abstraction and implementations for rehabilitation goals.
//!
//! This crate provides the trait-based store and archive interfaces with an
//! in-memory and a JSON-file implementation.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
pub mod json_storage;

pub use trait_::{ArchivedTree, GoalArchiver, GoalStore, Result, StatusFilter, StorageError};
pub use memory::MemoryStore;
pub use json_storage::JsonStore;
