//! Job metadata storage for jobdock.
//!
//! This crate provides a trait-based store for job records and result
//! summaries with a directory-per-job JSON implementation.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;

pub use trait_::{JobStore, StorageError, Result};
pub use json_storage::JsonJobStore;
