//! Artifact schemas for every file the run store reads and writes.
//!
//! Every type here implements [`common::Validate`]; the store calls
//! `validate()` before and after every write so a malformed artifact never
//! reaches disk and a corrupted one is never silently trusted back.

pub mod citations;
pub mod common;
pub mod gates;
pub mod halt;
pub mod manifest;
pub mod perspectives;
pub mod pivot;
pub mod retry;
pub mod review;
pub mod run_config;
pub mod scope;
pub mod summaries;
pub mod wave;

pub use common::{Validate, ValidationError};
