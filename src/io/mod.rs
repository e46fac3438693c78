//! Path/IO primitives.
//!
//! Every artifact mutation in this crate funnels through [`atomic`]: writers
//! never leave a partially written file visible, so a tick that crashes
//! mid-write leaves on-disk state consistent (an orphaned `.tmp.*` file is
//! permitted and safe, per the concurrency model in the specification).

pub mod atomic;
pub mod canonical;
pub mod containment;

pub use atomic::{append_jsonl, atomic_write_json, atomic_write_text, ensure_dir};
pub use canonical::{canonical_json, sha256_digest_json, sha256_hex};
pub use containment::resolve_contained;
