//! Deep Research Core
//!
//! A deterministic orchestration core for a multi-stage deep-research
//! pipeline: planning, parallel wave-1 research, pivot decision, optional
//! wave-2 gap-filling, citation extraction/validation, per-perspective
//! summaries, synthesis, a bounded review loop, and finalize.
//!
//! Everything in this crate is deterministic control-plane logic. The one
//! genuinely non-deterministic concern — running an LLM agent — is pushed
//! out to an injected [`orchestrator::driver::AgentRunner`] or externalized
//! entirely as prompt/result artifacts on disk (the `task` driver). Nothing
//! in this crate makes network calls.
//!
//! # Layout
//!
//! - [`io`] — atomic writes, canonical JSON, SHA-256 digests, path containment.
//! - [`model`] — artifact schemas and their validators.
//! - [`store`] — the run store: init, manifest/gates writers, the run lock,
//!   the audit log, and the shared run ledger.
//! - [`stage`] — the stage machine and its transition preconditions.
//! - [`gates`] — the six quality gate evaluators (A–F).
//! - [`wave`] — wave-1/wave-2 plan construction, output validation, review.
//! - [`pivot`] — gap parsing and the wave-2-required decision.
//! - [`citations`] — URL extraction, normalization, and validation.
//! - [`summaries`] — summary pack and synthesis draft construction.
//! - [`review`] — the reviewer-bundle ingest and revision-control policy.
//! - [`orchestrator`] — tick drivers (`fixture`/`task`/`live`) and the watchdog.

#![allow(clippy::uninlined_format_args)]

pub mod citations;
pub mod error;
pub mod gates;
pub mod io;
pub mod model;
pub mod orchestrator;
pub mod pivot;
pub mod review;
pub mod stage;
pub mod store;
pub mod summaries;
pub mod wave;

pub use error::{CoreError, CoreResult, Recoverable};
