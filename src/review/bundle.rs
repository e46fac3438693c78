//! Ingests a reviewer's `review-bundle.json` (the agent-seam output for
//! the review stage) and persists it.

use crate::error::CoreResult;
use crate::model::review::ReviewBundle;
use crate::model::Validate;
use crate::store::RunStore;

/// Validates and writes `review/review-bundle.json` exactly once per
/// iteration path (the caller namespaces `path` by iteration, e.g.
/// `review/iteration-1/review-bundle.json`).
pub fn ingest(store: &RunStore, path: &str, bundle: &ReviewBundle) -> CoreResult<()> {
    bundle.validate()?;
    store.write_json_once(path, bundle)
}
