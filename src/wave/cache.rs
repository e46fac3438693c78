//! Prompt-digest caching: decides whether an agent needs to be re-run for
//! a perspective, or whether its existing output is still fresh.

use crate::model::wave::WaveOutputMeta;

/// `sha256:<hex>` digest of a prompt's literal markdown text.
pub fn prompt_digest(prompt_md: &str) -> String {
    format!("sha256:{}", crate::io::sha256_hex(prompt_md.as_bytes()))
}

/// Whether an existing sidecar's `prompt_digest` still matches the plan's
/// prompt for this perspective. A missing sidecar always forces a re-run.
pub fn is_fresh(prompt_md: &str, meta: Option<&WaveOutputMeta>) -> bool {
    match meta {
        Some(meta) => meta.prompt_digest == prompt_digest(prompt_md),
        None => false,
    }
}
