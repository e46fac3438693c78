//! Atomic write primitives: write to a sibling temp file, then rename.
//!
//! Rename is atomic within a filesystem, so readers never observe a
//! partially written file. `ensure_dir` and `append_jsonl` round out the
//! small set of filesystem operations every writer in the crate uses.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let pid = std::process::id();
    let ts = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    path.with_file_name(format!("{file_name}.tmp.{pid}.{ts}"))
}

/// Create `dir` and all of its ancestors if they don't already exist.
pub fn ensure_dir(dir: &Path) -> CoreResult<()> {
    fs::create_dir_all(dir).map_err(|e| CoreError::WriteFailed {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = tmp_path(path);
    {
        let mut f = File::create(&tmp).map_err(|e| CoreError::WriteFailed {
            path: tmp.clone(),
            reason: e.to_string(),
        })?;
        f.write_all(bytes).map_err(|e| CoreError::WriteFailed {
            path: tmp.clone(),
            reason: e.to_string(),
        })?;
        f.sync_all().map_err(|e| CoreError::WriteFailed {
            path: tmp.clone(),
            reason: e.to_string(),
        })?;
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        CoreError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Write `text` atomically.
pub fn atomic_write_text(path: &Path, text: &str) -> CoreResult<()> {
    write_atomic(path, text.as_bytes())
}

/// Append one compact, `\n`-terminated JSON object to a JSONL file.
///
/// This is the one writer in the crate that is not itself atomic at the
/// file level (it's an `O_APPEND` write), which is acceptable because the
/// audit log and run ledger are append-only and tolerant of a torn final
/// line on crash — readers skip a line that fails to parse as JSON.
pub fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CoreError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    f.write_all(line.as_bytes())
        .map_err(|e| CoreError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
