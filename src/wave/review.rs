//! Wave review: runs output validation for every perspective in a wave and
//! builds bounded retry directives for the ones that fail.

use crate::error::{CoreError, CoreResult};
use crate::model::perspectives::PerspectivesFile;
use crate::model::wave::{
    PerspectiveReview, RetryDirective, WaveFailureCode, WaveReview, WAVE_REVIEW_SCHEMA_VERSION,
};
use crate::wave::output::validate_output;

pub const DEFAULT_MAX_FAILURES: u32 = 25;

fn failure_code_and_note(err: &CoreError) -> (WaveFailureCode, String) {
    match err {
        CoreError::MissingRequiredSection { heading, .. } => (
            WaveFailureCode::MissingRequiredSection,
            format!("add the missing `## {heading}` section"),
        ),
        CoreError::TooManyWords { words, max, .. } => (
            WaveFailureCode::TooManyWords,
            format!("trim the output from {words} words to at most {max}"),
        ),
        CoreError::MalformedSources { line, .. } => (
            WaveFailureCode::MalformedSources,
            format!("fix malformed source line: {line}"),
        ),
        CoreError::TooManySources { sources, max, .. } => (
            WaveFailureCode::TooManySources,
            format!("reduce sources from {sources} to at most {max}"),
        ),
        _ => (WaveFailureCode::MissingRequiredSection, "unclassified failure".to_string()),
    }
}

/// One `(perspective_id, markdown_path, markdown_text)` tuple per ingested
/// wave output. Perspectives with no matching entry are treated as missing
/// and fail the same as a validation error.
pub fn build_review(
    wave: u32,
    perspectives: &PerspectivesFile,
    outputs: &[(String, String, String)],
    max_failures: u32,
) -> WaveReview {
    let mut reviews = Vec::new();
    let mut retry_directives = Vec::new();
    let mut failure_count = 0u32;

    for perspective in perspectives.sorted_by_id() {
        let found = outputs.iter().find(|(id, _, _)| id == &perspective.id);
        let Some((_, path, markdown)) = found else {
            reviews.push(PerspectiveReview {
                perspective_id: perspective.id.clone(),
                passed: false,
                failure_codes: vec![WaveFailureCode::MissingRequiredSection],
                words: 0,
                sources: 0,
            });
            if failure_count < max_failures {
                retry_directives.push(RetryDirective {
                    perspective_id: perspective.id.clone(),
                    action: "retry".to_string(),
                    change_note: "no output was ingested for this perspective".to_string(),
                    blocking_error_code: WaveFailureCode::MissingRequiredSection,
                    consumed_at: None,
                });
                failure_count += 1;
            }
            continue;
        };

        match validate_output(&perspective.id, path, markdown, &perspective.prompt_contract) {
            Ok(report) => reviews.push(PerspectiveReview {
                perspective_id: perspective.id.clone(),
                passed: true,
                failure_codes: vec![],
                words: report.words,
                sources: report.sources,
            }),
            Err(err) => {
                let (code, note) = failure_code_and_note(&err);
                reviews.push(PerspectiveReview {
                    perspective_id: perspective.id.clone(),
                    passed: false,
                    failure_codes: vec![code],
                    words: 0,
                    sources: 0,
                });
                if failure_count < max_failures {
                    retry_directives.push(RetryDirective {
                        perspective_id: perspective.id.clone(),
                        action: "retry".to_string(),
                        change_note: note,
                        blocking_error_code: code,
                        consumed_at: None,
                    });
                    failure_count += 1;
                }
            }
        }
    }

    WaveReview {
        schema_version: WAVE_REVIEW_SCHEMA_VERSION.to_string(),
        wave,
        reviews,
        retry_directives,
    }
}
