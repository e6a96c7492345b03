//! Deterministic header-split parser used when extraction is unavailable.

use crate::components::{ComponentCandidate, ComponentKind, Props};
use crate::extractor::{ExtractedMetadata, ExtractionResult};
use serde_json::Value;

pub const FALLBACK_TITLE: &str = "Document";
pub const FALLBACK_DESCRIPTION: &str = "Parsed document content";
pub const FALLBACK_TAG: &str = "document";

/// Turn every `#` line into a `section` candidate whose content is the
/// non-blank lines up to the next header. Text before the first header is
/// discarded.
pub fn fallback_parse(markdown: &str) -> ExtractionResult {
    let mut candidates = Vec::new();
    let mut current: Option<(&str, Vec<&str>)> = None;

    for line in markdown.split('\n') {
        if line.starts_with('#') {
            if let Some((title, body)) = current.take() {
                candidates.push(section(title, &body));
            }
            current = Some((line.trim_start_matches('#').trim(), Vec::new()));
        } else if !line.trim().is_empty() {
            if let Some((_, body)) = current.as_mut() {
                body.push(line);
            }
        }
    }
    if let Some((title, body)) = current {
        candidates.push(section(title, &body));
    }

    log::debug!("Fallback parser produced {} sections", candidates.len());

    ExtractionResult {
        candidates,
        metadata: ExtractedMetadata {
            title: Some(FALLBACK_TITLE.to_string()),
            description: Some(FALLBACK_DESCRIPTION.to_string()),
            tags: Some(vec![FALLBACK_TAG.to_string()]),
        },
        ..ExtractionResult::default()
    }
}

fn section(title: &str, body: &[&str]) -> ComponentCandidate {
    let mut props = Props::new();
    props.insert("title".to_string(), Value::String(title.to_string()));
    props.insert(
        "content".to_string(),
        Value::String(body.join("\n").trim().to_string()),
    );
    ComponentCandidate::new(ComponentKind::Section, props)
}
