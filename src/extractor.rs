//! Extraction of component candidates through the collaborator.
//!
//! Short documents go out in one call; long ones are split on header
//! boundaries and sent through a small pool of workers. Every successful unit
//! of work is memoized in the injected [`ResultCache`].

use crate::cache::ResultCache;
use crate::chunker::{split_into_chunks, DEFAULT_CHUNK_SIZE};
use crate::collaborator::{
    chunk_instructions, complete_with_timeout, document_instructions, ContentCollaborator,
    TokenBudget,
};
use crate::components::ComponentCandidate;
use crate::error::ExtractionError;
use crate::filter::FilteringOptions;
use crate::preprocess::preprocess;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

pub const DEFAULT_SINGLE_CALL_THRESHOLD: usize = 3000;
pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(20);

lazy_static! {
    static ref FENCE_PATTERNS: [Regex; 5] = [
        Regex::new(r"^```json\s*").unwrap(),
        Regex::new(r"^```\s*").unwrap(),
        Regex::new(r"\s*```$").unwrap(),
        Regex::new(r"^`\s*").unwrap(),
        Regex::new(r"\s*`$").unwrap(),
    ];
    static ref JSON_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ExtractedMetadata {
    fn from_reply(reply: &Value) -> Self {
        let text = |key: &str| {
            reply
                .pointer(&format!("/metadata/{}", key))
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Self {
            title: text("title"),
            description: text("description"),
            tags: reply
                .pointer("/metadata/tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                }),
        }
    }
}

/// Candidates and document metadata produced by one extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub candidates: Vec<ComponentCandidate>,
    pub metadata: ExtractedMetadata,
    pub warnings: Vec<String>,
    pub chunks_processed: Option<usize>,
}

impl ExtractionResult {
    /// Shape a parsed reply. Anything without a `components` array is
    /// rejected; bad entries inside the array are skipped with a warning.
    pub fn from_reply(reply: &Value) -> Result<Self, ExtractionError> {
        let entries = match reply.get("components") {
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(ExtractionError::Malformed(
                    "components must be an array".to_string(),
                ))
            }
            None => {
                return Err(ExtractionError::Malformed(
                    "missing components array".to_string(),
                ))
            }
        };

        let mut warnings = Vec::new();
        let candidates = entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| ComponentCandidate::from_value(index, entry, &mut warnings))
            .collect();

        Ok(Self {
            candidates,
            metadata: ExtractedMetadata::from_reply(reply),
            warnings,
            chunks_processed: None,
        })
    }
}

/// Decode a collaborator reply that should contain a JSON object, tolerating
/// code fences and surrounding prose.
pub fn parse_ai_response(reply: &str) -> Result<Value, ExtractionError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::EmptyReply);
    }

    let mut cleaned = trimmed.to_string();
    for pattern in FENCE_PATTERNS.iter() {
        cleaned = pattern.replace(&cleaned, "").into_owned();
    }

    let direct_error = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(span) = JSON_OBJECT.find(&cleaned) {
        match serde_json::from_str::<Value>(span.as_str()) {
            Ok(value) => return Ok(value),
            Err(e) => log::debug!("Embedded JSON object did not parse either: {}", e),
        }
    }

    Err(ExtractionError::InvalidJson(direct_error.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub single_call_threshold: usize,
    pub chunk_size: usize,
    pub concurrency: usize,
    pub call_timeout: Duration,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            single_call_threshold: DEFAULT_SINGLE_CALL_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

fn cache_key(tag: &str, content: &str, options: &FilteringOptions) -> String {
    format!(
        "{}:{}:{}:{}",
        tag,
        content.chars().count(),
        options.signature(),
        content
    )
}

pub struct Extractor<C> {
    collaborator: Arc<C>,
    cache: Arc<dyn ResultCache<ExtractionResult>>,
    settings: ExtractionSettings,
}

impl<C: ContentCollaborator + 'static> Extractor<C> {
    pub fn new(
        collaborator: Arc<C>,
        cache: Arc<dyn ResultCache<ExtractionResult>>,
        settings: ExtractionSettings,
    ) -> Self {
        Self {
            collaborator,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Preprocess, then pick single-call or chunked extraction by size.
    pub async fn extract(
        &self,
        markdown: &str,
        options: &FilteringOptions,
    ) -> Result<ExtractionResult, ExtractionError> {
        let cleaned = preprocess(markdown);
        let length = cleaned.chars().count();

        if length > self.settings.single_call_threshold {
            log::debug!(
                "Content is {} chars (> {}), extracting in chunks",
                length,
                self.settings.single_call_threshold
            );
            self.extract_chunks(&cleaned, options).await
        } else {
            self.extract_single("robust", &cleaned, options).await
        }
    }

    /// One call over the markdown exactly as given.
    pub async fn extract_basic(
        &self,
        markdown: &str,
        options: &FilteringOptions,
    ) -> Result<ExtractionResult, ExtractionError> {
        self.extract_single("basic", markdown, options).await
    }

    /// Preprocess and always split into chunks.
    pub async fn extract_chunked(
        &self,
        markdown: &str,
        options: &FilteringOptions,
    ) -> Result<ExtractionResult, ExtractionError> {
        self.extract_chunks(&preprocess(markdown), options).await
    }

    async fn extract_single(
        &self,
        tag: &str,
        content: &str,
        options: &FilteringOptions,
    ) -> Result<ExtractionResult, ExtractionError> {
        let key = cache_key(tag, content, options);
        if let Some(cached) = self.cache.get(&key) {
            log::debug!("Cache hit for {} extraction", tag);
            return Ok(cached);
        }

        let reply = complete_with_timeout(
            &*self.collaborator,
            document_instructions(),
            content,
            TokenBudget::Document,
            self.settings.call_timeout,
        )
        .await?;
        let result = ExtractionResult::from_reply(&parse_ai_response(&reply)?)?;

        log::info!(
            "Extracted {} candidates via {} ({})",
            result.candidates.len(),
            self.collaborator.name(),
            tag
        );
        self.cache.set(key, result.clone());
        Ok(result)
    }

    async fn extract_chunks(
        &self,
        content: &str,
        options: &FilteringOptions,
    ) -> Result<ExtractionResult, ExtractionError> {
        let chunks = Arc::new(split_into_chunks(content, self.settings.chunk_size));
        let total = chunks.len();
        if total == 0 {
            return Ok(ExtractionResult {
                chunks_processed: Some(0),
                ..ExtractionResult::default()
            });
        }

        let next = Arc::new(AtomicUsize::new(0));
        let workers = self.settings.concurrency.clamp(1, total);
        let mut pool = JoinSet::new();

        for worker in 0..workers {
            let chunks = Arc::clone(&chunks);
            let next = Arc::clone(&next);
            let collaborator = Arc::clone(&self.collaborator);
            let cache = Arc::clone(&self.cache);
            let options = options.clone();
            let timeout = self.settings.call_timeout;

            pool.spawn(async move {
                let mut finished = Vec::new();
                loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    if index >= chunks.len() {
                        break;
                    }
                    let outcome = extract_chunk(
                        &*collaborator,
                        &*cache,
                        &chunks,
                        index,
                        &options,
                        timeout,
                    )
                    .await;
                    finished.push((index, outcome));
                }
                log::debug!("Chunk worker {} handled {} chunks", worker, finished.len());
                finished
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(finished) => outcomes.extend(finished),
                Err(e) => log::error!("Chunk worker aborted: {}", e),
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let mut merged = ExtractionResult {
            chunks_processed: Some(total),
            ..ExtractionResult::default()
        };
        let mut succeeded = 0usize;

        for (index, outcome) in outcomes {
            match outcome {
                Ok(part) => {
                    succeeded += 1;
                    if index == 0 {
                        merged.metadata = part.metadata;
                    }
                    merged.candidates.extend(part.candidates);
                    merged.warnings.extend(
                        part.warnings
                            .into_iter()
                            .map(|w| format!("Chunk {}: {}", index + 1, w)),
                    );
                }
                Err(e) => {
                    log::warn!("Chunk {}/{} failed: {}", index + 1, total, e);
                    merged
                        .warnings
                        .push(format!("Chunk {}/{} failed: {}", index + 1, total, e));
                }
            }
        }

        if succeeded == 0 {
            return Err(ExtractionError::AllChunksFailed(total));
        }

        log::info!(
            "Extracted {} candidates from {}/{} chunks",
            merged.candidates.len(),
            succeeded,
            total
        );
        Ok(merged)
    }
}

async fn extract_chunk<C: ContentCollaborator>(
    collaborator: &C,
    cache: &dyn ResultCache<ExtractionResult>,
    chunks: &[String],
    index: usize,
    options: &FilteringOptions,
    timeout: Duration,
) -> Result<ExtractionResult, ExtractionError> {
    let chunk = &chunks[index];
    let key = cache_key(&format!("chunk:{}", index), chunk, options);
    if let Some(cached) = cache.get(&key) {
        log::debug!("Cache hit for chunk {}", index + 1);
        return Ok(cached);
    }

    let instructions = chunk_instructions(index, chunks.len());
    let reply =
        complete_with_timeout(collaborator, &instructions, chunk, TokenBudget::Chunk, timeout)
            .await?;
    let result = ExtractionResult::from_reply(&parse_ai_response(&reply)?)?;

    cache.set(key, result.clone());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{NoopCache, TtlCache};
    use crate::collaborator::testing::ScriptedCollaborator;
    use crate::components::ComponentKind;
    use serde_json::json;

    const REPLY: &str = r#"{"components": [{"type": "hero", "props": {"title": "Acme"}, "relevanceScore": 95}], "metadata": {"title": "Acme Corp", "tags": ["b2b"]}}"#;

    fn extractor(
        collaborator: ScriptedCollaborator,
        cache: Arc<dyn ResultCache<ExtractionResult>>,
        settings: ExtractionSettings,
    ) -> (Extractor<ScriptedCollaborator>, Arc<ScriptedCollaborator>) {
        let collaborator = Arc::new(collaborator);
        (
            Extractor::new(Arc::clone(&collaborator), cache, settings),
            collaborator,
        )
    }

    fn long_document(sections: usize) -> String {
        (0..sections)
            .map(|i| format!("## Section {}\n{}", i, "word ".repeat(120)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_parse_plain_and_fenced_replies() {
        assert_eq!(parse_ai_response(r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(
            parse_ai_response("```json\n{\"a\": 1}\n```").unwrap(),
            json!({"a": 1})
        );
        assert_eq!(parse_ai_response("```\n{\"a\": 2}\n```").unwrap(), json!({"a": 2}));
        assert_eq!(parse_ai_response("`{\"a\": 3}`").unwrap(), json!({"a": 3}));
    }

    #[test]
    fn test_parse_embedded_object() {
        let reply = "Here you go:\n{\"components\": [], \"metadata\": {}}\nHope that helps!";
        assert_eq!(
            parse_ai_response(reply).unwrap(),
            json!({"components": [], "metadata": {}})
        );
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_ai_response("   "), Err(ExtractionError::EmptyReply)));
        assert!(matches!(
            parse_ai_response("no json here"),
            Err(ExtractionError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_ai_response("{ broken: json }"),
            Err(ExtractionError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_from_reply_requires_components_array() {
        assert!(matches!(
            ExtractionResult::from_reply(&json!({"components": {"type": "hero"}})),
            Err(ExtractionError::Malformed(_))
        ));
        assert!(matches!(
            ExtractionResult::from_reply(&json!({"metadata": {}})),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_reply_skips_untyped_entries() {
        let reply = json!({
            "components": [
                {"props": {"title": "No type"}},
                {"type": "faq", "props": {"items": []}},
                {"type": "mystery-widget", "title": "Loose"}
            ],
            "metadata": {"title": "", "description": "About us"}
        });
        let result = ExtractionResult::from_reply(&reply).unwrap();
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.candidates[1].kind, ComponentKind::Unknown("mystery-widget".into()));
        assert_eq!(result.candidates[1].props["title"], json!("Loose"));
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.metadata.title, None);
        assert_eq!(result.metadata.description.as_deref(), Some("About us"));
    }

    #[tokio::test]
    async fn test_single_call_is_cached() {
        let cache: Arc<dyn ResultCache<ExtractionResult>> = Arc::new(TtlCache::<ExtractionResult>::default());
        let (extractor, collaborator) = extractor(
            ScriptedCollaborator::replying(REPLY),
            cache,
            ExtractionSettings::default(),
        );
        let options = FilteringOptions::default();

        let first = extractor.extract("# Acme\nWe build things", &options).await.unwrap();
        let second = extractor.extract("# Acme\nWe build things", &options).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.metadata.title.as_deref(), Some("Acme Corp"));
        assert_eq!(collaborator.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_cache_never_hits() {
        let cache: Arc<dyn ResultCache<ExtractionResult>> =
            Arc::new(TtlCache::<ExtractionResult>::new(Duration::ZERO));
        let (extractor, collaborator) = extractor(
            ScriptedCollaborator::replying(REPLY),
            cache,
            ExtractionSettings::default(),
        );
        let options = FilteringOptions::default();

        extractor.extract_basic("# Acme", &options).await.unwrap();
        extractor.extract_basic("# Acme", &options).await.unwrap();
        assert_eq!(collaborator.calls(), 2);
    }

    #[tokio::test]
    async fn test_single_call_failure_propagates() {
        let (extractor, _) = extractor(
            ScriptedCollaborator::replying("I could not do that."),
            Arc::new(NoopCache),
            ExtractionSettings::default(),
        );
        let result = extractor.extract("# Acme", &FilteringOptions::default()).await;
        assert!(matches!(result, Err(ExtractionError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn test_long_content_is_chunked_with_bounded_workers() {
        let settings = ExtractionSettings {
            chunk_size: 700,
            ..ExtractionSettings::default()
        };
        let (extractor, collaborator) = extractor(
            ScriptedCollaborator::new(|_, content| {
                let title = content.lines().next().unwrap_or("").trim_start_matches("## ");
                Ok(json!({
                    "components": [{"type": "info-card", "props": {"title": title}}],
                    "metadata": {"title": format!("From {}", title)}
                })
                .to_string())
            }),
            Arc::new(NoopCache),
            settings,
        );

        let result = extractor
            .extract(&long_document(8), &FilteringOptions::default())
            .await
            .unwrap();

        assert_eq!(result.chunks_processed, Some(8));
        assert_eq!(collaborator.calls(), 8);
        let titles: Vec<_> = result.candidates.iter().map(|c| c.props["title"].clone()).collect();
        let expected: Vec<_> = (0..8).map(|i| json!(format!("Section {}", i))).collect();
        assert_eq!(titles, expected);
        assert_eq!(result.metadata.title.as_deref(), Some("From Section 0"));

        let instructions = collaborator.seen_instructions();
        assert_eq!(
            instructions.iter().filter(|i| i.contains("for metadata")).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_partial_chunk_failure_is_tolerated() {
        let settings = ExtractionSettings {
            chunk_size: 700,
            ..ExtractionSettings::default()
        };
        let (extractor, _) = extractor(
            ScriptedCollaborator::new(|instructions, _| {
                if instructions.starts_with("Parse this markdown chunk (2/") {
                    Ok("not json at all".to_string())
                } else {
                    Ok(REPLY.to_string())
                }
            }),
            Arc::new(NoopCache),
            settings,
        );

        let result = extractor
            .extract_chunked(&long_document(3), &FilteringOptions::default())
            .await
            .unwrap();

        assert_eq!(result.candidates.len(), 2);
        assert!(result.warnings.iter().any(|w| w.starts_with("Chunk 2/3 failed")));
    }

    #[tokio::test]
    async fn test_all_chunks_failing_is_an_error() {
        let (extractor, _) = extractor(
            ScriptedCollaborator::failing(),
            Arc::new(NoopCache),
            ExtractionSettings::default(),
        );
        let result = extractor
            .extract_chunked(&long_document(2), &FilteringOptions::default())
            .await;
        assert!(matches!(result, Err(ExtractionError::AllChunksFailed(1))));
    }

    #[tokio::test]
    async fn test_slow_chunk_times_out() {
        let settings = ExtractionSettings {
            call_timeout: Duration::from_millis(20),
            ..ExtractionSettings::default()
        };
        let (extractor, _) = extractor(
            ScriptedCollaborator::replying(REPLY).with_delay(Duration::from_millis(300)),
            Arc::new(NoopCache),
            settings,
        );
        let result = extractor
            .extract_chunked("# Only\nchunk", &FilteringOptions::default())
            .await;
        assert!(matches!(result, Err(ExtractionError::AllChunksFailed(1))));
    }
}
