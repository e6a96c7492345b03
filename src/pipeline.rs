//! Request orchestration: extraction (or the fallback parser), schema
//! normalization, selection, ordering, and the response envelope.

use crate::collaborator::ContentCollaborator;
use crate::components::normalizer::normalize;
use crate::components::{
    ComponentCandidate, ComponentMetadata, ComponentSource, NormalizedComponent,
};
use crate::config::{Config, RequestDefaults};
use crate::error::PipelineError;
use crate::extractor::{ExtractionResult, Extractor};
use crate::fallback::fallback_parse;
use crate::filter::{select, FilteringOptions, Strictness};
use crate::ordering::{order, OrderingMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_SITE_TITLE: &str = "Generated Site";
pub const DEFAULT_SITE_DESCRIPTION: &str = "AI-generated microsite from markdown content";
const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Inbound request. Omitted fields take the configured [`RequestDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseRequest {
    #[serde(default)]
    pub markdown_content: String,
    pub use_chunking: Option<bool>,
    pub use_intelligent_selection: Option<bool>,
    pub filtering_strictness: Option<Strictness>,
    pub custom_filtering_options: Option<FilteringOptions>,
    pub compact: Option<bool>,
    pub max_components: Option<usize>,
    pub ordering: Option<OrderingMode>,
}

impl ParseRequest {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown_content: markdown.into(),
            ..Self::default()
        }
    }

    /// Custom options replace the preset, but their budget may not exceed the
    /// cap of the preset they name.
    pub fn filtering_options(&self, defaults: &RequestDefaults) -> FilteringOptions {
        let base = match &self.custom_filtering_options {
            Some(custom) => custom.clone().capped_by_preset(),
            None => FilteringOptions::preset(
                self.filtering_strictness
                    .unwrap_or(defaults.filtering_strictness),
            ),
        };
        base.with_max_components(self.max_components)
    }

    pub fn strategy(&self, defaults: &RequestDefaults) -> Strategy {
        if self
            .use_intelligent_selection
            .unwrap_or(defaults.use_intelligent_selection)
        {
            Strategy::Intelligent
        } else if self.use_chunking.unwrap_or(defaults.use_chunking) {
            Strategy::Chunked
        } else {
            Strategy::Basic
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Intelligent,
    Chunked,
    Basic,
    Fallback,
    None,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Intelligent => "intelligent",
            Strategy::Chunked => "chunked",
            Strategy::Basic => "basic",
            Strategy::Fallback => "fallback",
            Strategy::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingInfo {
    pub strategy: Strategy,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering_mode: Option<OrderingMode>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_processed: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub processing_info: ProcessingInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    pub components: Vec<NormalizedComponent>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub success: bool,
    pub data: ResponseData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl StructuredResponse {
    fn failure(message: String, strategy: Strategy) -> Self {
        Self {
            success: false,
            data: ResponseData {
                components: Vec::new(),
                metadata: ResponseMetadata {
                    title: "Error".to_string(),
                    description: "Failed to parse markdown content".to_string(),
                    tags: Vec::new(),
                    processing_info: ProcessingInfo {
                        strategy,
                        fallback_used: true,
                        ordering_mode: None,
                        warnings: vec![message.clone()],
                        chunks_processed: None,
                    },
                },
            },
            errors: vec![message],
            warnings: Vec::new(),
        }
    }

    /// Drop the diagnostics, keeping components, site metadata and the
    /// processing summary.
    pub fn into_compact(self) -> CompactResponse {
        let metadata = self.data.metadata;
        CompactResponse {
            success: self.success,
            data: CompactData {
                components: self.data.components,
                metadata: CompactMetadata {
                    title: metadata.title,
                    description: metadata.description,
                    tags: metadata.tags,
                    processing_info: CompactProcessingInfo {
                        strategy: metadata.processing_info.strategy,
                        fallback_used: metadata.processing_info.fallback_used,
                        ordering_mode: metadata.processing_info.ordering_mode,
                    },
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactProcessingInfo {
    pub strategy: Strategy,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering_mode: Option<OrderingMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub processing_info: CompactProcessingInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactData {
    pub components: Vec<NormalizedComponent>,
    pub metadata: CompactMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactResponse {
    pub success: bool,
    pub data: CompactData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PipelineOutput {
    Full(StructuredResponse),
    Compact(CompactResponse),
}

impl PipelineOutput {
    pub fn success(&self) -> bool {
        match self {
            PipelineOutput::Full(response) => response.success,
            PipelineOutput::Compact(response) => response.success,
        }
    }

    pub fn components(&self) -> &[NormalizedComponent] {
        match self {
            PipelineOutput::Full(response) => &response.data.components,
            PipelineOutput::Compact(response) => &response.data.components,
        }
    }

    fn finish(response: StructuredResponse, compact: bool) -> Self {
        if compact && response.success {
            PipelineOutput::Compact(response.into_compact())
        } else {
            PipelineOutput::Full(response)
        }
    }
}

pub struct MicrositePipeline<C> {
    extractor: Extractor<C>,
    defaults: RequestDefaults,
}

impl<C: ContentCollaborator + 'static> MicrositePipeline<C> {
    pub fn new(collaborator: Arc<C>, config: &Config) -> Self {
        Self::with_extractor(
            Extractor::new(
                collaborator,
                config.build_cache(),
                config.extraction_settings(),
            ),
            config.defaults.clone(),
        )
    }

    pub fn with_extractor(extractor: Extractor<C>, defaults: RequestDefaults) -> Self {
        Self {
            extractor,
            defaults,
        }
    }

    /// Run one request end to end. Extraction failures degrade to the
    /// fallback parser; only empty input yields `success: false`.
    pub async fn process(&self, request: &ParseRequest) -> PipelineOutput {
        let compact = request.compact.unwrap_or(self.defaults.compact);
        if request.markdown_content.trim().is_empty() {
            return reject_empty_input(compact);
        }

        let options = request.filtering_options(&self.defaults);
        let ordering = request.ordering.unwrap_or(self.defaults.ordering);
        let strategy = request.strategy(&self.defaults);
        let markdown = request.markdown_content.as_str();

        log::debug!(
            "Processing {} chars with {} strategy ({} filtering, max {})",
            markdown.chars().count(),
            strategy,
            options.strictness,
            options.max_components
        );

        let outcome = match strategy {
            Strategy::Chunked => self.extractor.extract_chunked(markdown, &options).await,
            Strategy::Basic => self.extractor.extract_basic(markdown, &options).await,
            _ => self.extractor.extract(markdown, &options).await,
        };

        let mut warnings = Vec::new();
        let (extraction, strategy) = match outcome {
            Ok(extraction) => (extraction, strategy),
            Err(e) => {
                log::warn!("Extraction failed ({}), using fallback parser", e);
                warnings.push(format!("Extraction failed: {}", e));
                (fallback_parse(markdown), Strategy::Fallback)
            }
        };

        let response = assemble(extraction, strategy, &options, ordering, warnings);
        PipelineOutput::finish(response, compact)
    }
}

/// Handle a request with the deterministic parser only.
pub fn process_offline(request: &ParseRequest, defaults: &RequestDefaults) -> PipelineOutput {
    let compact = request.compact.unwrap_or(defaults.compact);
    if request.markdown_content.trim().is_empty() {
        return reject_empty_input(compact);
    }

    let options = request.filtering_options(defaults);
    let ordering = request.ordering.unwrap_or(defaults.ordering);
    let extraction = fallback_parse(&request.markdown_content);
    let response = assemble(extraction, Strategy::Fallback, &options, ordering, Vec::new());
    PipelineOutput::finish(response, compact)
}

fn reject_empty_input(compact: bool) -> PipelineOutput {
    log::warn!("Rejecting request: {}", PipelineError::EmptyInput);
    PipelineOutput::finish(
        StructuredResponse::failure(PipelineError::EmptyInput.to_string(), Strategy::None),
        compact,
    )
}

fn assemble(
    extraction: ExtractionResult,
    strategy: Strategy,
    options: &FilteringOptions,
    ordering: OrderingMode,
    mut warnings: Vec<String>,
) -> StructuredResponse {
    warnings.extend(extraction.warnings);

    let extracted = extraction.candidates.len();
    let normalized: Vec<ComponentCandidate> = extraction
        .candidates
        .into_iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            normalize_candidate(&index.to_string(), candidate, &mut warnings)
        })
        .collect();

    // The fallback parser carries no relevance information to rank by.
    let selected = if strategy == Strategy::Fallback {
        normalized
    } else {
        select(normalized, options)
    };

    let source = if strategy == Strategy::Fallback {
        ComponentSource::Fallback
    } else {
        ComponentSource::AiParsed
    };
    let components = order(
        selected
            .into_iter()
            .map(|candidate| finalize(candidate, source))
            .collect(),
        ordering,
    );

    log::info!(
        "Produced {} of {} extracted components ({} strategy, {} ordering)",
        components.len(),
        extracted,
        strategy,
        ordering
    );

    let metadata = extraction.metadata;
    StructuredResponse {
        success: true,
        data: ResponseData {
            components,
            metadata: ResponseMetadata {
                title: metadata
                    .title
                    .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string()),
                description: metadata
                    .description
                    .unwrap_or_else(|| DEFAULT_SITE_DESCRIPTION.to_string()),
                tags: metadata.tags.unwrap_or_default(),
                processing_info: ProcessingInfo {
                    strategy,
                    fallback_used: strategy == Strategy::Fallback,
                    ordering_mode: Some(ordering),
                    warnings: warnings.clone(),
                    chunks_processed: extraction.chunks_processed,
                },
            },
        },
        errors: Vec::new(),
        warnings,
    }
}

/// Apply the schema to a candidate and its children. Candidates the schema
/// marks as empty are dropped without a warning.
fn normalize_candidate(
    label: &str,
    candidate: ComponentCandidate,
    warnings: &mut Vec<String>,
) -> Option<ComponentCandidate> {
    let outcome = normalize(&candidate.kind, &candidate.props);
    warnings.extend(
        outcome
            .warnings
            .iter()
            .filter(|w| !w.marks_empty())
            .map(|w| format!("Component {} ({}): {}", label, candidate.kind, w)),
    );
    if outcome.is_empty_marked() {
        log::debug!("Dropping empty {} component {}", candidate.kind, label);
        return None;
    }

    let children = candidate
        .children
        .into_iter()
        .enumerate()
        .filter_map(|(index, child)| {
            normalize_candidate(&format!("{}.{}", label, index), child, warnings)
        })
        .collect();

    Some(ComponentCandidate {
        props: outcome.props,
        children,
        ..candidate
    })
}

fn finalize(candidate: ComponentCandidate, source: ComponentSource) -> NormalizedComponent {
    NormalizedComponent {
        kind: candidate.kind,
        props: candidate.props,
        children: candidate
            .children
            .into_iter()
            .map(|child| finalize(child, source))
            .collect(),
        metadata: ComponentMetadata {
            source,
            confidence: candidate.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            alternatives: candidate.alternatives,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoopCache;
    use crate::collaborator::testing::ScriptedCollaborator;
    use crate::components::ComponentKind;
    use crate::extractor::ExtractionSettings;
    use serde_json::{json, Value};

    fn pipeline(collaborator: ScriptedCollaborator) -> MicrositePipeline<ScriptedCollaborator> {
        let extractor = Extractor::new(
            Arc::new(collaborator),
            Arc::new(NoopCache),
            ExtractionSettings::default(),
        );
        MicrositePipeline::with_extractor(extractor, RequestDefaults::default())
    }

    fn full(request: ParseRequest) -> ParseRequest {
        ParseRequest {
            compact: Some(false),
            ..request
        }
    }

    fn expect_full(output: PipelineOutput) -> StructuredResponse {
        match output {
            PipelineOutput::Full(response) => response,
            PipelineOutput::Compact(_) => panic!("expected the full envelope"),
        }
    }

    fn site_reply() -> String {
        json!({
            "components": [
                {"type": "cta-section", "props": {"title": "Talk to us", "buttonText": "Contact"}, "relevanceScore": 90},
                {"type": "quote", "props": {"text": "We deliver excellence"}, "relevanceScore": 80},
                {"type": "testimonial", "props": {"quote": "We deliver excellence!"}, "relevanceScore": 75},
                {"type": "hero", "props": {"heading": "Acme"}, "relevanceScore": 95},
                {"type": "section", "props": {}, "relevanceScore": 99},
                {"type": "hero", "props": {"title": "Second hero"}, "relevanceScore": 94},
                {"type": "pillars", "props": {"title": "Our mission", "pillars": [{"title": "Care"}]}, "relevanceScore": 85},
                {"type": "mystery-widget", "props": {"title": "Odd"}, "relevanceScore": 70}
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_empty_markdown_is_rejected() {
        let pipeline = pipeline(ScriptedCollaborator::replying("{}"));
        let response = expect_full(pipeline.process(&ParseRequest::new("  \n ")).await);

        assert!(!response.success);
        assert!(response.data.components.is_empty());
        assert_eq!(response.errors, vec!["Markdown content is required".to_string()]);
        assert_eq!(response.data.metadata.processing_info.strategy, Strategy::None);
    }

    #[tokio::test]
    async fn test_failed_extraction_falls_back() {
        let collaborator = ScriptedCollaborator::replying("Sorry, I cannot help with that.");
        let pipeline = pipeline(collaborator);
        let response =
            expect_full(pipeline.process(&full(ParseRequest::new("# Hello\nWorld text"))).await);

        assert!(response.success);
        let info = &response.data.metadata.processing_info;
        assert_eq!(info.strategy, Strategy::Fallback);
        assert!(info.fallback_used);
        assert_eq!(response.data.metadata.title, "Document");

        assert_eq!(response.data.components.len(), 1);
        let section = &response.data.components[0];
        assert_eq!(section.kind, ComponentKind::Section);
        assert_eq!(section.text_prop("title"), Some("Hello"));
        assert_eq!(section.text_prop("content"), Some("World text"));
        assert_eq!(section.metadata.source, ComponentSource::Fallback);
    }

    #[tokio::test]
    async fn test_malformed_reply_shape_falls_back() {
        let pipeline = pipeline(ScriptedCollaborator::replying(r#"{"components": "none"}"#));
        let response = expect_full(pipeline.process(&full(ParseRequest::new("# A\nb"))).await);
        assert_eq!(response.data.metadata.processing_info.strategy, Strategy::Fallback);
    }

    #[tokio::test]
    async fn test_full_flow_filters_and_orders() {
        let pipeline = pipeline(ScriptedCollaborator::new(|_, _| Ok(site_reply())));
        let request = ParseRequest {
            filtering_strictness: Some(Strictness::Lenient),
            ordering: Some(OrderingMode::Rules),
            ..full(ParseRequest::new("# Acme\nWe build things."))
        };
        let response = expect_full(pipeline.process(&request).await);

        let kinds: Vec<&str> = response
            .data
            .components
            .iter()
            .map(|c| c.kind.as_str())
            .collect();
        assert_eq!(kinds, vec!["hero", "pillars", "mystery-widget", "quote", "cta-section"]);

        let hero = &response.data.components[0];
        assert_eq!(hero.text_prop("title"), Some("Acme"));
        assert_eq!(hero.metadata.source, ComponentSource::AiParsed);
        assert_eq!(hero.metadata.confidence, 0.8);

        let metadata = &response.data.metadata;
        assert_eq!(metadata.title, DEFAULT_SITE_TITLE);
        assert_eq!(metadata.description, DEFAULT_SITE_DESCRIPTION);
        assert!(metadata.tags.is_empty());
        assert_eq!(metadata.processing_info.strategy, Strategy::Intelligent);
        assert!(!metadata.processing_info.fallback_used);

        assert!(response
            .warnings
            .iter()
            .any(|w| w == "Component 7 (mystery-widget): No schema found for component type: mystery-widget"));
        assert!(!response.warnings.iter().any(|w| w.contains("Section is empty")));
    }

    #[tokio::test]
    async fn test_compact_envelope_shape() {
        let pipeline = pipeline(ScriptedCollaborator::new(|_, _| Ok(site_reply())));
        let output = pipeline.process(&ParseRequest::new("# Acme\nWe build things.")).await;
        assert!(matches!(output, PipelineOutput::Compact(_)));

        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["success"], json!(true));
        assert!(value.get("warnings").is_none());
        assert_eq!(
            value["data"]["metadata"]["processingInfo"],
            json!({"strategy": "intelligent", "fallbackUsed": false, "orderingMode": "hybrid"})
        );
        let first = &value["data"]["components"][0];
        assert_eq!(first["type"], json!("hero"));
        assert_eq!(first["metadata"]["source"], json!("ai-parsed"));
    }

    #[tokio::test]
    async fn test_requested_budget_is_clamped() {
        let components: Vec<Value> = (0..20)
            .map(|i| {
                json!({
                    "type": "info-card",
                    "props": {"title": format!("Card {}", i), "content": format!("Body {}", i)},
                    "relevanceScore": 90
                })
            })
            .collect();
        let reply = json!({"components": components}).to_string();
        let pipeline = pipeline(ScriptedCollaborator::replying(&reply));

        let request = ParseRequest {
            custom_filtering_options: Some(
                serde_json::from_value(json!({"maxComponents": 100})).unwrap(),
            ),
            ..ParseRequest::new("# Cards")
        };
        let output = pipeline.process(&request).await;
        assert_eq!(output.components().len(), 12);

        let request = ParseRequest {
            max_components: Some(2),
            ..ParseRequest::new("# Cards")
        };
        let output = pipeline.process(&request).await;
        assert_eq!(output.components().len(), 4);
    }

    #[tokio::test]
    async fn test_strategy_flags() {
        let reply = r#"{"components": [{"type": "faq", "props": {"title": "Q", "items": [{"question": "Why?", "answer": "Because."}]}}]}"#;
        let pipeline = pipeline(ScriptedCollaborator::replying(reply));

        let chunked = ParseRequest {
            use_intelligent_selection: Some(false),
            use_chunking: Some(true),
            ..full(ParseRequest::new("# One\nfirst\n# Two\nsecond"))
        };
        let response = expect_full(pipeline.process(&chunked).await);
        assert_eq!(response.data.metadata.processing_info.strategy, Strategy::Chunked);
        assert_eq!(response.data.metadata.processing_info.chunks_processed, Some(1));

        let basic = ParseRequest {
            use_intelligent_selection: Some(false),
            ..full(ParseRequest::new("# One\nfirst"))
        };
        let response = expect_full(pipeline.process(&basic).await);
        assert_eq!(response.data.metadata.processing_info.strategy, Strategy::Basic);
        assert_eq!(response.data.metadata.processing_info.chunks_processed, None);
    }

    #[tokio::test]
    async fn test_children_are_normalized() {
        let reply = json!({
            "components": [{
                "type": "info-card",
                "props": {"title": "Parent", "content": "Body"},
                "children": [
                    {"type": "quote", "props": {"quote": "Nested words"}},
                    {"type": "section", "props": {}}
                ],
                "confidence": 0.6,
                "alternatives": ["section"]
            }]
        })
        .to_string();
        let pipeline = pipeline(ScriptedCollaborator::replying(&reply));
        let output = pipeline.process(&ParseRequest::new("# Parent\nBody")).await;

        let parent = &output.components()[0];
        assert_eq!(parent.metadata.confidence, 0.6);
        assert_eq!(parent.metadata.alternatives, vec!["section".to_string()]);
        assert_eq!(parent.children.len(), 1);
        assert_eq!(parent.children[0].text_prop("text"), Some("Nested words"));
    }

    #[test]
    fn test_offline_processing_uses_fallback_parser() {
        let request = ParseRequest {
            ordering: Some(OrderingMode::Ai),
            ..ParseRequest::new("intro\n# Hello\nWorld text\n## Next\nMore")
        };
        let output = process_offline(&request, &RequestDefaults::default());
        assert!(output.success());

        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["data"]["metadata"]["title"], json!("Document"));
        assert_eq!(value["data"]["metadata"]["tags"], json!(["document"]));
        assert_eq!(value["data"]["metadata"]["processingInfo"]["fallbackUsed"], json!(true));
        assert_eq!(output.components().len(), 2);
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: ParseRequest = serde_json::from_value(json!({
            "markdownContent": "# Hi",
            "useChunking": true,
            "filteringStrictness": "strict",
            "ordering": "sideways",
            "maxComponents": 6
        }))
        .unwrap();

        assert_eq!(request.use_chunking, Some(true));
        assert_eq!(request.ordering, Some(OrderingMode::Hybrid));
        let options = request.filtering_options(&RequestDefaults::default());
        assert_eq!(options.strictness, Strictness::Strict);
        assert_eq!(options.max_components, 6);
        assert_eq!(request.strategy(&RequestDefaults::default()), Strategy::Intelligent);
    }
}
