//! Page component records
//!
//! Candidates are the loosely-shaped records produced by extraction. The
//! normalizer turns them into [`NormalizedComponent`]s whose props follow the
//! registered schema for their kind. Selection and ordering only look at the
//! envelope fields (`kind`, relevance, content type) and the textual content.

pub mod normalizer;
pub mod schema;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Untyped prop payload keyed by prop name.
pub type Props = Map<String, Value>;

/// Known component kinds. Anything else is carried as `Unknown` and passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentKind {
    Hero,
    Section,
    FeatureList,
    TeamGrid,
    InfoCard,
    Table,
    ProcessSteps,
    StatsCard,
    LeadershipCard,
    Pillars,
    Quote,
    Testimonial,
    Timeline,
    CtaSection,
    Faq,
    FeatureHighlights,
    StatsWithIcons,
    StepsOverview,
    MediaGallery,
    Collaboration,
    AwardList,
    DynamicContent,
    Unknown(String),
}

impl ComponentKind {
    pub const REGISTERED: [ComponentKind; 22] = [
        ComponentKind::Hero,
        ComponentKind::Section,
        ComponentKind::FeatureList,
        ComponentKind::TeamGrid,
        ComponentKind::InfoCard,
        ComponentKind::Table,
        ComponentKind::ProcessSteps,
        ComponentKind::StatsCard,
        ComponentKind::LeadershipCard,
        ComponentKind::Pillars,
        ComponentKind::Quote,
        ComponentKind::Testimonial,
        ComponentKind::Timeline,
        ComponentKind::CtaSection,
        ComponentKind::Faq,
        ComponentKind::FeatureHighlights,
        ComponentKind::StatsWithIcons,
        ComponentKind::StepsOverview,
        ComponentKind::MediaGallery,
        ComponentKind::Collaboration,
        ComponentKind::AwardList,
        ComponentKind::DynamicContent,
    ];

    pub fn parse(name: &str) -> Self {
        match name {
            "hero" => Self::Hero,
            "section" => Self::Section,
            "feature-list" => Self::FeatureList,
            "team-grid" => Self::TeamGrid,
            "info-card" => Self::InfoCard,
            "table" => Self::Table,
            "process-steps" => Self::ProcessSteps,
            "stats-card" => Self::StatsCard,
            "leadership-card" => Self::LeadershipCard,
            "pillars" => Self::Pillars,
            "quote" => Self::Quote,
            "testimonial" => Self::Testimonial,
            "timeline" => Self::Timeline,
            "cta-section" => Self::CtaSection,
            "faq" => Self::Faq,
            "feature-highlights" => Self::FeatureHighlights,
            "stats-with-icons" => Self::StatsWithIcons,
            "steps-overview" => Self::StepsOverview,
            "media-gallery" => Self::MediaGallery,
            "collaboration" => Self::Collaboration,
            "award-list" => Self::AwardList,
            "dynamic-content" => Self::DynamicContent,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Hero => "hero",
            Self::Section => "section",
            Self::FeatureList => "feature-list",
            Self::TeamGrid => "team-grid",
            Self::InfoCard => "info-card",
            Self::Table => "table",
            Self::ProcessSteps => "process-steps",
            Self::StatsCard => "stats-card",
            Self::LeadershipCard => "leadership-card",
            Self::Pillars => "pillars",
            Self::Quote => "quote",
            Self::Testimonial => "testimonial",
            Self::Timeline => "timeline",
            Self::CtaSection => "cta-section",
            Self::Faq => "faq",
            Self::FeatureHighlights => "feature-highlights",
            Self::StatsWithIcons => "stats-with-icons",
            Self::StepsOverview => "steps-overview",
            Self::MediaGallery => "media-gallery",
            Self::Collaboration => "collaboration",
            Self::AwardList => "award-list",
            Self::DynamicContent => "dynamic-content",
            Self::Unknown(name) => name,
        }
    }

    pub fn is_registered(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for ComponentKind {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<ComponentKind> for String {
    fn from(kind: ComponentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a component came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentSource {
    AiParsed,
    Fallback,
}

/// Extraction-stage record, not yet checked against any schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCandidate {
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub props: Props,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComponentCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

/// Keys of a raw component object that describe the envelope, never props.
const ENVELOPE_KEYS: [&str; 7] = [
    "type",
    "children",
    "props",
    "relevanceScore",
    "contentType",
    "confidence",
    "alternatives",
];

impl ComponentCandidate {
    pub fn new(kind: ComponentKind, props: Props) -> Self {
        Self {
            kind,
            props,
            children: Vec::new(),
            relevance_score: None,
            content_type: None,
            confidence: None,
            alternatives: Vec::new(),
        }
    }

    pub fn with_relevance(mut self, score: f64) -> Self {
        self.relevance_score = Some(score);
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// Build a candidate from one entry of a collaborator reply. Entries
    /// without a usable `type` are reported and skipped.
    pub fn from_value(index: usize, value: &Value, warnings: &mut Vec<String>) -> Option<Self> {
        let Some(object) = value.as_object() else {
            warnings.push(format!("Component at index {} is not an object", index));
            return None;
        };

        let kind = match object.get("type").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => ComponentKind::parse(name.trim()),
            _ => {
                warnings.push(format!("Component at index {} missing type property", index));
                return None;
            }
        };

        if !kind.is_registered() {
            warnings.push(format!("Unknown component type: {} at index {}", kind, index));
        }

        let children = object
            .get("children")
            .and_then(Value::as_array)
            .map(|children| {
                children
                    .iter()
                    .enumerate()
                    .filter_map(|(i, child)| Self::from_value(i, child, warnings))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            kind,
            props: raw_props(object),
            children,
            relevance_score: object.get("relevanceScore").and_then(number_like),
            content_type: object
                .get("contentType")
                .and_then(Value::as_str)
                .map(str::to_string),
            confidence: object.get("confidence").and_then(number_like),
            alternatives: object
                .get("alternatives")
                .and_then(Value::as_array)
                .map(|alts| {
                    alts.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

/// Props live under `props`, `content` or `data`; failing that they sit at the
/// root of the component object.
fn raw_props(object: &Map<String, Value>) -> Props {
    for key in ["props", "content", "data"] {
        if let Some(Value::Object(props)) = object.get(key) {
            if !props.is_empty() {
                return props.clone();
            }
        }
    }

    object
        .iter()
        .filter(|(key, value)| {
            !ENVELOPE_KEYS.contains(&key.as_str())
                && !(matches!(key.as_str(), "content" | "data") && value.is_object())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Numbers or numeric strings. `NaN` and infinities count as absent.
fn number_like(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub source: ComponentSource,
    pub confidence: f64,
    pub alternatives: Vec<String>,
}

/// A component whose props have been resolved against its schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedComponent {
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub props: Props,
    pub children: Vec<NormalizedComponent>,
    pub metadata: ComponentMetadata,
}

impl NormalizedComponent {
    pub fn text_prop(&self, name: &str) -> Option<&str> {
        self.props.get(name).and_then(Value::as_str)
    }
}

/// JavaScript-style truthiness, used where loosely-typed replies are probed
/// for "has something".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
