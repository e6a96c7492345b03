//! Relevance-based selection of component candidates.
//!
//! Candidates below the relevance floor or in an excluded content type are
//! dropped, the rest ranked by relevance (plus a bonus for prioritized content
//! types) and admitted greedily: first one candidate per kind, then further
//! candidates while budget remains. Per-kind caps and content-signature
//! deduplication apply in both passes.

use crate::components::{ComponentCandidate, ComponentKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Smallest budget a request may ask for.
pub const MIN_COMPONENTS: usize = 4;

const PRIORITY_BONUS: f64 = 10.0;

/// Hard per-kind limits. Kinds not listed are unbounded.
const TYPE_CAPS: [(ComponentKind, usize); 4] = [
    (ComponentKind::Hero, 1),
    (ComponentKind::Section, 2),
    (ComponentKind::Quote, 2),
    (ComponentKind::Testimonial, 2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Strictness {
    Strict,
    #[default]
    Moderate,
    Lenient,
}

impl Strictness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strictness::Strict => "strict",
            Strictness::Moderate => "moderate",
            Strictness::Lenient => "lenient",
        }
    }
}

/// Unrecognized names fall back to `Moderate`.
impl From<String> for Strictness {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "strict" => Strictness::Strict,
            "lenient" => Strictness::Lenient,
            _ => Strictness::Moderate,
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilteringOptions {
    pub strictness: Strictness,
    pub min_relevance_score: f64,
    pub max_components: usize,
    pub prioritize_content_types: BTreeSet<String>,
    pub exclude_content_types: BTreeSet<String>,
}

impl FilteringOptions {
    pub fn preset(strictness: Strictness) -> Self {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();

        match strictness {
            Strictness::Strict => Self {
                strictness,
                min_relevance_score: 75.0,
                max_components: 8,
                prioritize_content_types: set(&["core-business", "leadership", "services", "contact"]),
                exclude_content_types: set(&["background", "process", "other"]),
            },
            Strictness::Moderate => Self {
                strictness,
                min_relevance_score: 60.0,
                max_components: 12,
                prioritize_content_types: set(&[
                    "core-business",
                    "leadership",
                    "services",
                    "contact",
                    "awards",
                ]),
                exclude_content_types: set(&["background"]),
            },
            Strictness::Lenient => Self {
                strictness,
                min_relevance_score: 40.0,
                max_components: 20,
                prioritize_content_types: BTreeSet::new(),
                exclude_content_types: BTreeSet::new(),
            },
        }
    }

    /// Apply a per-request budget. The result never exceeds these options' own
    /// cap and never drops below [`MIN_COMPONENTS`]; zero means "not requested".
    pub fn with_max_components(mut self, requested: Option<usize>) -> Self {
        let requested = requested
            .filter(|n| *n > 0)
            .unwrap_or(self.max_components);
        self.max_components = MIN_COMPONENTS.max(self.max_components.min(requested));
        self
    }

    /// Clamp a caller-supplied budget to the cap of this strictness's preset.
    pub fn capped_by_preset(mut self) -> Self {
        let cap = Self::preset(self.strictness).max_components;
        self.max_components = MIN_COMPONENTS.max(self.max_components.min(cap));
        self
    }

    /// Short fingerprint used in cache keys.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.strictness, self.max_components)
    }

    fn combined_score(&self, candidate: &ComponentCandidate) -> f64 {
        let bonus = match &candidate.content_type {
            Some(content_type) if self.prioritize_content_types.contains(content_type) => {
                PRIORITY_BONUS
            }
            _ => 0.0,
        };
        finite_score(candidate).unwrap_or(0.0) + bonus
    }

    fn admits(&self, candidate: &ComponentCandidate) -> bool {
        if let Some(score) = finite_score(candidate) {
            if score < self.min_relevance_score {
                return false;
            }
        }
        match &candidate.content_type {
            Some(content_type) => !self.exclude_content_types.contains(content_type),
            None => true,
        }
    }
}

impl Default for FilteringOptions {
    fn default() -> Self {
        Self::preset(Strictness::Moderate)
    }
}

/// Relevance set by hand can still be non-finite; treat it as unscored.
fn finite_score(candidate: &ComponentCandidate) -> Option<f64> {
    candidate.relevance_score.filter(|score| score.is_finite())
}

pub fn type_cap(kind: &ComponentKind) -> Option<usize> {
    TYPE_CAPS
        .iter()
        .find(|(capped, _)| capped == kind)
        .map(|(_, cap)| *cap)
}

/// Lowercased, punctuation-free, whitespace-collapsed text of every string or
/// number in the candidate's props. Empty when the props carry no text.
pub fn content_signature(candidate: &ComponentCandidate) -> String {
    let mut text = String::new();
    for value in candidate.props.values() {
        collect_text(value, &mut text);
    }
    normalize_signature(&text)
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Number(n) => {
            out.push_str(&n.to_string());
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, out)),
        Value::Object(fields) => fields.values().for_each(|field| collect_text(field, out)),
        Value::Bool(_) | Value::Null => {}
    }
}

fn normalize_signature(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .replace("\\n", " ")
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Admission<'a> {
    signatures: Vec<String>,
    kept: Vec<usize>,
    taken: Vec<bool>,
    counts: HashMap<&'a ComponentKind, usize>,
    seen_signatures: HashSet<String>,
}

impl<'a> Admission<'a> {
    fn try_admit(&mut self, index: usize, kind: &'a ComponentKind, first_of_kind_only: bool) -> bool {
        if self.taken[index] {
            return false;
        }

        let count = self.counts.get(kind).copied().unwrap_or(0);
        if first_of_kind_only && count > 0 {
            return false;
        }
        if type_cap(kind).is_some_and(|cap| count >= cap) {
            return false;
        }

        let signature = &self.signatures[index];
        if !signature.is_empty() && self.seen_signatures.contains(signature) {
            return false;
        }

        if !signature.is_empty() {
            self.seen_signatures.insert(signature.clone());
        }
        self.counts.insert(kind, count + 1);
        self.taken[index] = true;
        self.kept.push(index);
        true
    }
}

/// Pick at most `options.max_components` candidates, spreading across kinds
/// before repeating any. Deterministic for identical input.
pub fn select(candidates: Vec<ComponentCandidate>, options: &FilteringOptions) -> Vec<ComponentCandidate> {
    let mut ranked: Vec<ComponentCandidate> = candidates
        .into_iter()
        .filter(|candidate| options.admits(candidate))
        .collect();

    // sort_by is stable, so equal scores keep their extraction order.
    ranked.sort_by(|a, b| options.combined_score(b).total_cmp(&options.combined_score(a)));

    let budget = options.max_components;
    let kept = {
        let mut admission = Admission {
            signatures: ranked.iter().map(content_signature).collect(),
            kept: Vec::new(),
            taken: vec![false; ranked.len()],
            counts: HashMap::new(),
            seen_signatures: HashSet::new(),
        };

        for first_of_kind_only in [true, false] {
            for (index, candidate) in ranked.iter().enumerate() {
                if admission.kept.len() >= budget {
                    break;
                }
                admission.try_admit(index, &candidate.kind, first_of_kind_only);
            }
        }
        admission.kept
    };

    log::debug!(
        "Selected {} of {} ranked candidates (budget {})",
        kept.len(),
        ranked.len(),
        budget
    );

    let mut slots: Vec<Option<ComponentCandidate>> = ranked.into_iter().map(Some).collect();
    kept.into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}
