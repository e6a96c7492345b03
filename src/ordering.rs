//! Final layout ordering of normalized components.
//!
//! `rules` sorts by a fixed per-kind priority. `ai` and `hybrid` first infer a
//! layout slot for each component (with a confidence score nudged by keywords
//! in its title and description) and use the slot's priority when confident
//! enough. Every mode ends with the same guardrails: one hero, first; one CTA,
//! last.

use crate::components::{ComponentKind, NormalizedComponent};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_RULES_PRIORITY: i32 = 65;
const KEYWORD_BOOST: f64 = 0.15;

lazy_static! {
    static ref MISSION_PATTERN: Regex = Regex::new(r"mission|vision|purpose").unwrap();
    static ref SERVICES_PATTERN: Regex =
        Regex::new(r"service|capabilit|offering|product").unwrap();
    static ref PROCESS_PATTERN: Regex = Regex::new(r"process|how we work|how it works").unwrap();
    static ref ABOUT_PATTERN: Regex = Regex::new(r"about|overview|introduction").unwrap();
    static ref CONTACT_PATTERN: Regex =
        Regex::new(r"contact|get in touch|talk to|reach out").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum OrderingMode {
    Rules,
    Ai,
    #[default]
    Hybrid,
}

impl OrderingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderingMode::Rules => "rules",
            OrderingMode::Ai => "ai",
            OrderingMode::Hybrid => "hybrid",
        }
    }
}

/// Unrecognized names fall back to `Hybrid`.
impl From<String> for OrderingMode {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "rules" => OrderingMode::Rules,
            "ai" => OrderingMode::Ai,
            _ => OrderingMode::Hybrid,
        }
    }
}

impl fmt::Display for OrderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse layout role, independent of the component's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutSlot {
    Hero,
    Mission,
    Services,
    Process,
    Collaboration,
    Sections,
    Content,
    People,
    SocialProof,
    Awards,
    Cta,
}

impl LayoutSlot {
    pub fn base_priority(&self) -> i32 {
        match self {
            LayoutSlot::Hero => 10,
            LayoutSlot::Mission => 20,
            LayoutSlot::Services => 30,
            LayoutSlot::Process => 40,
            LayoutSlot::Collaboration => 50,
            LayoutSlot::Sections => 60,
            LayoutSlot::Content => 70,
            LayoutSlot::People => 80,
            LayoutSlot::SocialProof => 86,
            LayoutSlot::Awards => 90,
            LayoutSlot::Cta => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutHint {
    pub slot: LayoutSlot,
    pub confidence: f64,
}

pub fn rules_priority(kind: &ComponentKind) -> i32 {
    match kind {
        ComponentKind::Hero => 10,
        ComponentKind::Pillars => 20,
        ComponentKind::FeatureList => 30,
        ComponentKind::FeatureHighlights => 35,
        ComponentKind::StatsWithIcons => 36,
        ComponentKind::ProcessSteps => 40,
        ComponentKind::StepsOverview => 41,
        ComponentKind::Timeline => 42,
        ComponentKind::Collaboration => 50,
        ComponentKind::Section => 60,
        ComponentKind::Table => 70,
        ComponentKind::StatsCard => 71,
        ComponentKind::InfoCard => 72,
        ComponentKind::MediaGallery => 73,
        ComponentKind::DynamicContent => 75,
        ComponentKind::TeamGrid => 80,
        ComponentKind::LeadershipCard => 81,
        ComponentKind::Testimonial => 85,
        ComponentKind::Quote => 86,
        ComponentKind::AwardList => 90,
        ComponentKind::CtaSection => 100,
        _ => DEFAULT_RULES_PRIORITY,
    }
}

/// Infer the slot for one component from its kind, then raise the confidence
/// for each theme keyword found in its title (or, for contact, description).
pub fn infer_hint(component: &NormalizedComponent) -> LayoutHint {
    let (slot, mut confidence) = match component.kind {
        ComponentKind::Hero => (LayoutSlot::Hero, 0.95),
        ComponentKind::Pillars => (LayoutSlot::Mission, 0.6),
        ComponentKind::FeatureList
        | ComponentKind::FeatureHighlights
        | ComponentKind::StatsWithIcons => (LayoutSlot::Services, 0.6),
        ComponentKind::ProcessSteps | ComponentKind::StepsOverview | ComponentKind::Timeline => {
            (LayoutSlot::Process, 0.6)
        }
        ComponentKind::Collaboration => (LayoutSlot::Collaboration, 0.6),
        ComponentKind::TeamGrid | ComponentKind::LeadershipCard => (LayoutSlot::People, 0.6),
        ComponentKind::Testimonial | ComponentKind::Quote => (LayoutSlot::SocialProof, 0.6),
        ComponentKind::AwardList => (LayoutSlot::Awards, 0.6),
        ComponentKind::CtaSection => (LayoutSlot::Cta, 0.9),
        ComponentKind::Section => (LayoutSlot::Sections, 0.5),
        _ => (LayoutSlot::Content, 0.5),
    };

    let title = component.text_prop("title").unwrap_or("").to_lowercase();
    let description = component
        .text_prop("description")
        .filter(|d| !d.is_empty())
        .or_else(|| component.text_prop("content"))
        .unwrap_or("")
        .to_lowercase();

    let themes = [
        MISSION_PATTERN.is_match(&title),
        SERVICES_PATTERN.is_match(&title),
        PROCESS_PATTERN.is_match(&title),
        ABOUT_PATTERN.is_match(&title),
        CONTACT_PATTERN.is_match(&title) || description.contains("contact"),
    ];
    for matched in themes {
        if matched {
            confidence = f64::min(1.0, confidence + KEYWORD_BOOST);
        }
    }

    LayoutHint { slot, confidence }
}

fn effective_priority(component: &NormalizedComponent, mode: OrderingMode) -> i32 {
    let rules = rules_priority(&component.kind);
    if mode == OrderingMode::Rules {
        return rules;
    }

    let hint = infer_hint(component);
    let slot = hint.slot.base_priority();
    match mode {
        OrderingMode::Ai if hint.confidence >= 0.6 => slot,
        OrderingMode::Hybrid if hint.confidence >= 0.75 => slot,
        OrderingMode::Hybrid if hint.confidence >= 0.5 => {
            (f64::from(2 * rules + slot) / 3.0).round() as i32
        }
        _ => rules,
    }
}

/// Sort `components` for layout. Equal priorities keep their input order.
pub fn order(components: Vec<NormalizedComponent>, mode: OrderingMode) -> Vec<NormalizedComponent> {
    let mut keyed: Vec<(i32, usize, NormalizedComponent)> = components
        .into_iter()
        .enumerate()
        .map(|(index, component)| (effective_priority(&component, mode), index, component))
        .collect();
    keyed.sort_by_key(|(priority, index, _)| (*priority, *index));

    let sorted: Vec<NormalizedComponent> = keyed.into_iter().map(|(_, _, c)| c).collect();
    apply_guardrails(sorted)
}

/// Keep only the first hero, at the front, and only the last CTA, at the end.
pub fn apply_guardrails(components: Vec<NormalizedComponent>) -> Vec<NormalizedComponent> {
    let mut hero = None;
    let mut cta = None;
    let mut body = Vec::with_capacity(components.len());
    let mut dropped = 0usize;

    for component in components {
        match component.kind {
            ComponentKind::Hero => {
                if hero.is_none() {
                    hero = Some(component);
                } else {
                    dropped += 1;
                }
            }
            ComponentKind::CtaSection => {
                if cta.replace(component).is_some() {
                    dropped += 1;
                }
            }
            _ => body.push(component),
        }
    }

    if dropped > 0 {
        log::debug!("Layout guardrails dropped {} extra hero/CTA components", dropped);
    }

    hero.into_iter().chain(body).chain(cta).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ComponentMetadata, ComponentSource, Props};
    use serde_json::{json, Value};

    fn component(kind: &str, props: Value) -> NormalizedComponent {
        let props = match props {
            Value::Object(map) => map,
            _ => Props::new(),
        };
        NormalizedComponent {
            kind: ComponentKind::parse(kind),
            props,
            children: Vec::new(),
            metadata: ComponentMetadata {
                source: ComponentSource::AiParsed,
                confidence: 0.8,
                alternatives: Vec::new(),
            },
        }
    }

    fn kinds(components: &[NormalizedComponent]) -> Vec<&str> {
        components.iter().map(|c| c.kind.as_str()).collect()
    }

    #[test]
    fn test_rules_mode_uses_priority_table() {
        let input = vec![
            component("cta-section", json!({"title": "Go"})),
            component("team-grid", json!({"title": "Team"})),
            component("faq", json!({"title": "Questions"})),
            component("hero", json!({"title": "Welcome"})),
            component("pillars", json!({"title": "Values"})),
        ];
        let ordered = order(input, OrderingMode::Rules);
        assert_eq!(kinds(&ordered), vec!["hero", "pillars", "faq", "team-grid", "cta-section"]);
    }

    #[test]
    fn test_rules_mode_is_stable_for_ties() {
        let input = vec![
            component("section", json!({"title": "First"})),
            component("section", json!({"title": "Second"})),
            component("section", json!({"title": "Third"})),
        ];
        let ordered = order(input, OrderingMode::Rules);
        let titles: Vec<_> = ordered.iter().filter_map(|c| c.text_prop("title")).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_hint_confidence_boosts() {
        let plain = infer_hint(&component("section", json!({"title": "Our History"})));
        assert_eq!(plain.slot, LayoutSlot::Sections);
        assert!((plain.confidence - 0.5).abs() < 1e-9);

        let about = infer_hint(&component("section", json!({"title": "About our Services"})));
        assert!((about.confidence - 0.8).abs() < 1e-9);

        let contact = infer_hint(&component(
            "info-card",
            json!({"title": "Office", "content": "Contact us any time"}),
        ));
        assert_eq!(contact.slot, LayoutSlot::Content);
        assert!((contact.confidence - 0.65).abs() < 1e-9);

        let hero = infer_hint(&component(
            "hero",
            json!({"title": "Mission, services, process, about, contact"}),
        ));
        assert_eq!(hero.confidence, 1.0);
    }

    #[test]
    fn test_ai_mode_prefers_confident_slots() {
        // table: content slot (70) at 0.65 replaces rules (70).
        // faq and stats-card stay at 0.5 and keep rules priorities 65 and 71.
        let input = vec![
            component("table", json!({"title": "Service pricing"})),
            component("faq", json!({"title": "Questions"})),
            component("stats-card", json!({"title": "Numbers"})),
        ];
        let ordered = order(input, OrderingMode::Ai);
        assert_eq!(kinds(&ordered), vec!["faq", "table", "stats-card"]);
    }

    #[test]
    fn test_hybrid_blends_mid_confidence() {
        // section "Overview": confidence 0.65, blend round((2*60 + 60)/3) = 60.
        // info-card "Overview": confidence 0.65, blend round((2*72 + 70)/3) = 71.
        // stats-card: confidence 0.5, blend round((2*71 + 70)/3) = 71, ahead of info-card by index.
        let input = vec![
            component("stats-card", json!({"title": "Numbers"})),
            component("info-card", json!({"title": "Overview"})),
            component("section", json!({"title": "Overview"})),
        ];
        let ordered = order(input, OrderingMode::Hybrid);
        assert_eq!(kinds(&ordered), vec!["section", "stats-card", "info-card"]);
    }

    #[test]
    fn test_hybrid_uses_slot_when_confident() {
        let hint = infer_hint(&component("pillars", json!({"title": "Our mission"})));
        assert!(hint.confidence >= 0.75);
        assert_eq!(
            effective_priority(&component("pillars", json!({"title": "Our mission"})), OrderingMode::Hybrid),
            20
        );
        assert_eq!(
            effective_priority(&component("faq", json!({"title": "Misc"})), OrderingMode::Hybrid),
            67
        );
    }

    #[test]
    fn test_guardrails_single_hero_first_single_cta_last() {
        for mode in [OrderingMode::Rules, OrderingMode::Ai, OrderingMode::Hybrid] {
            let mut input: Vec<_> = (0..15)
                .map(|i| component("hero", json!({"title": format!("Hero {}", i)})))
                .collect();
            input.insert(3, component("cta-section", json!({"title": "Early"})));
            input.insert(0, component("faq", json!({"title": "Questions"})));
            input.push(component("cta-section", json!({"title": "Late"})));
            input.push(component("section", json!({"title": "Details"})));

            let ordered = order(input, mode);
            assert_eq!(ordered.first().map(|c| &c.kind), Some(&ComponentKind::Hero));
            assert_eq!(ordered[0].text_prop("title"), Some("Hero 0"));
            assert_eq!(ordered.iter().filter(|c| c.kind == ComponentKind::Hero).count(), 1);
            assert_eq!(ordered.last().and_then(|c| c.text_prop("title")), Some("Late"));
            assert_eq!(
                ordered.iter().filter(|c| c.kind == ComponentKind::CtaSection).count(),
                1
            );
            assert_eq!(ordered.len(), 4);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(order(Vec::new(), OrderingMode::Hybrid).is_empty());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(OrderingMode::from("AI".to_string()), OrderingMode::Ai);
        assert_eq!(OrderingMode::from("weird".to_string()), OrderingMode::Hybrid);
        let mode: OrderingMode = serde_json::from_value(json!("rules")).unwrap();
        assert_eq!(mode, OrderingMode::Rules);
        assert_eq!(serde_json::to_value(OrderingMode::Hybrid).unwrap(), json!("hybrid"));
    }
}
