//! Static per-kind prop contracts.
//!
//! The registry is built once and shared read-only. Each schema lists the
//! canonical props of its kind, the alias names the collaborator tends to use
//! for them (first alias found wins), default values, an optional validator
//! and an optional structural repair run after alias mapping.

use super::normalizer;
use super::{is_truthy, ComponentKind, Props};
use lazy_static::lazy_static;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;

pub type Validator = fn(&Props) -> ValidationOutcome;
pub type Repair = fn(&mut Props, &mut Vec<SchemaWarning>);

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaWarning {
    NoSchema(String),
    /// The instance carries nothing displayable and should be dropped.
    EmptyContent,
    MissingRequired(&'static str),
    Invalid(String),
}

impl SchemaWarning {
    pub fn marks_empty(&self) -> bool {
        matches!(self, SchemaWarning::EmptyContent)
    }
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::NoSchema(kind) => {
                write!(f, "No schema found for component type: {}", kind)
            }
            SchemaWarning::EmptyContent => {
                f.write_str("Section is empty and should be filtered out")
            }
            SchemaWarning::MissingRequired(prop) => write!(f, "Missing required prop: {}", prop),
            SchemaWarning::Invalid(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<SchemaWarning>,
}

impl ValidationOutcome {
    fn from_errors(errors: Vec<SchemaWarning>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

pub struct ComponentSchema {
    pub kind: ComponentKind,
    pub required_props: &'static [&'static str],
    pub optional_props: &'static [&'static str],
    pub prop_mappings: &'static [(&'static str, &'static [&'static str])],
    pub default_props: Props,
    pub validator: Option<Validator>,
    pub repair: Option<Repair>,
}

impl ComponentSchema {
    fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            required_props: &[],
            optional_props: &[],
            prop_mappings: &[],
            default_props: Props::new(),
            validator: None,
            repair: None,
        }
    }

    fn required(mut self, props: &'static [&'static str]) -> Self {
        self.required_props = props;
        self
    }

    fn optional(mut self, props: &'static [&'static str]) -> Self {
        self.optional_props = props;
        self
    }

    fn mappings(mut self, mappings: &'static [(&'static str, &'static [&'static str])]) -> Self {
        self.prop_mappings = mappings;
        self
    }

    fn defaults(mut self, defaults: Value) -> Self {
        if let Value::Object(map) = defaults {
            self.default_props = map;
        }
        self
    }

    fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    fn repair(mut self, repair: Repair) -> Self {
        self.repair = Some(repair);
        self
    }

    /// True when `key` is one of the alias names of any canonical prop.
    pub fn is_alias(&self, key: &str) -> bool {
        self.prop_mappings
            .iter()
            .any(|(_, aliases)| aliases.contains(&key))
    }

    /// Generic contract check used for kinds without their own validator.
    pub fn check_required(&self, props: &Props) -> ValidationOutcome {
        let errors = self
            .required_props
            .iter()
            .filter(|prop| !props.get(**prop).is_some_and(has_value))
            .map(|prop| SchemaWarning::MissingRequired(*prop))
            .collect();
        ValidationOutcome::from_errors(errors)
    }
}

/// A prop counts as present when it is not null, not an empty string and not
/// an empty collection.
fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

const TITLE_ALIASES: &[&str] = &["title", "heading", "header", "name"];
const SHORT_TITLE_ALIASES: &[&str] = &["title", "heading", "header"];
const DESCRIPTION_ALIASES: &[&str] = &["description", "content", "text", "body"];
const ORIENTATION_ALIASES: &[&str] = &["orientation", "direction", "layout"];

fn validate_section(props: &Props) -> ValidationOutcome {
    let non_empty_list = |key: &str| {
        props
            .get(key)
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty())
    };
    let has_content = props.get("title").is_some_and(is_truthy)
        || props.get("content").is_some_and(is_truthy)
        || non_empty_list("subsections")
        || non_empty_list("items");

    if has_content {
        ValidationOutcome::from_errors(Vec::new())
    } else {
        ValidationOutcome::from_errors(vec![SchemaWarning::EmptyContent])
    }
}

fn validate_feature_list(props: &Props) -> ValidationOutcome {
    let ok = props
        .get("features")
        .and_then(Value::as_array)
        .is_some_and(|features| !features.is_empty());
    let errors = if ok {
        Vec::new()
    } else {
        vec![SchemaWarning::Invalid(
            "Features list is required and must not be empty".to_string(),
        )]
    };
    ValidationOutcome::from_errors(errors)
}

fn validate_team_grid(props: &Props) -> ValidationOutcome {
    // An empty grid is allowed; the renderer shows a placeholder.
    let errors = match props.get("members") {
        Some(Value::Array(_)) | Some(Value::Null) | None => Vec::new(),
        Some(_) => vec![SchemaWarning::Invalid(
            "Team members must be an array".to_string(),
        )],
    };
    ValidationOutcome::from_errors(errors)
}

fn validate_table(props: &Props) -> ValidationOutcome {
    let errors = if props.get("data").is_some_and(Value::is_array) {
        Vec::new()
    } else {
        vec![SchemaWarning::Invalid("Table data must be an array".to_string())]
    };
    ValidationOutcome::from_errors(errors)
}

fn validate_anything(_props: &Props) -> ValidationOutcome {
    ValidationOutcome::from_errors(Vec::new())
}

pub struct SchemaRegistry {
    schemas: Vec<ComponentSchema>,
    index: HashMap<ComponentKind, usize>,
}

impl SchemaRegistry {
    fn from_schemas(schemas: Vec<ComponentSchema>) -> Self {
        let index = schemas
            .iter()
            .enumerate()
            .map(|(i, schema)| (schema.kind.clone(), i))
            .collect();
        Self { schemas, index }
    }

    pub fn get(&self, kind: &ComponentKind) -> Option<&ComponentSchema> {
        self.index.get(kind).map(|i| &self.schemas[*i])
    }

    pub fn contains(&self, kind: &ComponentKind) -> bool {
        self.index.contains_key(kind)
    }

    /// Schemas in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentSchema> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    fn builtin() -> Self {
        use ComponentKind as K;

        Self::from_schemas(vec![
            ComponentSchema::new(K::Hero)
                .required(&["title"])
                .optional(&["subtitle", "description", "backgroundImage", "ctaText", "ctaLink"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("subtitle", &["subtitle", "subheading", "tagline"]),
                    ("description", DESCRIPTION_ALIASES),
                    ("backgroundImage", &["backgroundImage", "image", "banner"]),
                    ("ctaText", &["ctaText", "buttonText", "actionText"]),
                    ("ctaLink", &["ctaLink", "buttonLink", "actionLink", "href"]),
                ])
                .defaults(json!({"title": "Welcome", "subtitle": "", "description": ""})),
            ComponentSchema::new(K::Section)
                .optional(&["title", "content", "subsections", "items", "collapsible"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("content", &["content", "text", "body", "description"]),
                    ("subsections", &["subsections", "sections", "children"]),
                    ("items", &["items", "list", "points"]),
                    ("collapsible", &["collapsible", "expandable", "accordion"]),
                ])
                .defaults(json!({"title": "", "content": "", "collapsible": false}))
                .validator(validate_section)
                .repair(normalizer::flatten_subsections),
            ComponentSchema::new(K::FeatureList)
                .required(&["features"])
                .optional(&["title", "description", "layout"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("features", &["features", "items", "list", "services", "capabilities"]),
                    ("layout", &["layout", "style", "format"]),
                ])
                .defaults(json!({"title": "Features", "features": []}))
                .validator(validate_feature_list)
                .repair(normalizer::structure_features),
            ComponentSchema::new(K::TeamGrid)
                .optional(&["title", "description", "layout", "members"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("members", &["members", "team", "people", "staff", "teamMembers"]),
                    ("layout", &["layout", "style", "format", "columns"]),
                ])
                .defaults(json!({"title": "Our Team", "members": []}))
                .validator(validate_team_grid)
                .repair(normalizer::structure_members),
            ComponentSchema::new(K::InfoCard)
                .required(&["title"])
                .optional(&["items", "description", "icon"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("items", &["items", "content", "data", "details", "info"]),
                    ("description", &["description", "text", "body"]),
                    ("icon", &["icon", "image", "symbol"]),
                ])
                .defaults(json!({"title": "Information", "items": {}})),
            ComponentSchema::new(K::Table)
                .required(&["data"])
                .optional(&["title", "description", "responsive", "headers"])
                .mappings(&[
                    ("title", &["title", "heading", "header", "name", "caption"]),
                    ("headers", &["headers", "columns", "fields"]),
                    ("data", &["data", "rows", "content", "items"]),
                    ("description", &["description", "text", "body"]),
                    ("responsive", &["responsive", "mobile", "adaptive"]),
                ])
                .defaults(json!({"title": "", "headers": [], "data": [], "responsive": true}))
                .validator(validate_table)
                .repair(normalizer::generate_table_headers),
            ComponentSchema::new(K::ProcessSteps)
                .required(&["steps"])
                .optional(&["title", "description", "orientation"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("steps", &["steps", "items", "process", "workflow"]),
                    ("orientation", ORIENTATION_ALIASES),
                ])
                .defaults(json!({"title": "Process", "steps": [], "orientation": "vertical"})),
            ComponentSchema::new(K::StatsCard)
                .required(&["stats"])
                .optional(&["title", "description"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("stats", &["stats", "statistics", "metrics", "data", "numbers"]),
                ])
                .defaults(json!({"title": "Statistics", "stats": []})),
            ComponentSchema::new(K::LeadershipCard)
                .required(&["name"])
                .optional(&["title", "bio", "image", "email", "social"])
                .mappings(&[
                    ("name", &["name", "fullName", "person"]),
                    ("title", &["title", "position", "role", "jobTitle"]),
                    ("bio", &["bio", "biography", "description", "about"]),
                    ("image", &["image", "photo", "avatar", "picture"]),
                    ("email", &["email", "contact"]),
                    ("social", &["social", "links", "socialLinks"]),
                ])
                .defaults(json!({"name": "", "title": "", "bio": ""})),
            ComponentSchema::new(K::Pillars)
                .required(&["pillars"])
                .optional(&["title", "description"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("pillars", &["pillars", "items", "principles", "values", "foundations"]),
                ])
                .defaults(json!({"title": "Our Pillars", "pillars": []})),
            ComponentSchema::new(K::Quote)
                .required(&["text"])
                .optional(&["author", "role", "company", "image"])
                .mappings(&[
                    ("text", &["text", "quote", "content", "message"]),
                    ("author", &["author", "name", "speaker"]),
                    ("role", &["role", "title", "position"]),
                    ("company", &["company", "organization", "firm"]),
                    ("image", &["image", "photo", "avatar"]),
                ])
                .defaults(json!({"text": "", "author": "", "role": ""})),
            ComponentSchema::new(K::Testimonial)
                .required(&["text", "author"])
                .optional(&["role", "company", "image", "rating"])
                .mappings(&[
                    ("text", &["text", "testimonial", "content", "message", "review"]),
                    ("author", &["author", "name", "client"]),
                    ("role", &["role", "title", "position"]),
                    ("company", &["company", "organization", "firm"]),
                    ("image", &["image", "photo", "avatar"]),
                    ("rating", &["rating", "score", "stars"]),
                ])
                .defaults(json!({"text": "", "author": "", "role": ""})),
            ComponentSchema::new(K::Timeline)
                .required(&["events"])
                .optional(&["title", "description", "orientation"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("events", &["events", "items", "timeline", "milestones"]),
                    ("orientation", ORIENTATION_ALIASES),
                ])
                .defaults(json!({"title": "Timeline", "events": [], "orientation": "vertical"})),
            ComponentSchema::new(K::CtaSection)
                .required(&["title"])
                .optional(&["description", "buttonText", "buttonLink", "style"])
                .mappings(&[
                    ("title", &["title", "heading", "header", "callToAction"]),
                    ("description", DESCRIPTION_ALIASES),
                    ("buttonText", &["buttonText", "ctaText", "actionText", "label"]),
                    ("buttonLink", &["buttonLink", "ctaLink", "actionLink", "href"]),
                    ("style", &["style", "theme", "variant"]),
                ])
                .defaults(json!({"title": "Get Started", "buttonText": "Learn More"})),
            ComponentSchema::new(K::Faq)
                .optional(&["title", "description", "items"])
                .mappings(&[
                    ("title", SHORT_TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("items", &["items", "faqs", "questions"]),
                ])
                .defaults(json!({"title": "FAQ", "items": []})),
            ComponentSchema::new(K::FeatureHighlights)
                .required(&["highlights"])
                .optional(&["title", "description"])
                .mappings(&[
                    ("title", SHORT_TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("highlights", &["highlights", "features", "items"]),
                ])
                .defaults(json!({"title": "Highlights", "highlights": []})),
            ComponentSchema::new(K::StatsWithIcons)
                .required(&["stats"])
                .optional(&["title", "description"])
                .mappings(&[
                    ("title", SHORT_TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("stats", &["stats", "statistics", "metrics", "data"]),
                ])
                .defaults(json!({"title": "Key Stats", "stats": []})),
            ComponentSchema::new(K::StepsOverview)
                .required(&["steps"])
                .optional(&["title", "description"])
                .mappings(&[
                    ("title", SHORT_TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("steps", &["steps", "items", "process"]),
                ])
                .defaults(json!({"title": "How it works", "steps": []})),
            ComponentSchema::new(K::MediaGallery)
                .required(&["items"])
                .optional(&["title", "description"])
                .mappings(&[
                    ("title", SHORT_TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("items", &["items", "media", "images", "gallery"]),
                ])
                .defaults(json!({"title": "Gallery", "items": []})),
            ComponentSchema::new(K::Collaboration)
                .required(&["title"])
                .optional(&["content", "internalCollaboration", "clientCollaboration"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("content", &["content", "description", "text", "body"]),
                    (
                        "internalCollaboration",
                        &["internalCollaboration", "internal_collaboration", "internal"],
                    ),
                    (
                        "clientCollaboration",
                        &["clientCollaboration", "client_collaboration", "client"],
                    ),
                ])
                .defaults(json!({"title": "Collaboration", "content": ""})),
            ComponentSchema::new(K::AwardList)
                .required(&["awards"])
                .optional(&["title", "description"])
                .mappings(&[
                    ("title", TITLE_ALIASES),
                    ("description", DESCRIPTION_ALIASES),
                    ("awards", &["awards", "items", "recognitions", "achievements"]),
                ])
                .defaults(json!({"title": "Awards & Recognition", "awards": []})),
            // Catch-all: accepts any props verbatim.
            ComponentSchema::new(K::DynamicContent).validator(validate_anything),
        ])
    }
}

lazy_static! {
    static ref REGISTRY: SchemaRegistry = SchemaRegistry::builtin();
}

/// The process-wide schema registry.
pub fn registry() -> &'static SchemaRegistry {
    &REGISTRY
}
