//! Schema-driven prop normalization.
//!
//! Normalization never fails: every problem becomes a [`SchemaWarning`] next
//! to a best-effort prop map. Callers decide what to do with flagged
//! instances (the pipeline drops anything marked [`SchemaWarning::EmptyContent`]).

use super::schema::{registry, SchemaWarning};
use super::{is_truthy, ComponentKind, Props};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedProps {
    pub props: Props,
    pub warnings: Vec<SchemaWarning>,
}

impl NormalizedProps {
    pub fn is_empty_marked(&self) -> bool {
        self.warnings.iter().any(SchemaWarning::marks_empty)
    }
}

/// Resolve `raw` against the schema registered for `kind`.
pub fn normalize(kind: &ComponentKind, raw: &Props) -> NormalizedProps {
    let Some(schema) = registry().get(kind) else {
        return NormalizedProps {
            props: raw.clone(),
            warnings: vec![SchemaWarning::NoSchema(kind.to_string())],
        };
    };

    if *kind == ComponentKind::DynamicContent {
        return NormalizedProps {
            props: raw.clone(),
            warnings: Vec::new(),
        };
    }

    let mut props = schema.default_props.clone();

    for (canonical, aliases) in schema.prop_mappings {
        if let Some(value) = aliases.iter().find_map(|alias| raw.get(*alias)) {
            props.insert(canonical.to_string(), value.clone());
        }
    }

    // Unmapped author data is kept as-is.
    for (key, value) in raw {
        if !props.contains_key(key) && !schema.is_alias(key) {
            props.insert(key.clone(), value.clone());
        }
    }

    let mut warnings = Vec::new();
    if let Some(repair) = schema.repair {
        repair(&mut props, &mut warnings);
    }

    let outcome = match schema.validator {
        Some(validator) => validator(&props),
        None => schema.check_required(&props),
    };
    if !outcome.is_valid {
        warnings.extend(outcome.errors);
    }

    NormalizedProps { props, warnings }
}

/// Fold rich `subsections` into the section's `content` as headed, bulleted
/// text. `subsections` itself is left in place.
pub(crate) fn flatten_subsections(props: &mut Props, _warnings: &mut Vec<SchemaWarning>) {
    let combined = {
        let Some(Value::Array(subsections)) = props.get("subsections") else {
            return;
        };

        let mut combined = String::new();
        match props.get("content") {
            Some(Value::String(text)) => combined.push_str(text),
            Some(Value::Array(items)) => push_bullets(&mut combined, items),
            Some(Value::Object(rich)) => {
                append_rich_content(&mut combined, rich);
                if combined.is_empty() && !rich.is_empty() {
                    combined = Value::Object(rich.clone()).to_string();
                }
            }
            Some(Value::Number(n)) => combined.push_str(&n.to_string()),
            _ => {}
        }
        for subsection in subsections {
            append_subsection(&mut combined, subsection);
        }
        combined
    };

    props.insert("content".to_string(), Value::String(combined.trim().to_string()));
}

fn append_subsection(out: &mut String, subsection: &Value) {
    match subsection {
        Value::String(text) => push_bullet(out, text),
        Value::Array(items) => push_bullets(out, items),
        Value::Object(fields) => {
            if let Some(title) = fields.get("title").filter(|t| is_truthy(t)) {
                out.push_str(&format!("\n\n**{}**\n", display_text(title)));
            }
            match fields.get("content") {
                Some(Value::String(text)) => out.push_str(text),
                Some(Value::Array(items)) => push_bullets(out, items),
                Some(Value::Object(rich)) => append_rich_content(out, rich),
                _ => {}
            }
        }
        _ => {}
    }
}

fn append_rich_content(out: &mut String, rich: &Props) {
    if let Some(description) = rich.get("description").filter(|d| is_truthy(d)) {
        out.push_str(&display_text(description));
        out.push('\n');
    }

    for (key, heading) in [("keyOutcomes", "Key Outcomes:"), ("approach", "Approach:")] {
        if let Some(Value::Array(items)) = rich.get(key) {
            out.push_str(&format!("\n**{}**\n", heading));
            push_bullets(out, items);
        }
    }
}

fn push_bullets(out: &mut String, items: &[Value]) {
    for item in items {
        push_bullet(out, &display_text(item));
    }
}

fn push_bullet(out: &mut String, item: &str) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("• ");
    out.push_str(item);
    out.push('\n');
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// First truthy value among `keys`, or an empty string.
fn first_truthy(fields: &Props, keys: &[&str]) -> Value {
    keys.iter()
        .find_map(|key| fields.get(*key).filter(|v| is_truthy(v)))
        .cloned()
        .unwrap_or_else(|| json!(""))
}

/// `"Title: description"` strings become `{title, description}` objects.
pub(crate) fn structure_features(props: &mut Props, _warnings: &mut Vec<SchemaWarning>) {
    let Some(Value::Array(features)) = props.get_mut("features") else {
        return;
    };

    for feature in features.iter_mut() {
        *feature = match &*feature {
            Value::String(text) => match text.find(':') {
                Some(at) if at > 0 => json!({
                    "title": text[..at].trim(),
                    "description": text[at + 1..].trim(),
                }),
                _ => json!({"title": text.trim(), "description": ""}),
            },
            Value::Object(fields) => {
                let mut structured = fields.clone();
                structured.insert("title".to_string(), first_truthy(fields, &["title", "name"]));
                structured.insert(
                    "description".to_string(),
                    first_truthy(fields, &["description", "content"]),
                );
                Value::Object(structured)
            }
            other => other.clone(),
        };
    }
}

/// `"Name - Role"` strings become `{name, title, bio}` objects.
pub(crate) fn structure_members(props: &mut Props, _warnings: &mut Vec<SchemaWarning>) {
    let Some(Value::Array(members)) = props.get_mut("members") else {
        return;
    };

    for member in members.iter_mut() {
        *member = match &*member {
            Value::String(text) => match text.find(" - ") {
                Some(at) if at > 0 => json!({
                    "name": text[..at].trim(),
                    "title": text[at + 3..].trim(),
                    "bio": "",
                }),
                _ => json!({"name": text.trim(), "title": "", "bio": ""}),
            },
            Value::Object(fields) => {
                let mut structured = fields.clone();
                structured.insert("name".to_string(), first_truthy(fields, &["name"]));
                structured.insert(
                    "title".to_string(),
                    first_truthy(fields, &["title", "position", "role"]),
                );
                structured.insert(
                    "bio".to_string(),
                    first_truthy(fields, &["bio", "description", "about"]),
                );
                let image = first_truthy(fields, &["image", "photo"]);
                if is_truthy(&image) {
                    structured.insert("image".to_string(), image);
                }
                Value::Object(structured)
            }
            other => other.clone(),
        };
    }
}

/// Tables with rows but no headers get `Column 1..n` labels sized to the first row.
pub(crate) fn generate_table_headers(props: &mut Props, _warnings: &mut Vec<SchemaWarning>) {
    let headers_missing = match props.get("headers") {
        None | Some(Value::Null) => true,
        Some(Value::Array(headers)) => headers.is_empty(),
        Some(_) => false,
    };
    if !headers_missing {
        return;
    }

    let width = match props.get("data") {
        Some(Value::Array(rows)) => match rows.first() {
            Some(Value::Array(first_row)) => first_row.len(),
            _ => return,
        },
        _ => return,
    };

    let headers = (1..=width)
        .map(|n| Value::String(format!("Column {}", n)))
        .collect();
    props.insert("headers".to_string(), Value::Array(headers));
}
