//! Rule-set parsing and exhaustive validation.
//!
//! Validation walks the whole document and collects every problem it finds
//! before deciding. A document is either accepted as a whole or rejected with
//! the complete list of problems; nothing partially built escapes.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};

use super::schema::{RuleDocument, REQUIRED_SECTIONS};
use super::RuleSetError;

/// Parse and validate a rule-set document from JSON text.
///
/// Duplicate keys are detected on the raw text, since they are lost once the
/// document has been parsed into a map.
///
/// # Errors
///
/// Returns [`RuleSetError::Invalid`] listing every problem found.
pub fn parse_document(text: &str, origin: &str) -> Result<(Value, RuleDocument), RuleSetError> {
    let mut problems = Vec::new();

    match find_duplicate_keys(text) {
        Ok(duplicates) => {
            for key in duplicates {
                problems.push(format!("duplicate name '{}'", key));
            }
        }
        Err(e) => {
            return Err(RuleSetError::invalid(
                origin,
                vec![format!("malformed JSON: {}", e)],
            ));
        }
    }

    let value: Value = serde_json::from_str(text).map_err(|e| {
        RuleSetError::invalid(origin, vec![format!("malformed JSON: {}", e)])
    })?;

    problems.extend(validate_value(&value));
    if !problems.is_empty() {
        return Err(RuleSetError::invalid(origin, problems));
    }

    let document = into_document(&value, origin)?;
    Ok((value, document))
}

/// Validate an already-parsed document value.
///
/// # Errors
///
/// Returns [`RuleSetError::Invalid`] listing every problem found.
pub fn validate_document(value: &Value, origin: &str) -> Result<RuleDocument, RuleSetError> {
    let problems = validate_value(value);
    if !problems.is_empty() {
        return Err(RuleSetError::invalid(origin, problems));
    }
    into_document(value, origin)
}

fn into_document(value: &Value, origin: &str) -> Result<RuleDocument, RuleSetError> {
    serde_json::from_value(value.clone())
        .map_err(|e| RuleSetError::invalid(origin, vec![format!("schema mismatch: {}", e)]))
}

/// Collect every structural problem in a rule-set document.
#[must_use]
pub fn validate_value(value: &Value) -> Vec<String> {
    let mut problems = Vec::new();

    let Some(root) = value.as_object() else {
        problems.push("document root must be an object".to_string());
        return problems;
    };

    for section in REQUIRED_SECTIONS {
        if !root.contains_key(section) {
            problems.push(format!("missing required section: {}", section));
        }
    }

    if let Some(categories) = section_object(root, "categories", &mut problems) {
        for (name, entry) in categories {
            let ctx = format!("category '{}'", name);
            let Some(entry) = entry_object(entry, &ctx, &mut problems) else {
                continue;
            };
            check_triggers(entry.get("patterns"), &ctx, &mut problems);
            match entry.get("priority") {
                Some(Value::Number(n)) if n.is_u64() => {
                    if n.as_u64().is_some_and(|p| p > u64::from(u32::MAX)) {
                        problems.push(format!("{}: priority is out of range", ctx));
                    }
                }
                Some(Value::Number(n)) if n.is_i64() => {
                    problems.push(format!("{}: priority must not be negative", ctx));
                }
                _ => problems.push(format!("{}: priority must be an integer", ctx)),
            }
            check_optional_string(entry.get("description"), &ctx, "description", &mut problems);
        }
    }

    if let Some(franchises) = section_object(root, "franchises", &mut problems) {
        for (name, entry) in franchises {
            let ctx = format!("franchise '{}'", name);
            let Some(entry) = entry_object(entry, &ctx, &mut problems) else {
                continue;
            };
            check_triggers(entry.get("patterns"), &ctx, &mut problems);
            check_optional_strings(entry.get("aliases"), &ctx, "aliases", &mut problems);
            check_optional_strings(
                entry.get("related_categories"),
                &ctx,
                "related_categories",
                &mut problems,
            );
        }
    }

    if let Some(creators) = section_object(root, "creators", &mut problems) {
        for (name, entry) in creators {
            let ctx = format!("creator '{}'", name);
            let Some(entry) = entry_object(entry, &ctx, &mut problems) else {
                continue;
            };
            check_triggers(entry.get("patterns"), &ctx, &mut problems);
            check_optional_bool(entry.get("always_tag"), &ctx, "always_tag", &mut problems);
            check_optional_bool(entry.get("trusted"), &ctx, "trusted", &mut problems);
        }
    }

    if let Some(specials) = section_object(root, "special_patterns", &mut problems) {
        for (name, entry) in specials {
            let ctx = format!("special pattern '{}'", name);
            let Some(entry) = entry_object(entry, &ctx, &mut problems) else {
                continue;
            };
            check_triggers(entry.get("patterns"), &ctx, &mut problems);
            check_optional_bool(
                entry.get("override_category"),
                &ctx,
                "override_category",
                &mut problems,
            );
        }
    }

    if let Some(tag_rules) = section_object(root, "tag_rules", &mut problems) {
        match tag_rules.get("auto_tags") {
            None => {}
            Some(Value::Object(auto_tags)) => {
                for (tag, triggers) in auto_tags {
                    check_triggers(Some(triggers), &format!("auto tag '{}'", tag), &mut problems);
                }
            }
            Some(_) => problems.push("tag_rules.auto_tags must be an object".to_string()),
        }
        match tag_rules.get("content_based_tags") {
            None => {}
            Some(Value::Object(content_tags)) => {
                for (tag, entry) in content_tags {
                    let ctx = format!("content tag '{}'", tag);
                    if let Some(entry) = entry_object(entry, &ctx, &mut problems) {
                        check_triggers(entry.get("file_contains"), &ctx, &mut problems);
                    }
                }
            }
            Some(_) => {
                problems.push("tag_rules.content_based_tags must be an object".to_string());
            }
        }
    }

    if let Some(naming) = section_object(root, "naming_patterns", &mut problems) {
        for key in ["version", "technical_specs", "nsfw_indicators"] {
            let ctx = format!("naming pattern '{}'", key);
            let Some(entry) = naming.get(key) else {
                problems.push(format!("{}: missing", ctx));
                continue;
            };
            let Some(entry) = entry_object(entry, &ctx, &mut problems) else {
                continue;
            };
            match entry.get("regex") {
                Some(Value::String(pattern)) => match Regex::new(pattern) {
                    Ok(re) => {
                        if key == "version" && re.captures_len() < 2 {
                            problems.push(format!("{}: regex needs a capture group", ctx));
                        }
                    }
                    Err(e) => problems.push(format!("{}: invalid regex: {}", ctx, e)),
                },
                _ => problems.push(format!("{}: regex must be a string", ctx)),
            }
        }
    }

    problems
}

fn section_object<'a>(
    root: &'a Map<String, Value>,
    section: &str,
    problems: &mut Vec<String>,
) -> Option<&'a Map<String, Value>> {
    match root.get(section) {
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            problems.push(format!("section '{}' must be an object", section));
            None
        }
        None => None,
    }
}

fn entry_object<'a>(
    entry: &'a Value,
    ctx: &str,
    problems: &mut Vec<String>,
) -> Option<&'a Map<String, Value>> {
    if let Value::Object(map) = entry {
        Some(map)
    } else {
        problems.push(format!("{}: must be an object", ctx));
        None
    }
}

fn check_triggers(value: Option<&Value>, ctx: &str, problems: &mut Vec<String>) {
    match value {
        Some(Value::Array(items)) => {
            if items.is_empty() {
                problems.push(format!("{}: trigger list is empty", ctx));
            } else if !items.iter().all(|item| item.as_str().is_some_and(|s| !s.is_empty())) {
                problems.push(format!("{}: triggers must be non-empty strings", ctx));
            }
        }
        Some(_) => problems.push(format!("{}: triggers must be a list of strings", ctx)),
        None => problems.push(format!("{}: missing trigger list", ctx)),
    }
}

fn check_optional_strings(value: Option<&Value>, ctx: &str, field: &str, problems: &mut Vec<String>) {
    match value {
        None => {}
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
        Some(_) => problems.push(format!("{}: {} must be a list of strings", ctx, field)),
    }
}

fn check_optional_string(value: Option<&Value>, ctx: &str, field: &str, problems: &mut Vec<String>) {
    if value.is_some_and(|v| !v.is_string()) {
        problems.push(format!("{}: {} must be a string", ctx, field));
    }
}

fn check_optional_bool(value: Option<&Value>, ctx: &str, field: &str, problems: &mut Vec<String>) {
    if value.is_some_and(|v| !v.is_boolean()) {
        problems.push(format!("{}: {} must be a boolean", ctx, field));
    }
}

/// Return the dotted paths of every key that appears twice in the same object.
fn find_duplicate_keys(text: &str) -> Result<Vec<String>, serde_json::Error> {
    let duplicates = RefCell::new(Vec::new());
    let mut de = serde_json::Deserializer::from_str(text);
    KeyAudit {
        path: String::new(),
        duplicates: &duplicates,
    }
    .deserialize(&mut de)?;
    de.end()?;
    Ok(duplicates.into_inner())
}

struct KeyAudit<'a> {
    path: String,
    duplicates: &'a RefCell<Vec<String>>,
}

impl KeyAudit<'_> {
    fn child(&self, segment: &str) -> Self {
        let path = if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", self.path, segment)
        };
        KeyAudit {
            path,
            duplicates: self.duplicates,
        }
    }
}

impl<'de> DeserializeSeed<'de> for KeyAudit<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for KeyAudit<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<(), E> {
        Ok(())
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<(), E> {
        Ok(())
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<(), E> {
        Ok(())
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<(), E> {
        Ok(())
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<(), E> {
        Ok(())
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let mut index = 0usize;
        while seq
            .next_element_seed(self.child(&format!("[{}]", index)))?
            .is_some()
        {
            index += 1;
        }
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let mut seen = HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            let child = self.child(&key);
            if !seen.insert(key) {
                self.duplicates.borrow_mut().push(child.path.clone());
            }
            map.next_value_seed(child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "categories": {
                "FIGURE": { "patterns": ["figure"], "priority": 5, "description": "Figures" }
            },
            "franchises": {},
            "creators": {},
            "special_patterns": {},
            "tag_rules": { "auto_tags": {}, "content_based_tags": {} },
            "naming_patterns": {
                "version": { "regex": "v(\\d+)" },
                "technical_specs": { "regex": "\\d+mm" },
                "nsfw_indicators": { "regex": "sfw.nsfw" }
            }
        })
    }

    #[test]
    fn test_minimal_document_is_valid() {
        assert!(validate_value(&minimal()).is_empty());
    }

    #[test]
    fn test_missing_sections_are_all_reported() {
        let mut doc = minimal();
        let root = doc.as_object_mut().unwrap();
        root.remove("creators");
        root.remove("naming_patterns");

        let problems = validate_value(&doc);
        assert!(problems.contains(&"missing required section: creators".to_string()));
        assert!(problems.contains(&"missing required section: naming_patterns".to_string()));
    }

    #[test]
    fn test_priority_must_be_integer() {
        let mut doc = minimal();
        doc["categories"]["FIGURE"]["priority"] = json!("high");
        let problems = validate_value(&doc);
        assert_eq!(problems, vec!["category 'FIGURE': priority must be an integer"]);

        doc["categories"]["FIGURE"]["priority"] = json!(2.5);
        assert_eq!(validate_value(&doc).len(), 1);

        doc["categories"]["FIGURE"]["priority"] = json!(-1);
        assert_eq!(
            validate_value(&doc),
            vec!["category 'FIGURE': priority must not be negative"]
        );
    }

    #[test]
    fn test_triggers_must_be_list_of_strings() {
        let mut doc = minimal();
        doc["categories"]["FIGURE"]["patterns"] = json!("figure");
        assert_eq!(
            validate_value(&doc),
            vec!["category 'FIGURE': triggers must be a list of strings"]
        );

        doc["categories"]["FIGURE"]["patterns"] = json!(["figure", 3]);
        assert_eq!(validate_value(&doc).len(), 1);

        doc["categories"]["FIGURE"]["patterns"] = json!([]);
        assert_eq!(
            validate_value(&doc),
            vec!["category 'FIGURE': trigger list is empty"]
        );
    }

    #[test]
    fn test_invalid_regex_reported() {
        let mut doc = minimal();
        doc["naming_patterns"]["technical_specs"]["regex"] = json!("(unclosed");
        let problems = validate_value(&doc);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("naming pattern 'technical_specs': invalid regex"));
    }

    #[test]
    fn test_version_regex_needs_group() {
        let mut doc = minimal();
        doc["naming_patterns"]["version"]["regex"] = json!("v\\d+");
        assert_eq!(
            validate_value(&doc),
            vec!["naming pattern 'version': regex needs a capture group"]
        );
    }

    #[test]
    fn test_problems_are_collected_exhaustively() {
        let mut doc = minimal();
        doc["categories"]["FIGURE"]["priority"] = json!(null);
        doc["creators"] = json!({ "A": { "patterns": [] } });
        doc["franchises"] = json!({ "B": { "patterns": ["b"], "aliases": "x" } });
        assert_eq!(validate_value(&doc).len(), 3);
    }

    #[test]
    fn test_duplicate_keys_detected() {
        let text = r#"{ "categories": { "A": {"x": 1}, "A": {"x": 2} }, "list": [ {"k": 1, "k": 2} ] }"#;
        let dups = find_duplicate_keys(text).unwrap();
        assert_eq!(dups, vec!["categories.A".to_string(), "list.[0].k".to_string()]);
    }

    #[test]
    fn test_parse_document_rejects_malformed_json() {
        let err = parse_document("{ not json", "inline").unwrap_err();
        assert!(err.to_string().contains("malformed JSON"));
    }

    #[test]
    fn test_parse_document_accepts_minimal() {
        let text = serde_json::to_string(&minimal()).unwrap();
        let (_, doc) = parse_document(&text, "inline").unwrap();
        assert_eq!(doc.categories["FIGURE"].priority, 5);
        assert!(doc.tag_rules.auto_tags.is_empty());
    }
}
