use serde_json::{Map, Value as JsonValue};
use tracing::trace;
use weave_parser::Event;

use crate::config::Config;
use crate::error::JsonToEventsError;

/// Convert a JSON document to structural events using default configuration.
pub fn json_to_events(value: &JsonValue) -> Result<Vec<Event>, JsonToEventsError> {
    json_to_events_with_config(value, &Config::default())
}

/// Convert a JSON document to structural events.
///
/// The root must be a record object. Member order is kept, arrays repeat
/// their key, and `null` members produce nothing.
pub fn json_to_events_with_config(
    value: &JsonValue,
    config: &Config,
) -> Result<Vec<Event>, JsonToEventsError> {
    let JsonValue::Object(object) = value else {
        return Err(JsonToEventsError::RootNotObject {
            found: kind_name(value),
        });
    };
    let mut writer = EventWriter {
        config,
        events: Vec::new(),
        path: Vec::new(),
    };
    writer.record(object)?;
    trace!(events = writer.events.len(), "converted JSON document");
    Ok(writer.events)
}

struct EventWriter<'a> {
    config: &'a Config,
    events: Vec<Event>,
    path: Vec<String>,
}

impl EventWriter<'_> {
    fn record(&mut self, object: &Map<String, JsonValue>) -> Result<(), JsonToEventsError> {
        let key = &self.config.record_type_key;
        let type_name = match object.get(key) {
            Some(JsonValue::String(name)) => name,
            Some(_) => {
                return Err(JsonToEventsError::InvalidRecordType {
                    path: self.path(),
                    key: key.clone(),
                });
            }
            None => {
                return Err(JsonToEventsError::MissingRecordType {
                    path: self.path(),
                    key: key.clone(),
                });
            }
        };
        self.comments(object)?;
        self.events.push(Event::enter(type_name.as_str()));
        self.path.push(type_name.clone());
        self.members(object, false)?;
        self.path.pop();
        self.events.push(Event::Exit);
        Ok(())
    }

    /// Every member of `object` that is not structural, in order. A companion
    /// is emitted together with its primitive, or alone when the primitive
    /// is absent.
    fn members(
        &mut self,
        object: &Map<String, JsonValue>,
        in_extension: bool,
    ) -> Result<(), JsonToEventsError> {
        let prefix = self.config.companion_prefix;
        for (key, value) in object {
            if *key == self.config.record_type_key || *key == self.config.comments_key {
                continue;
            }
            if in_extension {
                if *key == self.config.url_key {
                    continue;
                }
                if *key == self.config.id_key {
                    if let JsonValue::String(id) = value {
                        self.events.push(Event::attribute(key.as_str(), id.as_str()));
                    }
                    continue;
                }
            }
            if let Some(name) = key.strip_prefix(prefix)
                && !name.is_empty()
            {
                if !object.contains_key(name) {
                    self.member(name, None, Some(value))?;
                }
                continue;
            }
            let companion = object.get(&format!("{prefix}{key}"));
            self.member(key, Some(value), companion)?;
        }
        Ok(())
    }

    fn member(
        &mut self,
        key: &str,
        value: Option<&JsonValue>,
        companion: Option<&JsonValue>,
    ) -> Result<(), JsonToEventsError> {
        if key == self.config.extension_key {
            return self.extensions(value, false);
        }
        if key == self.config.modifier_extension_key {
            return self.extensions(value, true);
        }

        self.path.push(key.to_string());
        let values = spread(value);
        let companions = spread(companion);
        let len = values.len().max(companions.len());
        let mut result = Ok(());
        for index in 0..len {
            let value = values.get(index).copied().flatten();
            let companion = companions.get(index).copied().flatten();
            result = self.element(key, value, companion);
            if result.is_err() {
                break;
            }
        }
        self.path.pop();
        result
    }

    fn element(
        &mut self,
        key: &str,
        value: Option<&JsonValue>,
        companion: Option<&JsonValue>,
    ) -> Result<(), JsonToEventsError> {
        match value {
            Some(JsonValue::Array(_)) => Err(JsonToEventsError::NestedArray { path: self.path() }),
            Some(JsonValue::Object(object))
                if object.contains_key(&self.config.record_type_key) =>
            {
                self.events.push(Event::enter(key));
                self.record(object)?;
                self.events.push(Event::Exit);
                Ok(())
            }
            Some(JsonValue::Object(object)) => {
                self.comments(object)?;
                self.events.push(Event::enter(key));
                self.members(object, false)?;
                self.events.push(Event::Exit);
                Ok(())
            }
            scalar => self.primitive(key, scalar.and_then(scalar_text), companion),
        }
    }

    /// A primitive element: the value as an attribute, then the companion's
    /// identity and extensions.
    fn primitive(
        &mut self,
        key: &str,
        text: Option<String>,
        companion: Option<&JsonValue>,
    ) -> Result<(), JsonToEventsError> {
        let companion = match companion {
            None => None,
            Some(JsonValue::Object(object)) => Some(object),
            Some(_) => return Err(JsonToEventsError::InvalidCompanion { path: self.path() }),
        };
        if text.is_none() && companion.is_none() {
            return Ok(());
        }
        if let Some(companion) = companion {
            self.comments(companion)?;
        }
        self.events.push(Event::enter(key));
        if let Some(text) = text {
            self.events.push(Event::attribute("value", text));
        }
        if let Some(companion) = companion {
            for (name, value) in companion {
                if *name == self.config.comments_key {
                    continue;
                }
                if *name == self.config.id_key {
                    if let JsonValue::String(id) = value {
                        self.events.push(Event::attribute(name.as_str(), id.as_str()));
                    }
                    continue;
                }
                self.member(name, Some(value), None)?;
            }
        }
        self.events.push(Event::Exit);
        Ok(())
    }

    fn extensions(
        &mut self,
        value: Option<&JsonValue>,
        modifier: bool,
    ) -> Result<(), JsonToEventsError> {
        let name = if modifier {
            &self.config.modifier_extension_key
        } else {
            &self.config.extension_key
        };
        self.path.push(name.clone());
        for item in spread(value).into_iter().flatten() {
            let JsonValue::Object(object) = item else {
                return Err(JsonToEventsError::InvalidExtension { path: self.path() });
            };
            let url = match object.get(&self.config.url_key) {
                None | Some(JsonValue::Null) => None,
                Some(JsonValue::String(url)) => Some(url.clone()),
                Some(_) => return Err(JsonToEventsError::InvalidExtension { path: self.path() }),
            };
            self.comments(object)?;
            self.events.push(Event::Extension { url, modifier });
            self.members(object, true)?;
            self.events.push(Event::Exit);
        }
        self.path.pop();
        Ok(())
    }

    fn comments(&mut self, object: &Map<String, JsonValue>) -> Result<(), JsonToEventsError> {
        let Some(comments) = object.get(&self.config.comments_key) else {
            return Ok(());
        };
        for comment in spread(Some(comments)).into_iter().flatten() {
            let JsonValue::String(text) = comment else {
                return Err(JsonToEventsError::InvalidComments { path: self.path() });
            };
            self.events.push(Event::CommentPre(text.clone()));
        }
        Ok(())
    }

    fn path(&self) -> String {
        if self.path.is_empty() {
            return "(root)".to_string();
        }
        self.path.join(".")
    }
}

/// Array items with `null` as `None`; a lone value is a one-item array.
fn spread(value: Option<&JsonValue>) -> Vec<Option<&JsonValue>> {
    match value {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| Some(item).filter(|item| !item.is_null()))
            .collect(),
        Some(value) => vec![Some(value)],
    }
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Bool(flag) => Some(flag.to_string()),
        // Keeps the literal as written, so `1.50` stays `1.50`.
        JsonValue::Number(number) => Some(number.to_string()),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn scalar(name: &str, value: &str) -> Vec<Event> {
        vec![Event::enter(name), Event::attribute("value", value), Event::Exit]
    }

    #[test]
    fn test_record_with_scalars() {
        let value = json!({
            "resourceType": "Patient",
            "id": "p1",
            "active": true,
            "gender": "female"
        });
        let mut expected = vec![Event::enter("Patient")];
        expected.extend(scalar("id", "p1"));
        expected.extend(scalar("active", "true"));
        expected.extend(scalar("gender", "female"));
        expected.push(Event::Exit);
        assert_eq!(json_to_events(&value).unwrap(), expected);
    }

    #[test]
    fn test_decimal_keeps_literal() {
        let value: JsonValue =
            serde_json::from_str(r#"{"resourceType": "Observation", "value": 1.50}"#).unwrap();
        let events = json_to_events(&value).unwrap();
        assert_eq!(events[2], Event::attribute("value", "1.50"));
    }

    #[test]
    fn test_arrays_repeat_key_and_skip_null() {
        let value = json!({
            "resourceType": "Patient",
            "name": [{"given": ["Ann", null, "Lee"]}],
            "birthDate": null
        });
        let mut expected = vec![Event::enter("Patient"), Event::enter("name")];
        expected.extend(scalar("given", "Ann"));
        expected.extend(scalar("given", "Lee"));
        expected.extend([Event::Exit, Event::Exit]);
        assert_eq!(json_to_events(&value).unwrap(), expected);
    }

    #[test]
    fn test_nested_record_wrapped_by_field() {
        let value = json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {"resourceType": "Patient", "id": "p1"}}]
        });
        let mut expected = vec![
            Event::enter("Bundle"),
            Event::enter("entry"),
            Event::enter("resource"),
            Event::enter("Patient"),
        ];
        expected.extend(scalar("id", "p1"));
        expected.extend([Event::Exit, Event::Exit, Event::Exit, Event::Exit]);
        assert_eq!(json_to_events(&value).unwrap(), expected);
    }

    #[test]
    fn test_extension_url_lifted() {
        let value = json!({
            "resourceType": "Patient",
            "extension": [{
                "url": "http://example.org/ext/nickname",
                "id": "e1",
                "valueString": "Sunny"
            }]
        });
        let mut expected = vec![
            Event::enter("Patient"),
            Event::extension("http://example.org/ext/nickname"),
            Event::attribute("id", "e1"),
        ];
        expected.extend(scalar("valueString", "Sunny"));
        expected.extend([Event::Exit, Event::Exit]);
        assert_eq!(json_to_events(&value).unwrap(), expected);
    }

    #[test]
    fn test_companion_merges_into_primitive() {
        let value = json!({
            "resourceType": "Patient",
            "birthDate": "1970-03-30",
            "_birthDate": {
                "id": "bd",
                "extension": [{"url": "http://example.org/ext/time", "valueString": "14:35"}]
            }
        });
        let mut expected = vec![
            Event::enter("Patient"),
            Event::enter("birthDate"),
            Event::attribute("value", "1970-03-30"),
            Event::attribute("id", "bd"),
            Event::extension("http://example.org/ext/time"),
        ];
        expected.extend(scalar("valueString", "14:35"));
        expected.extend([Event::Exit, Event::Exit, Event::Exit]);
        assert_eq!(json_to_events(&value).unwrap(), expected);
    }

    #[test]
    fn test_companion_array_is_element_wise() {
        let value = json!({
            "resourceType": "Patient",
            "name": [{
                "given": ["Ann", null],
                "_given": [null, {"id": "g2"}]
            }]
        });
        let mut expected = vec![Event::enter("Patient"), Event::enter("name")];
        expected.extend(scalar("given", "Ann"));
        expected.extend([
            Event::enter("given"),
            Event::attribute("id", "g2"),
            Event::Exit,
        ]);
        expected.extend([Event::Exit, Event::Exit]);
        assert_eq!(json_to_events(&value).unwrap(), expected);
    }

    #[test]
    fn test_lone_companion() {
        let value = json!({
            "resourceType": "Patient",
            "_gender": {"id": "g"}
        });
        let expected = vec![
            Event::enter("Patient"),
            Event::enter("gender"),
            Event::attribute("id", "g"),
            Event::Exit,
            Event::Exit,
        ];
        assert_eq!(json_to_events(&value).unwrap(), expected);
    }

    #[test]
    fn test_comments_precede_their_value() {
        let value = json!({
            "resourceType": "Patient",
            "fhir_comments": ["root note"],
            "meta": {"fhir_comments": ["meta note"], "versionId": "2"}
        });
        let mut expected = vec![
            Event::CommentPre("root note".into()),
            Event::enter("Patient"),
            Event::CommentPre("meta note".into()),
            Event::enter("meta"),
        ];
        expected.extend(scalar("versionId", "2"));
        expected.extend([Event::Exit, Event::Exit]);
        assert_eq!(json_to_events(&value).unwrap(), expected);
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(
            json_to_events(&json!([1, 2])),
            Err(JsonToEventsError::RootNotObject { found: "an array" })
        );
        assert_eq!(
            json_to_events(&json!({"id": "x"})),
            Err(JsonToEventsError::MissingRecordType {
                path: "(root)".into(),
                key: "resourceType".into()
            })
        );
        assert_eq!(
            json_to_events(&json!({"resourceType": "Patient", "name": [[1]]})),
            Err(JsonToEventsError::NestedArray {
                path: "Patient.name".into()
            })
        );
        assert_eq!(
            json_to_events(&json!({"resourceType": "Patient", "extension": ["x"]})),
            Err(JsonToEventsError::InvalidExtension {
                path: "Patient.extension".into()
            })
        );
    }
}
