use serde_json::{Map, Value};

use crate::session_state::SessionMode;

/// Resolves one trusted metadata object from the session's raw context
/// sources.
///
/// Sources arrive in precedence order: room-level context first, then each
/// participant's context. The first source that parses as a non-empty JSON
/// object wins — room context is the authoritative statement of session
/// intent. Sources that fail to parse are skipped.
pub fn resolve<I, S>(sources: I) -> Map<String, Value>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for source in sources {
        match serde_json::from_str::<Value>(source.as_ref()) {
            Ok(Value::Object(fields)) if !fields.is_empty() => return fields,
            Ok(_) => {
                tracing::debug!("session context source is not a non-empty object, skipping");
            }
            Err(e) => {
                tracing::debug!(error = %e, "malformed session context source, skipping");
            }
        }
    }

    Map::new()
}

/// The configuration a session reads out of resolved metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Option<String>,
    pub interview_id: Option<String>,
    pub mode: SessionMode,
}

impl SessionContext {
    /// Extracts the session fields, tolerating anything else the object
    /// carries. Blank identifiers count as absent; any mode other than
    /// "conduct" falls back to create.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            user_id: string_field(fields, "userId"),
            interview_id: string_field(fields, "interviewId"),
            mode: match fields.get("mode").and_then(Value::as_str) {
                Some("conduct") => SessionMode::Conduct,
                _ => SessionMode::Create,
            },
        }
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_malformed_sources() {
        let fields = resolve(["not json", r#"{"mode":"conduct","interviewId":"abc"}"#]);

        assert_eq!(fields.get("mode").and_then(Value::as_str), Some("conduct"));
        assert_eq!(
            fields.get("interviewId").and_then(Value::as_str),
            Some("abc")
        );
    }

    #[test]
    fn first_parseable_source_wins() {
        let fields = resolve([r#"{"userId":"room"}"#, r#"{"userId":"participant"}"#]);

        assert_eq!(fields.get("userId").and_then(Value::as_str), Some("room"));
    }

    #[test]
    fn empty_objects_and_non_objects_are_skipped() {
        let fields = resolve(["{}", "[1, 2]", r#""just a string""#, r#"{"userId":"u1"}"#]);

        assert_eq!(fields.get("userId").and_then(Value::as_str), Some("u1"));
    }

    #[test]
    fn no_parseable_source_yields_empty_object() {
        let fields = resolve(["%%%", ""]);

        assert!(fields.is_empty());
    }

    #[test]
    fn extracts_known_fields_and_ignores_extras() {
        let fields = resolve(
            [r#"{"userId":"u1","interviewId":"i1","mode":"conduct","roomName":"r9"}"#],
        );
        let context = SessionContext::from_fields(&fields);

        assert_eq!(context.user_id.as_deref(), Some("u1"));
        assert_eq!(context.interview_id.as_deref(), Some("i1"));
        assert_eq!(context.mode, SessionMode::Conduct);
    }

    #[test]
    fn blank_identifiers_count_as_absent() {
        let fields = resolve([r#"{"userId":"  ","interviewId":"","mode":"create"}"#]);
        let context = SessionContext::from_fields(&fields);

        assert_eq!(context.user_id, None);
        assert_eq!(context.interview_id, None);
    }

    #[test]
    fn unknown_mode_defaults_to_create() {
        let fields = resolve([r#"{"mode":"practice"}"#]);
        let context = SessionContext::from_fields(&fields);

        assert_eq!(context.mode, SessionMode::Create);
    }
}
