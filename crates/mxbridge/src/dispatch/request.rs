//! Request deserialization and validation.
//!
//! Requests arrive as JSON objects:
//!
//! ```json
//! {"type":"read","mbean":"app:type=Cache","attribute":"Stats","path":"hits/total"}
//! ```
//!
//! `path` may be a `/`-separated string (with `!/` escaping a literal slash
//! and `!!` a literal `!`) or an array of segments.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use super::errors::AgentError;
use crate::convert::LimitOverrides;
use crate::object_name::ObjectName;

/// Kinds of request the agent understands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RequestKind {
    /// Describe matching objects.
    List,
    /// Read one, all, or pattern-selected attributes.
    Read,
    /// Write an attribute.
    Write,
    /// Invoke an operation.
    Exec,
    /// Find object names matching a pattern.
    Search,
}

impl RequestKind {
    /// Whether the kind runs once over all backends instead of per target.
    #[must_use]
    pub const fn is_aggregate(self) -> bool {
        matches!(self, Self::List | Self::Search)
    }
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Request {
    /// Request kind.
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Target object name or pattern.
    #[serde(rename = "mbean", default = "ObjectName::wildcard")]
    pub target: ObjectName,
    /// Attribute for READ and WRITE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Operation for EXEC, optionally with a `(type,...)` signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Extra path into the result.
    #[serde(
        default,
        deserialize_with = "deserialize_path",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub path: Vec<String>,
    /// New value for WRITE; an explicit `null` is kept as `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    /// Positional arguments for EXEC.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Value>,
    /// Per-request conversion limits.
    #[serde(default, skip_serializing_if = "LimitOverrides::is_empty")]
    pub config: LimitOverrides,
}

impl Request {
    fn new(kind: RequestKind, target: ObjectName) -> Self {
        Self {
            kind,
            target,
            attribute: None,
            operation: None,
            path: Vec::new(),
            value: None,
            arguments: Vec::new(),
            config: LimitOverrides::default(),
        }
    }

    /// LIST request for objects matching `pattern`.
    #[must_use]
    pub fn list(pattern: ObjectName) -> Self {
        Self::new(RequestKind::List, pattern)
    }

    /// SEARCH request for names matching `pattern`.
    #[must_use]
    pub fn search(pattern: ObjectName) -> Self {
        Self::new(RequestKind::Search, pattern)
    }

    /// READ request for one attribute.
    #[must_use]
    pub fn read(target: ObjectName, attribute: impl Into<String>) -> Self {
        Self {
            attribute: Some(attribute.into()),
            ..Self::new(RequestKind::Read, target)
        }
    }

    /// READ request for every readable attribute.
    #[must_use]
    pub fn read_all(target: ObjectName) -> Self {
        Self::new(RequestKind::Read, target)
    }

    /// WRITE request.
    #[must_use]
    pub fn write(target: ObjectName, attribute: impl Into<String>, value: Value) -> Self {
        Self {
            attribute: Some(attribute.into()),
            value: Some(value),
            ..Self::new(RequestKind::Write, target)
        }
    }

    /// EXEC request.
    #[must_use]
    pub fn exec(target: ObjectName, operation: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            operation: Some(operation.into()),
            arguments,
            ..Self::new(RequestKind::Exec, target)
        }
    }

    /// Sets the extra path.
    #[must_use]
    pub fn with_path<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = segments.into_iter().map(Into::into).collect();
        self
    }

    /// Sets per-request conversion limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: LimitOverrides) -> Self {
        self.config = limits;
        self
    }

    /// Parses a JSON request; surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidRequest`] if the input is empty or does not
    /// match the request schema.
    pub fn parse(input: &[u8]) -> Result<Self, AgentError> {
        let trimmed = input.trim_ascii();
        if trimmed.is_empty() {
            return Err(AgentError::invalid_request("empty request"));
        }
        serde_json::from_slice(trimmed).map_err(AgentError::from_json_error)
    }

    /// Checks that the fields required by the request kind are present.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidRequest`] describing the first problem.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.attribute.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(AgentError::invalid_request("attribute name is empty"));
        }
        match self.kind {
            RequestKind::Read if self.target.is_pattern() && !self.path.is_empty() => Err(
                AgentError::invalid_request("a path is not allowed when reading a pattern"),
            ),
            RequestKind::Write | RequestKind::Exec if self.target.is_pattern() => {
                Err(AgentError::invalid_request(format!(
                    "{} requires a concrete object name, got pattern '{}'",
                    self.kind, self.target
                )))
            }
            RequestKind::Write if self.attribute.is_none() => {
                Err(AgentError::invalid_request("write requires an attribute"))
            }
            RequestKind::Write if self.value.is_none() => {
                Err(AgentError::invalid_request("write requires a value"))
            }
            RequestKind::Exec
                if self
                    .operation
                    .as_deref()
                    .is_none_or(|name| name.trim().is_empty()) =>
            {
                Err(AgentError::invalid_request("exec requires an operation"))
            }
            _ => Ok(()),
        }
    }

    /// Attribute or operation the request addresses, as sent.
    #[must_use]
    pub fn member(&self) -> Option<&str> {
        match self.kind {
            RequestKind::Read | RequestKind::Write => self.attribute.as_deref(),
            RequestKind::Exec => self.operation.as_deref(),
            RequestKind::List | RequestKind::Search => None,
        }
    }

    /// Member name without any operation signature.
    #[must_use]
    pub fn member_name(&self) -> Option<&str> {
        self.member()
            .map(|member| member.split_once('(').map_or(member, |(name, _)| name).trim())
    }

    /// Parameter types given in an EXEC signature such as `add(int,int)`.
    #[must_use]
    pub fn signature(&self) -> Option<Vec<String>> {
        let operation = self.operation.as_deref()?;
        let (_, rest) = operation.split_once('(')?;
        let inner = rest.strip_suffix(')')?;
        Some(
            inner
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PathSpec {
    Text(String),
    Segments(Vec<String>),
}

fn deserialize_path<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<PathSpec>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(PathSpec::Text(text)) => split_path(&text),
        Some(PathSpec::Segments(segments)) => segments,
    })
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Splits a `/`-separated path, honouring `!` escapes and dropping empty
/// segments.
#[must_use]
pub fn split_path(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();
    while let Some(character) = chars.next() {
        match character {
            '!' => current.push(chars.next().unwrap_or('!')),
            '/' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn name(text: &str) -> ObjectName {
        ObjectName::parse(text).expect("valid object name")
    }

    #[test]
    fn parses_read_with_string_path() {
        let input = br#" {"type":"read","mbean":"app:type=Foo","attribute":"bar","path":"baz/a!/b"} "#;
        let request = Request::parse(input).expect("parse read");
        assert_eq!(request.kind, RequestKind::Read);
        assert_eq!(request.target, name("app:type=Foo"));
        assert_eq!(request.member(), Some("bar"));
        assert_eq!(request.path, vec!["baz", "a/b"]);
        request.validate().expect("valid read");
    }

    #[test]
    fn parses_array_path_and_limits() {
        let input = br#"{"type":"read","mbean":"app:type=Foo","path":["x","y"],"config":{"maxDepth":2}}"#;
        let request = Request::parse(input).expect("parse read");
        assert_eq!(request.path, vec!["x", "y"]);
        assert_eq!(request.config.max_depth, Some(2));
    }

    #[test]
    fn list_defaults_to_wildcard() {
        let request = Request::parse(br#"{"type":"list"}"#).expect("parse list");
        assert_eq!(request.target, ObjectName::wildcard());
    }

    #[test]
    fn explicit_null_write_value_is_kept() {
        let input = br#"{"type":"write","mbean":"app:type=Foo","attribute":"bar","value":null}"#;
        let request = Request::parse(input).expect("parse write");
        assert_eq!(request.value, Some(Value::Null));
        request.validate().expect("valid write");
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"  \n".as_slice())]
    #[case(b"not json".as_slice())]
    #[case(br#"{"type":"notify"}"#.as_slice())]
    fn rejects_malformed_input(#[case] input: &[u8]) {
        let error = Request::parse(input).expect_err("parse should fail");
        assert!(matches!(error, AgentError::InvalidRequest { .. }));
    }

    #[rstest]
    #[case(Request::read(name("app:*"), "bar").with_path(["x"]))]
    #[case(Request::write(name("app:*"), "bar", json!(1)))]
    #[case(Request { value: None, ..Request::write(name("app:type=A"), "bar", json!(1)) })]
    #[case(Request { attribute: None, ..Request::write(name("app:type=A"), "bar", json!(1)) })]
    #[case(Request::exec(name("app:type=A"), " ", vec![]))]
    #[case(Request::read(name("app:type=A"), ""))]
    fn validation_rejects_incomplete_requests(#[case] request: Request) {
        let error = request.validate().expect_err("validation should fail");
        assert_eq!(error.status(), 400);
    }

    #[test]
    fn exec_signature_is_split_from_name() {
        let request = Request::exec(name("app:type=A"), "add(int, long)", vec![]);
        assert_eq!(request.member_name(), Some("add"));
        assert_eq!(
            request.signature(),
            Some(vec!["int".to_owned(), "long".to_owned()])
        );
        let plain = Request::exec(name("app:type=A"), "reset", vec![]);
        assert_eq!(plain.signature(), None);
    }

    #[rstest]
    #[case("a/b/c", &["a", "b", "c"])]
    #[case("/a//b/", &["a", "b"])]
    #[case("a!/b", &["a/b"])]
    #[case("a!!/b", &["a!", "b"])]
    fn splits_escaped_paths(#[case] input: &str, #[case] expected: &[&str]) {
        assert_eq!(split_path(input), expected);
    }
}
