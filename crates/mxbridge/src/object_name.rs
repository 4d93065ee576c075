//! Object identities: a domain plus ordered key properties.
//!
//! Names are written `domain:key=value,key2=value2`. Key properties are
//! stored sorted, so [`ObjectName::canonical`] is independent of the order the
//! caller used. A name becomes a pattern when its domain or a property value
//! contains `*` or `?`, or when its property list ends with the `*` wildcard
//! (`app:type=Cache,*`). Quoted property values are not supported.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{ManagedValue, RawValue, TypeInfo};

/// Type name under which object names appear as values.
pub const OBJECT_NAME_TYPE: &str = "ObjectName";

static OBJECT_NAME_INFO: TypeInfo = TypeInfo::builtin(OBJECT_NAME_TYPE);

/// Errors raised while parsing an object name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObjectNameError {
    /// The `:` between domain and key properties is missing.
    #[error("object name '{0}' is missing the domain separator ':'")]
    MissingDomain(String),
    /// No key property was given and the name is not a pattern.
    #[error("object name '{0}' has no key properties")]
    MissingProperties(String),
    /// A key property is not of the form `key=value`.
    #[error("malformed key property '{property}' in '{name}'")]
    MalformedProperty {
        /// Full name being parsed.
        name: String,
        /// Offending property.
        property: String,
    },
    /// A key appears more than once.
    #[error("duplicate key '{key}' in '{name}'")]
    DuplicateKey {
        /// Full name being parsed.
        name: String,
        /// Repeated key.
        key: String,
    },
}

/// Identity of a managed object, or a pattern selecting several.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName {
    domain: String,
    properties: BTreeMap<String, String>,
    property_list_pattern: bool,
}

impl ObjectName {
    /// Parses `domain:key=value[,key=value...][,*]`.
    ///
    /// # Errors
    ///
    /// Returns an [`ObjectNameError`] describing the first malformed part.
    pub fn parse(input: &str) -> Result<Self, ObjectNameError> {
        let trimmed = input.trim();
        let (domain, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| ObjectNameError::MissingDomain(trimmed.to_owned()))?;

        let mut properties = BTreeMap::new();
        let mut property_list_pattern = false;
        for property in rest.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            if property == "*" {
                property_list_pattern = true;
                continue;
            }
            let (key, value) = property
                .split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .ok_or_else(|| ObjectNameError::MalformedProperty {
                    name: trimmed.to_owned(),
                    property: property.to_owned(),
                })?;
            let key = key.trim().to_owned();
            if properties.contains_key(&key) {
                return Err(ObjectNameError::DuplicateKey {
                    name: trimmed.to_owned(),
                    key,
                });
            }
            properties.insert(key, value.trim().to_owned());
        }

        if properties.is_empty() && !property_list_pattern {
            return Err(ObjectNameError::MissingProperties(trimmed.to_owned()));
        }

        Ok(Self {
            domain: domain.trim().to_owned(),
            properties,
            property_list_pattern,
        })
    }

    /// The `*:*` pattern matching every object.
    #[must_use]
    pub fn wildcard() -> Self {
        Self {
            domain: "*".to_owned(),
            properties: BTreeMap::new(),
            property_list_pattern: true,
        }
    }

    /// Domain part of the name.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Value of a key property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Key properties sorted by key, joined as `k=v,k2=v2`.
    #[must_use]
    pub fn canonical_key_properties(&self) -> String {
        let mut parts: Vec<String> = self
            .properties
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        if self.property_list_pattern {
            parts.push("*".to_owned());
        }
        parts.join(",")
    }

    /// Canonical `domain:key-properties` form.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.domain, self.canonical_key_properties())
    }

    /// Returns `true` when the name selects objects by pattern.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.property_list_pattern
            || has_wildcard(&self.domain)
            || self.properties.values().any(|value| has_wildcard(value))
    }

    /// Returns `true` when `candidate` is selected by this name.
    ///
    /// A concrete name only matches itself.
    #[must_use]
    pub fn matches(&self, candidate: &Self) -> bool {
        if !glob_matches(&self.domain, &candidate.domain) {
            return false;
        }
        let properties_match = self.properties.iter().all(|(key, pattern)| {
            candidate
                .properties
                .get(key)
                .is_some_and(|value| glob_matches(pattern, value))
        });
        properties_match
            && (self.property_list_pattern || self.properties.len() == candidate.properties.len())
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.canonical())
    }
}

impl FromStr for ObjectName {
    type Err = ObjectNameError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl TryFrom<String> for ObjectName {
    type Error = ObjectNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectName> for String {
    fn from(value: ObjectName) -> Self {
        value.canonical()
    }
}

impl ManagedValue for ObjectName {
    fn type_info(&self) -> &TypeInfo {
        &OBJECT_NAME_INFO
    }

    fn accessors(&self) -> Vec<String> {
        vec!["canonicalName".to_owned(), "domain".to_owned()]
    }

    fn read(&self, name: &str) -> Option<RawValue> {
        match name {
            "canonicalName" => Some(RawValue::String(self.canonical())),
            "domain" => Some(RawValue::String(self.domain.clone())),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        Some(self.canonical())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn has_wildcard(text: &str) -> bool {
    text.contains(['*', '?'])
}

/// Matches `text` against a glob where `*` spans any run and `?` one char.
fn glob_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0_usize, 0_usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match (pattern.get(p), text.get(t)) {
            (Some('*'), _) => {
                backtrack = Some((p, t));
                p += 1;
            }
            (Some(expected), Some(actual)) if *expected == '?' || expected == actual => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    t = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }
    pattern.get(p..).is_some_and(|rest| rest.iter().all(|c| *c == '*'))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn name(text: &str) -> ObjectName {
        ObjectName::parse(text).expect("valid object name")
    }

    #[test]
    fn canonical_form_sorts_key_properties() {
        let parsed = name("app:type=Cache,name=users");
        assert_eq!(parsed.domain(), "app");
        assert_eq!(parsed.canonical_key_properties(), "name=users,type=Cache");
        assert_eq!(parsed.canonical(), "app:name=users,type=Cache");
        assert!(!parsed.is_pattern());
    }

    #[rstest]
    #[case("app")]
    #[case("app:")]
    #[case("app:type")]
    #[case("app:=x")]
    #[case("app:type=a,type=b")]
    fn rejects_malformed_names(#[case] input: &str) {
        assert!(ObjectName::parse(input).is_err());
    }

    #[rstest]
    #[case("*:*", "app:type=Cache", true)]
    #[case("app:type=Cache", "app:type=Cache", true)]
    #[case("app:type=Cache", "app:type=Cache,name=x", false)]
    #[case("app:type=Cache,*", "app:type=Cache,name=x", true)]
    #[case("ap?:type=C*", "app:type=Cache", true)]
    #[case("app:type=C*e", "app:type=Cachex", false)]
    #[case("other:*", "app:type=Cache", false)]
    fn matches_patterns(#[case] pattern: &str, #[case] candidate: &str, #[case] expected: bool) {
        assert_eq!(name(pattern).matches(&name(candidate)), expected);
    }

    #[test]
    fn wildcard_is_pattern() {
        let wildcard = ObjectName::wildcard();
        assert!(wildcard.is_pattern());
        assert_eq!(wildcard.canonical(), "*:*");
        assert_eq!(wildcard, name("*:*"));
    }

    #[test]
    fn deserializes_from_string() {
        let parsed: ObjectName =
            serde_json::from_str("\"app:type=Cache\"").expect("deserialize object name");
        assert_eq!(parsed.property("type"), Some("Cache"));
        let rendered = serde_json::to_string(&parsed).expect("serialize object name");
        assert_eq!(rendered, "\"app:type=Cache\"");
    }
}
