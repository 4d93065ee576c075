//! Access directives feeding the request restrictor.
//!
//! Directives are written as `<kind>@<object-pattern>[#<member>]=<allow|deny>`,
//! for example `write@app:type=Cache#Size=deny` or `*@secret:*=deny`. The
//! configuration layer only normalises and orders them; pattern matching is
//! performed by the restrictor in the core crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Request kind wildcard accepted in directives.
pub const ANY_KIND: &str = "*";

/// Outcome applied when a directive matches a request.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AccessOverride {
    /// Let the request through.
    #[default]
    Allow,
    /// Reject the request before any backend is touched.
    Deny,
}

/// Errors produced when parsing [`AccessDirective`] values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessDirectiveParseError {
    /// The `@` separating the request kind from the object pattern is absent.
    #[error("directive '{0}' is missing the kind separator '@'")]
    MissingKind(String),
    /// The trailing `=allow` or `=deny` assignment is absent.
    #[error("directive '{0}' is missing the override assignment '='")]
    MissingOverride(String),
    /// The override could not be parsed.
    #[error("unsupported access override '{0}'")]
    InvalidOverride(String),
    /// The object pattern was empty.
    #[error("directive '{0}' has an empty object pattern")]
    EmptyPattern(String),
}

/// A single allow or deny rule.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AccessDirective {
    /// Request kind (`list`, `read`, `write`, `exec`, `search`) or `*`.
    pub kind: String,
    /// Object name or object name pattern the rule applies to.
    pub object: String,
    /// Attribute or operation name; `None` matches every member.
    #[serde(default)]
    pub member: Option<String>,
    /// Outcome applied when the rule matches.
    pub directive: AccessOverride,
}

impl AccessDirective {
    /// Creates a new directive, normalising the request kind.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        object: impl Into<String>,
        member: Option<String>,
        directive: AccessOverride,
    ) -> Self {
        Self {
            kind: normalise_kind(&kind.into()),
            object: object.into().trim().to_owned(),
            member,
            directive,
        }
    }

    /// Returns `true` when the directive applies to every request kind.
    #[must_use]
    pub fn applies_to_any_kind(&self) -> bool {
        self.kind == ANY_KIND
    }

    fn key(&self) -> (String, String, Option<String>) {
        (self.kind.clone(), self.object.clone(), self.member.clone())
    }
}

impl fmt::Display for AccessDirective {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}@{}", self.kind, self.object)?;
        if let Some(member) = &self.member {
            write!(formatter, "#{member}")?;
        }
        write!(formatter, "={}", self.directive)
    }
}

impl FromStr for AccessDirective {
    type Err = AccessDirectiveParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = input
            .split_once('@')
            .ok_or_else(|| AccessDirectiveParseError::MissingKind(input.to_owned()))?;
        // Object names contain '=' themselves, so the override is the last one.
        let (target, directive) = rest
            .rsplit_once('=')
            .ok_or_else(|| AccessDirectiveParseError::MissingOverride(input.to_owned()))?;
        let directive = AccessOverride::from_str(directive.trim())
            .map_err(|_| AccessDirectiveParseError::InvalidOverride(directive.to_owned()))?;
        let (object, member) = match target.split_once('#') {
            Some((object, member)) => (object, Some(member.trim().to_owned())),
            None => (target, None),
        };
        if object.trim().is_empty() {
            return Err(AccessDirectiveParseError::EmptyPattern(input.to_owned()));
        }
        Ok(Self::new(kind, object, member, directive))
    }
}

/// Ordered set of directives; later directives take precedence.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Directives in evaluation order.
    #[serde(default)]
    pub directives: Vec<AccessDirective>,
}

impl AccessPolicy {
    /// Builds a policy from an iterator of directives, keeping the last
    /// directive written for each `(kind, object, member)` triple.
    #[must_use]
    pub fn from_directives<'a, I>(directives: I) -> Self
    where
        I: IntoIterator<Item = &'a AccessDirective>,
    {
        let mut policy = Self::default();
        for directive in directives {
            policy.push(directive.clone());
        }
        policy
    }

    /// Appends a directive, replacing an earlier one with the same target.
    pub fn push(&mut self, directive: AccessDirective) {
        let key = directive.key();
        self.directives.retain(|existing| existing.key() != key);
        self.directives.push(directive);
    }

    /// Returns `true` when no directive has been configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Iterates over directives in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &AccessDirective> {
        self.directives.iter()
    }
}

fn normalise_kind(kind: &str) -> String {
    kind.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("read@app:type=Cache=deny", "read", "app:type=Cache", None, AccessOverride::Deny)]
    #[case(
        "WRITE@app:type=Cache#Size=allow",
        "write",
        "app:type=Cache",
        Some("Size"),
        AccessOverride::Allow
    )]
    #[case("*@secret:*=Deny", "*", "secret:*", None, AccessOverride::Deny)]
    fn parses_directives(
        #[case] input: &str,
        #[case] kind: &str,
        #[case] object: &str,
        #[case] member: Option<&str>,
        #[case] directive: AccessOverride,
    ) {
        let parsed = AccessDirective::from_str(input).expect("directive should parse");
        assert_eq!(parsed.kind, kind);
        assert_eq!(parsed.object, object);
        assert_eq!(parsed.member.as_deref(), member);
        assert_eq!(parsed.directive, directive);
    }

    #[rstest]
    #[case("app:type=Cache=deny")]
    #[case("read@app:type=Cache=maybe")]
    #[case("read@=deny")]
    fn rejects_malformed_directives(#[case] input: &str) {
        assert!(AccessDirective::from_str(input).is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let directive = AccessDirective::new(
            "exec",
            "app:type=Pool",
            Some("reset".to_owned()),
            AccessOverride::Deny,
        );
        let text = directive.to_string();
        assert_eq!(text, "exec@app:type=Pool#reset=deny");
        assert_eq!(AccessDirective::from_str(&text).expect("parse"), directive);
    }

    #[test]
    fn policy_keeps_latest_directive_per_target() {
        let directives = vec![
            AccessDirective::new("read", "app:type=A", None, AccessOverride::Deny),
            AccessDirective::new("write", "app:type=A", None, AccessOverride::Deny),
            AccessDirective::new("READ", "app:type=A", None, AccessOverride::Allow),
        ];
        let policy = AccessPolicy::from_directives(&directives);

        let kept: Vec<_> = policy.iter().map(ToString::to_string).collect();
        assert_eq!(
            kept,
            vec!["write@app:type=A=deny", "read@app:type=A=allow"]
        );
    }
}
