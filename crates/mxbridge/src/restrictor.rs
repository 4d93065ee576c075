//! Access decisions taken before any backend is touched.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use mxbridge_config::{AccessDirective, AccessOverride, AccessPolicy};

use crate::dispatch::RequestKind;
use crate::object_name::{ObjectName, ObjectNameError};

/// Decides whether a request may proceed.
///
/// Implementations must be pure: the same arguments always yield the same
/// answer and no backend is consulted.
pub trait Restrictor: Send + Sync {
    /// Returns `true` when `kind` may be performed on `name`, optionally
    /// narrowed to one attribute or operation.
    fn is_allowed(&self, kind: RequestKind, name: &ObjectName, member: Option<&str>) -> bool;
}

/// Restrictor permitting everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Restrictor for AllowAll {
    fn is_allowed(&self, _kind: RequestKind, _name: &ObjectName, _member: Option<&str>) -> bool {
        true
    }
}

/// Errors raised while compiling an [`AccessPolicy`].
#[derive(Debug, Error)]
pub enum RestrictorError {
    /// The directive names an unknown request kind.
    #[error("directive '{directive}' names unknown request kind '{kind}'")]
    InvalidKind {
        /// Rendered directive.
        directive: String,
        /// Offending kind.
        kind: String,
    },
    /// The directive's object pattern does not parse.
    #[error("directive '{directive}' has an invalid object pattern: {source}")]
    InvalidPattern {
        /// Rendered directive.
        directive: String,
        /// Parse failure.
        #[source]
        source: ObjectNameError,
    },
}

struct CompiledRule {
    kind: Option<RequestKind>,
    object: ObjectName,
    member: Option<String>,
    allow: bool,
}

impl CompiledRule {
    fn compile(directive: &AccessDirective) -> Result<Self, RestrictorError> {
        let kind = if directive.applies_to_any_kind() {
            None
        } else {
            let parsed = RequestKind::from_str(&directive.kind).map_err(|_| {
                RestrictorError::InvalidKind {
                    directive: directive.to_string(),
                    kind: directive.kind.clone(),
                }
            })?;
            Some(parsed)
        };
        let object = ObjectName::parse(&directive.object).map_err(|source| {
            RestrictorError::InvalidPattern {
                directive: directive.to_string(),
                source,
            }
        })?;
        Ok(Self {
            kind,
            object,
            member: directive.member.clone(),
            allow: directive.directive == AccessOverride::Allow,
        })
    }

    fn applies(&self, kind: RequestKind, name: &ObjectName, member: Option<&str>) -> bool {
        self.kind.is_none_or(|rule_kind| rule_kind == kind)
            && self.object.matches(name)
            && match (&self.member, member) {
                (None, _) => true,
                (Some(rule_member), Some(member)) => rule_member == member,
                (Some(_), None) => false,
            }
    }
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CompiledRule")
            .field("kind", &self.kind)
            .field("object", &self.object.canonical())
            .field("member", &self.member)
            .field("allow", &self.allow)
            .finish()
    }
}

/// Restrictor evaluating configured directives; the last matching directive
/// decides and requests matching none are allowed.
#[derive(Debug, Default)]
pub struct PolicyRestrictor {
    rules: Vec<CompiledRule>,
}

impl PolicyRestrictor {
    /// Compiles a policy.
    ///
    /// # Errors
    ///
    /// Returns a [`RestrictorError`] for the first directive that names an
    /// unknown kind or carries an unparsable object pattern.
    pub fn from_policy(policy: &AccessPolicy) -> Result<Self, RestrictorError> {
        let rules = policy
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Number of compiled rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` when no rule is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Restrictor for PolicyRestrictor {
    fn is_allowed(&self, kind: RequestKind, name: &ObjectName, member: Option<&str>) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.applies(kind, name, member))
            .is_none_or(|rule| rule.allow)
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    fn name(text: &str) -> ObjectName {
        ObjectName::parse(text).expect("valid object name")
    }

    fn policy(directives: &[&str]) -> AccessPolicy {
        let parsed: Vec<AccessDirective> = directives
            .iter()
            .map(|directive| directive.parse().expect("valid directive"))
            .collect();
        AccessPolicy::from_directives(&parsed)
    }

    #[fixture]
    fn restrictor() -> PolicyRestrictor {
        PolicyRestrictor::from_policy(&policy(&[
            "*@secret:*=deny",
            "read@secret:type=Public=allow",
            "write@app:type=Cache#Size=deny",
        ]))
        .expect("compile policy")
    }

    #[rstest]
    #[case(RequestKind::Read, "secret:type=Vault", None, false)]
    #[case(RequestKind::Read, "secret:type=Public", None, true)]
    #[case(RequestKind::Write, "secret:type=Public", Some("Flag"), false)]
    #[case(RequestKind::Write, "app:type=Cache", Some("Size"), false)]
    #[case(RequestKind::Write, "app:type=Cache", Some("Ttl"), true)]
    #[case(RequestKind::Read, "app:type=Cache", Some("Size"), true)]
    #[case(RequestKind::Exec, "other:type=Thing", Some("run"), true)]
    fn last_matching_rule_decides(
        restrictor: PolicyRestrictor,
        #[case] kind: RequestKind,
        #[case] target: &str,
        #[case] member: Option<&str>,
        #[case] expected: bool,
    ) {
        assert_eq!(restrictor.is_allowed(kind, &name(target), member), expected);
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let error = PolicyRestrictor::from_policy(&policy(&["notify@app:*=deny"]))
            .expect_err("unknown kind");
        assert!(matches!(error, RestrictorError::InvalidKind { .. }));
    }

    #[test]
    fn empty_policy_allows_everything() {
        let restrictor = PolicyRestrictor::default();
        assert!(restrictor.is_empty());
        assert!(restrictor.is_allowed(RequestKind::Write, &name("app:type=A"), Some("x")));
    }
}
