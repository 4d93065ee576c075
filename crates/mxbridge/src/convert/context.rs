//! Traversal budget for a single conversion.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use mxbridge_config::{
    Config, DEFAULT_MAX_COLLECTION_SIZE, DEFAULT_MAX_DEPTH, DEFAULT_MAX_OBJECTS,
};

/// Caps applied while serialising a value. `0` disables a cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionLimits {
    /// Maximum number of nested composite levels.
    pub max_depth: usize,
    /// Maximum number of elements kept from a sequence or map.
    pub max_collection_size: usize,
    /// Maximum number of composites expanded in one conversion.
    pub max_objects: usize,
}

impl Default for ConversionLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_collection_size: DEFAULT_MAX_COLLECTION_SIZE,
            max_objects: DEFAULT_MAX_OBJECTS,
        }
    }
}

impl ConversionLimits {
    /// Limits configured for the agent.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            max_depth: config.max_depth,
            max_collection_size: config.max_collection_size,
            max_objects: config.max_objects,
        }
    }

    /// Applies per-request overrides.
    #[must_use]
    pub fn with_overrides(self, overrides: &LimitOverrides) -> Self {
        Self {
            max_depth: overrides.max_depth.unwrap_or(self.max_depth),
            max_collection_size: overrides
                .max_collection_size
                .unwrap_or(self.max_collection_size),
            max_objects: overrides.max_objects.unwrap_or(self.max_objects),
        }
    }
}

/// Limits a request may override, as carried in its `config` member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOverrides {
    /// Replaces [`ConversionLimits::max_depth`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Replaces [`ConversionLimits::max_collection_size`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_collection_size: Option<usize>,
    /// Replaces [`ConversionLimits::max_objects`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_objects: Option<usize>,
}

impl LimitOverrides {
    /// Returns `true` when no limit is overridden.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.max_depth.is_none() && self.max_collection_size.is_none() && self.max_objects.is_none()
    }
}

/// Mutable state threaded through one conversion.
#[derive(Debug)]
pub struct ConversionContext {
    limits: ConversionLimits,
    depth: usize,
    objects: usize,
    visited: HashSet<usize>,
}

impl ConversionContext {
    /// Starts a conversion at depth zero.
    #[must_use]
    pub fn new(limits: ConversionLimits) -> Self {
        Self {
            limits,
            depth: 0,
            objects: 0,
            visited: HashSet::new(),
        }
    }

    /// Limits in force.
    #[must_use]
    pub const fn limits(&self) -> ConversionLimits {
        self.limits
    }

    /// Number of composite levels currently open.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Whether another composite level may be opened.
    #[must_use]
    pub const fn can_descend(&self) -> bool {
        (self.limits.max_depth == 0 || self.depth < self.limits.max_depth)
            && (self.limits.max_objects == 0 || self.objects < self.limits.max_objects)
    }

    /// Number of elements of a collection of `len` that may be emitted.
    #[must_use]
    pub const fn collection_budget(&self, len: usize) -> usize {
        if self.limits.max_collection_size == 0 || len <= self.limits.max_collection_size {
            len
        } else {
            self.limits.max_collection_size
        }
    }

    /// Returns `true` if the identity is being expanded further up the branch.
    #[must_use]
    pub fn is_visited(&self, identity: usize) -> bool {
        self.visited.contains(&identity)
    }

    pub(crate) fn enter(&mut self, identity: Option<usize>) {
        self.depth += 1;
        self.objects += 1;
        if let Some(identity) = identity {
            self.visited.insert(identity);
        }
    }

    pub(crate) fn leave(&mut self, identity: Option<usize>) {
        self.depth = self.depth.saturating_sub(1);
        if let Some(identity) = identity {
            self.visited.remove(&identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 100, 100)]
    #[case(10, 100, 10)]
    #[case(10, 3, 3)]
    fn collection_budget_honours_cap(#[case] cap: usize, #[case] len: usize, #[case] expected: usize) {
        let context = ConversionContext::new(ConversionLimits {
            max_collection_size: cap,
            ..ConversionLimits::default()
        });
        assert_eq!(context.collection_budget(len), expected);
    }

    #[test]
    fn object_cap_stops_descent() {
        let mut context = ConversionContext::new(ConversionLimits {
            max_objects: 1,
            ..ConversionLimits::default()
        });
        assert!(context.can_descend());
        context.enter(None);
        context.leave(None);
        assert!(!context.can_descend());
    }

    #[test]
    fn overrides_replace_only_given_limits() {
        let overrides: LimitOverrides =
            serde_json::from_str(r#"{"maxDepth": 2}"#).expect("parse overrides");
        let limits = ConversionLimits::default().with_overrides(&overrides);
        assert_eq!(limits.max_depth, 2);
        assert_eq!(limits.max_collection_size, DEFAULT_MAX_COLLECTION_SIZE);
    }
}
