#![forbid(unsafe_code)]

//! Behavioural knobs for suspendable entities.
//!
//! Defaults follow the strict coalescing contract: a release after any
//! suspended mutation notifies, and list changes are merged into the smallest
//! exact multi-span description.

use std::env;

/// How a burst of list edits is folded into one change on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Keep disjoint regions as separate spans.
    #[default]
    Faithful,
    /// Widen everything into one span from the first to the last touched
    /// index. Untouched elements inside the window appear as both removed and
    /// added.
    SingleSpan,
}

impl MergePolicy {
    /// Parse the textual form used by `QUIESCE_MERGE_POLICY`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "faithful" | "multi-span" => Some(Self::Faithful),
            "single-span" | "single" | "coarse" => Some(Self::SingleSpan),
            _ => None,
        }
    }
}

/// Configuration shared by values, bindings, and lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspendConfig {
    /// Skip the release notification when the net effect of the suspended
    /// mutations is nothing at all (value equal to its pre-suspension value,
    /// or a list change whose spans remove exactly what they add).
    /// Default: false.
    pub suppress_noop: bool,

    /// List merge granularity.
    /// Default: [`MergePolicy::Faithful`].
    pub merge_policy: MergePolicy,
}

impl Default for SuspendConfig {
    fn default() -> Self {
        Self {
            suppress_noop: false,
            merge_policy: MergePolicy::Faithful,
        }
    }
}

impl SuspendConfig {
    /// Defaults overridden by `QUIESCE_SUPPRESS_NOOP` and
    /// `QUIESCE_MERGE_POLICY` when they are set and parse.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = env::var("QUIESCE_SUPPRESS_NOOP") {
            config.suppress_noop = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(val) = env::var("QUIESCE_MERGE_POLICY")
            && let Some(policy) = MergePolicy::parse(&val)
        {
            config.merge_policy = policy;
        }
        config
    }

    #[must_use]
    pub fn with_suppress_noop(mut self, suppress: bool) -> Self {
        self.suppress_noop = suppress;
        self
    }

    #[must_use]
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SuspendConfig::default();
        assert!(!config.suppress_noop);
        assert_eq!(config.merge_policy, MergePolicy::Faithful);
    }

    #[test]
    fn builders_chain() {
        let config = SuspendConfig::default()
            .with_suppress_noop(true)
            .with_merge_policy(MergePolicy::SingleSpan);
        assert!(config.suppress_noop);
        assert_eq!(config.merge_policy, MergePolicy::SingleSpan);
    }

    #[test]
    fn merge_policy_parse() {
        assert_eq!(MergePolicy::parse("faithful"), Some(MergePolicy::Faithful));
        assert_eq!(
            MergePolicy::parse(" Single-Span "),
            Some(MergePolicy::SingleSpan)
        );
        assert_eq!(MergePolicy::parse("coarse"), Some(MergePolicy::SingleSpan));
        assert_eq!(MergePolicy::parse("sometimes"), None);
    }
}
