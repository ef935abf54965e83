//! Subscription filters
//!
//! A filter spec is either empty (every event type) or a comma-separated list
//! of type tags such as `"session, weekly_summary"`. Tokens are trimmed and
//! compared case-sensitively.
//!
//! [`matches`] evaluates a raw spec string with no validation: unknown tokens
//! simply never match. [`SubscriptionFilter`] is the validated form the hub
//! routes on; unknown tokens are rejected when it is parsed.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::FilterError;
use crate::events::EventKind;

/// Raw predicate: does `filter_spec` admit `event_type`?
pub fn matches(event_type: &str, filter_spec: &str) -> bool {
    if filter_spec.is_empty() {
        return true;
    }

    filter_spec.split(',').any(|token| token.trim() == event_type)
}

/// Validated set of event kinds a subscriber receives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Every event type (empty spec)
    #[default]
    All,
    /// Only the listed kinds
    Only(BTreeSet<EventKind>),
}

impl SubscriptionFilter {
    /// Parse a filter spec.
    ///
    /// Empty tokens (e.g. a trailing comma) are skipped; a non-empty spec that
    /// leaves no tokens at all is rejected with [`FilterError::Empty`].
    pub fn parse(spec: &str) -> Result<Self, FilterError> {
        if spec.is_empty() {
            return Ok(Self::All);
        }

        let kinds = spec
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::parse::<EventKind>)
            .collect::<Result<BTreeSet<_>, _>>()?;

        if kinds.is_empty() {
            return Err(FilterError::Empty);
        }

        Ok(Self::Only(kinds))
    }

    pub fn only(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self::Only(kinds.into_iter().collect())
    }

    pub fn accepts(&self, kind: EventKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(kinds) => kinds.contains(&kind),
        }
    }
}

impl FromStr for SubscriptionFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical spec: `""` for all, otherwise tags comma-joined in kind order
impl fmt::Display for SubscriptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => Ok(()),
            Self::Only(kinds) => {
                for (i, kind) in kinds.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(kind.as_str())?;
                }
                Ok(())
            }
        }
    }
}
