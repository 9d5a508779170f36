//! Log filter specifications (§4.2, §4.3, §6 `logFilters[]`).

use serde::{Deserialize, Serialize};

use super::primitives::{Address, B256, BlockNumber};

/// A per-position topic constraint: either "any value matches" or "one of
/// this explicit set matches."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicFilter {
    /// No constraint at this topic position.
    Any,
    /// The log's topic at this position must be one of these values.
    OneOf(Vec<B256>),
}

impl TopicFilter {
    /// Whether `topic` satisfies this constraint. A `None` topic (the log
    /// has fewer than four topics) only satisfies [`TopicFilter::Any`].
    #[must_use]
    pub fn matches(&self, topic: Option<B256>) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(values) => topic.is_some_and(|t| values.contains(&t)),
        }
    }

    /// Whether the bloom filter *might* contain a log satisfying this
    /// constraint (§4.2: false positives allowed, false negatives are not).
    #[must_use]
    pub fn might_match_bloom(&self, bloom: &alloy::primitives::Bloom) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(values) => values
                .iter()
                .any(|t| bloom.contains_input(alloy::primitives::BloomInput::Raw(t.as_slice()))),
        }
    }
}

/// A named log filter: the unit of tracking for cached intervals (§3, §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilterSpec {
    /// Stable identifier for this filter, used as the cached-interval key
    /// namespace and for task/queue bookkeeping.
    pub key: String,
    /// Contract address this filter watches.
    pub address: Address,
    /// Per-position topic constraints, `topics[0]` conventionally being the
    /// event signature hash.
    pub topics: [TopicFilter; 4],
    /// Optional upper bound: once a filter's `end_block` has been fully
    /// indexed, the realtime service no longer needs to track it (§4.4
    /// `start()`, §7 "Configuration exhaustion").
    pub end_block: Option<BlockNumber>,
}

impl LogFilterSpec {
    /// Whether `self` is exhausted relative to `finalized`: its `end_block`
    /// (if any) has already been fully indexed.
    #[must_use]
    pub fn is_exhausted(&self, finalized: BlockNumber) -> bool {
        self.end_block.is_some_and(|end| end <= finalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_topic_matches_everything() {
        assert!(TopicFilter::Any.matches(None));
        assert!(TopicFilter::Any.matches(Some(B256::ZERO)));
    }

    #[test]
    fn one_of_requires_presence_and_membership() {
        let sig = B256::repeat_byte(0xAB);
        let filter = TopicFilter::OneOf(vec![sig]);
        assert!(filter.matches(Some(sig)));
        assert!(!filter.matches(Some(B256::ZERO)));
        assert!(!filter.matches(None));
    }

    #[test]
    fn exhaustion_checks_end_block_against_finalized() {
        let spec = LogFilterSpec {
            key: "k".into(),
            address: Address::ZERO,
            topics: [TopicFilter::Any, TopicFilter::Any, TopicFilter::Any, TopicFilter::Any],
            end_block: Some(BlockNumber::new(100)),
        };
        assert!(spec.is_exhausted(BlockNumber::new(100)));
        assert!(spec.is_exhausted(BlockNumber::new(200)));
        assert!(!spec.is_exhausted(BlockNumber::new(50)));
    }

    #[test]
    fn no_end_block_never_exhausted() {
        let spec = LogFilterSpec {
            key: "k".into(),
            address: Address::ZERO,
            topics: [TopicFilter::Any, TopicFilter::Any, TopicFilter::Any, TopicFilter::Any],
            end_block: None,
        };
        assert!(!spec.is_exhausted(BlockNumber::new(u64::MAX)));
    }
}
