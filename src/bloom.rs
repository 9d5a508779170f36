//! Bloom pre-filter (§4.2): `mightMatch(logsBloom, filters) -> bool`.
//!
//! Pure function, no I/O. Grounded on `alloy_primitives::Bloom`'s
//! `contains_input`, the same probabilistic membership test `reth` uses to
//! pre-screen blocks before running a full log filter (see
//! `other_examples/` reth `filter.rs` for the equivalent pattern in a
//! production indexer).

use alloy::primitives::BloomInput;

use crate::types::entities::Log;
use crate::types::filter::LogFilterSpec;
use crate::types::primitives::Bloom;

/// Whether `logs_bloom` might contain a log matching at least one of
/// `filters`.
///
/// For each filter, the bloom must contain the filter's address AND, for
/// every non-[`crate::types::filter::TopicFilter::Any`] topic position, at
/// least one of that position's allowed values. False positives are
/// permitted (§4.2); false negatives are not, so every check here is a
/// bloom membership test, never an exact-match shortcut.
#[must_use]
pub fn might_match(logs_bloom: &Bloom, filters: &[LogFilterSpec]) -> bool {
    filters.iter().any(|filter| filter_might_match(logs_bloom, filter))
}

fn filter_might_match(logs_bloom: &Bloom, filter: &LogFilterSpec) -> bool {
    let address_matches =
        logs_bloom.contains_input(BloomInput::Raw(filter.address.as_slice()));
    address_matches && filter.topics.iter().all(|t| t.might_match_bloom(logs_bloom))
}

/// Build a bloom that covers `log`, for use in tests that need a
/// `logsBloom` a given filter is guaranteed (or guaranteed not) to pass.
#[cfg(test)]
fn bloom_covering(log: &Log) -> Bloom {
    let mut b = Bloom::ZERO;
    b.accrue(BloomInput::Raw(log.address.as_slice()));
    for topic in log.topics.iter().flatten() {
        b.accrue(BloomInput::Raw(topic.as_slice()));
    }
    b
}
