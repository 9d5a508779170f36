//! Log filter (§4.3): `filter(logs, filters) -> logs`.
//!
//! Pure function, no I/O. A log matches a filter iff its address equals the
//! filter's address and every topic position satisfies that position's
//! constraint. Result order is stable with respect to input order (§4.3:
//! "downstream relies on canonical log ordering within a block").

use crate::types::entities::Log;
use crate::types::filter::LogFilterSpec;

/// Logs in `logs` that match at least one filter in `filters`, preserving
/// input order and without duplicating a log that matches more than one
/// filter.
#[must_use]
pub fn filter(logs: &[Log], filters: &[LogFilterSpec]) -> Vec<Log> {
    logs.iter()
        .filter(|log| filters.iter().any(|f| log_matches(log, f)))
        .cloned()
        .collect()
}

fn log_matches(log: &Log, filter: &LogFilterSpec) -> bool {
    log.address == filter.address
        && filter
            .topics
            .iter()
            .zip(log.topics)
            .all(|(constraint, topic)| constraint.matches(topic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::filter::TopicFilter;
    use crate::types::primitives::{Address, B256, BlockNumber};

    fn log(address: Address, topics: [Option<B256>; 4], log_index: u64) -> Log {
        Log {
            log_id: format!("log-{log_index}"),
            log_sort_key: i64::from(log_index),
            address,
            data: Vec::new(),
            topics,
            block_hash: B256::ZERO,
            block_number: BlockNumber::new(1),
            block_timestamp: None,
            log_index,
            transaction_hash: B256::ZERO,
            transaction_index: 0,
            removed: false,
        }
    }

    fn any_filter(address: Address) -> LogFilterSpec {
        LogFilterSpec {
            key: "k".into(),
            address,
            topics: [
                TopicFilter::Any,
                TopicFilter::Any,
                TopicFilter::Any,
                TopicFilter::Any,
            ],
            end_block: None,
        }
    }

    #[test]
    fn matches_by_address_only_when_topics_are_any() {
        let address = Address::repeat_byte(1);
        let other = Address::repeat_byte(2);
        let logs = vec![
            log(address, [None, None, None, None], 0),
            log(other, [None, None, None, None], 1),
        ];
        let matched = filter(&logs, &[any_filter(address)]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].log_index, 0);
    }

    #[test]
    fn matches_specific_topic0() {
        let address = Address::repeat_byte(1);
        let sig = B256::repeat_byte(9);
        let other_sig = B256::repeat_byte(8);
        let logs = vec![
            log(address, [Some(sig), None, None, None], 0),
            log(address, [Some(other_sig), None, None, None], 1),
        ];
        let spec = LogFilterSpec {
            key: "k".into(),
            address,
            topics: [
                TopicFilter::OneOf(vec![sig]),
                TopicFilter::Any,
                TopicFilter::Any,
                TopicFilter::Any,
            ],
            end_block: None,
        };
        let matched = filter(&logs, &[spec]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].log_index, 0);
    }

    #[test]
    fn preserves_input_order() {
        let address = Address::repeat_byte(1);
        let logs = vec![
            log(address, [None, None, None, None], 5),
            log(address, [None, None, None, None], 2),
            log(address, [None, None, None, None], 9),
        ];
        let matched = filter(&logs, &[any_filter(address)]);
        let indices: Vec<u64> = matched.iter().map(|l| l.log_index).collect();
        assert_eq!(indices, vec![5, 2, 9]);
    }

    #[test]
    fn a_log_matching_two_filters_is_not_duplicated() {
        let address = Address::repeat_byte(1);
        let logs = vec![log(address, [None, None, None, None], 0)];
        let matched = filter(&logs, &[any_filter(address), any_filter(address)]);
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn empty_logs_yields_empty_result() {
        assert!(filter(&[], &[any_filter(Address::ZERO)]).is_empty());
    }
}
