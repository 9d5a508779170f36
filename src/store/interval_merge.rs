//! Shared interval-merge algorithm (§3, §4.1), used by every `EventStore`
//! adapter so the merge semantics are identical regardless of backing
//! storage.

use crate::error::{DomainError, Result};
use crate::types::entities::CachedInterval;

/// Merge `new_interval` into `existing` (all intervals for one contract
/// address), per §4.1's algorithm: read existing, delete them, compute the
/// merged set from the union using the §3 rule, return the set to insert.
///
/// Idempotent: reapplying an already-covered range leaves the set
/// unchanged modulo interval identity.
///
/// # Errors
///
/// Returns [`DomainError::IntervalMergeTimestampMissing`] if a merge step
/// produces an endpoint whose timestamp cannot be sourced from either
/// contributing interval — this indicates invariant corruption and must
/// fail hard rather than guess (§4.1).
pub fn merge(
    existing: Vec<CachedInterval>,
    new_interval: CachedInterval,
) -> Result<Vec<CachedInterval>> {
    let mut pool = existing;
    pool.push(new_interval);
    // Repeatedly fold any pair that touches/overlaps until no pair does.
    // The pool is small in practice (one contract's interval count), so an
    // O(n^2) fixed point is simpler and clearer than an interval tree.
    let mut merged_any = true;
    while merged_any {
        merged_any = false;
        'outer: for i in 0..pool.len() {
            for j in (i + 1)..pool.len() {
                if pool[i].overlaps_or_adjacent(&pool[j]) {
                    let merged = pool[i].merge(&pool[j]).ok_or_else(|| {
                        DomainError::IntervalMergeTimestampMissing {
                            contract_address: pool[i].contract_address.to_string(),
                            merged_end: pool[i].end_block.max(pool[j].end_block).get(),
                        }
                    })?;
                    pool.remove(j);
                    pool.remove(i);
                    pool.push(merged);
                    merged_any = true;
                    break 'outer;
                }
            }
        }
    }
    pool.sort_by_key(|iv| iv.start_block);
    Ok(pool)
}
