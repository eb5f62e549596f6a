//! Local-time projection of the transition table.
//!
//! Resolving a wall-clock time needs the transitions expressed in local time,
//! but around each transition two local readings are possible (the one under
//! the old offset and the one under the new offset). Both are precomputed here:
//!
//! - `[0]` (fold = earlier) uses the larger of the two offsets, so a time in a
//!   fold keeps the pre-transition record and a time in a gap gets the
//!   pre-transition record too.
//! - `[1]` (fold = later) uses the smaller offset, switching records at the
//!   start of a fold or a gap.
//!
//! Each array is non-decreasing whenever the UTC array is, which is what makes
//! a binary search over local seconds valid.

use crate::decoder::RawRecord;

/// Project every transition into local seconds for both fold values.
pub fn project_local(trans_utc: &[i64], trans_idx: &[usize], records: &[RawRecord]) -> [Vec<i64>; 2] {
    if trans_utc.is_empty() {
        return [Vec::new(), Vec::new()];
    }

    let mut earlier = Vec::with_capacity(trans_utc.len());
    let mut later = Vec::with_capacity(trans_utc.len());

    let mut prev_offset = records[0].utc_offset;
    for (&utc, &idx) in trans_utc.iter().zip(trans_idx) {
        let cur_offset = records[idx].utc_offset;
        earlier.push(utc.saturating_add(prev_offset.max(cur_offset)));
        later.push(utc.saturating_add(prev_offset.min(cur_offset)));
        prev_offset = cur_offset;
    }

    [earlier, later]
}
