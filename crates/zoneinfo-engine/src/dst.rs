//! DST inference -- recover how much of each DST record's offset is daylight saving.
//!
//! TZif stores only an `isdst` flag per local time type. The size of the
//! daylight delta is recovered by comparing each DST record with the standard
//! record it was switched to from (or, failing that, back to).

use crate::decoder::RawRecord;

/// Delta used when no neighbouring standard record can be found.
pub const DEFAULT_DST_SECONDS: i64 = 3600;

/// Compute one DST delta (in seconds) per record.
///
/// Standard records always get 0. For a DST record the delta is its UTC offset
/// minus the offset of the standard record active immediately before the first
/// transition into it; if the preceding record is itself DST, the record active
/// immediately after is used instead. Records that are never resolved this way
/// (synthetic or degenerate files) fall back to [`DEFAULT_DST_SECONDS`].
pub fn infer_dst_offsets(trans_idx: &[usize], records: &[RawRecord]) -> Vec<i64> {
    let mut dst_offsets = vec![0i64; records.len()];
    let dst_count = records.iter().filter(|r| r.is_dst).count();
    let mut found = 0;

    for (i, &idx) in trans_idx.iter().enumerate() {
        if found == dst_count {
            break;
        }

        let record = &records[idx];
        if !record.is_dst || dst_offsets[idx] != 0 {
            continue;
        }

        let mut delta = 0;
        if let Some(prev) = i.checked_sub(1).map(|p| &records[trans_idx[p]]) {
            if !prev.is_dst {
                delta = record.utc_offset - prev.utc_offset;
            }
        }

        if delta == 0 {
            if let Some(&next_idx) = trans_idx.get(i + 1) {
                let next = &records[next_idx];
                // DST to DST: leave it for a later transition to resolve.
                if next.is_dst {
                    continue;
                }
                delta = record.utc_offset - next.utc_offset;
            }
        }

        if delta != 0 {
            found += 1;
            dst_offsets[idx] = delta;
        }
    }

    for (idx, record) in records.iter().enumerate() {
        if record.is_dst && dst_offsets[idx] == 0 {
            tracing::warn!(
                record = idx,
                abbreviation = %record.abbreviation,
                "could not infer DST delta from transitions, assuming one hour"
            );
            dst_offsets[idx] = DEFAULT_DST_SECONDS;
        }
    }

    dst_offsets
}
