//! Splitting a byte range into fixed-size parts

use crate::{ClientError, Result};

/// Part size used when the caller does not pick one
pub const DEFAULT_PART_SIZE: u32 = 4 * 1024 * 1024;

/// One part of a transfer; `start` and `end` are inclusive and relative to
/// the transferred range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpec {
    pub index: u32,
    pub start: u64,
    pub end: u64,
}

impl PartSpec {
    /// Bytes covered by the part; never zero
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Partition `[0, total_size)` into parts of `part_size` bytes; the last
/// part holds the remainder
pub fn plan(total_size: u64, part_size: u32) -> Result<Vec<PartSpec>> {
    if part_size == 0 {
        return Err(ClientError::validation("part size must be greater than zero"));
    }

    let part_size = u64::from(part_size);
    let count = total_size.div_ceil(part_size);
    if count > u64::from(u32::MAX) {
        return Err(ClientError::validation(format!(
            "{} bytes in parts of {} exceeds the part limit",
            total_size, part_size
        )));
    }

    Ok((0..count)
        .map(|i| {
            let start = i * part_size;
            PartSpec {
                index: i as u32,
                start,
                end: (start + part_size).min(total_size) - 1,
            }
        })
        .collect())
}

/// Window of a remote object selected for transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Remote position of the first byte
    pub offset: u64,
    pub length: u64,
}

/// Resolve an optional `(offset, size)` pair, where `size` is an exclusive
/// end position, against an object of `object_size` bytes
pub fn resolve_range(object_size: u64, offset: Option<i64>, size: Option<i64>) -> Result<ByteRange> {
    let (offset, size) = match (offset, size) {
        (Some(offset), Some(size)) => (offset, size),
        _ => {
            return Ok(ByteRange {
                offset: 0,
                length: object_size,
            })
        }
    };

    if offset < 0 {
        return Err(ClientError::validation(format!("range offset must be >= 0, got {}", offset)));
    }
    if size < 0 {
        return Err(ClientError::validation(format!("range size must be >= 0, got {}", size)));
    }
    if size <= offset {
        return Err(ClientError::validation(format!(
            "range end {} must be greater than offset {}",
            size, offset
        )));
    }
    if size as u64 > object_size {
        return Err(ClientError::validation(format!(
            "range end {} is past the object size {}",
            size, object_size
        )));
    }

    Ok(ByteRange {
        offset: offset as u64,
        length: (size - offset) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plan_25_bytes_in_parts_of_10() {
        let parts = plan(25, 10).unwrap();
        let spans: Vec<_> = parts.iter().map(|p| (p.index, p.start, p.end)).collect();
        assert_eq!(spans, vec![(0, 0, 9), (1, 10, 19), (2, 20, 24)]);
    }

    #[test]
    fn plan_exact_multiple() {
        let parts = plan(20, 10).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].len(), 10);
    }

    #[test]
    fn plan_empty_object_has_no_parts() {
        assert!(plan(0, 10).unwrap().is_empty());
    }

    #[test]
    fn plan_rejects_zero_part_size() {
        assert!(matches!(plan(10, 0), Err(ClientError::Validation(_))));
    }

    #[test]
    fn plan_rejects_too_many_parts() {
        assert!(matches!(plan(u64::MAX, 1), Err(ClientError::Validation(_))));
    }

    #[test]
    fn range_absent_means_whole_object() {
        assert_eq!(
            resolve_range(100, None, Some(5)).unwrap(),
            ByteRange { offset: 0, length: 100 }
        );
        assert_eq!(
            resolve_range(100, None, None).unwrap(),
            ByteRange { offset: 0, length: 100 }
        );
    }

    #[test]
    fn range_end_is_exclusive() {
        assert_eq!(
            resolve_range(100, Some(10), Some(30)).unwrap(),
            ByteRange { offset: 10, length: 20 }
        );
    }

    #[test]
    fn range_validation() {
        assert!(matches!(resolve_range(100, Some(5), Some(3)), Err(ClientError::Validation(_))));
        assert!(matches!(resolve_range(100, Some(5), Some(5)), Err(ClientError::Validation(_))));
        assert!(matches!(resolve_range(100, Some(-1), Some(3)), Err(ClientError::Validation(_))));
        assert!(matches!(resolve_range(100, Some(0), Some(-3)), Err(ClientError::Validation(_))));
        assert!(matches!(resolve_range(100, Some(0), Some(101)), Err(ClientError::Validation(_))));
    }

    proptest! {
        #[test]
        fn props_plan_partitions_range(total in 0u64..1_000_000, part in 1u32..100_000) {
            let parts = plan(total, part).unwrap();
            prop_assert_eq!(parts.len() as u64, total.div_ceil(u64::from(part)));

            let mut next = 0u64;
            for (i, p) in parts.iter().enumerate() {
                prop_assert_eq!(p.index as usize, i);
                prop_assert_eq!(p.start, next);
                prop_assert!(p.end >= p.start);
                prop_assert!(p.len() <= u64::from(part));
                next = p.end + 1;
            }
            prop_assert_eq!(next, total);

            if let Some(last) = parts.last() {
                let expected = total - u64::from(part) * (parts.len() as u64 - 1);
                prop_assert_eq!(last.len(), expected);
            }
        }
    }
}
