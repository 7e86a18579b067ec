use uuid::Uuid;

use crate::PartitionError;

/// A carve-up of a contiguous UUID range into equal-weight partitions.
///
/// UUIDs are treated as 128-bit unsigned integers. Each partition holds
/// `(end - start + 1) / n` identifiers; the division remainder stays in the
/// last partition. Extents are closed on both sides, so adjacent partitions
/// share a boundary UUID; the `links(from, to, ..)` storage contract is
/// inclusive and a 128-bit collision on the boundary is improbable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    start: Uuid,
    splits: Vec<Uuid>,
}

impl Range {
    /// Split `[start, end]` into `partitions` sub-ranges.
    pub fn new(start: Uuid, end: Uuid, partitions: usize) -> Result<Self, PartitionError> {
        if start >= end {
            return Err(PartitionError::InvalidRange);
        }
        if partitions == 0 {
            return Err(PartitionError::InvalidPartitionCount);
        }

        let start_num = start.as_u128();
        let span = end.as_u128() - start_num;
        let n = partitions as u128;
        // floor((span + 1) / n) without overflowing when span covers the
        // whole u128 domain: carry one when the remainder wraps.
        let size = span / n + u128::from(span % n + 1 == n);

        let mut splits = Vec::with_capacity(partitions);
        for partition in 1..=partitions as u128 {
            if partition == n {
                splits.push(end);
            } else {
                splits.push(Uuid::from_u128(start_num + size * partition));
            }
        }

        Ok(Self { start, splits })
    }

    /// Split the full UUID space into `partitions` sub-ranges.
    pub fn full(partitions: usize) -> Result<Self, PartitionError> {
        Self::new(Uuid::nil(), Uuid::max(), partitions)
    }

    /// The `[from, to]` extent assigned to `partition`.
    pub fn partition_extents(&self, partition: usize) -> Result<(Uuid, Uuid), PartitionError> {
        if partition >= self.splits.len() {
            return Err(PartitionError::InvalidPartition(partition));
        }
        if partition == 0 {
            return Ok((self.start, self.splits[0]));
        }
        Ok((self.splits[partition - 1], self.splits[partition]))
    }

    /// Number of partitions in this range.
    pub fn partitions(&self) -> usize {
        self.splits.len()
    }
}
