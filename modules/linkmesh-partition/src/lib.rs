pub mod detector;
pub mod range;

pub use detector::{Fixed, FromHostname, PartitionDetector};
pub use range::Range;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PartitionError {
    #[error("range start UUID must be less than the end UUID")]
    InvalidRange,

    #[error("number of partitions must be at least 1")]
    InvalidPartitionCount,

    #[error("invalid partition index {0}")]
    InvalidPartition(usize),

    #[error("no partition data available yet")]
    NoPartitionData,

    #[error("partition detector: {0}")]
    Detect(String),
}
