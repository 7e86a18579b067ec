use std::env;

use crate::PartitionError;

/// Assigns a clustered crawler instance to a partition.
pub trait PartitionDetector: Send + Sync {
    /// Returns `(assigned partition, total partitions)`.
    ///
    /// `PartitionError::NoPartitionData` signals that the cluster topology is
    /// not known yet; callers should skip the current work cycle and retry.
    fn partition_info(&self) -> Result<(usize, usize), PartitionError>;
}

/// Detector that always reports the same partition assignment. Used for
/// single-node deployments and tests.
#[derive(Debug, Clone, Copy)]
pub struct Fixed {
    pub partition: usize,
    pub num_partitions: usize,
}

impl PartitionDetector for Fixed {
    fn partition_info(&self) -> Result<(usize, usize), PartitionError> {
        Ok((self.partition, self.num_partitions))
    }
}

/// Detector for StatefulSet-style deployments: the assigned partition is the
/// ordinal suffix of the pod hostname (`crawler-3` → partition 3) and the
/// replica total comes from an environment variable kept in sync with the
/// StatefulSet spec.
pub struct FromHostname {
    total_env_var: String,
}

impl FromHostname {
    pub fn new() -> Self {
        Self::with_env_var("NUM_PARTITIONS")
    }

    pub fn with_env_var(total_env_var: &str) -> Self {
        Self {
            total_env_var: total_env_var.to_string(),
        }
    }
}

impl Default for FromHostname {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionDetector for FromHostname {
    fn partition_info(&self) -> Result<(usize, usize), PartitionError> {
        let hostname = env::var("HOSTNAME").map_err(|_| PartitionError::NoPartitionData)?;
        let partition = ordinal_suffix(&hostname)?;

        let total: usize = match env::var(&self.total_env_var) {
            Err(_) => return Err(PartitionError::NoPartitionData),
            Ok(raw) => raw.parse().map_err(|_| {
                PartitionError::Detect(format!("{} is not a number: {raw}", self.total_env_var))
            })?,
        };

        if partition >= total {
            return Err(PartitionError::Detect(format!(
                "hostname ordinal {partition} exceeds partition count {total}"
            )));
        }

        Ok((partition, total))
    }
}

/// Parse the trailing `-<ordinal>` of a StatefulSet pod hostname.
fn ordinal_suffix(hostname: &str) -> Result<usize, PartitionError> {
    hostname
        .rsplit('-')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .ok_or_else(|| {
            PartitionError::Detect(format!(
                "unable to extract partition number from hostname {hostname:?}"
            ))
        })
}
