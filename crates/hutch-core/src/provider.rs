//! The contract between collection cycles and the management API.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::StatRecord;

/// Source of raw stat records for a monitored domain.
///
/// Implementations must return, for every record, a label entry for each key
/// in `label_keys` (an empty string when the upstream value is missing).
#[async_trait]
pub trait StatsProvider: Send + Sync {
    async fn fetch(
        &self,
        domain: &str,
        label_keys: &[&str],
    ) -> Result<Vec<StatRecord>, FetchError>;
}
