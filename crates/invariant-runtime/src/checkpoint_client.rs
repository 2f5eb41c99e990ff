use invariant_types::JournalEntry;

use crate::error::CheckpointError;

/// Opaque optimistic-concurrency token returned by a successful checkpoint
/// and required by the next one.
pub type CheckpointToken = String;

/// Default per-call payload budget (~6 MiB). Oversize batches are split by
/// [`crate::coordinator::CheckpointCoordinator`] before they ever reach a
/// client implementation.
pub const LIMIT: usize = 6 * 1024 * 1024;

/// The host's checkpoint service, as seen by the core runtime.
///
/// Only the trait and an in-memory test double (`tests/support`) live in
/// this workspace; production transports (HTTP, gRPC, ...) are out of scope
/// (§1).
pub trait CheckpointClient: Send + Sync {
    /// Apply a batch of updates atomically. Must reject a stale `token` with
    /// [`CheckpointError::StaleToken`]. Returns the new token and the full
    /// resulting operation state.
    fn checkpoint(
        &self,
        arn: &str,
        token: &CheckpointToken,
        updates: Vec<JournalEntry>,
    ) -> Result<(CheckpointToken, Vec<JournalEntry>), CheckpointError>;

    /// Paginated read of the current operation state, used when an
    /// invocation starts.
    fn get_state(
        &self,
        arn: &str,
        marker: Option<&str>,
    ) -> Result<(Vec<JournalEntry>, Option<String>), CheckpointError>;
}

/// Rough estimate of a batch's wire size, used by the coordinator to decide
/// whether a split is required. JSON-serializes each entry; an
/// approximation is acceptable since the real limit enforcement happens
/// server-side and this only avoids an obviously oversize call.
pub fn estimate_batch_size(updates: &[JournalEntry]) -> usize {
    updates
        .iter()
        .map(|entry| serde_json::to_vec(entry).map(|b| b.len()).unwrap_or(0))
        .sum()
}
