use crate::error::DataError;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Default bound on consecutive resynchronisation attempts before surfacing
/// [`DataError::ResyncExhausted`].
pub const DEFAULT_MAX_RESYNC_ATTEMPTS: u32 = 3;

/// An L2 delta carrying venue-assigned first/last update identifiers.
pub trait SequencedUpdate {
    fn first_update_id(&self) -> u64;
    fn last_update_id(&self) -> u64;
}

/// Outcome of validating a streamed delta against the current synchronisation state.
#[derive(Debug, Eq, PartialEq)]
pub enum SequenceAction<Update> {
    /// Update buffered: the REST snapshot has not arrived yet.
    Buffered,
    /// Update is stale relative to the snapshot and was dropped.
    Dropped,
    /// Update follows on from the last applied state and should be applied.
    Apply(Update),
}

/// Snapshot-first reconciliation state for one `(venue, pair, asset)` book.
///
/// Lifecycle: created on first subscription with `fetching_snapshot=true`, buffering every
/// incoming delta. Once the REST snapshot arrives, buffered deltas that predate it are dropped,
/// the overlap is verified, and the survivors are replayed in order before
/// `initial_sync_complete` flips. Divergence later in the stream calls
/// [`invalidate`](Self::invalidate), which restarts the cycle under a bounded retry budget and a
/// re-entrancy guard.
#[derive(Debug)]
pub struct SyncState<Update> {
    pub fetching_snapshot: bool,
    pub initial_sync_complete: bool,
    pub resync_in_progress: bool,
    pub last_update_id: u64,
    buffered: VecDeque<Update>,
    retries: u32,
    max_retries: u32,
}

impl<Update> Default for SyncState<Update>
where
    Update: SequencedUpdate,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Update> SyncState<Update>
where
    Update: SequencedUpdate,
{
    /// Construct a new [`SyncState`] awaiting its first REST snapshot.
    pub fn new() -> Self {
        Self {
            fetching_snapshot: true,
            initial_sync_complete: false,
            resync_in_progress: false,
            last_update_id: 0,
            buffered: VecDeque::new(),
            retries: 0,
            max_retries: DEFAULT_MAX_RESYNC_ATTEMPTS,
        }
    }

    /// Override the bounded resynchronisation retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Feed a streamed delta through the state machine.
    ///
    /// While the snapshot is in flight the delta is buffered. After initial sync, a delta must
    /// start at or before `last_update_id + 1` and advance past `last_update_id` (venues allow
    /// the delta straddling a snapshot boundary to overlap it); fully covered deltas are
    /// dropped and gaps surface as [`DataError::InvalidSequence`].
    pub fn process(&mut self, update: Update) -> Result<SequenceAction<Update>, DataError> {
        if self.fetching_snapshot {
            self.buffered.push_back(update);
            return Ok(SequenceAction::Buffered);
        }

        if update.last_update_id() <= self.last_update_id {
            return Ok(SequenceAction::Dropped);
        }

        let expected_next = self.last_update_id + 1;
        if update.first_update_id() > expected_next {
            return Err(DataError::InvalidSequence {
                prev_last_update_id: self.last_update_id,
                first_update_id: update.first_update_id(),
            });
        }

        self.last_update_id = update.last_update_id();
        Ok(SequenceAction::Apply(update))
    }

    /// Reconcile the arrived REST snapshot with the buffered deltas.
    ///
    /// Buffered deltas entirely covered by the snapshot are dropped. The first retained delta
    /// must straddle `snapshot_last_update_id + 1`; otherwise the snapshot is discarded and the
    /// caller restarts the fetch (bounded by the retry budget).
    pub fn apply_snapshot(
        &mut self,
        snapshot_last_update_id: u64,
    ) -> Result<Vec<Update>, DataError> {
        let buffered = std::mem::take(&mut self.buffered);
        let retained = buffered
            .into_iter()
            .filter(|update| update.last_update_id() > snapshot_last_update_id)
            .collect::<Vec<_>>();

        let expected_next = snapshot_last_update_id + 1;
        let stale_snapshot = retained.first().is_some_and(|first| {
            !(first.first_update_id() <= expected_next && first.last_update_id() >= expected_next)
        });
        // Replayed deltas must also chain onto each other without gaps
        let chain_gap = retained
            .windows(2)
            .any(|pair| pair[1].first_update_id() > pair[0].last_update_id() + 1);
        if stale_snapshot || chain_gap {
            let first_update_id = retained
                .first()
                .map(SequencedUpdate::first_update_id)
                .unwrap_or(expected_next);
            warn!(
                snapshot_last_update_id,
                first_update_id,
                "snapshot could not be reconciled with buffered deltas - discarding and re-fetching"
            );
            // Snapshot discarded: keep buffering and let the caller re-fetch
            self.buffered = retained.into_iter().collect();
            self.register_retry()?;
            return Err(DataError::InvalidSequence {
                prev_last_update_id: snapshot_last_update_id,
                first_update_id,
            });
        }

        self.last_update_id = retained
            .last()
            .map(SequencedUpdate::last_update_id)
            .unwrap_or(snapshot_last_update_id);
        self.fetching_snapshot = false;
        self.initial_sync_complete = true;
        self.resync_in_progress = false;
        self.retries = 0;

        debug!(
            snapshot_last_update_id,
            replayed = retained.len(),
            "orderbook initial sync complete"
        );
        Ok(retained)
    }

    /// Invalidate the book after divergence (sequence gap or checksum mismatch), restarting the
    /// snapshot-first cycle.
    ///
    /// The `resync_in_progress` guard suppresses re-entrant invalidations while a resync is
    /// already underway.
    pub fn invalidate(&mut self) -> Result<bool, DataError> {
        if self.resync_in_progress {
            return Ok(false);
        }

        self.register_retry()?;
        self.resync_in_progress = true;
        self.fetching_snapshot = true;
        self.initial_sync_complete = false;
        self.last_update_id = 0;
        self.buffered.clear();
        Ok(true)
    }

    /// Determine if this book is awaiting a fresh snapshot.
    pub fn needs_snapshot(&self) -> bool {
        self.fetching_snapshot
    }

    fn register_retry(&mut self) -> Result<(), DataError> {
        self.retries += 1;
        if self.retries > self.max_retries {
            return Err(DataError::ResyncExhausted {
                retries: self.retries - 1,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Eq, PartialEq)]
    struct StubUpdate {
        first: u64,
        last: u64,
    }

    impl SequencedUpdate for StubUpdate {
        fn first_update_id(&self) -> u64 {
            self.first
        }

        fn last_update_id(&self) -> u64 {
            self.last
        }
    }

    fn update(first: u64, last: u64) -> StubUpdate {
        StubUpdate { first, last }
    }

    #[test]
    fn test_buffer_until_snapshot_then_drop_stale_and_replay() {
        let mut state = SyncState::new();

        // Deltas arriving before the snapshot are buffered
        assert_eq!(state.process(update(157, 160)).unwrap(), SequenceAction::Buffered);
        assert_eq!(state.process(update(161, 165)).unwrap(), SequenceAction::Buffered);

        // Snapshot with last_update_id=161: the 157-160 delta is entirely covered and dropped,
        // 161-165 straddles 162 and is replayed
        let replayed = state.apply_snapshot(161).unwrap();
        assert_eq!(replayed, vec![update(161, 165)]);
        assert!(state.initial_sync_complete);
        assert_eq!(state.last_update_id, 165);
    }

    #[test]
    fn test_stale_snapshot_is_discarded_for_refetch() {
        let mut state = SyncState::new();

        // The first retained delta starts after snapshot+1 => gap => discard snapshot
        assert_eq!(state.process(update(170, 175)).unwrap(), SequenceAction::Buffered);
        assert!(matches!(
            state.apply_snapshot(161),
            Err(DataError::InvalidSequence { .. })
        ));
        assert!(state.needs_snapshot());
    }

    #[test]
    fn test_gapped_buffer_discards_snapshot() {
        let mut state = SyncState::new();

        // Buffered deltas with a gap between 165 and 170
        assert_eq!(state.process(update(161, 165)).unwrap(), SequenceAction::Buffered);
        assert_eq!(state.process(update(170, 175)).unwrap(), SequenceAction::Buffered);

        assert!(matches!(
            state.apply_snapshot(161),
            Err(DataError::InvalidSequence { .. })
        ));
        assert!(state.needs_snapshot());
    }

    #[test]
    fn test_post_sync_sequencing() {
        let mut state = SyncState::new();
        state.apply_snapshot(100).unwrap();

        // Stale delta dropped
        assert_eq!(state.process(update(90, 100)).unwrap(), SequenceAction::Dropped);

        // Contiguous delta applied
        assert_eq!(
            state.process(update(101, 110)).unwrap(),
            SequenceAction::Apply(update(101, 110))
        );
        assert_eq!(state.last_update_id, 110);

        // Gap surfaces InvalidSequence
        assert!(matches!(
            state.process(update(120, 130)),
            Err(DataError::InvalidSequence {
                prev_last_update_id: 110,
                first_update_id: 120,
            })
        ));
    }

    #[test]
    fn test_invalidate_guard_and_retry_bound() {
        let mut state = SyncState::<StubUpdate>::new().with_max_retries(2);
        state.apply_snapshot(100).unwrap();

        // First invalidation restarts the cycle
        assert!(state.invalidate().unwrap());
        assert!(state.needs_snapshot());

        // Re-entrant invalidation is suppressed while resync is in progress
        assert!(!state.invalidate().unwrap());

        // Completing the resync clears the guard and resets the retry budget
        state.apply_snapshot(200).unwrap();
        assert!(state.invalidate().unwrap());
    }

    #[test]
    fn test_repeated_stale_snapshots_exhaust_retries() {
        let mut state = SyncState::new().with_max_retries(2);

        // Buffered delta far ahead of every snapshot the venue returns
        assert_eq!(state.process(update(500, 510)).unwrap(), SequenceAction::Buffered);

        assert!(matches!(
            state.apply_snapshot(100),
            Err(DataError::InvalidSequence { .. })
        ));
        assert!(matches!(
            state.apply_snapshot(101),
            Err(DataError::InvalidSequence { .. })
        ));

        // Third stale snapshot exceeds the retry budget
        assert!(matches!(
            state.apply_snapshot(102),
            Err(DataError::ResyncExhausted { .. })
        ));
    }
}
