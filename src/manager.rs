use crate::schedule::{
    PendingWeek, RawWeek, SavePayload, Schedule, ScheduleStats, SlotStatus,
};
use crate::store::TimetableStore;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("no slot at week {week}, day {day}, slot {slot}")]
    InvalidReference { week: usize, day: usize, slot: usize },

    #[error("status cannot move from {from} to {to}")]
    InvalidTransition { from: SlotStatus, to: SlotStatus },

    #[error("a commit is already in flight")]
    CommitInProgress,

    #[error("commit failed: {0}")]
    CommitFailed(String),

    #[error("identity key must not be empty")]
    MissingIdentity,

    /// The schedule was reloaded while this commit was in flight.
    #[error("commit {0} was superseded by a reload")]
    CommitSuperseded(u64),
}

impl ScheduleError {
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::InvalidReference { .. } => "invalid_reference",
            ScheduleError::InvalidTransition { .. } => "invalid_transition",
            ScheduleError::CommitInProgress => "commit_in_progress",
            ScheduleError::CommitFailed(_) => "commit_failed",
            ScheduleError::MissingIdentity => "bad_params",
            ScheduleError::CommitSuperseded(_) => "commit_superseded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionPolicy {
    #[default]
    Free,
    ForwardOnly,
}

impl TransitionPolicy {
    pub fn allows(self, from: SlotStatus, to: SlotStatus) -> bool {
        match self {
            TransitionPolicy::Free => true,
            TransitionPolicy::ForwardOnly => to >= from,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Saved,
    NothingToSave,
}

/// Ticket for a commit whose save is outstanding.
#[derive(Debug, Clone)]
pub struct PendingCommit {
    pub ticket: u64,
    pub identity: String,
    pub payload: SavePayload,
}

#[derive(Debug)]
struct InFlight {
    ticket: u64,
    submitted: Schedule,
}

/// Live schedule plus the baseline it is diffed against.
///
/// `dirty` is recomputed after every mutation and is never set directly.
/// Pending view and stats are derived from the live schedule on each call.
#[derive(Debug, Default)]
pub struct ScheduleStateManager {
    live: Schedule,
    baseline: Schedule,
    dirty: bool,
    policy: TransitionPolicy,
    in_flight: Option<InFlight>,
    next_ticket: u64,
}

impl ScheduleStateManager {
    pub fn new(policy: TransitionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn load(&mut self, raw: Vec<RawWeek>) {
        self.live = Schedule::from_raw(raw);
        self.baseline = self.live.snapshot();
        self.dirty = false;
        if let Some(f) = self.in_flight.take() {
            tracing::warn!(ticket = f.ticket, "reload discarded an in-flight commit");
        }
        tracing::debug!(weeks = self.live.weeks().len(), "schedule loaded");
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: TransitionPolicy) {
        self.policy = policy;
    }

    pub fn schedule(&self) -> &Schedule {
        &self.live
    }

    pub fn has_pending_changes(&self) -> bool {
        self.dirty
    }

    pub fn commit_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn pending_view(&self) -> Vec<PendingWeek> {
        self.live.pending_view()
    }

    pub fn stats(&self) -> ScheduleStats {
        self.live.stats()
    }

    pub fn update_slot_status(
        &mut self,
        week: usize,
        day: usize,
        slot: usize,
        status: SlotStatus,
    ) -> Result<(), ScheduleError> {
        let policy = self.policy;
        let target = self
            .live
            .slot_mut(week, day, slot)
            .ok_or(ScheduleError::InvalidReference { week, day, slot })?;
        let from = target.status();
        if !policy.allows(from, status) {
            return Err(ScheduleError::InvalidTransition { from, to: status });
        }
        target.set_status(status);
        self.recompute_dirty();
        tracing::debug!(week, day, slot, %from, to = %status, dirty = self.dirty, "slot status updated");
        Ok(())
    }

    /// Starts a commit. `Ok(None)` means there was nothing to save.
    pub fn begin_commit(&mut self, identity: &str) -> Result<Option<PendingCommit>, ScheduleError> {
        if identity.trim().is_empty() {
            return Err(ScheduleError::MissingIdentity);
        }
        if self.in_flight.is_some() {
            return Err(ScheduleError::CommitInProgress);
        }
        if !self.dirty {
            return Ok(None);
        }
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let submitted = self.live.snapshot();
        let payload = submitted.to_payload();
        self.in_flight = Some(InFlight { ticket, submitted });
        Ok(Some(PendingCommit {
            ticket,
            identity: identity.to_string(),
            payload,
        }))
    }

    /// Applies the store's answer for `ticket`. On success the saved snapshot
    /// becomes the baseline; on failure nothing but the ticket changes.
    pub fn finish_commit<E: std::fmt::Display>(
        &mut self,
        ticket: u64,
        outcome: Result<(), E>,
    ) -> Result<(), ScheduleError> {
        let in_flight = match self.in_flight.take() {
            Some(f) if f.ticket == ticket => f,
            other => {
                self.in_flight = other;
                return Err(ScheduleError::CommitSuperseded(ticket));
            }
        };
        match outcome {
            Ok(()) => {
                self.baseline = in_flight.submitted;
                self.recompute_dirty();
                tracing::info!(ticket, dirty = self.dirty, "commit saved");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(ticket, error = %e, "commit failed");
                Err(ScheduleError::CommitFailed(e.to_string()))
            }
        }
    }

    pub fn commit(
        &mut self,
        identity: &str,
        store: &mut dyn TimetableStore,
    ) -> Result<CommitOutcome, ScheduleError> {
        let Some(pending) = self.begin_commit(identity)? else {
            return Ok(CommitOutcome::NothingToSave);
        };
        let outcome = store
            .save(&pending.identity, &pending.payload)
            .map_err(|e| format!("{e:#}"));
        self.finish_commit(pending.ticket, outcome)?;
        Ok(CommitOutcome::Saved)
    }

    fn recompute_dirty(&mut self) {
        self.dirty = self.live != self.baseline;
    }
}
