//! Persistence for sequences, enrollments and step logs.
//!
//! Every state change on an enrollment or step log is a conditional
//! single-row write. A write whose precondition no longer holds affects zero
//! rows and returns `None`/`false`; callers treat that as a lost race.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use cadence_core::{CadenceError, CadenceResult};

use crate::types::{
    Enrollment, EnrollmentFilter, EnrollmentGuard, EnrollmentUpdate, Sequence, StepLog,
    StepLogChange, StepLogStatus,
};

pub trait CadenceRepository: Send + Sync {
    // ─── Sequences ─────────────────────────────────────────────────────────

    fn insert_sequence(&self, sequence: Sequence) -> CadenceResult<()>;
    fn get_sequence(&self, id: Uuid) -> CadenceResult<Option<Sequence>>;
    fn list_sequences(&self) -> CadenceResult<Vec<Sequence>>;
    /// Replaces an existing sequence. Returns `false` if it does not exist.
    fn replace_sequence(&self, sequence: Sequence) -> CadenceResult<bool>;
    fn delete_sequence(&self, id: Uuid) -> CadenceResult<bool>;

    // ─── Enrollments ───────────────────────────────────────────────────────

    /// Inserts a new enrollment. Fails with `DuplicateEnrollment` if the
    /// contact already has an active or paused enrollment.
    fn insert_enrollment(&self, enrollment: Enrollment) -> CadenceResult<()>;
    fn get_enrollment(&self, id: Uuid) -> CadenceResult<Option<Enrollment>>;
    fn list_enrollments(&self, filter: &EnrollmentFilter) -> CadenceResult<Vec<Enrollment>>;
    /// Number of active or paused enrollments referencing the sequence.
    fn count_open_enrollments(&self, sequence_id: Uuid) -> CadenceResult<usize>;
    /// Compare-and-swap: applies `update` and `logs` only if the row still
    /// matches `guard` and the log change applies. `None` means zero rows
    /// were affected and nothing was written.
    fn update_enrollment_if(
        &self,
        id: Uuid,
        guard: EnrollmentGuard,
        update: EnrollmentUpdate,
        logs: StepLogChange,
    ) -> CadenceResult<Option<Enrollment>>;

    // ─── Step logs ─────────────────────────────────────────────────────────

    /// Inserts a step log. A second `pending` row for the same
    /// (enrollment, step index) is rejected.
    fn insert_step_log(&self, log: StepLog) -> CadenceResult<()>;
    fn list_step_logs(&self, enrollment_id: Uuid) -> CadenceResult<Vec<StepLog>>;
}

/// DashMap-backed repository. Each conditional write runs under the shard
/// lock of its row, which makes it atomic with respect to other writers.
#[derive(Default)]
pub struct InMemoryRepository {
    sequences: DashMap<Uuid, Sequence>,
    enrollments: DashMap<Uuid, Enrollment>,
    /// contact id -> its active/paused enrollment.
    open_by_contact: DashMap<String, Uuid>,
    step_logs: DashMap<Uuid, Vec<StepLog>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        info!("Cadence repository initialized (in-memory)");
        Self::default()
    }
}

impl CadenceRepository for InMemoryRepository {
    fn insert_sequence(&self, sequence: Sequence) -> CadenceResult<()> {
        self.sequences.insert(sequence.id, sequence);
        Ok(())
    }

    fn get_sequence(&self, id: Uuid) -> CadenceResult<Option<Sequence>> {
        Ok(self.sequences.get(&id).map(|r| r.value().clone()))
    }

    fn list_sequences(&self) -> CadenceResult<Vec<Sequence>> {
        let mut sequences: Vec<Sequence> =
            self.sequences.iter().map(|r| r.value().clone()).collect();
        sequences.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sequences)
    }

    fn replace_sequence(&self, sequence: Sequence) -> CadenceResult<bool> {
        match self.sequences.get_mut(&sequence.id) {
            Some(mut entry) => {
                *entry = sequence;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_sequence(&self, id: Uuid) -> CadenceResult<bool> {
        Ok(self.sequences.remove(&id).is_some())
    }

    fn insert_enrollment(&self, enrollment: Enrollment) -> CadenceResult<()> {
        if !enrollment.status.is_open() {
            self.enrollments.insert(enrollment.id, enrollment);
            return Ok(());
        }

        // The index entry is held while the row is written, so two enrolls
        // of one contact serialize here.
        match self.open_by_contact.entry(enrollment.contact_id.clone()) {
            Entry::Occupied(existing) => {
                let existing_id = *existing.get();
                let status = self
                    .enrollments
                    .get(&existing_id)
                    .map(|r| r.status.as_str().to_string())
                    .unwrap_or_else(|| "active".to_string());
                Err(CadenceError::DuplicateEnrollment {
                    enrollment_id: existing_id,
                    status,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(enrollment.id);
                self.enrollments.insert(enrollment.id, enrollment);
                Ok(())
            }
        }
    }

    fn get_enrollment(&self, id: Uuid) -> CadenceResult<Option<Enrollment>> {
        Ok(self.enrollments.get(&id).map(|r| r.value().clone()))
    }

    fn list_enrollments(&self, filter: &EnrollmentFilter) -> CadenceResult<Vec<Enrollment>> {
        let mut rows: Vec<Enrollment> = self
            .enrollments
            .iter()
            .map(|r| r.value().clone())
            .filter(|e| {
                filter.contact_id.as_ref().map_or(true, |c| &e.contact_id == c)
                    && filter.sequence_id.map_or(true, |s| e.sequence_id == s)
                    && filter.status.map_or(true, |s| e.status == s)
                    && filter
                        .due_by
                        .map_or(true, |due_by| e.next_step_due_at.is_some_and(|d| d <= due_by))
            })
            .collect();

        if filter.due_by.is_some() {
            rows.sort_by(|a, b| a.next_step_due_at.cmp(&b.next_step_due_at));
        } else {
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn count_open_enrollments(&self, sequence_id: Uuid) -> CadenceResult<usize> {
        Ok(self
            .enrollments
            .iter()
            .filter(|r| r.sequence_id == sequence_id && r.status.is_open())
            .count())
    }

    fn update_enrollment_if(
        &self,
        id: Uuid,
        guard: EnrollmentGuard,
        update: EnrollmentUpdate,
        logs: StepLogChange,
    ) -> CadenceResult<Option<Enrollment>> {
        let updated = {
            let Some(mut row) = self.enrollments.get_mut(&id) else {
                return Ok(None);
            };
            if row.status != guard.status || row.current_step != guard.current_step {
                return Ok(None);
            }
            // Lock order: enrollment row, then its step logs.
            if !matches!(logs, StepLogChange::Keep) {
                let mut step_logs = self.step_logs.entry(id).or_default();
                if !apply_log_change(id, &mut step_logs, logs) {
                    return Ok(None);
                }
            }
            row.current_step = update.current_step;
            row.status = update.status;
            row.next_step_due_at = update.next_step_due_at;
            row.updated_at = Utc::now();
            row.clone()
        };

        // Row lock released above; the index is only touched afterwards.
        if !updated.status.is_open() {
            self.open_by_contact
                .remove_if(&updated.contact_id, |_, open_id| *open_id == id);
        }
        Ok(Some(updated))
    }

    fn insert_step_log(&self, log: StepLog) -> CadenceResult<()> {
        let mut logs = self.step_logs.entry(log.enrollment_id).or_default();
        if log.status == StepLogStatus::Pending
            && logs.iter().any(|l| is_pending_at(l, log.step_index))
        {
            return Err(CadenceError::ConcurrentModification(format!(
                "Step {} of enrollment {} already has a pending log",
                log.step_index, log.enrollment_id
            )));
        }
        logs.push(log);
        Ok(())
    }

    fn list_step_logs(&self, enrollment_id: Uuid) -> CadenceResult<Vec<StepLog>> {
        let mut logs = self
            .step_logs
            .get(&enrollment_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        logs.sort_by(|a, b| {
            a.step_index
                .cmp(&b.step_index)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(logs)
    }
}

fn is_pending_at(log: &StepLog, step_index: usize) -> bool {
    log.step_index == step_index && log.status == StepLogStatus::Pending
}

/// Applies a step-log change to one enrollment's logs. Returns `false`,
/// with the logs untouched, when the change cannot apply.
fn apply_log_change(enrollment_id: Uuid, logs: &mut Vec<StepLog>, change: StepLogChange) -> bool {
    match change {
        StepLogChange::Keep => true,
        StepLogChange::CancelPending { note } => {
            for log in logs.iter_mut().filter(|l| l.status == StepLogStatus::Pending) {
                log.status = StepLogStatus::Cancelled;
                log.notes = Some(note.clone());
            }
            true
        }
        StepLogChange::Reopen {
            step_index,
            channel,
        } => {
            if !logs.iter().any(|l| is_pending_at(l, step_index)) {
                logs.push(StepLog::pending(enrollment_id, step_index, channel));
            }
            true
        }
        StepLogChange::Complete {
            step,
            completion,
            at,
            next,
        } => {
            if let Some((step_index, channel)) = step {
                let pending = logs.iter().position(|l| is_pending_at(l, step_index));
                let done = logs
                    .iter()
                    .any(|l| l.step_index == step_index && l.status == StepLogStatus::Completed);
                let index = match (pending, done) {
                    (Some(index), _) => index,
                    // A step completes once.
                    (None, true) => return false,
                    // The pending log was never written; record the step anyway.
                    (None, false) => {
                        logs.push(StepLog::pending(enrollment_id, step_index, channel));
                        logs.len() - 1
                    }
                };
                let log = &mut logs[index];
                log.status = StepLogStatus::Completed;
                log.completed_at = Some(at);
                log.outcome = Some(completion.outcome);
                log.notes = completion.notes;
                log.draft_content = completion.draft_content;
            }
            if let Some(next) = next {
                if !logs.iter().any(|l| is_pending_at(l, next.step_index)) {
                    logs.push(next);
                }
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnrollmentStatus, StepCompletion};
    use cadence_core::types::Channel;

    fn enrollment(contact: &str, status: EnrollmentStatus) -> Enrollment {
        let now = Utc::now();
        Enrollment {
            id: Uuid::new_v4(),
            sequence_id: Uuid::new_v4(),
            contact_id: contact.to_string(),
            company_domain: "acme.io".into(),
            enrolled_by: "alice".into(),
            current_step: 0,
            status,
            next_step_due_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    fn completion() -> StepCompletion {
        StepCompletion {
            outcome: "completed".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_one_open_enrollment_per_contact() {
        let repo = InMemoryRepository::new();
        let first = enrollment("c-1", EnrollmentStatus::Active);
        let first_id = first.id;
        repo.insert_enrollment(first).unwrap();

        match repo.insert_enrollment(enrollment("c-1", EnrollmentStatus::Active)) {
            Err(CadenceError::DuplicateEnrollment { enrollment_id, status }) => {
                assert_eq!(enrollment_id, first_id);
                assert_eq!(status, "active");
            }
            other => panic!("expected duplicate, got {other:?}"),
        }

        // A different contact is unaffected.
        repo.insert_enrollment(enrollment("c-2", EnrollmentStatus::Active))
            .unwrap();
    }

    #[test]
    fn test_terminal_update_frees_contact() {
        let repo = InMemoryRepository::new();
        let first = enrollment("c-1", EnrollmentStatus::Active);
        let guard = EnrollmentGuard::of(&first);
        let id = first.id;
        repo.insert_enrollment(first).unwrap();

        let updated = repo
            .update_enrollment_if(
                id,
                guard,
                EnrollmentUpdate {
                    current_step: 0,
                    status: EnrollmentStatus::Unenrolled,
                    next_step_due_at: None,
                },
                StepLogChange::Keep,
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, EnrollmentStatus::Unenrolled);

        repo.insert_enrollment(enrollment("c-1", EnrollmentStatus::Active))
            .unwrap();
    }

    #[test]
    fn test_conditional_update_affects_zero_rows_on_mismatch() {
        let repo = InMemoryRepository::new();
        let row = enrollment("c-1", EnrollmentStatus::Active);
        let id = row.id;
        repo.insert_enrollment(row).unwrap();

        let stale = EnrollmentGuard {
            status: EnrollmentStatus::Active,
            current_step: 3,
        };
        let update = EnrollmentUpdate {
            current_step: 4,
            status: EnrollmentStatus::Active,
            next_step_due_at: None,
        };
        let cancel = StepLogChange::CancelPending {
            note: "Enrollment paused".into(),
        };
        assert!(repo
            .update_enrollment_if(id, stale, update, cancel.clone())
            .unwrap()
            .is_none());
        assert!(repo
            .update_enrollment_if(Uuid::new_v4(), stale, update, cancel)
            .unwrap()
            .is_none());

        let unchanged = repo.get_enrollment(id).unwrap().unwrap();
        assert_eq!(unchanged.current_step, 0);
        assert!(unchanged.next_step_due_at.is_some());
    }

    #[test]
    fn test_single_pending_log_per_step() {
        let repo = InMemoryRepository::new();
        let enrollment_id = Uuid::new_v4();
        repo.insert_step_log(StepLog::pending(enrollment_id, 1, Channel::Call))
            .unwrap();
        let err = repo
            .insert_step_log(StepLog::pending(enrollment_id, 1, Channel::Call))
            .unwrap_err();
        assert_eq!(err.code(), "concurrent_modification");
    }

    fn open_with_log(repo: &InMemoryRepository) -> Enrollment {
        let row = enrollment("c-1", EnrollmentStatus::Active);
        repo.insert_enrollment(row.clone()).unwrap();
        repo.insert_step_log(StepLog::pending(row.id, 0, Channel::Email))
            .unwrap();
        row
    }

    fn advance_to(step: usize) -> EnrollmentUpdate {
        EnrollmentUpdate {
            current_step: step,
            status: EnrollmentStatus::Active,
            next_step_due_at: None,
        }
    }

    fn complete(enrollment_id: Uuid, step: usize) -> StepLogChange {
        StepLogChange::Complete {
            step: Some((step, Channel::Email)),
            completion: completion(),
            at: Utc::now(),
            next: Some(StepLog::pending(enrollment_id, step + 1, Channel::Call)),
        }
    }

    #[test]
    fn test_completion_moves_row_and_logs_together() {
        let repo = InMemoryRepository::new();
        let row = open_with_log(&repo);
        let guard = EnrollmentGuard::of(&row);

        let moved = repo
            .update_enrollment_if(row.id, guard, advance_to(1), complete(row.id, 0))
            .unwrap()
            .unwrap();
        assert_eq!(moved.current_step, 1);
        let logs = repo.list_step_logs(row.id).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, StepLogStatus::Completed);
        assert_eq!(logs[0].outcome.as_deref(), Some("completed"));
        assert_eq!(logs[1].status, StepLogStatus::Pending);

        // Same snapshot again: zero rows, logs untouched.
        assert!(repo
            .update_enrollment_if(row.id, guard, advance_to(1), complete(row.id, 0))
            .unwrap()
            .is_none());
        let after = repo.list_step_logs(row.id).unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(
            after.iter().filter(|l| l.status == StepLogStatus::Completed).count(),
            1
        );
    }

    #[test]
    fn test_failed_guard_leaves_logs_alone() {
        let repo = InMemoryRepository::new();
        let row = open_with_log(&repo);
        let stale = EnrollmentGuard {
            status: EnrollmentStatus::Paused,
            current_step: 0,
        };

        assert!(repo
            .update_enrollment_if(row.id, stale, advance_to(1), complete(row.id, 0))
            .unwrap()
            .is_none());
        let logs = repo.list_step_logs(row.id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, StepLogStatus::Pending);
    }

    #[test]
    fn test_completion_without_pending_log_records_step() {
        let repo = InMemoryRepository::new();
        let row = enrollment("c-1", EnrollmentStatus::Active);
        repo.insert_enrollment(row.clone()).unwrap();

        repo.update_enrollment_if(
            row.id,
            EnrollmentGuard::of(&row),
            advance_to(1),
            complete(row.id, 0),
        )
        .unwrap()
        .unwrap();
        let logs = repo.list_step_logs(row.id).unwrap();
        assert_eq!(logs[0].step_index, 0);
        assert_eq!(logs[0].status, StepLogStatus::Completed);
        assert_eq!(logs[1].step_index, 1);
        assert_eq!(logs[1].status, StepLogStatus::Pending);
    }

    #[test]
    fn test_pause_and_resume_rewrite_logs_atomically() {
        let repo = InMemoryRepository::new();
        let row = open_with_log(&repo);

        let paused = repo
            .update_enrollment_if(
                row.id,
                EnrollmentGuard::of(&row),
                EnrollmentUpdate {
                    current_step: 0,
                    status: EnrollmentStatus::Paused,
                    next_step_due_at: None,
                },
                StepLogChange::CancelPending {
                    note: "Enrollment paused".into(),
                },
            )
            .unwrap()
            .unwrap();
        let logs = repo.list_step_logs(row.id).unwrap();
        assert_eq!(logs[0].status, StepLogStatus::Cancelled);
        assert_eq!(logs[0].notes.as_deref(), Some("Enrollment paused"));

        let reopen = || StepLogChange::Reopen {
            step_index: 0,
            channel: Channel::Email,
        };
        repo.update_enrollment_if(
            row.id,
            EnrollmentGuard::of(&paused),
            advance_to(0),
            reopen(),
        )
        .unwrap()
        .unwrap();
        // Reopening an already open step adds nothing.
        repo.update_enrollment_if(
            row.id,
            EnrollmentGuard {
                status: EnrollmentStatus::Active,
                current_step: 0,
            },
            advance_to(0),
            reopen(),
        )
        .unwrap()
        .unwrap();

        let logs = repo.list_step_logs(row.id).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(
            logs.iter().filter(|l| l.status == StepLogStatus::Pending).count(),
            1
        );
    }

    #[test]
    fn test_list_enrollments_due_by() {
        let repo = InMemoryRepository::new();
        let now = Utc::now();

        let mut late = enrollment("c-1", EnrollmentStatus::Active);
        late.next_step_due_at = Some(now - chrono::Duration::hours(1));
        let mut early = enrollment("c-2", EnrollmentStatus::Active);
        early.next_step_due_at = Some(now - chrono::Duration::hours(5));
        let mut future = enrollment("c-3", EnrollmentStatus::Active);
        future.next_step_due_at = Some(now + chrono::Duration::hours(5));
        let (late_id, early_id) = (late.id, early.id);
        for e in [late, early, future] {
            repo.insert_enrollment(e).unwrap();
        }

        let due = repo
            .list_enrollments(&EnrollmentFilter {
                status: Some(EnrollmentStatus::Active),
                due_by: Some(now),
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<Uuid> = due.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![early_id, late_id]);

        let by_contact = repo
            .list_enrollments(&EnrollmentFilter {
                contact_id: Some("c-3".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_contact.len(), 1);
    }
}
