use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use cadence_core::config::CrmConfig;
use cadence_core::event_bus::{make_event, EventSink};
use cadence_core::types::{Channel, EventType};
use cadence_core::{CadenceError, CadenceResult, ContactDirectory};

use crate::draft::{DraftAdapter, DraftGenerator, DraftRequest};
use crate::repository::CadenceRepository;
use crate::schedule;
use crate::state_machine::EnrollmentStateMachine;
use crate::types::{
    Enrollment, EnrollmentFilter, EnrollmentGuard, EnrollmentStatus, EnrollmentUpdate,
    ExecuteDueReport, ExecuteResult, ExecutedStep, FailedExecution, NewEnrollment, NewSequence,
    Sequence, SequenceUpdate, StepCompletion, StepLog, StepLogChange, TransitionAction,
    TransitionResult,
};
use crate::validation;

const PAUSED_NOTE: &str = "Enrollment paused";
const UNENROLLED_NOTE: &str = "Enrollment unenrolled";

/// Enrollment state machine: creates enrollments and moves them through
/// their sequence. Holds no mutable state of its own; every transition is a
/// conditional write against the repository.
#[derive(Clone)]
pub struct CadenceEngine {
    repo: Arc<dyn CadenceRepository>,
    directory: Arc<dyn ContactDirectory>,
    drafts: DraftAdapter,
    event_sink: Arc<dyn EventSink>,
    state_machine: Arc<EnrollmentStateMachine>,
    crm: CrmConfig,
    default_tone: String,
}

impl std::fmt::Debug for CadenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CadenceEngine")
            .field("default_tone", &self.default_tone)
            .finish_non_exhaustive()
    }
}

impl CadenceEngine {
    pub fn new(
        repo: Arc<dyn CadenceRepository>,
        directory: Arc<dyn ContactDirectory>,
        generator: Arc<dyn DraftGenerator>,
    ) -> Self {
        Self {
            repo,
            directory,
            drafts: DraftAdapter::new(generator),
            event_sink: cadence_core::event_bus::noop_sink(),
            state_machine: Arc::new(EnrollmentStateMachine::new()),
            crm: CrmConfig::default(),
            default_tone: "professional".to_string(),
        }
    }

    /// Attach an event sink for step notifications.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn with_crm(mut self, crm: CrmConfig) -> Self {
        self.crm = crm;
        self
    }

    pub fn with_default_tone(mut self, tone: impl Into<String>) -> Self {
        self.default_tone = tone.into();
        self
    }

    fn emit(
        &self,
        event_type: EventType,
        enrollment: &Enrollment,
        step_index: Option<usize>,
        channel: Option<Channel>,
        actor: Option<&str>,
    ) {
        let mut event = make_event(
            event_type,
            enrollment.id,
            enrollment.contact_id.clone(),
            step_index,
            channel,
        );
        event.actor = actor.map(str::to_string);
        self.event_sink.emit(event);
    }

    fn lost_race(id: Uuid) -> CadenceError {
        metrics::counter!("cadence.transitions.conflicts").increment(1);
        warn!(enrollment_id = %id, "Conditional update affected zero rows");
        CadenceError::ConcurrentModification(format!(
            "Enrollment {id} was modified by a concurrent transition"
        ))
    }

    /// Writes `update` and `logs` in one conditional write against the row
    /// as it was read.
    fn write_if_unchanged(
        &self,
        enrollment: &Enrollment,
        update: EnrollmentUpdate,
        logs: StepLogChange,
    ) -> CadenceResult<Enrollment> {
        debug_assert!(
            self.state_machine
                .can_transition(enrollment.status, update.status),
            "{} -> {} is not an enrollment transition",
            enrollment.status,
            update.status
        );
        let id = enrollment.id;
        self.repo
            .update_enrollment_if(id, EnrollmentGuard::of(enrollment), update, logs)?
            .ok_or_else(|| Self::lost_race(id))
    }

    // ─── Sequences ─────────────────────────────────────────────────────────

    pub fn create_sequence(&self, new: NewSequence) -> CadenceResult<Sequence> {
        validation::validate_new_sequence(&new)?;
        let now = Utc::now();
        let sequence = Sequence {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            steps: new.steps,
            is_template: new.is_template,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        self.repo.insert_sequence(sequence.clone())?;
        info!(
            sequence_id = %sequence.id,
            name = %sequence.name,
            steps = sequence.steps.len(),
            "Created sequence"
        );
        metrics::counter!("cadence.sequences.created").increment(1);
        Ok(sequence)
    }

    pub fn get_sequence(&self, id: Uuid) -> CadenceResult<Sequence> {
        self.repo
            .get_sequence(id)?
            .ok_or_else(|| CadenceError::not_found("Sequence", id))
    }

    pub fn list_sequences(&self, templates_only: bool) -> CadenceResult<Vec<Sequence>> {
        let mut sequences = self.repo.list_sequences()?;
        if templates_only {
            sequences.retain(|s| s.is_template);
        }
        Ok(sequences)
    }

    pub fn update_sequence(&self, id: Uuid, update: SequenceUpdate) -> CadenceResult<Sequence> {
        let mut sequence = self.get_sequence(id)?;
        if let Some(name) = update.name {
            validation::validate_name(&name)?;
            sequence.name = name.trim().to_string();
        }
        if let Some(steps) = update.steps {
            validation::validate_steps(&steps)?;
            sequence.steps = steps;
        }
        if let Some(description) = update.description {
            sequence.description = Some(description);
        }
        if let Some(is_template) = update.is_template {
            sequence.is_template = is_template;
        }
        sequence.updated_at = Utc::now();

        if !self.repo.replace_sequence(sequence.clone())? {
            return Err(CadenceError::not_found("Sequence", id));
        }
        info!(sequence_id = %id, "Updated sequence");
        Ok(sequence)
    }

    /// Deletes a sequence unless an active or paused enrollment still
    /// references it.
    pub fn delete_sequence(&self, id: Uuid) -> CadenceResult<()> {
        self.get_sequence(id)?;
        let open = self.repo.count_open_enrollments(id)?;
        if open > 0 {
            return Err(CadenceError::SequenceInUse(format!(
                "Cannot delete sequence with {open} active or paused enrollment(s)"
            )));
        }
        if !self.repo.delete_sequence(id)? {
            return Err(CadenceError::not_found("Sequence", id));
        }
        info!(sequence_id = %id, "Deleted sequence");
        Ok(())
    }

    // ─── Enrollment queries ────────────────────────────────────────────────

    pub fn get_enrollment(&self, id: Uuid) -> CadenceResult<Enrollment> {
        self.repo
            .get_enrollment(id)?
            .ok_or_else(|| CadenceError::not_found("Enrollment", id))
    }

    /// Enrollment plus its step logs ordered by step index.
    pub fn enrollment_detail(&self, id: Uuid) -> CadenceResult<(Enrollment, Vec<StepLog>)> {
        let enrollment = self.get_enrollment(id)?;
        let logs = self.repo.list_step_logs(id)?;
        Ok((enrollment, logs))
    }

    /// Lists enrollments. A `due_by` bound only makes sense for active
    /// enrollments, so it overrides any status filter.
    pub fn list_enrollments(&self, mut filter: EnrollmentFilter) -> CadenceResult<Vec<Enrollment>> {
        if filter.due_by.is_some() {
            filter.status = Some(EnrollmentStatus::Active);
        }
        self.repo.list_enrollments(&filter)
    }

    // ─── Enrollment creation ───────────────────────────────────────────────

    pub fn enroll(&self, req: NewEnrollment) -> CadenceResult<Enrollment> {
        for (field, value) in [
            ("contactId", &req.contact_id),
            ("companyDomain", &req.company_domain),
            ("enrolledBy", &req.enrolled_by),
        ] {
            if value.trim().is_empty() {
                return Err(CadenceError::Validation(format!("{field} is required")));
            }
        }

        let sequence = self.get_sequence(req.sequence_id)?;
        let first = sequence
            .steps
            .first()
            .ok_or_else(|| CadenceError::Validation("Sequence has no steps".to_string()))?;

        let now = Utc::now();
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            sequence_id: sequence.id,
            contact_id: req.contact_id,
            company_domain: req.company_domain,
            enrolled_by: req.enrolled_by,
            current_step: 0,
            status: EnrollmentStatus::Active,
            next_step_due_at: Some(schedule::due_at(now, first.delay_days)),
            created_at: now,
            updated_at: now,
        };

        // Rejects a second open enrollment for the contact atomically.
        self.repo.insert_enrollment(enrollment.clone())?;

        if let Err(e) = self
            .repo
            .insert_step_log(StepLog::pending(enrollment.id, 0, first.channel))
        {
            warn!(enrollment_id = %enrollment.id, error = %e, "Failed to create first step log");
        }

        info!(
            enrollment_id = %enrollment.id,
            sequence_id = %sequence.id,
            contact_id = %enrollment.contact_id,
            enrolled_by = %enrollment.enrolled_by,
            "Contact enrolled"
        );
        metrics::counter!("cadence.enrollments.created").increment(1);
        self.emit(
            EventType::Enrolled,
            &enrollment,
            Some(0),
            Some(first.channel),
            Some(&enrollment.enrolled_by),
        );
        Ok(enrollment)
    }

    // ─── Transitions ───────────────────────────────────────────────────────

    /// Applies a caller-requested action. `outcome` and `notes` only apply
    /// to `advance`.
    pub fn transition(
        &self,
        id: Uuid,
        action: TransitionAction,
        outcome: Option<String>,
        notes: Option<String>,
    ) -> CadenceResult<TransitionResult> {
        let not_completed = |enrollment| TransitionResult {
            enrollment,
            completed: false,
        };
        match action {
            TransitionAction::Pause => self.pause(id).map(not_completed),
            TransitionAction::Resume => self.resume(id).map(not_completed),
            TransitionAction::Unenroll => self.unenroll(id).map(not_completed),
            TransitionAction::Advance => self.advance(id, outcome, notes),
        }
    }

    pub fn pause(&self, id: Uuid) -> CadenceResult<Enrollment> {
        let enrollment = self.get_enrollment(id)?;
        self.state_machine
            .check(enrollment.status, TransitionAction::Pause)?;

        // The pending log is cancelled with the status change, so an
        // in-flight execute can no longer complete the step.
        let updated = self.write_if_unchanged(
            &enrollment,
            EnrollmentUpdate {
                current_step: enrollment.current_step,
                status: EnrollmentStatus::Paused,
                next_step_due_at: None,
            },
            StepLogChange::CancelPending {
                note: PAUSED_NOTE.to_string(),
            },
        )?;

        info!(enrollment_id = %id, step = updated.current_step, "Enrollment paused");
        metrics::counter!("cadence.enrollments.paused").increment(1);
        self.emit(
            EventType::Paused,
            &updated,
            Some(updated.current_step),
            None,
            None,
        );
        Ok(updated)
    }

    pub fn resume(&self, id: Uuid) -> CadenceResult<Enrollment> {
        let enrollment = self.get_enrollment(id)?;
        self.state_machine
            .check(enrollment.status, TransitionAction::Resume)?;
        let sequence = self.get_sequence(enrollment.sequence_id)?;

        let step_index = enrollment.current_step;
        let logs = match sequence.steps.get(step_index) {
            Some(step) => StepLogChange::Reopen {
                step_index,
                channel: step.channel,
            },
            None => StepLogChange::Keep,
        };
        let updated = self.write_if_unchanged(
            &enrollment,
            EnrollmentUpdate {
                current_step: step_index,
                status: EnrollmentStatus::Active,
                next_step_due_at: schedule::next_due(Utc::now(), &sequence.steps, step_index),
            },
            logs,
        )?;

        info!(enrollment_id = %id, step = step_index, "Enrollment resumed");
        metrics::counter!("cadence.enrollments.resumed").increment(1);
        self.emit(EventType::Resumed, &updated, Some(step_index), None, None);
        Ok(updated)
    }

    pub fn unenroll(&self, id: Uuid) -> CadenceResult<Enrollment> {
        let enrollment = self.get_enrollment(id)?;
        self.state_machine
            .check(enrollment.status, TransitionAction::Unenroll)?;

        let updated = self.write_if_unchanged(
            &enrollment,
            EnrollmentUpdate {
                current_step: enrollment.current_step,
                status: EnrollmentStatus::Unenrolled,
                next_step_due_at: None,
            },
            StepLogChange::CancelPending {
                note: UNENROLLED_NOTE.to_string(),
            },
        )?;

        info!(enrollment_id = %id, "Enrollment unenrolled");
        metrics::counter!("cadence.enrollments.unenrolled").increment(1);
        self.emit(EventType::Unenrolled, &updated, None, None, None);
        Ok(updated)
    }

    /// Manually completes the current step and moves to the next one.
    pub fn advance(
        &self,
        id: Uuid,
        outcome: Option<String>,
        notes: Option<String>,
    ) -> CadenceResult<TransitionResult> {
        let enrollment = self.get_enrollment(id)?;
        self.state_machine
            .check(enrollment.status, TransitionAction::Advance)?;
        let sequence = self.get_sequence(enrollment.sequence_id)?;

        self.complete_current_step(
            &enrollment,
            &sequence,
            StepCompletion {
                outcome: outcome
                    .filter(|o| !o.trim().is_empty())
                    .unwrap_or_else(|| "completed".to_string()),
                notes,
                draft_content: None,
            },
        )
    }

    /// Shared completion path of `advance` and `execute`.
    ///
    /// Completing the step log, opening the next one and moving
    /// `current_step` is a single write guarded on the row still being
    /// `active` at the step we read. A loser writes nothing.
    fn complete_current_step(
        &self,
        enrollment: &Enrollment,
        sequence: &Sequence,
        completion: StepCompletion,
    ) -> CadenceResult<TransitionResult> {
        let id = enrollment.id;
        let step_index = enrollment.current_step;
        let now = Utc::now();
        // A step index past the end (sequence shortened after enrolling)
        // has no log to complete; the enrollment just finishes.
        let step_channel = sequence.steps.get(step_index).map(|s| s.channel);
        let next_index = step_index + 1;
        let next_step = sequence.steps.get(next_index);

        let update = match next_step {
            Some(next) => EnrollmentUpdate {
                current_step: next_index,
                status: EnrollmentStatus::Active,
                next_step_due_at: Some(schedule::due_at(now, next.delay_days)),
            },
            None => EnrollmentUpdate {
                current_step: next_index,
                status: EnrollmentStatus::Completed,
                next_step_due_at: None,
            },
        };
        let updated = self.write_if_unchanged(
            enrollment,
            update,
            StepLogChange::Complete {
                step: step_channel.map(|channel| (step_index, channel)),
                completion,
                at: now,
                next: next_step.map(|next| StepLog::pending(id, next_index, next.channel)),
            },
        )?;
        metrics::counter!("cadence.steps.completed").increment(1);
        self.emit(EventType::StepCompleted, &updated, Some(step_index), step_channel, None);

        if next_step.is_none() {
            info!(enrollment_id = %id, steps = next_index, "Enrollment completed");
            metrics::counter!("cadence.enrollments.completed").increment(1);
            self.emit(EventType::EnrollmentCompleted, &updated, None, None, None);
            return Ok(TransitionResult {
                enrollment: updated,
                completed: true,
            });
        }

        info!(
            enrollment_id = %id,
            step = next_index,
            next_due = ?updated.next_step_due_at,
            "Enrollment advanced"
        );
        Ok(TransitionResult {
            enrollment: updated,
            completed: false,
        })
    }

    // ─── Execution ─────────────────────────────────────────────────────────

    /// Runs the current step of an active enrollment: gathers contact
    /// context, asks the draft generator for content, then completes the
    /// step with that draft. A failed draft never blocks the cadence.
    pub async fn execute(&self, id: Uuid) -> CadenceResult<ExecuteResult> {
        let enrollment = self.get_enrollment(id)?;
        self.state_machine
            .check(enrollment.status, TransitionAction::Advance)?;
        let sequence = self.get_sequence(enrollment.sequence_id)?;
        let step_index = enrollment.current_step;

        let (channel, draft_content) = match sequence.steps.get(step_index) {
            Some(step) => {
                let contact = self
                    .directory
                    .contact(&enrollment.contact_id)
                    .await
                    .ok()
                    .flatten();
                let company = if enrollment.company_domain.is_empty() {
                    None
                } else {
                    self.directory
                        .company(&enrollment.company_domain)
                        .await
                        .ok()
                        .flatten()
                };
                let crm_domain = match step.channel {
                    Channel::Call => self.crm.domain_for(&enrollment.enrolled_by),
                    _ => None,
                };

                let request = DraftRequest {
                    contact_id: enrollment.contact_id.clone(),
                    company_domain: enrollment.company_domain.clone(),
                    contact,
                    company,
                    channel: step.channel,
                    step_index,
                    tone: step.tone.clone().unwrap_or_else(|| self.default_tone.clone()),
                    template: step.template.clone(),
                    notes: step.notes.clone(),
                    crm_domain,
                    sender: enrollment.enrolled_by.clone(),
                };
                (Some(step.channel), self.drafts.produce(&request).await)
            }
            None => (None, None),
        };

        let outcome = if draft_content.is_some() {
            "executed"
        } else {
            "executed_without_draft"
        };
        let result = self.complete_current_step(
            &enrollment,
            &sequence,
            StepCompletion {
                outcome: outcome.to_string(),
                notes: None,
                draft_content: draft_content.clone(),
            },
        )?;

        info!(
            enrollment_id = %id,
            step = step_index,
            channel = ?channel,
            draft = draft_content.is_some(),
            "Step executed"
        );
        Ok(ExecuteResult {
            enrollment: result.enrollment,
            completed: result.completed,
            step_index,
            channel,
            draft_content,
        })
    }

    /// Executes every active enrollment due at `now`, oldest due first.
    /// Failures are collected per enrollment and do not stop the batch.
    pub async fn execute_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> CadenceResult<ExecuteDueReport> {
        let due = self.list_enrollments(EnrollmentFilter {
            due_by: Some(now),
            limit: Some(limit),
            ..Default::default()
        })?;

        let mut report = ExecuteDueReport::default();
        for enrollment in due {
            match self.execute(enrollment.id).await {
                Ok(result) => report.executed.push(ExecutedStep {
                    enrollment_id: enrollment.id,
                    step_index: result.step_index,
                    completed: result.completed,
                    draft_generated: result.draft_content.is_some(),
                }),
                Err(e) => {
                    warn!(enrollment_id = %enrollment.id, error = %e, "Due execution failed");
                    report.failed.push(FailedExecution {
                        enrollment_id: enrollment.id,
                        error: e.code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            executed = report.executed.len(),
            failed = report.failed.len(),
            "Due enrollments processed"
        );
        Ok(report)
    }
}
