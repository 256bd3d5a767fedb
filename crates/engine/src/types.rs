use cadence_core::types::Channel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One channel+delay unit within a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub channel: Channel,
    /// Days to wait after the previous step before this one is due.
    pub delay_days: f64,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Step {
    pub fn new(channel: Channel, delay_days: f64) -> Self {
        Self {
            channel,
            delay_days,
            template: None,
            tone: None,
            notes: None,
        }
    }
}

/// An ordered template of outreach steps. The step list is flat: the step
/// after index `i` is always `i + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<Step>,
    pub is_template: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a sequence.
#[derive(Debug, Clone)]
pub struct NewSequence {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
    pub is_template: bool,
    pub created_by: String,
}

/// Partial sequence update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SequenceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<Step>>,
    pub is_template: Option<bool>,
}

/// Lifecycle status of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Paused,
    Completed,
    Unenrolled,
}

impl EnrollmentStatus {
    /// Active and paused enrollments count against the one-per-contact limit.
    pub fn is_open(&self) -> bool {
        matches!(self, EnrollmentStatus::Active | EnrollmentStatus::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Paused => "paused",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Unenrolled => "unenrolled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(EnrollmentStatus::Active),
            "paused" => Some(EnrollmentStatus::Paused),
            "completed" => Some(EnrollmentStatus::Completed),
            "unenrolled" => Some(EnrollmentStatus::Unenrolled),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contact's run through a sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub sequence_id: Uuid,
    pub contact_id: String,
    pub company_domain: String,
    pub enrolled_by: String,
    /// 0-based index of the step currently due.
    pub current_step: usize,
    pub status: EnrollmentStatus,
    pub next_step_due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for enrolling a contact.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub sequence_id: Uuid,
    pub contact_id: String,
    pub company_domain: String,
    pub enrolled_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepLogStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Execution record for one step within one enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLog {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub step_index: usize,
    pub channel: Channel,
    pub status: StepLogStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
    pub notes: Option<String>,
    pub draft_content: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StepLog {
    pub fn pending(enrollment_id: Uuid, step_index: usize, channel: Channel) -> Self {
        Self {
            id: Uuid::new_v4(),
            enrollment_id,
            step_index,
            channel,
            status: StepLogStatus::Pending,
            completed_at: None,
            outcome: None,
            notes: None,
            draft_content: None,
            created_at: Utc::now(),
        }
    }
}

/// What gets written onto a step log when it completes.
#[derive(Debug, Clone, Default)]
pub struct StepCompletion {
    pub outcome: String,
    pub notes: Option<String>,
    pub draft_content: Option<String>,
}

/// Query filter for listing enrollments.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentFilter {
    pub contact_id: Option<String>,
    pub sequence_id: Option<Uuid>,
    pub status: Option<EnrollmentStatus>,
    /// Only enrollments whose next step is due at or before this instant.
    pub due_by: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Expected row state for a conditional enrollment write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentGuard {
    pub status: EnrollmentStatus,
    pub current_step: usize,
}

impl EnrollmentGuard {
    pub fn of(enrollment: &Enrollment) -> Self {
        Self {
            status: enrollment.status,
            current_step: enrollment.current_step,
        }
    }
}

/// New values for the mutable enrollment fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentUpdate {
    pub current_step: usize,
    pub status: EnrollmentStatus,
    pub next_step_due_at: Option<DateTime<Utc>>,
}

/// Step-log write that lands in the same conditional write as an
/// enrollment update. If the guard fails, neither is applied.
#[derive(Debug, Clone)]
pub enum StepLogChange {
    Keep,
    /// Cancel every pending log of the enrollment.
    CancelPending { note: String },
    /// Make sure the step has a pending log.
    Reopen { step_index: usize, channel: Channel },
    /// Complete the current step and open the next one, if any. `step` is
    /// `None` when the sequence no longer has the current step.
    Complete {
        step: Option<(usize, Channel)>,
        completion: StepCompletion,
        at: DateTime<Utc>,
        next: Option<StepLog>,
    },
}

/// Caller-requested state change on an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionAction {
    Pause,
    Resume,
    Unenroll,
    Advance,
}

impl TransitionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionAction::Pause => "pause",
            TransitionAction::Resume => "resume",
            TransitionAction::Unenroll => "unenroll",
            TransitionAction::Advance => "advance",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pause" => Some(TransitionAction::Pause),
            "resume" => Some(TransitionAction::Resume),
            "unenroll" => Some(TransitionAction::Unenroll),
            "advance" => Some(TransitionAction::Advance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub enrollment: Enrollment,
    /// True when this transition finished the sequence.
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct ExecuteResult {
    pub enrollment: Enrollment,
    pub completed: bool,
    pub step_index: usize,
    pub channel: Option<Channel>,
    pub draft_content: Option<String>,
}

/// Summary of one batch run over due enrollments.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecuteDueReport {
    pub executed: Vec<ExecutedStep>,
    pub failed: Vec<FailedExecution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutedStep {
    pub enrollment_id: Uuid,
    pub step_index: usize,
    pub completed: bool,
    pub draft_generated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedExecution {
    pub enrollment_id: Uuid,
    pub error: String,
    pub message: String,
}
