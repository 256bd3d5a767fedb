//! camelCase projections of the engine's storage types.

use cadence_core::types::Channel;
use cadence_engine::types::{
    Enrollment, ExecuteDueReport, ExecuteResult, Sequence, Step, StepLog, TransitionResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub channel: Channel,
    pub delay_days: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<Step> for StepView {
    fn from(step: Step) -> Self {
        Self {
            channel: step.channel,
            delay_days: step.delay_days,
            template: step.template,
            tone: step.tone,
            notes: step.notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SequenceView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<StepView>,
    pub is_template: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Sequence> for SequenceView {
    fn from(seq: Sequence) -> Self {
        Self {
            id: seq.id,
            name: seq.name,
            description: seq.description,
            steps: seq.steps.into_iter().map(StepView::from).collect(),
            is_template: seq.is_template,
            created_by: seq.created_by,
            created_at: seq.created_at,
            updated_at: seq.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentView {
    pub id: Uuid,
    pub sequence_id: Uuid,
    pub contact_id: String,
    pub company_domain: String,
    pub enrolled_by: String,
    pub current_step: usize,
    /// One of `active`, `paused`, `completed`, `unenrolled`.
    pub status: String,
    pub next_step_due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Enrollment> for EnrollmentView {
    fn from(e: Enrollment) -> Self {
        Self {
            id: e.id,
            sequence_id: e.sequence_id,
            contact_id: e.contact_id,
            company_domain: e.company_domain,
            enrolled_by: e.enrolled_by,
            current_step: e.current_step,
            status: e.status.as_str().to_string(),
            next_step_due_at: e.next_step_due_at,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepLogView {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub step_index: usize,
    pub channel: Channel,
    /// One of `pending`, `completed`, `cancelled`.
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
    pub notes: Option<String>,
    pub draft_content: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StepLog> for StepLogView {
    fn from(log: StepLog) -> Self {
        use cadence_engine::types::StepLogStatus;
        let status = match log.status {
            StepLogStatus::Pending => "pending",
            StepLogStatus::Completed => "completed",
            StepLogStatus::Cancelled => "cancelled",
        };
        Self {
            id: log.id,
            enrollment_id: log.enrollment_id,
            step_index: log.step_index,
            channel: log.channel,
            status: status.to_string(),
            completed_at: log.completed_at,
            outcome: log.outcome,
            notes: log.notes,
            draft_content: log.draft_content,
            created_at: log.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentDetailView {
    pub enrollment: EnrollmentView,
    pub step_logs: Vec<StepLogView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentListView {
    pub enrollments: Vec<EnrollmentView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SequenceListView {
    pub sequences: Vec<SequenceView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransitionView {
    pub enrollment: EnrollmentView,
    pub completed: bool,
}

impl From<TransitionResult> for TransitionView {
    fn from(r: TransitionResult) -> Self {
        Self {
            enrollment: r.enrollment.into(),
            completed: r.completed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteView {
    pub enrollment: EnrollmentView,
    pub completed: bool,
    pub step_index: usize,
    pub channel: Option<Channel>,
    pub draft_content: Option<String>,
}

impl From<ExecuteResult> for ExecuteView {
    fn from(r: ExecuteResult) -> Self {
        Self {
            enrollment: r.enrollment.into(),
            completed: r.completed,
            step_index: r.step_index,
            channel: r.channel,
            draft_content: r.draft_content,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedStepView {
    pub enrollment_id: Uuid,
    pub step_index: usize,
    pub completed: bool,
    pub draft_generated: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailedExecutionView {
    pub enrollment_id: Uuid,
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExecuteDueView {
    pub executed: Vec<ExecutedStepView>,
    pub failed: Vec<FailedExecutionView>,
}

impl From<ExecuteDueReport> for ExecuteDueView {
    fn from(report: ExecuteDueReport) -> Self {
        Self {
            executed: report
                .executed
                .into_iter()
                .map(|s| ExecutedStepView {
                    enrollment_id: s.enrollment_id,
                    step_index: s.step_index,
                    completed: s.completed,
                    draft_generated: s.draft_generated,
                })
                .collect(),
            failed: report
                .failed
                .into_iter()
                .map(|f| FailedExecutionView {
                    enrollment_id: f.enrollment_id,
                    error: f.error,
                    message: f.message,
                })
                .collect(),
        }
    }
}
