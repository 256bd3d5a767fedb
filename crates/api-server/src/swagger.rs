//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cadence Engine API",
        version = "0.1.0",
        description = "Multi-step outreach cadences.\n\nDefines sequences of channel steps, enrolls contacts, and walks each enrollment through its steps with generated drafts.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Sequences", description = "Sequence definitions and templates"),
        (name = "Enrollments", description = "Enrollment lifecycle, transitions and step execution"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Sequences
        crate::sequence_rest::create_sequence,
        crate::sequence_rest::list_sequences,
        crate::sequence_rest::get_sequence,
        crate::sequence_rest::update_sequence,
        crate::sequence_rest::delete_sequence,
        // Enrollments
        crate::enrollment_rest::create_enrollment,
        crate::enrollment_rest::list_enrollments,
        crate::enrollment_rest::get_enrollment,
        crate::enrollment_rest::transition_enrollment,
        crate::enrollment_rest::execute_enrollment,
        crate::enrollment_rest::execute_due,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        cadence_core::types::Channel,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
        crate::sequence_rest::SequenceInput,
        crate::enrollment_rest::CreateEnrollmentRequest,
        crate::enrollment_rest::TransitionRequest,
        crate::enrollment_rest::ExecuteDueRequest,
        crate::views::StepView,
        crate::views::SequenceView,
        crate::views::SequenceListView,
        crate::views::EnrollmentView,
        crate::views::EnrollmentListView,
        crate::views::StepLogView,
        crate::views::EnrollmentDetailView,
        crate::views::TransitionView,
        crate::views::ExecuteView,
        crate::views::ExecutedStepView,
        crate::views::FailedExecutionView,
        crate::views::ExecuteDueView,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/sequences",
            "/sequences/{id}",
            "/enrollments",
            "/enrollments/{id}",
            "/enrollments/{id}/execute",
            "/enrollments/execute-due",
            "/health",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {expected}");
        }
    }
}
