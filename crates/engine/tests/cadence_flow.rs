//! End-to-end walk of an enrollment through a sequence using the real
//! template renderer and the cached directory.

use std::sync::Arc;

use chrono::Utc;

use cadence_cache::CachedDirectory;
use cadence_core::config::CacheConfig;
use cadence_core::event_bus::capture_sink;
use cadence_core::types::{Channel, Company, Contact, EventType};
use cadence_core::InMemoryDirectory;
use cadence_engine::repository::CadenceRepository;
use cadence_engine::types::{
    EnrollmentStatus, NewEnrollment, NewSequence, Step, StepLogStatus, TransitionAction,
};
use cadence_engine::{CadenceEngine, InMemoryRepository, TemplateDraftGenerator};

fn setup() -> (CadenceEngine, Arc<InMemoryRepository>) {
    let directory = Arc::new(InMemoryDirectory::new());
    directory.put_contact(Contact {
        id: "c-42".into(),
        name: "Grace Hopper".into(),
        title: Some("VP Engineering".into()),
        ..Default::default()
    });
    directory.put_company(Company {
        domain: "navy.mil".into(),
        name: "US Navy".into(),
        ..Default::default()
    });
    let cached = Arc::new(CachedDirectory::new(directory, &CacheConfig::default()));
    let repo = Arc::new(InMemoryRepository::new());
    let engine = CadenceEngine::new(repo.clone(), cached, Arc::new(TemplateDraftGenerator::new()));
    (engine, repo)
}

fn outbound() -> NewSequence {
    NewSequence {
        name: "Outbound Q3".into(),
        description: Some("email, call, connect".into()),
        steps: vec![
            Step::new(Channel::Email, 0.0),
            Step::new(Channel::Call, 2.0),
            Step::new(Channel::LinkedinConnect, 3.0),
        ],
        is_template: false,
        created_by: "alice".into(),
    }
}

#[tokio::test]
async fn test_full_cadence_with_drafts() {
    let (engine, repo) = setup();
    let sink = capture_sink();
    let engine = engine.with_event_sink(sink.clone());

    let sequence = engine.create_sequence(outbound()).unwrap();
    let enrollment = engine
        .enroll(NewEnrollment {
            sequence_id: sequence.id,
            contact_id: "c-42".into(),
            company_domain: "navy.mil".into(),
            enrolled_by: "alice".into(),
        })
        .unwrap();

    let first = engine.execute(enrollment.id).await.unwrap();
    let draft = first.draft_content.unwrap();
    assert!(draft.contains("Hi Grace,"));
    assert!(draft.contains("US Navy"));

    let second = engine
        .transition(enrollment.id, TransitionAction::Advance, Some("no_answer".into()), None)
        .unwrap();
    assert_eq!(second.enrollment.current_step, 2);

    let last = engine.execute(enrollment.id).await.unwrap();
    assert!(last.completed);
    assert_eq!(last.enrollment.status, EnrollmentStatus::Completed);

    let (final_state, logs) = engine.enrollment_detail(enrollment.id).unwrap();
    assert_eq!(final_state.current_step, 3);
    assert!(final_state.next_step_due_at.is_none());
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|l| l.status == StepLogStatus::Completed));
    assert_eq!(logs[1].outcome.as_deref(), Some("no_answer"));
    assert!(logs[1].draft_content.is_none());
    assert!(logs[2].draft_content.is_some());

    assert_eq!(sink.count_type(EventType::StepCompleted), 3);
    assert_eq!(sink.count_type(EventType::EnrollmentCompleted), 1);

    // The contact is free to be enrolled again once the first run is over.
    assert!(engine
        .enroll(NewEnrollment {
            sequence_id: sequence.id,
            contact_id: "c-42".into(),
            company_domain: "navy.mil".into(),
            enrolled_by: "bob".into(),
        })
        .is_ok());
    assert_eq!(repo.count_open_enrollments(sequence.id).unwrap(), 1);
}

#[tokio::test]
async fn test_paused_enrollments_are_skipped_by_scheduler() {
    let (engine, _) = setup();
    let sequence = engine.create_sequence(outbound()).unwrap();

    let mut ids = Vec::new();
    for contact in ["c-1", "c-2", "c-3"] {
        let e = engine
            .enroll(NewEnrollment {
                sequence_id: sequence.id,
                contact_id: contact.into(),
                company_domain: "navy.mil".into(),
                enrolled_by: "alice".into(),
            })
            .unwrap();
        ids.push(e.id);
    }
    engine.pause(ids[1]).unwrap();

    let report = engine.execute_due(Utc::now(), 2).await.unwrap();
    assert_eq!(report.executed.len(), 2);
    assert!(report.executed.iter().all(|s| s.enrollment_id != ids[1]));

    let paused = engine.get_enrollment(ids[1]).unwrap();
    assert_eq!(paused.current_step, 0);
    assert_eq!(paused.status, EnrollmentStatus::Paused);
}
