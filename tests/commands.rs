mod common;

use std::sync::Arc;

use common::MemoryBackend;
use knowledge_desk_lib::commands::{chat, knowledge, Output};
use knowledge_desk_lib::session::{OpClass, SessionController};

const QUIET: Output = Output {
    json: false,
    quiet: true,
};

fn controller() -> (Arc<MemoryBackend>, SessionController<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let session = SessionController::with_shared(Arc::clone(&backend));
    (backend, session)
}

#[tokio::test]
async fn test_clear_reports_refresh_failure_after_clearing() {
    let (backend, mut session) = controller();
    chat::ask(&mut session, "anything?", QUIET).await.unwrap();
    backend.fail_next(OpClass::Status, 503, "status unavailable");

    let err = knowledge::clear(&mut session, QUIET).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "backend returned HTTP 503: status unavailable"
    );
    assert!(session.state().conversation.is_empty());
    assert_eq!(
        backend.calls(),
        vec![OpClass::Query, OpClass::Status, OpClass::Clear, OpClass::Status]
    );
}

#[tokio::test]
async fn test_failed_clear_is_reported_before_anything_else() {
    let (backend, mut session) = controller();
    chat::ask(&mut session, "keep me", QUIET).await.unwrap();
    backend.fail_next(OpClass::Clear, 500, "Vector DB error");

    let err = knowledge::clear(&mut session, QUIET).await.unwrap_err();

    assert_eq!(err.to_string(), "backend returned HTTP 500: Vector DB error");
    assert_eq!(session.state().conversation.len(), 2);
}

#[tokio::test]
async fn test_clear_succeeds_when_refresh_succeeds() {
    let (_backend, mut session) = controller();
    knowledge::clear(&mut session, QUIET).await.unwrap();
    assert_eq!(session.state().status.as_ref().unwrap().num_chunks, 0);
}

#[tokio::test]
async fn test_failed_ingest_does_not_reuse_previous_report() {
    let dir = tempfile::tempdir().unwrap();
    let old = dir.path().join("old.txt");
    let new = dir.path().join("new.txt");
    std::fs::write(&old, "a\nb\n").unwrap();
    std::fs::write(&new, "c\n").unwrap();

    let (backend, mut session) = controller();
    knowledge::ingest(&mut session, &[old], false, QUIET)
        .await
        .unwrap();

    backend.fail_next(OpClass::Ingest, 500, "Vector DB error");
    let err = knowledge::ingest(&mut session, &[new], false, QUIET)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "backend returned HTTP 500: Vector DB error");
}

#[tokio::test]
async fn test_blank_question_is_refused() {
    let (backend, mut session) = controller();
    let err = chat::ask(&mut session, "   ", QUIET).await.unwrap_err();
    assert_eq!(err.to_string(), "question is empty");
    assert!(backend.queries().is_empty());
}
