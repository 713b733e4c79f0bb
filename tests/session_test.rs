//! Session persistence and user edits through a session.

use ieeefmt::correct::Unavailable;
use ieeefmt::session::SessionSnapshot;
use ieeefmt::{
    CancelToken, ChangeKind, Corrector, CorrectorConfig, EditError, Error, FileStore,
    GrammarService, Ieeefmt, IssueKind, MemoryStore, SectionType, Session, SessionStore,
    Suggestion, UserEdit, Warning,
};
use std::sync::Arc;
use tempfile::TempDir;

const PAPER: &str = "# Stored Sessions\n\n\
    Barbara Liskov\n\n\
    ## Conclusion\n\nSessions end.\n\n\
    ## Introduction\n\nSessions begin (Liskov, 1987).\n\n\
    ## Related\n\nOther systems.\n\n\
    ## References\n\n\
    - Liskov, B. Data Abstraction. 1987.\n";

fn session(id: &str) -> Session {
    Ieeefmt::new().session_from_bytes(id, PAPER.as_bytes()).unwrap()
}

#[test]
fn test_file_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path().join("sessions"));

    let mut session = session("paper-1");
    session.process().unwrap();
    session.save(&store).unwrap();
    assert!(dir.path().join("sessions").join("paper-1.json").exists());

    let snapshot = store.load("paper-1").unwrap().unwrap();
    assert_eq!(snapshot, session.snapshot());

    let restored = Session::restore(snapshot);
    assert_eq!(restored.document(), session.document());
    assert_eq!(restored.changes().len(), session.changes().len());
    assert_eq!(restored.rules().name, "ieee-conference");

    assert!(store.load("missing").unwrap().is_none());
}

#[test]
fn test_file_store_rejects_path_ids() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    let snapshot = session("ok").snapshot();
    assert!(matches!(
        store.save("../escape", &snapshot),
        Err(Error::Storage(_))
    ));
    assert!(matches!(store.load(""), Err(Error::Storage(_))));
}

#[test]
fn test_restored_session_continues_its_log() {
    let store = MemoryStore::new();
    let mut first = session("resume");
    first.process().unwrap();
    let committed = first.changes().len() as u64;
    first.save(&store).unwrap();

    let snapshot: SessionSnapshot = store.load("resume").unwrap().unwrap();
    let mut resumed = Session::restore(snapshot);
    let outcome = resumed
        .apply_edit(&UserEdit::SetTitle {
            title: "Resumed Sessions".to_string(),
        })
        .unwrap();
    assert_eq!(outcome.changes.start, committed + 1);
    assert_eq!(
        resumed.changes().get(committed + 1).map(|c| c.kind),
        Some(ChangeKind::UserEdit)
    );
    assert_eq!(store.len(), 1);
}

#[test]
fn test_edits_recompute_issues() {
    let mut session = session("edits");
    let related = session
        .document()
        .sections
        .iter()
        .find(|s| s.heading.as_deref() == Some("Related"))
        .map(|s| s.id)
        .unwrap();

    let outcome = session
        .apply_edit(&UserEdit::ReclassifySection {
            section: related,
            kind: SectionType::RelatedWork,
        })
        .unwrap();
    assert_eq!(outcome.changes.end - outcome.changes.start, 1);
    assert_eq!(
        session.document().section(related).map(|s| s.kind),
        Some(SectionType::RelatedWork)
    );
    assert_eq!(outcome.report.issues, outcome.issues);

    let outcome = session
        .apply_edit(&UserEdit::AddSection {
            kind: SectionType::Abstract,
            heading: None,
            paragraphs: vec!["We store sessions as JSON files.".to_string()],
        })
        .unwrap();
    assert!(!outcome
        .issues
        .iter()
        .any(|i| i.kind == IssueKind::MissingRequiredSection && i.message.contains("Abstract")));

    let err = session
        .apply_edit(&UserEdit::AddSection {
            kind: SectionType::Abstract,
            heading: None,
            paragraphs: vec!["Twice.".to_string()],
        })
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Edit(EditError::DuplicateSection(SectionType::Abstract))
    ));

    let diff = session.diff();
    assert!(!diff.is_empty());
}

#[test]
fn test_sessions_are_independent() {
    let mut a = session("a");
    let b = session("b");
    a.process().unwrap();
    assert!(b.changes().is_empty());
    assert_eq!(b.document(), b.original());
    assert_ne!(a.document(), b.document());
}

/// Fails every call and cancels the session while doing so.
struct CancellingService(CancelToken);

impl GrammarService for CancellingService {
    fn name(&self) -> &str {
        "cancelling"
    }

    fn correct(&self, _text: &str) -> Result<Suggestion, Unavailable> {
        self.0.cancel();
        Err(Unavailable::Service("connection reset".to_string()))
    }
}

#[test]
fn test_cancelled_run_keeps_service_warning() {
    let session = session("cancelled");
    let service = CancellingService(session.cancel_token());
    let mut session = session.with_corrector(Corrector::new(
        Arc::new(service),
        CorrectorConfig::new().enabled(true),
    ));

    let err = session.process().unwrap_err();
    assert!(matches!(err, Error::Cancelled { .. }));
    assert!(session
        .warnings()
        .iter()
        .any(|w| matches!(w, Warning::ExternalServiceFailure { service, .. } if service == "cancelling")));
}

#[test]
fn test_repeated_runs_do_not_pile_up_warnings() {
    let mut session = session("locked");
    let mut ids = session.document().section_ids();
    ids.reverse();
    session
        .apply_edit(&UserEdit::LockSectionOrder { order: ids })
        .unwrap();

    let first = session.process().unwrap();
    assert!(!first.warnings.is_empty());
    let kept = session.warnings().len();

    for _ in 0..3 {
        let again = session.process().unwrap();
        assert_eq!(again.warnings, first.warnings);
    }
    assert_eq!(session.warnings().len(), kept);
}
