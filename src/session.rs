//! Processing sessions and their storage.
//!
//! A [`Session`] owns one document and everything derived from it: the
//! parsed original, the change log, the user's overrides and the warnings
//! raised so far. All mutations go through `&mut self`, so one session has
//! at most one mutation in flight. Sessions share nothing mutable, only the
//! rule set behind an [`Arc`].

use crate::cancel::CancelToken;
use crate::changes::{ChangeLog, DocumentDiff};
use crate::correct::{CorrectionOutcome, Corrector};
use crate::edits::{apply_edit, EditOutcome, UserEdit};
use crate::error::{Error, Result, Warning};
use crate::export::{self, ExportOptions};
use crate::format::{FormatOutcome, Formatter, UserOverrides};
use crate::issues::Issue;
use crate::model::Document;
use crate::ruleset::RuleSet;
use crate::score::{ComplianceReport, ComplianceScorer};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Everything one [`Session::process`] run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    /// Issues before processing
    pub issues_before: Vec<Issue>,
    /// Grammar correction pass
    pub correction: CorrectionOutcome,
    /// Formatting pass
    pub formatting: FormatOutcome,
    /// Compliance after processing
    pub report: ComplianceReport,
    /// Warnings raised by this run
    pub warnings: Vec<Warning>,
    /// Sequence numbers of all changes committed by this run
    pub changes: Range<u64>,
}

/// Serializable state of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session id
    pub id: String,
    /// Current document
    pub document: Document,
    /// Document as parsed
    pub original: Document,
    /// Committed changes
    pub changes: ChangeLog,
    /// Rule set in use
    pub rules: RuleSet,
    /// User overrides
    #[serde(default)]
    pub overrides: UserOverrides,
    /// Warnings raised so far
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

/// One manuscript being processed.
pub struct Session {
    id: String,
    document: Document,
    original: Document,
    log: ChangeLog,
    rules: Arc<RuleSet>,
    overrides: UserOverrides,
    warnings: Vec<Warning>,
    corrector: Corrector,
    formatter: Arc<Formatter>,
    cancel: CancelToken,
}

impl Session {
    /// Start a session on a parsed document.
    pub fn new(id: impl Into<String>, document: Document, rules: Arc<RuleSet>) -> Self {
        Self {
            id: id.into(),
            original: document.clone(),
            document,
            log: ChangeLog::new(),
            rules,
            overrides: UserOverrides::default(),
            warnings: Vec::new(),
            corrector: Corrector::disabled(),
            formatter: Arc::new(Formatter::new()),
            cancel: CancelToken::new(),
        }
    }

    /// Rebuild a session from a stored snapshot.
    pub fn restore(snapshot: SessionSnapshot) -> Self {
        Self {
            id: snapshot.id,
            document: snapshot.document,
            original: snapshot.original,
            log: snapshot.changes,
            rules: Arc::new(snapshot.rules),
            overrides: snapshot.overrides,
            warnings: snapshot.warnings,
            corrector: Corrector::disabled(),
            formatter: Arc::new(Formatter::new()),
            cancel: CancelToken::new(),
        }
    }

    /// Use a grammar corrector.
    pub fn with_corrector(mut self, corrector: Corrector) -> Self {
        self.corrector = corrector;
        self
    }

    /// Use a custom formatter.
    pub fn with_formatter(mut self, formatter: Arc<Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Start with user overrides.
    pub fn with_overrides(mut self, overrides: UserOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Document as parsed.
    pub fn original(&self) -> &Document {
        &self.original
    }

    /// Committed changes.
    pub fn changes(&self) -> &ChangeLog {
        &self.log
    }

    /// Rule set in use.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// User overrides.
    pub fn overrides(&self) -> &UserOverrides {
        &self.overrides
    }

    /// Distinct warnings raised so far, in the order first seen.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Token that aborts the next stage commit when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current issues.
    pub fn issues(&self) -> Vec<Issue> {
        self.formatter.detector().detect(&self.document, &self.rules)
    }

    /// Current compliance.
    pub fn report(&self) -> ComplianceReport {
        ComplianceScorer::report(&self.document, self.issues(), &self.rules)
    }

    /// Structural diff from the parsed original to the current document.
    pub fn diff(&self) -> DocumentDiff {
        ChangeLog::diff(&self.original, &self.document)
    }

    /// Run grammar correction, then formatting, then scoring.
    ///
    /// Service failures and rule conflicts become warnings. A cancelled
    /// session returns [`Error::Cancelled`]; stages committed before the
    /// cancellation stay in the log, and so do the warnings they raised.
    pub fn process(&mut self) -> Result<ProcessingResult> {
        let start = self.log.len() as u64 + 1;
        let issues_before = self.issues();
        let mut warnings = Vec::new();

        let correction = self
            .corrector
            .correct(&mut self.document, &mut self.log, &self.cancel)?;
        if let Some(warning) = correction.warning.clone() {
            self.raise(warning.clone());
            warnings.push(warning);
        }

        let formatting = self.format()?;
        for conflict in &formatting.conflicts {
            let warning = Warning::RuleConflict {
                rule_id: conflict.rule_id.clone(),
                location: conflict.location,
                description: conflict.description.clone(),
            };
            self.raise(warning.clone());
            warnings.push(warning);
        }

        let report = ComplianceScorer::report(&self.document, formatting.remaining.clone(), &self.rules);
        info!(
            "Session {} processed: score {:.2}, {} warning(s)",
            self.id,
            report.overall,
            warnings.len()
        );

        Ok(ProcessingResult {
            issues_before,
            correction,
            formatting,
            report,
            warnings,
            changes: start..self.log.len() as u64 + 1,
        })
    }

    /// Keep a warning on the session unless an identical one is already there.
    fn raise(&mut self, warning: Warning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Run the formatter alone.
    pub fn format(&mut self) -> Result<FormatOutcome> {
        self.formatter.format(
            &mut self.document,
            &self.rules,
            &self.overrides,
            &mut self.log,
            &self.cancel,
        )
    }

    /// Apply a user edit and recompute issues and compliance.
    pub fn apply_edit(&mut self, edit: &UserEdit) -> Result<EditOutcome> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                stage: edit.name().to_string(),
            });
        }
        let changes = apply_edit(&mut self.document, &mut self.overrides, edit, &mut self.log)?;
        let issues = self.issues();
        let report = ComplianceScorer::report(&self.document, issues.clone(), &self.rules);
        Ok(EditOutcome {
            changes,
            issues,
            report,
        })
    }

    /// Export the current document. Annotated exports include the change log.
    pub fn export(&self, options: &ExportOptions) -> Result<Vec<u8>> {
        export::export(&self.document, Some(self.log.as_slice()), options)
    }

    /// Capture the session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            document: self.document.clone(),
            original: self.original.clone(),
            changes: self.log.clone(),
            rules: (*self.rules).clone(),
            overrides: self.overrides.clone(),
            warnings: self.warnings.clone(),
        }
    }

    /// Save the session to a store.
    pub fn save(&self, store: &dyn SessionStore) -> Result<()> {
        store.save(&self.id, &self.snapshot())
    }
}

/// Key-value persistence for sessions.
pub trait SessionStore: Send + Sync {
    /// Load a session snapshot, or `None` if the id is unknown.
    fn load(&self, id: &str) -> Result<Option<SessionSnapshot>>;

    /// Store a session snapshot, replacing any previous one.
    fn save(&self, id: &str, snapshot: &SessionSnapshot) -> Result<()>;
}

/// In-process session store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionSnapshot>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Option<SessionSnapshot>> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| Error::Storage("session store lock poisoned".to_string()))?;
        Ok(sessions.get(id).cloned())
    }

    fn save(&self, id: &str, snapshot: &SessionSnapshot) -> Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| Error::Storage("session store lock poisoned".to_string()))?;
        sessions.insert(id.to_string(), snapshot.clone());
        Ok(())
    }
}

/// Session store keeping one JSON file per session in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at a directory. The directory is created on
    /// first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::Storage(format!("invalid session id: {:?}", id)));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

impl SessionStore for FileStore {
    fn load(&self, id: &str) -> Result<Option<SessionSnapshot>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        let snapshot = serde_json::from_slice(&data)
            .map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded session {} from {}", id, path.display());
        Ok(Some(snapshot))
    }

    fn save(&self, id: &str, snapshot: &SessionSnapshot) -> Result<()> {
        let path = self.path_for(id)?;
        fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| Error::Storage(format!("serialize session {}: {}", id, e)))?;
        // Readers never see a partially written snapshot.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        if let Err(err) = fs::rename(&tmp, &path) {
            warn!("Could not move {} into place: {}", tmp.display(), err);
            return Err(err.into());
        }
        debug!("Saved session {} to {}", id, path.display());
        Ok(())
    }
}
