//! Optional grammar correction through an external service.
//!
//! The service sits behind [`GrammarService`]. [`NoopGrammarService`] is the
//! offline stand-in; `HttpGrammarService` (feature `ai`) calls a live
//! endpoint. The [`Corrector`] never aborts a session: any service failure
//! leaves the document untouched and comes back as a
//! [`Warning::ExternalServiceFailure`].

#[cfg(feature = "ai")]
mod http;

#[cfg(feature = "ai")]
pub use http::HttpGrammarService;

use crate::cancel::CancelToken;
use crate::changes::{ChangeKind, ChangeLog, Snapshot};
use crate::error::{Error, Result, Warning};
use crate::model::{Document, Location, SectionType};
use crossbeam_channel::RecvTimeoutError;
use log::{debug, info, warn};
use std::ops::Range;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error as ThisError;

/// Environment variable holding the grammar service endpoint.
pub const ENDPOINT_ENV: &str = "IEEEFMT_AI_ENDPOINT";
/// Environment variable holding the grammar service API key.
pub const API_KEY_ENV: &str = "IEEEFMT_AI_KEY";

/// Rule id recorded on grammar corrections.
pub const CORRECTOR_ID: &str = "grammar";

/// Replacement text proposed by a grammar service.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// Corrected text
    pub text: String,
    /// Service confidence in `[0, 1]`
    pub confidence: f32,
}

impl Suggestion {
    /// Create a suggestion.
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Why a grammar service could not answer.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    /// No service is configured.
    #[error("service disabled")]
    Disabled,

    /// The call did not finish within the configured timeout.
    #[error("timed out")]
    Timeout,

    /// The service rejected the call for quota or rate limits.
    #[error("quota exceeded")]
    Quota,

    /// Transport or server failure.
    #[error("service error: {0}")]
    Service(String),

    /// The response could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Capability interface for paragraph-level grammar correction.
pub trait GrammarService: Send + Sync {
    /// Service name used in warnings and logs.
    fn name(&self) -> &str;

    /// Propose a corrected version of `text`.
    fn correct(&self, text: &str) -> std::result::Result<Suggestion, Unavailable>;
}

/// Grammar service that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGrammarService;

impl GrammarService for NoopGrammarService {
    fn name(&self) -> &str {
        "noop"
    }

    fn correct(&self, _text: &str) -> std::result::Result<Suggestion, Unavailable> {
        Err(Unavailable::Disabled)
    }
}

/// Corrector settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectorConfig {
    /// Run the corrector at all
    pub enabled: bool,

    /// Service endpoint URL
    pub endpoint: Option<String>,

    /// Service API key
    pub api_key: Option<String>,

    /// Upper bound for one service call
    pub timeout: Duration,

    /// Suggestions below this confidence are ignored
    pub min_confidence: f32,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            timeout: Duration::from_secs(10),
            min_confidence: 0.5,
        }
    }
}

impl CorrectorConfig {
    /// Create a disabled configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read endpoint and key from the environment.
    ///
    /// The corrector is enabled only when both are present.
    pub fn from_env() -> Self {
        let endpoint = std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.is_empty());
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty());
        Self {
            enabled: endpoint.is_some() && api_key.is_some(),
            endpoint,
            api_key,
            ..Self::default()
        }
    }

    /// Enable or disable the corrector.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the service endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the minimum accepted confidence.
    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = confidence;
        self
    }

    /// Fill unset endpoint and key from the environment.
    pub fn with_env_fallback(mut self) -> Self {
        if self.endpoint.is_none() {
            self.endpoint = std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.is_empty());
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty());
        }
        self
    }
}

/// Result of a correction pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionOutcome {
    /// Paragraphs sent to the service
    pub submitted: usize,
    /// Corrections committed
    pub accepted: usize,
    /// Suggestions dropped for low confidence
    pub rejected: usize,
    /// Sequence numbers of the committed changes
    pub changes: Range<u64>,
    /// Set when the service failed and nothing was committed
    pub warning: Option<Warning>,
}

/// Runs a grammar service over the document's body paragraphs.
#[derive(Clone)]
pub struct Corrector {
    service: Arc<dyn GrammarService>,
    config: CorrectorConfig,
}

impl Corrector {
    /// Create a corrector around a service.
    pub fn new(service: Arc<dyn GrammarService>, config: CorrectorConfig) -> Self {
        Self { service, config }
    }

    /// A disabled corrector that never calls out.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopGrammarService), CorrectorConfig::default())
    }

    /// Build a corrector from configuration.
    ///
    /// Uses the HTTP service when an endpoint is configured, the no-op
    /// service otherwise.
    #[cfg(feature = "ai")]
    pub fn from_config(config: CorrectorConfig) -> Self {
        let config = config.with_env_fallback();
        match config.endpoint.clone() {
            Some(endpoint) if config.enabled => {
                let service = HttpGrammarService::new(endpoint, config.api_key.clone(), config.timeout);
                Self::new(Arc::new(service), config)
            }
            _ => Self::new(Arc::new(NoopGrammarService), config),
        }
    }

    /// Build a corrector from configuration.
    ///
    /// Without the `ai` feature only the no-op service is available.
    #[cfg(not(feature = "ai"))]
    pub fn from_config(config: CorrectorConfig) -> Self {
        Self::new(Arc::new(NoopGrammarService), config.with_env_fallback())
    }

    /// Configuration in use.
    pub fn config(&self) -> &CorrectorConfig {
        &self.config
    }

    /// Check whether the corrector will run.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Correct body paragraphs in place.
    ///
    /// Corrections are committed only if every call succeeded. On the first
    /// service failure the document is left as it was and the outcome
    /// carries a warning. Returns [`Error::Cancelled`] if the token is
    /// cancelled before the commit.
    pub fn correct(
        &self,
        doc: &mut Document,
        log: &mut ChangeLog,
        cancel: &CancelToken,
    ) -> Result<CorrectionOutcome> {
        let mut outcome = CorrectionOutcome::default();
        if !self.config.enabled {
            debug!("Corrector disabled");
            return Ok(outcome);
        }

        let mut staged = doc.clone();
        let mut pending = log.stage(CORRECTOR_ID);

        for section in staged.sections.iter_mut() {
            if section.kind == SectionType::References {
                continue;
            }
            for (index, block) in section.blocks.iter_mut().enumerate() {
                let Some(text) = block.body_text_mut() else {
                    continue;
                };
                if text.trim().is_empty() {
                    continue;
                }
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled {
                        stage: CORRECTOR_ID.to_string(),
                    });
                }

                outcome.submitted += 1;
                let suggestion = match self.call(text.clone()) {
                    Ok(suggestion) => suggestion,
                    Err(reason) => {
                        warn!("Grammar service {} failed: {}", self.service.name(), reason);
                        return Ok(CorrectionOutcome {
                            warning: Some(Warning::ExternalServiceFailure {
                                service: self.service.name().to_string(),
                                reason: reason.to_string(),
                            }),
                            ..CorrectionOutcome::default()
                        });
                    }
                };

                if suggestion.confidence < self.config.min_confidence {
                    outcome.rejected += 1;
                    continue;
                }
                let before = std::mem::replace(text, suggestion.text.clone());
                if before != suggestion.text {
                    outcome.accepted += 1;
                }
                pending.record(
                    ChangeKind::GrammarCorrection,
                    Location::Block {
                        section: section.id,
                        index,
                    },
                    Snapshot::Text(before),
                    Snapshot::Text(suggestion.text),
                );
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                stage: CORRECTOR_ID.to_string(),
            });
        }
        *doc = staged;
        outcome.changes = log.commit(pending);
        info!(
            "Corrector accepted {} of {} paragraphs",
            outcome.accepted, outcome.submitted
        );
        Ok(outcome)
    }

    /// Call the service on a worker thread, bounded by the timeout.
    fn call(&self, text: String) -> std::result::Result<Suggestion, Unavailable> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let service = Arc::clone(&self.service);
        thread::spawn(move || {
            let _ = tx.send(service.correct(&text));
        });

        let suggestion = match rx.recv_timeout(self.config.timeout) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => return Err(Unavailable::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Unavailable::Service("worker exited without a reply".into()))
            }
        };
        if suggestion.text.trim().is_empty() {
            return Err(Unavailable::Malformed("empty suggestion".into()));
        }
        if !(0.0..=1.0).contains(&suggestion.confidence) {
            return Err(Unavailable::Malformed(format!(
                "confidence {} out of range",
                suggestion.confidence
            )));
        }
        Ok(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, Section, SectionId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixSpelling;

    impl GrammarService for FixSpelling {
        fn name(&self) -> &str {
            "fix"
        }

        fn correct(&self, text: &str) -> std::result::Result<Suggestion, Unavailable> {
            Ok(Suggestion::new(text.replace("teh", "the"), 0.9))
        }
    }

    /// Succeeds on the first call, fails afterwards.
    struct FailsSecond(AtomicUsize);

    impl GrammarService for FailsSecond {
        fn name(&self) -> &str {
            "flaky"
        }

        fn correct(&self, text: &str) -> std::result::Result<Suggestion, Unavailable> {
            if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Suggestion::new(format!("{}!", text), 0.9))
            } else {
                Err(Unavailable::Quota)
            }
        }
    }

    struct Slow;

    impl GrammarService for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn correct(&self, text: &str) -> std::result::Result<Suggestion, Unavailable> {
            thread::sleep(Duration::from_millis(500));
            Ok(Suggestion::new(text, 1.0))
        }
    }

    fn sample() -> Document {
        let mut doc = Document::with_title("T");
        let mut intro = Section::new(SectionId(0), SectionType::Introduction, Some("Introduction".into()));
        intro.add_block(Block::text("We study teh problem."));
        intro.add_block(Block::equation("x = 1"));
        intro.add_block(Block::text("Teh end is near."));
        doc.push_section(intro);
        let mut refs = Section::new(SectionId(0), SectionType::References, Some("References".into()));
        refs.add_block(Block::text("[1] A. Author, teh book."));
        doc.push_section(refs);
        doc
    }

    fn enabled() -> CorrectorConfig {
        CorrectorConfig::new().enabled(true).with_timeout(Duration::from_secs(2))
    }

    #[test]
    fn test_disabled_does_nothing() {
        let mut doc = sample();
        let mut log = ChangeLog::new();
        let outcome = Corrector::disabled()
            .correct(&mut doc, &mut log, &CancelToken::new())
            .unwrap();
        assert_eq!(outcome.submitted, 0);
        assert!(outcome.warning.is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_accepts_corrections() {
        let mut doc = sample();
        let mut log = ChangeLog::new();
        let corrector = Corrector::new(Arc::new(FixSpelling), enabled());
        let outcome = corrector.correct(&mut doc, &mut log, &CancelToken::new()).unwrap();

        assert_eq!(outcome.submitted, 2);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(doc.sections[0].blocks[0].plain_text(), "We study the problem.");
        assert_eq!(doc.sections[1].blocks[0].plain_text(), "[1] A. Author, teh book.");
        assert_eq!(log.len(), 1);
        assert!(log.iter().all(|c| c.kind == ChangeKind::GrammarCorrection));
    }

    #[test]
    fn test_unavailable_service_fails_soft() {
        let mut doc = sample();
        let original = doc.clone();
        let mut log = ChangeLog::new();
        let corrector = Corrector::new(Arc::new(NoopGrammarService), enabled());
        let outcome = corrector.correct(&mut doc, &mut log, &CancelToken::new()).unwrap();

        assert_eq!(doc, original);
        assert!(log.is_empty());
        assert!(matches!(
            outcome.warning,
            Some(Warning::ExternalServiceFailure { .. })
        ));
    }

    #[test]
    fn test_partial_failure_commits_nothing() {
        let mut doc = sample();
        let original = doc.clone();
        let mut log = ChangeLog::new();
        let corrector = Corrector::new(Arc::new(FailsSecond(AtomicUsize::new(0))), enabled());
        let outcome = corrector.correct(&mut doc, &mut log, &CancelToken::new()).unwrap();

        assert_eq!(doc, original);
        assert!(log.is_empty());
        assert_eq!(outcome.accepted, 0);
        assert!(outcome.warning.is_some());
    }

    #[test]
    fn test_timeout() {
        let mut doc = sample();
        let mut log = ChangeLog::new();
        let config = enabled().with_timeout(Duration::from_millis(20));
        let corrector = Corrector::new(Arc::new(Slow), config);
        let outcome = corrector.correct(&mut doc, &mut log, &CancelToken::new()).unwrap();
        match outcome.warning {
            Some(Warning::ExternalServiceFailure { reason, .. }) => assert_eq!(reason, "timed out"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_low_confidence_rejected() {
        let mut doc = sample();
        let mut log = ChangeLog::new();
        let config = enabled().with_min_confidence(0.95);
        let corrector = Corrector::new(Arc::new(FixSpelling), config);
        let outcome = corrector.correct(&mut doc, &mut log, &CancelToken::new()).unwrap();
        assert_eq!(outcome.rejected, 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_cancelled() {
        let mut doc = sample();
        let mut log = ChangeLog::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let corrector = Corrector::new(Arc::new(FixSpelling), enabled());
        let err = corrector.correct(&mut doc, &mut log, &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
        assert!(log.is_empty());
    }
}
