//! Lifecycle management for loaded scoring callables.
//!
//! Model loading is expensive and must happen at most once per process no
//! matter how many prediction requests race it. The session owns a single
//! shared in-flight handle: whichever caller first takes the handle runs the
//! load, every concurrent caller awaits the same handle, and a failed load
//! clears back to uninitialized so the next call can retry.

use crate::pricing::features::FeatureVector;
use crate::pricing::outputs::RawOutputs;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("unable to load scoring artifact: {0}")]
    Artifact(String),
    #[error("model loading task aborted: {0}")]
    TaskAborted(String),
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("feature vector has {actual} slots, model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("inference call failed: {0}")]
    Inference(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] ModelLoadError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

/// One loaded scoring callable. Implementations must be safe to invoke
/// concurrently; handles are shared read-only after initialization.
pub trait ScoringModel: Send + Sync {
    /// Score a feature vector, returning the artifact's named outputs.
    fn score(&self, features: &FeatureVector) -> Result<RawOutputs, ScoringError>;
}

/// Binding seam to the model runtime. Loading runs on a blocking thread;
/// implementations may do file I/O freely.
pub trait ModelLoader: Send + Sync + 'static {
    fn load(&self) -> Result<ScoringBundle, ModelLoadError>;
}

/// The loaded callables, one per target family. A family's model may be a
/// merged artifact emitting every named output for that family.
pub struct ScoringBundle {
    pub price: Arc<dyn ScoringModel>,
    pub revenue: Arc<dyn ScoringModel>,
}

impl std::fmt::Debug for ScoringBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringBundle").finish_non_exhaustive()
    }
}

/// Raw named outputs per target family from one scoring pass.
#[derive(Debug)]
pub struct ScoredTargets {
    pub price: RawOutputs,
    pub revenue: RawOutputs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Uninitialized,
    Initializing,
    Ready,
}

impl SessionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
        }
    }
}

const STATUS_UNINITIALIZED: u8 = 0;
const STATUS_INITIALIZING: u8 = 1;
const STATUS_READY: u8 = 2;

/// Process-wide scoring lifecycle. Construct once, share via `Arc`.
pub struct ScoringSession<L> {
    loader: Arc<L>,
    bundle: Mutex<Option<Arc<ScoringBundle>>>,
    status: AtomicU8,
    load_attempts: AtomicU64,
}

impl<L: ModelLoader> ScoringSession<L> {
    pub fn new(loader: Arc<L>) -> Self {
        Self {
            loader,
            bundle: Mutex::new(None),
            status: AtomicU8::new(STATUS_UNINITIALIZED),
            load_attempts: AtomicU64::new(0),
        }
    }

    /// Observable lifecycle phase; never blocks on the in-flight handle.
    pub fn status(&self) -> SessionStatus {
        match self.status.load(Ordering::Acquire) {
            STATUS_READY => SessionStatus::Ready,
            STATUS_INITIALIZING => SessionStatus::Initializing,
            _ => SessionStatus::Uninitialized,
        }
    }

    /// Load attempts so far. Lets tests observe that concurrent callers
    /// coalesced onto a single load.
    pub fn load_attempts(&self) -> u64 {
        self.load_attempts.load(Ordering::Relaxed)
    }

    /// Idempotent initialization. Concurrent callers all await the same
    /// in-flight load; a failure is returned to its caller and never cached.
    pub async fn ensure_ready(&self) -> Result<Arc<ScoringBundle>, ModelLoadError> {
        let mut guard = self.bundle.lock().await;
        if let Some(bundle) = guard.as_ref() {
            return Ok(Arc::clone(bundle));
        }

        self.status
            .store(STATUS_INITIALIZING, Ordering::Release);
        self.load_attempts.fetch_add(1, Ordering::Relaxed);

        let loader = Arc::clone(&self.loader);
        let loaded = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|err| ModelLoadError::TaskAborted(err.to_string()))
            .and_then(|result| result);

        match loaded {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                *guard = Some(Arc::clone(&bundle));
                self.status.store(STATUS_READY, Ordering::Release);
                info!("scoring models loaded");
                Ok(bundle)
            }
            Err(err) => {
                self.status
                    .store(STATUS_UNINITIALIZED, Ordering::Release);
                warn!(error = %err, "scoring model load failed");
                Err(err)
            }
        }
    }

    /// Score one feature vector against both target families, triggering
    /// initialization if the session is not yet ready.
    pub async fn score(&self, features: &FeatureVector) -> Result<ScoredTargets, SessionError> {
        let bundle = self.ensure_ready().await?;
        let price = bundle.price.score(features)?;
        let revenue = bundle.revenue.score(features)?;
        Ok(ScoredTargets { price, revenue })
    }

    /// Tear the session back to uninitialized. Test seam; production
    /// processes reload the artifact by restarting.
    pub async fn reset(&self) {
        let mut guard = self.bundle.lock().await;
        *guard = None;
        self.status
            .store(STATUS_UNINITIALIZED, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    struct StubModel {
        output: &'static str,
        value: f64,
    }

    impl ScoringModel for StubModel {
        fn score(&self, _features: &FeatureVector) -> Result<RawOutputs, ScoringError> {
            let mut outputs = BTreeMap::new();
            outputs.insert(self.output.to_string(), self.value);
            Ok(outputs)
        }
    }

    struct FlakyLoader {
        attempts: AtomicUsize,
        fail_first: usize,
    }

    impl FlakyLoader {
        fn new(fail_first: usize) -> Self {
            Self {
                attempts: AtomicUsize::new(0),
                fail_first,
            }
        }
    }

    impl ModelLoader for FlakyLoader {
        fn load(&self) -> Result<ScoringBundle, ModelLoadError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                return Err(ModelLoadError::Artifact("artifact store offline".into()));
            }
            Ok(ScoringBundle {
                price: Arc::new(StubModel {
                    output: "Price_Point",
                    value: 120.0,
                }),
                revenue: Arc::new(StubModel {
                    output: "Revenue_Point",
                    value: 38000.0,
                }),
            })
        }
    }

    #[tokio::test]
    async fn status_progresses_to_ready() {
        let session = ScoringSession::new(Arc::new(FlakyLoader::new(0)));
        assert_eq!(session.status(), SessionStatus::Uninitialized);
        session.ensure_ready().await.expect("load succeeds");
        assert_eq!(session.status(), SessionStatus::Ready);
        assert_eq!(session.load_attempts(), 1);
    }

    #[tokio::test]
    async fn failed_load_resets_and_allows_retry() {
        let session = ScoringSession::new(Arc::new(FlakyLoader::new(1)));
        let err = session.ensure_ready().await.expect_err("first load fails");
        assert!(matches!(err, ModelLoadError::Artifact(_)));
        assert_eq!(session.status(), SessionStatus::Uninitialized);

        session.ensure_ready().await.expect("retry succeeds");
        assert_eq!(session.status(), SessionStatus::Ready);
        assert_eq!(session.load_attempts(), 2);
    }

    #[tokio::test]
    async fn repeated_ensure_ready_loads_once() {
        let session = ScoringSession::new(Arc::new(FlakyLoader::new(0)));
        session.ensure_ready().await.expect("load succeeds");
        session.ensure_ready().await.expect("already ready");
        session.ensure_ready().await.expect("already ready");
        assert_eq!(session.load_attempts(), 1);
    }

    #[tokio::test]
    async fn reset_returns_session_to_uninitialized() {
        let session = ScoringSession::new(Arc::new(FlakyLoader::new(0)));
        session.ensure_ready().await.expect("load succeeds");
        session.reset().await;
        assert_eq!(session.status(), SessionStatus::Uninitialized);
        session.ensure_ready().await.expect("reload succeeds");
        assert_eq!(session.load_attempts(), 2);
    }

    #[tokio::test]
    async fn score_triggers_initialization_implicitly() {
        let session = ScoringSession::new(Arc::new(FlakyLoader::new(0)));
        let features = FeatureVector::from_values(vec![1.0, 2.0]);
        let scored = session.score(&features).await.expect("score succeeds");
        assert_eq!(scored.price.get("Price_Point"), Some(&120.0));
        assert_eq!(scored.revenue.get("Revenue_Point"), Some(&38000.0));
        assert_eq!(session.status(), SessionStatus::Ready);
    }
}
