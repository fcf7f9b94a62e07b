use crate::pricing::features::{build_feature_vector, FeatureError};
use crate::pricing::listing::ListingDescription;
use crate::pricing::reconcile::{reconcile, ReconcileError, ReconciledPrediction};
use crate::pricing::session::{ModelLoader, ScoringSession, SessionError};
use crate::schema::ModelSchema;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("feature encoding failed: {0}")]
    Feature(#[from] FeatureError),
    #[error("scoring failed: {0}")]
    Session(#[from] SessionError),
    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// The externally visible result: one reconciled prediction per target family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    pub price: ReconciledPrediction,
    pub revenue: ReconciledPrediction,
}

/// Composes the schema registry, the scoring session, and the reconciler
/// into the single `predict` operation the presentation layer calls.
pub struct PricingService<L> {
    schema: Arc<ModelSchema>,
    session: ScoringSession<L>,
}

impl<L: ModelLoader> PricingService<L> {
    pub fn new(schema: Arc<ModelSchema>, loader: Arc<L>) -> Self {
        Self {
            schema,
            session: ScoringSession::new(loader),
        }
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn session(&self) -> &ScoringSession<L> {
        &self.session
    }

    /// Encode, score, reconcile. Awaits model initialization internally on
    /// the first call; synchronous from the caller's point of view.
    pub async fn predict(
        &self,
        listing: &ListingDescription,
    ) -> Result<PredictionReport, PredictionError> {
        let features = build_feature_vector(listing, &self.schema)?;
        debug!(slots = features.len(), "feature vector built");

        let scored = self.session.score(&features).await?;

        let transforms = self.schema.transforms();
        let price = reconcile(&scored.price, transforms.price_log_transform)?;
        let revenue = reconcile(&scored.revenue, transforms.revenue_log_transform)?;

        Ok(PredictionReport { price, revenue })
    }
}
