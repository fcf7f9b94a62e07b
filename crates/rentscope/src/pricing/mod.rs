pub mod features;
pub mod listing;
pub mod outputs;
pub mod reconcile;
mod service;
pub mod session;

pub use features::{build_feature_vector, FeatureError, FeatureVector};
pub use listing::{host_experience_years, ListingDescription, ListingValidationError, RoomType};
pub use reconcile::{ReconcileError, ReconciledPrediction};
pub use service::{PredictionError, PredictionReport, PricingService};
pub use session::{
    ModelLoadError, ModelLoader, ScoredTargets, ScoringBundle, ScoringError, ScoringModel,
    ScoringSession, SessionError, SessionStatus,
};
