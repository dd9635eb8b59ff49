pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod matcher;
pub mod merger;
pub mod notify;
pub mod palette;
pub mod protocol;
pub mod storage;
pub mod store;
pub mod trainer;

// Re-export the types most callers need
pub use engine::{FaceLearner, FaceReport, LabelOutcome, TrainingMode};
pub use error::FaceError;
pub use identity::{Embedding, Identity, VisualizedIdentity};
pub use matcher::Matcher;
pub use palette::Palette;
pub use store::IdentityStore;
pub use trainer::TrainingOutcome;
