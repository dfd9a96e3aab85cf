// Offline model training: label derivation from job similarity, the label
// vocabulary, classifiers and the published artifact archive.

pub mod artifacts;
pub mod classifier;
pub mod labels;
pub mod split;
pub mod trainer;
pub mod vocabulary;

pub use artifacts::{load_latest, ModelArtifacts};
pub use trainer::{train_from_store, TrainingOptions};
