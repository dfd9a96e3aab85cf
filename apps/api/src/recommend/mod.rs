pub mod handlers;
pub mod recommender;

pub use recommender::{recommend, ArtifactSet};
