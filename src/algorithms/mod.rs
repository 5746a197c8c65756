pub mod centroid;
pub mod response_parser;
pub mod scorer;

pub use centroid::CentroidTrainer;
pub use response_parser::ResponseParser;
pub use scorer::{Candidate, ScoreBreakdown, ScoredItem, Scorer};
