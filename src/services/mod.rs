pub mod catalog;
pub mod embedding;
pub mod generation;
pub mod interactions;
pub mod model_store;
pub mod recommendation;
pub mod training;
