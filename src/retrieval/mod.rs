//! Retrieval-augmented query pipeline

mod query;

pub use query::QueryPipeline;
