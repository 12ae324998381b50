pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod fusion;
pub mod keywords;
pub mod models;
pub mod normalize;
pub mod similarity;
pub mod transcription;

pub use config::GradeConfig;
pub use embeddings::{EmbeddingBackend, EmbeddingConfig, EmbeddingError, OpenAiEmbeddingClient};
pub use error::GradeError;
pub use fusion::{fuse, ScoreBreakdown, ScoreWeights};
pub use keywords::keyword_score;
pub use normalize::normalize;
pub use similarity::{cosine, semantic_similarity};
pub use transcription::{
    AudioArtifact, TranscriptionBackend, TranscriptionConfig, TranscriptionError, WhisperClient,
};
