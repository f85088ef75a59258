// Embedding generation module
// Client for an OpenAI-compatible embeddings endpoint

pub mod openai;

pub use openai::EmbeddingsClient;
