// src/llm/mod.rs
pub mod client;
pub mod models;

use crate::utils::error::ModelError;
use async_trait::async_trait;

pub use client::{ChatClient, EmbeddingClient};

/// Text-in, text-out completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Sentence embeddings, one vector per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;
}

#[cfg(test)]
pub mod testing {
    //! In-memory stand-ins for the model server.
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays canned completions in order and records the prompts it saw.
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, ModelError>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        /// The first call fails as if the server were unreachable.
        pub fn failing() -> Self {
            Self {
                replies: Mutex::new(VecDeque::from(vec![Err(ModelError::EmptyResponse)])),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().len()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().push(prompt.to_string());
            self.replies.lock().pop_front().unwrap_or_else(|| Ok(String::new()))
        }
    }

    /// Bag-of-words hashing embedder: texts sharing words land close together.
    pub struct HashEmbedder;

    const DIMS: usize = 64;

    impl HashEmbedder {
        fn vector(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; DIMS];
            for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
                let bucket = word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize)) % DIMS;
                v[bucket] += 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        fn model_name(&self) -> &str {
            "hash-bow"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }
    }
}
