//! Embedding generation for semantic product search
//!
//! Two remote provider backends sit behind one trait:
//!
//! - **OpenAI** - OpenAI-compatible `/v1/embeddings` APIs
//! - **Gemini** - Google `embedContent` API
//!
//! # Architecture
//!
//! ```text
//! EmbeddingClient (credential, input and dimension checks)
//!     └── EmbeddingProvider (trait)
//!             ├── OpenAIProvider  - bearer auth, data[0].embedding
//!             └── GeminiProvider  - key query param, embedding.values
//! ```
//!
//! # Example
//!
//! ```ignore
//! use shopsearch_search::embeddings::{EmbeddingClient, EmbeddingConfig};
//!
//! let client = EmbeddingClient::from_config(&EmbeddingConfig::openai("sk-..."))?;
//! let vector = client.embed("velvet sofa").await?;
//! ```

mod client;
pub mod factory;
pub mod gemini;
mod http;
pub mod openai;
mod provider;

pub use client::EmbeddingClient;
pub use factory::{create as create_provider, EmbeddingConfig};
pub use gemini::{GeminiConfig, GeminiProvider};
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
