//! Query path of the RAG pipeline
//!
//! - Retrieval of the nearest stored chunks for a question
//! - Prompt composition around the retrieved context
//! - The stateless agent tying retrieval, prompting and generation together

mod agent;
mod prompt;
mod retriever;

pub use agent::{Agent, AgentTurn};
pub use prompt::{compose_prompt, FALLBACK_CONTEXT};
pub use retriever::{Retriever, DEFAULT_TOP_K};
