//! Stateless question answering agent

use super::prompt::compose_prompt;
use super::retriever::Retriever;
use crate::llm::{render_generation, AnswerGenerator, GenerationError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Outcome of one question: the context that was used and the generation result
#[derive(Debug, Clone)]
pub struct AgentTurn {
    pub context: Vec<String>,
    pub generation: Result<String, GenerationError>,
}

impl AgentTurn {
    pub fn is_error(&self) -> bool {
        self.generation.is_err()
    }

    /// Display text for the turn: the answer or `Error: <message>`
    pub fn into_text(self) -> String {
        render_generation(self.generation)
    }
}

/// Retrieve, compose, generate. No memory between questions.
#[derive(Clone)]
pub struct Agent {
    retriever: Retriever,
    generator: Arc<dyn AnswerGenerator>,
}

impl Agent {
    pub fn new(retriever: Retriever, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Answer one question, keeping the retrieved context alongside the result
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn run(&self, query: &str) -> AgentTurn {
        let start = Instant::now();

        let context = self.retriever.retrieve_default(query).await;
        let prompt = compose_prompt(query, &context);
        let generation = self.generator.generate(&prompt).await;

        match &generation {
            Ok(answer) => info!(
                context_chunks = context.len(),
                answer_len = answer.len(),
                model = self.generator.model_name(),
                "Answer generated"
            ),
            Err(e) => {
                warn!(error = %e, model = self.generator.model_name(), "Answer generation failed");
                crate::metrics::record_generation_failure(self.generator.model_name());
            }
        }
        crate::metrics::record_answer(start.elapsed(), generation.is_ok());

        AgentTurn {
            context,
            generation,
        }
    }

    /// Answer one question as display text. Never fails.
    pub async fn answer(&self, query: &str) -> String {
        self.run(query).await.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DistanceMetric, InMemoryIndex, VectorIndex};
    use crate::embeddings::HashEmbedder;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes a fixed answer and remembers every prompt it was given
    struct RecordingGenerator {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingGenerator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl AnswerGenerator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl AnswerGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Api {
                status: 401,
                body: "invalid api key".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    async fn retriever_with(chunks: &[&str]) -> Retriever {
        let embedder = Arc::new(HashEmbedder::new(384));
        let index = Arc::new(InMemoryIndex::new(384, DistanceMetric::Cosine));
        for chunk in chunks {
            index.insert(chunk, &embedder.embed_text(chunk)).await.unwrap();
        }
        Retriever::new(embedder, index)
    }

    #[tokio::test]
    async fn test_prompt_carries_retrieved_context() {
        let retriever =
            retriever_with(&["Aspirin reduces fever.", "Ibuprofen reduces inflammation."]).await;
        let generator = Arc::new(RecordingGenerator::new("Aspirin can reduce fever."));
        let agent = Agent::new(retriever, generator.clone());

        let answer = agent.answer("What reduces fever?").await;
        assert_eq!(answer, "Aspirin can reduce fever.");

        let prompt = generator.last_prompt();
        assert!(prompt.contains("Aspirin reduces fever."));
        assert!(prompt.contains("Question:\nWhat reduces fever?"));
    }

    #[tokio::test]
    async fn test_empty_index_still_answers() {
        let generator = Arc::new(RecordingGenerator::new("Drink water and rest."));
        let agent = Agent::new(retriever_with(&[]).await, generator.clone());

        let turn = agent.run("How do I treat a cold?").await;
        assert!(turn.context.is_empty());
        assert!(!turn.is_error());
        assert!(generator.last_prompt().contains("No relevant context was found."));
        assert_eq!(turn.into_text(), "Drink water and rest.");
    }

    #[tokio::test]
    async fn test_generation_failure_becomes_error_text() {
        let agent = Agent::new(
            retriever_with(&["Aspirin reduces fever."]).await,
            Arc::new(FailingGenerator),
        );

        let turn = agent.run("What reduces fever?").await;
        assert!(turn.is_error());
        assert_eq!(turn.context, vec!["Aspirin reduces fever."]);

        let answer = agent.answer("What reduces fever?").await;
        assert!(answer.starts_with("Error:"));
        assert!(answer.contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_questions_are_independent() {
        let generator = Arc::new(RecordingGenerator::new("ok"));
        let agent = Agent::new(retriever_with(&["Aspirin reduces fever."]).await, generator.clone());

        agent.answer("first question").await;
        agent.answer("second question").await;

        let prompt = generator.last_prompt();
        assert!(prompt.contains("second question"));
        assert!(!prompt.contains("first question"));
    }
}
