//! Prompt composition

/// Context block used when retrieval found nothing
pub const FALLBACK_CONTEXT: &str = "No relevant context was found.";

const PREAMBLE: &str = "You are a medical assistant. \
Use the context below ONLY if it is relevant. \
If the context is empty or irrelevant, rely on general medical knowledge. \
Always provide an answer, even if the context is insufficient.";

/// Build the single prompt sent to the answer generator.
///
/// Layout: instruction preamble, `Context:` block (retrieved chunks joined by
/// newlines, or [`FALLBACK_CONTEXT`]), `Question:` block with the query
/// verbatim, then the answer cue.
pub fn compose_prompt(query: &str, context: &[String]) -> String {
    let context_block = if context.is_empty() {
        FALLBACK_CONTEXT.to_string()
    } else {
        context.join("\n")
    };

    format!(
        "{PREAMBLE}\n\n\
        Context:\n{context_block}\n\n\
        Question:\n{query}\n\n\
        Answer clearly and helpfully:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_uses_fallback() {
        let prompt = compose_prompt("Is paracetamol safe with coffee?", &[]);
        assert!(prompt.contains("No relevant context was found."));
        assert!(prompt.contains("Is paracetamol safe with coffee?"));
        assert!(prompt.starts_with("You are a medical assistant."));
        assert!(prompt.ends_with("Answer clearly and helpfully:"));
    }

    #[test]
    fn test_every_chunk_included_verbatim() {
        let chunks = vec![
            "Aspirin reduces fever.".to_string(),
            "Ibuprofen reduces inflammation.".to_string(),
        ];
        let prompt = compose_prompt("What reduces fever?", &chunks);

        assert!(prompt.contains("Context:\nAspirin reduces fever.\nIbuprofen reduces inflammation.\n\n"));
        assert!(prompt.contains("Question:\nWhat reduces fever?\n\n"));
        assert!(!prompt.contains(FALLBACK_CONTEXT));
    }

    #[test]
    fn test_preamble_sets_relevance_rule() {
        let prompt = compose_prompt("q", &[]);
        assert!(prompt.contains("Use the context below ONLY if it is relevant."));
        assert!(prompt.contains("rely on general medical knowledge"));
    }
}
