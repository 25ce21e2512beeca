//! Source URL discovery
//!
//! The LLM is asked for a list of article URLs; whatever it returns is
//! filtered down to unique, parseable http(s) links.

use crate::errors::{IngestionError, Result};
use medrag_common::llm::AnswerGenerator;
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default cap on discovered URLs
pub const DEFAULT_URL_LIMIT: usize = 100;

pub const DISCOVERY_PROMPT: &str = "Give me 100 medical article URLs from reputable sources. \
Format ONLY as plain URLs, one per line. Makes sure they are valid links.";

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://[^\s\)\]]+").expect("URL pattern should compile"))
}

/// Pull at most `limit` distinct URLs out of free-form lines.
///
/// Only the first URL on each line counts. Matches that do not parse as a
/// URL are dropped; duplicates keep their first position.
pub fn extract_valid_urls<S: AsRef<str>>(lines: &[S], limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for line in lines {
        if urls.len() >= limit {
            break;
        }
        let Some(found) = url_pattern().find(line.as_ref()) else {
            continue;
        };
        let candidate = found.as_str();
        if reqwest::Url::parse(candidate).is_err() {
            warn!(candidate, "Dropping unparseable URL");
            continue;
        }
        if seen.insert(candidate.to_string()) {
            urls.push(candidate.to_string());
        }
    }

    urls
}

/// Ask the generator for article URLs and keep the valid ones
pub async fn discover_urls(generator: &dyn AnswerGenerator, limit: usize) -> Result<Vec<String>> {
    let response = generator
        .generate(DISCOVERY_PROMPT)
        .await
        .map_err(|e| IngestionError::Discovery(e.to_string()))?;

    let lines: Vec<&str> = response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let urls = extract_valid_urls(&lines, limit);
    info!(lines = lines.len(), urls = urls.len(), model = generator.model_name(), "URLs discovered");
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medrag_common::llm::GenerationError;

    struct CannedGenerator(std::result::Result<String, GenerationError>);

    #[async_trait]
    impl AnswerGenerator for CannedGenerator {
        async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
            assert_eq!(prompt, DISCOVERY_PROMPT);
            self.0.clone()
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn test_first_match_per_line() {
        let lines = [
            "1. https://www.who.int/news-room/fact-sheets/detail/malaria",
            "[CDC](https://www.cdc.gov/flu/index.html) and https://example.org/second",
            "no link here",
            "(see http://medlineplus.gov/fever.html)",
        ];
        assert_eq!(
            extract_valid_urls(&lines, DEFAULT_URL_LIMIT),
            vec![
                "https://www.who.int/news-room/fact-sheets/detail/malaria",
                "https://www.cdc.gov/flu/index.html",
                "http://medlineplus.gov/fever.html",
            ]
        );
    }

    #[test]
    fn test_duplicates_and_invalid_dropped() {
        let lines = [
            "https://www.nhs.uk/conditions/fever/",
            "https://[not-a-host/path",
            "https://www.nhs.uk/conditions/fever/",
            "https://www.mayoclinic.org/",
        ];
        assert_eq!(
            extract_valid_urls(&lines, DEFAULT_URL_LIMIT),
            vec!["https://www.nhs.uk/conditions/fever/", "https://www.mayoclinic.org/"]
        );
    }

    #[test]
    fn test_limit() {
        let lines: Vec<String> = (0..150).map(|i| format!("https://example.org/{}", i)).collect();
        let urls = extract_valid_urls(&lines, DEFAULT_URL_LIMIT);
        assert_eq!(urls.len(), 100);
        assert_eq!(urls[99], "https://example.org/99");
    }

    #[tokio::test]
    async fn test_discover_urls() {
        let generator = CannedGenerator(Ok(
            "Here you go:\n\nhttps://www.cdc.gov/fever\n  https://www.who.int/health-topics\n".to_string(),
        ));
        let urls = discover_urls(&generator, 10).await.unwrap();
        assert_eq!(urls, vec!["https://www.cdc.gov/fever", "https://www.who.int/health-topics"]);
    }

    #[tokio::test]
    async fn test_discover_urls_generation_failure() {
        let generator = CannedGenerator(Err(GenerationError::EmptyResponse));
        assert!(matches!(
            discover_urls(&generator, 10).await,
            Err(IngestionError::Discovery(_))
        ));
    }
}
