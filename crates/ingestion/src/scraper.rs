//! Web page scraper
//!
//! Fetches pages with browser-like headers, strips markup and saves the
//! remaining text as plain-text documents. Pages that keep failing are
//! skipped rather than aborting the run.

use crate::documents::{page_file_name, write_document};
use crate::errors::Result;
use medrag_common::config::IngestionConfig;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use ::scraper::{Html, Node};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument, warn};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Elements whose text never reaches the document
const SKIPPED_ELEMENTS: &[&str] = &["script", "style"];

/// Settings for [`Scraper`]
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub request_timeout: Duration,
    pub max_attempts: u32,
    /// Minimum pause between attempts; up to the same amount of jitter is added
    pub retry_pause: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_pause: Duration::from_secs(1),
        }
    }
}

impl From<&IngestionConfig> for ScraperConfig {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_attempts: config.max_attempts,
            ..Self::default()
        }
    }
}

pub struct Scraper {
    client: reqwest::Client,
    config: ScraperConfig,
}

impl Scraper {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    /// GET a page body, retrying on transport errors and non-success statuses
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < attempts => {
                    warn!(url, attempt, error = %e, "Fetch failed, retrying");
                    tokio::time::sleep(jittered(self.config.retry_pause)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    /// Fetch one page and save its text as `dir/name`. `None` when the page was skipped.
    #[instrument(skip(self, dir))]
    pub async fn scrape_page(&self, url: &str, dir: &Path, name: &str) -> Option<PathBuf> {
        let body = match self.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url, error = %e, "Giving up on page");
                medrag_common::metrics::record_scrape(false);
                return None;
            }
        };

        let text = html_to_text(&body);
        match write_document(dir, name, &text).await {
            Ok(path) => {
                info!(path = %path.display(), "Saved page");
                medrag_common::metrics::record_scrape(true);
                Some(path)
            }
            Err(e) => {
                warn!(url, error = %e, "Could not save page");
                medrag_common::metrics::record_scrape(false);
                None
            }
        }
    }

    /// Scrape every URL in order into `page_<i>.txt`, returning the files written
    pub async fn scrape_all(&self, urls: &[String], dir: &Path) -> Vec<PathBuf> {
        let mut saved = Vec::new();
        for (i, url) in urls.iter().enumerate() {
            if let Some(path) = self.scrape_page(url, dir, &page_file_name(i)).await {
                saved.push(path);
            }
        }
        info!(requested = urls.len(), saved = saved.len(), "Scraping finished");
        saved
    }
}

fn jittered(base: Duration) -> Duration {
    base + base.mul_f64(rand::thread_rng().gen_range(0.0..1.0))
}

/// Extract readable text from an HTML page.
///
/// Script and style contents are dropped, each text node starts a new line,
/// lines are trimmed and blank lines removed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            raw.push_str(text);
            raw.push('\n');
        }
    }

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
