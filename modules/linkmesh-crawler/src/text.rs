use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use linkmesh_pipeline::{Processor, Verdict};
use regex::Regex;

use crate::payload::CrawlPayload;

/// Line width handed to the text renderer. Irrelevant to the final output
/// because whitespace runs are collapsed afterwards.
const TEXT_RENDER_WIDTH: usize = 400;

/// Strips markup from fetched HTML, leaving readable text.
pub trait ContentSanitizer: Send + Sync {
    fn clean(&self, html: &str) -> String;
}

/// Default sanitizer: render the document to plain text, discarding every
/// tag, script, and style block and decoding entities.
pub struct StrictSanitizer;

impl ContentSanitizer for StrictSanitizer {
    fn clean(&self, html: &str) -> String {
        html2text::from_read(html.as_bytes(), TEXT_RENDER_WIDTH).unwrap_or_default()
    }
}

/// Text-extract stage: pulls the `<title>` and the sanitized body text out
/// of the raw content, collapsing whitespace runs to single spaces.
pub struct TextExtractor {
    sanitizer: Arc<dyn ContentSanitizer>,
    title: Regex,
    repeated_space: Regex,
}

impl TextExtractor {
    pub fn new() -> Self {
        Self::with_sanitizer(Arc::new(StrictSanitizer))
    }

    pub fn with_sanitizer(sanitizer: Arc<dyn ContentSanitizer>) -> Self {
        Self {
            sanitizer,
            title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"),
            repeated_space: Regex::new(r"\s+").expect("valid whitespace regex"),
        }
    }

    fn normalize(&self, text: &str) -> String {
        self.repeated_space.replace_all(text, " ").trim().to_string()
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor<CrawlPayload> for TextExtractor {
    async fn process(&self, payload: &mut CrawlPayload) -> Result<Verdict> {
        let content = String::from_utf8_lossy(&payload.raw_content).into_owned();

        payload.title = self
            .title
            .captures(&content)
            .map(|cap| self.normalize(&self.sanitizer.clean(&cap[1])))
            .unwrap_or_default();
        payload.text_content = self.normalize(&self.sanitizer.clean(&content));

        Ok(Verdict::Forward)
    }
}
