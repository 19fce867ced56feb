use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{Translation, Translator};
use crate::pipeline::Enricher;
use crate::store::{self, Record};
use crate::{EnrichError, Result};

const VIDEO_FIELDS: [&str; 3] = ["name_video", "description_video", "mp3_content"];
const BLOG_FIELDS: [&str; 2] = ["name_blog", "description_blog"];
const CONTENT_FIELD: &str = "content";
const TOC_FIELD: &str = "table_of_contents";
const BODY_FIELD: &str = "whole_content";

/// Chunk counts accumulated over the fields of one record
#[derive(Debug, Default)]
struct Tally {
    chunks: usize,
    failed: usize,
}

impl Tally {
    fn add(&mut self, translation: Translation) -> String {
        self.chunks += translation.chunks;
        self.failed += translation.failed_chunks;
        translation.text
    }

    fn finish(self) -> Result<()> {
        if self.failed > 0 {
            return Err(EnrichError::PartialTranslation {
                failed: self.failed,
                total: self.chunks,
            });
        }
        Ok(())
    }
}

async fn translate_fields(translator: &Translator, record: &mut Record, fields: &[&str], tally: &mut Tally) {
    for field in fields {
        let Some(text) = store::text_field(record, field) else {
            continue;
        };
        tracing::debug!("Translating field: {} ({} chars)", field, text.chars().count());
        let translated = tally.add(translator.translate(&text).await);
        record.insert(field.to_string(), Value::String(translated));
    }
}

/// Translates a video's name, description and transcript in place
pub struct VideoTranslation {
    translator: Arc<Translator>,
}

impl VideoTranslation {
    pub fn new(translator: Arc<Translator>) -> Self {
        Self { translator }
    }
}

#[async_trait]
impl Enricher for VideoTranslation {
    fn name(&self) -> &'static str {
        "translate video"
    }

    fn label_field(&self) -> &'static str {
        "name_video"
    }

    fn has_input(&self, record: &Record) -> bool {
        VIDEO_FIELDS
            .iter()
            .any(|field| store::text_field(record, field).is_some())
    }

    async fn enrich(&self, record: &mut Record) -> Result<()> {
        let mut tally = Tally::default();
        translate_fields(&self.translator, record, &VIDEO_FIELDS, &mut tally).await;
        tally.finish()
    }
}

/// Translates a blog post's name, description and scraped article content in place
pub struct BlogTranslation {
    translator: Arc<Translator>,
}

impl BlogTranslation {
    pub fn new(translator: Arc<Translator>) -> Self {
        Self { translator }
    }
}

fn body_text(record: &Record) -> Option<String> {
    record
        .get(CONTENT_FIELD)?
        .get(BODY_FIELD)
        .and_then(store::value_text)
}

#[async_trait]
impl Enricher for BlogTranslation {
    fn name(&self) -> &'static str {
        "translate blog"
    }

    fn label_field(&self) -> &'static str {
        "name_blog"
    }

    fn has_input(&self, record: &Record) -> bool {
        BLOG_FIELDS
            .iter()
            .any(|field| store::text_field(record, field).is_some())
            || body_text(record).is_some()
    }

    async fn enrich(&self, record: &mut Record) -> Result<()> {
        let mut tally = Tally::default();
        translate_fields(&self.translator, record, &BLOG_FIELDS, &mut tally).await;

        // The table of contents is only translated alongside a non-empty body
        let Some(body) = body_text(record) else {
            return tally.finish();
        };
        tracing::debug!("Translating blog content ({} chars)", body.chars().count());

        let entries = record
            .get(CONTENT_FIELD)
            .and_then(|content| content.get(TOC_FIELD))
            .and_then(Value::as_array)
            .cloned();
        let toc = match entries {
            Some(entries) => {
                let mut translated = Vec::with_capacity(entries.len());
                for entry in entries {
                    match entry {
                        Value::String(text) => {
                            let text = tally.add(self.translator.translate(&text).await);
                            translated.push(Value::String(text));
                        }
                        other => translated.push(other),
                    }
                }
                Some(translated)
            }
            None => None,
        };
        let body = tally.add(self.translator.translate(&body).await);

        if let Some(Value::Object(content)) = record.get_mut(CONTENT_FIELD) {
            if let Some(toc) = toc {
                content.insert(TOC_FIELD.to_string(), Value::Array(toc));
            }
            content.insert(BODY_FIELD.to_string(), Value::String(body));
        }
        tally.finish()
    }
}
