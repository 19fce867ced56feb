use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::pipeline::CallGate;
use crate::utils::truncate_chars;
use crate::{EnrichError, Result};

pub mod openai;
pub mod records;

pub use openai::OpenAiTranslator;
pub use records::{BlogTranslation, VideoTranslation};

/// Longest text sent in a single request, in characters
pub const DEFAULT_CHUNK_SIZE: usize = 4000;

/// Characters of the source kept in the error marker
const MARKER_PREFIX_CHARS: usize = 100;

/// Target languages offered on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    Turkish,
    French,
    Spanish,
    German,
    Italian,
    Portuguese,
    Russian,
    Chinese,
    Japanese,
    Korean,
}

impl Language {
    pub const ALL: [Language; 10] = [
        Language::Turkish,
        Language::French,
        Language::Spanish,
        Language::German,
        Language::Italian,
        Language::Portuguese,
        Language::Russian,
        Language::Chinese,
        Language::Japanese,
        Language::Korean,
    ];

    /// Lowercase key used on the command line and in output paths
    pub fn code(&self) -> &'static str {
        match self {
            Language::Turkish => "turkish",
            Language::French => "french",
            Language::Spanish => "spanish",
            Language::German => "german",
            Language::Italian => "italian",
            Language::Portuguese => "portuguese",
            Language::Russian => "russian",
            Language::Chinese => "chinese",
            Language::Japanese => "japanese",
            Language::Korean => "korean",
        }
    }

    /// Name used in translation prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Turkish => "Turkish",
            Language::French => "French",
            Language::Spanish => "Spanish",
            Language::German => "German",
            Language::Italian => "Italian",
            Language::Portuguese => "Portuguese",
            Language::Russian => "Russian",
            Language::Chinese => "Chinese",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
        }
    }
}

impl FromStr for Language {
    type Err = EnrichError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == wanted)
            .ok_or_else(|| EnrichError::Configuration(format!("Unsupported language: {}", wanted)))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Text-completion service used for translation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Translate `text` into the language named `language`
    async fn translate(&self, text: &str, language: &str) -> Result<String>;
}

/// Outcome of translating one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub chunks: usize,
    pub failed_chunks: usize,
}

/// Split `text` into contiguous pieces of at most `chunk_size` characters.
///
/// Boundaries fall on character positions only, not sentences.
pub fn split_chunks(text: &str, chunk_size: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut chars = 0;

    for (offset, _) in text.char_indices() {
        if chars == chunk_size {
            chunks.push(&text[start..offset]);
            start = offset;
            chars = 0;
        }
        chars += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Marker stored in place of a chunk whose translation kept failing
pub fn error_marker(source: &str) -> String {
    format!("[TRANSLATION ERROR] {}...", truncate_chars(source, MARKER_PREFIX_CHARS))
}

/// Chunked translation into one target language
pub struct Translator {
    backend: Arc<dyn TranslationBackend>,
    gate: Arc<CallGate>,
    language: Language,
    chunk_size: usize,
}

impl Translator {
    pub fn new(backend: Arc<dyn TranslationBackend>, gate: Arc<CallGate>, language: Language) -> Self {
        Self {
            backend,
            gate,
            language,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Translate `text`, replacing chunks that exhaust their retries with an error marker.
    ///
    /// Blank input yields an empty string without calling the backend.
    pub async fn translate(&self, text: &str) -> Translation {
        if text.trim().is_empty() {
            return Translation {
                text: String::new(),
                chunks: 0,
                failed_chunks: 0,
            };
        }

        let chunks = split_chunks(text, self.chunk_size);
        if chunks.len() > 1 {
            tracing::debug!(
                "Text is too large ({} chars), splitting into {} chunks",
                text.chars().count(),
                chunks.len()
            );
        }

        let language = self.language.display_name();
        let mut translated = String::with_capacity(text.len());
        let mut failed_chunks = 0;
        for (index, chunk) in chunks.iter().enumerate() {
            let label = format!("Translation chunk {}/{}", index + 1, chunks.len());
            let backend = &self.backend;
            match self
                .gate
                .call(&label, || backend.translate(chunk, language))
                .await
            {
                Ok(text) => translated.push_str(&text),
                Err(e) => {
                    tracing::error!("{} failed: {}", label, e);
                    failed_chunks += 1;
                    translated.push_str(&error_marker(chunk));
                }
            }
        }

        Translation {
            text: translated,
            chunks: chunks.len(),
            failed_chunks,
        }
    }
}
