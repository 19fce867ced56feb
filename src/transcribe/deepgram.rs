use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

use super::{SpeechBackend, Transcript, Utterance};
use crate::config::DeepgramConfig;
use crate::{EnrichError, Result};

/// Prerecorded-audio client for the Deepgram `listen` endpoint
pub struct DeepgramClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    diarize: bool,
}

/// Deepgram response format (only the parts we read)
#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    utterances: Option<Vec<ListenUtterance>>,
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenUtterance {
    speaker: Option<u32>,
    #[serde(default)]
    transcript: String,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

impl DeepgramClient {
    pub fn new(config: &DeepgramConfig, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            diarize: config.diarize,
        })
    }
}

#[async_trait]
impl SpeechBackend for DeepgramClient {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<Transcript> {
        let flag = if self.diarize { "true" } else { "false" };

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Token {}", self.api_key))
            .header(CONTENT_TYPE, mime_type)
            .query(&[
                ("model", self.model.as_str()),
                ("smart_format", "true"),
                ("diarize", flag),
                ("utterances", flag),
            ])
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| EnrichError::ExternalService(format!("Deepgram request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EnrichError::ExternalService(format!(
                "Deepgram returned HTTP {}: {}",
                status, body
            )));
        }

        let parsed: ListenResponse = response.json().await.map_err(|e| {
            EnrichError::ExternalService(format!("Failed to parse Deepgram response: {}", e))
        })?;

        Ok(parsed.into_transcript())
    }
}

impl ListenResponse {
    fn into_transcript(self) -> Transcript {
        match self.results.utterances {
            Some(utterances) if !utterances.is_empty() => Transcript::Diarized(
                utterances
                    .into_iter()
                    .map(|u| Utterance {
                        speaker: u.speaker.unwrap_or(0),
                        text: u.transcript,
                    })
                    .collect(),
            ),
            _ => Transcript::Plain(
                self.results
                    .channels
                    .into_iter()
                    .next()
                    .and_then(|c| c.alternatives.into_iter().next())
                    .map(|a| a.transcript)
                    .unwrap_or_default(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_utterances() {
        let body = r#"{"metadata": {}, "results": {
            "channels": [{"alternatives": [{"transcript": "hello there general"}]}],
            "utterances": [
                {"speaker": 0, "transcript": "hello there", "start": 0.0},
                {"transcript": "general", "start": 1.2},
                {"speaker": 1, "transcript": "kenobi"}
            ]}}"#;
        let parsed: ListenResponse = serde_json::from_str(body).unwrap();

        assert_eq!(
            parsed.into_transcript().render(),
            "Speaker 0: hello there\nSpeaker 0: general\nSpeaker 1: kenobi\n"
        );
    }

    #[test]
    fn test_falls_back_to_channel_transcript() {
        let body = r#"{"results": {"channels": [{"alternatives": [{"transcript": "plain words"}]}]}}"#;
        let parsed: ListenResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.into_transcript(), Transcript::Plain("plain words".into()));
    }
}
