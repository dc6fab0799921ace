use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CommentaryContext, CommentaryError, CommentaryGenerator, CommentaryTrigger};

/// Generator backed by an Ollama-style `/api/generate` endpoint
///
/// Sends `{model, prompt, stream: false}` and reads the `response` field.
#[derive(Debug, Clone)]
pub struct HttpCommentaryGenerator {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl HttpCommentaryGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CommentaryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Instruction text for one context
pub(crate) fn build_prompt(context: &CommentaryContext) -> String {
    let mut prompt = String::from(
        "You are a laid-back radio DJ. Reply with one or two short spoken sentences, \
         no emoji, no stage directions.\n",
    );
    let device = context.device_label();

    let situation = match (context.trigger, &context.track) {
        (CommentaryTrigger::TrackChanged, Some(track)) => {
            let mut line = format!("The next song is \"{}\" by {}", track.title, track.artist);
            if let Some(album) = &track.album {
                line.push_str(&format!(" from the album \"{}\"", album));
            }
            if let Some(previous) = &context.previous_track {
                line.push_str(&format!(
                    ", following \"{}\" by {}",
                    previous.title, previous.artist
                ));
            }
            line.push_str(". Introduce it.");
            line
        }
        (CommentaryTrigger::DeviceConnected, _) => {
            format!("The listener just connected \"{}\". Welcome them.", device)
        }
        (CommentaryTrigger::Paused, track) => {
            format!("The listener paused{}. Say something brief.", describe(track.as_ref()))
        }
        (CommentaryTrigger::Stopped, track) => {
            format!("The listener stopped{}. Sign off briefly.", describe(track.as_ref()))
        }
        (CommentaryTrigger::Resumed, track) => {
            format!("The listener resumed{}. Welcome them back.", describe(track.as_ref()))
        }
        (CommentaryTrigger::TrackChanged, None) => "The song changed.".to_string(),
    };
    prompt.push_str(&situation);
    prompt
}

fn describe(track: Option<&btdj_state::TrackMetadata>) -> String {
    track
        .map(|t| format!(" \"{}\" by {}", t.title, t.artist))
        .unwrap_or_default()
}

/// Tidy a model reply for speaking
pub(crate) fn clean_response(text: &str) -> Option<String> {
    let text = text.trim().trim_matches('"').trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl CommentaryGenerator for HttpCommentaryGenerator {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, context: &CommentaryContext) -> Result<String, CommentaryError> {
        let prompt = build_prompt(context);
        debug!(endpoint = %self.endpoint, trigger = context.trigger.as_str(), "Requesting commentary");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt: &prompt,
                stream: false,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommentaryError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response.json().await?;
        clean_response(&body.response).ok_or(CommentaryError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btdj_state::{DeviceId, TrackMetadata};

    fn context(trigger: CommentaryTrigger) -> CommentaryContext {
        CommentaryContext {
            trigger,
            device: DeviceId::new("AA:BB:CC:DD:EE:FF"),
            device_name: Some("Car Stereo".to_string()),
            track: Some(TrackMetadata::new("Test Artist", "Test Song").with_album("Tests")),
            previous_track: Some(TrackMetadata::new("Old Artist", "Old Song")),
        }
    }

    #[test]
    fn test_track_prompt_mentions_both_tracks() {
        let prompt = build_prompt(&context(CommentaryTrigger::TrackChanged));
        assert!(prompt.contains("\"Test Song\" by Test Artist"));
        assert!(prompt.contains("album \"Tests\""));
        assert!(prompt.contains("\"Old Song\" by Old Artist"));
    }

    #[test]
    fn test_connect_prompt_uses_device_name() {
        let prompt = build_prompt(&context(CommentaryTrigger::DeviceConnected));
        assert!(prompt.contains("Car Stereo"));
    }

    #[test]
    fn test_clean_response() {
        assert_eq!(
            clean_response("  \"Here's a classic.\"\n").as_deref(),
            Some("Here's a classic.")
        );
        assert_eq!(clean_response("   "), None);
        assert_eq!(clean_response("\"\""), None);
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(GenerateRequest {
            model: "llama3.2",
            prompt: "hi",
            stream: false,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"model": "llama3.2", "prompt": "hi", "stream": false}));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let generator = HttpCommentaryGenerator::new(
            format!("http://127.0.0.1:{}/api/generate", port),
            "llama3.2",
            Duration::from_secs(2),
        )
        .unwrap();

        let result = generator
            .generate(&context(CommentaryTrigger::TrackChanged))
            .await;
        assert!(matches!(
            result,
            Err(CommentaryError::Request(_)) | Err(CommentaryError::Status(_))
        ));
    }
}
