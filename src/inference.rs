//! Remote vision inference client.
//!
//! The core treats inference as an opaque call: one frame and a prompt go
//! out, answer text or an error comes back. Endpoint settings are read
//! fresh for every call so configuration changes apply to the next cycle
//! without a restart.

use crate::capture::Frame;
use crate::config::AppConfig;
use crate::log_debug;
use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ANSWER_TOKENS: u32 = 1000;

/// Connection details for one inference call.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub prompt: String,
    pub jpeg_quality: u8,
}

/// Read access to the endpoint settings; the client never caches the result
/// beyond one call.
pub trait ConfigSource: Send + Sync {
    fn endpoint(&self) -> EndpointConfig;
}

impl ConfigSource for AppConfig {
    fn endpoint(&self) -> EndpointConfig {
        EndpointConfig {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            jpeg_quality: self.jpeg_quality,
        }
    }
}

/// Seam between the orchestrator and the network.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, frame: &Frame) -> Result<String>;
}

/// Talks to an OpenAI-style chat-completions endpoint with image input.
pub struct VisionClient {
    config: Arc<dyn ConfigSource>,
    agent: ureq::Agent,
}

impl VisionClient {
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(REQUEST_TIMEOUT)
            .timeout_read(REQUEST_TIMEOUT)
            .timeout_write(REQUEST_TIMEOUT)
            .build();
        Self { config, agent }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

fn build_request_body(endpoint: &EndpointConfig, encoded_jpeg: &str) -> serde_json::Value {
    serde_json::json!({
        "model": endpoint.model,
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": endpoint.prompt},
                {"type": "image_url", "image_url": {
                    "url": format!("data:image/jpeg;base64,{encoded_jpeg}"),
                    "detail": "high",
                }},
            ],
        }],
        "max_tokens": MAX_ANSWER_TOKENS,
    })
}

impl Analyzer for VisionClient {
    fn analyze(&self, frame: &Frame) -> Result<String> {
        let endpoint = self.config.endpoint();
        if endpoint.api_key.trim().is_empty() {
            bail!("API key is not configured");
        }

        let jpeg = frame.to_jpeg(endpoint.jpeg_quality)?;
        let encoded = BASE64.encode(&jpeg);
        let body = build_request_body(&endpoint, &encoded);

        log_debug(&format!(
            "sending {}x{} frame ({} KiB jpeg) to {}",
            frame.width(),
            frame.height(),
            jpeg.len() / 1024,
            endpoint.api_url
        ));

        let response = self
            .agent
            .post(&endpoint.api_url)
            .set("Authorization", &format!("Bearer {}", endpoint.api_key))
            .send_json(body);
        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                bail!("API error: {code} - {}", snippet(&detail));
            }
            Err(err) => return Err(err).context("inference request failed"),
        };

        let parsed: ChatResponse = response
            .into_json()
            .context("inference response was not valid JSON")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("inference response contained no choices"))
    }
}

fn snippet(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() <= MAX {
        text.trim().to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{}…", cut.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn endpoint() -> EndpointConfig {
        EndpointConfig {
            api_url: "https://example.test/v1/chat/completions".to_string(),
            api_key: "sk-test".to_string(),
            model: "gpt-4o".to_string(),
            prompt: "describe".to_string(),
            jpeg_quality: 80,
        }
    }

    #[test]
    fn request_body_carries_model_prompt_and_data_url() {
        let body = build_request_body(&endpoint(), "QUJD");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["text"], "describe");
        assert_eq!(
            content[1]["image_url"]["url"],
            "data:image/jpeg;base64,QUJD"
        );
        assert_eq!(content[1]["image_url"]["detail"], "high");
    }

    #[test]
    fn app_config_is_a_config_source() {
        let cfg = AppConfig::parse_from([
            "test-app",
            "--api-key",
            "sk-live",
            "--model",
            "gpt-4o-mini",
        ]);
        let endpoint = cfg.endpoint();
        assert_eq!(endpoint.api_key, "sk-live");
        assert_eq!(endpoint.model, "gpt-4o-mini");
        assert_eq!(endpoint.jpeg_quality, 80);
    }

    #[test]
    fn response_shape_deserializes() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"B"}}]}"#,
        )
        .expect("parse");
        assert_eq!(parsed.choices[0].message.content, "B");
    }

    #[test]
    fn missing_api_key_fails_before_any_network_io() {
        struct NoKey;
        impl ConfigSource for NoKey {
            fn endpoint(&self) -> EndpointConfig {
                EndpointConfig {
                    api_key: "  ".to_string(),
                    ..endpoint()
                }
            }
        }

        let client = VisionClient::new(Arc::new(NoKey));
        let frame = Frame::new(image::DynamicImage::new_rgba8(2, 2));
        let err = client.analyze(&frame).expect_err("must fail");
        assert!(err.to_string().contains("API key"));
    }
}
