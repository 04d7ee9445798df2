use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use covid_core::error::AppError;
use covid_core::models::CaseCounts;
use covid_core::traits::ImageInterpreter;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_SYSTEM_PROMPT: &str = "You read COVID-19 situation charts published by health ministries. Report the new and cumulative confirmed, recovered and deceased counts shown for the whole country. Respond ONLY with JSON matching the requested schema.";

/// Reads case counts off a chart image with an OpenAI-compatible vision model.
#[derive(Clone)]
pub struct OpenAiChartReader {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiChartReader {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, model, base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(&self.api_key, &self.model, &self.base_url, timeout)
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError("vision API key is empty".into()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    fn request(&self, image: &[u8]) -> ChatRequest {
        let data_url = format!("data:{};base64,{}", mime_type(image), STANDARD.encode(image));

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: json!(DEFAULT_SYSTEM_PROMPT),
                },
                Message {
                    role: "user",
                    content: json!([
                        { "type": "text", "text": "Extract today's counts from this chart." },
                        { "type": "image_url", "image_url": { "url": data_url } }
                    ]),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaWrapper {
                    name: "case_counts",
                    strict: true,
                    schema: counts_schema(),
                },
            },
        }
    }
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: serde_json::Value,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaWrapper,
}

#[derive(Serialize)]
struct JsonSchemaWrapper {
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn counts_schema() -> serde_json::Value {
    let count = json!({ "type": "integer" });
    json!({
        "type": "object",
        "properties": {
            "confirmed": count,
            "recovered": count,
            "deceased": count,
            "confirmed_cumulative": count,
            "recovered_cumulative": count,
            "deceased_cumulative": count
        },
        "required": [
            "confirmed", "recovered", "deceased",
            "confirmed_cumulative", "recovered_cumulative", "deceased_cumulative"
        ],
        "additionalProperties": false
    })
}

/// Guess the image type from its magic bytes. Unknown data is sent as PNG.
fn mime_type(image: &[u8]) -> &'static str {
    if image.starts_with(b"\xff\xd8\xff") {
        "image/jpeg"
    } else if image.starts_with(b"GIF8") {
        "image/gif"
    } else if image.len() >= 12 && &image[..4] == b"RIFF" && &image[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

fn parse_counts(content: &str) -> Result<CaseCounts, AppError> {
    serde_json::from_str(content).map_err(|e| {
        AppError::InterpretError(format!("model returned invalid counts: {e}. Raw: {content}"))
    })
}

#[async_trait]
impl ImageInterpreter for OpenAiChartReader {
    async fn interpret(&self, image: &[u8]) -> Result<CaseCounts, AppError> {
        if image.is_empty() {
            return Err(AppError::InterpretError("empty image".into()));
        }
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, bytes = image.len(), "Interpreting chart");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request(image))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::InterpretError(format!(
                        "vision request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    AppError::InterpretError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AppError::InterpretError(format!(
                "HTTP {status_code}: {message}"
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::InterpretError(format!("Failed to parse vision response: {e}")))?;

        let content = chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| AppError::InterpretError("Empty response from vision model".into()))?;

        parse_counts(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> OpenAiChartReader {
        OpenAiChartReader::new("sk-test", DEFAULT_MODEL).unwrap()
    }

    #[test]
    fn test_request_embeds_image_as_data_url() {
        let body = serde_json::to_value(reader().request(b"\x89PNG\r\n\x1a\nabc")).unwrap();

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["response_format"]["type"], "json_schema");
        let url = body["messages"][1]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_schema_requires_all_counts() {
        let schema = counts_schema();
        assert_eq!(schema["required"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn test_mime_type_sniffing() {
        assert_eq!(mime_type(b"\xff\xd8\xff\xe0"), "image/jpeg");
        assert_eq!(mime_type(b"GIF89a"), "image/gif");
        assert_eq!(mime_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(mime_type(b"\x89PNG"), "image/png");
    }

    #[test]
    fn test_parse_counts() {
        let counts = parse_counts(
            r#"{"confirmed":507,"recovered":42,"deceased":4,
                "confirmed_cumulative":7255,"recovered_cumulative":762,"deceased_cumulative":102}"#,
        )
        .unwrap();
        assert_eq!(counts.confirmed, 507);
        assert_eq!(counts.deceased_cumulative, 102);
    }

    #[test]
    fn test_parse_counts_rejects_prose() {
        let err = parse_counts("I see a bar chart").unwrap_err();
        assert!(matches!(err, AppError::InterpretError(_)));
    }

    #[test]
    fn test_with_timeout_keeps_settings() {
        let reader = reader().with_timeout(Duration::from_secs(45)).unwrap();
        assert_eq!(reader.timeout_secs, 45);
        assert_eq!(reader.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_empty_key_is_config_error() {
        assert!(matches!(
            OpenAiChartReader::new(" ", DEFAULT_MODEL).err().unwrap(),
            AppError::ConfigError(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_image_rejected_without_request() {
        let err = reader().interpret(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::InterpretError(_)));
    }
}
