//! Text comparators
//!
//! A comparator describes the differences between one chunk of the old
//! document and the matching chunk of the new one.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::{NarrativeError, NO_DIFFERENCES};

/// Default chat-completions endpoint
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
/// Default model name
pub const DEFAULT_MODEL: &str = "gpt-4o";

const SYSTEM_PROMPT: &str = "You are a document comparison expert. \
Identify precise differences between two sections of a report: \
show changed values as old → new, point out added or removed content, \
and describe what was moved, from where and to where. \
Return a clear list of differences with bullet points.";

/// Text comparator trait
#[async_trait]
pub trait TextComparator: Send + Sync {
    /// Describe the differences between two chunks
    ///
    /// `chunk_index` is 0-based.
    async fn compare(
        &self,
        old_chunk: &str,
        new_chunk: &str,
        chunk_index: usize,
    ) -> Result<String, NarrativeError>;
}

/// OpenAI-compatible chat-completions comparator
pub struct OpenAiComparator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
}

impl OpenAiComparator {
    pub fn new(base_url: &str, api_key: Option<String>, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            timeout_secs,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn user_prompt(old_chunk: &str, new_chunk: &str, chunk_index: usize) -> String {
        let section = chunk_index + 1;
        format!(
            "Compare these document sections and list ALL differences:\n\n\
             ### Old Report Section {section}:\n{old_chunk}\n\n\
             ### New Report Section {section}:\n{new_chunk}"
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[async_trait]
impl TextComparator for OpenAiComparator {
    async fn compare(
        &self,
        old_chunk: &str,
        new_chunk: &str,
        chunk_index: usize,
    ) -> Result<String, NarrativeError> {
        let url = format!("{}/chat/completions", self.base_url);
        let user_prompt = Self::user_prompt(old_chunk, new_chunk, chunk_index);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: 0.0,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NarrativeError::Timeout(self.timeout_secs)
            } else {
                NarrativeError::Http(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Status { status, body });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| NarrativeError::MalformedResponse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .unwrap_or_else(|| NO_DIFFERENCES.to_string());

        tracing::debug!(
            chunk = chunk_index,
            model = %self.model,
            length = content.len(),
            "Received chunk comparison"
        );

        Ok(content)
    }
}

/// Mock comparator for testing
#[cfg(test)]
pub struct MockComparator {
    pub reply: String,
    pub fail: bool,
    pub calls: std::sync::Mutex<Vec<(String, String, usize)>>,
}

#[cfg(test)]
impl MockComparator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail: false,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying("")
        }
    }

    pub fn calls(&self) -> Vec<(String, String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl TextComparator for MockComparator {
    async fn compare(
        &self,
        old_chunk: &str,
        new_chunk: &str,
        chunk_index: usize,
    ) -> Result<String, NarrativeError> {
        self.calls
            .lock()
            .unwrap()
            .push((old_chunk.to_string(), new_chunk.to_string(), chunk_index));
        if self.fail {
            return Err(NarrativeError::Status {
                status: 500,
                body: "mock failure".to_string(),
            });
        }
        Ok(self.reply.replace("{i}", &(chunk_index + 1).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_numbers_sections_from_one() {
        let prompt = OpenAiComparator::user_prompt("old", "new", 0);
        assert!(prompt.contains("### Old Report Section 1:\nold"));
        assert!(prompt.contains("### New Report Section 1:\nnew"));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let comparator = OpenAiComparator::new("http://localhost:8080/v1/", None, DEFAULT_MODEL, 5);
        assert_eq!(comparator.base_url, "http://localhost:8080/v1");
        assert_eq!(comparator.model(), "gpt-4o");
    }

    #[test]
    fn test_chat_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"- Title changed"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("- Title changed")
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let comparator = OpenAiComparator::new("http://127.0.0.1:1", None, DEFAULT_MODEL, 2);
        let result = comparator.compare("a", "b", 0).await;
        assert!(matches!(
            result,
            Err(NarrativeError::Http(_)) | Err(NarrativeError::Timeout(_))
        ));
    }
}
