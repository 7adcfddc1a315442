//! Chat-completions advisor client.
//!
//! Sends the account snapshot as a prompt and expects the model to answer
//! with a single JSON object matching [`Recommendation`]. Markdown code
//! fences around the JSON are tolerated.

use crate::domain::entities::signal::Recommendation;
use crate::domain::errors::AdvisorError;
use crate::domain::repositories::advisor::{Advisor, AdvisorRequest, AdvisorResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_ADVISOR_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT_SECS: u64 = 120;

const SYSTEM_PROMPT: &str = "You are a portfolio advisor for a simulated trading account. \
Respond with a single JSON object: {\"signals\": [...], \"suggestedOrders\": [...], \"analysis\": \"...\"}. \
Each signal has symbol, direction (BUY/SELL/HOLD), confidence (0-100), risk (low/medium/high), reasoning, createdAt. \
Each suggested order has symbol, name, kind (limit-buy/limit-sell/stop-loss/stop-buy), quantity, triggerPrice, reasoning, confidence (0-100). \
Never suggest spending more than the available cash. Respond with JSON only.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct ChatAdvisorClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatAdvisorClient {
    pub fn new(base_url: Option<&str>, api_key: &str, model: Option<&str>) -> Result<Self, AdvisorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AdvisorError::RequestFailed(e.to_string()))?;
        Ok(ChatAdvisorClient {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_ADVISOR_BASE)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        })
    }

    fn build_user_prompt(request: &AdvisorRequest) -> String {
        let snapshot = serde_json::to_string_pretty(request)
            .unwrap_or_else(|_| "{}".to_string());
        format!(
            "Current date: {}\nStrategy: {}\nRisk tolerance: {}\n\nAccount snapshot:\n{}",
            Utc::now().format("%Y-%m-%d"),
            request.strategy,
            request.risk_tolerance,
            snapshot
        )
    }
}

/// Strip a surrounding markdown code fence, if any.
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[async_trait]
impl Advisor for ChatAdvisorClient {
    async fn recommend(&self, request: AdvisorRequest) -> AdvisorResult<Recommendation> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::build_user_prompt(&request),
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdvisorError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AdvisorError::RequestFailed(format!(
                "advisor endpoint returned {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::MalformedPayload(e.to_string()))?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| AdvisorError::MalformedPayload("empty choices".to_string()))?;

        debug!(bytes = content.len(), "advisor response received");
        serde_json::from_str(extract_json(content))
            .map_err(|e| AdvisorError::MalformedPayload(e.to_string()))
    }
}
