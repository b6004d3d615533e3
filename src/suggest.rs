//! AI ingredient suggestions
//!
//! Given a product name, asks a generative model for a starter ingredient list.
//! Transient failures are retried with exponential backoff according to a
//! [`RetryPolicy`]; credential failures surface immediately. A response that
//! cannot be understood is treated as "no suggestions", not as an error.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::calculator::parse_finite_or;
use crate::error::SuggestionError;
use crate::models::{NumericInput, SuggestedIngredient};
use crate::retry::RetryPolicy;

pub const DEFAULT_INGREDIENT_NAME: &str = "Unknown Ingredient";
pub const DEFAULT_UNIT: &str = "g";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("Invalid code fence pattern"));

/// Something that can answer a suggestion request with raw model text.
pub trait SuggestionBackend {
    fn fetch(
        &self,
        product_name: &str,
        currency: &str,
    ) -> impl Future<Output = Result<String, SuggestionError>> + Send;
}

/// Suggestion backend for Google's Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: &str, model: &str) -> Result<Self, SuggestionError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SuggestionError::MissingCredential);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SuggestionError::Transient(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Point the backend at a different host, e.g. a local mock.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl SuggestionBackend for GeminiBackend {
    async fn fetch(&self, product_name: &str, currency: &str) -> Result<String, SuggestionError> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": build_prompt(product_name, currency) }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SuggestionError::Transient("request timed out after 60s".to_string())
                } else {
                    SuggestionError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SuggestionError::Transient(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(classify_failure(status, &text));
        }

        // An envelope without text is an empty answer, not a failure
        Ok(extract_candidate_text(&text).unwrap_or_default())
    }
}

/// Decide whether a non-2xx response means the credential was rejected.
pub fn classify_failure(status: StatusCode, body: &str) -> SuggestionError {
    let credential_rejected = status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || (status == StatusCode::BAD_REQUEST
            && (body.contains("API_KEY_INVALID") || body.contains("API key not valid")));

    let snippet: String = body.chars().take(300).collect();
    if credential_rejected {
        SuggestionError::InvalidCredential(format!("{} {}", status.as_u16(), snippet))
    } else {
        SuggestionError::Transient(format!("HTTP {}: {}", status.as_u16(), snippet))
    }
}

/// Pull the model's text out of a `generateContent` response envelope.
pub fn extract_candidate_text(body: &str) -> Option<String> {
    let envelope: Value = serde_json::from_str(body).ok()?;
    envelope["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|s| s.to_string())
}

pub fn build_prompt(product_name: &str, currency: &str) -> String {
    format!(
        "List the ingredients needed to make one batch of \"{}\" as a small business would. \
         For each ingredient give its name, the quantity used per batch, the unit of that \
         quantity (g, ml, or each), and an estimated wholesale cost per single unit in {}. \
         Respond with a JSON array of objects with keys name, quantity, unit, costPerUnit.",
        product_name.trim(),
        currency
    )
}

fn response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING" },
                "quantity": { "type": "NUMBER" },
                "unit": { "type": "STRING" },
                "costPerUnit": { "type": "NUMBER" }
            },
            "required": ["name", "quantity", "unit", "costPerUnit"]
        }
    })
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    CODE_FENCE
        .captures(trimmed)
        .and_then(|cap| cap.get(1))
        .map_or(trimmed, |m| m.as_str())
}

/// Turn model text into suggestions. Anything unparseable yields an empty list.
///
/// Accepts a bare array or an object with an `ingredients` array. Missing
/// fields are defaulted: name to "Unknown Ingredient", unit to "g", numbers to 0.
pub fn parse_suggestions(text: &str) -> Vec<SuggestedIngredient> {
    let payload = strip_code_fence(text);
    if payload.is_empty() {
        return Vec::new();
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!("Suggestion response is not JSON ({}), treating as empty", e);
            return Vec::new();
        }
    };

    let items: &[Value] = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("ingredients") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| {
            if !item.is_object() {
                debug!("Skipping non-object suggestion entry: {}", item);
                return None;
            }
            Some(SuggestedIngredient {
                name: text_or(item.get("name"), DEFAULT_INGREDIENT_NAME),
                quantity: number_or_zero(item.get("quantity")),
                unit: text_or(item.get("unit"), DEFAULT_UNIT),
                cost_per_unit: number_or_zero(item.get("costPerUnit").or_else(|| item.get("cost_per_unit"))),
            })
        })
        .collect()
}

fn text_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn number_or_zero(value: Option<&Value>) -> f64 {
    let input = value.cloned().map(NumericInput::from).unwrap_or_default();
    parse_finite_or(&input, 0.0)
}

/// Suggestion service: a backend plus the retry policy around it.
#[derive(Debug, Clone)]
pub struct IngredientSuggester<B> {
    backend: B,
    policy: RetryPolicy<SuggestionError>,
}

impl<B: SuggestionBackend> IngredientSuggester<B> {
    pub fn new(backend: B) -> Self {
        Self::with_policy(backend, RetryPolicy::default())
    }

    pub fn with_policy(backend: B, policy: RetryPolicy<SuggestionError>) -> Self {
        Self { backend, policy }
    }

    /// Suggest ingredients for `product_name`, priced in `currency`.
    ///
    /// Dropping the returned future cancels any in-flight request or backoff.
    pub async fn suggest(
        &self,
        product_name: &str,
        currency: &str,
    ) -> Result<Vec<SuggestedIngredient>, SuggestionError> {
        let product_name = product_name.trim();
        if product_name.is_empty() {
            debug!("Empty product name, nothing to suggest");
            return Ok(Vec::new());
        }

        info!("Requesting ingredient suggestions for '{}'", product_name);
        let text = self
            .policy
            .run(move |attempt| {
                debug!("Suggestion attempt {} for '{}'", attempt, product_name);
                self.backend.fetch(product_name, currency)
            })
            .await?;

        let suggestions = parse_suggestions(&text);
        info!("Received {} suggestions for '{}'", suggestions.len(), product_name);
        Ok(suggestions)
    }
}
