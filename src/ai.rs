use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::error::{CuratelaError, Result};
use crate::fmt::parse_currency;
use crate::models::Nature;
use crate::reports::account_balance;
use crate::settings::Settings;
use crate::state::AppState;

/// How many of the newest transactions go into the chat context.
pub const CONTEXT_TRANSACTIONS: usize = 50;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Accepts `12.5`, `"12.5"` or `"R$ 12,50"`.
fn lenient_amount<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<f64, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .or_else(|| parse_currency(&s))
            .unwrap_or(0.0),
        _ => 0.0,
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractedTransaction {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub value: f64,
    #[serde(default)]
    pub nature: String,
    #[serde(default, alias = "categoryName", alias = "category_name")]
    pub category: String,
}

impl ExtractedTransaction {
    /// Anything that is not explicitly income is treated as an expense.
    pub fn nature(&self) -> Nature {
        Nature::parse(&self.nature).unwrap_or(Nature::Despesa)
    }
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    transactions: Vec<ExtractedTransaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptExtraction {
    pub value: f64,
    pub date: String,
    pub description: String,
    pub cleaned_image: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize)]
struct ReceiptResponse {
    #[serde(default, deserialize_with = "lenient_amount")]
    value: f64,
    #[serde(default)]
    date: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    cleaned_image_base64: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadHandle {
    pub path: String,
    pub signed_url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    reply: String,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    file_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_path: Option<&'a str>,
    mime_type: &'a str,
    categories: &'a [String],
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// The remote inference backend: chat, receipt cleanup and document
/// extraction, plus the pre-authorized upload used for large files.
#[allow(async_fn_in_trait)]
pub trait InferenceService {
    async fn chat(&self, query: &str, context: &Value) -> Result<String>;
    async fn clean_receipt(&self, image: &[u8], mime_type: &str) -> Result<ReceiptExtraction>;
    async fn upload_handle(&self, filename: &str) -> Result<UploadHandle>;
    async fn upload(&self, handle: &UploadHandle, bytes: &[u8], mime_type: &str) -> Result<()>;
    async fn analyze_inline(
        &self,
        bytes: &[u8],
        mime_type: &str,
        categories: &[String],
    ) -> Result<Vec<ExtractedTransaction>>;
    async fn analyze_stored(
        &self,
        storage_path: &str,
        mime_type: &str,
        categories: &[String],
    ) -> Result<Vec<ExtractedTransaction>>;
}

pub struct HttpInference {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpInference {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(CuratelaError::Settings(
                "AI endpoint is not configured (set ai_base_url or CURATELA_AI_URL)".into(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.ai_base_url, &settings.ai_api_key)
    }

    /// Absolute URLs pass through; anything else is taken relative to the
    /// base URL.
    pub fn url(&self, route: &str) -> String {
        if route.starts_with("http://") || route.starts_with("https://") {
            route.to_string()
        } else {
            format!("{}/{}", self.base_url, route.trim_start_matches('/'))
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.header(AUTHORIZATION, format!("Bearer {}", self.api_key))
        }
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(&self, route: &str, body: &B) -> Result<R> {
        let url = self.url(route);
        log::debug!(target: "ai", "POST {url}");
        let resp = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(CuratelaError::Remote {
        status: status.as_u16(),
        message: message.trim().to_string(),
    })
}

impl InferenceService for HttpInference {
    async fn chat(&self, query: &str, context: &Value) -> Result<String> {
        let resp: ChatResponse = self
            .post_json("chat", &json!({ "query": query, "context": context }))
            .await?;
        Ok(resp.reply.trim().to_string())
    }

    async fn clean_receipt(&self, image: &[u8], mime_type: &str) -> Result<ReceiptExtraction> {
        let body = json!({
            "image_base64": BASE64.encode(image),
            "mime_type": mime_type,
        });
        let resp: ReceiptResponse = self.post_json("receipt", &body).await?;
        let cleaned_image = match resp.cleaned_image_base64.as_deref().map(str::trim) {
            Some(b64) if !b64.is_empty() => Some(
                BASE64
                    .decode(b64)
                    .map_err(|e| CuratelaError::Other(format!("Invalid cleaned image: {e}")))?,
            ),
            _ => None,
        };
        Ok(ReceiptExtraction {
            value: resp.value,
            date: resp.date,
            description: resp.description,
            cleaned_image,
        })
    }

    async fn upload_handle(&self, filename: &str) -> Result<UploadHandle> {
        self.post_json("upload-url", &json!({ "filename": filename })).await
    }

    async fn upload(&self, handle: &UploadHandle, bytes: &[u8], mime_type: &str) -> Result<()> {
        let url = self.url(&handle.signed_url);
        log::debug!(target: "ai", "PUT {url} ({} bytes)", bytes.len());
        let resp = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, mime_type)
            .body(bytes.to_vec())
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn analyze_inline(
        &self,
        bytes: &[u8],
        mime_type: &str,
        categories: &[String],
    ) -> Result<Vec<ExtractedTransaction>> {
        let body = ExtractRequest {
            file_base64: Some(BASE64.encode(bytes)),
            storage_path: None,
            mime_type,
            categories,
        };
        let resp: ExtractResponse = self.post_json("extract", &body).await?;
        Ok(resp.transactions)
    }

    async fn analyze_stored(
        &self,
        storage_path: &str,
        mime_type: &str,
        categories: &[String],
    ) -> Result<Vec<ExtractedTransaction>> {
        let body = ExtractRequest {
            file_base64: None,
            storage_path: Some(storage_path),
            mime_type,
            categories,
        };
        let resp: ExtractResponse = self.post_json("extract", &body).await?;
        Ok(resp.transactions)
    }
}

// ---------------------------------------------------------------------------
// Chat context
// ---------------------------------------------------------------------------

/// Snapshot of accounts (with balances), categories and the newest
/// transactions, sent along with every chat query.
pub fn build_context(state: &AppState) -> Value {
    let accounts: Vec<Value> = state
        .accounts
        .iter()
        .map(|a| {
            json!({
                "name": a.name,
                "type": a.account_type.as_str(),
                "balance": account_balance(a.id, &state.transactions),
            })
        })
        .collect();

    let categories: Vec<Value> = state
        .categories
        .iter()
        .map(|c| json!({ "name": c.name, "type": c.category_type.as_str() }))
        .collect();

    let mut recent: Vec<_> = state.transactions.iter().collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    let recent: Vec<Value> = recent
        .into_iter()
        .take(CONTEXT_TRANSACTIONS)
        .map(|t| {
            json!({
                "date": t.date.format("%Y-%m-%d").to_string(),
                "description": t.description,
                "value": t.value,
                "nature": t.nature.as_str(),
                "type": t.kind.as_str(),
                "account": state.account(t.account_id).map(|a| a.name.as_str()),
                "category": state.category(t.category_id).map(|c| c.name.as_str()),
            })
        })
        .collect();

    json!({
        "accounts": accounts,
        "categories": categories,
        "recent_transactions": recent,
    })
}

pub async fn ask<S: InferenceService>(service: &S, state: &AppState, query: &str) -> Result<String> {
    if query.trim().is_empty() {
        return Err(CuratelaError::Validation("Question is empty".into()));
    }
    let context = build_context(state);
    let reply = service.chat(query.trim(), &context).await?;
    log::info!(target: "ai", "chat answered ({} chars)", reply.len());
    Ok(reply)
}
