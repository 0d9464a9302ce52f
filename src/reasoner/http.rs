//! HTTP reasoner client
//!
//! Talks to an Ollama-compatible generation endpoint in JSON mode. The
//! response may arrive wrapped in markdown code fences or with prose around
//! the JSON object; extraction tolerates both.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineResult, WorkflowError};
use crate::plan::QueryPlan;
use crate::reasoner::{Reasoner, ReasonerRequest};

pub struct HttpReasoner {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: String,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl HttpReasoner {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: Client::new(),
        }
    }

    fn build_prompt(&self, request: &ReasonerRequest) -> String {
        let mut schema_guide = String::new();
        for (table, meta) in &request.schema.tables {
            schema_guide.push_str(&format!("Table '{}':\n", table));
            for col in &meta.columns {
                schema_guide.push_str(&format!("  - {} ({})\n", col.name, col.data_type));
            }
        }

        let clarifications = if request.clarifications.is_empty() {
            "None.".to_string()
        } else {
            request
                .clarifications
                .iter()
                .map(|(q, a)| format!("  Q: {}\n  A: {}", q, a))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"You are a data analyst assistant. Given a user question and schema metadata, produce a structured query plan as JSON.

USER QUESTION: {query}

AVAILABLE TABLES AND COLUMNS:
{schema_guide}

ANSWERED CLARIFICATIONS (treat these as resolved, never re-ask them):
{clarifications}

RULES:
1. Use ONLY tables and columns listed above - DO NOT invent any
2. select_columns is the authoritative output list; every non-aggregated entry must also appear in group_by_columns
3. Aggregation aliases (like "total_sales") are allowed in select_columns and order_by_spec
4. If the question is ambiguous, add an entry to "ambiguities" with a question and a suggested default
5. Use [] for empty arrays, null only for optional scalars

REQUIRED JSON KEYS: tables, columns, joins, filters, group_by_columns, aggregations, having_conditions, order_by_spec, limit_count, select_columns, ambiguities

Return ONLY valid JSON, no markdown code blocks, no explanations.
"#,
            query = request.query,
            schema_guide = schema_guide,
            clarifications = clarifications,
        )
    }

    /// Extract JSON from a response that may be fenced or surrounded by prose.
    fn extract_json(response: &str) -> &str {
        let trimmed = response.trim();
        if let Some(rest) = trimmed.strip_prefix("```json") {
            if let Some(end) = rest.find("```") {
                return rest[..end].trim();
            }
        } else if let Some(rest) = trimmed.strip_prefix("```") {
            if let Some(end) = rest.find("```") {
                return rest[..end].trim();
            }
        }
        if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if start < end {
                return &trimmed[start..=end];
            }
        }
        trimmed
    }
}

#[async_trait]
impl Reasoner for HttpReasoner {
    async fn analyze(&self, request: &ReasonerRequest) -> EngineResult<QueryPlan> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: self.model.clone(),
            prompt: self.build_prompt(request),
            stream: false,
            format: "json".to_string(),
            options: GenerateOptions {
                num_predict: 4096,
                temperature: 0.1,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkflowError::reasoner(format!("Request failed: {}", e)))?;

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| WorkflowError::reasoner(format!("Malformed response envelope: {}", e)))?;

        let json_str = Self::extract_json(&generated.response);
        debug!(len = json_str.len(), "Parsing reasoner plan");

        serde_json::from_str(json_str).map_err(|e| {
            WorkflowError::reasoner(format!("Failed to parse plan JSON: {}", e))
                .with_context(truncate(json_str, 1000))
        })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    // Back off to the nearest char boundary; byte `max` may fall inside a
    // multi-byte character.
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, full length: {})", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let fenced = "```json\n{\"tables\": []}\n```";
        assert_eq!(HttpReasoner::extract_json(fenced), "{\"tables\": []}");
    }

    #[test]
    fn extracts_embedded_object() {
        let chatty = "Here is your plan: {\"tables\": [\"t\"]} hope it helps";
        assert_eq!(HttpReasoner::extract_json(chatty), "{\"tables\": [\"t\"]}");
    }

    #[test]
    fn passes_through_plain_json() {
        assert_eq!(HttpReasoner::extract_json("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        // 400 euro signs = 1200 bytes; byte 1000 lands inside a character
        let multibyte = "\u{20ac}".repeat(400);
        let out = truncate(&multibyte, 1000);
        assert!(out.starts_with('\u{20ac}'));
        assert!(out.ends_with("(truncated, full length: 1200)"));

        let short = truncate("abc", 1000);
        assert_eq!(short, "abc");
    }
}
