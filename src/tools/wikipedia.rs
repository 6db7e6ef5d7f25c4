use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::core::config::WikipediaSettings;
use crate::core::errors::ProviderError;

const PROVIDER: &str = "wikipedia";

/// Free-text lookup against a general knowledge source.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, query: &str) -> Result<String, ProviderError>;
}

pub struct WikipediaSource {
    api_url: String,
    top_k_results: usize,
    doc_content_chars_max: usize,
    client: Client,
}

impl WikipediaSource {
    pub fn new(settings: &WikipediaSettings) -> Self {
        Self {
            api_url: settings.resolved_api_url(),
            top_k_results: settings.top_k_results.max(1),
            doc_content_chars_max: settings.doc_content_chars_max,
            client: Client::new(),
        }
    }

    async fn get_json(&self, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        let url = format!("{}?{}", self.api_url, query.join("&"));

        let res = self
            .client
            .get(&url)
            .header("User-Agent", concat!("imskos-backend/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: PROVIDER.to_string(),
                status,
                body,
            });
        }

        res.json().await.map_err(|e| ProviderError::parse(PROVIDER, e))
    }
}

#[async_trait]
impl KnowledgeSource for WikipediaSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn lookup(&self, query: &str) -> Result<String, ProviderError> {
        let search = self
            .get_json(&[
                ("action", "query".to_string()),
                ("list", "search".to_string()),
                ("srsearch", query.to_string()),
                ("srlimit", self.top_k_results.to_string()),
                ("format", "json".to_string()),
            ])
            .await?;
        let titles = parse_search_titles(&search)?;
        if titles.is_empty() {
            return Err(ProviderError::NoResults(query.to_string()));
        }

        let extracts = self
            .get_json(&[
                ("action", "query".to_string()),
                ("prop", "extracts".to_string()),
                ("exintro", "1".to_string()),
                ("explaintext", "1".to_string()),
                ("redirects", "1".to_string()),
                ("titles", titles.join("|")),
                ("format", "json".to_string()),
            ])
            .await?;
        let summaries = parse_extracts(&extracts);

        let summary = format_pages(&titles, &summaries, self.doc_content_chars_max);
        if summary.is_empty() {
            return Err(ProviderError::NoResults(query.to_string()));
        }
        tracing::debug!("Wikipedia returned {} pages for '{}'", titles.len(), query);
        Ok(summary)
    }
}

fn parse_search_titles(payload: &Value) -> Result<Vec<String>, ProviderError> {
    if let Some(info) = payload.get("error").and_then(|e| e.get("info")).and_then(|i| i.as_str()) {
        return Err(ProviderError::request(PROVIDER, info));
    }
    let hits = payload
        .get("query")
        .and_then(|q| q.get("search"))
        .and_then(|s| s.as_array())
        .ok_or_else(|| ProviderError::parse(PROVIDER, "missing query.search"))?;

    Ok(hits
        .iter()
        .filter_map(|hit| hit.get("title").and_then(|t| t.as_str()))
        .map(|t| t.to_string())
        .collect())
}

fn parse_extracts(payload: &Value) -> HashMap<String, String> {
    payload
        .get("query")
        .and_then(|q| q.get("pages"))
        .and_then(|p| p.as_object())
        .map(|pages| {
            pages
                .values()
                .filter_map(|page| {
                    let title = page.get("title")?.as_str()?;
                    let extract = page.get("extract")?.as_str()?;
                    Some((title.to_string(), extract.trim().to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `Page: <title>\nSummary: <extract>` blocks in search order, truncated by chars.
fn format_pages(titles: &[String], summaries: &HashMap<String, String>, max_chars: usize) -> String {
    let joined = titles
        .iter()
        .filter_map(|title| {
            summaries
                .get(title)
                .filter(|s| !s.is_empty())
                .map(|summary| format!("Page: {}\nSummary: {}", title, summary))
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    joined.chars().take(max_chars).collect()
}

/// Canned source for offline runs.
#[derive(Debug, Clone, Default)]
pub struct MockKnowledgeSource;

#[async_trait]
impl KnowledgeSource for MockKnowledgeSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn lookup(&self, query: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "Page: {}\nSummary: Offline summary placeholder for this topic.",
            query
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_titles_keep_rank_order() {
        let payload = json!({
            "query": { "search": [ { "title": "Elon Musk" }, { "title": "Musk (surname)" } ] }
        });
        assert_eq!(
            parse_search_titles(&payload).unwrap(),
            vec!["Elon Musk".to_string(), "Musk (surname)".to_string()]
        );
    }

    #[test]
    fn api_errors_and_missing_fields_fail() {
        let err = parse_search_titles(&json!({ "error": { "info": "bad srsearch" } })).unwrap_err();
        assert!(err.to_string().contains("bad srsearch"));
        assert!(matches!(
            parse_search_titles(&json!({})).unwrap_err(),
            ProviderError::Parse { .. }
        ));
    }

    #[test]
    fn pages_are_formatted_in_search_order_and_truncated() {
        let extracts = json!({
            "query": { "pages": {
                "2": { "title": "Musk (surname)", "extract": "Musk is a surname." },
                "1": { "title": "Elon Musk", "extract": "Elon Reeve Musk is a businessman." }
            } }
        });
        let titles = vec!["Elon Musk".to_string(), "Musk (surname)".to_string()];
        let summaries = parse_extracts(&extracts);

        let full = format_pages(&titles, &summaries, 1000);
        assert_eq!(
            full,
            "Page: Elon Musk\nSummary: Elon Reeve Musk is a businessman.\n\nPage: Musk (surname)\nSummary: Musk is a surname."
        );

        let short = format_pages(&titles, &summaries, 15);
        assert_eq!(short, "Page: Elon Musk");
    }

    #[test]
    fn pages_without_extracts_are_skipped() {
        let summaries = HashMap::new();
        assert!(format_pages(&["Nothing".to_string()], &summaries, 100).is_empty());
    }
}
