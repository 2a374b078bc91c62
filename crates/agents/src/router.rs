//! Source routing.
//!
//! Primary path is a single short classification call expected to return
//! exactly one token from pdf|claims|both. Any failure or unrecognized
//! reply falls back to deterministic keyword matching, so routing itself
//! never errors a turn.

use crate::types::RouteDecision;
use benebot_llm::{LlmClient, LlmRequest};
use benebot_prompt::PromptSet;
use std::sync::Arc;

const ROUTER_MAX_TOKENS: u32 = 8;

/// Keyword vocabularies for the fallback path.
///
/// Tuning data, overridable through configuration. The two sets must
/// stay disjoint for the both-detection to be meaningful.
#[derive(Debug, Clone)]
pub struct RouterKeywords {
    pub claims: Vec<String>,
    pub pdf: Vec<String>,
}

impl Default for RouterKeywords {
    fn default() -> Self {
        let to_owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            claims: to_owned(&[
                "eob",
                "claim",
                "adjudication",
                "cpt",
                "icd",
                "diagnosis",
                "procedure",
                "denial",
            ]),
            pdf: to_owned(&[
                "evidence of coverage",
                "eoc",
                "covered",
                "copay",
                "coinsurance",
                "deductible",
                "benefits chart",
                "vision",
                "dental",
            ]),
        }
    }
}

/// Router over a cheap classification model with keyword fallback.
pub struct Router {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptSet>,
    model: String,
    keywords: RouterKeywords,
}

impl Router {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompts: Arc<PromptSet>,
        model: &str,
        keywords: RouterKeywords,
    ) -> Self {
        Self {
            client,
            prompts,
            model: model.to_string(),
            keywords,
        }
    }

    /// Decide which sources should answer the query. Never fails.
    pub async fn route(&self, query: &str) -> RouteDecision {
        match self.classify(query).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::debug!("Router classifier unavailable, using keywords: {}", e);
                self.keyword_route(query)
            }
        }
    }

    async fn classify(&self, query: &str) -> benebot_core::AppResult<RouteDecision> {
        let prompt = self.prompts.render_router(query)?;
        let request = LlmRequest::new(&prompt, &self.model)
            .with_temperature(0.0)
            .with_max_tokens(ROUTER_MAX_TOKENS);
        let response = self.client.complete(&request).await?;
        RouteDecision::parse(&response.content)
    }

    /// Deterministic keyword fallback.
    pub fn keyword_route(&self, query: &str) -> RouteDecision {
        let lower = query.to_lowercase();
        let has_claims = self.keywords.claims.iter().any(|k| lower.contains(k.as_str()));
        let has_pdf = self.keywords.pdf.iter().any(|k| lower.contains(k.as_str()));

        match (has_claims, has_pdf) {
            (true, true) => RouteDecision::Both,
            (true, false) => RouteDecision::Claims,
            // Benefits documents are the default source.
            _ => RouteDecision::Pdf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benebot_core::{AppError, AppResult};
    use benebot_llm::{LlmResponse, TokenStream};

    struct FixedClient {
        reply: Option<String>,
    }

    #[async_trait::async_trait]
    impl LlmClient for FixedClient {
        fn provider_name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
            match &self.reply {
                Some(content) => Ok(LlmResponse {
                    content: content.clone(),
                    model: "test".to_string(),
                }),
                None => Err(AppError::Llm("unreachable".to_string())),
            }
        }

        async fn stream(&self, _request: &LlmRequest) -> AppResult<TokenStream> {
            Err(AppError::Llm("not supported".to_string()))
        }
    }

    fn router(reply: Option<&str>) -> Router {
        Router::new(
            Arc::new(FixedClient {
                reply: reply.map(|s| s.to_string()),
            }),
            Arc::new(PromptSet::builtin().unwrap()),
            "test-model",
            RouterKeywords::default(),
        )
    }

    #[tokio::test]
    async fn test_classifier_reply_used() {
        assert_eq!(router(Some("claims")).route("anything").await, RouteDecision::Claims);
        assert_eq!(router(Some(" Both \n")).route("anything").await, RouteDecision::Both);
    }

    #[tokio::test]
    async fn test_unrecognized_reply_falls_back() {
        let r = router(Some("I think pdf is best"));
        assert_eq!(r.route("why was my claim denied").await, RouteDecision::Claims);
    }

    #[tokio::test]
    async fn test_classifier_failure_falls_back() {
        let r = router(None);
        assert_eq!(r.route("what is my copay").await, RouteDecision::Pdf);
    }

    #[test]
    fn test_keyword_route_both() {
        let r = router(None);
        assert_eq!(
            r.keyword_route("does my deductible apply to this claim"),
            RouteDecision::Both
        );
    }

    #[test]
    fn test_keyword_route_claims_only() {
        let r = router(None);
        assert_eq!(r.keyword_route("show my latest EOB"), RouteDecision::Claims);
    }

    #[test]
    fn test_keyword_route_pdf_only() {
        let r = router(None);
        assert_eq!(r.keyword_route("is vision covered"), RouteDecision::Pdf);
    }

    #[test]
    fn test_keyword_route_default_pdf() {
        let r = router(None);
        assert_eq!(r.keyword_route("tell me about my plan"), RouteDecision::Pdf);
    }

    #[test]
    fn test_keyword_route_deterministic() {
        let r = router(None);
        let q = "claim denial for a covered procedure";
        assert_eq!(r.keyword_route(q), r.keyword_route(q));
    }
}
