//! LLM-backed `EventMiner` — builds the range prompt, parses the reply
//! tolerantly, and validates image references.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::events::model::{EventCategory, Team};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::mining::miner::{CandidateEvent, EventMiner};
use crate::mining::probe::{HeadRequestProbe, ImageProbe};

static HTTPS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^https://[^\s"'<>]+$"#).expect("static regex")
});

/// Mines history events by prompting an LLM for a year window.
///
/// A noisy model never fails the run: transport errors, markdown-wrapped
/// replies, and unexpected shapes all degrade to an empty candidate list.
pub struct LlmMiner {
    llm: Arc<dyn LlmProvider>,
    probe: Arc<dyn ImageProbe>,
}

impl LlmMiner {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            probe: Arc::new(HeadRequestProbe::new()),
        }
    }

    /// Swap the image probe (tests stub this out).
    pub fn with_probe(mut self, probe: Arc<dyn ImageProbe>) -> Self {
        self.probe = probe;
        self
    }

    fn build_prompt(
        team: &Team,
        month: u32,
        day: u32,
        start_year: i32,
        end_year: i32,
        excluded_years: &[i32],
    ) -> String {
        let excluded = if excluded_years.is_empty() {
            "none".to_string()
        } else {
            excluded_years
                .iter()
                .map(|y| y.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        format!(
            "Today is {month}/{day}. Find 1 to 3 notable events in the history of the \
             football club \"{name}\" that happened on this day between {start_year} and \
             {end_year} (both inclusive): match wins, player transfers, legend birthdays, \
             records.\n\
             Exclude these years entirely; do not return events from them: {excluded}.\n\
             Respond with ONLY a valid JSON array, no markdown fences. Each element looks \
             like:\n\
             [\n\
               {{\n\
                 \"year\": 2004,\n\
                 \"title\": \"short, punchy title\",\n\
                 \"description\": \"50-100 word description\",\n\
                 \"imageUrl\": \"a real https image link, or an empty string\",\n\
                 \"type\": \"match\"\n\
               }}\n\
             ]\n\
             \"type\" must be one of: match, transfer, birthday, other.",
            name = team.display_name,
        )
    }

    /// Keep the image reference only if it is a plausible https URL and
    /// the probe confirms an image lives there. Everything else clears
    /// the reference; the candidate itself is never dropped over it.
    async fn validate_image(&self, candidate: &mut CandidateEvent) {
        if let Some(url) = candidate.image_url.take() {
            if HTTPS_URL.is_match(&url) && self.probe.is_image(&url).await {
                candidate.image_url = Some(url);
            } else {
                debug!(url = %url, "Dropping unverifiable image reference");
            }
        }
    }
}

#[async_trait]
impl EventMiner for LlmMiner {
    async fn fetch_candidates(
        &self,
        team: &Team,
        month: u32,
        day: u32,
        start_year: i32,
        end_year: i32,
        excluded_years: &[i32],
    ) -> Result<Vec<CandidateEvent>, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are a football data expert with deep knowledge of club history. \
                 You answer with strict JSON and nothing else.",
            ),
            ChatMessage::user(Self::build_prompt(
                team,
                month,
                day,
                start_year,
                end_year,
                excluded_years,
            )),
        ])
        .with_temperature(0.7)
        .with_max_tokens(1024);

        let response = match self.llm.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    error = %e,
                    team = %team.display_name,
                    start_year,
                    end_year,
                    "Mining call failed; treating window as empty"
                );
                return Ok(Vec::new());
            }
        };

        let mut candidates = parse_candidates(&response.content);
        for candidate in &mut candidates {
            self.validate_image(candidate).await;
        }
        Ok(candidates)
    }
}

/// Parse an LLM reply into candidates. A JSON array maps element-wise, a
/// single object becomes a one-element list, anything else is empty.
pub fn parse_candidates(text: &str) -> Vec<CandidateEvent> {
    let json = extract_json(text);

    let value: Value = match serde_json::from_str(&json) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Malformed mining response; treating as empty");
            return Vec::new();
        }
    };

    match value {
        Value::Array(items) => items.iter().filter_map(candidate_from_value).collect(),
        Value::Object(_) => candidate_from_value(&value).into_iter().collect(),
        _ => {
            warn!("Mining response is neither array nor object; treating as empty");
            Vec::new()
        }
    }
}

/// Map one JSON object to a candidate. Missing text fields get harmless
/// defaults; a candidate without a numeric year is unusable and dropped.
fn candidate_from_value(value: &Value) -> Option<CandidateEvent> {
    let obj = value.as_object()?;

    let year = obj.get("year").and_then(Value::as_i64)? as i32;
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("Untitled event")
        .to_string();
    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let image_url = obj
        .get("imageUrl")
        .or_else(|| obj.get("image_url"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let category = obj
        .get("type")
        .or_else(|| obj.get("category"))
        .and_then(Value::as_str)
        .map(EventCategory::parse_lenient)
        .unwrap_or(EventCategory::Other);

    Some(CandidateEvent {
        year,
        title,
        description,
        image_url,
        category,
    })
}

/// Extract a JSON array or object from LLM output that might contain
/// markdown fences or surrounding prose.
fn extract_json(text: &str) -> String {
    let trimmed = text.trim();

    // Already bare JSON
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in a markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('[') || inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Array bounds inside prose
    if let Some(start) = trimmed.find('[') {
        if let Some(end) = trimmed.rfind(']') {
            if end > start {
                return trimmed[start..=end].to_string();
            }
        }
    }

    // Object bounds inside prose
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return trimmed[start..=end].to_string();
            }
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::CompletionResponse;

    fn make_team() -> Team {
        Team {
            id: 1,
            name: "Liverpool".into(),
            display_name: "Liverpool".into(),
            logo_url: None,
        }
    }

    struct StubLlm {
        reply: Result<String, ()>,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            match &self.reply {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                }),
                Err(()) => Err(LlmError::RequestFailed {
                    provider: "stub".into(),
                    reason: "connection reset".into(),
                }),
            }
        }
    }

    struct YesProbe;
    struct NoProbe;

    #[async_trait]
    impl ImageProbe for YesProbe {
        async fn is_image(&self, _url: &str) -> bool {
            true
        }
    }

    #[async_trait]
    impl ImageProbe for NoProbe {
        async fn is_image(&self, _url: &str) -> bool {
            false
        }
    }

    // ── parse_candidates ────────────────────────────────────────────

    #[test]
    fn parse_well_formed_array() {
        let text = r#"[
            {"year": 1999, "title": "Treble", "description": "...", "imageUrl": "", "type": "MATCH"},
            {"year": 1975, "title": "Signing", "description": "...", "imageUrl": "", "type": "transfer"}
        ]"#;
        let candidates = parse_candidates(text);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].year, 1999);
        assert_eq!(candidates[0].category, EventCategory::Match);
        assert_eq!(candidates[1].category, EventCategory::Transfer);
        assert!(candidates[0].image_url.is_none());
    }

    #[test]
    fn parse_single_object_becomes_one_element_list() {
        let text = r#"{"year": 1958, "title": "Munich", "description": "...", "type": "other"}"#;
        let candidates = parse_candidates(text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].year, 1958);
    }

    #[test]
    fn parse_markdown_fenced_array() {
        let text = "Here you go:\n```json\n[{\"year\": 2004, \"title\": \"Invincibles\", \"description\": \"x\", \"type\": \"match\"}]\n```\n";
        let candidates = parse_candidates(text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].year, 2004);
    }

    #[test]
    fn parse_array_embedded_in_prose() {
        let text = "Sure! [{\"year\": 1977, \"title\": \"Cup\", \"description\": \"y\", \"type\": \"match\"}] hope that helps";
        assert_eq!(parse_candidates(text).len(), 1);
    }

    #[test]
    fn parse_garbage_is_empty_not_error() {
        assert!(parse_candidates("I could not find anything, sorry.").is_empty());
        assert!(parse_candidates("").is_empty());
        assert!(parse_candidates("42").is_empty());
        assert!(parse_candidates("\"just a string\"").is_empty());
    }

    #[test]
    fn candidate_without_year_is_dropped() {
        let text = r#"[
            {"title": "No year here", "description": "...", "type": "match"},
            {"year": 1960, "title": "Kept", "description": "...", "type": "match"}
        ]"#;
        let candidates = parse_candidates(text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].year, 1960);
    }

    #[test]
    fn unknown_category_defaults_to_other() {
        let text = r#"[{"year": 1990, "title": "t", "description": "d", "type": "derby-demolition"}]"#;
        assert_eq!(parse_candidates(text)[0].category, EventCategory::Other);
    }

    #[test]
    fn snake_case_keys_are_accepted() {
        let text = r#"[{"year": 1985, "title": "t", "description": "d", "image_url": "https://example.com/a.png", "category": "birthday"}]"#;
        let candidates = parse_candidates(text);
        assert_eq!(candidates[0].category, EventCategory::Birthday);
        assert_eq!(
            candidates[0].image_url.as_deref(),
            Some("https://example.com/a.png")
        );
    }

    #[test]
    fn https_url_pattern() {
        assert!(HTTPS_URL.is_match("https://upload.wikimedia.org/a/b.jpg"));
        assert!(!HTTPS_URL.is_match("http://example.com/a.jpg"));
        assert!(!HTTPS_URL.is_match("ftp://example.com/a.jpg"));
        assert!(!HTTPS_URL.is_match("not a url"));
        assert!(!HTTPS_URL.is_match("https://exa mple.com/a.jpg"));
    }

    // ── fetch_candidates ────────────────────────────────────────────

    #[tokio::test]
    async fn transport_failure_degrades_to_empty() {
        let miner = LlmMiner::new(Arc::new(StubLlm { reply: Err(()) }));
        let candidates = miner
            .fetch_candidates(&make_team(), 5, 12, 1880, 1889, &[])
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn verified_image_is_kept() {
        let reply = r#"[{"year": 1999, "title": "t", "description": "d", "imageUrl": "https://example.com/a.jpg", "type": "match"}]"#;
        let miner = LlmMiner::new(Arc::new(StubLlm {
            reply: Ok(reply.into()),
        }))
        .with_probe(Arc::new(YesProbe));

        let candidates = miner
            .fetch_candidates(&make_team(), 5, 12, 1990, 1999, &[])
            .await
            .unwrap();
        assert_eq!(
            candidates[0].image_url.as_deref(),
            Some("https://example.com/a.jpg")
        );
    }

    #[tokio::test]
    async fn failed_probe_clears_image_but_keeps_candidate() {
        let reply = r#"[{"year": 1999, "title": "t", "description": "d", "imageUrl": "https://example.com/a.jpg", "type": "match"}]"#;
        let miner = LlmMiner::new(Arc::new(StubLlm {
            reply: Ok(reply.into()),
        }))
        .with_probe(Arc::new(NoProbe));

        let candidates = miner
            .fetch_candidates(&make_team(), 5, 12, 1990, 1999, &[])
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].image_url.is_none());
    }

    #[tokio::test]
    async fn insecure_scheme_never_reaches_the_probe() {
        let reply = r#"[{"year": 1999, "title": "t", "description": "d", "imageUrl": "http://example.com/a.jpg", "type": "match"}]"#;
        let miner = LlmMiner::new(Arc::new(StubLlm {
            reply: Ok(reply.into()),
        }))
        .with_probe(Arc::new(YesProbe));

        let candidates = miner
            .fetch_candidates(&make_team(), 5, 12, 1990, 1999, &[])
            .await
            .unwrap();
        assert!(candidates[0].image_url.is_none());
    }
}
