//! Google Gemini batch adjudicator.
//!
//! Submits batches of unresolved references as a single prompt and maps
//! the model's judgment back onto verdicts. A confirmation with
//! confidence at or above [`CONFIRM_CONFIDENCE`] promotes to VERIFIED; a
//! "does not exist" judgment demotes to SUSPICIOUS; anything else keeps
//! the prior verdict.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Deserialize;

use super::{AdjudicationError, AdjudicationItem, AdjudicationOutcome, Adjudicator};
use crate::Verdict;

/// Models tried in order of preference; a non-retryable failure on one
/// falls through to the next.
const MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-flash-8b", "gemini-2.0-flash"];

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Attempts per model before falling through to the next.
const RETRIES_PER_MODEL: u32 = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum model confidence for a confirmation to promote a verdict.
const CONFIRM_CONFIDENCE: f64 = 0.8;

/// What the model returns for each reference in a batch.
#[derive(Debug, Deserialize)]
struct BatchJudgment {
    #[serde(default)]
    verified: bool,
    #[serde(default = "default_exists")]
    exists: bool,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

fn default_exists() -> bool {
    true
}

pub struct GeminiAdjudicator {
    api_key: String,
    client: reqwest::Client,
    /// Spaces successive batch submissions to stay under the API quota.
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl GeminiAdjudicator {
    pub fn new(api_key: String) -> Self {
        let quota = Quota::with_period(Duration::from_secs(2))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN));
        Self {
            api_key,
            client: reqwest::Client::new(),
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Build from `GEMINI_API_KEY`. `None` when the key is absent, in
    /// which case adjudication is disabled for the run.
    pub fn from_env() -> Option<Self> {
        match std::env::var("GEMINI_API_KEY") {
            Ok(key) if !key.is_empty() => Some(Self::new(key)),
            _ => {
                tracing::info!("GEMINI_API_KEY not set, adjudication disabled");
                None
            }
        }
    }

    fn build_prompt(items: &[AdjudicationItem]) -> String {
        let mut refs_text = String::new();
        for item in items {
            let _ = write!(
                refs_text,
                "\nReference #{}:\n  Title: {}\n  Authors: {}\n  Year: {}\n",
                item.index,
                item.title,
                if item.authors.is_empty() {
                    "N/A".to_string()
                } else {
                    item.authors.join(", ")
                },
                item.year.map_or("N/A".to_string(), |y| y.to_string()),
            );
            match &item.candidate {
                Some(c) => {
                    let _ = write!(
                        refs_text,
                        "  Best database match: {}\n  Match authors: {}\n  Match year: {}\n  Current confidence: {:.3}\n",
                        c.title,
                        if c.authors.is_empty() {
                            "N/A".to_string()
                        } else {
                            c.authors.join(", ")
                        },
                        c.year.map_or("N/A".to_string(), |y| y.to_string()),
                        item.current_score,
                    );
                }
                None => refs_text.push_str("  (No database match found)\n"),
            }
        }

        format!(
            "Analyze these academic references and verify if they are real publications.\n\
             \n\
             For references WITH a database match: determine if the reference and the match refer to the SAME publication.\n\
             For references WITHOUT a database match: determine if the reference appears to be a real publication (it may be from a venue the database does not cover, or a book).\n\
             {refs_text}\n\
             For EACH reference, provide:\n\
             1. verified: true if you are confident this is a real, correctly matched publication\n\
             2. exists: true/false whether the publication exists at all (use false only if likely fabricated)\n\
             3. confidence: 0.0-1.0\n\
             4. reasoning: brief explanation\n\
             \n\
             Be generous with references that have matching database data: small title variations, author name differences (initials, middle names), and year differences of 1-2 years are normal.\n\
             \n\
             Respond with a JSON object mapping reference number to result:\n\
             {{\n\
               \"1\": {{\"verified\": true, \"exists\": true, \"confidence\": 0.9, \"reasoning\": \"...\"}}\n\
             }}\n\
             \n\
             ONLY output valid JSON, no explanation outside the JSON."
        )
    }

    /// Strip a markdown code fence if the model wrapped its JSON in one.
    fn strip_fences(text: &str) -> &str {
        let text = text.trim();
        let Some(rest) = text.strip_prefix("```") else {
            return text;
        };
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        rest.trim()
    }

    fn parse_response(
        text: &str,
        items: &[AdjudicationItem],
    ) -> Result<HashMap<usize, AdjudicationOutcome>, AdjudicationError> {
        let json = Self::strip_fences(text);
        let judgments: HashMap<String, BatchJudgment> = serde_json::from_str(json)
            .map_err(|e| AdjudicationError::Malformed(e.to_string()))?;

        let mut outcomes = HashMap::new();
        for item in items {
            let Some(j) = judgments.get(&item.index.to_string()) else {
                continue;
            };
            let verdict = if j.verified && j.confidence >= CONFIRM_CONFIDENCE {
                Verdict::Verified
            } else if !j.exists {
                Verdict::Suspicious
            } else {
                item.current_verdict
            };
            outcomes.insert(
                item.index,
                AdjudicationOutcome {
                    verdict,
                    confidence: j.confidence,
                    reasoning: j.reasoning.clone(),
                },
            );
        }
        Ok(outcomes)
    }

    async fn call_model(&self, model: &str, prompt: &str) -> Result<String, AdjudicationError> {
        let url = format!("{}/{}:generateContent", API_BASE, model);
        let payload = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"maxOutputTokens": 4096, "temperature": 0.1},
        });

        for attempt in 0..RETRIES_PER_MODEL {
            let resp = self
                .client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&payload)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|e| AdjudicationError::Request(e.to_string()))?;

            let status = resp.status();
            if status.as_u16() == 429 {
                let wait = Duration::from_secs(10 * (attempt as u64 + 1));
                tracing::warn!(model, wait_secs = wait.as_secs(), "rate limited, backing off");
                tokio::time::sleep(wait).await;
                continue;
            }
            if !status.is_success() {
                return Err(AdjudicationError::Request(format!(
                    "{} returned HTTP {}",
                    model, status
                )));
            }

            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| AdjudicationError::Malformed(e.to_string()))?;
            let text = body["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .ok_or_else(|| {
                    AdjudicationError::Malformed("response carried no text part".to_string())
                })?;
            return Ok(text.to_string());
        }

        Err(AdjudicationError::Request(format!(
            "{} rate limited on every attempt",
            model
        )))
    }
}

impl Adjudicator for GeminiAdjudicator {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn adjudicate<'a>(
        &'a self,
        items: &'a [AdjudicationItem],
    ) -> Pin<
        Box<
            dyn Future<Output = Result<HashMap<usize, AdjudicationOutcome>, AdjudicationError>>
                + Send
                + 'a,
        >,
    > {
        Box::pin(async move {
            if items.is_empty() {
                return Ok(HashMap::new());
            }

            self.limiter.until_ready().await;
            let prompt = Self::build_prompt(items);

            let mut last_err = AdjudicationError::Exhausted;
            for model in MODELS {
                match self.call_model(model, &prompt).await {
                    Ok(text) => return Self::parse_response(&text, items),
                    Err(e) => {
                        tracing::warn!(model, error = %e, "model failed, trying next");
                        last_err = e;
                    }
                }
            }
            Err(last_err)
        })
    }
}
