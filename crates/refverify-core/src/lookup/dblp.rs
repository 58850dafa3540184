//! DBLP publication search API client.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{LookupError, LookupService};
use crate::CandidateRecord;
use crate::normalize::{clean_title, query_string};

/// How many words of the title go into the search query. Full titles
/// over-constrain the DBLP search and hurt recall.
const QUERY_WORDS: usize = 6;

/// Maximum hits requested per query.
const MAX_HITS: usize = 10;

pub struct DblpLookup {
    base_url: String,
}

impl DblpLookup {
    pub fn new() -> Self {
        Self {
            base_url: "https://dblp.org/search/publ/api".to_string(),
        }
    }

    /// Point the client at a different endpoint. Used by tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn parse_hits(data: &serde_json::Value) -> Vec<CandidateRecord> {
        let hits = data["result"]["hits"]["hit"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        hits.iter()
            .filter_map(|hit| {
                let info = &hit["info"];
                let title = clean_title(info["title"].as_str()?);
                if title.is_empty() {
                    return None;
                }

                // DBLP serializes a single author as an object and
                // several as an array; both carry the name in "text".
                let authors = match &info["authors"]["author"] {
                    serde_json::Value::Array(arr) => arr
                        .iter()
                        .filter_map(|a| {
                            a["text"]
                                .as_str()
                                .or_else(|| a.as_str())
                                .map(String::from)
                        })
                        .collect(),
                    serde_json::Value::Object(obj) => obj
                        .get("text")
                        .and_then(|v| v.as_str())
                        .map(|s| vec![s.to_string()])
                        .unwrap_or_default(),
                    _ => vec![],
                };

                let year = info["year"].as_str().and_then(|y| y.parse::<u16>().ok());
                let venue = info["venue"].as_str().map(String::from);
                let key = info["url"].as_str().map(String::from);

                Some(CandidateRecord {
                    title,
                    authors,
                    year,
                    venue,
                    key,
                })
            })
            .collect()
    }
}

impl Default for DblpLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupService for DblpLookup {
    fn name(&self) -> &str {
        "DBLP"
    }

    fn search<'a>(
        &'a self,
        title: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CandidateRecord>, LookupError>> + Send + 'a>> {
        Box::pin(async move {
            let query = query_string(title, QUERY_WORDS);
            let url = format!(
                "{}?q={}&format=json&h={}",
                self.base_url,
                urlencoding::encode(&query),
                MAX_HITS
            );

            let resp = client.get(&url).timeout(timeout).send().await.map_err(|e| {
                if e.is_timeout() {
                    LookupError::Timeout
                } else {
                    LookupError::Http(e.to_string())
                }
            })?;

            let status = resp.status();
            if status.as_u16() == 429 {
                return Err(LookupError::RateLimited);
            }
            if !status.is_success() {
                return Err(LookupError::Http(format!("HTTP {}", status)));
            }

            let data: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| LookupError::Malformed(e.to_string()))?;

            Ok(Self::parse_hits(&data))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_authors() {
        let data: serde_json::Value = serde_json::from_str(
            r#"{"result":{"hits":{"hit":[{"info":{
                "title":"Attention Is All You Need.",
                "authors":{"author":[{"text":"Ashish Vaswani"},{"text":"Noam Shazeer"}]},
                "year":"2017",
                "venue":"NIPS",
                "url":"https://dblp.org/rec/conf/nips/VaswaniSPUJGKP17"
            }}]}}}"#,
        )
        .unwrap();

        let candidates = DblpLookup::parse_hits(&data);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.title, "Attention Is All You Need.");
        assert_eq!(c.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(c.year, Some(2017));
        assert_eq!(c.venue.as_deref(), Some("NIPS"));
        assert!(c.key.is_some());
    }

    #[test]
    fn parses_single_object_author() {
        let data: serde_json::Value = serde_json::from_str(
            r#"{"result":{"hits":{"hit":[{"info":{
                "title":"Some Solo Paper",
                "authors":{"author":{"text":"Jane Doe"}},
                "year":"2020"
            }}]}}}"#,
        )
        .unwrap();

        let candidates = DblpLookup::parse_hits(&data);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].authors, vec!["Jane Doe"]);
    }

    #[test]
    fn missing_hits_is_empty() {
        let data: serde_json::Value =
            serde_json::from_str(r#"{"result":{"hits":{"@total":"0"}}}"#).unwrap();
        assert!(DblpLookup::parse_hits(&data).is_empty());
    }

    #[test]
    fn skips_hits_without_title() {
        let data: serde_json::Value = serde_json::from_str(
            r#"{"result":{"hits":{"hit":[
                {"info":{"year":"2020"}},
                {"info":{"title":"Kept Paper"}}
            ]}}}"#,
        )
        .unwrap();

        let candidates = DblpLookup::parse_hits(&data);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Kept Paper");
    }

    #[test]
    fn title_html_is_stripped() {
        let data: serde_json::Value = serde_json::from_str(
            r#"{"result":{"hits":{"hit":[{"info":{
                "title":"Learning <i>Fast</i> Indexes"
            }}]}}}"#,
        )
        .unwrap();

        let candidates = DblpLookup::parse_hits(&data);
        assert_eq!(candidates[0].title, "Learning Fast Indexes");
    }

    #[test]
    fn unparseable_year_is_none() {
        let data: serde_json::Value = serde_json::from_str(
            r#"{"result":{"hits":{"hit":[{"info":{
                "title":"Undated Paper","year":"n.d."
            }}]}}}"#,
        )
        .unwrap();

        assert_eq!(DblpLookup::parse_hits(&data)[0].year, None);
    }
}
