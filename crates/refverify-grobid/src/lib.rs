//! GROBID extraction collaborator: turns a PDF into structured
//! bibliography references via a GROBID server's `processReferences`
//! endpoint, plus a regex fallback for title re-extraction.

pub mod fallback;
pub mod tei;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use refverify_core::{ExtractError, Reference, ReferenceExtractor};

pub use fallback::RegexFallback;

pub const DEFAULT_GROBID_URL: &str = "http://localhost:8070";

pub struct GrobidExtractor {
    base_url: String,
    client: reqwest::Client,
}

impl GrobidExtractor {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn process_references(&self, path: &Path) -> Result<Vec<Reference>, ExtractError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(ExtractError::Http)?;
        let form = reqwest::multipart::Form::new()
            .part("input", part)
            .text("includeRawCitations", "1");

        let url = format!("{}/api/processReferences", self.base_url);
        let resp = self.client.post(&url).multipart(form).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ExtractError::Document(format!(
                "GROBID returned HTTP {}",
                status
            )));
        }

        let body = resp.text().await?;
        let references = tei::parse_references(body.as_bytes());
        tracing::debug!(count = references.len(), "parsed TEI references");
        Ok(references)
    }
}

impl ReferenceExtractor for GrobidExtractor {
    fn extract<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Reference>, ExtractError>> + Send + 'a>> {
        Box::pin(self.process_references(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped() {
        let extractor = GrobidExtractor::new("http://grobid:8070/");
        assert_eq!(extractor.base_url, "http://grobid:8070");
    }
}
