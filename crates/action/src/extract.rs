//! Out-of-process text extraction for PDF and HTML responses

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::ActionResult;

/// Turns a document into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync + fmt::Debug {
    async fn extract(&self, content_type: &str, document: Bytes) -> ActionResult<String>;
}

/// Posts the document to an HTTP service and reads the text back.
#[derive(Debug, Clone)]
pub struct HttpTextExtractor {
    client: reqwest::Client,
    url: Url,
}

impl HttpTextExtractor {
    pub fn new(url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract(&self, content_type: &str, document: Bytes) -> ActionResult<String> {
        let response = self
            .client
            .post(self.url.clone())
            .header(http::header::CONTENT_TYPE, content_type)
            .body(document)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}
