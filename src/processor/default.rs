use super::{ProcessOutcome, ResponseProcessor};
use crate::context::CrawlScope;
use crate::entity::{AccessResult, ResponseData, ResultData, NO_TRANSFORMER, NOT_MODIFIED_STATUS_CODE};
use crate::service::{DataService, StorageError};
use crate::transformer::Transformer;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Transforms successful responses, stores them once per URL and returns
/// their links
///
/// Not-modified responses are stored with empty data and yield no links.
/// Responses whose status code is in neither list are ignored.
pub struct DefaultResponseProcessor {
    transformer: Arc<dyn Transformer>,
    data_service: Arc<dyn DataService>,
    successful_http_codes: Vec<u16>,
    not_modified_http_codes: Vec<u16>,
}

impl DefaultResponseProcessor {
    pub fn new(transformer: Arc<dyn Transformer>, data_service: Arc<dyn DataService>) -> Self {
        Self {
            transformer,
            data_service,
            successful_http_codes: vec![200],
            not_modified_http_codes: vec![NOT_MODIFIED_STATUS_CODE],
        }
    }

    pub fn with_successful_http_codes(mut self, codes: Vec<u16>) -> Self {
        self.successful_http_codes = codes;
        self
    }

    pub fn with_not_modified_http_codes(mut self, codes: Vec<u16>) -> Self {
        self.not_modified_http_codes = codes;
        self
    }

    fn is_successful(&self, response: &ResponseData) -> bool {
        self.successful_http_codes.contains(&response.http_status_code)
    }

    fn is_not_modified(&self, response: &ResponseData) -> bool {
        self.not_modified_http_codes
            .contains(&response.http_status_code)
    }

    /// Stores the result unless the session already has one for the URL
    ///
    /// Returns true if this call stored it.
    async fn store_once(&self, response: &ResponseData, result: ResultData) -> Result<bool> {
        if self
            .data_service
            .exists(&response.session_id, &response.url)
            .await?
        {
            tracing::debug!("{} already stored, skipping", response.url);
            return Ok(false);
        }

        match self
            .data_service
            .store(AccessResult::new(response, result))
            .await
        {
            Ok(()) => Ok(true),
            Err(StorageError::Duplicate { url, .. }) => {
                tracing::debug!("{} stored concurrently, skipping", url);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ResponseProcessor for DefaultResponseProcessor {
    async fn process(
        &self,
        _scope: &CrawlScope<'_>,
        response: &ResponseData,
    ) -> Result<ProcessOutcome> {
        if self.is_not_modified(response) {
            let result = ResultData {
                data: Vec::new(),
                encoding: "UTF-8".to_string(),
                transformer_name: NO_TRANSFORMER.to_string(),
                title: None,
                child_urls: Vec::new(),
            };
            self.store_once(response, result).await?;
            return Ok(ProcessOutcome::empty());
        }

        if !self.is_successful(response) {
            tracing::debug!(
                "Ignoring response ({}): {}",
                response.http_status_code,
                response.url
            );
            return Ok(ProcessOutcome::empty());
        }

        let Some(mut result) = self.transformer.transform(response) else {
            tracing::warn!(
                "No data for ({}, {})",
                response.url,
                response.mime_type.as_deref().unwrap_or("unknown")
            );
            return Ok(ProcessOutcome::empty());
        };

        let child_urls = std::mem::take(&mut result.child_urls);
        if self.store_once(response, result).await? {
            Ok(ProcessOutcome::with_children(child_urls))
        } else {
            Ok(ProcessOutcome::empty())
        }
    }
}
