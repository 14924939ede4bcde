use super::{ClientResponse, CrawlerClient};
use crate::context::CrawlScope;
use crate::entity::{RequestData, RequestMethod, ResponseData};
use crate::{Result, TrawlError, UrlError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;
use url::Url;

/// [`CrawlerClient`] for `file:` URLs
///
/// Regular files are read into a response; directories yield their entries
/// as children. A missing path is reported as a 404 response rather than
/// an error so rules can still see it.
#[derive(Debug, Default)]
pub struct FileSystemClient;

impl FileSystemClient {
    pub fn new() -> Self {
        Self
    }

    async fn list_directory(path: &Path) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut children = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let child_path = entry.path();
            let child = if entry.file_type().await?.is_dir() {
                Url::from_directory_path(&child_path)
            } else {
                Url::from_file_path(&child_path)
            };
            match child {
                Ok(url) => children.push(url.to_string()),
                Err(()) => tracing::debug!("Skipping non-absolute path {}", child_path.display()),
            }
        }

        children.sort();
        Ok(children)
    }
}

fn to_path(url: &str) -> Result<std::path::PathBuf> {
    let parsed = Url::parse(url)?;
    if parsed.scheme() != "file" {
        return Err(UrlError::InvalidScheme(parsed.scheme().to_string()).into());
    }
    parsed
        .to_file_path()
        .map_err(|()| UrlError::Parse(format!("not a local file URL: {}", url)).into())
}

#[async_trait]
impl CrawlerClient for FileSystemClient {
    async fn execute(&self, scope: &CrawlScope<'_>, request: &RequestData) -> Result<ClientResponse> {
        let url = request.url.as_str();
        let path = to_path(url)?;
        let started = Instant::now();

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("{} not found", path.display());
                let mut data = ResponseData::new(url, 404);
                data.method = request.method;
                data.session_id = scope.context.session_id();
                data.parent_url = scope.entry.parent_url.clone();
                return Ok(ClientResponse::Fetched(data));
            }
            Err(e) => return Err(TrawlError::Io(e)),
        };

        if metadata.is_dir() {
            let children = Self::list_directory(&path).await?;
            tracing::debug!("{} lists {} entries", path.display(), children.len());
            return Ok(ClientResponse::Children(children));
        }

        let mut data = ResponseData::new(url, 200);
        data.method = request.method;
        data.session_id = scope.context.session_id();
        data.parent_url = scope.entry.parent_url.clone();
        data.mime_type = Some(
            mime_guess::from_path(&path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        );
        data.content_length = metadata.len();
        data.last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        if request.method == RequestMethod::Get {
            data.content = tokio::fs::read(&path).await?;
        }

        data.execution_time_ms = started.elapsed().as_millis() as u64;
        Ok(ClientResponse::Fetched(data))
    }
}
