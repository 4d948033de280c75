use super::{parse_file, parse_listing, DriveFile, Folder, ListingPage, ListingQuery};
use crate::config::DriveConfig;
use crate::error::{ListingError, PermissionError, PlaybackStartError};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";
const GET_FIELDS: &str = "id, name, mimeType, webViewLink, webContentLink";

/// Thin Drive v3 client authenticated with an API key.
///
/// Cheap to clone - the underlying connection pool is shared, so each spawned
/// request task gets its own handle.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    max_media_bytes: usize,
}

impl DriveClient {
    pub fn new(config: &DriveConfig) -> Result<Self, ListingError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ListingError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_media_bytes: config.max_media_bytes(),
        })
    }

    /// One page of children of `query.container_id`.
    pub async fn list_children(&self, query: &ListingQuery) -> Result<ListingPage, ListingError> {
        let url = format!("{}/files", self.api_base);
        let mut params: Vec<(&str, String)> = vec![
            ("q", query.search_expression()),
            ("fields", LIST_FIELDS.to_string()),
            ("key", self.api_key.clone()),
        ];
        if let Some(size) = query.page_size {
            params.push(("pageSize", size.to_string()));
        }
        if query.order_by_name {
            params.push(("orderBy", "name".to_string()));
        }
        if let Some(token) = &query.page_token {
            params.push(("pageToken", token.clone()));
        }

        debug!(
            container = %query.container_id,
            filter = ?query.filter,
            continued = query.page_token.is_some(),
            "Listing folder"
        );

        let response = self.http.get(&url).query(&params).send().await?;
        check_status(response.status())?;
        let body = response.text().await?;
        let page = parse_listing(&body, &query.container_id)?;

        info!(
            container = %query.container_id,
            count = page.entries.len(),
            more = page.has_more(),
            "Listing page received"
        );
        Ok(page)
    }

    pub async fn get(&self, file_id: &str) -> Result<DriveFile, ListingError> {
        let url = format!("{}/files/{}", self.api_base, file_id);
        let response = self
            .http
            .get(&url)
            .query(&[("fields", GET_FIELDS), ("key", self.api_key.as_str())])
            .send()
            .await?;
        check_status(response.status())?;
        let body = response.text().await?;
        parse_file(&body)
    }

    /// Resolve the configured dashboard folders, in config order.
    pub async fn resolve_folders(&self, ids: &[String]) -> Result<Vec<Folder>, ListingError> {
        let mut folders = Vec::with_capacity(ids.len());
        for id in ids {
            let file = self.get(id).await?;
            if file.mime_type != super::FOLDER_MIME_TYPE {
                warn!(id = %id, mime = %file.mime_type, "Configured root is not a folder");
            }
            folders.push(Folder::from(file));
        }
        Ok(folders)
    }

    pub fn media_url(&self, file_id: &str) -> String {
        format!("{}/files/{}?alt=media&key={}", self.api_base, file_id, self.api_key)
    }

    /// Download the whole media body for a track, refusing anything over
    /// the configured size limit.
    pub async fn fetch_media(&self, file_id: &str) -> Result<Vec<u8>, PlaybackStartError> {
        let mut response = self
            .http
            .get(self.media_url(file_id))
            .send()
            .await
            .map_err(fetch_error)?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(PermissionError::new(status.as_u16()).into());
        }
        if !status.is_success() {
            return Err(PlaybackStartError::Fetch(format!("HTTP {}", status.as_u16())));
        }

        let declared = response.content_length().unwrap_or(0);
        check_media_size(usize::try_from(declared).unwrap_or(usize::MAX), self.max_media_bytes)?;

        let mut body = Vec::with_capacity(declared.min(self.max_media_bytes as u64) as usize);
        while let Some(chunk) = response.chunk().await.map_err(fetch_error)? {
            check_media_size(body.len() + chunk.len(), self.max_media_bytes)?;
            body.extend_from_slice(&chunk);
        }
        debug!(file_id, size = body.len(), "Media downloaded");
        Ok(body)
    }
}

fn fetch_error(err: reqwest::Error) -> PlaybackStartError {
    // the request url carries the api key
    PlaybackStartError::Fetch(err.without_url().to_string())
}

fn check_media_size(size: usize, limit: usize) -> Result<(), PlaybackStartError> {
    if size > limit {
        return Err(PlaybackStartError::Fetch(format!(
            "file is larger than the {} MB limit",
            limit / (1024 * 1024)
        )));
    }
    Ok(())
}

fn check_status(status: StatusCode) -> Result<(), ListingError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(PermissionError::new(status.as_u16()).into())
        }
        s if s.is_success() => Ok(()),
        s => Err(ListingError::Status(s.as_u16())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> DriveClient {
        let config = DriveConfig {
            api_key: "k3y".to_string(),
            api_base_url: "https://example.test/drive/v3/".to_string(),
            ..DriveConfig::default()
        };
        DriveClient::new(&config).unwrap()
    }

    #[test]
    fn test_media_url_uses_injected_key() {
        assert_eq!(
            client().media_url("abc"),
            "https://example.test/drive/v3/files/abc?alt=media&key=k3y"
        );
    }

    #[test]
    fn test_media_size_limit() {
        assert!(check_media_size(0, 10).is_ok());
        assert!(check_media_size(10, 10).is_ok());
        let err = check_media_size(11, 10).unwrap_err();
        assert!(matches!(err, PlaybackStartError::Fetch(_)));
    }

    // nothing listens on port 1, so these fail before any response
    fn unreachable_client() -> DriveClient {
        let config = DriveConfig {
            api_key: "SECRET-KEY-123".to_string(),
            api_base_url: "http://127.0.0.1:1/drive/v3".to_string(),
            request_timeout_secs: 5,
            ..DriveConfig::default()
        };
        DriveClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_connection_errors_do_not_leak_key() {
        let client = unreachable_client();

        let listing = client
            .list_children(&ListingQuery::new("f"))
            .await
            .unwrap_err();
        assert!(matches!(listing, ListingError::Network(_)));
        assert!(!listing.user_message().contains("SECRET-KEY-123"));
        assert!(!format!("{:?}", listing).contains("SECRET-KEY-123"));

        let media = client.fetch_media("abc").await.unwrap_err();
        assert!(matches!(media, PlaybackStartError::Fetch(_)));
        assert!(!media.user_message().contains("SECRET-KEY-123"));
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert_eq!(
            check_status(StatusCode::FORBIDDEN),
            Err(ListingError::PermissionDenied(PermissionError::new(403)))
        );
        assert_eq!(
            check_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(ListingError::Status(500))
        );
    }
}
