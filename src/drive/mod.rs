// Google Drive access - listing folders page by page and pulling media bytes.
// Everything the provider sends is validated here so the rest of the app only
// ever sees well-formed entries.

pub mod client;

pub use client::DriveClient;

use crate::error::ListingError;
use serde::Deserialize;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Raw item as Drive returns it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub parent_folder_id: String,
}

/// One page of a folder listing. `next_page_token` is only valid for the exact
/// query that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingPage {
    pub entries: Vec<FileEntry>,
    pub next_page_token: Option<String>,
}

/// Parameters for one `files.list` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub container_id: String,
    pub filter: Option<String>,
    pub page_token: Option<String>,
    pub page_size: Option<u32>,
    pub order_by_name: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl FileEntry {
    pub fn from_drive_file(file: DriveFile, parent_folder_id: &str) -> Self {
        Self {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            parent_folder_id: parent_folder_id.to_string(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/") || self.mime_type == "application/ogg"
    }

    /// Same entry with the last extension dropped, for track titles.
    pub fn without_extension(mut self) -> Self {
        self.name = strip_extension(&self.name).to_string();
        self
    }

    pub fn as_folder(&self) -> Folder {
        Folder {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

impl ListingPage {
    pub fn strip_extensions(mut self) -> Self {
        self.entries = self
            .entries
            .into_iter()
            .map(FileEntry::without_extension)
            .collect();
        self
    }

    pub fn has_more(&self) -> bool {
        self.next_page_token.is_some()
    }
}

impl From<DriveFile> for Folder {
    fn from(file: DriveFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
        }
    }
}

impl ListingQuery {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            filter: None,
            page_token: None,
            page_size: None,
            order_by_name: false,
        }
    }

    /// Drive search expression: children of the container, optionally narrowed by name.
    pub fn search_expression(&self) -> String {
        let mut q = format!(
            "'{}' in parents and trashed = false",
            escape_query_literal(&self.container_id)
        );
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.is_empty()) {
            q.push_str(&format!(" and name contains '{}'", escape_query_literal(filter)));
        }
        q
    }
}

/// "a.b.mp3" -> "a.b". Names without a usable extension are left alone.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Escape a value for use inside a single-quoted Drive query string.
pub fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn parse_listing(body: &str, container_id: &str) -> Result<ListingPage, ListingError> {
    let response: FileListResponse =
        serde_json::from_str(body).map_err(|e| ListingError::Malformed(e.to_string()))?;

    let entries = response
        .files
        .into_iter()
        .map(|file| validate_file(file).map(|f| FileEntry::from_drive_file(f, container_id)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ListingPage {
        entries,
        next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
    })
}

pub fn parse_file(body: &str) -> Result<DriveFile, ListingError> {
    let file: DriveFile =
        serde_json::from_str(body).map_err(|e| ListingError::Malformed(e.to_string()))?;
    validate_file(file)
}

fn validate_file(file: DriveFile) -> Result<DriveFile, ListingError> {
    if file.id.is_empty() {
        return Err(ListingError::Malformed(format!(
            "item '{}' has an empty id",
            file.name
        )));
    }
    Ok(file)
}

/// Case-insensitive substring filter over already loaded entries, order kept.
pub fn filter_local<'a>(entries: &'a [FileEntry], query: &str) -> Vec<&'a FileEntry> {
    let needle = query.to_lowercase();
    entries
        .iter()
        .filter(|entry| needle.is_empty() || entry.name.to_lowercase().contains(&needle))
        .collect()
}
