use super::store::{CollectionKey, CollectionStore, Completion, PendingRequest, RequestTicket};
use crate::drive::{filter_local, FileEntry, Folder, ListingPage, ListingQuery};
use crate::error::ListingError;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootsState {
    Loading,
    Ready,
    Failed(String),
}

/// The main view: a fixed set of root folders and the tracks of the one
/// that's open, searchable locally.
pub struct Dashboard {
    roots: Vec<Folder>,
    roots_state: RootsState,
    selected_folder: Option<String>,
    tracks: CollectionStore,
    search: String,
    page_size: u32,
}

impl Dashboard {
    pub fn new(page_size: u32) -> Self {
        Self {
            roots: Vec::new(),
            roots_state: RootsState::Loading,
            selected_folder: None,
            tracks: CollectionStore::new(),
            search: String::new(),
            page_size,
        }
    }

    pub fn set_roots(&mut self, result: Result<Vec<Folder>, ListingError>) -> Result<usize, ListingError> {
        match result {
            Ok(folders) => {
                info!(count = folders.len(), "Dashboard folders resolved");
                self.roots = folders;
                self.roots_state = RootsState::Ready;
                Ok(self.roots.len())
            }
            Err(err) => {
                self.roots_state = RootsState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Puts a failed root resolution back into `Loading`. Returns `false`
    /// when there is nothing to retry or a resolution is already running.
    pub fn retry_roots(&mut self) -> bool {
        if !matches!(self.roots_state, RootsState::Failed(_)) {
            return false;
        }
        self.roots_state = RootsState::Loading;
        true
    }

    /// Opening a folder always starts from its first page.
    pub fn open_folder(&mut self, folder_id: &str) -> PendingRequest {
        self.selected_folder = Some(folder_id.to_string());
        self.tracks.open(CollectionKey::folder(folder_id))
    }

    pub fn load_more(&mut self) -> Option<PendingRequest> {
        self.tracks.load_more()
    }

    pub fn retry(&mut self) -> Option<PendingRequest> {
        self.tracks.retry()
    }

    pub fn complete(
        &mut self,
        ticket: &RequestTicket,
        result: Result<ListingPage, ListingError>,
    ) -> Completion {
        self.tracks
            .complete(ticket, result.map(ListingPage::strip_extensions))
    }

    pub fn listing_query(&self, request: &PendingRequest) -> ListingQuery {
        ListingQuery {
            container_id: request.ticket.key.container_id.clone(),
            filter: None,
            page_token: request.page_token.clone(),
            page_size: Some(self.page_size),
            order_by_name: true,
        }
    }

    pub fn set_search(&mut self, text: &str) {
        self.search = text.to_string();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Audio tracks of the open folder that match the search box.
    pub fn visible_tracks(&self) -> Vec<&FileEntry> {
        filter_local(self.tracks.entries(), &self.search)
            .into_iter()
            .filter(|entry| entry.is_audio())
            .collect()
    }

    pub fn roots(&self) -> &[Folder] {
        &self.roots
    }

    pub fn roots_state(&self) -> &RootsState {
        &self.roots_state
    }

    pub fn selected_folder(&self) -> Option<&str> {
        self.selected_folder.as_deref()
    }

    pub fn tracks(&self) -> &CollectionStore {
        &self.tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive_entry(id: &str, name: &str, mime: &str) -> FileEntry {
        FileEntry {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: mime.to_string(),
            parent_folder_id: "f1".to_string(),
        }
    }

    #[test]
    fn test_open_folder_strips_extensions() {
        let mut dashboard = Dashboard::new(50);
        let request = dashboard.open_folder("f1");

        let query = dashboard.listing_query(&request);
        assert_eq!(query.page_size, Some(50));
        assert!(query.order_by_name);
        assert_eq!(query.page_token, None);

        let page = ListingPage {
            entries: vec![
                drive_entry("1", "Sun.mp3", "audio/mpeg"),
                drive_entry("2", "cover.jpg", "image/jpeg"),
                drive_entry("3", "moon.live.ogg", "audio/ogg"),
            ],
            next_page_token: None,
        };
        dashboard.complete(&request.ticket, Ok(page));

        let names: Vec<&str> = dashboard.visible_tracks().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Sun", "moon.live"]);
        assert_eq!(dashboard.tracks().entries().len(), 3);
    }

    #[test]
    fn test_search_is_local() {
        let mut dashboard = Dashboard::new(50);
        let request = dashboard.open_folder("f1");
        let page = ListingPage {
            entries: vec![
                drive_entry("1", "Sun.mp3", "audio/mpeg"),
                drive_entry("2", "moon.mp3", "audio/mpeg"),
                drive_entry("3", "Star.mp3", "audio/mpeg"),
            ],
            next_page_token: Some("next".to_string()),
        };
        dashboard.complete(&request.ticket, Ok(page));

        dashboard.set_search("ON");
        let names: Vec<&str> = dashboard.visible_tracks().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["moon"]);
        // no network round trip, the cursor is still usable
        assert!(dashboard.tracks().has_more());
    }

    #[test]
    fn test_switching_folders_drops_late_pages() {
        let mut dashboard = Dashboard::new(50);
        let first = dashboard.open_folder("f1");
        let second = dashboard.open_folder("f2");

        let late = ListingPage {
            entries: vec![drive_entry("1", "old.mp3", "audio/mpeg")],
            next_page_token: None,
        };
        assert_eq!(dashboard.complete(&first.ticket, Ok(late)), Completion::Stale);
        assert!(dashboard.visible_tracks().is_empty());
        assert_eq!(dashboard.selected_folder(), Some("f2"));
        assert!(dashboard.tracks().accepts(&second.ticket));
    }

    #[test]
    fn test_roots_failure_is_reported() {
        let mut dashboard = Dashboard::new(50);
        assert!(dashboard.set_roots(Err(ListingError::Status(500))).is_err());
        assert!(matches!(dashboard.roots_state(), RootsState::Failed(_)));

        let folders = vec![Folder {
            id: "f1".to_string(),
            name: "Lectures".to_string(),
        }];
        assert_eq!(dashboard.set_roots(Ok(folders)).unwrap(), 1);
        assert_eq!(dashboard.roots_state(), &RootsState::Ready);
    }

    #[test]
    fn test_roots_retry_only_once_per_failure() {
        let mut dashboard = Dashboard::new(50);
        // initial resolution still in flight
        assert!(!dashboard.retry_roots());

        dashboard.set_roots(Err(ListingError::Status(503))).unwrap_err();
        assert!(dashboard.retry_roots());
        assert_eq!(dashboard.roots_state(), &RootsState::Loading);
        // repeated presses while loading start nothing new
        assert!(!dashboard.retry_roots());

        dashboard.set_roots(Ok(Vec::new())).unwrap();
        assert!(!dashboard.retry_roots());
    }
}
