use super::store::{CollectionKey, CollectionStore, Completion, PendingRequest, RequestTicket};
use crate::drive::{FileEntry, Folder, ListingPage, ListingQuery};
use crate::error::ListingError;

pub struct FolderFrame {
    pub folder: Folder,
    store: CollectionStore,
}

impl FolderFrame {
    fn new(folder: Folder) -> Self {
        Self {
            folder,
            store: CollectionStore::new(),
        }
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }
}

/// File explorer: a breadcrumb stack of folders, each paged on its own,
/// with a remote name search on the innermost folder.
pub struct Explorer {
    stack: Vec<FolderFrame>,
    search: String,
    page_size: Option<u32>,
}

impl Explorer {
    pub fn new(root: Folder, page_size: Option<u32>) -> Self {
        Self {
            stack: vec![FolderFrame::new(root)],
            search: String::new(),
            page_size,
        }
    }

    /// (Re)load the root folder and drop everything below it.
    pub fn start(&mut self) -> PendingRequest {
        self.stack.truncate(1);
        self.search.clear();
        let frame = self.current_mut();
        let key = CollectionKey::folder(frame.folder.id.clone());
        frame.store.open(key)
    }

    pub fn enter(&mut self, folder: Folder) -> PendingRequest {
        self.search.clear();
        let mut frame = FolderFrame::new(folder);
        let request = frame.store.open(CollectionKey::folder(frame.folder.id.clone()));
        self.stack.push(frame);
        request
    }

    pub fn back(&mut self) -> Option<PendingRequest> {
        if self.stack.len() < 2 {
            return None;
        }
        self.jump_to(self.stack.len() - 2)
    }

    /// Breadcrumb jump. Frames above `index` are dropped, together with
    /// whatever they still had in flight. If the target was showing search
    /// results it is reloaded unfiltered.
    pub fn jump_to(&mut self, index: usize) -> Option<PendingRequest> {
        if index >= self.stack.len() {
            return None;
        }
        self.stack.truncate(index + 1);
        self.search.clear();

        let frame = self.current_mut();
        let filtered = frame.store.key().map_or(false, |key| key.filter.is_some());
        if filtered {
            let key = CollectionKey::folder(frame.folder.id.clone());
            Some(frame.store.open(key))
        } else {
            None
        }
    }

    /// Any change to the search text re-queries the current folder from page one.
    pub fn set_search(&mut self, text: &str) -> PendingRequest {
        self.search = text.to_string();
        let frame = self.current_mut();
        let key = CollectionKey::filtered(frame.folder.id.clone(), text);
        frame.store.open(key)
    }

    pub fn load_more(&mut self) -> Option<PendingRequest> {
        self.current_mut().store.load_more()
    }

    pub fn retry(&mut self) -> Option<PendingRequest> {
        self.current_mut().store.retry()
    }

    pub fn complete(
        &mut self,
        ticket: &RequestTicket,
        result: Result<ListingPage, ListingError>,
    ) -> Completion {
        match self
            .stack
            .iter_mut()
            .rev()
            .find(|frame| frame.store.accepts(ticket))
        {
            Some(frame) => frame.store.complete(ticket, result),
            None => Completion::Stale,
        }
    }

    pub fn listing_query(&self, request: &PendingRequest) -> ListingQuery {
        ListingQuery {
            container_id: request.ticket.key.container_id.clone(),
            filter: request.ticket.key.filter.clone(),
            page_token: request.page_token.clone(),
            page_size: self.page_size,
            order_by_name: false,
        }
    }

    pub fn current(&self) -> &FolderFrame {
        // the root frame is never popped
        &self.stack[self.stack.len() - 1]
    }

    fn current_mut(&mut self) -> &mut FolderFrame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    pub fn breadcrumbs(&self) -> Vec<&str> {
        self.stack.iter().map(|frame| frame.folder.name.as_str()).collect()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn folders(&self) -> Vec<&FileEntry> {
        self.current()
            .store
            .entries()
            .iter()
            .filter(|entry| entry.is_folder())
            .collect()
    }

    pub fn files(&self) -> Vec<&FileEntry> {
        self.current()
            .store
            .entries()
            .iter()
            .filter(|entry| !entry.is_folder())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::FOLDER_MIME_TYPE;

    fn root() -> Folder {
        Folder {
            id: "root".to_string(),
            name: "Root".to_string(),
        }
    }

    fn listing(parent: &str, items: &[(&str, &str)], token: Option<&str>) -> ListingPage {
        ListingPage {
            entries: items
                .iter()
                .map(|(id, mime)| FileEntry {
                    id: id.to_string(),
                    name: format!("{} name", id),
                    mime_type: mime.to_string(),
                    parent_folder_id: parent.to_string(),
                })
                .collect(),
            next_page_token: token.map(str::to_string),
        }
    }

    #[test]
    fn test_navigation_and_breadcrumbs() {
        let mut explorer = Explorer::new(root(), Some(20));
        let request = explorer.start();
        explorer.complete(
            &request.ticket,
            Ok(listing("root", &[("music", FOLDER_MIME_TYPE), ("notes.txt", "text/plain")], None)),
        );
        assert_eq!(explorer.folders().len(), 1);
        assert_eq!(explorer.files().len(), 1);

        let music = explorer.folders()[0].as_folder();
        let request = explorer.enter(music);
        assert_eq!(explorer.breadcrumbs(), vec!["Root", "music name"]);
        assert_eq!(explorer.listing_query(&request).container_id, "music");
        assert_eq!(explorer.listing_query(&request).page_size, Some(20));

        explorer.complete(&request.ticket, Ok(listing("music", &[("a.mp3", "audio/mpeg")], None)));
        assert_eq!(explorer.files().len(), 1);

        // root kept its entries, no reload needed
        assert!(explorer.back().is_none());
        assert_eq!(explorer.depth(), 1);
        assert_eq!(explorer.files()[0].id, "notes.txt");
        assert!(explorer.back().is_none());
    }

    #[test]
    fn test_search_replaces_current_folder() {
        let mut explorer = Explorer::new(root(), None);
        let request = explorer.start();
        explorer.complete(
            &request.ticket,
            Ok(listing("root", &[("a", "audio/mpeg"), ("b", "audio/mpeg")], Some("t"))),
        );

        let search = explorer.set_search("live");
        let query = explorer.listing_query(&search);
        assert_eq!(query.filter.as_deref(), Some("live"));
        assert_eq!(query.page_token, None);
        assert!(explorer.files().is_empty());

        explorer.complete(&search.ticket, Ok(listing("root", &[("live", "audio/mpeg")], None)));
        assert_eq!(explorer.files().len(), 1);

        let cleared = explorer.set_search("");
        assert_eq!(explorer.listing_query(&cleared).filter, None);
    }

    #[test]
    fn test_jump_back_reloads_filtered_frame() {
        let mut explorer = Explorer::new(root(), None);
        let request = explorer.start();
        explorer.complete(&request.ticket, Ok(listing("root", &[("sub", FOLDER_MIME_TYPE)], None)));

        let search = explorer.set_search("sub");
        explorer.complete(&search.ticket, Ok(listing("root", &[("sub", FOLDER_MIME_TYPE)], None)));
        let sub = explorer.folders()[0].as_folder();
        explorer.enter(sub);
        assert_eq!(explorer.search(), "");

        let reload = explorer.jump_to(0).expect("filtered root is reloaded");
        assert_eq!(reload.ticket.key, CollectionKey::folder("root"));
        assert_eq!(explorer.depth(), 1);
    }

    #[test]
    fn test_results_for_popped_frame_are_stale() {
        let mut explorer = Explorer::new(root(), None);
        let request = explorer.start();
        explorer.complete(&request.ticket, Ok(listing("root", &[("sub", FOLDER_MIME_TYPE)], None)));

        let sub = explorer.folders()[0].as_folder();
        let pending = explorer.enter(sub);
        explorer.back();

        let outcome = explorer.complete(&pending.ticket, Ok(listing("sub", &[("x", "audio/mpeg")], None)));
        assert_eq!(outcome, Completion::Stale);
        assert_eq!(explorer.files().len(), 0);
        assert_eq!(explorer.folders().len(), 1);
    }

    #[test]
    fn test_jump_out_of_range() {
        let mut explorer = Explorer::new(root(), None);
        assert!(explorer.jump_to(3).is_none());
        assert_eq!(explorer.depth(), 1);
    }
}
