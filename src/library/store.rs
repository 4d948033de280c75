use crate::drive::{FileEntry, ListingPage};
use crate::error::ListingError;
use tracing::{debug, warn};

/// What a collection is for: a folder plus the remote name filter, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    pub container_id: String,
    pub filter: Option<String>,
}

impl CollectionKey {
    pub fn folder(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            filter: None,
        }
    }

    /// Whitespace-only filters mean no filter; anything else is sent as typed.
    pub fn filtered(container_id: impl Into<String>, filter: &str) -> Self {
        Self {
            container_id: container_id.into(),
            filter: (!filter.trim().is_empty()).then(|| filter.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    /// At least one more page is available.
    Loaded,
    Exhausted,
    Error(String),
}

/// Identifies one in-flight request. A result is only applied if its ticket
/// still matches the store it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub key: CollectionKey,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub ticket: RequestTicket,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Appended { added: usize },
    /// The ticket was superseded; nothing changed.
    Stale,
    Failed(ListingError),
}

/// Paginated entries for one key, filled incrementally.
#[derive(Debug)]
pub struct CollectionStore {
    key: Option<CollectionKey>,
    entries: Vec<FileEntry>,
    cursor: Option<String>,
    state: LoadState,
    generation: u64,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self {
            key: None,
            entries: Vec::new(),
            cursor: None,
            state: LoadState::Idle,
            generation: 0,
        }
    }

    /// Start over for `key` - previous entries are discarded and any in-flight
    /// request becomes stale.
    pub fn open(&mut self, key: CollectionKey) -> PendingRequest {
        debug!(container = %key.container_id, filter = ?key.filter, "Opening collection");
        self.key = Some(key.clone());
        self.entries.clear();
        self.cursor = None;
        self.issue(key, None)
    }

    /// Next page, if there is one and nothing is in flight.
    pub fn load_more(&mut self) -> Option<PendingRequest> {
        if self.state != LoadState::Loaded {
            return None;
        }
        let key = self.key.clone()?;
        let token = self.cursor.clone()?;
        Some(self.issue(key, Some(token)))
    }

    /// Re-issue the request that failed.
    pub fn retry(&mut self) -> Option<PendingRequest> {
        if !matches!(self.state, LoadState::Error(_)) {
            return None;
        }
        let key = self.key.clone()?;
        let token = self.cursor.clone();
        Some(self.issue(key, token))
    }

    /// Forget any in-flight request without touching loaded entries.
    pub fn cancel(&mut self) {
        if self.state == LoadState::Loading {
            self.generation += 1;
            self.state = if self.entries.is_empty() && self.cursor.is_none() {
                LoadState::Idle
            } else if self.cursor.is_some() {
                LoadState::Loaded
            } else {
                LoadState::Exhausted
            };
        }
    }

    pub fn accepts(&self, ticket: &RequestTicket) -> bool {
        self.state == LoadState::Loading
            && ticket.generation == self.generation
            && self.key.as_ref() == Some(&ticket.key)
    }

    pub fn complete(
        &mut self,
        ticket: &RequestTicket,
        result: Result<ListingPage, ListingError>,
    ) -> Completion {
        if !self.accepts(ticket) {
            debug!(container = %ticket.key.container_id, "Dropping stale listing result");
            return Completion::Stale;
        }

        match result {
            Ok(page) => {
                let added = page.entries.len();
                self.entries.extend(page.entries);
                self.cursor = page.next_page_token;
                self.state = if self.cursor.is_some() {
                    LoadState::Loaded
                } else {
                    LoadState::Exhausted
                };
                Completion::Appended { added }
            }
            Err(err) => {
                warn!(container = %ticket.key.container_id, error = %err, "Listing failed");
                self.state = LoadState::Error(err.to_string());
                Completion::Failed(err)
            }
        }
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn key(&self) -> Option<&CollectionKey> {
        self.key.as_ref()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn has_more(&self) -> bool {
        self.state == LoadState::Loaded
    }

    fn issue(&mut self, key: CollectionKey, page_token: Option<String>) -> PendingRequest {
        self.generation += 1;
        self.state = LoadState::Loading;
        PendingRequest {
            ticket: RequestTicket {
                key,
                generation: self.generation,
            },
            page_token,
        }
    }
}

impl Default for CollectionStore {
    fn default() -> Self {
        Self::new()
    }
}
