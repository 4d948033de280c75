// Incremental collections - paged folder listings that grow as the user asks
// for more, plus the two views built on top of them.

pub mod dashboard;
pub mod explorer;
pub mod store;

pub use dashboard::{Dashboard, RootsState};
pub use explorer::Explorer;
pub use store::{CollectionKey, CollectionStore, Completion, LoadState, PendingRequest, RequestTicket};
