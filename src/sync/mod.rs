//! Client-side incremental synchronization.
//!
//! Keeps a locally materialized, paginated view of one server collection,
//! decides when to fetch more and when items count as read, and runs the
//! change-suppressing sidebar poll. Nothing in here performs network I/O; the
//! UI executes the requests the engine hands out and reports the results.

pub mod engine;
pub mod item;
pub mod materializer;
pub mod pager;
pub mod poll;
pub mod read_marker;
pub mod session;
pub mod snapshot;
pub mod view;

pub use engine::{CommitFollowUp, LoadMore, Navigation, SyncEngine, SyncSettings};
pub use item::{CollectionKind, DigestSource, Item, ItemId, ItemPayload};
pub use pager::{PageOutcome, PageRequest, PagerSettings};
pub use poll::{PauseReason, PollLoop, PollState, PollTick, RefreshTicket, SnapshotOutcome};
pub use read_marker::{ItemRegion, ReadMarker, ReadTicket, ReadZone};
pub use session::{SessionId, ViewSession};
pub use snapshot::{CategoryNode, FeedInfo, FeedNode, SidebarSnapshot};
pub use view::{ReadFilter, Scope, ViewPathError, ViewSelection, ViewSelector};
