//! Demand paging of LOD children: selection, load requests, background loading and expiry

pub mod slot;
pub mod priority;
pub mod lod;
pub mod source;
pub mod config;
pub mod expiry;
pub mod pager;

pub use slot::{PageInfo, RangeEntry, Slot};
pub use priority::{LoadQueue, LoadRequest, LoadRequestHandler, load_priority};
pub use lod::{CenterMode, PagedLod, PendingLoad, Selection};
pub use source::{MemorySource, NodeSource};
pub use config::PagerConfig;
pub use expiry::ExpiryRegistry;
pub use pager::{DatabasePager, LoadResult, PagerStats};
