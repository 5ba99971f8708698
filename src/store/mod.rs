//! Record store backends.
//!
//! Both implement [`RecordStore`](crate::traits::RecordStore):
//!
//! | Backend | Purpose |
//! |---------|---------|
//! | [`notion::NotionStore`] | Notion database over the REST API |
//! | [`memory::InMemoryRecordStore`] | Tests and dry runs |

pub mod memory;
pub mod notion;
