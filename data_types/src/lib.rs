//! Shared value types for the chunk index: instants, label sets, and the
//! entries/queries exchanged with the external index store.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

mod index;
mod labels;
mod timestamp;

pub use index::{IndexEntry, IndexQuery};
pub use labels::{Labels, METRIC_NAME_LABEL};
pub use timestamp::Time;
