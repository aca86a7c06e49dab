//! This crate exists to add a layer of indirection between our crates and
//! the `tracing` ecosystem, so the concrete tracing stack can be swapped
//! or pinned in one place rather than in every member crate.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub use tracing;
