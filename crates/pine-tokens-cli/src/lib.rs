#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Command-line front end for the Pine design-token pipeline.
//!
//! Layout:
//! - `cli.rs`: argument parsing, configuration overlay, and command dispatch
//! - `output.rs`: JSON and plain-text renderers
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod output;

pub use cli::run;
