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

//! Design-token pipeline: loads Tokens Studio JSON, resolves themes and references,
//! and emits CSS custom property files split by brand and light/dark mode.
//!
//! # Design
//! - Pure library surface ([`build`], [`plan`], [`Workspace`]) used by the thin CLI.
//! - All IO is rooted at the configured token root and output directory.
//! - Output is deterministic: same inputs, byte-identical files.

pub mod composite;
pub mod config;
pub mod emit;
pub mod error;
pub mod math;
pub mod pipeline;
pub mod plan;
pub mod resolve;
pub mod store;
pub mod themes;
pub mod token;

pub use config::BuildConfig;
pub use emit::{BlockLayout, Declaration, GENERATED_HEADER, merge_rendered, render};
pub use error::{
    BuildError, ConfigError, OutputError, ResolveError, Result, TargetError, ThemeError,
    TokenError,
};
pub use pipeline::{BuildReport, TargetReport, TargetStatus, Workspace, build, plan};
pub use plan::{Category, OutputTarget, Pass, Selection};
pub use resolve::{ReferenceResolver, ResolveMode, ResolverOptions, Strategy};
pub use store::{SetInventory, SourceCache, TokenCollection, TokenSet};
pub use themes::{
    Brand, Classification, Mode, ResolvedThemes, SkippedPermutation, Theme, ThemeKey,
    ThemeManifest, ThemeResolver, ThemeableIndex,
};
pub use token::{SetId, Token, TokenPath, TokenType, TokenValue};
