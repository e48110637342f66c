//! Error types for token loading, theme resolution, reference resolution, and output.
//!
//! Structural input problems ([`TokenError`], [`ThemeError`], [`ConfigError`]) abort the
//! whole build. [`ResolveError`] and [`OutputError`] are scoped to one output target.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::token::TokenPath;

/// Errors raised while reading and parsing token JSON.
#[derive(Debug, Error)]
pub enum TokenError {
    /// A token file could not be read.
    #[error("failed to read token file {}", path.display())]
    ReadFile {
        /// Token file path.
        path: PathBuf,
        /// IO error.
        source: io::Error,
    },
    /// A token file is not valid JSON.
    #[error("token file {} is not valid JSON", path.display())]
    InvalidJson {
        /// Token file path.
        path: PathBuf,
        /// JSON parse error.
        source: serde_json::Error,
    },
    /// A token file parsed but does not follow the token shape.
    #[error("malformed token file {} at '{location}': {reason}", path.display())]
    MalformedTokenFile {
        /// Token file path.
        path: PathBuf,
        /// Dotted location of the offending node.
        location: String,
        /// Human-readable reason.
        reason: String,
    },
    /// A regex failed to compile.
    #[error("failed to compile regex '{pattern}'")]
    RegexCompile {
        /// Regex pattern.
        pattern: &'static str,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// Walking the token root failed.
    #[error("failed to scan token root {}: {message}", path.display())]
    Scan {
        /// Directory being scanned.
        path: PathBuf,
        /// Error message from directory traversal.
        message: String,
    },
    /// The token root does not exist.
    #[error("token root missing: {}", path.display())]
    RootMissing {
        /// Missing token root.
        path: PathBuf,
    },
}

/// Errors raised while reading or interpreting the theme manifest.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// The manifest could not be read.
    #[error("failed to read theme manifest {}", path.display())]
    Read {
        /// Manifest path.
        path: PathBuf,
        /// IO error.
        source: io::Error,
    },
    /// The manifest is not valid JSON or does not match the theme entry shape.
    #[error("failed to parse theme manifest {}", path.display())]
    Parse {
        /// Manifest path.
        path: PathBuf,
        /// JSON error.
        source: serde_json::Error,
    },
    /// The manifest parsed but cannot be permutated.
    #[error("invalid theme manifest: {detail}")]
    Invalid {
        /// Description of the problem.
        detail: String,
    },
}

/// Errors raised while resolving token references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A reference points at a path missing from the active collection.
    #[error("unresolved reference {{{reference}}} in token '{referenced_by}'")]
    UnresolvedReference {
        /// Missing target path.
        reference: TokenPath,
        /// Token whose value holds the reference.
        referenced_by: TokenPath,
    },
    /// A reference chain revisits a path.
    #[error("cyclic reference: {}", format_chain(chain))]
    CyclicReference {
        /// Full chain, ending with the revisited path.
        chain: Vec<TokenPath>,
    },
    /// A reference chain is longer than the configured bound.
    #[error("reference chain exceeds {limit} hops: {}", format_chain(chain))]
    DepthExceeded {
        /// Chain walked so far.
        chain: Vec<TokenPath>,
        /// Configured maximum.
        limit: usize,
    },
}

fn format_chain(chain: &[TokenPath]) -> String {
    chain
        .iter()
        .map(TokenPath::dotted)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised while writing or merging generated files.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Failed to create an output directory.
    #[error("failed to create output directory {}", path.display())]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// IO error.
        source: io::Error,
    },
    /// Failed to write an output file.
    #[error("failed to write output file {}", path.display())]
    Write {
        /// Output path.
        path: PathBuf,
        /// IO error.
        source: io::Error,
    },
    /// Reading, writing, or cleaning up during a light/dark merge failed.
    #[error("failed to merge {} into {}", secondary.display(), primary.display())]
    MergeIo {
        /// File receiving the merged content.
        primary: PathBuf,
        /// File folded into the primary.
        secondary: PathBuf,
        /// IO error.
        source: io::Error,
    },
}

/// Errors raised while loading or validating build configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {}", path.display())]
    Read {
        /// Configuration path.
        path: PathBuf,
        /// IO error.
        source: io::Error,
    },
    /// The configuration file is not valid JSON for [`crate::BuildConfig`].
    #[error("failed to parse configuration {}", path.display())]
    Parse {
        /// Configuration path.
        path: PathBuf,
        /// JSON error.
        source: serde_json::Error,
    },
    /// A field contained an invalid value.
    #[error("invalid value for '{field}': {message}")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Human-readable error description.
        message: String,
    },
}

/// Errors for one output target. Other targets keep building.
#[derive(Debug, Error)]
pub enum TargetError {
    /// A token in the target could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// A token set needed by the target could not be loaded.
    #[error(transparent)]
    Token(#[from] TokenError),
    /// Writing the target output failed.
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Fatal build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Token input could not be loaded.
    #[error(transparent)]
    Token(#[from] TokenError),
    /// The theme manifest could not be used.
    #[error(transparent)]
    Theme(#[from] ThemeError),
    /// The output root could not be prepared.
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Result alias for fatal build operations.
pub type Result<T> = std::result::Result<T, BuildError>;
