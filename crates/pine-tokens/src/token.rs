//! Token data model: paths, set identifiers, types, and raw values.
//!
//! # Design
//! - Tokens are immutable once parsed; derived metadata (themeable) lives in
//!   separate indexes rather than on the token.
//! - Reference syntax is parsed once at load time so resolution never needs to
//!   re-scan strings.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::TokenError;

const WHOLE_REFERENCE: &str = r"^\{([^{}]+)\}$";
const EMBEDDED_REFERENCE: &str = r"\{([^{}]+)\}";

/// Hierarchical token address such as `color.grey.900`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenPath(Vec<String>);

impl TokenPath {
    /// Build a path from owned segments.
    #[must_use]
    pub const fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Parse a dotted path (`color.grey.900`).
    #[must_use]
    pub fn parse(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .map(|segment| segment.trim().to_string())
                .collect(),
        )
    }

    /// Path segments in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Return a new path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    /// Dotted representation used in diagnostics and reference syntax.
    #[must_use]
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }

    /// Sanitised, hyphen-joined variable name (without prefix).
    #[must_use]
    pub fn variable_name(&self) -> String {
        sanitize_name(&self.0.join("-"))
    }
}

impl Display for TokenPath {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.dotted())
    }
}

impl Serialize for TokenPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.dotted())
    }
}

/// Reduce a raw name to `[A-Za-z0-9-]`, collapsing and trimming hyphens.
#[must_use]
pub fn sanitize_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut prev_dash = true;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch);
            prev_dash = false;
        } else if !prev_dash {
            name.push('-');
            prev_dash = true;
        }
    }
    if name.ends_with('-') {
        name.pop();
    }
    name
}

/// Custom property name, e.g. `--pine-color-grey-900`.
#[must_use]
pub fn css_variable(prefix: &str, path: &TokenPath) -> String {
    format!("--{prefix}-{}", path.variable_name())
}

/// Custom property reference, e.g. `var(--pine-color-grey-900)`.
#[must_use]
pub fn var_reference(prefix: &str, path: &TokenPath) -> String {
    format!("var({})", css_variable(prefix, path))
}

/// Token-set identifier: the JSON file path relative to the token root without
/// the `.json` suffix (`components/button/light`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SetId(String);

impl SetId {
    /// Wrap a set identifier, normalising separators.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into().replace('\\', "/");
        Self(raw.trim_matches('/').to_string())
    }

    /// Identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `/`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// First segment (the category directory, e.g. `core`).
    #[must_use]
    pub fn first_segment(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// Last segment (the file stem).
    #[must_use]
    pub fn last_segment(&self) -> &str {
        self.segments().last().unwrap_or_default()
    }

    /// Whether any segment equals `segment` exactly.
    #[must_use]
    pub fn has_segment(&self, segment: &str) -> bool {
        self.segments().any(|candidate| candidate == segment)
    }

    /// Whether this set equals `other` or lives underneath it.
    #[must_use]
    pub fn is_within(&self, other: &Self) -> bool {
        self.0 == other.0
            || self
                .0
                .strip_prefix(other.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Dark sets carry a `dark` segment (`core/dark`, `components/x/dark`).
    #[must_use]
    pub fn is_dark(&self) -> bool {
        self.has_segment("dark")
    }
}

impl Display for SetId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for SetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Recognised token types. Aliases used by Tokens Studio collapse onto one variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// Colors (`color`).
    Color,
    /// Lengths that take a `px` suffix when unitless.
    Dimension,
    /// Font family names.
    FontFamily,
    /// Font weights (unitless).
    FontWeight,
    /// Line heights (unitless ratios or explicit units).
    LineHeight,
    /// Composite typography.
    Typography,
    /// Composite border shorthand.
    Border,
    /// Composite outline shorthand.
    Outline,
    /// Composite box shadow.
    Shadow,
    /// Anything else, kept verbatim.
    Other(String),
}

impl TokenType {
    /// Map a raw `type` string onto a variant.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "color" => Self::Color,
            "dimension" | "spacing" | "sizing" | "borderRadius" | "borderWidth" | "fontSizes"
            | "fontSize" | "letterSpacing" | "paragraphSpacing" => Self::Dimension,
            "fontFamilies" | "fontFamily" => Self::FontFamily,
            "fontWeights" | "fontWeight" => Self::FontWeight,
            "lineHeights" | "lineHeight" => Self::LineHeight,
            "typography" => Self::Typography,
            "border" => Self::Border,
            "outline" => Self::Outline,
            "boxShadow" | "shadow" => Self::Shadow,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether this type names a composite shape.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(
            self,
            Self::Typography | Self::Border | Self::Outline | Self::Shadow
        )
    }
}

/// Literal scalar carried by a token or composite field.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// String literal.
    Text(String),
    /// JSON number, kept in its source representation.
    Number(serde_json::Number),
    /// Boolean literal.
    Bool(bool),
}

impl Display for Scalar {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => formatter.write_str(text),
            Self::Number(number) => write!(formatter, "{number}"),
            Self::Bool(flag) => write!(formatter, "{flag}"),
        }
    }
}

/// Piece of a string expression with embedded references.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionPart {
    /// Verbatim text between references.
    Text(String),
    /// Embedded `{path}` reference.
    Reference(TokenPath),
}

/// Raw token value as authored.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    /// Literal scalar.
    Literal(Scalar),
    /// Whole-value reference (`{color.grey.900}`).
    Reference(TokenPath),
    /// String mixing text and references (`{space.2} * 2`).
    Expression(Vec<ExpressionPart>),
    /// Composite object keyed by sub-property.
    Composite(IndexMap<String, TokenValue>),
    /// Ordered list (multiple shadows, font stacks).
    List(Vec<TokenValue>),
}

impl TokenValue {
    /// Every path referenced by this value, including nested composite fields.
    #[must_use]
    pub fn references(&self) -> Vec<&TokenPath> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a TokenPath>) {
        match self {
            Self::Literal(_) => {}
            Self::Reference(path) => found.push(path),
            Self::Expression(parts) => {
                for part in parts {
                    if let ExpressionPart::Reference(path) = part {
                        found.push(path);
                    }
                }
            }
            Self::Composite(fields) => {
                for value in fields.values() {
                    value.collect_references(found);
                }
            }
            Self::List(items) => {
                for item in items {
                    item.collect_references(found);
                }
            }
        }
    }
}

/// A single design token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Hierarchical address.
    pub path: TokenPath,
    /// Declared type.
    pub kind: TokenType,
    /// Raw value.
    pub value: TokenValue,
    /// Set the token was loaded from.
    pub source_set: SetId,
    /// Optional authoring description.
    pub description: Option<String>,
}

/// Compiled reference syntax shared by the loader.
#[derive(Debug, Clone)]
pub struct ReferenceSyntax {
    whole: Regex,
    embedded: Regex,
}

impl ReferenceSyntax {
    /// Compile the reference patterns.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::RegexCompile`] if a pattern fails to compile.
    pub fn new() -> Result<Self, TokenError> {
        let whole = Regex::new(WHOLE_REFERENCE).map_err(|source| TokenError::RegexCompile {
            pattern: WHOLE_REFERENCE,
            source,
        })?;
        let embedded =
            Regex::new(EMBEDDED_REFERENCE).map_err(|source| TokenError::RegexCompile {
                pattern: EMBEDDED_REFERENCE,
                source,
            })?;
        Ok(Self { whole, embedded })
    }

    /// Classify a raw string as reference, expression, or literal.
    #[must_use]
    pub fn parse_str(&self, raw: &str) -> TokenValue {
        let trimmed = raw.trim();
        if let Some(caps) = self.whole.captures(trimmed) {
            return TokenValue::Reference(TokenPath::parse(&caps[1]));
        }
        if !self.embedded.is_match(raw) {
            return TokenValue::Literal(Scalar::Text(raw.to_string()));
        }

        let mut parts = Vec::new();
        let mut cursor = 0;
        for caps in self.embedded.captures_iter(raw) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.start() > cursor {
                parts.push(ExpressionPart::Text(raw[cursor..whole.start()].to_string()));
            }
            parts.push(ExpressionPart::Reference(TokenPath::parse(&caps[1])));
            cursor = whole.end();
        }
        if cursor < raw.len() {
            parts.push(ExpressionPart::Text(raw[cursor..].to_string()));
        }
        TokenValue::Expression(parts)
    }
}
