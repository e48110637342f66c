//! Reference resolution for token values.
//!
//! # Design
//! - Resolution is pure: it reads an immutable [`TokenCollection`] and returns a
//!   string or a [`ResolveError`]; the only side effect is tracing.
//! - Chains are walked with an explicit stack so cycles report the full path and
//!   depth is bounded by configuration.
//! - CSS-variable rendering of a token's top-level value runs an ordered list of
//!   [`Strategy`] values; the first that produces output wins.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::composite::{PartResolver, format_composite, format_literal};
use crate::error::ResolveError;
use crate::math;
use crate::store::TokenCollection;
use crate::token::{ExpressionPart, Scalar, SetId, Token, TokenPath, TokenType, TokenValue, var_reference};

/// How references are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Follow every chain to its terminal literal.
    Literal,
    /// Keep indirection as `var(--prefix-path)`.
    CssVariable,
}

/// One step of the css-variable fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The raw value is a reference; emit `var()` for its target.
    StructuredReference,
    /// The literal equals the value of a token in a reference set.
    ValueMatch,
    /// The literal appears in the static known-value table.
    KnownValues,
    /// Emit the formatted literal.
    Passthrough,
}

/// Resolver settings derived from build configuration.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Variable prefix (`pine`).
    pub prefix: String,
    /// Maximum number of reference hops.
    pub max_depth: usize,
    /// Ordered fallback chain for css-variable rendering.
    pub strategies: Vec<Strategy>,
    /// Sets whose literals can be matched back into references.
    pub reference_sets: Vec<SetId>,
    /// Literal value to token path.
    pub known_values: BTreeMap<String, TokenPath>,
}

impl ResolverOptions {
    /// Options with the default chain: structured references, then pass-through.
    #[must_use]
    pub fn new(prefix: impl Into<String>, max_depth: usize) -> Self {
        Self {
            prefix: prefix.into(),
            max_depth,
            strategies: vec![Strategy::StructuredReference, Strategy::Passthrough],
            reference_sets: Vec::new(),
            known_values: BTreeMap::new(),
        }
    }

    /// Enable value inference against `reference_sets` and a known-value table.
    #[must_use]
    pub fn with_inference(
        mut self,
        reference_sets: Vec<SetId>,
        known_values: BTreeMap<String, TokenPath>,
    ) -> Self {
        self.strategies = vec![
            Strategy::StructuredReference,
            Strategy::ValueMatch,
            Strategy::KnownValues,
            Strategy::Passthrough,
        ];
        self.reference_sets = reference_sets;
        self.known_values = known_values;
        self
    }

    fn infers(&self) -> bool {
        self.strategies
            .iter()
            .any(|strategy| matches!(strategy, Strategy::ValueMatch | Strategy::KnownValues))
    }

    fn in_reference_set(&self, set: &SetId) -> bool {
        self.reference_sets
            .iter()
            .any(|reference| set.is_within(reference))
    }
}

/// Formatted literal values of reference-set tokens, first declaration wins.
#[derive(Debug, Clone, Default)]
pub struct ValueIndex {
    by_value: HashMap<String, TokenPath>,
}

impl ValueIndex {
    /// Index scalar tokens from the configured reference sets. Tokens that fail
    /// to resolve are left out.
    #[must_use]
    pub fn build(collection: &TokenCollection, options: &ResolverOptions) -> Self {
        let mut by_value = HashMap::new();
        for token in collection.iter() {
            if !options.in_reference_set(&token.source_set)
                || matches!(token.value, TokenValue::Composite(_) | TokenValue::List(_))
            {
                continue;
            }
            let mut walk = Walk::new(collection, options, ResolveMode::Literal, &token.path);
            match walk.value(&token.value, &token.kind) {
                Ok(value) => {
                    by_value.entry(value).or_insert_with(|| token.path.clone());
                }
                Err(err) => debug!(token = %token.path, error = %err, "skipping unindexable token"),
            }
        }
        Self { by_value }
    }

    /// Path of the token whose value is `literal`.
    #[must_use]
    pub fn lookup(&self, literal: &str) -> Option<&TokenPath> {
        self.by_value.get(literal)
    }

    /// Number of indexed values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_value.len()
    }

    /// Whether nothing was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_value.is_empty()
    }
}

/// Resolves tokens of one collection.
#[derive(Debug)]
pub struct ReferenceResolver<'a> {
    collection: &'a TokenCollection,
    options: &'a ResolverOptions,
    values: ValueIndex,
}

impl<'a> ReferenceResolver<'a> {
    /// Create a resolver; the value index is only built when value matching is enabled.
    #[must_use]
    pub fn new(collection: &'a TokenCollection, options: &'a ResolverOptions) -> Self {
        let values = if options.strategies.contains(&Strategy::ValueMatch) {
            ValueIndex::build(collection, options)
        } else {
            ValueIndex::default()
        };
        Self {
            collection,
            options,
            values,
        }
    }

    /// Collection being resolved.
    #[must_use]
    pub const fn collection(&self) -> &'a TokenCollection {
        self.collection
    }

    /// Resolve `token` to a CSS value string.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when a reference is missing, cyclic, or too deep.
    pub fn resolve(&self, token: &Token, mode: ResolveMode) -> Result<String, ResolveError> {
        let mut walk = Walk::new(self.collection, self.options, mode, &token.path);
        match (mode, &token.value) {
            (ResolveMode::CssVariable, TokenValue::Literal(_) | TokenValue::Reference(_)) => {
                self.fallback(token, &mut walk)
            }
            _ => walk.value(&token.value, &token.kind),
        }
    }

    fn fallback(&self, token: &Token, walk: &mut Walk<'_>) -> Result<String, ResolveError> {
        for strategy in &self.options.strategies {
            let rendered = match strategy {
                Strategy::StructuredReference => match &token.value {
                    TokenValue::Reference(_) => Some(walk.value(&token.value, &token.kind)?),
                    _ => None,
                },
                Strategy::ValueMatch => self.value_match(token),
                Strategy::KnownValues => self.known_value(token),
                Strategy::Passthrough => {
                    let mut literal =
                        Walk::new(self.collection, self.options, ResolveMode::Literal, &token.path);
                    let value = literal.value(&token.value, &token.kind)?;
                    if self.options.infers() && matches!(token.value, TokenValue::Literal(_)) {
                        warn!(
                            token = %token.path,
                            value = %value,
                            "no reference inferred; emitting literal"
                        );
                    }
                    Some(value)
                }
            };
            if let Some(rendered) = rendered {
                return Ok(rendered);
            }
        }
        walk.value(&token.value, &token.kind)
    }

    fn value_match(&self, token: &Token) -> Option<String> {
        let TokenValue::Literal(scalar) = &token.value else {
            return None;
        };
        if self.options.in_reference_set(&token.source_set) {
            return None;
        }
        let literal = format_literal(scalar, &token.kind);
        self.values
            .lookup(&literal)
            .filter(|path| **path != token.path)
            .map(|path| var_reference(&self.options.prefix, path))
    }

    fn known_value(&self, token: &Token) -> Option<String> {
        let TokenValue::Literal(scalar) = &token.value else {
            return None;
        };
        let raw = scalar.to_string();
        let formatted = format_literal(scalar, &token.kind);
        let path = self
            .options
            .known_values
            .get(&formatted)
            .or_else(|| self.options.known_values.get(&raw))?;
        if *path == token.path || self.collection.get(path).is_none() {
            return None;
        }
        Some(var_reference(&self.options.prefix, path))
    }
}

struct Walk<'r> {
    collection: &'r TokenCollection,
    prefix: &'r str,
    max_depth: usize,
    mode: ResolveMode,
    stack: Vec<TokenPath>,
}

impl<'r> Walk<'r> {
    fn new(
        collection: &'r TokenCollection,
        options: &'r ResolverOptions,
        mode: ResolveMode,
        origin: &TokenPath,
    ) -> Self {
        Self {
            collection,
            prefix: &options.prefix,
            max_depth: options.max_depth,
            mode,
            stack: vec![origin.clone()],
        }
    }

    fn value(&mut self, value: &TokenValue, hint: &TokenType) -> Result<String, ResolveError> {
        match value {
            TokenValue::Literal(scalar) => Ok(format_literal(scalar, hint)),
            TokenValue::Reference(target) => {
                let literal = self.follow(target, hint)?;
                match self.mode {
                    ResolveMode::Literal => Ok(literal),
                    ResolveMode::CssVariable => Ok(var_reference(self.prefix, target)),
                }
            }
            TokenValue::Expression(parts) => self.expression(parts, hint),
            TokenValue::Composite(fields) => {
                let origin = self.stack.last().cloned().unwrap_or_else(|| TokenPath::new(Vec::new()));
                format_composite(hint, fields, &origin, self)
            }
            TokenValue::List(items) => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    rendered.push(self.value(item, hint)?);
                }
                Ok(rendered.join(", "))
            }
        }
    }

    fn expression(&mut self, parts: &[ExpressionPart], hint: &TokenType) -> Result<String, ResolveError> {
        let mut text = String::new();
        for part in parts {
            match part {
                ExpressionPart::Text(chunk) => text.push_str(chunk),
                ExpressionPart::Reference(target) => text.push_str(&self.follow(target, hint)?),
            }
        }
        let folded = math::fold(&text).unwrap_or(text);
        Ok(format_literal(&Scalar::Text(folded), hint))
    }

    /// Resolve `target` to its terminal literal, checking cycles and depth.
    fn follow(&mut self, target: &TokenPath, hint: &TokenType) -> Result<String, ResolveError> {
        if self.stack.contains(target) {
            let mut chain = self.stack.clone();
            chain.push(target.clone());
            return Err(ResolveError::CyclicReference { chain });
        }
        if self.stack.len() > self.max_depth {
            let mut chain = self.stack.clone();
            chain.push(target.clone());
            return Err(ResolveError::DepthExceeded {
                chain,
                limit: self.max_depth,
            });
        }
        let Some(token) = self.collection.get(target) else {
            return Err(ResolveError::UnresolvedReference {
                reference: target.clone(),
                referenced_by: self.stack.last().cloned().unwrap_or_else(|| target.clone()),
            });
        };

        let kind = match &token.kind {
            TokenType::Other(_) => hint.clone(),
            kind => kind.clone(),
        };
        let mode = self.mode;
        self.mode = ResolveMode::Literal;
        self.stack.push(target.clone());
        let resolved = self.value(&token.value, &kind);
        self.stack.pop();
        self.mode = mode;
        resolved
    }
}

impl PartResolver for Walk<'_> {
    fn part(
        &mut self,
        value: &TokenValue,
        hint: &TokenType,
        literal_only: bool,
    ) -> Result<String, ResolveError> {
        if !literal_only {
            return self.value(value, hint);
        }
        let mode = self.mode;
        self.mode = ResolveMode::Literal;
        let rendered = self.value(value, hint);
        self.mode = mode;
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{TokenSet, parse_token_set};
    use crate::token::ReferenceSyntax;
    use std::error::Error;
    use std::path::Path;

    type TestResult = std::result::Result<(), Box<dyn Error>>;

    fn set(id: &str, raw: &str) -> std::result::Result<TokenSet, Box<dyn Error>> {
        let syntax = ReferenceSyntax::new()?;
        Ok(parse_token_set(SetId::new(id), Path::new("test.json"), raw, &syntax)?)
    }

    fn core() -> std::result::Result<TokenCollection, Box<dyn Error>> {
        let core = set(
            "core/light",
            r##"{
                "color": {
                    "grey": { "300": { "value": "#CCC", "type": "color" } },
                    "black": { "value": "#000000", "type": "color" },
                    "text": { "value": "{color.grey.300}", "type": "color" },
                    "shade": { "value": "rgba({color.black}, 0.5)", "type": "color" }
                },
                "space": {
                    "2": { "value": 8, "type": "spacing" },
                    "4": { "value": "{space.2} * 2", "type": "spacing" }
                },
                "border-width": { "thin": { "value": "1", "type": "borderWidth" } },
                "stroke": { "solid": { "value": "solid", "type": "other" } },
                "card": {
                    "border": {
                        "value": { "width": "{border-width.thin}", "style": "{stroke.solid}", "color": "{color.grey.300}" },
                        "type": "border"
                    }
                }
            }"##,
        )?;
        Ok(TokenCollection::merge([&core]))
    }

    fn token<'c>(collection: &'c TokenCollection, path: &str) -> std::result::Result<&'c Token, Box<dyn Error>> {
        Ok(collection
            .get(&TokenPath::parse(path))
            .ok_or_else(|| format!("missing token {path}"))?)
    }

    #[test]
    fn literal_mode_follows_chains_and_formats_terminals() -> TestResult {
        let collection = core()?;
        let options = ResolverOptions::new("pine", 32);
        let resolver = ReferenceResolver::new(&collection, &options);

        let text = token(&collection, "color.text")?;
        assert_eq!(resolver.resolve(text, ResolveMode::Literal)?, "#cccccc");
        let space = token(&collection, "space.4")?;
        assert_eq!(resolver.resolve(space, ResolveMode::Literal)?, "16px");
        let shade = token(&collection, "color.shade")?;
        assert_eq!(resolver.resolve(shade, ResolveMode::Literal)?, "#00000080");
        Ok(())
    }

    #[test]
    fn css_variable_mode_preserves_indirection() -> TestResult {
        let collection = core()?;
        let options = ResolverOptions::new("pine", 32);
        let resolver = ReferenceResolver::new(&collection, &options);

        let text = token(&collection, "color.text")?;
        assert_eq!(
            resolver.resolve(text, ResolveMode::CssVariable)?,
            "var(--pine-color-grey-300)"
        );
        let grey = token(&collection, "color.grey.300")?;
        assert_eq!(resolver.resolve(grey, ResolveMode::CssVariable)?, "#cccccc");
        let border = token(&collection, "card.border")?;
        assert_eq!(
            resolver.resolve(border, ResolveMode::CssVariable)?,
            "var(--pine-border-width-thin) solid var(--pine-color-grey-300)"
        );
        assert_eq!(
            resolver.resolve(border, ResolveMode::Literal)?,
            "1px solid #cccccc"
        );
        Ok(())
    }

    #[test]
    fn unresolved_reference_names_target_and_origin() -> TestResult {
        let broken = set(
            "semantic/light",
            r#"{ "button": { "bg": { "value": "{color.missing}", "type": "color" } } }"#,
        )?;
        let collection = TokenCollection::merge([&broken]);
        let options = ResolverOptions::new("pine", 32);
        let resolver = ReferenceResolver::new(&collection, &options);

        let err = resolver
            .resolve(token(&collection, "button.bg")?, ResolveMode::CssVariable)
            .err()
            .ok_or("expected failure")?;
        assert_eq!(
            err,
            ResolveError::UnresolvedReference {
                reference: TokenPath::parse("color.missing"),
                referenced_by: TokenPath::parse("button.bg"),
            }
        );
        Ok(())
    }

    #[test]
    fn cycles_report_the_full_chain() -> TestResult {
        let cyclic = set(
            "core/light",
            r#"{
                "a": { "value": "{b}", "type": "color" },
                "b": { "value": "{c}", "type": "color" },
                "c": { "value": "{a}", "type": "color" }
            }"#,
        )?;
        let collection = TokenCollection::merge([&cyclic]);
        let options = ResolverOptions::new("pine", 32);
        let resolver = ReferenceResolver::new(&collection, &options);

        let err = resolver
            .resolve(token(&collection, "a")?, ResolveMode::Literal)
            .err()
            .ok_or("expected failure")?;
        let chain = match err {
            ResolveError::CyclicReference { chain } => chain,
            other => return Err(format!("unexpected error {other:?}").into()),
        };
        let dotted: Vec<String> = chain.iter().map(TokenPath::dotted).collect();
        assert_eq!(dotted, vec!["a", "b", "c", "a"]);
        Ok(())
    }

    #[test]
    fn depth_limit_is_enforced() -> TestResult {
        let chain = set(
            "core/light",
            r##"{
                "a": { "value": "{b}", "type": "color" },
                "b": { "value": "{c}", "type": "color" },
                "c": { "value": "#fff", "type": "color" }
            }"##,
        )?;
        let collection = TokenCollection::merge([&chain]);
        let shallow = ResolverOptions::new("pine", 1);
        let resolver = ReferenceResolver::new(&collection, &shallow);
        assert!(matches!(
            resolver.resolve(token(&collection, "a")?, ResolveMode::Literal),
            Err(ResolveError::DepthExceeded { limit: 1, .. })
        ));

        let deep = ResolverOptions::new("pine", 2);
        let resolver = ReferenceResolver::new(&collection, &deep);
        assert_eq!(
            resolver.resolve(token(&collection, "a")?, ResolveMode::Literal)?,
            "#ffffff"
        );
        Ok(())
    }

    #[test]
    fn inference_matches_reference_set_values_and_known_table() -> TestResult {
        let core = set(
            "core/light",
            r##"{
                "color": { "white": { "value": "#FFFFFF", "type": "color" } },
                "space": { "2": { "value": "8px", "type": "spacing" } }
            }"##,
        )?;
        let semantic = set(
            "semantic/light",
            r##"{
                "surface": { "value": "#fff", "type": "color" },
                "gap": { "value": "8", "type": "spacing" },
                "radius": { "value": "4px", "type": "borderRadius" },
                "odd": { "value": "#123456", "type": "color" }
            }"##,
        )?;
        let collection = TokenCollection::merge([&core, &semantic]);
        let mut known = BTreeMap::new();
        known.insert("4px".to_string(), TokenPath::parse("space.2"));
        let options = ResolverOptions::new("pine", 32)
            .with_inference(vec![SetId::new("core/light")], known);
        let resolver = ReferenceResolver::new(&collection, &options);

        assert_eq!(
            resolver.resolve(token(&collection, "surface")?, ResolveMode::CssVariable)?,
            "var(--pine-color-white)"
        );
        assert_eq!(
            resolver.resolve(token(&collection, "gap")?, ResolveMode::CssVariable)?,
            "var(--pine-space-2)"
        );
        assert_eq!(
            resolver.resolve(token(&collection, "radius")?, ResolveMode::CssVariable)?,
            "var(--pine-space-2)"
        );
        assert_eq!(
            resolver.resolve(token(&collection, "odd")?, ResolveMode::CssVariable)?,
            "#123456"
        );
        assert_eq!(
            resolver.resolve(token(&collection, "color.white")?, ResolveMode::CssVariable)?,
            "#ffffff"
        );
        Ok(())
    }

    #[test]
    fn lists_join_with_commas() -> TestResult {
        let shadows = set(
            "core/light",
            r##"{
                "elevation": {
                    "value": [
                        { "x": 0, "y": 1, "blur": 2, "spread": 0, "color": "#0000001a" },
                        { "x": 0, "y": 4, "blur": 8, "spread": 0, "color": "#0000001a", "type": "innerShadow" }
                    ],
                    "type": "boxShadow"
                }
            }"##,
        )?;
        let collection = TokenCollection::merge([&shadows]);
        let options = ResolverOptions::new("pine", 32);
        let resolver = ReferenceResolver::new(&collection, &options);
        assert_eq!(
            resolver.resolve(token(&collection, "elevation")?, ResolveMode::CssVariable)?,
            "0px 1px 2px 0px #0000001a, inset 0px 4px 8px 0px #0000001a"
        );
        Ok(())
    }
}
