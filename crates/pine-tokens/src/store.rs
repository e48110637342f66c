//! Token store: parses token JSON, scans the set inventory, and merges sets into
//! path-addressed collections.
//!
//! # Design
//! - A [`SourceCache`] is scoped to one build and shared by reference; every set
//!   file is read and parsed at most once.
//! - Merging is left-to-right; a later set replaces the whole token but keeps the
//!   position where the path was first declared, so output order is stable.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::TokenError;
use crate::token::{ReferenceSyntax, Scalar, SetId, Token, TokenPath, TokenType, TokenValue};

/// Tokens parsed from one JSON file.
#[derive(Debug, Clone)]
pub struct TokenSet {
    /// Set identifier.
    pub id: SetId,
    /// File the set was loaded from.
    pub file: PathBuf,
    /// Tokens in declaration order.
    pub tokens: Vec<Token>,
}

/// Parse a token document into a [`TokenSet`].
///
/// # Errors
///
/// Returns [`TokenError::InvalidJson`] when `raw` is not JSON and
/// [`TokenError::MalformedTokenFile`] when the document does not follow the token shape.
pub fn parse_token_set(
    id: SetId,
    file: &Path,
    raw: &str,
    syntax: &ReferenceSyntax,
) -> Result<TokenSet, TokenError> {
    let document: Value = serde_json::from_str(raw).map_err(|source| TokenError::InvalidJson {
        path: file.to_path_buf(),
        source,
    })?;
    let Value::Object(root) = document else {
        return Err(malformed(file, "<root>", "document must be a JSON object"));
    };

    let mut parser = DocumentParser {
        id: &id,
        file,
        syntax,
        tokens: Vec::new(),
    };
    parser.walk_group(&TokenPath::new(Vec::new()), &root)?;
    let tokens = parser.tokens;
    Ok(TokenSet {
        id,
        file: file.to_path_buf(),
        tokens,
    })
}

struct DocumentParser<'a> {
    id: &'a SetId,
    file: &'a Path,
    syntax: &'a ReferenceSyntax,
    tokens: Vec<Token>,
}

impl DocumentParser<'_> {
    fn walk_group(&mut self, path: &TokenPath, group: &Map<String, Value>) -> Result<(), TokenError> {
        for (key, node) in group {
            if key.starts_with('$') {
                continue;
            }
            let child = path.child(key);
            match node {
                Value::Object(object) if is_leaf(object) => self.push_leaf(&child, object)?,
                Value::Object(object) => self.walk_group(&child, object)?,
                _ => {
                    return Err(malformed(
                        self.file,
                        &child.dotted(),
                        "group members must be objects",
                    ));
                }
            }
        }
        Ok(())
    }

    fn push_leaf(&mut self, path: &TokenPath, leaf: &Map<String, Value>) -> Result<(), TokenError> {
        let location = path.dotted();
        let raw_value = leaf
            .get("value")
            .or_else(|| leaf.get("$value"))
            .ok_or_else(|| malformed(self.file, &location, "leaf is missing 'value'"))?;
        let raw_type = leaf
            .get("type")
            .or_else(|| leaf.get("$type"))
            .ok_or_else(|| malformed(self.file, &location, "leaf is missing 'type'"))?
            .as_str()
            .ok_or_else(|| malformed(self.file, &location, "'type' must be a string"))?;
        let description = leaf
            .get("description")
            .or_else(|| leaf.get("$description"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let value = self.parse_value(raw_value, &location)?;
        self.tokens.push(Token {
            path: path.clone(),
            kind: TokenType::from_raw(raw_type),
            value,
            source_set: self.id.clone(),
            description,
        });
        Ok(())
    }

    fn parse_value(&self, raw: &Value, location: &str) -> Result<TokenValue, TokenError> {
        match raw {
            Value::String(text) => Ok(self.syntax.parse_str(text)),
            Value::Number(number) => Ok(TokenValue::Literal(Scalar::Number(number.clone()))),
            Value::Bool(flag) => Ok(TokenValue::Literal(Scalar::Bool(*flag))),
            Value::Object(fields) => {
                let mut parsed = IndexMap::with_capacity(fields.len());
                for (key, field) in fields {
                    let nested = format!("{location}.{key}");
                    parsed.insert(key.clone(), self.parse_value(field, &nested)?);
                }
                Ok(TokenValue::Composite(parsed))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| self.parse_value(item, &format!("{location}[{index}]")))
                .collect::<Result<Vec<_>, _>>()
                .map(TokenValue::List),
            Value::Null => Err(malformed(self.file, location, "value must not be null")),
        }
    }
}

fn is_leaf(object: &Map<String, Value>) -> bool {
    object.contains_key("value") || object.contains_key("$value")
}

fn malformed(file: &Path, location: &str, reason: &str) -> TokenError {
    TokenError::MalformedTokenFile {
        path: file.to_path_buf(),
        location: location.to_string(),
        reason: reason.to_string(),
    }
}

/// Set ids discovered under the token root, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetInventory {
    sets: Vec<SetId>,
}

impl SetInventory {
    /// Walk `root` for `*.json` token files. Files whose name starts with `$`
    /// (`$themes.json`, `$metadata.json`) are manifests, not token sets.
    ///
    /// # Errors
    ///
    /// Returns an error when the root is missing or cannot be traversed.
    pub fn scan(root: &Path) -> Result<Self, TokenError> {
        if !root.is_dir() {
            return Err(TokenError::RootMissing {
                path: root.to_path_buf(),
            });
        }

        let mut sets = Vec::new();
        for entry in WalkDir::new(root).min_depth(1) {
            let entry = entry.map_err(|err| TokenError::Scan {
                path: root.to_path_buf(),
                message: err.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('$'))
            {
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let id = relative
                .with_extension("")
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            sets.push(SetId::new(id));
        }
        sets.sort();
        sets.dedup();
        Ok(Self { sets })
    }

    /// Build an inventory from explicit ids.
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = SetId>) -> Self {
        let mut sets: Vec<SetId> = ids.into_iter().collect();
        sets.sort();
        sets.dedup();
        Self { sets }
    }

    /// Whether `id` exists.
    #[must_use]
    pub fn contains(&self, id: &SetId) -> bool {
        self.sets.binary_search(id).is_ok()
    }

    /// All set ids in sorted order.
    #[must_use]
    pub fn ids(&self) -> &[SetId] {
        &self.sets
    }

    /// Sets whose first segment is `category` (`core`, `semantic`, `components`).
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a SetId> + 'a {
        self.sets
            .iter()
            .filter(move |id| id.first_segment() == category)
    }

    /// Component names: distinct second segments of `components/...` sets.
    #[must_use]
    pub fn components(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .in_category("components")
            .filter_map(|id| id.segments().nth(1))
            .collect();
        names.into_iter().map(str::to_string).collect()
    }
}

/// Read-through cache of parsed token sets for one build.
#[derive(Debug)]
pub struct SourceCache {
    root: PathBuf,
    syntax: ReferenceSyntax,
    sets: Mutex<HashMap<SetId, Arc<TokenSet>>>,
}

impl SourceCache {
    /// Create an empty cache rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference syntax cannot be compiled.
    pub fn new(root: &Path) -> Result<Self, TokenError> {
        Ok(Self {
            root: root.to_path_buf(),
            syntax: ReferenceSyntax::new()?,
            sets: Mutex::new(HashMap::new()),
        })
    }

    /// Token root backing this cache.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a set id.
    #[must_use]
    pub fn file_for(&self, id: &SetId) -> PathBuf {
        let mut path = self.root.clone();
        for segment in id.segments() {
            path.push(segment);
        }
        path.set_extension("json");
        path
    }

    /// Return the parsed set, loading it on first access.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn get(&self, id: &SetId) -> Result<Arc<TokenSet>, TokenError> {
        if let Some(set) = self.lock().get(id) {
            return Ok(Arc::clone(set));
        }

        let file = self.file_for(id);
        let raw = fs::read_to_string(&file).map_err(|source| TokenError::ReadFile {
            path: file.clone(),
            source,
        })?;
        let parsed = Arc::new(parse_token_set(id.clone(), &file, &raw, &self.syntax)?);
        debug!(set = %id, tokens = parsed.tokens.len(), "loaded token set");

        let mut sets = self.lock();
        let entry = sets.entry(id.clone()).or_insert(parsed);
        Ok(Arc::clone(entry))
    }

    /// Load every set in `ids`, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns the first load error.
    pub fn warm<'a>(&self, ids: impl IntoIterator<Item = &'a SetId>) -> Result<usize, TokenError> {
        let mut loaded = 0;
        for id in ids {
            self.get(id)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Merge `sources` left-to-right into a collection.
    ///
    /// # Errors
    ///
    /// Returns an error when a source set cannot be loaded.
    pub fn collection(&self, sources: &[SetId]) -> Result<TokenCollection, TokenError> {
        let sets = sources
            .iter()
            .map(|id| self.get(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TokenCollection::merge(sets.iter().map(AsRef::as_ref)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SetId, Arc<TokenSet>>> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Path-addressed tokens merged from one or more sets.
#[derive(Debug, Clone, Default)]
pub struct TokenCollection {
    tokens: IndexMap<TokenPath, Token>,
}

impl TokenCollection {
    /// Merge sets left-to-right; later sets replace whole tokens on path collision.
    pub fn merge<'a>(sets: impl IntoIterator<Item = &'a TokenSet>) -> Self {
        let mut tokens = IndexMap::new();
        for set in sets {
            for token in &set.tokens {
                tokens.insert(token.path.clone(), token.clone());
            }
        }
        Self { tokens }
    }

    /// Load token files relative to `root` and merge them in order. Set ids are
    /// derived from each file's path under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error when a file cannot be read, is not JSON, or is malformed.
    pub fn load(root: &Path, files: &[PathBuf]) -> Result<Self, TokenError> {
        let syntax = ReferenceSyntax::new()?;
        let mut sets = Vec::with_capacity(files.len());
        for file in files {
            let raw = fs::read_to_string(file).map_err(|source| TokenError::ReadFile {
                path: file.clone(),
                source,
            })?;
            let relative = file.strip_prefix(root).unwrap_or(file).with_extension("");
            let id = SetId::new(relative.to_string_lossy().into_owned());
            sets.push(parse_token_set(id, file, &raw, &syntax)?);
        }
        Ok(Self::merge(&sets))
    }

    /// Look up a token by path.
    #[must_use]
    pub fn get(&self, path: &TokenPath) -> Option<&Token> {
        self.tokens.get(path)
    }

    /// Tokens in stable declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    type TestResult = std::result::Result<(), Box<dyn Error>>;

    fn parse(id: &str, raw: &str) -> Result<TokenSet, TokenError> {
        let syntax = ReferenceSyntax::new()?;
        parse_token_set(SetId::new(id), Path::new("tokens.json"), raw, &syntax)
    }

    #[test]
    fn parses_leaves_groups_and_composites() -> TestResult {
        let set = parse(
            "core/light",
            r##"{
                "$description": "ignored",
                "color": {
                    "grey": {
                        "900": { "value": "#111111", "type": "color" },
                        "300": { "value": "#cccccc", "type": "color", "description": "Muted" }
                    },
                    "text": { "@": { "value": "{color.grey.900}", "type": "color" } }
                },
                "border": {
                    "default": {
                        "value": { "width": "1", "style": "solid", "color": "{color.grey.300}" },
                        "type": "border"
                    }
                },
                "space": { "2": { "$value": 8, "$type": "spacing" } }
            }"##,
        )?;

        let paths: Vec<String> = set.tokens.iter().map(|t| t.path.dotted()).collect();
        assert_eq!(
            paths,
            vec![
                "color.grey.900",
                "color.grey.300",
                "color.text.@",
                "border.default",
                "space.2"
            ]
        );
        assert_eq!(set.tokens[1].description.as_deref(), Some("Muted"));
        assert_eq!(
            set.tokens[2].value,
            TokenValue::Reference(TokenPath::parse("color.grey.900"))
        );
        assert!(matches!(set.tokens[3].value, TokenValue::Composite(_)));
        assert_eq!(set.tokens[3].kind, TokenType::Border);
        assert_eq!(set.tokens[4].kind, TokenType::Dimension);
        assert!(set.tokens.iter().all(|t| t.source_set.as_str() == "core/light"));
        Ok(())
    }

    #[test]
    fn rejects_invalid_json_and_missing_fields() {
        assert!(matches!(
            parse("core/light", "{ not json"),
            Err(TokenError::InvalidJson { .. })
        ));
        assert!(matches!(
            parse("core/light", r##"{ "color": { "a": { "value": "#fff" } } }"##),
            Err(TokenError::MalformedTokenFile { ref location, .. }) if location == "color.a"
        ));
        assert!(matches!(
            parse("core/light", r#"{ "color": { "a": { "type": "color" } } }"#),
            Err(TokenError::MalformedTokenFile { .. })
        ));
        assert!(matches!(
            parse("core/light", r#"{ "color": "red" }"#),
            Err(TokenError::MalformedTokenFile { .. })
        ));
        assert!(matches!(
            parse("core/light", r#"{ "a": { "value": null, "type": "color" } }"#),
            Err(TokenError::MalformedTokenFile { .. })
        ));
        assert!(matches!(
            parse("core/light", "[]"),
            Err(TokenError::MalformedTokenFile { .. })
        ));
    }

    #[test]
    fn group_metadata_and_tokens_named_type_are_not_leaves() -> TestResult {
        let set = parse(
            "core/light",
            r##"{
                "color": {
                    "$type": "color",
                    "white": { "$value": "#fff", "$type": "color" }
                },
                "font": { "type": { "value": "x", "type": "other" } }
            }"##,
        )?;
        let paths: Vec<String> = set.tokens.iter().map(|t| t.path.dotted()).collect();
        assert_eq!(paths, vec!["color.white", "font.type"]);
        assert_eq!(set.tokens[0].kind, TokenType::Color);
        Ok(())
    }

    #[test]
    fn components_are_distinct_across_interleaved_sets() {
        let inventory = SetInventory::from_ids(
            [
                "components/button",
                "components/button-group/light",
                "components/button/dark",
                "components/button/light",
                "core/light",
            ]
            .into_iter()
            .map(SetId::new),
        );
        assert_eq!(inventory.components(), vec!["button", "button-group"]);
    }

    #[test]
    fn merge_overrides_whole_token_and_keeps_first_position() -> TestResult {
        let light = parse(
            "core/light",
            r##"{ "a": { "value": "#fff", "type": "color" }, "b": { "value": "#000", "type": "color" } }"##,
        )?;
        let dark = parse(
            "core/dark",
            r##"{ "c": { "value": "#333", "type": "color" }, "a": { "value": "#111", "type": "color" } }"##,
        )?;
        let collection = TokenCollection::merge([&light, &dark]);

        let order: Vec<String> = collection.iter().map(|t| t.path.dotted()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        let a = collection
            .get(&TokenPath::parse("a"))
            .ok_or("token a missing")?;
        assert_eq!(a.source_set.as_str(), "core/dark");
        assert_eq!(a.value, TokenValue::Literal(Scalar::Text("#111".to_string())));
        assert_eq!(collection.len(), 3);
        Ok(())
    }

    #[test]
    fn inventory_and_cache_read_through_disk() -> TestResult {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("core"))?;
        fs::create_dir_all(root.join("components/button"))?;
        fs::write(
            root.join("core/light.json"),
            r##"{ "a": { "value": "#fff", "type": "color" } }"##,
        )?;
        fs::write(
            root.join("components/button/light.json"),
            r#"{ "button": { "bg": { "value": "{a}", "type": "color" } } }"#,
        )?;
        fs::write(root.join("$themes.json"), "[]")?;
        fs::write(root.join("notes.txt"), "skip")?;

        let inventory = SetInventory::scan(root)?;
        let ids: Vec<&str> = inventory.ids().iter().map(SetId::as_str).collect();
        assert_eq!(ids, vec!["components/button/light", "core/light"]);
        assert_eq!(inventory.components(), vec!["button".to_string()]);

        let cache = SourceCache::new(root)?;
        assert_eq!(cache.warm(inventory.ids())?, 2);
        let first = cache.get(&SetId::new("core/light"))?;
        fs::remove_file(root.join("core/light.json"))?;
        let second = cache.get(&SetId::new("core/light"))?;
        assert!(Arc::ptr_eq(&first, &second));

        let collection =
            cache.collection(&[SetId::new("core/light"), SetId::new("components/button/light")])?;
        assert_eq!(collection.len(), 2);
        Ok(())
    }

    #[test]
    fn load_merges_files_in_order() -> TestResult {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("core"))?;
        let light = root.join("core/light.json");
        let dark = root.join("core/dark.json");
        fs::write(&light, r##"{ "a": { "value": "#fff", "type": "color" } }"##)?;
        fs::write(&dark, r##"{ "a": { "value": "#000", "type": "color" } }"##)?;

        let collection = TokenCollection::load(root, &[light, dark])?;
        let token = collection
            .get(&TokenPath::parse("a"))
            .ok_or("token a missing")?;
        assert_eq!(token.source_set.as_str(), "core/dark");
        Ok(())
    }

    #[test]
    fn scan_fails_for_missing_root() {
        assert!(matches!(
            SetInventory::scan(Path::new("target/definitely-missing-tokens")),
            Err(TokenError::RootMissing { .. })
        ));
    }
}
