//! Theme manifest handling: permutation, (brand, mode) mapping, and themeable
//! classification.
//!
//! # Design
//! - `$themes.json` entries are permutated the way Tokens Studio does it; each
//!   permutation name must map to a configured brand and a light/dark mode.
//! - Classification is computed once from the valid themes and never mutated.
//!   Token-level themeability is a separate index over one collection.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ThemeError;
use crate::store::{SetInventory, TokenCollection};
use crate::token::{SetId, TokenPath};

/// State of a token set inside one manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetStatus {
    /// Set contributes tokens to the output.
    Enabled,
    /// Set is only used to resolve references.
    Source,
    /// Set is ignored.
    Disabled,
}

/// One entry of `$themes.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeEntry {
    /// Tokens Studio identifier.
    #[serde(default)]
    pub id: String,
    /// Display name, used for permutation names.
    pub name: String,
    /// Optional theme group.
    #[serde(default)]
    pub group: Option<String>,
    /// Set states in manifest order.
    #[serde(default)]
    pub selected_token_sets: IndexMap<String, SetStatus>,
}

/// Parsed `$themes.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeManifest {
    /// Entries in file order.
    pub entries: Vec<ThemeEntry>,
}

/// A combination of manifest entries with its merged set list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permutation {
    /// Member names joined with the separator.
    pub name: String,
    /// Groups of the member entries, in member order.
    pub groups: Vec<String>,
    /// Non-disabled sets, `source` before `enabled`, de-duplicated.
    pub sets: Vec<SetId>,
}

impl ThemeManifest {
    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Read`] or [`ThemeError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ThemeError> {
        let raw = fs::read_to_string(path).map_err(|source| ThemeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    /// Parse manifest text; `path` is only used for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Parse`] when the text is not a list of theme entries.
    pub fn parse(path: &Path, raw: &str) -> Result<Self, ThemeError> {
        let entries = serde_json::from_str(raw).map_err(|source| ThemeError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { entries })
    }

    /// Expand entries into permutations.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Invalid`] when grouped and ungrouped entries are mixed.
    pub fn permutate(&self, separator: &str) -> Result<Vec<Permutation>, ThemeError> {
        let grouped = self.entries.iter().filter(|e| e.group.is_some()).count();
        if grouped != 0 && grouped != self.entries.len() {
            return Err(ThemeError::Invalid {
                detail: "theme entries must either all have a group or none".to_string(),
            });
        }

        let mut groups: IndexMap<&str, Vec<&ThemeEntry>> = IndexMap::new();
        for entry in &self.entries {
            if let Some(group) = entry.group.as_deref() {
                groups.entry(group).or_default().push(entry);
            }
        }

        if groups.len() <= 1 {
            return Ok(self
                .entries
                .iter()
                .map(|entry| combine(&[entry], separator))
                .collect());
        }

        let mut combos: Vec<Vec<&ThemeEntry>> = vec![Vec::new()];
        for members in groups.values() {
            combos = combos
                .iter()
                .flat_map(|combo| {
                    members.iter().map(move |member| {
                        let mut next = combo.clone();
                        next.push(*member);
                        next
                    })
                })
                .collect();
        }
        Ok(combos
            .iter()
            .map(|combo| combine(combo, separator))
            .collect())
    }
}

fn combine(members: &[&ThemeEntry], separator: &str) -> Permutation {
    let name = members
        .iter()
        .map(|member| member.name.as_str())
        .collect::<Vec<_>>()
        .join(separator);
    let groups = members
        .iter()
        .filter_map(|member| member.group.clone())
        .collect();

    // Later members override earlier ones; a set keeps its first position.
    let mut merged: IndexMap<SetId, SetStatus> = IndexMap::new();
    for member in members {
        for (set, status) in &member.selected_token_sets {
            merged.insert(SetId::new(set.as_str()), *status);
        }
    }
    let sets = [SetStatus::Source, SetStatus::Enabled]
        .into_iter()
        .flat_map(|wanted| {
            merged
                .iter()
                .filter(move |(_, status)| **status == wanted)
                .map(|(set, _)| set.clone())
        })
        .collect();
    Permutation { name, groups, sets }
}

/// Color scheme of a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Light scheme.
    Light,
    /// Dark scheme.
    Dark,
}

impl Mode {
    /// Both modes, light first.
    pub const ALL: [Self; 2] = [Self::Light, Self::Dark];

    /// Lower-case name, also the set segment that marks the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// A configured brand name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Brand(String);

impl Brand {
    /// Wrap a brand name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Brand name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Brand {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Output key of a theme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ThemeKey {
    /// Brand.
    pub brand: Brand,
    /// Mode.
    pub mode: Mode,
}

impl Display for ThemeKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.brand, self.mode)
    }
}

/// A valid theme with its ordered set list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    /// Permutation name the theme came from.
    pub name: String,
    /// Brand and mode.
    pub key: ThemeKey,
    /// Member sets in merge order.
    pub sets: Vec<SetId>,
}

/// A permutation that did not map to a (brand, mode) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPermutation {
    /// Permutation name.
    pub name: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Result of theme resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedThemes {
    /// Valid themes keyed by (brand, mode).
    pub themes: BTreeMap<ThemeKey, Theme>,
    /// Permutations that were dropped.
    pub skipped: Vec<SkippedPermutation>,
}

impl ResolvedThemes {
    /// Theme for `key`.
    #[must_use]
    pub fn get(&self, key: &ThemeKey) -> Option<&Theme> {
        self.themes.get(key)
    }

    /// Themes in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Theme> {
        self.themes.values()
    }
}

/// Maps permutations onto configured brands and modes.
#[derive(Debug, Clone)]
pub struct ThemeResolver<'a> {
    brands: &'a [String],
    default_brand: &'a str,
    separator: &'a str,
}

impl<'a> ThemeResolver<'a> {
    /// Create a resolver for `brands`; `default_brand` names themes that only carry a mode.
    #[must_use]
    pub const fn new(brands: &'a [String], default_brand: &'a str, separator: &'a str) -> Self {
        Self {
            brands,
            default_brand,
            separator,
        }
    }

    /// Permutate `manifest` and keep the permutations that name a (brand, mode).
    /// Sets missing from `inventory` are dropped from a theme with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Invalid`] when the manifest cannot be permutated.
    pub fn resolve(
        &self,
        manifest: &ThemeManifest,
        inventory: Option<&SetInventory>,
    ) -> Result<ResolvedThemes, ThemeError> {
        let mut resolved = ResolvedThemes::default();
        for permutation in manifest.permutate(self.separator)? {
            let key = match self.key_for(&permutation) {
                Ok(key) => key,
                Err(reason) => {
                    warn!(permutation = %permutation.name, reason = %reason, "skipping theme permutation");
                    resolved.skipped.push(SkippedPermutation {
                        name: permutation.name,
                        reason,
                    });
                    continue;
                }
            };

            let sets = permutation
                .sets
                .into_iter()
                .filter(|set| {
                    let present = inventory.is_none_or(|inventory| inventory.contains(set));
                    if !present {
                        warn!(theme = %key, set = %set, "theme references a missing token set");
                    }
                    present
                })
                .collect();
            resolved.themes.insert(
                key.clone(),
                Theme {
                    name: permutation.name,
                    key,
                    sets,
                },
            );
        }
        Ok(resolved)
    }

    /// Map a permutation name to a (brand, mode) pair.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the name does not fit.
    pub fn key_for(&self, permutation: &Permutation) -> Result<ThemeKey, String> {
        let name = permutation.name.to_lowercase();

        for brand in self.brands {
            let mode = name
                .strip_prefix(brand.to_lowercase().as_str())
                .and_then(|rest| rest.strip_prefix(self.separator))
                .and_then(|rest| rest.parse::<Mode>().ok());
            if let Some(mode) = mode {
                return Ok(ThemeKey {
                    brand: Brand::new(brand.as_str()),
                    mode,
                });
            }
        }

        let modes: Vec<Option<Mode>> = name
            .split(self.separator)
            .map(|part| part.parse::<Mode>().ok())
            .collect();
        if let Some(Some(mode)) = modes.first().copied()
            && modes.iter().all(|candidate| *candidate == Some(mode))
        {
            let brand = permutation
                .groups
                .iter()
                .find_map(|group| {
                    self.brands
                        .iter()
                        .find(|brand| brand.eq_ignore_ascii_case(group))
                })
                .map_or(self.default_brand, String::as_str);
            return Ok(ThemeKey {
                brand: Brand::new(brand),
                mode,
            });
        }

        Err(format!(
            "'{}' is neither <brand>{sep}<mode> nor a repeated mode",
            permutation.name,
            sep = self.separator
        ))
    }
}

/// Immutable set → themeable map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    sets: BTreeMap<SetId, bool>,
}

impl Classification {
    /// A set is themeable when it belongs to at least one valid theme but not to all of them.
    #[must_use]
    pub fn classify(themes: &ResolvedThemes) -> Self {
        let total = themes.themes.len();
        let mut counts: BTreeMap<SetId, usize> = BTreeMap::new();
        for theme in themes.iter() {
            let unique: BTreeSet<&SetId> = theme.sets.iter().collect();
            for set in unique {
                *counts.entry(set.clone()).or_default() += 1;
            }
        }
        let sets = counts
            .into_iter()
            .map(|(set, count)| (set, count < total))
            .collect();
        Self { sets }
    }

    /// Whether `set` is themeable. Sets outside every theme are not.
    #[must_use]
    pub fn is_themeable(&self, set: &SetId) -> bool {
        self.sets.get(set).copied().unwrap_or(false)
    }

    /// Themeable sets in sorted order.
    pub fn themeable_sets(&self) -> impl Iterator<Item = &SetId> {
        self.sets
            .iter()
            .filter(|(_, themeable)| **themeable)
            .map(|(set, _)| set)
    }
}

/// Paths of tokens that are themeable within one collection.
#[derive(Debug, Clone, Default)]
pub struct ThemeableIndex {
    paths: HashSet<TokenPath>,
}

impl ThemeableIndex {
    /// A token is themeable if its set is, or if anything it references
    /// (transitively, through composites and expressions) comes from a themeable set.
    /// Missing and cyclic references end the walk without error.
    #[must_use]
    pub fn build(collection: &TokenCollection, classification: &Classification) -> Self {
        let paths = collection
            .iter()
            .filter(|token| {
                let mut visited = HashSet::new();
                let mut pending = vec![&token.path];
                while let Some(path) = pending.pop() {
                    if !visited.insert(path) {
                        continue;
                    }
                    let Some(current) = collection.get(path) else {
                        continue;
                    };
                    if classification.is_themeable(&current.source_set) {
                        return true;
                    }
                    pending.extend(current.value.references());
                }
                false
            })
            .map(|token| token.path.clone())
            .collect();
        Self { paths }
    }

    /// Whether the token at `path` is themeable.
    #[must_use]
    pub fn is_themeable(&self, path: &TokenPath) -> bool {
        self.paths.contains(path)
    }

    /// Number of themeable tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no token is themeable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
