//! Output planning: which files a build writes, from which sets, with which selection.
//!
//! Targets are immutable once planned. A target has one or more passes; the first
//! pass writes the target destination and every later pass writes its own file
//! that is merged into the destination and removed afterwards.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::BuildConfig;
use crate::emit::BlockLayout;
use crate::store::SetInventory;
use crate::themes::{Brand, Mode, ResolvedThemes, Theme, ThemeableIndex};
use crate::token::{SetId, Token};

/// Kind of output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// `base/_core.scss`.
    Core,
    /// `base/_semantic.scss`.
    Semantic,
    /// One component's `:host` tokens.
    Component,
    /// One (brand, mode) theme file.
    BrandTheme,
}

/// Which tokens of a pass collection are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    /// Tokens whose set is, or lives under, one of `sets` with the same light/dark mode.
    Sets {
        /// Selected sets.
        sets: Vec<SetId>,
    },
    /// Brand-specific tokens of one theme.
    BrandTheme {
        /// Theme brand.
        brand: Brand,
        /// Theme mode.
        mode: Mode,
        /// Member sets of the theme.
        theme_sets: Vec<SetId>,
    },
}

impl Selection {
    /// Whether `token` belongs in the output.
    #[must_use]
    pub fn matches(&self, token: &Token, themeable: &ThemeableIndex) -> bool {
        let set = &token.source_set;
        match self {
            Self::Sets { sets } => sets
                .iter()
                .any(|selected| set.is_within(selected) && set.is_dark() == selected.is_dark()),
            Self::BrandTheme {
                brand,
                mode,
                theme_sets,
            } => {
                if matches!(set.first_segment(), "core" | "semantic") {
                    return false;
                }
                let moded = Mode::ALL.iter().any(|candidate| set.has_segment(candidate.as_str()));
                if set.last_segment() == brand.as_str() || (set.has_segment(brand.as_str()) && !moded) {
                    return true;
                }
                if set.first_segment() == "components" && set.has_segment(mode.as_str()) {
                    return true;
                }
                theme_sets.contains(set) && themeable.is_themeable(&token.path)
            }
        }
    }
}

/// One render of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pass {
    /// Sets merged, left to right, into the pass collection.
    pub sources: Vec<SetId>,
    /// Tokens written.
    pub selection: Selection,
    /// Block layout.
    pub layout: BlockLayout,
    /// File written by this pass, relative to the output directory.
    pub destination: PathBuf,
}

/// A planned output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputTarget {
    /// Stable name used in logs and reports.
    pub name: String,
    /// Kind of output.
    pub category: Category,
    /// Brand, for brand themes.
    pub brand: Option<Brand>,
    /// Mode, for brand themes.
    pub mode: Option<Mode>,
    /// Final file, relative to the output directory.
    pub destination: PathBuf,
    /// Passes in render order.
    pub passes: Vec<Pass>,
}

impl OutputTarget {
    /// Every set any pass reads.
    pub fn source_sets(&self) -> impl Iterator<Item = &SetId> {
        self.passes.iter().flat_map(|pass| pass.sources.iter())
    }
}

/// Plan every output target for a build, in a stable order: core, semantic,
/// components by name, then brand themes by (brand, mode).
#[must_use]
pub fn plan_targets(
    inventory: &SetInventory,
    themes: &ResolvedThemes,
    config: &BuildConfig,
) -> Vec<OutputTarget> {
    let mut targets = Vec::new();
    if let Some(core) = layered_target(
        "core",
        Category::Core,
        "base/_core",
        [
            (existing(inventory, &["core/light"]), "core/light"),
            (existing(inventory, &["core/light", "core/dark"]), "core/dark"),
        ],
        inventory,
    ) {
        targets.push(core);
    }
    if let Some(semantic) = layered_target(
        "semantic",
        Category::Semantic,
        "base/_semantic",
        [
            (existing(inventory, &["core/light", "semantic/light"]), "semantic/light"),
            (
                existing(inventory, &["core/light", "core/dark", "semantic/light", "semantic/dark"]),
                "semantic/dark",
            ),
        ],
        inventory,
    ) {
        targets.push(semantic);
    }

    // Sorted order puts each dark set before its light sibling, so light wins on collisions.
    let mut component_sources =
        existing(inventory, &["core/dark", "core/light", "semantic/dark", "semantic/light"]);
    component_sources.extend(inventory.in_category("components").cloned());
    for component in inventory.components() {
        let name = format!("{}-{component}", config.component_prefix);
        let selected: Vec<SetId> = inventory
            .in_category("components")
            .filter(|set| set.segments().nth(1) == Some(component.as_str()) && !set.is_dark())
            .cloned()
            .collect();
        let destination = PathBuf::from(&config.default_brand)
            .join("components")
            .join(&name)
            .join(format!("{name}.tokens.scss"));
        targets.push(OutputTarget {
            name: format!("component:{component}"),
            category: Category::Component,
            brand: None,
            mode: None,
            destination: destination.clone(),
            passes: vec![Pass {
                sources: component_sources.clone(),
                selection: Selection::Sets { sets: selected },
                layout: BlockLayout::Host,
                destination,
            }],
        });
    }

    for theme in themes.iter() {
        targets.push(theme_target(theme, inventory));
    }
    targets
}

fn existing(inventory: &SetInventory, ids: &[&str]) -> Vec<SetId> {
    ids.iter()
        .map(|id| SetId::new(*id))
        .filter(|id| inventory.contains(id))
        .collect()
}

fn layered_target<const N: usize>(
    name: &str,
    category: Category,
    stem: &str,
    layers: [(Vec<SetId>, &str); N],
    inventory: &SetInventory,
) -> Option<OutputTarget> {
    let destination = PathBuf::from(format!("{stem}.scss"));
    let mut passes = Vec::new();
    for (sources, selected) in layers {
        let selected = SetId::new(selected);
        if !inventory.contains(&selected) {
            continue;
        }
        let dark = selected.is_dark();
        let pass_destination = if passes.is_empty() {
            destination.clone()
        } else {
            PathBuf::from(format!("{stem}-{}.scss", selected.last_segment()))
        };
        passes.push(Pass {
            sources,
            selection: Selection::Sets { sets: vec![selected] },
            layout: if dark { BlockLayout::Dark } else { BlockLayout::Light },
            destination: pass_destination,
        });
    }
    if passes.is_empty() {
        return None;
    }
    Some(OutputTarget {
        name: name.to_string(),
        category,
        brand: None,
        mode: None,
        destination,
        passes,
    })
}

fn theme_target(theme: &Theme, inventory: &SetInventory) -> OutputTarget {
    let brand = &theme.key.brand;
    let mode = theme.key.mode;
    let mut sources = existing(inventory, &["core/light", "core/dark", "semantic/light", "semantic/dark"]);
    for set in &theme.sets {
        let base = matches!(set.first_segment(), "core" | "semantic");
        let branded = !base && set.has_segment(brand.as_str());
        let component = set.first_segment() == "components" && set.has_segment(mode.as_str());
        if (branded || component) && !sources.contains(set) {
            sources.push(set.clone());
        }
    }

    let destination = PathBuf::from(brand.as_str()).join(format!("{mode}.scss"));
    OutputTarget {
        name: format!("theme:{}", theme.key),
        category: Category::BrandTheme,
        brand: Some(brand.clone()),
        mode: Some(mode),
        destination: destination.clone(),
        passes: vec![Pass {
            sources,
            selection: Selection::BrandTheme {
                brand: brand.clone(),
                mode,
                theme_sets: theme.sets.clone(),
            },
            layout: BlockLayout::All,
            destination,
        }],
    }
}
