//! Temporary token trees for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Manifest file name written by [`TokenTree::write_manifest`].
pub const MANIFEST_FILE: &str = "$themes.json";

/// `core/light` of the sample tree.
pub const CORE_LIGHT: &str = r##"{
  "color": {
    "white": { "value": "#FFFFFF", "type": "color" },
    "grey": {
      "300": { "value": "#cccccc", "type": "color" },
      "900": { "value": "#111", "type": "color" }
    },
    "brand": { "value": "{color.grey.900}", "type": "color" }
  },
  "border-width": { "thin": { "value": "1", "type": "borderWidth" } },
  "space": { "2": { "value": 8, "type": "spacing" } }
}"##;

/// `core/dark` of the sample tree.
pub const CORE_DARK: &str = r##"{
  "color": { "surface": { "value": "#000000", "type": "color" } }
}"##;

/// `semantic/light` of the sample tree.
pub const SEMANTIC_LIGHT: &str = r#"{
  "$description": "Semantic aliases",
  "text": { "@": { "value": "{color.grey.900}", "type": "color" } },
  "card": {
    "border": {
      "value": { "width": "{border-width.thin}", "style": "solid", "color": "{color.grey.300}" },
      "type": "border"
    }
  },
  "heading": {
    "lg": {
      "value": {
        "fontFamily": "'Inter'",
        "fontWeight": "600",
        "fontSize": "28px",
        "lineHeight": "1.25",
        "letterSpacing": "0"
      },
      "type": "typography"
    }
  }
}"#;

/// `semantic/dark` of the sample tree.
pub const SEMANTIC_DARK: &str = r#"{
  "surface": { "@": { "value": "{color.surface}", "type": "color" } }
}"#;

/// `components/button/light` of the sample tree.
pub const BUTTON_LIGHT: &str = r#"{
  "button": {
    "bg": { "value": "{color.brand}", "type": "color" },
    "padding": { "value": "{space.2} * 2", "type": "spacing" }
  }
}"#;

/// `components/button/dark` of the sample tree.
pub const BUTTON_DARK: &str = r#"{
  "button": { "bg": { "value": "{color.surface}", "type": "color" } }
}"#;

/// `brands/pine` of the sample tree.
pub const BRAND_PINE: &str = r##"{
  "brand": {
    "primary": { "value": "#0A7", "type": "color" },
    "accent": { "value": "{color.brand}", "type": "color" }
  }
}"##;

/// `brands/kajabi_products` of the sample tree.
pub const BRAND_KAJABI: &str = r##"{
  "brand": { "primary": { "value": "#3355FF", "type": "color" } }
}"##;

/// Ungrouped manifest with light and dark themes for both brands.
pub const SAMPLE_MANIFEST: &str = r#"[
  {
    "id": "pine-light",
    "name": "pine-light",
    "selectedTokenSets": {
      "core/light": "source",
      "semantic/light": "source",
      "brands/pine": "enabled",
      "components/button/light": "enabled"
    }
  },
  {
    "id": "pine-dark",
    "name": "pine-dark",
    "selectedTokenSets": {
      "core/light": "source",
      "core/dark": "source",
      "semantic/light": "source",
      "semantic/dark": "source",
      "brands/pine": "enabled",
      "components/button/light": "enabled",
      "components/button/dark": "enabled"
    }
  },
  {
    "id": "kajabi-light",
    "name": "kajabi_products-light",
    "selectedTokenSets": {
      "core/light": "source",
      "semantic/light": "source",
      "brands/kajabi_products": "enabled",
      "components/button/light": "enabled"
    }
  },
  {
    "id": "kajabi-dark",
    "name": "kajabi_products-dark",
    "selectedTokenSets": {
      "core/light": "source",
      "core/dark": "source",
      "semantic/light": "source",
      "semantic/dark": "source",
      "brands/kajabi_products": "enabled",
      "components/button/light": "enabled",
      "components/button/dark": "enabled"
    }
  }
]"#;

/// A token root and output directory inside a temp directory that is removed on drop.
#[derive(Debug)]
pub struct TokenTree {
    dir: TempDir,
}

impl TokenTree {
    /// Create an empty tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp directory cannot be created.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create temp token tree")?;
        fs::create_dir_all(dir.path().join("tokens")).context("failed to create token root")?;
        Ok(Self { dir })
    }

    /// Tree populated with the sample sets and manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if a fixture file cannot be written.
    pub fn sample() -> Result<Self> {
        let tree = Self::new()?;
        for (id, body) in [
            ("core/light", CORE_LIGHT),
            ("core/dark", CORE_DARK),
            ("semantic/light", SEMANTIC_LIGHT),
            ("semantic/dark", SEMANTIC_DARK),
            ("components/button/light", BUTTON_LIGHT),
            ("components/button/dark", BUTTON_DARK),
            ("brands/pine", BRAND_PINE),
            ("brands/kajabi_products", BRAND_KAJABI),
        ] {
            tree.write_set(id, body)?;
        }
        tree.write_manifest(SAMPLE_MANIFEST)?;
        Ok(tree)
    }

    /// Token root.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("tokens")
    }

    /// Output directory (not created until a build runs).
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Base temp directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `body` as the token set `id` (`components/button/light`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_set(&self, id: &str, body: &str) -> Result<PathBuf> {
        let path = self.root().join(format!("{id}.json"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write the theme manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_manifest(&self, body: &str) -> Result<()> {
        let path = self.root().join(MANIFEST_FILE);
        fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Read a generated file relative to the output directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_output(&self, relative: &str) -> Result<String> {
        let path = self.output_dir().join(relative);
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
    }

    /// Every file under the output directory, relative and sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be walked.
    pub fn output_files(&self) -> Result<Vec<String>> {
        let root = self.output_dir();
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).min_depth(1) {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&root) {
                files.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        files.sort();
        Ok(files)
    }
}
