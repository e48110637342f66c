//! Build configuration: defaults, JSON loading, and validation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::resolve::{ResolveMode, ResolverOptions};
use crate::token::{SetId, TokenPath, sanitize_name};

/// Settings for one build. Every field has a default, so an empty JSON object is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory holding token sets and the theme manifest.
    pub token_root: PathBuf,
    /// Directory receiving generated files.
    pub output_dir: PathBuf,
    /// Manifest file name inside `token_root`.
    pub manifest_file: String,
    /// Custom property prefix.
    pub prefix: String,
    /// Directory and file prefix for component outputs.
    pub component_prefix: String,
    /// Brand assigned to themes that only name a mode; also hosts component files.
    pub default_brand: String,
    /// Known brands.
    pub brands: Vec<String>,
    /// Separator used to join and split permutation names.
    pub theme_separator: String,
    /// Maximum reference hops.
    pub max_reference_depth: usize,
    /// Emit `var()` references instead of flattened literals.
    pub output_references: bool,
    /// Try to turn literals back into references.
    pub infer_references: bool,
    /// Sets whose literal values are candidates for inference.
    pub reference_sets: Vec<String>,
    /// Literal value to dotted token path, used by inference.
    pub known_values: BTreeMap<String, String>,
    /// Build targets on the rayon pool.
    pub parallel: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            token_root: PathBuf::from("src/tokens/base"),
            output_dir: PathBuf::from("_generated"),
            manifest_file: "$themes.json".to_string(),
            prefix: "pine".to_string(),
            component_prefix: "pds".to_string(),
            default_brand: "pine".to_string(),
            brands: vec!["kajabi_products".to_string(), "pine".to_string()],
            theme_separator: "-".to_string(),
            max_reference_depth: 32,
            output_references: true,
            infer_references: false,
            reference_sets: vec!["core/light".to_string(), "core/dark".to_string()],
            known_values: BTreeMap::new(),
            parallel: true,
        }
    }
}

impl BuildConfig {
    /// Load a JSON configuration file. Relative `token_root` and `output_dir`
    /// stay relative to the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_identifier("prefix", &self.prefix)?;
        ensure_identifier("component_prefix", &self.component_prefix)?;
        if self.theme_separator.is_empty() {
            return Err(invalid("theme_separator", "must not be empty"));
        }
        if self.brands.is_empty() {
            return Err(invalid("brands", "at least one brand is required"));
        }
        for brand in &self.brands {
            if brand.is_empty()
                || !brand
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            {
                return Err(invalid(
                    "brands",
                    format!("'{brand}' may only contain ASCII letters, digits and '_'"),
                ));
            }
            if brand.contains(self.theme_separator.as_str()) {
                return Err(invalid(
                    "brands",
                    format!("'{brand}' contains the theme separator"),
                ));
            }
        }
        if !self.brands.contains(&self.default_brand) {
            return Err(invalid(
                "default_brand",
                format!("'{}' is not one of the configured brands", self.default_brand),
            ));
        }
        if self.max_reference_depth == 0 {
            return Err(invalid("max_reference_depth", "must be at least 1"));
        }
        if self.manifest_file.trim().is_empty() {
            return Err(invalid("manifest_file", "must not be empty"));
        }
        if let Some((literal, _)) = self
            .known_values
            .iter()
            .find(|(_, path)| path.trim().is_empty())
        {
            return Err(invalid(
                "known_values",
                format!("'{literal}' maps to an empty token path"),
            ));
        }
        Ok(())
    }

    /// Path of the theme manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.token_root.join(&self.manifest_file)
    }

    /// Reference rendering mode for emitted values.
    #[must_use]
    pub const fn resolve_mode(&self) -> ResolveMode {
        if self.output_references {
            ResolveMode::CssVariable
        } else {
            ResolveMode::Literal
        }
    }

    /// Resolver options for this configuration.
    #[must_use]
    pub fn resolver_options(&self) -> ResolverOptions {
        let options = ResolverOptions::new(self.prefix.clone(), self.max_reference_depth);
        if !self.infer_references {
            return options;
        }
        options.with_inference(
            self.reference_sets.iter().map(SetId::new).collect(),
            self.known_values
                .iter()
                .map(|(literal, path)| (literal.clone(), TokenPath::parse(path)))
                .collect(),
        )
    }
}

fn ensure_identifier(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if sanitize_name(value) != value {
        return Err(invalid(
            field,
            format!("'{value}' may only contain ASCII letters, digits and single '-'"),
        ));
    }
    Ok(())
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidField {
        field,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Strategy;
    use std::error::Error;

    type TestResult = std::result::Result<(), Box<dyn Error>>;

    #[test]
    fn defaults_are_valid() -> TestResult {
        let config = BuildConfig::default();
        config.validate()?;
        assert_eq!(config.manifest_path(), PathBuf::from("src/tokens/base/$themes.json"));
        assert_eq!(config.resolve_mode(), ResolveMode::CssVariable);
        assert_eq!(
            config.resolver_options().strategies,
            vec![Strategy::StructuredReference, Strategy::Passthrough]
        );
        Ok(())
    }

    #[test]
    fn partial_json_fills_defaults_and_rejects_unknown_fields() -> TestResult {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("pine-tokens.json");
        fs::write(&path, r#"{ "prefix": "kds", "infer_references": true }"#)?;
        let config = BuildConfig::from_file(&path)?;
        assert_eq!(config.prefix, "kds");
        assert_eq!(config.default_brand, "pine");
        assert_eq!(config.resolver_options().strategies.len(), 4);

        fs::write(&path, r#"{ "prefx": "kds" }"#)?;
        assert!(matches!(
            BuildConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            BuildConfig::from_file(&temp.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
        Ok(())
    }

    #[test]
    fn validation_names_the_offending_field() {
        let cases: Vec<(BuildConfig, &str)> = vec![
            (
                BuildConfig {
                    prefix: "pine tokens".to_string(),
                    ..BuildConfig::default()
                },
                "prefix",
            ),
            (
                BuildConfig {
                    brands: Vec::new(),
                    ..BuildConfig::default()
                },
                "brands",
            ),
            (
                BuildConfig {
                    brands: vec!["pine-dark".to_string()],
                    ..BuildConfig::default()
                },
                "brands",
            ),
            (
                BuildConfig {
                    default_brand: "acme".to_string(),
                    ..BuildConfig::default()
                },
                "default_brand",
            ),
            (
                BuildConfig {
                    max_reference_depth: 0,
                    ..BuildConfig::default()
                },
                "max_reference_depth",
            ),
            (
                BuildConfig {
                    theme_separator: String::new(),
                    ..BuildConfig::default()
                },
                "theme_separator",
            ),
        ];
        for (config, expected) in cases {
            match config.validate() {
                Err(ConfigError::InvalidField { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }
    }
}
