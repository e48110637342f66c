//! Build orchestration.
//!
//! A build validates configuration, resolves themes, loads every token set once,
//! plans the output targets, and renders them on the rayon pool. Structural input
//! errors abort the build; anything that goes wrong inside one target is recorded
//! on that target's report and the remaining targets still write.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::emit::{Declaration, declarations, merge_rendered, render};
use crate::error::{OutputError, Result, TargetError};
use crate::plan::{Category, OutputTarget, Pass, Selection, plan_targets};
use crate::resolve::{ReferenceResolver, ResolveMode, ResolverOptions};
use crate::store::{SetInventory, SourceCache};
use crate::themes::{
    Classification, ResolvedThemes, SkippedPermutation, Theme, ThemeManifest, ThemeResolver,
    ThemeableIndex,
};

/// Inputs every command needs: the set inventory and the resolved themes.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Sets found under the token root.
    pub inventory: SetInventory,
    /// Valid themes and skipped permutations.
    pub themes: ResolvedThemes,
    /// Themeable classification of the valid themes.
    pub classification: Classification,
}

impl Workspace {
    /// Validate `config`, scan the token root, and resolve the theme manifest.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::BuildError`] for invalid configuration, a missing token
    /// root, or an unusable manifest.
    pub fn open(config: &BuildConfig) -> Result<Self> {
        config.validate()?;
        let inventory = SetInventory::scan(&config.token_root)?;
        let manifest = ThemeManifest::from_file(&config.manifest_path())?;
        let themes = ThemeResolver::new(
            &config.brands,
            &config.default_brand,
            &config.theme_separator,
        )
        .resolve(&manifest, Some(&inventory))?;
        let classification = Classification::classify(&themes);
        debug!(
            sets = inventory.ids().len(),
            themes = themes.themes.len(),
            skipped = themes.skipped.len(),
            "resolved token workspace"
        );
        Ok(Self {
            inventory,
            themes,
            classification,
        })
    }

    /// Output targets for this workspace.
    #[must_use]
    pub fn plan(&self, config: &BuildConfig) -> Vec<OutputTarget> {
        plan_targets(&self.inventory, &self.themes, config)
    }
}

/// Outcome of one output target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetStatus {
    /// All passes written and merged.
    Written,
    /// Passes written, but folding them into the destination failed; the pass
    /// files are left in place.
    Unmerged {
        /// Merge failure.
        error: String,
    },
    /// Nothing was written for this target.
    Failed {
        /// Failure cause.
        error: String,
    },
}

/// Per-target entry of a [`BuildReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    /// Target name.
    pub name: String,
    /// Target kind.
    pub category: Category,
    /// Final file path.
    pub destination: PathBuf,
    /// Declarations written across all passes.
    pub declarations: usize,
    /// Outcome.
    #[serde(flatten)]
    pub status: TargetStatus,
}

impl TargetReport {
    /// Whether the target failed outright.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, TargetStatus::Failed { .. })
    }
}

/// Summary of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Token root that was read.
    pub token_root: PathBuf,
    /// Directory that was written.
    pub output_dir: PathBuf,
    /// Number of token sets loaded.
    pub sets: usize,
    /// Valid themes.
    pub themes: Vec<Theme>,
    /// Permutations that did not map to a (brand, mode).
    pub skipped_permutations: Vec<SkippedPermutation>,
    /// Target outcomes, in plan order.
    pub targets: Vec<TargetReport>,
}

impl BuildReport {
    /// Targets that failed.
    pub fn failures(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|target| target.is_failed())
    }

    /// Whether every target was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Read-only state shared by target workers.
struct BuildContext<'a> {
    cache: &'a SourceCache,
    classification: &'a Classification,
    options: ResolverOptions,
    mode: ResolveMode,
    output_dir: &'a Path,
}

/// Plan the targets for `config` without loading token files.
///
/// # Errors
///
/// See [`Workspace::open`].
pub fn plan(config: &BuildConfig) -> Result<Vec<OutputTarget>> {
    Ok(Workspace::open(config)?.plan(config))
}

/// Run a full build.
///
/// # Errors
///
/// Returns a [`crate::BuildError`] when configuration, the manifest, a token file,
/// or the output root is unusable. Target-level failures are reported in the
/// returned [`BuildReport`] instead.
pub fn build(config: &BuildConfig) -> Result<BuildReport> {
    let workspace = Workspace::open(config)?;
    let cache = SourceCache::new(&config.token_root)?;
    let sets = cache.warm(workspace.inventory.ids())?;
    let targets = workspace.plan(config);
    fs::create_dir_all(&config.output_dir).map_err(|source| OutputError::CreateDir {
        path: config.output_dir.clone(),
        source,
    })?;

    info!(
        token_root = %config.token_root.display(),
        output_dir = %config.output_dir.display(),
        sets,
        targets = targets.len(),
        "building design tokens"
    );

    let context = BuildContext {
        cache: &cache,
        classification: &workspace.classification,
        options: config.resolver_options(),
        mode: config.resolve_mode(),
        output_dir: &config.output_dir,
    };
    let reports: Vec<TargetReport> = if config.parallel {
        targets.par_iter().map(|target| context.run(target)).collect()
    } else {
        targets.iter().map(|target| context.run(target)).collect()
    };

    let report = BuildReport {
        token_root: config.token_root.clone(),
        output_dir: config.output_dir.clone(),
        sets,
        themes: workspace.themes.iter().cloned().collect(),
        skipped_permutations: workspace.themes.skipped,
        targets: reports,
    };
    info!(
        written = report.targets.len() - report.failures().count(),
        failed = report.failures().count(),
        "token build finished"
    );
    Ok(report)
}

impl BuildContext<'_> {
    fn run(&self, target: &OutputTarget) -> TargetReport {
        let written = self.render_target(target).and_then(|rendered| {
            self.write_passes(target, &rendered)?;
            Ok(rendered.iter().map(|(_, declared)| declared.len()).sum::<usize>())
        });
        let (declarations, status) = match written {
            Ok(count) => (count, merge_passes(self.output_dir, target)),
            Err(err) => {
                warn!(target_name = %target.name, error = %err, "output target failed");
                (0, TargetStatus::Failed {
                    error: err.to_string(),
                })
            }
        };
        TargetReport {
            name: target.name.clone(),
            category: target.category,
            destination: target.destination.clone(),
            declarations,
            status,
        }
    }

    /// Render every pass before anything is written, so a failing target leaves no files.
    fn render_target<'t>(
        &self,
        target: &'t OutputTarget,
    ) -> std::result::Result<Vec<(&'t Pass, Vec<Declaration>)>, TargetError> {
        let mut rendered = Vec::with_capacity(target.passes.len());
        for pass in &target.passes {
            let collection = self.cache.collection(&pass.sources)?;
            let themeable = match pass.selection {
                Selection::BrandTheme { .. } => {
                    ThemeableIndex::build(&collection, self.classification)
                }
                Selection::Sets { .. } => ThemeableIndex::default(),
            };
            let resolver = ReferenceResolver::new(&collection, &self.options);
            let selected = collection
                .iter()
                .filter(|token| pass.selection.matches(token, &themeable));
            let declared = declarations(selected, &resolver, self.mode, &self.options.prefix)?;
            rendered.push((pass, declared));
        }
        Ok(rendered)
    }

    fn write_passes(
        &self,
        target: &OutputTarget,
        rendered: &[(&Pass, Vec<Declaration>)],
    ) -> std::result::Result<(), TargetError> {
        for (pass, declared) in rendered {
            let path = self.output_dir.join(&pass.destination);
            write_atomic(&path, &render(declared, pass.layout))?;
            debug!(target_name = %target.name, path = %path.display(), declarations = declared.len(), "wrote pass");
        }
        Ok(())
    }
}

/// Fold every secondary pass file of `target` into its destination. A failed merge
/// leaves the remaining pass files in place.
fn merge_passes(output_dir: &Path, target: &OutputTarget) -> TargetStatus {
    let primary = output_dir.join(&target.destination);
    for pass in &target.passes {
        if pass.destination == target.destination {
            continue;
        }
        let secondary = output_dir.join(&pass.destination);
        if let Err(err) = merge_files(&primary, &secondary) {
            warn!(target_name = %target.name, error = %err, "leaving unmerged pass files");
            return TargetStatus::Unmerged {
                error: err.to_string(),
            };
        }
    }
    info!(target_name = %target.name, path = %primary.display(), "wrote output target");
    TargetStatus::Written
}

/// Write `contents` to `path` through a temp file in the same directory.
///
/// # Errors
///
/// Returns [`OutputError::CreateDir`] or [`OutputError::Write`].
pub fn write_atomic(path: &Path, contents: &str) -> std::result::Result<(), OutputError> {
    let parent = ensure_parent(path)?;
    persist(parent, path, contents).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Fold `secondary` into `primary` and remove `secondary`.
///
/// # Errors
///
/// Returns [`OutputError::MergeIo`] when either file cannot be read, the merged
/// file cannot be written, or `secondary` cannot be removed.
pub fn merge_files(primary: &Path, secondary: &Path) -> std::result::Result<(), OutputError> {
    let merge_io = |source: io::Error| OutputError::MergeIo {
        primary: primary.to_path_buf(),
        secondary: secondary.to_path_buf(),
        source,
    };
    let first = fs::read_to_string(primary).map_err(merge_io)?;
    let second = fs::read_to_string(secondary).map_err(merge_io)?;
    let parent = primary.parent().unwrap_or_else(|| Path::new("."));
    persist(parent, primary, &merge_rendered(&first, &second)).map_err(merge_io)?;
    fs::remove_file(secondary).map_err(merge_io)
}

fn ensure_parent(path: &Path) -> std::result::Result<&Path, OutputError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|source| OutputError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })?;
    Ok(parent)
}

fn persist(dir: &Path, path: &Path, contents: &str) -> io::Result<()> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::{BlockLayout, GENERATED_HEADER};
    use crate::token::SetId;
    use std::error::Error;

    type TestResult = std::result::Result<(), Box<dyn Error>>;

    #[test]
    fn write_atomic_creates_parents_and_replaces_content() -> TestResult {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("pine/components/pds-button/pds-button.tokens.scss");
        write_atomic(&path, "first")?;
        write_atomic(&path, "second")?;
        assert_eq!(fs::read_to_string(&path)?, "second");
        Ok(())
    }

    #[test]
    fn merge_files_folds_and_removes_secondary() -> TestResult {
        let temp = tempfile::tempdir()?;
        let primary = temp.path().join("_core.scss");
        let secondary = temp.path().join("_core-dark.scss");
        fs::write(&primary, format!("{GENERATED_HEADER}:root {{\n  --pine-a: #ffffff;\n}}\n"))?;
        fs::write(
            &secondary,
            format!("{GENERATED_HEADER}[data-theme=\"dark\"] {{\n  --pine-a: #000000;\n}}\n"),
        )?;

        merge_files(&primary, &secondary)?;
        let merged = fs::read_to_string(&primary)?;
        assert_eq!(
            merged,
            format!(
                "{GENERATED_HEADER}:root {{\n  --pine-a: #ffffff;\n}}\n\n[data-theme=\"dark\"] {{\n  --pine-a: #000000;\n}}\n"
            )
        );
        assert!(!secondary.exists());
        Ok(())
    }

    #[test]
    fn merge_files_reports_missing_inputs() -> TestResult {
        let temp = tempfile::tempdir()?;
        let primary = temp.path().join("_core.scss");
        fs::write(&primary, "x")?;
        let err = merge_files(&primary, &temp.path().join("missing.scss"))
            .err()
            .ok_or("expected merge failure")?;
        assert!(matches!(err, OutputError::MergeIo { .. }));
        assert_eq!(fs::read_to_string(&primary)?, "x");
        Ok(())
    }

    fn layered_core_target() -> OutputTarget {
        let pass = |set: &str, layout, destination: &str| Pass {
            sources: vec![SetId::new(set)],
            selection: Selection::Sets {
                sets: vec![SetId::new(set)],
            },
            layout,
            destination: PathBuf::from(destination),
        };
        OutputTarget {
            name: "core".to_string(),
            category: Category::Core,
            brand: None,
            mode: None,
            destination: PathBuf::from("base/_core.scss"),
            passes: vec![
                pass("core/light", BlockLayout::Light, "base/_core.scss"),
                pass("core/dark", BlockLayout::Dark, "base/_core-dark.scss"),
            ],
        }
    }

    #[test]
    fn merge_passes_folds_pass_files_into_destination() -> TestResult {
        let temp = tempfile::tempdir()?;
        write_atomic(&temp.path().join("base/_core.scss"), &format!("{GENERATED_HEADER}:root {{\n}}\n"))?;
        write_atomic(&temp.path().join("base/_core-dark.scss"), "")?;

        let status = merge_passes(temp.path(), &layered_core_target());
        assert_eq!(status, TargetStatus::Written);
        assert!(!temp.path().join("base/_core-dark.scss").exists());
        Ok(())
    }

    #[test]
    fn merge_passes_reports_unmerged_and_keeps_files() -> TestResult {
        let temp = tempfile::tempdir()?;
        let primary = temp.path().join("base/_core.scss");
        write_atomic(&primary, "light")?;

        let status = merge_passes(temp.path(), &layered_core_target());
        match status {
            TargetStatus::Unmerged { error } => assert!(error.contains("_core-dark.scss"), "{error}"),
            other => return Err(format!("unexpected status {other:?}").into()),
        }
        assert_eq!(fs::read_to_string(&primary)?, "light");
        Ok(())
    }

    #[test]
    fn report_success_tracks_failed_targets() {
        let mut report = BuildReport {
            token_root: PathBuf::from("tokens"),
            output_dir: PathBuf::from("out"),
            sets: 0,
            themes: Vec::new(),
            skipped_permutations: Vec::new(),
            targets: vec![TargetReport {
                name: "core".to_string(),
                category: Category::Core,
                destination: PathBuf::from("base/_core.scss"),
                declarations: 3,
                status: TargetStatus::Unmerged {
                    error: "io".to_string(),
                },
            }],
        };
        assert!(report.is_success());
        report.targets[0].status = TargetStatus::Failed {
            error: "unresolved".to_string(),
        };
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
    }
}
