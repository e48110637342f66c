//! Renderers for command results.

use std::io::Write;

use anyhow::{Context, Result};
use pine_tokens::{BuildReport, TargetStatus};
use serde::Serialize;

/// Pretty-print `value` as JSON followed by a newline.
pub(crate) fn print_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to serialise output")?;
    writeln!(out).context("failed to write output")
}

/// One line per target plus a totals line.
pub(crate) fn print_build_summary(out: &mut dyn Write, report: &BuildReport) -> Result<()> {
    for target in &report.targets {
        let line = match &target.status {
            TargetStatus::Written => format!(
                "wrote {} ({} declarations)",
                target.destination.display(),
                target.declarations
            ),
            TargetStatus::Unmerged { error } => format!(
                "wrote {} unmerged: {error}",
                target.destination.display()
            ),
            TargetStatus::Failed { error } => format!("failed {}: {error}", target.name),
        };
        writeln!(out, "{line}").context("failed to write output")?;
    }
    for skipped in &report.skipped_permutations {
        writeln!(out, "skipped theme {}: {}", skipped.name, skipped.reason)
            .context("failed to write output")?;
    }
    let failed = report.failures().count();
    writeln!(
        out,
        "{} targets, {} failed",
        report.targets.len(),
        failed
    )
    .context("failed to write output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pine_tokens::{Category, TargetReport};
    use std::path::PathBuf;

    #[test]
    fn summary_lists_targets_and_totals() -> Result<()> {
        let report = BuildReport {
            token_root: PathBuf::from("tokens"),
            output_dir: PathBuf::from("out"),
            sets: 2,
            themes: Vec::new(),
            skipped_permutations: Vec::new(),
            targets: vec![
                TargetReport {
                    name: "core".to_string(),
                    category: Category::Core,
                    destination: PathBuf::from("base/_core.scss"),
                    declarations: 4,
                    status: TargetStatus::Written,
                },
                TargetReport {
                    name: "semantic".to_string(),
                    category: Category::Semantic,
                    destination: PathBuf::from("base/_semantic.scss"),
                    declarations: 0,
                    status: TargetStatus::Failed {
                        error: "unresolved reference {color.x} in token 'text'".to_string(),
                    },
                },
            ],
        };
        let mut out = Vec::new();
        print_build_summary(&mut out, &report)?;
        let text = String::from_utf8(out)?;
        assert_eq!(
            text,
            "wrote base/_core.scss (4 declarations)\nfailed semantic: unresolved reference {color.x} in token 'text'\n2 targets, 1 failed\n"
        );
        Ok(())
    }

    #[test]
    fn json_output_ends_with_newline() -> Result<()> {
        let mut out = Vec::new();
        print_json(&mut out, &vec!["a", "b"])?;
        assert_eq!(String::from_utf8(out)?, "[\n  \"a\",\n  \"b\"\n]\n");
        Ok(())
    }
}
