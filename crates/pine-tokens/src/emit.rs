//! Stylesheet emission: render resolved declarations into CSS blocks and merge
//! light/dark passes.

use serde::Serialize;

use crate::error::ResolveError;
use crate::resolve::{ReferenceResolver, ResolveMode};
use crate::token::{Token, css_variable};

/// Banner written at the top of every generated file.
pub const GENERATED_HEADER: &str =
    "/**\n * Do not edit directly, this file was auto-generated.\n */\n\n";

const DARK_MEDIA: &str = "@media (prefers-color-scheme: dark)";
const DARK_ATTRIBUTE: &str = "[data-theme=\"dark\"]";

/// Block structure of a rendered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockLayout {
    /// Everything in one `:root` block.
    Light,
    /// Everything in the dark media query and the `[data-theme="dark"]` block.
    Dark,
    /// Light declarations in `:root`, then dark declarations in dark blocks.
    All,
    /// Everything in one `:host` block.
    Host,
}

/// One custom property declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Property name including the leading `--`.
    pub name: String,
    /// Resolved value.
    pub value: String,
    /// Whether the token came from a dark set.
    pub dark: bool,
}

impl Declaration {
    fn line(&self, indent: &str) -> String {
        format!("{indent}{}: {};", self.name, self.value)
    }
}

/// Resolve `tokens` into declarations, in iteration order.
///
/// # Errors
///
/// Returns the first [`ResolveError`] hit.
pub fn declarations<'t>(
    tokens: impl IntoIterator<Item = &'t Token>,
    resolver: &ReferenceResolver<'_>,
    mode: ResolveMode,
    prefix: &str,
) -> Result<Vec<Declaration>, ResolveError> {
    tokens
        .into_iter()
        .map(|token| {
            Ok(Declaration {
                name: css_variable(prefix, &token.path),
                value: resolver.resolve(token, mode)?,
                dark: token.source_set.is_dark(),
            })
        })
        .collect()
}

/// Render declarations with `layout`. No declarations render to an empty string.
#[must_use]
pub fn render(declarations: &[Declaration], layout: BlockLayout) -> String {
    if declarations.is_empty() {
        return String::new();
    }

    let mut out = String::from(GENERATED_HEADER);
    match layout {
        BlockLayout::Light => push_block(&mut out, ":root", declarations.iter()),
        BlockLayout::Host => push_block(&mut out, ":host", declarations.iter()),
        BlockLayout::Dark => push_dark_blocks(&mut out, declarations.iter()),
        BlockLayout::All => {
            let (dark, light): (Vec<&Declaration>, Vec<&Declaration>) =
                declarations.iter().partition(|declaration| declaration.dark);
            if !light.is_empty() {
                push_block(&mut out, ":root", light.into_iter());
            }
            if !dark.is_empty() {
                if out.len() > GENERATED_HEADER.len() {
                    out.push('\n');
                }
                push_dark_blocks(&mut out, dark.into_iter());
            }
        }
    }
    out
}

fn push_block<'d>(out: &mut String, selector: &str, declarations: impl Iterator<Item = &'d Declaration>) {
    out.push_str(selector);
    out.push_str(" {\n");
    for declaration in declarations {
        out.push_str(&declaration.line("  "));
        out.push('\n');
    }
    out.push_str("}\n");
}

fn push_dark_blocks<'d>(out: &mut String, declarations: impl Iterator<Item = &'d Declaration> + Clone) {
    out.push_str(DARK_MEDIA);
    out.push_str(" {\n  :root {\n");
    for declaration in declarations.clone() {
        out.push_str(&declaration.line("    "));
        out.push('\n');
    }
    out.push_str("  }\n}\n\n");
    push_block(out, DARK_ATTRIBUTE, declarations);
}

/// Remove a leading generated header, if any.
#[must_use]
pub fn strip_header(text: &str) -> &str {
    let trimmed = text.trim_start();
    trimmed
        .strip_prefix(GENERATED_HEADER.trim_end())
        .unwrap_or(trimmed)
}

/// Fold `secondary` into `primary`, keeping exactly one header.
#[must_use]
pub fn merge_rendered(primary: &str, secondary: &str) -> String {
    let first = primary.trim();
    let second = strip_header(secondary).trim();
    match (first.is_empty(), second.is_empty()) {
        (false, false) => format!("{first}\n\n{second}\n"),
        (false, true) => format!("{first}\n"),
        (true, false) => format!("{}\n", secondary.trim()),
        (true, true) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResolverOptions;
    use crate::store::{TokenCollection, parse_token_set};
    use crate::token::{ReferenceSyntax, SetId};
    use std::error::Error;
    use std::path::Path;

    type TestResult = std::result::Result<(), Box<dyn Error>>;

    fn declaration(name: &str, value: &str, dark: bool) -> Declaration {
        Declaration {
            name: name.to_string(),
            value: value.to_string(),
            dark,
        }
    }

    #[test]
    fn light_layout_renders_root_block() {
        let rendered = render(
            &[declaration("--pine-color-white", "#ffffff", false)],
            BlockLayout::Light,
        );
        assert_eq!(
            rendered,
            format!("{GENERATED_HEADER}:root {{\n  --pine-color-white: #ffffff;\n}}\n")
        );
    }

    #[test]
    fn dark_layout_renders_media_and_attribute_blocks() {
        let rendered = render(
            &[declaration("--pine-color-bg", "#000000", true)],
            BlockLayout::Dark,
        );
        assert_eq!(
            rendered,
            format!(
                "{GENERATED_HEADER}@media (prefers-color-scheme: dark) {{\n  :root {{\n    --pine-color-bg: #000000;\n  }}\n}}\n\n[data-theme=\"dark\"] {{\n  --pine-color-bg: #000000;\n}}\n"
            )
        );
    }

    #[test]
    fn all_layout_partitions_light_then_dark() {
        let rendered = render(
            &[
                declaration("--pine-a", "1px", false),
                declaration("--pine-b", "#000000", true),
                declaration("--pine-c", "2px", false),
            ],
            BlockLayout::All,
        );
        assert_eq!(
            rendered,
            format!(
                "{GENERATED_HEADER}:root {{\n  --pine-a: 1px;\n  --pine-c: 2px;\n}}\n\n@media (prefers-color-scheme: dark) {{\n  :root {{\n    --pine-b: #000000;\n  }}\n}}\n\n[data-theme=\"dark\"] {{\n  --pine-b: #000000;\n}}\n"
            )
        );

        let dark_only = render(&[declaration("--pine-b", "#000000", true)], BlockLayout::All);
        assert_eq!(dark_only, render(&[declaration("--pine-b", "#000000", true)], BlockLayout::Dark));
    }

    #[test]
    fn host_layout_and_empty_input() {
        let rendered = render(
            &[declaration("--pds-button-bg", "var(--pine-color-brand)", false)],
            BlockLayout::Host,
        );
        assert!(rendered.ends_with(":host {\n  --pds-button-bg: var(--pine-color-brand);\n}\n"));
        assert_eq!(render(&[], BlockLayout::All), "");
    }

    #[test]
    fn merge_keeps_one_header() {
        let light = render(&[declaration("--pine-a", "#ffffff", false)], BlockLayout::Light);
        let dark = render(&[declaration("--pine-a", "#000000", true)], BlockLayout::Dark);
        let merged = merge_rendered(&light, &dark);

        assert_eq!(merged.matches("Do not edit directly").count(), 1);
        assert!(merged.starts_with(GENERATED_HEADER));
        assert!(merged.contains("}\n\n@media (prefers-color-scheme: dark)"));
        assert!(merged.ends_with("}\n"));
        assert!(!merged.ends_with("\n\n"));
    }

    #[test]
    fn merge_drops_empty_halves() {
        let light = render(&[declaration("--pine-a", "#ffffff", false)], BlockLayout::Light);
        let dark = render(&[declaration("--pine-a", "#000000", true)], BlockLayout::Dark);

        assert_eq!(merge_rendered(&light, ""), light);
        assert_eq!(merge_rendered("", &dark), dark);
        assert_eq!(merge_rendered(&light, GENERATED_HEADER), light);
        assert_eq!(merge_rendered("", ""), "");
    }

    #[test]
    fn declarations_use_prefix_and_mark_dark_sets() -> TestResult {
        let syntax = ReferenceSyntax::new()?;
        let light = parse_token_set(
            SetId::new("core/light"),
            Path::new("core/light.json"),
            r##"{ "color": { "text": { "@": { "value": "#111", "type": "color" } } } }"##,
            &syntax,
        )?;
        let dark = parse_token_set(
            SetId::new("core/dark"),
            Path::new("core/dark.json"),
            r##"{ "color": { "bg": { "value": "{color.text.@}", "type": "color" } } }"##,
            &syntax,
        )?;
        let collection = TokenCollection::merge([&light, &dark]);
        let options = ResolverOptions::new("pine", 32);
        let resolver = ReferenceResolver::new(&collection, &options);

        let declared = declarations(collection.iter(), &resolver, ResolveMode::CssVariable, "pine")?;
        assert_eq!(
            declared,
            vec![
                declaration("--pine-color-text", "#111111", false),
                declaration("--pine-color-bg", "var(--pine-color-text)", true),
            ]
        );
        Ok(())
    }
}
