//! Composite value formatting and literal normalisation.
//!
//! # Design
//! - Shapes are picked from the declared type first, then from the key set.
//! - Every sub-value is rendered through a [`PartResolver`], so a typography token
//!   may mix literals and `var()` references depending on how each part was authored.
//! - Unknown shapes degrade to a space-joined rendering with a warning.

use indexmap::IndexMap;
use tracing::warn;

use crate::error::ResolveError;
use crate::token::{Scalar, TokenPath, TokenType, TokenValue};

const TYPOGRAPHY_KEYS: &[&str] = &[
    "fontFamily",
    "fontWeight",
    "fontSize",
    "lineHeight",
    "letterSpacing",
];
const BORDER_KEYS: &[&str] = &["width", "style", "color"];
const SHADOW_KEYS: &[&str] = &["x", "y", "blur", "spread", "color", "type"];

/// Renders one composite field, either as a literal or through the active
/// reference mode.
pub trait PartResolver {
    /// Render `value` using `hint` for literal normalisation. `literal_only`
    /// forces terminal literals even when references are being preserved.
    ///
    /// # Errors
    ///
    /// Propagates reference resolution failures.
    fn part(
        &mut self,
        value: &TokenValue,
        hint: &TokenType,
        literal_only: bool,
    ) -> Result<String, ResolveError>;
}

/// Recognised composite layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeShape {
    /// `fontWeight fontSize/lineHeight fontFamily`.
    Typography,
    /// `width style color` (borders and outlines).
    Border,
    /// `[inset ]x y blur spread color`.
    Shadow,
    /// No recognised key set.
    Unknown,
}

/// Pick a shape from the declared type, falling back to the key set.
#[must_use]
pub fn detect_shape(kind: &TokenType, fields: &IndexMap<String, TokenValue>) -> CompositeShape {
    let has_any = |keys: &[&str]| fields.keys().any(|key| keys.contains(&key.as_str()));
    let only = |keys: &[&str]| fields.keys().all(|key| keys.contains(&key.as_str()));

    match kind {
        TokenType::Typography if has_any(TYPOGRAPHY_KEYS) => return CompositeShape::Typography,
        TokenType::Border | TokenType::Outline if has_any(BORDER_KEYS) => {
            return CompositeShape::Border;
        }
        TokenType::Shadow if has_any(SHADOW_KEYS) => return CompositeShape::Shadow,
        _ => {}
    }

    if fields.is_empty() {
        CompositeShape::Unknown
    } else if only(TYPOGRAPHY_KEYS) {
        CompositeShape::Typography
    } else if only(BORDER_KEYS) {
        CompositeShape::Border
    } else if only(SHADOW_KEYS) && fields.contains_key("x") && fields.contains_key("y") {
        CompositeShape::Shadow
    } else {
        CompositeShape::Unknown
    }
}

/// Format a composite value into its CSS shorthand.
///
/// # Errors
///
/// Propagates reference resolution failures from individual fields.
pub fn format_composite<R: PartResolver>(
    kind: &TokenType,
    fields: &IndexMap<String, TokenValue>,
    origin: &TokenPath,
    resolver: &mut R,
) -> Result<String, ResolveError> {
    match detect_shape(kind, fields) {
        CompositeShape::Typography => format_typography(fields, resolver),
        CompositeShape::Border => format_border(fields, resolver),
        CompositeShape::Shadow => format_shadow(fields, resolver),
        CompositeShape::Unknown => {
            warn!(
                token = %origin,
                keys = ?fields.keys().collect::<Vec<_>>(),
                "unknown composite shape; emitting best-effort value"
            );
            let other = TokenType::Other(String::new());
            let mut parts = Vec::with_capacity(fields.len());
            for value in fields.values() {
                parts.push(resolver.part(value, &other, false)?);
            }
            Ok(parts.join(" "))
        }
    }
}

fn field<R: PartResolver>(
    fields: &IndexMap<String, TokenValue>,
    key: &str,
    hint: &TokenType,
    literal_only: bool,
    resolver: &mut R,
) -> Result<Option<String>, ResolveError> {
    fields
        .get(key)
        .map(|value| resolver.part(value, hint, literal_only))
        .transpose()
}

fn format_typography<R: PartResolver>(
    fields: &IndexMap<String, TokenValue>,
    resolver: &mut R,
) -> Result<String, ResolveError> {
    let weight = field(fields, "fontWeight", &TokenType::FontWeight, false, resolver)?;
    let size = field(fields, "fontSize", &TokenType::Dimension, false, resolver)?;
    let line_height = field(fields, "lineHeight", &TokenType::LineHeight, false, resolver)?;
    let family = field(fields, "fontFamily", &TokenType::FontFamily, false, resolver)?;

    let size = match (size, line_height) {
        (Some(size), Some(line_height)) => Some(format!("{size}/{line_height}")),
        (size, _) => size,
    };

    Ok([weight, size, family]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" "))
}

fn format_border<R: PartResolver>(
    fields: &IndexMap<String, TokenValue>,
    resolver: &mut R,
) -> Result<String, ResolveError> {
    let style_hint = TokenType::Other("strokeStyle".to_string());
    let width = field(fields, "width", &TokenType::Dimension, false, resolver)?;
    let style = field(fields, "style", &style_hint, true, resolver)?;
    let color = field(fields, "color", &TokenType::Color, false, resolver)?;

    Ok([width, style, color]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" "))
}

fn format_shadow<R: PartResolver>(
    fields: &IndexMap<String, TokenValue>,
    resolver: &mut R,
) -> Result<String, ResolveError> {
    let inset = matches!(
        fields.get("type"),
        Some(TokenValue::Literal(Scalar::Text(kind))) if kind == "innerShadow" || kind == "inset"
    );
    let mut parts = Vec::new();
    if inset {
        parts.push("inset".to_string());
    }
    for key in ["x", "y", "blur", "spread"] {
        if let Some(value) = field(fields, key, &TokenType::Dimension, false, resolver)? {
            parts.push(value);
        }
    }
    if let Some(color) = field(fields, "color", &TokenType::Color, false, resolver)? {
        parts.push(color);
    }
    Ok(parts.join(" "))
}

/// Normalise a literal according to the type it is rendered as.
#[must_use]
pub fn format_literal(scalar: &Scalar, hint: &TokenType) -> String {
    match (scalar, hint) {
        (Scalar::Number(number), TokenType::Dimension) => format!("{number}px"),
        (Scalar::Text(text), TokenType::Dimension) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() && trimmed.parse::<f64>().is_ok() {
                format!("{trimmed}px")
            } else {
                text.clone()
            }
        }
        (Scalar::Text(text), TokenType::Color) => normalize_color(text),
        _ => scalar.to_string(),
    }
}

/// Lower-case hex for hex and `rgb()`/`rgba()` colors; other syntaxes pass through.
#[must_use]
pub fn normalize_color(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        return normalize_hex(hex).unwrap_or_else(|| raw.to_string());
    }

    let lowered = trimmed.to_ascii_lowercase();
    let inner = lowered
        .strip_prefix("rgba(")
        .or_else(|| lowered.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'));
    inner
        .and_then(rgb_to_hex)
        .unwrap_or_else(|| raw.to_string())
}

fn normalize_hex(hex: &str) -> Option<String> {
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let lowered = hex.to_ascii_lowercase();
    match lowered.len() {
        3 | 4 => Some(format!(
            "#{}",
            lowered
                .chars()
                .flat_map(|ch| [ch, ch])
                .collect::<String>()
        )),
        6 | 8 => Some(format!("#{lowered}")),
        _ => None,
    }
}

fn rgb_to_hex(arguments: &str) -> Option<String> {
    let args: Vec<&str> = arguments.split(',').map(str::trim).collect();
    let (channels, alpha) = match args.as_slice() {
        [hex, alpha] if hex.starts_with('#') => {
            let base = normalize_hex(hex.trim_start_matches('#'))?;
            let digits = base.trim_start_matches('#');
            let channels = [
                u8::from_str_radix(&digits[0..2], 16).ok()?,
                u8::from_str_radix(&digits[2..4], 16).ok()?,
                u8::from_str_radix(&digits[4..6], 16).ok()?,
            ];
            (channels, Some(*alpha))
        }
        [r, g, b] => ([channel(r)?, channel(g)?, channel(b)?], None),
        [r, g, b, alpha] => ([channel(r)?, channel(g)?, channel(b)?], Some(*alpha)),
        _ => return None,
    };

    let mut hex = format!("#{:02x}{:02x}{:02x}", channels[0], channels[1], channels[2]);
    if let Some(alpha) = alpha {
        let alpha = alpha_byte(alpha)?;
        if alpha != u8::MAX {
            hex.push_str(&format!("{alpha:02x}"));
        }
    }
    Some(hex)
}

#[allow(clippy::cast_possible_truncation)]
fn channel(raw: &str) -> Option<u8> {
    let value = raw.parse::<f64>().ok()?;
    if !(0.0..=255.0).contains(&value) {
        return None;
    }
    u8::try_from(value.round() as i64).ok()
}

#[allow(clippy::cast_possible_truncation)]
fn alpha_byte(raw: &str) -> Option<u8> {
    let value = match raw.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().ok()? / 100.0,
        None => raw.parse::<f64>().ok()?,
    };
    if !(0.0..=1.0).contains(&value) {
        return None;
    }
    u8::try_from((value * 255.0).round() as i64).ok()
}
