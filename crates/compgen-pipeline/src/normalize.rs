//! Turns raw model output into a loadable component module.
//!
//! Pure and deterministic: the same input always produces the same output.
//! The default-export patch is textual, not parser-verified.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::GenerationError;
use crate::scan::{first_code_token, first_token_substring};

/// Shortest text, in characters, accepted as a component.
pub const MIN_COMPONENT_CHARS: usize = 50;

static FENCE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*`{3,}[ \t]*[A-Za-z0-9_+#.-]*[ \t]*\r?$").expect("static regex")
});

static LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^`{3,}[A-Za-z0-9_+#.-]*\s*").expect("static regex"));

static TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*`{3,}$").expect("static regex"));

static DEFAULT_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bexport\s+default\b|\bexport\s*\{[^}]*\bas\s+default\b[^}]*\}")
        .expect("static regex")
});

static FUNCTION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfunction\s+([A-Z][A-Za-z0-9_$]*)").expect("static regex")
});

static CONST_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bconst\s+([A-Z][A-Za-z0-9_$]*)\s*(?::[^=\n]*)?=").expect("static regex")
});

/// How the default export of a normalized component was obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportStatus {
    /// The model wrote one.
    Present,
    /// None existed; `export default <name>;` was appended.
    Synthesized(String),
    /// None existed and no capitalized declaration was found. The text was
    /// left untouched.
    Missing,
}

/// Output of [`normalize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedComponent {
    code: String,
    export: ExportStatus,
}

impl NormalizedComponent {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn into_code(self) -> String {
        self.code
    }

    pub fn export(&self) -> &ExportStatus {
        &self.export
    }

    pub fn has_default_export(&self) -> bool {
        !matches!(self.export, ExportStatus::Missing)
    }

    /// Fails with `ExportMissing` when no default export could be produced.
    pub fn require_default_export(self) -> Result<Self, GenerationError> {
        if self.has_default_export() {
            Ok(self)
        } else {
            Err(GenerationError::ExportMissing)
        }
    }
}

/// Normalizes the full accumulated model output.
///
/// 1. drops fence lines (```` ``` ```` optionally followed by a language tag),
///    plus a fence glued to the very start or end of the text;
/// 2. trims surrounding whitespace;
/// 3. discards everything before the first code-opening keyword;
/// 4. rejects text shorter than [`MIN_COMPONENT_CHARS`];
/// 5. appends a default export when one is missing and a component name can
///    be found.
///
/// A keyword inside a string literal ahead of the real code is treated as
/// the start of the code.
pub fn normalize(raw: &str) -> Result<NormalizedComponent, GenerationError> {
    let unfenced = strip_fences(raw);
    let mut code = skip_preamble(unfenced.trim()).to_string();

    if code.chars().count() < MIN_COMPONENT_CHARS {
        return Err(GenerationError::EmptyOutput);
    }

    let export = ensure_default_export(&mut code);
    Ok(NormalizedComponent { code, export })
}

fn strip_fences(raw: &str) -> String {
    let kept: Vec<&str> = raw
        .split('\n')
        .filter(|line| !FENCE_LINE.is_match(line))
        .collect();
    let joined = kept.join("\n");
    let trimmed = joined.trim();
    let trimmed = LEADING_FENCE.replace(trimmed, "");
    TRAILING_FENCE.replace(&trimmed, "").into_owned()
}

fn skip_preamble(text: &str) -> &str {
    let start = first_code_token(text).or_else(|| first_token_substring(text));
    match start {
        Some(offset) => &text[offset..],
        None => text,
    }
}

fn ensure_default_export(code: &mut String) -> ExportStatus {
    if DEFAULT_EXPORT.is_match(code) {
        return ExportStatus::Present;
    }
    let name = FUNCTION_NAME
        .captures(code)
        .or_else(|| CONST_NAME.captures(code))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    match name {
        Some(name) => {
            code.push_str(&format!("\n\nexport default {name};"));
            ExportStatus::Synthesized(name)
        }
        None => ExportStatus::Missing,
    }
}
