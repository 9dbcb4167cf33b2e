//! Path and content based language detection.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use super::LanguageId;

/// Bytes of content inspected when the extension is not enough.
pub const SAMPLE_LEN: usize = 4096;

lazy_static! {
    /// `#!/usr/bin/env python3`, `#!/usr/bin/python`, `#!/usr/bin/env -S deno run`
    static ref SHEBANG: Regex =
        Regex::new(r"^#!\s*(?:\S*/)?(?:env\s+(?:-\S+\s+)*)?([A-Za-z0-9_.+-]+)").unwrap();

    /// `-*- mode: python -*-` or `-*- rust -*-`
    static ref EMACS_MODELINE: Regex =
        Regex::new(r"-\*-\s*(?:.*?mode:\s*)?([A-Za-z0-9_+-]+)\s*(?:;.*)?-\*-").unwrap();

    /// `vim: set ft=go:` or `vi: filetype=python`
    static ref VIM_MODELINE: Regex =
        Regex::new(r"(?:vim?|ex):.*?\b(?:ft|filetype|syntax)=([A-Za-z0-9_+-]+)").unwrap();
}

/// Determine the language of a file.
///
/// The extension decides first. Content is consulted only to reject a `.ts`
/// file that is really a Qt translation (XML) file, and to recognize
/// extensionless scripts by shebang or editor modeline. Anything else is
/// `None`: classification fails closed rather than guessing.
pub fn classify(path: &Path, sample: Option<&[u8]>) -> Option<LanguageId> {
    let ext = path.extension().and_then(|e| e.to_str());

    if let Some(id) = ext.and_then(LanguageId::from_extension) {
        if id == LanguageId::Typescript {
            if let Some(sample) = sample {
                if looks_like_xml(sample) {
                    return None;
                }
            }
        }
        return Some(id);
    }

    let sample = sample_str(sample?);
    from_shebang(sample).or_else(|| from_modeline(sample))
}

fn looks_like_xml(sample: &[u8]) -> bool {
    let start = sample
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(sample.len());
    let head = &sample[start..];
    head.starts_with(b"<?xml") || head.starts_with(b"<!DOCTYPE TS") || head.starts_with(b"<TS")
}

fn from_shebang(sample: &str) -> Option<LanguageId> {
    let first = sample.lines().next()?;
    let interpreter = SHEBANG.captures(first)?.get(1)?.as_str();
    from_interpreter(interpreter)
}

fn from_interpreter(name: &str) -> Option<LanguageId> {
    let name = name.to_ascii_lowercase();
    if name.starts_with("python") || name == "pypy" || name == "pypy3" {
        return Some(LanguageId::Python);
    }
    match name.as_str() {
        "ts-node" | "deno" | "bun" | "tsx" | "esno" => Some(LanguageId::Typescript),
        "rust-script" | "run-cargo-script" | "cargo" => Some(LanguageId::Rust),
        "gorun" | "go" => Some(LanguageId::Go),
        _ => None,
    }
}

/// Modelines are honored in the first and last five lines.
fn from_modeline(sample: &str) -> Option<LanguageId> {
    let lines: Vec<&str> = sample.lines().collect();
    let head = lines.iter().take(5);
    let tail = lines.iter().rev().take(5.min(lines.len().saturating_sub(5)));

    head.chain(tail).find_map(|line| {
        let mode = EMACS_MODELINE
            .captures(line)
            .or_else(|| VIM_MODELINE.captures(line))?
            .get(1)?
            .as_str();
        from_mode(mode)
    })
}

fn from_mode(mode: &str) -> Option<LanguageId> {
    match mode.to_ascii_lowercase().as_str() {
        "python" | "py" | "python3" => Some(LanguageId::Python),
        "rust" | "rs" | "rustic" => Some(LanguageId::Rust),
        "go" | "golang" => Some(LanguageId::Go),
        "typescript" | "ts" => Some(LanguageId::Typescript),
        "tsx" | "typescriptreact" => Some(LanguageId::Tsx),
        _ => None,
    }
}

/// Decode as much of a possibly truncated sample as is valid UTF-8.
fn sample_str(sample: &[u8]) -> &str {
    match std::str::from_utf8(sample) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&sample[..e.valid_up_to()]).unwrap_or(""),
    }
}
