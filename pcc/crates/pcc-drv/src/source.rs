//! Source loading with `#include` expansion.
//!
//! A tiny textual preprocessor: `#include <name>` and `#include "name"`
//! splice the named file (resolved relative to the including file) in
//! place of the directive before the lexer ever runs. A depth guard
//! breaks include cycles.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::debug;

const MAX_INCLUDE_DEPTH: usize = 16;

/// Read a source file and expand its includes.
pub fn load(path: &Path) -> Result<String> {
    let text = expand(path, 0)?;
    debug!(target: "preprocessor", bytes = text.len(), "source loaded");
    Ok(text)
}

fn expand(path: &Path, depth: usize) -> Result<String> {
    if depth > MAX_INCLUDE_DEPTH {
        bail!(
            "include depth exceeds {MAX_INCLUDE_DEPTH} at {}; include cycle?",
            path.display()
        );
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read source file {}", path.display()))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut out = String::with_capacity(text.len());
    for (number, line) in text.lines().enumerate() {
        match include_target(line) {
            Some(Ok(name)) => {
                let included = dir.join(name);
                out.push_str(&expand(&included, depth + 1).with_context(|| {
                    format!("included from {}:{}", path.display(), number + 1)
                })?);
            }
            Some(Err(())) => {
                bail!("{}:{}: malformed #include directive", path.display(), number + 1)
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    Ok(out)
}

/// `Some(Ok(name))` for a well-formed include, `Some(Err(()))` for a
/// malformed one, `None` for ordinary lines.
fn include_target(line: &str) -> Option<Result<&str, ()>> {
    let rest = line.trim_start().strip_prefix("#include")?;
    let rest = rest.trim();
    let inner = rest
        .strip_prefix('<')
        .and_then(|r| r.strip_suffix('>'))
        .or_else(|| rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')));
    Some(match inner {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(()),
    })
}
