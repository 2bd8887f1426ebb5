use std::collections::HashMap;
use std::fs;
use std::path::Path;

use diagnostic::{diagnostic_code::DiagnosticCode, error::EngineError};

/// PCD-name -> textual value, exactly as the evaluator's symbol-table
/// collaborator contract expects (§6).
pub type SymbolTable = HashMap<String, String>;

/// Loads a `NAME=value` line-oriented symbol file: one assignment per
/// line, `#`-prefixed comments and blank lines ignored. A simplified
/// stand-in for a DSC's `DEFINE NAME = value` lines (no `!include`, no
/// sections — those belong to the build-driver model this crate excludes).
pub fn load_symbol_file(path: impl AsRef<Path>) -> Result<SymbolTable, EngineError> {
  let text = fs::read_to_string(path.as_ref()).map_err(|e| {
    EngineError::new(
      DiagnosticCode::BadExpression,
      format!("failed to read symbol file `{}`: {}", path.as_ref().display(), e),
    )
  })?;
  parse_symbol_text(&text)
}

pub fn parse_symbol_text(text: &str) -> Result<SymbolTable, EngineError> {
  let mut symbols = SymbolTable::new();
  for (lineno, raw_line) in text.lines().enumerate() {
    let line = raw_line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    let Some((name, value)) = line.split_once('=') else {
      return Err(EngineError::new(
        DiagnosticCode::Syntax,
        format!("line {}: expected `NAME=value`, got `{}`", lineno + 1, raw_line),
      ));
    };
    symbols.insert(name.trim().to_string(), value.trim().to_string());
  }
  Ok(symbols)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_assignments_skipping_comments_and_blanks() {
    let text = "# a platform DSC fragment\nFOO=1\n\nBAR = baz qux\n";
    let symbols = parse_symbol_text(text).unwrap();
    assert_eq!(symbols.get("FOO"), Some(&"1".to_string()));
    assert_eq!(symbols.get("BAR"), Some(&"baz qux".to_string()));
  }

  #[test]
  fn rejects_line_without_equals() {
    let err = parse_symbol_text("NOT_AN_ASSIGNMENT").unwrap_err();
    assert_eq!(err.code, DiagnosticCode::Syntax);
  }
}
