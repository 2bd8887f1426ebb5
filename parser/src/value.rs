use diagnostic::diagnostic_code::DiagnosticCode;

/// A typed runtime value produced by the evaluator.
///
/// `ByteString`/`WideString` hold the literal's content with quotes
/// stripped; the `L` prefix is tracked via the variant itself rather than
/// kept in the text, so width-mismatch comparisons (§4.4 rule 9) are a
/// simple variant match instead of a string-prefix check.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Integer(i128),
  Boolean(bool),
  ByteString(String),
  WideString(String),
  /// Canonical `{...}` text of a byte-array or GUID-structure literal.
  ByteArray(String),
  /// Passthrough canonical text — used when a PCD resolves to text that
  /// isn't itself one of the other typed shapes.
  RawText(String),
}

impl Value {
  pub fn is_text(&self) -> bool {
    matches!(self, Value::ByteString(_) | Value::WideString(_) | Value::RawText(_))
  }

  pub fn is_wide(&self) -> bool {
    matches!(self, Value::WideString(_))
  }

  pub fn truthy(&self) -> bool {
    match self {
      Value::Integer(i) => *i != 0,
      Value::Boolean(b) => *b,
      Value::ByteString(s) | Value::WideString(s) | Value::RawText(s) => !s.is_empty(),
      Value::ByteArray(_) => true,
    }
  }

  /// Canonical textual rendering, as produced by `real_value` mode (§4.5).
  pub fn to_canonical_text(&self) -> String {
    match self {
      Value::Integer(i) => i.to_string(),
      Value::Boolean(b) => b.to_string(),
      Value::ByteString(s) => format!("\"{}\"", s),
      Value::WideString(s) => format!("L\"{}\"", s),
      Value::ByteArray(s) => s.clone(),
      Value::RawText(s) => s.clone(),
    }
  }
}

/// A recoverable warning (§4.4 "Warning discipline"): a normal return value
/// carrying the result the evaluator should proceed with, never unwound as
/// a panic or a fatal `EngineError`.
#[derive(Debug, Clone)]
pub struct Warn<T> {
  pub result: T,
  pub code: DiagnosticCode,
  pub message: String,
}

impl<T> Warn<T> {
  pub fn new(result: T, code: DiagnosticCode, message: impl Into<String>) -> Self {
    Self {
      result,
      code,
      message: message.into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wide_and_narrow_strings_are_distinct_widths() {
    let wide = Value::WideString("abc".to_string());
    let narrow = Value::ByteString("abc".to_string());
    assert!(wide.is_wide());
    assert!(!narrow.is_wide());
  }

  #[test]
  fn canonical_text_wraps_narrow_strings_in_quotes() {
    assert_eq!(Value::ByteString("abc".into()).to_canonical_text(), "\"abc\"");
    assert_eq!(Value::WideString("abc".into()).to_canonical_text(), "L\"abc\"");
  }
}
