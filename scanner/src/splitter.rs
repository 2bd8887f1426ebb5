use diagnostic::{diagnostic_code::DiagnosticCode, error::EngineError};

/// A span of expression text, alternating quoted and unquoted.
#[derive(Debug, Clone, PartialEq)]
pub enum Span {
  /// Text outside of any quote, macro references live here.
  Unquoted(String),
  /// Text including the surrounding quote characters.
  Quoted(String),
}

/// Partitions `text` into alternating quoted/unquoted spans.
///
/// Only `"` delimits a span, matching `SplitString`'s behavior in the
/// original tool; a bare `'` is ordinary unquoted text and is left for the
/// lexer to tokenize as a single-character literal.
///
/// `\\` and `\"` inside a quoted span are normalized to the literal
/// character they escape, so an escaped quote never toggles quote state.
pub fn split(text: &str) -> Result<Vec<Span>, EngineError> {
  let chars: Vec<char> = text.chars().collect();
  let mut spans = Vec::new();
  let mut cur = String::new();
  let mut i = 0;

  while i < chars.len() {
    let c = chars[i];
    if c == '"' {
      if !cur.is_empty() {
        spans.push(Span::Unquoted(std::mem::take(&mut cur)));
      }
      let quote = c;
      let mut lit = String::new();
      lit.push(quote);
      i += 1;
      let mut closed = false;
      while i < chars.len() {
        let d = chars[i];
        if d == '\\' && i + 1 < chars.len() && (chars[i + 1] == quote || chars[i + 1] == '\\') {
          lit.push(chars[i + 1]);
          i += 2;
          continue;
        }
        if d == quote {
          lit.push(quote);
          i += 1;
          closed = true;
          break;
        }
        lit.push(d);
        i += 1;
      }
      if !closed {
        return Err(EngineError::new(
          DiagnosticCode::BadStringToken,
          format!("unterminated quote in `{}`", text),
        ));
      }
      spans.push(Span::Quoted(lit));
    } else {
      cur.push(c);
      i += 1;
    }
  }

  if !cur.is_empty() {
    spans.push(Span::Unquoted(cur));
  }

  Ok(spans)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn splits_alternating_spans() {
    let spans = split(r#"$(A) == "b c" && $(D)"#).unwrap();
    assert_eq!(
      spans,
      vec![
        Span::Unquoted("$(A) == ".to_string()),
        Span::Quoted("\"b c\"".to_string()),
        Span::Unquoted(" && $(D)".to_string()),
      ]
    );
  }

  #[test]
  fn escaped_quote_does_not_close_span() {
    let spans = split(r#""a\"b""#).unwrap();
    assert_eq!(spans, vec![Span::Quoted("\"a\"b\"".to_string())]);
  }

  #[test]
  fn unterminated_quote_is_bad_string_token() {
    let err = split(r#""unterminated"#).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::BadStringToken);
  }

  #[test]
  fn single_quote_does_not_start_a_span() {
    let spans = split("$(A) == 'a' && $(B)").unwrap();
    assert_eq!(spans, vec![Span::Unquoted("$(A) == 'a' && $(B)".to_string())]);
  }
}
