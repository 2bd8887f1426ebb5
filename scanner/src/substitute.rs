use std::collections::{HashMap, HashSet};

use diagnostic::{diagnostic_code::DiagnosticCode, error::EngineError};

use crate::pcd_tracker::PcdTracker;
use crate::splitter::{self, Span};

/// Default `IN`-exception list: macros allowed as the right operand of
/// `IN`/`in` even though they are not explicitly quoted in the source.
pub fn default_in_exceptions() -> HashSet<String> {
  ["TARGET", "TOOL_CHAIN_TAG", "ARCH", "FAMILY"]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Tracks the most recently completed whitespace-delimited word, so macro
/// substitution can tell whether a `$(NAME)` follows an `IN`/`in` operator.
#[derive(Default)]
struct WordTracker {
  current: String,
  last: String,
}

impl WordTracker {
  fn push_char(&mut self, c: char) {
    if c.is_alphanumeric() || c == '_' {
      self.current.push(c);
    } else {
      self.finish_word();
    }
  }

  fn push_text(&mut self, text: &str) {
    for c in text.chars() {
      self.push_char(c);
    }
  }

  fn finish_word(&mut self) {
    if !self.current.is_empty() {
      self.last = std::mem::take(&mut self.current);
    }
  }

  fn preceded_by_in(&mut self) -> bool {
    self.finish_word();
    self.last.eq_ignore_ascii_case("in")
  }
}

/// Expands every `$(NAME)` in `text` per the span-local rules, and records
/// platform-PCD references into `tracker` as a side effect.
///
/// Side effect ordering: conditional-PCD appends happen in left-to-right
/// span order, before any value evaluation of the substituted text.
pub fn substitute(
  text: &str,
  symbols: &HashMap<String, String>,
  tracker: &PcdTracker,
  in_exceptions: &HashSet<String>,
) -> Result<String, EngineError> {
  let spans = splitter::split(text)?;
  let mut out = String::new();
  let mut words = WordTracker::default();

  for span in &spans {
    match span {
      Span::Quoted(lit) => {
        let replaced = substitute_span(lit, symbols, &mut words, in_exceptions, true)?;
        out.push_str(&replaced);
      },
      Span::Unquoted(raw) => {
        if !raw.contains("$(") {
          for name in tracker.platform_pcds() {
            if raw.contains(name.as_str()) {
              tracker.record_conditional(name);
            }
          }
        }
        let replaced = substitute_span(raw, symbols, &mut words, in_exceptions, false)?;
        out.push_str(&replaced);
      },
    }
  }

  Ok(out)
}

fn substitute_span(
  text: &str,
  symbols: &HashMap<String, String>,
  words: &mut WordTracker,
  in_exceptions: &HashSet<String>,
  quoted: bool,
) -> Result<String, EngineError> {
  let chars: Vec<char> = text.chars().collect();
  let mut out = String::new();
  let mut i = 0;

  while i < chars.len() {
    if chars[i] == '$' && chars.get(i + 1) == Some(&'(') {
      words.push_char('$');
      words.push_char('(');
      let preceded_by_in = words.preceded_by_in();

      i += 2;
      let name_start = i;
      while i < chars.len() && chars[i] != ')' {
        i += 1;
      }
      if i >= chars.len() {
        return Err(EngineError::new(
          DiagnosticCode::BadMacroToken,
          format!("unterminated macro reference in `{}`", text),
        ));
      }
      let name: String = chars[name_start..i].iter().collect();
      i += 1;

      let replacement = expand_macro(&name, symbols, in_exceptions, preceded_by_in, quoted)?;
      words.push_text(&replacement);
      out.push_str(&replacement);
    } else {
      let c = chars[i];
      words.push_char(c);
      out.push(c);
      i += 1;
    }
  }

  Ok(out)
}

fn expand_macro(
  name: &str,
  symbols: &HashMap<String, String>,
  in_exceptions: &HashSet<String>,
  preceded_by_in: bool,
  quoted: bool,
) -> Result<String, EngineError> {
  let value = match symbols.get(name) {
    None => return Ok("0".to_string()),
    Some(v) => v,
  };

  if quoted {
    return Ok(value.clone());
  }

  let in_exception = in_exceptions.contains(name);
  if preceded_by_in && !in_exception {
    return Err(EngineError::new(
      DiagnosticCode::InOperand,
      format!("macro `{}` used as an IN operand is not in the exception list", name),
    ));
  }
  if in_exception {
    return Ok(format!("\"{}\"", value));
  }
  if !value.trim().is_empty() {
    return Ok(value.clone());
  }
  Ok("\"\"".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn symbols(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn undefined_macro_becomes_zero() {
    let tracker = PcdTracker::new(Vec::<String>::new());
    let out = substitute("$(UNDEF) == 0", &symbols(&[]), &tracker, &default_in_exceptions()).unwrap();
    assert_eq!(out, "0 == 0");
  }

  #[test]
  fn in_exception_macro_is_quoted() {
    let tracker = PcdTracker::new(Vec::<String>::new());
    let out = substitute(
      "\"IA32\" IN $(ARCH)",
      &symbols(&[("ARCH", "IA32 X64")]),
      &tracker,
      &default_in_exceptions(),
    )
    .unwrap();
    assert_eq!(out, "\"IA32\" IN \"IA32 X64\"");
  }

  #[test]
  fn non_exception_macro_after_in_fails() {
    let tracker = PcdTracker::new(Vec::<String>::new());
    let mut exceptions = HashSet::new();
    exceptions.insert("TARGET".to_string());
    let err = substitute(
      "\"IA32\" IN $(ARCH)",
      &symbols(&[("ARCH", "IA32 X64")]),
      &tracker,
      &exceptions,
    )
    .unwrap_err();
    assert_eq!(err.code, DiagnosticCode::InOperand);
  }

  #[test]
  fn quoted_span_never_wraps() {
    let tracker = PcdTracker::new(Vec::<String>::new());
    let out = substitute(
      "\"prefix $(ARCH) suffix\"",
      &symbols(&[("ARCH", "IA32")]),
      &tracker,
      &default_in_exceptions(),
    )
    .unwrap();
    assert_eq!(out, "\"prefix IA32 suffix\"");
  }

  #[test]
  fn empty_macro_becomes_empty_string_literal() {
    let tracker = PcdTracker::new(Vec::<String>::new());
    let out = substitute("$(EMPTY)", &symbols(&[("EMPTY", "  ")]), &tracker, &default_in_exceptions()).unwrap();
    assert_eq!(out, "\"\"");
  }

  #[test]
  fn platform_pcd_reference_is_recorded_as_conditional() {
    let tracker = PcdTracker::new(["gFoo.PcdBar".to_string()]);
    let out = substitute("gFoo.PcdBar == 1", &symbols(&[]), &tracker, &default_in_exceptions()).unwrap();
    assert_eq!(out, "gFoo.PcdBar == 1");
    assert!(tracker.conditional_pcds().contains("gFoo.PcdBar"));
  }

  #[test]
  fn unsubstituted_span_with_dollar_paren_is_not_scanned_for_pcds() {
    let tracker = PcdTracker::new(["gFoo.PcdBar".to_string()]);
    let _ = substitute(
      "$(gFoo.PcdBar) == 1",
      &symbols(&[]),
      &tracker,
      &default_in_exceptions(),
    )
    .unwrap();
    assert!(tracker.conditional_pcds().is_empty());
  }
}
