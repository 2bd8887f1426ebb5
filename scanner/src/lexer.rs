use std::sync::OnceLock;

use regex::Regex;

use diagnostic::{diagnostic_code::DiagnosticCode, error::EngineError};

use crate::token::RawToken;

/// Max literal length per field of an 11-field GUID structure literal:
/// `{Data1,Data2,Data3,{Data4[0..8]}}`.
const GUID_STRUCT_LENGTHS: [usize; 11] = [11, 6, 6, 5, 4, 4, 4, 4, 4, 4, 6];

fn guid_pattern() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}").unwrap()
  })
}

/// Low-level cursor over an expression's characters. Produces `RawToken`s
/// on demand; has no notion of the symbol table or operator precedence.
#[derive(Clone)]
pub struct Lexer {
  chars: Vec<char>,
  pos: usize,
  /// Whether `?` occurs anywhere in the expression, checked once up front.
  /// Mirrors the original tokenizer's `'?' in self._Expr` ternary-closing
  /// check: `:` is an identifier character everywhere EXCEPT when a `?` is
  /// live somewhere in the expression, in which case `:` always closes the
  /// ternary instead of folding into the identifier being scanned.
  has_question: bool,
}

impl Lexer {
  pub fn new(text: &str) -> Self {
    Self {
      chars: text.chars().collect(),
      pos: 0,
      has_question: text.contains('?'),
    }
  }

  pub fn position(&self) -> usize {
    self.pos
  }

  pub fn set_position(&mut self, pos: usize) {
    self.pos = pos;
  }

  pub fn is_at_end(&self) -> bool {
    self.remaining_str().trim().is_empty()
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn peek_at(&self, offset: usize) -> Option<char> {
    self.chars.get(self.pos + offset).copied()
  }

  fn advance(&mut self) -> Option<char> {
    let c = self.peek();
    if c.is_some() {
      self.pos += 1;
    }
    c
  }

  fn skip_ws(&mut self) {
    while matches!(self.peek(), Some(c) if c.is_whitespace()) {
      self.pos += 1;
    }
  }

  fn remaining_str(&self) -> String {
    self.chars[self.pos..].iter().collect()
  }

  fn looks_like_guid(&self) -> bool {
    let rest = self.remaining_str();
    match guid_pattern().find(&rest) {
      Some(m) => {
        let after = rest[m.end()..].chars().next();
        !matches!(after, Some(c) if c.is_alphanumeric() || c == '_')
      },
      None => false,
    }
  }

  /// Yields the next raw token, or `RawToken::Eof` once the input is
  /// exhausted.
  pub fn next_token(&mut self) -> Result<RawToken, EngineError> {
    self.skip_ws();
    let Some(c) = self.peek() else {
      return Ok(RawToken::Eof);
    };

    match c {
      '(' => {
        self.advance();
        Ok(RawToken::LParen)
      },
      ')' => {
        self.advance();
        Ok(RawToken::RParen)
      },
      ':' if self.has_question => {
        self.advance();
        Ok(RawToken::Colon)
      },
      '?' => {
        self.advance();
        Ok(RawToken::Question)
      },
      '{' => self.scan_brace_array(),
      '"' | '\'' => self.scan_quoted(false),
      'L' if matches!(self.peek_at(1), Some('"') | Some('\'')) => {
        self.advance();
        self.scan_quoted(true)
      },
      _ if self.looks_like_guid() => self.scan_guid(),
      _ if c.is_ascii_digit() => Ok(self.scan_number()),
      _ if c.is_alphabetic() || c == '_' || c == ':' => self.scan_ident_or_op(),
      _ => self.scan_operator(),
    }
  }

  fn scan_number(&mut self) -> RawToken {
    let mut text = String::new();
    if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
      text.push(self.advance().unwrap());
      text.push(self.advance().unwrap());
      while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
        text.push(self.advance().unwrap());
      }
    } else {
      while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
        text.push(self.advance().unwrap());
      }
    }
    RawToken::Number(text)
  }

  fn scan_quoted(&mut self, wide: bool) -> Result<RawToken, EngineError> {
    let quote = self.advance().expect("caller checked quote char is present");
    let single_quote = quote == '\'';
    let mut text = String::new();
    loop {
      match self.advance() {
        None => {
          return Err(EngineError::new(
            DiagnosticCode::BadStringToken,
            "unterminated quoted literal",
          ));
        },
        Some(c) if c == '\\' && matches!(self.peek(), Some(d) if d == quote || d == '\\') => {
          text.push(self.advance().unwrap());
        },
        Some(c) if c == quote => break,
        Some(c) => text.push(c),
      }
    }
    Ok(RawToken::Quoted {
      wide,
      single_quote,
      text,
    })
  }

  fn scan_guid(&mut self) -> Result<RawToken, EngineError> {
    let rest = self.remaining_str();
    let m = guid_pattern()
      .find(&rest)
      .expect("looks_like_guid already matched");
    let len = m.as_str().chars().count();
    let text: String = (0..len).map(|_| self.advance().unwrap()).collect();
    Ok(RawToken::Guid(text))
  }

  fn scan_ident_or_op(&mut self) -> Result<RawToken, EngineError> {
    let mut text = String::new();
    while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '.' || (c == ':' && !self.has_question)) {
      text.push(self.advance().unwrap());
    }

    if matches!(self.peek(), Some('(')) && is_typed_width_prefix(&text) {
      return self.scan_typed_width(&text);
    }
    if is_operator_word(&text) {
      return Ok(RawToken::Op(text.to_uppercase()));
    }
    Ok(RawToken::Ident(text))
  }

  fn scan_typed_width(&mut self, width_text: &str) -> Result<RawToken, EngineError> {
    let width = match width_text {
      "UINT8" => 8,
      "UINT16" => 16,
      "UINT32" => 32,
      "UINT64" => 64,
      _ => unreachable!("caller checked is_typed_width_prefix"),
    };
    self.advance(); // consume '('
    let mut inner = String::new();
    let mut depth = 1usize;
    loop {
      match self.advance() {
        None => {
          return Err(EngineError::new(
            DiagnosticCode::Syntax,
            format!("unterminated UINT{}(...) literal", width),
          ));
        },
        Some('(') => {
          depth += 1;
          inner.push('(');
        },
        Some(')') => {
          depth -= 1;
          if depth == 0 {
            break;
          }
          inner.push(')');
        },
        Some(c) => inner.push(c),
      }
    }
    Ok(RawToken::TypedWidth { width, inner })
  }

  /// Captures the extent of a `{...}` literal via brace-depth counting, then
  /// splits its interior on commas WITHOUT regard to nesting. A GUID
  /// structure literal's nested `{Data4 bytes}` therefore contributes its
  /// own comma-separated pieces to the flat field list — this is what makes
  /// an 11-field shape with a brace-opening 4th field observable at all.
  fn scan_brace_array(&mut self) -> Result<RawToken, EngineError> {
    self.advance(); // consume outer '{'
    let mut inner = String::new();
    let mut depth = 1usize;

    loop {
      match self.advance() {
        None => {
          return Err(EngineError::new(DiagnosticCode::BadArrayToken, "unterminated brace array"));
        },
        Some('{') => {
          depth += 1;
          inner.push('{');
        },
        Some('}') => {
          depth -= 1;
          if depth == 0 {
            break;
          }
          inner.push('}');
        },
        Some(c) => inner.push(c),
      }
    }

    let fields: Vec<String> = inner.split(',').map(|f| f.trim().to_string()).collect();

    if fields.len() == 11 && fields[3].starts_with('{') {
      for (field, max_len) in fields.iter().zip(GUID_STRUCT_LENGTHS.iter()) {
        if field.len() > *max_len {
          return Err(EngineError::new(
            DiagnosticCode::BadArrayToken,
            format!("GUID structure field `{}` exceeds {} characters", field, max_len),
          ));
        }
      }
      return Ok(RawToken::ByteArray(format!("{{{}}}", fields.join(","))));
    }

    for field in &fields {
      if field.len() > 4 {
        return Err(EngineError::new(
          DiagnosticCode::BadArrayElement,
          format!("byte array element `{}` exceeds 4 characters", field),
        ));
      }
    }
    Ok(RawToken::ByteArray(format!("{{{}}}", fields.join(","))))
  }

  fn scan_operator(&mut self) -> Result<RawToken, EngineError> {
    if let (Some(a), Some(b)) = (self.peek(), self.peek_at(1)) {
      let two: String = [a, b].iter().collect();
      if matches!(two.as_str(), "&&" | "||" | "==" | "!=" | "<=" | ">=" | "<<" | ">>") {
        self.advance();
        self.advance();
        return Ok(RawToken::Op(two));
      }
    }
    if let Some(c) = self.peek() {
      if "!^&|~<>+-*/%".contains(c) {
        self.advance();
        return Ok(RawToken::Op(c.to_string()));
      }
    }
    Err(EngineError::new(
      DiagnosticCode::ValidToken,
      format!("no recognizable token at `{}`", self.remaining_str()),
    ))
  }
}

fn is_typed_width_prefix(text: &str) -> bool {
  matches!(text, "UINT8" | "UINT16" | "UINT32" | "UINT64")
}

fn is_operator_word(text: &str) -> bool {
  matches!(
    text.to_uppercase().as_str(),
    "AND" | "OR" | "NOT" | "XOR" | "EQ" | "NE" | "GT" | "LT" | "GE" | "LE" | "IN"
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tokens(text: &str) -> Vec<RawToken> {
    let mut lexer = Lexer::new(text);
    let mut out = Vec::new();
    loop {
      let tok = lexer.next_token().unwrap();
      if tok.is_eof() {
        break;
      }
      out.push(tok);
    }
    out
  }

  #[test]
  fn scans_arithmetic_expression() {
    let toks = tokens("1 + 2 * 3");
    assert_eq!(
      toks,
      vec![
        RawToken::Number("1".into()),
        RawToken::Op("+".into()),
        RawToken::Number("2".into()),
        RawToken::Op("*".into()),
        RawToken::Number("3".into()),
      ]
    );
  }

  #[test]
  fn scans_wide_and_narrow_strings() {
    let toks = tokens(r#"L"abc" == "abc""#);
    assert_eq!(
      toks,
      vec![
        RawToken::Quoted {
          wide: true,
          single_quote: false,
          text: "abc".into(),
        },
        RawToken::Op("==".into()),
        RawToken::Quoted {
          wide: false,
          single_quote: false,
          text: "abc".into(),
        },
      ]
    );
  }

  #[test]
  fn scans_guid_literal() {
    let toks = tokens("8868e871-e4f1-11d3-bc22-0080c73c8881");
    assert_eq!(
      toks,
      vec![RawToken::Guid("8868e871-e4f1-11d3-bc22-0080c73c8881".into())]
    );
  }

  #[test]
  fn scans_typed_width_literal() {
    let toks = tokens("UINT8(1 + 2)");
    assert_eq!(
      toks,
      vec![RawToken::TypedWidth {
        width: 8,
        inner: "1 + 2".into(),
      }]
    );
  }

  #[test]
  fn scans_keyword_operators_case_insensitively() {
    let toks = tokens("TRUE and FALSE");
    assert_eq!(
      toks,
      vec![
        RawToken::Ident("TRUE".into()),
        RawToken::Op("AND".into()),
        RawToken::Ident("FALSE".into()),
      ]
    );
  }

  #[test]
  fn scans_dotted_pcd_identifier() {
    let toks = tokens("gPlatformTokenSpaceGuid.PcdFoo");
    assert_eq!(toks, vec![RawToken::Ident("gPlatformTokenSpaceGuid.PcdFoo".into())]);
  }

  #[test]
  fn scans_nlist_byte_array() {
    let toks = tokens("{0x01, 0x02, 0x03}");
    assert_eq!(toks, vec![RawToken::ByteArray("{0x01,0x02,0x03}".into())]);
  }

  #[test]
  fn scans_guid_structure_byte_array() {
    let toks = tokens("{0x12345678,0x1234,0x1234,{0x12,0x34,0x56,0x78,0x9A,0xBC,0xDE,0xF0}}");
    assert_eq!(
      toks,
      vec![RawToken::ByteArray(
        "{0x12345678,0x1234,0x1234,{0x12,0x34,0x56,0x78,0x9A,0xBC,0xDE,0xF0}}".into()
      )]
    );
  }

  #[test]
  fn rejects_byte_array_element_too_long() {
    let mut lexer = Lexer::new("{0x010203}");
    let err = lexer.next_token().unwrap_err();
    assert_eq!(err.code, DiagnosticCode::BadArrayElement);
  }

  #[test]
  fn unknown_char_is_valid_token_error() {
    let mut lexer = Lexer::new("@");
    let err = lexer.next_token().unwrap_err();
    assert_eq!(err.code, DiagnosticCode::ValidToken);
  }

  #[test]
  fn colon_folds_into_identifier_without_ternary() {
    let toks = tokens("gEfiPkg:PcdFoo");
    assert_eq!(toks, vec![RawToken::Ident("gEfiPkg:PcdFoo".into())]);
  }

  #[test]
  fn colon_still_closes_ternary_when_question_is_live() {
    let toks = tokens("a ? b : c");
    assert_eq!(
      toks,
      vec![
        RawToken::Ident("a".into()),
        RawToken::Question,
        RawToken::Ident("b".into()),
        RawToken::Colon,
        RawToken::Ident("c".into()),
      ]
    );
  }
}
