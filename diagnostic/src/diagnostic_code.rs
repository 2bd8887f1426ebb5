/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  Error,
  Warning,
  Note,
  Help,
}

/// Unique identifier for each expression-engine diagnostic.
///
/// The `E0xxx` family are fatal (abort evaluation); the `W0xxx` family are
/// recoverable warnings that carry a result alongside the message (see
/// `parser::value::Warn`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
  // Lexical errors
  BadStringToken,
  BadMacroToken,
  BadArrayToken,
  BadArrayElement,
  EmptyToken,
  ValidToken,

  // Syntax errors
  Syntax,
  MatchParen,
  EmptyExpr,
  RelNotIn,
  OpUnsupported,

  // Macro / PCD resolution errors
  InOperand,
  PcdResolve,

  // Typing errors
  BadStringExpr,
  ExprTypeMismatch,
  RelCmpStringOthers,
  StringCmpMismatch,

  // PCD post-processing errors
  NegativePcd,
  PcdWidthExceeded,
  UndefinedOffset,
  BadExpression,

  // Warnings (always carry a `.result`)
  WrnBoolInArith,
  WrnEqCmpStringOthers,
  WrnNeCmpStringOthers,
}

impl DiagnosticCode {
  pub fn code(&self) -> String {
    match self {
      Self::BadStringToken => "E0001".to_string(),
      Self::BadMacroToken => "E0002".to_string(),
      Self::BadArrayToken => "E0003".to_string(),
      Self::BadArrayElement => "E0004".to_string(),
      Self::EmptyToken => "E0005".to_string(),
      Self::ValidToken => "E0006".to_string(),

      Self::Syntax => "E0100".to_string(),
      Self::MatchParen => "E0101".to_string(),
      Self::EmptyExpr => "E0102".to_string(),
      Self::RelNotIn => "E0103".to_string(),
      Self::OpUnsupported => "E0104".to_string(),

      Self::InOperand => "E0200".to_string(),
      Self::PcdResolve => "E0201".to_string(),

      Self::BadStringExpr => "E0300".to_string(),
      Self::ExprTypeMismatch => "E0301".to_string(),
      Self::RelCmpStringOthers => "E0302".to_string(),
      Self::StringCmpMismatch => "E0303".to_string(),

      Self::NegativePcd => "E0400".to_string(),
      Self::PcdWidthExceeded => "E0401".to_string(),
      Self::UndefinedOffset => "E0402".to_string(),
      Self::BadExpression => "E0403".to_string(),

      Self::WrnBoolInArith => "W0001".to_string(),
      Self::WrnEqCmpStringOthers => "W0002".to_string(),
      Self::WrnNeCmpStringOthers => "W0003".to_string(),
    }
  }

  pub fn severity(&self) -> Severity {
    match self {
      Self::WrnBoolInArith | Self::WrnEqCmpStringOthers | Self::WrnNeCmpStringOthers => {
        Severity::Warning
      },
      _ => Severity::Error,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn warnings_carry_warning_severity() {
    assert_eq!(DiagnosticCode::WrnBoolInArith.severity(), Severity::Warning);
    assert_eq!(DiagnosticCode::Syntax.severity(), Severity::Error);
  }

  #[test]
  fn codes_are_stable_strings() {
    assert_eq!(DiagnosticCode::PcdResolve.code(), "E0201");
  }
}
