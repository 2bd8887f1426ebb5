use std::fmt;

use crate::{
  diagnostic::Diagnostic,
  diagnostic_code::{DiagnosticCode, Severity},
};

/// A fatal, abort-evaluation error.
///
/// Grounded on EDK2 BaseTools' `BadExpression(message, [pcd_name])`: a short
/// message tagged with a `DiagnosticCode`, optionally naming the PCD token
/// that was being resolved when the failure happened.
#[derive(Debug, Clone)]
pub struct EngineError {
  pub code: DiagnosticCode,
  pub message: String,
  pub pcd: Option<String>,
}

impl EngineError {
  pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
    Self {
      code,
      message: message.into(),
      pcd: None,
    }
  }

  pub fn with_pcd(mut self, pcd: impl Into<String>) -> Self {
    self.pcd = Some(pcd.into());
    self
  }

  /// Re-raise the same error augmented with `{type, value}` context, as
  /// `evaluate_typed` does when structural PCD recovery also fails.
  pub fn augment_with_pcd_type(mut self, pcd_type: &str, value: &str) -> Self {
    self.message = format!(
      "{} (type: {}, value: {})",
      self.message, pcd_type, value
    );
    self
  }

  pub fn to_diagnostic(&self) -> Diagnostic {
    let mut diag = Diagnostic::new(self.code, self.message.clone());
    if let Some(pcd) = &self.pcd {
      diag = diag.with_pcd(pcd.clone());
    }
    diag
  }
}

impl fmt::Display for EngineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}]: {}", self.code.code(), self.message)?;
    if let Some(pcd) = &self.pcd {
      write!(f, " (pcd: {})", pcd)?;
    }
    Ok(())
  }
}

impl std::error::Error for EngineError {}

impl From<EngineError> for Diagnostic {
  fn from(err: EngineError) -> Self {
    err.to_diagnostic()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_includes_code_and_pcd() {
    let err = EngineError::new(DiagnosticCode::PcdResolve, "not found").with_pcd("Token.Name");
    let text = err.to_string();
    assert!(text.contains("E0201"));
    assert!(text.contains("Token.Name"));
  }

  #[test]
  fn severity_follows_code() {
    let err = EngineError::new(DiagnosticCode::Syntax, "trailing input");
    assert_eq!(err.code.severity(), Severity::Error);
  }
}
