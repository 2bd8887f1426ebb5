//! Public facade over the `parser` crate's recursive-descent evaluator:
//! the two operations described in §6 (`evaluate`, `evaluate_typed`), a
//! symbol-file loader, and `EngineConfig` for overriding the `IN`-exception
//! list or recursion depth cap away from their defaults.

pub mod config;
pub mod pcd;

use std::collections::HashSet;

use diagnostic::error::EngineError;
use logger::{LogType, Logger};
use parser::evaluator::{Evaluator, DEFAULT_MAX_DEPTH};

pub use config::{load_symbol_file, parse_symbol_text, SymbolTable};
pub use parser::evaluator::EvalOutcome;
pub use parser::EvalResult;
pub use pcd::PcdType;
pub use scanner::pcd_tracker::PcdTracker;

/// `IN`-exception list and recursion-depth cap, the two reserved/
/// configurable options named in §6.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub in_exceptions: HashSet<String>,
  pub max_depth: u32,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      in_exceptions: scanner::default_in_exceptions(),
      max_depth: DEFAULT_MAX_DEPTH,
    }
  }
}

/// `evaluate(expr, symbols, real_value) -> text | bool` (§6), against the
/// engine's default configuration.
pub fn evaluate(expr: &str, symbols: &SymbolTable, tracker: &PcdTracker, real_value: bool) -> Result<EvalOutcome, EngineError> {
  evaluate_with_config(expr, symbols, tracker, real_value, &EngineConfig::default())
}

pub fn evaluate_with_config(
  expr: &str,
  symbols: &SymbolTable,
  tracker: &PcdTracker,
  real_value: bool,
  config: &EngineConfig,
) -> Result<EvalOutcome, EngineError> {
  Logger::log(LogType::Debug(&format!("evaluating `{}`", expr)), 0);
  let mut evaluator = Evaluator::new(expr, symbols, tracker, &config.in_exceptions, config.max_depth)?;
  let outcome = evaluator.run(real_value)?;
  Logger::log(LogType::Debug(&format!("PCD resolution reached depth {}", evaluator.depth_reached())), 0);
  Ok(outcome)
}

/// `evaluate_typed(expr, pcd_type, symbols) -> text` (§6), against the
/// engine's default configuration.
pub fn evaluate_typed(expr: &str, pcd_type: PcdType, symbols: &SymbolTable, tracker: &PcdTracker) -> Result<String, EngineError> {
  evaluate_typed_with_config(expr, pcd_type, symbols, tracker, &EngineConfig::default())
}

pub fn evaluate_typed_with_config(
  expr: &str,
  pcd_type: PcdType,
  symbols: &SymbolTable,
  tracker: &PcdTracker,
  config: &EngineConfig,
) -> Result<String, EngineError> {
  Logger::log(LogType::Debug(&format!("evaluating `{}` as {}", expr, pcd_type.name())), 0);
  pcd::evaluate_typed(expr, pcd_type, symbols, tracker, config)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn evaluate_arithmetic_expression() {
    let symbols = SymbolTable::new();
    let tracker = PcdTracker::new(std::iter::empty());
    let outcome = evaluate("1 + 2 * 3", &symbols, &tracker, true).unwrap();
    assert_eq!(*outcome.result(), parser::EvalResult::Text("7".to_string()));
  }

  #[test]
  fn evaluate_records_referenced_pcd_as_conditional() {
    let mut symbols = SymbolTable::new();
    symbols.insert("gPkg.Flag".to_string(), "TRUE".to_string());
    let tracker = PcdTracker::new(vec!["gPkg.Flag".to_string()]);
    let _ = evaluate("gPkg.Flag", &symbols, &tracker, false).unwrap();
    assert!(tracker.conditional_pcds().contains("gPkg.Flag"));
  }

  #[test]
  fn evaluate_typed_rejects_width_overflow() {
    let symbols = SymbolTable::new();
    let tracker = PcdTracker::new(std::iter::empty());
    let err = evaluate_typed("0x12345", PcdType::UInt16, &symbols, &tracker).unwrap_err();
    assert_eq!(err.code, diagnostic::diagnostic_code::DiagnosticCode::PcdWidthExceeded);
  }
}
