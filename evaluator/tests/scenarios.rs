use std::collections::HashMap;

use diagnostic::diagnostic_code::DiagnosticCode;
use evaluator::{evaluate, evaluate_typed, PcdType, SymbolTable};
use parser::{EvalOutcome, EvalResult};
use scanner::pcd_tracker::PcdTracker;

fn symbols(pairs: &[(&str, &str)]) -> SymbolTable {
  pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>()
}

#[test]
fn scenario_arithmetic_precedence() {
  let syms = symbols(&[]);
  let tracker = PcdTracker::new(std::iter::empty());
  let text_outcome = evaluate("1 + 2 * 3", &syms, &tracker, true).unwrap();
  assert_eq!(*text_outcome.result(), EvalResult::Text("7".to_string()));

  let bool_outcome = evaluate("1 + 2 * 3", &syms, &tracker, false).unwrap();
  assert_eq!(*bool_outcome.result(), EvalResult::Bool(true));
}

#[test]
fn scenario_in_exception_list_membership() {
  let syms = symbols(&[("ARCH", "IA32 X64")]);
  let tracker = PcdTracker::new(std::iter::empty());
  let outcome = evaluate("\"IA32\" IN $(ARCH)", &syms, &tracker, false).unwrap();
  assert_eq!(*outcome.result(), EvalResult::Bool(true));
}

#[test]
fn scenario_macro_outside_in_exception_list_fails() {
  let syms = symbols(&[("CUSTOM_LIST", "IA32 X64")]);
  let tracker = PcdTracker::new(std::iter::empty());
  let err = evaluate("\"IA32\" IN $(CUSTOM_LIST)", &syms, &tracker, false).unwrap_err();
  assert_eq!(err.code, DiagnosticCode::InOperand);
}

#[test]
fn scenario_undefined_macro_defaults_to_zero() {
  let syms = symbols(&[]);
  let tracker = PcdTracker::new(std::iter::empty());
  let outcome = evaluate("$(UNDEF) == 0", &syms, &tracker, false).unwrap();
  assert_eq!(*outcome.result(), EvalResult::Bool(true));
}

#[test]
fn scenario_wide_vs_narrow_string_compare_fails() {
  let syms = symbols(&[]);
  let tracker = PcdTracker::new(std::iter::empty());
  let err = evaluate("L\"abc\" == \"abc\"", &syms, &tracker, false).unwrap_err();
  assert_eq!(err.code, DiagnosticCode::StringCmpMismatch);
}

#[test]
fn scenario_uint16_width_check() {
  let syms = symbols(&[]);
  let tracker = PcdTracker::new(std::iter::empty());
  assert_eq!(evaluate_typed("0x1234", PcdType::UInt16, &syms, &tracker).unwrap(), "0x1234");
  let err = evaluate_typed("0x12345", PcdType::UInt16, &syms, &tracker).unwrap_err();
  assert_eq!(err.code, DiagnosticCode::PcdWidthExceeded);
}

#[test]
fn scenario_typed_brace_list_little_endian_pack() {
  let syms = symbols(&[]);
  let tracker = PcdTracker::new(std::iter::empty());
  let text = evaluate_typed("{UINT8(1), UINT16(0x0203)}", PcdType::UInt32, &syms, &tracker).unwrap();
  assert_eq!(text, "0x00020301");
}

#[test]
fn scenario_void_star_char_literal() {
  let syms = symbols(&[]);
  let tracker = PcdTracker::new(std::iter::empty());
  let text = evaluate_typed("'A'", PcdType::VoidStar, &syms, &tracker).unwrap();
  assert_eq!(text, "{0x41}");
}

#[test]
fn scenario_bool_in_arithmetic_warning() {
  let syms = symbols(&[]);
  let tracker = PcdTracker::new(std::iter::empty());

  let outcome = evaluate("TRUE || FALSE", &syms, &tracker, false).unwrap();
  assert_eq!(*outcome.result(), EvalResult::Bool(true));

  let outcome = evaluate("1 + TRUE", &syms, &tracker, true).unwrap();
  match outcome {
    EvalOutcome::Warned(w) => {
      assert_eq!(w.code, DiagnosticCode::WrnBoolInArith);
      assert_eq!(w.result, EvalResult::Text("2".to_string()));
    },
    EvalOutcome::Plain(_) => panic!("expected WrnBoolInArith to be surfaced"),
  }
}

#[test]
fn empty_expression_fails() {
  let syms = symbols(&[]);
  let tracker = PcdTracker::new(std::iter::empty());
  let err = evaluate("   ", &syms, &tracker, false).unwrap_err();
  assert_eq!(err.code, DiagnosticCode::EmptyExpr);
}

#[test]
fn conditional_pcd_set_is_append_only_and_idempotent() {
  let syms = symbols(&[("gPkg.Flag", "TRUE")]);
  let tracker = PcdTracker::new(vec!["gPkg.Flag".to_string()]);
  evaluate("gPkg.Flag", &syms, &tracker, false).unwrap();
  evaluate("gPkg.Flag", &syms, &tracker, false).unwrap();
  let recorded = tracker.conditional_pcds();
  assert_eq!(recorded.len(), 1);
  assert!(recorded.contains("gPkg.Flag"));
}
