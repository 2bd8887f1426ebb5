use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use diagnostic::{diagnostic_code::DiagnosticCode, error::EngineError};
use logger::{LogType, Logger};
use scanner::{pcd_tracker::PcdTracker, substitute, token::RawToken, Lexer};

use crate::{
  field_value,
  guid::guid_string_to_guid_structure_string,
  value::{Value, Warn},
};

/// Default cap on PCD/typed-width sub-evaluation recursion (§9 design
/// note). A platform whose PCDs form a longer resolution chain than this
/// is almost certainly circular.
pub const DEFAULT_MAX_DEPTH: u32 = 16;

/// The shape a top-level evaluation settles into once `real_value` has been
/// applied (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
  Text(String),
  Bool(bool),
}

/// The outcome of a top-level `Evaluator::run` call: either a plain result,
/// or one still carrying a pending warning that a caller may want to
/// surface (§4.4 "Warning discipline").
#[derive(Debug, Clone)]
pub enum EvalOutcome {
  Plain(EvalResult),
  Warned(Warn<EvalResult>),
}

impl EvalOutcome {
  pub fn result(&self) -> &EvalResult {
    match self {
      EvalOutcome::Plain(r) => r,
      EvalOutcome::Warned(w) => &w.result,
    }
  }
}

/// Recursive-descent evaluator over the `Cond` grammar (§4.3):
/// `Cond -> Or -> And -> BOr -> BXor -> BAnd -> Eq -> Rel -> Shift -> Add ->
/// Mul -> Unary -> Primary`.
///
/// Owns a `Lexer` directly rather than a pre-tokenized vector; `bump`
/// pulls the next raw token on demand.
pub struct Evaluator<'a> {
  lexer: Lexer,
  current: RawToken,
  symbols: &'a HashMap<String, String>,
  tracker: &'a PcdTracker,
  in_exceptions: &'a HashSet<String>,
  depth: u32,
  max_depth: u32,
  /// Deepest `depth` reached so far by this evaluator or any sub-evaluator
  /// it spawned resolving a nested PCD/typed-width literal. Shared (not
  /// cloned-and-diverged) across the whole recursive chain so the
  /// top-level caller can read back how deep resolution actually went.
  depth_reached: Rc<Cell<u32>>,
  pending_warning: Option<(DiagnosticCode, String)>,
}

impl<'a> Evaluator<'a> {
  pub fn new(
    expr: &str,
    symbols: &'a HashMap<String, String>,
    tracker: &'a PcdTracker,
    in_exceptions: &'a HashSet<String>,
    max_depth: u32,
  ) -> Result<Self, EngineError> {
    Self::new_with_depth(expr, symbols, tracker, in_exceptions, 0, max_depth, Rc::new(Cell::new(0)))
  }

  fn new_with_depth(
    expr: &str,
    symbols: &'a HashMap<String, String>,
    tracker: &'a PcdTracker,
    in_exceptions: &'a HashSet<String>,
    depth: u32,
    max_depth: u32,
    depth_reached: Rc<Cell<u32>>,
  ) -> Result<Self, EngineError> {
    if expr.trim().is_empty() {
      return Err(EngineError::new(DiagnosticCode::EmptyExpr, "empty expression"));
    }
    if depth > depth_reached.get() {
      depth_reached.set(depth);
    }
    let substituted = substitute(expr, symbols, tracker, in_exceptions)?;
    let mut lexer = Lexer::new(&substituted);
    let current = lexer.next_token()?;
    Ok(Self {
      lexer,
      current,
      symbols,
      tracker,
      in_exceptions,
      depth,
      max_depth,
      depth_reached,
      pending_warning: None,
    })
  }

  /// Deepest PCD/typed-width recursion level reached while evaluating this
  /// expression, including any nested sub-evaluators. `0` means no
  /// recursive re-entry occurred at all.
  pub fn depth_reached(&self) -> u32 {
    self.depth_reached.get()
  }

  /// Evaluates the expression. `real_value` selects between the `§4.5`
  /// text-shaping mapping and a plain boolean collapse.
  pub fn run(&mut self, real_value: bool) -> Result<EvalOutcome, EngineError> {
    let value = self.eval_raw(real_value)?;
    Ok(self.wrap_outcome(value, real_value))
  }

  /// Like `run`, but returns the typed `Value` before the `§4.5`
  /// result-shape mapping is applied. The PCD post-processor needs the raw
  /// shape (is this a string literal? an array?) that `run`'s text/bool
  /// collapse would otherwise erase.
  pub fn eval_raw(&mut self, real_value: bool) -> Result<Value, EngineError> {
    if real_value && self.depth == 0 {
      if let Some(value) = self.try_fast_path()? {
        return Ok(value);
      }
    }

    let value = self.eval_cond()?;
    if !self.current.is_eof() {
      return Err(EngineError::new(DiagnosticCode::Syntax, "trailing input after expression"));
    }
    Ok(value)
  }

  fn bump(&mut self) -> Result<RawToken, EngineError> {
    let next = self.lexer.next_token()?;
    Ok(std::mem::replace(&mut self.current, next))
  }

  /// A bare single number or byte-array literal short-circuits full `Cond`
  /// parsing at the top level. Uses a cloned lexer so a non-match never
  /// disturbs the real cursor.
  fn try_fast_path(&mut self) -> Result<Option<Value>, EngineError> {
    match &self.current {
      RawToken::Number(_) | RawToken::ByteArray(_) => {
        let mut probe = self.lexer.clone();
        if probe.next_token()?.is_eof() {
          let value = match self.current.clone() {
            RawToken::Number(text) => self.parse_number_value(&text)?,
            RawToken::ByteArray(text) => Value::ByteArray(text),
            _ => unreachable!(),
          };
          return Ok(Some(value));
        }
        Ok(None)
      },
      _ => Ok(None),
    }
  }

  fn wrap_outcome(&mut self, value: Value, real_value: bool) -> EvalOutcome {
    let result = self.finish(value, real_value);
    match self.pending_warning.take() {
      Some((code, message)) => EvalOutcome::Warned(Warn::new(result, code, message)),
      None => EvalOutcome::Plain(result),
    }
  }

  /// §4.5 result-shape mapping.
  fn finish(&self, value: Value, real_value: bool) -> EvalResult {
    if !real_value {
      return EvalResult::Bool(value.truthy());
    }
    match value {
      Value::WideString(s) if s.is_empty() => EvalResult::Bool(false),
      Value::ByteString(s) if s.is_empty() => EvalResult::Bool(false),
      Value::ByteString(s) => EvalResult::Text(format!("\"{}\"", s)),
      Value::WideString(s) => EvalResult::Text(format!("L\"{}\"", s)),
      Value::ByteArray(s) => EvalResult::Text(s),
      Value::RawText(s) if s.is_empty() => EvalResult::Bool(false),
      Value::RawText(s) => EvalResult::Text(s),
      Value::Integer(i) => EvalResult::Text(i.to_string()),
      Value::Boolean(b) => EvalResult::Text(if b { "1".to_string() } else { "0".to_string() }),
    }
  }

  fn raise_warning(&mut self, code: DiagnosticCode, message: impl Into<String>) {
    if self.pending_warning.is_none() {
      self.pending_warning = Some((code, message.into()));
    }
  }

  /// Folds a nested sub-evaluation's outcome into `self`: a pending warning
  /// from the sub-evaluation is latched onto the parent (first one wins,
  /// matching the "at most one warning per top-level call" rule) and its
  /// result is reclassified back into a `Value` for use as an operand.
  fn absorb_nested(&mut self, outcome: EvalOutcome) -> Value {
    let result = match outcome {
      EvalOutcome::Plain(r) => r,
      EvalOutcome::Warned(w) => {
        self.raise_warning(w.code, w.message.clone());
        w.result
      },
    };
    match result {
      EvalResult::Bool(b) => Value::Boolean(b),
      EvalResult::Text(s) => classify_text(&s),
    }
  }

  // ---- Cond ----

  fn eval_cond(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_or()?;
    while matches!(self.current, RawToken::Question) {
      self.bump()?;
      let then_branch = self.eval_or()?;
      if !matches!(self.current, RawToken::Colon) {
        return Err(EngineError::new(DiagnosticCode::Syntax, "expected `:` in ternary expression"));
      }
      self.bump()?;
      let else_branch = self.eval_or()?;
      // Both branches are already fully evaluated above: the ternary does
      // not short-circuit (§9).
      lhs = if lhs.truthy() { then_branch } else { else_branch };
    }
    Ok(lhs)
  }

  fn eval_or(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_and()?;
    while self.op_tag().as_deref() == Some("OR") {
      self.bump()?;
      let rhs = self.eval_and()?;
      lhs = self.apply_logical("OR", lhs, rhs)?;
    }
    Ok(lhs)
  }

  fn eval_and(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_bor()?;
    while self.op_tag().as_deref() == Some("AND") {
      self.bump()?;
      let rhs = self.eval_bor()?;
      lhs = self.apply_logical("AND", lhs, rhs)?;
    }
    Ok(lhs)
  }

  fn eval_bor(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_bxor()?;
    while self.current_is_symbol("|") {
      self.bump()?;
      let rhs = self.eval_bxor()?;
      lhs = self.apply_bitwise("|", lhs, rhs)?;
    }
    Ok(lhs)
  }

  fn eval_bxor(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_band()?;
    while self.op_tag().as_deref() == Some("^") {
      self.bump()?;
      let rhs = self.eval_band()?;
      lhs = self.apply_bitwise("^", lhs, rhs)?;
    }
    Ok(lhs)
  }

  fn eval_band(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_eq()?;
    while self.current_is_symbol("&") {
      self.bump()?;
      let rhs = self.eval_eq()?;
      lhs = self.apply_bitwise("&", lhs, rhs)?;
    }
    Ok(lhs)
  }

  fn eval_eq(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_rel()?;
    loop {
      let tag = self.op_tag();
      match tag.as_deref() {
        Some("EQ") => {
          self.bump()?;
          let rhs = self.eval_rel()?;
          lhs = self.apply_eq_ne("EQ", lhs, rhs)?;
        },
        Some("NE") => {
          self.bump()?;
          let rhs = self.eval_rel()?;
          lhs = self.apply_eq_ne("NE", lhs, rhs)?;
        },
        Some("IN") => {
          self.bump()?;
          let rhs = self.eval_rel()?;
          lhs = self.apply_in("IN", lhs, rhs)?;
        },
        Some("NOT") => {
          self.bump()?;
          if self.op_tag().as_deref() != Some("IN") {
            return Err(EngineError::new(
              DiagnosticCode::RelNotIn,
              "`not`/`NOT` must be followed by `IN`/`in`",
            ));
          }
          self.bump()?;
          let rhs = self.eval_rel()?;
          lhs = self.apply_in("NOTIN", lhs, rhs)?;
        },
        _ => break,
      }
    }
    Ok(lhs)
  }

  fn eval_rel(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_shift()?;
    loop {
      match self.op_tag().as_deref() {
        Some(tag @ ("GT" | "LT" | "GE" | "LE")) => {
          let tag = tag.to_string();
          self.bump()?;
          let rhs = self.eval_shift()?;
          lhs = self.apply_rel(&tag, lhs, rhs)?;
        },
        _ => break,
      }
    }
    Ok(lhs)
  }

  fn eval_shift(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_add()?;
    loop {
      match self.op_tag().as_deref() {
        Some(tag @ ("<<" | ">>")) => {
          let tag = tag.to_string();
          self.bump()?;
          let rhs = self.eval_add()?;
          lhs = self.apply_shift(&tag, lhs, rhs)?;
        },
        _ => break,
      }
    }
    Ok(lhs)
  }

  fn eval_add(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_mul()?;
    loop {
      match self.op_tag().as_deref() {
        Some(tag @ ("+" | "-")) => {
          let tag = tag.to_string();
          self.bump()?;
          let rhs = self.eval_mul()?;
          lhs = self.apply_add_sub(&tag, lhs, rhs)?;
        },
        _ => break,
      }
    }
    Ok(lhs)
  }

  fn eval_mul(&mut self) -> Result<Value, EngineError> {
    let mut lhs = self.eval_unary()?;
    loop {
      match self.op_tag().as_deref() {
        Some(tag @ ("*" | "/" | "%")) => {
          let tag = tag.to_string();
          self.bump()?;
          let rhs = self.eval_unary()?;
          lhs = self.apply_mul_group(&tag, lhs, rhs)?;
        },
        _ => break,
      }
    }
    Ok(lhs)
  }

  fn eval_unary(&mut self) -> Result<Value, EngineError> {
    match self.op_tag().as_deref() {
      Some("NOT") => {
        self.bump()?;
        let rhs = self.eval_unary()?;
        self.apply_unary_not(rhs)
      },
      Some("~") => {
        self.bump()?;
        let rhs = self.eval_unary()?;
        self.apply_unary_bnot(rhs)
      },
      _ => self.eval_primary(),
    }
  }

  fn eval_primary(&mut self) -> Result<Value, EngineError> {
    match self.current.clone() {
      RawToken::LParen => {
        self.bump()?;
        let v = self.eval_cond()?;
        if !matches!(self.current, RawToken::RParen) {
          return Err(EngineError::new(DiagnosticCode::MatchParen, "expected `)`"));
        }
        self.bump()?;
        Ok(v)
      },
      RawToken::Number(text) => {
        self.bump()?;
        self.parse_number_value(&text)
      },
      RawToken::Quoted { wide, text, .. } => {
        self.bump()?;
        if wide {
          Ok(Value::WideString(text))
        } else {
          Ok(Value::ByteString(text))
        }
      },
      RawToken::ByteArray(text) => {
        self.bump()?;
        Ok(Value::ByteArray(text))
      },
      RawToken::Guid(text) => {
        self.bump()?;
        let structure = guid_string_to_guid_structure_string(&text)?;
        Ok(Value::ByteArray(structure))
      },
      RawToken::TypedWidth { width, inner } => {
        self.bump()?;
        self.eval_typed_width(width, &inner)
      },
      RawToken::Ident(name) => {
        self.bump()?;
        self.resolve_ident(&name)
      },
      RawToken::Eof => Err(EngineError::new(DiagnosticCode::EmptyToken, "expected a token")),
      RawToken::Op(o) => Err(EngineError::new(
        DiagnosticCode::ValidToken,
        format!("unexpected operator `{}`", o),
      )),
      other => Err(EngineError::new(
        DiagnosticCode::ValidToken,
        format!("unexpected token `{:?}`", other),
      )),
    }
  }

  fn parse_number_value(&self, text: &str) -> Result<Value, EngineError> {
    let (value, _) = field_value::parse_integer(text)?;
    Ok(Value::Integer(value))
  }

  fn eval_typed_width(&mut self, width: u8, inner: &str) -> Result<Value, EngineError> {
    if self.depth >= self.max_depth {
      return Err(EngineError::new(
        DiagnosticCode::PcdResolve,
        format!("recursion depth exceeded evaluating UINT{}(...) literal", width),
      ));
    }
    Logger::log(
      LogType::Debug(&format!("re-entering at depth {} for UINT{}(...) literal", self.depth + 1, width)),
      0,
    );
    let mut sub = Evaluator::new_with_depth(
      inner,
      self.symbols,
      self.tracker,
      self.in_exceptions,
      self.depth + 1,
      self.max_depth,
      self.depth_reached.clone(),
    )?;
    let outcome = sub.run(true)?;
    let value = self.absorb_nested(outcome);
    let text = match value {
      Value::Integer(i) => i.to_string(),
      Value::Boolean(b) => if b { "1".to_string() } else { "0".to_string() },
      other => {
        return Err(EngineError::new(
          DiagnosticCode::ExprTypeMismatch,
          format!("UINT{} literal requires a numeric inner expression, got {:?}", width, other),
        ));
      },
    };
    let (packed, _) = field_value::parse_field_value(&format!("UINT{}({})", width, text))?;
    Ok(Value::Integer(packed))
  }

  fn resolve_ident(&mut self, name: &str) -> Result<Value, EngineError> {
    if name.eq_ignore_ascii_case("TRUE") {
      return Ok(Value::Boolean(true));
    }
    if name.eq_ignore_ascii_case("FALSE") {
      return Ok(Value::Boolean(false));
    }

    if looks_like_pcd(name) {
      if self.depth >= self.max_depth {
        return Err(
          EngineError::new(DiagnosticCode::PcdResolve, format!("recursion depth exceeded resolving `{}`", name))
            .with_pcd(name.to_string()),
        );
      }
      let text = self
        .symbols
        .get(name)
        .ok_or_else(|| EngineError::new(DiagnosticCode::PcdResolve, format!("undefined PCD `{}`", name)).with_pcd(name.to_string()))?
        .clone();
      Logger::log(LogType::Debug(&format!("re-entering at depth {} resolving PCD `{}`", self.depth + 1, name)), 0);
      let mut sub = Evaluator::new_with_depth(
        &text,
        self.symbols,
        self.tracker,
        self.in_exceptions,
        self.depth + 1,
        self.max_depth,
        self.depth_reached.clone(),
      )?;
      let outcome = sub.run(true)?;
      return Ok(self.absorb_nested(outcome));
    }

    // Not a recognized keyword or PCD shape: falls through as a bare-word
    // string value, mirroring the original tokenizer's behavior of leaving
    // an unresolved identifier as its own text.
    Ok(Value::RawText(name.to_string()))
  }

  // ---- operator application (§4.4) ----

  fn apply_unary_not(&mut self, v: Value) -> Result<Value, EngineError> {
    if v.is_text() {
      return Err(EngineError::new(DiagnosticCode::BadStringExpr, "`NOT` does not apply to text values"));
    }
    Ok(Value::Boolean(!v.truthy()))
  }

  fn apply_unary_bnot(&mut self, v: Value) -> Result<Value, EngineError> {
    if v.is_text() {
      return Err(EngineError::new(DiagnosticCode::BadStringExpr, "`~` does not apply to text values"));
    }
    Ok(Value::Integer(!to_i128(&v)?))
  }

  fn apply_logical(&mut self, tag: &str, lhs: Value, rhs: Value) -> Result<Value, EngineError> {
    let a = lhs.truthy();
    let b = rhs.truthy();
    Ok(Value::Boolean(if tag == "AND" { a && b } else { a || b }))
  }

  fn apply_bitwise(&mut self, tag: &str, lhs: Value, rhs: Value) -> Result<Value, EngineError> {
    let lhs = coerce_for_arith(lhs)?;
    let rhs = coerce_for_arith(rhs)?;
    if lhs.is_text() || rhs.is_text() {
      return Err(EngineError::new(DiagnosticCode::BadStringExpr, "text operand in bitwise expression"));
    }
    let a = to_i128(&lhs)?;
    let b = to_i128(&rhs)?;
    let result = match tag {
      "&" => a & b,
      "|" => a | b,
      "^" => a ^ b,
      _ => unreachable!(),
    };
    Ok(Value::Integer(result))
  }

  fn apply_shift(&mut self, tag: &str, lhs: Value, rhs: Value) -> Result<Value, EngineError> {
    let lhs = coerce_for_arith(lhs)?;
    let rhs = coerce_for_arith(rhs)?;
    if lhs.is_text() || rhs.is_text() {
      return Err(EngineError::new(DiagnosticCode::BadStringExpr, "text operand in shift expression"));
    }
    if matches!(lhs, Value::Boolean(_)) || matches!(rhs, Value::Boolean(_)) {
      return Err(EngineError::new(DiagnosticCode::ExprTypeMismatch, "boolean operand not allowed in a shift expression"));
    }
    let a = to_i128(&lhs)?;
    let b = to_i128(&rhs)?;
    let amount = u32::try_from(b).map_err(|_| EngineError::new(DiagnosticCode::BadExpression, "negative shift amount"))?;
    let result = if tag == "<<" { a.checked_shl(amount) } else { a.checked_shr(amount) };
    let result = result.ok_or_else(|| EngineError::new(DiagnosticCode::BadExpression, "shift amount out of range"))?;
    Ok(Value::Integer(result))
  }

  fn apply_add_sub(&mut self, tag: &str, lhs: Value, rhs: Value) -> Result<Value, EngineError> {
    let lhs = coerce_for_arith(lhs)?;
    let rhs = coerce_for_arith(rhs)?;
    if lhs.is_text() || rhs.is_text() {
      return Err(EngineError::new(DiagnosticCode::BadStringExpr, "text operand in arithmetic expression"));
    }
    let bool_involved = matches!(lhs, Value::Boolean(_)) || matches!(rhs, Value::Boolean(_));
    let a = to_i128(&lhs)?;
    let b = to_i128(&rhs)?;
    let result = if tag == "+" { a + b } else { a - b };
    if bool_involved {
      self.raise_warning(DiagnosticCode::WrnBoolInArith, "boolean operand coerced to integer in arithmetic expression");
    }
    Ok(Value::Integer(result))
  }

  fn apply_mul_group(&mut self, tag: &str, lhs: Value, rhs: Value) -> Result<Value, EngineError> {
    let lhs = coerce_for_arith(lhs)?;
    let rhs = coerce_for_arith(rhs)?;
    if lhs.is_text() || rhs.is_text() {
      return Err(EngineError::new(DiagnosticCode::BadStringExpr, "text operand in arithmetic expression"));
    }
    if matches!(lhs, Value::Boolean(_)) || matches!(rhs, Value::Boolean(_)) {
      return Err(EngineError::new(DiagnosticCode::ExprTypeMismatch, "boolean operand not allowed here"));
    }
    let a = to_i128(&lhs)?;
    let b = to_i128(&rhs)?;
    let result = match tag {
      "*" => a.checked_mul(b),
      "/" => {
        if b == 0 {
          return Err(EngineError::new(DiagnosticCode::BadExpression, "division by zero"));
        }
        a.checked_div(b)
      },
      "%" => {
        if b == 0 {
          return Err(EngineError::new(DiagnosticCode::BadExpression, "division by zero"));
        }
        a.checked_rem(b)
      },
      _ => unreachable!(),
    };
    let result = result.ok_or_else(|| EngineError::new(DiagnosticCode::BadExpression, "integer overflow"))?;
    Ok(Value::Integer(result))
  }

  fn apply_eq_ne(&mut self, tag: &str, lhs: Value, rhs: Value) -> Result<Value, EngineError> {
    let lhs_text = lhs.is_text();
    let rhs_text = rhs.is_text();

    if lhs_text != rhs_text {
      return if tag == "EQ" {
        self.raise_warning(DiagnosticCode::WrnEqCmpStringOthers, "comparing text to a non-text value with `==`");
        Ok(Value::Boolean(false))
      } else {
        self.raise_warning(DiagnosticCode::WrnNeCmpStringOthers, "comparing text to a non-text value with `!=`");
        Ok(Value::Boolean(true))
      };
    }

    if lhs_text {
      if lhs.is_wide() != rhs.is_wide() {
        return Err(EngineError::new(DiagnosticCode::StringCmpMismatch, "cannot compare wide and narrow text"));
      }
      let equal = text_of(&lhs) == text_of(&rhs);
      return Ok(Value::Boolean(if tag == "EQ" { equal } else { !equal }));
    }

    let a = to_i128(&lhs)?;
    let b = to_i128(&rhs)?;
    let equal = a == b;
    Ok(Value::Boolean(if tag == "EQ" { equal } else { !equal }))
  }

  fn apply_rel(&mut self, tag: &str, lhs: Value, rhs: Value) -> Result<Value, EngineError> {
    let lhs_text = lhs.is_text();
    let rhs_text = rhs.is_text();

    if lhs_text != rhs_text {
      return Err(EngineError::new(
        DiagnosticCode::RelCmpStringOthers,
        "relational comparison between a text and a non-text value",
      ));
    }

    if lhs_text {
      if lhs.is_wide() != rhs.is_wide() {
        return Err(EngineError::new(DiagnosticCode::StringCmpMismatch, "cannot compare wide and narrow text"));
      }
      let ord = text_of(&lhs).cmp(text_of(&rhs));
      return Ok(Value::Boolean(match tag {
        "GT" => ord == std::cmp::Ordering::Greater,
        "LT" => ord == std::cmp::Ordering::Less,
        "GE" => ord != std::cmp::Ordering::Less,
        "LE" => ord != std::cmp::Ordering::Greater,
        _ => unreachable!(),
      }));
    }

    let a = to_i128(&lhs)?;
    let b = to_i128(&rhs)?;
    Ok(Value::Boolean(match tag {
      "GT" => a > b,
      "LT" => a < b,
      "GE" => a >= b,
      "LE" => a <= b,
      _ => unreachable!(),
    }))
  }

  fn apply_in(&mut self, tag: &str, lhs: Value, rhs: Value) -> Result<Value, EngineError> {
    let needle = to_text_for_in(&lhs);
    let haystack = to_text_for_in(&rhs);
    let member = haystack.split_whitespace().any(|tok| tok == needle);
    Ok(Value::Boolean(if tag == "IN" { member } else { !member }))
  }

  // ---- token classification helpers ----

  fn op_tag(&self) -> Option<String> {
    match &self.current {
      RawToken::Op(o) => Some(normalize_op(o)),
      _ => None,
    }
  }

  fn current_is_symbol(&self, symbol: &str) -> bool {
    matches!(&self.current, RawToken::Op(o) if o == symbol)
  }
}

fn looks_like_pcd(name: &str) -> bool {
  let parts: Vec<&str> = name.split('.').collect();
  parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty()
}

fn normalize_op(raw: &str) -> String {
  match raw.to_ascii_uppercase().as_str() {
    "&&" | "AND" => "AND".to_string(),
    "||" | "OR" => "OR".to_string(),
    "!" | "NOT" => "NOT".to_string(),
    "XOR" => "^".to_string(),
    "EQ" => "EQ".to_string(),
    "==" => "EQ".to_string(),
    "NE" => "NE".to_string(),
    "!=" => "NE".to_string(),
    "GT" => "GT".to_string(),
    ">" => "GT".to_string(),
    "LT" => "LT".to_string(),
    "<" => "LT".to_string(),
    "GE" => "GE".to_string(),
    ">=" => "GE".to_string(),
    "LE" => "LE".to_string(),
    "<=" => "LE".to_string(),
    "IN" => "IN".to_string(),
    other => other.to_string(),
  }
}

fn coerce_for_arith(v: Value) -> Result<Value, EngineError> {
  match v {
    Value::RawText(s) => {
      let (packed, _) = field_value::parse_field_value(&format!("\"{}\"", s))?;
      Ok(Value::Integer(packed))
    },
    other => Ok(other),
  }
}

fn to_i128(v: &Value) -> Result<i128, EngineError> {
  match v {
    Value::Integer(i) => Ok(*i),
    Value::Boolean(b) => Ok(if *b { 1 } else { 0 }),
    _ => Err(EngineError::new(DiagnosticCode::BadStringExpr, "text operand where a number was expected")),
  }
}

fn text_of(v: &Value) -> &str {
  match v {
    Value::ByteString(s) | Value::WideString(s) | Value::RawText(s) => s.as_str(),
    _ => "",
  }
}

/// Little-endian byte emission of an integer, mirroring EDK2 BaseTools'
/// `IntToStr`. Stops at the first zero byte even when non-zero, higher-order
/// bytes would otherwise follow: this interior-zero-byte truncation is a
/// latent quirk of the original `IN`/`NOT IN` membership check, kept
/// deliberately rather than "fixed" (§9).
fn int_to_str(v: i128) -> String {
  let mut bytes = Vec::new();
  let mut value = v;
  while value > 0 {
    bytes.push((value & 0xFF) as u8);
    value >>= 8;
  }
  if let Some(nul) = bytes.iter().position(|&b| b == 0) {
    bytes.truncate(nul);
  }
  String::from_utf8_lossy(&bytes).into_owned()
}

fn to_text_for_in(v: &Value) -> String {
  match v {
    Value::Integer(i) => int_to_str(*i),
    Value::Boolean(b) => int_to_str(if *b { 1 } else { 0 }),
    Value::ByteString(s) | Value::WideString(s) | Value::RawText(s) => s.clone(),
    Value::ByteArray(s) => s.clone(),
  }
}

/// Reclassifies a result's canonical text back into a typed `Value`, used
/// when a sub-evaluation's text result becomes an operand in the parent
/// expression (PCD resolution, typed-width inner expressions).
fn classify_text(s: &str) -> Value {
  if let Some(inner) = s.strip_prefix("L\"").and_then(|r| r.strip_suffix('"')) {
    return Value::WideString(inner.to_string());
  }
  if let Some(inner) = s.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
    return Value::ByteString(inner.to_string());
  }
  if s.starts_with('{') && s.ends_with('}') {
    return Value::ByteArray(s.to_string());
  }
  if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
    if let Ok(i) = i128::from_str_radix(hex, 16) {
      return Value::Integer(i);
    }
  }
  if let Ok(i) = s.parse::<i128>() {
    return Value::Integer(i);
  }
  Value::RawText(s.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use scanner::default_in_exceptions;

  fn eval(expr: &str, symbols: &HashMap<String, String>, real_value: bool) -> EvalOutcome {
    let tracker = PcdTracker::new(symbols.keys().cloned());
    let in_exceptions = default_in_exceptions();
    let mut evaluator = Evaluator::new(expr, symbols, &tracker, &in_exceptions, DEFAULT_MAX_DEPTH).unwrap();
    evaluator.run(real_value).unwrap()
  }

  #[test]
  fn evaluates_arithmetic_precedence() {
    let symbols = HashMap::new();
    let outcome = eval("1 + 2 * 3", &symbols, true);
    assert_eq!(*outcome.result(), EvalResult::Text("7".to_string()));
  }

  #[test]
  fn undefined_macro_compares_as_zero() {
    let symbols = HashMap::new();
    let outcome = eval("$(UNDEF) == 0", &symbols, false);
    assert_eq!(*outcome.result(), EvalResult::Bool(true));
  }

  #[test]
  fn wide_vs_narrow_comparison_is_string_cmp_mismatch() {
    let symbols = HashMap::new();
    let tracker = PcdTracker::new(std::iter::empty());
    let in_exceptions = default_in_exceptions();
    let mut evaluator = Evaluator::new("L\"abc\" == \"abc\"", &symbols, &tracker, &in_exceptions, DEFAULT_MAX_DEPTH).unwrap();
    let err = evaluator.run(false).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::StringCmpMismatch);
  }

  #[test]
  fn bool_in_arithmetic_raises_pending_warning() {
    let symbols = HashMap::new();
    let outcome = eval("1 + TRUE", &symbols, true);
    match outcome {
      EvalOutcome::Warned(w) => {
        assert_eq!(w.code, DiagnosticCode::WrnBoolInArith);
        assert_eq!(w.result, EvalResult::Text("2".to_string()));
      },
      EvalOutcome::Plain(_) => panic!("expected a pending warning"),
    }
  }

  #[test]
  fn ternary_does_not_short_circuit_evaluation_of_both_branches() {
    let symbols = HashMap::new();
    // Both branches must parse and evaluate cleanly even though only one
    // is selected.
    let outcome = eval("TRUE ? 1 : 2", &symbols, true);
    assert_eq!(*outcome.result(), EvalResult::Text("1".to_string()));
  }

  #[test]
  fn in_exception_macro_participates_in_in_operator() {
    let mut symbols = HashMap::new();
    symbols.insert("ARCH".to_string(), "IA32".to_string());
    let outcome = eval("\"IA32\" IN $(ARCH)", &symbols, false);
    assert_eq!(*outcome.result(), EvalResult::Bool(true));
  }

  #[test]
  fn pcd_identifier_resolves_recursively() {
    let mut symbols = HashMap::new();
    symbols.insert("gPkg.Pcd1".to_string(), "1 + 1".to_string());
    let outcome = eval("gPkg.Pcd1 == 2", &symbols, false);
    assert_eq!(*outcome.result(), EvalResult::Bool(true));
  }

  #[test]
  fn depth_reached_is_zero_without_recursion() {
    let symbols = HashMap::new();
    let tracker = PcdTracker::new(std::iter::empty());
    let in_exceptions = default_in_exceptions();
    let mut evaluator = Evaluator::new("1 + 2", &symbols, &tracker, &in_exceptions, DEFAULT_MAX_DEPTH).unwrap();
    evaluator.run(true).unwrap();
    assert_eq!(evaluator.depth_reached(), 0);
  }

  #[test]
  fn depth_reached_tracks_nested_pcd_chain() {
    let mut symbols = HashMap::new();
    symbols.insert("gPkg.Pcd1".to_string(), "gPkg.Pcd2 + 1".to_string());
    symbols.insert("gPkg.Pcd2".to_string(), "1".to_string());
    let tracker = PcdTracker::new(symbols.keys().cloned());
    let in_exceptions = default_in_exceptions();
    let mut evaluator = Evaluator::new("gPkg.Pcd1 == 2", &symbols, &tracker, &in_exceptions, DEFAULT_MAX_DEPTH).unwrap();
    let outcome = evaluator.run(false).unwrap();
    assert_eq!(*outcome.result(), EvalResult::Bool(true));
    assert_eq!(evaluator.depth_reached(), 2);
  }

  #[test]
  fn undefined_pcd_fails_pcd_resolve() {
    let symbols = HashMap::new();
    let tracker = PcdTracker::new(std::iter::empty());
    let in_exceptions = default_in_exceptions();
    let mut evaluator = Evaluator::new("gPkg.Missing == 1", &symbols, &tracker, &in_exceptions, DEFAULT_MAX_DEPTH).unwrap();
    let err = evaluator.run(false).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::PcdResolve);
  }

  #[test]
  fn typed_width_literal_masks_to_declared_width() {
    let symbols = HashMap::new();
    let outcome = eval("UINT8(0x1FF)", &symbols, true);
    assert_eq!(*outcome.result(), EvalResult::Text("255".to_string()));
  }

  #[test]
  fn relational_comparison_between_text_and_non_text_fails() {
    let symbols = HashMap::new();
    let tracker = PcdTracker::new(std::iter::empty());
    let in_exceptions = default_in_exceptions();
    let mut evaluator = Evaluator::new("\"abc\" > 1", &symbols, &tracker, &in_exceptions, DEFAULT_MAX_DEPTH).unwrap();
    let err = evaluator.run(false).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::RelCmpStringOthers);
  }
}
