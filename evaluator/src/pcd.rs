use std::collections::HashMap;

use diagnostic::{diagnostic_code::DiagnosticCode, error::EngineError};
use parser::{evaluator::Evaluator, field_value, guid::guid_string_to_bytes, value::Value};
use scanner::pcd_tracker::PcdTracker;

use crate::{config::SymbolTable, EngineConfig};

/// The declared type of a PCD, per §4.6's type set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdType {
  UInt8,
  UInt16,
  UInt32,
  UInt64,
  Boolean,
  VoidStar,
}

impl PcdType {
  pub fn byte_width(self) -> Option<u32> {
    match self {
      PcdType::UInt8 | PcdType::Boolean => Some(1),
      PcdType::UInt16 => Some(2),
      PcdType::UInt32 => Some(4),
      PcdType::UInt64 => Some(8),
      PcdType::VoidStar => None,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      PcdType::UInt8 => "UINT8",
      PcdType::UInt16 => "UINT16",
      PcdType::UInt32 => "UINT32",
      PcdType::UInt64 => "UINT64",
      PcdType::Boolean => "BOOLEAN",
      PcdType::VoidStar => "VOID*",
    }
  }
}

/// Wraps the core evaluator with the typed-coercion layer keyed by a
/// declared PCD type (§4.6). Tries a normal evaluation first; if that
/// fails (or yields a shape the declared type rejects), falls back to a
/// structural re-parse of the raw expression text. If that also fails, the
/// *original* diagnostic is augmented with `{type, value}` and re-raised.
pub fn evaluate_typed(
  expr: &str,
  pcd_type: PcdType,
  symbols: &SymbolTable,
  tracker: &PcdTracker,
  config: &EngineConfig,
) -> Result<String, EngineError> {
  match try_value_path(expr, pcd_type, symbols, tracker, config) {
    Ok(text) => Ok(text),
    Err(original_err) => structural_recover(expr.trim(), pcd_type, symbols, tracker, config)
      .map_err(|_recover_err| original_err.augment_with_pcd_type(pcd_type.name(), expr)),
  }
}

fn try_value_path(
  expr: &str,
  pcd_type: PcdType,
  symbols: &SymbolTable,
  tracker: &PcdTracker,
  config: &EngineConfig,
) -> Result<String, EngineError> {
  let mut evaluator = Evaluator::new(expr, symbols, tracker, &config.in_exceptions, config.max_depth)?;
  let value = evaluator.eval_raw(true)?;

  match (pcd_type, &value) {
    (PcdType::VoidStar, Value::ByteString(_) | Value::WideString(_)) => {
      let (packed, size) = field_value::parse_field_value(&value.to_canonical_text())?;
      Ok(format_byte_array(&little_endian_bytes_sized(packed, size)))
    },
    (PcdType::VoidStar, _) => Err(EngineError::new(
      DiagnosticCode::ExprTypeMismatch,
      "VOID* PCD did not evaluate to a char or string literal",
    )),
    (_, Value::ByteString(_) | Value::WideString(_) | Value::ByteArray(_)) => Err(EngineError::new(
      DiagnosticCode::ExprTypeMismatch,
      format!("{} PCD must not evaluate to a string or array literal", pcd_type.name()),
    )),
    (PcdType::Boolean, Value::Boolean(b)) => Ok(if *b { "1".to_string() } else { "0".to_string() }),
    (PcdType::Boolean, Value::Integer(i)) => Ok(if *i != 0 { "1".to_string() } else { "0".to_string() }),
    (_, Value::Integer(i)) => {
      let width = pcd_type.byte_width().expect("numeric types always declare a width");
      if *i < 0 {
        return Err(EngineError::new(
          DiagnosticCode::NegativePcd,
          format!("`{}` is negative, not allowed in a {} PCD", i, pcd_type.name()),
        ));
      }
      let (_, size) = field_value::parse_field_value(&i.to_string())?;
      if size > width {
        return Err(EngineError::new(
          DiagnosticCode::PcdWidthExceeded,
          format!("`{}` exceeds the declared {} width", i, pcd_type.name()),
        ));
      }
      Ok(format!("0x{:0width$X}", i, width = (width * 2) as usize))
    },
    (_, Value::Boolean(b)) => {
      let width = pcd_type.byte_width().expect("numeric types always declare a width");
      let i = if *b { 1 } else { 0 };
      Ok(format!("0x{:0width$X}", i, width = (width * 2) as usize))
    },
    (_, Value::RawText(_)) => Err(EngineError::new(
      DiagnosticCode::ExprTypeMismatch,
      format!("{} PCD did not evaluate to a numeric value", pcd_type.name()),
    )),
  }
}

fn structural_recover(
  trimmed: &str,
  pcd_type: PcdType,
  symbols: &SymbolTable,
  tracker: &PcdTracker,
  config: &EngineConfig,
) -> Result<String, EngineError> {
  match pcd_type {
    PcdType::VoidStar => structural_recover_void_star(trimmed, symbols, tracker, config),
    _ => structural_recover_numeric(trimmed, pcd_type, symbols, tracker, config),
  }
}

fn structural_recover_numeric(
  trimmed: &str,
  pcd_type: PcdType,
  symbols: &SymbolTable,
  tracker: &PcdTracker,
  config: &EngineConfig,
) -> Result<String, EngineError> {
  let declared_width = pcd_type.byte_width().expect("numeric types always declare a width");

  let items: Vec<String> = if trimmed.starts_with('{') && trimmed.ends_with('}') {
    split_top_level_commas(&trimmed[1..trimmed.len() - 1])
  } else {
    vec![trimmed.to_string()]
  };

  let mut result: i128 = 0;
  let mut running_size: u32 = 0;
  for item in &items {
    let item = item.trim();
    let (value, size) = resolve_typed_item(item, symbols, tracker, config)?;
    if value < 0 {
      return Err(EngineError::new(
        DiagnosticCode::NegativePcd,
        format!("negative value in `{}`, not allowed in a {} PCD", item, pcd_type.name()),
      ));
    }
    if running_size + size > declared_width {
      return Err(EngineError::new(
        DiagnosticCode::PcdWidthExceeded,
        format!("`{}` exceeds the declared {} width", trimmed, pcd_type.name()),
      ));
    }
    result |= value << (running_size * 8);
    running_size += size;
  }

  Ok(format!("0x{:0width$X}", result, width = (declared_width * 2) as usize))
}

fn resolve_typed_item(
  item: &str,
  symbols: &SymbolTable,
  tracker: &PcdTracker,
  config: &EngineConfig,
) -> Result<(i128, u32), EngineError> {
  if let Some(width) = explicit_width_prefix(item) {
    let (value, _) = field_value::parse_field_value(item)?;
    return Ok((value, width));
  }

  let mut evaluator = Evaluator::new(item, symbols, tracker, &config.in_exceptions, config.max_depth)?;
  match evaluator.eval_raw(true)? {
    Value::Integer(i) => {
      let (_, size) = field_value::parse_field_value(&i.to_string())?;
      Ok((i, size))
    },
    Value::Boolean(b) => Ok((if b { 1 } else { 0 }, 1)),
    other => Err(EngineError::new(
      DiagnosticCode::ExprTypeMismatch,
      format!("`{}` is not a numeric PCD item (got {:?})", item, other),
    )),
  }
}

fn explicit_width_prefix(item: &str) -> Option<u32> {
  let t = item.trim();
  if t.starts_with("UINT8(") {
    Some(1)
  } else if t.starts_with("UINT16(") {
    Some(2)
  } else if t.starts_with("UINT32(") {
    Some(4)
  } else if t.starts_with("UINT64(") {
    Some(8)
  } else {
    None
  }
}

fn structural_recover_void_star(
  trimmed: &str,
  symbols: &SymbolTable,
  tracker: &PcdTracker,
  config: &EngineConfig,
) -> Result<String, EngineError> {
  if !trimmed.starts_with('{') {
    let (value, _) = field_value::parse_field_value(trimmed)?;
    if value == 0 {
      return Ok("{0x00}".to_string());
    }
    return Ok(format_byte_array(&little_endian_bytes(value)));
  }

  let inner = trimmed[1..trimmed.len() - 1].trim();

  if let Some(name) = strip_call(inner, "GUID") {
    let name = name.trim();
    let guid_text = symbols
      .get(name)
      .ok_or_else(|| EngineError::new(DiagnosticCode::PcdResolve, format!("undefined GUID symbol `{}`", name)).with_pcd(name.to_string()))?;
    let bytes = guid_string_to_bytes(guid_text)?;
    return Ok(format_byte_array(&bytes));
  }

  if let Some(device_path) = strip_call(inner, "DEVICE_PATH") {
    let (value, size) = field_value::parse_field_value(device_path.trim())?;
    return Ok(format_byte_array(&little_endian_bytes_sized(value, size)));
  }

  let items = split_top_level_commas(inner);
  let mut label_positions: HashMap<String, usize> = HashMap::new();
  for (idx, item) in items.iter().enumerate() {
    if let Some(name) = strip_call(item.trim(), "LABEL") {
      label_positions.insert(name.trim().to_string(), idx);
    }
  }

  let mut packed_items: Vec<(i128, u32)> = Vec::new();
  for item in &items {
    let item = item.trim();
    if strip_call(item, "LABEL").is_some() {
      continue;
    }
    if let Some(name) = strip_call(item, "OFFSET_OF") {
      let name = name.trim();
      let index = label_positions
        .get(name)
        .ok_or_else(|| EngineError::new(DiagnosticCode::UndefinedOffset, format!("`OFFSET_OF({})` has no matching `LABEL({})`", name, name)))?;
      packed_items.push((*index as i128, 4));
      continue;
    }
    packed_items.push(resolve_typed_item(item, symbols, tracker, config)?);
  }

  let mut bytes = Vec::new();
  for (value, size) in packed_items {
    bytes.extend(little_endian_bytes_sized(value, size));
  }
  Ok(format_byte_array(&bytes))
}

fn strip_call<'a>(text: &'a str, name: &str) -> Option<&'a str> {
  let prefix = format!("{}(", name);
  if text.starts_with(&prefix) && text.ends_with(')') {
    Some(&text[prefix.len()..text.len() - 1])
  } else {
    None
  }
}

fn split_top_level_commas(s: &str) -> Vec<String> {
  let mut items = Vec::new();
  let mut depth = 0i32;
  let mut current = String::new();
  for c in s.chars() {
    match c {
      '(' | '{' => {
        depth += 1;
        current.push(c);
      },
      ')' | '}' => {
        depth -= 1;
        current.push(c);
      },
      ',' if depth == 0 => {
        items.push(current.trim().to_string());
        current.clear();
      },
      _ => current.push(c),
    }
  }
  if !current.trim().is_empty() {
    items.push(current.trim().to_string());
  }
  items
}

fn little_endian_bytes(value: i128) -> Vec<u8> {
  let mut bytes = Vec::new();
  let mut v = value;
  while v > 0 {
    bytes.push((v & 0xFF) as u8);
    v >>= 8;
  }
  bytes
}

fn little_endian_bytes_sized(value: i128, size: u32) -> Vec<u8> {
  (0..size).map(|i| ((value >> (i * 8)) & 0xFF) as u8).collect()
}

fn format_byte_array(bytes: &[u8]) -> String {
  let fields: Vec<String> = bytes.iter().map(|b| format!("0x{:02X}", b)).collect();
  format!("{{{}}}", fields.join(","))
}
