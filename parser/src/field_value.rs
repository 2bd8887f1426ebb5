use diagnostic::{diagnostic_code::DiagnosticCode, error::EngineError};

/// Parses a field-value literal into its packed integer representation and
/// byte width, mirroring EDK2 BaseTools' `Misc.ParseFieldValue` contract
/// (§6A): char/string/wide literals, `UINTn(...)` typed literals, hex and
/// decimal integers, and flat `{...}` byte arrays.
///
/// `GUID(...)`/`DEVICE_PATH(...)` markers require symbol-table/label
/// context this free function does not have; calling it directly on those
/// forms is a caller error and fails with `BadExpression`.
pub fn parse_field_value(text: &str) -> Result<(i128, u32), EngineError> {
  let t = text.trim();

  if let Some(inner) = strip_quotes(t, '\'', true) {
    return pack_wide(&inner);
  }
  if let Some(inner) = strip_quotes(t, '"', true) {
    return pack_wide(&inner);
  }
  if let Some(inner) = strip_quotes(t, '\'', false) {
    return pack_narrow(&inner);
  }
  if let Some(inner) = strip_quotes(t, '"', false) {
    return pack_narrow(&inner);
  }
  if let Some(result) = parse_typed_width(t)? {
    return Ok(result);
  }
  if t.starts_with("GUID(") || t.starts_with("DEVICE_PATH(") {
    return Err(EngineError::new(
      DiagnosticCode::BadExpression,
      format!("`{}` requires PCD post-processing context", t),
    ));
  }
  if t.starts_with('{') && t.ends_with('}') {
    return parse_nlist(t);
  }
  parse_integer(t)
}

fn strip_quotes(text: &str, quote: char, wide: bool) -> Option<String> {
  if wide {
    if !text.starts_with('L') {
      return None;
    }
    let rest = &text[1..];
    if rest.len() < 2 || !rest.starts_with(quote) || !rest.ends_with(quote) {
      return None;
    }
    Some(rest[1..rest.len() - 1].to_string())
  } else {
    if text.starts_with('L') {
      return None;
    }
    if text.len() < 2 || !text.starts_with(quote) || !text.ends_with(quote) {
      return None;
    }
    Some(text[1..text.len() - 1].to_string())
  }
}

fn pack_narrow(inner: &str) -> Result<(i128, u32), EngineError> {
  let bytes = inner.as_bytes();
  if bytes.is_empty() {
    return Err(EngineError::new(DiagnosticCode::EmptyToken, "empty char/string literal"));
  }
  Ok((pack_le_bytes(bytes), bytes.len() as u32))
}

fn pack_wide(inner: &str) -> Result<(i128, u32), EngineError> {
  let units: Vec<u16> = inner.encode_utf16().collect();
  if units.is_empty() {
    return Err(EngineError::new(DiagnosticCode::EmptyToken, "empty wide char/string literal"));
  }
  Ok((pack_le_u16(&units), (units.len() * 2) as u32))
}

fn pack_le_bytes(bytes: &[u8]) -> i128 {
  bytes.iter().rev().fold(0i128, |acc, &b| (acc << 8) | b as i128)
}

fn pack_le_u16(units: &[u16]) -> i128 {
  units.iter().rev().fold(0i128, |acc, &u| (acc << 16) | u as i128)
}

fn parse_typed_width(t: &str) -> Result<Option<(i128, u32)>, EngineError> {
  let width = if let Some(inner) = t.strip_prefix("UINT8(") {
    Some((inner, 1u32))
  } else if let Some(inner) = t.strip_prefix("UINT16(") {
    Some((inner, 2u32))
  } else if let Some(inner) = t.strip_prefix("UINT32(") {
    Some((inner, 4u32))
  } else if let Some(inner) = t.strip_prefix("UINT64(") {
    Some((inner, 8u32))
  } else {
    None
  };

  let Some((inner, width_bytes)) = width else {
    return Ok(None);
  };
  let Some(inner) = inner.strip_suffix(')') else {
    return Err(EngineError::new(
      DiagnosticCode::Syntax,
      format!("unterminated typed-width literal `{}`", t),
    ));
  };
  let (value, _) = parse_integer(inner.trim())?;
  let modulus = 1i128 << (width_bytes * 8).min(120);
  let masked = ((value % modulus) + modulus) % modulus;
  Ok(Some((masked, width_bytes)))
}

fn parse_nlist(t: &str) -> Result<(i128, u32), EngineError> {
  let inner = &t[1..t.len() - 1];
  let mut bytes = Vec::new();
  for field in inner.split(',') {
    let field = field.trim();
    if field.is_empty() {
      continue;
    }
    let (value, _) = parse_integer(field)?;
    bytes.push((value & 0xFF) as u8);
  }
  if bytes.is_empty() {
    return Err(EngineError::new(DiagnosticCode::BadArrayToken, "empty byte array"));
  }
  Ok((pack_le_bytes(&bytes), bytes.len() as u32))
}

pub(crate) fn parse_integer(t: &str) -> Result<(i128, u32), EngineError> {
  let (value, negative) = if let Some(rest) = t.strip_prefix('-') {
    (rest, true)
  } else {
    (t, false)
  };

  let magnitude = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
    i128::from_str_radix(hex, 16)
  } else {
    value.parse::<i128>()
  }
  .map_err(|_| EngineError::new(DiagnosticCode::BadExpression, format!("not a field value: `{}`", t)))?;

  let signed = if negative { -magnitude } else { magnitude };
  Ok((signed, min_byte_count(signed)))
}

fn min_byte_count(v: i128) -> u32 {
  if v == 0 {
    return 1;
  }
  let magnitude = v.unsigned_abs();
  let bits = 128 - magnitude.leading_zeros();
  ((bits + 7) / 8).max(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_narrow_char_literal() {
    assert_eq!(parse_field_value("'A'").unwrap(), (0x41, 1));
  }

  #[test]
  fn parses_wide_char_literal() {
    assert_eq!(parse_field_value("L'A'").unwrap(), (0x41, 2));
  }

  #[test]
  fn parses_narrow_string_little_endian() {
    // 'a' = 0x61, 'b' = 0x62 -> little-endian packed as 0x6261
    assert_eq!(parse_field_value("\"ab\"").unwrap(), (0x6261, 2));
  }

  #[test]
  fn parses_hex_and_decimal_integers() {
    assert_eq!(parse_field_value("0x1234").unwrap(), (0x1234, 2));
    assert_eq!(parse_field_value("42").unwrap(), (42, 1));
  }

  #[test]
  fn parses_typed_width_literal() {
    assert_eq!(parse_field_value("UINT16(0x0203)").unwrap(), (0x0203, 2));
  }

  #[test]
  fn parses_flat_byte_array() {
    assert_eq!(parse_field_value("{0x01,0x02,0x03}").unwrap(), (0x030201, 3));
  }

  #[test]
  fn guid_marker_is_caller_error() {
    let err = parse_field_value("GUID(gFoo)").unwrap_err();
    assert_eq!(err.code, DiagnosticCode::BadExpression);
  }
}
