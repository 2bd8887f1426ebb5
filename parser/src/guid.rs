use diagnostic::{diagnostic_code::DiagnosticCode, error::EngineError};
use uuid::Uuid;

/// Renders the canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` textual GUID
/// as the 11-field C-brace structure literal the tokenizer's brace-array
/// path re-parses: `{Data1, Data2, Data3, {Data4[0..8]}}`.
pub fn guid_string_to_guid_structure_string(text: &str) -> Result<String, EngineError> {
  let id = Uuid::parse_str(text)
    .map_err(|e| EngineError::new(DiagnosticCode::BadExpression, format!("invalid GUID `{}`: {}", text, e)))?;
  let bytes = id.as_bytes();

  let data1 = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
  let data2 = u16::from_be_bytes([bytes[4], bytes[5]]);
  let data3 = u16::from_be_bytes([bytes[6], bytes[7]]);
  let data4: Vec<String> = bytes[8..16].iter().map(|b| format!("0x{:02X}", b)).collect();

  Ok(format!(
    "{{0x{:08X},0x{:04X},0x{:04X},{{{}}}}}",
    data1,
    data2,
    data3,
    data4.join(",")
  ))
}

/// Raw 16-byte `EFI_GUID` on-wire encoding (`Data1`/`Data2`/`Data3`
/// little-endian, `Data4` raw) — what the PCD post-processor's `GUID(name)`
/// byte-array emission needs; distinct from the structure-literal text
/// above, which the tokenizer's brace-array path re-parses as a flat NList
/// and would mis-size a multi-byte `Data1`/`Data2`/`Data3` field.
pub fn guid_string_to_bytes(text: &str) -> Result<[u8; 16], EngineError> {
  let id = Uuid::parse_str(text)
    .map_err(|e| EngineError::new(DiagnosticCode::BadExpression, format!("invalid GUID `{}`: {}", text, e)))?;
  let b = id.as_bytes();
  let mut out = [0u8; 16];
  out[0] = b[3];
  out[1] = b[2];
  out[2] = b[1];
  out[3] = b[0];
  out[4] = b[5];
  out[5] = b[4];
  out[6] = b[7];
  out[7] = b[6];
  out[8..16].copy_from_slice(&b[8..16]);
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_eleven_field_structure() {
    let text = guid_string_to_guid_structure_string("8868e871-e4f1-11d3-bc22-0080c73c8881").unwrap();
    assert_eq!(
      text,
      "{0x8868E871,0xE4F1,0x11D3,{0xBC,0x22,0x00,0x80,0xC7,0x3C,0x88,0x81}}"
    );
  }

  #[test]
  fn rejects_malformed_guid() {
    let err = guid_string_to_guid_structure_string("not-a-guid").unwrap_err();
    assert_eq!(err.code, DiagnosticCode::BadExpression);
  }

  #[test]
  fn bytes_encoding_matches_structure_fields() {
    let bytes = guid_string_to_bytes("8868e871-e4f1-11d3-bc22-0080c73c8881").unwrap();
    assert_eq!(bytes[0..4], [0x71, 0xE8, 0x68, 0x88]);
    assert_eq!(bytes[4..6], [0xF1, 0xE4]);
    assert_eq!(bytes[6..8], [0xD3, 0x11]);
    assert_eq!(bytes[8..16], [0xBC, 0x22, 0x00, 0x80, 0xC7, 0x3C, 0x88, 0x81]);
  }
}
