/// A raw lexical token, produced before operator-alias normalization or
/// symbol-table resolution. The parser turns these into typed `Value`s.
#[derive(Debug, Clone, PartialEq)]
pub enum RawToken {
  LParen,
  RParen,
  Colon,
  Question,
  /// Any recognized operator/keyword spelling (`&&`, `AND`, `and`, `EQ`, …),
  /// normalized to uppercase so the parser can match on a single spelling.
  Op(String),
  /// A plain or dotted identifier (`ARCH`, `gPlatformTokenSpaceGuid.PcdFoo`).
  Ident(String),
  /// Raw decimal or `0x`-prefixed hex digits, not yet parsed to an integer.
  Number(String),
  /// `'...'`, `"..."`, `L'...'`, `L"..."`. `single_quote` distinguishes a
  /// char literal from a string literal; `wide` records the `L` prefix.
  Quoted {
    wide: bool,
    single_quote: bool,
    text: String,
  },
  /// A validated `{ ... }` literal, either an NList of hex bytes or an
  /// 11-field GUID structure. Canonical text with interior whitespace
  /// stripped.
  ByteArray(String),
  /// A bare `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` GUID literal, not yet
  /// expanded into its brace-array form (the parser owns that collaborator).
  Guid(String),
  /// `UINT8(expr)` .. `UINT64(expr)`; `inner` is the unparsed text between
  /// the matching parens.
  TypedWidth { width: u8, inner: String },
  Eof,
}

impl RawToken {
  pub fn is_eof(&self) -> bool {
    matches!(self, RawToken::Eof)
  }
}
