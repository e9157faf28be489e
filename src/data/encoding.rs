//! Text decoding for plant CSV exports.
//!
//! Exports come from spreadsheet tools configured for GBK as often as for
//! UTF-8, so the encoding is detected by trying decoders in order.

use std::borrow::Cow;

use serde::Serialize;

use crate::error::{FaultsenseError, Result};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Encoding a dataset was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    /// UTF-8 with byte-order mark
    Utf8Sig,
    Utf8,
    /// Simplified Chinese (GBK / CP936)
    Gbk,
    /// Windows-1252 superset of latin-1; decodes any byte sequence
    Latin1,
}

impl TextEncoding {
    /// Decoders in the order they are tried.
    pub const CHAIN: [TextEncoding; 4] = [
        TextEncoding::Utf8Sig,
        TextEncoding::Utf8,
        TextEncoding::Gbk,
        TextEncoding::Latin1,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Gbk => "gbk",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    /// Whether malformed lines are dropped rather than reported.
    #[must_use]
    pub fn skips_bad_lines(self) -> bool {
        self == TextEncoding::Latin1
    }

    fn try_decode(self, bytes: &[u8]) -> Option<Cow<'_, str>> {
        match self {
            TextEncoding::Utf8Sig => bytes
                .strip_prefix(&UTF8_BOM)
                .and_then(|rest| std::str::from_utf8(rest).ok())
                .map(Cow::Borrowed),
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            TextEncoding::Gbk => {
                encoding_rs::GBK.decode_without_bom_handling_and_without_replacement(bytes)
            }
            TextEncoding::Latin1 => {
                Some(encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes).0)
            }
        }
    }
}

/// Decode raw file bytes with the first encoding in [`TextEncoding::CHAIN`]
/// that accepts them.
///
/// # Errors
///
/// Returns an error if `bytes` is empty.
pub fn decode(bytes: &[u8]) -> Result<(Cow<'_, str>, TextEncoding)> {
    if bytes.is_empty() {
        return Err(FaultsenseError::empty_input("file has no content"));
    }
    for encoding in TextEncoding::CHAIN {
        if let Some(text) = encoding.try_decode(bytes) {
            return Ok((text, encoding));
        }
    }
    Err(FaultsenseError::Encoding {
        message: "no decoder in the fallback chain accepted the input".to_string(),
    })
}
