//! Text encodings for string output.

use std::fmt;

use clap::ValueEnum;

use crate::error::{CliError, Result};

/// Encoding applied to text results. Binary results are written as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TextEncoding {
    #[default]
    #[value(name = "utf-8", alias = "utf8")]
    Utf8,
    #[value(name = "utf-16le")]
    Utf16Le,
    #[value(name = "utf-16be")]
    Utf16Be,
    #[value(name = "latin-1", aliases = ["latin1", "iso-8859-1"])]
    Latin1,
    #[value(name = "ascii")]
    Ascii,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Ascii => "ascii",
        }
    }

    /// Encode `text`; characters outside the encoding's range are an error.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            TextEncoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            TextEncoding::Latin1 => self.single_byte(text, 0xFF),
            TextEncoding::Ascii => self.single_byte(text, 0x7F),
        }
    }

    fn single_byte(&self, text: &str, max: u32) -> Result<Vec<u8>> {
        text.chars()
            .map(|ch| match u8::try_from(ch as u32) {
                Ok(byte) if ch as u32 <= max => Ok(byte),
                _ => Err(CliError::Encoding {
                    encoding: self.name(),
                    ch,
                }),
            })
            .collect()
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_byte_orders() {
        assert_eq!(TextEncoding::Utf16Le.encode("Aé").unwrap(), vec![0x41, 0x00, 0xE9, 0x00]);
        assert_eq!(TextEncoding::Utf16Be.encode("Aé").unwrap(), vec![0x00, 0x41, 0x00, 0xE9]);
    }

    #[test]
    fn single_byte_encodings_reject_wide_characters() {
        assert_eq!(TextEncoding::Latin1.encode("é").unwrap(), vec![0xE9]);
        let err = TextEncoding::Ascii.encode("é").unwrap_err();
        assert!(matches!(err, CliError::Encoding { encoding: "ascii", ch: 'é' }));
        assert!(TextEncoding::Latin1.encode("€").is_err());
    }

    #[test]
    fn names_parse_back() {
        for encoding in TextEncoding::value_variants() {
            assert_eq!(TextEncoding::from_str(encoding.name(), true).unwrap(), *encoding);
        }
        assert_eq!(TextEncoding::from_str("utf8", true).unwrap(), TextEncoding::Utf8);
    }
}
