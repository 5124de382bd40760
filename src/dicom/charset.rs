//! Specific Character Set (0008,0005) decoding for text values.

use std::borrow::Cow;

use encoding_rs::Encoding;
use tracing::debug;

/// Text decoder selected by a dataset's Specific Character Set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharacterSet {
    /// No declared character set. Values should be ASCII; anything that is
    /// not valid UTF-8 is read as Latin-1 so distinct bytes stay distinct.
    #[default]
    Default,
    Declared(&'static Encoding),
}

impl CharacterSet {
    /// Resolves a Specific Character Set value. Multi-valued (ISO 2022)
    /// values use the first term that names a non-default repertoire.
    pub fn from_terms(value: &str) -> Self {
        value
            .split('\\')
            .map(|term| term.trim_matches(['\0', ' ']))
            .map(Self::from_term)
            .find(|charset| *charset != CharacterSet::Default)
            .unwrap_or_default()
    }

    fn from_term(term: &str) -> Self {
        let term = term.strip_prefix("ISO 2022 ").unwrap_or(term);
        let encoding = match term {
            "" | "ISO_IR 6" | "IR 6" => return CharacterSet::Default,
            "ISO_IR 100" | "IR 100" => encoding_rs::WINDOWS_1252,
            "ISO_IR 101" | "IR 101" => encoding_rs::ISO_8859_2,
            "ISO_IR 109" | "IR 109" => encoding_rs::ISO_8859_3,
            "ISO_IR 110" | "IR 110" => encoding_rs::ISO_8859_4,
            "ISO_IR 144" | "IR 144" => encoding_rs::ISO_8859_5,
            "ISO_IR 127" | "IR 127" => encoding_rs::ISO_8859_6,
            "ISO_IR 126" | "IR 126" => encoding_rs::ISO_8859_7,
            "ISO_IR 138" | "IR 138" => encoding_rs::ISO_8859_8,
            "ISO_IR 148" | "IR 148" => encoding_rs::WINDOWS_1254,
            "ISO_IR 203" | "IR 203" => encoding_rs::ISO_8859_15,
            "ISO_IR 166" | "IR 166" => encoding_rs::WINDOWS_874,
            "ISO_IR 13" | "IR 13" => encoding_rs::SHIFT_JIS,
            "IR 87" | "IR 159" => encoding_rs::ISO_2022_JP,
            "IR 149" => encoding_rs::EUC_KR,
            "IR 58" | "GBK" => encoding_rs::GBK,
            "GB18030" => encoding_rs::GB18030,
            "ISO_IR 192" => encoding_rs::UTF_8,
            other => {
                debug!(term = other, "Unrecognized character set; using default");
                return CharacterSet::Default;
            }
        };
        CharacterSet::Declared(encoding)
    }

    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            CharacterSet::Default => match std::str::from_utf8(bytes) {
                Ok(text) => Cow::Borrowed(text),
                Err(_) => encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes).0,
            },
            CharacterSet::Declared(encoding) => encoding.decode_without_bom_handling(bytes).0,
        }
    }
}
