//! DICOM Part-10 reading.
//!
//! The sampler only needs a handful of descriptive attributes from each
//! object, so this is a focused reader rather than a full toolkit:
//!
//! - the 128-byte preamble and `DICM` marker are validated
//! - the file meta group selects the dataset transfer syntax
//! - elements are decoded until Pixel Data; sequences and
//!   undefined-length values are skipped structurally
//! - only attributes in [`dictionary`] are returned, keyed by keyword
//! - text is decoded per the Specific Character Set, see [`CharacterSet`]
//!
//! [`RecordParser`] is the seam the metadata extractor depends on, so
//! tests and alternative readers can stand in for [`DicomReader`].

pub mod builder;
pub mod charset;
pub mod dictionary;
pub mod reader;

use std::collections::HashMap;

use crate::error::DicomParseError;
use crate::metadata::FieldValue;

pub use builder::DicomFileBuilder;
pub use charset::CharacterSet;
pub use dictionary::{Tag, Vr};
pub use reader::DicomReader;

/// Decoded attributes keyed by DICOM keyword (e.g. `"Modality"`).
pub type FieldMap = HashMap<String, FieldValue>;

/// Parses raw object bytes into named fields.
pub trait RecordParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<FieldMap, DicomParseError>;
}

pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";

/// Dataset encodings the reader understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSyntax {
    ImplicitVrLittleEndian,
    ExplicitVrLittleEndian,
    ExplicitVrBigEndian,
    DeflatedExplicitVrLittleEndian,
    /// Compressed pixel data (JPEG family, RLE, ...). The dataset itself
    /// is explicit VR little endian.
    Encapsulated(String),
}

impl TransferSyntax {
    pub fn from_uid(uid: &str) -> Result<Self, DicomParseError> {
        let uid = uid.trim_end_matches(['\0', ' ']);
        match uid {
            IMPLICIT_VR_LITTLE_ENDIAN => Ok(TransferSyntax::ImplicitVrLittleEndian),
            EXPLICIT_VR_LITTLE_ENDIAN => Ok(TransferSyntax::ExplicitVrLittleEndian),
            EXPLICIT_VR_BIG_ENDIAN => Ok(TransferSyntax::ExplicitVrBigEndian),
            DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => {
                Ok(TransferSyntax::DeflatedExplicitVrLittleEndian)
            }
            other if other.starts_with("1.2.840.10008.1.2.4.") || other == "1.2.840.10008.1.2.5" => {
                Ok(TransferSyntax::Encapsulated(other.to_string()))
            }
            other => Err(DicomParseError::UnsupportedTransferSyntax(other.to_string())),
        }
    }

    pub fn uid(&self) -> &str {
        match self {
            TransferSyntax::ImplicitVrLittleEndian => IMPLICIT_VR_LITTLE_ENDIAN,
            TransferSyntax::ExplicitVrLittleEndian => EXPLICIT_VR_LITTLE_ENDIAN,
            TransferSyntax::ExplicitVrBigEndian => EXPLICIT_VR_BIG_ENDIAN,
            TransferSyntax::DeflatedExplicitVrLittleEndian => DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
            TransferSyntax::Encapsulated(uid) => uid,
        }
    }

    pub(crate) fn encoding(&self) -> Encoding {
        match self {
            TransferSyntax::ImplicitVrLittleEndian => Encoding {
                explicit_vr: false,
                big_endian: false,
            },
            TransferSyntax::ExplicitVrBigEndian => Encoding {
                explicit_vr: true,
                big_endian: true,
            },
            _ => Encoding::EXPLICIT_LE,
        }
    }
}

/// Wire layout of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Encoding {
    pub explicit_vr: bool,
    pub big_endian: bool,
}

impl Encoding {
    pub const EXPLICIT_LE: Encoding = Encoding {
        explicit_vr: true,
        big_endian: false,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_syntax_from_uid() {
        assert_eq!(
            TransferSyntax::from_uid("1.2.840.10008.1.2\0").unwrap(),
            TransferSyntax::ImplicitVrLittleEndian
        );
        assert_eq!(
            TransferSyntax::from_uid("1.2.840.10008.1.2.4.50").unwrap(),
            TransferSyntax::Encapsulated("1.2.840.10008.1.2.4.50".to_string())
        );
        assert!(matches!(
            TransferSyntax::from_uid("1.2.3.4"),
            Err(DicomParseError::UnsupportedTransferSyntax(_))
        ));
    }

    #[test]
    fn test_encapsulated_uses_explicit_little_endian() {
        let ts = TransferSyntax::Encapsulated("1.2.840.10008.1.2.5".to_string());
        assert_eq!(ts.encoding(), Encoding::EXPLICIT_LE);
    }
}
