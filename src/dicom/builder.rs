//! Minimal Part-10 encoder.
//!
//! Produces small, well-formed DICOM files from dictionary keywords. Used to
//! build fixtures for the reader, the extractor and store-backed runs.

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use tracing::debug;

use super::dictionary::{self, Tag, Vr};
use super::{Encoding, TransferSyntax};

const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone)]
enum Payload {
    Bytes(Vec<u8>),
    UInt16(Vec<u16>),
    Sequence(Vec<Vec<Element>>),
}

#[derive(Debug, Clone)]
struct Element {
    tag: Tag,
    vr: Vr,
    payload: Payload,
}

/// Builder for a DICOM file with a chosen transfer syntax.
///
/// ```
/// use idc_sampler::dicom::{DicomFileBuilder, DicomReader, RecordParser};
///
/// let bytes = DicomFileBuilder::new()
///     .text("Modality", "CT")
///     .texts("ImageType", &["ORIGINAL", "PRIMARY"])
///     .build()
///     .unwrap();
/// let fields = DicomReader::new().parse(&bytes).unwrap();
/// assert_eq!(fields["Modality"].to_string(), "CT");
/// ```
#[derive(Debug, Clone)]
pub struct DicomFileBuilder {
    transfer_syntax: TransferSyntax,
    elements: Vec<Element>,
}

impl Default for DicomFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DicomFileBuilder {
    /// New builder encoding the dataset as explicit VR little endian.
    pub fn new() -> Self {
        Self {
            transfer_syntax: TransferSyntax::ExplicitVrLittleEndian,
            elements: Vec::new(),
        }
    }

    pub fn transfer_syntax(mut self, transfer_syntax: TransferSyntax) -> Self {
        self.transfer_syntax = transfer_syntax;
        self
    }

    /// Adds a text attribute by keyword. Unknown keywords are ignored.
    pub fn text(self, keyword: &str, value: &str) -> Self {
        match dictionary::lookup_keyword(keyword) {
            Some(info) => self.raw(info.tag, info.vr, value.as_bytes().to_vec()),
            None => {
                debug!(keyword, "Keyword not in dictionary; attribute dropped");
                self
            }
        }
    }

    /// Adds a multi-valued text attribute (values joined with `\`).
    pub fn texts(self, keyword: &str, values: &[&str]) -> Self {
        self.text(keyword, &values.join("\\"))
    }

    /// Adds an unsigned short attribute by keyword.
    pub fn uint16(mut self, keyword: &str, value: u16) -> Self {
        if let Some(info) = dictionary::lookup_keyword(keyword) {
            self.elements.push(Element {
                tag: info.tag,
                vr: Vr::US,
                payload: Payload::UInt16(vec![value]),
            });
        }
        self
    }

    /// Adds an element with explicit tag, VR and value bytes.
    pub fn raw(mut self, tag: Tag, vr: Vr, value: Vec<u8>) -> Self {
        self.elements.push(Element {
            tag,
            vr,
            payload: Payload::Bytes(value),
        });
        self
    }

    /// Adds an undefined-length sequence; each builder becomes one item.
    pub fn sequence(mut self, tag: Tag, items: Vec<DicomFileBuilder>) -> Self {
        self.elements.push(Element {
            tag,
            vr: Vr::SQ,
            payload: Payload::Sequence(items.into_iter().map(|b| b.elements).collect()),
        });
        self
    }

    pub fn pixel_data(self, bytes: Vec<u8>) -> Self {
        self.raw(Tag::PIXEL_DATA, Vr::Other(*b"OW"), bytes)
    }

    /// Encodes preamble, meta group and dataset.
    pub fn build(&self) -> std::io::Result<Vec<u8>> {
        let mut out = vec![0u8; 128];
        out.extend_from_slice(b"DICM");

        let meta_elements = vec![
            Element {
                tag: Tag(0x0002, 0x0001),
                vr: Vr::Other(*b"OB"),
                payload: Payload::Bytes(vec![0x00, 0x01]),
            },
            Element {
                tag: Tag::TRANSFER_SYNTAX_UID,
                vr: Vr::UI,
                payload: Payload::Bytes(self.transfer_syntax.uid().as_bytes().to_vec()),
            },
        ];
        let mut meta = Vec::new();
        encode_elements(&meta_elements, Encoding::EXPLICIT_LE, &mut meta);

        write_tag(&mut out, Tag(0x0002, 0x0000), Encoding::EXPLICIT_LE);
        out.extend_from_slice(b"UL");
        write_u16(&mut out, 4, false);
        write_u32(&mut out, meta.len() as u32, false);
        out.extend_from_slice(&meta);

        let mut elements = self.elements.clone();
        elements.sort_by_key(|e| e.tag);
        let mut dataset = Vec::new();
        encode_elements(&elements, self.transfer_syntax.encoding(), &mut dataset);

        if self.transfer_syntax == TransferSyntax::DeflatedExplicitVrLittleEndian {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&dataset)?;
            dataset = encoder.finish()?;
        }
        out.extend_from_slice(&dataset);
        Ok(out)
    }
}

fn encode_elements(elements: &[Element], encoding: Encoding, out: &mut Vec<u8>) {
    for element in elements {
        write_tag(out, element.tag, encoding);
        match &element.payload {
            Payload::Sequence(items) => {
                if encoding.explicit_vr {
                    out.extend_from_slice(b"SQ");
                    out.extend_from_slice(&[0, 0]);
                }
                write_u32(out, UNDEFINED_LENGTH, encoding.big_endian);
                for item in items {
                    write_tag(out, Tag::ITEM, encoding);
                    write_u32(out, UNDEFINED_LENGTH, encoding.big_endian);
                    encode_elements(item, encoding, out);
                    write_tag(out, Tag::ITEM_DELIMITATION, encoding);
                    write_u32(out, 0, encoding.big_endian);
                }
                write_tag(out, Tag::SEQUENCE_DELIMITATION, encoding);
                write_u32(out, 0, encoding.big_endian);
            }
            payload => {
                let mut value = match payload {
                    Payload::UInt16(values) => {
                        let mut bytes = Vec::with_capacity(values.len() * 2);
                        for v in values {
                            write_u16(&mut bytes, *v, encoding.big_endian);
                        }
                        bytes
                    }
                    Payload::Bytes(bytes) => bytes.clone(),
                    Payload::Sequence(_) => Vec::new(),
                };
                if value.len() % 2 == 1 {
                    value.push(element.vr.padding());
                }
                write_length(out, element.vr, value.len() as u32, encoding);
                out.extend_from_slice(&value);
            }
        }
    }
}

fn write_length(out: &mut Vec<u8>, vr: Vr, length: u32, encoding: Encoding) {
    if !encoding.explicit_vr {
        write_u32(out, length, encoding.big_endian);
        return;
    }
    out.extend_from_slice(&vr.code());
    if vr.has_long_length() {
        out.extend_from_slice(&[0, 0]);
        write_u32(out, length, encoding.big_endian);
    } else {
        write_u16(out, length as u16, encoding.big_endian);
    }
}

fn write_tag(out: &mut Vec<u8>, tag: Tag, encoding: Encoding) {
    write_u16(out, tag.0, encoding.big_endian);
    write_u16(out, tag.1, encoding.big_endian);
}

fn write_u16(out: &mut Vec<u8>, value: u16, big_endian: bool) {
    if big_endian {
        out.extend_from_slice(&value.to_be_bytes());
    } else {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

fn write_u32(out: &mut Vec<u8>, value: u32, big_endian: bool) {
    if big_endian {
        out.extend_from_slice(&value.to_be_bytes());
    } else {
        out.extend_from_slice(&value.to_le_bytes());
    }
}
