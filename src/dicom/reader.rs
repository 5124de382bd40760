//! Part-10 file reader.

use std::io::Read;

use flate2::read::DeflateDecoder;

use super::charset::CharacterSet;
use super::dictionary::{self, Tag, Vr};
use super::{Encoding, FieldMap, RecordParser, TransferSyntax};
use crate::error::DicomParseError;
use crate::metadata::FieldValue;

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;
const MAX_SEQUENCE_DEPTH: usize = 64;

/// Reads the sampler's attributes out of a DICOM Part-10 byte stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomReader;

impl DicomReader {
    pub fn new() -> Self {
        Self
    }
}

impl RecordParser for DicomReader {
    fn parse(&self, bytes: &[u8]) -> Result<FieldMap, DicomParseError> {
        read_part10(bytes)
    }
}

/// Parses a complete Part-10 file: preamble, meta group, then dataset.
pub fn read_part10(bytes: &[u8]) -> Result<FieldMap, DicomParseError> {
    let header_len = PREAMBLE_LEN + MAGIC.len();
    if bytes.len() < header_len {
        return Err(DicomParseError::Truncated {
            offset: bytes.len(),
            needed: header_len - bytes.len(),
        });
    }
    if &bytes[PREAMBLE_LEN..header_len] != MAGIC {
        return Err(DicomParseError::MissingMagic);
    }

    let mut fields = FieldMap::new();

    // The file meta group is always explicit VR little endian.
    let mut cursor = Cursor::new(bytes, header_len, Encoding::EXPLICIT_LE);
    while cursor.remaining() >= 4 && cursor.peek_tag()?.group() == 0x0002 {
        let header = cursor.read_header()?;
        read_element(&mut cursor, header, CharacterSet::Default, &mut fields)?;
    }

    let transfer_syntax = match fields.get("TransferSyntaxUID").and_then(FieldValue::as_str) {
        Some(uid) => TransferSyntax::from_uid(uid)?,
        None => TransferSyntax::ImplicitVrLittleEndian,
    };

    let dataset_start = cursor.pos;
    if transfer_syntax == TransferSyntax::DeflatedExplicitVrLittleEndian {
        let mut inflated = Vec::new();
        DeflateDecoder::new(&bytes[dataset_start..]).read_to_end(&mut inflated)?;
        read_dataset(
            &mut Cursor::new(&inflated, 0, transfer_syntax.encoding()),
            &mut fields,
        )?;
    } else {
        read_dataset(
            &mut Cursor::new(bytes, dataset_start, transfer_syntax.encoding()),
            &mut fields,
        )?;
    }

    Ok(fields)
}

fn read_dataset(cursor: &mut Cursor<'_>, fields: &mut FieldMap) -> Result<(), DicomParseError> {
    let mut charset = CharacterSet::Default;
    while !cursor.is_empty() {
        let header = cursor.read_header()?;
        if header.tag == Tag::PIXEL_DATA {
            break;
        }
        if header.tag.is_delimiter_group() {
            return Err(DicomParseError::Malformed {
                tag: header.tag.to_string(),
                reason: "item or delimiter outside of a sequence".to_string(),
            });
        }
        read_element(cursor, header, charset, fields)?;
        if header.tag == Tag::SPECIFIC_CHARACTER_SET {
            if let Some(value) = fields.get("SpecificCharacterSet") {
                charset = CharacterSet::from_terms(&value.to_string());
            }
        }
    }
    Ok(())
}

fn read_element(
    cursor: &mut Cursor<'_>,
    header: Header,
    charset: CharacterSet,
    fields: &mut FieldMap,
) -> Result<(), DicomParseError> {
    if header.length == UNDEFINED_LENGTH {
        // UN with undefined length wraps an implicit VR little endian sequence.
        let saved = cursor.encoding;
        if header.vr == Vr::Other(*b"UN") {
            cursor.encoding = Encoding {
                explicit_vr: false,
                big_endian: false,
            };
        }
        let result = skip_undefined(cursor, 1);
        cursor.encoding = saved;
        return result;
    }

    let value = cursor.take(header.length as usize)?;
    if header.vr == Vr::SQ {
        return Ok(());
    }

    if let Some(info) = dictionary::lookup(header.tag) {
        let vr = match header.vr {
            Vr::Other(_) => info.vr,
            vr => vr,
        };
        if let Some(decoded) = decode_value(vr, value, cursor.encoding.big_endian, charset) {
            fields.insert(info.keyword.to_string(), decoded);
        }
    }
    Ok(())
}

/// Skips an undefined-length value: items until the sequence delimiter.
fn skip_undefined(cursor: &mut Cursor<'_>, depth: usize) -> Result<(), DicomParseError> {
    if depth > MAX_SEQUENCE_DEPTH {
        return Err(DicomParseError::Malformed {
            tag: Tag::ITEM.to_string(),
            reason: format!("sequences nested deeper than {}", MAX_SEQUENCE_DEPTH),
        });
    }
    loop {
        let tag = cursor.read_tag()?;
        let length = cursor.read_u32()?;
        match tag {
            Tag::SEQUENCE_DELIMITATION => return Ok(()),
            Tag::ITEM if length == UNDEFINED_LENGTH => skip_item(cursor, depth)?,
            Tag::ITEM => cursor.skip(length)?,
            other => {
                return Err(DicomParseError::Malformed {
                    tag: other.to_string(),
                    reason: "expected an item or sequence delimiter".to_string(),
                })
            }
        }
    }
}

/// Skips the elements of an undefined-length item up to its delimiter.
fn skip_item(cursor: &mut Cursor<'_>, depth: usize) -> Result<(), DicomParseError> {
    loop {
        if cursor.peek_tag()? == Tag::ITEM_DELIMITATION {
            cursor.read_tag()?;
            cursor.read_u32()?;
            return Ok(());
        }
        let header = cursor.read_header()?;
        if header.tag.is_delimiter_group() {
            return Err(DicomParseError::Malformed {
                tag: header.tag.to_string(),
                reason: "unexpected delimiter inside an item".to_string(),
            });
        }
        if header.length == UNDEFINED_LENGTH {
            skip_undefined(cursor, depth + 1)?;
        } else {
            cursor.skip(header.length)?;
        }
    }
}

fn decode_value(
    vr: Vr,
    bytes: &[u8],
    big_endian: bool,
    charset: CharacterSet,
) -> Option<FieldValue> {
    if vr.is_text() {
        let text = charset.decode(bytes);
        let text = text.trim_end_matches(['\0', ' ']);
        if vr.is_single_valued_text() {
            return Some(FieldValue::Text(text.to_string()));
        }
        let values = text
            .split('\\')
            .map(|part| text_scalar(vr, part.trim_matches(['\0', ' '])))
            .collect();
        return Some(collapse(values));
    }

    let values: Vec<FieldValue> = match vr {
        Vr::US => bytes
            .chunks_exact(2)
            .map(|b| i64::from(read_u16([b[0], b[1]], big_endian)))
            .map(FieldValue::Integer)
            .collect(),
        Vr::SS => bytes
            .chunks_exact(2)
            .map(|b| i64::from(read_u16([b[0], b[1]], big_endian) as i16))
            .map(FieldValue::Integer)
            .collect(),
        Vr::UL => bytes
            .chunks_exact(4)
            .map(|b| i64::from(read_u32([b[0], b[1], b[2], b[3]], big_endian)))
            .map(FieldValue::Integer)
            .collect(),
        Vr::SL => bytes
            .chunks_exact(4)
            .map(|b| i64::from(read_u32([b[0], b[1], b[2], b[3]], big_endian) as i32))
            .map(FieldValue::Integer)
            .collect(),
        _ => return None,
    };
    Some(collapse(values))
}

fn text_scalar(vr: Vr, value: &str) -> FieldValue {
    match vr {
        Vr::IS => value
            .parse::<i64>()
            .map(FieldValue::Integer)
            .unwrap_or_else(|_| FieldValue::Text(value.to_string())),
        Vr::DA => FieldValue::Date(value.to_string()),
        _ => FieldValue::Text(value.to_string()),
    }
}

fn collapse(mut values: Vec<FieldValue>) -> FieldValue {
    if values.len() == 1 {
        values.remove(0)
    } else {
        FieldValue::List(values)
    }
}

fn read_u16(bytes: [u8; 2], big_endian: bool) -> u16 {
    if big_endian {
        u16::from_be_bytes(bytes)
    } else {
        u16::from_le_bytes(bytes)
    }
}

fn read_u32(bytes: [u8; 4], big_endian: bool) -> u32 {
    if big_endian {
        u32::from_be_bytes(bytes)
    } else {
        u32::from_le_bytes(bytes)
    }
}

#[derive(Debug, Clone, Copy)]
struct Header {
    tag: Tag,
    vr: Vr,
    length: u32,
}

#[derive(Debug, Clone, Copy)]
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    encoding: Encoding,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], pos: usize, encoding: Encoding) -> Self {
        Self {
            data,
            pos,
            encoding,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DicomParseError> {
        if self.remaining() < n {
            return Err(DicomParseError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: u32) -> Result<(), DicomParseError> {
        self.take(n as usize).map(|_| ())
    }

    fn read_u16(&mut self) -> Result<u16, DicomParseError> {
        let b = self.take(2)?;
        Ok(read_u16([b[0], b[1]], self.encoding.big_endian))
    }

    fn read_u32(&mut self) -> Result<u32, DicomParseError> {
        let b = self.take(4)?;
        Ok(read_u32([b[0], b[1], b[2], b[3]], self.encoding.big_endian))
    }

    fn read_tag(&mut self) -> Result<Tag, DicomParseError> {
        let group = self.read_u16()?;
        let element = self.read_u16()?;
        Ok(Tag(group, element))
    }

    fn peek_tag(&self) -> Result<Tag, DicomParseError> {
        let mut ahead = *self;
        ahead.read_tag()
    }

    fn read_header(&mut self) -> Result<Header, DicomParseError> {
        let tag = self.read_tag()?;

        if tag.is_delimiter_group() {
            let length = self.read_u32()?;
            return Ok(Header {
                tag,
                vr: Vr::Other(*b"UN"),
                length,
            });
        }

        if self.encoding.explicit_vr {
            let code = self.take(2)?;
            let code = [code[0], code[1]];
            let vr = Vr::from_code(code).ok_or_else(|| DicomParseError::InvalidVr {
                tag: tag.to_string(),
                vr: code,
            })?;
            let length = if vr.has_long_length() {
                self.skip(2)?;
                self.read_u32()?
            } else {
                u32::from(self.read_u16()?)
            };
            return Ok(Header { tag, vr, length });
        }

        let length = self.read_u32()?;
        let vr = match dictionary::lookup(tag) {
            Some(info) => info.vr,
            None if length == UNDEFINED_LENGTH => Vr::SQ,
            None => Vr::Other(*b"UN"),
        };
        Ok(Header { tag, vr, length })
    }
}
