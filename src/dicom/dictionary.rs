//! Tag dictionary for the attributes the sampler reads.
//!
//! Implicit VR datasets carry no value representation on the wire, so the
//! reader needs to know the VR of every tag it decodes. Tags outside this
//! table are skipped.

use std::fmt;

/// A (group, element) attribute tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub u16, pub u16);

impl Tag {
    pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);
    pub const SPECIFIC_CHARACTER_SET: Tag = Tag(0x0008, 0x0005);
    pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);
    pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
    pub const ITEM_DELIMITATION: Tag = Tag(0xFFFE, 0xE00D);
    pub const SEQUENCE_DELIMITATION: Tag = Tag(0xFFFE, 0xE0DD);

    pub fn group(self) -> u16 {
        self.0
    }

    /// Item and delimitation tags have no VR, even in explicit encodings.
    pub fn is_delimiter_group(self) -> bool {
        self.0 == 0xFFFE
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

/// Value representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vr {
    AE,
    AS,
    CS,
    DA,
    DS,
    DT,
    IS,
    LO,
    LT,
    PN,
    SH,
    ST,
    TM,
    UC,
    UI,
    UR,
    UT,
    US,
    SS,
    UL,
    SL,
    SQ,
    /// Any VR the reader does not decode (OB, OW, FL, FD, UN, ...).
    Other([u8; 2]),
}

impl Vr {
    /// Parses the two-character VR code found in explicit encodings.
    pub fn from_code(code: [u8; 2]) -> Option<Vr> {
        if !code.iter().all(u8::is_ascii_uppercase) {
            return None;
        }
        let vr = match &code {
            b"AE" => Vr::AE,
            b"AS" => Vr::AS,
            b"CS" => Vr::CS,
            b"DA" => Vr::DA,
            b"DS" => Vr::DS,
            b"DT" => Vr::DT,
            b"IS" => Vr::IS,
            b"LO" => Vr::LO,
            b"LT" => Vr::LT,
            b"PN" => Vr::PN,
            b"SH" => Vr::SH,
            b"ST" => Vr::ST,
            b"TM" => Vr::TM,
            b"UC" => Vr::UC,
            b"UI" => Vr::UI,
            b"UR" => Vr::UR,
            b"UT" => Vr::UT,
            b"US" => Vr::US,
            b"SS" => Vr::SS,
            b"UL" => Vr::UL,
            b"SL" => Vr::SL,
            b"SQ" => Vr::SQ,
            _ => Vr::Other(code),
        };
        Some(vr)
    }

    pub fn code(self) -> [u8; 2] {
        let code: &[u8; 2] = match self {
            Vr::AE => b"AE",
            Vr::AS => b"AS",
            Vr::CS => b"CS",
            Vr::DA => b"DA",
            Vr::DS => b"DS",
            Vr::DT => b"DT",
            Vr::IS => b"IS",
            Vr::LO => b"LO",
            Vr::LT => b"LT",
            Vr::PN => b"PN",
            Vr::SH => b"SH",
            Vr::ST => b"ST",
            Vr::TM => b"TM",
            Vr::UC => b"UC",
            Vr::UI => b"UI",
            Vr::UR => b"UR",
            Vr::UT => b"UT",
            Vr::US => b"US",
            Vr::SS => b"SS",
            Vr::UL => b"UL",
            Vr::SL => b"SL",
            Vr::SQ => b"SQ",
            Vr::Other(code) => return code,
        };
        *code
    }

    /// Explicit VRs that use a 2-byte reserved field and a 4-byte length.
    pub fn has_long_length(self) -> bool {
        match self {
            Vr::SQ | Vr::UC | Vr::UR | Vr::UT => true,
            Vr::Other(code) => matches!(
                &code,
                b"OB" | b"OD" | b"OF" | b"OL" | b"OV" | b"OW" | b"SV" | b"UN" | b"UV"
            ),
            _ => false,
        }
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            Vr::AE
                | Vr::AS
                | Vr::CS
                | Vr::DA
                | Vr::DS
                | Vr::DT
                | Vr::IS
                | Vr::LO
                | Vr::LT
                | Vr::PN
                | Vr::SH
                | Vr::ST
                | Vr::TM
                | Vr::UC
                | Vr::UI
                | Vr::UR
                | Vr::UT
        )
    }

    /// Free-text VRs never split on the value separator.
    pub fn is_single_valued_text(self) -> bool {
        matches!(self, Vr::LT | Vr::ST | Vr::UT | Vr::UR)
    }

    /// Padding byte used to reach an even value length.
    pub fn padding(self) -> u8 {
        if self == Vr::UI {
            0
        } else {
            b' '
        }
    }
}

/// Dictionary entry.
#[derive(Debug, Clone, Copy)]
pub struct TagInfo {
    pub tag: Tag,
    pub keyword: &'static str,
    pub vr: Vr,
}

const DICTIONARY: &[TagInfo] = &[
    TagInfo { tag: Tag(0x0002, 0x0010), keyword: "TransferSyntaxUID", vr: Vr::UI },
    TagInfo { tag: Tag(0x0008, 0x0005), keyword: "SpecificCharacterSet", vr: Vr::CS },
    TagInfo { tag: Tag(0x0008, 0x0008), keyword: "ImageType", vr: Vr::CS },
    TagInfo { tag: Tag(0x0008, 0x0020), keyword: "StudyDate", vr: Vr::DA },
    TagInfo { tag: Tag(0x0008, 0x0060), keyword: "Modality", vr: Vr::CS },
    TagInfo { tag: Tag(0x0008, 0x0070), keyword: "Manufacturer", vr: Vr::LO },
    TagInfo { tag: Tag(0x0008, 0x1030), keyword: "StudyDescription", vr: Vr::LO },
    TagInfo { tag: Tag(0x0008, 0x103E), keyword: "SeriesDescription", vr: Vr::LO },
    TagInfo { tag: Tag(0x0008, 0x1064), keyword: "PathologyNumber", vr: Vr::LO },
    TagInfo { tag: Tag(0x0010, 0x0020), keyword: "PatientID", vr: Vr::LO },
    TagInfo { tag: Tag(0x0018, 0x0015), keyword: "BodyPartExamined", vr: Vr::CS },
    TagInfo { tag: Tag(0x0018, 0x0050), keyword: "SliceThickness", vr: Vr::DS },
    TagInfo { tag: Tag(0x0020, 0x0011), keyword: "SeriesNumber", vr: Vr::IS },
    TagInfo { tag: Tag(0x0020, 0x0013), keyword: "InstanceNumber", vr: Vr::IS },
    TagInfo { tag: Tag(0x0020, 0x4000), keyword: "ImageComments", vr: Vr::LT },
    TagInfo { tag: Tag(0x0028, 0x0010), keyword: "Rows", vr: Vr::US },
];

pub fn lookup(tag: Tag) -> Option<&'static TagInfo> {
    DICTIONARY.iter().find(|info| info.tag == tag)
}

pub fn lookup_keyword(keyword: &str) -> Option<&'static TagInfo> {
    DICTIONARY.iter().find(|info| info.keyword == keyword)
}
