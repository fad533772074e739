//! Interface and class identifiers
//!
//! A `Guid` is the 16-byte identifier used for every interface (IID) and
//! class (CLSID) in the ABI. Binary layout is `{u32, u16, u16, [u8; 8]}` with
//! the integer fields little-endian; the text form is
//! `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`.

use bytes::{Buf, BufMut};
use std::fmt;
use std::str::FromStr;

use crate::error::{PalError, Result};

/// 128-bit interface/class identifier
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Size of a GUID in bytes
    pub const SIZE: usize = 16;

    /// The all-zero identifier
    pub const ZERO: Self = Self::from_values(0, 0, 0, [0; 8]);

    /// Build from the four fields
    pub const fn from_values(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Build from the 128-bit value as written in text form
    /// (`0x00000000_0000_0000_C000_000000000046`)
    pub const fn from_u128(value: u128) -> Self {
        let d4 = (value as u64).to_be_bytes();
        Self {
            data1: (value >> 96) as u32,
            data2: (value >> 80) as u16,
            data3: (value >> 64) as u16,
            data4: d4,
        }
    }

    /// The 128-bit value as written in text form
    pub const fn to_u128(&self) -> u128 {
        ((self.data1 as u128) << 96)
            | ((self.data2 as u128) << 80)
            | ((self.data3 as u128) << 64)
            | (u64::from_be_bytes(self.data4) as u128)
    }

    /// Generate a random (version 4) identifier
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        Self::from_u128(uuid.as_u128())
    }

    /// Check for the all-zero identifier
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Parse `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` (braces optional,
    /// hex digits in either case)
    pub fn parse(text: &str) -> Result<Self> {
        let inner = match (text.strip_prefix('{'), text.strip_suffix('}')) {
            (Some(rest), Some(_)) => &rest[..rest.len() - 1],
            (None, None) => text,
            _ => {
                return Err(PalError::Parse(format!(
                    "unmatched brace in identifier {:?}",
                    text
                )))
            }
        };

        if inner.len() != 36 {
            return Err(PalError::Parse(format!(
                "identifier {:?} has wrong length",
                text
            )));
        }

        let bytes = inner.as_bytes();
        for (i, &b) in bytes.iter().enumerate() {
            let hyphen_slot = matches!(i, 8 | 13 | 18 | 23);
            if hyphen_slot && b != b'-' {
                return Err(PalError::Parse(format!(
                    "expected '-' at offset {} in {:?}",
                    i, text
                )));
            }
            if !hyphen_slot && !b.is_ascii_hexdigit() {
                return Err(PalError::Parse(format!(
                    "invalid hex digit {:?} at offset {} in {:?}",
                    b as char, i, text
                )));
            }
        }

        // Digits are validated above, the radix conversions cannot fail
        let hex = |range: std::ops::Range<usize>| -> u64 {
            inner[range]
                .bytes()
                .fold(0u64, |acc, b| (acc << 4) | hex_value(b) as u64)
        };

        let clock = hex(19..23) as u16;
        let node = hex(24..36);
        let mut data4 = [0u8; 8];
        data4[0] = (clock >> 8) as u8;
        data4[1] = clock as u8;
        data4[2..].copy_from_slice(&node.to_be_bytes()[2..]);

        Ok(Self {
            data1: hex(0..8) as u32,
            data2: hex(9..13) as u16,
            data3: hex(14..18) as u16,
            data4,
        })
    }

    /// Encode to the 16-byte binary layout
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.data1.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.data2.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.data3.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.data4);
        bytes
    }

    /// Decode from the 16-byte binary layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(PalError::Parse(format!(
                "need {} bytes for an identifier, have {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        let mut cursor = &bytes[..Self::SIZE];
        Self::decode(&mut cursor)
    }

    /// Encode to a buffer
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.data1);
        buf.put_u16_le(self.data2);
        buf.put_u16_le(self.data3);
        buf.put_slice(&self.data4);
    }

    /// Decode from a buffer
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(PalError::Parse(format!(
                "need {} bytes for an identifier, have {}",
                Self::SIZE,
                buf.remaining()
            )));
        }
        let data1 = buf.get_u32_le();
        let data2 = buf.get_u16_le();
        let data3 = buf.get_u16_le();
        let mut data4 = [0u8; 8];
        buf.copy_to_slice(&mut data4);
        Ok(Self {
            data1,
            data2,
            data3,
            data4,
        })
    }
}

#[inline]
fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

impl FromStr for Guid {
    type Err = PalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}
