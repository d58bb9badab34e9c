//! Constant table (`CTAB`) embedded in a comment unit.
//!
//! Offsets inside the table are relative to the first byte after the `CTAB` fourcc. Every read is
//! bounds-checked; malformed tables produce an error instead of partial data.

use thiserror::Error;

pub(crate) const CTAB_FOURCC: u32 = u32::from_le_bytes(*b"CTAB");

const HEADER_LEN: usize = 28;
const CONSTANT_INFO_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterSet {
    Bool,
    Int4,
    Float4,
    Sampler,
}

impl RegisterSet {
    fn from_raw(raw: u16) -> Option<Self> {
        Some(match raw {
            0 => RegisterSet::Bool,
            1 => RegisterSet::Int4,
            2 => RegisterSet::Float4,
            3 => RegisterSet::Sampler,
            _ => return None,
        })
    }
}

/// Named constant from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub register_set: RegisterSet,
    pub register_index: u32,
    pub register_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CtabError {
    #[error("constant table: {0}")]
    OutOfBounds(String),
    #[error("constant table: header size {0} is not {HEADER_LEN}")]
    HeaderSize(u32),
    #[error("constant table: unknown register set {0}")]
    RegisterSet(u16),
    #[error("constant table: name at offset {0} is not valid UTF-8")]
    Name(usize),
}

/// Parses the bytes following the `CTAB` fourcc.
pub fn parse_ctab(table: &[u8]) -> Result<Vec<Symbol>, CtabError> {
    let size = read_u32_le(table, 0)?;
    if size as usize != HEADER_LEN {
        return Err(CtabError::HeaderSize(size));
    }
    let count = read_u32_le(table, 12)? as usize;
    let info_offset = read_u32_le(table, 16)? as usize;

    let needed = count
        .checked_mul(CONSTANT_INFO_LEN)
        .and_then(|n| n.checked_add(info_offset))
        .ok_or_else(|| CtabError::OutOfBounds("constant count overflows".to_owned()))?;
    if needed > table.len() {
        return Err(CtabError::OutOfBounds(format!(
            "{count} constants at {info_offset} need {needed} bytes, but table length is {}",
            table.len()
        )));
    }

    let mut symbols = Vec::with_capacity(count);
    for i in 0..count {
        let at = info_offset + i * CONSTANT_INFO_LEN;
        let name_offset = read_u32_le(table, at)? as usize;
        let set_raw = read_u16_le(table, at + 4)?;
        let register_set = RegisterSet::from_raw(set_raw).ok_or(CtabError::RegisterSet(set_raw))?;
        symbols.push(Symbol {
            name: read_cstr(table, name_offset)?,
            register_set,
            register_index: u32::from(read_u16_le(table, at + 6)?),
            register_count: u32::from(read_u16_le(table, at + 8)?),
        });
    }
    Ok(symbols)
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, CtabError> {
    let slice = read_bytes(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16, CtabError> {
    let slice = read_bytes(bytes, offset, 2)?;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

fn read_bytes(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], CtabError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| CtabError::OutOfBounds(format!("offset {offset} overflows")))?;
    bytes.get(offset..end).ok_or_else(|| {
        CtabError::OutOfBounds(format!(
            "need {len} bytes at {offset}..{end}, but table length is {}",
            bytes.len()
        ))
    })
}

fn read_cstr(bytes: &[u8], offset: usize) -> Result<String, CtabError> {
    let tail = bytes.get(offset..).ok_or_else(|| {
        CtabError::OutOfBounds(format!(
            "name offset {offset} is past table length {}",
            bytes.len()
        ))
    })?;
    let len = tail
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| CtabError::OutOfBounds(format!("unterminated name at {offset}")))?;
    std::str::from_utf8(&tail[..len])
        .map(str::to_owned)
        .map_err(|_| CtabError::Name(offset))
}
