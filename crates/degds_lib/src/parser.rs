use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::reader::{Reader, Short};
use crate::token::{Token, decode_token};
use crate::variant::{Variant, VariantDecoder};
use crate::{DegdsError, REVISION};

pub const MAGIC: &[u8; 4] = b"GDSC";
pub const HEADER_SIZE: usize = 24;
pub const IDENTIFIER_MASK: u8 = 0xb6;
const LINE_MARKER_SIZE: usize = 8;
const LINE_BITS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeHeader {
    pub version: u32,
    pub identifier_count: u32,
    pub constant_count: u32,
    pub line_count: u32,
    pub token_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

impl LineCol {
    pub fn unpack(packed: u32) -> Self {
        Self {
            line: packed & ((1 << LINE_BITS) - 1),
            column: packed >> LINE_BITS,
        }
    }
}

/// Source positions recorded by the compiler, keyed by token index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMap {
    entries: BTreeMap<u32, u32>,
}

impl LineMap {
    pub fn insert(&mut self, token_index: u32, packed: u32) {
        self.entries.insert(token_index, packed);
    }

    pub fn get(&self, token_index: u32) -> Option<LineCol> {
        self.entries.get(&token_index).copied().map(LineCol::unpack)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The four tables carried by a compiled script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    pub header: BytecodeHeader,
    pub identifiers: Vec<String>,
    pub constants: Vec<Variant>,
    pub lines: LineMap,
    pub tokens: Vec<Token>,
}

fn truncated(what: &'static str) -> impl Fn(Short) -> DegdsError {
    move |s| DegdsError::TruncatedInput {
        what,
        needed: s.needed,
        remaining: s.remaining,
    }
}

pub fn read_header(buf: &[u8]) -> Result<BytecodeHeader, DegdsError> {
    if buf.len() < HEADER_SIZE {
        return Err(DegdsError::InvalidHeader {
            reason: format!("buffer is {} bytes, header needs {HEADER_SIZE}", buf.len()),
        });
    }
    if &buf[..4] != MAGIC {
        return Err(DegdsError::InvalidHeader {
            reason: format!("bad magic {:02x?}", &buf[..4]),
        });
    }

    let mut r = Reader::new(&buf[4..HEADER_SIZE]);
    let header_err = truncated("header");
    let header = BytecodeHeader {
        version: r.get_u32().map_err(&header_err)?,
        identifier_count: r.get_u32().map_err(&header_err)?,
        constant_count: r.get_u32().map_err(&header_err)?,
        line_count: r.get_u32().map_err(&header_err)?,
        token_count: r.get_u32().map_err(&header_err)?,
    };

    // Older versions are let through on purpose; they usually share this layout.
    if header.version > REVISION.bytecode_version {
        return Err(DegdsError::InvalidHeader {
            reason: format!(
                "bytecode version {} is newer than {}",
                header.version, REVISION.bytecode_version
            ),
        });
    }
    Ok(header)
}

/// Unmasks one identifier record body. Decoding stops at the first NUL, and the
/// final byte is always treated as the terminator.
pub fn unmask_identifier(masked: &[u8]) -> String {
    let mut bytes: Vec<u8> = masked.iter().map(|b| b ^ IDENTIFIER_MASK).collect();
    if let Some(last) = bytes.last_mut() {
        *last = 0;
    }
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn read_identifiers(r: &mut Reader<'_>, count: u32) -> Result<Vec<String>, DegdsError> {
    let mut identifiers = Vec::with_capacity((count as usize).min(r.remaining() / 4));
    for i in 0..count {
        let len = r.get_u32().map_err(truncated("identifier length"))? as usize;
        let masked = r.get_bytes(len).map_err(truncated("identifier"))?;
        let ident = unmask_identifier(masked);
        trace!(index = i, %ident, "identifier");
        identifiers.push(ident);
    }
    Ok(identifiers)
}

fn read_constants(
    r: &mut Reader<'_>,
    count: u32,
    decoder: &dyn VariantDecoder,
) -> Result<Vec<Variant>, DegdsError> {
    let mut constants = Vec::with_capacity((count as usize).min(r.remaining() / 4));
    for index in 0..count {
        let (value, used) = decoder
            .decode_one(r.rest(), REVISION.variant_major)
            .map_err(|source| DegdsError::InvalidConstant {
                index,
                label: "Invalid constant",
                source,
            })?;
        r.advance(used).map_err(truncated("constant"))?;
        trace!(index, ?value, used, "constant");
        constants.push(value);
    }
    Ok(constants)
}

fn read_lines(r: &mut Reader<'_>, count: u32) -> Result<LineMap, DegdsError> {
    let needed = (count as usize).saturating_mul(LINE_MARKER_SIZE);
    if needed > r.remaining() {
        return Err(DegdsError::TruncatedInput {
            what: "line markers",
            needed,
            remaining: r.remaining(),
        });
    }
    let mut lines = LineMap::default();
    for _ in 0..count {
        let token_index = r.get_u32().map_err(truncated("line marker"))?;
        let packed = r.get_u32().map_err(truncated("line marker"))?;
        lines.insert(token_index, packed);
    }
    Ok(lines)
}

fn read_tokens(r: &mut Reader<'_>, count: u32) -> Result<Vec<Token>, DegdsError> {
    let mut tokens = Vec::with_capacity((count as usize).min(r.remaining()));
    for _ in 0..count {
        let (token, used) = decode_token(r.rest(), 0)?;
        r.advance(used).map_err(truncated("token"))?;
        tokens.push(token);
    }
    Ok(tokens)
}

/// Splits a compiled script into its tables. Any failure aborts the whole parse.
pub fn parse_with(buf: &[u8], decoder: &dyn VariantDecoder) -> Result<Bytecode, DegdsError> {
    let header = read_header(buf)?;
    debug!(
        version = header.version,
        identifiers = header.identifier_count,
        constants = header.constant_count,
        lines = header.line_count,
        tokens = header.token_count,
        "bytecode header"
    );

    let mut r = Reader::new(&buf[HEADER_SIZE..]);
    let identifiers = read_identifiers(&mut r, header.identifier_count)?;
    let constants = read_constants(&mut r, header.constant_count, decoder)?;
    let lines = read_lines(&mut r, header.line_count)?;
    let tokens = read_tokens(&mut r, header.token_count)?;

    if r.remaining() > 0 {
        debug!(trailing = r.remaining(), "ignoring bytes after token stream");
    }

    Ok(Bytecode {
        header,
        identifiers,
        constants,
        lines,
        tokens,
    })
}
