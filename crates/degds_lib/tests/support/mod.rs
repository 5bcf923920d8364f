#![allow(dead_code)]

use degds_lib::parser::{IDENTIFIER_MASK, MAGIC};
use degds_lib::token::{TOKEN_BITS, TOKEN_BYTE_MASK};
use degds_lib::{REVISION, TokenKind};

/// Assembles compiled-script buffers for tests.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    version: Option<u32>,
    identifiers: Vec<String>,
    constants: Vec<Vec<u8>>,
    lines: Vec<(u32, u32)>,
    tokens: Vec<(TokenKind, u32)>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, v: u32) -> Self {
        self.version = Some(v);
        self
    }

    pub fn ident(mut self, name: &str) -> Self {
        self.identifiers.push(name.to_string());
        self
    }

    pub fn int(mut self, v: i32) -> Self {
        let mut raw = 2u32.to_le_bytes().to_vec();
        raw.extend(v.to_le_bytes());
        self.constants.push(raw);
        self
    }

    pub fn string(mut self, s: &str) -> Self {
        let mut raw = 4u32.to_le_bytes().to_vec();
        raw.extend((s.len() as u32).to_le_bytes());
        raw.extend(s.as_bytes());
        raw.resize(raw.len() + (4 - s.len() % 4) % 4, 0);
        self.constants.push(raw);
        self
    }

    pub fn raw_constant(mut self, raw: &[u8]) -> Self {
        self.constants.push(raw.to_vec());
        self
    }

    pub fn line(mut self, token_index: u32, line: u32, column: u32) -> Self {
        self.lines.push((token_index, line | (column << 24)));
        self
    }

    pub fn tok(self, kind: TokenKind) -> Self {
        self.tokp(kind, 0)
    }

    pub fn tokp(mut self, kind: TokenKind, payload: u32) -> Self {
        self.tokens.push((kind, payload));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend(self.version.unwrap_or(REVISION.bytecode_version).to_le_bytes());
        out.extend((self.identifiers.len() as u32).to_le_bytes());
        out.extend((self.constants.len() as u32).to_le_bytes());
        out.extend((self.lines.len() as u32).to_le_bytes());
        out.extend((self.tokens.len() as u32).to_le_bytes());

        for name in &self.identifiers {
            let body: Vec<u8> = name
                .bytes()
                .chain([0])
                .map(|b| b ^ IDENTIFIER_MASK)
                .collect();
            out.extend((body.len() as u32).to_le_bytes());
            out.extend(body);
        }
        for raw in &self.constants {
            out.extend(raw);
        }
        for (token, packed) in &self.lines {
            out.extend(token.to_le_bytes());
            out.extend(packed.to_le_bytes());
        }
        for &(kind, payload) in &self.tokens {
            if payload == 0 {
                out.push(kind as u8);
            } else {
                let word = (payload << TOKEN_BITS) | kind.raw() | TOKEN_BYTE_MASK;
                out.extend(word.to_le_bytes());
            }
        }
        out
    }
}
