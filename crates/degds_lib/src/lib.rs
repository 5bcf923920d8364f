//! Decompiler for GDScript bytecode revision `ed80f45` (engine 2.1.3 - 2.1.6).
//!
//! A compiled script is a header followed by four tables: identifiers,
//! constants, line markers and the token stream. [`decompile`] turns it back
//! into source text and [`test_bytecode`] judges whether a buffer was produced
//! by this revision at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod builtins;
pub mod classify;
pub mod parser;
mod reader;
pub mod render;
pub mod token;
pub mod variant;

pub use classify::{BytecodeTest, TestResult};
pub use parser::{Bytecode, BytecodeHeader, LineCol, LineMap};
pub use token::{Token, TokenKind};
pub use variant::{EngineVariantDecoder, Variant, VariantDecoder, VariantError};

/// Identity of the bytecode revision this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Revision {
    pub commit: &'static str,
    pub bytecode_version: u32,
    pub engine_versions: &'static str,
    pub variant_major: u32,
}

pub const REVISION: Revision = Revision {
    commit: "ed80f45",
    bytecode_version: 10,
    engine_versions: "2.1.3 - 2.1.6",
    variant_major: 2,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecompileMode {
    #[default]
    Source,
    Tokens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecompileOptions {
    pub mode: DecompileMode,
}

#[derive(Debug, Error)]
pub enum DegdsError {
    #[error("invalid bytecode header: {reason}")]
    InvalidHeader { reason: String },

    #[error("truncated {what} (needed {needed} bytes, {remaining} remaining)")]
    TruncatedInput {
        what: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("{label} #{index}: {source}")]
    InvalidConstant {
        index: u32,
        label: &'static str,
        #[source]
        source: VariantError,
    },

    #[error("{table} index {index} out of range (table has {len} entries)")]
    IndexOutOfRange {
        table: &'static str,
        index: u32,
        len: usize,
    },

    #[error("unknown builtin function id: {0}")]
    UnknownBuiltin(u32),

    #[error("no source text recovered")]
    EmptyResult,
}

/// Parses `bytecode` with the engine's own variant decoder.
pub fn parse(bytecode: &[u8]) -> Result<Bytecode, DegdsError> {
    parser::parse_with(bytecode, &EngineVariantDecoder)
}

pub fn decompile_with_decoder(
    bytecode: &[u8],
    options: DecompileOptions,
    decoder: &dyn VariantDecoder,
) -> Result<String, DegdsError> {
    let bc = parser::parse_with(bytecode, decoder)?;
    match options.mode {
        DecompileMode::Source => render::render(&bc.identifiers, &bc.constants, &bc.tokens, decoder),
        DecompileMode::Tokens => render::dump_tokens(&bc, decoder),
    }
}

pub fn decompile_with_options(bytecode: &[u8], options: DecompileOptions) -> Result<String, DegdsError> {
    decompile_with_decoder(bytecode, options, &EngineVariantDecoder)
}

pub fn decompile(bytecode: &[u8]) -> Result<String, DegdsError> {
    decompile_with_options(bytecode, DecompileOptions::default())
}

pub fn test_bytecode(bytecode: &[u8]) -> TestResult {
    classify::test_bytecode_report(bytecode, &EngineVariantDecoder).result
}

pub fn test_bytecode_report(bytecode: &[u8]) -> BytecodeTest {
    classify::test_bytecode_report(bytecode, &EngineVariantDecoder)
}
