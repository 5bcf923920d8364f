use tracing::debug;

use crate::builtins::{self, FUNC_MAX};
use crate::parser::Bytecode;
use crate::token::{Token, TokenKind};
use crate::variant::{Variant, VariantDecoder};
use crate::{DegdsError, REVISION};

/// Output text plus the line currently being assembled.
#[derive(Debug, Default)]
struct DecompiledSource {
    text: String,
    line: String,
    indent: u32,
}

impl DecompiledSource {
    fn push(&mut self, s: &str) {
        self.line.push_str(s);
    }

    /// Pads with one space unless the line is empty or already ends in one.
    fn ensure_space(&mut self) {
        if !self.line.is_empty() && !self.line.ends_with(' ') {
            self.line.push(' ');
        }
    }

    fn spaced(&mut self, s: &str) {
        self.ensure_space();
        self.push(s);
    }

    /// Writes one tab per indent level. The level is taken from the NEWLINE
    /// payload unchecked, so a 24-bit payload can add ~16 MiB per line.
    fn flush_line(&mut self) {
        self.text.push_str(&"\t".repeat(self.indent as usize));
        self.text.push_str(&self.line);
        self.text.push('\n');
        self.line.clear();
    }

    fn finish(mut self) -> Result<String, DegdsError> {
        if !self.line.is_empty() {
            self.flush_line();
        }
        if self.text.is_empty() {
            return Err(DegdsError::EmptyResult);
        }
        Ok(self.text)
    }
}

fn lookup<'a, T>(table: &'a [T], name: &'static str, index: u32) -> Result<&'a T, DegdsError> {
    table.get(index as usize).ok_or(DegdsError::IndexOutOfRange {
        table: name,
        index,
        len: table.len(),
    })
}

fn constant_source(constants: &[Variant], index: u32) -> Result<String, DegdsError> {
    Ok(lookup(constants, "constant", index)?.to_source(REVISION.variant_major))
}

fn builtin_name(index: u32) -> Result<&'static str, DegdsError> {
    builtins::name_of(index).map_err(|_| DegdsError::IndexOutOfRange {
        table: "builtin function",
        index,
        len: FUNC_MAX as usize,
    })
}

fn type_name(decoder: &dyn VariantDecoder, index: u32) -> Result<&'static str, DegdsError> {
    let major = REVISION.variant_major;
    decoder.type_name(index, major).ok_or_else(|| DegdsError::IndexOutOfRange {
        table: "builtin type",
        index,
        len: decoder.type_count(major) as usize,
    })
}

/// Rebuilds source text from the token stream. Line markers are not consulted.
pub fn render(
    identifiers: &[String],
    constants: &[Variant],
    tokens: &[Token],
    decoder: &dyn VariantDecoder,
) -> Result<String, DegdsError> {
    let mut src = DecompiledSource::default();
    let mut prev = TokenKind::Newline;

    for tok in tokens {
        match tok.kind {
            TokenKind::Empty
            | TokenKind::Error
            | TokenKind::Eof
            | TokenKind::Cursor
            | TokenKind::Max => {}

            TokenKind::Identifier => src.push(lookup(identifiers, "identifier", tok.payload)?),
            TokenKind::Constant => src.push(&constant_source(constants, tok.payload)?),
            TokenKind::SelfKw => src.push("self"),
            TokenKind::BuiltInType => src.push(type_name(decoder, tok.payload)?),
            TokenKind::BuiltInFunc => src.push(builtin_name(tok.payload)?),
            TokenKind::ConstPi => src.push("PI"),

            TokenKind::OpIn => src.spaced("in "),
            TokenKind::OpEqual => src.spaced("== "),
            TokenKind::OpNotEqual => src.spaced("!= "),
            TokenKind::OpLess => src.spaced("< "),
            TokenKind::OpLessEqual => src.spaced("<= "),
            TokenKind::OpGreater => src.spaced("> "),
            TokenKind::OpGreaterEqual => src.spaced(">= "),
            TokenKind::OpAnd => src.spaced("and "),
            TokenKind::OpOr => src.spaced("or "),
            TokenKind::OpNot => src.spaced("not "),
            TokenKind::OpAdd => src.spaced("+ "),
            TokenKind::OpMul => src.spaced("* "),
            TokenKind::OpDiv => src.spaced("/ "),
            TokenKind::OpMod => src.spaced("% "),
            TokenKind::OpShiftLeft => src.spaced("<< "),
            TokenKind::OpShiftRight => src.spaced(">> "),
            TokenKind::OpAssign => src.spaced("= "),
            TokenKind::OpAssignAdd => src.spaced("+= "),
            TokenKind::OpAssignSub => src.spaced("-= "),
            TokenKind::OpAssignMul => src.spaced("*= "),
            TokenKind::OpAssignDiv => src.spaced("/= "),
            TokenKind::OpAssignMod => src.spaced("%= "),
            TokenKind::OpAssignShiftLeft => src.spaced("<<= "),
            TokenKind::OpAssignShiftRight => src.spaced(">>= "),
            TokenKind::OpAssignBitAnd => src.spaced("&= "),
            TokenKind::OpAssignBitOr => src.spaced("|= "),
            TokenKind::OpAssignBitXor => src.spaced("^= "),
            TokenKind::OpBitAnd => src.spaced("& "),
            TokenKind::OpBitOr => src.spaced("| "),
            TokenKind::OpBitXor => src.spaced("^ "),
            TokenKind::OpBitInvert => src.spaced("~ "),
            // ensure_space leaves an empty line alone, so these start a line flush with the indent
            TokenKind::OpSub => src.spaced("- "),
            TokenKind::CfIf => src.spaced("if "),
            TokenKind::CfElse => src.spaced("else "),
            TokenKind::PrExtends => src.spaced("extends "),

            TokenKind::CfElif => src.push("elif "),
            TokenKind::CfFor => src.push("for "),
            TokenKind::CfDo => src.push("do "),
            TokenKind::CfWhile => src.push("while "),
            TokenKind::CfSwitch => src.push("switch "),
            TokenKind::CfCase => src.push("case "),
            TokenKind::CfBreak => src.push("break"),
            TokenKind::CfContinue => src.push("continue"),
            TokenKind::CfPass => src.push("pass"),
            TokenKind::CfReturn => src.push("return "),
            TokenKind::PrFunction => src.push("func "),
            TokenKind::PrClass => src.push("class "),
            TokenKind::PrOnready => src.push("onready "),
            TokenKind::PrTool => src.push("tool "),
            TokenKind::PrStatic => src.push("static "),
            TokenKind::PrExport => src.push("export "),
            TokenKind::PrSetget => src.spaced("setget "),
            TokenKind::PrConst => src.push("const "),
            TokenKind::PrVar => {
                if !src.line.is_empty() && prev != TokenKind::PrOnready {
                    src.ensure_space();
                }
                src.push("var ");
            }
            TokenKind::PrEnum => src.push("enum "),
            TokenKind::PrPreload => src.push("preload"),
            TokenKind::PrAssert => src.push("assert "),
            TokenKind::PrYield => src.push("yield "),
            TokenKind::PrSignal => src.push("signal "),
            TokenKind::PrBreakpoint => src.push("breakpoint "),

            TokenKind::BracketOpen => src.push("["),
            TokenKind::BracketClose => src.push("]"),
            TokenKind::CurlyBracketOpen => src.push("{"),
            TokenKind::CurlyBracketClose => src.push("}"),
            TokenKind::ParenthesisOpen => src.push("("),
            TokenKind::ParenthesisClose => src.push(")"),
            TokenKind::Comma => src.push(", "),
            TokenKind::Semicolon => src.push(";"),
            TokenKind::Period => src.push("."),
            TokenKind::QuestionMark => src.push("?"),
            TokenKind::Colon => src.push(":"),

            TokenKind::Newline => {
                src.flush_line();
                src.indent = tok.payload;
            }
        }
        prev = tok.kind;
    }

    let text = src.finish()?;
    debug!(tokens = tokens.len(), bytes = text.len(), "rendered source");
    Ok(text)
}

/// One line per token with its recorded position and resolved payload.
pub fn dump_tokens(bc: &Bytecode, decoder: &dyn VariantDecoder) -> Result<String, DegdsError> {
    if bc.tokens.is_empty() {
        return Err(DegdsError::EmptyResult);
    }

    let mut out = String::new();
    for (i, tok) in bc.tokens.iter().enumerate() {
        let pos = bc
            .lines
            .get(i as u32)
            .map(|lc| format!("{}:{}", lc.line, lc.column))
            .unwrap_or_else(|| "-".into());
        let detail = match tok.kind {
            TokenKind::Identifier => lookup(&bc.identifiers, "identifier", tok.payload).cloned().ok(),
            TokenKind::Constant => constant_source(&bc.constants, tok.payload).ok(),
            TokenKind::BuiltInFunc => builtin_name(tok.payload).ok().map(str::to_string),
            TokenKind::BuiltInType => type_name(decoder, tok.payload).ok().map(str::to_string),
            TokenKind::Newline => Some(format!("depth={}", tok.payload)),
            _ => Some(String::new()),
        }
        .unwrap_or_else(|| format!("<invalid #{}>", tok.payload));

        let line = format!("{i:>6}  {pos:>9}  {:<20}{detail}", tok.kind.to_string());
        out.push_str(line.trim_end());
        out.push('\n');
    }
    Ok(out)
}
