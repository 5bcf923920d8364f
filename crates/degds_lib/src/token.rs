use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::DegdsError;

/// Set in the first byte of a token that is stored as a full 32-bit word.
pub const TOKEN_BYTE_MASK: u32 = 0x80;
/// Number of low bits holding the token kind; the payload sits above them.
pub const TOKEN_BITS: u32 = 8;
pub const TOKEN_MASK: u32 = (1 << TOKEN_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenKind {
    Empty = 0,
    Identifier,
    Constant,
    SelfKw,
    BuiltInType,
    BuiltInFunc,
    OpIn,
    OpEqual,
    OpNotEqual,
    OpLess,
    OpLessEqual,
    OpGreater,
    OpGreaterEqual,
    OpAnd,
    OpOr,
    OpNot,
    OpAdd,
    OpSub,
    OpMul,
    OpDiv,
    OpMod,
    OpShiftLeft,
    OpShiftRight,
    OpAssign,
    OpAssignAdd,
    OpAssignSub,
    OpAssignMul,
    OpAssignDiv,
    OpAssignMod,
    OpAssignShiftLeft,
    OpAssignShiftRight,
    OpAssignBitAnd,
    OpAssignBitOr,
    OpAssignBitXor,
    OpBitAnd,
    OpBitOr,
    OpBitXor,
    OpBitInvert,
    CfIf,
    CfElif,
    CfElse,
    CfFor,
    CfDo,
    CfWhile,
    CfSwitch,
    CfCase,
    CfBreak,
    CfContinue,
    CfPass,
    CfReturn,
    PrFunction,
    PrClass,
    PrExtends,
    PrOnready,
    PrTool,
    PrStatic,
    PrExport,
    PrSetget,
    PrConst,
    PrVar,
    PrEnum,
    PrPreload,
    PrAssert,
    PrYield,
    PrSignal,
    PrBreakpoint,
    BracketOpen,
    BracketClose,
    CurlyBracketOpen,
    CurlyBracketClose,
    ParenthesisOpen,
    ParenthesisClose,
    Comma,
    Semicolon,
    Period,
    QuestionMark,
    Colon,
    Newline,
    ConstPi,
    Error,
    Eof,
    Cursor,
    Max,
}

impl TokenKind {
    const ALL: [TokenKind; 83] = [
        TokenKind::Empty,
        TokenKind::Identifier,
        TokenKind::Constant,
        TokenKind::SelfKw,
        TokenKind::BuiltInType,
        TokenKind::BuiltInFunc,
        TokenKind::OpIn,
        TokenKind::OpEqual,
        TokenKind::OpNotEqual,
        TokenKind::OpLess,
        TokenKind::OpLessEqual,
        TokenKind::OpGreater,
        TokenKind::OpGreaterEqual,
        TokenKind::OpAnd,
        TokenKind::OpOr,
        TokenKind::OpNot,
        TokenKind::OpAdd,
        TokenKind::OpSub,
        TokenKind::OpMul,
        TokenKind::OpDiv,
        TokenKind::OpMod,
        TokenKind::OpShiftLeft,
        TokenKind::OpShiftRight,
        TokenKind::OpAssign,
        TokenKind::OpAssignAdd,
        TokenKind::OpAssignSub,
        TokenKind::OpAssignMul,
        TokenKind::OpAssignDiv,
        TokenKind::OpAssignMod,
        TokenKind::OpAssignShiftLeft,
        TokenKind::OpAssignShiftRight,
        TokenKind::OpAssignBitAnd,
        TokenKind::OpAssignBitOr,
        TokenKind::OpAssignBitXor,
        TokenKind::OpBitAnd,
        TokenKind::OpBitOr,
        TokenKind::OpBitXor,
        TokenKind::OpBitInvert,
        TokenKind::CfIf,
        TokenKind::CfElif,
        TokenKind::CfElse,
        TokenKind::CfFor,
        TokenKind::CfDo,
        TokenKind::CfWhile,
        TokenKind::CfSwitch,
        TokenKind::CfCase,
        TokenKind::CfBreak,
        TokenKind::CfContinue,
        TokenKind::CfPass,
        TokenKind::CfReturn,
        TokenKind::PrFunction,
        TokenKind::PrClass,
        TokenKind::PrExtends,
        TokenKind::PrOnready,
        TokenKind::PrTool,
        TokenKind::PrStatic,
        TokenKind::PrExport,
        TokenKind::PrSetget,
        TokenKind::PrConst,
        TokenKind::PrVar,
        TokenKind::PrEnum,
        TokenKind::PrPreload,
        TokenKind::PrAssert,
        TokenKind::PrYield,
        TokenKind::PrSignal,
        TokenKind::PrBreakpoint,
        TokenKind::BracketOpen,
        TokenKind::BracketClose,
        TokenKind::CurlyBracketOpen,
        TokenKind::CurlyBracketClose,
        TokenKind::ParenthesisOpen,
        TokenKind::ParenthesisClose,
        TokenKind::Comma,
        TokenKind::Semicolon,
        TokenKind::Period,
        TokenKind::QuestionMark,
        TokenKind::Colon,
        TokenKind::Newline,
        TokenKind::ConstPi,
        TokenKind::Error,
        TokenKind::Eof,
        TokenKind::Cursor,
        TokenKind::Max,
    ];

    /// Kind ids past the end of the table collapse into `Max`.
    pub fn from_raw(raw: u32) -> TokenKind {
        Self::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(TokenKind::Max)
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn is_bracket_open(self) -> bool {
        matches!(
            self,
            TokenKind::BracketOpen | TokenKind::CurlyBracketOpen | TokenKind::ParenthesisOpen
        )
    }

    pub fn is_bracket_close(self) -> bool {
        matches!(
            self,
            TokenKind::BracketClose | TokenKind::CurlyBracketClose | TokenKind::ParenthesisClose
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub payload: u32,
}

impl Token {
    pub fn new(kind: TokenKind, payload: u32) -> Self {
        Self { kind, payload }
    }

    /// Splits an already unmasked 32-bit token word.
    pub fn from_word(word: u32) -> Self {
        Self {
            kind: TokenKind::from_raw(word & TOKEN_MASK),
            payload: word >> TOKEN_BITS,
        }
    }
}

impl From<TokenKind> for Token {
    fn from(kind: TokenKind) -> Self {
        Token::new(kind, 0)
    }
}

/// Decodes one token at `cursor`, returning it with the number of bytes it occupied.
pub fn decode_token(bytes: &[u8], cursor: usize) -> Result<(Token, usize), DegdsError> {
    let rest = bytes.get(cursor..).unwrap_or(&[]);
    let Some(&first) = rest.first() else {
        return Err(DegdsError::TruncatedInput {
            what: "token",
            needed: 1,
            remaining: 0,
        });
    };

    if u32::from(first) & TOKEN_BYTE_MASK != 0 {
        if rest.len() < 4 {
            return Err(DegdsError::TruncatedInput {
                what: "token",
                needed: 4,
                remaining: rest.len(),
            });
        }
        let word = LittleEndian::read_u32(&rest[..4]) & !TOKEN_BYTE_MASK;
        Ok((Token::from_word(word), 4))
    } else {
        Ok((Token::from_word(u32::from(first)), 1))
    }
}
