//! Decides whether a buffer belongs to this bytecode revision.
//!
//! Revisions sharing bytecode version 10 differ only in token numbering, so
//! the header alone cannot tell them apart. Two token-shape checks can:
//!
//! - `enum` was introduced here at the id the previous revision used for
//!   `preload`, shifting everything after it by one. An "enum" followed by what
//!   is `}` here (the old `(`) is really the old `preload(`.
//! - builtin calls must be followed by `(` and carry an argument count the
//!   builtin accepts. A shifted token table breaks one or the other.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builtins::{self, Arity};
use crate::parser;
use crate::token::{Token, TokenKind};
use crate::variant::VariantDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestResult {
    /// Structurally invalid, or inconsistent with this revision and its neighbours alike.
    Corrupt,
    /// Well formed, but provably not this revision.
    Fail,
    /// Nothing disqualifying was found.
    Unknown,
}

/// A verdict together with how much evidence backed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeTest {
    pub result: TestResult,
    pub enum_checks: u32,
    pub builtin_calls: u32,
}

impl BytecodeTest {
    fn new() -> Self {
        Self {
            result: TestResult::Unknown,
            enum_checks: 0,
            builtin_calls: 0,
        }
    }

    fn with(mut self, result: TestResult) -> Self {
        self.result = result;
        self
    }
}

pub fn test_bytecode_report(buf: &[u8], decoder: &dyn VariantDecoder) -> BytecodeTest {
    match parser::parse_with(buf, decoder) {
        Ok(bc) => classify_tokens(&bc.tokens),
        Err(err) => {
            debug!(error = %err, "bytecode does not parse");
            BytecodeTest::new().with(TestResult::Corrupt)
        }
    }
}

/// Runs both checks over the whole stream; the first failing check decides.
pub fn classify_tokens(tokens: &[Token]) -> BytecodeTest {
    let mut report = BytecodeTest::new();
    let count = tokens.len();

    let mut i = 0;
    while i < count {
        match tokens[i].kind {
            TokenKind::PrEnum => {
                report.enum_checks += 1;
                let Some(next) = tokens.get(i + 1) else {
                    debug!(at = i, "enum is the last token");
                    return report.with(TestResult::Fail);
                };
                match next.kind {
                    TokenKind::Identifier | TokenKind::CurlyBracketOpen => {}
                    TokenKind::CurlyBracketClose => {
                        debug!(at = i, "enum followed by the previous revision's `(`");
                        return report.with(TestResult::Fail);
                    }
                    other => {
                        debug!(at = i, next = %other, "enum followed by unexpected token");
                        return report.with(TestResult::Corrupt);
                    }
                }
            }
            TokenKind::BuiltInFunc => {
                let func_id = tokens[i].payload;
                // no later revision of this version added builtins, so an unknown id is damage
                let Some(arity) = builtins::name_of(func_id).ok().and_then(builtins::arity_of)
                else {
                    debug!(at = i, func_id, "builtin id out of range");
                    return report.with(TestResult::Corrupt);
                };
                if i + 2 >= count {
                    debug!(at = i, "builtin call runs off the token stream");
                    return report.with(TestResult::Corrupt);
                }
                i += 1;
                let found = tokens[i].kind;
                if found != TokenKind::ParenthesisOpen {
                    debug!(at = i, %found, "builtin not followed by `(`");
                    return report.with(TestResult::Fail);
                }
                i += 1;
                match check_call_args(tokens, arity, i) {
                    Some(close) => {
                        report.builtin_calls += 1;
                        i = close;
                    }
                    None => {
                        debug!(at = i, func_id, ?arity, "builtin argument count mismatch");
                        return report.with(TestResult::Fail);
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    debug!(
        enum_checks = report.enum_checks,
        builtin_calls = report.builtin_calls,
        "no disqualifying tokens"
    );
    report
}

/// Scans a call's arguments starting just after its `(`. Returns the index of
/// the closing `)` when the argument count fits `arity`.
fn check_call_args(tokens: &[Token], arity: Arity, start: usize) -> Option<usize> {
    if arity.is_nullary() {
        for (pos, tok) in tokens.iter().enumerate().skip(start) {
            match tok.kind {
                TokenKind::ParenthesisClose => return Some(pos),
                TokenKind::Newline => {}
                _ => return None,
            }
        }
        return None;
    }

    // Before 4.x commas only appear in call arguments or nested literals.
    let mut depth: i64 = 0;
    let mut commas: u32 = 0;
    let mut has_args = false;
    for (pos, tok) in tokens.iter().enumerate().skip(start) {
        let kind = tok.kind;
        if kind.is_bracket_open() {
            depth += 1;
            has_args = true;
        } else if kind.is_bracket_close() {
            depth -= 1;
            if depth < 0 {
                if kind != TokenKind::ParenthesisClose {
                    return None;
                }
                let args = if has_args || commas > 0 { commas + 1 } else { 0 };
                return arity.accepts(args).then_some(pos);
            }
        } else if kind == TokenKind::Comma {
            if depth == 0 {
                commas += 1;
            }
        } else if kind != TokenKind::Newline {
            has_args = true;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::FUNC_NAMES;
    use crate::variant::EngineVariantDecoder;

    use TokenKind as K;

    fn t(kind: TokenKind) -> Token {
        Token::new(kind, 0)
    }

    fn func(name: &str) -> Token {
        let id = FUNC_NAMES.iter().position(|n| *n == name).unwrap();
        Token::new(K::BuiltInFunc, id as u32)
    }

    fn verdict(tokens: &[Token]) -> TestResult {
        classify_tokens(tokens).result
    }

    #[test]
    fn enum_followed_by_name_or_brace() {
        assert_eq!(verdict(&[t(K::PrEnum), t(K::Identifier), t(K::CurlyBracketOpen)]), TestResult::Unknown);
        assert_eq!(verdict(&[t(K::PrEnum), t(K::CurlyBracketOpen)]), TestResult::Unknown);
    }

    #[test]
    fn enum_that_is_really_preload() {
        let tokens = [t(K::PrEnum), t(K::CurlyBracketClose), t(K::Constant)];
        assert_eq!(verdict(&tokens), TestResult::Fail);
    }

    #[test]
    fn enum_followed_by_anything_else() {
        assert_eq!(verdict(&[t(K::PrEnum), t(K::Colon)]), TestResult::Corrupt);
    }

    #[test]
    fn enum_at_end_of_stream() {
        assert_eq!(verdict(&[t(K::Identifier), t(K::PrEnum)]), TestResult::Fail);
    }

    #[test]
    fn unary_builtin_arg_counts() {
        let zero = [func("sin"), t(K::ParenthesisOpen), t(K::ParenthesisClose)];
        assert_eq!(verdict(&zero), TestResult::Fail);

        let one = [func("sin"), t(K::ParenthesisOpen), t(K::Identifier), t(K::ParenthesisClose)];
        assert_eq!(verdict(&one), TestResult::Unknown);

        let two = [
            func("sin"),
            t(K::ParenthesisOpen),
            t(K::Identifier),
            t(K::Comma),
            t(K::Identifier),
            t(K::ParenthesisClose),
        ];
        assert_eq!(verdict(&two), TestResult::Fail);
    }

    #[test]
    fn nested_commas_do_not_count() {
        // max(a, min([1, 2], c))
        let tokens = [
            func("max"),
            t(K::ParenthesisOpen),
            t(K::Identifier),
            t(K::Comma),
            func("min"),
            t(K::ParenthesisOpen),
            t(K::BracketOpen),
            t(K::Constant),
            t(K::Comma),
            t(K::Constant),
            t(K::BracketClose),
            t(K::Comma),
            t(K::Identifier),
            t(K::ParenthesisClose),
            t(K::ParenthesisClose),
            t(K::Newline),
        ];
        let report = classify_tokens(&tokens);
        assert_eq!(report.result, TestResult::Unknown);
        // the outer scan skips over the nested call
        assert_eq!(report.builtin_calls, 1);
    }

    #[test]
    fn ranged_arity() {
        let call = |args: usize| {
            let mut tokens = vec![func("range"), t(K::ParenthesisOpen)];
            for a in 0..args {
                if a > 0 {
                    tokens.push(t(K::Comma));
                }
                tokens.push(t(K::Constant));
            }
            tokens.push(t(K::ParenthesisClose));
            verdict(&tokens)
        };
        assert_eq!(call(0), TestResult::Fail);
        assert_eq!(call(1), TestResult::Unknown);
        assert_eq!(call(3), TestResult::Unknown);
        assert_eq!(call(4), TestResult::Fail);
    }

    #[test]
    fn nullary_builtin() {
        let ok = [func("randomize"), t(K::ParenthesisOpen), t(K::Newline), t(K::ParenthesisClose)];
        assert_eq!(verdict(&ok), TestResult::Unknown);

        let with_arg = [func("randomize"), t(K::ParenthesisOpen), t(K::Constant), t(K::ParenthesisClose)];
        assert_eq!(verdict(&with_arg), TestResult::Fail);

        let unclosed = [func("randi"), t(K::ParenthesisOpen), t(K::Newline)];
        assert_eq!(verdict(&unclosed), TestResult::Fail);
    }

    #[test]
    fn variadic_print() {
        let none = [func("print"), t(K::ParenthesisOpen), t(K::ParenthesisClose)];
        assert_eq!(verdict(&none), TestResult::Unknown);
    }

    #[test]
    fn builtin_without_parenthesis() {
        let tokens = [func("sin"), t(K::CurlyBracketClose), t(K::Identifier), t(K::ParenthesisClose)];
        assert_eq!(verdict(&tokens), TestResult::Fail);
    }

    #[test]
    fn open_parenthesis_matched_by_kind() {
        let tokens = [
            func("abs"),
            Token::new(K::ParenthesisOpen, 1),
            t(K::Identifier),
            t(K::ParenthesisClose),
        ];
        assert_eq!(verdict(&tokens), TestResult::Unknown);
    }

    #[test]
    fn builtin_at_end_of_stream() {
        assert_eq!(verdict(&[func("sin"), t(K::ParenthesisOpen)]), TestResult::Corrupt);
        assert_eq!(verdict(&[func("sin")]), TestResult::Corrupt);
    }

    #[test]
    fn builtin_id_out_of_range() {
        let tokens = [
            Token::new(K::BuiltInFunc, 500),
            t(K::ParenthesisOpen),
            t(K::ParenthesisClose),
        ];
        assert_eq!(verdict(&tokens), TestResult::Corrupt);
    }

    #[test]
    fn call_closed_by_wrong_bracket() {
        let tokens = [func("abs"), t(K::ParenthesisOpen), t(K::Identifier), t(K::BracketClose)];
        assert_eq!(verdict(&tokens), TestResult::Fail);
    }

    #[test]
    fn call_never_closed() {
        let tokens = [func("abs"), t(K::ParenthesisOpen), t(K::Identifier), t(K::Newline)];
        assert_eq!(verdict(&tokens), TestResult::Fail);
    }

    #[test]
    fn counts_evidence() {
        let tokens = [
            t(K::PrEnum),
            t(K::CurlyBracketOpen),
            t(K::CurlyBracketClose),
            t(K::Newline),
            func("abs"),
            t(K::ParenthesisOpen),
            t(K::Identifier),
            t(K::ParenthesisClose),
            t(K::PrEnum),
            t(K::Identifier),
        ];
        assert_eq!(
            classify_tokens(&tokens),
            BytecodeTest {
                result: TestResult::Unknown,
                enum_checks: 2,
                builtin_calls: 1,
            }
        );
    }

    #[test]
    fn unparseable_buffer_is_corrupt() {
        let report = test_bytecode_report(b"not bytecode at all, no", &EngineVariantDecoder);
        assert_eq!(report.result, TestResult::Corrupt);
    }
}
