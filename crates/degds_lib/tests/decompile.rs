mod support;

use degds_lib::{
    DecompileMode, DecompileOptions, DegdsError, TestResult, TokenKind as K, VariantError,
    decompile, decompile_with_options, parse, test_bytecode, test_bytecode_report,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use support::ScriptBuilder;

fn player_script() -> ScriptBuilder {
    // extends Node2D
    // const SPEED = 200
    // func _process(delta):
    // 	position.x += SPEED * delta
    // 	print("moved", abs(delta))
    ScriptBuilder::new()
        .ident("Node2D")
        .ident("SPEED")
        .ident("_process")
        .ident("delta")
        .ident("position")
        .ident("x")
        .int(200)
        .string("moved")
        .line(0, 1, 0)
        .line(3, 2, 0)
        .tok(K::PrExtends)
        .tokp(K::Identifier, 0)
        .tok(K::Newline)
        .tok(K::PrConst)
        .tokp(K::Identifier, 1)
        .tok(K::OpAssign)
        .tokp(K::Constant, 0)
        .tok(K::Newline)
        .tok(K::PrFunction)
        .tokp(K::Identifier, 2)
        .tok(K::ParenthesisOpen)
        .tokp(K::Identifier, 3)
        .tok(K::ParenthesisClose)
        .tok(K::Colon)
        .tokp(K::Newline, 1)
        .tokp(K::Identifier, 4)
        .tok(K::Period)
        .tokp(K::Identifier, 5)
        .tok(K::OpAssignAdd)
        .tokp(K::Identifier, 1)
        .tok(K::OpMul)
        .tokp(K::Identifier, 3)
        .tokp(K::Newline, 1)
        .tokp(K::BuiltInFunc, 48)
        .tok(K::ParenthesisOpen)
        .tokp(K::Constant, 1)
        .tok(K::Comma)
        .tokp(K::BuiltInFunc, 16)
        .tok(K::ParenthesisOpen)
        .tokp(K::Identifier, 3)
        .tok(K::ParenthesisClose)
        .tok(K::ParenthesisClose)
        .tok(K::Newline)
}

#[test]
fn decompiles_a_whole_script() {
    let out = decompile(&player_script().build()).unwrap();
    assert_eq!(
        out,
        "extends Node2D\n\
         const SPEED = 200\n\
         func _process(delta):\n\
         \tposition.x += SPEED * delta\n\
         \tprint(\"moved\", abs(delta))\n"
    );
}

#[test]
fn decompile_is_idempotent() {
    let buf = player_script().build();
    assert_eq!(decompile(&buf).unwrap(), decompile(&buf).unwrap());
}

#[test]
fn script_passes_revision_test() {
    let report = test_bytecode_report(&player_script().build());
    assert_eq!(report.result, TestResult::Unknown);
    assert_eq!(report.builtin_calls, 1);
}

#[test]
fn token_listing_uses_line_markers() {
    let out = decompile_with_options(
        &player_script().build(),
        DecompileOptions {
            mode: DecompileMode::Tokens,
        },
    )
    .unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "     0        1:0  PrExtends");
    assert_eq!(lines[1], "     1          -  Identifier          Node2D");
    assert_eq!(lines[3], "     3        2:0  PrConst");
    assert!(lines[6].ends_with("200"));
    assert!(lines[14].ends_with("depth=1"));
}

#[test]
fn header_errors() {
    assert!(matches!(decompile(&[]), Err(DegdsError::InvalidHeader { .. })));
    assert!(matches!(decompile(b"GDSC"), Err(DegdsError::InvalidHeader { .. })));

    let mut wrong_magic = ScriptBuilder::new().tok(K::CfPass).build();
    wrong_magic[..4].copy_from_slice(b"GDSD");
    assert!(matches!(decompile(&wrong_magic), Err(DegdsError::InvalidHeader { .. })));

    let newer = ScriptBuilder::new().version(11).tok(K::CfPass).build();
    assert!(matches!(decompile(&newer), Err(DegdsError::InvalidHeader { .. })));
    assert_eq!(test_bytecode(&newer), TestResult::Corrupt);
}

#[test]
fn older_versions_are_tolerated() {
    let older = ScriptBuilder::new().version(7).tok(K::CfPass).build();
    assert_eq!(decompile(&older).unwrap(), "pass\n");
}

#[test]
fn payload_out_of_range() {
    let buf = ScriptBuilder::new().ident("a").tokp(K::Identifier, 3).build();
    assert!(matches!(
        decompile(&buf),
        Err(DegdsError::IndexOutOfRange { table: "identifier", index: 3, len: 1 })
    ));

    let buf = ScriptBuilder::new().int(1).tokp(K::Constant, 1).build();
    assert!(matches!(
        decompile(&buf),
        Err(DegdsError::IndexOutOfRange { table: "constant", index: 1, len: 1 })
    ));
}

#[test]
fn truncated_token_stream() {
    let mut buf = ScriptBuilder::new().tok(K::CfPass).tokp(K::Identifier, 1).ident("a").build();
    buf.truncate(buf.len() - 2);
    assert!(matches!(decompile(&buf), Err(DegdsError::TruncatedInput { .. })));
    assert_eq!(test_bytecode(&buf), TestResult::Corrupt);
}

#[test]
fn failing_constant_aborts_parse() {
    // an Image variant, which the decoder rejects
    let buf = ScriptBuilder::new()
        .int(1)
        .raw_constant(&15u32.to_le_bytes())
        .tokp(K::Constant, 0)
        .build();
    match decompile(&buf) {
        Err(DegdsError::InvalidConstant { index, source, .. }) => {
            assert_eq!(index, 1);
            assert_eq!(source, VariantError::UnsupportedType { type_id: 15, major: 2 });
        }
        other => panic!("expected InvalidConstant, got {other:?}"),
    }
    assert_eq!(test_bytecode(&buf), TestResult::Corrupt);
}

#[test]
fn nothing_to_render() {
    let buf = ScriptBuilder::new().tok(K::Empty).build();
    assert!(matches!(decompile(&buf), Err(DegdsError::EmptyResult)));
}

#[test]
fn enum_shape_verdicts() {
    let ok = ScriptBuilder::new()
        .ident("State")
        .tok(K::PrEnum)
        .tokp(K::Identifier, 0)
        .tok(K::CurlyBracketOpen)
        .tok(K::CurlyBracketClose)
        .build();
    assert_eq!(test_bytecode(&ok), TestResult::Unknown);
    assert_eq!(decompile(&ok).unwrap(), "enum State{}\n");

    let preload = ScriptBuilder::new()
        .string("res://a.gd")
        .tok(K::PrEnum)
        .tok(K::CurlyBracketClose)
        .tokp(K::Constant, 0)
        .tok(K::BracketClose)
        .build();
    assert_eq!(test_bytecode(&preload), TestResult::Fail);
}

#[test]
fn builtin_arity_verdicts() {
    // sin() with no argument
    let buf = ScriptBuilder::new()
        .tok(K::BuiltInFunc)
        .tok(K::ParenthesisOpen)
        .tok(K::ParenthesisClose)
        .build();
    assert_eq!(test_bytecode(&buf), TestResult::Fail);

    let buf = ScriptBuilder::new()
        .ident("a")
        .tok(K::BuiltInFunc)
        .tok(K::ParenthesisOpen)
        .tokp(K::Identifier, 0)
        .tok(K::ParenthesisClose)
        .build();
    assert_eq!(test_bytecode(&buf), TestResult::Unknown);
}

#[test]
fn parsed_tables_are_exposed() {
    let bc = parse(&player_script().build()).unwrap();
    assert_eq!(bc.identifiers.len(), 6);
    assert_eq!(bc.constants.len(), 2);
    assert_eq!(bc.lines.len(), 2);
    assert_eq!(bc.tokens.len() as u32, bc.header.token_count);
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = decompile(&bytes);
        let _ = test_bytecode(&bytes);
    }

    #[test]
    fn arbitrary_bodies_never_panic(body in proptest::collection::vec(any::<u8>(), 0..256), counts in proptest::array::uniform4(0u32..8)) {
        let mut buf = b"GDSC".to_vec();
        buf.extend(10u32.to_le_bytes());
        for c in counts {
            buf.extend(c.to_le_bytes());
        }
        buf.extend(body);
        let first = decompile(&buf);
        let second = decompile(&buf);
        prop_assert_eq!(first.is_ok(), second.is_ok());
        if let (Ok(a), Ok(b)) = (first, second) {
            prop_assert_eq!(a, b);
        }
        let _ = test_bytecode(&buf);
    }

    #[test]
    fn identifier_tables_survive(names in proptest::collection::vec("[a-z_][a-z0-9_]{0,12}", 1..8)) {
        let mut builder = ScriptBuilder::new();
        for name in &names {
            builder = builder.ident(name);
        }
        for i in 0..names.len() {
            builder = builder.tokp(K::Identifier, i as u32).tok(K::Newline);
        }
        let out = decompile(&builder.build()).unwrap();
        let expected: String = names.iter().map(|n| format!("{n}\n")).collect();
        prop_assert_eq!(out, expected);
    }
}
