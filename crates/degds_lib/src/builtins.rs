use serde::{Deserialize, Serialize};

use crate::DegdsError;

/// Builtin functions of this revision. Position is the id stored in `BuiltInFunc` tokens.
pub const FUNC_NAMES: &[&str] = &[
    "sin",
    "cos",
    "tan",
    "sinh",
    "cosh",
    "tanh",
    "asin",
    "acos",
    "atan",
    "atan2",
    "sqrt",
    "fmod",
    "fposmod",
    "floor",
    "ceil",
    "round",
    "abs",
    "sign",
    "pow",
    "log",
    "exp",
    "is_nan",
    "is_inf",
    "ease",
    "decimals",
    "stepify",
    "lerp",
    "dectime",
    "randomize",
    "randi",
    "randf",
    "rand_range",
    "seed",
    "rand_seed",
    "deg2rad",
    "rad2deg",
    "linear2db",
    "db2linear",
    "max",
    "min",
    "clamp",
    "nearest_po2",
    "weakref",
    "funcref",
    "convert",
    "typeof",
    "type_exists",
    "str",
    "print",
    "printt",
    "prints",
    "printerr",
    "printraw",
    "var2str",
    "str2var",
    "var2bytes",
    "bytes2var",
    "range",
    "load",
    "inst2dict",
    "dict2inst",
    "hash",
    "Color8",
    "ColorN",
    "print_stack",
    "instance_from_id",
];

pub const FUNC_MAX: u32 = FUNC_NAMES.len() as u32;

/// Inclusive argument-count bounds of a builtin call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arity {
    pub min: u32,
    pub max: u32,
}

impl Arity {
    pub const VARIADIC: u32 = u32::MAX;

    const fn exact(n: u32) -> Self {
        Self { min: n, max: n }
    }

    const fn range(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn is_nullary(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    pub fn accepts(&self, args: u32) -> bool {
        args >= self.min && args <= self.max
    }
}

pub fn name_of(id: u32) -> Result<&'static str, DegdsError> {
    FUNC_NAMES
        .get(id as usize)
        .copied()
        .ok_or(DegdsError::UnknownBuiltin(id))
}

/// Accepted argument counts for `name`, or `None` for names outside this revision.
pub fn arity_of(name: &str) -> Option<Arity> {
    let arity = match name {
        "sin" | "cos" | "tan" | "sinh" | "cosh" | "tanh" | "asin" | "acos" | "atan" | "sqrt"
        | "floor" | "ceil" | "round" | "abs" | "sign" | "log" | "exp" | "is_nan" | "is_inf"
        | "decimals" | "seed" | "rand_seed" | "deg2rad" | "rad2deg" | "linear2db"
        | "db2linear" | "nearest_po2" | "weakref" | "typeof" | "type_exists" | "var2str"
        | "str2var" | "var2bytes" | "bytes2var" | "load" | "inst2dict" | "dict2inst"
        | "hash" | "instance_from_id" => Arity::exact(1),
        "atan2" | "fmod" | "fposmod" | "pow" | "ease" | "stepify" | "rand_range" | "max"
        | "min" | "funcref" | "convert" => Arity::exact(2),
        "lerp" | "dectime" | "clamp" => Arity::exact(3),
        "randomize" | "randi" | "randf" | "print_stack" => Arity::exact(0),
        "str" => Arity::range(1, Arity::VARIADIC),
        "print" | "printt" | "prints" | "printerr" | "printraw" => {
            Arity::range(0, Arity::VARIADIC)
        }
        "range" => Arity::range(1, 3),
        "Color8" => Arity::range(3, 4),
        "ColorN" => Arity::range(1, 2),
        _ => return None,
    };
    Some(arity)
}
