//! Enum lowering.
//!
//! Every enum compiles to Int32. Numeric members take their literal value,
//! with omitted members auto-incrementing from the previous explicit one.
//! String members get sequential declaration-order tags; their text survives
//! only for compile-time equality. `const enum` behaves identically.

use crate::Resolver;
use ternc_ast::{EnumDecl, EnumInit};
use ternc_tir::{EnumDef, EnumValue};

pub fn register_enum(resolver: &mut Resolver<'_>, decl: &EnumDecl) {
    let mut values = indexmap::IndexMap::new();
    let mut next_numeric: i32 = 0;
    let mut next_string_tag: u32 = 0;

    for member in &decl.members {
        let value = match &member.init {
            Some(EnumInit::Number(n)) => {
                next_numeric = *n as i32 + 1;
                EnumValue::Int(*n as i32)
            }
            Some(EnumInit::String(text)) => {
                // Also enters the global tag table, so comparisons against
                // the literal lower to the same integer everywhere.
                resolver.ctx.string_tag(*text);
                let tag = next_string_tag;
                next_string_tag += 1;
                EnumValue::Str { tag, text: *text }
            }
            // Computed initializers were rejected by the validator.
            Some(EnumInit::Computed(_)) => continue,
            None => {
                let v = next_numeric;
                next_numeric += 1;
                EnumValue::Int(v)
            }
        };
        values.insert(member.name, value);
    }

    resolver.ctx.register_enum(EnumDef {
        name: decl.name,
        is_const: decl.is_const,
        values,
    });
}
