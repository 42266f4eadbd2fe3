//! Canonical type-name resolution.
//!
//! PostgreSQL's type aliases are many-to-one — `int4` and `integer` name the
//! same catalog type, `serial` desugars to `integer` with a hidden sequence
//! default. Two schemas that spell a column's type differently must not
//! register as a type change (§3.3).

use crate::ir::common::TypeName;

const ALIASES: &[(&str, &str)] = &[
    ("int", "integer"),
    ("int4", "integer"),
    ("int2", "smallint"),
    ("int8", "bigint"),
    ("float4", "real"),
    ("float8", "double precision"),
    ("bool", "boolean"),
    ("varchar", "character varying"),
    ("char", "character"),
    ("decimal", "numeric"),
    ("timestamptz", "timestamp with time zone"),
    ("timetz", "time with time zone"),
    ("serial", "integer"),
    ("serial4", "integer"),
    ("bigserial", "integer"),
    ("serial8", "integer"),
    ("smallserial", "integer"),
    ("serial2", "integer"),
];

/// Resolve `type_name` to its canonical spelling. Modifiers and array
/// dimensionality pass through unchanged — only the base name is aliased.
pub fn canonicalize_type_name(type_name: &TypeName) -> TypeName {
    let lowered = type_name.name.to_lowercase();
    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canon)| (*canon).to_string())
        .unwrap_or(lowered);
    TypeName {
        name: canonical,
        modifiers: type_name.modifiers.clone(),
        array_dims: type_name.array_dims,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_aliases() {
        assert_eq!(canonicalize_type_name(&TypeName::simple("int4")).name, "integer");
        assert_eq!(canonicalize_type_name(&TypeName::simple("int")).name, "integer");
        assert_eq!(canonicalize_type_name(&TypeName::simple("serial")).name, "integer");
        assert_eq!(
            canonicalize_type_name(&TypeName::simple("varchar")).name,
            "character varying"
        );
    }

    #[test]
    fn preserves_modifiers_and_unknown_names() {
        let t = canonicalize_type_name(&TypeName::with_modifiers("numeric", vec![10, 2]));
        assert_eq!(t.name, "numeric");
        assert_eq!(t.modifiers, vec![10, 2]);

        let custom = canonicalize_type_name(&TypeName::simple("vector"));
        assert_eq!(custom.name, "vector");
    }
}
