//! Identifier quoting (§4.6, §11 "Identifier quoting table").
//!
//! `needs_quoting` implements the rule verbatim: quote when the identifier
//! is empty, is a reserved word, contains an uppercase letter, contains any
//! character outside `[a-z0-9_]`, or does not start with a letter or `_`.
//! `RESERVED_WORDS` is PostgreSQL's own reserved + unreserved-but-keyword
//! classification from `keywords.c` — kept as a flat set rather than the
//! original's category split, since this crate only needs the yes/no
//! answer, not *why* a word is reserved.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Reserved and otherwise-keyword identifiers that must always be quoted
/// when used as a SQL identifier, taken from PostgreSQL's reserved-word
/// list (`src/include/parser/kwlist.h` categories `RESERVED_KEYWORD` and
/// `TYPE_FUNC_NAME_KEYWORD`).
static RESERVED_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "authorization",
        "binary", "both", "case", "cast", "check", "collate", "collation", "column", "concurrently",
        "constraint", "create", "cross", "current_catalog", "current_date", "current_role",
        "current_schema", "current_time", "current_timestamp", "current_user", "default", "deferrable",
        "desc", "distinct", "do", "else", "end", "except", "false", "fetch", "for", "foreign", "freeze",
        "from", "full", "grant", "group", "having", "ilike", "in", "initially", "inner", "intersect",
        "into", "is", "isnull", "join", "lateral", "leading", "left", "like", "limit", "localtime",
        "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only", "or", "order",
        "outer", "overlaps", "placing", "primary", "references", "returning", "right", "select",
        "session_user", "similar", "some", "symmetric", "table", "tablesample", "then", "to", "trailing",
        "true", "union", "unique", "user", "using", "variadic", "verbose", "when", "where", "window",
        "with",
        // Unreserved-in-Postgres-but-commonly-quoted-elsewhere / function-name
        // keywords that collide with identifiers callers reasonably pick.
        "between", "bigint", "bit", "boolean", "char", "character", "coalesce", "dec", "decimal",
        "exists", "extract", "float", "greatest", "grouping", "inout", "int", "integer", "interval",
        "least", "national", "nchar", "none", "nullif", "numeric", "out", "overlay", "position",
        "precision", "real", "row", "setof", "smallint", "substring", "time", "timestamp", "treat",
        "trim", "values", "varchar", "xmlattributes", "xmlconcat", "xmlelement", "xmlexists",
        "xmlforest", "xmlnamespaces", "xmlparse", "xmlpi", "xmlroot", "xmlserialize", "xmltable",
    ]
    .into_iter()
    .collect()
});

/// Whether `ident` must be double-quoted to appear literally in SQL.
pub fn needs_quoting(ident: &str) -> bool {
    if ident.is_empty() {
        return true;
    }
    if RESERVED_WORDS.contains(ident.to_lowercase().as_str()) {
        return true;
    }
    let mut chars = ident.chars();
    let first = chars.next().expect("non-empty checked above");
    if !(first.is_ascii_lowercase() || first == '_') {
        return true;
    }
    ident
        .chars()
        .any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
}

/// Quote `ident` if required, or always when `quote_all` is set. Embedded
/// `"` is doubled per SQL identifier-escaping rules.
pub fn quote_ident(ident: &str, quote_all: bool) -> String {
    if quote_all || needs_quoting(ident) {
        format!("\"{}\"", ident.replace('"', "\"\""))
    } else {
        ident.to_string()
    }
}

/// Render a schema-qualified name, dropping the schema qualifier when it
/// equals `target_schema` (§3.3 / §4.5), quoting each part per
/// `quote_ident`.
pub fn qualify(schema: &str, name: &str, target_schema: &str, quote_all: bool) -> String {
    if schema == target_schema {
        quote_ident(name, quote_all)
    } else {
        format!("{}.{}", quote_ident(schema, quote_all), quote_ident(name, quote_all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_simple_identifier_is_unquoted() {
        assert!(!needs_quoting("orders"));
        assert_eq!(quote_ident("orders", false), "orders");
    }

    #[test]
    fn uppercase_forces_quoting() {
        assert!(needs_quoting("Orders"));
        assert_eq!(quote_ident("Orders", false), "\"Orders\"");
    }

    #[test]
    fn reserved_word_forces_quoting() {
        assert!(needs_quoting("select"));
        assert!(needs_quoting("table"));
    }

    #[test]
    fn leading_digit_forces_quoting() {
        assert!(needs_quoting("1st_column"));
    }

    #[test]
    fn quote_all_quotes_every_identifier() {
        assert_eq!(quote_ident("orders", true), "\"orders\"");
    }

    #[test]
    fn qualify_drops_matching_schema() {
        assert_eq!(qualify("public", "orders", "public", false), "orders");
        assert_eq!(qualify("app", "orders", "public", false), "app.orders");
    }

    #[test]
    fn embedded_quote_is_doubled() {
        assert_eq!(quote_ident("weird\"name", false), "\"weird\"\"name\"");
    }
}
