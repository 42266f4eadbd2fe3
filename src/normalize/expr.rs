//! Expression canonicalization (§3.3, §4.1).
//!
//! Defaults, CHECK predicates, index predicates, generated-column
//! expressions, policy predicates, and view/matview definitions all pass
//! through here so that two schemas whose authors wrote "the same"
//! expression differently — extra parens, `IN (...)` vs `= ANY(...)`,
//! incidental whitespace — compare structurally equal.
//!
//! Parsing a bare fragment (a default, a predicate) borrows the teacher's
//! `deparse_node` trick from `parser/pg_query.rs`: rather than hardcode a
//! PostgreSQL version number, which aborts when the linked libpg_query was
//! built against a different one, the fragment is spliced into a target
//! list position and deparsed from there. Here the splice is done at the
//! text level — `SELECT <fragment>` — which is sufficient since the
//! canonicalizer only needs the deparser's rendering of the expression, not
//! a structural rewrite of it.

/// Canonicalize a standalone SQL expression fragment. Returns the trimmed
/// original text if the fragment fails to parse as a `SELECT` target —
/// some legacy default syntaxes and partition-bound literals are not valid
/// standalone expressions, and a normalizer that rejected them outright
/// would turn a cosmetic mismatch into a hard failure.
pub fn canonicalize_expr(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let wrapped = format!("SELECT {trimmed}");
    let deparsed = match pg_query::parse(&wrapped) {
        Ok(result) => match pg_query::deparse(&result.protobuf) {
            Ok(sql) => sql.strip_prefix("SELECT ").unwrap_or(&sql).trim().to_string(),
            Err(_) => trimmed.to_string(),
        },
        Err(_) => trimmed.to_string(),
    };
    fold_in_to_any(&deparsed)
}

/// Canonicalize a full `SELECT` statement — a view or materialized view
/// definition. Deparses the statement directly rather than splicing it into
/// a template. Falls back to the trimmed original on parse failure, for the
/// same reason as [`canonicalize_expr`].
pub fn canonicalize_select(sql: &str) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    match pg_query::parse(trimmed) {
        Ok(result) => pg_query::deparse(&result.protobuf).unwrap_or_else(|_| trimmed.to_string()),
        Err(_) => trimmed.to_string(),
    }
}

/// Fold `<expr> IN (<literal-list>)` into `<expr> = ANY (ARRAY[<literal-list>])`,
/// the form Postgres itself treats as canonical — this keeps two
/// semantically identical predicates written with either spelling from
/// registering as a spurious diff (§3.3). Only the first top-level `IN (`
/// is folded, and only when its parenthesized content is not a subquery —
/// `IN (SELECT ...)` is left untouched.
fn fold_in_to_any(text: &str) -> String {
    let upper = text.to_uppercase();
    let Some(rel_pos) = upper.find(" IN (") else {
        return text.to_string();
    };
    let open = rel_pos + 4;
    let Some(close) = matching_paren(text, open) else {
        return text.to_string();
    };
    let inner = &text[open + 1..close];
    if inner.trim_start().to_uppercase().starts_with("SELECT") {
        return text.to_string();
    }
    let before = &text[..rel_pos];
    let after = &text[close + 1..];
    format!("{before} = ANY (ARRAY[{inner}]){after}")
}

/// Index of the `)` matching the `(` at byte offset `open`.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_whitespace_and_casing() {
        let a = canonicalize_expr("status='a'");
        let b = canonicalize_expr("  status = 'a'  ");
        assert_eq!(a, b);
    }

    #[test]
    fn folds_in_list_to_any_array() {
        let result = canonicalize_expr("status IN ('a', 'b', 'c')");
        assert!(result.contains("ANY"));
        assert!(result.contains("ARRAY"));
    }

    #[test]
    fn leaves_in_subquery_untouched() {
        let result = canonicalize_expr("id IN (SELECT id FROM public.archived)");
        assert!(!result.contains("ANY"));
    }

    #[test]
    fn falls_back_to_trimmed_text_on_parse_failure() {
        let result = canonicalize_expr("  not valid ) sql ( at all  ");
        assert_eq!(result, "not valid ) sql ( at all");
    }

    #[test]
    fn canonicalize_select_deparses_full_statement() {
        let result = canonicalize_select("select id, name from public.customers;");
        assert!(result.to_uppercase().contains("SELECT"));
        assert!(result.contains("customers"));
    }
}
