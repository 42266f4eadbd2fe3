//! `SELECT *` expansion (§4.1 view-definition normalization).
//!
//! A view whose `SELECT` lists `*` or `alias.*` must have that expanded to
//! the concrete column list of the relations it reads from — otherwise an
//! upstream column addition would never show up as a change to the view's
//! own column list, and S3 (a view column addition forced by a base-table
//! `ALTER TABLE ADD COLUMN`) would be silently missed. This module does the
//! expansion textually: find each star target's source span in the
//! original SQL, resolve which relation(s) it denotes from a best-effort
//! walk of the `FROM` clause, and splice in `alias.col, alias.col, ...`.
//!
//! Only plain `SELECT ... FROM <relation> [JOIN <relation> ...]` shapes are
//! handled. Set operations (`UNION`/`INTERSECT`/`EXCEPT`), subqueries in
//! `FROM`, and any star whose relation cannot be resolved against `known`
//! cause the whole expansion to be skipped — the caller keeps the original
//! text, the same fallback-on-uncertainty style [`super::canonicalize_expr`]
//! already uses for unparseable fragments.

use std::collections::HashMap;

use pg_query::protobuf::Node;
use pg_query::NodeEnum;

/// Column lists for every relation normalization has already finished
/// with, keyed by catalog key (`schema.name`) — tables plus any view
/// already expanded in an earlier fixpoint round (see
/// [`super::normalize`]).
pub type ColumnSource = HashMap<String, Vec<String>>;

/// Try to expand every `*` / `alias.*` target in `select_text` using
/// `known`. Returns `Some((expanded_text, output_columns))` on success,
/// `None` when the statement isn't a plain `SELECT ... FROM ...` or some
/// star's relation doesn't resolve in `known` yet.
pub fn expand_star(select_text: &str, default_schema: &str, known: &ColumnSource) -> Option<(String, Vec<String>)> {
    let trimmed = select_text.trim().trim_end_matches(';').trim();
    let parsed = pg_query::parse(trimmed).ok()?;
    let stmt = parsed.protobuf.stmts.first()?.stmt.as_ref()?.node.as_ref()?;
    let NodeEnum::SelectStmt(select) = stmt else {
        return None;
    };
    // A set-operation tree (UNION/INTERSECT/EXCEPT) has its own larg/rarg
    // subtrees instead of a single target_list/from_clause — out of scope
    // for this best-effort pass.
    if select.larg.is_some() || select.rarg.is_some() {
        return None;
    }

    let relations = collect_relations(&select.from_clause, default_schema);
    if relations.is_empty() {
        return None;
    }

    let mut splices: Vec<(i32, i32, String)> = Vec::new();
    let mut columns: Vec<String> = Vec::new();

    for target in &select.target_list {
        let Some(NodeEnum::ResTarget(res)) = &target.node else {
            continue;
        };
        let Some(val) = &res.val else { continue };
        let Some(NodeEnum::ColumnRef(cr)) = &val.node else {
            columns.push(explicit_target_name(res, val));
            continue;
        };
        let Some(star_span) = star_fields(cr) else {
            // An ordinary column reference, not a star — keep as-is.
            columns.push(explicit_target_name(res, val));
            continue;
        };
        let (qualifier, location) = star_span;
        let expanded = match qualifier {
            Some(alias) => {
                let rel = relations.iter().find(|r| r.alias == alias)?;
                let cols = known.get(&rel.catalog_key)?;
                cols.iter().map(|c| format!("{alias}.{c}")).collect::<Vec<_>>()
            }
            None => {
                let mut all = Vec::new();
                for rel in &relations {
                    let cols = known.get(&rel.catalog_key)?;
                    all.extend(cols.iter().map(|c| format!("{}.{c}", rel.alias)));
                }
                all
            }
        };
        if expanded.is_empty() {
            return None;
        }
        for col in &expanded {
            columns.push(col.rsplit('.').next().unwrap_or(col).to_string());
        }
        let start = location;
        let end = find_star_end(trimmed, start)?;
        splices.push((start, end, expanded.join(", ")));
    }

    if splices.is_empty() {
        // Nothing to expand — the select had no star targets at all.
        return None;
    }

    // Apply rightmost-first so earlier byte offsets stay valid.
    splices.sort_by(|a, b| b.0.cmp(&a.0));
    let mut text = trimmed.to_string();
    for (start, end, replacement) in splices {
        let (start, end) = (start as usize, end as usize);
        if start > text.len() || end > text.len() || start > end {
            return None;
        }
        text.replace_range(start..end, &replacement);
    }

    Some((text, columns))
}

struct RelRef {
    alias: String,
    catalog_key: String,
}

fn collect_relations(from_clause: &[Node], default_schema: &str) -> Vec<RelRef> {
    let mut out = Vec::new();
    for node in from_clause {
        collect_relations_node(node, default_schema, &mut out);
    }
    out
}

fn collect_relations_node(node: &Node, default_schema: &str, out: &mut Vec<RelRef>) {
    let Some(inner) = &node.node else { return };
    match inner {
        NodeEnum::RangeVar(rv) => {
            let schema = if rv.schemaname.is_empty() {
                default_schema.to_string()
            } else {
                rv.schemaname.clone()
            };
            let alias = rv
                .alias
                .as_ref()
                .map(|a| a.aliasname.clone())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| rv.relname.clone());
            out.push(RelRef {
                alias,
                catalog_key: format!("{schema}.{}", rv.relname),
            });
        }
        NodeEnum::JoinExpr(je) => {
            if let Some(l) = &je.larg {
                collect_relations_node(l, default_schema, out);
            }
            if let Some(r) = &je.rarg {
                collect_relations_node(r, default_schema, out);
            }
        }
        // Subqueries, function calls, and other non-relation FROM items are
        // left unresolved — any star that needs one bails the whole pass.
        _ => {}
    }
}

/// For a `ColumnRef`, returns `Some((qualifier, location))` when its field
/// list ends in `A_Star` — `qualifier` is `None` for bare `*`, `Some(alias)`
/// for `alias.*`.
fn star_fields(cr: &pg_query::protobuf::ColumnRef) -> Option<(Option<String>, i32)> {
    let last = cr.fields.last()?;
    if !matches!(last.node, Some(NodeEnum::AStar(_))) {
        return None;
    }
    let qualifier = if cr.fields.len() > 1 {
        match &cr.fields[0].node {
            Some(NodeEnum::String(s)) => Some(s.sval.clone()),
            _ => None,
        }
    } else {
        None
    };
    Some((qualifier, cr.location))
}

/// The output column name `ResTarget` `res` would produce: its explicit
/// `AS` alias if present, else the trailing identifier of a plain column
/// reference, else Postgres's own anonymous-expression name.
fn explicit_target_name(res: &pg_query::protobuf::ResTarget, val: &Node) -> String {
    if !res.name.is_empty() {
        return res.name.clone();
    }
    if let Some(NodeEnum::ColumnRef(cr)) = &val.node
        && let Some(last) = cr.fields.last()
        && let Some(NodeEnum::String(s)) = &last.node
    {
        return s.sval.clone();
    }
    "?column?".to_string()
}

/// Byte offset one past the `*` that starts at or after `start` in `text` —
/// covers both `*` and `alias.*`, since the star is always the final
/// character of the reference.
fn find_star_end(text: &str, start: i32) -> Option<i32> {
    if start < 0 {
        return None;
    }
    let start = start as usize;
    let rest = text.get(start..)?;
    let offset = rest.find('*')?;
    Some((start + offset + 1) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(pairs: &[(&str, &[&str])]) -> ColumnSource {
        pairs
            .iter()
            .map(|(k, cols)| (k.to_string(), cols.iter().map(|c| c.to_string()).collect()))
            .collect()
    }

    #[test]
    fn expands_bare_star() {
        let known = known(&[("public.item", &["id", "title", "status"])]);
        let (text, cols) = expand_star("SELECT * FROM item", "public", &known).unwrap();
        assert_eq!(cols, vec!["id", "title", "status"]);
        assert!(text.contains("item.id"));
    }

    #[test]
    fn expands_aliased_star_with_join() {
        let known = known(&[
            ("public.item", &["id", "title", "status"]),
            ("public.category", &["id", "name"]),
        ]);
        let sql = "SELECT i.*, c.name AS category_name FROM item i JOIN category c ON c.id = i.id";
        let (text, cols) = expand_star(sql, "public", &known).unwrap();
        assert_eq!(cols, vec!["id", "title", "status", "category_name"]);
        assert!(text.contains("i.id, i.title, i.status"));
        assert!(text.contains("category_name"));
    }

    #[test]
    fn unresolvable_relation_skips_expansion() {
        // `category` hasn't been normalized/expanded yet, so its columns
        // aren't in `known` — the whole expansion bails rather than
        // producing a partially-expanded select list.
        let known = known(&[("public.item", &["id"])]);
        let sql = "SELECT i.*, c.* FROM item i JOIN category c ON c.id = i.id";
        let result = expand_star(sql, "public", &known);
        assert!(result.is_none());
    }

    #[test]
    fn set_operation_is_left_unexpanded() {
        let known = known(&[("public.item", &["id"])]);
        let result = expand_star("SELECT * FROM item UNION SELECT * FROM item", "public", &known);
        assert!(result.is_none());
    }

    #[test]
    fn no_star_returns_none() {
        let known = known(&[("public.item", &["id"])]);
        let result = expand_star("SELECT id FROM item", "public", &known);
        assert!(result.is_none());
    }
}
