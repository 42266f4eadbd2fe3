//! The Formatter (§4.6) — final pipeline stage.
//!
//! Takes the Emitter's ordered [`crate::emit::StatementRecord`] list and
//! renders it to a single script: a header noting transactionality, one
//! three-line comment banner per statement group, a single blank line
//! between groups, a trailing semicolon and newline on every statement, and
//! no trailing whitespace anywhere. Identifier quoting itself
//! (`needs_quoting` / `quote_ident`, §11) is applied earlier, while the
//! Emitter is still building `sql` text with full object identity in hand —
//! reparsing already-rendered SQL to quote identifiers after the fact would
//! need to re-discover what the Emitter already knew.

pub mod quoting;

use crate::config::PlannerConfig;
use crate::emit::StatementRecord;

/// Render a full script from `statements`, already in final execution
/// order. `config.transactional` decides whether the header calls out any
/// non-transactional statements as sibling blocks per §6.3.
pub fn render_script(statements: &[StatementRecord], config: &PlannerConfig) -> String {
    let mut out = String::new();
    out.push_str(&render_header(statements, config));

    let mut prev_banner: Option<(&str, &str, &str)> = None;
    for statement in statements {
        let banner_key = (
            statement.group_banner.name.as_str(),
            statement.group_banner.kind.label(),
            statement.group_banner.schema.as_str(),
        );
        if prev_banner != Some(banner_key) {
            if prev_banner.is_some() {
                out.push('\n');
            }
            out.push_str(&render_banner(statement, config));
            prev_banner = Some(banner_key);
        }

        out.push_str(statement.sql.trim_end());
        if !statement.sql.trim_end().ends_with(';') {
            out.push(';');
        }
        out.push('\n');

        if let Some(wait) = &statement.wait_stanza {
            out.push_str("-- pgschema:wait\n");
            out.push_str(wait.trim_end());
            out.push('\n');
        }
    }

    out
}

fn render_header(statements: &[StatementRecord], config: &PlannerConfig) -> String {
    let has_nontransactional = statements.iter().any(|s| !s.transactional);
    let mut header = String::new();
    header.push_str("--\n-- pgschema-plan migration script\n");
    header.push_str(&format!(
        "-- transactional: {}\n",
        !has_nontransactional && config.transactional
    ));
    if has_nontransactional {
        header.push_str(
            "-- NOTE: this script contains non-transactional statements (CONCURRENTLY).\n",
        );
        header.push_str("-- Each such statement must run outside any surrounding transaction.\n");
    }
    header.push_str("--\n\n");
    header
}

fn render_banner(statement: &StatementRecord, config: &PlannerConfig) -> String {
    let schema = if statement.group_banner.schema == config.target_schema {
        "-".to_string()
    } else {
        statement.group_banner.schema.clone()
    };
    format!(
        "--\n-- Name: {}; Type: {}; Schema: {}; Owner: -\n--\n",
        statement.group_banner.name,
        statement.group_banner.kind.label(),
        schema,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::GroupBanner;
    use crate::ir::ObjectKind;

    fn stmt(sql: &str, name: &str, kind: ObjectKind, schema: &str) -> StatementRecord {
        StatementRecord {
            sql: sql.to_string(),
            transactional: true,
            wait_stanza: None,
            group_banner: GroupBanner {
                name: name.to_string(),
                kind,
                schema: schema.to_string(),
            },
            source_change_id: 0,
        }
    }

    #[test]
    fn script_ends_with_trailing_newline_and_semicolon() {
        let statements = vec![stmt("CREATE TABLE orders (id integer)", "orders", ObjectKind::Table, "public")];
        let script = render_script(&statements, &PlannerConfig::default());
        assert!(script.ends_with('\n'));
        assert!(script.trim_end().ends_with(';'));
    }

    #[test]
    fn banner_schema_is_dash_when_matching_target() {
        let statements = vec![stmt("CREATE TABLE orders (id integer)", "orders", ObjectKind::Table, "public")];
        let script = render_script(&statements, &PlannerConfig::default());
        assert!(script.contains("Schema: -"));
    }

    #[test]
    fn nontransactional_statement_adds_header_warning() {
        let mut s = stmt("CREATE INDEX CONCURRENTLY idx ON orders(id)", "idx", ObjectKind::Index, "public");
        s.transactional = false;
        let script = render_script(&[s], &PlannerConfig::default());
        assert!(script.contains("non-transactional"));
    }

    #[test]
    fn wait_stanza_follows_sentinel_line() {
        let mut s = stmt("CREATE INDEX CONCURRENTLY idx ON orders(id)", "idx", ObjectKind::Index, "public");
        s.transactional = false;
        s.wait_stanza = Some("SELECT 1 FROM pg_stat_progress_create_index".to_string());
        let script = render_script(&[s], &PlannerConfig::default());
        assert!(script.contains("-- pgschema:wait\nSELECT 1 FROM pg_stat_progress_create_index"));
    }
}
