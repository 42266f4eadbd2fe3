//! The Emitter (§4.3, §6.2) — third pipeline stage, in two parts.
//!
//! [`expand_for_online`] runs on the Differ's raw change-set, *before* the
//! dependency graph orders it: under `online` mode a plain constraint or
//! index Create is rewritten into a multi-step Alter (NOT VALID + VALIDATE,
//! or CONCURRENTLY) so that each step becomes its own graph node — this is
//! what lets the VALIDATE (or the rename half of an index rebuild) be
//! reordered after whatever else touches the same table.
//!
//! [`render`] runs after graph ordering and turns the final change-set into
//! [`StatementRecord`]s. Records carry only structural data (§4.2); this is
//! the one place that looks a [`ChangeRecord`]'s object up in `old`/`new` and
//! turns it into rendered DDL text.

use std::collections::{HashMap, HashSet};

use crate::change::{ChangeKind, ChangeRecord, SubOp};
use crate::config::PlannerConfig;
use crate::differ;
use crate::error::{PlanError, PlanResult};
use crate::format::quoting::{qualify, quote_ident};
use crate::ir::{
    ArgMode, Column, Constraint, ConstraintKind, DefaultPrivilege, DefaultPrivilegeObjectType,
    Domain, ExcludeElement, FkAction, FkMatch, GeneratedKind, IdentityKind, Index, IndexKey, Ir,
    NullsOrder, ObjectKind, ObjectRef, Policy, PolicyCommand, Privilege, PrivilegeKind,
    QualifiedName, ReturnType, Routine, RoutineKind, Sequence, SortDirection, Table, Trigger,
    TriggerEvent, TriggerGranularity, TriggerTiming, TypeKind, UserType,
};

/// One fully-rendered DDL statement plus the metadata the Formatter needs to
/// group and annotate it (§4.6). By the time a `StatementRecord` exists,
/// `sql` is complete, ready-to-run DDL — there is no later stage that still
/// needs to know which `ChangeRecord` it came from except for debugging,
/// which `source_change_id` is kept around for.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRecord {
    pub sql: String,
    pub transactional: bool,
    pub wait_stanza: Option<String>,
    pub group_banner: GroupBanner,
    pub source_change_id: usize,
}

/// The header the Formatter prints once per contiguous run of statements on
/// the same object (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBanner {
    pub name: String,
    pub kind: ObjectKind,
    pub schema: String,
}

fn banner_for(object: &ObjectRef) -> GroupBanner {
    GroupBanner {
        name: object.name.clone(),
        kind: object.kind,
        schema: object.schema.clone(),
    }
}

/// Rewrite the Differ's raw change-set under online-mode policy (§4.3).
/// A no-op when `config.online` is false — the Differ's plain Create/Drop
/// records pass straight through unchanged.
pub fn expand_for_online(changes: Vec<ChangeRecord>, new: &Ir, config: &PlannerConfig) -> Vec<ChangeRecord> {
    if !config.online {
        return changes;
    }

    let mut drop_positions: HashMap<(String, String, String), usize> = HashMap::new();
    for (i, c) in changes.iter().enumerate() {
        if c.object.kind == ObjectKind::Index && c.kind == ChangeKind::Drop {
            let owner = c.object.qualifier.clone().unwrap_or_default();
            drop_positions.insert((owner, c.object.schema.clone(), c.object.name.clone()), i);
        }
    }

    let mut replacements: HashMap<usize, ChangeRecord> = HashMap::new();
    let mut consumed_drops: HashSet<usize> = HashSet::new();

    for (i, c) in changes.iter().enumerate() {
        if c.object.kind == ObjectKind::Index && c.kind == ChangeKind::Create {
            let Some(index) = differ::find_index(new, &c.object) else {
                continue;
            };
            let owner = c.object.qualifier.clone().unwrap_or_default();
            let key = (owner, c.object.schema.clone(), c.object.name.clone());
            if let Some(&drop_idx) = drop_positions.get(&key) {
                consumed_drops.insert(drop_idx);
                let old_name = changes[drop_idx].object.name.clone();
                replacements.insert(
                    i,
                    ChangeRecord::alter(
                        c.object.clone(),
                        vec![SubOp::ReplaceIndex {
                            old_name,
                            new_index: index.clone(),
                        }],
                    ),
                );
            } else {
                replacements.insert(
                    i,
                    ChangeRecord::alter(
                        c.object.clone(),
                        vec![SubOp::CreateIndexConcurrently { index: index.clone() }],
                    ),
                );
            }
        } else if c.object.kind == ObjectKind::Constraint && c.kind == ChangeKind::Create {
            if let Some((_, constraint)) = differ::find_constraint(new, &c.object) {
                if matches!(
                    constraint.kind,
                    ConstraintKind::Check { .. } | ConstraintKind::ForeignKey { .. }
                ) {
                    let mut not_valid_yet = constraint.clone();
                    not_valid_yet.not_valid = true;
                    replacements.insert(
                        i,
                        ChangeRecord::alter(
                            c.object.clone(),
                            vec![
                                SubOp::AddConstraint {
                                    constraint: not_valid_yet,
                                },
                                SubOp::ValidateConstraint {
                                    name: c.object.name.clone(),
                                },
                            ],
                        ),
                    );
                }
            }
        }
    }

    changes
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !consumed_drops.contains(i))
        .map(|(i, c)| replacements.remove(&i).unwrap_or(c))
        .collect()
}

/// Render every change in `changes` (already graph-ordered) into the
/// statements the Formatter assembles into a script.
pub fn render(
    changes: Vec<ChangeRecord>,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
) -> PlanResult<Vec<StatementRecord>> {
    let mut out = Vec::new();
    for (id, change) in changes.into_iter().enumerate() {
        render_change(&change, old, new, config, id, &mut out)?;
    }
    Ok(out)
}

fn missing(object: &ObjectRef) -> PlanError {
    PlanError::UnsupportedChange {
        object: object.clone(),
        reason: "referenced entity not found in the IR it should have been looked up from".to_string(),
    }
}

fn render_change(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    let banner = banner_for(&change.object);
    match change.object.kind {
        ObjectKind::Schema => render_schema(change, config, id, &banner, out),
        ObjectKind::Extension => Ok(()),
        ObjectKind::Type => render_type(change, old, new, config, id, &banner, out),
        ObjectKind::Domain => render_domain(change, old, new, config, id, &banner, out),
        ObjectKind::Sequence => render_sequence(change, old, new, config, id, &banner, out),
        ObjectKind::Table => render_table(change, old, new, config, id, &banner, out),
        ObjectKind::Index => render_index(change, old, new, config, id, &banner, out),
        ObjectKind::Constraint => render_constraint(change, old, new, config, id, &banner, out),
        ObjectKind::Function | ObjectKind::Procedure => render_routine(change, old, new, config, id, &banner, out),
        ObjectKind::View => render_view(change, old, new, config, id, &banner, out),
        ObjectKind::MaterializedView => render_matview(change, old, new, config, id, &banner, out),
        ObjectKind::Trigger => render_trigger(change, old, new, config, id, &banner, out),
        ObjectKind::Policy => render_policy(change, old, new, config, id, &banner, out),
        ObjectKind::Privilege => render_privilege(change, old, new, config, id, &banner, out),
        ObjectKind::DefaultPrivilege => render_default_privilege(change, old, new, config, id, &banner, out),
        ObjectKind::Comment => render_comment(change, old, new, config, id, &banner, out),
    }
}

fn push(out: &mut Vec<StatementRecord>, id: usize, banner: &GroupBanner, sql: String) {
    out.push(StatementRecord {
        sql,
        transactional: true,
        wait_stanza: None,
        group_banner: banner.clone(),
        source_change_id: id,
    });
}

fn push_nontransactional(out: &mut Vec<StatementRecord>, id: usize, banner: &GroupBanner, sql: String, wait: Option<String>) {
    out.push(StatementRecord {
        sql,
        transactional: false,
        wait_stanza: wait,
        group_banner: banner.clone(),
        source_change_id: id,
    });
}

fn quote(ident: &str, config: &PlannerConfig) -> String {
    quote_ident(ident, config.quote_all)
}

fn cols_join(cols: &[String], config: &PlannerConfig) -> String {
    cols.iter().map(|c| quote(c, config)).collect::<Vec<_>>().join(", ")
}

fn q_name(qn: &QualifiedName, config: &PlannerConfig) -> String {
    qualify(
        qn.schema.as_deref().unwrap_or(&config.target_schema),
        &qn.name,
        &config.target_schema,
        config.quote_all,
    )
}

fn q_schema_name(schema: &str, name: &str, config: &PlannerConfig) -> String {
    qualify(schema, name, &config.target_schema, config.quote_all)
}

fn sql_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn if_not_exists(config: &PlannerConfig) -> &'static str {
    if config.include_if_not_exists {
        "IF NOT EXISTS "
    } else {
        ""
    }
}

fn if_exists(config: &PlannerConfig) -> &'static str {
    if config.include_if_not_exists {
        "IF EXISTS "
    } else {
        ""
    }
}

fn wait_stanza_for_index(table: &str) -> String {
    format!(
        "-- Poll until this returns no rows, then continue:\nSELECT pid, phase, blocks_done, blocks_total\nFROM pg_stat_progress_create_index\nWHERE relid = '{table}'::regclass;"
    )
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

fn render_schema(
    change: &ChangeRecord,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    let name = quote(&change.object.name, config);
    match change.kind {
        ChangeKind::Create => push(out, id, banner, format!("CREATE SCHEMA {}{name}", if_not_exists(config))),
        ChangeKind::Drop => push(out, id, banner, format!("DROP SCHEMA {}{name}", if_exists(config))),
        ChangeKind::Alter => {
            for op in &change.sub_ops {
                if let SubOp::SetComment { text, .. } = op {
                    push(out, id, banner, render_comment_stmt("SCHEMA", &name, text));
                }
            }
        }
    }
    Ok(())
}

fn render_comment_stmt(keyword: &str, target: &str, text: &Option<String>) -> String {
    match text {
        Some(t) => format!("COMMENT ON {keyword} {target} IS {}", sql_literal(t)),
        None => format!("COMMENT ON {keyword} {target} IS NULL"),
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn render_type(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    let name = q_schema_name(&change.object.schema, &change.object.name, config);
    match change.kind {
        ChangeKind::Create => {
            let t = differ::find_type(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_type_create(&name, t));
        }
        ChangeKind::Drop => {
            push(out, id, banner, format!("DROP TYPE {}{name}", if_exists(config)));
        }
        ChangeKind::Alter => {
            let _ = old;
            for op in &change.sub_ops {
                match op {
                    SubOp::AddEnumValue { value, after } => {
                        let after_clause = after
                            .as_ref()
                            .map(|a| format!(" AFTER {}", sql_literal(a)))
                            .unwrap_or_default();
                        push(
                            out,
                            id,
                            banner,
                            format!("ALTER TYPE {name} ADD VALUE {}{after_clause}", sql_literal(value)),
                        );
                    }
                    SubOp::SetComment { text, .. } => {
                        push(out, id, banner, render_comment_stmt("TYPE", &name, text));
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn render_type_create(name: &str, t: &UserType) -> String {
    match &t.kind {
        TypeKind::Enum { labels } => {
            let labels = labels.iter().map(|l| sql_literal(l)).collect::<Vec<_>>().join(", ");
            format!("CREATE TYPE {name} AS ENUM ({labels})")
        }
        TypeKind::Composite { columns } => {
            let fields = columns
                .iter()
                .map(|(n, ty)| format!("{n} {ty}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("CREATE TYPE {name} AS ({fields})")
        }
    }
}

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

fn render_domain(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    let name = q_schema_name(&change.object.schema, &change.object.name, config);
    match change.kind {
        ChangeKind::Create => {
            let d = differ::find_domain(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_domain_create(&name, d));
        }
        ChangeKind::Drop => {
            push(out, id, banner, format!("DROP DOMAIN {}{name}", if_exists(config)));
        }
        ChangeKind::Alter => {
            let _ = old;
            for op in &change.sub_ops {
                let sql = match op {
                    SubOp::SetDefault { default, .. } => format!("ALTER DOMAIN {name} SET DEFAULT {default}"),
                    SubOp::DropDefault { .. } => format!("ALTER DOMAIN {name} DROP DEFAULT"),
                    SubOp::SetNotNull { .. } => format!("ALTER DOMAIN {name} SET NOT NULL"),
                    SubOp::DropNotNull { .. } => format!("ALTER DOMAIN {name} DROP NOT NULL"),
                    SubOp::AddCheck { name: cname, expression } => {
                        let constraint_name = cname
                            .as_ref()
                            .map(|n| format!("CONSTRAINT {} ", quote(n, config)))
                            .unwrap_or_default();
                        format!("ALTER DOMAIN {name} ADD {constraint_name}CHECK ({expression})")
                    }
                    SubOp::DropCheck { name: cname } => {
                        format!("ALTER DOMAIN {name} DROP CONSTRAINT {}", quote(cname, config))
                    }
                    SubOp::SetComment { text, .. } => render_comment_stmt("DOMAIN", &name, text),
                    _ => continue,
                };
                push(out, id, banner, sql);
            }
        }
    }
    Ok(())
}

fn render_domain_create(name: &str, d: &Domain) -> String {
    let mut s = format!("CREATE DOMAIN {name} AS {}", d.base_type);
    if let Some(default) = &d.default {
        s.push_str(&format!(" DEFAULT {default}"));
    }
    if d.not_null {
        s.push_str(" NOT NULL");
    }
    for check in &d.checks {
        let constraint_name = check
            .name
            .as_ref()
            .map(|n| format!("CONSTRAINT {n} "))
            .unwrap_or_default();
        s.push_str(&format!(" {constraint_name}CHECK ({})", check.expression));
    }
    s
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

fn render_sequence(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    let name = q_schema_name(&change.object.schema, &change.object.name, config);
    match change.kind {
        ChangeKind::Create => {
            let s = differ::find_sequence(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_sequence_create(&name, s, config));
        }
        ChangeKind::Drop => {
            push(out, id, banner, format!("DROP SEQUENCE {}{name}", if_exists(config)));
        }
        ChangeKind::Alter => {
            let _ = old;
            for op in &change.sub_ops {
                match op {
                    SubOp::AlterSequenceOptions {
                        increment,
                        min_value,
                        max_value,
                        cache,
                        cycle,
                    } => {
                        let mut clauses = Vec::new();
                        if let Some(i) = increment {
                            clauses.push(format!("INCREMENT BY {i}"));
                        }
                        if let Some(min) = min_value {
                            clauses.push(match min {
                                Some(v) => format!("MINVALUE {v}"),
                                None => "NO MINVALUE".to_string(),
                            });
                        }
                        if let Some(max) = max_value {
                            clauses.push(match max {
                                Some(v) => format!("MAXVALUE {v}"),
                                None => "NO MAXVALUE".to_string(),
                            });
                        }
                        if let Some(c) = cache {
                            clauses.push(format!("CACHE {c}"));
                        }
                        if let Some(cyc) = cycle {
                            clauses.push(if *cyc { "CYCLE".to_string() } else { "NO CYCLE".to_string() });
                        }
                        if !clauses.is_empty() {
                            push(out, id, banner, format!("ALTER SEQUENCE {name} {}", clauses.join(" ")));
                        }
                    }
                    SubOp::SetSequenceOwner { owner } => {
                        let owned_by = match owner {
                            Some((table, column)) => format!("{}.{}", q_name(table, config), quote(column, config)),
                            None => "NONE".to_string(),
                        };
                        push(out, id, banner, format!("ALTER SEQUENCE {name} OWNED BY {owned_by}"));
                    }
                    SubOp::SetComment { text, .. } => {
                        push(out, id, banner, render_comment_stmt("SEQUENCE", &name, text));
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn render_sequence_create(name: &str, s: &Sequence, config: &PlannerConfig) -> String {
    let mut stmt = format!("CREATE SEQUENCE {name} AS {} START WITH {} INCREMENT BY {}", s.data_type, s.start, s.increment);
    match s.min_value {
        Some(v) => stmt.push_str(&format!(" MINVALUE {v}")),
        None => stmt.push_str(" NO MINVALUE"),
    }
    match s.max_value {
        Some(v) => stmt.push_str(&format!(" MAXVALUE {v}")),
        None => stmt.push_str(" NO MAXVALUE"),
    }
    stmt.push_str(&format!(" CACHE {}", s.cache));
    if s.cycle {
        stmt.push_str(" CYCLE");
    }
    if let Some((table, column)) = &s.owned_by {
        stmt.push_str(&format!(" OWNED BY {}.{}", q_name(table, config), quote(column, config)));
    }
    stmt
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

fn render_table(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    match change.kind {
        ChangeKind::Create => {
            let table = differ::find_table(new, &change.object).ok_or_else(|| missing(&change.object))?;
            render_table_create(table, config, id, banner, out);
        }
        ChangeKind::Drop => {
            let name = q_schema_name(&change.object.schema, &change.object.name, config);
            push(out, id, banner, format!("DROP TABLE {}{name}", if_exists(config)));
        }
        ChangeKind::Alter => {
            let table = differ::find_table(new, &change.object).ok_or_else(|| missing(&change.object))?;
            let _ = old;
            render_table_alter(&change.object, table, &change.sub_ops, config, id, banner, out);
        }
    }
    Ok(())
}

fn render_table_create(table: &Table, config: &PlannerConfig, id: usize, banner: &GroupBanner, out: &mut Vec<StatementRecord>) {
    let name = q_name(&table.name, config);

    if let Some(parent_key) = &table.partition_of {
        let (schema, pname) = split_catalog_key(parent_key);
        let parent = q_schema_name(schema, pname, config);
        push(
            out,
            id,
            banner,
            // The bound expression isn't captured in the IR (no source for
            // `FOR VALUES ...`), so this clause is a placeholder a caller
            // must fill in by hand before running the script.
            format!("CREATE TABLE {}{name} PARTITION OF {parent} /* FOR VALUES ... */", if_not_exists(config)),
        );
    } else {
        let columns = table
            .columns
            .iter()
            .map(|c| render_column_def(c, config))
            .collect::<Vec<_>>()
            .join(",\n    ");
        let mut stmt = format!("CREATE TABLE {}{name} (\n    {columns}\n)", if_not_exists(config));
        if let Some(partition) = &table.partition {
            let strategy = match partition.strategy {
                crate::ir::PartitionStrategy::Range => "RANGE",
                crate::ir::PartitionStrategy::List => "LIST",
                crate::ir::PartitionStrategy::Hash => "HASH",
            };
            stmt.push_str(&format!(" PARTITION BY {strategy} ({})", cols_join(&partition.columns, config)));
        }
        push(out, id, banner, stmt);
    }

    if table.row_security_enabled {
        push(out, id, banner, format!("ALTER TABLE {name} ENABLE ROW LEVEL SECURITY"));
    }
    if table.row_security_forced {
        push(out, id, banner, format!("ALTER TABLE {name} FORCE ROW LEVEL SECURITY"));
    }
    if let Some(comment) = &table.comment {
        push(out, id, banner, render_comment_stmt("TABLE", &name, &Some(comment.clone())));
    }
    for column in &table.columns {
        if let Some(comment) = &column.comment {
            let target = format!("{name}.{}", quote(&column.name, config));
            push(out, id, banner, render_comment_stmt("COLUMN", &target, &Some(comment.clone())));
        }
    }
}

fn render_column_def(col: &Column, config: &PlannerConfig) -> String {
    let mut s = format!("{} {}", quote(&col.name, config), col.type_name);
    if !col.nullable {
        s.push_str(" NOT NULL");
    }
    match &col.generated {
        GeneratedKind::Stored(expr) => {
            s.push_str(&format!(" GENERATED ALWAYS AS ({expr}) STORED"));
            return s;
        }
        GeneratedKind::None => {}
    }
    match col.identity {
        IdentityKind::Always => {
            s.push_str(" GENERATED ALWAYS AS IDENTITY");
            return s;
        }
        IdentityKind::ByDefault => {
            s.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            return s;
        }
        IdentityKind::None => {}
    }
    if let Some(default) = &col.default {
        s.push_str(&format!(" DEFAULT {default}"));
    }
    s
}

fn split_catalog_key(key: &str) -> (&str, &str) {
    match key.split_once('.') {
        Some((s, n)) => (s, n),
        None => ("", key),
    }
}

fn render_table_alter(
    object: &ObjectRef,
    table: &Table,
    sub_ops: &[SubOp],
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) {
    let name = q_schema_name(&object.schema, &object.name, config);
    let mut clauses = Vec::new();
    let mut comment_stmts = Vec::new();

    for op in sub_ops {
        match op {
            SubOp::SetNotNull { column } if config.online => {
                // §4.3 / Open Question 1: setting NOT NULL on a populated
                // table takes a full table scan under an exclusive lock
                // unless preceded by a validated CHECK. The online-safe
                // sequence below gets the same end state one step at a
                // time: add the check unvalidated, validate it (a plain
                // read), flip NOT NULL (now cheap, Postgres trusts the
                // validated check), then drop the now-redundant check.
                let check_name = format!("{}_{}_not_null_chk", object.name, column);
                let col = quote(column, config);
                let check_name_q = quote(&check_name, config);
                push(
                    out,
                    id,
                    banner,
                    format!("ALTER TABLE {name} ADD CONSTRAINT {check_name_q} CHECK ({col} IS NOT NULL) NOT VALID"),
                );
                push(out, id, banner, format!("ALTER TABLE {name} VALIDATE CONSTRAINT {check_name_q}"));
                push(out, id, banner, format!("ALTER TABLE {name} ALTER COLUMN {col} SET NOT NULL"));
                push(out, id, banner, format!("ALTER TABLE {name} DROP CONSTRAINT {check_name_q}"));
            }
            SubOp::SetComment { column, text } => {
                let target = match column {
                    Some(c) => format!("{name}.{}", quote(c, config)),
                    None => name.clone(),
                };
                let keyword = if column.is_some() { "COLUMN" } else { "TABLE" };
                comment_stmts.push(render_comment_stmt(keyword, &target, text));
            }
            other => clauses.push(render_table_subop_clause(table, other, config)),
        }
    }

    if !clauses.is_empty() {
        push(out, id, banner, format!("ALTER TABLE {name}\n    {}", clauses.join(",\n    ")));
    }
    for stmt in comment_stmts {
        push(out, id, banner, stmt);
    }
}

fn render_table_subop_clause(table: &Table, op: &SubOp, config: &PlannerConfig) -> String {
    match op {
        SubOp::AddColumn {
            name,
            type_name,
            nullable,
            default,
        } => {
            let mut s = format!("ADD COLUMN {} {type_name}", quote(name, config));
            if !nullable {
                s.push_str(" NOT NULL");
            }
            if let Some(d) = default {
                s.push_str(&format!(" DEFAULT {d}"));
            }
            s
        }
        SubOp::DropColumn { name } => format!("DROP COLUMN {}", quote(name, config)),
        SubOp::SetType { column, new_type, using } => {
            let mut s = format!("ALTER COLUMN {} TYPE {new_type}", quote(column, config));
            if let Some(u) = using {
                s.push_str(&format!(" USING ({u})"));
            }
            s
        }
        SubOp::SetNotNull { column } => format!("ALTER COLUMN {} SET NOT NULL", quote(column, config)),
        SubOp::DropNotNull { column } => format!("ALTER COLUMN {} DROP NOT NULL", quote(column, config)),
        SubOp::SetDefault { column, default } => format!("ALTER COLUMN {} SET DEFAULT {default}", quote(column, config)),
        SubOp::DropDefault { column } => format!("ALTER COLUMN {} DROP DEFAULT", quote(column, config)),
        SubOp::SetIdentity { column, kind } => {
            let clause = match kind {
                IdentityKind::Always => "GENERATED ALWAYS AS IDENTITY",
                IdentityKind::ByDefault => "GENERATED BY DEFAULT AS IDENTITY",
                IdentityKind::None => "",
            };
            format!("ALTER COLUMN {} ADD {clause}", quote(column, config))
        }
        SubOp::DropIdentity { column } => format!("ALTER COLUMN {} DROP IDENTITY", quote(column, config)),
        SubOp::SetGenerated { column, expression } => {
            format!("ALTER COLUMN {} SET EXPRESSION AS ({expression})", quote(column, config))
        }
        SubOp::DropGenerated { column } => format!("ALTER COLUMN {} DROP EXPRESSION", quote(column, config)),
        SubOp::AttachPartition { child } => {
            let (schema, name) = split_catalog_key(child);
            format!(
                "ATTACH PARTITION {} /* FOR VALUES ... */",
                q_schema_name(schema, name, config)
            )
        }
        SubOp::EnableRowSecurity => "ENABLE ROW LEVEL SECURITY".to_string(),
        SubOp::DisableRowSecurity => "DISABLE ROW LEVEL SECURITY".to_string(),
        SubOp::ForceRowSecurity => "FORCE ROW LEVEL SECURITY".to_string(),
        SubOp::NoForceRowSecurity => "NO FORCE ROW LEVEL SECURITY".to_string(),
        _ => {
            let _ = table;
            String::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints (always owned by a table; Create/Drop at the Differ stage,
// Alter only ever synthesized by `expand_for_online`).
// ---------------------------------------------------------------------------

fn render_constraint(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    let owner_key = change.object.qualifier.as_deref().unwrap_or_default();
    let (schema, table_name) = split_catalog_key(owner_key);
    let owner = q_schema_name(schema, table_name, config);

    match change.kind {
        ChangeKind::Create => {
            let (_, constraint) = differ::find_constraint(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(
                out,
                id,
                banner,
                format!("ALTER TABLE {owner} ADD {}", render_constraint_def(constraint, config)),
            );
        }
        ChangeKind::Drop => {
            let (_, constraint) = differ::find_constraint(old, &change.object).ok_or_else(|| missing(&change.object))?;
            let cname = constraint.name.clone().unwrap_or_else(|| change.object.name.clone());
            push(
                out,
                id,
                banner,
                format!("ALTER TABLE {owner} DROP CONSTRAINT {}{}", if_exists(config), quote(&cname, config)),
            );
        }
        ChangeKind::Alter => {
            for op in &change.sub_ops {
                match op {
                    SubOp::AddConstraint { constraint } => {
                        push(
                            out,
                            id,
                            banner,
                            format!("ALTER TABLE {owner} ADD {}", render_constraint_def(constraint, config)),
                        );
                    }
                    SubOp::ValidateConstraint { name } => {
                        push(out, id, banner, format!("ALTER TABLE {owner} VALIDATE CONSTRAINT {}", quote(name, config)));
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn render_constraint_def(c: &Constraint, config: &PlannerConfig) -> String {
    let name_part = c
        .name
        .as_ref()
        .map(|n| format!("CONSTRAINT {} ", quote(n, config)))
        .unwrap_or_default();
    let body = match &c.kind {
        ConstraintKind::PrimaryKey { columns } => format!("PRIMARY KEY ({})", cols_join(columns, config)),
        ConstraintKind::Unique { columns } => format!("UNIQUE ({})", cols_join(columns, config)),
        ConstraintKind::ForeignKey {
            columns,
            ref_table,
            ref_columns,
            on_update,
            on_delete,
            match_kind,
            deferrable,
            initially_deferred,
        } => {
            let mut s = format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                cols_join(columns, config),
                q_name(ref_table, config),
                cols_join(ref_columns, config)
            );
            s.push_str(match match_kind {
                FkMatch::Simple => "",
                FkMatch::Full => " MATCH FULL",
                FkMatch::Partial => " MATCH PARTIAL",
            });
            if !matches!(on_update, FkAction::NoAction) {
                s.push_str(&format!(" ON UPDATE {}", fk_action_label(*on_update)));
            }
            if !matches!(on_delete, FkAction::NoAction) {
                s.push_str(&format!(" ON DELETE {}", fk_action_label(*on_delete)));
            }
            if *deferrable {
                s.push_str(" DEFERRABLE");
                s.push_str(if *initially_deferred { " INITIALLY DEFERRED" } else { " INITIALLY IMMEDIATE" });
            }
            s
        }
        ConstraintKind::Check { expression } => format!("CHECK ({expression})"),
        ConstraintKind::Exclude { method, elements, predicate } => {
            let els = elements
                .iter()
                .map(|e| render_exclude_element(e, config))
                .collect::<Vec<_>>()
                .join(", ");
            let mut s = format!("EXCLUDE USING {method} ({els})");
            if let Some(p) = predicate {
                s.push_str(&format!(" WHERE ({p})"));
            }
            s
        }
    };
    let mut stmt = format!("{name_part}{body}");
    if c.not_valid && matches!(c.kind, ConstraintKind::Check { .. } | ConstraintKind::ForeignKey { .. }) {
        stmt.push_str(" NOT VALID");
    }
    stmt
}

fn render_exclude_element(e: &ExcludeElement, config: &PlannerConfig) -> String {
    let target = match (&e.column, &e.expression) {
        (Some(c), _) => quote(c, config),
        (None, Some(expr)) => format!("({expr})"),
        (None, None) => String::new(),
    };
    format!("{target} WITH {}", e.operator)
}

fn fk_action_label(a: FkAction) -> &'static str {
    match a {
        FkAction::NoAction => "NO ACTION",
        FkAction::Restrict => "RESTRICT",
        FkAction::Cascade => "CASCADE",
        FkAction::SetNull => "SET NULL",
        FkAction::SetDefault => "SET DEFAULT",
    }
}

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

fn render_index(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    let owner_key = change.object.qualifier.as_deref().unwrap_or_default();
    let (schema, owner_name) = split_catalog_key(owner_key);
    let owner = q_schema_name(schema, owner_name, config);

    match change.kind {
        ChangeKind::Create => {
            let index = differ::find_index(new, &change.object).ok_or_else(|| missing(&change.object))?;
            let concurrently = index.concurrent;
            let sql = render_index_create_stmt(&owner, index, config, concurrently);
            if concurrently {
                push_nontransactional(out, id, banner, sql, Some(wait_stanza_for_index(&owner)));
            } else {
                push(out, id, banner, sql);
            }
        }
        ChangeKind::Drop => {
            let concurrently = config.online;
            let name = quote(&change.object.name, config);
            let sql = if concurrently {
                format!("DROP INDEX CONCURRENTLY {}{name}", if_exists(config))
            } else {
                format!("DROP INDEX {}{name}", if_exists(config))
            };
            if concurrently {
                push_nontransactional(out, id, banner, sql, None);
            } else {
                push(out, id, banner, sql);
            }
        }
        ChangeKind::Alter => {
            let _ = old;
            for op in &change.sub_ops {
                match op {
                    SubOp::CreateIndexConcurrently { index } => {
                        let sql = render_index_create_stmt(&owner, index, config, true);
                        push_nontransactional(out, id, banner, sql, Some(wait_stanza_for_index(&owner)));
                    }
                    SubOp::ReplaceIndex { old_name, new_index } => {
                        let staging_name = format!("{}_pgschema_new", new_index.name);
                        let mut staging = new_index.clone();
                        staging.name = staging_name.clone();
                        let create_sql = render_index_create_stmt(&owner, &staging, config, true);
                        push_nontransactional(out, id, banner, create_sql, Some(wait_stanza_for_index(&owner)));
                        push_nontransactional(
                            out,
                            id,
                            banner,
                            format!("DROP INDEX CONCURRENTLY {}{}", if_exists(config), quote(old_name, config)),
                            None,
                        );
                        push(
                            out,
                            id,
                            banner,
                            format!(
                                "ALTER INDEX {} RENAME TO {}",
                                quote(&staging_name, config),
                                quote(&new_index.name, config)
                            ),
                        );
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn render_index_create_stmt(owner: &str, index: &Index, config: &PlannerConfig, concurrently: bool) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    let concur = if concurrently { "CONCURRENTLY " } else { "" };
    let keys = index
        .entries
        .iter()
        .map(|k| render_index_key(k, config))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = format!(
        "CREATE {unique}INDEX {concur}{}{} ON {owner} USING {} ({keys})",
        if_not_exists(config),
        quote(&index.name, config),
        index.method
    );
    if !index.include.is_empty() {
        stmt.push_str(&format!(" INCLUDE ({})", cols_join(&index.include, config)));
    }
    if let Some(pred) = &index.predicate {
        stmt.push_str(&format!(" WHERE ({pred})"));
    }
    stmt
}

fn render_index_key(key: &IndexKey, config: &PlannerConfig) -> String {
    match key {
        IndexKey::Column {
            name,
            collation,
            opclass,
            sort,
            nulls,
        } => {
            let mut s = quote(name, config);
            if let Some(c) = collation {
                s.push_str(&format!(" COLLATE {}", quote(c, config)));
            }
            if let Some(op) = opclass {
                s.push_str(&format!(" {op}"));
            }
            s.push_str(&format!(" {}", sort_label(*sort)));
            s.push_str(&format!(" {}", nulls_label(*nulls)));
            s
        }
        IndexKey::Expression { text, sort, nulls, .. } => {
            format!("({text}) {} {}", sort_label(*sort), nulls_label(*nulls))
        }
    }
}

fn sort_label(sort: SortDirection) -> &'static str {
    match sort {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    }
}

fn nulls_label(nulls: NullsOrder) -> &'static str {
    match nulls {
        NullsOrder::First => "NULLS FIRST",
        NullsOrder::Last => "NULLS LAST",
    }
}

// ---------------------------------------------------------------------------
// Functions / procedures
// ---------------------------------------------------------------------------

fn render_routine(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    match change.kind {
        ChangeKind::Create => {
            let r = differ::find_routine(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_routine_def(r, config, false));
            if let Some(comment) = &r.comment {
                push(
                    out,
                    id,
                    banner,
                    render_comment_stmt(routine_keyword(r), &q_routine_signature(r, config), &Some(comment.clone())),
                );
            }
        }
        ChangeKind::Drop => {
            let r = differ::find_routine(old, &change.object).ok_or_else(|| missing(&change.object))?;
            push(
                out,
                id,
                banner,
                format!(
                    "DROP {} {}{}",
                    routine_keyword(r),
                    if_exists(config),
                    q_routine_signature(r, config)
                ),
            );
        }
        ChangeKind::Alter => {
            let r = differ::find_routine(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_routine_def(r, config, true));
            if let Some(comment) = &r.comment {
                push(
                    out,
                    id,
                    banner,
                    render_comment_stmt(routine_keyword(r), &q_routine_signature(r, config), &Some(comment.clone())),
                );
            }
        }
    }
    Ok(())
}

fn routine_keyword(r: &Routine) -> &'static str {
    match r.kind {
        RoutineKind::Function => "FUNCTION",
        RoutineKind::Procedure => "PROCEDURE",
    }
}

fn q_routine_signature(r: &Routine, config: &PlannerConfig) -> String {
    let args = r
        .args
        .iter()
        .filter(|a| matches!(a.mode, ArgMode::In | ArgMode::InOut | ArgMode::Variadic))
        .map(|a| a.type_name.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({args})", q_name(&r.name, config))
}

fn render_routine_def(r: &Routine, config: &PlannerConfig, replace: bool) -> String {
    let or_replace = if replace { "OR REPLACE " } else { "" };
    let args = r
        .args
        .iter()
        .map(|a| render_argument(a, config))
        .collect::<Vec<_>>()
        .join(", ");
    let mut s = format!("CREATE {or_replace}{} {}({args})", routine_keyword(r), q_name(&r.name, config));
    if let Some(returns) = &r.returns {
        s.push_str(&format!(" RETURNS {}", render_return_type(returns, config)));
    }
    s.push_str(&format!(" LANGUAGE {}", r.language));
    s.push_str(match r.volatility {
        crate::ir::Volatility::Volatile => " VOLATILE",
        crate::ir::Volatility::Stable => " STABLE",
        crate::ir::Volatility::Immutable => " IMMUTABLE",
    });
    if r.strict {
        s.push_str(" STRICT");
    }
    s.push_str(match r.security {
        crate::ir::Security::Invoker => " SECURITY INVOKER",
        crate::ir::Security::Definer => " SECURITY DEFINER",
    });
    s.push_str(match r.parallel {
        crate::ir::Parallelism::Unsafe => " PARALLEL UNSAFE",
        crate::ir::Parallelism::Restricted => " PARALLEL RESTRICTED",
        crate::ir::Parallelism::Safe => " PARALLEL SAFE",
    });
    if r.leakproof {
        s.push_str(" LEAKPROOF");
    }
    for (setting, value) in &r.set_clauses {
        s.push_str(&format!(" SET {setting} = {value}"));
    }
    s.push_str(&format!(" AS $pgschema$\n{}\n$pgschema$", r.body));
    s
}

fn render_argument(a: &crate::ir::Argument, config: &PlannerConfig) -> String {
    let mode = match a.mode {
        ArgMode::In => "",
        ArgMode::Out => "OUT ",
        ArgMode::InOut => "INOUT ",
        ArgMode::Variadic => "VARIADIC ",
    };
    let name = a.name.as_ref().map(|n| format!("{} ", quote(n, config))).unwrap_or_default();
    let mut s = format!("{mode}{name}{}", a.type_name);
    if let Some(default) = &a.default {
        s.push_str(&format!(" DEFAULT {default}"));
    }
    s
}

fn render_return_type(r: &ReturnType, config: &PlannerConfig) -> String {
    match r {
        ReturnType::Scalar(t) => t.to_string(),
        ReturnType::SetOf(t) => format!("SETOF {t}"),
        ReturnType::Table(cols) => {
            let cols = cols
                .iter()
                .map(|(n, t)| format!("{} {t}", quote(n, config)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("TABLE ({cols})")
        }
    }
}

// ---------------------------------------------------------------------------
// Views / materialized views
// ---------------------------------------------------------------------------

fn render_view(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    let name = q_schema_name(&change.object.schema, &change.object.name, config);
    match change.kind {
        ChangeKind::Create => {
            let v = differ::find_view(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, format!("CREATE VIEW {name} AS\n{}", v.definition.select_text));
            render_view_comments(&name, v.comment.as_deref(), &v.column_comments, &name, config, id, banner, out);
        }
        ChangeKind::Drop => {
            push(out, id, banner, format!("DROP VIEW {}{name}", if_exists(config)));
        }
        ChangeKind::Alter => {
            let v = differ::find_view(new, &change.object).ok_or_else(|| missing(&change.object))?;
            let _ = old;
            push(out, id, banner, format!("CREATE OR REPLACE VIEW {name} AS\n{}", v.definition.select_text));
            render_view_comments(&name, v.comment.as_deref(), &v.column_comments, &name, config, id, banner, out);
        }
    }
    Ok(())
}

fn render_view_comments(
    object_name: &str,
    comment: Option<&str>,
    column_comments: &[(String, String)],
    qualified_name: &str,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) {
    let _ = object_name;
    if let Some(c) = comment {
        push(out, id, banner, render_comment_stmt("VIEW", qualified_name, &Some(c.to_string())));
    }
    for (column, text) in column_comments {
        let target = format!("{qualified_name}.{}", quote(column, config));
        push(out, id, banner, render_comment_stmt("COLUMN", &target, &Some(text.clone())));
    }
}

fn render_matview(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    let name = q_schema_name(&change.object.schema, &change.object.name, config);
    match change.kind {
        ChangeKind::Create => {
            let mv = differ::find_materialized_view(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, format!("CREATE MATERIALIZED VIEW {name} AS\n{}", mv.definition.select_text));
            for index in &mv.indexes {
                push(out, id, banner, render_index_create_stmt(&name, index, config, false));
            }
            render_view_comments(&name, mv.comment.as_deref(), &mv.column_comments, &name, config, id, banner, out);
        }
        ChangeKind::Drop => {
            push(out, id, banner, format!("DROP MATERIALIZED VIEW {}{name}", if_exists(config)));
        }
        ChangeKind::Alter => {
            let mv = differ::find_materialized_view(new, &change.object).ok_or_else(|| missing(&change.object))?;
            let _ = old;
            render_view_comments(&name, mv.comment.as_deref(), &mv.column_comments, &name, config, id, banner, out);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

fn render_trigger(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    match change.kind {
        ChangeKind::Create | ChangeKind::Alter => {
            let (_, t) = differ::find_trigger(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_trigger_create(t, config));
        }
        ChangeKind::Drop => {
            let (table, t) = differ::find_trigger(old, &change.object).ok_or_else(|| missing(&change.object))?;
            let table_name = q_name(&table.name, config);
            push(
                out,
                id,
                banner,
                format!("DROP TRIGGER {}{} ON {table_name}", if_exists(config), quote(&t.name, config)),
            );
        }
    }
    Ok(())
}

fn render_trigger_create(t: &Trigger, config: &PlannerConfig) -> String {
    let keyword = if t.constraint_trigger { "CONSTRAINT TRIGGER" } else { "TRIGGER" };
    let timing = match t.timing {
        TriggerTiming::Before => "BEFORE",
        TriggerTiming::After => "AFTER",
        TriggerTiming::InsteadOf => "INSTEAD OF",
    };
    let events = t
        .events
        .iter()
        .map(|e| match e {
            TriggerEvent::Insert => "INSERT".to_string(),
            TriggerEvent::Update(cols) if cols.is_empty() => "UPDATE".to_string(),
            TriggerEvent::Update(cols) => format!("UPDATE OF {}", cols_join(cols, config)),
            TriggerEvent::Delete => "DELETE".to_string(),
            TriggerEvent::Truncate => "TRUNCATE".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" OR ");
    let table_name = q_name(&t.table, config);
    let mut s = format!(
        "CREATE {keyword} {} {timing} {events} ON {table_name}",
        quote(&t.name, config)
    );
    if t.deferrable {
        s.push_str(" DEFERRABLE");
        s.push_str(if t.initially_deferred { " INITIALLY DEFERRED" } else { " INITIALLY IMMEDIATE" });
    }
    let referencing = match (&t.transition_old, &t.transition_new) {
        (None, None) => String::new(),
        (old, new) => {
            let mut parts = Vec::new();
            if let Some(o) = old {
                parts.push(format!("OLD TABLE AS {o}"));
            }
            if let Some(n) = new {
                parts.push(format!("NEW TABLE AS {n}"));
            }
            format!(" REFERENCING {}", parts.join(" "))
        }
    };
    s.push_str(&referencing);
    let granularity = match t.granularity {
        TriggerGranularity::Row => "ROW",
        TriggerGranularity::Statement => "STATEMENT",
    };
    s.push_str(&format!(" FOR EACH {granularity}"));
    if let Some(pred) = &t.when_predicate {
        s.push_str(&format!(" WHEN ({pred})"));
    }
    let args = t.function_args.join(", ");
    s.push_str(&format!(" EXECUTE FUNCTION {}({args})", q_name(&t.function, config)));
    s
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

fn render_policy(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    match change.kind {
        ChangeKind::Create | ChangeKind::Alter => {
            let (table, p) = differ::find_policy(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_policy_create(table, p, config));
        }
        ChangeKind::Drop => {
            let (table, p) = differ::find_policy(old, &change.object).ok_or_else(|| missing(&change.object))?;
            let table_name = q_name(&table.name, config);
            push(
                out,
                id,
                banner,
                format!("DROP POLICY {}{} ON {table_name}", if_exists(config), quote(&p.name, config)),
            );
        }
    }
    Ok(())
}

fn render_policy_create(table: &Table, p: &Policy, config: &PlannerConfig) -> String {
    let table_name = q_name(&table.name, config);
    let permissive = if p.permissive { "PERMISSIVE" } else { "RESTRICTIVE" };
    let command = match p.command {
        PolicyCommand::All => "ALL",
        PolicyCommand::Select => "SELECT",
        PolicyCommand::Insert => "INSERT",
        PolicyCommand::Update => "UPDATE",
        PolicyCommand::Delete => "DELETE",
    };
    let roles = if p.roles.is_empty() {
        "PUBLIC".to_string()
    } else {
        p.roles.iter().map(|r| quote(r, config)).collect::<Vec<_>>().join(", ")
    };
    let mut s = format!(
        "CREATE POLICY {} ON {table_name} AS {permissive} FOR {command} TO {roles}",
        quote(&p.name, config)
    );
    if let Some(using) = &p.using {
        s.push_str(&format!(" USING ({using})"));
    }
    if let Some(check) = &p.with_check {
        s.push_str(&format!(" WITH CHECK ({check})"));
    }
    s
}

// ---------------------------------------------------------------------------
// Privileges / default privileges
// ---------------------------------------------------------------------------

fn grant_target_keyword(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Sequence => "SEQUENCE",
        ObjectKind::Function => "FUNCTION",
        ObjectKind::Procedure => "PROCEDURE",
        ObjectKind::Schema => "SCHEMA",
        ObjectKind::Type | ObjectKind::Domain => "TYPE",
        _ => "TABLE",
    }
}

fn render_privilege(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    match change.kind {
        ChangeKind::Create => {
            let p = differ::find_privilege(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_grant(p, config));
        }
        ChangeKind::Drop => {
            let p = differ::find_privilege(old, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_revoke(p, config));
        }
        ChangeKind::Alter => {}
    }
    Ok(())
}

fn render_grant(p: &Privilege, config: &PlannerConfig) -> String {
    let target = q_schema_name(&p.object.schema, &p.object.name, config);
    let keyword = grant_target_keyword(p.object.kind);
    let cols = p
        .columns
        .as_ref()
        .map(|c| format!(" ({})", cols_join(c, config)))
        .unwrap_or_default();
    let mut s = format!("GRANT {}{cols} ON {keyword} {target} TO {}", p.privilege.label(), quote(&p.grantee, config));
    if p.with_grant_option {
        s.push_str(" WITH GRANT OPTION");
    }
    s
}

fn render_revoke(p: &Privilege, config: &PlannerConfig) -> String {
    let target = q_schema_name(&p.object.schema, &p.object.name, config);
    let keyword = grant_target_keyword(p.object.kind);
    let cols = p
        .columns
        .as_ref()
        .map(|c| format!(" ({})", cols_join(c, config)))
        .unwrap_or_default();
    format!("REVOKE {}{cols} ON {keyword} {target} FROM {}", p.privilege.label(), quote(&p.grantee, config))
}

fn render_default_privilege(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    match change.kind {
        ChangeKind::Create => {
            let dp = differ::find_default_privilege(new, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_default_grant(dp, config));
        }
        ChangeKind::Drop => {
            let dp = differ::find_default_privilege(old, &change.object).ok_or_else(|| missing(&change.object))?;
            push(out, id, banner, render_default_revoke(dp, config));
        }
        ChangeKind::Alter => {}
    }
    Ok(())
}

fn default_privilege_object_label(t: DefaultPrivilegeObjectType) -> &'static str {
    match t {
        DefaultPrivilegeObjectType::Tables => "TABLES",
        DefaultPrivilegeObjectType::Sequences => "SEQUENCES",
        DefaultPrivilegeObjectType::Functions => "FUNCTIONS",
        DefaultPrivilegeObjectType::Types => "TYPES",
        DefaultPrivilegeObjectType::Schemas => "SCHEMAS",
    }
}

fn render_default_grant(dp: &DefaultPrivilege, config: &PlannerConfig) -> String {
    let privs = dp.privileges.iter().map(|p| p.label()).collect::<Vec<_>>().join(", ");
    let mut s = format!(
        "ALTER DEFAULT PRIVILEGES FOR ROLE {} IN SCHEMA {} GRANT {privs} ON {} TO {}",
        quote(&dp.grantor, config),
        quote(&dp.schema, config),
        default_privilege_object_label(dp.object_type),
        quote(&dp.grantee, config)
    );
    if dp.with_grant_option {
        s.push_str(" WITH GRANT OPTION");
    }
    s
}

fn render_default_revoke(dp: &DefaultPrivilege, config: &PlannerConfig) -> String {
    let privs = dp.privileges.iter().map(|p| p.label()).collect::<Vec<_>>().join(", ");
    format!(
        "ALTER DEFAULT PRIVILEGES FOR ROLE {} IN SCHEMA {} REVOKE {privs} ON {} FROM {}",
        quote(&dp.grantor, config),
        quote(&dp.schema, config),
        default_privilege_object_label(dp.object_type),
        quote(&dp.grantee, config)
    )
}

// ---------------------------------------------------------------------------
// Standalone comments (objects with no inline comment field, e.g. extensions)
// ---------------------------------------------------------------------------

fn render_comment(
    change: &ChangeRecord,
    old: &Ir,
    new: &Ir,
    config: &PlannerConfig,
    id: usize,
    banner: &GroupBanner,
    out: &mut Vec<StatementRecord>,
) -> PlanResult<()> {
    let comment_keyword = |k: ObjectKind| -> &'static str {
        match k {
            ObjectKind::Schema => "SCHEMA",
            ObjectKind::Extension => "EXTENSION",
            ObjectKind::Domain => "DOMAIN",
            ObjectKind::Sequence => "SEQUENCE",
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
            ObjectKind::MaterializedView => "MATERIALIZED VIEW",
            ObjectKind::Type => "TYPE",
            ObjectKind::Index => "INDEX",
            _ => "TABLE",
        }
    };
    match change.kind {
        ChangeKind::Create | ChangeKind::Alter => {
            let c = differ::find_comment(new, &change.object).ok_or_else(|| missing(&change.object))?;
            let target = q_schema_name(&c.object.schema, &c.object.name, config);
            push(out, id, banner, render_comment_stmt(comment_keyword(c.object.kind), &target, &Some(c.text.clone())));
        }
        ChangeKind::Drop => {
            let c = differ::find_comment(old, &change.object).ok_or_else(|| missing(&change.object))?;
            let target = q_schema_name(&c.object.schema, &c.object.name, config);
            push(out, id, banner, render_comment_stmt(comment_keyword(c.object.kind), &target, &None));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::IrBuilder;

    #[test]
    fn table_create_renders_columns_and_omits_constraints() {
        let new = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false).pk(&["id"]);
            })
            .build();
        let table = differ::find_table(&new, &ObjectRef::new(ObjectKind::Table, "public", "orders")).unwrap();
        let mut out = Vec::new();
        let banner = banner_for(&ObjectRef::new(ObjectKind::Table, "public", "orders"));
        render_table_create(table, &PlannerConfig::default(), 0, &banner, &mut out);
        assert!(out[0].sql.starts_with("CREATE TABLE orders"));
        assert!(!out[0].sql.contains("PRIMARY KEY"));
    }

    #[test]
    fn online_mode_splits_check_constraint_into_not_valid_and_validate() {
        let new = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false).check("chk", "id > 0");
            })
            .build();
        let old = Ir::new();
        let changes = differ::diff(&old, &new);
        let config = PlannerConfig {
            online: true,
            transactional: false,
            ..PlannerConfig::default()
        };
        let expanded = expand_for_online(changes, &new, &config);
        let constraint_change = expanded
            .iter()
            .find(|c| c.object.kind == ObjectKind::Constraint)
            .expect("constraint change");
        assert_eq!(constraint_change.kind, ChangeKind::Alter);
        assert!(matches!(constraint_change.sub_ops[0], SubOp::AddConstraint { .. }));
        assert!(matches!(constraint_change.sub_ops[1], SubOp::ValidateConstraint { .. }));
    }

    #[test]
    fn online_mode_rewrites_index_create_as_concurrent() {
        let new = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false).index("idx_id", &["id"], false);
            })
            .build();
        let old = Ir::new();
        let changes = differ::diff(&old, &new);
        let config = PlannerConfig {
            online: true,
            transactional: false,
            ..PlannerConfig::default()
        };
        let expanded = expand_for_online(changes, &new, &config);
        let index_change = expanded.iter().find(|c| c.object.kind == ObjectKind::Index).expect("index change");
        assert!(matches!(index_change.sub_ops.first(), Some(SubOp::CreateIndexConcurrently { .. })));
        let rendered = render(expanded, &old, &new, &config).unwrap();
        let stmt = rendered.iter().find(|s| s.sql.contains("CREATE INDEX")).unwrap();
        assert!(stmt.sql.contains("CONCURRENTLY"));
        assert!(!stmt.transactional);
        assert!(stmt.wait_stanza.is_some());
    }

    #[test]
    fn grant_renders_with_grant_option() {
        let p = Privilege {
            grantee: "app".to_string(),
            object: ObjectRef::new(ObjectKind::Table, "public", "orders"),
            privilege: PrivilegeKind::Select,
            with_grant_option: true,
            columns: None,
        };
        let sql = render_grant(&p, &PlannerConfig::default());
        assert_eq!(sql, "GRANT SELECT ON TABLE orders TO app WITH GRANT OPTION");
    }
}
