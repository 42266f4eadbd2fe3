//! The Differ (§4.2) — second pipeline stage.
//!
//! Compares two normalized [`Ir`] snapshots and produces a flat, unordered
//! set of [`ChangeRecord`]s. The differ never decides *order* (that is the
//! dependency graph's job, §4.4) and never renders SQL (that is the
//! Emitter's job, §4.3) — it only classifies, per object kind, what
//! changed and how.
//!
//! Every object kind that carries its own DDL identity (tables, indexes,
//! constraints, triggers, policies, routines, views, domains, types,
//! sequences, privileges, default privileges, comments) is diffed
//! independently here, keyed by its own catalog key — this is what lets
//! the dependency graph treat a constraint add and its owning table's
//! column add as two separate, independently orderable nodes.

use std::collections::BTreeSet;

use crate::change::{ChangeKind, ChangeRecord, SubOp};
use crate::ir::{
    Column, Constraint, DefaultPrivilege, Index, Ir, ObjectKind, ObjectRef, Policy, Privilege,
    Routine, RoutineKind, Sequence, Table, Trigger, TypeKind,
};

/// Compare `old` and `new` (both already normalized) and return every
/// detected change, unordered. `Alter` records with no sub-ops are never
/// produced — an object with no detected difference is simply absent from
/// the result.
pub fn diff(old: &Ir, new: &Ir) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    diff_schemas(old, new, &mut changes);
    diff_tables(old, new, &mut changes);
    diff_views(old, new, &mut changes);
    diff_materialized_views(old, new, &mut changes);
    diff_routines(old, new, &mut changes);
    diff_domains(old, new, &mut changes);
    diff_types(old, new, &mut changes);
    diff_sequences(old, new, &mut changes);
    diff_privileges(old, new, &mut changes);
    diff_default_privileges(old, new, &mut changes);
    diff_standalone_comments(old, new, &mut changes);
    changes
}

/// Every key present in `old`, `new`, or both, in a deterministic order
/// (catalog keys are compared lexically — the dependency graph is what
/// imposes the final, semantically-ordered layering; this just makes the
/// differ's own iteration order reproducible for debugging).
fn union_keys<'a, V>(
    old: &'a std::collections::BTreeMap<String, V>,
    new: &'a std::collections::BTreeMap<String, V>,
) -> BTreeSet<&'a str> {
    old.keys().chain(new.keys()).map(String::as_str).collect()
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

fn diff_schemas(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    let old_names: BTreeSet<&str> = old.schemas.iter().map(|s| s.name.as_str()).collect();
    let new_names: BTreeSet<&str> = new.schemas.iter().map(|s| s.name.as_str()).collect();
    for name in new_names.difference(&old_names) {
        out.push(ChangeRecord::create(ObjectRef::new(ObjectKind::Schema, name, name)));
    }
    for name in old_names.difference(&new_names) {
        out.push(ChangeRecord::drop(ObjectRef::new(ObjectKind::Schema, name, name)));
    }
    for name in old_names.intersection(&new_names) {
        let old_comment = old.schemas.iter().find(|s| s.name == *name).and_then(|s| s.comment.as_deref());
        let new_comment = new.schemas.iter().find(|s| s.name == *name).and_then(|s| s.comment.as_deref());
        if old_comment != new_comment {
            out.push(ChangeRecord::alter(
                ObjectRef::new(ObjectKind::Schema, name, name),
                vec![SubOp::SetComment {
                    column: None,
                    text: new_comment.map(str::to_string),
                }],
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Tables: the table object itself (columns + RLS), plus its constraints,
// indexes, triggers, and policies as independent top-level objects.
// ---------------------------------------------------------------------------

fn diff_tables(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    for key in union_keys(&old.tables, &new.tables) {
        match (old.tables.get(key), new.tables.get(key)) {
            (None, Some(new_table)) => {
                out.push(ChangeRecord::create(table_ref(new_table)));
                // Constraints/indexes/triggers/policies on a brand-new
                // table are still independent Create records — the
                // dependency graph orders them after the table's own
                // create via the referential edges in §4.4.
                for c in &new_table.constraints {
                    out.push(ChangeRecord::create(constraint_ref(new_table, c)));
                }
                for i in &new_table.indexes {
                    out.push(ChangeRecord::create(index_ref(new_table, i)));
                }
                for t in &new_table.triggers {
                    out.push(ChangeRecord::create(trigger_ref(new_table, t)));
                }
                for p in &new_table.policies {
                    out.push(ChangeRecord::create(policy_ref(new_table, p)));
                }
            }
            (Some(old_table), None) => {
                for p in &old_table.policies {
                    out.push(ChangeRecord::drop(policy_ref(old_table, p)));
                }
                for t in &old_table.triggers {
                    out.push(ChangeRecord::drop(trigger_ref(old_table, t)));
                }
                for i in &old_table.indexes {
                    out.push(ChangeRecord::drop(index_ref(old_table, i)));
                }
                for c in &old_table.constraints {
                    out.push(ChangeRecord::drop(constraint_ref(old_table, c)));
                }
                out.push(ChangeRecord::drop(table_ref(old_table)));
            }
            (Some(old_table), Some(new_table)) => {
                diff_table_alter(old_table, new_table, out);
                diff_constraints(old_table, new_table, out);
                diff_indexes(old_table, new_table, out);
                diff_triggers(old_table, new_table, out);
                diff_policies(old_table, new_table, out);
            }
            (None, None) => unreachable!("key came from the union of both maps"),
        }
    }
}

fn table_ref(table: &Table) -> ObjectRef {
    ObjectRef::new(
        ObjectKind::Table,
        table.name.schema.clone().unwrap_or_default(),
        table.name.name.clone(),
    )
}

fn diff_table_alter(old: &Table, new: &Table, out: &mut Vec<ChangeRecord>) {
    let mut sub_ops = Vec::new();

    let old_cols: std::collections::HashMap<&str, &Column> =
        old.columns.iter().map(|c| (c.name.as_str(), c)).collect();
    let new_cols: std::collections::HashMap<&str, &Column> =
        new.columns.iter().map(|c| (c.name.as_str(), c)).collect();

    for col in &new.columns {
        if !old_cols.contains_key(col.name.as_str()) {
            sub_ops.push(SubOp::AddColumn {
                name: col.name.clone(),
                type_name: col.type_name.clone(),
                nullable: col.nullable,
                default: col.default.clone(),
            });
        }
    }
    for col in &old.columns {
        if !new_cols.contains_key(col.name.as_str()) {
            sub_ops.push(SubOp::DropColumn { name: col.name.clone() });
        }
    }
    for new_col in &new.columns {
        let Some(old_col) = old_cols.get(new_col.name.as_str()) else {
            continue;
        };
        diff_column(old_col, new_col, &mut sub_ops);
    }

    if old.row_security_enabled != new.row_security_enabled {
        sub_ops.push(if new.row_security_enabled {
            SubOp::EnableRowSecurity
        } else {
            SubOp::DisableRowSecurity
        });
    }
    if old.row_security_forced != new.row_security_forced {
        sub_ops.push(if new.row_security_forced {
            SubOp::ForceRowSecurity
        } else {
            SubOp::NoForceRowSecurity
        });
    }
    if old.comment != new.comment {
        sub_ops.push(SubOp::SetComment { column: None, text: new.comment.clone() });
    }

    sub_ops.sort_by_key(|op| (op.rank(), sub_op_column_name(op).map(str::to_string)));

    if !sub_ops.is_empty() {
        out.push(ChangeRecord::alter(table_ref(new), sub_ops));
    }
}

fn sub_op_column_name(op: &SubOp) -> Option<&str> {
    match op {
        SubOp::AddColumn { name, .. }
        | SubOp::DropColumn { name }
        | SubOp::SetType { column: name, .. }
        | SubOp::SetNotNull { column: name }
        | SubOp::DropNotNull { column: name }
        | SubOp::SetDefault { column: name, .. }
        | SubOp::DropDefault { column: name }
        | SubOp::SetIdentity { column: name, .. }
        | SubOp::DropIdentity { column: name }
        | SubOp::SetGenerated { column: name, .. }
        | SubOp::DropGenerated { column: name } => Some(name),
        SubOp::SetComment { column, .. } => column.as_deref(),
        _ => None,
    }
}

fn diff_column(old: &Column, new: &Column, sub_ops: &mut Vec<SubOp>) {
    if old.type_name != new.type_name {
        sub_ops.push(SubOp::SetType {
            column: new.name.clone(),
            new_type: new.type_name.clone(),
            using: None,
        });
    }
    if old.nullable && !new.nullable {
        sub_ops.push(SubOp::SetNotNull { column: new.name.clone() });
    } else if !old.nullable && new.nullable {
        sub_ops.push(SubOp::DropNotNull { column: new.name.clone() });
    }
    match (&old.default, &new.default) {
        (old_d, new_d) if old_d == new_d => {}
        (_, Some(new_default)) => sub_ops.push(SubOp::SetDefault {
            column: new.name.clone(),
            default: new_default.clone(),
        }),
        (Some(_), None) => sub_ops.push(SubOp::DropDefault { column: new.name.clone() }),
        (None, None) => {}
    }
    if old.identity != new.identity {
        match new.identity {
            crate::ir::IdentityKind::None => sub_ops.push(SubOp::DropIdentity { column: new.name.clone() }),
            kind => sub_ops.push(SubOp::SetIdentity {
                column: new.name.clone(),
                kind,
            }),
        }
    }
    if old.generated != new.generated {
        match &new.generated {
            crate::ir::GeneratedKind::None => sub_ops.push(SubOp::DropGenerated { column: new.name.clone() }),
            crate::ir::GeneratedKind::Stored(expr) => sub_ops.push(SubOp::SetGenerated {
                column: new.name.clone(),
                expression: expr.clone(),
            }),
        }
    }
    if old.comment != new.comment {
        // Column comments are rendered by the Emitter as `COMMENT ON
        // COLUMN table.column IS ...`; reuse SetComment, keyed by the
        // column name sort key above.
        sub_ops.push(SubOp::SetComment {
            column: Some(new.name.clone()),
            text: new.comment.clone(),
        });
    }
}

// ---------------------------------------------------------------------------
// Constraints — always drop+add at the Differ stage (§4.2: "Postgres
// cannot alter constraint bodies").
// ---------------------------------------------------------------------------

pub(crate) fn constraint_ref(table: &Table, constraint: &Constraint) -> ObjectRef {
    let name = constraint
        .name
        .clone()
        .unwrap_or_else(|| format!("{}_{:?}", table.name.name, constraint.kind));
    ObjectRef::new(
        ObjectKind::Constraint,
        table.name.schema.clone().unwrap_or_default(),
        name,
    )
    .with_qualifier(table.catalog_key())
}

fn diff_constraints(old: &Table, new: &Table, out: &mut Vec<ChangeRecord>) {
    let old_by_name: std::collections::HashMap<&str, &Constraint> = old
        .constraints
        .iter()
        .filter_map(|c| c.name.as_deref().map(|n| (n, c)))
        .collect();
    let new_by_name: std::collections::HashMap<&str, &Constraint> = new
        .constraints
        .iter()
        .filter_map(|c| c.name.as_deref().map(|n| (n, c)))
        .collect();

    for c in &new.constraints {
        let Some(name) = c.name.as_deref() else { continue };
        match old_by_name.get(name) {
            None => out.push(ChangeRecord::create(constraint_ref(new, c))),
            Some(old_c) => {
                // Definition changed (including a NOT VALID -> VALID
                // transition, which the Differ treats as drop+add like any
                // other constraint-body change): drop the old, add the new.
                if old_c.kind != c.kind || old_c.not_valid != c.not_valid {
                    out.push(ChangeRecord::drop(constraint_ref(old, old_c)));
                    out.push(ChangeRecord::create(constraint_ref(new, c)));
                }
            }
        }
    }
    for c in &old.constraints {
        let Some(name) = c.name.as_deref() else { continue };
        if !new_by_name.contains_key(name) {
            out.push(ChangeRecord::drop(constraint_ref(old, c)));
        }
    }
}

// ---------------------------------------------------------------------------
// Indexes — always drop+add at the Differ stage; the Emitter is what
// recognizes a same-name drop+create pair and rewrites it into an online
// `ReplaceIndex` sub-op (§4.3).
// ---------------------------------------------------------------------------

fn index_ref(table: &Table, index: &Index) -> ObjectRef {
    ObjectRef::new(
        ObjectKind::Index,
        table.name.schema.clone().unwrap_or_default(),
        index.name.clone(),
    )
    .with_qualifier(table.catalog_key())
}

fn diff_indexes(old: &Table, new: &Table, out: &mut Vec<ChangeRecord>) {
    let old_by_name: std::collections::HashMap<&str, &Index> =
        old.indexes.iter().map(|i| (i.name.as_str(), i)).collect();
    let new_by_name: std::collections::HashMap<&str, &Index> =
        new.indexes.iter().map(|i| (i.name.as_str(), i)).collect();

    for i in &new.indexes {
        match old_by_name.get(i.name.as_str()) {
            None => out.push(ChangeRecord::create(index_ref(new, i))),
            Some(old_i) if *old_i != i => {
                out.push(ChangeRecord::drop(index_ref(old, old_i)));
                out.push(ChangeRecord::create(index_ref(new, i)));
            }
            Some(_) => {}
        }
    }
    for i in &old.indexes {
        if !new_by_name.contains_key(i.name.as_str()) {
            out.push(ChangeRecord::drop(index_ref(old, i)));
        }
    }
}

// ---------------------------------------------------------------------------
// Triggers — drop+create on any difference (no in-place trigger alter
// surface worth modeling; Postgres itself only supports enable/disable,
// which this IR does not track).
// ---------------------------------------------------------------------------

fn trigger_ref(table: &Table, trigger: &Trigger) -> ObjectRef {
    ObjectRef::new(
        ObjectKind::Trigger,
        table.name.schema.clone().unwrap_or_default(),
        trigger.name.clone(),
    )
    .with_qualifier(table.catalog_key())
}

fn diff_triggers(old: &Table, new: &Table, out: &mut Vec<ChangeRecord>) {
    let old_by_name: std::collections::HashMap<&str, &Trigger> =
        old.triggers.iter().map(|t| (t.name.as_str(), t)).collect();
    let new_by_name: std::collections::HashMap<&str, &Trigger> =
        new.triggers.iter().map(|t| (t.name.as_str(), t)).collect();

    for t in &new.triggers {
        match old_by_name.get(t.name.as_str()) {
            None => out.push(ChangeRecord::create(trigger_ref(new, t))),
            Some(old_t) if *old_t != t => {
                out.push(ChangeRecord::drop(trigger_ref(old, old_t)));
                out.push(ChangeRecord::create(trigger_ref(new, t)));
            }
            Some(_) => {}
        }
    }
    for t in &old.triggers {
        if !new_by_name.contains_key(t.name.as_str()) {
            out.push(ChangeRecord::drop(trigger_ref(old, t)));
        }
    }
}

// ---------------------------------------------------------------------------
// Policies — drop+create on any difference (§4.2: "a CREATE POLICY cannot
// be replaced in place").
// ---------------------------------------------------------------------------

fn policy_ref(table: &Table, policy: &Policy) -> ObjectRef {
    ObjectRef::new(
        ObjectKind::Policy,
        table.name.schema.clone().unwrap_or_default(),
        policy.name.clone(),
    )
    .with_qualifier(table.catalog_key())
}

fn diff_policies(old: &Table, new: &Table, out: &mut Vec<ChangeRecord>) {
    let old_by_name: std::collections::HashMap<&str, &Policy> =
        old.policies.iter().map(|p| (p.name.as_str(), p)).collect();
    let new_by_name: std::collections::HashMap<&str, &Policy> =
        new.policies.iter().map(|p| (p.name.as_str(), p)).collect();

    for p in &new.policies {
        match old_by_name.get(p.name.as_str()) {
            None => out.push(ChangeRecord::create(policy_ref(new, p))),
            Some(old_p) if *old_p != p => {
                out.push(ChangeRecord::drop(policy_ref(old, old_p)));
                out.push(ChangeRecord::create(policy_ref(new, p)));
            }
            Some(_) => {}
        }
    }
    for p in &old.policies {
        if !new_by_name.contains_key(p.name.as_str()) {
            out.push(ChangeRecord::drop(policy_ref(old, p)));
        }
    }
}

// ---------------------------------------------------------------------------
// Views / materialized views (§4.2: CREATE OR REPLACE when the column list
// is a prefix-compatible superset, otherwise drop+create).
// ---------------------------------------------------------------------------

fn diff_views(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    for key in union_keys(&old.views, &new.views) {
        let obj_ref = |name: &str, schema: &str| ObjectRef::new(ObjectKind::View, schema, name);
        match (old.views.get(key), new.views.get(key)) {
            (None, Some(v)) => out.push(ChangeRecord::create(obj_ref(
                &v.name.name,
                v.name.schema.as_deref().unwrap_or_default(),
            ))),
            (Some(v), None) => out.push(ChangeRecord::drop(obj_ref(
                &v.name.name,
                v.name.schema.as_deref().unwrap_or_default(),
            ))),
            (Some(old_v), Some(new_v)) => {
                if old_v.definition.select_text != new_v.definition.select_text
                    || old_v.comment != new_v.comment
                    || old_v.column_comments != new_v.column_comments
                {
                    let replaceable = old_v.definition.is_prefix_compatible_superset(&new_v.definition);
                    let r = obj_ref(&new_v.name.name, new_v.name.schema.as_deref().unwrap_or_default());
                    if replaceable {
                        out.push(ChangeRecord::alter(
                            r,
                            vec![SubOp::SetComment {
                                column: None,
                                text: new_v.comment.clone(),
                            }],
                        ));
                    } else {
                        out.push(ChangeRecord::drop(r.clone()));
                        out.push(ChangeRecord::create(r));
                    }
                }
            }
            (None, None) => unreachable!(),
        }
    }
}

fn diff_materialized_views(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    for key in union_keys(&old.materialized_views, &new.materialized_views) {
        let obj_ref =
            |name: &str, schema: &str| ObjectRef::new(ObjectKind::MaterializedView, schema, name);
        match (old.materialized_views.get(key), new.materialized_views.get(key)) {
            (None, Some(mv)) => out.push(ChangeRecord::create(obj_ref(
                &mv.name.name,
                mv.name.schema.as_deref().unwrap_or_default(),
            ))),
            (Some(mv), None) => out.push(ChangeRecord::drop(obj_ref(
                &mv.name.name,
                mv.name.schema.as_deref().unwrap_or_default(),
            ))),
            (Some(old_mv), Some(new_mv)) => {
                // A materialized view's definition can never be replaced
                // in place — only a plain view supports CREATE OR REPLACE.
                if old_mv.definition.select_text != new_mv.definition.select_text {
                    let r = obj_ref(&new_mv.name.name, new_mv.name.schema.as_deref().unwrap_or_default());
                    out.push(ChangeRecord::drop(r.clone()));
                    out.push(ChangeRecord::create(r));
                } else if old_mv.comment != new_mv.comment {
                    out.push(ChangeRecord::alter(
                        obj_ref(&new_mv.name.name, new_mv.name.schema.as_deref().unwrap_or_default()),
                        vec![SubOp::SetComment {
                            column: None,
                            text: new_mv.comment.clone(),
                        }],
                    ));
                }
                // Index changes on the matview reuse the table-style index
                // diff by wrapping the matview's indexes into a throwaway
                // Table-shaped comparison keyed the same way a table's
                // indexes are.
                diff_matview_indexes(old_mv, new_mv, out);
            }
            (None, None) => unreachable!(),
        }
    }
}

fn diff_matview_indexes(
    old_mv: &crate::ir::MaterializedView,
    new_mv: &crate::ir::MaterializedView,
    out: &mut Vec<ChangeRecord>,
) {
    let schema = new_mv.name.schema.clone().unwrap_or_default();
    let owner_key = new_mv.name.catalog_key();
    let mk_ref =
        |name: &str| ObjectRef::new(ObjectKind::Index, schema.clone(), name).with_qualifier(owner_key.clone());

    let old_by_name: std::collections::HashMap<&str, &Index> =
        old_mv.indexes.iter().map(|i| (i.name.as_str(), i)).collect();
    let new_by_name: std::collections::HashMap<&str, &Index> =
        new_mv.indexes.iter().map(|i| (i.name.as_str(), i)).collect();

    for i in &new_mv.indexes {
        match old_by_name.get(i.name.as_str()) {
            None => out.push(ChangeRecord::create(mk_ref(&i.name))),
            Some(old_i) if *old_i != i => {
                out.push(ChangeRecord::drop(mk_ref(&i.name)));
                out.push(ChangeRecord::create(mk_ref(&i.name)));
            }
            Some(_) => {}
        }
    }
    for i in &old_mv.indexes {
        if !new_by_name.contains_key(i.name.as_str()) {
            out.push(ChangeRecord::drop(mk_ref(&i.name)));
        }
    }
}

// ---------------------------------------------------------------------------
// Functions / procedures (§4.2: signature change = drop+create, body-only
// change with identical signature = CREATE OR REPLACE, return-type change
// = drop+create).
// ---------------------------------------------------------------------------

fn routine_ref(routine: &Routine) -> ObjectRef {
    let kind = match routine.kind {
        RoutineKind::Function => ObjectKind::Function,
        RoutineKind::Procedure => ObjectKind::Procedure,
    };
    // Mirrors `Routine::signature_key` (IN/INOUT/VARIADIC only — OUT
    // arguments don't participate in overload identity).
    let arg_types: Vec<String> = routine
        .args
        .iter()
        .filter(|a| {
            matches!(
                a.mode,
                crate::ir::ArgMode::In | crate::ir::ArgMode::InOut | crate::ir::ArgMode::Variadic
            )
        })
        .map(|a| a.type_name.to_string())
        .collect();
    ObjectRef::new(
        kind,
        routine.name.schema.clone().unwrap_or_default(),
        routine.name.name.clone(),
    )
    .with_qualifier(arg_types.join(","))
}

fn diff_routines(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    for key in union_keys(&old.routines, &new.routines) {
        match (old.routines.get(key), new.routines.get(key)) {
            (None, Some(r)) => out.push(ChangeRecord::create(routine_ref(r))),
            (Some(r), None) => out.push(ChangeRecord::drop(routine_ref(r))),
            (Some(old_r), Some(new_r)) => {
                // Same signature_key means identical (schema, name,
                // IN+INOUT arg types) — but OUT-only argument changes or a
                // return-type change still force drop+create since they
                // are not expressible via CREATE OR REPLACE.
                if old_r.returns != new_r.returns || old_r.args != new_r.args {
                    out.push(ChangeRecord::drop(routine_ref(old_r)));
                    out.push(ChangeRecord::create(routine_ref(new_r)));
                } else if old_r.body != new_r.body
                    || old_r.volatility != new_r.volatility
                    || old_r.strict != new_r.strict
                    || old_r.security != new_r.security
                    || old_r.parallel != new_r.parallel
                    || old_r.leakproof != new_r.leakproof
                    || old_r.set_clauses != new_r.set_clauses
                    || old_r.language != new_r.language
                {
                    // CREATE OR REPLACE — modeled as a no-sub-op marker
                    // alter; the Emitter renders the full new definition
                    // regardless of which specific attribute changed.
                    out.push(ChangeRecord::alter(
                        routine_ref(new_r),
                        vec![SubOp::SetComment {
                            column: None,
                            text: new_r.comment.clone(),
                        }],
                    ));
                } else if old_r.comment != new_r.comment {
                    out.push(ChangeRecord::alter(
                        routine_ref(new_r),
                        vec![SubOp::SetComment {
                            column: None,
                            text: new_r.comment.clone(),
                        }],
                    ));
                }
            }
            (None, None) => unreachable!(),
        }
    }
}

// ---------------------------------------------------------------------------
// Domains — ALTER DOMAIN supports default/not-null/named-check changes in
// place; a base type change has no in-place representation.
// ---------------------------------------------------------------------------

fn diff_domains(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    for key in union_keys(&old.domains, &new.domains) {
        let obj_ref = |schema: &str, name: &str| ObjectRef::new(ObjectKind::Domain, schema, name);
        match (old.domains.get(key), new.domains.get(key)) {
            (None, Some(d)) => {
                out.push(ChangeRecord::create(obj_ref(
                    d.name.schema.as_deref().unwrap_or_default(),
                    &d.name.name,
                )));
            }
            (Some(d), None) => {
                out.push(ChangeRecord::drop(obj_ref(
                    d.name.schema.as_deref().unwrap_or_default(),
                    &d.name.name,
                )));
            }
            (Some(old_d), Some(new_d)) => {
                let r = obj_ref(new_d.name.schema.as_deref().unwrap_or_default(), &new_d.name.name);
                if old_d.base_type != new_d.base_type {
                    out.push(ChangeRecord::drop(r.clone()));
                    out.push(ChangeRecord::create(r));
                    continue;
                }
                let mut sub_ops = Vec::new();
                match (&old_d.default, &new_d.default) {
                    (a, b) if a == b => {}
                    (_, Some(new_default)) => sub_ops.push(SubOp::SetDefault {
                        column: new_d.name.name.clone(),
                        default: new_default.clone(),
                    }),
                    (Some(_), None) => sub_ops.push(SubOp::DropDefault {
                        column: new_d.name.name.clone(),
                    }),
                    (None, None) => {}
                }
                if old_d.not_null && !new_d.not_null {
                    sub_ops.push(SubOp::DropNotNull {
                        column: new_d.name.name.clone(),
                    });
                } else if !old_d.not_null && new_d.not_null {
                    sub_ops.push(SubOp::SetNotNull {
                        column: new_d.name.name.clone(),
                    });
                }
                let old_checks: std::collections::HashMap<&str, &str> = old_d
                    .checks
                    .iter()
                    .filter_map(|c| c.name.as_deref().map(|n| (n, c.expression.as_str())))
                    .collect();
                let new_checks: std::collections::HashMap<&str, &str> = new_d
                    .checks
                    .iter()
                    .filter_map(|c| c.name.as_deref().map(|n| (n, c.expression.as_str())))
                    .collect();
                for c in &new_d.checks {
                    let Some(name) = c.name.as_deref() else { continue };
                    match old_checks.get(name) {
                        None => sub_ops.push(SubOp::AddCheck {
                            name: Some(name.to_string()),
                            expression: c.expression.clone(),
                        }),
                        Some(old_expr) if *old_expr != c.expression => {
                            sub_ops.push(SubOp::DropCheck { name: name.to_string() });
                            sub_ops.push(SubOp::AddCheck {
                                name: Some(name.to_string()),
                                expression: c.expression.clone(),
                            });
                        }
                        Some(_) => {}
                    }
                }
                for c in &old_d.checks {
                    let Some(name) = c.name.as_deref() else { continue };
                    if !new_checks.contains_key(name) {
                        sub_ops.push(SubOp::DropCheck { name: name.to_string() });
                    }
                }
                if old_d.comment != new_d.comment {
                    sub_ops.push(SubOp::SetComment {
                        column: None,
                        text: new_d.comment.clone(),
                    });
                }
                if !sub_ops.is_empty() {
                    out.push(ChangeRecord::alter(r, sub_ops));
                }
            }
            (None, None) => unreachable!(),
        }
    }
}

// ---------------------------------------------------------------------------
// Types — enum label additions are in-place (`ALTER TYPE ... ADD VALUE`);
// any removal, reorder, or composite-column change is drop+create.
// ---------------------------------------------------------------------------

fn diff_types(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    for key in union_keys(&old.types, &new.types) {
        let obj_ref = |schema: &str, name: &str| ObjectRef::new(ObjectKind::Type, schema, name);
        match (old.types.get(key), new.types.get(key)) {
            (None, Some(t)) => out.push(ChangeRecord::create(obj_ref(
                t.name.schema.as_deref().unwrap_or_default(),
                &t.name.name,
            ))),
            (Some(t), None) => out.push(ChangeRecord::drop(obj_ref(
                t.name.schema.as_deref().unwrap_or_default(),
                &t.name.name,
            ))),
            (Some(old_t), Some(new_t)) => {
                let r = obj_ref(new_t.name.schema.as_deref().unwrap_or_default(), &new_t.name.name);
                match (&old_t.kind, &new_t.kind) {
                    (TypeKind::Enum { labels: old_labels }, TypeKind::Enum { labels: new_labels }) => {
                        if old_labels == new_labels {
                            if old_t.comment != new_t.comment {
                                out.push(ChangeRecord::alter(
                                    r,
                                    vec![SubOp::SetComment {
                                        column: None,
                                        text: new_t.comment.clone(),
                                    }],
                                ));
                            }
                            continue;
                        }
                        // Pure append (every old label present, in order,
                        // as a prefix of the new list) -> in-place ADD
                        // VALUE per added label. Anything else (removal,
                        // reorder, insertion mid-list) has no in-place
                        // representation.
                        let is_pure_append =
                            new_labels.len() >= old_labels.len() && old_labels.as_slice() == &new_labels[..old_labels.len()];
                        if is_pure_append {
                            let mut sub_ops: Vec<SubOp> = Vec::new();
                            let mut prev = old_labels.last().cloned();
                            for added in &new_labels[old_labels.len()..] {
                                sub_ops.push(SubOp::AddEnumValue {
                                    value: added.clone(),
                                    after: prev.clone(),
                                });
                                prev = Some(added.clone());
                            }
                            out.push(ChangeRecord::alter(r, sub_ops));
                        } else {
                            out.push(ChangeRecord::drop(r.clone()));
                            out.push(ChangeRecord::create(r));
                        }
                    }
                    (old_kind, new_kind) if old_kind == new_kind => {
                        if old_t.comment != new_t.comment {
                            out.push(ChangeRecord::alter(
                                r,
                                vec![SubOp::SetComment {
                                    column: None,
                                    text: new_t.comment.clone(),
                                }],
                            ));
                        }
                    }
                    _ => {
                        out.push(ChangeRecord::drop(r.clone()));
                        out.push(ChangeRecord::create(r));
                    }
                }
            }
            (None, None) => unreachable!(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sequences — attribute changes are `ALTER SEQUENCE`; ownership is tracked
// as a separate sub-op since it is set with a distinct clause.
// ---------------------------------------------------------------------------

fn diff_sequences(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    for key in union_keys(&old.sequences, &new.sequences) {
        let obj_ref = |schema: &str, name: &str| ObjectRef::new(ObjectKind::Sequence, schema, name);
        match (old.sequences.get(key), new.sequences.get(key)) {
            (None, Some(s)) => out.push(ChangeRecord::create(obj_ref(
                s.name.schema.as_deref().unwrap_or_default(),
                &s.name.name,
            ))),
            (Some(s), None) => out.push(ChangeRecord::drop(obj_ref(
                s.name.schema.as_deref().unwrap_or_default(),
                &s.name.name,
            ))),
            (Some(old_s), Some(new_s)) => {
                let r = obj_ref(new_s.name.schema.as_deref().unwrap_or_default(), &new_s.name.name);
                let mut sub_ops = Vec::new();
                if sequence_options_changed(old_s, new_s) {
                    sub_ops.push(SubOp::AlterSequenceOptions {
                        increment: (old_s.increment != new_s.increment).then_some(new_s.increment),
                        min_value: (old_s.min_value != new_s.min_value).then_some(new_s.min_value),
                        max_value: (old_s.max_value != new_s.max_value).then_some(new_s.max_value),
                        cache: (old_s.cache != new_s.cache).then_some(new_s.cache),
                        cycle: (old_s.cycle != new_s.cycle).then_some(new_s.cycle),
                    });
                }
                if old_s.owned_by != new_s.owned_by {
                    sub_ops.push(SubOp::SetSequenceOwner {
                        owner: new_s.owned_by.clone(),
                    });
                }
                if old_s.comment != new_s.comment {
                    sub_ops.push(SubOp::SetComment {
                        column: None,
                        text: new_s.comment.clone(),
                    });
                }
                if !sub_ops.is_empty() {
                    out.push(ChangeRecord::alter(r, sub_ops));
                }
            }
            (None, None) => unreachable!(),
        }
    }
}

fn sequence_options_changed(old: &Sequence, new: &Sequence) -> bool {
    old.increment != new.increment
        || old.min_value != new.min_value
        || old.max_value != new.max_value
        || old.cache != new.cache
        || old.cycle != new.cycle
}

// ---------------------------------------------------------------------------
// Privileges — set difference per (grantee, object, privilege). §4.2's
// auto-grant idempotence rule: skip a GRANT a default-privilege record
// would already cover, and skip a REVOKE for one an explicit grant merely
// restates (S6).
// ---------------------------------------------------------------------------

fn privilege_object_type(kind: ObjectKind) -> Option<crate::ir::DefaultPrivilegeObjectType> {
    use crate::ir::DefaultPrivilegeObjectType as T;
    match kind {
        ObjectKind::Table => Some(T::Tables),
        ObjectKind::Sequence => Some(T::Sequences),
        ObjectKind::Function | ObjectKind::Procedure => Some(T::Functions),
        ObjectKind::Type | ObjectKind::Domain => Some(T::Types),
        ObjectKind::Schema => Some(T::Schemas),
        _ => None,
    }
}

/// Whether `new`'s default-privilege declarations would already grant
/// `priv` on `object` to `grantee` at the moment the object is created —
/// the auto-grant idempotence check (S6).
fn covered_by_default_privilege(ir: &Ir, priv_record: &Privilege) -> bool {
    let Some(object_type) = privilege_object_type(priv_record.object.kind) else {
        return false;
    };
    ir.default_privileges.iter().any(|dp| {
        dp.covers(
            &priv_record.grantee,
            &priv_record.object.schema,
            object_type,
            &priv_record.privilege,
        )
    })
}

fn privilege_ref(p: &Privilege) -> ObjectRef {
    let cols = p.columns.as_ref().map(|c| c.join(",")).unwrap_or_default();
    ObjectRef::new(
        ObjectKind::Privilege,
        p.object.schema.clone(),
        format!("{}|{}|{}|{}", p.grantee, p.privilege.label(), cols, p.with_grant_option),
    )
    .with_qualifier(format!("{:?}:{}.{}", p.object.kind, p.object.schema, p.object.name))
}

fn privilege_identity(p: &Privilege) -> (String, String, String) {
    // Grant-option is intentionally excluded from identity — a WITH GRANT
    // OPTION change re-grants the same (grantee, object, privilege) rather
    // than dropping and recreating it.
    let cols = p.columns.as_ref().map(|c| c.join(",")).unwrap_or_default();
    (
        p.grantee.clone(),
        format!("{:?}:{}.{}:{}", p.object.kind, p.object.schema, p.object.name, cols),
        p.privilege.label().to_string(),
    )
}

fn diff_privileges(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    let old_by_identity: std::collections::HashMap<(String, String, String), &Privilege> =
        old.privileges.iter().map(|p| (privilege_identity(p), p)).collect();
    let new_by_identity: std::collections::HashMap<(String, String, String), &Privilege> =
        new.privileges.iter().map(|p| (privilege_identity(p), p)).collect();

    for p in &new.privileges {
        let identity = privilege_identity(p);
        match old_by_identity.get(&identity) {
            None => {
                if !covered_by_default_privilege(new, p) {
                    out.push(ChangeRecord::create(privilege_ref(p)));
                }
            }
            Some(old_p) if old_p.with_grant_option != p.with_grant_option => {
                out.push(ChangeRecord::create(privilege_ref(p)));
            }
            Some(_) => {}
        }
    }
    for p in &old.privileges {
        let identity = privilege_identity(p);
        if !new_by_identity.contains_key(&identity) {
            // An explicit grant in `old` that merely restated what a
            // default-privilege in `new` already covers is not revoked —
            // it was never "extra" from Postgres's point of view.
            if !covered_by_default_privilege(new, p) {
                out.push(ChangeRecord::drop(privilege_ref(p)));
            }
        }
    }
}

fn default_privilege_ref(dp: &DefaultPrivilege) -> ObjectRef {
    ObjectRef::new(
        ObjectKind::DefaultPrivilege,
        dp.schema.clone(),
        format!("{}|{}|{}", dp.grantor, dp.object_type.label(), dp.grantee),
    )
}

fn diff_default_privileges(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    let key = |dp: &DefaultPrivilege| {
        (
            dp.grantor.clone(),
            dp.schema.clone(),
            dp.object_type.label(),
            dp.grantee.clone(),
        )
    };
    let old_by_key: std::collections::HashMap<_, &DefaultPrivilege> =
        old.default_privileges.iter().map(|dp| (key(dp), dp)).collect();
    let new_by_key: std::collections::HashMap<_, &DefaultPrivilege> =
        new.default_privileges.iter().map(|dp| (key(dp), dp)).collect();

    for dp in &new.default_privileges {
        match old_by_key.get(&key(dp)) {
            None => out.push(ChangeRecord::create(default_privilege_ref(dp))),
            Some(old_dp)
                if old_dp.privileges != dp.privileges || old_dp.with_grant_option != dp.with_grant_option =>
            {
                out.push(ChangeRecord::drop(default_privilege_ref(old_dp)));
                out.push(ChangeRecord::create(default_privilege_ref(dp)));
            }
            Some(_) => {}
        }
    }
    for dp in &old.default_privileges {
        if !new_by_key.contains_key(&key(dp)) {
            out.push(ChangeRecord::drop(default_privilege_ref(dp)));
        }
    }
}

// ---------------------------------------------------------------------------
// Standalone comments (objects whose IR entity carries no inline comment
// field of its own, e.g. schemas covered above — this covers any other
// comment records the caller attached directly to `Ir::comments`).
// ---------------------------------------------------------------------------

fn diff_standalone_comments(old: &Ir, new: &Ir, out: &mut Vec<ChangeRecord>) {
    let key = |c: &crate::ir::Comment| (c.object.kind, c.object.schema.clone(), c.object.name.clone());
    let old_by_key: std::collections::HashMap<_, &crate::ir::Comment> =
        old.comments.iter().map(|c| (key(c), c)).collect();
    let new_by_key: std::collections::HashMap<_, &crate::ir::Comment> =
        new.comments.iter().map(|c| (key(c), c)).collect();

    for c in &new.comments {
        let comment_ref = ObjectRef::new(ObjectKind::Comment, c.object.schema.clone(), c.object.name.clone())
            .with_qualifier(format!("{:?}", c.object.kind));
        match old_by_key.get(&key(c)) {
            None => out.push(ChangeRecord::create(comment_ref)),
            Some(old_c) if old_c.text != c.text => out.push(ChangeRecord::alter(
                comment_ref,
                vec![SubOp::SetComment { column: None, text: Some(c.text.clone()) }],
            )),
            Some(_) => {}
        }
    }
    for c in &old.comments {
        if !new_by_key.contains_key(&key(c)) {
            let comment_ref = ObjectRef::new(ObjectKind::Comment, c.object.schema.clone(), c.object.name.clone())
                .with_qualifier(format!("{:?}", c.object.kind));
            out.push(ChangeRecord::drop(comment_ref));
        }
    }
}

// ---------------------------------------------------------------------------
// Entity lookups — given a `ChangeRecord`'s `ObjectRef`, find the full IR
// entity it names. The dependency graph (§4.4) uses these to discover what
// an object references; the Emitter (§4.3) uses them to render DDL. Both
// consult the same `Ir` a differ run produced the ref from (`new` for
// Create/Alter, `old` for Drop).
// ---------------------------------------------------------------------------

fn split_catalog_key(key: &str) -> (String, String) {
    match key.split_once('.') {
        Some((schema, name)) => (schema.to_string(), name.to_string()),
        None => (String::new(), key.to_string()),
    }
}

/// The owning table (or materialized view) of an index/constraint/trigger/
/// policy ref, as an [`ObjectRef`] — looked up by catalog key rather than
/// assumed to be a table, since indexes on materialized views share the
/// same qualifier shape.
pub fn owner_ref(ir: &Ir, qualifier: &str) -> Option<ObjectRef> {
    let (schema, name) = split_catalog_key(qualifier);
    if ir.tables.contains_key(qualifier) {
        Some(ObjectRef::new(ObjectKind::Table, schema, name))
    } else if ir.materialized_views.contains_key(qualifier) {
        Some(ObjectRef::new(ObjectKind::MaterializedView, schema, name))
    } else {
        None
    }
}

pub fn find_table<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a Table> {
    ir.tables.get(&format!("{}.{}", r.schema, r.name))
}

pub fn find_constraint<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<(&'a Table, &'a Constraint)> {
    let table_key = r.qualifier.as_deref()?;
    let table = ir.tables.get(table_key)?;
    let c = table.constraints.iter().find(|c| constraint_ref(table, c) == *r)?;
    Some((table, c))
}

pub fn find_index<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a Index> {
    let owner_key = r.qualifier.as_deref()?;
    if let Some(table) = ir.tables.get(owner_key) {
        return table.indexes.iter().find(|i| index_ref(table, i) == *r);
    }
    if let Some(mv) = ir.materialized_views.get(owner_key) {
        return mv.indexes.iter().find(|i| i.name == r.name);
    }
    None
}

pub fn find_trigger<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<(&'a Table, &'a Trigger)> {
    let table_key = r.qualifier.as_deref()?;
    let table = ir.tables.get(table_key)?;
    let t = table.triggers.iter().find(|t| trigger_ref(table, t) == *r)?;
    Some((table, t))
}

pub fn find_policy<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<(&'a Table, &'a Policy)> {
    let table_key = r.qualifier.as_deref()?;
    let table = ir.tables.get(table_key)?;
    let p = table.policies.iter().find(|p| policy_ref(table, p) == *r)?;
    Some((table, p))
}

pub fn find_view<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a crate::ir::View> {
    ir.views.get(&format!("{}.{}", r.schema, r.name))
}

pub fn find_materialized_view<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a crate::ir::MaterializedView> {
    ir.materialized_views.get(&format!("{}.{}", r.schema, r.name))
}

pub fn find_routine<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a Routine> {
    let args = r.qualifier.as_deref().unwrap_or("");
    ir.routines.get(&format!("{}.{}({})", r.schema, r.name, args))
}

pub fn find_domain<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a crate::ir::Domain> {
    ir.domains.get(&format!("{}.{}", r.schema, r.name))
}

pub fn find_type<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a crate::ir::UserType> {
    ir.types.get(&format!("{}.{}", r.schema, r.name))
}

pub fn find_sequence<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a Sequence> {
    ir.sequences.get(&format!("{}.{}", r.schema, r.name))
}

pub fn find_privilege<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a Privilege> {
    ir.privileges.iter().find(|p| privilege_ref(p) == *r)
}

pub fn find_default_privilege<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a DefaultPrivilege> {
    ir.default_privileges.iter().find(|dp| default_privilege_ref(dp) == *r)
}

pub fn find_comment<'a>(ir: &'a Ir, r: &ObjectRef) -> Option<&'a crate::ir::Comment> {
    ir.comments
        .iter()
        .find(|c| c.object.kind == r.kind && c.object.schema == r.schema && c.object.name == r.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::IrBuilder;

    #[test]
    fn new_table_emits_single_create() {
        let old = Ir::new();
        let new = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false).pk(&["id"]);
            })
            .build();
        let changes = diff(&old, &new);
        assert_eq!(
            changes
                .iter()
                .filter(|c| c.object.kind == ObjectKind::Table && c.kind == ChangeKind::Create)
                .count(),
            1
        );
        assert!(changes
            .iter()
            .any(|c| c.object.kind == ObjectKind::Constraint && c.kind == ChangeKind::Create));
    }

    #[test]
    fn added_column_produces_add_column_sub_op() {
        let old = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false);
            })
            .build();
        let new = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false).column("status", "text", true);
            })
            .build();
        let changes = diff(&old, &new);
        let table_change = changes
            .iter()
            .find(|c| c.object.kind == ObjectKind::Table)
            .expect("table alter");
        assert!(matches!(table_change.kind, ChangeKind::Alter));
        assert!(table_change
            .sub_ops
            .iter()
            .any(|op| matches!(op, SubOp::AddColumn { name, .. } if name == "status")));
    }

    #[test]
    fn unchanged_table_emits_nothing() {
        let mk = || {
            IrBuilder::new()
                .table("public", "orders", |t| {
                    t.column("id", "integer", false).pk(&["id"]);
                })
                .build()
        };
        let changes = diff(&mk(), &mk());
        assert!(changes.is_empty());
    }

    #[test]
    fn constraint_definition_change_is_drop_then_add() {
        let old = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false).check("ck_status", "status = 'a'");
            })
            .build();
        let new = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false).check("ck_status", "status = 'b'");
            })
            .build();
        let changes = diff(&old, &new);
        let constraint_changes: Vec<_> = changes
            .iter()
            .filter(|c| c.object.kind == ObjectKind::Constraint)
            .collect();
        assert_eq!(constraint_changes.len(), 2);
        assert!(constraint_changes.iter().any(|c| c.kind == ChangeKind::Drop));
        assert!(constraint_changes.iter().any(|c| c.kind == ChangeKind::Create));
    }

    #[test]
    fn index_replacement_is_drop_then_add() {
        let old = IrBuilder::new()
            .table("public", "users", |t| {
                t.column("id", "integer", false)
                    .column("email", "text", false)
                    .index("idx_email", &["email"], false);
            })
            .build();
        let new = IrBuilder::new()
            .table("public", "users", |t| {
                t.column("id", "integer", false)
                    .column("email", "text", false)
                    .column("status", "text", true)
                    .index("idx_email", &["email", "status"], false);
            })
            .build();
        let changes = diff(&old, &new);
        let index_changes: Vec<_> = changes.iter().filter(|c| c.object.kind == ObjectKind::Index).collect();
        assert_eq!(index_changes.len(), 2);
    }

    #[test]
    fn policy_command_change_is_drop_then_create() {
        use crate::ir::{Policy, PolicyCommand, QualifiedName};

        let mut old = IrBuilder::new()
            .table("public", "users", |t| {
                t.column("id", "integer", false);
            })
            .build();
        old.tables.get_mut("public.users").unwrap().policies.push(Policy {
            name: "user_tenant_isolation".to_string(),
            table: QualifiedName::qualified("public", "users"),
            command: PolicyCommand::All,
            roles: vec!["PUBLIC".to_string()],
            using: Some("tenant_id = 1".to_string()),
            with_check: None,
            permissive: true,
        });

        let mut new = IrBuilder::new()
            .table("public", "users", |t| {
                t.column("id", "integer", false);
            })
            .build();
        new.tables.get_mut("public.users").unwrap().policies.push(Policy {
            name: "user_tenant_isolation".to_string(),
            table: QualifiedName::qualified("public", "users"),
            command: PolicyCommand::Select,
            roles: vec!["PUBLIC".to_string()],
            using: Some("tenant_id = 1".to_string()),
            with_check: None,
            permissive: true,
        });

        let changes = diff(&old, &new);
        let policy_changes: Vec<_> = changes.iter().filter(|c| c.object.kind == ObjectKind::Policy).collect();
        assert_eq!(policy_changes.len(), 2);
        assert!(policy_changes.iter().any(|c| c.kind == ChangeKind::Drop));
        assert!(policy_changes.iter().any(|c| c.kind == ChangeKind::Create));
    }

    #[test]
    fn default_privilege_idempotence_skips_redundant_grant_and_revoke() {
        use crate::ir::{DefaultPrivilege, DefaultPrivilegeObjectType, ObjectRef as OR, Privilege, PrivilegeKind};

        let mut old = IrBuilder::new()
            .table("public", "users", |t| {
                t.column("id", "integer", false);
            })
            .build();
        old.default_privileges.push(DefaultPrivilege {
            grantor: "owner_role".to_string(),
            schema: "public".to_string(),
            object_type: DefaultPrivilegeObjectType::Tables,
            grantee: "app_role".to_string(),
            privileges: vec![PrivilegeKind::Select, PrivilegeKind::Insert],
            with_grant_option: false,
        });
        old.privileges.push(Privilege {
            grantee: "app_role".to_string(),
            object: OR::new(ObjectKind::Table, "public", "users"),
            privilege: PrivilegeKind::Select,
            with_grant_option: false,
            columns: None,
        });

        let mut new = IrBuilder::new()
            .table("public", "users", |t| {
                t.column("id", "integer", false);
            })
            .build();
        new.default_privileges.push(DefaultPrivilege {
            grantor: "owner_role".to_string(),
            schema: "public".to_string(),
            object_type: DefaultPrivilegeObjectType::Tables,
            grantee: "app_role".to_string(),
            privileges: vec![PrivilegeKind::Select, PrivilegeKind::Insert],
            with_grant_option: false,
        });
        // new omits the explicit grant entirely — should not produce a REVOKE.

        let changes = diff(&old, &new);
        assert!(!changes.iter().any(|c| c.object.kind == ObjectKind::Privilege));
        assert!(!changes.iter().any(|c| c.object.kind == ObjectKind::DefaultPrivilege));
    }

    #[test]
    fn enum_pure_append_is_in_place_alter() {
        use crate::ir::{TypeKind, UserType, QualifiedName};

        let mut old = Ir::new();
        old.insert_type(UserType {
            name: QualifiedName::qualified("public", "status"),
            kind: TypeKind::Enum {
                labels: vec!["active".to_string(), "inactive".to_string()],
            },
            comment: None,
        });
        let mut new = Ir::new();
        new.insert_type(UserType {
            name: QualifiedName::qualified("public", "status"),
            kind: TypeKind::Enum {
                labels: vec!["active".to_string(), "inactive".to_string(), "archived".to_string()],
            },
            comment: None,
        });

        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Alter);
        assert!(matches!(changes[0].sub_ops[0], SubOp::AddEnumValue { .. }));
    }

    #[test]
    fn enum_reorder_is_drop_then_create() {
        use crate::ir::{TypeKind, UserType, QualifiedName};

        let mut old = Ir::new();
        old.insert_type(UserType {
            name: QualifiedName::qualified("public", "status"),
            kind: TypeKind::Enum {
                labels: vec!["active".to_string(), "inactive".to_string()],
            },
            comment: None,
        });
        let mut new = Ir::new();
        new.insert_type(UserType {
            name: QualifiedName::qualified("public", "status"),
            kind: TypeKind::Enum {
                labels: vec!["inactive".to_string(), "active".to_string()],
            },
            comment: None,
        });

        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().any(|c| c.kind == ChangeKind::Drop));
        assert!(changes.iter().any(|c| c.kind == ChangeKind::Create));
    }
}
