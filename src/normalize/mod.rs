//! Normalizer (§4.1) — the diff planner's first pipeline stage.
//!
//! Consumes one raw [`Ir`] and produces a canonical one: every unqualified
//! name gets the configured default schema, every type alias collapses to
//! its catalog spelling, and every expression is re-parsed and re-rendered
//! through the same deparser, so that two authors' cosmetically different
//! spellings of "the same" schema never show up as a diff. The Differ never
//! sees a raw IR — only the output of this pass.

mod expr;
mod types;
mod view_expand;

pub use expr::{canonicalize_expr, canonicalize_select};
pub use types::canonicalize_type_name;
pub use view_expand::{expand_star, ColumnSource};

use crate::error::PlanResult;
use crate::ir::{Constraint, ConstraintKind, GeneratedKind, Index, IndexKey, ReturnType, Table, TypeKind};
use crate::ir::{Ir, MaterializedView, View};

/// Normalize a full schema snapshot. `default_schema` is assigned to every
/// unqualified name encountered (mirrors the teacher's `normalize_schemas`,
/// generalized from tables alone to every IR entity kind).
///
/// Every collection is keyed by catalog key, and normalization can change an
/// entity's catalog key (an unqualified name becomes schema-qualified) —
/// so each collection is drained and reinserted rather than mutated through
/// `values_mut()`, which would leave stale keys pointing at renamed entries.
pub fn normalize(mut ir: Ir, default_schema: &str) -> PlanResult<Ir> {
    let tables = std::mem::take(&mut ir.tables);
    let mut known_columns: ColumnSource = ColumnSource::new();
    for (_, mut table) in tables {
        normalize_table(&mut table, default_schema);
        known_columns.insert(table.catalog_key(), table.columns.iter().map(|c| c.name.clone()).collect());
        ir.insert_table(table);
    }

    let views: Vec<View> = std::mem::take(&mut ir.views).into_values().collect();
    for mut view in expand_views_fixpoint(views, default_schema, &mut known_columns) {
        view.name.set_default_schema(default_schema);
        for obj in &mut view.definition.referenced_objects {
            obj.set_default_schema(default_schema);
        }
        known_columns.insert(view.name.catalog_key(), view.definition.columns.clone());
        ir.insert_view(view);
    }

    let mviews: Vec<MaterializedView> = std::mem::take(&mut ir.materialized_views).into_values().collect();
    for mut mv in expand_matviews_fixpoint(mviews, default_schema, &known_columns) {
        mv.name.set_default_schema(default_schema);
        for obj in &mut mv.definition.referenced_objects {
            obj.set_default_schema(default_schema);
        }
        for index in &mut mv.indexes {
            normalize_index(index);
        }
        ir.insert_materialized_view(mv);
    }

    let routines = std::mem::take(&mut ir.routines);
    for (_, mut routine) in routines {
        routine.name.set_default_schema(default_schema);
        for arg in &mut routine.args {
            arg.type_name = canonicalize_type_name(&arg.type_name);
            if let Some(default) = &arg.default {
                arg.default = Some(canonicalize_expr(default));
            }
        }
        if let Some(returns) = &mut routine.returns {
            normalize_return_type(returns);
        }
        // routine.body is preserved byte-for-byte (§3.3) — function bodies
        // are opaque text to the planner, not parsed SQL.
        ir.insert_routine(routine);
    }

    let domains = std::mem::take(&mut ir.domains);
    for (_, mut domain) in domains {
        domain.name.set_default_schema(default_schema);
        domain.base_type = canonicalize_type_name(&domain.base_type);
        if let Some(default) = &domain.default {
            domain.default = Some(canonicalize_expr(default));
        }
        for check in &mut domain.checks {
            check.expression = canonicalize_expr(&check.expression);
        }
        ir.insert_domain(domain);
    }

    let types = std::mem::take(&mut ir.types);
    for (_, mut ty) in types {
        ty.name.set_default_schema(default_schema);
        if let TypeKind::Composite { columns } = &mut ty.kind {
            for (_, type_name) in columns.iter_mut() {
                *type_name = canonicalize_type_name(type_name);
            }
        }
        ir.insert_type(ty);
    }

    let sequences = std::mem::take(&mut ir.sequences);
    for (_, mut seq) in sequences {
        seq.name.set_default_schema(default_schema);
        seq.data_type = canonicalize_type_name(&seq.data_type);
        if let Some((owner, _)) = &mut seq.owned_by {
            owner.set_default_schema(default_schema);
        }
        ir.insert_sequence(seq);
    }

    for privilege in &mut ir.privileges {
        if privilege.object.schema.is_empty() {
            privilege.object.schema = default_schema.to_string();
        }
    }
    for default_privilege in &mut ir.default_privileges {
        if default_privilege.schema.is_empty() {
            default_privilege.schema = default_schema.to_string();
        }
    }
    for comment in &mut ir.comments {
        if comment.object.schema.is_empty() {
            comment.object.schema = default_schema.to_string();
        }
    }
    Ok(ir)
}

/// Expand `SELECT *` in every view's definition, resolving view-of-view
/// references by repeating the pass until nothing new resolves. Bounded at
/// `views.len() + 1` rounds — each round resolves at least one more view or
/// the loop exits, so a cycle-free dependency chain always finishes well
/// before the bound; an actual cycle (or a reference to something outside
/// `known`) just leaves the remaining views with their star unexpanded,
/// which is the same "best effort" outcome as any other unparseable
/// fragment in this module.
fn expand_views_fixpoint(views: Vec<View>, default_schema: &str, known: &mut ColumnSource) -> Vec<View> {
    let mut pending = views;
    let mut done = Vec::with_capacity(pending.len());
    let max_rounds = pending.len() + 1;

    for round in 0..=max_rounds {
        if pending.is_empty() {
            break;
        }
        let last_round = round == max_rounds;
        let mut still_pending = Vec::new();
        for mut view in pending {
            view.name.set_default_schema(default_schema);
            match expand_star(&view.definition.select_text, default_schema, known) {
                Some((text, columns)) => {
                    view.definition.select_text = canonicalize_select(&text);
                    view.definition.columns = columns;
                    known.insert(view.name.catalog_key(), view.definition.columns.clone());
                    done.push(view);
                }
                None if has_star_target(&view.definition.select_text) && !last_round => {
                    still_pending.push(view);
                }
                None => {
                    // No star present, or unresolvable even on the last
                    // round — finalize with a plain re-deparse.
                    view.definition.select_text = canonicalize_select(&view.definition.select_text);
                    known.insert(view.name.catalog_key(), view.definition.columns.clone());
                    done.push(view);
                }
            }
        }
        pending = still_pending;
    }
    done
}

/// Same shape as [`expand_views_fixpoint`] but for materialized views,
/// which may read from already-expanded plain views but are never
/// themselves read by one (Postgres forbids `CREATE VIEW ... FROM
/// <matview>` only in the sense that a plain view over a matview is legal,
/// but a matview is always a *leaf* for this planner's purposes — nothing
/// needs a matview's columns to expand its own star) — so one pass over
/// `known` (already containing every table and view) is always enough.
fn expand_matviews_fixpoint(mviews: Vec<MaterializedView>, default_schema: &str, known: &ColumnSource) -> Vec<MaterializedView> {
    mviews
        .into_iter()
        .map(|mut mv| {
            mv.name.set_default_schema(default_schema);
            match expand_star(&mv.definition.select_text, default_schema, known) {
                Some((text, columns)) => {
                    mv.definition.select_text = canonicalize_select(&text);
                    mv.definition.columns = columns;
                }
                None => {
                    mv.definition.select_text = canonicalize_select(&mv.definition.select_text);
                }
            }
            mv
        })
        .collect()
}

fn has_star_target(select_text: &str) -> bool {
    select_text.contains('*')
}

fn normalize_table(table: &mut Table, default_schema: &str) {
    table.name.set_default_schema(default_schema);
    for column in &mut table.columns {
        column.type_name = canonicalize_type_name(&column.type_name);
        if let Some(default) = &column.default {
            column.default = Some(canonicalize_expr(default));
        }
        if let GeneratedKind::Stored(expr) = &column.generated {
            column.generated = GeneratedKind::Stored(canonicalize_expr(expr));
        }
    }
    for constraint in &mut table.constraints {
        normalize_constraint(constraint, default_schema);
    }
    for index in &mut table.indexes {
        normalize_index(index);
    }
    for trigger in &mut table.triggers {
        trigger.table.set_default_schema(default_schema);
        trigger.function.set_default_schema(default_schema);
        if let Some(pred) = &trigger.when_predicate {
            trigger.when_predicate = Some(canonicalize_expr(pred));
        }
    }
    for policy in &mut table.policies {
        policy.table.set_default_schema(default_schema);
        if let Some(using) = &policy.using {
            policy.using = Some(canonicalize_expr(using));
        }
        if let Some(check) = &policy.with_check {
            policy.with_check = Some(canonicalize_expr(check));
        }
    }
    if let Some(parent) = &table.partition_of {
        if !parent.contains('.') {
            table.partition_of = Some(format!("{default_schema}.{parent}"));
        }
    }
}

fn normalize_constraint(constraint: &mut Constraint, default_schema: &str) {
    match &mut constraint.kind {
        ConstraintKind::Check { expression } => {
            *expression = canonicalize_expr(expression);
        }
        ConstraintKind::ForeignKey { ref_table, .. } => {
            ref_table.set_default_schema(default_schema);
        }
        ConstraintKind::Exclude {
            elements, predicate, ..
        } => {
            for el in elements {
                if let Some(expr) = &el.expression {
                    el.expression = Some(canonicalize_expr(expr));
                }
            }
            if let Some(pred) = predicate {
                *pred = canonicalize_expr(pred);
            }
        }
        ConstraintKind::PrimaryKey { .. } | ConstraintKind::Unique { .. } => {}
    }
}

fn normalize_index(index: &mut Index) {
    if let Some(pred) = &index.predicate {
        index.predicate = Some(canonicalize_expr(pred));
    }
    for entry in &mut index.entries {
        if let IndexKey::Expression { text, .. } = entry {
            *text = canonicalize_expr(text);
        }
    }
}

fn normalize_return_type(returns: &mut ReturnType) {
    match returns {
        ReturnType::Scalar(t) | ReturnType::SetOf(t) => {
            *t = canonicalize_type_name(t);
        }
        ReturnType::Table(cols) => {
            for (_, t) in cols.iter_mut() {
                *t = canonicalize_type_name(t);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Column, IdentityKind, QualifiedName, TypeName};

    fn bare_table(name: &str) -> Table {
        Table {
            name: QualifiedName::unqualified(name),
            columns: vec![Column {
                position: 1,
                name: "id".to_string(),
                type_name: TypeName::simple("int4"),
                nullable: false,
                default: None,
                identity: IdentityKind::None,
                generated: GeneratedKind::None,
                comment: None,
            }],
            constraints: vec![Constraint {
                name: Some("fk_customer".to_string()),
                kind: ConstraintKind::ForeignKey {
                    columns: vec!["id".to_string()],
                    ref_table: QualifiedName::unqualified("customers"),
                    ref_columns: vec!["id".to_string()],
                    on_update: crate::ir::FkAction::NoAction,
                    on_delete: crate::ir::FkAction::NoAction,
                    match_kind: crate::ir::FkMatch::Simple,
                    deferrable: false,
                    initially_deferred: false,
                },
                not_valid: false,
            }],
            indexes: vec![],
            triggers: vec![],
            policies: vec![],
            row_security_enabled: false,
            row_security_forced: false,
            partition: None,
            partition_of: None,
            comment: None,
            grants: vec![],
        }
    }

    #[test]
    fn assigns_default_schema_and_canonicalizes_column_types() {
        let mut ir = crate::ir::Ir::new();
        ir.insert_table(bare_table("orders"));
        let ir = normalize(ir, "public").unwrap();
        let table = ir.tables.get("public.orders").unwrap();
        assert_eq!(table.name.schema.as_deref(), Some("public"));
        assert_eq!(table.columns[0].type_name.name, "integer");
    }

    #[test]
    fn foreign_key_ref_table_gets_default_schema() {
        let mut ir = crate::ir::Ir::new();
        ir.insert_table(bare_table("orders"));
        let ir = normalize(ir, "public").unwrap();
        let orders = ir.tables.get("public.orders").unwrap();
        let ConstraintKind::ForeignKey { ref_table, .. } = &orders.constraints[0].kind else {
            panic!("expected foreign key constraint");
        };
        assert_eq!(ref_table.schema.as_deref(), Some("public"));
    }
}
