//! Orchestration (§4, §7) — wires the five pipeline stages together and is
//! the crate's one public entry point besides the IR types themselves.
//!
//! `plan()` mirrors the teacher's `Linter::run` shape: validate
//! configuration up front, run each stage in sequence, and turn the first
//! error from any stage into the caller's result rather than trying to
//! produce a partial script.

use crate::config::PlannerConfig;
use crate::differ;
use crate::emit;
use crate::error::{PlanError, PlanResult};
use crate::format;
use crate::graph;
use crate::ignore::IgnoreFile;
use crate::ir::{Ir, ObjectKind, ObjectRef};
use crate::normalize;
use crate::tracer::{PlanTracer, SilentTracer};

/// Everything a caller gets back from one `plan()` run: the rendered
/// script plus the change-set it was built from, for callers that want to
/// inspect or log individual decisions rather than just the final text.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutput {
    pub script: String,
    pub changes: Vec<crate::change::ChangeRecord>,
}

/// Compute a migration plan from `old` to `new` (§1). `ignore` filters both
/// snapshots identically before the differ ever sees them (§6.4); pass
/// [`IgnoreFile::default`] for no filtering. `tracer` receives diagnostic
/// events from every stage; pass `&SilentTracer` when none are wanted.
pub fn plan(old: Ir, new: Ir, config: &PlannerConfig, ignore: &IgnoreFile, tracer: &dyn PlanTracer) -> PlanResult<PlanOutput> {
    config
        .validate()
        .map_err(|_| PlanError::PolicyConflict)?;

    let mut old = normalize::normalize(old, &config.target_schema)?;
    let mut new = normalize::normalize(new, &config.target_schema)?;

    ignore.apply(&mut old);
    ignore.apply(&mut new);

    validate_references(&new)?;

    let changes = differ::diff(&old, &new);
    let changes = emit::expand_for_online(changes, &new, config);
    let changes = graph::order(changes, &old, &new, tracer)?;
    let statements = emit::render(changes.clone(), &old, &new, config)?;
    let script = format::render_script(&statements, config);

    Ok(PlanOutput { script, changes })
}

/// Convenience entry point for callers with no interest in tracing.
pub fn plan_silent(old: Ir, new: Ir, config: &PlannerConfig, ignore: &IgnoreFile) -> PlanResult<PlanOutput> {
    plan(old, new, config, ignore, &SilentTracer)
}

/// §4.1: every "hard" cross-object reference in `ir` must resolve to
/// something `ir` itself defines, or be declared external. Routine bodies
/// are exempt (§4.4 doc comment on `graph::order` — Postgres itself does
/// not resolve them at `CREATE FUNCTION` time, so the graph treats a
/// dangling body reference as absent rather than an error).
fn validate_references(ir: &Ir) -> PlanResult<()> {
    for table in ir.tables.values() {
        for constraint in &table.constraints {
            if let crate::ir::ConstraintKind::ForeignKey { ref_table, .. } = &constraint.kind {
                let key = ref_table.catalog_key();
                if !ir.resolves(&key) {
                    return Err(PlanError::ReferenceResolution {
                        object: ObjectRef::new(ObjectKind::Table, &table.name.schema.clone().unwrap_or_default(), &table.name.name),
                        unresolved_name: key,
                    });
                }
            }
        }
        for trigger in &table.triggers {
            let key = trigger.function.catalog_key();
            if !ir.resolves(&key) {
                return Err(PlanError::ReferenceResolution {
                    object: ObjectRef::new(ObjectKind::Trigger, &table.name.schema.clone().unwrap_or_default(), &trigger.name),
                    unresolved_name: key,
                });
            }
        }
    }

    for view in ir.views.values() {
        for reference in &view.definition.referenced_objects {
            let key = reference.catalog_key();
            if !ir.resolves(&key) {
                return Err(PlanError::ReferenceResolution {
                    object: ObjectRef::new(ObjectKind::View, &view.name.schema.clone().unwrap_or_default(), &view.name.name),
                    unresolved_name: key,
                });
            }
        }
    }

    for mv in ir.materialized_views.values() {
        for reference in &mv.definition.referenced_objects {
            let key = reference.catalog_key();
            if !ir.resolves(&key) {
                return Err(PlanError::ReferenceResolution {
                    object: ObjectRef::new(ObjectKind::MaterializedView, &mv.name.schema.clone().unwrap_or_default(), &mv.name.name),
                    unresolved_name: key,
                });
            }
        }
    }

    for sequence in ir.sequences.values() {
        if let Some((table, _column)) = &sequence.owned_by {
            let key = table.catalog_key();
            if !ir.resolves(&key) {
                return Err(PlanError::ReferenceResolution {
                    object: ObjectRef::new(ObjectKind::Sequence, &sequence.name.schema.clone().unwrap_or_default(), &sequence.name.name),
                    unresolved_name: key,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::IrBuilder;

    #[test]
    fn plan_rejects_online_with_transactional() {
        let old = Ir::new();
        let new = Ir::new();
        let config = PlannerConfig {
            online: true,
            transactional: true,
            ..PlannerConfig::default()
        };
        let result = plan_silent(old, new, &config, &IgnoreFile::new());
        assert!(matches!(result, Err(PlanError::PolicyConflict)));
    }

    #[test]
    fn plan_rejects_dangling_foreign_key() {
        let old = Ir::new();
        let new = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false)
                    .column("customer_id", "integer", false)
                    .pk(&["id"])
                    .fk("fk_customer", &["customer_id"], "public", "customers", &["id"]);
            })
            .build();
        let result = plan_silent(old, new, &PlannerConfig::default(), &IgnoreFile::new());
        assert!(matches!(result, Err(PlanError::ReferenceResolution { .. })));
    }

    #[test]
    fn plan_creates_new_table_end_to_end() {
        let old = Ir::new();
        let new = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false).pk(&["id"]);
            })
            .build();
        let output = plan_silent(old, new, &PlannerConfig::default(), &IgnoreFile::new()).unwrap();
        assert!(output.script.contains("CREATE TABLE orders"));
        assert!(output.script.contains("ADD CONSTRAINT"));
    }

    #[test]
    fn plan_is_idempotent_on_equal_snapshots() {
        let ir = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false).pk(&["id"]);
            })
            .build();
        let output = plan_silent(ir.clone(), ir, &PlannerConfig::default(), &IgnoreFile::new()).unwrap();
        assert!(output.changes.is_empty());
    }
}
