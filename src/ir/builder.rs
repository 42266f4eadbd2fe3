//! Test harness for building [`Ir`] snapshots.
//!
//! A fluent API for constructing schema state in unit and property tests,
//! generalizing the teacher's `CatalogBuilder`/`TableBuilder` pair (which
//! only knew about tables) to every IR entity the planner reasons about.
//!
//! ```
//! use pgschema_plan::ir::builder::IrBuilder;
//!
//! let ir = IrBuilder::new()
//!     .table("public", "orders", |t| {
//!         t.column("id", "integer", false)
//!          .column("status", "text", true)
//!          .pk(&["id"])
//!          .index("idx_status", &["status"], false);
//!     })
//!     .build();
//! ```

use crate::ir::common::{QualifiedName, TypeName};
use crate::ir::routine::{ArgMode, Argument, Parallelism, ReturnType, Routine, RoutineKind, Security, Volatility};
use crate::ir::sequence::Sequence;
use crate::ir::table::{
    Column, Constraint, ConstraintKind, FkAction, FkMatch, GeneratedKind, IdentityKind, Index,
    IndexKey, NullsOrder, SortDirection, Table,
};
use crate::ir::view::{View, ViewDefinition};
use crate::ir::Ir;

pub struct IrBuilder {
    ir: Ir,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self { ir: Ir::new() }
    }

    pub fn table(mut self, schema: &str, name: &str, f: impl FnOnce(&mut TableBuilder)) -> Self {
        let mut builder = TableBuilder::new(schema, name);
        f(&mut builder);
        self.ir.insert_table(builder.build());
        self
    }

    pub fn view(mut self, schema: &str, name: &str, select_text: &str, columns: &[&str]) -> Self {
        self.ir.insert_view(View {
            name: QualifiedName::qualified(schema, name),
            definition: ViewDefinition {
                select_text: select_text.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                referenced_objects: vec![],
            },
            comment: None,
            column_comments: vec![],
        });
        self
    }

    pub fn function(mut self, schema: &str, name: &str, f: impl FnOnce(&mut RoutineBuilder)) -> Self {
        let mut builder = RoutineBuilder::new(schema, name);
        f(&mut builder);
        self.ir.insert_routine(builder.build());
        self
    }

    pub fn sequence(mut self, schema: &str, name: &str) -> Self {
        self.ir.insert_sequence(Sequence {
            name: QualifiedName::qualified(schema, name),
            data_type: TypeName::simple("bigint"),
            start: 1,
            increment: 1,
            min_value: None,
            max_value: None,
            cache: 1,
            cycle: false,
            owned_by: None,
            comment: None,
        });
        self
    }

    pub fn build(self) -> Ir {
        self.ir
    }
}

impl Default for IrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            table: Table {
                name: QualifiedName::qualified(schema, name),
                columns: vec![],
                constraints: vec![],
                indexes: vec![],
                triggers: vec![],
                policies: vec![],
                row_security_enabled: false,
                row_security_forced: false,
                partition: None,
                partition_of: None,
                comment: None,
                grants: vec![],
            },
        }
    }

    pub fn column(&mut self, name: &str, type_name: &str, nullable: bool) -> &mut Self {
        let position = self.table.columns.len() + 1;
        self.table.columns.push(Column {
            position,
            name: name.to_string(),
            type_name: TypeName::simple(type_name),
            nullable,
            default: None,
            identity: IdentityKind::None,
            generated: GeneratedKind::None,
            comment: None,
        });
        self
    }

    pub fn column_with_default(
        &mut self,
        name: &str,
        type_name: &str,
        nullable: bool,
        default: &str,
    ) -> &mut Self {
        let position = self.table.columns.len() + 1;
        self.table.columns.push(Column {
            position,
            name: name.to_string(),
            type_name: TypeName::simple(type_name),
            nullable,
            default: Some(default.to_string()),
            identity: IdentityKind::None,
            generated: GeneratedKind::None,
            comment: None,
        });
        self
    }

    pub fn pk(&mut self, columns: &[&str]) -> &mut Self {
        self.table.constraints.push(Constraint {
            name: Some(format!("{}_pkey", self.table.name.name)),
            kind: ConstraintKind::PrimaryKey {
                columns: columns.iter().map(|s| s.to_string()).collect(),
            },
            not_valid: false,
        });
        self
    }

    pub fn unique(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        self.table.constraints.push(Constraint {
            name: Some(name.to_string()),
            kind: ConstraintKind::Unique {
                columns: columns.iter().map(|s| s.to_string()).collect(),
            },
            not_valid: false,
        });
        self
    }

    pub fn check(&mut self, name: &str, expression: &str) -> &mut Self {
        self.table.constraints.push(Constraint {
            name: Some(name.to_string()),
            kind: ConstraintKind::Check {
                expression: expression.to_string(),
            },
            not_valid: false,
        });
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fk(
        &mut self,
        name: &str,
        columns: &[&str],
        ref_schema: &str,
        ref_table: &str,
        ref_columns: &[&str],
    ) -> &mut Self {
        self.table.constraints.push(Constraint {
            name: Some(name.to_string()),
            kind: ConstraintKind::ForeignKey {
                columns: columns.iter().map(|s| s.to_string()).collect(),
                ref_table: QualifiedName::qualified(ref_schema, ref_table),
                ref_columns: ref_columns.iter().map(|s| s.to_string()).collect(),
                on_update: FkAction::NoAction,
                on_delete: FkAction::NoAction,
                match_kind: FkMatch::Simple,
                deferrable: false,
                initially_deferred: false,
            },
            not_valid: false,
        });
        self
    }

    pub fn index(&mut self, name: &str, columns: &[&str], unique: bool) -> &mut Self {
        self.table.indexes.push(Index {
            name: name.to_string(),
            method: "btree".to_string(),
            entries: columns
                .iter()
                .map(|c| IndexKey::Column {
                    name: c.to_string(),
                    collation: None,
                    opclass: None,
                    sort: SortDirection::Asc,
                    nulls: NullsOrder::Last,
                })
                .collect(),
            include: vec![],
            predicate: None,
            unique,
            concurrent: false,
        });
        self
    }

    pub fn build(self) -> Table {
        self.table
    }
}

pub struct RoutineBuilder {
    routine: Routine,
}

impl RoutineBuilder {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            routine: Routine {
                kind: RoutineKind::Function,
                name: QualifiedName::qualified(schema, name),
                args: vec![],
                returns: Some(ReturnType::Scalar(TypeName::simple("void"))),
                language: "plpgsql".to_string(),
                volatility: Volatility::Volatile,
                strict: false,
                security: Security::Invoker,
                parallel: Parallelism::Unsafe,
                leakproof: false,
                body: String::new(),
                set_clauses: vec![],
                comment: None,
            },
        }
    }

    pub fn arg(&mut self, name: &str, type_name: &str) -> &mut Self {
        self.routine.args.push(Argument {
            mode: ArgMode::In,
            name: Some(name.to_string()),
            type_name: TypeName::simple(type_name),
            default: None,
        });
        self
    }

    pub fn returns(&mut self, type_name: &str) -> &mut Self {
        self.routine.returns = Some(ReturnType::Scalar(TypeName::simple(type_name)));
        self
    }

    pub fn body(&mut self, body: &str) -> &mut Self {
        self.routine.body = body.to_string();
        self
    }

    pub fn build(self) -> Routine {
        self.routine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_constructs_table_with_pk_and_index() {
        let ir = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false)
                    .column("customer_id", "integer", false)
                    .column("status", "text", true)
                    .pk(&["id"])
                    .fk("fk_customer", &["customer_id"], "public", "customers", &["id"])
                    .index("idx_status", &["status"], false);
            })
            .build();

        let orders = ir.tables.get("public.orders").unwrap();
        assert_eq!(orders.columns.len(), 3);
        assert_eq!(orders.indexes.len(), 1);
        assert_eq!(orders.constraints.len(), 2);
    }

    #[test]
    fn builder_constructs_view_and_function() {
        let ir = IrBuilder::new()
            .view("public", "active_orders", "SELECT id FROM public.orders", &["id"])
            .function("public", "total", |f| {
                f.arg("order_id", "integer").returns("numeric").body("SELECT 1");
            })
            .build();

        assert!(ir.views.contains_key("public.active_orders"));
        assert!(ir.routines.contains_key("public.total(integer)"));
    }
}
