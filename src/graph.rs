//! The dependency graph (§4.4) — third pipeline stage.
//!
//! Takes the differ's unordered [`ChangeRecord`]s and returns them in a
//! single safe, deterministic sequence: every object is created after
//! everything it references and dropped before everything it references.
//! Ties within one dependency layer break on the stable
//! `(kind_rank, schema, name, subop_rank)` key from `ChangeRecord::sort_key`
//! — picked via a priority-ordered Kahn's algorithm rather than plain
//! `petgraph::algo::toposort` so the tie-break is baked into the traversal
//! instead of bolted on afterward.
//!
//! Dependency edges come from the object relationships named in the spec:
//! owning table (index/constraint/trigger/policy), foreign key target,
//! trigger function, view/matview `SELECT` references, sequence
//! ownership, privilege target, comment target, and schema membership.
//! Routine body references are treated as soft (§3.1 `scan_body_references`
//! doc comment) — Postgres does not resolve a function body's identifiers
//! at `CREATE FUNCTION` time, so a missing or cyclic routine edge is simply
//! dropped rather than escalated.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;

use crate::change::{ChangeKind, ChangeRecord, SubOp};
use crate::differ;
use crate::error::{PlanError, PlanResult};
use crate::ir::{ConstraintKind, Ir, ObjectKind, ObjectRef, QualifiedName};
use crate::tracer::{PlanTracer, TraceEvent};

/// Order `changes` into a single safe sequence. `old`/`new` are the same
/// normalized snapshots the differ ran over — needed here to look up the
/// full entities a bare `ObjectRef` names.
pub fn order(
    changes: Vec<ChangeRecord>,
    old: &Ir,
    new: &Ir,
    tracer: &dyn PlanTracer,
) -> PlanResult<Vec<ChangeRecord>> {
    let mut graph: StableDiGraph<ChangeRecord, ()> = StableDiGraph::new();
    let mut upsert_index: HashMap<ObjectRef, NodeIndex> = HashMap::new();
    let mut drop_index: HashMap<ObjectRef, NodeIndex> = HashMap::new();

    for record in changes {
        let object = record.object.clone();
        let kind = record.kind.clone();
        let idx = graph.add_node(record);
        match kind {
            ChangeKind::Drop => {
                drop_index.insert(object, idx);
            }
            _ => {
                upsert_index.insert(object, idx);
            }
        }
    }

    for idx in graph.node_indices().collect::<Vec<_>>() {
        let (object, kind) = {
            let r = &graph[idx];
            (r.object.clone(), r.kind.clone())
        };
        match kind {
            ChangeKind::Drop => {
                for dep in dependencies_of(&object, old) {
                    if let Some(&dep_idx) = drop_index.get(&dep) {
                        graph.update_edge(idx, dep_idx, ());
                    }
                }
            }
            _ => {
                for dep in dependencies_of(&object, new) {
                    if let Some(&dep_idx) = upsert_index.get(&dep) {
                        graph.update_edge(dep_idx, idx, ());
                    }
                }
            }
        }
    }

    // A replacement (drop+create of the same `ObjectRef` — non-prefix-
    // compatible view/matview, constraint, index, policy, enum reorder,
    // domain base-type change, routine return-type change) has no
    // dependency edge between its two halves by construction, since
    // `dependencies_of` only walks *references to other objects*. Without
    // an edge here the stable toposort is free to pop the create before
    // the drop (drop records sort with an inverted rank, but that only
    // breaks ties within one topological layer — it is not itself an
    // ordering guarantee), so the script would create the replacement and
    // then immediately drop it, colliding on the name it just took. Force
    // the one true order explicitly: drop always precedes its same-named
    // create.
    for (object, &drop_idx) in &drop_index {
        if let Some(&create_idx) = upsert_index.get(object) {
            graph.update_edge(drop_idx, create_idx, ());
        }
    }

    add_soft_view_function_edges(&mut graph, &upsert_index, new);

    break_cycles(&mut graph, new, tracer)?;

    stable_toposort(&graph).map_err(|stuck| {
        let objects = stuck.into_iter().map(|n| graph[n].object.clone()).collect();
        PlanError::UnresolvableCycle(objects)
    })
}

fn schema_ref(schema: &str) -> ObjectRef {
    ObjectRef::new(ObjectKind::Schema, schema, schema)
}

/// Every object a change's target must already exist relative to, resolved
/// against `ir` (the `new` snapshot for creates/alters, `old` for drops).
fn dependencies_of(object: &ObjectRef, ir: &Ir) -> Vec<ObjectRef> {
    let mut deps = Vec::new();
    if object.kind != ObjectKind::Schema {
        deps.push(schema_ref(&object.schema));
    }
    match object.kind {
        ObjectKind::Table => {
            if let Some(table) = differ::find_table(ir, object)
                && let Some(parent_key) = &table.partition_of
                && let Some(parent) = differ::owner_ref(ir, parent_key)
            {
                deps.push(parent);
            }
        }
        ObjectKind::Index => {
            if let Some(q) = object.qualifier.as_deref()
                && let Some(owner) = differ::owner_ref(ir, q)
            {
                deps.push(owner);
            }
        }
        ObjectKind::Constraint => {
            if let Some(q) = object.qualifier.as_deref()
                && let Some(owner) = differ::owner_ref(ir, q)
            {
                deps.push(owner);
            }
            if let Some((_, constraint)) = differ::find_constraint(ir, object)
                && let ConstraintKind::ForeignKey { ref_table, ref_columns, .. } = &constraint.kind
            {
                deps.push(ObjectRef::new(
                    ObjectKind::Table,
                    ref_table.schema.clone().unwrap_or_default(),
                    ref_table.name.clone(),
                ));
                // §4.4 rule 1: a foreign key also depends on the referenced
                // table's backing unique/primary-key constraint, not just
                // the table itself — Postgres rejects `ADD CONSTRAINT ...
                // FOREIGN KEY` unless a matching unique index already
                // exists, so when that constraint is itself being created
                // in this same plan it must be ordered first.
                let ref_key = ref_table.catalog_key();
                if let Some(ref_table_ir) = ir.tables.get(&ref_key) {
                    let ref_columns: HashSet<&str> = ref_columns.iter().map(String::as_str).collect();
                    if let Some(pk_or_unique) = ref_table_ir.constraints.iter().find(|c| {
                        matches!(c.kind, ConstraintKind::PrimaryKey { .. } | ConstraintKind::Unique { .. })
                            && c.columns().iter().map(String::as_str).collect::<HashSet<_>>() == ref_columns
                    }) {
                        deps.push(differ::constraint_ref(ref_table_ir, pk_or_unique));
                    }
                }
            }
        }
        ObjectKind::Trigger => {
            if let Some(q) = object.qualifier.as_deref()
                && let Some(owner) = differ::owner_ref(ir, q)
            {
                deps.push(owner);
            }
            if let Some((_, trigger)) = differ::find_trigger(ir, object) {
                deps.push(ObjectRef::new(
                    ObjectKind::Function,
                    trigger.function.schema.clone().unwrap_or_default(),
                    trigger.function.name.clone(),
                ));
            }
        }
        ObjectKind::Policy => {
            if let Some(q) = object.qualifier.as_deref()
                && let Some(owner) = differ::owner_ref(ir, q)
            {
                deps.push(owner);
            }
        }
        ObjectKind::View => {
            if let Some(view) = differ::find_view(ir, object) {
                for referenced in &view.definition.referenced_objects {
                    if let Some(r) = resolve_ref_kind(ir, referenced) {
                        deps.push(r);
                    }
                }
            }
        }
        ObjectKind::MaterializedView => {
            if let Some(mv) = differ::find_materialized_view(ir, object) {
                for referenced in &mv.definition.referenced_objects {
                    if let Some(r) = resolve_ref_kind(ir, referenced) {
                        deps.push(r);
                    }
                }
            }
        }
        ObjectKind::Sequence => {
            if let Some(seq) = differ::find_sequence(ir, object)
                && let Some((owner_table, _)) = &seq.owned_by
            {
                deps.push(ObjectRef::new(
                    ObjectKind::Table,
                    owner_table.schema.clone().unwrap_or_default(),
                    owner_table.name.clone(),
                ));
            }
        }
        ObjectKind::Privilege => {
            if let Some(priv_) = differ::find_privilege(ir, object) {
                deps.push(priv_.object.clone());
            }
        }
        ObjectKind::Comment => {
            if let Some(qualifier) = &object.qualifier
                && let Some(target_kind) = parse_kind_debug(qualifier)
            {
                deps.push(ObjectRef::new(target_kind, object.schema.clone(), object.name.clone()));
            }
        }
        ObjectKind::Schema
        | ObjectKind::Extension
        | ObjectKind::Type
        | ObjectKind::Domain
        | ObjectKind::Function
        | ObjectKind::Procedure
        | ObjectKind::DefaultPrivilege => {}
    }
    deps
}

fn resolve_ref_kind(ir: &Ir, name: &QualifiedName) -> Option<ObjectRef> {
    let key = name.catalog_key();
    let schema = name.schema.clone().unwrap_or_default();
    if ir.tables.contains_key(&key) {
        return Some(ObjectRef::new(ObjectKind::Table, schema, name.name.clone()));
    }
    if ir.views.contains_key(&key) {
        return Some(ObjectRef::new(ObjectKind::View, schema, name.name.clone()));
    }
    if ir.materialized_views.contains_key(&key) {
        return Some(ObjectRef::new(ObjectKind::MaterializedView, schema, name.name.clone()));
    }
    None
}

fn parse_kind_debug(text: &str) -> Option<ObjectKind> {
    Some(match text {
        "Schema" => ObjectKind::Schema,
        "Extension" => ObjectKind::Extension,
        "Type" => ObjectKind::Type,
        "Domain" => ObjectKind::Domain,
        "Sequence" => ObjectKind::Sequence,
        "Table" => ObjectKind::Table,
        "Index" => ObjectKind::Index,
        "Constraint" => ObjectKind::Constraint,
        "Function" => ObjectKind::Function,
        "Procedure" => ObjectKind::Procedure,
        "View" => ObjectKind::View,
        "MaterializedView" => ObjectKind::MaterializedView,
        "Trigger" => ObjectKind::Trigger,
        "Policy" => ObjectKind::Policy,
        "Privilege" => ObjectKind::Privilege,
        "DefaultPrivilege" => ObjectKind::DefaultPrivilege,
        "Comment" => ObjectKind::Comment,
        _ => return None,
    })
}

/// Best-effort edges from a view/matview/function's body text to the
/// tables and views it mentions, skipped entirely when they would create a
/// cycle — the graph's hard edges are always sufficient for a safe order;
/// these only tighten it for readability.
fn add_soft_view_function_edges(
    graph: &mut StableDiGraph<ChangeRecord, ()>,
    upsert_index: &HashMap<ObjectRef, NodeIndex>,
    new_ir: &Ir,
) {
    let candidates: Vec<QualifiedName> = new_ir
        .tables
        .values()
        .map(|t| t.name.clone())
        .chain(new_ir.views.values().map(|v| v.name.clone()))
        .chain(new_ir.routines.values().map(|r| r.name.clone()))
        .collect();

    for (object_ref, &idx) in upsert_index {
        if !matches!(object_ref.kind, ObjectKind::Function | ObjectKind::Procedure) {
            continue;
        }
        let Some(routine) = differ::find_routine(new_ir, object_ref) else {
            continue;
        };
        for referenced in crate::ir::routine::scan_body_references(&routine.body, &candidates) {
            for dep_idx in resolve_dep_indices(new_ir, upsert_index, &referenced) {
                if dep_idx == idx {
                    continue;
                }
                let edge = graph.update_edge(dep_idx, idx, ());
                if is_cyclic_directed(&*graph) {
                    graph.remove_edge(edge);
                }
            }
        }
    }
}

fn break_cycles(
    graph: &mut StableDiGraph<ChangeRecord, ()>,
    new_ir: &Ir,
    tracer: &dyn PlanTracer,
) -> PlanResult<()> {
    loop {
        let sccs = tarjan_scc(&*graph);
        let mut broke_any = false;
        for scc in sccs.into_iter().filter(|s| s.len() > 1) {
            if let Some(fk_node) = scc.iter().copied().find(|&n| is_fk_create(graph, n, new_ir)) {
                break_fk_cycle(graph, fk_node, &scc, new_ir, tracer);
                broke_any = true;
                break;
            }
            if let Some(edge) = find_any_internal_edge(graph, &scc) {
                let objects: Vec<ObjectRef> = scc.iter().map(|&n| graph[n].object.clone()).collect();
                graph.remove_edge(edge);
                tracer.trace(TraceEvent::CycleBroken {
                    objects: &objects,
                    strategy: "arbitrary-edge-removal",
                });
                broke_any = true;
                break;
            }
        }
        if !broke_any {
            break;
        }
    }

    if let Some(scc) = tarjan_scc(&*graph).into_iter().find(|s| s.len() > 1) {
        let objects = scc.into_iter().map(|n| graph[n].object.clone()).collect();
        return Err(PlanError::UnresolvableCycle(objects));
    }
    Ok(())
}

fn is_fk_create(graph: &StableDiGraph<ChangeRecord, ()>, node: NodeIndex, new_ir: &Ir) -> bool {
    let record = &graph[node];
    record.object.kind == ObjectKind::Constraint
        && matches!(record.kind, ChangeKind::Create)
        && differ::find_constraint(new_ir, &record.object)
            .map(|(_, c)| matches!(c.kind, ConstraintKind::ForeignKey { .. }))
            .unwrap_or(false)
}

fn find_any_internal_edge(
    graph: &StableDiGraph<ChangeRecord, ()>,
    scc: &[NodeIndex],
) -> Option<petgraph::stable_graph::EdgeIndex> {
    let members: HashSet<NodeIndex> = scc.iter().copied().collect();
    for &n in scc {
        for neighbor in graph.neighbors_directed(n, Direction::Outgoing) {
            if members.contains(&neighbor)
                && let Some(edge) = graph.find_edge(n, neighbor)
            {
                return Some(edge);
            }
        }
    }
    None
}

/// Rewrite a foreign-key constraint's `Create` node in place as a
/// `NOT VALID` add followed by a deferred validate, and drop the one
/// in-cycle incoming edge that made it unsafe to create eagerly. The
/// referenced table must still exist before the constraint is added (hence
/// the owning-table edge survives) — only the edge from the *other* cycle
/// member is removed, since a `NOT VALID` add does not require its
/// reference to already hold valid data.
fn break_fk_cycle(
    graph: &mut StableDiGraph<ChangeRecord, ()>,
    fk_node: NodeIndex,
    scc: &[NodeIndex],
    new_ir: &Ir,
    tracer: &dyn PlanTracer,
) {
    let members: HashSet<NodeIndex> = scc.iter().copied().collect();
    let incoming: Vec<NodeIndex> = graph
        .neighbors_directed(fk_node, Direction::Incoming)
        .filter(|n| members.contains(n))
        .collect();
    for pred in incoming {
        if let Some(edge) = graph.find_edge(pred, fk_node) {
            graph.remove_edge(edge);
        }
    }

    let object = graph[fk_node].object.clone();
    if let Some((_, constraint)) = differ::find_constraint(new_ir, &object) {
        let mut not_valid = constraint.clone();
        not_valid.not_valid = true;
        let name = constraint.name.clone().unwrap_or_default();
        graph[fk_node] = ChangeRecord::alter(
            object,
            vec![
                SubOp::AddConstraint { constraint: not_valid },
                SubOp::ValidateConstraint { name },
            ],
        );
    }

    let objects: Vec<ObjectRef> = scc.iter().map(|&n| graph[n].object.clone()).collect();
    tracer.trace(TraceEvent::CycleBroken {
        objects: &objects,
        strategy: "fk_not_valid",
    });
}

/// Kahn's algorithm with a min-heap frontier ordered by `sort_key` — ties
/// among simultaneously-ready nodes resolve deterministically instead of
/// depending on insertion order, unlike `petgraph::algo::toposort`.
fn stable_toposort(graph: &StableDiGraph<ChangeRecord, ()>) -> Result<Vec<ChangeRecord>, Vec<NodeIndex>> {
    let mut indegree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
        .collect();

    type SortKey = (u16, String, String, u8);
    let mut heap: BinaryHeap<Reverse<(SortKey, NodeIndex)>> = BinaryHeap::new();
    for (&n, &deg) in &indegree {
        if deg == 0 {
            heap.push(Reverse((graph[n].sort_key(), n)));
        }
    }

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((_, n))) = heap.pop() {
        order.push(n);
        for neighbor in graph.neighbors_directed(n, Direction::Outgoing) {
            let deg = indegree.get_mut(&neighbor).expect("every node has an indegree entry");
            *deg -= 1;
            if *deg == 0 {
                heap.push(Reverse((graph[neighbor].sort_key(), neighbor)));
            }
        }
    }

    if order.len() == graph.node_count() {
        Ok(order.into_iter().map(|n| graph[n].clone()).collect())
    } else {
        let done: HashSet<NodeIndex> = order.into_iter().collect();
        Err(graph.node_indices().filter(|n| !done.contains(n)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::IrBuilder;
    use crate::ir::ObjectKind as K;

    #[test]
    fn table_create_orders_before_its_index_and_constraint() {
        let old = Ir::new();
        let new = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false)
                    .column("status", "text", true)
                    .pk(&["id"])
                    .index("idx_status", &["status"], false);
            })
            .build();
        let changes = differ::diff(&old, &new);
        let ordered = order(changes, &old, &new, &crate::tracer::SilentTracer).expect("no cycle");

        let pos = |kind: K| ordered.iter().position(|c| c.object.kind == kind).unwrap();
        assert!(pos(K::Table) < pos(K::Constraint));
        assert!(pos(K::Table) < pos(K::Index));
    }

    #[test]
    fn dropped_table_orders_after_its_dropped_constraint() {
        let old = IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false).pk(&["id"]);
            })
            .build();
        let new = Ir::new();
        let changes = differ::diff(&old, &new);
        let ordered = order(changes, &old, &new, &crate::tracer::SilentTracer).expect("no cycle");

        let constraint_pos = ordered.iter().position(|c| c.object.kind == K::Constraint).unwrap();
        let table_pos = ordered.iter().position(|c| c.object.kind == K::Table).unwrap();
        assert!(constraint_pos < table_pos);
    }

    #[test]
    fn foreign_key_constraint_orders_after_both_tables() {
        let old = Ir::new();
        let new = IrBuilder::new()
            .table("public", "customers", |t| {
                t.column("id", "integer", false).pk(&["id"]);
            })
            .table("public", "orders", |t| {
                t.column("id", "integer", false)
                    .column("customer_id", "integer", false)
                    .pk(&["id"])
                    .fk("fk_customer", &["customer_id"], "public", "customers", &["id"]);
            })
            .build();
        let changes = differ::diff(&old, &new);
        let ordered = order(changes, &old, &new, &crate::tracer::SilentTracer).expect("no cycle");

        let fk_pos = ordered
            .iter()
            .position(|c| {
                c.object.kind == K::Constraint && matches!(c.kind, ChangeKind::Create) && c.object.name == "fk_customer"
            })
            .unwrap();
        let customers_pos = ordered
            .iter()
            .position(|c| c.object.kind == K::Table && c.object.name == "customers")
            .unwrap();
        let orders_pos = ordered
            .iter()
            .position(|c| c.object.kind == K::Table && c.object.name == "orders")
            .unwrap();
        assert!(customers_pos < fk_pos);
        assert!(orders_pos < fk_pos);
    }

    #[test]
    fn foreign_key_orders_after_referenced_table_s_unique_constraint() {
        let old = Ir::new();
        let new = IrBuilder::new()
            .table("public", "customers", |t| {
                t.column("id", "integer", false)
                    .column("email", "text", false)
                    .unique("customers_email_key", &["email"]);
            })
            .table("public", "orders", |t| {
                t.column("id", "integer", false)
                    .column("customer_email", "text", false)
                    .pk(&["id"])
                    .fk("fk_customer_email", &["customer_email"], "public", "customers", &["email"]);
            })
            .build();
        let changes = differ::diff(&old, &new);
        let ordered = order(changes, &old, &new, &crate::tracer::SilentTracer).expect("no cycle");

        let fk_pos = ordered
            .iter()
            .position(|c| {
                c.object.kind == K::Constraint
                    && matches!(c.kind, ChangeKind::Create)
                    && c.object.name == "fk_customer_email"
            })
            .unwrap();
        let unique_pos = ordered
            .iter()
            .position(|c| {
                c.object.kind == K::Constraint
                    && matches!(c.kind, ChangeKind::Create)
                    && c.object.name == "customers_email_key"
            })
            .unwrap();
        assert!(
            unique_pos < fk_pos,
            "the referenced table's backing UNIQUE constraint must be created before the foreign key that relies on it"
        );
    }

    #[test]
    fn replacement_drops_before_its_same_named_create() {
        let old = IrBuilder::new()
            .view("public", "item_extended", "SELECT i.id, i.status FROM item i", &["id", "status"])
            .build();
        let new = IrBuilder::new()
            .view("public", "item_extended", "SELECT i.id, i.title FROM item i", &["id", "title"])
            .build();
        let changes = differ::diff(&old, &new);
        let ordered = order(changes, &old, &new, &crate::tracer::SilentTracer).expect("no cycle");

        let drop_pos = ordered
            .iter()
            .position(|c| c.object.kind == K::View && matches!(c.kind, ChangeKind::Drop))
            .unwrap();
        let create_pos = ordered
            .iter()
            .position(|c| c.object.kind == K::View && matches!(c.kind, ChangeKind::Create))
            .unwrap();
        assert!(
            drop_pos < create_pos,
            "a replaced object's drop must precede its same-named create"
        );
    }
}
