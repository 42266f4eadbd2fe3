//! Top-level IR container: a full snapshot of one database's schema (§3.1).

use std::collections::{BTreeMap, HashSet};

use crate::ir::domain_type::{Domain, UserType};
use crate::ir::privilege::{DefaultPrivilege, Privilege};
use crate::ir::routine::Routine;
use crate::ir::sequence::Sequence;
use crate::ir::table::Table;
use crate::ir::view::{MaterializedView, View};

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDef {
    pub name: String,
    pub comment: Option<String>,
}

/// A normalized snapshot of a full database schema. Immutable after
/// normalization (§3.4) — the Differ only ever reads two of these.
///
/// Collections are keyed by catalog key (`schema.name`, or
/// `schema.name(arg_types)` for routines) in a `BTreeMap` so that iteration
/// order is already deterministic before the dependency graph imposes its
/// own stable ordering — this makes intermediate debugging output and
/// snapshot tests reproducible independent of hashmap iteration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ir {
    pub schemas: Vec<SchemaDef>,
    pub tables: BTreeMap<String, Table>,
    pub views: BTreeMap<String, View>,
    pub materialized_views: BTreeMap<String, MaterializedView>,
    pub routines: BTreeMap<String, Routine>,
    pub domains: BTreeMap<String, Domain>,
    pub types: BTreeMap<String, UserType>,
    pub sequences: BTreeMap<String, Sequence>,
    pub privileges: Vec<Privilege>,
    pub default_privileges: Vec<DefaultPrivilege>,
    pub comments: Vec<crate::ir::comment::Comment>,
    /// Names declared external (e.g. an extension-provided type or a
    /// cross-database reference) — resolving against this set never
    /// triggers `ReferenceResolution` (§4.1).
    pub external_names: HashSet<String>,
}

impl Ir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_table(&self, key: &str) -> bool {
        self.tables.contains_key(key)
    }

    pub fn insert_table(&mut self, table: Table) {
        self.tables.insert(table.catalog_key(), table);
    }

    pub fn insert_view(&mut self, view: View) {
        self.views.insert(view.name.catalog_key(), view);
    }

    pub fn insert_materialized_view(&mut self, mv: MaterializedView) {
        self.materialized_views.insert(mv.name.catalog_key(), mv);
    }

    pub fn insert_routine(&mut self, routine: Routine) {
        self.routines.insert(routine.signature_key(), routine);
    }

    pub fn insert_domain(&mut self, domain: Domain) {
        self.domains.insert(domain.name.catalog_key(), domain);
    }

    pub fn insert_type(&mut self, ty: UserType) {
        self.types.insert(ty.name.catalog_key(), ty);
    }

    pub fn insert_sequence(&mut self, seq: Sequence) {
        self.sequences.insert(seq.name.catalog_key(), seq);
    }

    /// Whether `name` is resolvable anywhere in this IR: as a table, view,
    /// matview, routine (by bare schema.name prefix, ignoring overload
    /// arity), domain, type, sequence, or an explicitly external name.
    pub fn resolves(&self, catalog_key: &str) -> bool {
        self.tables.contains_key(catalog_key)
            || self.views.contains_key(catalog_key)
            || self.materialized_views.contains_key(catalog_key)
            || self.domains.contains_key(catalog_key)
            || self.types.contains_key(catalog_key)
            || self.sequences.contains_key(catalog_key)
            || self
                .routines
                .keys()
                .any(|k| k.starts_with(&format!("{catalog_key}(")))
            || self.external_names.contains(catalog_key)
    }
}
