//! Shared IR value types: qualified names, canonical type names, object
//! identity, and the kind-ordering table used for deterministic output.

use std::fmt;

/// Schema-qualified name. After normalization `schema` is always `Some` —
/// the Normalizer assigns the configured default schema to every
/// unqualified reference (mirrors the teacher's `normalize_schemas`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Assign `default_schema` if no schema is set. Idempotent.
    pub fn set_default_schema(&mut self, default_schema: &str) {
        if self.schema.is_none() {
            self.schema = Some(default_schema.to_string());
        }
    }

    /// Key used for equality/lookup across IRs. Requires normalization to
    /// have run (schema must be set) to compare meaningfully.
    pub fn catalog_key(&self) -> String {
        match &self.schema {
            Some(s) => format!("{s}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Render with the qualifier dropped when it equals `target_schema`
    /// (the Formatter's implicit-qualification policy, §3.3 / §4.5).
    pub fn display_in(&self, target_schema: &str) -> String {
        match &self.schema {
            Some(s) if s == target_schema => self.name.clone(),
            Some(s) => format!("{s}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(s) => write!(f, "{s}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A canonicalized SQL type name with its modifiers, e.g. `numeric(10,2)`
/// or `vector(1536)`. Canonicalization (alias resolution) happens in the
/// Normalizer; modifiers are preserved exactly (§3.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    /// Canonical base type name, lowercased: "integer", "character varying", …
    pub name: String,
    pub modifiers: Vec<i64>,
    /// Array dimensionality (`integer[]` => 1, `integer[][]` => 2, …). Zero
    /// for non-array types.
    pub array_dims: u8,
}

impl TypeName {
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            modifiers: vec![],
            array_dims: 0,
        }
    }

    pub fn with_modifiers(name: impl Into<String>, modifiers: Vec<i64>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            modifiers,
            array_dims: 0,
        }
    }

    pub fn array_of(mut self, dims: u8) -> Self {
        self.array_dims = dims;
        self
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.modifiers.is_empty() {
            let mods: Vec<String> = self.modifiers.iter().map(|m| m.to_string()).collect();
            write!(f, "({})", mods.join(","))?;
        }
        for _ in 0..self.array_dims {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

/// Every object kind the planner reasons about, in the stable `kind_rank`
/// order from §4.4: used both to order sibling creates and — reversed — to
/// order sibling drops within one topological layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Schema,
    Extension,
    Type,
    Domain,
    Sequence,
    Table,
    Index,
    Constraint,
    Function,
    Procedure,
    View,
    MaterializedView,
    Trigger,
    Policy,
    Privilege,
    DefaultPrivilege,
    Comment,
}

impl ObjectKind {
    pub const CREATE_ORDER: [ObjectKind; 17] = [
        ObjectKind::Schema,
        ObjectKind::Extension,
        ObjectKind::Type,
        ObjectKind::Domain,
        ObjectKind::Sequence,
        ObjectKind::Table,
        ObjectKind::Index,
        ObjectKind::Constraint,
        ObjectKind::Function,
        ObjectKind::Procedure,
        ObjectKind::View,
        ObjectKind::MaterializedView,
        ObjectKind::Trigger,
        ObjectKind::Policy,
        ObjectKind::Privilege,
        ObjectKind::DefaultPrivilege,
        ObjectKind::Comment,
    ];

    /// Position in the creation order; drops use `u8::MAX - rank` so that a
    /// simple ascending sort reverses the kind order for drop nodes.
    pub fn rank(&self) -> u8 {
        Self::CREATE_ORDER
            .iter()
            .position(|k| k == self)
            .expect("CREATE_ORDER covers every ObjectKind") as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Schema => "SCHEMA",
            ObjectKind::Extension => "EXTENSION",
            ObjectKind::Type => "TYPE",
            ObjectKind::Domain => "DOMAIN",
            ObjectKind::Sequence => "SEQUENCE",
            ObjectKind::Table => "TABLE",
            ObjectKind::Index => "INDEX",
            ObjectKind::Constraint => "CONSTRAINT",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Procedure => "PROCEDURE",
            ObjectKind::View => "VIEW",
            ObjectKind::MaterializedView => "MATERIALIZED VIEW",
            ObjectKind::Trigger => "TRIGGER",
            ObjectKind::Policy => "POLICY",
            ObjectKind::Privilege => "PRIVILEGE",
            ObjectKind::DefaultPrivilege => "DEFAULT PRIVILEGE",
            ObjectKind::Comment => "COMMENT",
        }
    }
}

/// Stable identity for any object the dependency graph or error reporting
/// needs to name. `qualifier` holds owner context that isn't part of the
/// bare name — e.g. a constraint's owning table, a trigger's owning table,
/// or a function's argument-type signature suffix for overloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub schema: String,
    pub name: String,
    pub qualifier: Option<String>,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            schema: schema.into(),
            name: name.into(),
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{} {}.{} on {}", self.kind.label(), self.schema, self.name, q),
            None => write!(f, "{} {}.{}", self.kind.label(), self.schema, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_display_in_drops_matching_schema() {
        let q = QualifiedName::qualified("public", "orders");
        assert_eq!(q.display_in("public"), "orders");
        assert_eq!(q.display_in("other"), "public.orders");
    }

    #[test]
    fn set_default_schema_is_idempotent() {
        let mut q = QualifiedName::unqualified("orders");
        q.set_default_schema("public");
        q.set_default_schema("ignored");
        assert_eq!(q.schema.as_deref(), Some("public"));
    }

    #[test]
    fn kind_rank_matches_spec_order() {
        assert!(ObjectKind::Schema.rank() < ObjectKind::Table.rank());
        assert!(ObjectKind::Table.rank() < ObjectKind::Index.rank());
        assert!(ObjectKind::Index.rank() < ObjectKind::Constraint.rank());
        assert!(ObjectKind::View.rank() < ObjectKind::MaterializedView.rank());
        assert!(ObjectKind::Policy.rank() < ObjectKind::Privilege.rank());
    }

    #[test]
    fn type_name_display_renders_modifiers_and_arrays() {
        let t = TypeName::with_modifiers("numeric", vec![10, 2]).array_of(1);
        assert_eq!(t.to_string(), "numeric(10,2)[]");
    }
}
