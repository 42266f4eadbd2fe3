//! Privilege and default-privilege IR entities (§3.1).

use crate::ir::common::ObjectRef;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrivilegeKind {
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
    References,
    Trigger,
    Usage,
    Execute,
    Create,
    Connect,
    Temporary,
}

impl PrivilegeKind {
    pub fn label(&self) -> &'static str {
        match self {
            PrivilegeKind::Select => "SELECT",
            PrivilegeKind::Insert => "INSERT",
            PrivilegeKind::Update => "UPDATE",
            PrivilegeKind::Delete => "DELETE",
            PrivilegeKind::Truncate => "TRUNCATE",
            PrivilegeKind::References => "REFERENCES",
            PrivilegeKind::Trigger => "TRIGGER",
            PrivilegeKind::Usage => "USAGE",
            PrivilegeKind::Execute => "EXECUTE",
            PrivilegeKind::Create => "CREATE",
            PrivilegeKind::Connect => "CONNECT",
            PrivilegeKind::Temporary => "TEMPORARY",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Privilege {
    pub grantee: String,
    pub object: ObjectRef,
    pub privilege: PrivilegeKind,
    pub with_grant_option: bool,
    /// `Some` for column-level grants (a subset of the object's columns).
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPrivilegeObjectType {
    Tables,
    Sequences,
    Functions,
    Types,
    Schemas,
}

impl DefaultPrivilegeObjectType {
    pub fn label(&self) -> &'static str {
        match self {
            DefaultPrivilegeObjectType::Tables => "TABLES",
            DefaultPrivilegeObjectType::Sequences => "SEQUENCES",
            DefaultPrivilegeObjectType::Functions => "FUNCTIONS",
            DefaultPrivilegeObjectType::Types => "TYPES",
            DefaultPrivilegeObjectType::Schemas => "SCHEMAS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefaultPrivilege {
    pub grantor: String,
    pub schema: String,
    pub object_type: DefaultPrivilegeObjectType,
    pub grantee: String,
    pub privileges: Vec<PrivilegeKind>,
    pub with_grant_option: bool,
}

impl DefaultPrivilege {
    /// Whether this default-privilege declaration would auto-grant `priv`
    /// to `grantee` on a newly created object of `object_type` in `schema`.
    /// Used for the auto-grant idempotence rule (§4.2, S6): the differ must
    /// not emit a redundant GRANT that a default-privilege already covers,
    /// nor a REVOKE for one an explicit grant only restates.
    pub fn covers(
        &self,
        grantee: &str,
        schema: &str,
        object_type: DefaultPrivilegeObjectType,
        priv_kind: &PrivilegeKind,
    ) -> bool {
        self.grantee == grantee
            && self.schema == schema
            && self.object_type == object_type
            && self.privileges.contains(priv_kind)
    }
}
