//! The intermediate representation: an immutable, flat description of a
//! database schema (§3). Two [`Ir`] values — `old` and `new` — are the sole
//! input to [`crate::plan`]; everything upstream of producing them (parsing,
//! catalog introspection) is an external collaborator's job.

pub mod builder;
pub mod comment;
pub mod common;
pub mod domain_type;
pub mod policy;
pub mod privilege;
pub mod routine;
pub mod schema;
pub mod sequence;
pub mod table;
pub mod trigger;
pub mod view;

pub use comment::Comment;
pub use common::{ObjectKind, ObjectRef, QualifiedName, TypeName};
pub use domain_type::{Domain, NamedCheck, TypeKind, UserType};
pub use policy::{Policy, PolicyCommand};
pub use privilege::{DefaultPrivilege, DefaultPrivilegeObjectType, Privilege, PrivilegeKind};
pub use routine::{Argument, ArgMode, Parallelism, ReturnType, Routine, RoutineKind, Security, Volatility};
pub use schema::{Ir, SchemaDef};
pub use sequence::Sequence;
pub use table::{
    Column, Constraint, ConstraintKind, ExcludeElement, FkAction, FkMatch, GeneratedKind,
    IdentityKind, Index, IndexKey, NullsOrder, PartitionSpec, PartitionStrategy, SortDirection,
    Table,
};
pub use trigger::{Trigger, TriggerEvent, TriggerGranularity, TriggerTiming};
pub use view::{MaterializedView, View, ViewDefinition};
