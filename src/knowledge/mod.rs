//! Domain knowledge consumed by the triage stage.
//!
//! * [`Specialty`]: clinical specialty of a consultation.
//! * [`KnowledgeSource`]: collaborator trait (`critical_red_flags`).
//! * [`FileKnowledgeSource`] / [`BuiltinKnowledgeSource`]: implementations.
//! * [`RedFlagCatalog`]: the read-only phrase list for one specialty.

pub mod builtin;
pub mod catalog;
pub mod specialty;

pub use builtin::builtin_red_flags;
pub use catalog::{
    BuiltinKnowledgeSource, FileKnowledgeSource, KnowledgeError, KnowledgeSource, RedFlagCatalog,
};
pub use specialty::{Specialty, UnknownSpecialty};
