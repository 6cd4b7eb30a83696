//! The type system: interned type references, the registry with
//! union-find unification, and the Hindley-Milner inferencer.

mod infer;
mod registry;
mod ty;

pub use infer::{default_scope, infer, InferImport};
pub use registry::{Registry, TypeMap, UnifyError};
pub use ty::{Kind, TypeRef, BYTE, BYTES, FLOAT, HOLE, INT, NEVER, PRIMITIVES, TEXT};
