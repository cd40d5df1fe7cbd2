//! Semantic analysis: the type model and the checker.
//!
//! - [`types`]: the resolved [`Ty`](types::Ty) variant, aggregate layout,
//!   and the per-unit [`TypeRegistry`](types::TypeRegistry)
//! - [`check`]: name resolution, type checking, and frame layout, producing
//!   the [`CheckedModule`](check::CheckedModule) the generator consumes

pub mod check;
pub mod types;

pub use check::{
    check_module, Binding, CheckedModule, CompInfo, FrameInfo, GlobalDecl, Intrinsic, LocalSlot,
    StrMethod,
};
pub use types::{align_up, FieldInfo, FnSig, StructLayout, Ty, TypeRegistry};
