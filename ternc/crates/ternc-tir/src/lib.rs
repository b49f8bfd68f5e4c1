//! ternc-tir - The Tern Core IR ("TIR").
//!
//! This crate is the middle end's output contract: the closed type sum, the
//! reduced statement and expression forms function bodies are written in, the
//! named-entity tables the phases fill (the "lowering context"), size/layout
//! queries, the mangled-name grammar, and the final [`Program`] handed to the
//! backend.
//!
//! Nothing here runs a pass. The phase crates build these values; the backend
//! consumes them.

pub mod context;
pub mod ir;
pub mod layout;
pub mod mangle;
pub mod program;
pub mod ty;

pub use context::{
    CaptureEnv, Context, EnumDef, EnumValue, FieldDef, FnDef, FnSig, GenericDef, ParamSig,
    StructDef, UnionDef, UnionVariant,
};
pub use ir::{
    AllocPlacement, BinOp, Body, Const, Expr, ExprKind, LocalDecl, LocalId, MatchArm, ParamMode,
    Place, Stmt, UnOp,
};
pub use layout::Layout;
pub use program::Program;
pub use ty::{CaptureKind, FloatTy, FloatWidth, FnTy, IntTy, IntWidth, StructId, Ty, UnionId};
