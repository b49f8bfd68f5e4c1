//! The Core IR type sum.
//!
//! A closed set of shapes; every surface type resolves to exactly one of
//! these. Named aggregates (structs, unions) are referenced by table id, so
//! `Ty` values are cheap to clone, hash, and compare structurally.

use ternc_util::define_idx;

define_idx!(
    /// Index into the struct table.
    StructId
);

define_idx!(
    /// Index into the union table.
    UnionId
);

/// Integer bit widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub const fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }

    pub const fn bytes(self) -> u64 {
        (self.bits() / 8) as u64
    }
}

/// An integer type: width plus signedness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntTy {
    pub width: IntWidth,
    pub signed: bool,
}

impl IntTy {
    pub const I8: IntTy = IntTy { width: IntWidth::W8, signed: true };
    pub const I16: IntTy = IntTy { width: IntWidth::W16, signed: true };
    pub const I32: IntTy = IntTy { width: IntWidth::W32, signed: true };
    pub const I64: IntTy = IntTy { width: IntWidth::W64, signed: true };
    pub const U8: IntTy = IntTy { width: IntWidth::W8, signed: false };
    pub const U16: IntTy = IntTy { width: IntWidth::W16, signed: false };
    pub const U32: IntTy = IntTy { width: IntWidth::W32, signed: false };
    pub const U64: IntTy = IntTy { width: IntWidth::W64, signed: false };

    /// The ABI tag used in mangled names.
    pub const fn mangle_tag(self) -> &'static str {
        match (self.signed, self.width) {
            (true, IntWidth::W8) => "Int8",
            (true, IntWidth::W16) => "Int16",
            (true, IntWidth::W32) => "Int32",
            (true, IntWidth::W64) => "Int64",
            (false, IntWidth::W8) => "UInt8",
            (false, IntWidth::W16) => "UInt16",
            (false, IntWidth::W32) => "UInt32",
            (false, IntWidth::W64) => "UInt64",
        }
    }
}

/// Float bit widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FloatWidth {
    W32,
    W64,
}

impl FloatWidth {
    pub const fn bits(self) -> u32 {
        match self {
            FloatWidth::W32 => 32,
            FloatWidth::W64 => 64,
        }
    }

    pub const fn bytes(self) -> u64 {
        (self.bits() / 8) as u64
    }
}

/// A float type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FloatTy {
    pub width: FloatWidth,
}

impl FloatTy {
    pub const F32: FloatTy = FloatTy { width: FloatWidth::W32 };
    pub const F64: FloatTy = FloatTy { width: FloatWidth::W64 };

    pub const fn mangle_tag(self) -> &'static str {
        match self.width {
            FloatWidth::W32 => "Float32",
            FloatWidth::W64 => "Float64",
        }
    }
}

/// How a function value captures its environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CaptureKind {
    /// No free variables; the environment pointer is null
    #[default]
    None,
    /// Captures live on the creating frame; valid while it is
    ByRef,
    /// Captures promoted to a heap capture box
    BoxedEnv,
}

/// A function value type: `{ code_pointer, environment_pointer }`.
#[derive(Clone, Debug)]
pub struct FnTy {
    pub params: Vec<Ty>,
    pub ret: Box<Ty>,
    pub captures: CaptureKind,
}

// The capture kind describes the value's representation, not its type
// identity: a capture-free closure is assignable wherever a capturing one
// is. Equality and hashing ignore it.
impl PartialEq for FnTy {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.ret == other.ret
    }
}

impl Eq for FnTy {}

impl std::hash::Hash for FnTy {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.params.hash(state);
        self.ret.hash(state);
    }
}

/// A Core IR type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Int(IntTy),
    Float(FloatTy),
    Bool,
    Void,
    /// Fat pointer `{ data, byte_length }` over UTF-8
    Str,
    Struct(StructId),
    /// `{ data, length, capacity }`
    Array(Box<Ty>),
    Tuple(Vec<Ty>),
    Union(UnionId),
    /// Kept apart from a two-variant union for the null-pointer optimization
    Option(Box<Ty>),
    Result(Box<Ty>, Box<Ty>),
    Fn(FnTy),
    Never,
    /// Non-owning pointer; field position only
    Weak(Box<Ty>),
}

impl Ty {
    pub const F64: Ty = Ty::Float(FloatTy::F64);
    pub const F32: Ty = Ty::Float(FloatTy::F32);
    pub const I32: Ty = Ty::Int(IntTy::I32);
    pub const I64: Ty = Ty::Int(IntTy::I64);

    pub fn option(inner: Ty) -> Ty {
        Ty::Option(Box::new(inner))
    }

    pub fn array(element: Ty) -> Ty {
        Ty::Array(Box::new(element))
    }

    pub fn result(ok: Ty, err: Ty) -> Ty {
        Ty::Result(Box::new(ok), Box::new(err))
    }

    pub fn weak(inner: Ty) -> Ty {
        Ty::Weak(Box::new(inner))
    }

    /// True if the representation begins with a pointer, making
    /// `Option<Self>` eligible for the null-pointer optimization.
    pub fn is_pointer_shaped(&self) -> bool {
        matches!(
            self,
            Ty::Str | Ty::Array(_) | Ty::Struct(_) | Ty::Fn(_) | Ty::Weak(_)
        )
    }

    /// True for types passed by value regardless of ownership mode.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Ty::Int(_) | Ty::Float(_) | Ty::Bool | Ty::Void | Ty::Never
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Int(_) | Ty::Float(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Ty::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Ty::Float(_))
    }

    /// The payload type of an `Option`, if this is one.
    pub fn option_inner(&self) -> Option<&Ty> {
        match self {
            Ty::Option(inner) => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_tags() {
        assert_eq!(IntTy::I32.mangle_tag(), "Int32");
        assert_eq!(IntTy::U8.mangle_tag(), "UInt8");
        assert_eq!(FloatTy::F64.mangle_tag(), "Float64");
    }

    #[test]
    fn test_widths() {
        assert_eq!(IntWidth::W16.bits(), 16);
        assert_eq!(IntWidth::W64.bytes(), 8);
        assert_eq!(FloatWidth::W32.bytes(), 4);
    }

    #[test]
    fn test_pointer_shaped() {
        assert!(Ty::Str.is_pointer_shaped());
        assert!(Ty::array(Ty::I32).is_pointer_shaped());
        assert!(Ty::Struct(StructId(0)).is_pointer_shaped());
        assert!(!Ty::I32.is_pointer_shaped());
        assert!(!Ty::Bool.is_pointer_shaped());
        assert!(!Ty::option(Ty::Str).is_pointer_shaped());
    }

    #[test]
    fn test_primitive_classification() {
        assert!(Ty::I32.is_primitive());
        assert!(Ty::Never.is_primitive());
        assert!(!Ty::Str.is_primitive());
        assert!(!Ty::Tuple(vec![Ty::I32]).is_primitive());
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(Ty::array(Ty::F64), Ty::array(Ty::F64));
        assert_ne!(Ty::array(Ty::F64), Ty::array(Ty::F32));
        assert_eq!(
            Ty::result(Ty::I32, Ty::Str),
            Ty::Result(Box::new(Ty::I32), Box::new(Ty::Str))
        );
    }

    #[test]
    fn test_option_inner() {
        let opt = Ty::option(Ty::F64);
        assert_eq!(opt.option_inner(), Some(&Ty::F64));
        assert_eq!(Ty::F64.option_inner(), None);
    }

    #[test]
    fn test_fn_ty_equality_ignores_captures() {
        let plain = FnTy {
            params: vec![Ty::I32],
            ret: Box::new(Ty::Bool),
            captures: CaptureKind::None,
        };
        let boxed = FnTy {
            captures: CaptureKind::BoxedEnv,
            ..plain.clone()
        };
        assert_eq!(plain, boxed);

        let different = FnTy {
            params: vec![Ty::I64],
            ret: Box::new(Ty::Bool),
            captures: CaptureKind::None,
        };
        assert_ne!(plain, different);
    }
}
