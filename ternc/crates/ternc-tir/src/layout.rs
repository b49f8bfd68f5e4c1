//! Size and alignment of Core IR types.
//!
//! The backend owns the real data layout; these queries exist so the middle
//! end can honor the representation invariants it promises — most notably
//! that `Option<T>` over a pointer-shaped `T` adds no tag word.

use crate::context::Context;
use crate::ty::Ty;

/// Pointer size on every supported target.
pub const POINTER_SIZE: u64 = 8;

/// Size and alignment in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub size: u64,
    pub align: u64,
}

impl Layout {
    pub const fn new(size: u64, align: u64) -> Self {
        Self { size, align }
    }

    /// Zero-sized, byte-aligned.
    pub const ZERO: Layout = Layout::new(0, 1);
}

fn align_up(offset: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (offset + align - 1) & !(align - 1)
}

/// Aggregate layout: fields in order, each aligned, total padded to the
/// largest alignment.
fn aggregate(parts: impl Iterator<Item = Layout>) -> Layout {
    let mut size = 0;
    let mut align = 1;
    for part in parts {
        size = align_up(size, part.align) + part.size;
        align = align.max(part.align);
    }
    Layout::new(align_up(size, align), align)
}

impl Context {
    /// Layout of a Core IR type.
    pub fn layout_of(&self, ty: &Ty) -> Layout {
        match ty {
            Ty::Int(int) => {
                let bytes = int.width.bytes();
                Layout::new(bytes, bytes)
            }
            Ty::Float(float) => {
                let bytes = float.width.bytes();
                Layout::new(bytes, bytes)
            }
            Ty::Bool => Layout::new(1, 1),
            Ty::Void | Ty::Never => Layout::ZERO,
            // { data, byte_length }
            Ty::Str => Layout::new(2 * POINTER_SIZE, POINTER_SIZE),
            // { data, length, capacity }
            Ty::Array(_) => Layout::new(3 * POINTER_SIZE, POINTER_SIZE),
            // Structs are held by reference past their allocation site.
            Ty::Struct(_) => Layout::new(POINTER_SIZE, POINTER_SIZE),
            Ty::Weak(_) => Layout::new(POINTER_SIZE, POINTER_SIZE),
            // { code_pointer, environment_pointer }
            Ty::Fn(_) => Layout::new(2 * POINTER_SIZE, POINTER_SIZE),
            Ty::Tuple(elements) => aggregate(elements.iter().map(|e| self.layout_of(e))),
            Ty::Union(id) => {
                let def = self.union_def(*id);
                let tag = def.tag_ty.width.bytes();
                let mut payload = Layout::ZERO;
                for variant in &def.variants {
                    let l = self.layout_of(&variant.payload);
                    payload.size = payload.size.max(l.size);
                    payload.align = payload.align.max(l.align);
                }
                let align = payload.align.max(tag);
                Layout::new(align_up(align_up(tag, payload.align) + payload.size, align), align)
            }
            Ty::Option(inner) => {
                if inner.is_pointer_shaped() {
                    // Null-pointer optimization: no tag word, null is None.
                    self.layout_of(inner)
                } else {
                    let inner_layout = self.layout_of(inner);
                    let align = inner_layout.align.max(1);
                    Layout::new(
                        align_up(align_up(1, inner_layout.align) + inner_layout.size, align),
                        align,
                    )
                }
            }
            Ty::Result(ok, err) => {
                let ok_layout = self.layout_of(ok);
                let err_layout = self.layout_of(err);
                let payload_size = ok_layout.size.max(err_layout.size);
                let payload_align = ok_layout.align.max(err_layout.align).max(1);
                let align = payload_align;
                Layout::new(
                    align_up(align_up(1, payload_align) + payload_size, align),
                    align,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FieldDef;
    use crate::ty::{IntTy, StructId};
    use ternc_util::Symbol;

    #[test]
    fn test_scalar_layouts() {
        let ctx = Context::new();
        assert_eq!(ctx.layout_of(&Ty::I32), Layout::new(4, 4));
        assert_eq!(ctx.layout_of(&Ty::Int(IntTy::U8)), Layout::new(1, 1));
        assert_eq!(ctx.layout_of(&Ty::F64), Layout::new(8, 8));
        assert_eq!(ctx.layout_of(&Ty::Bool), Layout::new(1, 1));
        assert_eq!(ctx.layout_of(&Ty::Void), Layout::ZERO);
    }

    #[test]
    fn test_fat_pointer_layouts() {
        let ctx = Context::new();
        assert_eq!(ctx.layout_of(&Ty::Str).size, 16);
        assert_eq!(ctx.layout_of(&Ty::array(Ty::I32)).size, 24);
        assert_eq!(ctx.layout_of(&Ty::Struct(StructId(0))).size, 8);
    }

    #[test]
    fn test_tuple_padding() {
        let ctx = Context::new();
        // (u8, i32) → 1 + pad(3) + 4 = 8, align 4
        let layout = ctx.layout_of(&Ty::Tuple(vec![Ty::Int(IntTy::U8), Ty::I32]));
        assert_eq!(layout, Layout::new(8, 4));
    }

    #[test]
    fn test_null_pointer_optimization() {
        let mut ctx = Context::new();
        let point = ctx.intern_struct(
            Symbol::intern("Point"),
            vec![FieldDef {
                name: Symbol::intern("x"),
                ty: Ty::F64,
            }],
        );

        // Pointer-shaped payloads: Option adds nothing.
        for inner in [Ty::Str, Ty::array(Ty::F64), Ty::Struct(point)] {
            let plain = ctx.layout_of(&inner);
            let optional = ctx.layout_of(&Ty::option(inner));
            assert_eq!(plain, optional);
        }
    }

    #[test]
    fn test_option_of_scalar_needs_tag() {
        let ctx = Context::new();
        let plain = ctx.layout_of(&Ty::F64);
        let optional = ctx.layout_of(&Ty::option(Ty::F64));
        assert!(optional.size > plain.size);
        // 1 tag byte + 7 padding + 8 payload
        assert_eq!(optional, Layout::new(16, 8));
    }

    #[test]
    fn test_result_payload_is_max_of_arms() {
        let ctx = Context::new();
        let layout = ctx.layout_of(&Ty::result(Ty::I32, Ty::Str));
        // payload = max(4, 16) = 16, align 8, tag byte padded to 8
        assert_eq!(layout, Layout::new(24, 8));
    }
}
