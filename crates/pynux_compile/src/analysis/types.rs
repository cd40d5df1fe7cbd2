//! The semantic type model and data layout.
//!
//! [`Ty`] is the closed variant the checker assigns to every expression.
//! Unlike the surface [`TypeExpr`](pynux_language::ast::TypeExpr) it is
//! fully resolved: names have become primitives or registered aggregates,
//! and every type knows its byte size and alignment.
//!
//! # Layout rules
//!
//! - Scalars are naturally aligned to their size (`int64`/`float64` to 8).
//! - Pointers, `Str`, function values, `List`, `Dict`, and `Tuple` are
//!   4-byte machine words (the collection types are pointers to their
//!   heap/data images).
//! - Struct fields are laid out in declaration order with natural alignment
//!   unless the struct is `@packed`; the struct's alignment is its widest
//!   field's, and its size rounds up to that alignment.
//! - Union fields all sit at offset zero; size is the widest field's.
//! - `Optional[T]` is stored exactly as `T` with the zero word reserved as
//!   the `None` sentinel, so it is restricted to pointer-shaped `T`.

use pynux_base::{Interner, Symbol};
use std::collections::HashMap;

/// A fully resolved type.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    /// `int8`…`uint64`.
    Int { bits: u8, signed: bool },
    /// `float32`/`float64` — declarable and movable, no arithmetic.
    Float { bits: u8 },
    Bool,
    /// Unsigned byte holding one character.
    Char,
    Void,
    Ptr(Box<Ty>),
    Array(u32, Box<Ty>),
    /// Function value (pointer-sized).
    Fn { ret: Box<Ty>, params: Vec<Ty> },
    /// A registered struct (or flattened class).
    Struct(Symbol),
    Union(Symbol),
    Optional(Box<Ty>),
    /// `Ptr[char]` whose target is NUL-terminated.
    Str,
    /// Pointer to `[count, e0, e1, …]` words.
    List(Box<Ty>),
    /// Pointer to `[count, k0, v0, …]` words.
    Dict(Box<Ty>, Box<Ty>),
    /// Pointer to `count` contiguous words.
    Tuple(Vec<Ty>),
}

impl Ty {
    pub const INT32: Ty = Ty::Int { bits: 32, signed: true };
    pub const UINT32: Ty = Ty::Int { bits: 32, signed: false };
    pub const INT64: Ty = Ty::Int { bits: 64, signed: true };

    pub fn is_integer(&self) -> bool {
        matches!(self, Ty::Int { .. })
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Ty::Int { signed: true, .. })
    }

    /// Word-sized address-like values: `None` is assignable, `is` compares.
    pub fn is_pointer_shaped(&self) -> bool {
        matches!(
            self,
            Ty::Ptr(_) | Ty::Str | Ty::Fn { .. } | Ty::List(_) | Ty::Dict(_, _) | Ty::Tuple(_) | Ty::Optional(_)
        )
    }

    /// `true` for values carried in an `r0:r1` pair.
    pub fn is_wide(&self) -> bool {
        matches!(self, Ty::Int { bits: 64, .. } | Ty::Float { bits: 64 })
    }

    /// Byte size; aggregates consult the registry.
    pub fn size_of(&self, registry: &TypeRegistry) -> u32 {
        match self {
            Ty::Int { bits, .. } => u32::from(*bits) / 8,
            Ty::Float { bits } => u32::from(*bits) / 8,
            Ty::Bool | Ty::Char => 1,
            Ty::Void => 0,
            Ty::Ptr(_) | Ty::Fn { .. } | Ty::Str | Ty::List(_) | Ty::Dict(_, _) | Ty::Tuple(_) => 4,
            Ty::Array(n, elem) => n * elem.size_of(registry),
            Ty::Struct(name) | Ty::Union(name) => {
                registry.layout(*name).map(|l| l.size).unwrap_or(0)
            }
            Ty::Optional(inner) => inner.size_of(registry),
        }
    }

    /// Natural alignment, capped at 8.
    pub fn align_of(&self, registry: &TypeRegistry) -> u32 {
        match self {
            Ty::Array(_, elem) => elem.align_of(registry),
            Ty::Struct(name) | Ty::Union(name) => {
                registry.layout(*name).map(|l| l.align).unwrap_or(1)
            }
            Ty::Optional(inner) => inner.align_of(registry),
            other => other.size_of(registry).clamp(1, 8),
        }
    }

    /// Source-level rendering for diagnostics.
    pub fn display(&self, interner: &Interner) -> String {
        match self {
            Ty::Int { bits, signed: true } => format!("int{}", bits),
            Ty::Int { bits, signed: false } => format!("uint{}", bits),
            Ty::Float { bits } => format!("float{}", bits),
            Ty::Bool => "bool".to_string(),
            Ty::Char => "char".to_string(),
            Ty::Void => "void".to_string(),
            Ty::Ptr(inner) => format!("Ptr[{}]", inner.display(interner)),
            Ty::Array(n, elem) => format!("Array[{}, {}]", n, elem.display(interner)),
            Ty::Fn { ret, params } => {
                let mut s = format!("Fn[{}", ret.display(interner));
                for p in params {
                    s.push_str(", ");
                    s.push_str(&p.display(interner));
                }
                s.push(']');
                s
            }
            Ty::Struct(name) | Ty::Union(name) => interner.resolve(*name).to_string(),
            Ty::Optional(inner) => format!("Optional[{}]", inner.display(interner)),
            Ty::Str => "str".to_string(),
            Ty::List(elem) => format!("List[{}]", elem.display(interner)),
            Ty::Dict(k, v) => {
                format!("Dict[{}, {}]", k.display(interner), v.display(interner))
            }
            Ty::Tuple(elems) => {
                let inner: Vec<String> = elems.iter().map(|t| t.display(interner)).collect();
                format!("Tuple[{}]", inner.join(", "))
            }
        }
    }
}

/// One laid-out field of a struct or union.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: Symbol,
    pub ty: Ty,
    pub offset: u32,
}

/// Computed layout of a struct, union, or flattened class.
#[derive(Debug, Clone)]
pub struct StructLayout {
    pub fields: Vec<FieldInfo>,
    pub size: u32,
    pub align: u32,
    pub packed: bool,
    pub is_union: bool,
}

impl StructLayout {
    pub fn field(&self, name: Symbol) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A callable's signature.
#[derive(Debug, Clone)]
pub struct FnSig {
    pub params: Vec<Ty>,
    pub ret: Ty,
    /// Imported symbols have unchecked signatures: arity and argument types
    /// are taken on faith and the result defaults to `int32`.
    pub unchecked: bool,
}

/// Per-translation-unit registry of aggregate layouts.
///
/// Field offsets computed here are stable for the duration of one compile;
/// both the checker (field typing) and the generator (base+offset
/// addressing) read the same layout.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    layouts: HashMap<Symbol, StructLayout>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self, name: Symbol) -> Option<&StructLayout> {
        self.layouts.get(&name)
    }

    pub fn contains(&self, name: Symbol) -> bool {
        self.layouts.contains_key(&name)
    }

    /// Registers a struct (or flattened class) with natural or packed layout.
    pub fn define_struct(&mut self, name: Symbol, fields: Vec<(Symbol, Ty)>, packed: bool) {
        let mut laid = Vec::with_capacity(fields.len());
        let mut offset = 0u32;
        let mut align = 1u32;
        for (fname, fty) in fields {
            let falign = if packed { 1 } else { fty.align_of(self) };
            let fsize = fty.size_of(self);
            offset = align_up(offset, falign);
            laid.push(FieldInfo {
                name: fname,
                ty: fty,
                offset,
            });
            offset += fsize;
            align = align.max(falign);
        }
        let size = align_up(offset.max(1), align);
        self.layouts.insert(
            name,
            StructLayout {
                fields: laid,
                size,
                align,
                packed,
                is_union: false,
            },
        );
    }

    /// Registers a union: every field at offset zero, size of the widest.
    pub fn define_union(&mut self, name: Symbol, fields: Vec<(Symbol, Ty)>) {
        let mut laid = Vec::with_capacity(fields.len());
        let mut size = 0u32;
        let mut align = 1u32;
        for (fname, fty) in fields {
            size = size.max(fty.size_of(self));
            align = align.max(fty.align_of(self));
            laid.push(FieldInfo {
                name: fname,
                ty: fty,
                offset: 0,
            });
        }
        let size = align_up(size.max(1), align);
        self.layouts.insert(
            name,
            StructLayout {
                fields: laid,
                size,
                align,
                packed: false,
                is_union: true,
            },
        );
    }
}

/// Rounds `value` up to a multiple of `align` (a power of two).
pub fn align_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(interner: &mut Interner, s: &str) -> Symbol {
        interner.intern(s)
    }

    #[test]
    fn scalar_sizes() {
        let reg = TypeRegistry::new();
        assert_eq!(Ty::Int { bits: 8, signed: false }.size_of(&reg), 1);
        assert_eq!(Ty::INT32.size_of(&reg), 4);
        assert_eq!(Ty::INT64.size_of(&reg), 8);
        assert_eq!(Ty::Char.size_of(&reg), 1);
        assert_eq!(Ty::Str.size_of(&reg), 4);
        assert_eq!(Ty::Ptr(Box::new(Ty::INT64)).size_of(&reg), 4);
    }

    #[test]
    fn array_size_multiplies() {
        let reg = TypeRegistry::new();
        let a = Ty::Array(10, Box::new(Ty::Int { bits: 16, signed: true }));
        assert_eq!(a.size_of(&reg), 20);
        assert_eq!(a.align_of(&reg), 2);
    }

    #[test]
    fn struct_layout_uses_natural_alignment() {
        let mut interner = Interner::new();
        let mut reg = TypeRegistry::new();
        let name = sym(&mut interner, "Mixed");
        let a = sym(&mut interner, "a");
        let b = sym(&mut interner, "b");
        let c = sym(&mut interner, "c");
        reg.define_struct(
            name,
            vec![
                (a, Ty::Int { bits: 8, signed: false }),
                (b, Ty::INT32),
                (c, Ty::Int { bits: 16, signed: false }),
            ],
            false,
        );
        let layout = reg.layout(name).unwrap();
        assert_eq!(layout.field(a).unwrap().offset, 0);
        assert_eq!(layout.field(b).unwrap().offset, 4);
        assert_eq!(layout.field(c).unwrap().offset, 8);
        assert_eq!(layout.size, 12);
        assert_eq!(layout.align, 4);
    }

    #[test]
    fn packed_struct_has_no_padding() {
        let mut interner = Interner::new();
        let mut reg = TypeRegistry::new();
        let name = sym(&mut interner, "Wire");
        let a = sym(&mut interner, "tag");
        let b = sym(&mut interner, "value");
        reg.define_struct(
            name,
            vec![(a, Ty::Int { bits: 8, signed: false }), (b, Ty::UINT32)],
            true,
        );
        let layout = reg.layout(name).unwrap();
        assert_eq!(layout.field(b).unwrap().offset, 1);
        assert_eq!(layout.size, 5);
    }

    #[test]
    fn union_fields_share_offset_zero() {
        let mut interner = Interner::new();
        let mut reg = TypeRegistry::new();
        let name = sym(&mut interner, "Raw");
        let w = sym(&mut interner, "word");
        let b = sym(&mut interner, "bytes");
        reg.define_union(
            name,
            vec![
                (w, Ty::UINT32),
                (b, Ty::Array(8, Box::new(Ty::Int { bits: 8, signed: false }))),
            ],
        );
        let layout = reg.layout(name).unwrap();
        assert!(layout.is_union);
        assert_eq!(layout.field(w).unwrap().offset, 0);
        assert_eq!(layout.field(b).unwrap().offset, 0);
        assert_eq!(layout.size, 8);
    }

    #[test]
    fn display_round_trips_surface_syntax() {
        let interner = Interner::new();
        let ty = Ty::Ptr(Box::new(Ty::Char));
        assert_eq!(ty.display(&interner), "Ptr[char]");
        assert_eq!(Ty::Optional(Box::new(Ty::Str)).display(&interner), "Optional[str]");
    }

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(5, 4), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(9, 8), 16);
    }
}
