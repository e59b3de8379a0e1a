//! The semantic type representation the checker attaches to every expression site, as opposed
//! to `nova_ast::Type`, which is only what the programmer wrote.
use std::sync::Arc;

use dashmap::DashMap;
use nova_ast::PrimKind;

pub type TypePtr = Arc<Ty>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Primitive(PrimKind),
    /// Struct/enum/type-alias reference. A nonempty `args` list means this names a
    /// monomorphized instance; see `crate::mono` for the mangled symbol it maps to.
    Named {
        module_path: Vec<String>,
        name: String,
        args: Vec<TypePtr>,
    },
    /// Like `Named`, but carries inheritance + visibility semantics a plain struct doesn't.
    Class {
        module_path: Vec<String>,
        name: String,
        args: Vec<TypePtr>,
    },
    Ref {
        inner: TypePtr,
        is_mut: bool,
    },
    Ptr {
        inner: TypePtr,
        is_mut: bool,
    },
    Array {
        element: TypePtr,
        len: u64,
    },
    Slice {
        element: TypePtr,
    },
    Tuple(Vec<TypePtr>),
    Func {
        params: Vec<TypePtr>,
        ret: TypePtr,
        is_async: bool,
    },
    /// Capture list is metadata only — IR generation synthesizes the environment struct.
    Closure {
        params: Vec<TypePtr>,
        ret: TypePtr,
        captures: Vec<(String, TypePtr, bool)>,
    },
    /// Only appears inside a generic definition, before substitution.
    Generic(String),
    DynBehavior {
        behavior: String,
        args: Vec<TypePtr>,
    },
    ImplBehavior {
        behavior: String,
        args: Vec<TypePtr>,
    },
}

impl Ty {
    pub fn is_unit(&self) -> bool {
        matches!(self, Ty::Primitive(PrimKind::Unit))
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Ty::Primitive(PrimKind::Never))
    }

    pub fn is_primitive_numeric(&self) -> bool {
        matches!(self, Ty::Primitive(k) if k.is_integer() || k.is_float())
    }

    /// Base name ignoring type arguments, used to look up behaviors implemented by a
    /// monomorphized instance (`Mutex__I32` implements whatever `Mutex` implements).
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Ty::Named { name, .. } | Ty::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn type_args(&self) -> &[TypePtr] {
        match self {
            Ty::Named { args, .. } | Ty::Class { args, .. } => args,
            _ => &[],
        }
    }
}

/// Interns `Ty` values behind `Arc` so that structurally-equal types compare with pointer
/// equality and are never duplicated in memory once monomorphization fans out.
#[derive(Default)]
pub struct TypeInterner {
    cache: DashMap<Ty, TypePtr>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, ty: Ty) -> TypePtr {
        if let Some(existing) = self.cache.get(&ty) {
            return existing.clone();
        }
        self.cache
            .entry(ty.clone())
            .or_insert_with(|| Arc::new(ty))
            .clone()
    }

    pub fn primitive(&self, kind: PrimKind) -> TypePtr {
        self.intern(Ty::Primitive(kind))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates_structurally_equal_types() {
        let interner = TypeInterner::new();
        let a = interner.primitive(PrimKind::I32);
        let b = interner.primitive(PrimKind::I32);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn named_types_with_different_args_intern_separately() {
        let interner = TypeInterner::new();
        let i32_ty = interner.primitive(PrimKind::I32);
        let str_ty = interner.primitive(PrimKind::Str);

        let pair_i32 = interner.intern(Ty::Named {
            module_path: vec![],
            name: "Pair".to_string(),
            args: vec![i32_ty.clone()],
        });
        let pair_str = interner.intern(Ty::Named {
            module_path: vec![],
            name: "Pair".to_string(),
            args: vec![str_ty],
        });
        assert_ne!(pair_i32, pair_str);
    }
}
