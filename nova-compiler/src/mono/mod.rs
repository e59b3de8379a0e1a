//! On-demand monomorphization: §4.3. Maintains four worklists (struct, enum, function,
//! impl-method instantiations) and drains them to a fixed point, since lowering one
//! instantiation's body can discover more.
use std::collections::HashSet;

use nova_ast::PrimKind;

use crate::type_system::{Ty, TypePtr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonoKind {
    Struct,
    Enum,
    Function,
    ImplMethod,
}

/// Identifies one instantiation request. `impl_type` is set only for `ImplMethod`: the
/// mangled name of the parent type the method belongs to.
#[derive(Debug, Clone)]
pub struct MangleKey {
    pub kind: MonoKind,
    pub base_name: String,
    pub args: Vec<TypePtr>,
    pub impl_type: Option<String>,
}

impl MangleKey {
    pub fn mangled_name(&self) -> String {
        mangle(&self.base_name, &self.args)
    }

    fn identity(&self) -> (MonoKind, String, Vec<String>, Option<String>) {
        (
            self.kind,
            self.base_name.clone(),
            self.args.iter().map(|a| mangle_type(a)).collect(),
            self.impl_type.clone(),
        )
    }
}

/// Deterministic, lossless mangling for primitives and Named types:
/// `Base` with no args mangles to itself; with args, `Base__Arg1__Arg2…` (recursive).
pub fn mangle(base_name: &str, args: &[TypePtr]) -> String {
    if args.is_empty() {
        return base_name.to_string();
    }
    let mut out = base_name.to_string();
    for arg in args {
        out.push_str("__");
        out.push_str(&mangle_type(arg));
    }
    out
}

pub fn mangle_type(ty: &TypePtr) -> String {
    match ty.as_ref() {
        Ty::Primitive(kind) => primitive_name(*kind).to_string(),
        Ty::Named { name, args, .. } | Ty::Class { name, args, .. } => mangle(name, args),
        Ty::Ref { inner, .. } => format!("ref_{}", mangle_type(inner)),
        Ty::Ptr { inner, .. } => format!("ptr_{}", mangle_type(inner)),
        Ty::Array { element, len } => format!("arr{}_{}", len, mangle_type(element)),
        Ty::Slice { element } => format!("slice_{}", mangle_type(element)),
        Ty::Tuple(elems) => {
            let mut s = "tuple".to_string();
            for e in elems {
                s.push('_');
                s.push_str(&mangle_type(e));
            }
            s
        }
        Ty::Func { params, ret, .. } => {
            let mut s = "fn".to_string();
            for p in params {
                s.push('_');
                s.push_str(&mangle_type(p));
            }
            s.push_str("_ret_");
            s.push_str(&mangle_type(ret));
            s
        }
        Ty::Closure { params, ret, .. } => {
            let mut s = "closure".to_string();
            for p in params {
                s.push('_');
                s.push_str(&mangle_type(p));
            }
            s.push_str("_ret_");
            s.push_str(&mangle_type(ret));
            s
        }
        Ty::Generic(name) => format!("generic_{}", name),
        Ty::DynBehavior { behavior, args } => format!("dyn_{}", mangle(behavior, args)),
        Ty::ImplBehavior { behavior, args } => format!("impl_{}", mangle(behavior, args)),
    }
}

fn primitive_name(kind: PrimKind) -> &'static str {
    match kind {
        PrimKind::I8 => "I8",
        PrimKind::I16 => "I16",
        PrimKind::I32 => "I32",
        PrimKind::I64 => "I64",
        PrimKind::I128 => "I128",
        PrimKind::U8 => "U8",
        PrimKind::U16 => "U16",
        PrimKind::U32 => "U32",
        PrimKind::U64 => "U64",
        PrimKind::U128 => "U128",
        PrimKind::F32 => "F32",
        PrimKind::F64 => "F64",
        PrimKind::Bool => "Bool",
        PrimKind::Char => "Char",
        PrimKind::Str => "Str",
        PrimKind::Unit => "Unit",
        PrimKind::Never => "Never",
    }
}

/// Four keyed worklists, drained to a fixed point. Entries are added by both the checker
/// (when it detects a generic use) and the IR generator (when lowering a site that needs a
/// concrete type).
#[derive(Default)]
pub struct MonoEngine {
    pending: Vec<MangleKey>,
    seen: HashSet<(MonoKind, String, Vec<String>, Option<String>)>,
    generated: HashSet<(MonoKind, String, Vec<String>, Option<String>)>,
}

impl MonoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests an instantiation. Returns `true` if this is the first time it's been
    /// requested (the caller should enqueue codegen work), `false` if already pending or
    /// generated (instantiation is idempotent: emitting the same generic instantiation
    /// twice from two call sites produces exactly one definition).
    pub fn request(&mut self, key: MangleKey) -> bool {
        let id = key.identity();
        if self.seen.contains(&id) || self.generated.contains(&id) {
            return false;
        }
        self.seen.insert(id);
        self.pending.push(key);
        true
    }

    /// Pops the next pending instantiation. The caller is responsible for marking it
    /// generated via `mark_generated` once its definition has been emitted.
    pub fn pop(&mut self) -> Option<MangleKey> {
        self.pending.pop()
    }

    pub fn mark_generated(&mut self, key: &MangleKey) {
        self.generated.insert(key.identity());
    }

    pub fn is_generated(&self, key: &MangleKey) -> bool {
        self.generated.contains(&key.identity())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// `pop`/`mark_generated`/`request` are deliberately separate calls rather than a single
// `drain(emit)` helper: lowering one instantiation's body routinely discovers more (a
// generic method constructing another generic value), which needs `&mut MonoEngine`
// available to the emit step itself. See `codegen::generics::pump` for the driving loop.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_system::TypeInterner;

    #[test]
    fn mangling_is_injective_for_distinct_argument_orders() {
        let interner = TypeInterner::new();
        let i32_ty = interner.primitive(PrimKind::I32);
        let str_ty = interner.primitive(PrimKind::Str);

        let a = mangle("Pair", &[i32_ty.clone(), str_ty.clone()]);
        let b = mangle("Pair", &[str_ty, i32_ty]);
        assert_ne!(a, b);
        assert_eq!(a, "Pair__I32__Str");
    }

    #[test]
    fn requesting_the_same_instantiation_twice_is_idempotent() {
        let interner = TypeInterner::new();
        let i32_ty = interner.primitive(PrimKind::I32);
        let mut engine = MonoEngine::new();

        let key = MangleKey { kind: MonoKind::Struct, base_name: "Pair".to_string(), args: vec![i32_ty], impl_type: None };
        assert!(engine.request(key.clone()));
        assert!(!engine.request(key));
    }
}
