//! The `MonoEngine` pump (§4.3 "Ordering discipline"): drains the four worklists to a fixed
//! point. Struct/Enum requests only need their LLVM layout (already built lazily by
//! `ty_to_llvm` the moment the type is referenced — this just makes sure of it and, since the
//! checker never emits standalone `ImplMethod` requests, piggybacks the owning type's generic
//! method bodies onto its own Struct/Enum instantiation). Function requests compile a
//! specialized body under the mangled name.
use std::collections::HashMap;

use nova_ast::FuncDecl;

use super::IrGen;
use crate::mono::{MangleKey, MonoKind};
use crate::type_system::{Ty, TypePtr};

/// A method declared on a generic struct/enum/class impl, captured during the declaration
/// pass so the pump can specialize it once a concrete instantiation of its owner is requested.
pub(crate) struct GenericMethodEntry {
    pub owner_base: String,
    pub impl_type_params: Vec<String>,
    pub method: FuncDecl,
}

pub(crate) fn pump(
    irgen: &mut IrGen,
    generic_functions: &HashMap<String, FuncDecl>,
    generic_methods: &[GenericMethodEntry],
) -> Result<(), String> {
    loop {
        let Some(key) = irgen.mono.pop() else { break };
        if irgen.mono.is_generated(&key) {
            continue;
        }

        match key.kind {
            MonoKind::Struct | MonoKind::Enum => {
                let ty = irgen.env.interner.intern(Ty::Named {
                    module_path: vec![],
                    name: key.base_name.clone(),
                    args: key.args.clone(),
                });
                if matches!(key.kind, MonoKind::Struct) {
                    irgen.ensure_struct_type(&ty);
                } else {
                    irgen.ensure_enum_type(&ty);
                }
                for entry in generic_methods.iter().filter(|e| e.owner_base == key.base_name) {
                    compile_owner_method(irgen, &key, entry, &ty)?;
                }
            }
            MonoKind::Function => {
                if let Some(f) = generic_functions.get(&key.base_name).cloned() {
                    let subst: HashMap<String, TypePtr> =
                        f.type_params.iter().map(|p| p.name.clone()).zip(key.args.iter().cloned()).collect();
                    let mangled = key.mangled_name();
                    compile_generic_function(irgen, &mangled, &f, &subst, None)?;
                }
            }
            MonoKind::ImplMethod => {
                // Never requested by the checker (inherent/behavior method generics ride on
                // their owner's Struct/Enum instantiation above); kept for API completeness.
            }
        }
        irgen.mono.mark_generated(&key);
    }
    Ok(())
}

fn compile_owner_method(irgen: &mut IrGen, key: &MangleKey, entry: &GenericMethodEntry, self_ty: &TypePtr) -> Result<(), String> {
    let subst: HashMap<String, TypePtr> = entry.impl_type_params.iter().cloned().zip(key.args.iter().cloned()).collect();
    let mangled_parent = irgen.mangled_name_of(self_ty);
    let qualified = format!("{}::{}", mangled_parent, entry.method.name);
    compile_generic_function(irgen, &qualified, &entry.method, &subst, Some(self_ty.clone()))
}

/// Builds one monomorphized function body: pushes a generic scope naming every substitution
/// key so `env.resolve` on a bare generic-typed param/return resolves to `Ty::Generic`, then
/// `env.substitute` swaps in the concrete argument.
fn compile_generic_function(
    irgen: &mut IrGen,
    mangled_name: &str,
    f: &FuncDecl,
    subst: &HashMap<String, TypePtr>,
    self_ty: Option<TypePtr>,
) -> Result<(), String> {
    let Some(_) = &f.body else { return Ok(()) };

    let generic_names: Vec<String> = subst.keys().cloned().collect();
    irgen.env.push_generic_scope(generic_names);
    if let Some(sty) = &self_ty {
        irgen.env.current_self_type = Some(sty.clone());
    }

    let result = super::program::compile_function_body(irgen, mangled_name, f, self_ty.clone(), Some(subst));

    irgen.env.current_self_type = None;
    irgen.env.pop_generic_scope();
    result
}
