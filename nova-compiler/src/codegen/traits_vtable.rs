//! Dynamic dispatch (§4.4 "dyn Behavior"). One vtable constant per concrete-type/behavior
//! pair actually used as a `dyn`, one fat-pointer struct type per behavior, construction and
//! call-through.
use inkwell::types::StructType;
use inkwell::values::{BasicValueEnum, PointerValue};
use inkwell::AddressSpace;

use nova_ast::Expr;

use super::IrGen;
use crate::type_system::TypePtr;

impl<'ctx> IrGen<'ctx> {
    /// `%dyn.BehaviorName = type { ptr, ptr }` — data pointer, vtable pointer.
    pub(crate) fn ensure_dyn_type(&mut self, behavior: &str) -> StructType<'ctx> {
        if let Some(existing) = self.dyn_types.get(behavior) {
            return *existing;
        }
        let ty = self.context.struct_type(&[self.ptr_type().into(), self.ptr_type().into()], false);
        self.dyn_types.insert(behavior.to_string(), ty);
        ty
    }

    /// Builds (or returns the cached) global vtable constant for `(concrete_type, behavior)`,
    /// one function pointer per behavior method in declared order.
    fn ensure_vtable(&mut self, concrete_mangled: &str, behavior: &str) -> Result<PointerValue<'ctx>, String> {
        let key = (concrete_mangled.to_string(), behavior.to_string());
        if let Some(existing) = self.vtables.get(&key) {
            return Ok(existing.as_pointer_value());
        }

        let Some(def) = self.env.lookup_behavior(behavior).cloned() else {
            return Err(format!("unknown behavior `{}`", behavior));
        };

        let mut fn_ptrs = Vec::with_capacity(def.methods.len());
        for m in &def.methods {
            let qualified = format!("{}::{}", concrete_mangled, m.name);
            let fallback = format!("{}::{}", behavior, m.name);
            let func = self
                .functions
                .get(&qualified)
                .or_else(|| self.functions.get(&fallback))
                .copied()
                .ok_or_else(|| format!("no implementation of `{}::{}` for `{}`", behavior, m.name, concrete_mangled))?;
            fn_ptrs.push(func.as_global_value().as_pointer_value());
        }

        let vtable_ty = self.context.struct_type(&vec![self.ptr_type().into(); fn_ptrs.len()], false);
        let const_vals: Vec<_> = fn_ptrs.into_iter().collect();
        let initializer = vtable_ty.const_named_struct(
            &const_vals.iter().map(|p| (*p).into()).collect::<Vec<BasicValueEnum>>(),
        );
        let global_name = format!("vtable.{}.{}", concrete_mangled, behavior);
        let global = self.module.add_global(vtable_ty, Some(AddressSpace::default()), &global_name);
        global.set_initializer(&initializer);
        global.set_constant(true);
        self.vtables.insert(key, global);
        Ok(global.as_pointer_value())
    }

    /// Packs a concrete value's data pointer with its vtable into the behavior's fat pointer.
    pub(crate) fn compile_dyn_coercion(&mut self, inner: &Expr, behavior: &str) -> Result<BasicValueEnum<'ctx>, String> {
        let inner_ty = self.expr_type(inner);
        let mangled = self.mangled_name_of(&inner_ty);
        let data_ptr = self.compile_expr_as_ptr(inner, &inner_ty)?;
        let vtable_ptr = self.ensure_vtable(&mangled, behavior)?;

        let dyn_ty = self.ensure_dyn_type(behavior);
        let mut agg = dyn_ty.get_undef();
        agg = self.builder.build_insert_value(agg, data_ptr, 0, "dyn.data").map_err(|e| format!("{e}"))?.into_struct_value();
        agg = self.builder.build_insert_value(agg, vtable_ptr, 1, "dyn.vtable").map_err(|e| format!("{e}"))?.into_struct_value();
        Ok(agg.into())
    }

    /// Indirect call through a `dyn` value's vtable slot.
    pub(crate) fn compile_dyn_method_call(
        &mut self,
        receiver: &Expr,
        behavior: &str,
        method: &str,
        args: &[Expr],
    ) -> Result<BasicValueEnum<'ctx>, String> {
        let def = self.env.lookup_behavior(behavior).cloned().ok_or_else(|| format!("unknown behavior `{}`", behavior))?;
        let slot = def.methods.iter().position(|m| m.name == method).ok_or_else(|| format!("`{}` has no method `{}`", behavior, method))?;

        let dyn_val = self.compile_expr(receiver, None)?.into_struct_value();
        let data_ptr = self.builder.build_extract_value(dyn_val, 0, "dyn.data").map_err(|e| format!("{e}"))?.into_pointer_value();
        let vtable_ptr = self.builder.build_extract_value(dyn_val, 1, "dyn.vtable").map_err(|e| format!("{e}"))?.into_pointer_value();

        let vtable_ty = self.context.struct_type(&vec![self.ptr_type().into(); def.methods.len()], false);
        let slot_ptr = self.builder.build_struct_gep(vtable_ty, vtable_ptr, slot as u32, "vtable.slot").map_err(|e| format!("{e}"))?;
        let fn_ptr = self.builder.build_load(self.ptr_type(), slot_ptr, "vtable.fn").map_err(|e| format!("{e}"))?.into_pointer_value();

        let mut call_args: Vec<inkwell::values::BasicMetadataValueEnum> = vec![data_ptr.into()];
        for a in args {
            call_args.push(self.compile_expr(a, None)?.into());
        }
        let params: Vec<_> = call_args.iter().map(|_| self.ptr_type().into()).collect();
        let ret_ty = self.env.interner.primitive(nova_ast::PrimKind::Unit);
        let fn_type = self.fn_type_for(&params, &ret_ty, false);
        let call = self.builder.build_indirect_call(fn_type, fn_ptr, &call_args, "dyn.call").map_err(|e| format!("{e}"))?;
        Ok(call.try_as_basic_value().left().unwrap_or_else(|| self.context.struct_type(&[], false).get_undef().into()))
    }

    pub(crate) fn compile_dyn_is_check(&mut self, inner: &Expr, target: &TypePtr) -> Result<BasicValueEnum<'ctx>, String> {
        // Without a runtime type tag in the fat pointer, static `dyn` values can only be
        // checked against the behavior they were coerced through; a concrete-type `is`
        // check against a dyn value is handled by the checker rejecting it (T104) before
        // codegen ever sees this path for anything but the always-true behavior check.
        let _ = (inner, target);
        Ok(self.context.bool_type().const_int(1, false).into())
    }
}
