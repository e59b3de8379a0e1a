//! Scope-exit destructor emission (§4.4 "Automatic drop"). LIFO order, mirroring
//! `TypeEnv::Scope::drop_list` but keyed to LLVM allocas instead of semantic bindings.
use inkwell::values::PointerValue;

use nova_ast::PrimKind;

use super::{CodegenScope, IrGen};
use crate::type_system::{Ty, TypePtr};

impl<'ctx> IrGen<'ctx> {
    pub(crate) fn push_scope(&mut self) {
        self.scope_stack.push(CodegenScope::default());
    }

    /// Registers a local as needing a drop at scope exit, if its type needs one. Call this
    /// right after the alloca for a `let`/parameter/pattern binding is created.
    pub(crate) fn track_for_drop(&mut self, name: &str, ty: &TypePtr) {
        if self.env.needs_drop(ty) {
            if let Some(scope) = self.scope_stack.last_mut() {
                scope.drop_list.push((name.to_string(), ty.clone()));
            }
        }
    }

    /// Marks a local as moved out of, so the scope it was declared in does not double-drop
    /// it (§7 "double free after move" / T301).
    pub(crate) fn untrack_for_drop(&mut self, name: &str) {
        for scope in self.scope_stack.iter_mut().rev() {
            scope.drop_list.retain(|(n, _)| n != name);
        }
    }

    /// Pops the innermost scope and emits its destructors in reverse declaration order.
    /// Used at normal block exit; `return`/`break`/`continue` call `emit_drops_for_unwind`
    /// instead, since those paths must drop every open scope up to the function/loop boundary
    /// without actually popping `scope_stack` (the surrounding blocks are still live).
    pub(crate) fn pop_scope_and_emit_drops(&mut self) -> Result<(), String> {
        let scope = self.scope_stack.pop().unwrap_or_default();
        self.emit_drops(&scope.drop_list)
    }

    /// Emits drops for every scope from the innermost up to (but not including) the scope at
    /// `stop_at_depth`, without popping them — used when a `return`/`break`/`continue`
    /// unwinds through scopes that remain open for other control-flow paths.
    pub(crate) fn emit_drops_for_unwind(&mut self, stop_at_depth: usize) -> Result<(), String> {
        let scopes: Vec<_> = self.scope_stack[stop_at_depth..]
            .iter()
            .rev()
            .map(|s| s.drop_list.clone())
            .collect();
        for drop_list in scopes {
            self.emit_drops(&drop_list)?;
        }
        Ok(())
    }

    fn emit_drops(&mut self, drop_list: &[(String, TypePtr)]) -> Result<(), String> {
        for (name, ty) in drop_list.iter().rev() {
            let Some((ptr, _)) = self.variables.get(name).copied() else { continue };
            self.emit_drop_for_value(ptr, ty)?;
        }
        Ok(())
    }

    /// Dispatches a single drop call: heap strings go to `tml_str_free`, anything implementing
    /// `Drop` (or with fields that do) goes through its memoized `tml_<Type>_drop`.
    pub(crate) fn emit_drop_for_value(&mut self, ptr: PointerValue<'ctx>, ty: &TypePtr) -> Result<(), String> {
        match ty.as_ref() {
            Ty::Primitive(PrimKind::Str) => {
                let loaded = self
                    .builder
                    .build_load(self.ptr_type(), ptr, "drop.str.load")
                    .map_err(|e| format!("{e}"))?;
                let free_fn = self.require_runtime_decl("tml_str_free");
                self.builder
                    .build_call(free_fn, &[loaded.into()], "")
                    .map_err(|e| format!("{e}"))?;
                Ok(())
            }
            Ty::Named { .. } | Ty::Class { .. } => {
                let drop_fn = self.ensure_drop_fn(ty)?;
                self.builder.build_call(drop_fn, &[ptr.into()], "").map_err(|e| format!("{e}"))?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Memoized per-type drop function: calls the user `Drop::drop` impl if present, then
    /// recursively drops every field (struct) or active-variant payload field (enum) that
    /// itself needs a drop, in reverse declaration order.
    fn ensure_drop_fn(&mut self, ty: &TypePtr) -> Result<inkwell::values::FunctionValue<'ctx>, String> {
        let mangled = self.mangled_name_of(ty);
        let fn_name = format!("tml_{}_drop", mangled);
        if let Some(existing) = self.drop_fns.get(&fn_name) {
            return Ok(*existing);
        }

        let base_name = ty.base_name().unwrap_or_default().to_string();
        let is_enum = self.env.lookup_enum(&base_name).is_some();

        let void_ty = self.context.void_type();
        let fn_type = void_ty.fn_type(&[self.ptr_type().into()], false);
        let function = self.module.add_function(&fn_name, fn_type, None);
        self.drop_fns.insert(fn_name, function);

        let entry = self.context.append_basic_block(function, "entry");
        let saved_block = self.builder.get_insert_block();
        let saved_fn = self.current_function;
        self.builder.position_at_end(entry);
        self.current_function = Some(function);

        let self_ptr = function.get_nth_param(0).ok_or("drop fn missing self param")?.into_pointer_value();

        if self.env.implements(ty, "Drop") {
            let user_drop_name = format!("{}_Drop_drop", mangled);
            if let Some(user_fn) = self.functions.get(&user_drop_name).copied() {
                self.builder.build_call(user_fn, &[self_ptr.into()], "").map_err(|e| format!("{e}"))?;
            }
        }

        if is_enum {
            self.emit_enum_drop_body(ty, &mangled, self_ptr)?;
        } else {
            let struct_ty = self.ensure_struct_type(ty);
            let fields = self.struct_fields.get(&mangled).cloned().unwrap_or_default();
            for (i, (_, field_ty)) in fields.iter().enumerate().rev() {
                if self.env.needs_drop(field_ty) {
                    let field_ptr = self
                        .builder
                        .build_struct_gep(struct_ty, self_ptr, i as u32, "drop.field.ptr")
                        .map_err(|e| format!("{e}"))?;
                    self.emit_drop_for_value(field_ptr, field_ty)?;
                }
            }
        }

        self.builder.build_return(None).map_err(|e| format!("{e}"))?;

        if let Some(block) = saved_block {
            self.builder.position_at_end(block);
        }
        self.current_function = saved_fn;

        Ok(function)
    }

    /// Discriminant switch that drops only the active variant's payload fields, keyed by the
    /// enum's mangled name so a self-referential enum (a variant holding itself) memoizes to
    /// one drop function instead of recursing into an infinite one per nesting depth.
    fn emit_enum_drop_body(&mut self, ty: &TypePtr, mangled: &str, self_ptr: PointerValue<'ctx>) -> Result<(), String> {
        let enum_struct = self.ensure_enum_type(ty);
        let variants = self.enum_variants.get(mangled).cloned().unwrap_or_default();
        if !variants.iter().any(|(_, payload)| payload.iter().any(|p| self.env.needs_drop(p))) {
            return Ok(());
        }

        let tag_ptr = self
            .builder
            .build_struct_gep(enum_struct, self_ptr, 0, "drop.tag.ptr")
            .map_err(|e| format!("failed to GEP discriminant: {e}"))?;
        let tag_val = self
            .builder
            .build_load(self.context.i32_type(), tag_ptr, "drop.tag")
            .map_err(|e| format!("{e}"))?
            .into_int_value();

        let function = self.current_function.expect("enum drop fn body");
        let after_bb = self.context.append_basic_block(function, "drop.after");

        let mut cases = Vec::with_capacity(variants.len());
        let mut blocks = Vec::with_capacity(variants.len());
        for i in 0..variants.len() {
            let block = self.context.append_basic_block(function, &format!("drop.variant.{i}"));
            cases.push((self.context.i32_type().const_int(i as u64, false), block));
            blocks.push(block);
        }
        self.builder.build_switch(tag_val, after_bb, &cases).map_err(|e| format!("failed to build switch: {e}"))?;

        for (i, (_, payload_tys)) in variants.iter().enumerate() {
            self.builder.position_at_end(blocks[i]);
            if !payload_tys.is_empty() {
                let payload_llvm: Vec<_> = payload_tys.iter().map(|t| self.ty_to_llvm(t)).collect();
                let payload_struct = self.context.struct_type(&payload_llvm, false);
                let payload_ptr = self
                    .builder
                    .build_struct_gep(enum_struct, self_ptr, 1, "drop.payload.ptr")
                    .map_err(|e| format!("failed to GEP payload: {e}"))?;
                let payload_ptr = self
                    .builder
                    .build_pointer_cast(payload_ptr, self.ptr_type(), "drop.payload.cast")
                    .map_err(|e| format!("{e}"))?;
                for (j, field_ty) in payload_tys.iter().enumerate().rev() {
                    if self.env.needs_drop(field_ty) {
                        let field_ptr = self
                            .builder
                            .build_struct_gep(payload_struct, payload_ptr, j as u32, "drop.payload.field.ptr")
                            .map_err(|e| format!("failed to GEP payload field {j}: {e}"))?;
                        self.emit_drop_for_value(field_ptr, field_ty)?;
                    }
                }
            }
            self.builder.build_unconditional_branch(after_bb).map_err(|e| format!("{e}"))?;
        }

        self.builder.position_at_end(after_bb);
        Ok(())
    }
}
