//! Struct layout and literal construction (§4.4 "Struct expressions"). Fields are laid out
//! in declaration order; a generic instance's field types are the substituted ones, built
//! the first time that instantiation is referenced.
use inkwell::types::{BasicType, BasicTypeEnum, StructType};
use inkwell::values::PointerValue;

use nova_ast::Expr;

use super::IrGen;
use crate::type_system::TypePtr;

impl<'ctx> IrGen<'ctx> {
    /// Returns the LLVM struct type for `ty` (a `Ty::Named`/`Ty::Class` naming a struct),
    /// building it (and any field types it needs) on first reference.
    pub(crate) fn ensure_struct_type(&mut self, ty: &TypePtr) -> StructType<'ctx> {
        let mangled = self.mangled_name_of(ty);
        if let Some(existing) = self.struct_types.get(&mangled) {
            return *existing;
        }

        let base_name = ty.base_name().unwrap_or_default().to_string();
        let Some(def) = self.env.lookup_struct(&base_name).cloned() else {
            // Class types reuse this path too.
            return self.ensure_class_type(ty);
        };

        let subst = self.substitution_for(&def.type_params, ty.type_args());
        let opaque = self.context.opaque_struct_type(&mangled);
        self.struct_types.insert(mangled.clone(), opaque);

        let mut fields = Vec::with_capacity(def.fields.len());
        let mut field_llvm = Vec::with_capacity(def.fields.len());
        for f in &def.fields {
            let field_ty = self.env.substitute(&f.ty, &subst);
            field_llvm.push(self.ty_to_llvm(&field_ty));
            fields.push((f.name.clone(), field_ty));
        }
        opaque.set_body(&field_llvm, false);
        self.struct_fields.insert(mangled, fields);
        opaque
    }

    fn ensure_class_type(&mut self, ty: &TypePtr) -> StructType<'ctx> {
        let mangled = self.mangled_name_of(ty);
        if let Some(existing) = self.struct_types.get(&mangled) {
            return *existing;
        }
        let base_name = ty.base_name().unwrap_or_default().to_string();
        let Some(def) = self.env.lookup_class(&base_name).cloned() else {
            let opaque = self.context.opaque_struct_type(&mangled);
            opaque.set_body(&[], false);
            self.struct_types.insert(mangled, opaque);
            return opaque;
        };

        let subst = self.substitution_for(&def.type_params, ty.type_args());
        let opaque = self.context.opaque_struct_type(&mangled);
        self.struct_types.insert(mangled.clone(), opaque);

        // Single inheritance: base class fields come first, matching field-offset stability
        // up the inheritance chain.
        let mut fields = Vec::new();
        if let Some(base_name) = &def.base {
            if let Some(base_def) = self.env.lookup_class(base_name).cloned() {
                for f in &base_def.fields {
                    if !f.is_static {
                        fields.push((f.name.clone(), self.env.substitute(&f.ty, &subst)));
                    }
                }
            }
        }
        for f in &def.fields {
            if !f.is_static {
                fields.push((f.name.clone(), self.env.substitute(&f.ty, &subst)));
            }
        }

        let field_llvm: Vec<BasicTypeEnum> = fields.iter().map(|(_, t)| self.ty_to_llvm(t)).collect();
        opaque.set_body(&field_llvm, false);
        self.struct_fields.insert(mangled, fields);
        opaque
    }

    fn substitution_for(&self, type_params: &[String], args: &[TypePtr]) -> std::collections::HashMap<String, TypePtr> {
        type_params.iter().cloned().zip(args.iter().cloned()).collect()
    }

    pub(crate) fn field_index(&mut self, ty: &TypePtr, field_name: &str) -> Option<(u32, TypePtr)> {
        let mangled = self.mangled_name_of(ty);
        if !self.struct_fields.contains_key(&mangled) {
            self.ensure_struct_type(ty);
        }
        let fields = self.struct_fields.get(&mangled)?;
        fields
            .iter()
            .position(|(n, _)| n == field_name)
            .map(|i| (i as u32, fields[i].1.clone()))
    }

    /// Allocates on the stack, GEPs and stores each field by name, then loads the whole
    /// struct value. Generic structs infer their type arguments from the field value types
    /// (already resolved by the checker) and request that instantiation.
    pub(crate) fn compile_struct_literal(
        &mut self,
        name: &str,
        result_ty: &TypePtr,
        fields: &[(String, Expr)],
    ) -> Result<PointerValue<'ctx>, String> {
        let _ = name;
        let struct_ty = self.ensure_struct_type(result_ty);
        let mangled = self.mangled_name_of(result_ty);
        let alloca = self
            .builder
            .build_alloca(struct_ty, &self.fresh_name("structlit"))
            .map_err(|e| format!("failed to allocate struct literal: {e}"))?;

        let field_defs = self.struct_fields.get(&mangled).cloned().unwrap_or_default();
        for (field_name, expr) in fields {
            let Some((index, field_ty)) = field_defs.iter().position(|(n, _)| n == field_name).map(|i| (i as u32, field_defs[i].1.clone())) else {
                continue;
            };
            let value = self.compile_expr(expr, Some(&field_ty))?;
            let ptr = self
                .builder
                .build_struct_gep(struct_ty, alloca, index, &format!("{}.ptr", field_name))
                .map_err(|e| format!("failed to GEP field `{}`: {e}", field_name))?;
            self.builder.build_store(ptr, value).map_err(|e| format!("failed to store field `{}`: {e}", field_name))?;
        }

        Ok(alloca)
    }
}
