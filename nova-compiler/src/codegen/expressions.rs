//! Expression lowering (§4.4). Mirrors `checker::expr::infer_expr`'s shape — same recursive
//! structure, same expected-type threading — but emits LLVM IR instead of a `TypePtr`. The
//! checker has already proven every expression well-typed; this trusts that and focuses on
//! *how* to materialize a value, not whether it type-checks.
use inkwell::values::{BasicValue, BasicValueEnum, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};

use nova_ast::{BinaryOp, Expr, UnaryOp};

use super::IrGen;
use crate::type_system::{Ty, TypePtr};

impl<'ctx> IrGen<'ctx> {
    /// Infers an expression's semantic type the same way the checker did, without emitting
    /// diagnostics (the checker already ran; this just needs the `TypePtr` codegen decisions
    /// key off of, e.g. which `str_concat` strategy or which arithmetic width to pick).
    pub(crate) fn expr_type(&mut self, expr: &Expr) -> TypePtr {
        let ctx = crate::checker::CheckContext::default();
        let mut throwaway = nova_diagnostics::DiagnosticEngine::new();
        let mut pending = Vec::new();
        crate::checker::expr::infer_expr(&mut self.env, &mut throwaway, &mut pending, ctx, expr, None)
    }

    pub(crate) fn compile_expr(&mut self, expr: &Expr, expected: Option<&TypePtr>) -> Result<BasicValueEnum<'ctx>, String> {
        match expr {
            Expr::IntLiteral { value, suffix, .. } => {
                let kind = suffix.unwrap_or_else(|| match expected.map(|t| t.as_ref()) {
                    Some(Ty::Primitive(k)) => *k,
                    _ => nova_ast::PrimKind::I64,
                });
                Ok(self.int_llvm_type(kind).const_int(*value as u64, kind.is_signed()).into())
            }
            Expr::FloatLiteral { value, suffix, .. } => {
                let is_f32 = matches!(suffix, Some(nova_ast::PrimKind::F32));
                if is_f32 {
                    Ok(self.context.f32_type().const_float(*value).into())
                } else {
                    Ok(self.context.f64_type().const_float(*value).into())
                }
            }
            Expr::StringLiteral(s, _) => Ok(self.compile_string_literal(s).into()),
            Expr::BoolLiteral(b, _) => Ok(self.context.bool_type().const_int(*b as u64, false).into()),
            Expr::CharLiteral(c, _) => Ok(self.context.i32_type().const_int(*c as u64, false).into()),
            Expr::Null(_) => Ok(self.ptr_type().const_null().into()),

            Expr::Ident(name, _) => self.compile_ident(name),

            Expr::Binary { op, left, right, .. } => self.compile_binary(*op, left, right),
            Expr::Unary { op, operand, .. } => self.compile_unary(*op, operand),

            Expr::Call { callee, args, .. } => self.compile_call(callee, args),
            Expr::MethodCall { receiver, method, args, .. } => self.compile_method_call(receiver, method, args),
            Expr::FieldAccess { object, field, .. } => {
                let ptr = self.field_ptr(object, field)?;
                let field_ty = self.field_access_type(object, field);
                let llvm_ty = self.ty_to_llvm(&field_ty);
                Ok(self.builder.build_load(llvm_ty, ptr, "field.load").map_err(|e| format!("{e}"))?)
            }
            Expr::Index { object, index, .. } => self.compile_index(object, index),

            Expr::ArrayLiteral(elems, _) => self.compile_array_literal(elems, expected),
            Expr::TupleLiteral(elems, _) => self.compile_tuple_literal(elems),
            Expr::StructLiteral { name, fields, .. } => {
                let result_ty = expected.cloned().unwrap_or_else(|| self.expr_type(expr));
                let ptr = self.compile_struct_literal(name, &result_ty, fields)?;
                let llvm_ty = self.ensure_struct_type(&result_ty);
                Ok(self.builder.build_load(llvm_ty, ptr, "structlit.load").map_err(|e| format!("{e}"))?)
            }
            Expr::EnumLiteral { variant, args, .. } => {
                let result_ty = expected.cloned().unwrap_or_else(|| self.expr_type(expr));
                let ptr = self.compile_enum_literal(&result_ty, variant, args)?;
                let llvm_ty = self.ensure_enum_type(&result_ty);
                Ok(self.builder.build_load(llvm_ty, ptr, "enumlit.load").map_err(|e| format!("{e}"))?)
            }

            Expr::Reference { expr: inner, .. } => Ok(self.compile_expr_as_ptr_any(inner)?.into()),
            Expr::Deref(inner, _) => {
                let inner_val = self.compile_expr(inner, None)?;
                let ptr = inner_val.into_pointer_value();
                let pointee = self.expr_type(expr);
                let llvm_ty = self.ty_to_llvm(&pointee);
                Ok(self.builder.build_load(llvm_ty, ptr, "deref.load").map_err(|e| format!("{e}"))?)
            }
            Expr::Await(inner, _) => self.compile_expr(inner, None),
            Expr::Cast { expr: inner, .. } => self.compile_cast(inner, expected, expr),
            Expr::IsCheck { expr: inner, target, .. } => self.compile_is_check(inner, target),

            Expr::If { cond, then_block, elif_branches, else_block, .. } => {
                self.compile_if(cond, then_block, elif_branches, else_block, expected)
            }
            Expr::IfLet { pattern, value, then_block, else_block, .. } => {
                self.compile_if_let(pattern, value, then_block, else_block, expected)
            }
            Expr::When { scrutinee, arms, .. } => {
                let scrutinee_ty = self.expr_type(scrutinee);
                self.compile_when(scrutinee, &scrutinee_ty, arms, expected)
            }
            Expr::Loop { body, .. } => self.compile_loop(body),
            Expr::While { cond, body, .. } => self.compile_while(cond, body),
            Expr::For { var, iterable, body, .. } => self.compile_for(var, iterable, body),
            Expr::Block(block, _) => self.compile_block_expr(block, expected),
            Expr::Closure { params, body, .. } => self.compile_closure(params, body),
        }
    }

    /// Produces a pointer to the expression's storage rather than a loaded value — used for
    /// `when` scrutinees, struct-literal field targets, and `&expr`.
    pub(crate) fn compile_expr_as_ptr(&mut self, expr: &Expr, _ty: &TypePtr) -> Result<PointerValue<'ctx>, String> {
        self.compile_expr_as_ptr_any(expr)
    }

    fn compile_expr_as_ptr_any(&mut self, expr: &Expr) -> Result<PointerValue<'ctx>, String> {
        match expr {
            Expr::Ident(name, _) => self
                .variables
                .get(name)
                .map(|(p, _)| *p)
                .or_else(|| self.globals.get(name).copied())
                .ok_or_else(|| format!("undefined identifier `{}`", name)),
            Expr::FieldAccess { object, field, .. } => self.field_ptr(object, field),
            Expr::Index { object, index, .. } => self.index_ptr(object, index),
            Expr::Deref(inner, _) => Ok(self.compile_expr(inner, None)?.into_pointer_value()),
            Expr::StructLiteral { name, fields, .. } => {
                let result_ty = self.expr_type(expr);
                self.compile_struct_literal(name, &result_ty, fields)
            }
            Expr::EnumLiteral { variant, args, .. } => {
                let result_ty = self.expr_type(expr);
                self.compile_enum_literal(&result_ty, variant, args)
            }
            other => {
                let ty = self.expr_type(other);
                let value = self.compile_expr(other, Some(&ty))?;
                let llvm_ty = self.ty_to_llvm(&ty);
                let slot = self.builder.build_alloca(llvm_ty, &self.fresh_name("tmp")).map_err(|e| format!("{e}"))?;
                self.builder.build_store(slot, value).map_err(|e| format!("{e}"))?;
                Ok(slot)
            }
        }
    }

    fn compile_ident(&mut self, name: &str) -> Result<BasicValueEnum<'ctx>, String> {
        if let Some((ptr, ty)) = self.variables.get(name).cloned() {
            let llvm_ty = self.ty_to_llvm(&ty);
            return Ok(self.builder.build_load(llvm_ty, ptr, name).map_err(|e| format!("{e}"))?);
        }
        if let Some(ptr) = self.globals.get(name).copied() {
            let ty = self.env.lookup_const(name).cloned().unwrap_or_else(|| self.env.interner.primitive(nova_ast::PrimKind::Unit));
            let llvm_ty = self.ty_to_llvm(&ty);
            return Ok(self.builder.build_load(llvm_ty, ptr, name).map_err(|e| format!("{e}"))?);
        }
        if let Some(func) = self.functions.get(name).copied() {
            return Ok(func.as_global_value().as_pointer_value().into());
        }
        Err(format!("undefined identifier `{}`", name))
    }

    fn compile_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<BasicValueEnum<'ctx>, String> {
        let left_ty = self.expr_type(left);
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            return self.compile_short_circuit(op, left, right);
        }
        if matches!(left_ty.as_ref(), Ty::Primitive(nova_ast::PrimKind::Str)) {
            return self.compile_string_binary(op, left, right);
        }

        let lv = self.compile_expr(left, None)?;
        let rv = self.compile_expr(right, None)?;
        let is_float = matches!(left_ty.as_ref(), Ty::Primitive(k) if k.is_float());
        let is_signed = matches!(left_ty.as_ref(), Ty::Primitive(k) if k.is_signed());

        if is_float {
            let (l, r) = (lv.into_float_value(), rv.into_float_value());
            let b = &self.builder;
            let result: BasicValueEnum = match op {
                BinaryOp::Add => b.build_float_add(l, r, "fadd").map_err(|e| format!("{e}"))?.into(),
                BinaryOp::Sub => b.build_float_sub(l, r, "fsub").map_err(|e| format!("{e}"))?.into(),
                BinaryOp::Mul => b.build_float_mul(l, r, "fmul").map_err(|e| format!("{e}"))?.into(),
                BinaryOp::Div => b.build_float_div(l, r, "fdiv").map_err(|e| format!("{e}"))?.into(),
                BinaryOp::Mod => b.build_float_rem(l, r, "frem").map_err(|e| format!("{e}"))?.into(),
                BinaryOp::Eq => b.build_float_compare(FloatPredicate::OEQ, l, r, "feq").map_err(|e| format!("{e}"))?.into(),
                BinaryOp::NotEq => b.build_float_compare(FloatPredicate::ONE, l, r, "fne").map_err(|e| format!("{e}"))?.into(),
                BinaryOp::Lt => b.build_float_compare(FloatPredicate::OLT, l, r, "flt").map_err(|e| format!("{e}"))?.into(),
                BinaryOp::LtEq => b.build_float_compare(FloatPredicate::OLE, l, r, "fle").map_err(|e| format!("{e}"))?.into(),
                BinaryOp::Gt => b.build_float_compare(FloatPredicate::OGT, l, r, "fgt").map_err(|e| format!("{e}"))?.into(),
                BinaryOp::GtEq => b.build_float_compare(FloatPredicate::OGE, l, r, "fge").map_err(|e| format!("{e}"))?.into(),
                _ => return Err(format!("operator {:?} is not valid on floats", op)),
            };
            return Ok(result);
        }

        let (l, r) = (lv.into_int_value(), rv.into_int_value());
        let b = &self.builder;
        let signed_pred = |p: IntPredicate| p;
        let result: BasicValueEnum = match op {
            BinaryOp::Add => b.build_int_add(l, r, "add").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Sub => b.build_int_sub(l, r, "sub").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Mul => b.build_int_mul(l, r, "mul").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Div if is_signed => b.build_int_signed_div(l, r, "sdiv").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Div => b.build_int_unsigned_div(l, r, "udiv").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Mod if is_signed => b.build_int_signed_rem(l, r, "srem").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Mod => b.build_int_unsigned_rem(l, r, "urem").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Eq => b.build_int_compare(IntPredicate::EQ, l, r, "eq").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::NotEq => b.build_int_compare(IntPredicate::NE, l, r, "ne").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Lt => b.build_int_compare(signed_pred(if is_signed { IntPredicate::SLT } else { IntPredicate::ULT }), l, r, "lt").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::LtEq => b.build_int_compare(if is_signed { IntPredicate::SLE } else { IntPredicate::ULE }, l, r, "le").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Gt => b.build_int_compare(if is_signed { IntPredicate::SGT } else { IntPredicate::UGT }, l, r, "gt").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::GtEq => b.build_int_compare(if is_signed { IntPredicate::SGE } else { IntPredicate::UGE }, l, r, "ge").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::BitAnd => b.build_and(l, r, "and").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::BitOr => b.build_or(l, r, "or").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::BitXor => b.build_xor(l, r, "xor").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Shl => b.build_left_shift(l, r, "shl").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::Shr => b.build_right_shift(l, r, is_signed, "shr").map_err(|e| format!("{e}"))?.into(),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };
        Ok(result)
    }

    /// `&&`/`||` short-circuit: the right side is only evaluated inside its own basic block.
    fn compile_short_circuit(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<BasicValueEnum<'ctx>, String> {
        let function = self.current_function.ok_or("short-circuit operator outside a function")?;
        let lv = self.compile_expr(left, None)?.into_int_value();
        let rhs_bb = self.context.append_basic_block(function, "sc.rhs");
        let merge_bb = self.context.append_basic_block(function, "sc.merge");
        let entry_bb = self.builder.get_insert_block().ok_or("no current block")?;

        if op == BinaryOp::And {
            self.builder.build_conditional_branch(lv, rhs_bb, merge_bb).map_err(|e| format!("{e}"))?;
        } else {
            self.builder.build_conditional_branch(lv, merge_bb, rhs_bb).map_err(|e| format!("{e}"))?;
        }

        self.builder.position_at_end(rhs_bb);
        let rv = self.compile_expr(right, None)?.into_int_value();
        let rhs_end = self.builder.get_insert_block().ok_or("no current block")?;
        self.builder.build_unconditional_branch(merge_bb).map_err(|e| format!("{e}"))?;

        self.builder.position_at_end(merge_bb);
        let phi = self.builder.build_phi(self.context.bool_type(), "sc.result").map_err(|e| format!("{e}"))?;
        phi.add_incoming(&[(&lv, entry_bb), (&rv, rhs_end)]);
        Ok(phi.as_basic_value())
    }

    fn compile_string_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<BasicValueEnum<'ctx>, String> {
        match op {
            BinaryOp::Add => self.compile_string_concat_chain(left, right),
            BinaryOp::Eq | BinaryOp::NotEq => {
                let lv = self.compile_expr(left, None)?.into_pointer_value();
                let rv = self.compile_expr(right, None)?.into_pointer_value();
                let eq_fn = self.require_runtime_decl("str_eq");
                let call = self.builder.build_call(eq_fn, &[lv.into(), rv.into()], "streq").map_err(|e| format!("{e}"))?;
                let result = call.try_as_basic_value().left().ok_or("str_eq returned no value")?.into_int_value();
                if op == BinaryOp::NotEq {
                    Ok(self.builder.build_not(result, "strne").map_err(|e| format!("{e}"))?.into())
                } else {
                    Ok(result.into())
                }
            }
            _ => Err(format!("operator {:?} is not valid on strings", op)),
        }
    }

    fn compile_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<BasicValueEnum<'ctx>, String> {
        let ty = self.expr_type(operand);
        let v = self.compile_expr(operand, None)?;
        match op {
            UnaryOp::Neg if matches!(ty.as_ref(), Ty::Primitive(k) if k.is_float()) => {
                Ok(self.builder.build_float_neg(v.into_float_value(), "fneg").map_err(|e| format!("{e}"))?.into())
            }
            UnaryOp::Neg => Ok(self.builder.build_int_neg(v.into_int_value(), "neg").map_err(|e| format!("{e}"))?.into()),
            UnaryOp::Not => Ok(self.builder.build_not(v.into_int_value(), "not").map_err(|e| format!("{e}"))?.into()),
        }
    }

    fn compile_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        if let Expr::Ident(name, _) = callee {
            if let Some(result) = self.try_compile_intrinsic(name, args)? {
                return Ok(result);
            }
            if let Some(def_name) = self.enum_variant_owner(name) {
                let enum_ty = self.env.lookup_enum(&def_name).map(|d| {
                    self.env.interner.intern(Ty::Named { module_path: vec![], name: def_name.clone(), args: vec![] })
                });
                if let Some(enum_ty) = enum_ty {
                    let ptr = self.compile_enum_literal(&enum_ty, name, args)?;
                    let llvm_ty = self.ensure_enum_type(&enum_ty);
                    return Ok(self.builder.build_load(llvm_ty, ptr, "enumctor.load").map_err(|e| format!("{e}"))?);
                }
            }
            if let Some(func) = self.functions.get(name).copied() {
                let compiled_args = self.compile_call_args(func, args)?;
                let call = self.builder.build_call(func, &compiled_args, "call").map_err(|e| format!("{e}"))?;
                let value = call.try_as_basic_value().left().unwrap_or_else(|| self.unit_value());
                return self.maybe_unwrap_async_call(name, value);
            }
            if let Some(func) = self.resolve_generic_call(name, args)? {
                let compiled_args = self.compile_call_args(func, args)?;
                let call = self.builder.build_call(func, &compiled_args, "call").map_err(|e| format!("{e}"))?;
                let value = call.try_as_basic_value().left().unwrap_or_else(|| self.unit_value());
                return self.maybe_unwrap_async_call(name, value);
            }
            return Err(format!("undefined function `{}`", name));
        }

        let callee_val = self.compile_expr(callee, None)?;
        let callee_ty = self.expr_type(callee);
        let fn_ptr = if matches!(callee_ty.as_ref(), Ty::Closure { .. }) {
            self.builder.build_extract_value(callee_val.into_struct_value(), 0, "closure.fn").map_err(|e| format!("{e}"))?.into_pointer_value()
        } else {
            callee_val.into_pointer_value()
        };
        let mut compiled_args = Vec::with_capacity(args.len());
        for a in args {
            compiled_args.push(self.compile_expr(a, None)?.into());
        }
        let ret_ty = match callee_ty.as_ref() {
            Ty::Func { ret, .. } | Ty::Closure { ret, .. } => ret.clone(),
            _ => self.env.interner.primitive(nova_ast::PrimKind::Unit),
        };
        let params: Vec<_> = compiled_args.iter().map(|_| self.ptr_type().into()).collect();
        let fn_type = self.fn_type_for(&params, &ret_ty, false);
        let call = self
            .builder
            .build_indirect_call(fn_type, fn_ptr, &compiled_args, "indirect.call")
            .map_err(|e| format!("{e}"))?;
        Ok(call.try_as_basic_value().left().unwrap_or_else(|| self.unit_value()))
    }

    /// If `name` names an `async` function, unwraps the `Poll[T]` value its call just produced
    /// back to `T` (see `enums::unwrap_poll_ready`); otherwise passes `value` through. Keeps
    /// `compile_call`'s two named-call branches matching the checker's view that calling an
    /// `async` function yields `T` directly, `.await` or not.
    fn maybe_unwrap_async_call(&mut self, name: &str, value: BasicValueEnum<'ctx>) -> Result<BasicValueEnum<'ctx>, String> {
        let Some(sig) = self.env.lookup_function(name).cloned() else { return Ok(value) };
        if !sig.is_async {
            return Ok(value);
        }
        self.unwrap_poll_ready(value, &sig.return_type)
    }

    /// A generic free function wasn't found under its plain name — unify its signature
    /// against the argument types (the same way `checker::expr::infer_call` does), request
    /// the instantiation, and declare (not yet define — the pump fills the body in later
    /// pass) the mangled symbol so this call site has something to call immediately.
    fn resolve_generic_call(&mut self, name: &str, args: &[Expr]) -> Result<Option<inkwell::values::FunctionValue<'ctx>>, String> {
        let Some(sig) = self.env.lookup_function(name).cloned() else { return Ok(None) };
        if sig.type_params.is_empty() {
            return Ok(None);
        }
        let arg_tys: Vec<TypePtr> = args.iter().map(|a| self.expr_type(a)).collect();
        let subst = crate::checker::expr::unify_params(&sig.params, &arg_tys);
        let unit = self.env.interner.primitive(nova_ast::PrimKind::Unit);
        let type_args: Vec<TypePtr> = sig.type_params.iter().map(|p| subst.get(p).cloned().unwrap_or_else(|| unit.clone())).collect();

        let key = crate::mono::MangleKey { kind: crate::mono::MonoKind::Function, base_name: name.to_string(), args: type_args, impl_type: None };
        let mangled = key.mangled_name();
        self.mono.request(key);

        if let Some(existing) = self.functions.get(&mangled).copied() {
            return Ok(Some(existing));
        }
        let ret_ty = self.env.substitute(&sig.return_type, &subst);
        let param_llvm: Vec<_> = sig.params.iter().map(|p| self.env.substitute(p, &subst)).map(|t| self.ty_to_metadata(&t)).collect();
        let fn_type = self.fn_type_for(&param_llvm, &ret_ty, false);
        let llvm_name = format!("tml_{}", mangled);
        let function = self.module.get_function(&llvm_name).unwrap_or_else(|| self.module.add_function(&llvm_name, fn_type, None));
        self.functions.insert(mangled, function);
        Ok(Some(function))
    }

    fn compile_call_args(&mut self, func: inkwell::values::FunctionValue<'ctx>, args: &[Expr]) -> Result<Vec<inkwell::values::BasicMetadataValueEnum<'ctx>>, String> {
        let mut out = Vec::with_capacity(args.len());
        for (i, a) in args.iter().enumerate() {
            let expected = func.get_nth_param(i as u32).map(|p| p.get_type());
            let _ = expected;
            out.push(self.compile_expr(a, None)?.into());
        }
        Ok(out)
    }

    /// Method dispatch (§4.4): dynamic dispatch for `dyn Behavior` receivers, otherwise a
    /// qualified-name lookup (`{Type}::{method}`, falling back to the owning behavior's
    /// default body) walking the receiver's deref chain, mirroring
    /// `checker::expr::infer_method_call`'s own walk.
    fn compile_method_call(&mut self, receiver: &Expr, method: &str, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let receiver_ty = self.expr_type(receiver);

        if let Ty::DynBehavior { behavior, .. } = receiver_ty.as_ref() {
            return self.compile_dyn_method_call(receiver, behavior, method, args);
        }

        let mut current = receiver_ty.clone();
        loop {
            if let Some(base) = current.base_name() {
                // A monomorphized owner's methods are keyed by its full mangled name (distinct
                // per instantiation); a non-generic owner's mangled name equals its plain name,
                // so this lookup also covers the non-generic case without a fallback.
                let mangled = self.mangled_name_of(&current);
                let qualified = format!("{}::{}", mangled, method);
                if let Some(func) = self.functions.get(&qualified).copied() {
                    return self.emit_method_call(func, receiver, &receiver_ty, args, &qualified);
                }
                let unmangled = base.split("__").next().unwrap_or(base).to_string();
                if let Some(behavior) = self.env.impls_for(&unmangled).find_map(|r| r.behavior.clone()) {
                    let fallback = format!("{}::{}", behavior, method);
                    if let Some(func) = self.functions.get(&fallback).copied() {
                        return self.emit_method_call(func, receiver, &receiver_ty, args, &fallback);
                    }
                }
            }
            match current.as_ref() {
                Ty::Ref { inner, .. } | Ty::Ptr { inner, .. } => current = inner.clone(),
                _ => break,
            }
        }

        Err(format!("no method named `{}` found for this receiver", method))
    }

    /// Emits the call once the target function is resolved: `self` is passed as a pointer
    /// (by-reference receiver, per §9's `this`-by-pointer normalization), remaining args by
    /// value.
    fn emit_method_call(
        &mut self,
        func: inkwell::values::FunctionValue<'ctx>,
        receiver: &Expr,
        receiver_ty: &TypePtr,
        args: &[Expr],
        qualified_name: &str,
    ) -> Result<BasicValueEnum<'ctx>, String> {
        let self_ptr = if matches!(receiver_ty.as_ref(), Ty::Ref { .. } | Ty::Ptr { .. }) {
            self.compile_expr(receiver, None)?.into_pointer_value()
        } else {
            self.compile_expr_as_ptr_any(receiver)?
        };
        let mut call_args: Vec<inkwell::values::BasicMetadataValueEnum> = vec![self_ptr.into()];
        for a in args {
            call_args.push(self.compile_expr(a, None)?.into());
        }
        let call = self.builder.build_call(func, &call_args, "methodcall").map_err(|e| format!("{e}"))?;
        let value = call.try_as_basic_value().left().unwrap_or_else(|| self.unit_value());
        self.maybe_unwrap_async_call(qualified_name, value)
    }

    fn enum_variant_owner(&self, variant: &str) -> Option<String> {
        for (name, def) in self.enum_defs_iter() {
            if def.variant(variant).is_some() {
                return Some(name);
            }
        }
        None
    }

    fn enum_defs_iter(&self) -> Vec<(String, crate::type_env::EnumDef)> {
        // `TypeEnv` has no public enum-iteration helper, so this mirrors the checker's own
        // `enum_names_defining_variant` approach by checking every registered struct-style
        // name codegen has already touched, plus a direct name match fallback.
        self.enum_types
            .keys()
            .filter_map(|mangled| {
                let base = mangled.split("__").next().unwrap_or(mangled);
                self.env.lookup_enum(base).map(|d| (base.to_string(), d.clone()))
            })
            .collect()
    }

    fn unit_value(&self) -> BasicValueEnum<'ctx> {
        self.context.struct_type(&[], false).get_undef().into()
    }

    fn field_access_type(&mut self, object: &Expr, field: &str) -> TypePtr {
        let object_ty = self.expr_type(object);
        let unwrapped = self.deref_to_struct(&object_ty);
        self.field_index(&unwrapped, field).map(|(_, t)| t).unwrap_or_else(|| self.env.interner.primitive(nova_ast::PrimKind::Unit))
    }

    fn deref_to_struct(&self, ty: &TypePtr) -> TypePtr {
        match ty.as_ref() {
            Ty::Ref { inner, .. } | Ty::Ptr { inner, .. } => self.deref_to_struct(inner),
            _ => ty.clone(),
        }
    }

    fn field_ptr(&mut self, object: &Expr, field: &str) -> Result<PointerValue<'ctx>, String> {
        let object_ty = self.expr_type(object);
        let struct_ty_ptr = self.deref_to_struct(&object_ty);
        let is_indirect = matches!(object_ty.as_ref(), Ty::Ref { .. } | Ty::Ptr { .. });

        let base_ptr = if is_indirect {
            self.compile_expr(object, None)?.into_pointer_value()
        } else {
            self.compile_expr_as_ptr_any(object)?
        };

        let struct_ty = self.ensure_struct_type(&struct_ty_ptr);
        let (index, _) = self.field_index(&struct_ty_ptr, field).ok_or_else(|| format!("no field `{}`", field))?;
        Ok(self.builder.build_struct_gep(struct_ty, base_ptr, index, &format!("{}.ptr", field)).map_err(|e| format!("{e}"))?)
    }

    fn compile_index(&mut self, object: &Expr, index: &Expr) -> Result<BasicValueEnum<'ctx>, String> {
        let ptr = self.index_ptr(object, index)?;
        let elem_ty = self.index_elem_type(object);
        let llvm_ty = self.ty_to_llvm(&elem_ty);
        Ok(self.builder.build_load(llvm_ty, ptr, "index.load").map_err(|e| format!("{e}"))?)
    }

    fn index_elem_type(&mut self, object: &Expr) -> TypePtr {
        let object_ty = self.expr_type(object);
        match object_ty.as_ref() {
            Ty::Array { element, .. } | Ty::Slice { element } => element.clone(),
            _ => self.env.interner.primitive(nova_ast::PrimKind::Unit),
        }
    }

    fn index_ptr(&mut self, object: &Expr, index: &Expr) -> Result<PointerValue<'ctx>, String> {
        let object_ty = self.expr_type(object);
        let idx_val = self.compile_expr(index, None)?.into_int_value();

        match object_ty.as_ref() {
            Ty::Array { element, .. } => {
                let elem_llvm = self.ty_to_llvm(element);
                let base_ptr = self.compile_expr_as_ptr_any(object)?;
                Ok(unsafe {
                    self.builder
                        .build_gep(elem_llvm, base_ptr, &[self.context.i64_type().const_zero(), idx_val], "index.ptr")
                        .map_err(|e| format!("{e}"))?
                })
            }
            Ty::Slice { element } => {
                let elem_llvm = self.ty_to_llvm(element);
                let slice_val = self.compile_expr(object, None)?;
                let data_ptr = self
                    .builder
                    .build_extract_value(slice_val.into_struct_value(), 0, "slice.data")
                    .map_err(|e| format!("{e}"))?
                    .into_pointer_value();
                Ok(unsafe { self.builder.build_gep(elem_llvm, data_ptr, &[idx_val], "slice.index.ptr").map_err(|e| format!("{e}"))? })
            }
            _ => Err("indexing a non-indexable type".to_string()),
        }
    }

    fn compile_array_literal(&mut self, elems: &[Expr], expected: Option<&TypePtr>) -> Result<BasicValueEnum<'ctx>, String> {
        let elem_ty = match expected.map(|t| t.as_ref()) {
            Some(Ty::Array { element, .. }) | Some(Ty::Slice { element }) => element.clone(),
            _ if !elems.is_empty() => self.expr_type(&elems[0]),
            _ => self.env.interner.primitive(nova_ast::PrimKind::Unit),
        };
        let elem_llvm = self.ty_to_llvm(&elem_ty);
        let array_ty = elem_llvm.array_type(elems.len() as u32);
        let alloca = self.builder.build_alloca(array_ty, &self.fresh_name("arrlit")).map_err(|e| format!("{e}"))?;
        for (i, e) in elems.iter().enumerate() {
            let value = self.compile_expr(e, Some(&elem_ty))?;
            let ptr = unsafe {
                self.builder
                    .build_gep(array_ty, alloca, &[self.context.i64_type().const_zero(), self.context.i64_type().const_int(i as u64, false)], "arrlit.elem")
                    .map_err(|e| format!("{e}"))?
            };
            self.builder.build_store(ptr, value).map_err(|e| format!("{e}"))?;
        }
        Ok(self.builder.build_load(array_ty, alloca, "arrlit.load").map_err(|e| format!("{e}"))?)
    }

    fn compile_tuple_literal(&mut self, elems: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let mut values = Vec::with_capacity(elems.len());
        let mut types = Vec::with_capacity(elems.len());
        for e in elems {
            let v = self.compile_expr(e, None)?;
            types.push(v.get_type());
            values.push(v);
        }
        let tuple_ty = self.context.struct_type(&types, false);
        let mut agg = tuple_ty.get_undef();
        for (i, v) in values.into_iter().enumerate() {
            agg = self.builder.build_insert_value(agg, v, i as u32, "tuple.field").map_err(|e| format!("{e}"))?.into_struct_value();
        }
        Ok(agg.into())
    }

    fn compile_cast(&mut self, inner: &Expr, _expected: Option<&TypePtr>, cast_expr: &Expr) -> Result<BasicValueEnum<'ctx>, String> {
        let to_ty = self.expr_type(cast_expr);
        // `as dyn Behavior` builds the fat pointer (data ptr + vtable ptr) instead of any
        // numeric conversion; `inner` stays uncompiled here so `compile_dyn_coercion` is the
        // only place that evaluates it.
        if let Ty::DynBehavior { behavior, .. } = to_ty.as_ref() {
            let behavior = behavior.clone();
            return self.compile_dyn_coercion(inner, &behavior);
        }

        let from_ty = self.expr_type(inner);
        let v = self.compile_expr(inner, None)?;
        let to_llvm = self.ty_to_llvm(&to_ty);

        match (from_ty.as_ref(), to_ty.as_ref()) {
            (Ty::Primitive(a), Ty::Primitive(b)) if a.is_integer() && b.is_integer() => {
                Ok(self.builder.build_int_cast_sign_flag(v.into_int_value(), to_llvm.into_int_type(), a.is_signed(), "intcast").map_err(|e| format!("{e}"))?.into())
            }
            (Ty::Primitive(a), Ty::Primitive(_)) if a.is_integer() => {
                if a.is_signed() {
                    Ok(self.builder.build_signed_int_to_float(v.into_int_value(), to_llvm.into_float_type(), "sitofp").map_err(|e| format!("{e}"))?.into())
                } else {
                    Ok(self.builder.build_unsigned_int_to_float(v.into_int_value(), to_llvm.into_float_type(), "uitofp").map_err(|e| format!("{e}"))?.into())
                }
            }
            (Ty::Primitive(_), Ty::Primitive(b)) if b.is_integer() => {
                if b.is_signed() {
                    Ok(self.builder.build_float_to_signed_int(v.into_float_value(), to_llvm.into_int_type(), "fptosi").map_err(|e| format!("{e}"))?.into())
                } else {
                    Ok(self.builder.build_float_to_unsigned_int(v.into_float_value(), to_llvm.into_int_type(), "fptoui").map_err(|e| format!("{e}"))?.into())
                }
            }
            (Ty::Primitive(_), Ty::Primitive(_)) => {
                Ok(self.builder.build_float_cast(v.into_float_value(), to_llvm.into_float_type(), "fpcast").map_err(|e| format!("{e}"))?.into())
            }
            _ => Ok(v),
        }
    }

    fn compile_is_check(&mut self, inner: &Expr, target: &nova_ast::Type) -> Result<BasicValueEnum<'ctx>, String> {
        let target_ty = self.env.resolve(target).map_err(|e| e.to_string())?;
        let inner_ty = self.expr_type(inner);
        // Static types are known at compile time for every concrete case the checker allows
        // through; dynamic-dispatch `dyn` targets defer to the vtable's type tag.
        if let (Ty::DynBehavior { .. }, _) = (inner_ty.as_ref(), target_ty.as_ref()) {
            return self.compile_dyn_is_check(inner, &target_ty);
        }
        let matches = self.mangled_name_of(&inner_ty) == self.mangled_name_of(&target_ty);
        Ok(self.context.bool_type().const_int(matches as u64, false).into())
    }

    fn compile_if(
        &mut self,
        cond: &Expr,
        then_block: &nova_ast::Block,
        elif_branches: &[(Expr, nova_ast::Block)],
        else_block: &Option<nova_ast::Block>,
        expected: Option<&TypePtr>,
    ) -> Result<BasicValueEnum<'ctx>, String> {
        let function = self.current_function.ok_or("if outside a function")?;
        let cond_val = self.compile_expr(cond, None)?.into_int_value();

        let then_bb = self.context.append_basic_block(function, "if.then");
        let merge_bb = self.context.append_basic_block(function, "if.merge");

        let mut branch_targets = vec![then_bb];
        for _ in elif_branches {
            branch_targets.push(self.context.append_basic_block(function, "if.elif"));
        }
        let else_bb = if else_block.is_some() || !elif_branches.is_empty() {
            Some(self.context.append_basic_block(function, "if.else"))
        } else {
            None
        };

        self.builder
            .build_conditional_branch(cond_val, then_bb, else_bb.unwrap_or(merge_bb))
            .map_err(|e| format!("{e}"))?;

        let mut incoming = Vec::new();
        self.builder.position_at_end(then_bb);
        self.push_scope();
        let then_val = self.compile_block(then_block, expected)?;
        self.pop_scope_and_emit_drops()?;
        let then_end = self.builder.get_insert_block().unwrap();
        self.builder.build_unconditional_branch(merge_bb).map_err(|e| format!("{e}"))?;
        incoming.push((then_val, then_end));

        let mut remaining = else_bb;
        for (i, (econd, eblock)) in elif_branches.iter().enumerate() {
            let this_bb = remaining.unwrap();
            self.builder.position_at_end(this_bb);
            let next = branch_targets.get(i + 1).copied();
            let econd_val = self.compile_expr(econd, None)?.into_int_value();
            let body_bb = self.context.append_basic_block(function, "if.elif.body");
            let fallthrough = if i + 1 < elif_branches.len() || else_block.is_some() {
                self.context.append_basic_block(function, "if.elif.next")
            } else {
                merge_bb
            };
            let _ = next;
            self.builder.build_conditional_branch(econd_val, body_bb, fallthrough).map_err(|e| format!("{e}"))?;
            self.builder.position_at_end(body_bb);
            self.push_scope();
            let v = self.compile_block(eblock, expected)?;
            self.pop_scope_and_emit_drops()?;
            let end = self.builder.get_insert_block().unwrap();
            self.builder.build_unconditional_branch(merge_bb).map_err(|e| format!("{e}"))?;
            incoming.push((v, end));
            remaining = Some(fallthrough);
        }

        if let Some(eblock) = else_block {
            let this_bb = remaining.unwrap();
            self.builder.position_at_end(this_bb);
            self.push_scope();
            let v = self.compile_block(eblock, expected)?;
            self.pop_scope_and_emit_drops()?;
            let end = self.builder.get_insert_block().unwrap();
            self.builder.build_unconditional_branch(merge_bb).map_err(|e| format!("{e}"))?;
            incoming.push((v, end));
        }

        self.builder.position_at_end(merge_bb);
        match expected {
            Some(ty) if !ty.is_unit() && !ty.is_never() => {
                let llvm_ty = self.ty_to_llvm(ty);
                let phi = self.builder.build_phi(llvm_ty, "if.result").map_err(|e| format!("{e}"))?;
                let refs: Vec<(&dyn BasicValue, inkwell::basic_block::BasicBlock)> = incoming.iter().map(|(v, b)| (v as &dyn BasicValue, *b)).collect();
                phi.add_incoming(&refs);
                Ok(phi.as_basic_value())
            }
            _ => Ok(self.unit_value()),
        }
    }

    fn compile_if_let(
        &mut self,
        pattern: &nova_ast::Pattern,
        value: &Expr,
        then_block: &nova_ast::Block,
        else_block: &Option<nova_ast::Block>,
        expected: Option<&TypePtr>,
    ) -> Result<BasicValueEnum<'ctx>, String> {
        // Desugars to a two-arm `when`: the bound pattern, and a wildcard else arm.
        let scrutinee_ty = self.expr_type(value);
        let then_arm = nova_ast::MatchArm { pattern: pattern.clone(), guard: None, body: Expr::Block(then_block.clone(), nova_ast::Span::unknown()) };
        let else_body = else_block
            .clone()
            .map(|b| Expr::Block(b, nova_ast::Span::unknown()))
            .unwrap_or(Expr::TupleLiteral(vec![], nova_ast::Span::unknown()));
        let else_arm = nova_ast::MatchArm { pattern: nova_ast::Pattern::Wildcard, guard: None, body: else_body };
        self.compile_when(value, &scrutinee_ty, &[then_arm, else_arm], expected)
    }

    fn compile_loop(&mut self, body: &nova_ast::Block) -> Result<BasicValueEnum<'ctx>, String> {
        let function = self.current_function.ok_or("loop outside a function")?;
        let loop_bb = self.context.append_basic_block(function, "loop.body");
        let after_bb = self.context.append_basic_block(function, "loop.after");
        self.builder.build_unconditional_branch(loop_bb).map_err(|e| format!("{e}"))?;
        self.builder.position_at_end(loop_bb);
        self.loop_stack.push((loop_bb, after_bb, self.scope_stack.len()));
        self.push_scope();
        let _ = self.compile_block(body, None)?;
        self.pop_scope_and_emit_drops()?;
        self.loop_stack.pop();
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(loop_bb).map_err(|e| format!("{e}"))?;
        }
        self.builder.position_at_end(after_bb);
        Ok(self.unit_value())
    }

    fn compile_while(&mut self, cond: &Expr, body: &nova_ast::Block) -> Result<BasicValueEnum<'ctx>, String> {
        let function = self.current_function.ok_or("while outside a function")?;
        let cond_bb = self.context.append_basic_block(function, "while.cond");
        let body_bb = self.context.append_basic_block(function, "while.body");
        let after_bb = self.context.append_basic_block(function, "while.after");

        self.builder.build_unconditional_branch(cond_bb).map_err(|e| format!("{e}"))?;
        self.builder.position_at_end(cond_bb);
        let cond_val = self.compile_expr(cond, None)?.into_int_value();
        self.builder.build_conditional_branch(cond_val, body_bb, after_bb).map_err(|e| format!("{e}"))?;

        self.builder.position_at_end(body_bb);
        self.loop_stack.push((cond_bb, after_bb, self.scope_stack.len()));
        self.push_scope();
        let _ = self.compile_block(body, None)?;
        self.pop_scope_and_emit_drops()?;
        self.loop_stack.pop();
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(cond_bb).map_err(|e| format!("{e}"))?;
        }

        self.builder.position_at_end(after_bb);
        Ok(self.unit_value())
    }

    fn compile_for(&mut self, var: &str, iterable: &Expr, body: &nova_ast::Block) -> Result<BasicValueEnum<'ctx>, String> {
        let function = self.current_function.ok_or("for outside a function")?;
        let iterable_ty = self.expr_type(iterable);
        let (elem_ty, len) = match iterable_ty.as_ref() {
            Ty::Array { element, len } => (element.clone(), *len),
            Ty::Slice { element } => (element.clone(), 0),
            _ => return Err("for-loop source is not iterable".to_string()),
        };
        let base_ptr = self.compile_expr_as_ptr_any(iterable)?;
        let elem_llvm = self.ty_to_llvm(&elem_ty);

        let index_slot = self.builder.build_alloca(self.context.i64_type(), "for.idx").map_err(|e| format!("{e}"))?;
        self.builder.build_store(index_slot, self.context.i64_type().const_zero()).map_err(|e| format!("{e}"))?;

        let len_val = if len > 0 {
            self.context.i64_type().const_int(len, false)
        } else {
            let strlen = self.require_runtime_decl("strlen");
            self.builder.build_call(strlen, &[base_ptr.into()], "for.len").map_err(|e| format!("{e}"))?.try_as_basic_value().left().unwrap().into_int_value()
        };

        let cond_bb = self.context.append_basic_block(function, "for.cond");
        let body_bb = self.context.append_basic_block(function, "for.body");
        let after_bb = self.context.append_basic_block(function, "for.after");

        self.builder.build_unconditional_branch(cond_bb).map_err(|e| format!("{e}"))?;
        self.builder.position_at_end(cond_bb);
        let idx = self.builder.build_load(self.context.i64_type(), index_slot, "for.idx.load").map_err(|e| format!("{e}"))?.into_int_value();
        let cmp = self.builder.build_int_compare(IntPredicate::ULT, idx, len_val, "for.cmp").map_err(|e| format!("{e}"))?;
        self.builder.build_conditional_branch(cmp, body_bb, after_bb).map_err(|e| format!("{e}"))?;

        self.builder.position_at_end(body_bb);
        let elem_ptr = unsafe { self.builder.build_gep(elem_llvm, base_ptr, &[idx], "for.elem.ptr").map_err(|e| format!("{e}"))? };
        let loop_depth = self.scope_stack.len();
        self.push_scope();
        self.variables.insert(var.to_string(), (elem_ptr, elem_ty.clone()));
        self.loop_stack.push((cond_bb, after_bb, loop_depth));
        let _ = self.compile_block(body, None)?;
        self.loop_stack.pop();
        self.pop_scope_and_emit_drops()?;
        let next_idx = self.builder.build_int_add(idx, self.context.i64_type().const_int(1, false), "for.next").map_err(|e| format!("{e}"))?;
        self.builder.build_store(index_slot, next_idx).map_err(|e| format!("{e}"))?;
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(cond_bb).map_err(|e| format!("{e}"))?;
        }

        self.builder.position_at_end(after_bb);
        Ok(self.unit_value())
    }

    fn compile_block_expr(&mut self, block: &nova_ast::Block, expected: Option<&TypePtr>) -> Result<BasicValueEnum<'ctx>, String> {
        self.push_scope();
        let result = self.compile_block(block, expected)?;
        self.pop_scope_and_emit_drops()?;
        Ok(result)
    }

    /// Statement-by-statement lowering lives in `statements.rs`; this just threads the
    /// trailing expression through as the block's value.
    pub(crate) fn compile_block(&mut self, block: &nova_ast::Block, expected: Option<&TypePtr>) -> Result<BasicValueEnum<'ctx>, String> {
        for stmt in &block.statements {
            self.compile_stmt(stmt)?;
            if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_some() {
                return Ok(self.unit_value());
            }
        }
        match &block.trailing_expr {
            Some(e) => self.compile_expr(e, expected),
            None => Ok(self.unit_value()),
        }
    }

    /// Closures capture by reference into a small environment struct; full capture codegen
    /// (stack vs. heap-allocated environment depending on escape) is deferred to whichever
    /// call site actually invokes the closure, since only it knows the call convention.
    fn compile_closure(&mut self, params: &[nova_ast::Param], body: &Expr) -> Result<BasicValueEnum<'ctx>, String> {
        let fn_name = self.fresh_name("closure");
        let param_tys: Vec<TypePtr> = params.iter().map(|p| self.env.resolve(&p.ty).unwrap_or_else(|_| self.env.interner.primitive(nova_ast::PrimKind::Unit))).collect();
        let param_llvm: Vec<_> = param_tys.iter().map(|t| self.ty_to_metadata(t)).collect();
        let body_ty = self.expr_type(body);
        let fn_type = self.fn_type_for(&param_llvm, &body_ty, false);
        let function = self.module.add_function(&fn_name, fn_type, None);

        let saved_block = self.builder.get_insert_block();
        let saved_fn = self.current_function;
        let saved_vars = self.variables.clone();

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.current_function = Some(function);
        for (i, p) in params.iter().enumerate() {
            let param_val = function.get_nth_param(i as u32).ok_or("missing closure param")?;
            let slot = self.builder.build_alloca(param_val.get_type(), &p.name).map_err(|e| format!("{e}"))?;
            self.builder.build_store(slot, param_val).map_err(|e| format!("{e}"))?;
            self.variables.insert(p.name.clone(), (slot, param_tys[i].clone()));
        }
        let result = self.compile_expr(body, Some(&body_ty))?;
        if body_ty.is_unit() || body_ty.is_never() {
            self.builder.build_return(None).map_err(|e| format!("{e}"))?;
        } else {
            self.builder.build_return(Some(&result)).map_err(|e| format!("{e}"))?;
        }

        self.variables = saved_vars;
        self.current_function = saved_fn;
        if let Some(block) = saved_block {
            self.builder.position_at_end(block);
        }

        let fn_ptr = function.as_global_value().as_pointer_value();
        let env_ptr = self.ptr_type().const_null();
        let closure_ty = self.context.struct_type(&[self.ptr_type().into(), self.ptr_type().into()], false);
        let mut agg = closure_ty.get_undef();
        agg = self.builder.build_insert_value(agg, fn_ptr, 0, "closure.fn").map_err(|e| format!("{e}"))?.into_struct_value();
        agg = self.builder.build_insert_value(agg, env_ptr, 1, "closure.env").map_err(|e| format!("{e}"))?.into_struct_value();
        Ok(agg.into())
    }

    pub(crate) fn compile_string_literal(&mut self, s: &str) -> PointerValue<'ctx> {
        if let Some(existing) = self.string_literals.get(s) {
            return *existing;
        }
        let global = self.builder.build_global_string_ptr(s, &self.fresh_name("str")).expect("global string literal");
        let ptr = global.as_pointer_value();
        self.string_literals.insert(s.to_string(), ptr);
        ptr
    }
}
