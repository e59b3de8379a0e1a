//! The closed intrinsic set (§6): compiler builtins that aren't ordinary function calls —
//! no user code can define a function named `unreachable`, `checked_add`, etc., so these are
//! recognized by name before falling through to the ordinary call path.
use inkwell::values::BasicValueEnum;
use inkwell::{FloatPredicate, IntPredicate};

use nova_ast::Expr;

use super::IrGen;
use crate::type_system::{Ty, TypePtr};

const NAMES: &[&str] = &[
    "unreachable", "assume", "likely", "unlikely", "fence", "compiler_fence", "drop",
    "checked_add", "checked_sub", "checked_mul", "checked_div",
    "saturating_add", "saturating_sub", "saturating_mul",
    "ctlz", "cttz", "ctpop", "bswap", "bitreverse",
    "sqrt", "sin", "cos", "log", "exp", "pow", "floor", "ceil", "round", "trunc", "fma",
    "minnum", "maxnum", "fabs", "copysign",
    "field_count", "variant_count", "field_name", "field_type_id", "field_offset", "type_name",
];

impl<'ctx> IrGen<'ctx> {
    /// Returns `Some(value)` if `name` is a recognized intrinsic, `None` so the caller falls
    /// through to ordinary function/enum-constructor resolution.
    pub(crate) fn try_compile_intrinsic(&mut self, name: &str, args: &[Expr]) -> Result<Option<BasicValueEnum<'ctx>>, String> {
        if !NAMES.contains(&name) {
            return Ok(None);
        }
        Ok(Some(match name {
            "unreachable" => {
                self.builder.build_unreachable().map_err(|e| format!("{e}"))?;
                self.unit_value_pub()
            }
            "assume" => {
                let cond = self.compile_expr(&args[0], None)?.into_int_value();
                let assume_fn = self.require_llvm_intrinsic("llvm.assume", &[self.context.bool_type().into()], false);
                self.builder.build_call(assume_fn, &[cond.into()], "").map_err(|e| format!("{e}"))?;
                self.unit_value_pub()
            }
            "likely" | "unlikely" => {
                // No branch-weight metadata plumbing yet; evaluates to the condition
                // unchanged. The hint is advisory, not load-bearing for correctness.
                self.compile_expr(&args[0], None)?
            }
            "fence" | "compiler_fence" => {
                self.builder.build_fence(inkwell::AtomicOrdering::SequentiallyConsistent, "").map_err(|e| format!("{e}"))?;
                self.unit_value_pub()
            }
            "drop" => {
                let ty = self.expr_type(&args[0]);
                let ptr = self.compile_expr_as_ptr(&args[0], &ty)?;
                self.emit_drop_for_value(ptr, &ty)?;
                if let Expr::Ident(n, _) = &args[0] {
                    self.untrack_for_drop(n);
                }
                self.unit_value_pub()
            }
            "checked_add" | "checked_sub" | "checked_mul" => self.compile_checked_arith(name, args)?,
            "checked_div" => self.compile_checked_div(args)?,
            "saturating_add" | "saturating_sub" => self.compile_saturating_arith(name, args)?,
            "saturating_mul" => self.compile_saturating_mul(args)?,
            "ctlz" | "cttz" => self.compile_bit_intrinsic(name, args)?,
            "ctpop" => self.compile_bit_intrinsic("ctpop", args)?,
            "bswap" => self.compile_bit_intrinsic("bswap", args)?,
            "bitreverse" => self.compile_bit_intrinsic("bitreverse", args)?,
            "sqrt" | "sin" | "cos" | "log" | "exp" | "floor" | "ceil" | "round" | "trunc" | "fabs" => {
                self.compile_math_unary(name, args)?
            }
            "pow" | "minnum" | "maxnum" | "copysign" => self.compile_math_binary(name, args)?,
            "fma" => self.compile_fma(args)?,
            "field_count" | "variant_count" | "field_name" | "field_type_id" | "field_offset" | "type_name" => {
                self.compile_reflection_intrinsic(name, args)?
            }
            _ => unreachable!("name checked against NAMES above"),
        }))
    }

    fn unit_value_pub(&self) -> BasicValueEnum<'ctx> {
        self.context.struct_type(&[], false).get_undef().into()
    }

    fn require_llvm_intrinsic(&mut self, name: &str, params: &[inkwell::types::BasicMetadataTypeEnum<'ctx>], is_variadic: bool) -> inkwell::values::FunctionValue<'ctx> {
        if let Some(existing) = self.module.get_function(name) {
            return existing;
        }
        let fn_type = self.context.void_type().fn_type(params, is_variadic);
        self.module.add_function(name, fn_type, None)
    }

    /// `Maybe[T]` result: the canonical tagged union `{ i32 tag, [N x i8] payload }`
    /// (`codegen::enums`'s layout for every enum, `Maybe` included, per the builtin-container
    /// registration in `TypeEnv::register_builtin_containers`) — `Just(value)` at tag 0,
    /// `Nothing` at tag 1.
    fn maybe_wrap(&mut self, inner_ty: &TypePtr, value: BasicValueEnum<'ctx>, has_value: inkwell::values::IntValue<'ctx>) -> Result<BasicValueEnum<'ctx>, String> {
        let maybe_ty = self.env.interner.intern(Ty::Named { module_path: vec![], name: "Maybe".to_string(), args: vec![inner_ty.clone()] });
        let enum_struct = self.ensure_enum_type(&maybe_ty);

        let just_tag = self.context.i32_type().const_int(0, false);
        let nothing_tag = self.context.i32_type().const_int(1, false);
        let tag = self.builder.build_select(has_value, just_tag, nothing_tag, "maybe.tag").map_err(|e| format!("{e}"))?;

        let alloca = self.builder.build_alloca(enum_struct, &self.fresh_name("maybe")).map_err(|e| format!("failed to allocate Maybe: {e}"))?;
        let tag_ptr = self.builder.build_struct_gep(enum_struct, alloca, 0, "maybe.tag.ptr").map_err(|e| format!("{e}"))?;
        self.builder.build_store(tag_ptr, tag).map_err(|e| format!("{e}"))?;

        let payload_ptr = self.builder.build_struct_gep(enum_struct, alloca, 1, "maybe.payload.ptr").map_err(|e| format!("{e}"))?;
        let payload_ptr = self.builder.build_pointer_cast(payload_ptr, self.ptr_type(), "maybe.payload.cast").map_err(|e| format!("{e}"))?;
        self.builder.build_store(payload_ptr, value).map_err(|e| format!("{e}"))?;

        self.builder.build_load(enum_struct, alloca, "maybe.load").map_err(|e| format!("{e}"))
    }

    fn compile_checked_arith(&mut self, name: &str, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let ty = self.expr_type(&args[0]);
        let (bits, signed) = int_shape(&ty);
        let lv = self.compile_expr(&args[0], None)?.into_int_value();
        let rv = self.compile_expr(&args[1], None)?.into_int_value();

        let op = match name {
            "checked_add" if signed => "sadd",
            "checked_add" => "uadd",
            "checked_sub" if signed => "ssub",
            "checked_sub" => "usub",
            "checked_mul" if signed => "smul",
            "checked_mul" => "umul",
            _ => unreachable!(),
        };
        let intrinsic = format!("llvm.{}.with.overflow.i{}", op, bits);
        let int_ty = self.int_llvm_type_for_bits(bits);
        let struct_ty = self.context.struct_type(&[int_ty.into(), self.context.bool_type().into()], false);
        let fn_type = struct_ty.fn_type(&[int_ty.into(), int_ty.into()], false);
        let func = self.module.get_function(&intrinsic).unwrap_or_else(|| self.module.add_function(&intrinsic, fn_type, None));
        let call = self.builder.build_call(func, &[lv.into(), rv.into()], "checked").map_err(|e| format!("{e}"))?;
        let result = call.try_as_basic_value().left().ok_or("overflow intrinsic returned nothing")?.into_struct_value();
        let value = self.builder.build_extract_value(result, 0, "checked.value").map_err(|e| format!("{e}"))?;
        let overflowed = self.builder.build_extract_value(result, 1, "checked.overflow").map_err(|e| format!("{e}"))?.into_int_value();
        let ok = self.builder.build_not(overflowed, "checked.ok").map_err(|e| format!("{e}"))?;
        self.maybe_wrap(&ty, value, ok)
    }

    fn compile_checked_div(&mut self, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let ty = self.expr_type(&args[0]);
        let signed = matches!(ty.as_ref(), Ty::Primitive(k) if k.is_signed());
        let lv = self.compile_expr(&args[0], None)?.into_int_value();
        let rv = self.compile_expr(&args[1], None)?.into_int_value();
        let zero = rv.get_type().const_zero();
        let is_zero = self.builder.build_int_compare(IntPredicate::EQ, rv, zero, "div.iszero").map_err(|e| format!("{e}"))?;

        let function = self.current_function.ok_or("checked_div outside a function")?;
        let div_bb = self.context.append_basic_block(function, "div.ok");
        let zero_bb = self.context.append_basic_block(function, "div.zero");
        let merge_bb = self.context.append_basic_block(function, "div.merge");
        self.builder.build_conditional_branch(is_zero, zero_bb, div_bb).map_err(|e| format!("{e}"))?;

        self.builder.position_at_end(div_bb);
        let quotient = if signed {
            self.builder.build_int_signed_div(lv, rv, "sdiv").map_err(|e| format!("{e}"))?
        } else {
            self.builder.build_int_unsigned_div(lv, rv, "udiv").map_err(|e| format!("{e}"))?
        };
        let div_end = self.builder.get_insert_block().unwrap();
        self.builder.build_unconditional_branch(merge_bb).map_err(|e| format!("{e}"))?;

        self.builder.position_at_end(zero_bb);
        let zero_val = lv.get_type().const_zero();
        self.builder.build_unconditional_branch(merge_bb).map_err(|e| format!("{e}"))?;

        self.builder.position_at_end(merge_bb);
        let phi = self.builder.build_phi(lv.get_type(), "div.result").map_err(|e| format!("{e}"))?;
        phi.add_incoming(&[(&quotient, div_end), (&zero_val, zero_bb)]);
        let ok = self.builder.build_not(is_zero, "div.ok").map_err(|e| format!("{e}"))?;
        self.maybe_wrap(&ty, phi.as_basic_value(), ok)
    }

    fn compile_saturating_arith(&mut self, name: &str, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let ty = self.expr_type(&args[0]);
        let (bits, signed) = int_shape(&ty);
        let lv = self.compile_expr(&args[0], None)?.into_int_value();
        let rv = self.compile_expr(&args[1], None)?.into_int_value();
        let op = match (name, signed) {
            ("saturating_add", true) => "sadd.sat",
            ("saturating_add", false) => "uadd.sat",
            ("saturating_sub", true) => "ssub.sat",
            ("saturating_sub", false) => "usub.sat",
            _ => unreachable!(),
        };
        let intrinsic = format!("llvm.{}.i{}", op, bits);
        let int_ty = self.int_llvm_type_for_bits(bits);
        let fn_type = int_ty.fn_type(&[int_ty.into(), int_ty.into()], false);
        let func = self.module.get_function(&intrinsic).unwrap_or_else(|| self.module.add_function(&intrinsic, fn_type, None));
        let call = self.builder.build_call(func, &[lv.into(), rv.into()], "sat").map_err(|e| format!("{e}"))?;
        Ok(call.try_as_basic_value().left().ok_or("saturating intrinsic returned nothing")?)
    }

    /// No direct `sat.mul` LLVM intrinsic: computed via the overflowing-multiply intrinsic,
    /// selecting the type's max/min value on overflow.
    fn compile_saturating_mul(&mut self, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let ty = self.expr_type(&args[0]);
        let (bits, signed) = int_shape(&ty);
        let lv = self.compile_expr(&args[0], None)?.into_int_value();
        let rv = self.compile_expr(&args[1], None)?.into_int_value();
        let op = if signed { "smul" } else { "umul" };
        let intrinsic = format!("llvm.{}.with.overflow.i{}", op, bits);
        let int_ty = self.int_llvm_type_for_bits(bits);
        let struct_ty = self.context.struct_type(&[int_ty.into(), self.context.bool_type().into()], false);
        let fn_type = struct_ty.fn_type(&[int_ty.into(), int_ty.into()], false);
        let func = self.module.get_function(&intrinsic).unwrap_or_else(|| self.module.add_function(&intrinsic, fn_type, None));
        let call = self.builder.build_call(func, &[lv.into(), rv.into()], "satmul").map_err(|e| format!("{e}"))?;
        let result = call.try_as_basic_value().left().ok_or("overflow intrinsic returned nothing")?.into_struct_value();
        let value = self.builder.build_extract_value(result, 0, "satmul.value").map_err(|e| format!("{e}"))?.into_int_value();
        let overflowed = self.builder.build_extract_value(result, 1, "satmul.overflow").map_err(|e| format!("{e}"))?.into_int_value();
        let max_val = if signed { int_ty.const_all_ones() } else { int_ty.const_all_ones() };
        let selected = self.builder.build_select(overflowed, max_val, value, "satmul.select").map_err(|e| format!("{e}"))?;
        Ok(selected)
    }

    fn compile_bit_intrinsic(&mut self, name: &str, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let ty = self.expr_type(&args[0]);
        let (bits, _) = int_shape(&ty);
        let v = self.compile_expr(&args[0], None)?.into_int_value();
        let int_ty = self.int_llvm_type_for_bits(bits);
        match name {
            "ctlz" | "cttz" => {
                let intrinsic = format!("llvm.{}.i{}", name, bits);
                let fn_type = int_ty.fn_type(&[int_ty.into(), self.context.bool_type().into()], false);
                let func = self.module.get_function(&intrinsic).unwrap_or_else(|| self.module.add_function(&intrinsic, fn_type, None));
                let call = self.builder.build_call(func, &[v.into(), self.context.bool_type().const_zero().into()], "bitop").map_err(|e| format!("{e}"))?;
                Ok(call.try_as_basic_value().left().ok_or("bit intrinsic returned nothing")?)
            }
            "ctpop" | "bswap" | "bitreverse" => {
                let intrinsic = format!("llvm.{}.i{}", name, bits);
                let fn_type = int_ty.fn_type(&[int_ty.into()], false);
                let func = self.module.get_function(&intrinsic).unwrap_or_else(|| self.module.add_function(&intrinsic, fn_type, None));
                let call = self.builder.build_call(func, &[v.into()], "bitop").map_err(|e| format!("{e}"))?;
                Ok(call.try_as_basic_value().left().ok_or("bit intrinsic returned nothing")?)
            }
            _ => unreachable!(),
        }
    }

    fn compile_math_unary(&mut self, name: &str, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let v = self.compile_expr(&args[0], None)?.into_float_value();
        let is_f32 = v.get_type() == self.context.f32_type();
        let suffix = if is_f32 { "f32" } else { "f64" };
        let intrinsic = format!("llvm.{}.{}", name, suffix);
        let fn_type = v.get_type().fn_type(&[v.get_type().into()], false);
        let func = self.module.get_function(&intrinsic).unwrap_or_else(|| self.module.add_function(&intrinsic, fn_type, None));
        let call = self.builder.build_call(func, &[v.into()], "mathop").map_err(|e| format!("{e}"))?;
        Ok(call.try_as_basic_value().left().ok_or("math intrinsic returned nothing")?)
    }

    fn compile_math_binary(&mut self, name: &str, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let lv = self.compile_expr(&args[0], None)?.into_float_value();
        let rv = self.compile_expr(&args[1], None)?.into_float_value();
        let is_f32 = lv.get_type() == self.context.f32_type();
        let suffix = if is_f32 { "f32" } else { "f64" };
        let llvm_name = match name {
            "pow" => "pow",
            "minnum" => "minnum",
            "maxnum" => "maxnum",
            "copysign" => "copysign",
            _ => unreachable!(),
        };
        let intrinsic = format!("llvm.{}.{}", llvm_name, suffix);
        let fn_type = lv.get_type().fn_type(&[lv.get_type().into(), rv.get_type().into()], false);
        let func = self.module.get_function(&intrinsic).unwrap_or_else(|| self.module.add_function(&intrinsic, fn_type, None));
        let call = self.builder.build_call(func, &[lv.into(), rv.into()], "mathop").map_err(|e| format!("{e}"))?;
        Ok(call.try_as_basic_value().left().ok_or("math intrinsic returned nothing")?)
    }

    fn compile_fma(&mut self, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let a = self.compile_expr(&args[0], None)?.into_float_value();
        let b = self.compile_expr(&args[1], None)?.into_float_value();
        let c = self.compile_expr(&args[2], None)?.into_float_value();
        let is_f32 = a.get_type() == self.context.f32_type();
        let suffix = if is_f32 { "f32" } else { "f64" };
        let intrinsic = format!("llvm.fma.{}", suffix);
        let fn_type = a.get_type().fn_type(&[a.get_type().into(), a.get_type().into(), a.get_type().into()], false);
        let func = self.module.get_function(&intrinsic).unwrap_or_else(|| self.module.add_function(&intrinsic, fn_type, None));
        let call = self.builder.build_call(func, &[a.into(), b.into(), c.into()], "fma").map_err(|e| format!("{e}"))?;
        Ok(call.try_as_basic_value().left().ok_or("fma intrinsic returned nothing")?)
    }

    /// Reflection intrinsics (§6) resolve against the struct/enum registry at compile time —
    /// every one of these is a compile-time constant, since Nova has no runtime type objects.
    fn compile_reflection_intrinsic(&mut self, name: &str, args: &[Expr]) -> Result<BasicValueEnum<'ctx>, String> {
        let target_ty = self.expr_type(&args[0]);
        let mangled = self.mangled_name_of(&target_ty);
        match name {
            "field_count" => {
                let n = self.struct_fields.get(&mangled).map(|f| f.len()).unwrap_or(0);
                Ok(self.context.i64_type().const_int(n as u64, false).into())
            }
            "variant_count" => {
                let n = self.enum_variants.get(&mangled).map(|v| v.len()).unwrap_or(0);
                Ok(self.context.i64_type().const_int(n as u64, false).into())
            }
            "type_name" => Ok(self.compile_string_literal(&mangled).into()),
            "field_name" => {
                let idx = self.const_index_arg(&args[1])?;
                let name = self.struct_fields.get(&mangled).and_then(|f| f.get(idx)).map(|(n, _)| n.clone()).unwrap_or_default();
                Ok(self.compile_string_literal(&name).into())
            }
            "field_type_id" => {
                let idx = self.const_index_arg(&args[1])?;
                let ty = self.struct_fields.get(&mangled).and_then(|f| f.get(idx)).map(|(_, t)| t.clone());
                let id = ty.map(|t| self.mangled_name_of(&t)).unwrap_or_default();
                Ok(self.compile_string_literal(&id).into())
            }
            "field_offset" => {
                let idx = self.const_index_arg(&args[1])? as u32;
                let struct_ty = self.ensure_struct_type(&target_ty);
                let offset = self.target_data_offset(struct_ty, idx);
                Ok(self.context.i64_type().const_int(offset, false).into())
            }
            _ => unreachable!(),
        }
    }

    fn const_index_arg(&mut self, expr: &Expr) -> Result<usize, String> {
        match expr {
            Expr::IntLiteral { value, .. } => Ok(*value as usize),
            _ => Err("reflection intrinsics require a compile-time-constant index".to_string()),
        }
    }

    /// Best-effort field byte offset: sums the estimated size of every preceding field.
    /// Matches the core's documented promise of a stable declared-order layout, not a
    /// target-specific ABI-packed one (no padding/alignment modeling).
    fn target_data_offset(&mut self, struct_ty: inkwell::types::StructType<'ctx>, field_index: u32) -> u64 {
        use inkwell::types::BasicType;
        let mut offset_bits = 0u64;
        for (i, field) in struct_ty.get_field_types().into_iter().enumerate() {
            if i as u32 >= field_index {
                break;
            }
            offset_bits += crate::utils::llvm_safety::estimate_type_size_bits(field).unwrap_or(0) as u64;
        }
        let _ = struct_ty.size_of();
        offset_bits / 8
    }

    fn int_llvm_type_for_bits(&self, bits: u32) -> inkwell::types::IntType<'ctx> {
        match bits {
            8 => self.context.i8_type(),
            16 => self.context.i16_type(),
            32 => self.context.i32_type(),
            128 => self.context.i128_type(),
            _ => self.context.i64_type(),
        }
    }
}

fn int_shape(ty: &crate::type_system::TypePtr) -> (u32, bool) {
    match ty.as_ref() {
        Ty::Primitive(k) => {
            let bits = match k {
                nova_ast::PrimKind::I8 | nova_ast::PrimKind::U8 => 8,
                nova_ast::PrimKind::I16 | nova_ast::PrimKind::U16 => 16,
                nova_ast::PrimKind::I32 | nova_ast::PrimKind::U32 => 32,
                nova_ast::PrimKind::I128 | nova_ast::PrimKind::U128 => 128,
                _ => 64,
            };
            (bits, k.is_signed())
        }
        _ => (64, true),
    }
}
