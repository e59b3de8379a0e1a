//! Expression type inference: §4.2's "Expression checking" dispatch. A pure function of
//! `TypeEnv` + AST node, deliberately, so codegen can re-run it during lowering instead of
//! consuming a separately-allocated typed tree (see `checker` module doc comment).
use nova_ast::{BinaryOp, Expr, PrimKind, UnaryOp};
use nova_diagnostics::{error_codes, fuzzy, DiagnosticEngine};

use super::decls::span_from;
use super::patterns::bind_pattern;
use super::CheckContext;
use crate::mono::{MangleKey, MonoKind};
use crate::type_env::{TypeEnv, DEREF_BLESSED_WRAPPERS};
use crate::type_system::{Ty, TypePtr};

fn unit(env: &TypeEnv) -> TypePtr {
    env.interner.primitive(PrimKind::Unit)
}
fn bool_ty(env: &TypeEnv) -> TypePtr {
    env.interner.primitive(PrimKind::Bool)
}
fn never(env: &TypeEnv) -> TypePtr {
    env.interner.primitive(PrimKind::Never)
}

/// Strips one layer of Ref/Ptr/deref-blessed smart pointer wrapper, the way `*expr` does.
fn deref_once(ty: &TypePtr) -> Option<TypePtr> {
    match ty.as_ref() {
        Ty::Ref { inner, .. } | Ty::Ptr { inner, .. } => Some(inner.clone()),
        Ty::Named { name, args, .. } if DEREF_BLESSED_WRAPPERS.contains(&name.as_str()) && !args.is_empty() => {
            Some(args[0].clone())
        }
        _ => None,
    }
}

pub fn infer_expr(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    expr: &Expr,
    expected: Option<TypePtr>,
) -> TypePtr {
    match expr {
        Expr::IntLiteral { value, suffix, span } => {
            let kind = suffix.or_else(|| expected_prim_kind(&expected)).unwrap_or(PrimKind::I64);
            if let Some((lo, hi)) = kind.int_range() {
                if *value < lo || *value > hi {
                    diagnostics.emit_error(
                        error_codes::INTEGER_LITERAL_OUT_OF_RANGE,
                        format!("literal `{}` out of range for `{:?}`", value, kind),
                        span_from(*span),
                    );
                }
                if *value < 0 && !kind.is_signed() {
                    diagnostics.emit_error(
                        error_codes::NEGATIVE_TO_UNSIGNED,
                        format!("cannot assign negative literal to unsigned type `{:?}`", kind),
                        span_from(*span),
                    );
                }
            }
            env.interner.primitive(kind)
        }
        Expr::FloatLiteral { suffix, .. } => {
            let kind = suffix.or_else(|| expected_prim_kind(&expected)).unwrap_or(PrimKind::F64);
            env.interner.primitive(kind)
        }
        Expr::StringLiteral(..) => env.interner.primitive(PrimKind::Str),
        Expr::BoolLiteral(..) => bool_ty(env),
        Expr::CharLiteral(..) => env.interner.primitive(PrimKind::Char),
        Expr::Null(_) => env.interner.intern(Ty::Ptr { inner: unit(env), is_mut: false }),

        Expr::Ident(name, span) => resolve_ident(env, diagnostics, name, *span),

        Expr::Binary { op, left, right, span } => {
            infer_binary(env, diagnostics, pending, ctx, *op, left, right, *span)
        }

        Expr::Unary { op, operand, span } => {
            infer_unary(env, diagnostics, pending, ctx, *op, operand, *span, expected)
        }

        Expr::Call { callee, type_args: _, args, span } => infer_call(env, diagnostics, pending, ctx, callee, args, *span),

        Expr::MethodCall { receiver, method, args, span, .. } => {
            infer_method_call(env, diagnostics, pending, ctx, receiver, method, args, *span)
        }

        Expr::FieldAccess { object, field, span } => infer_field_access(env, diagnostics, pending, ctx, object, field, *span),

        Expr::Index { object, index, span } => {
            let obj_ty = infer_expr(env, diagnostics, pending, ctx, object, None);
            let _ = infer_expr(env, diagnostics, pending, ctx, index, Some(env.interner.primitive(PrimKind::I64)));
            match obj_ty.as_ref() {
                Ty::Array { element, .. } | Ty::Slice { element } => element.clone(),
                _ => {
                    diagnostics.emit_error(error_codes::TYPE_MISMATCH, "indexing a non-indexable type".to_string(), span_from(*span));
                    unit(env)
                }
            }
        }

        Expr::ArrayLiteral(elems, span) => {
            let _ = span;
            let elem_expected = match &expected {
                Some(t) => match t.as_ref() {
                    Ty::Array { element, .. } | Ty::Slice { element } => Some(element.clone()),
                    _ => None,
                },
                None => None,
            };
            let mut elem_ty = elem_expected;
            for e in elems {
                let t = infer_expr(env, diagnostics, pending, ctx, e, elem_ty.clone());
                elem_ty.get_or_insert(t);
            }
            let elem = elem_ty.unwrap_or_else(|| unit(env));
            env.interner.intern(Ty::Array { element: elem, len: elems.len() as u64 })
        }

        Expr::TupleLiteral(elems, _) => {
            let tys = elems.iter().map(|e| infer_expr(env, diagnostics, pending, ctx, e, None)).collect();
            env.interner.intern(Ty::Tuple(tys))
        }

        Expr::StructLiteral { name, fields, span, .. } => infer_struct_literal(env, diagnostics, pending, ctx, name, fields, *span),

        Expr::EnumLiteral { enum_name, variant, args, span } => {
            infer_enum_literal(env, diagnostics, pending, ctx, enum_name.as_deref(), variant, args, expected, *span)
        }

        Expr::Reference { is_mut, expr: inner, span: _ } => {
            let inner_ty = infer_expr(env, diagnostics, pending, ctx, inner, None);
            if ctx.in_lowlevel {
                env.interner.intern(Ty::Ptr { inner: inner_ty, is_mut: *is_mut })
            } else if matches!(inner_ty.as_ref(), Ty::Ref { .. }) {
                inner_ty // reborrow: does not stack Refs
            } else {
                env.interner.intern(Ty::Ref { inner: inner_ty, is_mut: *is_mut })
            }
        }

        Expr::Deref(inner, span) => {
            let inner_ty = infer_expr(env, diagnostics, pending, ctx, inner, None);
            deref_once(&inner_ty).unwrap_or_else(|| {
                diagnostics.emit_error(error_codes::TYPE_MISMATCH, "cannot dereference this type".to_string(), span_from(*span));
                unit(env)
            })
        }

        Expr::Await(inner, span) => {
            if !ctx.in_async_func {
                diagnostics.emit_error(error_codes::TYPE_MISMATCH, "`.await` outside an async function".to_string(), span_from(*span));
            }
            let inner_ty = infer_expr(env, diagnostics, pending, ctx, inner, None);
            match inner_ty.as_ref() {
                Ty::Named { name, args, .. } if (name == "Poll" || name == "Future") && !args.is_empty() => args[0].clone(),
                Ty::Func { ret, is_async: true, .. } => ret.clone(),
                _ => inner_ty,
            }
        }

        Expr::Cast { expr: inner, target, span } => {
            let _ = infer_expr(env, diagnostics, pending, ctx, inner, None);
            env.resolve(target).unwrap_or_else(|e| {
                diagnostics.emit_error(error_codes::UNDEFINED_TYPE, e.to_string(), span_from(*span));
                unit(env)
            })
        }

        Expr::IsCheck { expr: inner, .. } => {
            let _ = infer_expr(env, diagnostics, pending, ctx, inner, None);
            bool_ty(env)
        }

        Expr::If { cond, then_block, elif_branches, else_block, span } => {
            let _ = infer_expr(env, diagnostics, pending, ctx, cond, Some(bool_ty(env)));
            let mut result = infer_block(env, diagnostics, pending, ctx, then_block, expected.clone());
            for (c, b) in elif_branches {
                let _ = infer_expr(env, diagnostics, pending, ctx, c, Some(bool_ty(env)));
                let t = infer_block(env, diagnostics, pending, ctx, b, expected.clone());
                result = join_branch_types(diagnostics, *span, result, t);
            }
            if let Some(b) = else_block {
                let t = infer_block(env, diagnostics, pending, ctx, b, expected.clone());
                result = join_branch_types(diagnostics, *span, result, t);
            }
            result
        }

        Expr::IfLet { pattern, value, then_block, else_block, span } => {
            let scrutinee_ty = infer_expr(env, diagnostics, pending, ctx, value, None);
            env.push_scope();
            bind_pattern(env, diagnostics, pattern, &scrutinee_ty, *span);
            let then_ty = infer_block(env, diagnostics, pending, ctx, then_block, expected.clone());
            env.pop_scope();
            let else_ty = else_block.as_ref().map(|b| infer_block(env, diagnostics, pending, ctx, b, expected));
            match else_ty {
                Some(e) => join_branch_types(diagnostics, *span, then_ty, e),
                None => unit(env),
            }
        }

        Expr::When { scrutinee, arms, span } => infer_when(env, diagnostics, pending, ctx, scrutinee, arms, expected, *span),

        Expr::Loop { body, .. } => {
            env.push_scope();
            let _ = infer_block(env, diagnostics, pending, ctx, body, None);
            env.pop_scope();
            never(env)
        }

        Expr::While { cond, body, .. } => {
            let _ = infer_expr(env, diagnostics, pending, ctx, cond, Some(bool_ty(env)));
            env.push_scope();
            let _ = infer_block(env, diagnostics, pending, ctx, body, None);
            env.pop_scope();
            unit(env)
        }

        Expr::For { var, iterable, body, span } => {
            let iter_ty = infer_expr(env, diagnostics, pending, ctx, iterable, None);
            let elem_ty = match iter_ty.as_ref() {
                Ty::Slice { element } | Ty::Array { element, .. } => element.clone(),
                Ty::Primitive(k) if k.is_integer() => env.interner.primitive(*k),
                Ty::Named { name, args, .. } if !args.is_empty() && (name == "List" || name == "Buffer" || name == "MutSlice") => {
                    args[0].clone()
                }
                _ => {
                    diagnostics.emit_error(error_codes::TYPE_MISMATCH, "for-loop source is not iterable".to_string(), span_from(*span));
                    unit(env)
                }
            };
            env.push_scope();
            env.define_local(var, elem_ty, false, *span);
            let _ = infer_block(env, diagnostics, pending, ctx, body, None);
            env.pop_scope();
            unit(env)
        }

        Expr::Block(block, _) => {
            env.push_scope();
            let t = infer_block(env, diagnostics, pending, ctx, block, expected);
            env.pop_scope();
            t
        }

        Expr::Closure { params, return_type, body, span, .. } => {
            env.push_scope();
            let mut param_tys = Vec::with_capacity(params.len());
            for p in params {
                let t = env.resolve(&p.ty).unwrap_or_else(|e| {
                    diagnostics.emit_error(error_codes::UNDEFINED_TYPE, e.to_string(), span_from(*span));
                    unit(env)
                });
                env.define_local(&p.name, t.clone(), false, p.span);
                param_tys.push(t);
            }
            let ret = match return_type {
                Some(t) => env.resolve(t).unwrap_or_else(|_| unit(env)),
                None => infer_expr(env, diagnostics, pending, ctx, body, None),
            };
            env.pop_scope();
            env.interner.intern(Ty::Closure { params: param_tys, ret, captures: vec![] })
        }
    }
}

fn expected_prim_kind(expected: &Option<TypePtr>) -> Option<PrimKind> {
    expected.as_ref().and_then(|t| match t.as_ref() {
        Ty::Primitive(k) => Some(*k),
        _ => None,
    })
}

fn resolve_ident(env: &mut TypeEnv, diagnostics: &mut DiagnosticEngine, name: &str, span: nova_ast::Span) -> TypePtr {
    if let Some(entry) = env.lookup_local(name) {
        return entry.ty.clone();
    }
    if let Some(sig) = env.lookup_function(name) {
        let params = sig.params.clone();
        let ret = sig.return_type.clone();
        let is_async = sig.is_async;
        return env.interner.intern(Ty::Func { params, ret, is_async });
    }
    for enum_name in enum_names_defining_variant(env, name) {
        if let Some(def) = env.lookup_enum(&enum_name) {
            if let Some(variant) = def.variant(name) {
                let params = variant.payload.clone();
                let ret = env.interner.intern(Ty::Named { module_path: vec![], name: enum_name.clone(), args: vec![] });
                return env.interner.intern(Ty::Func { params, ret, is_async: false });
            }
        }
    }
    if let Some(c) = env.lookup_const(name) {
        return c.clone();
    }
    let suggestions = fuzzy::find_similar_names(name, &env.all_known_names(), 3);
    diagnostics.undefined_name(name, span_from(span), suggestions);
    env.interner.primitive(PrimKind::Unit)
}

fn enum_names_defining_variant(env: &TypeEnv, variant_name: &str) -> Vec<String> {
    // Exposed indirectly: `TypeEnv` doesn't expose a full enum iterator, so we reuse the
    // known-names list, filtering candidates that are plausible enum names. This keeps the
    // lookup order simple without widening `TypeEnv`'s public surface just for this probe.
    env.all_known_names()
        .into_iter()
        .filter(|n| env.lookup_enum(n).map(|d| d.variant(variant_name).is_some()).unwrap_or(false))
        .collect()
}

fn infer_binary(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    span: nova_ast::Span,
) -> TypePtr {
    use BinaryOp::*;
    match op {
        Eq | NotEq | Lt | LtEq | Gt | GtEq => {
            let lt = infer_expr(env, diagnostics, pending, ctx, left, None);
            let _ = infer_expr(env, diagnostics, pending, ctx, right, Some(lt));
            bool_ty(env)
        }
        And | Or => {
            let b = bool_ty(env);
            let _ = infer_expr(env, diagnostics, pending, ctx, left, Some(b.clone()));
            let _ = infer_expr(env, diagnostics, pending, ctx, right, Some(b.clone()));
            b
        }
        Div | Mod => {
            let lt = infer_expr(env, diagnostics, pending, ctx, left, None);
            if let Expr::IntLiteral { value: 0, .. } = right {
                diagnostics.emit_error(error_codes::DIVISION_BY_ZERO_LITERAL, "division by zero literal".to_string(), span_from(span));
            }
            let _ = infer_expr(env, diagnostics, pending, ctx, right, Some(lt.clone()));
            lt
        }
        Add => {
            let lt = infer_expr(env, diagnostics, pending, ctx, left, None);
            if matches!(lt.as_ref(), Ty::Ptr { .. }) {
                let _ = infer_expr(env, diagnostics, pending, ctx, right, Some(env.interner.primitive(PrimKind::I64)));
                return lt;
            }
            let _ = infer_expr(env, diagnostics, pending, ctx, right, Some(lt.clone()));
            lt
        }
        Sub => {
            let lt = infer_expr(env, diagnostics, pending, ctx, left, None);
            if matches!(lt.as_ref(), Ty::Ptr { .. }) {
                let rt = infer_expr(env, diagnostics, pending, ctx, right, None);
                if matches!(rt.as_ref(), Ty::Ptr { .. }) {
                    return env.interner.primitive(PrimKind::I64);
                }
                return lt;
            }
            let _ = infer_expr(env, diagnostics, pending, ctx, right, Some(lt.clone()));
            lt
        }
        Mul | BitAnd | BitOr | BitXor | Shl | Shr => {
            let lt = infer_expr(env, diagnostics, pending, ctx, left, None);
            let _ = infer_expr(env, diagnostics, pending, ctx, right, Some(lt.clone()));
            lt
        }
    }
}

fn infer_unary(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    op: UnaryOp,
    operand: &Expr,
    span: nova_ast::Span,
    expected: Option<TypePtr>,
) -> TypePtr {
    match op {
        UnaryOp::Not => {
            let b = bool_ty(env);
            infer_expr(env, diagnostics, pending, ctx, operand, Some(b))
        }
        // Threading `expected` through lets a negated integer literal adopt the target's
        // primitive kind before range-checking, so `let x: I8 = -128` sees the literal `128`
        // checked against I8 with the minimum-magnitude allowance below instead of defaulting to I64.
        UnaryOp::Neg => {
            if let Expr::IntLiteral { value, suffix, span: lit_span } = operand {
                let kind = suffix.or_else(|| expected_prim_kind(&expected)).unwrap_or(PrimKind::I64);
                if let Some((lo, hi)) = kind.int_range() {
                    let _ = hi;
                    if *value < 0 || *value > -lo {
                        diagnostics.emit_error(
                            error_codes::INTEGER_LITERAL_OUT_OF_RANGE,
                            format!("literal `-{}` out of range for `{:?}`", value, kind),
                            span_from(*lit_span),
                        );
                    }
                    if !kind.is_signed() {
                        diagnostics.emit_error(
                            error_codes::NEGATIVE_TO_UNSIGNED,
                            format!("cannot assign negative literal to unsigned type `{:?}`", kind),
                            span_from(*lit_span),
                        );
                    }
                }
                return env.interner.primitive(kind);
            }
            infer_expr(env, diagnostics, pending, ctx, operand, expected)
        }
        UnaryOp::Ref => {
            let inner_ty = infer_expr(env, diagnostics, pending, ctx, operand, None);
            if ctx.in_lowlevel {
                env.interner.intern(Ty::Ptr { inner: inner_ty, is_mut: false })
            } else {
                env.interner.intern(Ty::Ref { inner: inner_ty, is_mut: false })
            }
        }
        UnaryOp::RefMut => {
            let inner_ty = infer_expr(env, diagnostics, pending, ctx, operand, None);
            if ctx.in_lowlevel {
                env.interner.intern(Ty::Ptr { inner: inner_ty, is_mut: true })
            } else {
                env.interner.intern(Ty::Ref { inner: inner_ty, is_mut: true })
            }
        }
        UnaryOp::Deref => {
            let inner_ty = infer_expr(env, diagnostics, pending, ctx, operand, None);
            deref_once(&inner_ty).unwrap_or_else(|| {
                diagnostics.emit_error(error_codes::TYPE_MISMATCH, "cannot dereference this type".to_string(), span_from(span));
                unit(env)
            })
        }
    }
}

/// Polymorphic builtins (`print`/`println`) type-check their arguments but impose no
/// signature match. Everything else unifies parameter patterns against argument types.
const POLYMORPHIC_BUILTINS: &[&str] = &["print", "println", "eprint", "eprintln"];

/// The closed intrinsic set (§6), named the same as `codegen::intrinsics::NAMES` — no user
/// function can shadow these, so a call to one never goes through `TypeEnv::lookup_function`
/// and needs its own typing rule here instead of an `undefined_name` error.
fn infer_intrinsic_call(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    name: &str,
    args: &[Expr],
) -> Option<TypePtr> {
    let infer_arg = |env: &mut TypeEnv, diagnostics: &mut DiagnosticEngine, pending: &mut Vec<MangleKey>, i: usize, expected: Option<TypePtr>| {
        args.get(i).map(|a| infer_expr(env, diagnostics, pending, ctx, a, expected))
    };

    Some(match name {
        "unreachable" => never(env),
        "assume" | "fence" | "compiler_fence" => {
            infer_arg(env, diagnostics, pending, 0, None);
            unit(env)
        }
        "likely" | "unlikely" => infer_arg(env, diagnostics, pending, 0, Some(bool_ty(env))).unwrap_or_else(|| bool_ty(env)),
        "drop" => {
            infer_arg(env, diagnostics, pending, 0, None);
            unit(env)
        }
        "checked_add" | "checked_sub" | "checked_mul" | "checked_div" => {
            let lhs = infer_arg(env, diagnostics, pending, 0, None).unwrap_or_else(|| unit(env));
            infer_arg(env, diagnostics, pending, 1, Some(lhs.clone()));
            env.interner.intern(Ty::Named { module_path: vec![], name: "Maybe".to_string(), args: vec![lhs] })
        }
        "saturating_add" | "saturating_sub" | "saturating_mul" => {
            let lhs = infer_arg(env, diagnostics, pending, 0, None).unwrap_or_else(|| unit(env));
            infer_arg(env, diagnostics, pending, 1, Some(lhs.clone()));
            lhs
        }
        "ctlz" | "cttz" | "ctpop" | "bswap" | "bitreverse" => infer_arg(env, diagnostics, pending, 0, None).unwrap_or_else(|| unit(env)),
        "sqrt" | "sin" | "cos" | "log" | "exp" | "floor" | "ceil" | "round" | "trunc" | "fabs" => {
            infer_arg(env, diagnostics, pending, 0, None).unwrap_or_else(|| unit(env))
        }
        "pow" | "minnum" | "maxnum" | "copysign" => {
            let lhs = infer_arg(env, diagnostics, pending, 0, None).unwrap_or_else(|| unit(env));
            infer_arg(env, diagnostics, pending, 1, Some(lhs.clone()));
            lhs
        }
        "fma" => {
            let lhs = infer_arg(env, diagnostics, pending, 0, None).unwrap_or_else(|| unit(env));
            infer_arg(env, diagnostics, pending, 1, Some(lhs.clone()));
            infer_arg(env, diagnostics, pending, 2, Some(lhs.clone()));
            lhs
        }
        "field_count" | "variant_count" | "field_offset" => env.interner.primitive(PrimKind::I32),
        "field_name" | "type_name" => env.interner.primitive(PrimKind::Str),
        "field_type_id" => env.interner.primitive(PrimKind::I32),
        _ => return None,
    })
}

fn infer_call(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    callee: &Expr,
    args: &[Expr],
    span: nova_ast::Span,
) -> TypePtr {
    if let Expr::Ident(name, _) = callee {
        if POLYMORPHIC_BUILTINS.contains(&name.as_str()) {
            for a in args {
                let _ = infer_expr(env, diagnostics, pending, ctx, a, None);
            }
            return unit(env);
        }

        if env.lookup_function(name).is_none() {
            if let Some(ty) = infer_intrinsic_call(env, diagnostics, pending, ctx, name, args) {
                return ty;
            }
        }

        if let Some(enum_name) = enum_names_defining_variant(env, name).into_iter().next() {
            return infer_enum_literal(env, diagnostics, pending, ctx, Some(&enum_name), name, args, None, span);
        }

        if let Some(sig) = env.lookup_function(name).cloned() {
            let arg_tys: Vec<TypePtr> = sig
                .params
                .iter()
                .zip(args.iter())
                .map(|(p, a)| infer_expr(env, diagnostics, pending, ctx, a, Some(p.clone())))
                .collect();
            if args.len() != sig.params.len() {
                diagnostics.argument_count_mismatch(name, sig.params.len(), args.len(), span_from(span));
            }
            if !sig.type_params.is_empty() {
                let subst = unify_params(&sig.params, &arg_tys);
                let ret = env.substitute(&sig.return_type, &subst);
                let type_args: Vec<TypePtr> = sig.type_params.iter().map(|p| subst.get(p).cloned().unwrap_or_else(|| unit(env))).collect();
                pending.push(MangleKey { kind: MonoKind::Function, base_name: name.clone(), args: type_args, impl_type: None });
                return ret;
            }
            return sig.return_type;
        }
    }

    let callee_ty = infer_expr(env, diagnostics, pending, ctx, callee, None);
    for a in args {
        let _ = infer_expr(env, diagnostics, pending, ctx, a, None);
    }
    match callee_ty.as_ref() {
        Ty::Func { ret, .. } | Ty::Closure { ret, .. } => ret.clone(),
        _ => unit(env),
    }
}

pub(crate) fn unify_params(params: &[TypePtr], args: &[TypePtr]) -> std::collections::HashMap<String, TypePtr> {
    let mut subst = std::collections::HashMap::new();
    for (p, a) in params.iter().zip(args.iter()) {
        unify_one(p, a, &mut subst);
    }
    subst
}

fn unify_one(param: &TypePtr, arg: &TypePtr, subst: &mut std::collections::HashMap<String, TypePtr>) {
    match param.as_ref() {
        Ty::Generic(name) => {
            subst.entry(name.clone()).or_insert_with(|| arg.clone());
        }
        Ty::Named { args: pargs, .. } => {
            if let Ty::Named { args: aargs, .. } = arg.as_ref() {
                for (p, a) in pargs.iter().zip(aargs.iter()) {
                    unify_one(p, a, subst);
                }
            }
        }
        Ty::Ref { inner: p, .. } => {
            if let Ty::Ref { inner: a, .. } = arg.as_ref() {
                unify_one(p, a, subst);
            }
        }
        _ => {}
    }
}

fn infer_method_call(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    receiver: &Expr,
    method: &str,
    args: &[Expr],
    span: nova_ast::Span,
) -> TypePtr {
    let receiver_ty = infer_expr(env, diagnostics, pending, ctx, receiver, None);
    for a in args {
        let _ = infer_expr(env, diagnostics, pending, ctx, a, None);
    }

    // A `dyn Behavior` value only ever exposes the behavior's own methods (no inherent impl,
    // no deref chain to walk) — dispatch is resolved against the vtable at codegen time, so
    // the checker only needs the behavior's declared signature.
    if let Ty::DynBehavior { behavior, .. } = receiver_ty.as_ref() {
        if let Some(sig) = env.lookup_function(&format!("{}::{}", behavior, method)).cloned() {
            return sig.return_type;
        }
        diagnostics.emit_error(
            error_codes::NO_SUCH_METHOD,
            format!("behavior `{}` has no method named `{}`", behavior, method),
            span_from(span),
        );
        return unit(env);
    }

    // Walk the deref chain for smart-pointer wrappers before giving up.
    let mut current = receiver_ty.clone();
    loop {
        if let Some(base) = current.base_name() {
            let unmangled = base.split("__").next().unwrap_or(base).to_string();
            if let Some(sig) = env.lookup_function(&format!("{}::{}", unmangled, method)).cloned() {
                if !sig.type_params.is_empty() {
                    let subst = unify_params(&sig.params, &current.type_args().to_vec());
                    return env.substitute(&sig.return_type, &subst);
                }
                return sig.return_type;
            }
            // No inherent override: fall back to the behavior's default-method signature,
            // registered under the behavior's own name (§4.1 qualified-name convention).
            if let Some(behavior_name) = method_owning_behavior(env, &unmangled) {
                if let Some(sig) = env.lookup_function(&format!("{}::{}", behavior_name, method)).cloned() {
                    return sig.return_type;
                }
            }
        }
        match deref_once(&current) {
            Some(next) => current = next,
            None => break,
        }
    }

    diagnostics.emit_error(
        error_codes::NO_SUCH_METHOD,
        format!("no method named `{}` found for this type", method),
        span_from(span),
    );
    unit(env)
}

fn method_owning_behavior(env: &TypeEnv, type_name: &str) -> Option<String> {
    env.impls_for(type_name).find_map(|r| r.behavior.clone())
}

fn infer_field_access(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    object: &Expr,
    field: &str,
    span: nova_ast::Span,
) -> TypePtr {
    let object_ty = infer_expr(env, diagnostics, pending, ctx, object, None);
    let mut current = object_ty;
    loop {
        let base = current.base_name().map(|s| s.split("__").next().unwrap_or(s).to_string());
        if let Some(name) = &base {
            if let Some(def) = env.lookup_struct(name) {
                if let Some(f) = def.fields.iter().find(|f| &f.name == field) {
                    let subst: std::collections::HashMap<String, TypePtr> =
                        def.type_params.iter().cloned().zip(current.type_args().iter().cloned()).collect();
                    return env.substitute(&f.ty, &subst);
                }
            }
            let mut class_name = Some(name.clone());
            while let Some(cname) = class_name {
                if let Some(def) = env.lookup_class(&cname) {
                    if let Some(f) = def.fields.iter().find(|f| &f.name == field) {
                        return f.ty.clone();
                    }
                    class_name = def.base.clone();
                } else {
                    break;
                }
            }
        }
        match deref_once(&current) {
            Some(next) => current = next,
            None => break,
        }
    }
    diagnostics.emit_error(error_codes::NO_SUCH_FIELD, format!("no field named `{}`", field), span_from(span));
    unit(env)
}

fn infer_struct_literal(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    name: &str,
    fields: &[(String, Expr)],
    span: nova_ast::Span,
) -> TypePtr {
    let Some(def) = env.lookup_struct(name).cloned() else {
        let suggestions = fuzzy::find_similar_names(name, &env.all_known_names(), 3);
        diagnostics.undefined_name(name, span_from(span), suggestions);
        return unit(env);
    };

    let mut subst: std::collections::HashMap<String, TypePtr> = std::collections::HashMap::new();
    for (fname, fexpr) in fields {
        let expected_field_ty = def.fields.iter().find(|f| &f.name == fname).map(|f| f.ty.clone());
        let value_ty = infer_expr(env, diagnostics, pending, ctx, fexpr, expected_field_ty.clone());
        if let Some(expected_field_ty) = expected_field_ty {
            if let Ty::Generic(p) = expected_field_ty.as_ref() {
                subst.entry(p.clone()).or_insert(value_ty);
            }
        }
    }

    if def.type_params.is_empty() {
        env.interner.intern(Ty::Named { module_path: vec![], name: name.to_string(), args: vec![] })
    } else {
        let args: Vec<TypePtr> = def.type_params.iter().map(|p| subst.get(p).cloned().unwrap_or_else(|| unit(env))).collect();
        pending.push(MangleKey { kind: MonoKind::Struct, base_name: name.to_string(), args: args.clone(), impl_type: None });
        env.interner.intern(Ty::Named { module_path: vec![], name: name.to_string(), args })
    }
}

fn infer_enum_literal(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    enum_name: Option<&str>,
    variant: &str,
    args: &[Expr],
    expected: Option<TypePtr>,
    span: nova_ast::Span,
) -> TypePtr {
    let name = enum_name
        .map(|s| s.to_string())
        .or_else(|| match &expected {
            Some(t) => t.base_name().map(|s| s.to_string()),
            None => None,
        })
        .or_else(|| enum_names_defining_variant(env, variant).into_iter().next());

    let Some(name) = name else {
        diagnostics.emit_error(error_codes::UNDEFINED_NAME, format!("cannot determine enum for variant `{}`", variant), span_from(span));
        return unit(env);
    };

    let Some(def) = env.lookup_enum(&name).cloned() else {
        diagnostics.emit_error(error_codes::UNDEFINED_TYPE, format!("no enum named `{}`", name), span_from(span));
        return unit(env);
    };

    let Some(v) = def.variant(variant) else {
        diagnostics.emit_error(error_codes::NO_SUCH_FIELD, format!("enum `{}` has no variant `{}`", name, variant), span_from(span));
        return unit(env);
    };

    if v.payload.len() != args.len() {
        diagnostics.argument_count_mismatch(&format!("{}::{}", name, variant), v.payload.len(), args.len(), span_from(span));
    }

    let mut subst: std::collections::HashMap<String, TypePtr> = std::collections::HashMap::new();
    for (expected_ty, arg) in v.payload.iter().zip(args.iter()) {
        let value_ty = infer_expr(env, diagnostics, pending, ctx, arg, Some(expected_ty.clone()));
        if let Ty::Generic(p) = expected_ty.as_ref() {
            subst.entry(p.clone()).or_insert(value_ty);
        }
    }

    if def.type_params.is_empty() {
        env.interner.intern(Ty::Named { module_path: vec![], name, args: vec![] })
    } else {
        let type_args: Vec<TypePtr> = def.type_params.iter().map(|p| subst.get(p).cloned().unwrap_or_else(|| unit(env))).collect();
        pending.push(MangleKey { kind: MonoKind::Enum, base_name: name.clone(), args: type_args.clone(), impl_type: None });
        env.interner.intern(Ty::Named { module_path: vec![], name, args: type_args })
    }
}

fn infer_when(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    scrutinee: &Expr,
    arms: &[nova_ast::MatchArm],
    expected: Option<TypePtr>,
    span: nova_ast::Span,
) -> TypePtr {
    let scrutinee_ty = infer_expr(env, diagnostics, pending, ctx, scrutinee, None);

    if let (Some(def_name), Ty::Named { .. }) = (scrutinee_ty.base_name().map(|s| s.to_string()), scrutinee_ty.as_ref()) {
        if let Some(def) = env.lookup_enum(&def_name) {
            let covered: std::collections::HashSet<&str> = arms
                .iter()
                .filter_map(|a| match &a.pattern {
                    nova_ast::Pattern::Enum { variant, .. } => Some(variant.as_str()),
                    nova_ast::Pattern::Wildcard | nova_ast::Pattern::Ident(_) => None,
                    _ => None,
                })
                .collect();
            let has_catch_all = arms.iter().any(|a| matches!(a.pattern, nova_ast::Pattern::Wildcard | nova_ast::Pattern::Ident(_)));
            if !has_catch_all && def.variants.iter().any(|v| !covered.contains(v.name.as_str())) {
                diagnostics.emit_error(error_codes::NON_EXHAUSTIVE_MATCH, format!("`when` does not cover all variants of `{}`", def_name), span_from(span));
            }
        }
    }

    let mut result: Option<TypePtr> = None;
    for arm in arms {
        env.push_scope();
        bind_pattern(env, diagnostics, &arm.pattern, &scrutinee_ty, span);
        if let Some(guard) = &arm.guard {
            let _ = infer_expr(env, diagnostics, pending, ctx, guard, Some(bool_ty(env)));
        }
        let body_ty = infer_expr(env, diagnostics, pending, ctx, &arm.body, expected.clone());
        env.pop_scope();
        result = Some(match result {
            Some(r) => join_branch_types(diagnostics, span, r, body_ty),
            None => body_ty,
        });
    }
    result.unwrap_or_else(|| unit(env))
}

/// A diverging branch (type `Never`) doesn't constrain the join result; otherwise both
/// branches must agree exactly.
fn join_branch_types(
    diagnostics: &mut DiagnosticEngine,
    span: nova_ast::Span,
    a: TypePtr,
    b: TypePtr,
) -> TypePtr {
    if a.is_never() {
        b
    } else if b.is_never() || a == b {
        a
    } else {
        diagnostics.emit_error(
            error_codes::TYPE_MISMATCH,
            format!("branch type mismatch: `{:?}` vs `{:?}`", a, b),
            span_from(span),
        );
        a
    }
}

pub fn infer_block(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pending: &mut Vec<MangleKey>,
    ctx: CheckContext,
    block: &nova_ast::Block,
    expected: Option<TypePtr>,
) -> TypePtr {
    for stmt in &block.statements {
        super::bodies::check_stmt(env, diagnostics, pending, ctx, stmt);
    }
    match &block.trailing_expr {
        Some(e) => infer_expr(env, diagnostics, pending, ctx, e, expected),
        None => unit(env),
    }
}
