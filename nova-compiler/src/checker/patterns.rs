//! Pattern binding for `let`, `when` arms, and `if let` (§4.2 "Pattern matching").
use nova_ast::Pattern;
use nova_diagnostics::{error_codes, DiagnosticEngine};

use super::decls::span_from;
use crate::type_env::TypeEnv;
use crate::type_system::{Ty, TypePtr};

/// Binds every name introduced by `pattern` against `scrutinee_ty` into the current scope.
/// Reports a variant-arity/existence mismatch but still binds placeholder types for the
/// payload so the rest of the arm can be checked without cascading errors.
pub fn bind_pattern(
    env: &mut TypeEnv,
    diagnostics: &mut DiagnosticEngine,
    pattern: &Pattern,
    scrutinee_ty: &TypePtr,
    span: nova_ast::Span,
) {
    match pattern {
        Pattern::Wildcard => {}
        Pattern::Ident(name) => {
            env.define_local(name, scrutinee_ty.clone(), false, span);
        }
        Pattern::Literal(_) => {}
        Pattern::Tuple(elems) => match scrutinee_ty.as_ref() {
            Ty::Tuple(tys) if tys.len() == elems.len() => {
                for (p, t) in elems.iter().zip(tys.iter()) {
                    bind_pattern(env, diagnostics, p, t, span);
                }
            }
            _ => {
                diagnostics.emit_error(
                    error_codes::TYPE_MISMATCH,
                    "tuple pattern does not match the value being matched".to_string(),
                    span_from(span),
                );
                for p in elems {
                    bind_pattern_fallback(env, p, span);
                }
            }
        },
        Pattern::Struct { name, fields } => {
            let struct_def = scrutinee_ty.base_name().and_then(|n| env.lookup_struct(n)).cloned();
            for (field_name, field_pattern) in fields {
                let field_ty = struct_def
                    .as_ref()
                    .and_then(|d| d.fields.iter().find(|f| &f.name == field_name))
                    .map(|f| f.ty.clone());
                match field_ty {
                    Some(ty) => bind_pattern(env, diagnostics, field_pattern, &ty, span),
                    None => {
                        diagnostics.emit_error(
                            error_codes::NO_SUCH_FIELD,
                            format!("no field named `{}` on `{}`", field_name, name),
                            span_from(span),
                        );
                        bind_pattern_fallback(env, field_pattern, span);
                    }
                }
            }
        }
        Pattern::Enum { enum_name, variant, data } => {
            let name = enum_name.clone().or_else(|| scrutinee_ty.base_name().map(|s| s.to_string()));
            let def = name.as_ref().and_then(|n| env.lookup_enum(n)).cloned();
            match def.as_ref().and_then(|d| d.variant(variant)) {
                Some(v) if v.payload.len() == data.len() => {
                    for (p, t) in data.iter().zip(v.payload.iter()) {
                        bind_pattern(env, diagnostics, p, t, span);
                    }
                }
                Some(v) => {
                    diagnostics.argument_count_mismatch(variant, v.payload.len(), data.len(), span_from(span));
                    for p in data {
                        bind_pattern_fallback(env, p, span);
                    }
                }
                None => {
                    diagnostics.emit_error(
                        error_codes::NO_SUCH_FIELD,
                        format!("no variant named `{}`", variant),
                        span_from(span),
                    );
                    for p in data {
                        bind_pattern_fallback(env, p, span);
                    }
                }
            }
        }
    }
}

/// Binds any names in `pattern` to `Unit` so later statements in a malformed arm don't
/// cascade into spurious "undefined name" errors on top of the pattern error already raised.
fn bind_pattern_fallback(env: &mut TypeEnv, pattern: &Pattern, span: nova_ast::Span) {
    let unit = env.interner.primitive(nova_ast::PrimKind::Unit);
    match pattern {
        Pattern::Ident(name) => env.define_local(name, unit, false, span),
        Pattern::Tuple(elems) | Pattern::Enum { data: elems, .. } => {
            for p in elems {
                bind_pattern_fallback(env, p, span);
            }
        }
        Pattern::Struct { fields, .. } => {
            for (_, p) in fields {
                bind_pattern_fallback(env, p, span);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_ast::Span as AstSpan;

    #[test]
    fn ident_pattern_binds_the_scrutinee_type() {
        let mut env = TypeEnv::new();
        let mut diagnostics = DiagnosticEngine::new();
        let i32_ty = env.interner.primitive(nova_ast::PrimKind::I32);
        env.push_scope();
        bind_pattern(&mut env, &mut diagnostics, &Pattern::Ident("x".to_string()), &i32_ty, AstSpan::unknown());
        assert!(env.lookup_local("x").is_some());
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn enum_pattern_reports_unknown_variant() {
        let mut env = TypeEnv::new();
        let mut diagnostics = DiagnosticEngine::new();
        let ty = env.interner.intern(Ty::Named { module_path: vec![], name: "Maybe".to_string(), args: vec![] });
        env.push_scope();
        bind_pattern(
            &mut env,
            &mut diagnostics,
            &Pattern::Enum { enum_name: Some("Maybe".to_string()), variant: "Nope".to_string(), data: vec![] },
            &ty,
            AstSpan::unknown(),
        );
        assert!(diagnostics.has_errors());
    }
}
