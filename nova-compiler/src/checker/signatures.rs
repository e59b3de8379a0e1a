//! Pass 2: resolve function signatures, impl method signatures (qualified `Type::method`),
//! and type-check constant initializers against their declared types.
use nova_ast::{Decl, FuncDecl, ImplDecl, Program};
use nova_diagnostics::{error_codes, DiagnosticEngine};

use super::decls::span_from;
use super::expr::infer_expr;
use crate::checker::CheckContext;
use crate::mono::MangleKey;
use crate::type_env::{FuncSig, ImplRecord, TypeEnv};

pub fn register_signatures(env: &mut TypeEnv, diagnostics: &mut DiagnosticEngine, pending: &mut Vec<MangleKey>, program: &Program) {
    for decl in &program.items {
        match decl {
            Decl::Func(f) => register_function_signature(env, diagnostics, f, None),
            Decl::Impl(i) => register_impl_signatures(env, diagnostics, i),
            Decl::Behavior(b) => {
                for m in &b.methods {
                    register_function_signature(env, diagnostics, m, Some(&b.name));
                }
            }
            Decl::Class(c) => {
                for m in &c.methods {
                    register_function_signature(env, diagnostics, m, Some(&c.name));
                }
            }
            Decl::Const(c) => {
                let declared = c.ty.as_ref().map(|t| env.resolve(t));
                let ctx = CheckContext::default();
                let inferred = infer_expr(env, diagnostics, pending, ctx, &c.value, declared.as_ref().and_then(|r| r.clone().ok()));
                let ty = match declared {
                    Some(Ok(t)) => t,
                    Some(Err(e)) => {
                        diagnostics.emit_error(error_codes::UNDEFINED_TYPE, e.to_string(), span_from(c.span));
                        inferred
                    }
                    None => inferred,
                };
                env.define_const(&c.name, ty);
            }
            _ => {}
        }
    }
}

fn register_function_signature(env: &mut TypeEnv, diagnostics: &mut DiagnosticEngine, f: &FuncDecl, qualifier: Option<&str>) {
    env.push_generic_scope(f.type_params.iter().map(|p| p.name.clone()).collect());
    let params = f
        .params
        .iter()
        .filter_map(|p| match env.resolve(&p.ty) {
            Ok(ty) => Some(ty),
            Err(e) => {
                diagnostics.emit_error(error_codes::UNDEFINED_TYPE, e.to_string(), span_from(p.span));
                None
            }
        })
        .collect();
    let return_type = match &f.return_type {
        Some(t) => match env.resolve(t) {
            Ok(ty) => ty,
            Err(e) => {
                diagnostics.emit_error(error_codes::UNDEFINED_TYPE, e.to_string(), span_from(f.span));
                env.interner.primitive(nova_ast::PrimKind::Unit)
            }
        },
        None => env.interner.primitive(nova_ast::PrimKind::Unit),
    };
    env.pop_generic_scope();

    let name = match qualifier {
        Some(q) => format!("{}::{}", q, f.name),
        None => f.name.clone(),
    };
    env.define_function(FuncSig {
        name,
        type_params: f.type_params.iter().map(|p| p.name.clone()).collect(),
        params,
        return_type,
        is_async: f.is_async,
    });
}

/// The bare type name an impl block attaches methods to, used as the key for method
/// lookup and vtable grouping. Only `Named` and primitive self-types are legal here.
fn impl_self_type_name(ty: &nova_ast::Type) -> String {
    match ty {
        nova_ast::Type::Named { name, .. } => name.clone(),
        nova_ast::Type::Prim(kind) => format!("{:?}", kind),
        _ => "<unknown>".to_string(),
    }
}

fn register_impl_signatures(env: &mut TypeEnv, diagnostics: &mut DiagnosticEngine, i: &ImplDecl) {
    let self_type_name = impl_self_type_name(&i.self_type);

    env.push_generic_scope(i.type_params.iter().map(|p| p.name.clone()).collect());
    env.current_self_type = env.resolve(&i.self_type).ok();

    for m in &i.methods {
        register_function_signature(env, diagnostics, m, Some(&self_type_name));
    }

    env.current_self_type = None;
    env.pop_generic_scope();

    env.define_impl(ImplRecord {
        self_type_name,
        behavior: i.behavior.as_ref().map(|(name, _)| name.clone()),
        methods: i.methods.iter().map(|m| m.name.clone()).collect(),
    });
}
