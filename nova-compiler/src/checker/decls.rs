//! Pass 1: register struct/enum/behavior/class shells, then resolve field and variant
//! types now that every name in the module is at least known to exist.
use nova_ast::{ClassDecl, Decl, EnumDecl, Program, StructDecl};
use nova_diagnostics::{error_codes, DiagnosticEngine, Span as DiagSpan};

use crate::type_env::{ClassDef, ClassFieldInfo, EnumDef, EnumVariantInfo, FieldInfo, StructDef, TypeEnv};

fn type_param_names(params: &[nova_ast::TypeParam]) -> Vec<String> {
    params.iter().map(|p| p.name.clone()).collect()
}

pub fn register_declarations(env: &mut TypeEnv, diagnostics: &mut DiagnosticEngine, program: &Program) {
    // Shells first so mutually-referencing structs/enums can see each other's names.
    for decl in &program.items {
        match decl {
            Decl::Struct(s) => env.define_struct(StructDef { name: s.name.clone(), type_params: type_param_names(&s.type_params), fields: vec![] }),
            Decl::Enum(e) => env.define_enum(EnumDef { name: e.name.clone(), type_params: type_param_names(&e.type_params), variants: vec![] }),
            Decl::Class(c) => env.define_class(ClassDef {
                name: c.name.clone(),
                type_params: type_param_names(&c.type_params),
                fields: vec![],
                base: c.base.clone(),
                is_abstract: c.is_abstract,
                method_names: c.methods.iter().map(|m| m.name.clone()).collect(),
            }),
            Decl::Behavior(b) => env.define_behavior(crate::type_env::BehaviorDef {
                name: b.name.clone(),
                type_params: type_param_names(&b.type_params),
                super_behaviors: b.super_behaviors.clone(),
                methods: b
                    .methods
                    .iter()
                    .map(|m| crate::type_env::BehaviorMethodSig { name: m.name.clone(), has_default_body: m.body.is_some() })
                    .collect(),
            }),
            _ => {}
        }
    }

    for decl in &program.items {
        match decl {
            Decl::Struct(s) => resolve_struct_fields(env, diagnostics, s),
            Decl::Enum(e) => resolve_enum_variants(env, diagnostics, e),
            Decl::Class(c) => resolve_class_fields(env, diagnostics, c),
            _ => {}
        }
    }
}

fn resolve_struct_fields(env: &mut TypeEnv, diagnostics: &mut DiagnosticEngine, s: &StructDecl) {
    env.push_generic_scope(type_param_names(&s.type_params));
    let mut fields = Vec::with_capacity(s.fields.len());
    for f in &s.fields {
        match env.resolve(&f.ty) {
            Ok(ty) => fields.push(FieldInfo { name: f.name.clone(), ty, is_public: matches!(f.visibility, nova_ast::Visibility::Public) }),
            Err(e) => diagnostics.emit_error(error_codes::UNDEFINED_TYPE, e.to_string(), span_from(f.span)),
        }
    }
    env.pop_generic_scope();
    env.define_struct(StructDef { name: s.name.clone(), type_params: type_param_names(&s.type_params), fields });
}

fn resolve_enum_variants(env: &mut TypeEnv, diagnostics: &mut DiagnosticEngine, e: &EnumDecl) {
    env.push_generic_scope(type_param_names(&e.type_params));
    let mut variants = Vec::with_capacity(e.variants.len());
    for v in &e.variants {
        let mut payload = Vec::with_capacity(v.payload.len());
        for p in &v.payload {
            match env.resolve(p) {
                Ok(ty) => payload.push(ty),
                Err(err) => diagnostics.emit_error(error_codes::UNDEFINED_TYPE, err.to_string(), span_from(e.span)),
            }
        }
        variants.push(EnumVariantInfo { name: v.name.clone(), payload });
    }
    env.pop_generic_scope();
    env.define_enum(EnumDef { name: e.name.clone(), type_params: type_param_names(&e.type_params), variants });
}

fn resolve_class_fields(env: &mut TypeEnv, diagnostics: &mut DiagnosticEngine, c: &ClassDecl) {
    env.push_generic_scope(type_param_names(&c.type_params));
    let mut fields = Vec::with_capacity(c.fields.len());
    for f in &c.fields {
        match env.resolve(&f.ty) {
            Ok(ty) => fields.push(ClassFieldInfo {
                name: f.name.clone(),
                ty,
                is_public: matches!(f.visibility, nova_ast::Visibility::Public),
                is_static: f.is_static,
            }),
            Err(e) => diagnostics.emit_error(error_codes::UNDEFINED_TYPE, e.to_string(), span_from(f.span)),
        }
    }
    env.pop_generic_scope();
    env.define_class(ClassDef {
        name: c.name.clone(),
        type_params: type_param_names(&c.type_params),
        fields,
        base: c.base.clone(),
        is_abstract: c.is_abstract,
        method_names: c.methods.iter().map(|m| m.name.clone()).collect(),
    });
}

/// Parse-tree spans are `(line, col)` pairs with a numeric file id; diagnostics need a file
/// path. Until the driver wires in a real file table, the id is rendered directly.
pub fn span_from(span: nova_ast::Span) -> DiagSpan {
    DiagSpan::new(format!("<file {}>", span.file_id), span.start.0 as usize, span.start.1 as usize, 1)
}
