// Phase 7: Dynamic Dispatch Through a Behavior Object - Unit Tests
// Coercing a concrete value to `dyn Behavior` builds a fat pointer (data ptr + vtable ptr);
// calling a method on it goes through an indirect call against that vtable, not a direct one.

use inkwell::context::Context;
use nova_ast::*;
use nova_compiler::checker::TypeChecker;
use nova_compiler::codegen::{CodegenOptions, IrGen};
use nova_compiler::type_env::TypeEnv;

#[cfg(test)]
mod phase7_dynamic_dispatch_tests {
    use super::*;

    fn span() -> Span {
        Span::unknown()
    }

    fn receiver() -> Receiver {
        Receiver { is_mut: false, by_ref: true, span: span() }
    }

    /// `behavior Greet { fn greet(&self) }`, `struct Person {}`, `impl Greet for Person { fn
    /// greet(&self) {} }`, and `fn main() -> i32 { let p: Person = Person {}; let g: dyn Greet =
    /// p as dyn Greet; g.greet(); 0 }`
    fn build_program() -> Program {
        let greet_required = FuncDecl {
            name: "greet".to_string(),
            receiver: Some(receiver()),
            type_params: vec![],
            where_clause: vec![],
            params: vec![],
            return_type: None,
            is_async: false,
            body: None,
            decorators: vec![],
            span: span(),
        };
        let greet_behavior = BehaviorDecl {
            name: "Greet".to_string(),
            type_params: vec![],
            super_behaviors: vec![],
            methods: vec![greet_required],
            span: span(),
        };

        let person_struct = StructDecl { name: "Person".to_string(), type_params: vec![], fields: vec![], span: span() };

        let greet_impl_method = FuncDecl {
            name: "greet".to_string(),
            receiver: Some(receiver()),
            type_params: vec![],
            where_clause: vec![],
            params: vec![],
            return_type: None,
            is_async: false,
            body: Some(Block { statements: vec![], trailing_expr: None }),
            decorators: vec![],
            span: span(),
        };
        let greet_impl = ImplDecl {
            self_type: Type::named("Person"),
            behavior: Some(("Greet".to_string(), vec![])),
            type_params: vec![],
            assoc_type_bindings: vec![],
            assoc_consts: vec![],
            methods: vec![greet_impl_method],
            span: span(),
        };

        let person_literal = Expr::StructLiteral { name: "Person".to_string(), type_args: vec![], fields: vec![], span: span() };
        let dyn_greet_ty = Type::Dyn { behavior: "Greet".to_string(), args: vec![] };
        let coerce_to_dyn = Expr::Cast { expr: Box::new(Expr::Ident("p".to_string(), span())), target: dyn_greet_ty.clone(), span: span() };

        let main = FuncDecl {
            name: "main".to_string(),
            receiver: None,
            type_params: vec![],
            where_clause: vec![],
            params: vec![],
            return_type: Some(Type::Prim(PrimKind::I32)),
            is_async: false,
            body: Some(Block {
                statements: vec![
                    Stmt::Let { is_mut: false, name: "p".to_string(), ty: Type::named("Person"), value: person_literal, span: span() },
                    Stmt::Let { is_mut: false, name: "g".to_string(), ty: dyn_greet_ty, value: coerce_to_dyn, span: span() },
                    Stmt::Expr(Expr::MethodCall {
                        receiver: Box::new(Expr::Ident("g".to_string(), span())),
                        method: "greet".to_string(),
                        type_args: vec![],
                        args: vec![],
                        is_mut_call: false,
                        span: span(),
                    }),
                ],
                trailing_expr: Some(Box::new(Expr::IntLiteral { value: 0, suffix: Some(PrimKind::I32), span: span() })),
            }),
            decorators: vec![],
            span: span(),
        };

        Program { items: vec![Decl::Behavior(greet_behavior), Decl::Struct(person_struct), Decl::Impl(greet_impl), Decl::Func(main)] }
    }

    #[test]
    fn cast_to_dyn_behavior_builds_vtable_and_dispatches_indirectly() {
        let program = build_program();
        let mut env = TypeEnv::new();
        let mut checker = TypeChecker::new(&mut env);
        let checked = checker.check_program(&program).expect("checker should not error internally");
        assert!(!checker.diagnostics().has_errors(), "unexpected checker errors: {:?}", checker.diagnostics().diagnostics());

        let context = Context::create();
        let mut irgen = IrGen::new(&context, "dyn_greet", env, CodegenOptions::default());
        let ir = irgen.compile(&checked).expect("codegen should succeed");

        assert!(ir.contains("vtable.Person.Greet"), "expected a vtable global for Person's Greet impl:\n{ir}");
        assert!(ir.contains("dyn.call"), "expected an indirect call through the vtable slot:\n{ir}");
        assert!(!ir.contains("call void @tml_Person__greet") && !ir.contains("call void @tml_Person::greet"), "dispatch should go through the vtable, not a direct call:\n{ir}");
    }
}
