// Phase 4: Automatic Drop on Early Return - Unit Tests
// A function-scope value implementing Drop must be destructed on every exit path, not just
// the one that falls off the bottom of the block.

use inkwell::context::Context;
use nova_ast::*;
use nova_compiler::checker::TypeChecker;
use nova_compiler::codegen::{CodegenOptions, IrGen};
use nova_compiler::type_env::TypeEnv;

#[cfg(test)]
mod phase4_drop_on_early_return_tests {
    use super::*;

    fn span() -> Span {
        Span::unknown()
    }

    /// `struct Guard { id: i32 }`, `impl Drop for Guard { fn drop(&self) {} }`,
    /// `fn some_cond() -> bool { true }`, and
    /// `fn main() -> i32 { let g: Guard = Guard { id: 1 }; if some_cond() { return 1 } return 0 }`
    fn build_program() -> Program {
        let guard_struct = StructDecl {
            name: "Guard".to_string(),
            type_params: vec![],
            fields: vec![FieldDecl { name: "id".to_string(), ty: Type::Prim(PrimKind::I32), visibility: Visibility::Private, span: span() }],
            span: span(),
        };

        let drop_method = FuncDecl {
            name: "drop".to_string(),
            receiver: Some(Receiver { is_mut: false, by_ref: true, span: span() }),
            type_params: vec![],
            where_clause: vec![],
            params: vec![],
            return_type: None,
            is_async: false,
            body: Some(Block { statements: vec![], trailing_expr: None }),
            decorators: vec![],
            span: span(),
        };

        let drop_impl = ImplDecl {
            self_type: Type::named("Guard"),
            behavior: Some(("Drop".to_string(), vec![])),
            type_params: vec![],
            assoc_type_bindings: vec![],
            assoc_consts: vec![],
            methods: vec![drop_method],
            span: span(),
        };

        let some_cond = FuncDecl {
            name: "some_cond".to_string(),
            receiver: None,
            type_params: vec![],
            where_clause: vec![],
            params: vec![],
            return_type: Some(Type::Prim(PrimKind::Bool)),
            is_async: false,
            body: Some(Block { statements: vec![], trailing_expr: Some(Box::new(Expr::BoolLiteral(true, span()))) }),
            decorators: vec![],
            span: span(),
        };

        let guard_literal = Expr::StructLiteral {
            name: "Guard".to_string(),
            type_args: vec![],
            fields: vec![("id".to_string(), Expr::IntLiteral { value: 1, suffix: Some(PrimKind::I32), span: span() })],
            span: span(),
        };

        let early_return_if = Expr::If {
            cond: Box::new(Expr::Call { callee: Box::new(Expr::Ident("some_cond".to_string(), span())), type_args: vec![], args: vec![], span: span() }),
            then_block: Block {
                statements: vec![Stmt::Return(Some(Expr::IntLiteral { value: 1, suffix: Some(PrimKind::I32), span: span() }), span())],
                trailing_expr: None,
            },
            elif_branches: vec![],
            else_block: None,
            span: span(),
        };

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
                    Stmt::Let { is_mut: false, name: "g".to_string(), ty: Type::named("Guard"), value: guard_literal, span: span() },
                    Stmt::Expr(early_return_if),
                    Stmt::Return(Some(Expr::IntLiteral { value: 0, suffix: Some(PrimKind::I32), span: span() }), span()),
                ],
                trailing_expr: None,
            }),
            decorators: vec![],
            span: span(),
        };

        Program { items: vec![Decl::Struct(guard_struct), Decl::Impl(drop_impl), Decl::Func(some_cond), Decl::Func(main)] }
    }

    #[test]
    fn guard_drops_on_both_the_early_and_the_fallthrough_return() {
        let program = build_program();
        let mut env = TypeEnv::new();
        let mut checker = TypeChecker::new(&mut env);
        let checked = checker.check_program(&program).expect("checker should not error internally");
        assert!(!checker.diagnostics().has_errors(), "unexpected checker errors: {:?}", checker.diagnostics().diagnostics());

        let context = Context::create();
        let mut irgen = IrGen::new(&context, "guard_drop", env, CodegenOptions::default());
        let ir = irgen.compile(&checked).expect("codegen should succeed");

        let drop_calls = ir.matches("tml_Guard_drop").count();
        assert!(drop_calls >= 3, "expected the drop-fn definition plus a call at each return site:\n{ir}");
        let call_sites = ir.matches("call void @tml_Guard_drop").count();
        assert_eq!(call_sites, 2, "expected exactly one drop per return path (early return, fallthrough return):\n{ir}");
    }
}
