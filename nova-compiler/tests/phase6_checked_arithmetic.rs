// Phase 6: Checked Arithmetic Intrinsics - Unit Tests
// `checked_add`/etc. lower to an LLVM overflow intrinsic and wrap the result as `Maybe[T]`,
// the same tagged-union layout every other enum gets.

use inkwell::context::Context;
use nova_ast::*;
use nova_compiler::checker::TypeChecker;
use nova_compiler::codegen::{CodegenOptions, IrGen};
use nova_compiler::type_env::TypeEnv;

#[cfg(test)]
mod phase6_checked_arithmetic_tests {
    use super::*;

    fn span() -> Span {
        Span::unknown()
    }

    /// `fn add_checked(a: i32, b: i32) -> Maybe[i32] { checked_add(a, b) }`
    fn build_program() -> Program {
        let call = Expr::Call {
            callee: Box::new(Expr::Ident("checked_add".to_string(), span())),
            type_args: vec![],
            args: vec![Expr::Ident("a".to_string(), span()), Expr::Ident("b".to_string(), span())],
            span: span(),
        };

        let add_checked = FuncDecl {
            name: "add_checked".to_string(),
            receiver: None,
            type_params: vec![],
            where_clause: vec![],
            params: vec![
                Param { name: "a".to_string(), ty: Type::Prim(PrimKind::I32), span: span() },
                Param { name: "b".to_string(), ty: Type::Prim(PrimKind::I32), span: span() },
            ],
            return_type: Some(Type::generic("Maybe", vec![Type::Prim(PrimKind::I32)])),
            is_async: false,
            body: Some(Block { statements: vec![], trailing_expr: Some(Box::new(call)) }),
            decorators: vec![],
            span: span(),
        };

        Program { items: vec![Decl::Func(add_checked)] }
    }

    #[test]
    fn checked_add_type_checks_as_maybe_and_lowers_to_overflow_intrinsic() {
        let program = build_program();
        let mut env = TypeEnv::new();
        let mut checker = TypeChecker::new(&mut env);
        let checked = checker.check_program(&program).expect("checker should not error internally");
        assert!(!checker.diagnostics().has_errors(), "unexpected checker errors: {:?}", checker.diagnostics().diagnostics());

        let context = Context::create();
        let mut irgen = IrGen::new(&context, "add_checked", env, CodegenOptions::default());
        let ir = irgen.compile(&checked).expect("codegen should succeed");

        assert!(ir.contains("llvm.sadd.with.overflow.i32"), "expected the overflow-checked add intrinsic:\n{ir}");
        assert!(ir.contains("tml_add_checked"), "missing the compiled function:\n{ir}");
    }
}
