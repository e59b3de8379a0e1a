// Phase 5: Adjacent String Literal Folding - Unit Tests
// A chain of adjacent string literals joined by `+` folds into one constant at compile time;
// no runtime concatenation call should be emitted for an all-literal chain.

use inkwell::context::Context;
use nova_ast::*;
use nova_compiler::checker::TypeChecker;
use nova_compiler::codegen::{CodegenOptions, IrGen};
use nova_compiler::type_env::TypeEnv;

#[cfg(test)]
mod phase5_string_concat_folding_tests {
    use super::*;

    fn span() -> Span {
        Span::unknown()
    }

    fn str_lit(s: &str) -> Expr {
        Expr::StringLiteral(s.to_string(), span())
    }

    fn add(left: Expr, right: Expr) -> Expr {
        Expr::Binary { op: BinaryOp::Add, left: Box::new(left), right: Box::new(right), span: span() }
    }

    /// `fn greeting() -> str { "Hello" + " " + "World" }`, a left-leaning all-literal chain.
    fn build_program() -> Program {
        let chain = add(add(str_lit("Hello"), str_lit(" ")), str_lit("World"));
        let greeting = FuncDecl {
            name: "greeting".to_string(),
            receiver: None,
            type_params: vec![],
            where_clause: vec![],
            params: vec![],
            return_type: Some(Type::Prim(PrimKind::Str)),
            is_async: false,
            body: Some(Block { statements: vec![], trailing_expr: Some(Box::new(chain)) }),
            decorators: vec![],
            span: span(),
        };

        Program { items: vec![Decl::Func(greeting)] }
    }

    #[test]
    fn all_literal_chain_folds_without_any_runtime_concat_call() {
        let program = build_program();
        let mut env = TypeEnv::new();
        let mut checker = TypeChecker::new(&mut env);
        let checked = checker.check_program(&program).expect("checker should not error internally");
        assert!(!checker.diagnostics().has_errors(), "unexpected checker errors: {:?}", checker.diagnostics().diagnostics());

        let context = Context::create();
        let mut irgen = IrGen::new(&context, "greeting", env, CodegenOptions::default());
        let ir = irgen.compile(&checked).expect("codegen should succeed");

        assert!(ir.contains("Hello World"), "expected the folded literal in a global constant:\n{ir}");
        assert!(!ir.contains("str_concat"), "an all-literal chain should never call str_concat:\n{ir}");
    }
}
