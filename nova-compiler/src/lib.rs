pub mod checker; // Three-pass type checker: declarations, signatures, bodies
pub mod codegen; // LLVM IR generation: types, functions, vtables, drop, entry point
pub mod mono; // Monomorphization engine: four worklists, mangling
pub mod type_env; // Type environment: scopes, module registry, resolution
pub mod type_system; // Semantic Ty/TypePtr representation and interning
pub mod utils; // Safe arithmetic and LLVM-call guards

pub use nova_diagnostics as diagnostics;

pub use checker::TypeChecker;
pub use codegen::IrGen;
pub use diagnostics::{error_codes, Diagnostic, DiagnosticEngine, ErrorLevel, Span};
pub use mono::{MangleKey, MonoEngine};
pub use type_env::TypeEnv;
pub use type_system::{Ty, TypeInterner, TypePtr};
pub use utils::llvm_safety::{
    emit_bounds_check, is_pointer_provably_nonnull, validate_stack_allocation_size,
    MAX_STACK_ALLOC_SIZE,
};
pub use utils::safe_arithmetic::{
    safe_array_size, safe_field_index, safe_param_index, CheckedArithmetic, SafeCast,
};

/// Runs the checker, drains monomorphization to a fixed point, and lowers to LLVM IR text.
/// This is the single entry point the CLI driver calls.
pub fn compile_program(
    program: &nova_ast::Program,
    options: codegen::CodegenOptions,
) -> anyhow::Result<CompileOutput> {
    let mut env = TypeEnv::new();
    let mut checker = TypeChecker::new(&mut env);
    let checked = checker.check_program(program)?;
    if checker.diagnostics().has_errors() {
        return Ok(CompileOutput {
            ir: None,
            diagnostics: checker.into_diagnostics(),
        });
    }

    let context = inkwell::context::Context::create();
    let mut irgen = IrGen::new(&context, "nova_module", env, options);
    let ir = irgen.compile(&checked)?;
    let diagnostics = irgen.into_diagnostics();

    if diagnostics.has_errors() {
        return Ok(CompileOutput { ir: None, diagnostics });
    }
    Ok(CompileOutput { ir: Some(ir), diagnostics })
}

pub struct CompileOutput {
    pub ir: Option<String>,
    pub diagnostics: DiagnosticEngine,
}
