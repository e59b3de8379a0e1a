//! Three-pass type checker (§4.2): declarations, then signatures + constants, then bodies.
//! Produces no separate annotated-AST type: expression typing is exposed as pure functions
//! over `TypeEnv` (see `expr::infer_expr`) that both this checker and `codegen` call, so a
//! lowering site can re-derive an expression's type exactly as the checker proved it without
//! duplicating the whole AST into a parallel typed tree.
pub mod bodies;
pub mod decls;
pub mod expr;
pub mod patterns;
pub mod signatures;

use nova_ast::Program;
use nova_diagnostics::DiagnosticEngine;

use crate::mono::MangleKey;
use crate::type_env::TypeEnv;

/// Tracks the handful of booleans §4.2 calls "state machines": whether we're inside an
/// async function body, and whether we're inside a `lowlevel` block.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckContext {
    pub in_async_func: bool,
    pub in_lowlevel: bool,
}

pub struct TypeChecker<'env> {
    pub env: &'env mut TypeEnv,
    pub diagnostics: DiagnosticEngine,
    /// Generic instantiations discovered while checking bodies (enum-constructor calls,
    /// generic struct literals, generic function/method calls). Merged into the
    /// `MonoEngine`'s worklists before codegen starts; codegen discovers the rest itself.
    pub pending_instantiations: Vec<MangleKey>,
}

impl<'env> TypeChecker<'env> {
    pub fn new(env: &'env mut TypeEnv) -> Self {
        Self { env, diagnostics: DiagnosticEngine::new(), pending_instantiations: Vec::new() }
    }

    /// Runs all three passes. A phase with errors short-circuits the remaining phases,
    /// matching §4.5 ("a nonempty collector causes failure of the whole compilation").
    pub fn check_program(&mut self, program: &Program) -> anyhow::Result<CheckedProgram> {
        decls::register_declarations(self.env, &mut self.diagnostics, program);
        if self.diagnostics.has_errors() {
            return Ok(CheckedProgram { program: program.clone(), pending_instantiations: Vec::new() });
        }

        signatures::register_signatures(self.env, &mut self.diagnostics, &mut self.pending_instantiations, program);
        if self.diagnostics.has_errors() {
            return Ok(CheckedProgram { program: program.clone(), pending_instantiations: Vec::new() });
        }

        bodies::check_bodies(self.env, &mut self.diagnostics, &mut self.pending_instantiations, program);
        Ok(CheckedProgram { program: program.clone(), pending_instantiations: self.pending_instantiations.clone() })
    }

    pub fn diagnostics(&self) -> &DiagnosticEngine {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> DiagnosticEngine {
        self.diagnostics
    }
}

/// The checked program. Codegen lowers straight from the original AST plus the now-fully
/// populated `TypeEnv`; see the module doc comment above for why there's no separate typed
/// tree here.
pub struct CheckedProgram {
    pub program: Program,
    /// Generic instantiations the checker already knows it needs; seeds `codegen`'s
    /// `MonoEngine` so codegen doesn't have to rediscover them from scratch.
    pub pending_instantiations: Vec<MangleKey>,
}
