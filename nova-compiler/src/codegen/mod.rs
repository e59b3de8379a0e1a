//! LLVM IR generator (§4.4): lowers a checked, monomorphization-seeded module to a single
//! textual IR module via `inkwell`. Owns its own `DiagnosticEngine`, separate from the
//! checker's — the checker and the generator each accumulate errors independently (§4.5).
mod drop;
mod enums;
mod expressions;
mod generics;
mod intrinsics;
mod metadata;
mod program;
pub mod registry;
mod statements;
mod string_concat;
mod structs;
mod traits_vtable;

use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType, StructType};
use inkwell::values::{FunctionValue, PointerValue};
use inkwell::AddressSpace;

use nova_ast::PrimKind;
use nova_diagnostics::DiagnosticEngine;

use crate::checker::CheckedProgram;
use crate::mono::{mangle, MonoEngine};
use crate::type_env::TypeEnv;
use crate::type_system::{Ty, TypePtr};

use registry::RuntimeRegistry;

/// CLI-exposed knobs (§6's `nova-cli compile` surface).
#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    pub emit_debug_info: bool,
    pub debug_level: u8,
    pub coverage: bool,
    pub coverage_output: Option<String>,
    pub dll_export: bool,
    pub generate_dll_entry: bool,
    pub generate_fuzz_entry: bool,
    pub suite: bool,
}

/// One function scope's live locals and its drop-list, mirroring `TypeEnv::Scope` but keyed
/// to an LLVM alloca instead of a semantic-only binding.
#[derive(Default)]
pub(crate) struct CodegenScope {
    pub drop_list: Vec<(String, TypePtr)>,
}

pub struct IrGen<'ctx> {
    pub(crate) context: &'ctx Context,
    pub(crate) module: Module<'ctx>,
    pub(crate) builder: Builder<'ctx>,
    pub(crate) env: TypeEnv,
    pub(crate) options: CodegenOptions,
    pub(crate) mono: MonoEngine,
    pub(crate) diagnostics: DiagnosticEngine,
    pub(crate) runtime: RuntimeRegistry<'ctx>,

    // Symbol tables, flat like the teacher's: inner scopes shadow by overwriting rather than
    // by a real scope stack, since only `CodegenScope::drop_list` needs true nesting.
    pub(crate) variables: HashMap<String, (PointerValue<'ctx>, TypePtr)>,
    pub(crate) functions: HashMap<String, FunctionValue<'ctx>>,
    pub(crate) struct_types: HashMap<String, StructType<'ctx>>,
    pub(crate) struct_fields: HashMap<String, Vec<(String, TypePtr)>>,
    pub(crate) enum_types: HashMap<String, StructType<'ctx>>,
    pub(crate) enum_variants: HashMap<String, Vec<(String, Vec<TypePtr>)>>,
    pub(crate) globals: HashMap<String, PointerValue<'ctx>>,
    pub(crate) string_literals: HashMap<String, PointerValue<'ctx>>,
    pub(crate) vtables: HashMap<(String, String), inkwell::values::GlobalValue<'ctx>>,
    pub(crate) dyn_types: HashMap<String, StructType<'ctx>>,
    pub(crate) drop_fns: HashMap<String, FunctionValue<'ctx>>,

    pub(crate) current_function: Option<FunctionValue<'ctx>>,
    pub(crate) current_return_type: Option<TypePtr>,
    // `Some(inner)` while compiling an `async` function body: `inner` is the type the function
    // declares as returning *before* the `Poll[T]` wrap, so `return`/trailing-expr sites know
    // what to pass to `wrap_poll_ready` instead of the already-wrapped `current_return_type`.
    pub(crate) current_async_inner_ty: Option<TypePtr>,
    pub(crate) scope_stack: Vec<CodegenScope>,
    // (continue-target block, break-target block, scope_stack depth at loop entry) — the
    // depth lets break/continue know how many open scopes to drop through without popping.
    pub(crate) loop_stack: Vec<(inkwell::basic_block::BasicBlock<'ctx>, inkwell::basic_block::BasicBlock<'ctx>, usize)>,
    pub(crate) fresh_counter: u32,

    pub(crate) debug_builder: Option<metadata::DebugContext<'ctx>>,
}

impl<'ctx> IrGen<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str, env: TypeEnv, options: CodegenOptions) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        let debug_builder = if options.emit_debug_info {
            Some(metadata::DebugContext::new(&module, module_name, options.debug_level))
        } else {
            None
        };

        Self {
            context,
            module,
            builder,
            env,
            options,
            mono: MonoEngine::new(),
            diagnostics: DiagnosticEngine::new(),
            runtime: RuntimeRegistry::new(),
            variables: HashMap::new(),
            functions: HashMap::new(),
            struct_types: HashMap::new(),
            struct_fields: HashMap::new(),
            enum_types: HashMap::new(),
            enum_variants: HashMap::new(),
            globals: HashMap::new(),
            string_literals: HashMap::new(),
            vtables: HashMap::new(),
            dyn_types: HashMap::new(),
            drop_fns: HashMap::new(),
            current_function: None,
            current_return_type: None,
            current_async_inner_ty: None,
            scope_stack: Vec::new(),
            loop_stack: Vec::new(),
            fresh_counter: 0,
            debug_builder,
        }
    }

    /// Entry point the CLI driver (via `nova_compiler::compile_program`) calls after the
    /// checker reports no errors.
    pub fn compile(&mut self, checked: &CheckedProgram) -> anyhow::Result<String> {
        for key in &checked.pending_instantiations {
            self.mono.request(key.clone());
        }

        program::compile_program(self, &checked.program).map_err(|e| anyhow::anyhow!(e))?;

        if let Some(dbg) = &self.debug_builder {
            dbg.finalize();
        }

        Ok(self.module.print_to_string().to_string())
    }

    pub fn into_diagnostics(self) -> DiagnosticEngine {
        self.diagnostics
    }

    pub(crate) fn fresh_name(&mut self, prefix: &str) -> String {
        self.fresh_counter += 1;
        format!("{}.{}", prefix, self.fresh_counter)
    }

    // ---- type mapping ------------------------------------------------------------

    pub(crate) fn ptr_type(&self) -> inkwell::types::PointerType<'ctx> {
        self.context.ptr_type(AddressSpace::default())
    }

    /// Empty struct used as the LLVM representation of `Unit`/`Never` values (not return
    /// positions, which use `void` — see `fn_type_for`).
    fn unit_llvm_type(&self) -> StructType<'ctx> {
        self.context.struct_type(&[], false)
    }

    pub(crate) fn int_llvm_type(&self, kind: PrimKind) -> inkwell::types::IntType<'ctx> {
        match kind {
            PrimKind::I8 | PrimKind::U8 => self.context.i8_type(),
            PrimKind::I16 | PrimKind::U16 => self.context.i16_type(),
            PrimKind::I32 | PrimKind::U32 => self.context.i32_type(),
            PrimKind::I64 | PrimKind::U64 => self.context.i64_type(),
            PrimKind::I128 | PrimKind::U128 => self.context.i128_type(),
            PrimKind::Char => self.context.i32_type(),
            PrimKind::Bool => self.context.bool_type(),
            _ => self.context.i64_type(),
        }
    }

    /// Maps a semantic type to its LLVM representation. Generic struct/enum instances are
    /// built on first reference (eager, depth-first layout; see `structs::ensure_struct_type`
    /// / `enums::ensure_enum_type`) rather than waiting on the `MonoEngine` pump, since a
    /// stack slot needs a concrete layout the moment it's declared.
    pub(crate) fn ty_to_llvm(&mut self, ty: &TypePtr) -> BasicTypeEnum<'ctx> {
        match ty.as_ref() {
            Ty::Primitive(PrimKind::Unit) | Ty::Primitive(PrimKind::Never) => self.unit_llvm_type().into(),
            Ty::Primitive(PrimKind::F32) => self.context.f32_type().into(),
            Ty::Primitive(PrimKind::F64) => self.context.f64_type().into(),
            Ty::Primitive(PrimKind::Str) => self.ptr_type().into(),
            Ty::Primitive(kind) => self.int_llvm_type(*kind).into(),
            Ty::Named { name, .. } | Ty::Class { name, .. } => {
                if self.env.lookup_enum(name).is_some() {
                    self.ensure_enum_type(ty).into()
                } else {
                    self.ensure_struct_type(ty).into()
                }
            }
            Ty::Ref { .. } | Ty::Ptr { .. } => self.ptr_type().into(),
            Ty::Array { element, len } => {
                let elem = self.ty_to_llvm(element);
                elem.array_type(*len as u32).into()
            }
            Ty::Slice { .. } => self.context.struct_type(&[self.ptr_type().into(), self.context.i64_type().into()], false).into(),
            Ty::Tuple(elems) => {
                let mapped: Vec<BasicTypeEnum> = elems.iter().map(|e| self.ty_to_llvm(e)).collect();
                self.context.struct_type(&mapped, false).into()
            }
            Ty::Func { .. } => self.ptr_type().into(),
            Ty::Closure { .. } => self.context.struct_type(&[self.ptr_type().into(), self.ptr_type().into()], false).into(),
            Ty::Generic(_) => self.ptr_type().into(),
            Ty::DynBehavior { .. } | Ty::ImplBehavior { .. } => {
                self.context.struct_type(&[self.ptr_type().into(), self.ptr_type().into()], false).into()
            }
        }
    }

    pub(crate) fn ty_to_metadata(&mut self, ty: &TypePtr) -> BasicMetadataTypeEnum<'ctx> {
        self.ty_to_llvm(ty).into()
    }

    /// `Unit`/`Never` returns map to LLVM `void`, unlike every other use of `ty_to_llvm`.
    pub(crate) fn fn_type_for(&mut self, params: &[BasicMetadataTypeEnum<'ctx>], ret: &TypePtr, is_variadic: bool) -> FunctionType<'ctx> {
        if ret.is_unit() || ret.is_never() {
            self.context.void_type().fn_type(params, is_variadic)
        } else {
            let ret_ty = self.ty_to_llvm(ret);
            ret_ty.fn_type(params, is_variadic)
        }
    }

    pub(crate) fn mangled_name_of(&self, ty: &TypePtr) -> String {
        match ty.as_ref() {
            Ty::Named { name, args, .. } | Ty::Class { name, args, .. } => mangle(name, args),
            _ => crate::mono::mangle_type(ty),
        }
    }
}
