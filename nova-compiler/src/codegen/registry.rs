//! Runtime-library symbol declarations (§6 "Runtime library contract"). Every symbol the
//! generator calls into (`malloc`, `str_concat`, `tml_panic`, …) is declared `extern` on
//! first use and memoized so repeated requests don't redeclare it.
use inkwell::types::BasicMetadataTypeEnum;
use inkwell::values::FunctionValue;

use super::IrGen;

#[derive(Default)]
pub struct RuntimeRegistry<'ctx> {
    declared: std::collections::HashMap<&'static str, FunctionValue<'ctx>>,
}

impl<'ctx> RuntimeRegistry<'ctx> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'ctx> IrGen<'ctx> {
    /// Declares (or returns the cached declaration of) a runtime-library function by name.
    /// The symbol list matches §6: allocation, string, panic/test, and misc primitives.
    pub(crate) fn require_runtime_decl(&mut self, name: &'static str) -> FunctionValue<'ctx> {
        if let Some(existing) = self.runtime.declared.get(name) {
            return *existing;
        }
        let ptr_ty = self.ptr_type();
        let i64_ty = self.context.i64_type();
        let i32_ty = self.context.i32_type();
        let bool_ty = self.context.bool_type();
        let void_ty = self.context.void_type();

        let fn_val = match name {
            "malloc" => self.module.add_function("malloc", ptr_ty.fn_type(&[i64_ty.into()], false), None),
            "free" => self.module.add_function("free", void_ty.fn_type(&[ptr_ty.into()], false), None),
            "tml_str_free" => self.module.add_function("tml_str_free", void_ty.fn_type(&[ptr_ty.into()], false), None),
            "str_eq" => self.module.add_function("str_eq", bool_ty.fn_type(&[ptr_ty.into(), ptr_ty.into()], false), None),
            "str_concat" => self.module.add_function("str_concat", ptr_ty.fn_type(&[ptr_ty.into(), ptr_ty.into()], false), None),
            "strlen" => self.module.add_function("strlen", i64_ty.fn_type(&[ptr_ty.into()], false), None),
            "i64_to_str" => self.module.add_function("i64_to_str", ptr_ty.fn_type(&[i64_ty.into()], false), None),
            "f64_to_str" => {
                self.module.add_function("f64_to_str", ptr_ty.fn_type(&[self.context.f64_type().into()], false), None)
            }
            "tml_panic" => self.module.add_function("tml_panic", void_ty.fn_type(&[ptr_ty.into()], false), None),
            "tml_run_should_panic" => self.module.add_function(
                "tml_run_should_panic",
                bool_ty.fn_type(&[ptr_ty.into()], false),
                None,
            ),
            "tml_panic_message_contains" => self.module.add_function(
                "tml_panic_message_contains",
                bool_ty.fn_type(&[ptr_ty.into()], false),
                None,
            ),
            "tml_file_open" => self.module.add_function("tml_file_open", ptr_ty.fn_type(&[ptr_ty.into(), ptr_ty.into()], false), None),
            "tml_file_close" => self.module.add_function("tml_file_close", void_ty.fn_type(&[ptr_ty.into()], false), None),
            "tml_time_now_nanos" => self.module.add_function("tml_time_now_nanos", i64_ty.fn_type(&[], false), None),
            "tml_list_new" => self.module.add_function("tml_list_new", ptr_ty.fn_type(&[i64_ty.into()], false), None),
            "tml_list_push" => self.module.add_function("tml_list_push", void_ty.fn_type(&[ptr_ty.into(), ptr_ty.into()], false), None),
            "tml_hashmap_new" => self.module.add_function("tml_hashmap_new", ptr_ty.fn_type(&[], false), None),
            "tml_pool_acquire" => self.module.add_function("tml_pool_acquire", ptr_ty.fn_type(&[i64_ty.into()], false), None),
            "tml_pool_release" => self.module.add_function("tml_pool_release", void_ty.fn_type(&[ptr_ty.into()], false), None),
            "tml_coverage_record" => {
                self.module.add_function("tml_coverage_record", void_ty.fn_type(&[i32_ty.into(), i32_ty.into()], false), None)
            }
            "tml_coverage_flush" => self.module.add_function("tml_coverage_flush", void_ty.fn_type(&[ptr_ty.into()], false), None),
            "printf" => {
                self.module.add_function("printf", i32_ty.fn_type(&[ptr_ty.into()], true), None)
            }
            "memcpy" => self.module.add_function(
                "llvm.memcpy.p0.p0.i64",
                void_ty.fn_type(
                    &[ptr_ty.into(), ptr_ty.into(), i64_ty.into(), bool_ty.into()],
                    false,
                ),
                None,
            ),
            other => {
                // Unknown runtime symbol: declare a best-effort variadic i64-returning stub so
                // codegen can keep going; this path should never be hit for symbols in the
                // list above.
                self.module.add_function(other, i64_ty.fn_type(&[] as &[BasicMetadataTypeEnum], true), None)
            }
        };

        self.runtime.declared.insert(name, fn_val);
        fn_val
    }
}
