//! DWARF debug info (`--debug`/`-g` per §6's CLI surface). Only emitted when
//! `CodegenOptions::emit_debug_info` is set; every other codegen path ignores
//! `debug_builder` entirely when it's `None`.
use inkwell::debug_info::{
    DICompileUnit, DWARFEmissionKind, DWARFSourceLanguage, DebugInfoBuilder,
};
use inkwell::module::Module;

pub(crate) struct DebugContext<'ctx> {
    builder: DebugInfoBuilder<'ctx>,
    compile_unit: DICompileUnit<'ctx>,
}

impl<'ctx> DebugContext<'ctx> {
    pub(crate) fn new(module: &Module<'ctx>, module_name: &str, debug_level: u8) -> Self {
        let emission = if debug_level == 0 { DWARFEmissionKind::LineTablesOnly } else { DWARFEmissionKind::Full };
        let (builder, compile_unit) = module.create_debug_info_builder(
            true,
            DWARFSourceLanguage::C,
            module_name,
            ".",
            "novac",
            false,
            "",
            0,
            "",
            emission,
            0,
            false,
            false,
        );
        Self { builder, compile_unit }
    }

    pub(crate) fn finalize(&self) {
        self.builder.finalize();
    }

    #[allow(dead_code)]
    pub(crate) fn compile_unit(&self) -> DICompileUnit<'ctx> {
        self.compile_unit
    }
}
