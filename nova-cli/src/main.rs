use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inkwell::context::Context as LlvmContext;

use nova_compiler::checker::TypeChecker;
use nova_compiler::codegen::{CodegenOptions, IrGen};
use nova_compiler::type_env::TypeEnv;

#[derive(Parser)]
#[command(name = "novac")]
#[command(version = "0.1.0")]
#[command(about = "Nova semantic analysis and LLVM IR generation core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check and lower a serde-encoded AST (serde_json Program) to LLVM IR.
    Compile {
        /// Path to a JSON-encoded `nova_ast::Program` (the lexer/parser's output).
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output `.ll` path; defaults to the input's file stem with a `.ll` extension.
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Emit DWARF debug info.
        #[arg(long)]
        emit_debug_info: bool,

        /// Debug info detail level (0 = line tables only, >0 = full).
        #[arg(long, default_value = "0")]
        debug_level: u8,

        /// Instrument emitted code with coverage-recording hooks.
        #[arg(long)]
        coverage: bool,

        /// Path the coverage hooks flush their report to.
        #[arg(long, value_name = "PATH")]
        coverage_output: Option<String>,

        /// Export public functions with DLL visibility.
        #[arg(long)]
        dll_export: bool,

        /// Emit a DLL entry point (`DllMain`-equivalent) instead of `main`.
        #[arg(long)]
        generate_dll_entry: bool,

        /// Emit a `tml_fuzz_target` entry point when an `@fuzz` function is present.
        #[arg(long)]
        generate_fuzz_entry: bool,

        /// Treat the input as a `@test`/`@bench` suite even without a `main` function.
        #[arg(long)]
        suite: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            emit_debug_info,
            debug_level,
            coverage,
            coverage_output,
            dll_export,
            generate_dll_entry,
            generate_fuzz_entry,
            suite,
        } => compile(
            &input,
            output,
            CodegenOptions {
                emit_debug_info,
                debug_level,
                coverage,
                coverage_output,
                dll_export,
                generate_dll_entry,
                generate_fuzz_entry,
                suite,
            },
        ),
    }
}

fn compile(input: &PathBuf, output: Option<PathBuf>, options: CodegenOptions) -> Result<()> {
    let filename = input.file_stem().and_then(|n| n.to_str()).unwrap_or("program");
    log::info!("compiling {:?}", input);

    let source = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let program: nova_ast::Program =
        serde_json::from_str(&source).with_context(|| format!("parsing AST from {}", input.display()))?;

    println!("checking {}...", filename);
    let mut env = TypeEnv::new();
    let mut checker = TypeChecker::new(&mut env);
    let checked = checker.check_program(&program)?;
    let diagnostics = checker.into_diagnostics();

    if diagnostics.has_diagnostics() {
        diagnostics.print_all(&source);
    }
    if diagnostics.has_errors() {
        anyhow::bail!("{} error(s) found, aborting", diagnostics.error_count());
    }
    println!("   check passed");

    let llvm_context = LlvmContext::create();
    let mut irgen = IrGen::new(&llvm_context, filename, env, options);
    let ir = irgen.compile(&checked)?;
    let codegen_diagnostics = irgen.into_diagnostics();
    if codegen_diagnostics.has_diagnostics() {
        codegen_diagnostics.print_all(&source);
    }
    if codegen_diagnostics.has_errors() {
        anyhow::bail!("{} codegen error(s) found, aborting", codegen_diagnostics.error_count());
    }

    let output_path = output.unwrap_or_else(|| PathBuf::from(format!("{}.ll", filename)));
    std::fs::write(&output_path, ir).with_context(|| format!("writing {}", output_path.display()))?;
    println!("   wrote {}", output_path.display());

    Ok(())
}
