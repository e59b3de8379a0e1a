//! LLVM-call guards and checked host-arithmetic helpers, shared by every codegen submodule.
pub mod llvm_safety;
pub mod safe_arithmetic;
