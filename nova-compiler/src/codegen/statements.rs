//! Statement lowering (§4.4). One rule ties every branch together: whichever scope depth a
//! `return`/`break`/`continue` unwinds through, every drop owed by an open scope above that
//! point fires before control actually leaves it — see `drop::emit_drops_for_unwind`.
use inkwell::types::BasicType;
use nova_ast::Stmt;

use super::IrGen;

impl<'ctx> IrGen<'ctx> {
    pub(crate) fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), String> {
        match stmt {
            Stmt::Let { is_mut, name, ty, value, .. } => {
                let _ = is_mut;
                let declared = self.env.resolve(ty).ok();
                let final_ty = declared.unwrap_or_else(|| self.expr_type(value));
                let llvm_ty = self.ty_to_llvm(&final_ty);
                let alloca = self.builder.build_alloca(llvm_ty, name).map_err(|e| format!("failed to allocate `{name}`: {e}"))?;
                let value = self.compile_expr(value, Some(&final_ty))?;
                self.builder.build_store(alloca, value).map_err(|e| format!("failed to store into `{name}`: {e}"))?;
                self.variables.insert(name.clone(), (alloca, final_ty.clone()));
                self.track_for_drop(name, &final_ty);
                Ok(())
            }
            Stmt::Assign { target, value, .. } => {
                let target_ty = self.expr_type(target);
                let ptr = self.compile_expr_as_ptr(target, &target_ty)?;
                let value = self.compile_expr(value, Some(&target_ty))?;
                self.builder.build_store(ptr, value).map_err(|e| format!("failed to store assignment: {e}"))?;
                Ok(())
            }
            Stmt::Return(value, _) => {
                self.emit_drops_for_unwind(0)?;
                // Inside an `async` body `return expr` still means "resolve the Poll[T]",
                // so the compiled value gets the same `Poll::Ready` wrap as the trailing
                // expression does at the bottom of `compile_function_body`.
                if let Some(inner_ty) = self.current_async_inner_ty.clone() {
                    let v = match value {
                        Some(e) => self.compile_expr(e, Some(&inner_ty))?,
                        None => self.ty_to_llvm(&inner_ty).const_zero(),
                    };
                    let wrapped = self.wrap_poll_ready(&inner_ty, v)?;
                    self.builder.build_return(Some(&wrapped)).map_err(|e| format!("{e}"))?;
                    return Ok(());
                }
                match value {
                    Some(e) => {
                        let ret_ty = self.current_return_type.clone();
                        let v = self.compile_expr(e, ret_ty.as_ref())?;
                        if ret_ty.as_ref().map(|t| t.is_unit() || t.is_never()).unwrap_or(true) {
                            self.builder.build_return(None).map_err(|e| format!("{e}"))?;
                        } else {
                            self.builder.build_return(Some(&v)).map_err(|e| format!("{e}"))?;
                        }
                    }
                    None => {
                        self.builder.build_return(None).map_err(|e| format!("{e}"))?;
                    }
                }
                Ok(())
            }
            Stmt::Break(value, _) => {
                let (_, after, depth) = *self.loop_stack.last().ok_or("`break` outside a loop")?;
                self.emit_drops_for_unwind(depth)?;
                if let Some(e) = value {
                    let _ = self.compile_expr(e, None)?;
                }
                self.builder.build_unconditional_branch(after).map_err(|e| format!("{e}"))?;
                Ok(())
            }
            Stmt::Continue(_) => {
                let (cond, _, depth) = *self.loop_stack.last().ok_or("`continue` outside a loop")?;
                self.emit_drops_for_unwind(depth)?;
                self.builder.build_unconditional_branch(cond).map_err(|e| format!("{e}"))?;
                Ok(())
            }
            Stmt::Expr(e) => {
                let _ = self.compile_expr(e, None)?;
                Ok(())
            }
        }
    }
}
