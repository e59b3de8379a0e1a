//! String `+` chains (§4.4 "String concatenation"). Adjacent string literals fold at compile
//! time; everything else walks a left-leaning `Add` chain and emits one `str_concat` runtime
//! call per pair, left to right, rather than re-concatenating a literal prefix on every call.
use inkwell::values::BasicValueEnum;

use nova_ast::{BinaryOp, Expr};

use super::IrGen;

impl<'ctx> IrGen<'ctx> {
    pub(crate) fn compile_string_concat_chain(&mut self, left: &Expr, right: &Expr) -> Result<BasicValueEnum<'ctx>, String> {
        let mut pieces = Vec::new();
        flatten_add_chain(left, &mut pieces);
        flatten_add_chain(right, &mut pieces);

        // Fold any run of adjacent string-literal pieces into one literal before emitting
        // runtime calls for the rest.
        let mut folded: Vec<Fragment> = Vec::new();
        for piece in pieces {
            match (folded.last_mut(), &piece) {
                (Some(Fragment::Literal(prev)), Fragment::Literal(s)) => prev.push_str(s),
                _ => folded.push(piece),
            }
        }

        if folded.is_empty() {
            return Ok(self.compile_string_literal("").into());
        }

        let mut acc = self.compile_fragment(&folded[0])?;
        for frag in &folded[1..] {
            let next = self.compile_fragment(frag)?;
            let concat_fn = self.require_runtime_decl("str_concat");
            let call = self
                .builder
                .build_call(concat_fn, &[acc.into(), next.into()], "strcat")
                .map_err(|e| format!("{e}"))?;
            acc = call.try_as_basic_value().left().ok_or("str_concat returned no value")?.into_pointer_value();
        }
        Ok(acc.into())
    }

    fn compile_fragment(&mut self, frag: &Fragment) -> Result<inkwell::values::PointerValue<'ctx>, String> {
        match frag {
            Fragment::Literal(s) => Ok(self.compile_string_literal(s)),
            Fragment::Expr(e) => Ok(self.compile_expr(e, None)?.into_pointer_value()),
        }
    }
}

enum Fragment<'a> {
    Literal(String),
    Expr(&'a Expr),
}

/// Walks a left-leaning chain of `Add` nodes (`((a + b) + c) + d`) into its leaves, in order.
fn flatten_add_chain<'a>(expr: &'a Expr, out: &mut Vec<Fragment<'a>>) {
    match expr {
        Expr::Binary { op: BinaryOp::Add, left, right, .. } => {
            flatten_add_chain(left, out);
            flatten_add_chain(right, out);
        }
        Expr::StringLiteral(s, _) => out.push(Fragment::Literal(s.clone())),
        other => out.push(Fragment::Expr(other)),
    }
}
