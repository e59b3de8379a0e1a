//! Arena allocation for top-level AST nodes.
//!
//! A parser assembling a large module benefits from allocating declarations and their bodies
//! out of a handful of arenas rather than many small heap allocations. `Expr`/`Stmt`/`Type` stay
//! owned (`Box`-recursive) once built; the arenas here exist for the bulk, append-only allocation
//! pattern a parser drives while it is still producing nodes.
use typed_arena::Arena;

use crate::{Block, Decl, Expr, Stmt, Type};

pub struct AstArena {
    pub decls: Arena<Decl>,
    pub exprs: Arena<Expr>,
    pub stmts: Arena<Stmt>,
    pub types: Arena<Type>,
    pub blocks: Arena<Block>,
}

impl AstArena {
    pub fn new() -> Self {
        Self {
            decls: Arena::new(),
            exprs: Arena::new(),
            stmts: Arena::new(),
            types: Arena::new(),
            blocks: Arena::new(),
        }
    }

    pub fn alloc_decl(&self, decl: Decl) -> &Decl {
        self.decls.alloc(decl)
    }

    pub fn alloc_expr(&self, expr: Expr) -> &Expr {
        self.exprs.alloc(expr)
    }

    pub fn alloc_stmt(&self, stmt: Stmt) -> &Stmt {
        self.stmts.alloc(stmt)
    }

    pub fn alloc_type(&self, ty: Type) -> &Type {
        self.types.alloc(ty)
    }

    pub fn alloc_block(&self, block: Block) -> &Block {
        self.blocks.alloc(block)
    }
}

impl Default for AstArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConstDecl, PrimKind, Span};

    #[test]
    fn allocated_decl_is_addressable() {
        let arena = AstArena::new();
        let decl = arena.alloc_decl(Decl::Const(ConstDecl {
            name: "X".to_string(),
            ty: Some(Type::Prim(PrimKind::I32)),
            value: Expr::IntLiteral {
                value: 1,
                suffix: None,
                span: Span::unknown(),
            },
            span: Span::unknown(),
        }));
        assert!(matches!(decl, Decl::Const(_)));
    }
}
