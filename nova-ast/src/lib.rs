//! The AST vocabulary the external parser is contracted to produce.
//!
//! This crate owns no lexer or parser: per the core's external-interface contract, tokenizing and
//! parsing source text live outside the semantic core. What lives here is the shape a parser must
//! emit — `Program`, `Decl`, `Stmt`, `Expr`, `Pattern`, `Type` — and the `Span` every checked node
//! carries back to source text.

use serde::{Deserialize, Serialize};

pub mod arena;
pub mod span_map;

pub use span_map::SpanMap;

/// A location in source text: `(line, column)` pairs plus the originating file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: (u32, u32),
    pub end: (u32, u32),
    pub file_id: u32,
}

impl Span {
    pub const fn unknown() -> Self {
        Self {
            start: (0, 0),
            end: (0, 0),
            file_id: 0,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Root of the parsed module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Program {
    pub items: Vec<Decl>,
}

/// Visibility modifier on a field, method, or top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// Top-level declarations. One `Decl` per parser-level item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decl {
    Func(FuncDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Class(ClassDecl),
    Behavior(BehaviorDecl),
    Impl(ImplDecl),
    TypeAlias(TypeAliasDecl),
    Const(ConstDecl),
    Use(UseDecl),
}

/// Generic type parameter with its behavior bounds: `T`, `T: Display`, `T: Display + Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<String>,
}

/// `where T: Display, U: Clone + Debug`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WherePredicate {
    pub type_param: String,
    pub bounds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

/// `self` / `self: &mut Self` receiver on a method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    pub is_mut: bool,
    pub by_ref: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decorator {
    Test,
    ShouldPanic { expected: Option<String> },
    Bench { iterations: u64 },
    Fuzz,
    Pool { thread_local: bool },
    Extern { abi: String, name: Option<String> },
    Link { library: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Receiver>,
    pub type_params: Vec<TypeParam>,
    pub where_clause: Vec<WherePredicate>,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub is_async: bool,
    /// `None` for a behavior method with no default body (required method).
    pub body: Option<Block>,
    pub decorators: Vec<Decorator>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
    pub visibility: Visibility,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

/// Zero payload types makes this a unit variant; one or more makes it a tuple variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub payload: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub variants: Vec<EnumVariant>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassField {
    pub name: String,
    pub ty: Type,
    pub visibility: Visibility,
    pub is_static: bool,
    pub span: Span,
}

/// Single-inheritance class with virtual methods and optional static members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub base: Option<String>,
    pub is_abstract: bool,
    pub fields: Vec<ClassField>,
    pub methods: Vec<FuncDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub super_behaviors: Vec<String>,
    /// Method signatures; `body: Some(..)` methods are default-implemented.
    pub methods: Vec<FuncDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplDecl {
    pub self_type: Type,
    /// `Some((name, type_args))` for `impl Behavior for Type`; `None` for an inherent impl.
    pub behavior: Option<(String, Vec<Type>)>,
    pub type_params: Vec<TypeParam>,
    pub assoc_type_bindings: Vec<(String, Type)>,
    pub assoc_consts: Vec<ConstDecl>,
    pub methods: Vec<FuncDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAliasDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstDecl {
    pub name: String,
    pub ty: Option<Type>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseDecl {
    pub module_path: Vec<String>,
    /// `(imported_name, optional_alias)`; empty means a whole-module import.
    pub items: Vec<(String, Option<String>)>,
    pub span: Span,
}

/// Parser-level primitive kind, matching §3's primitive table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Bool,
    Char,
    Str,
    Unit,
    Never,
}

impl PrimKind {
    /// Inclusive representable range for integer kinds, as i128 so I128/U128 both fit.
    pub fn int_range(self) -> Option<(i128, i128)> {
        match self {
            PrimKind::I8 => Some((i8::MIN as i128, i8::MAX as i128)),
            PrimKind::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
            PrimKind::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
            PrimKind::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
            PrimKind::I128 => Some((i128::MIN, i128::MAX)),
            PrimKind::U8 => Some((0, u8::MAX as i128)),
            PrimKind::U16 => Some((0, u16::MAX as i128)),
            PrimKind::U32 => Some((0, u32::MAX as i128)),
            PrimKind::U64 => Some((0, u64::MAX as i128)),
            PrimKind::U128 => Some((0, u128::MAX as i128)), // saturates; U128::MAX does not fit i128
            _ => None,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimKind::I8 | PrimKind::I16 | PrimKind::I32 | PrimKind::I64 | PrimKind::I128
        )
    }

    pub fn is_integer(self) -> bool {
        self.int_range().is_some()
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimKind::F32 | PrimKind::F64)
    }
}

/// Parser-level type annotation. Resolved to a semantic `Ty` by the type environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Prim(PrimKind),
    /// `This` sugar, resolved to the enclosing impl's self type.
    This,
    Named {
        path: Vec<String>,
        name: String,
        args: Vec<Type>,
    },
    Ref(Box<Type>, bool),
    Ptr(Box<Type>, bool),
    Array(Box<Type>, u64),
    Slice(Box<Type>),
    Tuple(Vec<Type>),
    Func {
        params: Vec<Type>,
        return_type: Box<Type>,
        is_async: bool,
    },
    Dyn {
        behavior: String,
        args: Vec<Type>,
    },
    ImplBehavior {
        behavior: String,
        args: Vec<Type>,
    },
}

impl Type {
    pub fn named(name: impl Into<String>) -> Self {
        Type::Named {
            path: Vec::new(),
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<Type>) -> Self {
        Type::Named {
            path: Vec::new(),
            name: name.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub trailing_expr: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Let {
        is_mut: bool,
        name: String,
        ty: Type,
        value: Expr,
        span: Span,
    },
    Assign {
        target: Expr,
        value: Expr,
        span: Span,
    },
    Return(Option<Expr>, Span),
    Break(Option<Expr>, Span),
    Continue(Span),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard,
    Ident(String),
    Literal(Box<Expr>),
    Tuple(Vec<Pattern>),
    Struct {
        name: String,
        fields: Vec<(String, Pattern)>,
    },
    Enum {
        enum_name: Option<String>,
        variant: String,
        data: Vec<Pattern>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    Ref,
    RefMut,
    Deref,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    IntLiteral {
        value: i128,
        suffix: Option<PrimKind>,
        span: Span,
    },
    FloatLiteral {
        value: f64,
        suffix: Option<PrimKind>,
        span: Span,
    },
    StringLiteral(String, Span),
    BoolLiteral(bool, Span),
    CharLiteral(char, Span),
    Null(Span),
    Ident(String, Span),

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },

    Call {
        callee: Box<Expr>,
        type_args: Vec<Type>,
        args: Vec<Expr>,
        span: Span,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        type_args: Vec<Type>,
        args: Vec<Expr>,
        is_mut_call: bool,
        span: Span,
    },
    FieldAccess {
        object: Box<Expr>,
        field: String,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },

    ArrayLiteral(Vec<Expr>, Span),
    TupleLiteral(Vec<Expr>, Span),
    StructLiteral {
        name: String,
        type_args: Vec<Type>,
        fields: Vec<(String, Expr)>,
        span: Span,
    },
    EnumLiteral {
        enum_name: Option<String>,
        variant: String,
        args: Vec<Expr>,
        span: Span,
    },

    Reference {
        is_mut: bool,
        expr: Box<Expr>,
        span: Span,
    },
    Deref(Box<Expr>, Span),
    Await(Box<Expr>, Span),
    Cast {
        expr: Box<Expr>,
        target: Type,
        span: Span,
    },
    IsCheck {
        expr: Box<Expr>,
        target: Type,
        span: Span,
    },

    If {
        cond: Box<Expr>,
        then_block: Block,
        elif_branches: Vec<(Expr, Block)>,
        else_block: Option<Block>,
        span: Span,
    },
    IfLet {
        pattern: Pattern,
        value: Box<Expr>,
        then_block: Block,
        else_block: Option<Block>,
        span: Span,
    },
    When {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
        span: Span,
    },
    Loop {
        body: Block,
        span: Span,
    },
    While {
        cond: Box<Expr>,
        body: Block,
        span: Span,
    },
    For {
        var: String,
        iterable: Box<Expr>,
        body: Block,
        span: Span,
    },
    Block(Block, Span),

    Closure {
        params: Vec<Param>,
        return_type: Option<Type>,
        body: Box<Expr>,
        /// Empty at parse time; filled in by the checker's capture analysis.
        captures: Vec<(String, bool)>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLiteral { span, .. }
            | Expr::FloatLiteral { span, .. }
            | Expr::StringLiteral(_, span)
            | Expr::BoolLiteral(_, span)
            | Expr::CharLiteral(_, span)
            | Expr::Null(span)
            | Expr::Ident(_, span)
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::FieldAccess { span, .. }
            | Expr::Index { span, .. }
            | Expr::ArrayLiteral(_, span)
            | Expr::TupleLiteral(_, span)
            | Expr::StructLiteral { span, .. }
            | Expr::EnumLiteral { span, .. }
            | Expr::Reference { span, .. }
            | Expr::Deref(_, span)
            | Expr::Await(_, span)
            | Expr::Cast { span, .. }
            | Expr::IsCheck { span, .. }
            | Expr::If { span, .. }
            | Expr::IfLet { span, .. }
            | Expr::When { span, .. }
            | Expr::Loop { span, .. }
            | Expr::While { span, .. }
            | Expr::For { span, .. }
            | Expr::Block(_, span)
            | Expr::Closure { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_round_trip() {
        let program = Program {
            items: vec![Decl::Const(ConstDecl {
                name: "MAX".to_string(),
                ty: Some(Type::Prim(PrimKind::I32)),
                value: Expr::IntLiteral {
                    value: 42,
                    suffix: None,
                    span: Span::unknown(),
                },
                span: Span::unknown(),
            })],
        };

        let json = serde_json::to_string(&program).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(program, back);
    }

    #[test]
    fn int_range_rejects_out_of_bounds_host_value() {
        let (lo, hi) = PrimKind::I8.int_range().unwrap();
        assert_eq!((lo, hi), (-128, 127));
        assert!(!(200 >= lo && 200 <= hi));
    }
}
