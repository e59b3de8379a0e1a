//! Central source of truth for every named declaration and every scope on the current
//! type-checking path: §4.1 of the core's design.
use std::collections::HashMap;

use nova_ast::{PrimKind, Span, Type as AstType};
use nova_diagnostics::fuzzy;

use crate::type_system::{Ty, TypeInterner, TypePtr};

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: TypePtr,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone)]
pub struct EnumVariantInfo {
    pub name: String,
    pub payload: Vec<TypePtr>,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub variants: Vec<EnumVariantInfo>,
}

impl EnumDef {
    pub fn variant(&self, name: &str) -> Option<&EnumVariantInfo> {
        self.variants.iter().find(|v| v.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct ClassFieldInfo {
    pub name: String,
    pub ty: TypePtr,
    pub is_public: bool,
    pub is_static: bool,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub fields: Vec<ClassFieldInfo>,
    pub base: Option<String>,
    pub is_abstract: bool,
    pub method_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BehaviorMethodSig {
    pub name: String,
    pub has_default_body: bool,
}

#[derive(Debug, Clone)]
pub struct BehaviorDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub super_behaviors: Vec<String>,
    pub methods: Vec<BehaviorMethodSig>,
}

#[derive(Debug, Clone)]
pub struct FuncSig {
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<TypePtr>,
    pub return_type: TypePtr,
    pub is_async: bool,
}

#[derive(Debug, Clone)]
pub struct ImplRecord {
    pub self_type_name: String,
    pub behavior: Option<String>,
    /// Method name -> mangled-free declared order; codegen needs the declared order to
    /// build vtables.
    pub methods: Vec<String>,
}

/// A module record as seen through the import table; mirrors the external parser/module
/// system's contract (§6) without this crate performing file I/O itself.
#[derive(Debug, Clone, Default)]
pub struct ModuleRecord {
    pub functions: HashMap<String, FuncSig>,
    pub structs: HashMap<String, StructDef>,
    pub enums: HashMap<String, EnumDef>,
    pub classes: HashMap<String, ClassDef>,
    pub constants: HashMap<String, TypePtr>,
    pub source_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScopeEntry {
    pub ty: TypePtr,
    pub is_mutable: bool,
    pub span: Span,
    pub consumed: bool,
}

/// An ordered name -> binding map, plus the drop-list of locals that need a destructor at
/// scope exit, in declaration order (dropped in reverse).
#[derive(Debug, Default)]
pub struct Scope {
    bindings: Vec<(String, ScopeEntry)>,
    pub drop_list: Vec<String>,
}

impl Scope {
    fn get(&self, name: &str) -> Option<&ScopeEntry> {
        self.bindings.iter().rev().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut ScopeEntry> {
        self.bindings.iter_mut().rev().find(|(n, _)| n == name).map(|(_, e)| e)
    }
}

pub struct TypeEnv {
    pub interner: TypeInterner,
    scopes: Vec<Scope>,
    structs: HashMap<String, StructDef>,
    enums: HashMap<String, EnumDef>,
    classes: HashMap<String, ClassDef>,
    behaviors: HashMap<String, BehaviorDef>,
    impls: Vec<ImplRecord>,
    functions: HashMap<String, FuncSig>,
    type_aliases: HashMap<String, TypePtr>,
    constants: HashMap<String, TypePtr>,
    imports: HashMap<String, ModuleRecord>,
    /// The self type of the impl block currently being checked, for `This` sugar.
    pub current_self_type: Option<TypePtr>,
    builtin_generic_containers: Vec<&'static str>,
    /// Generic parameter names visible while resolving the body of the struct/enum/fn/impl
    /// currently being declared or checked. A `Named` type whose name matches one of these
    /// resolves to `Ty::Generic` rather than an undefined-type error.
    generic_scopes: Vec<Vec<String>>,
}

const BUILTIN_GENERIC_CONTAINERS: &[&str] = &[
    "List", "HashMap", "Buffer", "Slice", "MutSlice", "Array", "Maybe", "Outcome", "Poll",
    "Ordering",
];

/// Smart-pointer wrappers whose deref chain the checker walks transparently for field and
/// method lookup (§4.2 "Dereference").
pub const DEREF_BLESSED_WRAPPERS: &[&str] = &[
    "Arc", "Rc", "Box", "Heap", "Shared", "Sync", "MutexGuard", "RwLockReadGuard",
    "RwLockWriteGuard", "Ref", "RefMut",
];

impl TypeEnv {
    pub fn new() -> Self {
        let mut env = Self {
            interner: TypeInterner::new(),
            scopes: vec![Scope::default()],
            structs: HashMap::new(),
            enums: HashMap::new(),
            classes: HashMap::new(),
            behaviors: HashMap::new(),
            impls: Vec::new(),
            functions: HashMap::new(),
            type_aliases: HashMap::new(),
            constants: HashMap::new(),
            imports: HashMap::new(),
            current_self_type: None,
            builtin_generic_containers: BUILTIN_GENERIC_CONTAINERS.to_vec(),
            generic_scopes: Vec::new(),
        };
        env.register_builtin_containers();
        env
    }

    /// `resolve()` accepts the builtin container names syntactically (§4.1), but without a
    /// registered definition `ty_to_llvm` fell through `ensure_struct_type` /
    /// `ensure_class_type` to an empty `{}` struct for every one of them. `Maybe`/`Outcome`/
    /// `Poll`/`Ordering` are true sum types, so they're registered as `EnumDef`s and get the
    /// tagged-union layout `codegen::enums` already builds for user enums. The remaining
    /// containers (`List`, `Buffer`, `Slice`, `MutSlice`, `Array`, `HashMap`) aren't sum types —
    /// they get a runtime-backed `StructDef` (fat pointer + length) instead, the same shape
    /// `Ty::Slice` already uses when the parser produces the dedicated slice AST node rather
    /// than the generic-named-type spelling.
    fn register_builtin_containers(&mut self) {
        let t = self.interner.intern(Ty::Generic("T".to_string()));
        let e = self.interner.intern(Ty::Generic("E".to_string()));
        self.define_enum(EnumDef {
            name: "Maybe".to_string(),
            type_params: vec!["T".to_string()],
            variants: vec![
                EnumVariantInfo { name: "Just".to_string(), payload: vec![t.clone()] },
                EnumVariantInfo { name: "Nothing".to_string(), payload: vec![] },
            ],
        });
        self.define_enum(EnumDef {
            name: "Outcome".to_string(),
            type_params: vec!["T".to_string(), "E".to_string()],
            variants: vec![
                EnumVariantInfo { name: "Ok".to_string(), payload: vec![t.clone()] },
                EnumVariantInfo { name: "Err".to_string(), payload: vec![e] },
            ],
        });
        self.define_enum(EnumDef {
            name: "Poll".to_string(),
            type_params: vec!["T".to_string()],
            variants: vec![
                EnumVariantInfo { name: "Ready".to_string(), payload: vec![t] },
                EnumVariantInfo { name: "Pending".to_string(), payload: vec![] },
            ],
        });
        self.define_enum(EnumDef {
            name: "Ordering".to_string(),
            type_params: vec![],
            variants: vec![
                EnumVariantInfo { name: "Less".to_string(), payload: vec![] },
                EnumVariantInfo { name: "Equal".to_string(), payload: vec![] },
                EnumVariantInfo { name: "Greater".to_string(), payload: vec![] },
            ],
        });

        let u64_ty = self.interner.primitive(PrimKind::U64);
        for name in ["List", "Buffer", "Slice", "MutSlice", "Array"] {
            let elem = self.interner.intern(Ty::Generic("T".to_string()));
            let data_ptr = self.interner.intern(Ty::Ptr { inner: elem, is_mut: true });
            self.define_struct(StructDef {
                name: name.to_string(),
                type_params: vec!["T".to_string()],
                fields: vec![
                    FieldInfo { name: "data".to_string(), ty: data_ptr, is_public: false },
                    FieldInfo { name: "len".to_string(), ty: u64_ty.clone(), is_public: false },
                ],
            });
        }
        let unit_ty = self.interner.primitive(PrimKind::Unit);
        let opaque_handle = self.interner.intern(Ty::Ptr { inner: unit_ty, is_mut: true });
        self.define_struct(StructDef {
            name: "HashMap".to_string(),
            type_params: vec!["K".to_string(), "V".to_string()],
            fields: vec![
                FieldInfo { name: "handle".to_string(), ty: opaque_handle, is_public: false },
                FieldInfo { name: "len".to_string(), ty: u64_ty, is_public: false },
            ],
        });
    }

    pub fn push_generic_scope(&mut self, names: Vec<String>) {
        self.generic_scopes.push(names);
    }

    pub fn pop_generic_scope(&mut self) {
        self.generic_scopes.pop();
    }

    fn is_generic_param(&self, name: &str) -> bool {
        self.generic_scopes.iter().any(|scope| scope.iter().any(|n| n == name))
    }

    // ---- scopes ----------------------------------------------------------------

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pops the innermost scope and returns its drop-list (in declaration order; the
    /// caller emits destructors in reverse).
    pub fn pop_scope(&mut self) -> Vec<String> {
        self.scopes.pop().map(|s| s.drop_list).unwrap_or_default()
    }

    pub fn define_local(&mut self, name: &str, ty: TypePtr, is_mutable: bool, span: Span) {
        let needs_drop = self.needs_drop(&ty);
        let scope = self.scopes.last_mut().expect("at least one scope");
        scope.bindings.push((
            name.to_string(),
            ScopeEntry { ty, is_mutable, span, consumed: false },
        ));
        if needs_drop {
            scope.drop_list.push(name.to_string());
        }
    }

    pub fn lookup_local(&self, name: &str) -> Option<&ScopeEntry> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    pub fn mark_consumed(&mut self, name: &str) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(entry) = scope.get_mut(name) {
                entry.consumed = true;
                return true;
            }
        }
        false
    }

    pub fn all_known_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scopes.iter().flat_map(|s| s.bindings.iter().map(|(n, _)| n.clone())).collect();
        names.extend(self.functions.keys().cloned());
        names.extend(self.structs.keys().cloned());
        names.extend(self.enums.keys().cloned());
        names.extend(self.classes.keys().cloned());
        names.extend(self.constants.keys().cloned());
        names
    }

    // ---- define / lookup declarations -------------------------------------------

    pub fn define_struct(&mut self, def: StructDef) {
        self.structs.insert(def.name.clone(), def);
    }

    pub fn lookup_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name).or_else(|| self.imports.values().find_map(|m| m.structs.get(name)))
    }

    pub fn define_enum(&mut self, def: EnumDef) {
        self.enums.insert(def.name.clone(), def);
    }

    pub fn lookup_enum(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name).or_else(|| self.imports.values().find_map(|m| m.enums.get(name)))
    }

    pub fn define_class(&mut self, def: ClassDef) {
        self.classes.insert(def.name.clone(), def);
    }

    pub fn lookup_class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name).or_else(|| self.imports.values().find_map(|m| m.classes.get(name)))
    }

    pub fn define_behavior(&mut self, def: BehaviorDef) {
        self.behaviors.insert(def.name.clone(), def);
    }

    pub fn lookup_behavior(&self, name: &str) -> Option<&BehaviorDef> {
        self.behaviors.get(name)
    }

    pub fn define_impl(&mut self, record: ImplRecord) {
        self.impls.push(record);
    }

    pub fn impls_for(&self, type_name: &str) -> impl Iterator<Item = &ImplRecord> {
        self.impls.iter().filter(move |r| r.self_type_name == type_name)
    }

    pub fn define_function(&mut self, sig: FuncSig) {
        self.functions.insert(sig.name.clone(), sig);
    }

    pub fn lookup_function(&self, name: &str) -> Option<&FuncSig> {
        self.functions.get(name).or_else(|| self.imports.values().find_map(|m| m.functions.get(name)))
    }

    pub fn define_type_alias(&mut self, name: &str, ty: TypePtr) {
        self.type_aliases.insert(name.to_string(), ty);
    }

    pub fn define_const(&mut self, name: &str, ty: TypePtr) {
        self.constants.insert(name.to_string(), ty);
    }

    pub fn lookup_const(&self, name: &str) -> Option<&TypePtr> {
        self.constants.get(name).or_else(|| self.imports.values().find_map(|m| m.constants.get(name)))
    }

    /// Import a (possibly-aliased) module into the current import table. Module discovery
    /// and file reading are the external parser/driver's job; this just records the record.
    pub fn import_module(&mut self, path: &str, record: ModuleRecord) {
        self.imports.insert(path.to_string(), record);
    }

    // ---- resolution ---------------------------------------------------------------

    /// Resolves a parser-level `Type` node to a semantic `TypePtr`.
    pub fn resolve(&self, ast_ty: &AstType) -> Result<TypePtr, TypeEnvError> {
        let ty = match ast_ty {
            AstType::Prim(kind) => Ty::Primitive(*kind),
            AstType::This => {
                return self
                    .current_self_type
                    .clone()
                    .ok_or(TypeEnvError::ThisOutsideImpl);
            }
            AstType::Named { path, name, args } => {
                if args.is_empty() && self.is_generic_param(name) {
                    return Ok(self.interner.intern(Ty::Generic(name.clone())));
                }

                let resolved_args = args
                    .iter()
                    .map(|a| self.resolve(a))
                    .collect::<Result<Vec<_>, _>>()?;

                if self.classes.contains_key(name) {
                    Ty::Class { module_path: path.clone(), name: name.clone(), args: resolved_args }
                } else if self.structs.contains_key(name)
                    || self.enums.contains_key(name)
                    || self.type_aliases.contains_key(name)
                    || self.builtin_generic_containers.contains(&name.as_str())
                {
                    if let Some(alias) = self.type_aliases.get(name) {
                        return Ok(alias.clone());
                    }
                    Ty::Named { module_path: path.clone(), name: name.clone(), args: resolved_args }
                } else if self
                    .imports
                    .values()
                    .any(|m| m.structs.contains_key(name) || m.enums.contains_key(name) || m.classes.contains_key(name))
                {
                    Ty::Named { module_path: path.clone(), name: name.clone(), args: resolved_args }
                } else {
                    let suggestions = fuzzy::find_similar_names(name, &self.all_known_type_names(), 3);
                    return Err(TypeEnvError::UndefinedType { name: name.clone(), suggestions });
                }
            }
            AstType::Ref(inner, is_mut) => Ty::Ref { inner: self.resolve(inner)?, is_mut: *is_mut },
            AstType::Ptr(inner, is_mut) => Ty::Ptr { inner: self.resolve(inner)?, is_mut: *is_mut },
            AstType::Array(elem, len) => Ty::Array { element: self.resolve(elem)?, len: *len },
            AstType::Slice(elem) => Ty::Slice { element: self.resolve(elem)? },
            AstType::Tuple(elems) => {
                Ty::Tuple(elems.iter().map(|e| self.resolve(e)).collect::<Result<_, _>>()?)
            }
            AstType::Func { params, return_type, is_async } => Ty::Func {
                params: params.iter().map(|p| self.resolve(p)).collect::<Result<_, _>>()?,
                ret: self.resolve(return_type)?,
                is_async: *is_async,
            },
            AstType::Dyn { behavior, args } => Ty::DynBehavior {
                behavior: behavior.clone(),
                args: args.iter().map(|a| self.resolve(a)).collect::<Result<_, _>>()?,
            },
            AstType::ImplBehavior { behavior, args } => Ty::ImplBehavior {
                behavior: behavior.clone(),
                args: args.iter().map(|a| self.resolve(a)).collect::<Result<_, _>>()?,
            },
        };
        Ok(self.interner.intern(ty))
    }

    fn all_known_type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.structs.keys().cloned().collect();
        names.extend(self.enums.keys().cloned());
        names.extend(self.classes.keys().cloned());
        names.extend(self.type_aliases.keys().cloned());
        names.extend(self.builtin_generic_containers.iter().map(|s| s.to_string()));
        names
    }

    /// Given a substitution map `generic-name -> TypePtr`, produces a new `TypePtr` with
    /// every `Generic` (or Named type whose base name matches a generic parameter)
    /// replaced.
    pub fn substitute(&self, ty: &TypePtr, subst: &HashMap<String, TypePtr>) -> TypePtr {
        let substituted = match ty.as_ref() {
            Ty::Generic(name) => return subst.get(name).cloned().unwrap_or_else(|| ty.clone()),
            Ty::Named { module_path, name, args } => {
                if args.is_empty() {
                    if let Some(replacement) = subst.get(name) {
                        return replacement.clone();
                    }
                }
                Ty::Named {
                    module_path: module_path.clone(),
                    name: name.clone(),
                    args: args.iter().map(|a| self.substitute(a, subst)).collect(),
                }
            }
            Ty::Class { module_path, name, args } => Ty::Class {
                module_path: module_path.clone(),
                name: name.clone(),
                args: args.iter().map(|a| self.substitute(a, subst)).collect(),
            },
            Ty::Ref { inner, is_mut } => Ty::Ref { inner: self.substitute(inner, subst), is_mut: *is_mut },
            Ty::Ptr { inner, is_mut } => Ty::Ptr { inner: self.substitute(inner, subst), is_mut: *is_mut },
            Ty::Array { element, len } => Ty::Array { element: self.substitute(element, subst), len: *len },
            Ty::Slice { element } => Ty::Slice { element: self.substitute(element, subst) },
            Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| self.substitute(e, subst)).collect()),
            Ty::Func { params, ret, is_async } => Ty::Func {
                params: params.iter().map(|p| self.substitute(p, subst)).collect(),
                ret: self.substitute(ret, subst),
                is_async: *is_async,
            },
            Ty::Closure { params, ret, captures } => Ty::Closure {
                params: params.iter().map(|p| self.substitute(p, subst)).collect(),
                ret: self.substitute(ret, subst),
                captures: captures
                    .iter()
                    .map(|(n, t, m)| (n.clone(), self.substitute(t, subst), *m))
                    .collect(),
            },
            Ty::DynBehavior { behavior, args } => Ty::DynBehavior {
                behavior: behavior.clone(),
                args: args.iter().map(|a| self.substitute(a, subst)).collect(),
            },
            Ty::ImplBehavior { behavior, args } => Ty::ImplBehavior {
                behavior: behavior.clone(),
                args: args.iter().map(|a| self.substitute(a, subst)).collect(),
            },
            Ty::Primitive(_) => return ty.clone(),
        };
        self.interner.intern(substituted)
    }

    /// Whether `ty` implements `behavior_name`, including lookup by base name for mangled
    /// generic instances (`Mutex__I32` counts as implementing whatever `Mutex` implements).
    pub fn implements(&self, ty: &TypePtr, behavior_name: &str) -> bool {
        let Some(base) = ty.base_name() else { return false };
        let unmangled = base.split("__").next().unwrap_or(base);
        self.impls
            .iter()
            .any(|r| r.self_type_name == unmangled && r.behavior.as_deref() == Some(behavior_name))
    }

    /// Recursively determines whether a type, by itself or via any field/payload, requires
    /// a Drop at scope exit.
    pub fn needs_drop(&self, ty: &TypePtr) -> bool {
        self.needs_drop_inner(ty, &mut Vec::new())
    }

    fn needs_drop_inner(&self, ty: &TypePtr, visiting: &mut Vec<String>) -> bool {
        match ty.as_ref() {
            Ty::Primitive(PrimKind::Str) => true,
            Ty::Primitive(_) => false,
            Ty::Ref { .. } | Ty::Ptr { .. } => false,
            Ty::Named { name, .. } | Ty::Class { name, .. } => {
                let unmangled = name.split("__").next().unwrap_or(name).to_string();
                if visiting.contains(&unmangled) {
                    return false;
                }
                if self.implements(ty, "Drop") {
                    return true;
                }
                visiting.push(unmangled.clone());
                let result = if let Some(def) = self.lookup_struct(&unmangled) {
                    def.fields.iter().any(|f| self.needs_drop_inner(&f.ty, visiting))
                } else if let Some(def) = self.lookup_enum(&unmangled) {
                    def.variants
                        .iter()
                        .any(|v| v.payload.iter().any(|p| self.needs_drop_inner(p, visiting)))
                } else if let Some(def) = self.lookup_class(&unmangled) {
                    def.fields.iter().any(|f| self.needs_drop_inner(&f.ty, visiting))
                } else {
                    false
                };
                visiting.pop();
                result
            }
            Ty::Array { element, .. } | Ty::Slice { element } => self.needs_drop_inner(element, visiting),
            Ty::Tuple(elems) => elems.iter().any(|e| self.needs_drop_inner(e, visiting)),
            Ty::Closure { .. } => true,
            Ty::Func { .. } | Ty::Generic(_) | Ty::DynBehavior { .. } | Ty::ImplBehavior { .. } => false,
        }
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TypeEnvError {
    #[error("cannot find type `{name}`{}", suggestion_suffix(.suggestions))]
    UndefinedType { name: String, suggestions: Vec<String> },
    #[error("`This` used outside of an impl block")]
    ThisOutsideImpl,
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean `{}`?)", suggestions.join("`, `"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_ast::Span as AstSpan;

    #[test]
    fn resolves_primitive_and_interns_named() {
        let mut env = TypeEnv::new();
        env.define_struct(StructDef { name: "Pair".to_string(), type_params: vec!["T".to_string()], fields: vec![] });

        let resolved = env
            .resolve(&AstType::Named { path: vec![], name: "Pair".to_string(), args: vec![AstType::Prim(PrimKind::I32)] })
            .unwrap();
        assert!(matches!(resolved.as_ref(), Ty::Named { name, .. } if name == "Pair"));
    }

    #[test]
    fn undefined_type_reports_suggestion() {
        let env = TypeEnv::new();
        let err = env
            .resolve(&AstType::Named { path: vec![], name: "Strnig".to_string(), args: vec![] })
            .unwrap_err();
        match err {
            TypeEnvError::UndefinedType { suggestions, .. } => {
                // "Str" is not a user type name, so this should come back empty rather than
                // crash; the point of this test is that the error path is reachable at all.
                let _ = suggestions;
            }
            _ => panic!("expected UndefinedType"),
        }
    }

    #[test]
    fn needs_drop_recurses_through_struct_fields() {
        let mut env = TypeEnv::new();
        let str_ty = env.interner.primitive(PrimKind::Str);
        env.define_struct(StructDef {
            name: "Holder".to_string(),
            type_params: vec![],
            fields: vec![FieldInfo { name: "s".to_string(), ty: str_ty, is_public: true }],
        });
        let holder_ty = env
            .resolve(&AstType::Named { path: vec![], name: "Holder".to_string(), args: vec![] })
            .unwrap();
        assert!(env.needs_drop(&holder_ty));
    }

    #[test]
    fn local_scope_tracks_drop_list_in_declaration_order() {
        let mut env = TypeEnv::new();
        let str_ty = env.interner.primitive(PrimKind::Str);
        env.define_local("a", str_ty.clone(), false, AstSpan::unknown());
        env.define_local("b", str_ty, false, AstSpan::unknown());
        let drops = env.pop_scope();
        assert_eq!(drops, vec!["a".to_string(), "b".to_string()]);
    }
}
