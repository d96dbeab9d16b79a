//! Type arena, type identity, method sets and interface satisfaction

use fxhash::{FxHashMap, FxHashSet};
use parser::ChanDir;

use super::ids::{SymbolId, TypeId};
use super::symbols::DeclSite;

/// Embedding depth searched for promoted fields and methods
const MAX_EMBED_DEPTH: usize = 8;

/// Recursion bound for structural comparisons of self-referential types
const MAX_IDENTITY_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub const ALL: [BasicKind; 24] = [
        BasicKind::Bool,
        BasicKind::Int,
        BasicKind::Int8,
        BasicKind::Int16,
        BasicKind::Int32,
        BasicKind::Int64,
        BasicKind::Uint,
        BasicKind::Uint8,
        BasicKind::Uint16,
        BasicKind::Uint32,
        BasicKind::Uint64,
        BasicKind::Uintptr,
        BasicKind::Float32,
        BasicKind::Float64,
        BasicKind::Complex64,
        BasicKind::Complex128,
        BasicKind::String,
        BasicKind::UnsafePointer,
        BasicKind::UntypedBool,
        BasicKind::UntypedInt,
        BasicKind::UntypedRune,
        BasicKind::UntypedFloat,
        BasicKind::UntypedString,
        BasicKind::UntypedNil,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::String => "string",
            BasicKind::UnsafePointer => "unsafe.Pointer",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }

    pub fn is_untyped(self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
                | BasicKind::UntypedFloat
                | BasicKind::UntypedString
                | BasicKind::UntypedNil
        )
    }

    /// Type an untyped constant takes when bound to a variable
    pub fn default_kind(self) -> BasicKind {
        match self {
            BasicKind::UntypedBool => BasicKind::Bool,
            BasicKind::UntypedInt => BasicKind::Int,
            BasicKind::UntypedRune => BasicKind::Int32,
            BasicKind::UntypedFloat => BasicKind::Float64,
            BasicKind::UntypedString => BasicKind::String,
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    /// Signature type without the receiver
    pub sig: TypeId,
    pub pointer_receiver: bool,
    pub func: SymbolId,
}

#[derive(Debug, Clone)]
pub struct NamedType {
    /// Import path of the declaring package; empty for predeclared types
    pub package: String,
    pub name: String,
    pub underlying: TypeId,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub ty: TypeId,
    pub embedded: bool,
    pub exported: bool,
    pub decl: Option<DeclSite>,
}

#[derive(Debug, Clone)]
pub struct InterfaceMethod {
    pub name: String,
    pub sig: TypeId,
}

#[derive(Debug, Clone, Default)]
pub struct InterfaceType {
    pub methods: Vec<InterfaceMethod>,
    pub embedded: Vec<TypeId>,
}

#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub params: Vec<TypeId>,
    pub results: Vec<TypeId>,
    /// The last parameter is `...T`, stored as `[]T`
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Invalid,
    Basic(BasicKind),
    Named(NamedType),
    Pointer(TypeId),
    Slice(TypeId),
    Array { len: Option<u64>, elem: TypeId },
    Map { key: TypeId, value: TypeId },
    Chan { dir: ChanDir, elem: TypeId },
    Struct(Vec<StructField>),
    Interface(InterfaceType),
    Signature(Signature),
    Tuple(Vec<TypeId>),
}

/// What a selector `x.name` denotes
#[derive(Debug, Clone)]
pub enum Selection {
    Field {
        ty: TypeId,
        decl: Option<DeclSite>,
    },
    Method {
        func: SymbolId,
        sig: TypeId,
        pointer_receiver: bool,
    },
    InterfaceMethod {
        name: String,
        sig: TypeId,
    },
    /// `pkg.Name`
    Qualified(SymbolId),
}

impl Selection {
    /// Type of the selected field or method value
    pub fn ty(&self) -> Option<TypeId> {
        match self {
            Selection::Field { ty, .. } => Some(*ty),
            Selection::Method { sig, .. } | Selection::InterfaceMethod { sig, .. } => Some(*sig),
            Selection::Qualified(_) => None,
        }
    }
}

/// Arena of all types of a program
#[derive(Debug)]
pub struct TypeTable {
    types: Vec<TypeKind>,
    basics: FxHashMap<BasicKind, TypeId>,
    pointers: FxHashMap<TypeId, TypeId>,
    slices: FxHashMap<TypeId, TypeId>,
    invalid: TypeId,
    empty_tuple: TypeId,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            basics: FxHashMap::default(),
            pointers: FxHashMap::default(),
            slices: FxHashMap::default(),
            invalid: TypeId::invalid(),
            empty_tuple: TypeId::invalid(),
        };
        table.invalid = table.alloc(TypeKind::Invalid);
        for kind in BasicKind::ALL {
            let id = table.alloc(TypeKind::Basic(kind));
            table.basics.insert(kind, id);
        }
        table.empty_tuple = table.alloc(TypeKind::Tuple(Vec::new()));
        table
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn alloc(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId::from_index(self.types.len());
        self.types.push(kind);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeKind {
        self.types.get(id.index()).unwrap_or(&TypeKind::Invalid)
    }

    pub fn invalid(&self) -> TypeId {
        self.invalid
    }

    pub fn is_invalid(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeKind::Invalid)
    }

    pub fn basic(&self, kind: BasicKind) -> TypeId {
        self.basics.get(&kind).copied().unwrap_or(self.invalid)
    }

    pub fn empty_tuple(&self) -> TypeId {
        self.empty_tuple
    }

    pub fn pointer_to(&mut self, elem: TypeId) -> TypeId {
        if let Some(id) = self.pointers.get(&elem) {
            return *id;
        }
        let id = self.alloc(TypeKind::Pointer(elem));
        self.pointers.insert(elem, id);
        id
    }

    pub fn slice_of(&mut self, elem: TypeId) -> TypeId {
        if let Some(id) = self.slices.get(&elem) {
            return *id;
        }
        let id = self.alloc(TypeKind::Slice(elem));
        self.slices.insert(elem, id);
        id
    }

    pub fn tuple(&mut self, elems: Vec<TypeId>) -> TypeId {
        if elems.is_empty() {
            return self.empty_tuple;
        }
        self.alloc(TypeKind::Tuple(elems))
    }

    /// Result type of a call to a function with signature `sig`
    pub fn call_result(&mut self, sig: TypeId) -> TypeId {
        let results = match self.signature(sig) {
            Some(sig) => sig.results.clone(),
            None => return self.invalid,
        };
        match results.len() {
            1 => results[0],
            _ => self.tuple(results),
        }
    }

    pub fn new_named(&mut self, package: &str, name: &str) -> TypeId {
        let underlying = self.invalid;
        self.alloc(TypeKind::Named(NamedType {
            package: package.to_string(),
            name: name.to_string(),
            underlying,
            methods: Vec::new(),
        }))
    }

    pub fn set_underlying(&mut self, named: TypeId, underlying: TypeId) {
        // The underlying type of a named type is never itself named
        let underlying = self.underlying(underlying);
        if let Some(TypeKind::Named(n)) = self.types.get_mut(named.index()) {
            n.underlying = underlying;
        }
    }

    pub fn add_method(&mut self, named: TypeId, method: Method) {
        if let Some(TypeKind::Named(n)) = self.types.get_mut(named.index()) {
            n.methods.push(method);
        }
    }

    pub fn named(&self, id: TypeId) -> Option<&NamedType> {
        match self.get(id) {
            TypeKind::Named(n) => Some(n),
            _ => None,
        }
    }

    /// Follow named types to their underlying type
    pub fn underlying(&self, id: TypeId) -> TypeId {
        let mut current = id;
        for _ in 0..MAX_EMBED_DEPTH {
            match self.get(current) {
                TypeKind::Named(n) if n.underlying != current => current = n.underlying,
                _ => return current,
            }
        }
        current
    }

    pub fn underlying_kind(&self, id: TypeId) -> &TypeKind {
        self.get(self.underlying(id))
    }

    pub fn pointer_elem(&self, id: TypeId) -> Option<TypeId> {
        match self.underlying_kind(id) {
            TypeKind::Pointer(elem) => Some(*elem),
            _ => None,
        }
    }

    pub fn struct_fields(&self, id: TypeId) -> Option<&[StructField]> {
        match self.underlying_kind(id) {
            TypeKind::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn signature(&self, id: TypeId) -> Option<&Signature> {
        match self.underlying_kind(id) {
            TypeKind::Signature(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        matches!(self.underlying_kind(id), TypeKind::Interface(_))
    }

    pub fn is_untyped_nil(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeKind::Basic(BasicKind::UntypedNil))
    }

    /// Type a value of type `id` gets when bound to a new variable
    pub fn default_type(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            TypeKind::Basic(kind) if kind.is_untyped() => self.basic(kind.default_kind()),
            _ => id,
        }
    }

    // =========================================================================
    // Identity and printing
    // =========================================================================

    /// Go type identity; invalid types are identical to everything
    pub fn identical(&self, a: TypeId, b: TypeId) -> bool {
        self.identical_at(a, b, 0)
    }

    fn identical_at(&self, a: TypeId, b: TypeId, depth: usize) -> bool {
        if a == b {
            return true;
        }
        if depth > MAX_IDENTITY_DEPTH {
            return false;
        }
        let depth = depth + 1;

        match (self.get(a), self.get(b)) {
            (TypeKind::Invalid, _) | (_, TypeKind::Invalid) => true,
            (TypeKind::Basic(x), TypeKind::Basic(y)) => x == y,
            (TypeKind::Pointer(x), TypeKind::Pointer(y))
            | (TypeKind::Slice(x), TypeKind::Slice(y)) => self.identical_at(*x, *y, depth),
            (
                TypeKind::Array { len: l1, elem: e1 },
                TypeKind::Array { len: l2, elem: e2 },
            ) => l1 == l2 && self.identical_at(*e1, *e2, depth),
            (
                TypeKind::Map { key: k1, value: v1 },
                TypeKind::Map { key: k2, value: v2 },
            ) => self.identical_at(*k1, *k2, depth) && self.identical_at(*v1, *v2, depth),
            (TypeKind::Chan { dir: d1, elem: e1 }, TypeKind::Chan { dir: d2, elem: e2 }) => {
                d1 == d2 && self.identical_at(*e1, *e2, depth)
            }
            (TypeKind::Signature(s1), TypeKind::Signature(s2)) => {
                s1.variadic == s2.variadic
                    && self.identical_lists(&s1.params, &s2.params, depth)
                    && self.identical_lists(&s1.results, &s2.results, depth)
            }
            (TypeKind::Tuple(t1), TypeKind::Tuple(t2)) => self.identical_lists(t1, t2, depth),
            (TypeKind::Struct(f1), TypeKind::Struct(f2)) => {
                f1.len() == f2.len()
                    && f1.iter().zip(f2).all(|(x, y)| {
                        x.name == y.name
                            && x.embedded == y.embedded
                            && self.identical_at(x.ty, y.ty, depth)
                    })
            }
            (TypeKind::Interface(_), TypeKind::Interface(_)) => {
                let m1 = self.interface_methods(a);
                let m2 = self.interface_methods(b);
                m1.len() == m2.len()
                    && m1.iter().zip(&m2).all(|((n1, s1), (n2, s2))| {
                        n1 == n2 && self.identical_at(*s1, *s2, depth)
                    })
            }
            _ => false,
        }
    }

    fn identical_lists(&self, a: &[TypeId], b: &[TypeId], depth: usize) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.identical_at(*x, *y, depth))
    }

    /// Go-style type string with package paths, e.g. `*net/http.Response`
    pub fn type_string(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.write_type(&mut out, id, 0);
        out
    }

    fn write_type(&self, out: &mut String, id: TypeId, depth: usize) {
        if depth > MAX_IDENTITY_DEPTH {
            out.push_str("...");
            return;
        }
        let depth = depth + 1;

        match self.get(id) {
            TypeKind::Invalid => out.push_str("invalid type"),
            TypeKind::Basic(kind) => out.push_str(kind.name()),
            TypeKind::Named(n) => {
                if !n.package.is_empty() {
                    out.push_str(&n.package);
                    out.push('.');
                }
                out.push_str(&n.name);
            }
            TypeKind::Pointer(elem) => {
                out.push('*');
                self.write_type(out, *elem, depth);
            }
            TypeKind::Slice(elem) => {
                out.push_str("[]");
                self.write_type(out, *elem, depth);
            }
            TypeKind::Array { len, elem } => {
                match len {
                    Some(len) => out.push_str(&format!("[{}]", len)),
                    None => out.push_str("[...]"),
                }
                self.write_type(out, *elem, depth);
            }
            TypeKind::Map { key, value } => {
                out.push_str("map[");
                self.write_type(out, *key, depth);
                out.push(']');
                self.write_type(out, *value, depth);
            }
            TypeKind::Chan { dir, elem } => {
                out.push_str(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                self.write_type(out, *elem, depth);
            }
            TypeKind::Struct(fields) => {
                out.push_str("struct{");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    if !field.embedded {
                        out.push_str(&field.name);
                        out.push(' ');
                    }
                    self.write_type(out, field.ty, depth);
                }
                out.push('}');
            }
            TypeKind::Interface(_) => {
                let methods = self.interface_methods(id);
                out.push_str("interface{");
                for (i, (name, sig)) in methods.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    out.push_str(name);
                    self.write_signature(out, *sig, depth);
                }
                out.push('}');
            }
            TypeKind::Signature(_) => {
                out.push_str("func");
                self.write_signature(out, id, depth);
            }
            TypeKind::Tuple(elems) => {
                out.push('(');
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(out, *elem, depth);
                }
                out.push(')');
            }
        }
    }

    fn write_signature(&self, out: &mut String, id: TypeId, depth: usize) {
        let Some(sig) = self.signature(id) else {
            out.push_str("()");
            return;
        };

        out.push('(');
        for (i, param) in sig.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let last = i + 1 == sig.params.len();
            match self.get(*param) {
                TypeKind::Slice(elem) if sig.variadic && last => {
                    out.push_str("...");
                    self.write_type(out, *elem, depth);
                }
                _ => self.write_type(out, *param, depth),
            }
        }
        out.push(')');

        match sig.results.len() {
            0 => {}
            1 => {
                out.push(' ');
                self.write_type(out, sig.results[0], depth);
            }
            _ => {
                out.push_str(" (");
                for (i, result) in sig.results.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(out, *result, depth);
                }
                out.push(')');
            }
        }
    }

    // =========================================================================
    // Method sets
    // =========================================================================

    /// Flattened method list of an interface type, sorted by name
    pub fn interface_methods(&self, id: TypeId) -> Vec<(String, TypeId)> {
        let mut out: Vec<(String, TypeId)> = Vec::new();
        let mut seen = FxHashSet::default();
        self.collect_interface_methods(id, &mut out, &mut seen);
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn collect_interface_methods(
        &self,
        id: TypeId,
        out: &mut Vec<(String, TypeId)>,
        seen: &mut FxHashSet<TypeId>,
    ) {
        let underlying = self.underlying(id);
        if !seen.insert(underlying) {
            return;
        }
        let TypeKind::Interface(iface) = self.get(underlying) else {
            return;
        };
        for method in &iface.methods {
            if !out.iter().any(|(name, _)| *name == method.name) {
                out.push((method.name.clone(), method.sig));
            }
        }
        for embedded in &iface.embedded {
            self.collect_interface_methods(*embedded, out, seen);
        }
    }

    /// Method set of `id` following Go's rules: `T` has value-receiver
    /// methods, `*T` has all; methods are promoted through embedded fields.
    pub fn method_set(&self, id: TypeId) -> Vec<(String, TypeId)> {
        if self.is_interface(id) {
            return self.interface_methods(id);
        }

        let (base, addressable) = match self.get(id) {
            TypeKind::Pointer(elem) => (*elem, true),
            _ => (id, false),
        };

        let mut out: Vec<(String, TypeId)> = Vec::new();
        let mut seen = FxHashSet::default();
        let mut level = vec![(base, addressable)];

        for _ in 0..MAX_EMBED_DEPTH {
            let mut next = Vec::new();
            for (ty, addressable) in level {
                if !seen.insert(ty) {
                    continue;
                }
                if let TypeKind::Named(named) = self.get(ty) {
                    for method in &named.methods {
                        if (addressable || !method.pointer_receiver)
                            && !out.iter().any(|(name, _)| *name == method.name)
                        {
                            out.push((method.name.clone(), method.sig));
                        }
                    }
                }
                let Some(fields) = self.struct_fields(ty) else {
                    continue;
                };
                for field in fields.iter().filter(|f| f.embedded) {
                    let (field_ty, field_addressable) = match self.get(field.ty) {
                        TypeKind::Pointer(elem) => (*elem, true),
                        _ => (field.ty, addressable),
                    };
                    if self.is_interface(field_ty) {
                        for (name, sig) in self.interface_methods(field_ty) {
                            if !out.iter().any(|(n, _)| *n == name) {
                                out.push((name, sig));
                            }
                        }
                    } else {
                        next.push((field_ty, field_addressable));
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            level = next;
        }

        out
    }

    /// Whether `ty` satisfies interface `iface`
    pub fn implements(&self, ty: TypeId, iface: TypeId) -> bool {
        if self.is_invalid(ty) || !self.is_interface(iface) {
            return false;
        }
        let required = self.interface_methods(iface);
        if required.is_empty() {
            return true;
        }
        let available = self.method_set(ty);
        required.iter().all(|(name, sig)| {
            available
                .iter()
                .any(|(have, have_sig)| have == name && self.identical(*have_sig, *sig))
        })
    }

    // =========================================================================
    // Selector lookup
    // =========================================================================

    /// Resolve `x.name` where `x` has type `id`, with automatic dereference
    /// and promotion through embedded fields
    pub fn lookup_field_or_method(&self, id: TypeId, name: &str) -> Option<Selection> {
        if self.is_interface(id) {
            return self
                .interface_methods(id)
                .into_iter()
                .find(|(method, _)| method == name)
                .map(|(name, sig)| Selection::InterfaceMethod { name, sig });
        }

        let base = match self.get(id) {
            TypeKind::Pointer(elem) => *elem,
            _ => id,
        };

        let mut seen = FxHashSet::default();
        let mut level = vec![base];

        for _ in 0..MAX_EMBED_DEPTH {
            let mut next = Vec::new();
            for ty in level {
                if !seen.insert(ty) {
                    continue;
                }
                if let TypeKind::Named(named) = self.get(ty) {
                    if let Some(method) = named.methods.iter().find(|m| m.name == name) {
                        return Some(Selection::Method {
                            func: method.func,
                            sig: method.sig,
                            pointer_receiver: method.pointer_receiver,
                        });
                    }
                }
                if self.is_interface(ty) {
                    if let Some((name, sig)) = self
                        .interface_methods(ty)
                        .into_iter()
                        .find(|(method, _)| method == name)
                    {
                        return Some(Selection::InterfaceMethod { name, sig });
                    }
                    continue;
                }
                let Some(fields) = self.struct_fields(ty) else {
                    continue;
                };
                if let Some(field) = fields.iter().find(|f| f.name == name) {
                    return Some(Selection::Field {
                        ty: field.ty,
                        decl: field.decl,
                    });
                }
                for field in fields.iter().filter(|f| f.embedded) {
                    next.push(match self.get(field.ty) {
                        TypeKind::Pointer(elem) => *elem,
                        _ => field.ty,
                    });
                }
            }
            if next.is_empty() {
                break;
            }
            level = next;
        }

        None
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "type_table_test.rs"]
mod type_table_test;
