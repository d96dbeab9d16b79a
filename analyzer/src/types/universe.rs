//! Predeclared identifiers

use fxhash::FxHashMap;

use super::ids::{SymbolId, TypeId};
use super::symbols::{Symbol, SymbolKind, SymbolTable};
use super::type_table::{BasicKind, InterfaceMethod, InterfaceType, Signature, TypeKind, TypeTable};

pub const BUILTINS: &[&str] = &[
    "append", "cap", "close", "copy", "delete", "len", "make", "new", "panic", "print", "println",
    "recover",
];

/// Outermost scope shared by every package of a program
#[derive(Debug)]
pub struct Universe {
    scope: FxHashMap<String, SymbolId>,
    pub error: TypeId,
    pub any: TypeId,
}

impl Universe {
    pub fn new(types: &mut TypeTable, symbols: &mut SymbolTable) -> Self {
        let mut scope = FxHashMap::default();
        let mut declare = |symbols: &mut SymbolTable, kind, name: &str, ty| {
            let id = symbols.add(Symbol::new(kind, name, ty));
            scope.insert(name.to_string(), id);
        };

        for kind in BasicKind::ALL {
            if !kind.is_untyped() && kind != BasicKind::UnsafePointer {
                declare(symbols, SymbolKind::TypeName, kind.name(), types.basic(kind));
            }
        }
        declare(symbols, SymbolKind::TypeName, "byte", types.basic(BasicKind::Uint8));
        declare(symbols, SymbolKind::TypeName, "rune", types.basic(BasicKind::Int32));

        let string = types.basic(BasicKind::String);
        let error_sig = types.alloc(TypeKind::Signature(Signature {
            params: Vec::new(),
            results: vec![string],
            variadic: false,
        }));
        let error_iface = types.alloc(TypeKind::Interface(InterfaceType {
            methods: vec![InterfaceMethod {
                name: "Error".to_string(),
                sig: error_sig,
            }],
            embedded: Vec::new(),
        }));
        let error = types.new_named("", "error");
        types.set_underlying(error, error_iface);
        declare(symbols, SymbolKind::TypeName, "error", error);

        let any = types.alloc(TypeKind::Interface(InterfaceType::default()));
        declare(symbols, SymbolKind::TypeName, "any", any);

        let untyped_bool = types.basic(BasicKind::UntypedBool);
        declare(symbols, SymbolKind::Const, "true", untyped_bool);
        declare(symbols, SymbolKind::Const, "false", untyped_bool);
        declare(symbols, SymbolKind::Const, "iota", types.basic(BasicKind::UntypedInt));
        declare(symbols, SymbolKind::Nil, "nil", types.basic(BasicKind::UntypedNil));

        let invalid = types.invalid();
        for name in BUILTINS {
            declare(symbols, SymbolKind::Builtin, name, invalid);
        }

        Self { scope, error, any }
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scope.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_declares_predeclared_names() {
        let mut types = TypeTable::new();
        let mut symbols = SymbolTable::new();
        let universe = Universe::new(&mut types, &mut symbols);

        let byte = universe.lookup("byte").and_then(|id| symbols.get(id)).unwrap();
        assert_eq!(types.type_string(byte.ty), "uint8");

        let error = universe.lookup("error").and_then(|id| symbols.get(id)).unwrap();
        assert_eq!(error.kind, SymbolKind::TypeName);
        assert_eq!(types.type_string(error.ty), "error");
        assert!(types.is_interface(error.ty));

        let len = universe.lookup("len").and_then(|id| symbols.get(id)).unwrap();
        assert_eq!(len.kind, SymbolKind::Builtin);
        assert!(universe.lookup("Close").is_none());
    }
}
