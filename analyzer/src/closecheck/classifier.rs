//! Type classifier
//!
//! Decides whether values of a type must be disposed: either the type itself
//! satisfies the disposable interface, or it is (a pointer to) a struct with
//! exported fields that do. Unexported fields are never considered.

use std::cell::RefCell;

use fxhash::FxHashMap;

use crate::types::{DeclSite, TypeId, TypeTable};

/// An exported field that must be disposed on its own, e.g. `Response.Body`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposalField {
    pub name: String,
    pub type_name: String,
    pub decl: Option<DeclSite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisposableDescriptor {
    pub needs_disposal: bool,
    pub type_name: String,
    /// Field paths in declaration order; empty when the type itself is disposable
    pub fields: Vec<DisposalField>,
}

impl DisposableDescriptor {
    fn not_disposable(type_name: String) -> Self {
        Self {
            needs_disposal: false,
            type_name,
            fields: Vec::new(),
        }
    }
}

/// Memoizing classifier for one analysis task
pub struct Classifier<'t> {
    types: &'t TypeTable,
    closer: TypeId,
    cache: RefCell<FxHashMap<TypeId, DisposableDescriptor>>,
}

impl<'t> Classifier<'t> {
    pub fn new(types: &'t TypeTable, closer: TypeId) -> Self {
        Self {
            types,
            closer,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn classify(&self, ty: TypeId) -> DisposableDescriptor {
        if let Some(descriptor) = self.cache.borrow().get(&ty) {
            return descriptor.clone();
        }
        let descriptor = self.compute(ty);
        self.cache.borrow_mut().insert(ty, descriptor.clone());
        descriptor
    }

    pub fn needs_disposal(&self, ty: TypeId) -> bool {
        self.classify(ty).needs_disposal
    }

    /// Whether `ty` itself has the disposal method
    pub fn is_closer(&self, ty: TypeId) -> bool {
        !self.types.is_invalid(ty)
            && !self.types.is_untyped_nil(ty)
            && self.types.implements(ty, self.closer)
    }

    fn compute(&self, ty: TypeId) -> DisposableDescriptor {
        let types = self.types;
        let type_name = types.type_string(ty);

        if types.is_invalid(ty) || types.is_untyped_nil(ty) {
            return DisposableDescriptor::not_disposable(type_name);
        }

        if self.is_closer(ty) {
            return DisposableDescriptor {
                needs_disposal: true,
                type_name,
                fields: Vec::new(),
            };
        }

        let record = types.pointer_elem(ty).unwrap_or(ty);
        let Some(struct_fields) = types.struct_fields(record) else {
            return DisposableDescriptor::not_disposable(type_name);
        };

        let fields: Vec<DisposalField> = struct_fields
            .iter()
            .filter(|field| field.exported && self.is_closer(field.ty))
            .map(|field| DisposalField {
                name: field.name.clone(),
                type_name: types.type_string(field.ty),
                decl: field.decl,
            })
            .collect();

        DisposableDescriptor {
            needs_disposal: !fields.is_empty(),
            type_name,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::loader::{load_tree, Program, SourceTree};

    fn program(source: &str) -> Program {
        let mut tree = SourceTree::new();
        tree.add_file("app", "app.go", source);
        load_tree(&tree, &[], &Config::default()).expect("fixture loads")
    }

    fn named(program: &Program, package: &str, name: &str) -> TypeId {
        let id = program.package(package).unwrap().scope[name];
        program.symbols.get(id).unwrap().ty
    }

    const SOURCE: &str = r#"
package app

import (
    "io"
    "net/http"
    "os"
)

type Pair struct {
    In  io.ReadCloser
    Out io.WriteCloser
    log io.Closer
    N   int
}

type Hidden struct {
    conn io.Closer
}

type Plain struct {
    Name string
}

func use(*http.Response, *os.File)
"#;

    #[test]
    fn test_direct_disposables_have_no_field_paths() {
        let mut program = program(SOURCE);
        let file = named(&program, "os", "File");
        let file_ptr = program.types.pointer_to(file);
        let classifier = Classifier::new(&program.types, program.closer);

        // `Close` has a pointer receiver, so only `*os.File` is a closer.
        assert!(!classifier.needs_disposal(file));
        let descriptor = classifier.classify(file_ptr);
        assert!(descriptor.needs_disposal);
        assert!(descriptor.fields.is_empty());
        assert_eq!(descriptor.type_name, "*os.File");

        let read_closer = named(&program, "io", "ReadCloser");
        let descriptor = classifier.classify(read_closer);
        assert!(descriptor.needs_disposal);
        assert!(descriptor.fields.is_empty());
        assert_eq!(descriptor.type_name, "io.ReadCloser");
    }

    #[test]
    fn test_exported_fields_in_declaration_order() {
        let program = program(SOURCE);
        let classifier = Classifier::new(&program.types, program.closer);

        let pair = named(&program, "app", "Pair");
        let descriptor = classifier.classify(pair);
        assert!(descriptor.needs_disposal);
        let names: Vec<&str> = descriptor.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["In", "Out"]);
        assert_eq!(descriptor.fields[1].type_name, "io.WriteCloser");
        assert!(descriptor.fields[0].decl.is_some());

        let response = named(&program, "net/http", "Response");
        let descriptor = classifier.classify(response);
        assert_eq!(descriptor.fields.len(), 1);
        assert_eq!(descriptor.fields[0].name, "Body");
        assert_eq!(descriptor.fields[0].type_name, "io.ReadCloser");
    }

    #[test]
    fn test_unexported_and_plain_records_are_not_disposable() {
        let program = program(SOURCE);
        let classifier = Classifier::new(&program.types, program.closer);

        assert!(!classifier.needs_disposal(named(&program, "app", "Hidden")));
        assert!(!classifier.needs_disposal(named(&program, "app", "Plain")));
        assert!(!classifier.needs_disposal(program.types.invalid()));
    }

    #[test]
    fn test_memoized_results_are_stable() {
        let program = program(SOURCE);
        let classifier = Classifier::new(&program.types, program.closer);
        let pair = named(&program, "app", "Pair");

        assert_eq!(classifier.classify(pair), classifier.classify(pair));
        assert_eq!(classifier.cache.borrow().len(), 1);
    }
}
