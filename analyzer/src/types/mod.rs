//! Type model of analyzed programs
//!
//! - [`TypeTable`]: arena of types with identity, method sets and `implements`
//! - [`SymbolTable`]: declaration records every identifier resolves to
//! - [`check_package`]: the per-package checker producing [`TypeInfo`]
//! - [`stdlib`]: embedded stubs for the standard library

pub mod checker;
pub mod ids;
pub mod stdlib;
pub mod symbols;
pub mod type_table;
pub mod universe;

pub use checker::{check_package, CheckedPackage, PackageScope, TypeError, TypeInfo};
pub use ids::{SymbolId, TypeId};
pub use symbols::{DeclSite, FuncKey, Symbol, SymbolKind, SymbolTable};
pub use type_table::{
    BasicKind, InterfaceMethod, InterfaceType, Method, NamedType, Selection, Signature,
    StructField, TypeKind, TypeTable,
};
pub use universe::Universe;
