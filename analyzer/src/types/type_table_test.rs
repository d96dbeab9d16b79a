use super::*;

fn error_sig(table: &mut TypeTable) -> TypeId {
    let error = table.basic(BasicKind::String);
    table.alloc(TypeKind::Signature(Signature {
        params: Vec::new(),
        results: vec![error],
        variadic: false,
    }))
}

fn closer_interface(table: &mut TypeTable) -> TypeId {
    let sig = error_sig(table);
    let named = table.new_named("io", "Closer");
    let iface = table.alloc(TypeKind::Interface(InterfaceType {
        methods: vec![InterfaceMethod {
            name: "Close".to_string(),
            sig,
        }],
        embedded: Vec::new(),
    }));
    table.set_underlying(named, iface);
    named
}

fn struct_with_close(table: &mut TypeTable, pointer_receiver: bool) -> TypeId {
    let named = table.new_named("example/db", "Conn");
    let underlying = table.alloc(TypeKind::Struct(Vec::new()));
    table.set_underlying(named, underlying);
    let sig = error_sig(table);
    table.add_method(
        named,
        Method {
            name: "Close".to_string(),
            sig,
            pointer_receiver,
            func: SymbolId::from_raw(0),
        },
    );
    named
}

#[test]
fn test_basics_are_preallocated() {
    let table = TypeTable::new();
    let int = table.basic(BasicKind::Int);
    assert_eq!(table.type_string(int), "int");
    assert!(table.is_invalid(table.invalid()));
    assert_eq!(
        table.type_string(table.basic(BasicKind::UntypedNil)),
        "untyped nil"
    );
}

#[test]
fn test_pointer_and_slice_interning() {
    let mut table = TypeTable::new();
    let int = table.basic(BasicKind::Int);
    assert_eq!(table.pointer_to(int), table.pointer_to(int));
    assert_eq!(table.slice_of(int), table.slice_of(int));
    assert_ne!(table.pointer_to(int), table.slice_of(int));
}

#[test]
fn test_type_strings_use_package_paths() {
    let mut table = TypeTable::new();
    let response = table.new_named("net/http", "Response");
    let ptr = table.pointer_to(response);
    assert_eq!(table.type_string(ptr), "*net/http.Response");

    let closer = closer_interface(&mut table);
    assert_eq!(table.type_string(closer), "io.Closer");

    let underlying = table.underlying(closer);
    assert_eq!(table.type_string(underlying), "interface{Close() string}");
}

#[test]
fn test_signature_strings() {
    let mut table = TypeTable::new();
    let int = table.basic(BasicKind::Int);
    let string = table.basic(BasicKind::String);
    let strings = table.slice_of(string);
    let sig = table.alloc(TypeKind::Signature(Signature {
        params: vec![int, strings],
        results: vec![int, string],
        variadic: true,
    }));
    assert_eq!(table.type_string(sig), "func(int, ...string) (int, string)");
}

#[test]
fn test_value_receiver_implements_for_value_and_pointer() {
    let mut table = TypeTable::new();
    let closer = closer_interface(&mut table);
    let conn = struct_with_close(&mut table, false);
    let conn_ptr = table.pointer_to(conn);

    assert!(table.implements(conn, closer));
    assert!(table.implements(conn_ptr, closer));
}

#[test]
fn test_pointer_receiver_only_implements_for_pointer() {
    let mut table = TypeTable::new();
    let closer = closer_interface(&mut table);
    let conn = struct_with_close(&mut table, true);
    let conn_ptr = table.pointer_to(conn);

    assert!(!table.implements(conn, closer));
    assert!(table.implements(conn_ptr, closer));
}

#[test]
fn test_methods_promote_through_embedded_fields() {
    let mut table = TypeTable::new();
    let closer = closer_interface(&mut table);
    let conn = struct_with_close(&mut table, true);
    let conn_ptr = table.pointer_to(conn);

    let wrapper = table.new_named("example/db", "Wrapper");
    let fields = table.alloc(TypeKind::Struct(vec![StructField {
        name: "Conn".to_string(),
        ty: conn_ptr,
        embedded: true,
        exported: true,
        decl: None,
    }]));
    table.set_underlying(wrapper, fields);

    assert!(table.implements(wrapper, closer));
    assert!(matches!(
        table.lookup_field_or_method(wrapper, "Close"),
        Some(Selection::Method { pointer_receiver: true, .. })
    ));
    assert!(matches!(
        table.lookup_field_or_method(wrapper, "Conn"),
        Some(Selection::Field { .. })
    ));
}

#[test]
fn test_interface_implements_interface() {
    let mut table = TypeTable::new();
    let closer = closer_interface(&mut table);
    let read_closer = table.new_named("io", "ReadCloser");
    let iface = table.alloc(TypeKind::Interface(InterfaceType {
        methods: Vec::new(),
        embedded: vec![closer],
    }));
    table.set_underlying(read_closer, iface);

    assert!(table.implements(read_closer, closer));
    assert_eq!(table.interface_methods(read_closer).len(), 1);
}

#[test]
fn test_signature_mismatch_does_not_implement() {
    let mut table = TypeTable::new();
    let closer = closer_interface(&mut table);
    let other = table.new_named("example/db", "Other");
    let underlying = table.alloc(TypeKind::Struct(Vec::new()));
    table.set_underlying(other, underlying);
    let no_results = table.alloc(TypeKind::Signature(Signature::default()));
    table.add_method(
        other,
        Method {
            name: "Close".to_string(),
            sig: no_results,
            pointer_receiver: false,
            func: SymbolId::from_raw(1),
        },
    );

    assert!(!table.implements(other, closer));
}

#[test]
fn test_structural_identity() {
    let mut table = TypeTable::new();
    let int = table.basic(BasicKind::Int);
    let a = table.alloc(TypeKind::Map { key: int, value: int });
    let b = table.alloc(TypeKind::Map { key: int, value: int });
    let string = table.basic(BasicKind::String);
    let c = table.alloc(TypeKind::Map { key: int, value: string });

    assert!(table.identical(a, b));
    assert!(!table.identical(a, c));
}
