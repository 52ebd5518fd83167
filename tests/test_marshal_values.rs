mod common;

use common::{object_iface, StubBridge, StubTrampolines};
use gir_bridge::interop::{Ownership, RawTypeInfo};
use gir_bridge::marshal::{decode, encode_argument, encode_type, MarshalContext};
use gir_bridge::metadata::{
    ArrayDescriptor, ArrayKind, InterfaceDescriptor, InterfaceKind, ParameterDescriptor,
    TypeDescriptor, TypeTag,
};
use gir_bridge::{
    CellValue, DecodePolicy, ErrorKind, HostFunction, MarshalConfig, NumericPolicy, Registry,
    Resolver, Value,
};
use proptest::prelude::*;
use std::sync::Arc;

fn roundtrip(ty: &TypeDescriptor, value: &Value, ctx: &MarshalContext<'_>) -> Value {
    let cell = encode_type(ty, value, ctx).unwrap();
    unsafe { decode(cell.value(), ty, None, ctx) }.unwrap()
}

fn scalar(tag: TypeTag) -> TypeDescriptor {
    TypeDescriptor::scalar(tag)
}

#[test]
fn test_scalar_roundtrip() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    let cases = [
        (TypeTag::Int8, -5.0),
        (TypeTag::UInt8, 200.0),
        (TypeTag::Int16, -30000.0),
        (TypeTag::UInt16, 60000.0),
        (TypeTag::Int32, -123456.0),
        (TypeTag::UInt32, 4_000_000_000.0),
        (TypeTag::Int64, -1_099_511_627_776.0),
        (TypeTag::UInt64, 1_099_511_627_776.0),
        (TypeTag::UInt64, 13_835_058_055_282_163_712.0),
        (TypeTag::UInt64, 18_446_744_073_709_549_568.0),
        (TypeTag::Float, 1.5),
        (TypeTag::Double, 0.1),
    ];

    for (tag, n) in cases {
        assert_eq!(
            roundtrip(&scalar(tag), &Value::Number(n), &ctx),
            Value::Number(n),
            "{}",
            tag.name()
        );
    }

    assert_eq!(roundtrip(&scalar(TypeTag::Boolean), &Value::Bool(true), &ctx), Value::Bool(true));
    assert_eq!(roundtrip(&scalar(TypeTag::Boolean), &Value::from(0), &ctx), Value::Bool(false));
    assert_eq!(roundtrip(&scalar(TypeTag::Boolean), &Value::from("x"), &ctx), Value::Bool(true));
}

#[test]
fn test_type_handle_uses_unsigned_width() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    assert_eq!(
        roundtrip(&scalar(TypeTag::GType), &Value::from(4242), &ctx),
        Value::from(4242)
    );
}

#[test]
fn test_truncation_policy() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    assert_eq!(roundtrip(&scalar(TypeTag::UInt8), &Value::from(300), &ctx), Value::from(44));
    assert_eq!(roundtrip(&scalar(TypeTag::UInt8), &Value::from(-1), &ctx), Value::from(255));
    assert_eq!(
        roundtrip(&scalar(TypeTag::Int32), &Value::Number(3_000_000_000.0), &ctx),
        Value::Number(-1_294_967_296.0)
    );
    assert_eq!(roundtrip(&scalar(TypeTag::Int32), &Value::Number(3.7), &ctx), Value::from(3));
    assert_eq!(roundtrip(&scalar(TypeTag::Int32), &Value::Number(-3.7), &ctx), Value::from(-3));
    assert_eq!(roundtrip(&scalar(TypeTag::Int32), &Value::from("12"), &ctx), Value::from(12));
}

#[test]
fn test_checked_policy_rejects_out_of_range() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default().with_numeric_policy(NumericPolicy::Checked);
    let ctx = MarshalContext::new(&bridge, &config);

    let param = ParameterDescriptor::input("level", scalar(TypeTag::UInt8));
    let err = encode_argument(&param, &Value::from(300), &ctx).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::NumericOutOfRange {
            param: "level".to_string(),
            expected: "guint8".to_string(),
            value: 300.0,
        }
    );
    assert_eq!(err.to_string(), "Value 300 does not fit type 'guint8' of Argument 'level'");

    let err = encode_argument(&param, &Value::from(-1), &ctx).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NumericOutOfRange { .. }));

    let cell = encode_argument(&param, &Value::Number(255.9), &ctx).unwrap();
    assert_eq!(cell.value().read_integer(TypeTag::UInt8), Some(255));
}

#[test]
fn test_int64_precision_is_bounded_by_host_numbers() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    let cell = CellValue::from_integer(TypeTag::Int64, (1 << 53) + 1);
    let decoded = unsafe { decode(cell, &scalar(TypeTag::Int64), None, &ctx) }.unwrap();
    assert_eq!(decoded, Value::Number(9_007_199_254_740_992.0));
}

#[test]
fn test_null_rejected_for_non_nullable_arguments() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    let scalars = [
        TypeTag::Boolean,
        TypeTag::Int8,
        TypeTag::UInt8,
        TypeTag::Int16,
        TypeTag::UInt16,
        TypeTag::Int32,
        TypeTag::UInt32,
        TypeTag::Int64,
        TypeTag::UInt64,
        TypeTag::Float,
        TypeTag::Double,
        TypeTag::GType,
        TypeTag::Utf8,
        TypeTag::Filename,
        TypeTag::GList,
        TypeTag::GSList,
        TypeTag::GHash,
        TypeTag::Error,
        TypeTag::Unichar,
    ];
    let mut types: Vec<TypeDescriptor> = scalars.iter().copied().map(scalar).collect();

    for kind in [ArrayKind::C, ArrayKind::Growable, ArrayKind::Bytes, ArrayKind::Pointers] {
        types.push(TypeDescriptor::array(ArrayDescriptor::new(kind, scalar(TypeTag::UInt8))));
    }

    let repo = common::demo_repository();
    let visitor = Resolver::new(&repo).resolve_interface("Demo.Visitor").unwrap();
    let interfaces = [
        (InterfaceKind::Object, true),
        (InterfaceKind::Struct, true),
        (InterfaceKind::Struct, false),
        (InterfaceKind::Union, true),
        (InterfaceKind::Boxed, true),
        (InterfaceKind::GenericValue, true),
        (InterfaceKind::Enum { storage: TypeTag::Int32 }, false),
        (InterfaceKind::Flags { storage: TypeTag::UInt16 }, false),
    ];
    for (kind, is_pointer) in interfaces {
        let iface = Arc::new(InterfaceDescriptor::new("Demo.Thing", kind, 8));
        types.push(TypeDescriptor::interface(iface, is_pointer));
    }
    types.push(TypeDescriptor::interface(visitor, true));

    for ty in types {
        let param = ParameterDescriptor::input("arg", ty);
        for value in [Value::Null, Value::Undefined] {
            let err = encode_argument(&param, &value, &ctx).unwrap_err();
            assert!(err.is_null_not_allowed(), "{:?}", param.ty);
            assert_eq!(err.to_string(), "Argument 'arg' may not be null or undefined");
        }
    }
}

#[test]
fn test_null_allowed_for_nullable_and_void() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    let nullable = ParameterDescriptor::input("label", TypeDescriptor::utf8()).nullable();
    let cell = encode_argument(&nullable, &Value::Null, &ctx).unwrap();
    assert!(cell.value().as_ptr().is_null());
    assert!(matches!(cell.ownership(), Ownership::Inline));

    let void = ParameterDescriptor::input("data", TypeDescriptor::void());
    let cell = encode_argument(&void, &Value::Undefined, &ctx).unwrap();
    assert_eq!(unsafe { cell.value().uint64 }, 0);
}

#[test]
fn test_string_roundtrip() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    for s in ["", "hello", "héllo wörld", "日本語"] {
        assert_eq!(roundtrip(&TypeDescriptor::utf8(), &Value::from(s), &ctx), Value::from(s));
    }

    let null = unsafe { decode(CellValue::zeroed(), &TypeDescriptor::utf8(), None, &ctx) }.unwrap();
    assert_eq!(null, Value::Null);
}

#[test]
fn test_string_argument_mismatch() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    let param = ParameterDescriptor::input("title", TypeDescriptor::utf8());

    let err = encode_argument(&param, &Value::from(5), &ctx).unwrap_err();
    assert_eq!(err.to_string(), "Expected type 'utf8' for Argument 'title' but got type 'number'");

    let err = encode_argument(&param, &Value::from("a\0b"), &ctx).unwrap_err();
    assert!(err.is_type_mismatch());
}

#[test]
fn test_enum_uses_storage_width() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    let mode = Arc::new(InterfaceDescriptor::new(
        "Demo.Mode",
        InterfaceKind::Enum { storage: TypeTag::UInt8 },
        0,
    ));
    let ty = TypeDescriptor::interface(mode, false);

    let cell = encode_type(&ty, &Value::from(258), &ctx).unwrap();
    assert_eq!(cell.value().read_integer(TypeTag::UInt8), Some(2));
    assert_eq!(roundtrip(&ty, &Value::from(7), &ctx), Value::from(7));
}

#[test]
fn test_object_identity_preserved() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);
    let ty = TypeDescriptor::interface(object_iface("Demo.Widget"), true);

    let cell = CellValue::from_ptr(0x1000 as *mut _);
    let first = unsafe { decode(cell, &ty, None, &ctx) }.unwrap();
    let second = unsafe { decode(cell, &ty, None, &ctx) }.unwrap();
    assert_eq!(first, second);

    let encoded = encode_type(&ty, &first, &ctx).unwrap();
    assert_eq!(encoded.value().as_ptr() as usize, 0x1000);
    assert!(matches!(encoded.ownership(), Ownership::Borrowed));

    let null = unsafe { decode(CellValue::zeroed(), &ty, None, &ctx) }.unwrap();
    assert_eq!(null, Value::Null);
}

#[test]
fn test_object_argument_rejects_plain_values() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    let param = ParameterDescriptor::input(
        "widget",
        TypeDescriptor::interface(object_iface("Demo.Widget"), true),
    );
    let err = encode_argument(&param, &Value::from("widget"), &ctx).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Expected type 'interface' for Argument 'widget' but got type 'string'"
    );
}

#[test]
fn test_callback_needs_trampolines() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let repo = common::demo_repository();
    let info = repo.lookup("Demo.Visitor").unwrap();
    let signature = Arc::new(info.signature.clone().unwrap());
    let ty = TypeDescriptor::interface(
        Arc::new(InterfaceDescriptor::new(
            "Demo.Visitor",
            InterfaceKind::Callback { signature },
            0,
        )),
        true,
    );
    let function = Value::from(HostFunction::new("visit", |_| Value::Bool(true)));

    let ctx = MarshalContext::new(&bridge, &config);
    let err = encode_type(&ty, &function, &ctx).unwrap_err();
    assert!(err.is_unsupported());

    let trampolines = StubTrampolines::default();
    let ctx = MarshalContext::new(&bridge, &config).with_trampolines(&trampolines);
    let cell = encode_type(&ty, &function, &ctx).unwrap();
    assert!(!cell.value().as_ptr().is_null());
    assert_eq!(trampolines.created.lock().as_slice(), ["Visitor:visit"]);

    assert!(encode_type(&ty, &Value::from(1), &ctx).unwrap_err().is_type_mismatch());
}

#[test]
fn test_containers_cannot_be_encoded() {
    let bridge = StubBridge::new();
    let config = MarshalConfig::default();
    let ctx = MarshalContext::new(&bridge, &config);

    for tag in [TypeTag::GList, TypeTag::GSList, TypeTag::GHash, TypeTag::Error] {
        let err = encode_type(&scalar(tag), &Value::from(vec![1]), &ctx).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UnsupportedType {
                name: tag.name().to_string(),
                context: "argument type".to_string(),
            }
        );
    }
}

#[test]
fn test_decode_policy() {
    let bridge = StubBridge::new();
    let permissive = MarshalConfig::default();
    let strict = MarshalConfig::default().with_decode_policy(DecodePolicy::Strict);
    let list = TypeDescriptor {
        is_pointer: true,
        ..scalar(TypeTag::GList)
    };
    let cell = CellValue::from_ptr(0x10 as *mut _);

    let ctx = MarshalContext::new(&bridge, &permissive);
    let value = unsafe { decode(cell, &list, None, &ctx) }.unwrap();
    assert_eq!(value, Value::Unrepresentable("GList".to_string()));
    assert_eq!(value.type_of(), "undefined");

    let ctx = MarshalContext::new(&bridge, &strict);
    let err = unsafe { decode(cell, &list, None, &ctx) }.unwrap_err();
    assert_eq!(err.to_string(), "native type \"GList\" is unsupported");
}

#[test]
fn test_raw_type_info_from_json() {
    let raw: RawTypeInfo = serde_json::from_str(r#"{ "tag": "gtype" }"#).unwrap();
    assert_eq!(raw.tag, TypeTag::GType);
    assert!(!raw.is_pointer);
}

proptest! {
    #[test]
    fn prop_int32_roundtrip(n in any::<i32>()) {
        let bridge = StubBridge::new();
        let config = MarshalConfig::default();
        let ctx = MarshalContext::new(&bridge, &config);
        prop_assert_eq!(roundtrip(&scalar(TypeTag::Int32), &Value::from(n), &ctx), Value::from(n));
    }

    #[test]
    fn prop_uint8_truncates_modulo_width(n in any::<i32>()) {
        let bridge = StubBridge::new();
        let config = MarshalConfig::default();
        let ctx = MarshalContext::new(&bridge, &config);
        let expected = f64::from(n.rem_euclid(256));
        prop_assert_eq!(
            roundtrip(&scalar(TypeTag::UInt8), &Value::from(n), &ctx),
            Value::Number(expected)
        );
    }

    #[test]
    fn prop_double_roundtrip(n in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
        let bridge = StubBridge::new();
        let config = MarshalConfig::default();
        let ctx = MarshalContext::new(&bridge, &config);
        prop_assert_eq!(roundtrip(&scalar(TypeTag::Double), &Value::Number(n), &ctx), Value::Number(n));
    }

    #[test]
    fn prop_string_roundtrip(s in "\\PC{0,32}") {
        let bridge = StubBridge::new();
        let config = MarshalConfig::default();
        let ctx = MarshalContext::new(&bridge, &config);
        prop_assert_eq!(roundtrip(&TypeDescriptor::utf8(), &Value::from(s.as_str()), &ctx), Value::from(s.as_str()));
    }
}
