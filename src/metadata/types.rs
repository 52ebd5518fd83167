//! Resolved type descriptors
//!
//! Immutable views over introspection metadata. Everything downstream of the
//! resolver (encoder, decoder, binder) works only with these types.

use serde::{Deserialize, Serialize};
use std::mem;
use std::sync::Arc;

use crate::interop::registry::CallableInfo;

/// Width of the runtime's dynamic type handle
pub const TYPE_HANDLE_SIZE: usize = mem::size_of::<usize>();

/// Width of a native pointer
pub const POINTER_SIZE: usize = mem::size_of::<*const u8>();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Void,
    Boolean,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    GType,
    Utf8,
    Filename,
    Array,
    Interface,
    GList,
    GSList,
    GHash,
    Error,
    Unichar,
}

impl TypeTag {
    /// Name used in diagnostics, matching the native library's spelling
    pub const fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Boolean => "gboolean",
            Self::Int8 => "gint8",
            Self::UInt8 => "guint8",
            Self::Int16 => "gint16",
            Self::UInt16 => "guint16",
            Self::Int32 => "gint32",
            Self::UInt32 => "guint32",
            Self::Int64 => "gint64",
            Self::UInt64 => "guint64",
            Self::Float => "gfloat",
            Self::Double => "gdouble",
            Self::GType => "GType",
            Self::Utf8 => "utf8",
            Self::Filename => "filename",
            Self::Array => "array",
            Self::Interface => "interface",
            Self::GList => "GList",
            Self::GSList => "GSList",
            Self::GHash => "GHashTable",
            Self::Error => "GError",
            Self::Unichar => "gunichar",
        }
    }

    /// Width of a scalar tag; `None` for pointer-carried tags
    pub const fn scalar_size(self) -> Option<usize> {
        match self {
            Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Boolean | Self::Int32 | Self::UInt32 | Self::Float | Self::Unichar => Some(4),
            Self::Int64 | Self::UInt64 | Self::Double => Some(8),
            Self::GType => Some(TYPE_HANDLE_SIZE),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::UInt8
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::GType
        )
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Container tags the decoder tolerates but nothing can encode
    #[inline]
    pub const fn is_container(self) -> bool {
        matches!(
            self,
            Self::GList | Self::GSList | Self::GHash | Self::Error | Self::Unichar
        )
    }
}

/// Map the type-handle tag onto the unsigned integer tag of the same width.
///
/// Every other tag is returned unchanged.
pub const fn remap_type_handle(tag: TypeTag) -> TypeTag {
    match tag {
        TypeTag::GType => match TYPE_HANDLE_SIZE {
            1 => TypeTag::UInt8,
            2 => TypeTag::UInt16,
            4 => TypeTag::UInt32,
            _ => TypeTag::UInt64,
        },
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayKind {
    #[serde(rename = "c")]
    C,
    #[serde(rename = "array")]
    Growable,
    #[serde(rename = "byte_array")]
    Bytes,
    #[serde(rename = "ptr_array")]
    Pointers,
}

impl ArrayKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Growable => "array",
            Self::Bytes => "byte_array",
            Self::Pointers => "ptr_array",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDescriptor {
    pub kind: ArrayKind,
    pub element: Box<TypeDescriptor>,
    pub fixed_length: Option<usize>,
    pub zero_terminated: bool,
    /// Index of the sibling parameter carrying the length
    pub length_parameter: Option<usize>,
}

impl ArrayDescriptor {
    pub fn new(kind: ArrayKind, element: TypeDescriptor) -> Self {
        Self {
            kind,
            element: Box::new(element),
            fixed_length: None,
            zero_terminated: false,
            length_parameter: None,
        }
    }

    pub fn c(element: TypeDescriptor) -> Self {
        Self::new(ArrayKind::C, element)
    }

    pub fn zero_terminated(mut self) -> Self {
        self.zero_terminated = true;
        self
    }

    pub fn with_fixed_length(mut self, length: usize) -> Self {
        self.fixed_length = Some(length);
        self
    }

    pub fn with_length_parameter(mut self, index: usize) -> Self {
        self.length_parameter = Some(index);
        self
    }
}

#[derive(Debug, Clone)]
pub enum InterfaceKind {
    Object,
    Struct,
    Union,
    Boxed,
    /// The runtime's boxed generic value container
    GenericValue,
    Enum { storage: TypeTag },
    Flags { storage: TypeTag },
    Callback { signature: Arc<CallableInfo> },
}

impl InterfaceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Boxed => "boxed",
            Self::GenericValue => "value",
            Self::Enum { .. } => "enum",
            Self::Flags { .. } => "flags",
            Self::Callback { .. } => "callback",
        }
    }
}

impl PartialEq for InterfaceKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Enum { storage: a }, Self::Enum { storage: b })
            | (Self::Flags { storage: a }, Self::Flags { storage: b }) => a == b,
            (Self::Callback { signature: a }, Self::Callback { signature: b }) => {
                a.name == b.name
            }
            _ => mem::discriminant(self) == mem::discriminant(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDescriptor {
    /// Qualified name, e.g. `Gtk.Window`
    pub name: String,
    pub kind: InterfaceKind,
    /// Instance size from metadata (struct/union only)
    pub size: usize,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>, kind: InterfaceKind, size: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDetail {
    None,
    Array(Box<ArrayDescriptor>),
    Interface(Arc<InterfaceDescriptor>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub tag: TypeTag,
    pub is_pointer: bool,
    pub detail: TypeDetail,
}

impl TypeDescriptor {
    pub fn scalar(tag: TypeTag) -> Self {
        Self {
            tag,
            is_pointer: false,
            detail: TypeDetail::None,
        }
    }

    pub fn void() -> Self {
        Self::scalar(TypeTag::Void)
    }

    pub fn utf8() -> Self {
        Self {
            tag: TypeTag::Utf8,
            is_pointer: true,
            detail: TypeDetail::None,
        }
    }

    pub fn array(array: ArrayDescriptor) -> Self {
        Self {
            tag: TypeTag::Array,
            is_pointer: true,
            detail: TypeDetail::Array(Box::new(array)),
        }
    }

    pub fn interface(iface: Arc<InterfaceDescriptor>, is_pointer: bool) -> Self {
        Self {
            tag: TypeTag::Interface,
            is_pointer,
            detail: TypeDetail::Interface(iface),
        }
    }

    pub fn array_info(&self) -> Option<&ArrayDescriptor> {
        match &self.detail {
            TypeDetail::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn interface_info(&self) -> Option<&InterfaceDescriptor> {
        match &self.detail {
            TypeDetail::Interface(iface) => Some(iface),
            _ => None,
        }
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        self.tag == TypeTag::Void && !self.is_pointer
    }

    /// Storage width of a value of this type, computed from metadata alone
    pub fn byte_size(&self) -> usize {
        if let Some(size) = self.tag.scalar_size() {
            return size;
        }

        match &self.detail {
            TypeDetail::Interface(iface) => match &iface.kind {
                InterfaceKind::Enum { storage } | InterfaceKind::Flags { storage } => {
                    if self.is_pointer {
                        POINTER_SIZE
                    } else {
                        storage.scalar_size().unwrap_or(4)
                    }
                }
                InterfaceKind::Struct | InterfaceKind::Union => {
                    if self.is_pointer {
                        POINTER_SIZE
                    } else {
                        iface.size
                    }
                }
                InterfaceKind::Object
                | InterfaceKind::Boxed
                | InterfaceKind::GenericValue
                | InterfaceKind::Callback { .. } => POINTER_SIZE,
            },
            _ => POINTER_SIZE,
        }
    }

    /// Name used when an argument of this type fails to convert
    pub fn diagnostic_name(&self) -> &'static str {
        self.tag.name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    #[inline]
    pub const fn is_in(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    #[inline]
    pub const fn is_out(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub direction: Direction,
    pub ty: TypeDescriptor,
    pub nullable: bool,
    pub caller_allocates: bool,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, direction: Direction, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            direction,
            ty,
            nullable: false,
            caller_allocates: false,
        }
    }

    pub fn input(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self::new(name, Direction::In, ty)
    }

    pub fn output(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self::new(name, Direction::Out, ty)
    }

    pub fn inout(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self::new(name, Direction::InOut, ty)
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn caller_allocates(mut self) -> Self {
        self.caller_allocates = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallableDescriptor {
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub return_type: TypeDescriptor,
    pub is_method: bool,
    /// Receiver type for methods; `None` means a plain object
    pub container: Option<Arc<InterfaceDescriptor>>,
    pub throws: bool,
}

impl CallableDescriptor {
    pub fn function(
        name: impl Into<String>,
        parameters: Vec<ParameterDescriptor>,
        return_type: TypeDescriptor,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            return_type,
            is_method: false,
            container: None,
            throws: false,
        }
    }

    pub fn method(mut self, container: Option<Arc<InterfaceDescriptor>>) -> Self {
        self.is_method = true;
        self.container = container;
        self
    }

    /// Indices of parameters that carry another array's length.
    ///
    /// Includes the length of an array return value.
    pub fn length_parameter_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .parameters
            .iter()
            .map(|param| &param.ty)
            .chain(std::iter::once(&self.return_type))
            .filter_map(|ty| ty.array_info().and_then(|array| array.length_parameter))
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(kind: InterfaceKind, size: usize) -> Arc<InterfaceDescriptor> {
        Arc::new(InterfaceDescriptor::new("Test.Thing", kind, size))
    }

    #[test]
    fn test_remap_type_handle_matches_width() {
        let remapped = remap_type_handle(TypeTag::GType);
        assert!(remapped.is_integer());
        assert!(!remapped.is_signed());
        assert_eq!(remapped.scalar_size(), Some(TYPE_HANDLE_SIZE));
        assert_eq!(remap_type_handle(TypeTag::Int32), TypeTag::Int32);
    }

    #[test]
    fn test_byte_size_rules() {
        assert_eq!(TypeDescriptor::scalar(TypeTag::Boolean).byte_size(), 4);
        assert_eq!(TypeDescriptor::scalar(TypeTag::Int16).byte_size(), 2);
        assert_eq!(TypeDescriptor::utf8().byte_size(), POINTER_SIZE);

        let point = iface(InterfaceKind::Struct, 16);
        assert_eq!(TypeDescriptor::interface(point.clone(), false).byte_size(), 16);
        assert_eq!(TypeDescriptor::interface(point, true).byte_size(), POINTER_SIZE);

        let flags = iface(InterfaceKind::Flags { storage: TypeTag::UInt16 }, 0);
        assert_eq!(TypeDescriptor::interface(flags, false).byte_size(), 2);

        let object = iface(InterfaceKind::Object, 0);
        assert_eq!(TypeDescriptor::interface(object, false).byte_size(), POINTER_SIZE);
    }

    #[test]
    fn test_length_parameter_indices() {
        let data = TypeDescriptor::array(
            ArrayDescriptor::c(TypeDescriptor::scalar(TypeTag::UInt8)).with_length_parameter(1),
        );
        let ret = TypeDescriptor::array(
            ArrayDescriptor::c(TypeDescriptor::utf8()).with_length_parameter(2),
        );
        let callable = CallableDescriptor::function(
            "read",
            vec![
                ParameterDescriptor::input("data", data),
                ParameterDescriptor::input("len", TypeDescriptor::scalar(TypeTag::UInt64)),
                ParameterDescriptor::output("count", TypeDescriptor::scalar(TypeTag::Int32)),
            ],
            ret,
        );
        assert_eq!(callable.length_parameter_indices(), vec![1, 2]);
    }

    #[test]
    fn test_tag_serde_names() {
        let tag: TypeTag = serde_json::from_str("\"uint8\"").unwrap();
        assert_eq!(tag, TypeTag::UInt8);
        let tag: TypeTag = serde_json::from_str("\"gtype\"").unwrap();
        assert_eq!(tag, TypeTag::GType);
        let kind: ArrayKind = serde_json::from_str("\"byte_array\"").unwrap();
        assert_eq!(kind, ArrayKind::Bytes);
    }
}
