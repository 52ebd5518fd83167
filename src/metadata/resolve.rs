//! Type descriptor resolution
//!
//! Turns raw registry records into descriptors: remaps the type-handle tag,
//! follows interface references and validates array length parameters.

use std::sync::Arc;

use super::types::{
    remap_type_handle, ArrayDescriptor, CallableDescriptor, InterfaceDescriptor, InterfaceKind,
    ParameterDescriptor, TypeDescriptor, TypeDetail, TypeTag,
};
use crate::errors::{MarshalError, Result};
use crate::interop::registry::{ArgInfo, CallableInfo, InfoType, RawTypeInfo, Registry};

pub struct Resolver<'a> {
    registry: &'a dyn Registry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self { registry }
    }

    pub fn resolve_type(&self, raw: &RawTypeInfo) -> Result<TypeDescriptor> {
        let tag = remap_type_handle(raw.tag);

        let detail = match tag {
            TypeTag::Array => {
                let array = raw.array.as_ref().ok_or_else(|| {
                    MarshalError::unsupported("array", "argument type")
                        .with_hint("array type carries no element description")
                })?;
                let element = self.resolve_type(&array.element)?;
                TypeDetail::Array(Box::new(ArrayDescriptor {
                    kind: array.array_type,
                    element: Box::new(element),
                    fixed_length: usize::try_from(array.fixed_size).ok(),
                    zero_terminated: array.zero_terminated,
                    length_parameter: usize::try_from(array.length).ok(),
                }))
            }
            TypeTag::Interface => {
                let name = raw.interface.as_deref().ok_or_else(|| {
                    MarshalError::unsupported("unresolved", "interface type")
                        .with_hint("interface type carries no name")
                })?;
                TypeDetail::Interface(self.resolve_interface(name)?)
            }
            _ => TypeDetail::None,
        };

        Ok(TypeDescriptor {
            tag,
            is_pointer: raw.is_pointer,
            detail,
        })
    }

    pub fn resolve_interface(&self, name: &str) -> Result<Arc<InterfaceDescriptor>> {
        let info = self.registry.lookup(name).ok_or_else(|| {
            MarshalError::unsupported("unresolved", "interface type")
                .with_hint(format!("interface '{}' is not registered", name))
        })?;

        let kind = match info.info_type {
            InfoType::Object | InfoType::Interface => InterfaceKind::Object,
            InfoType::Struct if info.is_value_container => InterfaceKind::GenericValue,
            InfoType::Union if info.is_value_container => InterfaceKind::GenericValue,
            InfoType::Struct => InterfaceKind::Struct,
            InfoType::Union => InterfaceKind::Union,
            InfoType::Boxed => InterfaceKind::Boxed,
            InfoType::Enum => InterfaceKind::Enum {
                storage: info.storage.unwrap_or(TypeTag::Int32),
            },
            InfoType::Flags => InterfaceKind::Flags {
                storage: info.storage.unwrap_or(TypeTag::Int32),
            },
            InfoType::Callback => {
                let signature = info.signature.as_ref().ok_or_else(|| {
                    MarshalError::unsupported("callback", "interface type")
                        .with_hint(format!("callback '{}' has no signature", name))
                })?;
                InterfaceKind::Callback {
                    signature: Arc::new(signature.clone()),
                }
            }
            other @ (InfoType::Invalid
            | InfoType::Function
            | InfoType::Constant
            | InfoType::Value
            | InfoType::Signal
            | InfoType::VFunc
            | InfoType::Property
            | InfoType::Field
            | InfoType::Arg
            | InfoType::Type
            | InfoType::Unresolved) => {
                return Err(MarshalError::unsupported(other.name(), "interface type"));
            }
        };

        Ok(Arc::new(InterfaceDescriptor::new(
            info.qualified_name(),
            kind,
            info.size,
        )))
    }

    pub fn resolve_parameter(&self, arg: &ArgInfo) -> Result<ParameterDescriptor> {
        Ok(ParameterDescriptor {
            name: arg.name.clone(),
            direction: arg.direction,
            ty: self.resolve_type(&arg.ty)?,
            nullable: arg.may_be_null,
            caller_allocates: arg.caller_allocates,
        })
    }

    pub fn resolve_callable(&self, info: &CallableInfo) -> Result<CallableDescriptor> {
        let parameters = info
            .args
            .iter()
            .map(|arg| self.resolve_parameter(arg))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.with_callable(&info.name))?;

        let return_type = self
            .resolve_type(&info.return_type)
            .map_err(|e| e.with_callable(&info.name))?;

        let container = match (&info.container, info.is_method) {
            (Some(name), true) => Some(
                self.resolve_interface(name)
                    .map_err(|e| e.with_callable(&info.name))?,
            ),
            _ => None,
        };

        let callable = CallableDescriptor {
            name: info.name.clone(),
            parameters,
            return_type,
            is_method: info.is_method,
            container,
            throws: info.throws,
        };

        validate_length_parameters(&callable)?;
        Ok(callable)
    }
}

/// Every array length parameter must be an integer, and an array the caller
/// passes in needs a length that is also passed in.
fn validate_length_parameters(callable: &CallableDescriptor) -> Result<()> {
    let arrays = callable
        .parameters
        .iter()
        .map(|param| (param.direction.is_in(), &param.ty))
        .chain(std::iter::once((false, &callable.return_type)));

    for (is_input, ty) in arrays {
        let Some(index) = ty.array_info().and_then(|array| array.length_parameter) else {
            continue;
        };
        let invalid = |hint: String| {
            MarshalError::unsupported("array", "argument type")
                .with_hint(hint)
                .with_callable(&callable.name)
        };

        let param = match callable.parameters.get(index) {
            Some(param) if param.ty.tag.is_integer() => param,
            _ => {
                return Err(invalid(format!(
                    "length parameter {} is not an integer argument",
                    index
                )))
            }
        };

        if is_input && !param.direction.is_in() {
            return Err(invalid(format!(
                "length parameter '{}' of an input array is output-only",
                param.name
            )));
        }
    }
    Ok(())
}
