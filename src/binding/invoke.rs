//! Invocation driver
//!
//! bind → dispatch → decode return value → extract outs → fold results.

use super::params::{bind, extract_out, get_array_length};
use crate::errors::{MarshalError, Result};
use crate::interop::bridge::Dispatcher;
use crate::interop::registry::Registry;
use crate::logging::{log_native_call, log_native_error};
use crate::marshal::decode::decode;
use crate::marshal::MarshalContext;
use crate::metadata::resolve::Resolver;
use crate::metadata::types::CallableDescriptor;
use crate::value::Value;

pub struct Invoker<'a> {
    registry: &'a dyn Registry,
    ctx: MarshalContext<'a>,
    dispatcher: &'a dyn Dispatcher,
}

impl<'a> Invoker<'a> {
    pub fn new(registry: &'a dyn Registry, ctx: MarshalContext<'a>, dispatcher: &'a dyn Dispatcher) -> Self {
        Self {
            registry,
            ctx,
            dispatcher,
        }
    }

    pub fn context(&self) -> &MarshalContext<'a> {
        &self.ctx
    }

    /// Call a resolved callable with host arguments
    pub fn call(&self, signature: &CallableDescriptor, args: &[Value], receiver: Option<&Value>) -> Result<Value> {
        let span = tracing::debug_span!(target: "binding", "call", callable = %signature.name);
        let _enter = span.enter();

        let frame = bind(signature, args, receiver, &self.ctx).map_err(|e| e.with_callable(&signature.name))?;
        let in_cells = frame.in_cells();
        let out_cells = frame.out_cells();

        log_native_call(&signature.name, in_cells.len(), out_cells.len());

        let returned = self
            .dispatcher
            .invoke(signature, &in_cells, &out_cells)
            .map_err(|e| {
                log_native_error(&signature.name, &e.to_string());
                MarshalError::native(e.domain, e.code, e.message).with_callable(&signature.name)
            })?;

        let mut results = Vec::new();

        if !signature.return_type.is_void() {
            let length = get_array_length(&frame, signature, &signature.return_type);
            // SAFETY: the dispatcher contract guarantees the returned cell
            // matches the declared return type
            let value = unsafe { decode(returned, &signature.return_type, length, &self.ctx) }
                .map_err(|e| e.for_parameter("return value").with_callable(&signature.name))?;
            results.push(value);
        }

        // SAFETY: out slots were filled by the dispatcher
        let outs = unsafe { extract_out(&frame, signature, &self.ctx) }
            .map_err(|e| e.with_callable(&signature.name))?;
        results.extend(outs);

        drop(frame);
        Ok(fold_results(results))
    }

    /// Resolve and call `namespace.name`
    pub fn call_function(&self, namespace: &str, name: &str, args: &[Value]) -> Result<Value> {
        let info = self.registry.find_function(namespace, name).ok_or_else(|| {
            MarshalError::unsupported("unresolved", "function")
                .with_hint(format!("'{}.{}' is not registered", namespace, name))
        })?;
        let signature = Resolver::new(self.registry).resolve_callable(&info)?;
        self.call(&signature, args, None)
    }

    /// Resolve and call a method of `interface` on `receiver`
    pub fn call_method(&self, interface: &str, name: &str, receiver: &Value, args: &[Value]) -> Result<Value> {
        let info = self.registry.find_method(interface, name).ok_or_else(|| {
            MarshalError::unsupported("unresolved", "method")
                .with_hint(format!("'{}::{}' is not registered", interface, name))
        })?;
        let signature = Resolver::new(self.registry).resolve_callable(&info)?;
        self.call(&signature, args, Some(receiver))
    }
}

/// Zero results → undefined, one → that value, more → a sequence
pub fn fold_results(mut results: Vec<Value>) -> Value {
    match results.len() {
        0 => Value::Undefined,
        1 => results.pop().unwrap_or(Value::Undefined),
        _ => Value::Array(results),
    }
}
