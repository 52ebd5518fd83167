//! Introspection registry
//!
//! Raw metadata records as the namespace loader produces them, and an
//! in-memory repository that serves them to the resolver. Interface
//! references are fully qualified (`Namespace.Name`).

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::metadata::types::{ArrayKind, Direction, TypeTag};

fn minus_one() -> i32 {
    -1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArrayInfo {
    pub array_type: ArrayKind,
    pub element: Box<RawTypeInfo>,
    /// `-1` when the array has no fixed size
    #[serde(default = "minus_one")]
    pub fixed_size: i32,
    #[serde(default)]
    pub zero_terminated: bool,
    /// `-1` when no sibling argument carries the length
    #[serde(default = "minus_one")]
    pub length: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTypeInfo {
    pub tag: TypeTag,
    #[serde(default)]
    pub is_pointer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array: Option<RawArrayInfo>,
}

impl RawTypeInfo {
    pub fn scalar(tag: TypeTag) -> Self {
        Self {
            tag,
            is_pointer: false,
            interface: None,
            array: None,
        }
    }

    pub fn interface(name: impl Into<String>, is_pointer: bool) -> Self {
        Self {
            tag: TypeTag::Interface,
            is_pointer,
            interface: Some(name.into()),
            array: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoType {
    Invalid,
    Function,
    Callback,
    Struct,
    Boxed,
    Enum,
    Flags,
    Object,
    Interface,
    Constant,
    Union,
    Value,
    Signal,
    VFunc,
    Property,
    Field,
    Arg,
    Type,
    Unresolved,
}

impl InfoType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Function => "function",
            Self::Callback => "callback",
            Self::Struct => "struct",
            Self::Boxed => "boxed",
            Self::Enum => "enum",
            Self::Flags => "flags",
            Self::Object => "object",
            Self::Interface => "interface",
            Self::Constant => "constant",
            Self::Union => "union",
            Self::Value => "value",
            Self::Signal => "signal",
            Self::VFunc => "vfunc",
            Self::Property => "property",
            Self::Field => "field",
            Self::Arg => "arg",
            Self::Type => "type",
            Self::Unresolved => "unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgInfo {
    pub name: String,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    #[serde(rename = "type")]
    pub ty: RawTypeInfo,
    #[serde(default)]
    pub may_be_null: bool,
    #[serde(default)]
    pub caller_allocates: bool,
}

fn default_direction() -> Direction {
    Direction::In
}

fn void_type() -> RawTypeInfo {
    RawTypeInfo::scalar(TypeTag::Void)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallableInfo {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgInfo>,
    #[serde(default = "void_type")]
    pub return_type: RawTypeInfo,
    #[serde(default)]
    pub is_method: bool,
    #[serde(default)]
    pub throws: bool,
    /// Qualified name of the receiver's interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub info_type: InfoType,
    #[serde(default)]
    pub size: usize,
    /// Integer storage of an enum or flags type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<TypeTag>,
    /// Marks the runtime's generic value container struct
    #[serde(default)]
    pub is_value_container: bool,
    #[serde(default)]
    pub methods: Vec<CallableInfo>,
    /// Callback signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<CallableInfo>,
}

impl InterfaceInfo {
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub namespace: String,
    pub version: String,
    #[serde(default)]
    pub interfaces: Vec<InterfaceInfo>,
    #[serde(default)]
    pub functions: Vec<CallableInfo>,
}

/// Read access to introspection metadata
pub trait Registry {
    fn lookup(&self, name: &str) -> Option<Arc<InterfaceInfo>>;

    fn find_function(&self, namespace: &str, name: &str) -> Option<Arc<CallableInfo>>;

    fn find_method(&self, interface: &str, name: &str) -> Option<Arc<CallableInfo>>;
}

#[derive(Debug)]
pub enum RegistryError {
    Io(String),
    Parse(String),
    VersionConflict {
        namespace: String,
        loaded: String,
        requested: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "Failed to read namespace: {}", msg),
            Self::Parse(msg) => write!(f, "Failed to parse namespace: {}", msg),
            Self::VersionConflict { namespace, loaded, requested } => write!(
                f,
                "Namespace '{}' is already loaded at version {}, cannot load version {}",
                namespace, loaded, requested
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

/// In-memory registry populated from namespace descriptions
#[derive(Default)]
pub struct Repository {
    interfaces: DashMap<String, Arc<InterfaceInfo>>,
    functions: DashMap<String, Arc<CallableInfo>>,
    methods: DashMap<String, Arc<CallableInfo>>,
    loaded: RwLock<Vec<(String, String)>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every interface and function of a namespace.
    ///
    /// Loading the same namespace and version again is a no-op.
    pub fn load_namespace(&self, info: NamespaceInfo) -> Result<(), RegistryError> {
        {
            let mut loaded = self.loaded.write();
            if let Some((_, version)) = loaded.iter().find(|(ns, _)| *ns == info.namespace) {
                if *version == info.version {
                    return Ok(());
                }
                return Err(RegistryError::VersionConflict {
                    namespace: info.namespace.clone(),
                    loaded: version.clone(),
                    requested: info.version.clone(),
                });
            }
            loaded.push((info.namespace.clone(), info.version.clone()));
        }

        let NamespaceInfo {
            namespace,
            version,
            interfaces,
            functions,
        } = info;

        for mut iface in interfaces {
            if iface.namespace.is_empty() {
                iface.namespace = namespace.clone();
            }
            let qualified = iface.qualified_name();
            for method in &iface.methods {
                let mut method = method.clone();
                if method.is_method && method.container.is_none() {
                    method.container = Some(qualified.clone());
                }
                self.methods
                    .insert(format!("{}::{}", qualified, method.name), Arc::new(method));
            }
            self.interfaces.insert(qualified, Arc::new(iface));
        }

        let count = functions.len();
        for function in functions {
            self.functions
                .insert(format!("{}.{}", namespace, function.name), Arc::new(function));
        }

        tracing::debug!(
            target: "registry",
            namespace = %namespace,
            version = %version,
            functions = count,
            "Loaded namespace"
        );

        Ok(())
    }

    pub fn load_json(&self, json: &str) -> Result<(), RegistryError> {
        let info: NamespaceInfo =
            serde_json::from_str(json).map_err(|e| RegistryError::Parse(e.to_string()))?;
        self.load_namespace(info)
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Io(format!("{}: {}", path.display(), e)))?;
        self.load_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let repository = Self::new();
        repository.load_json(json)?;
        Ok(repository)
    }

    pub fn version_of(&self, namespace: &str) -> Option<String> {
        self.loaded
            .read()
            .iter()
            .find(|(ns, _)| ns == namespace)
            .map(|(_, version)| version.clone())
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.loaded.read().iter().map(|(ns, _)| ns.clone()).collect()
    }
}

impl Registry for Repository {
    fn lookup(&self, name: &str) -> Option<Arc<InterfaceInfo>> {
        self.interfaces.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn find_function(&self, namespace: &str, name: &str) -> Option<Arc<CallableInfo>> {
        self.functions
            .get(&format!("{}.{}", namespace, name))
            .map(|entry| Arc::clone(entry.value()))
    }

    fn find_method(&self, interface: &str, name: &str) -> Option<Arc<CallableInfo>> {
        self.methods
            .get(&format!("{}::{}", interface, name))
            .map(|entry| Arc::clone(entry.value()))
    }
}
