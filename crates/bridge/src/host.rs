use std::{collections::HashMap, fmt, sync::Arc};

use crate::value::Value;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub const FILE_SYSTEM: &str = "flowFileSystem";
pub const PROMPTER: &str = "prompter";

/// Capability name of the remote gateway object for `network`.
#[must_use]
pub fn gateway_capability(network: &str) -> String {
    format!("{network}Gateway")
}

/// An object implemented by the host and invoked by name from the sandbox.
///
/// Calls run on the host thread and must not block it; any waiting has to
/// happen inside the returned future.
#[async_trait::async_trait(?Send)]
pub trait HostObject: 'static {
    async fn call(&self, method: &str, args: Vec<Value>) -> core::result::Result<Value, BoxError>;
}

#[async_trait::async_trait(?Send)]
impl<T: HostObject + ?Sized> HostObject for Arc<T> {
    async fn call(&self, method: &str, args: Vec<Value>) -> core::result::Result<Value, BoxError> {
        (**self).call(method, args).await
    }
}

/// Returned by a host object that does not provide `method`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("method {method} is not supported by this host object")]
pub struct UnsupportedMethod {
    pub method: String,
}

impl UnsupportedMethod {
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
        }
    }
}

/// Directory of host objects the sandbox may invoke.
///
/// Built once by the embedder and handed to the host runtime; nothing is ever
/// registered globally.
#[derive(Default, Clone)]
pub struct Capabilities {
    objects: HashMap<String, Arc<dyn HostObject>>,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.objects.keys().collect();
        names.sort();
        f.debug_struct("Capabilities")
            .field("objects", &names)
            .finish()
    }
}

impl Capabilities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, object: impl HostObject) -> Self {
        self.objects.insert(name.into(), Arc::new(object));
        self
    }

    #[must_use]
    pub fn with_file_system(self, object: impl HostObject) -> Self {
        self.with(FILE_SYSTEM, object)
    }

    #[must_use]
    pub fn with_prompter(self, object: impl HostObject) -> Self {
        self.with(PROMPTER, object)
    }

    #[must_use]
    pub fn with_network_gateway(self, network: &str, object: impl HostObject) -> Self {
        self.with(gateway_capability(network), object)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn HostObject>> {
        self.objects.get(name).cloned()
    }
}
