pub mod bridge;
pub mod codec;
pub mod config;
pub mod delegate;
pub mod deploy;
pub mod error;
pub mod gateway;
pub mod host;
pub mod install;
pub mod logging;
pub mod project;
pub mod registrar;
pub mod value;

pub use bridge::{Bridge, Deferred, HostChannel, HostRuntime, Rejection};
pub use config::Config;
pub use error::{Error, Result};
pub use gateway::{Gateway, GatewaySet, InternalGateway, LocalGateway, RemoteGateway};
pub use host::{BoxError, Capabilities, HostObject, UnsupportedMethod};
pub use logging::{LogFormat, LogHistory, Logger};
pub use registrar::{ENTRY_POINTS, EntryPoints, start};
pub use value::Value;
