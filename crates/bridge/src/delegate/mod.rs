//! Sandbox-side stand-ins for host capabilities.

pub mod filesystem;
pub mod prompter;

pub use filesystem::{FileInfo, FileSystem, HostFileSystem};
pub use prompter::{DeploymentData, HostPrompter, Prompter, PrompterAccount, Validator};
