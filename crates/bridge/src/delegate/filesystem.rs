use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    bridge::HostChannel,
    codec::{Wire, decode_envelope, decode_enveloped, decode_required},
    error::{Error, Result},
    host::FILE_SYSTEM,
    value::Value,
};

pub const DIR_MODE: u32 = 0o755;
pub const FILE_MODE: u32 = 0o644;

/// Storage the sandbox reaches through the host.
pub trait FileSystem: Send + Sync {
    /// # Errors
    /// [`Error::Delegate`] with the host's message when the file cannot be read.
    fn read_file(&self, path: &str) -> Result<String>;

    /// # Errors
    /// [`Error::Delegate`] with the host's message when the write fails.
    fn write_file(&self, path: &str, data: &str, mode: u32) -> Result<()>;

    /// Creates `path` and any missing parents; existing directories are fine.
    ///
    /// # Errors
    /// [`Error::Delegate`] with the host's message.
    fn mkdir_all(&self, path: &str, mode: u32) -> Result<()>;

    /// # Errors
    /// [`Error::Delegate`] with the host's message when `path` is missing.
    fn stat(&self, path: &str) -> Result<FileInfo>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub mode: u32,
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfoView {
    pub name: String,
    pub size: u64,
    pub mode: u32,
    /// Unix milliseconds.
    pub mod_time: i64,
    pub is_dir: bool,
}

impl Wire for FileInfo {
    type View = FileInfoView;

    fn to_view(&self) -> Result<Self::View> {
        Ok(FileInfoView {
            name: self.name.clone(),
            size: self.size,
            mode: self.mode,
            mod_time: self.modified.timestamp_millis(),
            is_dir: self.is_dir,
        })
    }

    fn from_view(view: Self::View) -> Result<Self> {
        let modified = DateTime::from_timestamp_millis(view.mod_time)
            .ok_or_else(|| Error::Decode(format!("modTime {} out of range", view.mod_time)))?;
        Ok(Self {
            name: view.name,
            size: view.size,
            mode: view.mode,
            modified,
            is_dir: view.is_dir,
        })
    }
}

/// [`FileSystem`] backed by the host's `flowFileSystem` object.
#[derive(Debug, Clone)]
pub struct HostFileSystem {
    channel: HostChannel,
}

impl HostFileSystem {
    #[must_use]
    pub const fn new(channel: HostChannel) -> Self {
        Self { channel }
    }

    fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.channel.call(FILE_SYSTEM, method, args)
    }
}

impl FileSystem for HostFileSystem {
    fn read_file(&self, path: &str) -> Result<String> {
        let raw = self.call("readFile", vec![path.into()])?;
        decode_required(&raw, "readFile")
    }

    fn write_file(&self, path: &str, data: &str, mode: u32) -> Result<()> {
        let raw = self.call(
            "writeFile",
            vec![path.into(), data.into(), u64::from(mode).into()],
        )?;
        decode_envelope(&raw).map(drop)
    }

    fn mkdir_all(&self, path: &str, mode: u32) -> Result<()> {
        let raw = self.call("mkdirAll", vec![path.into(), u64::from(mode).into()])?;
        decode_envelope(&raw).map(drop)
    }

    fn stat(&self, path: &str) -> Result<FileInfo> {
        let raw = self.call("stat", vec![path.into()])?;
        decode_enveloped(&raw, "stat")
    }
}

/// Reads `path`, mapping a host-reported failure to `None`.
///
/// # Errors
/// Anything other than a delegate fault, such as the host going away.
pub fn read_if_present(fs: &dyn FileSystem, path: &str) -> Result<Option<String>> {
    match fs.read_file(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(Error::Delegate(message)) => {
            tracing::debug!(path, %message, "file not readable");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
