use alloc::string::String;
use core::fmt;

use crate::modeset::ObjectId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    Invalid,
    NonExist,
    SystemMem,
    GraphicsMem,
    Permission,
    Disconnected,
    NotSupported,
    RemoteFailure,
    Died,
    Other(linux_io::result::Error),
}

impl From<linux_io::result::Error> for Error {
    fn from(value: linux_io::result::Error) -> Self {
        match value {
            linux_io::result::EINVAL => Self::Invalid,
            linux_io::result::ENOENT => Self::NonExist,
            linux_io::result::ENOMEM => Self::SystemMem,
            linux_io::result::ENOSPC => Self::SystemMem,
            linux_io::result::EPERM | linux_io::result::EACCES => Self::Permission,
            linux_io::result::ENODEV => Self::Disconnected,
            linux_io::result::EOPNOTSUPP => Self::NotSupported,
            linux_io::result::ENXIO => Self::RemoteFailure,
            linux_io::result::EIO => Self::Died,
            _ => Self::Other(value),
        }
    }
}

impl Into<linux_io::result::Error> for Error {
    fn into(self) -> linux_io::result::Error {
        match self {
            Error::Invalid => linux_io::result::EINVAL,
            Error::NonExist => linux_io::result::ENOENT,
            Error::SystemMem => linux_io::result::ENOMEM,
            Error::GraphicsMem => linux_io::result::ENOSPC,
            Error::Permission => linux_io::result::EPERM,
            Error::Disconnected => linux_io::result::ENODEV,
            Error::NotSupported => linux_io::result::EOPNOTSUPP,
            Error::RemoteFailure => linux_io::result::ENXIO,
            Error::Died => linux_io::result::EIO,
            Error::Other(v) => v,
        }
    }
}

impl From<alloc::collections::TryReserveError> for Error {
    #[inline(always)]
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Self::SystemMem
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Invalid => f.write_str("invalid argument"),
            Error::NonExist => f.write_str("no such object"),
            Error::SystemMem => f.write_str("out of system memory"),
            Error::GraphicsMem => f.write_str("out of graphics memory"),
            Error::Permission => f.write_str("permission denied"),
            Error::Disconnected => f.write_str("device disconnected"),
            Error::NotSupported => f.write_str("operation not supported"),
            Error::RemoteFailure => f.write_str("remote device failure"),
            Error::Died => f.write_str("device I/O failure"),
            Error::Other(e) => write!(f, "errno {}", e.0),
        }
    }
}

impl core::error::Error for Error {}

#[derive(Debug)]
pub enum InitError {
    NotDrmCard,
    Other(linux_io::result::Error),
}

impl Into<linux_io::result::Error> for InitError {
    fn into(self) -> linux_io::result::Error {
        match self {
            InitError::NotDrmCard => linux_io::result::ENOTTY,
            InitError::Other(e) => e,
        }
    }
}

impl From<linux_io::result::Error> for InitError {
    fn from(value: linux_io::result::Error) -> Self {
        match value {
            linux_io::result::ENOTTY => InitError::NotDrmCard,
            _ => InitError::Other(value),
        }
    }
}

/// Errors from discovering, reading or writing object properties.
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    /// The kernel rejected one of the underlying requests.
    #[error("device request failed: {0}")]
    Device(#[from] Error),

    /// The kernel described a property in a way that contradicts itself,
    /// such as an enum whose value table and name table differ in length.
    #[error("property {prop_id} has inconsistent metadata: {reason}")]
    InconsistentMetadata { prop_id: u32, reason: &'static str },

    /// The property's flags match none of the known property types.
    #[error("property {prop_id} has unsupported type flags {flags:#x}")]
    UnsupportedKind { prop_id: u32, flags: u32 },

    /// Attempted to write a property that the kernel reports as immutable.
    #[error("can't set immutable property {name:?}")]
    Immutable { prop_id: u32, name: String },

    /// No property with the given name is attached to the object.
    #[error("no such property: {0}")]
    NameNotFound(String),

    /// The property is no longer attached to its object.
    #[error("property {prop_id} is not attached to {object:?}")]
    IdNotFound { prop_id: u32, object: ObjectId },
}

impl PropertyError {
    /// Returns true for both of the "not found" conditions, as opposed to
    /// failures talking to the device.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NameNotFound(_) | Self::IdNotFound { .. })
    }
}
