use crate::ioctl::{DrmModePropertyEnum, DRM_PROP_NAME_LEN};
use crate::result::Error;

use super::{ObjectId, PropertyId};

/// The kernel requests that property discovery and access are built on.
///
/// [`crate::Card`] implements this by issuing the corresponding ioctl
/// requests. Each method blocks until the kernel responds, and failures are
/// returned directly without any retrying.
///
/// The two query methods follow the kernel's convention for variable-length
/// results: they always report the full number of elements available, but
/// only fill the given buffers if they are large enough to hold all of
/// them. Pass empty slices to learn the counts.
pub trait PropertyDevice {
    /// Get the ids and current values of all properties attached to `obj`,
    /// returning how many there are.
    fn object_properties_raw(
        &self,
        obj: ObjectId,
        prop_ids: &mut [u32],
        prop_values: &mut [u64],
    ) -> Result<usize, Error>;

    /// Get the metadata for a single property, along with its value table
    /// and, for enums and bitmasks, its name table.
    fn property_meta_raw(
        &self,
        prop_id: PropertyId,
        values: &mut [u64],
        enum_blobs: &mut [DrmModePropertyEnum],
    ) -> Result<PropertyHeader, Error>;

    /// Change the value of one property on one object.
    fn set_object_property_raw(
        &self,
        obj: ObjectId,
        prop_id: PropertyId,
        value: u64,
    ) -> Result<(), Error>;
}

/// The fixed-size part of the kernel's description of a property.
#[derive(Debug, Clone)]
pub struct PropertyHeader {
    pub prop_id: PropertyId,
    pub flags: u32,
    /// The property name, padded with NUL bytes.
    pub name: [u8; DRM_PROP_NAME_LEN],
    pub count_values: usize,
    pub count_enum_blobs: usize,
}

impl PropertyHeader {
    /// Build a header with both counts zero and the name truncated to fit.
    ///
    /// This is mainly useful for implementations of [`PropertyDevice`]
    /// that don't talk to a real kernel.
    pub fn new(prop_id: PropertyId, flags: u32, name: &str) -> Self {
        Self {
            prop_id,
            flags,
            name: name_bytes(name),
            count_values: 0,
            count_enum_blobs: 0,
        }
    }
}

impl From<&crate::ioctl::DrmModeGetProperty> for PropertyHeader {
    fn from(value: &crate::ioctl::DrmModeGetProperty) -> Self {
        Self {
            prop_id: PropertyId(value.prop_id),
            flags: value.flags,
            name: value.name,
            count_values: value.count_values() as usize,
            count_enum_blobs: value.count_enum_blobs() as usize,
        }
    }
}

/// Encode a name into the kernel's NUL-padded fixed-length form, always
/// leaving room for at least one terminating NUL.
pub fn name_bytes(name: &str) -> [u8; DRM_PROP_NAME_LEN] {
    let mut raw = [0_u8; DRM_PROP_NAME_LEN];
    let len = core::cmp::min(raw.len() - 1, name.len());
    raw[..len].copy_from_slice(&name.as_bytes()[..len]);
    raw
}
