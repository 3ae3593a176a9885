use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use ascii::AsciiStr;

use crate::ioctl::{self, DrmModePropertyEnum};
use crate::result::{Error, PropertyError};
use crate::util::{fill_variable_length, query_variable_length};

use super::{BlobId, CrtcId, FramebufferId, ObjectId, PropertyDevice, PropertyHeader, PropertyId};

/// A property id and value pair as reported for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeProp {
    pub prop_id: PropertyId,
    pub value: u64,
}

/// Fetch the ids and current values of every property attached to `obj`.
pub fn object_property_values(
    device: &dyn PropertyDevice,
    obj: ObjectId,
) -> Result<Vec<ModeProp>, Error> {
    let (ids, values) = query_variable_length::<u32, u64, _>(|ids, values| {
        let count = device.object_properties_raw(obj, ids, values)?;
        Ok((count, count))
    })?;
    Ok(core::iter::zip(ids, values)
        .map(|(id, value)| ModeProp {
            prop_id: PropertyId(id),
            value,
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PropertyType {
    Range = ioctl::DRM_MODE_PROP_RANGE,
    Enum = ioctl::DRM_MODE_PROP_ENUM,
    Blob = ioctl::DRM_MODE_PROP_BLOB,
    Bitmask = ioctl::DRM_MODE_PROP_BITMASK,
    Object = ioctl::DRM_MODE_PROP_OBJECT,
    SignedRange = ioctl::DRM_MODE_PROP_SIGNED_RANGE,
}

impl PropertyType {
    /// Decide the type of a property from its raw flags and the number of
    /// enum blob entries the kernel reported for it.
    ///
    /// Properties with enum blob entries are enums if flagged as such and
    /// otherwise bitmasks. The remaining legacy types are checked before
    /// the extended type field. Returns `None` for any other combination.
    pub fn classify(flags: u32, count_enum_blobs: usize) -> Option<Self> {
        if count_enum_blobs != 0 {
            return if flags & ioctl::DRM_MODE_PROP_ENUM != 0 {
                Some(Self::Enum)
            } else if flags & ioctl::DRM_MODE_PROP_BITMASK != 0 {
                Some(Self::Bitmask)
            } else {
                None
            };
        }
        if flags & ioctl::DRM_MODE_PROP_RANGE != 0 {
            return Some(Self::Range);
        }
        if flags & ioctl::DRM_MODE_PROP_BLOB != 0 {
            return Some(Self::Blob);
        }
        match flags & ioctl::DRM_MODE_PROP_EXTENDED_TYPE {
            ioctl::DRM_MODE_PROP_OBJECT => Some(Self::Object),
            ioctl::DRM_MODE_PROP_SIGNED_RANGE => Some(Self::SignedRange),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PropertyType::Range => "range",
            PropertyType::Enum => "enum",
            PropertyType::Blob => "blob",
            PropertyType::Bitmask => "bitmask",
            PropertyType::Object => "object",
            PropertyType::SignedRange => "signed-range",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The type of a property along with the metadata the kernel gives for
/// that type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Range { min: u64, max: u64 },
    /// Maps each valid value to its symbolic name.
    Enum { members: BTreeMap<u64, String> },
    /// Maps bit indices to the name of the flag each bit represents.
    Bitmask { members: BTreeMap<u64, String> },
    /// The value is the id of a property blob, or zero.
    Blob,
    /// The value is the id of an object of type `object_type`, or zero.
    Object { object_type: u32 },
    SignedRange { min: i64, max: i64 },
}

impl PropertyKind {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyKind::Range { .. } => PropertyType::Range,
            PropertyKind::Enum { .. } => PropertyType::Enum,
            PropertyKind::Bitmask { .. } => PropertyType::Bitmask,
            PropertyKind::Blob => PropertyType::Blob,
            PropertyKind::Object { .. } => PropertyType::Object,
            PropertyKind::SignedRange { .. } => PropertyType::SignedRange,
        }
    }

    fn fetch(
        device: &dyn PropertyDevice,
        header: &PropertyHeader,
        typ: PropertyType,
    ) -> Result<Self, PropertyError> {
        let prop_id = header.prop_id.0;
        Ok(match typ {
            PropertyType::Enum | PropertyType::Bitmask => {
                if header.count_values != header.count_enum_blobs {
                    return Err(inconsistent(prop_id, "value count differs from name count"));
                }
                let (values, blobs) = fetch_tables(device, header)?;
                if values.len() != blobs.len() {
                    return Err(inconsistent(prop_id, "value count differs from name count"));
                }
                let mut members = BTreeMap::new();
                for (value, blob) in core::iter::zip(values, blobs) {
                    let name = decode_name(prop_id, &blob.name)?;
                    if members.insert(value, name).is_some() {
                        return Err(inconsistent(prop_id, "duplicate member value"));
                    }
                }
                if typ == PropertyType::Enum {
                    PropertyKind::Enum { members }
                } else {
                    PropertyKind::Bitmask { members }
                }
            }
            PropertyType::Range => {
                let [min, max] = fetch_values::<2>(device, header)?;
                PropertyKind::Range { min, max }
            }
            PropertyType::SignedRange => {
                let [min, max] = fetch_values::<2>(device, header)?;
                PropertyKind::SignedRange {
                    min: min as i64,
                    max: max as i64,
                }
            }
            PropertyType::Object => {
                let [object_type] = fetch_values::<1>(device, header)?;
                PropertyKind::Object {
                    object_type: object_type as u32,
                }
            }
            PropertyType::Blob => PropertyKind::Blob,
        })
    }
}

fn fetch_tables(
    device: &dyn PropertyDevice,
    header: &PropertyHeader,
) -> Result<(Vec<u64>, Vec<DrmModePropertyEnum>), Error> {
    let prop_id = header.prop_id;
    fill_variable_length(
        (header.count_values, header.count_enum_blobs),
        |values, blobs| {
            let h = device.property_meta_raw(prop_id, values, blobs)?;
            Ok((h.count_values, h.count_enum_blobs))
        },
    )
}

/// Fetch a value table that must have exactly `N` entries.
fn fetch_values<const N: usize>(
    device: &dyn PropertyDevice,
    header: &PropertyHeader,
) -> Result<[u64; N], PropertyError> {
    const MSG: &str = "unexpected number of values";
    if header.count_values != N {
        return Err(inconsistent(header.prop_id.0, MSG));
    }
    let (values, _) = fetch_tables(device, header)?;
    <[u64; N]>::try_from(values).map_err(|_| inconsistent(header.prop_id.0, MSG))
}

fn inconsistent(prop_id: u32, reason: &'static str) -> PropertyError {
    PropertyError::InconsistentMetadata { prop_id, reason }
}

/// Decode one of the kernel's NUL-padded name fields, which are always
/// expected to be ASCII.
fn decode_name(prop_id: u32, raw: &[u8]) -> Result<String, PropertyError> {
    let raw = raw.split(|c| *c == 0).next().unwrap_or_default();
    let name =
        AsciiStr::from_ascii(raw).map_err(|_| inconsistent(prop_id, "name is not ASCII"))?;
    Ok(name.as_str().to_string())
}

/// One property attached to one object.
///
/// The name, type and type metadata are captured when the property is
/// created, while its value is fetched from the kernel each time it's
/// requested.
pub struct Property<'dev> {
    device: &'dev dyn PropertyDevice,
    id: PropertyId,
    name: String,
    object: ObjectId,
    flags: u32,
    kind: PropertyKind,
}

impl<'dev> Property<'dev> {
    /// Describe property `prop_id` as attached to `object`.
    ///
    /// If the caller already has the property's header from an earlier
    /// metadata request then it can pass it as `meta` to avoid repeating
    /// that request. Additional requests are made to fetch the value and
    /// name tables for those types that have them.
    pub fn new(
        device: &'dev dyn PropertyDevice,
        prop_id: PropertyId,
        object: ObjectId,
        meta: Option<PropertyHeader>,
    ) -> Result<Self, PropertyError> {
        let header = match meta {
            Some(header) => header,
            None => device.property_meta_raw(prop_id, &mut [], &mut [])?,
        };
        let typ = PropertyType::classify(header.flags, header.count_enum_blobs).ok_or(
            PropertyError::UnsupportedKind {
                prop_id: prop_id.0,
                flags: header.flags,
            },
        )?;
        let name = decode_name(prop_id.0, &header.name)?;
        let kind = PropertyKind::fetch(device, &header, typ)?;
        Ok(Self {
            device,
            id: prop_id,
            name,
            object,
            flags: header.flags,
            kind,
        })
    }

    #[inline]
    pub fn id(&self) -> PropertyId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The object this property was fetched for.
    #[inline]
    pub fn object(&self) -> ObjectId {
        self.object
    }

    #[inline]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    #[inline]
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    #[inline]
    pub fn property_type(&self) -> PropertyType {
        self.kind.property_type()
    }

    /// One of `range`, `enum`, `bitmask`, `blob`, `object` or
    /// `signed-range`.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.property_type().name()
    }

    #[inline]
    pub fn is_immutable(&self) -> bool {
        (self.flags & ioctl::DRM_MODE_PROP_IMMUTABLE) != 0
    }

    #[inline]
    pub fn is_mutable(&self) -> bool {
        !self.is_immutable()
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        (self.flags & ioctl::DRM_MODE_PROP_PENDING) != 0
    }

    /// Only meaningful when the atomic client capability is enabled.
    #[inline]
    pub fn is_atomic(&self) -> bool {
        (self.flags & ioctl::DRM_MODE_PROP_ATOMIC) != 0
    }

    /// The valid members of an enum, or the named bits of a bitmask.
    pub fn members(&self) -> Option<&BTreeMap<u64, String>> {
        match &self.kind {
            PropertyKind::Enum { members } | PropertyKind::Bitmask { members } => Some(members),
            _ => None,
        }
    }

    /// The name of an enum member, if this is an enum and `raw` is one of
    /// its valid values.
    pub fn member_name(&self, raw: u64) -> Option<&str> {
        match &self.kind {
            PropertyKind::Enum { members } => members.get(&raw).map(String::as_str),
            _ => None,
        }
    }

    /// The names of the bits set in `raw`, if this is a bitmask. Bits
    /// without a name are skipped.
    pub fn bitmask_names(&self, raw: u64) -> Vec<&str> {
        let PropertyKind::Bitmask { members } = &self.kind else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|(bit, _)| **bit < 64 && (raw & (1_u64 << **bit)) != 0)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// The inclusive bounds of an unsigned range.
    pub fn range(&self) -> Option<(u64, u64)> {
        match self.kind {
            PropertyKind::Range { min, max } => Some((min, max)),
            _ => None,
        }
    }

    /// The inclusive bounds of a signed range.
    pub fn signed_range(&self) -> Option<(i64, i64)> {
        match self.kind {
            PropertyKind::SignedRange { min, max } => Some((min, max)),
            _ => None,
        }
    }

    /// Fetch the raw value of this property from the kernel.
    ///
    /// This re-reads every property of the owning object and so fails with
    /// [`PropertyError::IdNotFound`] if the property has since been
    /// detached from it.
    pub fn get(&self) -> Result<u64, PropertyError> {
        object_property_values(self.device, self.object)?
            .into_iter()
            .find(|prop| prop.prop_id == self.id)
            .map(|prop| prop.value)
            .ok_or(PropertyError::IdNotFound {
                prop_id: self.id.0,
                object: self.object,
            })
    }

    /// Set the raw value of this property.
    ///
    /// Immutable properties are rejected without making any request to
    /// the kernel.
    pub fn set(&self, raw: u64) -> Result<(), PropertyError> {
        self.check_mutable()?;
        self.device
            .set_object_property_raw(self.object, self.id, raw)?;
        Ok(())
    }

    /// Fetch the current value, decoded.
    pub fn value(&self) -> Result<u64, PropertyError> {
        Ok(self.decode(self.get()?))
    }

    /// Encode and set a new value.
    pub fn set_value(&self, value: impl AsRawPropertyValue) -> Result<(), PropertyError> {
        self.check_mutable()?;
        let raw = self.encode(&value);
        self.set(raw)
    }

    /// Decoding is currently the identity for all property types: enum
    /// values remain numeric, and [`Self::member_name`] gives their names.
    #[inline]
    pub fn decode(&self, raw: u64) -> u64 {
        raw
    }

    #[inline]
    pub fn encode(&self, value: &impl AsRawPropertyValue) -> u64 {
        value.as_raw_property_value()
    }

    fn check_mutable(&self) -> Result<(), PropertyError> {
        if self.is_immutable() {
            return Err(PropertyError::Immutable {
                prop_id: self.id.0,
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Property<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("object", &self.object)
            .field("flags", &self.flags)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Trait implemented by types that can be borrowed as raw property values.
///
/// For types that represent references to other objects already known by
/// the kernel, such as property blobs, the caller must keep the original
/// object live for as long as the result is being used in requests to the
/// kernel.
pub trait AsRawPropertyValue {
    fn as_raw_property_value(&self) -> u64;
}

macro_rules! trivial_as_property_value {
    ($t:ty) => {
        impl AsRawPropertyValue for $t {
            #[inline(always)]
            fn as_raw_property_value(&self) -> u64 {
                *self as u64
            }
        }
    };
}

trivial_as_property_value!(u64);
trivial_as_property_value!(u32);
trivial_as_property_value!(u16);
trivial_as_property_value!(u8);
trivial_as_property_value!(usize);
trivial_as_property_value!(i64);
trivial_as_property_value!(i32);
trivial_as_property_value!(i16);
trivial_as_property_value!(i8);
trivial_as_property_value!(isize);
trivial_as_property_value!(bool);

macro_rules! object_id_as_property_value {
    ($t:ty) => {
        impl AsRawPropertyValue for $t {
            #[inline(always)]
            fn as_raw_property_value(&self) -> u64 {
                self.0 as u64
            }
        }
    };
}

object_id_as_property_value!(BlobId);
object_id_as_property_value!(CrtcId);
object_id_as_property_value!(FramebufferId);
