//! Discover, inspect and update the properties that the Linux Direct
//! Rendering Manager attaches to mode-setting objects such as connectors,
//! encoders, CRTCs and planes.
//!
//! Open a [`Card`], then use [`Card::object_properties`] to take a
//! [`modeset::PropertySet`] snapshot of an object's properties. Each
//! [`modeset::Property`] in the snapshot knows its name and type and can
//! read or write its live value.
#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

/// Low-level `ioctl`-based access to DRM devices.
pub mod ioctl;
/// Mode-setting objects and their properties.
pub mod modeset;
pub mod result;

mod util;

use modeset::{
    CardResources, CrtcId, EncoderId, EncoderState, FramebufferId, ObjectId, PlaneId,
    PropertyDevice, PropertyHeader, PropertyId, PropertySet,
};
use result::{Error, InitError, PropertyError};

#[repr(transparent)]
pub struct Card {
    f: linux_io::File<ioctl::DrmCardDevice>,
}

impl Card {
    pub fn open(path: &core::ffi::CStr) -> Result<Self, InitError> {
        let f = linux_io::File::open(path, linux_io::OpenOptions::read_write())?;
        Self::from_file(f)
    }

    pub fn from_file<D>(f: linux_io::File<D>) -> Result<Self, InitError> {
        // We use the VERSION ioctl to decide whether this file seems to
        // be a DRM card device, which requires first optimistically
        // converting it so that the request constant is compatible.
        // Safety: We'll return this new f only if our ioctl probe is
        // successful, which suggests that this is a DRM card device.
        let f: linux_io::File<ioctl::DrmCardDevice> = unsafe { f.to_device(ioctl::DrmCardDevice) };
        let mut v = ioctl::DrmVersion::zeroed();
        f.ioctl(ioctl::DRM_IOCTL_VERSION, &mut v)?;
        Ok(Self { f })
    }

    /// # Safety
    ///
    /// The given file must be a DRM card device.
    pub unsafe fn from_file_unchecked<D>(f: linux_io::File<D>) -> Self {
        let f: linux_io::File<ioctl::DrmCardDevice> = unsafe { f.to_device(ioctl::DrmCardDevice) };
        Self { f }
    }

    /// Become the DRM master for this card, which the kernel requires
    /// before it will accept most property changes.
    pub fn into_master(self) -> Result<CardMaster, (Error, Self)> {
        if let Err(e) = self.f.ioctl(ioctl::DRM_IOCTL_SET_MASTER, ()) {
            return Err((e.into(), self));
        }
        Ok(CardMaster { card: self })
    }

    pub fn close(self) -> linux_io::result::Result<()> {
        let f = self.take_file();
        f.close()
    }

    pub fn take_file(self) -> linux_io::File<ioctl::DrmCardDevice> {
        self.f
    }

    pub fn borrow_file(&self) -> &linux_io::File<ioctl::DrmCardDevice> {
        &self.f
    }

    pub fn set_client_cap(&self, cap: ClientCap, value: u64) -> Result<(), Error> {
        let mut tmp = ioctl::DrmSetClientCap::zeroed();
        tmp.capability = cap.into();
        tmp.value = value;
        self.f.ioctl(ioctl::DRM_IOCTL_SET_CLIENT_CAP, &tmp)?;
        Ok(())
    }

    pub fn resources(&self) -> Result<CardResources, Error> {
        // Four arrays, which `util::fill_variable_length` can't carry.
        for _ in 0..util::MAX_FETCH_ATTEMPTS {
            let mut tmp = ioctl::DrmModeCardRes::zeroed();
            self.f.ioctl(ioctl::DRM_IOCTL_MODE_GETRESOURCES, &mut tmp)?;

            let mut fb_ids = util::vec_with_len::<u32>(tmp.count_fbs() as usize)?;
            let mut crtc_ids = util::vec_with_len::<u32>(tmp.count_crtcs() as usize)?;
            let mut connector_ids = util::vec_with_len::<u32>(tmp.count_connectors() as usize)?;
            let mut encoder_ids = util::vec_with_len::<u32>(tmp.count_encoders() as usize)?;

            let mut res = ioctl::DrmModeCardRes::zeroed();
            // Safety: each pointer is paired with the length of its vec, and
            // the vecs outlive the request below.
            unsafe {
                res.set_ptrs(ioctl::DrmModeCardResPtrs {
                    fb_ids: (fb_ids.as_mut_ptr(), fb_ids.len() as u32),
                    crtc_ids: (crtc_ids.as_mut_ptr(), crtc_ids.len() as u32),
                    connector_ids: (connector_ids.as_mut_ptr(), connector_ids.len() as u32),
                    encoder_ids: (encoder_ids.as_mut_ptr(), encoder_ids.len() as u32),
                })
            };
            self.f.ioctl(ioctl::DRM_IOCTL_MODE_GETRESOURCES, &mut res)?;

            if res.count_fbs() as usize > fb_ids.len()
                || res.count_crtcs() as usize > crtc_ids.len()
                || res.count_connectors() as usize > connector_ids.len()
                || res.count_encoders() as usize > encoder_ids.len()
            {
                // Something was hot-plugged between our two requests.
                continue;
            }
            fb_ids.truncate(res.count_fbs() as usize);
            crtc_ids.truncate(res.count_crtcs() as usize);
            connector_ids.truncate(res.count_connectors() as usize);
            encoder_ids.truncate(res.count_encoders() as usize);

            return Ok(CardResources {
                fb_ids: fb_ids.into_iter().map(FramebufferId).collect(),
                crtc_ids: crtc_ids.into_iter().map(CrtcId).collect(),
                connector_ids: connector_ids.into_iter().map(modeset::ConnectorId).collect(),
                encoder_ids: encoder_ids.into_iter().map(EncoderId).collect(),
                min_width: res.min_width,
                max_width: res.max_width,
                min_height: res.min_height,
                max_height: res.max_height,
            });
        }
        log::warn!("card resources still changing after {} requests", util::MAX_FETCH_ATTEMPTS);
        Err(Error::RemoteFailure)
    }

    /// The ids of the card's planes. Only primary planes are included
    /// unless [`ClientCap::UniversalPlanes`] is enabled.
    pub fn plane_ids(&self) -> Result<Vec<PlaneId>, Error> {
        let (ids, _) = util::query_variable_length::<u32, (), _>(|ids, _| {
            let mut tmp = ioctl::DrmModeGetPlaneRes::zeroed();
            if !ids.is_empty() {
                // Safety: the slice outlives the request.
                unsafe { tmp.set_plane_id_ptr(ids.as_mut_ptr(), ids.len() as u32) };
            }
            self.f.ioctl(ioctl::DRM_IOCTL_MODE_GETPLANERESOURCES, &mut tmp)?;
            Ok((tmp.count_planes() as usize, 0))
        })?;
        Ok(ids.into_iter().map(PlaneId).collect())
    }

    pub fn encoder_state(&self, encoder_id: EncoderId) -> Result<EncoderState, Error> {
        let mut tmp = ioctl::DrmModeGetEncoder::zeroed();
        tmp.encoder_id = encoder_id.0;
        self.f.ioctl(ioctl::DRM_IOCTL_MODE_GETENCODER, &mut tmp)?;
        Ok(tmp.into())
    }

    /// Take a snapshot of all of the properties attached to the given
    /// object.
    pub fn object_properties(
        &self,
        obj: impl Into<ObjectId>,
    ) -> Result<PropertySet<'_>, PropertyError> {
        PropertySet::new(self, obj.into())
    }
}

impl PropertyDevice for Card {
    fn object_properties_raw(
        &self,
        obj: ObjectId,
        prop_ids: &mut [u32],
        prop_values: &mut [u64],
    ) -> Result<usize, Error> {
        let (obj_type, obj_id) = obj.as_raw_type_and_id();
        let mut tmp = ioctl::DrmModeObjGetProperties::zeroed();
        tmp.obj_id = obj_id;
        tmp.obj_type = obj_type;
        let len = core::cmp::min(prop_ids.len(), prop_values.len());
        if len != 0 {
            // Safety: both slices have at least len elements and outlive
            // the request.
            unsafe {
                tmp.set_prop_ptrs(prop_ids.as_mut_ptr(), prop_values.as_mut_ptr(), len as u32)
            };
        }
        self.f.ioctl(ioctl::DRM_IOCTL_MODE_OBJ_GETPROPERTIES, &mut tmp)?;
        Ok(tmp.count_props() as usize)
    }

    fn property_meta_raw(
        &self,
        prop_id: PropertyId,
        values: &mut [u64],
        enum_blobs: &mut [ioctl::DrmModePropertyEnum],
    ) -> Result<PropertyHeader, Error> {
        let mut tmp = ioctl::DrmModeGetProperty::zeroed();
        tmp.prop_id = prop_id.0;
        if !values.is_empty() {
            // Safety: the slice outlives the request.
            unsafe { tmp.set_values_ptr(values.as_mut_ptr(), values.len() as u32) };
        }
        if !enum_blobs.is_empty() {
            // Safety: the slice outlives the request.
            unsafe { tmp.set_enum_blob_ptr(enum_blobs.as_mut_ptr(), enum_blobs.len() as u32) };
        }
        self.f.ioctl(ioctl::DRM_IOCTL_MODE_GETPROPERTY, &mut tmp)?;
        Ok(PropertyHeader::from(&tmp))
    }

    fn set_object_property_raw(
        &self,
        obj: ObjectId,
        prop_id: PropertyId,
        value: u64,
    ) -> Result<(), Error> {
        let (obj_type, obj_id) = obj.as_raw_type_and_id();
        let mut tmp = ioctl::DrmModeObjSetProperty::zeroed();
        tmp.value = value;
        tmp.prop_id = prop_id.0;
        tmp.obj_id = obj_id;
        tmp.obj_type = obj_type;
        self.f.ioctl(ioctl::DRM_IOCTL_MODE_OBJ_SETPROPERTY, &mut tmp)?;
        Ok(())
    }
}

pub struct CardMaster {
    card: Card,
}

impl CardMaster {
    pub fn drop_master(self) -> Result<Card, (Error, Self)> {
        if let Err(e) = self.f.ioctl(ioctl::DRM_IOCTL_DROP_MASTER, ()) {
            return Err((e.into(), self));
        }
        Ok(self.card)
    }

    pub fn close(self) -> linux_io::result::Result<()> {
        let f = self.take_file();
        f.close()
    }

    pub fn take_file(self) -> linux_io::File<ioctl::DrmCardDevice> {
        self.card.f
    }
}

impl Deref for CardMaster {
    type Target = Card;

    fn deref(&self) -> &Self::Target {
        &self.card
    }
}

impl DerefMut for CardMaster {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.card
    }
}

impl<D> TryFrom<linux_io::File<D>> for Card {
    type Error = InitError;

    #[inline(always)]
    fn try_from(value: linux_io::File<D>) -> Result<Self, InitError> {
        Card::from_file(value)
    }
}

/// Optional behaviors that a client can ask the kernel to enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientCap {
    /// Expose overlay and cursor planes along with their properties.
    UniversalPlanes,
    /// Expose the properties used for atomic mode-setting.
    Atomic,
}

impl From<ClientCap> for ioctl::DrmClientCap {
    fn from(value: ClientCap) -> Self {
        match value {
            ClientCap::UniversalPlanes => ioctl::DRM_CLIENT_CAP_UNIVERSAL_PLANES,
            ClientCap::Atomic => ioctl::DRM_CLIENT_CAP_ATOMIC,
        }
    }
}
