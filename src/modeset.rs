use alloc::vec::Vec;
use core::fmt;

mod device;
mod property_set;
mod props;

pub use device::*;
pub use property_set::*;
pub use props::*;

macro_rules! object_id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

object_id_type!(FramebufferId);
object_id_type!(CrtcId);
object_id_type!(ConnectorId);
object_id_type!(EncoderId);
object_id_type!(PlaneId);
object_id_type!(PropertyId);
object_id_type!(BlobId);

/// Identifies a mode-setting object along with its type, which is how the
/// kernel's object property requests address their target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ObjectId {
    Crtc(CrtcId),
    Connector(ConnectorId),
    Encoder(EncoderId),
    Mode(u32),
    Property(PropertyId),
    Framebuffer(FramebufferId),
    Blob(BlobId),
    Plane(PlaneId),
}

impl ObjectId {
    pub fn as_raw_type_and_id(self) -> (u32, u32) {
        use crate::ioctl;
        match self {
            ObjectId::Crtc(id) => (ioctl::DRM_MODE_OBJECT_CRTC, id.0),
            ObjectId::Connector(id) => (ioctl::DRM_MODE_OBJECT_CONNECTOR, id.0),
            ObjectId::Encoder(id) => (ioctl::DRM_MODE_OBJECT_ENCODER, id.0),
            ObjectId::Mode(id) => (ioctl::DRM_MODE_OBJECT_MODE, id),
            ObjectId::Property(id) => (ioctl::DRM_MODE_OBJECT_PROPERTY, id.0),
            ObjectId::Framebuffer(id) => (ioctl::DRM_MODE_OBJECT_FB, id.0),
            ObjectId::Blob(id) => (ioctl::DRM_MODE_OBJECT_BLOB, id.0),
            ObjectId::Plane(id) => (ioctl::DRM_MODE_OBJECT_PLANE, id.0),
        }
    }

    /// The inverse of [`Self::as_raw_type_and_id`], returning `None` for
    /// object type tags this crate doesn't know.
    pub fn from_raw_type_and_id(typ: u32, id: u32) -> Option<Self> {
        use crate::ioctl;
        Some(match typ {
            ioctl::DRM_MODE_OBJECT_CRTC => ObjectId::Crtc(CrtcId(id)),
            ioctl::DRM_MODE_OBJECT_CONNECTOR => ObjectId::Connector(ConnectorId(id)),
            ioctl::DRM_MODE_OBJECT_ENCODER => ObjectId::Encoder(EncoderId(id)),
            ioctl::DRM_MODE_OBJECT_MODE => ObjectId::Mode(id),
            ioctl::DRM_MODE_OBJECT_PROPERTY => ObjectId::Property(PropertyId(id)),
            ioctl::DRM_MODE_OBJECT_FB => ObjectId::Framebuffer(FramebufferId(id)),
            ioctl::DRM_MODE_OBJECT_BLOB => ObjectId::Blob(BlobId(id)),
            ioctl::DRM_MODE_OBJECT_PLANE => ObjectId::Plane(PlaneId(id)),
            _ => return None,
        })
    }

    #[inline]
    pub fn raw_id(self) -> u32 {
        self.as_raw_type_and_id().1
    }

    #[inline]
    pub fn raw_type(self) -> u32 {
        self.as_raw_type_and_id().0
    }
}

impl From<CrtcId> for ObjectId {
    fn from(value: CrtcId) -> Self {
        Self::Crtc(value)
    }
}

impl From<ConnectorId> for ObjectId {
    fn from(value: ConnectorId) -> Self {
        Self::Connector(value)
    }
}

impl From<EncoderId> for ObjectId {
    fn from(value: EncoderId) -> Self {
        Self::Encoder(value)
    }
}

impl From<PropertyId> for ObjectId {
    fn from(value: PropertyId) -> Self {
        Self::Property(value)
    }
}

impl From<FramebufferId> for ObjectId {
    fn from(value: FramebufferId) -> Self {
        Self::Framebuffer(value)
    }
}

impl From<BlobId> for ObjectId {
    fn from(value: BlobId) -> Self {
        Self::Blob(value)
    }
}

impl From<PlaneId> for ObjectId {
    fn from(value: PlaneId) -> Self {
        Self::Plane(value)
    }
}

#[derive(Debug)]
pub struct CardResources {
    pub fb_ids: Vec<FramebufferId>,
    pub crtc_ids: Vec<CrtcId>,
    pub connector_ids: Vec<ConnectorId>,
    pub encoder_ids: Vec<EncoderId>,
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
pub enum EncoderType {
    None = 0,
    Dac = 1,
    Tmds = 2,
    Lvds = 3,
    TvDac = 4,
    Virtual = 5,
    Dsi = 6,
    DpMst = 7,
    Dpi = 8,
    Other = !0, // Not used by kernel, but used by us if kernel returns something we don't know
}

impl EncoderType {
    pub fn name(self) -> &'static str {
        match self {
            EncoderType::None => "None",
            EncoderType::Dac => "DAC",
            EncoderType::Tmds => "TMDS",
            EncoderType::Lvds => "LVDS",
            EncoderType::TvDac => "TVDAC",
            EncoderType::Virtual => "Virtual",
            EncoderType::Dsi => "DSI",
            EncoderType::DpMst => "DPMST",
            EncoderType::Dpi => "DPI",
            EncoderType::Other => "Unknown",
        }
    }
}

impl From<u32> for EncoderType {
    fn from(value: u32) -> Self {
        use crate::ioctl;
        match value {
            ioctl::DRM_MODE_ENCODER_NONE => Self::None,
            ioctl::DRM_MODE_ENCODER_DAC => Self::Dac,
            ioctl::DRM_MODE_ENCODER_TMDS => Self::Tmds,
            ioctl::DRM_MODE_ENCODER_LVDS => Self::Lvds,
            ioctl::DRM_MODE_ENCODER_TVDAC => Self::TvDac,
            ioctl::DRM_MODE_ENCODER_VIRTUAL => Self::Virtual,
            ioctl::DRM_MODE_ENCODER_DSI => Self::Dsi,
            ioctl::DRM_MODE_ENCODER_DPMST => Self::DpMst,
            ioctl::DRM_MODE_ENCODER_DPI => Self::Dpi,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for EncoderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub struct EncoderState {
    pub encoder_id: EncoderId,
    pub encoder_type: EncoderType,
    /// The CRTC currently driven by this encoder, if any.
    pub current_crtc_id: Option<CrtcId>,
    pub possible_crtcs: u32,
    pub possible_clones: u32,
}

impl From<crate::ioctl::DrmModeGetEncoder> for EncoderState {
    fn from(value: crate::ioctl::DrmModeGetEncoder) -> Self {
        Self {
            encoder_id: EncoderId(value.encoder_id),
            encoder_type: value.encoder_type.into(),
            current_crtc_id: match value.crtc_id {
                0 => None,
                id => Some(CrtcId(id)),
            },
            possible_crtcs: value.possible_crtcs,
            possible_clones: value.possible_clones,
        }
    }
}

impl EncoderState {
    /// Select the CRTCs this encoder can drive.
    ///
    /// `crtcs` must be the card's CRTC ids in the order the kernel reported
    /// them in [`CardResources::crtc_ids`], because the kernel's bitmask
    /// refers to CRTCs by their index in that list.
    pub fn possible_crtcs(&self, crtcs: &[CrtcId]) -> Vec<CrtcId> {
        select_by_index_mask(self.possible_crtcs, crtcs)
    }

    /// Select the encoders that can be cloned with this one, indexed the
    /// same way as [`Self::possible_crtcs`] but over
    /// [`CardResources::encoder_ids`].
    pub fn possible_clones(&self, encoders: &[EncoderId]) -> Vec<EncoderId> {
        select_by_index_mask(self.possible_clones, encoders)
    }
}

/// Returns the items whose position in `items` has its bit set in `mask`.
///
/// Items beyond the 32nd can never be selected.
pub fn select_by_index_mask<T: Copy>(mask: u32, items: &[T]) -> Vec<T> {
    items
        .iter()
        .take(u32::BITS as usize)
        .enumerate()
        .filter(|(i, _)| (mask >> i) & 1 != 0)
        .map(|(_, item)| *item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn possible_crtcs_follow_resource_order() {
        let crtcs = [CrtcId(31), CrtcId(45), CrtcId(59)];
        let enc = EncoderState {
            encoder_id: EncoderId(40),
            encoder_type: EncoderType::Tmds,
            current_crtc_id: None,
            possible_crtcs: 0b101,
            possible_clones: 0,
        };
        assert_eq!(enc.possible_crtcs(&crtcs), vec![CrtcId(31), CrtcId(59)]);
        assert!(enc.possible_clones(&[EncoderId(40)]).is_empty());
    }

    #[test]
    fn mask_bits_beyond_list_are_ignored() {
        let items = [1_u32, 2];
        assert_eq!(select_by_index_mask(0xffff_fffe, &items), vec![2]);
    }

    #[test]
    fn encoder_state_from_raw() {
        let mut raw = crate::ioctl::DrmModeGetEncoder::zeroed();
        raw.encoder_id = 7;
        raw.encoder_type = crate::ioctl::DRM_MODE_ENCODER_DPMST;
        raw.crtc_id = 0;
        raw.possible_crtcs = 3;
        let enc = EncoderState::from(raw);
        assert_eq!(enc.encoder_type, EncoderType::DpMst);
        assert_eq!(enc.encoder_type.name(), "DPMST");
        assert_eq!(enc.current_crtc_id, None);
        assert_eq!(EncoderType::from(99), EncoderType::Other);
    }

    #[test]
    fn object_id_raw_round_trip() {
        let obj = ObjectId::from(ConnectorId(12));
        let (typ, id) = obj.as_raw_type_and_id();
        assert_eq!(typ, crate::ioctl::DRM_MODE_OBJECT_CONNECTOR);
        assert_eq!(ObjectId::from_raw_type_and_id(typ, id), Some(obj));
        assert_eq!(ObjectId::from_raw_type_and_id(0x1234, 1), None);
    }
}
