use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use linux_drm_props::ioctl::{self, DrmModePropertyEnum};
use linux_drm_props::modeset::{
    name_bytes, ConnectorId, CrtcId, EncoderId, ObjectId, PlaneId, Property, PropertyDevice,
    PropertyHeader, PropertyId, PropertyKind, PropertySet, PropertyType,
};
use linux_drm_props::result::{Error, PropertyError};

/// A property as the stand-in kernel describes it. The reported counts can
/// disagree with the tables to simulate inconsistent metadata.
struct FakeProp {
    flags: u32,
    name: &'static str,
    values: Vec<u64>,
    enums: Vec<(u64, &'static str)>,
    count_values: usize,
    count_enum_blobs: usize,
}

impl FakeProp {
    fn new(flags: u32, name: &'static str, values: Vec<u64>, enums: Vec<(u64, &'static str)>) -> Self {
        let count_values = values.len();
        let count_enum_blobs = enums.len();
        Self {
            flags,
            name,
            values,
            enums,
            count_values,
            count_enum_blobs,
        }
    }

    fn range(name: &'static str, min: u64, max: u64) -> Self {
        Self::new(ioctl::DRM_MODE_PROP_RANGE, name, vec![min, max], vec![])
    }

    fn enumeration(name: &'static str, members: &[(u64, &'static str)]) -> Self {
        Self::new(
            ioctl::DRM_MODE_PROP_ENUM,
            name,
            members.iter().map(|(v, _)| *v).collect(),
            members.to_vec(),
        )
    }

    fn immutable(mut self) -> Self {
        self.flags |= ioctl::DRM_MODE_PROP_IMMUTABLE;
        self
    }
}

/// Stands in for the kernel, echoing back whatever was last set and
/// counting the requests made of it.
#[derive(Default)]
struct FakeDevice {
    props: BTreeMap<u32, FakeProp>,
    attached: RefCell<BTreeMap<(u32, u32), Vec<(u32, u64)>>>,
    failing_meta: Option<u32>,
    get_props_calls: Cell<usize>,
    meta_calls: Cell<usize>,
    set_calls: Cell<usize>,
}

impl FakeDevice {
    fn with_prop(mut self, id: u32, prop: FakeProp) -> Self {
        self.props.insert(id, prop);
        self
    }

    fn attach(self, obj: ObjectId, prop_id: u32, value: u64) -> Self {
        self.attached
            .borrow_mut()
            .entry(obj.as_raw_type_and_id())
            .or_default()
            .push((prop_id, value));
        self
    }

    fn with_object(self, obj: ObjectId) -> Self {
        self.attached
            .borrow_mut()
            .entry(obj.as_raw_type_and_id())
            .or_default();
        self
    }

    fn detach_all(&self, obj: ObjectId) {
        self.attached
            .borrow_mut()
            .insert(obj.as_raw_type_and_id(), Vec::new());
    }
}

impl PropertyDevice for FakeDevice {
    fn object_properties_raw(
        &self,
        obj: ObjectId,
        prop_ids: &mut [u32],
        prop_values: &mut [u64],
    ) -> Result<usize, Error> {
        self.get_props_calls.set(self.get_props_calls.get() + 1);
        let attached = self.attached.borrow();
        let Some(entries) = attached.get(&obj.as_raw_type_and_id()) else {
            return Err(Error::NonExist);
        };
        let count = entries.len();
        if prop_ids.len() >= count && prop_values.len() >= count {
            for (i, (id, value)) in entries.iter().enumerate() {
                prop_ids[i] = *id;
                prop_values[i] = *value;
            }
        }
        Ok(count)
    }

    fn property_meta_raw(
        &self,
        prop_id: PropertyId,
        values: &mut [u64],
        enum_blobs: &mut [DrmModePropertyEnum],
    ) -> Result<PropertyHeader, Error> {
        self.meta_calls.set(self.meta_calls.get() + 1);
        if self.failing_meta == Some(prop_id.0) {
            return Err(Error::Permission);
        }
        let prop = self.props.get(&prop_id.0).ok_or(Error::NonExist)?;
        if !values.is_empty() && values.len() >= prop.values.len() {
            values[..prop.values.len()].copy_from_slice(&prop.values);
        }
        if !enum_blobs.is_empty() && enum_blobs.len() >= prop.enums.len() {
            for (slot, (value, name)) in enum_blobs.iter_mut().zip(prop.enums.iter()) {
                slot.value = *value;
                slot.name = name_bytes(name);
            }
        }
        let mut header = PropertyHeader::new(prop_id, prop.flags, prop.name);
        header.count_values = prop.count_values;
        header.count_enum_blobs = prop.count_enum_blobs;
        Ok(header)
    }

    fn set_object_property_raw(
        &self,
        obj: ObjectId,
        prop_id: PropertyId,
        value: u64,
    ) -> Result<(), Error> {
        self.set_calls.set(self.set_calls.get() + 1);
        let mut attached = self.attached.borrow_mut();
        let entries = attached
            .get_mut(&obj.as_raw_type_and_id())
            .ok_or(Error::NonExist)?;
        let entry = entries
            .iter_mut()
            .find(|(id, _)| *id == prop_id.0)
            .ok_or(Error::Invalid)?;
        entry.1 = value;
        Ok(())
    }
}

const CONNECTOR: ObjectId = ObjectId::Connector(ConnectorId(31));

#[test]
fn object_without_properties() {
    let obj = ObjectId::Encoder(EncoderId(40));
    let dev = FakeDevice::default().with_object(obj);
    let set = PropertySet::new(&dev, obj).unwrap();
    assert!(set.is_empty());
    assert_eq!(set.len(), 0);
    assert!(set.skipped().is_empty());
    assert!(set.raw_values().is_empty());
    assert_eq!(set.iter().count(), 0);
    // Only the sizing request is needed when there's nothing to fetch.
    assert_eq!(dev.get_props_calls.get(), 1);
    assert_eq!(dev.meta_calls.get(), 0);
}

#[test]
fn enum_members_map_values_to_names() {
    let dev = FakeDevice::default()
        .with_prop(
            5,
            FakeProp::enumeration("mode", &[(0, "off"), (1, "on"), (2, "auto")]),
        )
        .attach(CONNECTOR, 5, 1);
    let set = PropertySet::new(&dev, CONNECTOR).unwrap();
    let prop = set.get("mode").unwrap();
    assert_eq!(prop.id(), PropertyId(5));
    assert_eq!(prop.property_type(), PropertyType::Enum);
    assert_eq!(prop.type_name(), "enum");

    let members = prop.members().unwrap();
    assert_eq!(members.len(), 3);
    assert_eq!(members[&0], "off");
    assert_eq!(members[&1], "on");
    assert_eq!(members[&2], "auto");

    // Values are returned as-is rather than mapped to names.
    assert_eq!(prop.value().unwrap(), 1);
    assert_eq!(prop.member_name(1), Some("on"));
    assert_eq!(prop.member_name(3), None);
}

#[test]
fn inconsistent_enums_are_skipped() {
    let mut bad_a = FakeProp::enumeration("a", &[(0, "x"), (1, "y")]);
    bad_a.count_values = 3;
    let mut bad_b = FakeProp::enumeration("b", &[(0, "x"), (1, "y"), (2, "z")]);
    bad_b.count_enum_blobs = 1;

    let dev = FakeDevice::default()
        .with_prop(10, FakeProp::range("brightness", 0, 100))
        .with_prop(11, bad_a)
        .with_prop(12, bad_b)
        .attach(CONNECTOR, 10, 50)
        .attach(CONNECTOR, 11, 0)
        .attach(CONNECTOR, 12, 0);
    let set = PropertySet::new(&dev, CONNECTOR).unwrap();

    assert_eq!(set.len(), 1);
    assert_eq!(set.iter().next().unwrap().id(), PropertyId(10));
    assert_eq!(set.raw_values().len(), 3);

    let skipped: Vec<_> = set.skipped().iter().map(|s| s.prop_id).collect();
    assert_eq!(skipped, vec![PropertyId(11), PropertyId(12)]);
    for s in set.skipped() {
        assert!(matches!(
            s.reason,
            PropertyError::InconsistentMetadata { .. }
        ));
    }
}

#[test]
fn unsupported_kinds_are_skipped() {
    let dev = FakeDevice::default()
        .with_prop(1, FakeProp::new(0, "mystery", vec![], vec![]))
        .with_prop(
            2,
            FakeProp::new(ioctl::DRM_MODE_PROP_RANGE, "odd", vec![], vec![(0, "x")]),
        )
        .with_prop(3, FakeProp::new(ioctl::DRM_MODE_PROP_BLOB, "EDID", vec![], vec![]))
        .attach(CONNECTOR, 1, 0)
        .attach(CONNECTOR, 2, 0)
        .attach(CONNECTOR, 3, 0);
    let set = PropertySet::new(&dev, CONNECTOR).unwrap();
    assert_eq!(set.names(), vec!["EDID"]);
    assert_eq!(set.skipped().len(), 2);
    assert!(matches!(
        set.skipped()[0].reason,
        PropertyError::UnsupportedKind { prop_id: 1, flags: 0 }
    ));
}

#[test]
fn classification_is_repeatable() {
    let dev = FakeDevice::default()
        .with_prop(1, FakeProp::range("a", 0, 10))
        .with_prop(
            2,
            FakeProp::new(
                ioctl::DRM_MODE_PROP_BITMASK,
                "rotation",
                vec![0, 1, 4],
                vec![(0, "rotate-0"), (1, "rotate-90"), (4, "reflect-x")],
            ),
        )
        .with_prop(
            3,
            FakeProp::new(ioctl::DRM_MODE_PROP_OBJECT, "CRTC_ID", vec![0xcccccccc], vec![]),
        )
        .with_prop(
            4,
            FakeProp::new(
                ioctl::DRM_MODE_PROP_SIGNED_RANGE,
                "CRTC_X",
                vec![(-5_i64) as u64, 5],
                vec![],
            ),
        )
        .attach(CONNECTOR, 1, 0)
        .attach(CONNECTOR, 2, 0)
        .attach(CONNECTOR, 3, 0)
        .attach(CONNECTOR, 4, 0);

    let first = PropertySet::new(&dev, CONNECTOR).unwrap();
    let second = PropertySet::new(&dev, CONNECTOR).unwrap();
    let kinds = |set: &PropertySet<'_>| set.iter().map(|p| p.kind().clone()).collect::<Vec<_>>();
    assert_eq!(kinds(&first), kinds(&second));

    let types: Vec<_> = first.iter().map(|p| p.type_name()).collect();
    assert_eq!(types, vec!["range", "bitmask", "object", "signed-range"]);
    assert_eq!(
        *first.get("CRTC_ID").unwrap().kind(),
        PropertyKind::Object {
            object_type: ioctl::DRM_MODE_OBJECT_CRTC
        }
    );
    assert_eq!(first.get("CRTC_X").unwrap().signed_range(), Some((-5, 5)));
    assert_eq!(first.get("a").unwrap().range(), Some((0, 10)));
    assert_eq!(
        first.get("rotation").unwrap().bitmask_names(0b1_0010),
        vec!["rotate-90", "reflect-x"]
    );
}

#[test]
fn lookup_by_name() {
    let dev = FakeDevice::default()
        .with_prop(10, FakeProp::range("brightness", 0, 100))
        .attach(CONNECTOR, 10, 50);
    let set = PropertySet::new(&dev, CONNECTOR).unwrap();

    assert_eq!(set.get("brightness").unwrap().name(), "brightness");
    assert!(set.get_by_id(PropertyId(10)).is_some());
    assert!(set.get_by_id(PropertyId(11)).is_none());

    let err = set.get("contrast").unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, PropertyError::NameNotFound(ref name) if name == "contrast"));
}

#[test]
fn immutable_writes_never_reach_device() {
    let dev = FakeDevice::default()
        .with_prop(7, FakeProp::range("link-status", 0, 1).immutable())
        .attach(CONNECTOR, 7, 0);
    let set = PropertySet::new(&dev, CONNECTOR).unwrap();
    let prop = set.get("link-status").unwrap();
    assert!(prop.is_immutable());

    assert!(matches!(
        prop.set(1),
        Err(PropertyError::Immutable { prop_id: 7, .. })
    ));
    assert!(matches!(
        prop.set_value(true),
        Err(PropertyError::Immutable { .. })
    ));
    assert_eq!(dev.set_calls.get(), 0);
}

#[test]
fn set_then_get_round_trip() {
    let dev = FakeDevice::default()
        .with_prop(10, FakeProp::range("brightness", 0, 100))
        .attach(CONNECTOR, 10, 50);
    let set = PropertySet::new(&dev, CONNECTOR).unwrap();
    let prop = set.get("brightness").unwrap();
    assert!(prop.is_mutable());

    assert_eq!(prop.get().unwrap(), 50);
    prop.set(70).unwrap();
    assert_eq!(prop.get().unwrap(), 70);

    prop.set_value(80_u8).unwrap();
    assert_eq!(prop.value().unwrap(), 80);
    assert_eq!(dev.set_calls.get(), 2);
}

#[test]
fn object_property_takes_object_ids() {
    let plane = ObjectId::Plane(PlaneId(33));
    let dev = FakeDevice::default()
        .with_prop(
            3,
            FakeProp::new(ioctl::DRM_MODE_PROP_OBJECT, "CRTC_ID", vec![0xcccccccc], vec![]),
        )
        .attach(plane, 3, 0);
    let set = PropertySet::new(&dev, plane).unwrap();
    let prop = set.get("CRTC_ID").unwrap();
    prop.set_value(CrtcId(51)).unwrap();
    assert_eq!(prop.value().unwrap(), 51);
}

#[test]
fn detached_property_is_not_found() {
    let dev = FakeDevice::default()
        .with_prop(10, FakeProp::range("brightness", 0, 100))
        .attach(CONNECTOR, 10, 50);
    let set = PropertySet::new(&dev, CONNECTOR).unwrap();
    let prop = set.get("brightness").unwrap();

    dev.detach_all(CONNECTOR);
    let err = prop.get().unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        err,
        PropertyError::IdNotFound {
            prop_id: 10,
            object: CONNECTOR
        }
    ));
}

#[test]
fn device_errors_abort_enumeration() {
    let mut dev = FakeDevice::default()
        .with_prop(10, FakeProp::range("brightness", 0, 100))
        .with_prop(11, FakeProp::range("contrast", 0, 100))
        .attach(CONNECTOR, 10, 50)
        .attach(CONNECTOR, 11, 50);
    dev.failing_meta = Some(11);

    let err = PropertySet::new(&dev, CONNECTOR).unwrap_err();
    assert!(matches!(err, PropertyError::Device(Error::Permission)));

    let missing = ObjectId::Crtc(CrtcId(99));
    let err = PropertySet::new(&dev, missing).unwrap_err();
    assert!(matches!(err, PropertyError::Device(Error::NonExist)));
}

#[test]
fn property_fetches_its_own_metadata() {
    let dev = FakeDevice::default()
        .with_prop(5, FakeProp::enumeration("DPMS", &[(0, "On"), (3, "Off")]))
        .attach(CONNECTOR, 5, 3);
    let prop = Property::new(&dev, PropertyId(5), CONNECTOR, None).unwrap();
    assert_eq!(prop.name(), "DPMS");
    assert_eq!(prop.object(), CONNECTOR);
    assert_eq!(prop.member_name(prop.value().unwrap()), Some("Off"));

    let err = Property::new(&dev, PropertyId(6), CONNECTOR, None).unwrap_err();
    assert!(matches!(err, PropertyError::Device(Error::NonExist)));
}

#[test]
fn duplicate_member_values_are_skipped() {
    let dev = FakeDevice::default()
        .with_prop(
            20,
            FakeProp::enumeration("mode", &[(0, "off"), (0, "on"), (2, "auto")]),
        )
        .with_prop(
            21,
            FakeProp::new(
                ioctl::DRM_MODE_PROP_BITMASK,
                "rotation",
                vec![0, 0],
                vec![(0, "rotate-0"), (0, "rotate-90")],
            ),
        )
        .attach(CONNECTOR, 20, 0)
        .attach(CONNECTOR, 21, 1);
    let set = PropertySet::new(&dev, CONNECTOR).unwrap();

    assert!(set.is_empty());
    let skipped: Vec<_> = set.skipped().iter().map(|s| s.prop_id).collect();
    assert_eq!(skipped, vec![PropertyId(20), PropertyId(21)]);
    for s in set.skipped() {
        assert!(matches!(
            s.reason,
            PropertyError::InconsistentMetadata { .. }
        ));
    }
}

#[test]
fn repeated_ids_are_described_once() {
    let dev = FakeDevice::default()
        .with_prop(10, FakeProp::range("brightness", 0, 100))
        .with_prop(1, FakeProp::new(0, "mystery", vec![], vec![]))
        .attach(CONNECTOR, 10, 50)
        .attach(CONNECTOR, 1, 0)
        .attach(CONNECTOR, 10, 50)
        .attach(CONNECTOR, 1, 0);
    let set = PropertySet::new(&dev, CONNECTOR).unwrap();

    assert_eq!(set.len(), 1);
    assert_eq!(set.names(), vec!["brightness"]);
    assert_eq!(set.skipped().len(), 1);
    assert_eq!(set.skipped()[0].prop_id, PropertyId(1));
    assert_eq!(set.raw_values().len(), 4);
    // One header request each, plus the range's value table.
    assert_eq!(dev.meta_calls.get(), 3);
}

#[test]
fn value_tables_of_wrong_length_are_skipped() {
    let short = FakeProp::new(ioctl::DRM_MODE_PROP_RANGE, "short", vec![0], vec![]);
    let dev = FakeDevice::default()
        .with_prop(30, short)
        .with_prop(
            31,
            FakeProp::new(
                ioctl::DRM_MODE_PROP_SIGNED_RANGE,
                "long",
                vec![0, 1, 2],
                vec![],
            ),
        )
        .with_prop(
            32,
            FakeProp::new(ioctl::DRM_MODE_PROP_OBJECT, "target", vec![1, 2], vec![]),
        )
        .with_prop(33, FakeProp::range("fine", 0, 10))
        .attach(CONNECTOR, 30, 0)
        .attach(CONNECTOR, 31, 0)
        .attach(CONNECTOR, 32, 0)
        .attach(CONNECTOR, 33, 5);
    let set = PropertySet::new(&dev, CONNECTOR).unwrap();

    assert_eq!(set.names(), vec!["fine"]);
    let skipped: Vec<_> = set.skipped().iter().map(|s| s.prop_id).collect();
    assert_eq!(skipped, vec![PropertyId(30), PropertyId(31), PropertyId(32)]);
    for s in set.skipped() {
        assert!(matches!(
            s.reason,
            PropertyError::InconsistentMetadata { .. }
        ));
    }
}

#[test]
fn inconsistent_bitmasks_are_skipped() {
    let mut bad = FakeProp::new(
        ioctl::DRM_MODE_PROP_BITMASK,
        "bad",
        vec![0, 1],
        vec![(0, "a"), (1, "b")],
    );
    bad.count_values = 3;
    let good = FakeProp::new(
        ioctl::DRM_MODE_PROP_BITMASK,
        "rotation",
        vec![0, 1],
        vec![(0, "rotate-0"), (1, "rotate-90")],
    );
    let plane = ObjectId::Plane(PlaneId(7));
    let dev = FakeDevice::default()
        .with_prop(40, bad)
        .with_prop(41, good)
        .attach(plane, 40, 0)
        .attach(plane, 41, 3);
    let set = PropertySet::new(&dev, plane).unwrap();

    assert_eq!(set.names(), vec!["rotation"]);
    assert_eq!(set.skipped().len(), 1);
    assert_eq!(set.skipped()[0].prop_id, PropertyId(40));
    assert!(matches!(
        set.skipped()[0].reason,
        PropertyError::InconsistentMetadata { prop_id: 40, .. }
    ));
}
