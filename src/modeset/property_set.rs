use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use crate::result::PropertyError;

use super::{object_property_values, ModeProp, ObjectId, Property, PropertyDevice, PropertyId};

/// A property the kernel reported for an object but which couldn't be
/// described, along with the reason.
#[derive(Debug)]
pub struct SkippedProperty {
    pub prop_id: PropertyId,
    pub reason: PropertyError,
}

/// A snapshot of all of the properties attached to one object.
///
/// The set of properties and their metadata are fetched once, when the
/// snapshot is created. Reading or writing a property's value always
/// talks to the kernel.
#[derive(Debug)]
pub struct PropertySet<'dev> {
    object: ObjectId,
    props: Vec<Property<'dev>>,
    raw: Vec<ModeProp>,
    skipped: Vec<SkippedProperty>,
}

impl<'dev> PropertySet<'dev> {
    /// Discover and describe all of the properties attached to `object`.
    ///
    /// Properties whose type isn't recognized or whose metadata is
    /// inconsistent are left out of the set, logged, and recorded in
    /// [`Self::skipped`]. Any failed request to the kernel causes the whole
    /// operation to fail.
    pub fn new(device: &'dev dyn PropertyDevice, object: ObjectId) -> Result<Self, PropertyError> {
        let raw = object_property_values(device, object)?;
        if raw.is_empty() {
            log::trace!("{object:?} has no properties");
        }

        let mut props: Vec<Property<'dev>> = Vec::new();
        props.try_reserve_exact(raw.len()).map_err(crate::result::Error::from)?;
        let mut skipped = Vec::new();
        let mut seen = BTreeSet::new();
        for entry in raw.iter() {
            // Each id is described at most once, whether it was admitted
            // or skipped.
            if !seen.insert(entry.prop_id) {
                log::trace!("{object:?} reported property {} again", entry.prop_id);
                continue;
            }

            let header = device.property_meta_raw(entry.prop_id, &mut [], &mut [])?;
            match Property::new(device, entry.prop_id, object, Some(header)) {
                Ok(prop) => {
                    log::trace!(
                        "{object:?} property {} {:?} is {}",
                        entry.prop_id,
                        prop.name(),
                        prop.type_name()
                    );
                    props.push(prop);
                }
                Err(
                    reason @ (PropertyError::UnsupportedKind { .. }
                    | PropertyError::InconsistentMetadata { .. }),
                ) => {
                    log::warn!("skipping property {} of {object:?}: {reason}", entry.prop_id);
                    skipped.push(SkippedProperty {
                        prop_id: entry.prop_id,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        log::debug!(
            "found {} properties on {object:?} ({} skipped)",
            props.len(),
            skipped.len()
        );
        Ok(Self {
            object,
            props,
            raw,
            skipped,
        })
    }

    #[inline]
    pub fn object(&self) -> ObjectId {
        self.object
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.props.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Iterate over the properties in the order the kernel reported them.
    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, Property<'dev>> {
        self.props.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.props.iter().map(|prop| prop.name()).collect()
    }

    /// Find a property by name.
    ///
    /// The kernel doesn't promise that names are unique for an object, so
    /// if there are several with the same name this returns the first.
    pub fn get(&self, name: &str) -> Result<&Property<'dev>, PropertyError> {
        self.props
            .iter()
            .find(|prop| prop.name() == name)
            .ok_or_else(|| PropertyError::NameNotFound(name.into()))
    }

    pub fn get_by_id(&self, id: PropertyId) -> Option<&Property<'dev>> {
        self.props.iter().find(|prop| prop.id() == id)
    }

    /// The property ids and values exactly as the kernel reported them when
    /// this snapshot was taken, including any skipped properties.
    #[inline]
    pub fn raw_values(&self) -> &[ModeProp] {
        &self.raw
    }

    #[inline]
    pub fn skipped(&self) -> &[SkippedProperty] {
        &self.skipped
    }
}

impl<'a, 'dev> IntoIterator for &'a PropertySet<'dev> {
    type Item = &'a Property<'dev>;
    type IntoIter = core::slice::Iter<'a, Property<'dev>>;

    fn into_iter(self) -> Self::IntoIter {
        self.props.iter()
    }
}
