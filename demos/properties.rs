use std::ffi::CString;

use linux_drm_props::{
    modeset::{ObjectId, Property, PropertyKind},
    result::{Error, PropertyError},
    Card, ClientCap,
};

fn main() -> std::io::Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("/dev/dri/card0"));
    let path = CString::new(path).map_err(std::io::Error::other)?;
    let card = Card::open(&path).map_err(map_init_err)?;

    // Without this the kernel hides overlay and cursor planes.
    if let Err(e) = card.set_client_cap(ClientCap::UniversalPlanes, 1) {
        log::warn!("can't enable universal planes: {e}");
    }

    show_properties(&card).map_err(map_prop_err)
}

fn show_properties(card: &Card) -> Result<(), PropertyError> {
    let res = card.resources()?;

    for conn_id in res.connector_ids.iter().copied() {
        println!("Connector #{conn_id}:");
        show_property_list(card, conn_id.into())?;
        println!();
    }

    for enc_id in res.encoder_ids.iter().copied() {
        let enc = card.encoder_state(enc_id)?;
        println!("Encoder #{enc_id} ({}):", enc.encoder_type);
        match enc.current_crtc_id {
            Some(crtc_id) => println!("  current CRTC: #{crtc_id}"),
            None => println!("  current CRTC: none"),
        }
        let crtcs: Vec<String> = enc
            .possible_crtcs(&res.crtc_ids)
            .iter()
            .map(|id| format!("#{id}"))
            .collect();
        println!("  possible CRTCs: {}", crtcs.join(", "));
        let clones: Vec<String> = enc
            .possible_clones(&res.encoder_ids)
            .iter()
            .map(|id| format!("#{id}"))
            .collect();
        println!("  possible clones: {}", clones.join(", "));
        show_property_list(card, enc_id.into())?;
        println!();
    }

    for crtc_id in res.crtc_ids.iter().copied() {
        println!("CRTC #{crtc_id}:");
        show_property_list(card, crtc_id.into())?;
        println!();
    }

    for plane_id in card.plane_ids()? {
        println!("Plane #{plane_id}:");
        show_property_list(card, plane_id.into())?;
        println!();
    }

    Ok(())
}

fn show_property_list(card: &Card, obj: ObjectId) -> Result<(), PropertyError> {
    let props = card.object_properties(obj)?;
    for prop in &props {
        let value = prop.value()?;
        let access = if prop.is_immutable() { "ro" } else { "rw" };
        println!(
            "  {} [{} {access}]: {}",
            prop.name(),
            prop.type_name(),
            describe_value(prop, value)
        );
    }
    for skipped in props.skipped() {
        println!("  (property #{} skipped: {})", skipped.prop_id, skipped.reason);
    }
    Ok(())
}

fn describe_value(prop: &Property<'_>, value: u64) -> String {
    match prop.kind() {
        PropertyKind::Enum { .. } => match prop.member_name(value) {
            Some(name) => name.to_string(),
            None => format!("out-of-range value {value}"),
        },
        PropertyKind::Bitmask { members } => {
            let mut parts: Vec<String> = prop
                .bitmask_names(value)
                .into_iter()
                .map(String::from)
                .collect();
            let valid = members
                .keys()
                .filter(|bit| **bit < 64)
                .fold(0_u64, |acc, bit| acc | (1 << *bit));
            let invalid = value & !valid;
            if invalid != 0 {
                parts.push(format!("{invalid:#x}"));
            }
            if parts.is_empty() {
                String::from("0")
            } else {
                parts.join(" | ")
            }
        }
        PropertyKind::Range { min, max } => format!("{value} (range {min}..={max})"),
        PropertyKind::SignedRange { min, max } => {
            format!("{} (range {min}..={max})", value as i64)
        }
        PropertyKind::Blob => format!("blob #{value}"),
        PropertyKind::Object { .. } => format!("object #{value}"),
    }
}

fn map_init_err(e: linux_drm_props::result::InitError) -> std::io::Error {
    let e: linux_io::result::Error = e.into();
    e.into_std_io_error()
}

fn map_prop_err(e: PropertyError) -> std::io::Error {
    match e {
        PropertyError::Device(e) => map_err(e),
        e => std::io::Error::other(e),
    }
}

fn map_err(e: Error) -> std::io::Error {
    let e: linux_io::result::Error = e.into();
    e.into_std_io_error()
}
