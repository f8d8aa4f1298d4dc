// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    simple = { "omv-media" },
    single_char = { "a" },
    digits = { "node01" },
    interior_hyphens = { "a-b-c" },
)]
fn server_id_accepts(input: &str) {
    assert!(ServerId::parse(input).is_ok());
}

#[yare::parameterized(
    empty = { "" },
    uppercase = { "Omv" },
    leading_hyphen = { "-omv" },
    trailing_hyphen = { "omv-" },
    underscore = { "omv_media" },
    dot = { "omv.media" },
)]
fn server_id_rejects(input: &str) {
    assert!(ServerId::parse(input).is_err());
}

#[test]
fn server_id_from_hostname_slugifies() {
    let id = ServerId::from_hostname("OMV-Media.lan").unwrap();
    assert_eq!(id.as_str(), "omv-media-lan");

    let id = ServerId::from_hostname("host__01..local").unwrap();
    assert_eq!(id.as_str(), "host-01-local");
}

#[test]
fn server_id_from_hostname_rejects_garbage() {
    assert!(ServerId::from_hostname("---").is_err());
}

#[test]
fn guid_generate_is_valid_and_lowercase() {
    let guid = MachineGuid::generate();
    assert!(MachineGuid::parse(guid.as_str()).is_ok());
    assert_eq!(guid.as_str(), guid.as_str().to_lowercase());
}

#[test]
fn guid_parse_accepts_v4() {
    let guid = MachineGuid::parse("a1b2c3d4-e5f6-4890-abcd-ef1234567890").unwrap();
    assert_eq!(guid.short(), "a1b2c3d4");
}

#[yare::parameterized(
    uppercase = { "A1B2C3D4-E5F6-4890-ABCD-EF1234567890" },
    not_v4 = { "a1b2c3d4-e5f6-1890-abcd-ef1234567890" },
    bad_variant = { "a1b2c3d4-e5f6-4890-cbcd-ef1234567890" },
    truncated = { "a1b2c3d4-e5f6-4890-abcd" },
)]
fn guid_parse_rejects(input: &str) {
    assert!(MachineGuid::parse(input).is_err());
}

#[test]
fn server_id_borrows_as_str() {
    let id = ServerId::parse("omv-media").unwrap();
    let mut map = std::collections::HashMap::new();
    map.insert(id.clone(), 1);
    assert!(map.contains_key("omv-media"));
}
