// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn pack_yaml_round_trip() {
    let yaml = r#"
name: base
description: Baseline for every machine
items:
  files:
    - path: ~/.vimrc
      mode: "0644"
      template: vimrc
  packages:
    - name: htop
    - name: curl
      min_version: "7.0"
  settings:
    - type: env_var
      key: EDITOR
      expected: vim
"#;
    let pack: Pack = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(pack.name, "base");
    assert!(pack.extends.is_none());
    assert_eq!(pack.items.files.len(), 1);
    assert_eq!(pack.items.files[0].mode, "0644");
    assert_eq!(pack.items.packages[1].min_version.as_deref(), Some("7.0"));
    assert_eq!(pack.items.settings[0].kind, SettingKind::EnvVar);
    assert_eq!(pack.items.total(), 5);
}

#[test]
fn unknown_setting_type_is_rejected() {
    let yaml = r#"
name: odd
items:
  settings:
    - type: registry_key
      key: X
      expected: Y
"#;
    assert!(serde_yaml::from_str::<Pack>(yaml).is_err());
}

#[test]
fn empty_groups_default() {
    let pack: Pack = serde_yaml::from_str("name: minimal\n").unwrap();
    assert_eq!(pack.items.total(), 0);
}

#[test]
fn prepend_orders_parent_first() {
    let mut child = PackItems {
        files: vec![FileItem {
            path: "~/.child".into(),
            mode: "0644".into(),
            template: None,
            description: None,
        }],
        packages: vec![],
        settings: vec![],
    };
    let parent = PackItems {
        files: vec![FileItem {
            path: "~/.parent".into(),
            mode: "0644".into(),
            template: None,
            description: None,
        }],
        packages: vec![],
        settings: vec![],
    };
    child.prepend(parent);
    assert_eq!(child.files[0].path, "~/.parent");
    assert_eq!(child.files[1].path, "~/.child");
}
