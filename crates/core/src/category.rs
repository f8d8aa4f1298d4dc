// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine category auto-detection.
//!
//! Categories feed the dashboard's power-cost estimates. Detection runs on
//! every heartbeat while the source is unset or `auto`; a manual assignment
//! is never overwritten.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineCategory {
    Sbc,
    RackServer,
    Workstation,
    OfficeLaptop,
    MiniPc,
}

/// How a server's category was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategorySource {
    Auto,
    Manual,
}

/// One detection rule: a predicate over CPU model, architecture and core
/// count. Rules are ordered; the first match wins.
struct Rule {
    category: MachineCategory,
    matches: fn(&str, &str, Option<u32>) -> bool,
}

fn is_arm(arch: &str) -> bool {
    arch.starts_with("arm") || arch.starts_with("aarch64")
}

fn is_mobile_intel(model: &str) -> bool {
    // "Intel Core i7-8650U", "i5-1135G7" and friends: an i-series part
    // number ending in a mobile suffix.
    let lowered = model.to_lowercase();
    if !lowered.contains("intel") && !lowered.contains("core i") {
        return false;
    }
    for tier in ["i3-", "i5-", "i7-", "i9-"] {
        let Some(idx) = lowered.find(tier) else { continue };
        let rest = &lowered[idx + tier.len()..];
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits < 4 {
            continue;
        }
        let tail = &rest[digits..];
        if ["u", "y", "h", "g4", "g7"].iter().any(|s| tail.starts_with(s)) {
            return true;
        }
    }
    false
}

const RULES: &[Rule] = &[
    Rule { category: MachineCategory::Sbc, matches: |_, arch, _| is_arm(arch) },
    Rule {
        category: MachineCategory::RackServer,
        matches: |model, _, _| model.contains("Xeon") || model.contains("EPYC"),
    },
    Rule {
        category: MachineCategory::Workstation,
        matches: |model, _, cores| {
            model.contains("Ryzen 9")
                || model.contains("Threadripper")
                || cores.is_some_and(|c| c >= 16)
        },
    },
    Rule { category: MachineCategory::OfficeLaptop, matches: |model, _, _| is_mobile_intel(model) },
    Rule {
        category: MachineCategory::MiniPc,
        matches: |model, _, _| {
            ["N100", "N95", "N97", "N200", "N305", "Celeron", "Atom"]
                .iter()
                .any(|m| model.contains(m))
        },
    },
];

/// Classify a machine from its reported CPU model and architecture.
/// Returns `None` when no rule matches; the caller leaves both the
/// category and its source unset in that case.
pub fn detect_category(
    cpu_model: Option<&str>,
    architecture: Option<&str>,
    cpu_cores: Option<u32>,
) -> Option<MachineCategory> {
    let model = cpu_model.unwrap_or("");
    let arch = architecture.unwrap_or("");
    if model.is_empty() && arch.is_empty() {
        return None;
    }
    RULES.iter().find(|rule| (rule.matches)(model, arch, cpu_cores)).map(|rule| rule.category)
}

#[cfg(test)]
#[path = "category_tests.rs"]
mod tests;
