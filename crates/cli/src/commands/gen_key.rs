// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hlh_core::SystemClock;
use hlh_identity::CredentialVault;

pub fn run() {
    let key = CredentialVault::<SystemClock>::generate_key();
    println!("{key}");
    eprintln!();
    eprintln!("Export this as HLH_ENCRYPTION_KEY before starting the hub.");
    eprintln!("WARNING: anyone holding this key can decrypt every stored credential.");
    eprintln!("Keep it out of shell history and version control; losing it means");
    eprintln!("re-entering all credentials.");
}
