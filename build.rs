// SPDX-FileCopyrightText: 2026 Sam Hanes <sam@maltera.com>
// SPDX-License-Identifier: GPL-3.0-or-later

fn main() {
    println!("cargo:rerun-if-env-changed=SATELLITE_MIN_FREQ_MHZ");
    println!("cargo:rerun-if-env-changed=SATELLITE_MAX_FREQ_MHZ");
    println!("cargo:rerun-if-env-changed=SATELLITE_MAC_TRAILING_BITS");
    println!("cargo:rerun-if-env-changed=SATELLITE_IDLE_SECS");

    // host builds run the unit tests and must not pick up the firmware linker scripts
    if std::env::var("CARGO_CFG_TARGET_ARCH").as_deref() != Ok("xtensa") {
        return;
    }

    println!("cargo:rustc-link-arg=-nostartfiles");
    println!("cargo:rustc-link-arg=-Tdefmt.x");
    // make sure linkall.x is the last linker script (otherwise might cause problems with flip-link)
    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
