// SPDX-FileCopyrightText: 2026 Sam Hanes <sam@maltera.com>
// SPDX-License-Identifier: GPL-3.0-or-later

#![cfg_attr(not(test), no_std)]

// macros first, so every module below can use them
mod fmt;

pub mod clock;
pub mod config;
#[cfg(feature = "mac-setup")]
pub mod mac;
#[cfg(feature = "esp32")]
pub mod platform;
#[cfg(feature = "auto-sleep")]
pub mod power;
