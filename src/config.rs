// SPDX-FileCopyrightText: 2026 Sam Hanes <sam@maltera.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Build-time settings, taken from the environment when the firmware is
//! compiled.

use core::fmt;
use core::time::Duration;

/// Clock speeds tried when no minimum is configured.
pub const CLOCK_CANDIDATES_MHZ: [u32; 5] = [20, 40, 80, 160, 240];

pub const DEFAULT_MAX_FREQ_MHZ: u32 = 240;
pub const DEFAULT_IDLE_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Lower scaling bound; `None` picks the lowest supported candidate.
    pub min_freq_mhz: Option<u32>,
    pub max_freq_mhz: u32,
    /// Fixed MAC suffix; `None` draws one from the hardware RNG.
    ///
    /// The RNG has no entropy source until the radio runs, and the MAC has to
    /// be set before that, so production builds should set
    /// `SATELLITE_MAC_TRAILING_BITS` per device.
    pub mac_trailing_bits: Option<u32>,
    pub idle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            min_freq_mhz: None,
            max_freq_mhz: DEFAULT_MAX_FREQ_MHZ,
            mac_trailing_bits: None,
            idle: Duration::from_secs(DEFAULT_IDLE_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse(
            option_env!("SATELLITE_MIN_FREQ_MHZ"),
            option_env!("SATELLITE_MAX_FREQ_MHZ"),
            option_env!("SATELLITE_MAC_TRAILING_BITS"),
            option_env!("SATELLITE_IDLE_SECS"),
        )
    }

    pub fn parse(
        min_freq_mhz: Option<&str>,
        max_freq_mhz: Option<&str>,
        mac_trailing_bits: Option<&str>,
        idle_secs: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            min_freq_mhz: number(min_freq_mhz, "SATELLITE_MIN_FREQ_MHZ")?,
            max_freq_mhz: number(max_freq_mhz, "SATELLITE_MAX_FREQ_MHZ")?
                .unwrap_or(defaults.max_freq_mhz),
            mac_trailing_bits: number(mac_trailing_bits, "SATELLITE_MAC_TRAILING_BITS")?,
            idle: number::<u64>(idle_secs, "SATELLITE_IDLE_SECS")?
                .map_or(defaults.idle, Duration::from_secs),
        })
    }

    /// Minimum frequency to request from a platform with the given steps.
    pub fn min_freq_for(&self, supported: &[u32]) -> Option<u32> {
        self.min_freq_mhz
            .or_else(|| lowest_supported(&CLOCK_CANDIDATES_MHZ, supported))
    }
}

/// The lowest of `candidates` that is also one of the `supported` steps.
pub fn lowest_supported(candidates: &[u32], supported: &[u32]) -> Option<u32> {
    candidates
        .iter()
        .copied()
        .filter(|mhz| supported.contains(mhz))
        .min()
}

fn number<T: core::str::FromStr>(value: Option<&str>, name: &'static str) -> Result<Option<T>, ConfigError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidNumber(name)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The named variable is set but is not a decimal number.
    InvalidNumber(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber(name) => write!(f, "{name} is not a decimal number"),
        }
    }
}

impl core::error::Error for ConfigError {}
