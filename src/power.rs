// SPDX-FileCopyrightText: 2026 Sam Hanes <sam@maltera.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! CPU frequency scaling and automatic light sleep.

use core::fmt;

/// Dynamic frequency scaling bounds plus the light-sleep switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerConfig {
    pub min_freq_mhz: u32,
    pub max_freq_mhz: u32,
    pub light_sleep_enable: bool,
}

impl PowerConfig {
    /// Scale between `min_mhz` and `max_mhz`, light-sleeping when idle.
    pub const fn auto_sleep(min_mhz: u32, max_mhz: u32) -> Self {
        PowerConfig {
            min_freq_mhz: min_mhz,
            max_freq_mhz: max_mhz,
            light_sleep_enable: true,
        }
    }

    /// Pin the CPU to a single frequency without light sleep.
    pub const fn fixed(mhz: u32) -> Self {
        PowerConfig {
            min_freq_mhz: mhz,
            max_freq_mhz: mhz,
            light_sleep_enable: false,
        }
    }

    /// Checks the bounds against the frequency steps a platform supports.
    pub fn validate(&self, supported: &[u32]) -> Result<(), PowerError> {
        if self.min_freq_mhz > self.max_freq_mhz {
            return Err(PowerError::InvalidRange {
                min: self.min_freq_mhz,
                max: self.max_freq_mhz,
            });
        }

        for mhz in [self.min_freq_mhz, self.max_freq_mhz] {
            if !supported.contains(&mhz) {
                return Err(PowerError::UnsupportedFrequency(mhz));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerError {
    /// The minimum frequency is above the maximum.
    InvalidRange { min: u32, max: u32 },
    /// The frequency is not one of the platform's clock steps.
    UnsupportedFrequency(u32),
    /// The platform refused the configuration.
    Rejected,
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerError::InvalidRange { min, max } => {
                write!(f, "minimum frequency {min} MHz is above maximum {max} MHz")
            }
            PowerError::UnsupportedFrequency(mhz) => {
                write!(f, "{mhz} MHz is not a supported CPU frequency")
            }
            PowerError::Rejected => f.write_str("power configuration rejected by the platform"),
        }
    }
}

impl core::error::Error for PowerError {}

/// Something that can apply a [`PowerConfig`].
pub trait PowerControl {
    /// CPU frequency steps, in MHz, the platform can run at.
    fn supported_frequencies(&self) -> &[u32];

    /// Replaces the active power configuration.
    fn configure(&mut self, config: &PowerConfig) -> Result<(), PowerError>;
}

/// Enables automatic light sleep with the CPU scaling between `min_mhz` and
/// `max_mhz`.
///
/// Nothing is applied when the bounds are rejected; the previous
/// configuration stays in effect.
pub fn auto_sleep<P: PowerControl>(platform: &mut P, min_mhz: u32, max_mhz: u32) -> Result<PowerConfig, PowerError> {
    let config = PowerConfig::auto_sleep(min_mhz, max_mhz);
    apply(platform, &config)?;
    info!("auto sleep enabled, {=u32}-{=u32} MHz", min_mhz, max_mhz);
    Ok(config)
}

fn apply<P: PowerControl>(platform: &mut P, config: &PowerConfig) -> Result<(), PowerError> {
    let result = config
        .validate(platform.supported_frequencies())
        .and_then(|()| platform.configure(config));

    if let Err(e) = result {
        warn!("power configuration {} refused: {}", config, e);
    }
    result
}

pub use crate::config::lowest_supported;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Mode {
    Active,
    Idle,
}

/// Pins the CPU to a fast configuration while work is in progress and drops
/// back to the idle configuration once it is done.
///
/// With an [`auto_sleep`] idle configuration the platform scales down to the
/// minimum and light-sleeps between pieces of work.
pub struct Governor<P> {
    platform: P,
    active: PowerConfig,
    idle: PowerConfig,
    mode: Option<Mode>,
}

impl<P: PowerControl> Governor<P> {
    pub fn new(platform: P, active: PowerConfig, idle: PowerConfig) -> Self {
        Governor {
            platform,
            active,
            idle,
            mode: None,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn into_inner(self) -> P {
        self.platform
    }

    /// Switches to the idle configuration if it is not already applied.
    pub fn throttle(&mut self) -> Result<(), PowerError> {
        self.enter(Mode::Idle)
    }

    /// Runs `work` under the active configuration and throttles afterwards.
    ///
    /// `Err` means the boost failed and `work` never ran. A failure to
    /// throttle afterwards is only logged, since `work` already happened; the
    /// next [`throttle`](Self::throttle) or `run` retries it.
    pub fn run<R>(&mut self, work: impl FnOnce(&mut P) -> R) -> Result<R, PowerError> {
        self.enter(Mode::Active)?;
        let out = work(&mut self.platform);
        if let Err(e) = self.enter(Mode::Idle) {
            warn!("could not throttle after work: {}", e);
        }
        Ok(out)
    }

    fn enter(&mut self, mode: Mode) -> Result<(), PowerError> {
        if self.mode == Some(mode) {
            return Ok(());
        }

        let config = match mode {
            Mode::Active => self.active,
            Mode::Idle => self.idle,
        };

        trace!("governor entering {}", mode);
        apply(&mut self.platform, &config)?;
        self.mode = Some(mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEPS: &[u32] = &[40, 80, 160, 240];

    #[derive(Default)]
    struct FakePm {
        applied: Vec<PowerConfig>,
        refuse: bool,
    }

    impl FakePm {
        fn current(&self) -> Option<&PowerConfig> {
            self.applied.last()
        }
    }

    impl PowerControl for FakePm {
        fn supported_frequencies(&self) -> &[u32] {
            STEPS
        }

        fn configure(&mut self, config: &PowerConfig) -> Result<(), PowerError> {
            if self.refuse {
                return Err(PowerError::Rejected);
            }
            self.applied.push(*config);
            Ok(())
        }
    }

    #[test]
    fn auto_sleep_enables_light_sleep() {
        let mut pm = FakePm::default();

        for (i, &min) in STEPS.iter().enumerate() {
            for &max in &STEPS[i..] {
                let config = auto_sleep(&mut pm, min, max).unwrap();
                assert!(config.light_sleep_enable);
                assert_eq!(pm.current(), Some(&config));
            }
        }
    }

    #[test]
    fn second_call_replaces_first() {
        let mut pm = FakePm::default();

        auto_sleep(&mut pm, 40, 240).unwrap();
        auto_sleep(&mut pm, 80, 160).unwrap();

        assert_eq!(pm.current(), Some(&PowerConfig::auto_sleep(80, 160)));
    }

    #[test]
    fn inverted_range_is_refused() {
        let mut pm = FakePm::default();

        assert_eq!(
            auto_sleep(&mut pm, 240, 80),
            Err(PowerError::InvalidRange { min: 240, max: 80 })
        );
        assert!(pm.applied.is_empty());
    }

    #[test]
    fn off_step_frequency_is_refused() {
        let mut pm = FakePm::default();
        auto_sleep(&mut pm, 80, 240).unwrap();

        assert_eq!(auto_sleep(&mut pm, 80, 200), Err(PowerError::UnsupportedFrequency(200)));
        assert_eq!(auto_sleep(&mut pm, 10, 80), Err(PowerError::UnsupportedFrequency(10)));
        assert_eq!(pm.current(), Some(&PowerConfig::auto_sleep(80, 240)));
    }

    #[test]
    fn platform_rejection_is_returned() {
        let mut pm = FakePm {
            refuse: true,
            ..Default::default()
        };

        assert_eq!(auto_sleep(&mut pm, 80, 240), Err(PowerError::Rejected));
    }

    #[test]
    fn rejection_keeps_previous_configuration() {
        let mut pm = FakePm::default();
        auto_sleep(&mut pm, 80, 240).unwrap();

        pm.refuse = true;
        assert_eq!(auto_sleep(&mut pm, 40, 160), Err(PowerError::Rejected));

        assert_eq!(pm.current(), Some(&PowerConfig::auto_sleep(80, 240)));
        assert_eq!(pm.applied.len(), 1);
    }

    #[test]
    fn lowest_supported_skips_unknown_steps() {
        assert_eq!(lowest_supported(&[20, 40, 80, 160, 240], STEPS), Some(40));
        assert_eq!(lowest_supported(&[240, 160], STEPS), Some(160));
        assert_eq!(lowest_supported(&[20, 1600], STEPS), None);
        assert_eq!(lowest_supported(&[], STEPS), None);
    }

    #[test]
    fn governor_boosts_for_work_and_throttles_after() {
        let active = PowerConfig::fixed(240);
        let idle = PowerConfig::auto_sleep(40, 80);
        let mut governor = Governor::new(FakePm::default(), active, idle);

        let seen = governor
            .run(|pm| *pm.current().unwrap())
            .unwrap();

        assert_eq!(seen, active);
        assert_eq!(governor.platform().current(), Some(&idle));
    }

    #[test]
    fn governor_skips_redundant_switches() {
        let mut governor = Governor::new(
            FakePm::default(),
            PowerConfig::fixed(160),
            PowerConfig::auto_sleep(40, 160),
        );

        governor.throttle().unwrap();
        governor.throttle().unwrap();
        governor.run(|_| ()).unwrap();

        // idle, active, idle
        assert_eq!(governor.into_inner().applied.len(), 3);
    }

    #[test]
    fn governor_does_not_run_work_when_boost_fails() {
        let mut governor = Governor::new(
            FakePm::default(),
            PowerConfig::fixed(200),
            PowerConfig::auto_sleep(40, 80),
        );

        let mut ran = false;
        let result = governor.run(|_| ran = true);

        assert_eq!(result, Err(PowerError::UnsupportedFrequency(200)));
        assert!(!ran);
    }

    #[test]
    fn governor_keeps_result_when_throttle_fails() {
        let active = PowerConfig::fixed(160);
        let mut governor = Governor::new(FakePm::default(), active, PowerConfig::auto_sleep(20, 80));

        assert_eq!(governor.run(|_| 42), Ok(42));
        assert_eq!(governor.platform().current(), Some(&active));
        assert_eq!(governor.throttle(), Err(PowerError::UnsupportedFrequency(20)));
    }
}
