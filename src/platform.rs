// SPDX-FileCopyrightText: 2026 Sam Hanes <sam@maltera.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! ESP32 backend for the power and MAC traits, on top of esp-hal.
//!
//! The CPU runs at the configured maximum while awake and is switched down to
//! the minimum for the length of each [`EspPlatform::idle`] call. Switching
//! only moves between PLL-derived steps at or below the boot clock; see
//! [`crate::clock`].

use core::time::Duration;

use embassy_time::Timer;
use esp_hal::clock::Clocks;
use esp_hal::peripherals::{DPORT, LPWR};
use esp_hal::rtc_cntl::Rtc;
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;

use crate::clock::{self, CpuStep};
#[cfg(feature = "mac-setup")]
use crate::mac::{MacAddress, MacControl, MacError};
#[cfg(feature = "auto-sleep")]
use crate::power::{PowerConfig, PowerControl, PowerError};

/// Time spent awake after each light sleep so other tasks get to run.
const AWAKE_WINDOW: embassy_time::Duration = embassy_time::Duration::from_millis(100);

pub struct EspPlatform<'d> {
    rtc: Rtc<'d>,
    boot_mhz: u32,
    boot_dbias: u8,
    current: CpuStep,
    awake: CpuStep,
    idle: CpuStep,
    light_sleep: bool,
}

impl<'d> EspPlatform<'d> {
    /// Takes over the RTC. The CPU clock and core voltage that `esp_hal::init`
    /// left behind become the ceiling for later switches.
    pub fn new(rtc: Rtc<'d>) -> Self {
        let boot_mhz = Clocks::get().cpu_clock.as_mhz();
        let boot_dbias = LPWR::regs().reg().read().dig_dbias_wak().bits();
        let boot = CpuStep {
            mhz: boot_mhz,
            period_sel: DPORT::regs().cpu_per_conf().read().cpuperiod_sel().bits(),
            dbias: boot_dbias,
        };

        EspPlatform {
            rtc,
            boot_mhz,
            boot_dbias,
            current: boot,
            awake: boot,
            idle: boot,
            light_sleep: false,
        }
    }

    /// CPU clock selected at boot.
    pub fn boot_mhz(&self) -> u32 {
        self.boot_mhz
    }

    /// CPU clock the core is running at right now.
    pub fn cpu_mhz(&self) -> u32 {
        self.current.mhz
    }

    /// Clock steps this chip can be switched between.
    pub fn frequencies(&self) -> &'static [u32] {
        clock::steps_up_to(self.boot_mhz)
    }

    /// Drops to the idle clock for `duration`, in light sleep when it is
    /// enabled, then comes back up to the awake clock.
    pub async fn idle(&mut self, duration: Duration) {
        self.switch(self.idle);

        if self.light_sleep {
            let timer = TimerWakeupSource::new(duration);
            self.rtc.sleep_light(&[&timer]);
            Timer::after(AWAKE_WINDOW).await;
        } else {
            let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
            Timer::after(embassy_time::Duration::from_micros(micros)).await;
        }

        self.switch(self.awake);
    }

    fn switch(&mut self, to: CpuStep) {
        if to == self.current {
            return;
        }

        trace!("cpu clock {=u32} -> {=u32} MHz", self.current.mhz, to.mhz);
        if to.voltage_first(&self.current) {
            set_dbias(to.dbias);
            set_period(to);
        } else {
            set_period(to);
            set_dbias(to.dbias);
        }
        self.current = to;
    }

    #[cfg(feature = "auto-sleep")]
    fn step(&self, mhz: u32) -> Result<CpuStep, PowerError> {
        CpuStep::for_mhz(mhz, self.boot_mhz, self.boot_dbias).ok_or_else(|| {
            warn!("cannot switch to {=u32} MHz, booted at {=u32} MHz", mhz, self.boot_mhz);
            PowerError::Rejected
        })
    }
}

fn set_dbias(dbias: u8) {
    LPWR::regs()
        .reg()
        .modify(|_, w| unsafe { w.dig_dbias_wak().bits(dbias) });
}

fn set_period(step: CpuStep) {
    DPORT::regs()
        .cpu_per_conf()
        .write(|w| unsafe { w.cpuperiod_sel().bits(step.period_sel) });

    // ets_delay_us in ROM scales by this
    const G_TICKS_PER_US_PRO: u32 = 0x3ffe_01e0;
    unsafe {
        (G_TICKS_PER_US_PRO as *mut u32).write_volatile(step.mhz);
    }
}

#[cfg(feature = "auto-sleep")]
impl PowerControl for EspPlatform<'_> {
    fn supported_frequencies(&self) -> &[u32] {
        self.frequencies()
    }

    fn configure(&mut self, config: &PowerConfig) -> Result<(), PowerError> {
        let awake = self.step(config.max_freq_mhz)?;
        let idle = self.step(config.min_freq_mhz)?;

        self.awake = awake;
        self.idle = idle;
        self.light_sleep = config.light_sleep_enable;
        self.switch(awake);
        Ok(())
    }
}

#[cfg(feature = "mac-setup")]
impl EspPlatform<'_> {
    /// The base MAC the radio will use: the override if one was set, the
    /// factory address otherwise.
    pub fn base_mac(&self) -> MacAddress {
        MacAddress::new(esp_hal::efuse::Efuse::mac_address())
    }
}

#[cfg(feature = "mac-setup")]
impl MacControl for EspPlatform<'_> {
    fn set_base_mac(&mut self, mac: MacAddress) -> Result<(), MacError> {
        use esp_hal::efuse::{Efuse, SetMacError};

        match Efuse::set_mac_address(mac.octets()) {
            Ok(()) => Ok(()),
            // the override can only be written once per boot
            Err(SetMacError::AlreadySet) if self.base_mac() == mac => Ok(()),
            Err(SetMacError::AlreadySet) => Err(MacError::AlreadyProgrammed),
        }
    }
}
