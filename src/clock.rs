// SPDX-FileCopyrightText: 2026 Sam Hanes <sam@maltera.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! ESP32 CPU clock steps that can be switched at runtime.
//!
//! Only the PLL-derived steps are used. APB stays at 80 MHz on all of them,
//! so timers and the radio keep their timing across a switch.

/// PLL-derived CPU clocks, lowest first.
pub const PLL_STEPS_MHZ: [u32; 3] = [80, 160, 240];

/// Digital core voltage for the 80 and 160 MHz steps.
pub const DIG_DBIAS_80M_160M: u8 = 4;

/// Register settings for one CPU clock step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CpuStep {
    pub mhz: u32,
    /// `DPORT_CPU_PER_CONF.CPUPERIOD_SEL`
    pub period_sel: u8,
    /// `RTC_CNTL_REG.DIG_DBIAS_WAK`
    pub dbias: u8,
}

impl CpuStep {
    /// Settings for `mhz` on a chip brought up at `boot_mhz` with core voltage
    /// `boot_dbias`.
    ///
    /// Steps above the boot clock are refused: the PLL was configured for the
    /// boot clock and the voltage it needs is only known for that step.
    pub fn for_mhz(mhz: u32, boot_mhz: u32, boot_dbias: u8) -> Option<Self> {
        if mhz > boot_mhz {
            return None;
        }

        let period_sel = match mhz {
            80 => 0,
            160 => 1,
            240 => 2,
            _ => return None,
        };

        Some(CpuStep {
            mhz,
            period_sel,
            dbias: if mhz == boot_mhz { boot_dbias } else { DIG_DBIAS_80M_160M },
        })
    }

    /// Whether the voltage has to change before the divider when going from
    /// `from` to this step. Raising the clock needs the voltage up first,
    /// lowering it drops the voltage last.
    pub fn voltage_first(&self, from: &CpuStep) -> bool {
        self.mhz > from.mhz
    }
}

/// The runtime-switchable steps on a chip that booted at `boot_mhz`.
pub fn steps_up_to(boot_mhz: u32) -> &'static [u32] {
    let n = PLL_STEPS_MHZ.iter().take_while(|&&mhz| mhz <= boot_mhz).count();
    &PLL_STEPS_MHZ[..n]
}
