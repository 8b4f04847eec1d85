// SPDX-FileCopyrightText: 2026 Sam Hanes <sam@maltera.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Base MAC address programming.
//!
//! Every satellite gets an address inside our 36-bit organizational block
//! `8C:1F:64:DC:0`. The remaining 12 bits come from the caller, normally a
//! hardware random number drawn at boot.

use core::fmt;

/// First four bytes of every address we hand out.
pub const OUI_PREFIX: [u8; 4] = [0x8C, 0x1F, 0x64, 0xDC];

/// Mask of the caller-supplied bits that end up in the address.
pub const TRAILING_BITS_MASK: u32 = 0x0FFF;

/// A 6-byte hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    /// Builds an address in our block from the low 12 bits of `trailing`.
    ///
    /// Byte 5 is `trailing % 256` and byte 4 is `(trailing >> 8) % 16`; the
    /// high nibble of byte 4 belongs to the prefix and stays zero.
    pub const fn with_trailing_bits(trailing: u32) -> Self {
        let [a, b, c, d] = OUI_PREFIX;
        MacAddress([
            a,
            b,
            c,
            d,
            ((trailing >> 8) % 16) as u8,
            (trailing % 256) as u8,
        ])
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Whether the address falls inside our organizational block.
    pub fn is_in_block(&self) -> bool {
        self.0[..4] == OUI_PREFIX && self.0[4] & 0xF0 == 0
    }

    /// The 12 bits that were folded into the address.
    pub fn trailing_bits(&self) -> u32 {
        ((self.0[4] as u32 & 0x0F) << 8) | self.0[5] as u32
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MacAddress {
    fn format(&self, f: defmt::Formatter<'_>) {
        let [a, b, c, d, e, g] = self.0;
        defmt::write!(
            f,
            "{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}",
            a, b, c, d, e, g
        )
    }
}

/// Error returned when the platform refuses a base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacError {
    /// A different base address was already programmed and the platform
    /// cannot change it any more.
    AlreadyProgrammed,
    /// The platform rejected the address.
    Rejected,
}

impl fmt::Display for MacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacError::AlreadyProgrammed => f.write_str("base MAC address already programmed"),
            MacError::Rejected => f.write_str("base MAC address rejected by the platform"),
        }
    }
}

impl core::error::Error for MacError {}

/// Something that can set the device's base MAC address.
pub trait MacControl {
    fn set_base_mac(&mut self, mac: MacAddress) -> Result<(), MacError>;
}

/// Derives an address from `trailing_bits` and programs it as the base MAC.
///
/// Bits above the low 12 are ignored. Calling this again with another value
/// replaces the address, as far as the platform allows it.
pub fn mac_setup<P: MacControl>(platform: &mut P, trailing_bits: u32) -> Result<MacAddress, MacError> {
    let mac = MacAddress::with_trailing_bits(trailing_bits);
    debug!("programming base MAC from trailing bits {=u32:#x}", trailing_bits & TRAILING_BITS_MASK);

    match platform.set_base_mac(mac) {
        Ok(()) => {
            info!("base MAC set to {}", mac);
            Ok(mac)
        }
        Err(e) => {
            warn!("failed to set base MAC {}: {}", mac, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeRadio {
        base: Option<MacAddress>,
        writes: usize,
        locked: bool,
    }

    impl MacControl for FakeRadio {
        fn set_base_mac(&mut self, mac: MacAddress) -> Result<(), MacError> {
            if self.locked {
                return Err(MacError::Rejected);
            }
            self.base = Some(mac);
            self.writes += 1;
            Ok(())
        }
    }

    #[test]
    fn derives_last_two_bytes() {
        let mac = MacAddress::with_trailing_bits(0x1234);
        assert_eq!(mac.octets(), [0x8C, 0x1F, 0x64, 0xDC, 0x02, 0x34]);
    }

    #[test]
    fn every_suffix_stays_in_block() {
        for trailing in 0..=0xFFFFu32 {
            let octets = MacAddress::with_trailing_bits(trailing).octets();
            assert_eq!(octets[..4], OUI_PREFIX);
            assert_eq!(octets[5] as u32, trailing % 256);
            assert_eq!(octets[4] as u32, (trailing / 256) % 16);
        }
    }

    #[test]
    fn high_bits_are_dropped() {
        assert_eq!(
            MacAddress::with_trailing_bits(0xFFFF_F0AB),
            MacAddress::with_trailing_bits(0x00AB)
        );
        assert_eq!(MacAddress::with_trailing_bits(0xABCD).trailing_bits(), 0xBCD);
    }

    #[test]
    fn block_membership() {
        assert!(MacAddress::with_trailing_bits(0xFFF).is_in_block());
        assert!(!MacAddress::new([0x8C, 0x1F, 0x64, 0xDC, 0x10, 0x00]).is_in_block());
        assert!(!MacAddress::new([0x00, 0x1F, 0x64, 0xDC, 0x00, 0x00]).is_in_block());
    }

    #[test]
    fn displays_colon_separated_hex() {
        let mac = MacAddress::with_trailing_bits(0x0A0B);
        assert_eq!(mac.to_string(), "8C:1F:64:DC:0A:0B");
    }

    #[test]
    fn setup_programs_platform() {
        let mut radio = FakeRadio::default();

        let mac = mac_setup(&mut radio, 0x1234).unwrap();

        assert_eq!(radio.base, Some(mac));
        assert_eq!(mac.to_string(), "8C:1F:64:DC:02:34");
    }

    #[test]
    fn second_setup_overwrites_first() {
        let mut radio = FakeRadio::default();

        mac_setup(&mut radio, 0x001).unwrap();
        mac_setup(&mut radio, 0x0FE).unwrap();

        assert_eq!(radio.writes, 2);
        assert_eq!(radio.base, Some(MacAddress::with_trailing_bits(0x0FE)));
    }

    #[test]
    fn platform_failure_is_returned() {
        let mut radio = FakeRadio {
            locked: true,
            ..Default::default()
        };

        assert_eq!(mac_setup(&mut radio, 7), Err(MacError::Rejected));
        assert_eq!(radio.base, None);
    }
}
