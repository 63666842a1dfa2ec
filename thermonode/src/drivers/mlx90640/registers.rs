// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! MLX90640 register map.

/// Status register.
pub const STATUS: u16 = 0x8000;
/// Control register 1.
pub const CONTROL: u16 = 0x800D;
/// Start of frame RAM.
pub const RAM_START: u16 = 0x0400;
/// Start of the calibration EEPROM.
pub const EEPROM_START: u16 = 0x2400;

/// Words in RAM and in EEPROM.
pub const RAM_WORDS: usize = 832;
pub const EEPROM_WORDS: usize = 832;

/// RAM word offsets of the auxiliary measurements.
pub mod ram {
    pub const TA_VBE: usize = 768;
    pub const CP_SUBPAGE0: usize = 776;
    pub const GAIN: usize = 778;
    pub const TA_PTAT: usize = 800;
    pub const CP_SUBPAGE1: usize = 808;
    pub const VDD_PIX: usize = 810;
}

/// Sensor refresh rate, i.e. subpages per second.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefreshRate {
    Hz0_5 = 0,
    Hz1 = 1,
    Hz2 = 2,
    Hz4 = 3,
    Hz8 = 4,
    Hz16 = 5,
    Hz32 = 6,
    Hz64 = 7,
}

impl RefreshRate {
    /// Time between two subpages in milliseconds.
    pub fn subpage_period_ms(self) -> u32 {
        match self {
            RefreshRate::Hz0_5 => 2000,
            RefreshRate::Hz1 => 1000,
            RefreshRate::Hz2 => 500,
            RefreshRate::Hz4 => 250,
            RefreshRate::Hz8 => 125,
            RefreshRate::Hz16 => 63,
            RefreshRate::Hz32 => 32,
            RefreshRate::Hz64 => 16,
        }
    }

    fn from_bits(bits: u16) -> Self {
        match bits & 0x7 {
            0 => RefreshRate::Hz0_5,
            1 => RefreshRate::Hz1,
            2 => RefreshRate::Hz2,
            3 => RefreshRate::Hz4,
            4 => RefreshRate::Hz8,
            5 => RefreshRate::Hz16,
            6 => RefreshRate::Hz32,
            _ => RefreshRate::Hz64,
        }
    }
}

/// Status register (0x8000).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Status(pub u16);

impl Status {
    pub const LAST_SUBPAGE: u16 = 1 << 0;
    pub const NEW_DATA: u16 = 1 << 3;
    pub const OVERWRITE_ENABLE: u16 = 1 << 4;

    /// Subpage most recently written to RAM.
    #[inline]
    pub fn last_subpage(&self) -> u8 {
        (self.0 & Self::LAST_SUBPAGE) as u8
    }

    #[inline]
    pub fn new_data(&self) -> bool {
        (self.0 & Self::NEW_DATA) != 0
    }

    /// Value that acknowledges the current subpage and keeps RAM overwrite enabled.
    #[inline]
    pub fn acknowledged(&self) -> Status {
        Status((self.0 & !Self::NEW_DATA) | Self::OVERWRITE_ENABLE)
    }
}

/// ADC resolution setting, 16..19 bits.
pub const RESOLUTION_18_BIT: u16 = 2;

/// Control register 1 (0x800D).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Control(pub u16);

impl Control {
    const SUBPAGES_ENABLE: u16 = 1 << 0;
    const RATE_SHIFT: u16 = 7;
    const RATE_MASK: u16 = 0x7 << Self::RATE_SHIFT;
    const RESOLUTION_SHIFT: u16 = 10;
    const RESOLUTION_MASK: u16 = 0x3 << Self::RESOLUTION_SHIFT;
    const CHESS: u16 = 1 << 12;

    #[inline]
    pub fn refresh_rate(&self) -> RefreshRate {
        RefreshRate::from_bits(self.0 >> Self::RATE_SHIFT)
    }

    #[inline]
    pub fn resolution(&self) -> u16 {
        (self.0 & Self::RESOLUTION_MASK) >> Self::RESOLUTION_SHIFT
    }

    #[inline]
    pub fn chess_pattern(&self) -> bool {
        (self.0 & Self::CHESS) != 0
    }

    /// Subpage mode, chess pattern, 18-bit ADC and the given refresh rate; other bits kept.
    pub fn configured(&self, rate: RefreshRate) -> Control {
        let mut v = self.0;
        v &= !(Self::RATE_MASK | Self::RESOLUTION_MASK);
        v |= (rate as u16) << Self::RATE_SHIFT;
        v |= RESOLUTION_18_BIT << Self::RESOLUTION_SHIFT;
        v |= Self::CHESS | Self::SUBPAGES_ENABLE;
        Control(v)
    }
}
