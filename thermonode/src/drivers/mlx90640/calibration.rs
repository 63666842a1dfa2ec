// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Factory calibration and object temperature calculation.
//!
//! Parameter extraction and the temperature equations follow the MLX90640 datasheet, section 11
//! ("Calculation of temperature"), for the chess reading pattern. Interleaved mode is not used
//! by this board and its compensation terms are omitted.

use core::fmt;

use micromath::F32Ext;

use super::registers::{ram, EEPROM_WORDS, RAM_WORDS};
use crate::{FRAME_PIXELS, FRAME_WIDTH};

/// Offset between the sensor die and the reflected environment, open-air operation.
pub const TA_SHIFT: f32 = 8.0;

const KELVIN: f32 = 273.15;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CalibrationError {
    /// EEPROM reads back erased or blank.
    BlankEeprom,
    /// A parameter the equations divide by is zero.
    ZeroParameter(&'static str),
    /// Frame gain measurement is zero; RAM contents are unusable.
    CorruptFrame,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::BlankEeprom => f.write_str("calibration EEPROM is blank"),
            CalibrationError::ZeroParameter(name) => {
                write!(f, "calibration parameter {} is zero", name)
            }
            CalibrationError::CorruptFrame => f.write_str("frame gain reading is zero"),
        }
    }
}

/// One subpage as read from RAM, plus the registers needed to interpret it.
#[derive(Clone)]
pub struct SubpageData {
    pub words: [u16; RAM_WORDS],
    /// Control register 1 at the time of reading.
    pub control: u16,
    /// Subpage (0 or 1) the RAM holds.
    pub subpage: u8,
}

impl SubpageData {
    pub const fn new() -> Self {
        Self {
            words: [0; RAM_WORDS],
            control: 0,
            subpage: 0,
        }
    }

    #[inline]
    fn signed(&self, index: usize) -> f32 {
        self.words[index] as i16 as f32
    }
}

impl Default for SubpageData {
    fn default() -> Self {
        Self::new()
    }
}

/// Calibration constants of one camera.
#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    k_vdd: f32,
    vdd25: f32,
    kv_ptat: f32,
    kt_ptat: f32,
    v_ptat25: f32,
    alpha_ptat: f32,
    gain_ee: f32,
    tgc: f32,
    ks_ta: f32,
    resolution_ee: u8,
    ks_to: [f32; 5],
    ct: [f32; 5],
    cp_alpha: [f32; 2],
    cp_offset: [f32; 2],
    cp_kta: f32,
    cp_kv: f32,
    /// Kv only varies with the row/column parity of a pixel.
    kv: [f32; 4],
    alpha: [f32; FRAME_PIXELS],
    offset: [f32; FRAME_PIXELS],
    kta: [f32; FRAME_PIXELS],
}

/// Two's-complement value of the low `bits` bits of `raw`.
#[inline]
fn signed(raw: u16, bits: u32) -> i32 {
    let raw = raw as i32 & ((1 << bits) - 1);
    if raw >= 1 << (bits - 1) {
        raw - (1 << bits)
    } else {
        raw
    }
}

/// Exact power of two for exponents in the normal `f32` range.
#[inline]
fn pow2(n: i32) -> f32 {
    f32::from_bits(((n + 127) as u32) << 23)
}

/// Row/column parity class of a pixel: 0 odd row odd column (1-based), 1 odd row even column,
/// 2 even row odd column, 3 even row even column.
#[inline]
fn parity_class(p: usize) -> usize {
    let row = p / FRAME_WIDTH;
    let col = p % FRAME_WIDTH;
    2 * (row % 2) + (col % 2)
}

/// Subpage a pixel belongs to in chess mode.
#[inline]
pub fn chess_subpage(p: usize) -> u8 {
    let row = p / FRAME_WIDTH;
    let col = p % FRAME_WIDTH;
    ((row % 2) ^ (col % 2)) as u8
}

/// Four signed nibbles per word, least significant first.
fn nibbles<const N: usize>(words: &[u16]) -> [i32; N] {
    let mut out = [0i32; N];
    for (i, v) in out.iter_mut().enumerate() {
        let word = words[i / 4];
        *v = signed(word >> (4 * (i % 4)), 4);
    }
    out
}

/// Fourth root with one Newton step on top of the fast square roots.
#[inline]
fn fourth_root(x: f32) -> f32 {
    let mut r = x.sqrt().sqrt();
    if r > 0.0 {
        r -= (r * r * r * r - x) / (4.0 * r * r * r);
    }
    r
}

impl Calibration {
    /// Extract calibration from an EEPROM dump (832 words starting at 0x2400).
    pub fn from_eeprom(ee: &[u16; EEPROM_WORDS]) -> Result<Self, CalibrationError> {
        if ee.iter().all(|&w| w == 0xFFFF) || ee.iter().all(|&w| w == 0) {
            return Err(CalibrationError::BlankEeprom);
        }

        // Supply voltage
        let k_vdd = (signed(ee[51] >> 8, 8) * 32) as f32;
        let vdd25 = (((ee[51] & 0x00FF) as i32 - 256) * 32 - 8192) as f32;

        // Ambient (PTAT)
        let kv_ptat = signed((ee[50] & 0xFC00) >> 10, 6) as f32 / 4096.0;
        let kt_ptat = signed(ee[50] & 0x03FF, 10) as f32 / 8.0;
        let v_ptat25 = ee[49] as i16 as f32;
        let alpha_ptat = ((ee[16] & 0xF000) >> 12) as f32 / 4.0 + 8.0;

        let gain_ee = ee[48] as i16 as f32;
        let tgc = signed(ee[60] & 0x00FF, 8) as f32 / 32.0;
        let ks_ta = signed(ee[60] >> 8, 8) as f32 / 8192.0;
        let resolution_ee = ((ee[56] & 0x3000) >> 12) as u8;

        if k_vdd == 0.0 {
            return Err(CalibrationError::ZeroParameter("kVdd"));
        }
        if kt_ptat == 0.0 {
            return Err(CalibrationError::ZeroParameter("KtPTAT"));
        }
        if gain_ee == 0.0 {
            return Err(CalibrationError::ZeroParameter("gain"));
        }

        // Temperature ranges and their KsTo
        let step = (((ee[63] & 0x3000) >> 12) * 10) as f32;
        let mut ct = [-40.0, 0.0, 0.0, 0.0, 400.0];
        ct[2] = ((ee[63] & 0x00F0) >> 4) as f32 * step;
        ct[3] = ct[2] + ((ee[63] & 0x0F00) >> 8) as f32 * step;

        let ks_to_scale = pow2((ee[63] & 0x000F) as i32 + 8);
        let ks_to = [
            signed(ee[61] & 0x00FF, 8) as f32 / ks_to_scale,
            signed(ee[61] >> 8, 8) as f32 / ks_to_scale,
            signed(ee[62] & 0x00FF, 8) as f32 / ks_to_scale,
            signed(ee[62] >> 8, 8) as f32 / ks_to_scale,
            -0.0002,
        ];

        // Scales shared by compensation pixels and per-pixel terms
        let kta_scale1 = ((ee[56] & 0x00F0) >> 4) as i32 + 8;
        let kta_scale2 = (ee[56] & 0x000F) as i32;
        let kv_scale = ((ee[56] & 0x0F00) >> 8) as i32;

        // Compensation pixels
        let cp_alpha_scale = ((ee[32] & 0xF000) >> 12) as i32 + 27;
        let cp_alpha0 = signed(ee[57] & 0x03FF, 10) as f32 / pow2(cp_alpha_scale);
        let cp_alpha1 = (1.0 + signed((ee[57] & 0xFC00) >> 10, 6) as f32 / 128.0) * cp_alpha0;
        let cp_offset0 = signed(ee[58] & 0x03FF, 10);
        let cp_offset1 = signed((ee[58] & 0xFC00) >> 10, 6) + cp_offset0;
        let cp_kta = signed(ee[59] & 0x00FF, 8) as f32 / pow2(kta_scale1);
        let cp_kv = signed(ee[59] >> 8, 8) as f32 / pow2(kv_scale);

        // Per-pixel sensitivity
        let acc_rem_scale = (ee[32] & 0x000F) as i32;
        let acc_col_scale = ((ee[32] & 0x00F0) >> 4) as i32;
        let acc_row_scale = ((ee[32] & 0x0F00) >> 8) as i32;
        let alpha_scale = ((ee[32] & 0xF000) >> 12) as i32 + 30;
        let alpha_ref = ee[33] as i32;
        let acc_row: [i32; 24] = nibbles(&ee[34..40]);
        let acc_col: [i32; 32] = nibbles(&ee[40..48]);

        // Per-pixel offset
        let occ_rem_scale = (ee[16] & 0x000F) as i32;
        let occ_col_scale = ((ee[16] & 0x00F0) >> 4) as i32;
        let occ_row_scale = ((ee[16] & 0x0F00) >> 8) as i32;
        let offset_ref = ee[17] as i16 as i32;
        let occ_row: [i32; 24] = nibbles(&ee[18..24]);
        let occ_col: [i32; 32] = nibbles(&ee[24..32]);

        // Kta and Kv by parity class
        let kta_rc = [
            signed(ee[54] >> 8, 8),
            signed(ee[55] >> 8, 8),
            signed(ee[54] & 0x00FF, 8),
            signed(ee[55] & 0x00FF, 8),
        ];
        let kv_raw = [
            signed(ee[52] >> 12, 4),
            signed(ee[52] >> 4, 4),
            signed(ee[52] >> 8, 4),
            signed(ee[52], 4),
        ];
        let mut kv = [0.0f32; 4];
        for (k, raw) in kv.iter_mut().zip(kv_raw) {
            *k = raw as f32 / pow2(kv_scale);
        }

        let mut alpha = [0.0f32; FRAME_PIXELS];
        let mut offset = [0.0f32; FRAME_PIXELS];
        let mut kta = [0.0f32; FRAME_PIXELS];

        for p in 0..FRAME_PIXELS {
            let row = p / FRAME_WIDTH;
            let col = p % FRAME_WIDTH;
            let word = ee[64 + p];

            let a = signed((word & 0x03F0) >> 4, 6) * (1 << acc_rem_scale)
                + alpha_ref
                + acc_row[row] * (1 << acc_row_scale)
                + acc_col[col] * (1 << acc_col_scale);
            alpha[p] = a as f32 / pow2(alpha_scale);

            let o = signed((word & 0xFC00) >> 10, 6) * (1 << occ_rem_scale)
                + offset_ref
                + occ_row[row] * (1 << occ_row_scale)
                + occ_col[col] * (1 << occ_col_scale);
            offset[p] = o as f32;

            let k = kta_rc[parity_class(p)] + signed((word & 0x000E) >> 1, 3) * (1 << kta_scale2);
            kta[p] = k as f32 / pow2(kta_scale1);
        }

        Ok(Self {
            k_vdd,
            vdd25,
            kv_ptat,
            kt_ptat,
            v_ptat25,
            alpha_ptat,
            gain_ee,
            tgc,
            ks_ta,
            resolution_ee,
            ks_to,
            ct,
            cp_alpha: [cp_alpha0, cp_alpha1],
            cp_offset: [cp_offset0 as f32, cp_offset1 as f32],
            cp_kta,
            cp_kv,
            kv,
            alpha,
            offset,
            kta,
        })
    }

    /// Supply voltage during the measurement, in volts.
    pub fn vdd(&self, data: &SubpageData) -> f32 {
        let resolution_ram = ((data.control & 0x0C00) >> 10) as i32;
        let correction = pow2(self.resolution_ee as i32) / pow2(resolution_ram);
        (correction * data.signed(ram::VDD_PIX) - self.vdd25) / self.k_vdd + 3.3
    }

    /// Sensor ambient temperature, in °C.
    pub fn ambient(&self, data: &SubpageData, vdd: f32) -> f32 {
        let ptat = data.signed(ram::TA_PTAT);
        let vbe = data.signed(ram::TA_VBE);
        let ptat_art = ptat / (ptat * self.alpha_ptat + vbe) * 262_144.0;
        let ta = ptat_art / (1.0 + self.kv_ptat * (vdd - 3.3)) - self.v_ptat25;
        ta / self.kt_ptat + 25.0
    }

    /// Compute object temperatures for the pixels of `data.subpage`, leaving the rest of `out`
    /// untouched. Returns the ambient temperature.
    pub fn to_temperatures(
        &self,
        data: &SubpageData,
        emissivity: f32,
        out: &mut [f32; FRAME_PIXELS],
    ) -> Result<f32, CalibrationError> {
        let raw_gain = data.signed(ram::GAIN);
        if raw_gain == 0.0 {
            return Err(CalibrationError::CorruptFrame);
        }

        let vdd = self.vdd(data);
        let ta = self.ambient(data, vdd);
        let dta = ta - 25.0;
        let dvdd = vdd - 3.3;

        let tr = ta - TA_SHIFT;
        let ta4 = pow4(ta + KELVIN);
        let tr4 = pow4(tr + KELVIN);
        let ta_tr = tr4 - (tr4 - ta4) / emissivity;

        let ks_to = &self.ks_to;
        let ct = &self.ct;
        let mut alpha_corr = [0.0f32; 4];
        alpha_corr[0] = 1.0 / (1.0 + ks_to[0] * 40.0);
        alpha_corr[1] = 1.0;
        alpha_corr[2] = 1.0 + ks_to[1] * ct[2];
        alpha_corr[3] = alpha_corr[2] * (1.0 + ks_to[2] * (ct[3] - ct[2]));

        let gain = self.gain_ee / raw_gain;
        let cp_common = (1.0 + self.cp_kta * dta) * (1.0 + self.cp_kv * dvdd);
        let ir_cp = [
            data.signed(ram::CP_SUBPAGE0) * gain - self.cp_offset[0] * cp_common,
            data.signed(ram::CP_SUBPAGE1) * gain - self.cp_offset[1] * cp_common,
        ];

        let subpage = (data.subpage & 1) as usize;
        let ks_ta_term = 1.0 + self.ks_ta * dta;

        for p in (0..FRAME_PIXELS).filter(|&p| chess_subpage(p) as usize == subpage) {
            let mut ir = data.signed(p) * gain;
            ir -= self.offset[p] * (1.0 + self.kta[p] * dta) * (1.0 + self.kv[parity_class(p)] * dvdd);
            ir -= self.tgc * ir_cp[subpage];
            ir /= emissivity;

            let alpha = (self.alpha[p] - self.tgc * self.cp_alpha[subpage]) * ks_ta_term;

            let sx = fourth_root(alpha * alpha * alpha * (ir + alpha * ta_tr)) * ks_to[1];
            let to = fourth_root(ir / (alpha * (1.0 - ks_to[1] * KELVIN) + sx) + ta_tr) - KELVIN;

            let range = if to < ct[1] {
                0
            } else if to < ct[2] {
                1
            } else if to < ct[3] {
                2
            } else {
                3
            };

            out[p] = fourth_root(
                ir / (alpha * alpha_corr[range] * (1.0 + ks_to[range] * (to - ct[range]))) + ta_tr,
            ) - KELVIN;
        }

        Ok(ta)
    }
}

#[inline]
fn pow4(x: f32) -> f32 {
    let sq = x * x;
    sq * sq
}
