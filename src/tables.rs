//! Lookup tables shared by every chip instance
//!
//! The two tables that need floating-point math to build (total-level →
//! linear sample, logarithmic sine) are lazily initialized process-globals;
//! everything else is a plain constant. All values match the tables verified
//! against real YM2413/YM3812 hardware in the original reverse engineering
//! work by Jarek Burczynski.

use std::sync::LazyLock;

// Envelope attenuation is 10 bits of which the top 8 are used
pub const ENV_BITS: u32 = 10;
const ENV_STEP: f64 = 128.0 / (1 << ENV_BITS) as f64;

pub const MAX_ATT_INDEX: i32 = (1 << (ENV_BITS - 2)) - 1; // 255
pub const MIN_ATT_INDEX: i32 = 0;

pub const SIN_BITS: u32 = 10;
pub const SIN_LEN: usize = 1 << SIN_BITS;
pub const SIN_MASK: usize = SIN_LEN - 1;

const TL_RES_LEN: usize = 256; // 8-bit addressing, as on the real chip

// 11 amplitude shifts * 2 signs * 256 resolution steps
pub const TL_TAB_LEN: usize = 11 * 2 * TL_RES_LEN;

/// Total-level (attenuation) to linear sample value, signed pairs: even
/// indices are positive, odd indices the negated value, so the sine table's
/// low sign bit selects the polarity directly.
pub static TL_TAB: LazyLock<[i32; TL_TAB_LEN]> = LazyLock::new(|| {
    let mut tab = [0; TL_TAB_LEN];
    for x in 0..TL_RES_LEN {
        let m = ((1u32 << 16) as f64
            / 2.0_f64.powf((x as f64 + 1.0) * (ENV_STEP / 4.0) / 8.0))
        .floor();

        // 16 bits at maximum (never reaches 1 << 16 due to the x + 1)
        let mut n = m as i32;
        n >>= 4; // 12 bits
        n = (n >> 1) + (n & 1); // round to 11 bits
        for i in 0..11 {
            tab[x * 2 + i * 2 * TL_RES_LEN] = n >> i;
            tab[x * 2 + 1 + i * 2 * TL_RES_LEN] = -(n >> i);
        }
    }
    tab
});

/// Sine waveforms in attenuation units; the low bit is the sign selector
/// into [`TL_TAB`]. Waveform 0 is the full sine, waveform 1 the positive
/// half with the negative half mapped to `TL_TAB_LEN` (always silent).
pub static SIN_TAB: LazyLock<[i32; 2 * SIN_LEN]> = LazyLock::new(|| {
    let mut tab = [0; 2 * SIN_LEN];
    for i in 0..SIN_LEN / 4 {
        let m = (((i * 2) + 1) as f64 * std::f64::consts::PI / SIN_LEN as f64).sin();
        let n = (m.ln() * (-256.0 / 2.0_f64.ln())).round() as i32;
        tab[i] = 2 * n;
        tab[SIN_LEN + i] = 2 * n;
    }
    for i in 0..SIN_LEN / 4 {
        tab[SIN_LEN / 4 + i] = tab[SIN_LEN / 4 - 1 - i];
        tab[SIN_LEN + SIN_LEN / 4 + i] = tab[SIN_LEN / 4 - 1 - i];
    }
    for i in 0..SIN_LEN / 2 {
        tab[SIN_LEN / 2 + i] = tab[i] | 1;
        tab[SIN_LEN + SIN_LEN / 2 + i] = TL_TAB_LEN as i32;
    }
    tab
});

// Key scale level, indexed by the top 7 bits of block_fnum.
// The underlying curve is 3dB/octave; values are stored doubled to get the
// chip's 6dB/octave in envelope counter units (0.1875 dB per unit).
#[rustfmt::skip]
pub const KSL_TAB: [i32; 8 * 16] = [
    // OCT 0
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
    // OCT 1
     0,  0,  0,  0,  0,  0,  0,  0,  0,  4,  6,  8, 10, 12, 14, 16,
    // OCT 2
     0,  0,  0,  0,  0,  6, 10, 14, 16, 20, 22, 24, 26, 28, 30, 32,
    // OCT 3
     0,  0,  0, 10, 16, 22, 26, 30, 32, 36, 38, 40, 42, 44, 46, 48,
    // OCT 4
     0,  0, 16, 26, 32, 38, 42, 46, 48, 52, 54, 56, 58, 60, 62, 64,
    // OCT 5
     0, 16, 32, 42, 48, 54, 58, 62, 64, 68, 70, 72, 74, 76, 78, 80,
    // OCT 6
     0, 32, 48, 58, 64, 70, 74, 78, 80, 84, 86, 88, 90, 92, 94, 96,
    // OCT 7
     0, 48, 64, 74, 80, 86, 90, 94, 96, 100, 102, 104, 106, 108, 110, 112,
];

// Sustain level, 3dB per step (0..45 dB) in envelope counter units
#[rustfmt::skip]
pub const SL_TAB: [i32; 16] = [
      0,   8,  16,  24,  32,  40,  48,  56,
     64,  72,  80,  88,  96, 104, 112, 120,
];

// 8-step envelope increment patterns; rows 0-3 serve rates 0-12, rows 4-7
// rate 13, rows 8-11 rate 14, row 12 rate 15 (and 15 for attack uses row
// 13), row 14 is the "infinite time" rate
#[rustfmt::skip]
pub const EG_INC: [[u8; 8]; 15] = [
    // cycle: 0 1  2 3  4 5  6 7
    [0, 1, 0, 1, 0, 1, 0, 1], // rates 00..12 0
    [0, 1, 0, 1, 1, 1, 0, 1], // rates 00..12 1
    [0, 1, 1, 1, 0, 1, 1, 1], // rates 00..12 2
    [0, 1, 1, 1, 1, 1, 1, 1], // rates 00..12 3

    [1, 1, 1, 1, 1, 1, 1, 1], // rate 13 0
    [1, 1, 1, 2, 1, 1, 1, 2], // rate 13 1
    [1, 2, 1, 2, 1, 2, 1, 2], // rate 13 2
    [1, 2, 2, 2, 1, 2, 2, 2], // rate 13 3

    [2, 2, 2, 2, 2, 2, 2, 2], // rate 14 0
    [2, 2, 2, 4, 2, 2, 2, 4], // rate 14 1
    [2, 4, 2, 4, 2, 4, 2, 4], // rate 14 2
    [2, 4, 4, 4, 2, 4, 4, 4], // rate 14 3

    [4, 4, 4, 4, 4, 4, 4, 4], // rates 15 0..15 3
    [8, 8, 8, 8, 8, 8, 8, 8], // rates 15 2, 15 3 for attack
    [0, 0, 0, 0, 0, 0, 0, 0], // infinite rates
];

/// Index of the attack-rate-overflow row in [`EG_INC`].
pub const EG_INC_ATTACK_OVERFLOW: u8 = 13;

// Increment-pattern selector per effective rate (16 infinite + 64 rates +
// 16 dummy RKS overflow entries). There is no row 13 here; the attack
// overflow row is selected directly in the code.
#[rustfmt::skip]
pub const EG_RATE_SELECT: [u8; 16 + 64 + 16] = [
    // 16 infinite time rates
    14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14,

    // rates 00-12
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,
     0,  1,  2,  3,

    // rate 13
     4,  5,  6,  7,

    // rate 14
     8,  9, 10, 11,

    // rate 15
    12, 12, 12, 12,

    // 16 dummy rates (same as 15 3)
    12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12,
];

// rate  0,    1,    2,    3,    4,   5,   6,   7,  8,  9, 10, 11, 12, 13, 14, 15
// shift 13,   12,   11,   10,   9,   8,   7,   6,  5,  4,  3,  2,  1,  0,  0,  0
#[rustfmt::skip]
pub const EG_RATE_SHIFT: [u8; 16 + 64 + 16] = [
    // 16 infinite time rates
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,

    // rates 00-12
    13, 13, 13, 13,
    12, 12, 12, 12,
    11, 11, 11, 11,
    10, 10, 10, 10,
     9,  9,  9,  9,
     8,  8,  8,  8,
     7,  7,  7,  7,
     6,  6,  6,  6,
     5,  5,  5,  5,
     4,  4,  4,  4,
     3,  3,  3,  3,
     2,  2,  2,  2,
     1,  1,  1,  1,

    // rates 13-15
     0,  0,  0,  0,
     0,  0,  0,  0,
     0,  0,  0,  0,

    // 16 dummy rates
     0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,  0,
];

// Frequency multipliers, doubled so the x0.5 entry stays integral
pub const MUL_TAB: [u32; 16] = [1, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 20, 24, 24, 30, 30];

pub const LFO_AM_TAB_ELEMENTS: usize = 210;

// LFO amplitude modulation triangle (verified on real YM3812); 27 output
// levels, each table entry lasting 64 consecutive samples
#[rustfmt::skip]
pub const LFO_AM_TABLE: [u8; LFO_AM_TAB_ELEMENTS] = [
     0,  0,  0,  0,  0,  0,  0,
     1,  1,  1,  1,
     2,  2,  2,  2,
     3,  3,  3,  3,
     4,  4,  4,  4,
     5,  5,  5,  5,
     6,  6,  6,  6,
     7,  7,  7,  7,
     8,  8,  8,  8,
     9,  9,  9,  9,
    10, 10, 10, 10,
    11, 11, 11, 11,
    12, 12, 12, 12,
    13, 13, 13, 13,
    14, 14, 14, 14,
    15, 15, 15, 15,
    16, 16, 16, 16,
    17, 17, 17, 17,
    18, 18, 18, 18,
    19, 19, 19, 19,
    20, 20, 20, 20,
    21, 21, 21, 21,
    22, 22, 22, 22,
    23, 23, 23, 23,
    24, 24, 24, 24,
    25, 25, 25, 25,
    26, 26, 26,
    25, 25, 25, 25,
    24, 24, 24, 24,
    23, 23, 23, 23,
    22, 22, 22, 22,
    21, 21, 21, 21,
    20, 20, 20, 20,
    19, 19, 19, 19,
    18, 18, 18, 18,
    17, 17, 17, 17,
    16, 16, 16, 16,
    15, 15, 15, 15,
    14, 14, 14, 14,
    13, 13, 13, 13,
    12, 12, 12, 12,
    11, 11, 11, 11,
    10, 10, 10, 10,
     9,  9,  9,  9,
     8,  8,  8,  8,
     7,  7,  7,  7,
     6,  6,  6,  6,
     5,  5,  5,  5,
     4,  4,  4,  4,
     3,  3,  3,  3,
     2,  2,  2,  2,
     1,  1,  1,  1,
];

// LFO phase modulation offsets (verified on real YM2413), indexed by the
// top 3 bits of the low 9 bits of block_fnum and the PM phase
#[rustfmt::skip]
pub const LFO_PM_TABLE: [[i8; 8]; 8] = [
    // FNUM2/FNUM = 0 00xxxxxx (0x0000)
    [0, 0, 0, 0, 0, 0, 0, 0],
    // FNUM2/FNUM = 0 01xxxxxx (0x0040)
    [1, 0, 0, 0, -1, 0, 0, 0],
    // FNUM2/FNUM = 0 10xxxxxx (0x0080)
    [2, 1, 0, -1, -2, -1, 0, 1],
    // FNUM2/FNUM = 0 11xxxxxx (0x00C0)
    [3, 1, 0, -1, -3, -1, 0, 1],
    // FNUM2/FNUM = 1 00xxxxxx (0x0100)
    [4, 2, 0, -2, -4, -2, 0, 2],
    // FNUM2/FNUM = 1 01xxxxxx (0x0140)
    [5, 2, 0, -2, -5, -2, 0, 2],
    // FNUM2/FNUM = 1 10xxxxxx (0x0180)
    [6, 3, 0, -3, -6, -3, 0, 3],
    // FNUM2/FNUM = 1 11xxxxxx (0x01C0)
    [7, 3, 0, -3, -7, -3, 0, 3],
];

// Built-in instrument and rhythm definitions. Slot 0 is the user
// programmable instrument (mirrors registers 0x00-0x07), 1-15 the melodic
// presets, 16-18 the rhythm instruments.
#[rustfmt::skip]
pub const INSTRUMENT_ROM: [[u8; 8]; 19] = [
    // MULT  MULT modTL DcDmFb AR/DR AR/DR SL/RR SL/RR
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // user instrument
    [0x61, 0x61, 0x1e, 0x17, 0xf0, 0x7f, 0x00, 0x17], // violin
    [0x13, 0x41, 0x16, 0x0e, 0xfd, 0xf4, 0x23, 0x23], // guitar
    [0x03, 0x01, 0x9a, 0x04, 0xf3, 0xf3, 0x13, 0xf3], // piano
    [0x11, 0x61, 0x0e, 0x07, 0xfa, 0x64, 0x70, 0x17], // flute
    [0x22, 0x21, 0x1e, 0x06, 0xf0, 0x76, 0x00, 0x28], // clarinet
    [0x21, 0x22, 0x16, 0x05, 0xf0, 0x71, 0x00, 0x18], // oboe
    [0x21, 0x61, 0x1d, 0x07, 0x82, 0x80, 0x17, 0x17], // trumpet
    [0x23, 0x21, 0x2d, 0x16, 0x90, 0x90, 0x00, 0x07], // organ
    [0x21, 0x21, 0x1b, 0x06, 0x64, 0x65, 0x10, 0x17], // horn
    [0x21, 0x21, 0x0b, 0x1a, 0x85, 0xa0, 0x70, 0x07], // synthesizer
    [0x23, 0x01, 0x83, 0x10, 0xff, 0xb4, 0x10, 0xf4], // harpsichord
    [0x97, 0xc1, 0x20, 0x07, 0xff, 0xf4, 0x22, 0x22], // vibraphone
    [0x61, 0x00, 0x0c, 0x05, 0xc2, 0xf6, 0x40, 0x44], // synthesizer bass
    [0x01, 0x01, 0x56, 0x03, 0x94, 0xc2, 0x03, 0x12], // acoustic bass
    [0x21, 0x01, 0x89, 0x03, 0xf1, 0xe4, 0xf0, 0x23], // electric guitar
    [0x01, 0x01, 0x16, 0x00, 0xfd, 0xf8, 0x2f, 0x6d], // bass drum
    [0x01, 0x01, 0x00, 0x00, 0xd8, 0xd8, 0xf9, 0xf8], // high hat / snare drum
    [0x05, 0x01, 0x00, 0x00, 0xf8, 0xba, 0x49, 0x55], // tom-tom / top cymbal
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tl_tab_sign_pairs() {
        for i in (0..TL_TAB_LEN).step_by(2) {
            assert_eq!(TL_TAB[i], -TL_TAB[i + 1]);
        }
        // Attenuation rows halve with each shift
        assert_eq!(TL_TAB[2 * TL_RES_LEN], TL_TAB[0] >> 1);
    }

    #[test]
    fn sin_tab_symmetry() {
        // Second half of the full sine carries the sign bit
        for i in 0..SIN_LEN / 2 {
            assert_eq!(SIN_TAB[SIN_LEN / 2 + i], SIN_TAB[i] | 1);
        }
        // Negative half of the rectified wave is silent
        for i in 0..SIN_LEN / 2 {
            assert_eq!(SIN_TAB[SIN_LEN + SIN_LEN / 2 + i], TL_TAB_LEN as i32);
        }
        // Peak of the sine has (nearly) no attenuation
        assert_eq!(SIN_TAB[SIN_LEN / 4] & !1, 0);
    }
}
