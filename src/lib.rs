//! Yamaha YM2413 (OPLL) FM synthesis sound chip
//!
//! Software implementation of the YM2413's digital signal chain: nine
//! two-operator FM channels, the global amplitude/phase modulation LFO, the
//! noise shift register and the rhythm-mode operator routing for the five
//! drum sounds. Given a stream of register writes and a requested number of
//! output samples it produces per-channel PCM identical in behavior to the
//! original chip at audio-sample granularity.
//!
//! Register timing, envelope behavior and the rhythm phase formulas follow
//! the reverse engineering work by Jarek Burczynski, verified against real
//! YM2413/YM3812 hardware.

mod channel;
mod fixedpoint;
mod lfo;
mod num;
mod slot;
mod state;
mod tables;

pub use slot::EnvelopeState;
pub use state::{ChannelState, SlotState, Ym2413State};

use crate::channel::Channel;
use crate::lfo::LowFrequencyOscillator;
use crate::num::GetBit;
use crate::slot::Slot;
use crate::tables::{INSTRUMENT_ROM, SIN_TAB, TL_TAB};
use std::array;
use std::sync::LazyLock;

/// Input clock of the chip; the sample rate is `CLOCK_FREQ / 72`.
pub const CLOCK_FREQ: u32 = 3_579_545;

/// Output buffer count: 9 melodic channels plus the 5 rhythm instruments
/// (bass drum, snare drum, top cymbal, high hat, tom-tom).
pub const BUFFER_COUNT: usize = 9 + 5;

// After 200ms of silence the per-sample state advancement is skipped;
// the LFO/noise phase is unobservable until a key-on ends the silence.
const IDLE_SAMPLES_THRESHOLD: u32 = CLOCK_FREQ / (72 * 5);

#[derive(Debug, Clone)]
pub struct Ym2413 {
    reg: [u8; 0x40],
    /// Instrument definitions: 0 is the user programmable instrument
    /// (mirrors registers 0x00-0x07), 1-15 the melodic ROM presets, 16-18
    /// the rhythm instruments.
    inst_tab: [[u8; 8]; 19],
    channels: [Channel; 9],
    rhythm: bool,
    eg_cnt: u32,
    noise_rng: u32,
    lfo: LowFrequencyOscillator,
    idle_samples: u32,
}

impl Ym2413 {
    #[must_use]
    pub fn new() -> Self {
        // Pay the one-time table construction cost up front
        LazyLock::force(&TL_TAB);
        LazyLock::force(&SIN_TAB);

        let mut chip = Self {
            reg: [0; 0x40],
            inst_tab: [[0; 8]; 19],
            channels: array::from_fn(|_| Channel::new()),
            rhythm: false,
            eg_cnt: 0,
            noise_rng: 0,
            lfo: LowFrequencyOscillator::new(),
            idle_samples: 0,
        };
        chip.reset();
        chip
    }

    pub fn reset(&mut self) {
        self.eg_cnt = 0;
        self.noise_rng = 1; // noise shift register must never be zero
        self.idle_samples = 0;

        self.inst_tab = INSTRUMENT_ROM;

        // Reset with register writes; descending order matters because later
        // writes depend on sustain bits committed by earlier ones
        self.write_reg(0x0F, 0); // test register
        for r in (0x10..=0x3F).rev() {
            self.write_reg(r, 0);
        }

        self.reset_operators();
    }

    fn reset_operators(&mut self) {
        for channel in &mut self.channels {
            channel.modulator.reset_operator();
            channel.carrier.reset_operator();
        }
    }

    fn num_melodic_channels(&self) -> usize {
        if self.rhythm { 6 } else { 9 }
    }

    // Channel index for the 0x10/0x20/0x30 register groups
    // (verified on real YM2413)
    fn channel_for_reg(reg: u8) -> usize {
        usize::from((reg & 0x0F) % 9)
    }

    /// Gain the host mixer applies to the accumulated channel output.
    #[must_use]
    pub fn amplification_factor(&self) -> i32 {
        1 << 4
    }

    /// Raw register mirror read; no side effects.
    #[must_use]
    pub fn peek_reg(&self, reg: u8) -> u8 {
        if reg < 0x40 { self.reg[reg as usize] } else { 0 }
    }

    pub fn write_reg(&mut self, reg: u8, value: u8) {
        if reg >= 0x40 {
            return;
        }
        self.reg[reg as usize] = value;

        log::trace!("Write to register {reg:02X}: {value:02X}");

        match reg & 0xF0 {
            0x00 => match reg & 0x0F {
                // 00-07: user instrument definition
                part @ 0x00..=0x07 => self.update_custom_instrument(part, value),
                // 0E: rhythm mode and drum key flags
                0x0E => self.set_rhythm_flags(value),
                // 0F: test register, stored only
                _ => {}
            },
            0x10 => {
                // 10-18: F-number low byte
                let ch = Self::channel_for_reg(reg);
                self.channels[ch].set_frequency_low(value);
            }
            0x20 => {
                // 20-28: sustain, key on, block, F-number bit 8
                let ch = Self::channel_for_reg(reg);
                let channel = &mut self.channels[ch];
                channel.modulator.set_key_on_off(Slot::KEY_MAIN, value.bit(4));
                channel.carrier.set_key_on_off(Slot::KEY_MAIN, value.bit(4));
                channel.set_sustain(value.bit(5));
                // The frequency update derives the release-at-sustain rate
                // from the sustain bit, so sustain must be committed first
                channel.set_frequency_high(value & 0x0F);
            }
            0x30 => {
                // 30-38: instrument in the upper nibble, volume in the lower
                let ch = Self::channel_for_reg(reg);
                let old_instvol = self.channels[ch].instvol_r;
                self.channels[ch].instvol_r = value;

                let settings = self.channels[ch].settings();
                self.channels[ch].carrier.set_total_level(settings, (value & 0x0F) << 2);

                if ch >= self.num_melodic_channels() {
                    // Rhythm mode: on channels 7 and 8 the modulator envelope
                    // is the high hat / tom-tom, with the instrument nibble
                    // acting as its volume (channel 6 is handled as usual)
                    if ch >= 7 {
                        let tl = (self.channels[ch].instvol_r >> 4) << 2;
                        self.channels[ch].modulator.set_total_level(settings, tl);
                    }
                } else if (old_instvol ^ value) & 0xF0 != 0 {
                    let patch = self.inst_tab[(value >> 4) as usize];
                    self.channels[ch].update_instrument(&patch);
                }
            }
            _ => {}
        }
    }

    fn update_custom_instrument(&mut self, part: u8, value: u8) {
        self.inst_tab[0][part as usize] = value;

        // Immediately reflected in every channel playing instrument 0
        let num_melodic = self.num_melodic_channels();
        for channel in &mut self.channels[..num_melodic] {
            if channel.instvol_r & 0xF0 == 0 {
                channel.update_instrument_part(part, value);
            }
        }
    }

    fn set_rhythm_mode(&mut self, rhythm: bool) {
        if self.rhythm == rhythm {
            return;
        }
        self.rhythm = rhythm;

        log::trace!("Rhythm mode enabled: {rhythm}");

        if rhythm {
            // Bass drum
            let patch = self.inst_tab[16];
            self.channels[6].update_instrument(&patch);
            // High hat and snare drum
            let patch = self.inst_tab[17];
            self.channels[7].update_instrument(&patch);
            let hh_tl = (self.channels[7].instvol_r >> 4) << 2;
            let settings = self.channels[7].settings();
            self.channels[7].modulator.set_total_level(settings, hh_tl);
            // Tom-tom and top cymbal
            let patch = self.inst_tab[18];
            self.channels[8].update_instrument(&patch);
            let tom_tl = (self.channels[8].instvol_r >> 4) << 2;
            let settings = self.channels[8].settings();
            self.channels[8].modulator.set_total_level(settings, tom_tl);
        } else {
            for ch in 6..9 {
                let patch = self.inst_tab[(self.channels[ch].instvol_r >> 4) as usize];
                self.channels[ch].update_instrument(&patch);
            }
            // Release every rhythm key part
            self.channels[6].modulator.set_key_off(Slot::KEY_RHYTHM);
            self.channels[6].carrier.set_key_off(Slot::KEY_RHYTHM);
            self.channels[7].modulator.set_key_off(Slot::KEY_RHYTHM);
            self.channels[7].carrier.set_key_off(Slot::KEY_RHYTHM);
            self.channels[8].modulator.set_key_off(Slot::KEY_RHYTHM);
            self.channels[8].carrier.set_key_off(Slot::KEY_RHYTHM);
        }
    }

    // flags = x | x | mode | BD | SD | TOM | TC | HH
    fn set_rhythm_flags(&mut self, flags: u8) {
        self.set_rhythm_mode(flags.bit(5));
        if self.rhythm {
            self.channels[6].modulator.set_key_on_off(Slot::KEY_RHYTHM, flags.bit(4));
            self.channels[6].carrier.set_key_on_off(Slot::KEY_RHYTHM, flags.bit(4));
            self.channels[7].modulator.set_key_on_off(Slot::KEY_RHYTHM, flags.bit(0));
            self.channels[7].carrier.set_key_on_off(Slot::KEY_RHYTHM, flags.bit(3));
            self.channels[8].modulator.set_key_on_off(Slot::KEY_RHYTHM, flags.bit(2));
            self.channels[8].carrier.set_key_on_off(Slot::KEY_RHYTHM, flags.bit(1));
        }
    }

    // The noise generator is a 23-bit shift register clocked at the sample
    // rate. Instead of feeding back bit0^bit14^bit15^bit22 into bit 22, XOR
    // with the tap mask and use bit 0 as the output; the noise bit then
    // changes one step ahead, which is unobservable after reset.
    fn clock_noise(&mut self) {
        if self.noise_rng & 1 != 0 {
            self.noise_rng ^= 0x800302;
        }
        self.noise_rng >>= 1;
    }

    /// Accumulate `num` samples into the provided buffers: indices 0-8 are
    /// the melodic channels; in rhythm mode indices 9-13 receive bass drum,
    /// snare drum, top cymbal, high hat and tom-tom. Entries for silent
    /// channels are set to `None`.
    pub fn generate_channels(
        &mut self,
        bufs: &mut [Option<&mut [i32]>; BUFFER_COUNT],
        num: usize,
    ) {
        // bits 0-8  -> channel carrier active
        // bits 16-17 -> channel 7/8 modulator active (high hat, tom-tom)
        let mut active_bits: u32 = 0;

        let num_melodic = self.num_melodic_channels();
        for ch in 0..num_melodic {
            if self.channels[ch].carrier.is_active() {
                active_bits |= 1 << ch;
            } else {
                bufs[ch] = None;
            }
        }
        if self.rhythm {
            bufs[6] = None;
            bufs[7] = None;
            bufs[8] = None;
            for ch in 6..9 {
                if self.channels[ch].carrier.is_active() {
                    active_bits |= 1 << ch;
                } else {
                    bufs[ch + 3] = None;
                }
            }
            if self.channels[7].modulator.is_active() {
                active_bits |= 1 << (7 + 9);
            } else {
                bufs[12] = None;
            }
            if self.channels[8].modulator.is_active() {
                active_bits |= 1 << (8 + 9);
            } else {
                bufs[13] = None;
            }
        } else {
            for buf in &mut bufs[9..] {
                *buf = None;
            }
        }

        if active_bits != 0 {
            self.idle_samples = 0;
        } else {
            if self.idle_samples > IDLE_SAMPLES_THRESHOLD {
                // Idle for over 200ms: skip advancing the envelope counter,
                // LFO and noise entirely
                return;
            }
            self.idle_samples += num as u32;
        }

        for i in 0..num {
            self.lfo.clock_am();
            let lfo_am = self.lfo.am_output();
            let lfo_pm = self.lfo.pm_output();

            for ch in 0..num_melodic {
                let channel = &mut self.channels[ch];
                let settings = channel.settings();
                let fm =
                    channel.modulator.calc_slot_mod(settings, self.eg_cnt, false, lfo_pm, lfo_am);
                if active_bits.bit(ch as u8) {
                    let output = channel.calc_output(self.eg_cnt, lfo_pm, lfo_am, fm);
                    if let Some(buf) = &mut bufs[ch] {
                        buf[i] += output;
                    }
                }
            }

            if self.rhythm {
                // Bass drum: a normal two-operator channel, output doubled.
                // (With connect == 1 the real chip presents operator 2 alone
                // on the output; op1 -> op2 routing is used unconditionally
                // here, matching long-standing emulation behavior.)
                let settings6 = self.channels[6].settings();
                let fm = self.channels[6].modulator.calc_slot_mod(
                    settings6, self.eg_cnt, true, lfo_pm, lfo_am,
                );
                if active_bits.bit(6) {
                    let output = 2 * self.channels[6].calc_output(self.eg_cnt, lfo_pm, lfo_am, fm);
                    if let Some(buf) = &mut bufs[9] {
                        buf[i] += output;
                    }
                }

                // The remaining drums combine the phase generators of
                // channel 7 slot 1 and channel 8 slot 2 in non-standard ways
                let settings7 = self.channels[7].settings();
                let settings8 = self.channels[8].settings();
                self.channels[7].carrier.calc_phase(settings7, lfo_pm);
                let phase_m7 = self.channels[7].modulator.calc_phase(settings7, lfo_pm);
                let phase_c8 = self.channels[8].carrier.calc_phase(settings8, lfo_pm);
                let phase_m8 = self.channels[8].modulator.calc_phase(settings8, lfo_pm);

                // Snare drum
                if active_bits.bit(7) {
                    let phase = gen_phase_snare(phase_m7, self.noise_rng);
                    let output = 2 * self.channels[7].carrier.calc_output(
                        settings7, self.eg_cnt, true, lfo_am, phase,
                    );
                    if let Some(buf) = &mut bufs[10] {
                        buf[i] += output;
                    }
                }

                // Top cymbal
                if active_bits.bit(8) {
                    let phase = gen_phase_cymbal(phase_m7, phase_c8);
                    let output = 2 * self.channels[8].carrier.calc_output(
                        settings8, self.eg_cnt, true, lfo_am, phase,
                    );
                    if let Some(buf) = &mut bufs[11] {
                        buf[i] += output;
                    }
                }

                // High hat
                if active_bits.bit(7 + 9) {
                    let phase = gen_phase_high_hat(phase_m7, phase_c8, self.noise_rng);
                    let output = 2 * self.channels[7].modulator.calc_output(
                        settings7, self.eg_cnt, true, lfo_am, phase,
                    );
                    if let Some(buf) = &mut bufs[12] {
                        buf[i] += output;
                    }
                }

                // Tom-tom runs on its own natural phase
                if active_bits.bit(8 + 9) {
                    let output = 2 * self.channels[8].modulator.calc_output(
                        settings8, self.eg_cnt, true, lfo_am, phase_m8,
                    );
                    if let Some(buf) = &mut bufs[13] {
                        buf[i] += output;
                    }
                }
            }

            self.lfo.clock_pm();
            self.eg_cnt = self.eg_cnt.wrapping_add(1);
            self.clock_noise();
        }
    }
}

impl Default for Ym2413 {
    fn default() -> Self {
        Self::new()
    }
}

fn gen_phase_high_hat(phase_m7: i32, phase_c8: i32, noise_rng: u32) -> i32 {
    // Gate based on the frequency of operator 2 in channel 8; base
    // frequency derived from operator 1 in channel 7
    let hi = if phase_c8 & 0x28 != 0 {
        true
    } else {
        let bit7 = phase_m7.bit(7);
        let bit3 = phase_m7.bit(3);
        let bit2 = phase_m7.bit(2);
        (bit2 ^ bit7) | bit3
    };
    if noise_rng & 1 != 0 {
        if hi { 0x200 | 0xD0 } else { 0xD0 >> 2 }
    } else {
        if hi { 0x200 | (0xD0 >> 2) } else { 0xD0 }
    }
}

fn gen_phase_snare(phase_m7: i32, noise_rng: u32) -> i32 {
    // Base frequency from operator 1 in channel 7; the noise bit XORs the
    // phase by 0x100
    ((phase_m7 & 0x100) + 0x100) ^ (((noise_rng & 1) as i32) << 8)
}

fn gen_phase_cymbal(phase_m7: i32, phase_c8: i32) -> i32 {
    if phase_c8 & 0x28 != 0 {
        0x300
    } else {
        let bit7 = phase_m7.bit(7);
        let bit3 = phase_m7.bit(3);
        let bit2 = phase_m7.bit(2);
        if (bit2 != bit7) || bit3 { 0x300 } else { 0x100 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{MAX_ATT_INDEX, MIN_ATT_INDEX, MUL_TAB};

    fn zeroed_storage(len: usize) -> [Vec<i32>; BUFFER_COUNT] {
        array::from_fn(|_| vec![0; len])
    }

    fn buffers(storage: &mut [Vec<i32>; BUFFER_COUNT]) -> [Option<&mut [i32]>; BUFFER_COUNT] {
        storage.each_mut().map(|buf| Some(buf.as_mut_slice()))
    }

    #[test]
    fn silence_after_reset() {
        let mut chip = Ym2413::new();

        let mut storage = zeroed_storage(64);
        {
            let mut bufs = buffers(&mut storage);
            chip.generate_channels(&mut bufs, 64);
            for buf in &bufs {
                assert!(buf.is_none(), "every channel must be silent after reset");
            }
        }
        for buf in &storage {
            assert!(buf.iter().all(|&sample| sample == 0));
        }
    }

    #[test]
    fn keyed_melodic_channel_produces_output() {
        let mut chip = Ym2413::new();
        chip.write_reg(0x30, 0x30); // channel 0: piano, full volume
        chip.write_reg(0x10, 0x00);
        chip.write_reg(0x20, 0x15); // key on, sustain off

        let mut storage = zeroed_storage(2);
        {
            let mut bufs = buffers(&mut storage);
            chip.generate_channels(&mut bufs, 2);
            assert!(bufs[0].is_some());
            for buf in &bufs[1..] {
                assert!(buf.is_none());
            }
        }
        // The first sample is the pre-attack dump; the attack is audible
        // from the second sample on
        assert_eq!(storage[0][0], 0);
        assert_ne!(storage[0][1], 0);
    }

    #[test]
    fn idle_detection_stops_state_advancement() {
        let mut chip = Ym2413::new();
        let mut bufs: [Option<&mut [i32]>; BUFFER_COUNT] = array::from_fn(|_| None);

        for _ in 0..40 {
            chip.generate_channels(&mut bufs, 512);
        }

        // 512-sample chunks accumulate until the idle counter passes
        // CLOCK_FREQ / (72 * 5) = 9943, then the chip stops advancing
        assert_eq!(chip.eg_cnt, 10_240);

        chip.generate_channels(&mut bufs, 44_100);
        assert_eq!(chip.eg_cnt, 10_240);
    }

    #[test]
    fn rhythm_mode_without_drums_is_silent() {
        let mut chip = Ym2413::new();
        chip.write_reg(0x0E, 0x20);

        let mut storage = zeroed_storage(1);
        {
            let mut bufs = buffers(&mut storage);
            chip.generate_channels(&mut bufs, 1);
            for buf in &bufs {
                assert!(buf.is_none());
            }
        }
        for buf in &storage {
            assert!(buf.iter().all(|&sample| sample == 0));
        }
    }

    #[test]
    fn all_drums_produce_output() {
        let mut chip = Ym2413::new();
        chip.write_reg(0x0E, 0x3F); // rhythm mode, all five drums keyed

        let mut storage = zeroed_storage(2000);
        {
            let mut bufs = buffers(&mut storage);
            chip.generate_channels(&mut bufs, 2000);
            for buf in &bufs[9..] {
                assert!(buf.is_some(), "keyed drum slots must stay active");
            }
        }
        for (i, buf) in storage[9..].iter().enumerate() {
            assert!(
                buf.iter().any(|&sample| sample != 0),
                "drum buffer {} must produce output once the attack completes",
                9 + i
            );
        }
    }

    #[test]
    fn rhythm_key_wiring() {
        let rhythm_keyed = |slot: &Slot| slot.key & Slot::KEY_RHYTHM != 0;

        let mut chip = Ym2413::new();
        chip.write_reg(0x0E, 0x20);
        for channel in &chip.channels[6..] {
            assert!(!rhythm_keyed(&channel.modulator));
            assert!(!rhythm_keyed(&channel.carrier));
        }

        chip.write_reg(0x0E, 0x3F);
        assert!(rhythm_keyed(&chip.channels[6].modulator)); // bass drum
        assert!(rhythm_keyed(&chip.channels[6].carrier)); // bass drum
        assert!(rhythm_keyed(&chip.channels[7].modulator)); // high hat
        assert!(rhythm_keyed(&chip.channels[7].carrier)); // snare drum
        assert!(rhythm_keyed(&chip.channels[8].modulator)); // tom-tom
        assert!(rhythm_keyed(&chip.channels[8].carrier)); // top cymbal

        // Leaving rhythm mode releases every rhythm key part
        chip.write_reg(0x0E, 0x00);
        for channel in &chip.channels[6..] {
            assert!(!rhythm_keyed(&channel.modulator));
            assert!(!rhythm_keyed(&channel.carrier));
        }
    }

    #[test]
    fn noise_shift_register_period() {
        let mut chip = Ym2413::new();
        assert_eq!(chip.noise_rng, 1);

        // The 23-bit shift register runs through every non-zero state
        let mut period = 0_u64;
        loop {
            chip.clock_noise();
            period += 1;
            assert_ne!(chip.noise_rng, 0, "noise shift register must never reach zero");
            if chip.noise_rng == 1 {
                break;
            }
        }
        assert_eq!(period, (1 << 23) - 1);
    }

    #[test]
    fn envelope_traverses_states_and_stays_clamped() {
        let mut chip = Ym2413::new();
        chip.write_reg(0x30, 0x10); // violin (sustained tone)
        chip.write_reg(0x10, 0x80);
        chip.write_reg(0x20, 0x14); // key on

        assert_eq!(chip.channels[0].carrier.state, EnvelopeState::Dump);

        let mut storage = zeroed_storage(1);
        let mut states = vec![chip.channels[0].carrier.state];
        for _ in 0..20_000 {
            let mut bufs = buffers(&mut storage);
            chip.generate_channels(&mut bufs, 1);

            let carrier = &chip.channels[0].carrier;
            assert!((MIN_ATT_INDEX..=MAX_ATT_INDEX).contains(&carrier.egout));
            if states.last() != Some(&carrier.state) {
                states.push(carrier.state);
            }
            if carrier.state == EnvelopeState::Sustain {
                break;
            }
        }
        assert_eq!(
            states,
            [
                EnvelopeState::Dump,
                EnvelopeState::Attack,
                EnvelopeState::Decay,
                EnvelopeState::Sustain
            ]
        );

        chip.write_reg(0x20, 0x04); // key off
        assert_eq!(chip.channels[0].carrier.state, EnvelopeState::Release);

        let mut previous = chip.channels[0].carrier.egout;
        for _ in 0..60_000 {
            let mut bufs = buffers(&mut storage);
            chip.generate_channels(&mut bufs, 1);

            let carrier = &chip.channels[0].carrier;
            assert!((MIN_ATT_INDEX..=MAX_ATT_INDEX).contains(&carrier.egout));
            assert!(carrier.egout >= previous, "release must raise attenuation monotonically");
            previous = carrier.egout;
            if !carrier.is_active() {
                break;
            }
        }
        assert_eq!(chip.channels[0].carrier.state, EnvelopeState::Off);
        assert_eq!(chip.channels[0].carrier.egout, MAX_ATT_INDEX);
    }

    #[test]
    fn custom_instrument_propagates_to_selected_channels_only() {
        let mut chip = Ym2413::new();
        chip.write_reg(0x31, 0x10); // channel 1 plays the violin preset
        let rom_mul = chip.channels[1].modulator.mul;

        chip.write_reg(0x00, 0x4F); // user instrument: vibrato, multiplier 15
        assert_eq!(chip.inst_tab[0][0], 0x4F);

        // Channel 0 still has instrument 0 selected
        assert_eq!(chip.channels[0].modulator.mul, MUL_TAB[0x0F]);
        assert!(chip.channels[0].modulator.vib);

        // Channels on ROM presets are unaffected
        assert_eq!(chip.channels[1].modulator.mul, rom_mul);
        assert_ne!(chip.channels[1].modulator.mul, MUL_TAB[0x0F]);
    }

    #[test]
    fn user_instrument_matches_equivalent_rom_preset() {
        let mut chip1 = Ym2413::new();
        for (part, &value) in INSTRUMENT_ROM[1].iter().enumerate() {
            chip1.write_reg(part as u8, value);
        }
        chip1.write_reg(0x30, 0x00); // instrument 0 (user), full volume

        let mut chip2 = Ym2413::new();
        chip2.write_reg(0x30, 0x10); // instrument 1 (violin), full volume

        assert_eq!(
            chip1.save_state().channels[0].slots,
            chip2.save_state().channels[0].slots
        );
    }

    #[test]
    fn save_state_round_trip_is_bit_exact() {
        let mut chip = Ym2413::new();
        chip.write_reg(0x30, 0x21);
        chip.write_reg(0x10, 0x45);
        chip.write_reg(0x20, 0x17);
        chip.write_reg(0x31, 0x52);
        chip.write_reg(0x11, 0x99);
        chip.write_reg(0x21, 0x1C);
        chip.write_reg(0x0E, 0x3F);

        let mut warmup = zeroed_storage(777);
        chip.generate_channels(&mut buffers(&mut warmup), 777);

        let state = chip.save_state();

        let mut first = zeroed_storage(500);
        chip.generate_channels(&mut buffers(&mut first), 500);

        let mut restored = Ym2413::new();
        restored.load_state(&state);
        let mut second = zeroed_storage(500);
        restored.generate_channels(&mut buffers(&mut second), 500);

        assert_eq!(first, second);

        // The snapshot itself must survive serialization unchanged
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(&state, config).unwrap();
        let (decoded, _) = bincode::decode_from_slice::<Ym2413State, _>(&bytes, config).unwrap();
        assert_eq!(state, decoded);
    }

    #[test]
    fn out_of_range_register_writes_are_ignored() {
        let mut chip = Ym2413::new();
        let state = chip.save_state();

        chip.write_reg(0x40, 0xFF);
        chip.write_reg(0xFF, 0xFF);

        assert_eq!(chip.save_state(), state);
        assert_eq!(chip.peek_reg(0x40), 0);
    }

    #[test]
    fn register_mirror_reflects_writes() {
        let mut chip = Ym2413::new();
        chip.write_reg(0x0F, 0x55); // test register: stored, no side effect
        assert_eq!(chip.peek_reg(0x0F), 0x55);

        chip.write_reg(0x16, 0xAB);
        assert_eq!(chip.peek_reg(0x16), 0xAB);
    }
}
