//! One of the nine melody channels: a modulator/carrier slot pair plus the
//! frequency, sustain and instrument/volume state they share

use crate::fixedpoint::FreqIndex;
use crate::slot::Slot;
use crate::tables::KSL_TAB;
use crate::num::GetBit;

/// Phase increment for a 12-bit block/F-number value, in 16.16 fixed point.
/// The OPLL's internal phase increment counter is 18 bits (10.10 on the real
/// chip).
pub(crate) fn fnum_to_increment(block_fnum: u32) -> FreqIndex {
    let block = (block_fnum & 0x1C00) >> 10;
    FreqIndex::from_int(block_fnum & 0x03FF) >> (11 - block)
}

/// Channel state shared by both slots, passed by value into slot methods
/// (the call sites always have the channel in hand).
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ChannelSettings {
    /// 9 bits F-number + 3 bits block.
    pub(crate) block_fnum: u16,
    /// Frequency increment derived from `block_fnum`.
    pub(crate) fc: FreqIndex,
    /// Key-scale-level attenuation base derived from `block_fnum`.
    pub(crate) ksl_base: i32,
    /// Channel sustain flag (register 0x20 bit 5).
    pub(crate) sus: bool,
}

impl ChannelSettings {
    /// BLK 2,1,0 bits -> bits 3,2,1 of the key code, FNUM MSB -> LSB.
    pub(crate) fn key_code(self) -> u32 {
        u32::from((self.block_fnum & 0x0F00) >> 8)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Channel {
    pub(crate) modulator: Slot,
    pub(crate) carrier: Slot,
    pub(crate) settings: ChannelSettings,
    /// Last write to register 0x30+ch: instrument number in the upper
    /// nibble, volume in the lower.
    pub(crate) instvol_r: u8,
}

impl Channel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn settings(&self) -> ChannelSettings {
        self.settings
    }

    fn set_frequency(&mut self, block_fnum: u16) {
        if self.settings.block_fnum == block_fnum {
            return;
        }
        self.settings.block_fnum = block_fnum;
        self.settings.ksl_base = KSL_TAB[(block_fnum >> 5) as usize];
        self.settings.fc = fnum_to_increment(u32::from(block_fnum) * 2);

        log::trace!("F-number/block: {block_fnum:03X}");

        // Refresh total level and frequency counter in both slots
        let settings = self.settings;
        self.modulator.update_frequency(settings);
        self.carrier.update_frequency(settings);
    }

    pub(crate) fn set_frequency_low(&mut self, value: u8) {
        self.set_frequency((self.settings.block_fnum & 0x0F00) | u16::from(value));
    }

    pub(crate) fn set_frequency_high(&mut self, value: u8) {
        self.set_frequency((u16::from(value) << 8) | (self.settings.block_fnum & 0x00FF));
    }

    pub(crate) fn set_sustain(&mut self, sustained: bool) {
        self.settings.sus = sustained;
    }

    /// Apply one byte of an instrument definition to the slot parameters it
    /// controls.
    pub(crate) fn update_instrument_part(&mut self, part: u8, value: u8) {
        let settings = self.settings;
        match part {
            0 => {
                self.modulator.set_frequency_multiplier(value & 0x0F);
                self.modulator.set_key_scale_rate(value.bit(4));
                self.modulator.set_envelope_sustained(value.bit(5));
                self.modulator.set_vibrato(value.bit(6));
                self.modulator.set_amplitude_modulation(value.bit(7));
                self.modulator.update_generators(settings);
            }
            1 => {
                self.carrier.set_frequency_multiplier(value & 0x0F);
                self.carrier.set_key_scale_rate(value.bit(4));
                self.carrier.set_envelope_sustained(value.bit(5));
                self.carrier.set_vibrato(value.bit(6));
                self.carrier.set_amplitude_modulation(value.bit(7));
                self.carrier.update_generators(settings);
            }
            2 => {
                self.modulator.set_key_scale_level(settings, value >> 6);
                self.modulator.set_total_level(settings, value & 0x3F);
            }
            3 => {
                self.modulator.set_waveform((value & 0x08) >> 3);
                self.modulator.set_feedback_shift(value & 0x07);
                self.carrier.set_key_scale_level(settings, value >> 6);
                self.carrier.set_waveform((value & 0x10) >> 4);
            }
            4 => {
                self.modulator.set_attack_rate(settings, value >> 4);
                self.modulator.set_decay_rate(settings, value & 0x0F);
            }
            5 => {
                self.carrier.set_attack_rate(settings, value >> 4);
                self.carrier.set_decay_rate(settings, value & 0x0F);
            }
            6 => {
                self.modulator.set_sustain_level(value >> 4);
                self.modulator.set_release_rate(settings, value & 0x0F);
            }
            7 => {
                self.carrier.set_sustain_level(value >> 4);
                self.carrier.set_release_rate(settings, value & 0x0F);
            }
            _ => unreachable!("instrument part is always 0-7"),
        }
    }

    pub(crate) fn update_instrument(&mut self, patch: &[u8; 8]) {
        for (part, &value) in patch.iter().enumerate() {
            self.update_instrument_part(part as u8, value);
        }
    }

    /// Carrier output for one sample; `fm` is the modulator's contribution
    /// in phase units.
    pub(crate) fn calc_output(&mut self, eg_cnt: u32, lfo_pm: u32, lfo_am: u32, fm: i32) -> i32 {
        let settings = self.settings;
        let phase = self.carrier.calc_phase(settings, lfo_pm) + fm;
        self.carrier.calc_output(settings, eg_cnt, true, lfo_am, phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnum_increment_matches_block_shift() {
        // F-number 0x200 at block 2 (stored doubled): increment is exactly 1.0
        let fc = fnum_to_increment(0xA00);
        assert_eq!(fc, FreqIndex::from_raw(1 << 16));

        // Each block doubles the increment
        let low = fnum_to_increment(0x0200);
        let high = fnum_to_increment(0x0200 | (1 << 10));
        assert_eq!(high.raw(), low.raw() << 1);
    }

    #[test]
    fn frequency_write_updates_derived_state() {
        let mut channel = Channel::new();
        channel.update_instrument_part(1, 0x01); // carrier multiplier x1

        channel.set_frequency_high(0x05);
        assert_eq!(channel.settings.block_fnum, 0x500);
        assert_eq!(channel.settings.ksl_base, KSL_TAB[0x500 >> 5]);
        assert_eq!(channel.settings.fc, fnum_to_increment(0xA00));
        assert_eq!(channel.settings.key_code(), 5);

        channel.set_frequency_low(0xFF);
        assert_eq!(channel.settings.block_fnum, 0x5FF);
    }

    #[test]
    fn key_code_is_top_nibble() {
        let settings = ChannelSettings { block_fnum: 0x0F00, ..ChannelSettings::default() };
        assert_eq!(settings.key_code(), 0x0F);
    }
}
