//! One FM operator (slot): phase generator, envelope generator and output
//! stage with the modulator feedback buffer
//!
//! Two slots make up a channel; the modulator's output phase-modulates the
//! carrier. Envelope rates are pre-resolved into (counter shift, increment
//! pattern, counter mask) triples whenever a rate register or the channel
//! frequency changes, so the per-sample path is table lookups only.

use crate::channel::{fnum_to_increment, ChannelSettings};
use crate::fixedpoint::FreqIndex;
use crate::tables::{
    EG_INC, EG_INC_ATTACK_OVERFLOW, EG_RATE_SELECT, EG_RATE_SHIFT, ENV_BITS, LFO_PM_TABLE,
    MAX_ATT_INDEX, MIN_ATT_INDEX, MUL_TAB, SIN_LEN, SIN_MASK, SIN_TAB, SL_TAB, TL_TAB, TL_TAB_LEN,
};
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum EnvelopeState {
    Dump,
    Attack,
    Decay,
    Sustain,
    Release,
    #[default]
    Off,
}

/// Resolved envelope rate: the envelope advances only on samples where
/// `eg_cnt & mask == 0`, stepping by `EG_INC[select][(eg_cnt >> shift) & 7]`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EgParams {
    shift: u8,
    select: u8,
    mask: u32,
}

impl EgParams {
    fn resolve(rate: u32) -> Self {
        let shift = EG_RATE_SHIFT[rate as usize];
        Self { shift, select: EG_RATE_SELECT[rate as usize], mask: (1 << shift) - 1 }
    }

    #[inline]
    fn increment(self, eg_cnt: u32) -> i32 {
        i32::from(EG_INC[self.select as usize][((eg_cnt >> self.shift) & 7) as usize])
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Slot {
    // Phase generator
    pub(crate) phase: FreqIndex,
    pub(crate) freq: FreqIndex,
    pub(crate) mul: u32,
    pub(crate) vib: bool,

    // Envelope generator
    pub(crate) state: EnvelopeState,
    pub(crate) egout: i32,
    pub(crate) sl: i32,
    pub(crate) ar: u32,
    pub(crate) dr: u32,
    pub(crate) rr: u32,
    pub(crate) ksr_shift: u8,
    pub(crate) eg_sustain: bool,
    pub(crate) eg_dp: EgParams,
    pub(crate) eg_ar: EgParams,
    pub(crate) eg_dr: EgParams,
    pub(crate) eg_rr: EgParams,
    pub(crate) eg_rs: EgParams,

    // Output stage
    pub(crate) tl: i32,
    pub(crate) tll: i32,
    pub(crate) ksl: u8,
    pub(crate) am_mask: u32,
    pub(crate) waveform: u8,
    pub(crate) fb_shift: u8,
    pub(crate) op1_out: [i32; 2],

    pub(crate) key: u8,
}

impl Slot {
    /// Key-on bit driven by register 0x20 bit 4.
    pub(crate) const KEY_MAIN: u8 = 0x01;
    /// Key-on bit driven by the rhythm flags in register 0x0E.
    pub(crate) const KEY_RHYTHM: u8 = 0x02;

    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn calc_envelope(&mut self, channel: ChannelSettings, eg_cnt: u32, carrier: bool) -> i32 {
        match self.state {
            EnvelopeState::Dump => {
                // Rapid attenuation before the attack; the phase generator
                // restarts only once maximum attenuation is reached
                if eg_cnt & self.eg_dp.mask == 0 {
                    self.egout += self.eg_dp.increment(eg_cnt);
                    if self.egout >= MAX_ATT_INDEX {
                        self.egout = MAX_ATT_INDEX;
                        self.state = EnvelopeState::Attack;
                        self.phase = FreqIndex::ZERO;
                    }
                }
            }
            EnvelopeState::Attack => {
                if eg_cnt & self.eg_ar.mask == 0 {
                    self.egout += (!self.egout * self.eg_ar.increment(eg_cnt)) >> 2;
                    if self.egout <= MIN_ATT_INDEX {
                        self.egout = MIN_ATT_INDEX;
                        self.state = EnvelopeState::Decay;
                    }
                }
            }
            EnvelopeState::Decay => {
                if eg_cnt & self.eg_dr.mask == 0 {
                    self.egout += self.eg_dr.increment(eg_cnt);
                    if self.egout >= self.sl {
                        self.state = EnvelopeState::Sustain;
                    }
                }
            }
            EnvelopeState::Sustain => {
                // Percussive/non-percussive mode can change on the fly and the
                // chip stays in sustain (verified on real YM3812)
                if !self.eg_sustain {
                    // Percussive mode keeps adding the release rate
                    if eg_cnt & self.eg_rr.mask == 0 {
                        self.egout += self.eg_rr.increment(eg_cnt);
                        if self.egout >= MAX_ATT_INDEX {
                            self.egout = MAX_ATT_INDEX;
                        }
                    }
                }
            }
            EnvelopeState::Release => {
                // Modulators of melody channels do nothing in this state
                if carrier {
                    let sustain = !self.eg_sustain || channel.sus;
                    let params = if sustain { self.eg_rs } else { self.eg_rr };
                    if eg_cnt & params.mask == 0 {
                        self.egout += params.increment(eg_cnt);
                        if self.egout >= MAX_ATT_INDEX {
                            self.egout = MAX_ATT_INDEX;
                            self.state = EnvelopeState::Off;
                        }
                    }
                }
            }
            EnvelopeState::Off => {}
        }
        self.egout
    }

    pub(crate) fn calc_phase(&mut self, channel: ChannelSettings, lfo_pm: u32) -> i32 {
        if self.vib {
            let offset = i32::from(
                LFO_PM_TABLE[((channel.block_fnum & 0x01FF) >> 6) as usize][lfo_pm as usize],
            );
            let block_fnum = (i32::from(channel.block_fnum) * 2 + offset) as u32;
            self.phase += fnum_to_increment(block_fnum) * self.mul;
        } else {
            // LFO phase modulation disabled for this operator
            self.phase += self.freq;
        }
        self.phase.to_int() as i32
    }

    pub(crate) fn calc_output(
        &mut self,
        channel: ChannelSettings,
        eg_cnt: u32,
        carrier: bool,
        lfo_am: u32,
        phase: i32,
    ) -> i32 {
        let egout = self.calc_envelope(channel, eg_cnt, carrier);
        let env = (self.tll + egout + (lfo_am & self.am_mask) as i32) << 5;
        let sine_idx = self.waveform as usize * SIN_LEN + (phase & SIN_MASK as i32) as usize;
        let p = env + SIN_TAB[sine_idx];
        if p < TL_TAB_LEN as i32 { TL_TAB[p as usize] } else { 0 }
    }

    /// Modulator path: phase (plus feedback), output into the two-sample
    /// history buffer; returns the previous sample doubled, scaled into
    /// carrier phase units.
    pub(crate) fn calc_slot_mod(
        &mut self,
        channel: ChannelSettings,
        eg_cnt: u32,
        carrier: bool,
        lfo_pm: u32,
        lfo_am: u32,
    ) -> i32 {
        let mut phase = self.calc_phase(channel, lfo_pm);
        if self.fb_shift != 0 {
            phase += (self.op1_out[0] + self.op1_out[1]) >> self.fb_shift;
        }
        self.op1_out[0] = self.op1_out[1];
        self.op1_out[1] = self.calc_output(channel, eg_cnt, carrier, lfo_am, phase);
        self.op1_out[0] << 1
    }

    pub(crate) fn set_key_on(&mut self, part: u8) {
        if self.key == 0 {
            // do NOT restart the phase generator (verified on real YM2413)
            self.state = EnvelopeState::Dump;
        }
        self.key |= part;
    }

    pub(crate) fn set_key_off(&mut self, part: u8) {
        if self.key != 0 {
            self.key &= !part;
            if self.key == 0 && self.is_active() {
                self.state = EnvelopeState::Release;
            }
        }
    }

    pub(crate) fn set_key_on_off(&mut self, part: u8, enabled: bool) {
        if enabled {
            self.set_key_on(part);
        } else {
            self.set_key_off(part);
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state != EnvelopeState::Off
    }

    pub(crate) fn set_frequency_multiplier(&mut self, value: u8) {
        self.mul = MUL_TAB[value as usize];
    }

    pub(crate) fn set_key_scale_rate(&mut self, value: bool) {
        self.ksr_shift = if value { 0 } else { 2 };
    }

    pub(crate) fn set_envelope_sustained(&mut self, value: bool) {
        self.eg_sustain = value;
    }

    pub(crate) fn set_vibrato(&mut self, value: bool) {
        self.vib = value;
    }

    pub(crate) fn set_amplitude_modulation(&mut self, value: bool) {
        self.am_mask = if value { !0 } else { 0 };
    }

    pub(crate) fn set_total_level(&mut self, channel: ChannelSettings, value: u8) {
        // 7 bits TL (bit 6 = always 0)
        self.tl = i32::from(value) << (ENV_BITS - 2 - 7);
        self.update_total_level(channel);
    }

    pub(crate) fn set_key_scale_level(&mut self, channel: ChannelSettings, value: u8) {
        self.ksl = if value != 0 { 3 - value } else { 31 };
        self.update_total_level(channel);
    }

    pub(crate) fn set_waveform(&mut self, value: u8) {
        self.waveform = value;
    }

    pub(crate) fn set_feedback_shift(&mut self, value: u8) {
        self.fb_shift = if value != 0 { 8 - value } else { 0 };
    }

    pub(crate) fn set_attack_rate(&mut self, channel: ChannelSettings, value: u8) {
        let kcode_scaled = channel.key_code() >> self.ksr_shift;
        self.ar = if value != 0 { 16 + (u32::from(value) << 2) } else { 0 };
        self.update_attack_rate(kcode_scaled);
    }

    pub(crate) fn set_decay_rate(&mut self, channel: ChannelSettings, value: u8) {
        let kcode_scaled = channel.key_code() >> self.ksr_shift;
        self.dr = if value != 0 { 16 + (u32::from(value) << 2) } else { 0 };
        self.update_decay_rate(kcode_scaled);
    }

    pub(crate) fn set_release_rate(&mut self, channel: ChannelSettings, value: u8) {
        let kcode_scaled = channel.key_code() >> self.ksr_shift;
        self.rr = if value != 0 { 16 + (u32::from(value) << 2) } else { 0 };
        self.update_release_rate(kcode_scaled);
    }

    pub(crate) fn set_sustain_level(&mut self, value: u8) {
        self.sl = SL_TAB[value as usize];
    }

    fn update_total_level(&mut self, channel: ChannelSettings) {
        self.tll = self.tl + (channel.ksl_base >> self.ksl);
    }

    fn update_attack_rate(&mut self, kcode_scaled: u32) {
        if self.ar + kcode_scaled < 16 + 62 {
            self.eg_ar = EgParams::resolve(self.ar + kcode_scaled);
        } else {
            self.eg_ar = EgParams { shift: 0, select: EG_INC_ATTACK_OVERFLOW, mask: 0 };
        }
    }

    fn update_decay_rate(&mut self, kcode_scaled: u32) {
        self.eg_dr = EgParams::resolve(self.dr + kcode_scaled);
    }

    fn update_release_rate(&mut self, kcode_scaled: u32) {
        self.eg_rr = EgParams::resolve(self.rr + kcode_scaled);
    }

    /// Refresh total level and the phase/envelope generator parameters after
    /// a channel frequency change (and on state load).
    pub(crate) fn update_frequency(&mut self, channel: ChannelSettings) {
        self.update_total_level(channel);
        self.update_generators(channel);
    }

    pub(crate) fn update_generators(&mut self, channel: ChannelSettings) {
        self.freq = channel.fc * self.mul;

        let kcode_scaled = channel.key_code() >> self.ksr_shift;
        self.update_attack_rate(kcode_scaled);
        self.update_decay_rate(kcode_scaled);
        self.update_release_rate(kcode_scaled);

        // Release-at-sustain uses rate 5 while the channel sustain bit is
        // set, rate 7 otherwise; the dump phase always runs at rate 13
        let rs = if channel.sus { 16 + (5 << 2) } else { 16 + (7 << 2) };
        self.eg_rs = EgParams::resolve(rs + kcode_scaled);

        let dp = 16 + (13 << 2);
        self.eg_dp = EgParams::resolve(dp + kcode_scaled);
    }

    pub(crate) fn reset_operator(&mut self) {
        self.waveform = 0;
        self.state = EnvelopeState::Off;
        self.egout = MAX_ATT_INDEX;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_on_enters_dump_once() {
        let mut slot = Slot::new();
        slot.reset_operator();

        slot.set_key_on(Slot::KEY_MAIN);
        assert_eq!(slot.state, EnvelopeState::Dump);

        // A second key part must not retrigger the dump phase
        slot.state = EnvelopeState::Sustain;
        slot.set_key_on(Slot::KEY_RHYTHM);
        assert_eq!(slot.state, EnvelopeState::Sustain);
        assert_eq!(slot.key, Slot::KEY_MAIN | Slot::KEY_RHYTHM);
    }

    #[test]
    fn release_only_when_all_parts_cleared() {
        let mut slot = Slot::new();
        slot.reset_operator();
        slot.set_key_on(Slot::KEY_MAIN);
        slot.set_key_on(Slot::KEY_RHYTHM);
        slot.state = EnvelopeState::Sustain;

        slot.set_key_off(Slot::KEY_MAIN);
        assert_eq!(slot.state, EnvelopeState::Sustain);

        slot.set_key_off(Slot::KEY_RHYTHM);
        assert_eq!(slot.state, EnvelopeState::Release);
    }

    #[test]
    fn key_off_while_silent_stays_off() {
        let mut slot = Slot::new();
        slot.reset_operator();
        slot.set_key_on(Slot::KEY_MAIN);
        slot.state = EnvelopeState::Off;

        slot.set_key_off(Slot::KEY_MAIN);
        assert_eq!(slot.state, EnvelopeState::Off);
    }

    #[test]
    fn attack_rate_register_mapping() {
        let mut slot = Slot::new();
        let channel = ChannelSettings::default();

        slot.set_attack_rate(channel, 0);
        assert_eq!(slot.ar, 0);

        slot.set_attack_rate(channel, 15);
        assert_eq!(slot.ar, 16 + (15 << 2));
    }

    #[test]
    fn feedback_shift_mapping() {
        let mut slot = Slot::new();
        slot.set_feedback_shift(0);
        assert_eq!(slot.fb_shift, 0);
        slot.set_feedback_shift(7);
        assert_eq!(slot.fb_shift, 1);
        slot.set_feedback_shift(1);
        assert_eq!(slot.fb_shift, 7);
    }
}
