//! Save-state snapshot of a chip instance
//!
//! The snapshot carries only primary state; everything derivable from it
//! (total level with key scaling, cached frequency increments, resolved
//! envelope rate parameters, the wavetable selection, the idle counter) is
//! recomputed when the snapshot is loaded.

use crate::channel::Channel;
use crate::fixedpoint::{FixedPoint, FreqIndex};
use crate::slot::{EnvelopeState, Slot};
use crate::tables::INSTRUMENT_ROM;
use crate::Ym2413;
use bincode::{Decode, Encode};
use std::array;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct SlotState {
    pub waveform: u8,
    pub phase: u32,
    pub tl: i32,
    pub egout: i32,
    pub sl: i32,
    pub state: EnvelopeState,
    pub op1_out: [i32; 2],
    pub eg_sustain: bool,
    pub fb_shift: u8,
    pub key: u8,
    pub ar: u32,
    pub dr: u32,
    pub rr: u32,
    pub ksr_shift: u8,
    pub ksl: u8,
    pub mul: u32,
    pub am_mask: u32,
    pub vib: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct ChannelState {
    pub slots: [SlotState; 2],
    pub instvol_r: u8,
    pub block_fnum: u16,
    pub fc: u32,
    pub ksl_base: i32,
    pub sus: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Ym2413State {
    pub registers: [u8; 0x40],
    pub user_instrument: [u8; 8],
    pub channels: [ChannelState; 9],
    pub eg_cnt: u32,
    pub noise_rng: u32,
    pub lfo_am_cnt: u32,
    pub lfo_pm_cnt: u32,
    pub rhythm: bool,
}

impl Slot {
    fn save_state(&self) -> SlotState {
        SlotState {
            waveform: self.waveform,
            phase: self.phase.raw(),
            tl: self.tl,
            egout: self.egout,
            sl: self.sl,
            state: self.state,
            op1_out: self.op1_out,
            eg_sustain: self.eg_sustain,
            fb_shift: self.fb_shift,
            key: self.key,
            ar: self.ar,
            dr: self.dr,
            rr: self.rr,
            ksr_shift: self.ksr_shift,
            ksl: self.ksl,
            mul: self.mul,
            am_mask: self.am_mask,
            vib: self.vib,
        }
    }

    fn load_state(&mut self, state: &SlotState) {
        self.waveform = state.waveform;
        self.phase = FreqIndex::from_raw(state.phase);
        self.tl = state.tl;
        self.egout = state.egout;
        self.sl = state.sl;
        self.state = state.state;
        self.op1_out = state.op1_out;
        self.eg_sustain = state.eg_sustain;
        self.fb_shift = state.fb_shift;
        self.key = state.key;
        self.ar = state.ar;
        self.dr = state.dr;
        self.rr = state.rr;
        self.ksr_shift = state.ksr_shift;
        self.ksl = state.ksl;
        self.mul = state.mul;
        self.am_mask = state.am_mask;
        self.vib = state.vib;
        // tll, freq and the resolved envelope rates are restored by the
        // caller through update_frequency()
    }
}

impl Channel {
    fn save_state(&self) -> ChannelState {
        ChannelState {
            slots: [self.modulator.save_state(), self.carrier.save_state()],
            instvol_r: self.instvol_r,
            block_fnum: self.settings.block_fnum,
            fc: self.settings.fc.raw(),
            ksl_base: self.settings.ksl_base,
            sus: self.settings.sus,
        }
    }

    fn load_state(&mut self, state: &ChannelState) {
        self.modulator.load_state(&state.slots[0]);
        self.carrier.load_state(&state.slots[1]);
        self.instvol_r = state.instvol_r;
        self.settings.block_fnum = state.block_fnum;
        self.settings.fc = FreqIndex::from_raw(state.fc);
        self.settings.ksl_base = state.ksl_base;
        self.settings.sus = state.sus;

        let settings = self.settings;
        self.modulator.update_frequency(settings);
        self.carrier.update_frequency(settings);
    }
}

impl Ym2413 {
    #[must_use]
    pub fn save_state(&self) -> Ym2413State {
        Ym2413State {
            registers: self.reg,
            user_instrument: self.inst_tab[0],
            channels: array::from_fn(|ch| self.channels[ch].save_state()),
            eg_cnt: self.eg_cnt,
            noise_rng: self.noise_rng,
            lfo_am_cnt: self.lfo.am_cnt.raw(),
            lfo_pm_cnt: self.lfo.pm_cnt.raw(),
            rhythm: self.rhythm,
        }
    }

    pub fn load_state(&mut self, state: &Ym2413State) {
        self.reg = state.registers;
        self.inst_tab = INSTRUMENT_ROM;
        self.inst_tab[0] = state.user_instrument;
        for (channel, channel_state) in self.channels.iter_mut().zip(&state.channels) {
            channel.load_state(channel_state);
        }
        self.eg_cnt = state.eg_cnt;
        self.noise_rng = state.noise_rng;
        self.lfo.am_cnt = FixedPoint::from_raw(state.lfo_am_cnt);
        self.lfo.pm_cnt = FixedPoint::from_raw(state.lfo_pm_cnt);
        self.rhythm = state.rhythm;
        self.idle_samples = 0;
    }
}
