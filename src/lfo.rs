//! Global low frequency oscillator: amplitude modulation (tremolo) and
//! phase modulation (vibrato) counters shared by all operators

use crate::fixedpoint::{LfoAmIndex, LfoPmIndex};
use crate::tables::{LFO_AM_TABLE, LFO_AM_TAB_ELEMENTS};

#[derive(Debug, Clone, Default)]
pub(crate) struct LowFrequencyOscillator {
    pub(crate) am_cnt: LfoAmIndex,
    pub(crate) pm_cnt: LfoPmIndex,
}

impl LowFrequencyOscillator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Amplitude modulation: 27 output levels (triangle waveform), one table
    /// entry lasting 64 consecutive samples.
    pub(crate) fn clock_am(&mut self) {
        self.am_cnt.add_quantum();
        if self.am_cnt == LfoAmIndex::from_int(LFO_AM_TAB_ELEMENTS as u32) {
            self.am_cnt = LfoAmIndex::ZERO;
        }
    }

    pub(crate) fn am_output(&self) -> u32 {
        u32::from(LFO_AM_TABLE[self.am_cnt.to_int() as usize]) >> 1
    }

    /// Vibrato: 8 output levels (triangle waveform), one level lasting 1024
    /// samples.
    pub(crate) fn clock_pm(&mut self) {
        self.pm_cnt.add_quantum();
    }

    pub(crate) fn pm_output(&self) -> u32 {
        self.pm_cnt.to_int() & 7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn am_counter_period() {
        let mut lfo = LowFrequencyOscillator::new();

        for _ in 0..64 * LFO_AM_TAB_ELEMENTS - 1 {
            lfo.clock_am();
            assert_ne!(lfo.am_cnt, LfoAmIndex::ZERO);
        }
        lfo.clock_am();
        assert_eq!(lfo.am_cnt, LfoAmIndex::ZERO, "AM counter must wrap after 13440 samples");
    }

    #[test]
    fn am_output_is_triangle() {
        let mut lfo = LowFrequencyOscillator::new();

        let mut seen_max = false;
        let mut previous = lfo.am_output();
        for _ in 0..64 * LFO_AM_TAB_ELEMENTS {
            lfo.clock_am();
            let current = lfo.am_output();
            if current == 13 {
                seen_max = true;
            }
            assert!(current.abs_diff(previous) <= 1, "AM output must move in unit steps");
            previous = current;
        }
        assert!(seen_max);
        assert_eq!(lfo.am_output(), 0);
    }

    #[test]
    fn pm_phase_cycles_every_1024_samples() {
        let mut lfo = LowFrequencyOscillator::new();

        for phase in 0..16 {
            for _ in 0..1024 {
                assert_eq!(lfo.pm_output(), phase & 7);
                lfo.clock_pm();
            }
        }
    }
}
