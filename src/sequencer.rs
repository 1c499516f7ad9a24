//! Ordered access to the analog front end.

use log::debug;

use crate::hal::{Board, Channel};

/// Logical state of the analog peripherals, as last commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeripheralState {
    /// Fixed voltage reference running.
    pub reference_ready: bool,
    pub adc_ready: bool,
    /// DAC and output buffer driving the excitation pin.
    pub output_enabled: bool,
    /// Last level loaded into the DAC.
    pub level: u8,
}

/// Issues board operations one at a time and tracks what they left behind.
///
/// Each call into the board completes before the next one is made, so an
/// interrupted command never leaves the front end half configured.
pub struct Sequencer<B> {
    board: B,
    state: PeripheralState,
}

impl<B: Board> Sequencer<B> {
    pub fn new(board: B) -> Self {
        Self {
            board,
            state: PeripheralState::default(),
        }
    }

    pub fn state(&self) -> PeripheralState {
        self.state
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Brings up the voltage reference, then the ADC that depends on it.
    pub fn power_up(&mut self) {
        if !self.state.reference_ready {
            self.board.reference_init();
            self.state.reference_ready = true;
        }
        if !self.state.adc_ready {
            self.board.adc_init();
            self.state.adc_ready = true;
        }
        debug!("analog front end powered up");
    }

    /// Reverse of [`Sequencer::power_up`], switching the output off first.
    pub fn power_down(&mut self) {
        self.set_reference(self.state.level, false);
        if self.state.adc_ready {
            self.board.adc_close();
            self.state.adc_ready = false;
        }
        if self.state.reference_ready {
            self.board.reference_close();
            self.state.reference_ready = false;
        }
        debug!("analog front end powered down");
    }

    /// Presents `level`/256 of the reference on the excitation pin, or
    /// switches that output off.
    ///
    /// Turning the output off leaves the voltage reference running for the
    /// ADC. Repeating the current setting touches no hardware.
    pub fn set_reference(&mut self, level: u8, enabled: bool) {
        if enabled {
            if self.state.output_enabled && self.state.level == level {
                return;
            }
            self.board.dac_set_level(level);
            self.state.level = level;
            if !self.state.output_enabled {
                self.board.reference_output_enable(true);
                self.state.output_enabled = true;
            }
            debug!("excitation on at level {level}");
        } else if self.state.output_enabled {
            self.board.reference_output_enable(false);
            self.state.output_enabled = false;
            debug!("excitation off");
        }
    }

    /// One averaged conversion per channel, strictly in the given order.
    pub fn read_channels<const N: usize>(&mut self, channels: &[Channel; N]) -> [u16; N] {
        let mut readings = [0; N];
        for (reading, &channel) in readings.iter_mut().zip(channels) {
            *reading = self.board.adc_read(channel);
        }
        debug!("read {channels:?} -> {readings:?}");
        readings
    }
}
