//! Simulated analog front end with an NPP-301 bridge attached.
//!
//! The excitation output (pin 8) drives two arms to ground:
//! R1, R2 and a reference resistor (pins 8, 2, 4), and R3, R4 and a second
//! reference resistor (pins 8, 6, 5). The ADC is referenced to the same
//! 4.096 V as the DAC, so at 12 bits one count is one millivolt.

use std::collections::HashMap;

use log::trace;

use crate::hal::{Board, Channel};

/// Fixed reference voltage shared by the DAC and the ADC, in volts.
pub const REFERENCE_VOLTS: f64 = 4.096;

/// Full-scale ADC count.
pub const ADC_MAX: u16 = 4095;

// Burst-average policy: 16 conversions accumulated, result divided by 16.
const ADC_BURST_SAMPLES: u32 = 16;
const ADC_ACCUMULATOR_SHIFT: u32 = 4;

/// Hardware operation seen by the simulated board, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardOp {
    ReferenceInit,
    ReferenceClose,
    AdcInit,
    AdcClose,
    AdcRead(Channel),
    DacSetLevel(u8),
    OutputEnable(bool),
    Indicator(bool),
    Delay(u32),
}

/// Resistances of the sensor bridge, in ohms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BridgeModel {
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub r4: f64,
    /// Sense resistor at the foot of each arm.
    pub rref: f64,
}

impl Default for BridgeModel {
    fn default() -> Self {
        // Nominal NPP-301 arms are about 5 kohm each.
        Self {
            r1: 5000.0,
            r2: 5000.0,
            r3: 5000.0,
            r4: 5000.0,
            rref: 1000.0,
        }
    }
}

impl BridgeModel {
    /// Voltage on `channel` for a given excitation voltage.
    fn volts(&self, channel: Channel, excitation: f64) -> f64 {
        let arm_a = self.r1 + self.r2 + self.rref;
        let arm_b = self.r3 + self.r4 + self.rref;
        match channel {
            Channel::ANC2 => excitation,
            Channel::ANC7 => excitation * (self.r2 + self.rref) / arm_a,
            Channel::ANB7 => excitation * self.rref / arm_a,
            Channel::ANB5 => excitation * (self.r4 + self.rref) / arm_b,
            Channel::ANB6 => excitation * self.rref / arm_b,
            _ => 0.0,
        }
    }
}

/// Desktop stand-in for the node's analog hardware.
#[derive(Debug, Default)]
pub struct SimBoard {
    bridge: BridgeModel,
    fixed: HashMap<Channel, u16>,
    reference: bool,
    adc: bool,
    output: bool,
    dac_level: u8,
    indicator: bool,
    log: Vec<BoardOp>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bridge(bridge: BridgeModel) -> Self {
        Self {
            bridge,
            ..Self::default()
        }
    }

    /// Makes `channel` read `value` regardless of the bridge.
    pub fn set_fixed_reading(&mut self, channel: Channel, value: u16) {
        self.fixed.insert(channel, value.min(ADC_MAX));
    }

    pub fn log(&self) -> &[BoardOp] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn indicator(&self) -> bool {
        self.indicator
    }

    pub fn reference_enabled(&self) -> bool {
        self.reference
    }

    pub fn output_enabled(&self) -> bool {
        self.output
    }

    pub fn dac_level(&self) -> u8 {
        self.dac_level
    }

    fn excitation_volts(&self) -> f64 {
        if self.reference && self.output {
            f64::from(self.dac_level) / 256.0 * REFERENCE_VOLTS
        } else {
            0.0
        }
    }

    fn convert(&self, channel: Channel) -> u16 {
        if let Some(&value) = self.fixed.get(&channel) {
            return value;
        }
        if !self.reference {
            return 0;
        }
        let volts = self.bridge.volts(channel, self.excitation_volts());
        let counts = (volts / REFERENCE_VOLTS * f64::from(ADC_MAX + 1)).round();
        counts.clamp(0.0, f64::from(ADC_MAX)) as u16
    }
}

impl Board for SimBoard {
    fn reference_init(&mut self) {
        self.log.push(BoardOp::ReferenceInit);
        self.reference = true;
    }

    fn reference_close(&mut self) {
        self.log.push(BoardOp::ReferenceClose);
        self.reference = false;
    }

    fn adc_init(&mut self) {
        self.log.push(BoardOp::AdcInit);
        self.adc = true;
    }

    fn adc_close(&mut self) {
        self.log.push(BoardOp::AdcClose);
        self.adc = false;
    }

    fn adc_read(&mut self, channel: Channel) -> u16 {
        self.log.push(BoardOp::AdcRead(channel));
        if !self.adc {
            return 0;
        }
        let sample = u32::from(self.convert(channel));
        let accumulated: u32 = (0..ADC_BURST_SAMPLES).map(|_| sample).sum();
        let value = (accumulated >> ADC_ACCUMULATOR_SHIFT) as u16;
        trace!("adc {channel} -> {value}");
        value
    }

    fn dac_set_level(&mut self, level: u8) {
        self.log.push(BoardOp::DacSetLevel(level));
        self.dac_level = level;
    }

    fn reference_output_enable(&mut self, enabled: bool) {
        self.log.push(BoardOp::OutputEnable(enabled));
        self.output = enabled;
    }

    fn indicator_set(&mut self, on: bool) {
        self.log.push(BoardOp::Indicator(on));
        self.indicator = on;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.push(BoardOp::Delay(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::SENSOR_CHANNELS;

    fn powered(bridge: BridgeModel) -> SimBoard {
        let mut board = SimBoard::with_bridge(bridge);
        board.reference_init();
        board.adc_init();
        board
    }

    fn read_all(board: &mut SimBoard) -> Vec<u16> {
        SENSOR_CHANNELS.iter().map(|&c| board.adc_read(c)).collect()
    }

    #[test]
    fn output_off_reads_zero() {
        let mut board = powered(BridgeModel::default());
        board.dac_set_level(255);
        assert_eq!(read_all(&mut board), [0, 0, 0, 0, 0]);
    }

    #[test]
    fn balanced_bridge_at_full_level() {
        let mut board = powered(BridgeModel::default());
        board.dac_set_level(255);
        board.reference_output_enable(true);
        // 255/256 * 4.096 V = 4.080 V on pin 8; arms divide 11 kohm.
        assert_eq!(read_all(&mut board), [4080, 2225, 371, 371, 2225]);
    }

    #[test]
    fn adc_off_reads_zero_even_with_fixed_value() {
        let mut board = SimBoard::new();
        board.set_fixed_reading(Channel::ANC2, 1234);
        assert_eq!(board.adc_read(Channel::ANC2), 0);
        board.adc_init();
        assert_eq!(board.adc_read(Channel::ANC2), 1234);
    }

    #[test]
    fn fixed_readings_are_clamped_to_full_scale() {
        let mut board = powered(BridgeModel::default());
        board.set_fixed_reading(Channel::ANB5, u16::MAX);
        assert_eq!(board.adc_read(Channel::ANB5), ADC_MAX);
    }

    #[test]
    fn records_operations() {
        let mut board = SimBoard::new();
        board.indicator_set(true);
        board.delay_ms(250);
        board.indicator_set(false);
        assert_eq!(
            board.log(),
            &[BoardOp::Indicator(true), BoardOp::Delay(250), BoardOp::Indicator(false)]
        );
        assert!(!board.indicator());
    }
}
