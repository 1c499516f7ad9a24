//! Hardware abstraction consumed by the node.
//!
//! Register-level configuration of the voltage reference, DAC, output
//! buffer and ADC lives behind [`Board`]. The node only ever talks to the
//! hardware through these calls, which lets the same logic run against
//! [`crate::sim::SimBoard`] on a desktop.

use std::fmt;

/// ADC multiplexer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(pub u8);

impl Channel {
    /// RC2, also the excitation output. Sensor pin 8.
    pub const ANC2: Channel = Channel(0b0001_0010);
    /// RC7, sensor pin 2.
    pub const ANC7: Channel = Channel(0b0001_0111);
    /// RB5, sensor pin 6.
    pub const ANB5: Channel = Channel(0b0000_1101);
    /// RB6, sensor pin 5.
    pub const ANB6: Channel = Channel(0b0000_1110);
    /// RB7, sensor pin 4.
    pub const ANB7: Channel = Channel(0b0000_1111);
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Channel::ANC2 => write!(f, "ANC2"),
            Channel::ANC7 => write!(f, "ANC7"),
            Channel::ANB5 => write!(f, "ANB5"),
            Channel::ANB6 => write!(f, "ANB6"),
            Channel::ANB7 => write!(f, "ANB7"),
            Channel(raw) => write!(f, "AN{raw:#04x}"),
        }
    }
}

/// Channels sampled by the `a` command, in reply order.
///
/// Consumers identify sensor pins by position: pin 8, pin 2, pin 4, pin 5,
/// pin 6 of the NPP-301 package.
pub const SENSOR_CHANNELS: [Channel; 5] = [
    Channel::ANC2,
    Channel::ANC7,
    Channel::ANB7,
    Channel::ANB6,
    Channel::ANB5,
];

/// Analog front end and status indicator of the node.
///
/// Every call runs to completion before returning.
pub trait Board {
    /// Enable the fixed voltage reference that feeds both the ADC and the DAC.
    fn reference_init(&mut self);

    fn reference_close(&mut self);

    /// Power the ADC with its fixed burst-average acquisition policy.
    fn adc_init(&mut self);

    fn adc_close(&mut self);

    /// One averaged conversion on `channel`. Blocks until it completes.
    fn adc_read(&mut self, channel: Channel) -> u16;

    /// Load the DAC with `level` out of 256 steps of the reference.
    fn dac_set_level(&mut self, level: u8);

    /// Switch the DAC and its unity-gain output buffer on or off.
    fn reference_output_enable(&mut self, enabled: bool);

    fn indicator_set(&mut self, on: bool);

    fn delay_ms(&mut self, ms: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_channels_are_in_pin_order() {
        let names: Vec<String> = SENSOR_CHANNELS.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, ["ANC2", "ANC7", "ANB7", "ANB6", "ANB5"]);
    }

    #[test]
    fn unknown_channel_displays_raw_id() {
        assert_eq!(Channel(0x03).to_string(), "AN0x03");
    }
}
