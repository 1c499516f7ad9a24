//! # NPP-301 Characterizer Library
//!
//! This library contains the logic of a characterizer node on an RS485 bus.
//! The node extracts the command addressed to it from each received line,
//! sequences the analog front end (voltage reference, excitation DAC,
//! averaged ADC reads) and answers with a single reply line.
//!
//! The hardware sits behind [`hal::Board`], so the same node runs against
//! [`sim::SimBoard`] on a desktop. The master side of the bus lives in
//! [`client`] and [`bridge`].

pub mod bridge;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod hal;
pub mod node;
pub mod response;
pub mod sequencer;
pub mod sim;
pub mod transport;

pub use config::{NodeConfig, NodeId};
pub use error::{ClientError, ConfigError, TransportError};
pub use frame::FrameResult;
pub use node::Node;
pub use response::Response;
