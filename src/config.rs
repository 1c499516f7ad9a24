//! Build-time constants and the runtime configuration of a node.

use std::fmt;

use crate::error::ConfigError;

/// Identity the firmware is built with when nothing else is selected.
pub const DEFAULT_NODE_ID: char = 'N';

/// The bus master always answers to `0`; replies are addressed to it.
pub const MASTER_ID: char = '0';

/// Capacity of the incoming line buffer, in bytes.
pub const MAX_LINE_LEN: usize = 80;

/// Capacity of the outgoing line buffer, in bytes.
pub const MAX_RESPONSE_LEN: usize = 268;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Reported by the `v` command.
pub const VERSION_STR: &str = concat!(env!("CARGO_PKG_VERSION"), " NPP-301 Characterizer");

// Framing markers.
pub const FRAME_START: u8 = b'/';
pub const FRAME_END: u8 = b'!';
pub const RESPONSE_END: u8 = b'#';

// Startup timing, in milliseconds.
pub const STARTUP_SETTLE_MS: u32 = 10;
pub const STARTUP_BLINKS: u8 = 2;
pub const STARTUP_BLINK_HALF_PERIOD_MS: u32 = 250;
pub const STARTUP_READY_DELAY_MS: u32 = 100;

/// Single-character bus address of a node.
///
/// Nodes may use `1-9`, `A-Z` or `a-z`. `0` belongs to the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u8);

impl NodeId {
    pub fn new(id: char) -> Result<Self, ConfigError> {
        match id {
            '1'..='9' | 'A'..='Z' | 'a'..='z' => Ok(NodeId(id as u8)),
            _ => Err(ConfigError::InvalidNodeId(id)),
        }
    }

    pub fn as_byte(self) -> u8 {
        self.0
    }

    pub fn as_char(self) -> char {
        self.0 as char
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId(DEFAULT_NODE_ID as u8)
    }
}

impl TryFrom<char> for NodeId {
    type Error = ConfigError;

    fn try_from(id: char) -> Result<Self, Self::Error> {
        NodeId::new(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Everything a node needs to know about itself at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub id: NodeId,
    pub version: &'static str,
}

impl NodeConfig {
    pub fn with_id(id: NodeId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: NodeId::default(),
            version: VERSION_STR,
        }
    }
}
