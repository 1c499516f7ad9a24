//! Command interpretation.
//!
//! The first byte of a payload is the opcode. Arguments follow, separated by
//! commas or spaces, and are parsed the way `atoi` would: anything that is
//! not a number reads as 0. A command that cannot do what was asked answers
//! with a line containing the word "error".

use std::fmt::{self, Write};

use log::{debug, warn};

use crate::hal::{Board, SENSOR_CHANNELS};
use crate::response::Response;
use crate::sequencer::{PeripheralState, Sequencer};

const ARG_SEPARATORS: &[u8] = b", ";

/// A parsed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// `v`: report the firmware version.
    Version,
    /// `L <bit>`: drive the indicator and take it out of activity duty.
    SetIndicator(bool),
    /// `a`: sample the five sensor channels.
    ReadChannels,
    /// `w <level> [<on>]`: set or switch off the excitation output.
    SetReference { level: u8, enabled: bool },
}

/// Why a payload could not become a [`Request`].
///
/// The `Display` text is what goes back on the bus after `error: `.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    NoValue,
    MissingLevelAndFlag,
    UnknownCommand,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::NoValue => write!(f, "no value"),
            CommandError::MissingLevelAndFlag => write!(f, "missing level and on/off flag"),
            CommandError::UnknownCommand => write!(f, "Unknown command"),
        }
    }
}

impl std::error::Error for CommandError {}

impl Request {
    /// Parses a non-empty payload.
    pub fn parse(payload: &[u8]) -> Result<Self, CommandError> {
        let Some((&opcode, rest)) = payload.split_first() else {
            return Err(CommandError::UnknownCommand);
        };
        let mut args = tokens(rest);

        match opcode {
            b'v' => Ok(Request::Version),
            b'L' => {
                let value = args.next().ok_or(CommandError::NoValue)?;
                Ok(Request::SetIndicator(atoi(value) & 1 == 1))
            }
            b'a' => Ok(Request::ReadChannels),
            b'w' => {
                let level = args.next().ok_or(CommandError::MissingLevelAndFlag)?;
                let enabled = args.next().map_or(true, |flag| atoi(flag) != 0);
                Ok(Request::SetReference {
                    level: atoi(level).clamp(0, i32::from(u8::MAX)) as u8,
                    enabled,
                })
            }
            _ => Err(CommandError::UnknownCommand),
        }
    }
}

/// Splits on commas and spaces, skipping empty tokens.
fn tokens(args: &[u8]) -> impl Iterator<Item = &[u8]> {
    args.split(|b| ARG_SEPARATORS.contains(b))
        .filter(|token| !token.is_empty())
}

/// Leading integer of `token`, 0 if there is none. Saturates on overflow.
fn atoi(token: &[u8]) -> i32 {
    let mut rest = token;
    while let Some((b, tail)) = rest.split_first() {
        if !b.is_ascii_whitespace() {
            break;
        }
        rest = tail;
    }

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let mut value: i32 = 0;
    for &b in rest.iter().take_while(|b| b.is_ascii_digit()) {
        let digit = i32::from(b - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    value
}

/// Runs commands against the board and formats their replies.
///
/// Owns the indicator override: once `L` has set it, dispatch no longer
/// flashes the indicator around each command.
pub struct Dispatcher<B> {
    sequencer: Sequencer<B>,
    version: &'static str,
    indicator_override: bool,
}

impl<B: Board> Dispatcher<B> {
    pub fn new(board: B, version: &'static str) -> Self {
        Self {
            sequencer: Sequencer::new(board),
            version,
            indicator_override: false,
        }
    }

    pub fn sequencer(&self) -> &Sequencer<B> {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut Sequencer<B> {
        &mut self.sequencer
    }

    pub fn peripheral_state(&self) -> PeripheralState {
        self.sequencer.state()
    }

    pub fn indicator_override(&self) -> bool {
        self.indicator_override
    }

    /// Executes `payload` and returns exactly one reply line.
    pub fn dispatch(&mut self, payload: &[u8]) -> Response {
        let opcode = payload.first().copied().unwrap_or(b' ');

        if !self.indicator_override {
            self.sequencer.board_mut().indicator_set(true);
        }

        let mut reply = Response::begin(opcode);
        let written = match Request::parse(payload) {
            Ok(request) => {
                debug!("dispatching {request:?}");
                self.execute(request, &mut reply)
            }
            Err(e) => {
                warn!(
                    "rejected command {:?}: {e}",
                    String::from_utf8_lossy(payload)
                );
                write!(reply, " error: {e}")
            }
        };
        // ResponseBuilder truncates instead of failing.
        debug_assert!(written.is_ok());

        // `L` may have changed the override in the meantime.
        if !self.indicator_override {
            self.sequencer.board_mut().indicator_set(false);
        }
        reply.finish()
    }

    fn execute(&mut self, request: Request, reply: &mut impl Write) -> fmt::Result {
        match request {
            Request::Version => write!(reply, " {}", self.version),
            Request::SetIndicator(on) => {
                self.sequencer.board_mut().indicator_set(on);
                self.indicator_override = on;
                write!(reply, " {}", u8::from(on))
            }
            Request::ReadChannels => {
                let [pin8, pin2, pin4, pin5, pin6] = self.sequencer.read_channels(&SENSOR_CHANNELS);
                write!(reply, " {pin8} {pin2} {pin4} {pin5} {pin6}")
            }
            Request::SetReference { level, enabled } => {
                self.sequencer.set_reference(level, enabled);
                if enabled {
                    write!(reply, " VREF on level={level}")
                } else {
                    write!(reply, " VREF off")
                }
            }
        }
    }
}
