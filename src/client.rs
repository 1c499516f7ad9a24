//! Bus master side: talks to a characterizer node over the shared line.

use std::io::{self, Read, Write};

use log::{debug, warn};
use serialport::{ClearBuffer, SerialPort};

use crate::bridge::BridgeReadings;
use crate::config::{NodeId, FRAME_END, FRAME_START, MASTER_ID, MAX_RESPONSE_LEN, RESPONSE_END};
use crate::error::{ClientError, TransportError};

/// Byte stream the master drives the bus with.
pub trait BusPort: Read + Write {
    /// Throws away anything still waiting to be read.
    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BusPort for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Handle on one node, addressed by its identity.
pub struct NodeClient<P> {
    id: NodeId,
    port: P,
}

impl<P: BusPort> NodeClient<P> {
    pub fn new(id: NodeId, port: P) -> Self {
        Self { id, port }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Wraps `cmd` as `/<id><cmd>!` and sends it.
    pub fn send_command(&mut self, cmd: &str) -> Result<(), ClientError> {
        self.port.clear_input()?;
        let mut frame = Vec::with_capacity(cmd.len() + 4);
        frame.push(FRAME_START);
        frame.push(self.id.as_byte());
        frame.extend_from_slice(cmd.as_bytes());
        frame.push(FRAME_END);
        frame.push(b'\n');
        debug!("-> {}", String::from_utf8_lossy(&frame).trim_end());
        self.port.write_all(&frame)?;
        self.port.flush()?;
        Ok(())
    }

    /// Reads one reply line and strips the `/0` and `#` framing.
    pub fn read_response(&mut self) -> Result<String, ClientError> {
        let line = self.read_line()?;
        let txt = line.trim();
        debug!("<- {txt}");

        let body = txt
            .strip_prefix(FRAME_START as char)
            .and_then(|t| t.strip_prefix(MASTER_ID));
        let Some(body) = body else {
            return Err(ClientError::InvalidResponse(txt.to_string()));
        };
        let Some(end) = body.find(RESPONSE_END as char) else {
            return Err(ClientError::IncompleteResponse(txt.to_string()));
        };
        Ok(body[..end].trim().to_string())
    }

    /// Sends `cmd` and returns the reply text after the echoed opcode.
    ///
    /// A reply containing "error" is returned as is, with a warning logged.
    pub fn command(&mut self, cmd: &str) -> Result<String, ClientError> {
        let Some(opcode) = cmd.chars().next() else {
            return Err(ClientError::InvalidResponse(String::new()));
        };
        self.send_command(cmd)?;
        let txt = self.read_response()?;
        let Some(rest) = txt.strip_prefix(opcode) else {
            return Err(ClientError::UnexpectedResponse {
                opcode,
                response: txt,
            });
        };
        let rest = rest.trim().to_string();
        if rest.contains("error") {
            warn!("error return for command {cmd:?} to node {}: {rest}", self.id);
        }
        Ok(rest)
    }

    pub fn version(&mut self) -> Result<String, ClientError> {
        self.command("v")
    }

    pub fn set_indicator(&mut self, on: bool) -> Result<(), ClientError> {
        self.command(&format!("L{}", u8::from(on))).map(drop)
    }

    /// Excitation output at `level`/256 of 4.096 V.
    pub fn reference_on(&mut self, level: i32) -> Result<(), ClientError> {
        let level = level.clamp(0, 255);
        self.command(&format!("w {level} 1")).map(drop)
    }

    pub fn reference_off(&mut self) -> Result<(), ClientError> {
        self.command("w 0 0").map(drop)
    }

    pub fn read_channels(&mut self) -> Result<BridgeReadings, ClientError> {
        self.command("a")?.parse()
    }

    fn read_line(&mut self) -> Result<String, ClientError> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(TransportError::Closed.into()),
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => {
                    if line.len() < MAX_RESPONSE_LEN {
                        line.push(byte[0]);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if line.is_empty() => return Err(e.into()),
                // Timed out mid-line; let the framing checks judge it.
                Err(_) => break,
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}
