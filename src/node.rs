//! A complete bus node: identity, dispatcher and board.

use log::{debug, info, warn};

use crate::config::{
    NodeConfig, NodeId, STARTUP_BLINKS, STARTUP_BLINK_HALF_PERIOD_MS, STARTUP_READY_DELAY_MS,
    STARTUP_SETTLE_MS,
};
use crate::dispatch::Dispatcher;
use crate::error::TransportError;
use crate::frame::{self, FrameResult};
use crate::hal::Board;
use crate::response::Response;
use crate::sequencer::PeripheralState;
use crate::transport::LineTransport;

/// Listens on the bus and answers the commands addressed to it.
pub struct Node<B> {
    id: NodeId,
    dispatcher: Dispatcher<B>,
}

impl<B: Board> Node<B> {
    pub fn new(config: NodeConfig, board: B) -> Self {
        Self {
            id: config.id,
            dispatcher: Dispatcher::new(board, config.version),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn board(&self) -> &B {
        self.dispatcher.sequencer().board()
    }

    pub fn board_mut(&mut self) -> &mut B {
        self.dispatcher.sequencer_mut().board_mut()
    }

    pub fn peripheral_state(&self) -> PeripheralState {
        self.dispatcher.peripheral_state()
    }

    /// Powers the analog front end and blinks the indicator to show the
    /// node is ready.
    pub fn startup(&mut self) {
        self.dispatcher.sequencer_mut().power_up();
        let board = self.board_mut();
        board.delay_ms(STARTUP_SETTLE_MS);
        for _ in 0..STARTUP_BLINKS {
            board.indicator_set(true);
            board.delay_ms(STARTUP_BLINK_HALF_PERIOD_MS);
            board.indicator_set(false);
            board.delay_ms(STARTUP_BLINK_HALF_PERIOD_MS);
        }
        board.delay_ms(STARTUP_READY_DELAY_MS);
        info!("node {} ready", self.id);
    }

    pub fn shutdown(&mut self) {
        self.dispatcher.sequencer_mut().power_down();
        info!("node {} shut down", self.id);
    }

    /// Handles one received line. Returns the reply, if one is due.
    pub fn handle_line(&mut self, line: &[u8]) -> Option<Response> {
        match frame::extract(line, self.id) {
            FrameResult::Addressed(payload) if !payload.is_empty() => {
                let response = self.dispatcher.dispatch(payload);
                debug!("reply {response}");
                Some(response)
            }
            FrameResult::Addressed(_) => {
                debug!("empty command, nothing to do");
                None
            }
            FrameResult::NotForMe | FrameResult::Malformed => None,
        }
    }

    /// Answers lines from `transport` until it closes or fails.
    ///
    /// Read timeouts are not errors; the node just keeps waiting.
    pub fn serve(&mut self, transport: &mut impl LineTransport) -> Result<(), TransportError> {
        loop {
            let line = match transport.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(TransportError::Closed) => {
                    info!("transport closed");
                    return Ok(());
                }
                Err(e) => {
                    warn!("transport failed: {e}");
                    return Err(e);
                }
            };
            if line.is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line) {
                transport.write_line(response.as_bytes())?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_NODE_ID;
    use crate::sim::{BoardOp, SimBoard};
    use crate::transport::LineBuffer;

    fn node() -> Node<SimBoard> {
        let mut node = Node::new(NodeConfig::default(), SimBoard::new());
        node.startup();
        node.board_mut().clear_log();
        node
    }

    fn reply(node: &mut Node<SimBoard>, line: &str) -> Option<String> {
        node.handle_line(line.as_bytes()).map(|r| r.as_str().to_string())
    }

    #[test]
    fn startup_powers_up_and_blinks_twice() {
        let mut node = Node::new(NodeConfig::default(), SimBoard::new());
        node.startup();
        assert_eq!(
            node.board().log(),
            &[
                BoardOp::ReferenceInit,
                BoardOp::AdcInit,
                BoardOp::Delay(10),
                BoardOp::Indicator(true),
                BoardOp::Delay(250),
                BoardOp::Indicator(false),
                BoardOp::Delay(250),
                BoardOp::Indicator(true),
                BoardOp::Delay(250),
                BoardOp::Indicator(false),
                BoardOp::Delay(250),
                BoardOp::Delay(100),
            ]
        );
    }

    #[test]
    fn silent_on_framing_errors() {
        let mut node = node();
        for line in ["", "v", "/Nv", "Nv!", "/Mv!", "/0v 1#", "/N!"] {
            assert_eq!(reply(&mut node, line), None, "line {line:?}");
        }
        assert!(node.board().log().is_empty());
    }

    #[test]
    fn addressed_commands_get_one_framed_reply() {
        let mut node = node();
        for cmd in ["v", "L0", "a", "w 12", "w 0 0", "z", "L"] {
            let line = format!("/{DEFAULT_NODE_ID}{cmd}!");
            let reply = reply(&mut node, &line).unwrap();
            assert!(reply.starts_with("/0"), "{reply:?}");
            assert!(reply.ends_with("#\n"), "{reply:?}");
            assert_eq!(reply.matches('\n').count(), 1);
        }
    }

    #[test]
    fn unknown_command_reply() {
        let mut node = node();
        let reply = reply(&mut node, "/Nz!").unwrap();
        assert!(reply.contains("Unknown command"));
    }

    #[test]
    fn shutdown_closes_adc_and_reference() {
        let mut node = node();
        reply(&mut node, "/Nw 100!");
        node.shutdown();
        assert_eq!(node.peripheral_state(), PeripheralState { level: 100, ..Default::default() });
        assert!(!node.board().reference_enabled());
    }

    struct Script {
        lines: std::vec::IntoIter<Option<&'static str>>,
        written: Vec<String>,
    }

    impl LineTransport for Script {
        fn read_line(&mut self) -> Result<Option<LineBuffer>, TransportError> {
            match self.lines.next() {
                Some(Some(line)) => Ok(Some(LineBuffer::from_slice(line.as_bytes()).unwrap())),
                Some(None) => Ok(None),
                None => Err(TransportError::Closed),
            }
        }

        fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
            self.written.push(String::from_utf8(line.to_vec()).unwrap());
            Ok(())
        }
    }

    #[test]
    fn serve_answers_until_closed() {
        let mut node = node();
        let mut script = Script {
            lines: vec![
                Some("/Nw 300!"),
                None,
                Some("/Xv!"),
                Some(""),
                Some("noise /Na! trailing"),
            ]
            .into_iter(),
            written: Vec::new(),
        };
        node.serve(&mut script).unwrap();
        assert_eq!(
            script.written,
            ["/0w VREF on level=255#\n", "/0a 4080 2225 371 371 2225#\n"]
        );
    }
}
