use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::info;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table};
use ratatui::{Frame, Terminal};
use serialport::SerialPort;

use npp301::bridge::{self, Bridge, BridgeReadings, DEFAULT_RREF};
use npp301::client::NodeClient;
use npp301::config::{NodeConfig, NodeId, DEFAULT_BAUD_RATE};
use npp301::hal::SENSOR_CHANNELS;
use npp301::node::Node;
use npp301::sim::{BridgeModel, SimBoard};
use npp301::transport::StreamTransport;

// Node side polls the port quickly so partial lines keep assembling.
const NODE_PORT_TIMEOUT: Duration = Duration::from_millis(10);
// Master side waits this long for a reply before giving up.
const MASTER_PORT_TIMEOUT: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// NPP-301 characterizer: simulated RS485 node and bus master.
#[derive(Parser)]
#[command(name = "npp301_cli", version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// List available serial ports.
    Ports,
    /// Run a simulated node on a serial port.
    Node {
        #[command(flatten)]
        serial: SerialArgs,
        #[command(flatten)]
        id: IdArgs,
        #[command(flatten)]
        sim: SimArgs,
    },
    /// Run a simulated node on stdin/stdout.
    Console {
        #[command(flatten)]
        id: IdArgs,
        #[command(flatten)]
        sim: SimArgs,
    },
    /// Wake a node, switch on the excitation and print readings every second.
    Master {
        #[command(flatten)]
        serial: SerialArgs,
        #[command(flatten)]
        id: IdArgs,
        #[command(flatten)]
        measure: MeasureArgs,
    },
    /// Like `master`, as a live terminal table. Quit with `q`.
    Monitor {
        #[command(flatten)]
        serial: SerialArgs,
        #[command(flatten)]
        id: IdArgs,
        #[command(flatten)]
        measure: MeasureArgs,
    },
    /// Search E24 balance resistors for measured bridge resistances.
    Balance {
        r1: f64,
        r2: f64,
        r3: f64,
        r4: f64,
        /// Largest acceptable |v2 - v6| for unit excitation.
        tolerance: f64,
    },
}

#[derive(Args)]
struct SerialArgs {
    /// Serial port connected to the RS485 bus.
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    port: String,
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,
}

#[derive(Args)]
struct IdArgs {
    /// Single-character node identity (1-9, A-Z, a-z).
    #[arg(short, long = "identity", default_value = "N", value_parser = parse_node_id)]
    id: NodeId,
}

#[derive(Args)]
struct SimArgs {
    /// Simulated bridge arm resistances, in ohms.
    #[arg(long, default_value_t = 5000.0)]
    r1: f64,
    #[arg(long, default_value_t = 5000.0)]
    r2: f64,
    #[arg(long, default_value_t = 5000.0)]
    r3: f64,
    #[arg(long, default_value_t = 5000.0)]
    r4: f64,
    /// Sense resistor at the foot of each arm.
    #[arg(long, default_value_t = DEFAULT_RREF)]
    rref: f64,
}

#[derive(Args)]
struct MeasureArgs {
    /// Excitation level, 0-255 steps of 4.096 V / 256.
    #[arg(short, long, default_value_t = 255)]
    level: i32,
    /// Sense resistor at the foot of each arm.
    #[arg(long, default_value_t = DEFAULT_RREF)]
    rref: f64,
}

impl SimArgs {
    fn node(&self, id: NodeId) -> Node<SimBoard> {
        let bridge = BridgeModel {
            r1: self.r1,
            r2: self.r2,
            r3: self.r3,
            r4: self.r4,
            rref: self.rref,
        };
        Node::new(NodeConfig::with_id(id), SimBoard::with_bridge(bridge))
    }
}

fn parse_node_id(s: &str) -> Result<NodeId, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => NodeId::new(c).map_err(|e| e.to_string()),
        _ => Err(format!("expected a single character, got {s:?}")),
    }
}

// The main entry point for the command-line application.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.mode {
        Mode::Ports => list_ports(),
        Mode::Node { serial, id, sim } => run_serial_node(&serial, id.id, &sim),
        Mode::Console { id, sim } => run_console_node(id.id, &sim),
        Mode::Master { serial, id, measure } => run_master(&serial, id.id, &measure),
        Mode::Monitor { serial, id, measure } => run_monitor(&serial, id.id, &measure),
        Mode::Balance {
            r1,
            r2,
            r3,
            r4,
            tolerance,
        } => {
            run_balance(Bridge::new(r1, r2, r3, r4), tolerance);
            Ok(())
        }
    }
}

fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("could not enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in ports {
        println!("{}", port.port_name);
    }
    Ok(())
}

fn open_port(serial: &SerialArgs, timeout: Duration) -> Result<Box<dyn SerialPort>> {
    serialport::new(&serial.port, serial.baud)
        .timeout(timeout)
        .open()
        .with_context(|| format!("failed to open serial port '{}'", serial.port))
}

// Serves the bus on a real serial port.
fn run_serial_node(serial: &SerialArgs, id: NodeId, sim: &SimArgs) -> Result<()> {
    let port = open_port(serial, NODE_PORT_TIMEOUT)?;
    let mut transport = StreamTransport::new(port);
    let mut node = sim.node(id);
    node.startup();

    println!(
        "Node '{}' listening on {} at {} baud. Press Ctrl+C to exit.",
        node.id(),
        serial.port,
        serial.baud
    );
    node.serve(&mut transport).context("serial port failed")?;
    node.shutdown();
    Ok(())
}

/// Stdin and stdout as one stream.
struct Console {
    stdin: io::Stdin,
    stdout: io::Stdout,
}

impl Read for Console {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdin.read(buf)
    }
}

impl Write for Console {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdout.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}

// Manual mode: type frames such as /Nv! and read the replies.
fn run_console_node(id: NodeId, sim: &SimArgs) -> Result<()> {
    let mut node = sim.node(id);
    node.startup();
    println!(
        "Node '{}' ready. Enter frames such as /{}v!, Ctrl+D to exit.",
        node.id(),
        node.id()
    );

    let mut transport = StreamTransport::new(Console {
        stdin: io::stdin(),
        stdout: io::stdout(),
    });
    node.serve(&mut transport).context("console failed")?;
    node.shutdown();
    Ok(())
}

// Opens the port and brings the node to a known, excited state.
fn connect(
    serial: &SerialArgs,
    id: NodeId,
    measure: &MeasureArgs,
) -> Result<NodeClient<Box<dyn SerialPort>>> {
    let port = open_port(serial, MASTER_PORT_TIMEOUT)?;
    let mut node = NodeClient::new(id, port);

    println!("First, see that board is alive.");
    node.set_indicator(true).context("no answer to L1")?;
    let version = node.version().context("no answer to v")?;
    println!("{version}");
    thread::sleep(Duration::from_secs(1));
    node.set_indicator(false).context("no answer to L0")?;
    node.reference_on(measure.level).context("no answer to w")?;
    Ok(node)
}

fn run_master(serial: &SerialArgs, id: NodeId, measure: &MeasureArgs) -> Result<()> {
    let mut node = connect(serial, id, measure)?;
    println!("Now, report the NPP-301 resistances.");
    println!("Press Control-C to finish.");
    loop {
        let readings = node.read_channels().context("no answer to a")?;
        match readings.resistances(measure.rref) {
            Some(r) => println!("adc readings {readings}  resistances {r}"),
            None => println!("adc readings {readings}  (no current through the bridge)"),
        }
        thread::sleep(POLL_INTERVAL);
    }
}

struct MonitorView {
    node: NodeId,
    level: i32,
    rref: f64,
    samples: u64,
    readings: Option<BridgeReadings>,
    status: String,
}

fn run_monitor(serial: &SerialArgs, id: NodeId, measure: &MeasureArgs) -> Result<()> {
    let mut node = connect(serial, id, measure)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = monitor_loop(&mut terminal, &mut node, measure);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    node.reference_off().context("no answer to w 0 0")?;
    info!("excitation switched off");
    result
}

fn monitor_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    node: &mut NodeClient<Box<dyn SerialPort>>,
    measure: &MeasureArgs,
) -> Result<()> {
    let mut view = MonitorView {
        node: node.id(),
        level: measure.level.clamp(0, 255),
        rref: measure.rref,
        samples: 0,
        readings: None,
        status: String::from("waiting for first reading"),
    };
    let mut next_poll = Instant::now();

    loop {
        if Instant::now() >= next_poll {
            match node.read_channels() {
                Ok(readings) => {
                    view.samples += 1;
                    view.readings = Some(readings);
                    view.status = format!("{} readings", view.samples);
                }
                Err(e) => view.status = format!("read failed: {e}"),
            }
            next_poll += POLL_INTERVAL;
        }

        terminal.draw(|frame| draw_monitor(frame, &view))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    return Ok(());
                }
            }
        }
    }
}

fn draw_monitor(frame: &mut Frame, view: &MonitorView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Min(3),
        ])
        .split(frame.size());

    let title = format!(
        "Node '{}'  excitation level {}/256  Rref {:.0} ohm  (q to quit)",
        view.node, view.level, view.rref
    );
    frame.render_widget(
        Paragraph::new(title).block(Block::default().borders(Borders::ALL).title("NPP-301")),
        chunks[0],
    );

    let counts = view.readings.map(|r| [r.pin8, r.pin2, r.pin4, r.pin5, r.pin6]);
    let rows = ["8", "2", "4", "5", "6"]
        .iter()
        .zip(SENSOR_CHANNELS)
        .enumerate()
        .map(|(i, (pin, channel))| {
            let value = counts.map_or_else(|| "-".to_string(), |c| c[i].to_string());
            Row::new(vec![format!("pin {pin}"), channel.to_string(), value])
        });
    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(Row::new(vec!["Pin", "Channel", "ADC"]).style(Style::default().add_modifier(Modifier::BOLD)))
    .block(Block::default().borders(Borders::ALL).title("Readings"));
    frame.render_widget(table, chunks[1]);

    let summary = match view.readings.and_then(|r| r.resistances(view.rref)) {
        Some(r) => format!("{r}\n{}", view.status),
        None => format!("no current through the bridge\n{}", view.status),
    };
    frame.render_widget(
        Paragraph::new(summary).block(Block::default().borders(Borders::ALL).title("Resistances")),
        chunks[2],
    );
}

fn run_balance(npp: Bridge, tolerance: f64) {
    println!(
        "npp= r1={} r2={} r3={} r4={} unbalanceTol={tolerance}",
        npp.r1, npp.r2, npp.r3, npp.r4
    );
    println!("initial unbalance v2-v6= {}", npp.unbalance());

    let candidates = bridge::balance_candidates(npp, tolerance);
    if candidates.is_empty() {
        println!("No candidate solutions made the cut.");
    }
    for candidate in &candidates {
        println!("{candidate}");
    }
    println!("Done.");
}
