//! Probe a modem on a serial line with `AT` and report the answer.
//!
//! Usage: `cargo run --example at_probe [PORT]`
//!
//! Configuration is resolved the usual way (`V24_LINE_CONFIG`,
//! `./v24-line.toml`, ...); a port given on the command line wins.

use std::sync::Arc;
use v24_line::config::ConfigLoader;
use v24_line::logging::init_tracing;
use v24_line::{SerialLine, TracingSink};

const RESPONSES: [&str; 2] = ["OK", "ERROR"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ConfigLoader::load()?.into_config();
    if let Some(port) = std::env::args().nth(1) {
        config.line.port = port;
    }
    init_tracing(&config.logging)?;

    println!("=== AT probe on {} ===\n", config.line.port);
    let line = SerialLine::open(&config, Arc::new(TracingSink))?;
    println!("  Signals: {:?}", line.signal_state());

    line.dtr(true)?;
    let stale = line.flush_and_log()?;
    if !stale.is_empty() {
        println!("  Discarded {} stale bytes", stale.len());
    }

    match line.send_and_waitfor("AT\r", &RESPONSES, 2000)? {
        Some(0) => println!("  Modem answered OK"),
        Some(_) => println!("  Modem answered ERROR"),
        None => println!("  No answer within 2s"),
    }

    line.close()?;
    Ok(())
}
