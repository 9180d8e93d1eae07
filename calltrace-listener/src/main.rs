//! # calltrace-listener - relay message receiver
//!
//! Binds the Unix-datagram socket an instrumented program's relay sink
//! connects to (its `EVENT_UNIX_SOCKET`) and prints every received
//! message. A development-time stand-in for a real trace collector.

use std::fs;
use std::io::{self, Write};
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

/// Largest datagram the relay can emit; anything bigger is a protocol
/// violation and gets truncated on receive.
const RECV_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Parser)]
#[command(
    name = "calltrace-listener",
    about = "Receive and print call-trace relay notifications",
    after_help = "\
EXAMPLE:
    calltrace-listener /tmp/trace.sock &
    EVENTS_ENABLED=on EVENT_UNIX_SOCKET=/tmp/trace.sock ./instrumented-program"
)]
struct Args {
    /// Socket path to bind (the agent's EVENT_UNIX_SOCKET)
    #[arg(value_name = "SOCKET")]
    socket: PathBuf,

    /// Remove a stale socket file at the path before binding
    #[arg(long)]
    replace: bool,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    if args.socket.exists() {
        if args.replace {
            fs::remove_file(&args.socket).with_context(|| {
                format!("failed to remove stale socket {}", args.socket.display())
            })?;
        } else {
            bail!(
                "socket path {} already exists (use --replace to take it over)",
                args.socket.display()
            );
        }
    }

    let socket = UnixDatagram::bind(&args.socket)
        .with_context(|| format!("failed to bind {}", args.socket.display()))?;
    info!("listening on {}", args.socket.display());

    let mut stdout = io::stdout();
    let mut buffer = vec![0u8; RECV_BUFFER_BYTES];
    loop {
        let len = socket.recv(&mut buffer).context("recv failed")?;
        stdout.write_all(&buffer[..len]).context("stdout write failed")?;
        stdout.flush().context("stdout flush failed")?;
    }
}
