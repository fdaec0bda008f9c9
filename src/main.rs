//! telly: command-line client for Redis-compatible servers
//!
//! Runs a single command given on the command line, or reads commands from
//! stdin one line at a time until `quit`, `exit` or end of input.

use std::error::Error;
use std::io::{self, BufRead, Write};
use telly::{split_args, Config, Connection};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        protocol = %config.protocol,
        set_info = config.set_info,
        "Connecting"
    );

    let mut conn = Connection::connect(&config.connect_options())?;

    if !config.command.is_empty() {
        let reply = conn.send_command(&config.command)?;
        println!("{reply}");
        return Ok(());
    }

    run_interactive(&mut conn, &config)
}

/// Read-eval-print loop over stdin.
fn run_interactive(conn: &mut Connection, config: &Config) -> Result<(), Box<dyn Error>> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let prompt = format!("{}:{}> ", config.host, config.port);
    let mut line = String::new();

    loop {
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let words = match split_args(&line) {
            Ok(words) => words,
            Err(e) => {
                eprintln!("(error) {e}");
                continue;
            }
        };

        match words.as_slice() {
            [] => continue,
            [word] if word.eq_ignore_ascii_case("quit") || word.eq_ignore_ascii_case("exit") => {
                break
            }
            _ => {}
        }

        match conn.send_command(&words) {
            Ok(reply) => println!("{reply}"),
            Err(e) if !conn.is_connected() => return Err(e.into()),
            Err(e) => eprintln!("(error) {e}"),
        }
    }

    Ok(())
}
