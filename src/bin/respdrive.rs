//! respdrive - a minimal interactive client built on `resp_stream::Parser`.
//!
//! This is a demonstration driver, not part of the library's public
//! surface: it owns the socket, feeds bytes into the parser, and prints
//! whatever comes back. It exists to show the shape a real client
//! builds around the parser (buffer ownership, callback registration in
//! request order, `propagate` on disconnect).

use resp_stream::{ParseOutcome, Parser, Reply};
use std::io::{self, Write};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Command-line configuration, parsed by hand rather than via a flags crate.
struct Config {
    host: String,
    port: u16,
    utf8: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            utf8: false,
        }
    }
}

impl Config {
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--utf8" => {
                    config.utf8 = true;
                    i += 1;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
respdrive - minimal RESP client driver

USAGE:
    respdrive [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Server to connect to (default: 127.0.0.1)
    -p, --port <PORT>    Port to connect to (default: 6379)
        --utf8           Require bulk payloads to be valid UTF-8
        --help           Print this help message

Type a command on each line (e.g. `PING`, `GET name`); Ctrl+D to quit.
"#
    );
}

/// Sentinel handle threaded through every callback. The parser never
/// dereferences it, it just forwards it, here it is unit, since this
/// demo has nothing else to pass along.
type ClientHandle = ();

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let stream = TcpStream::connect(config.bind_address()).await?;
    info!(address = %config.bind_address(), "connected");
    let (mut read_half, mut write_half) = stream.into_split();

    let mut parser: Parser<ClientHandle> = Parser::new((), config.utf8);
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Reply>();

    let printer = tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            println!("{reply}");
        }
    });

    let mut read_buf = [0u8; 4096];
    let mut lines = io::BufReader::new(io::stdin());
    let mut line = String::new();

    // Extremely small REPL: write one command, read replies until the
    // socket would block, repeat. Real clients pipeline; this keeps the
    // demo single-threaded and easy to follow.
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        let read = std::io::BufRead::read_line(&mut lines, &mut line)?;
        if read == 0 {
            break; // EOF
        }
        let command = line.trim_end();
        if command.is_empty() {
            continue;
        }

        let request = encode_inline_command(command);
        write_half.write_all(&request).await?;

        let tx = reply_tx.clone();
        parser.push_callback(Box::new(move |_handle, reply| {
            let _ = tx.send(reply);
        }));

        loop {
            match read_half.read(&mut read_buf).await {
                Ok(0) => {
                    warn!("server closed the connection");
                    parser.propagate(Reply::SimpleString("connection closed".into()));
                    printer.abort();
                    return Ok(());
                }
                Ok(n) => {
                    parser.append_bytes(&read_buf[..n]);
                    match parser.parse_reply() {
                        Ok(ParseOutcome::Delivered) => break,
                        Ok(ParseOutcome::NeedMore) => continue,
                        Err(err) => {
                            error!(error = %err, "protocol fault, dropping connection");
                            printer.abort();
                            return Err(err.into());
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "read failed");
                    printer.abort();
                    return Err(err.into());
                }
            }
        }
        debug!(command = %command, "dispatched");
    }

    drop(reply_tx);
    let _ = printer.await;
    Ok(())
}

/// Encodes a space-separated command line as a RESP multi-bulk array,
/// the wire form every real Redis command takes.
fn encode_inline_command(line: &str) -> Vec<u8> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut out = format!("*{}\r\n", parts.len()).into_bytes();
    for part in parts {
        out.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        out.extend_from_slice(part.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}
