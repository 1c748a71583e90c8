//! stgblock CLI Client
//!
//! Command-line client for the stgblock protocol: performs the handshake,
//! sends one framed request, prints the response.
//!
//! Uses a single TCP stream for sequential write-then-read. Cloning the
//! socket into separate reader/writer handles causes spurious connection
//! aborts on Windows, so the stream is written directly and only wrapped in
//! a BufReader for reads.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use clap::{Parser, Subcommand};

use stgblock::config::MAX_FRAME_LEN;
use stgblock::protocol::codec::{
    decode_response, encode_request, read_frame, write_frame,
};
use stgblock::protocol::{
    decode_handshake_response, encode_handshake_request, Request, Response, Status, SENTINEL,
};

/// stgblock CLI
#[derive(Parser, Debug)]
#[command(name = "stgblock-cli")]
#[command(about = "CLI for the stgblock storage service")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8001")]
    server: String,

    /// Client identifier sent in the handshake (4+ characters)
    #[arg(short, long, default_value = "stgcli")]
    id: String,

    /// Connection timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a new file (no overwrite)
    Write {
        /// Target filename
        filename: String,

        /// File contents
        value: String,
    },

    /// Read a file
    Read {
        /// Target filename
        filename: String,
    },

    /// Replace a file's contents
    Update {
        /// Target filename
        filename: String,

        /// New contents
        value: String,
    },

    /// Delete a file
    Delete {
        /// Target filename
        filename: String,
    },
}

fn main() {
    let args = Args::parse();

    // Convert CLI command to a protocol request
    let request = match &args.command {
        Commands::Write { filename, value } => Request::Write {
            filename: filename.clone(),
            payload: value.as_bytes().to_vec(),
        },
        Commands::Read { filename } => Request::Read {
            filename: filename.clone(),
        },
        Commands::Update { filename, value } => Request::Update {
            filename: filename.clone(),
            payload: value.as_bytes().to_vec(),
        },
        Commands::Delete { filename } => Request::Delete {
            filename: filename.clone(),
        },
    };

    // Connect to server
    let mut stream = match TcpStream::connect_timeout(
        &args.server.parse().expect("Invalid server address"),
        Duration::from_millis(args.timeout),
    ) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    let _ = stream.set_read_timeout(Some(Duration::from_millis(args.timeout)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(args.timeout)));

    // Disable Nagle's algorithm for immediate sends (avoid buffering delays)
    let _ = stream.set_nodelay(true);

    // Step 1: Handshake
    let handshake = match encode_handshake_request(&args.id) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Invalid client id {:?}: {}", args.id, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = stream.write_all(&handshake) {
        eprintln!("Failed to send handshake: {}", e);
        std::process::exit(1);
    }

    // Borrow the stream for reading rather than cloning it; the server sends
    // nothing between the handshake reply sentinel and our request's
    // response, so dropping this reader loses no buffered bytes.
    let mut reply = Vec::new();
    {
        let mut reader = BufReader::new(&stream);
        if let Err(e) = reader.read_until(SENTINEL, &mut reply) {
            eprintln!("Failed to read handshake reply: {}", e);
            std::process::exit(1);
        }
    }
    match decode_handshake_response(&reply) {
        Ok(resp) if resp.status == Status::Ok => {}
        Ok(resp) => {
            eprintln!("Handshake rejected: {:?}", resp.error);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Malformed handshake reply: {}", e);
            std::process::exit(1);
        }
    }

    // Step 2: Send the framed request
    let frame = match encode_request(&request) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Cannot encode request: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = write_frame(&mut stream, &frame) {
        eprintln!("Failed to send request: {}", e);
        std::process::exit(1);
    }

    // Step 3: Read the framed response
    let mut reader = BufReader::new(&stream);
    let unit = match read_frame(&mut reader, MAX_FRAME_LEN) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read response: {}", e);
            std::process::exit(1);
        }
    };
    let response = match decode_response(&unit) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Malformed response: {}", e);
            std::process::exit(1);
        }
    };

    handle_response(&args.command, response);
}

fn handle_response(cmd: &Commands, response: Response) {
    match response.status {
        Status::Ok => match cmd {
            Commands::Read { .. } | Commands::Update { .. } => {
                if let Some(payload) = response.payload {
                    // Try to print as UTF-8, fall back to hex
                    match String::from_utf8(payload.clone()) {
                        Ok(s) => println!("{}", s),
                        Err(_) => println!("{:?}", payload),
                    }
                } else {
                    println!("(empty)");
                }
            }
            Commands::Write { .. } | Commands::Delete { .. } => {
                println!("OK");
            }
        },
        Status::Error => {
            eprintln!("ERROR: {:?}", response.error);
            std::process::exit(1);
        }
    }
}
