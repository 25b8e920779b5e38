//! Networking inbox server binary.
//! Run with: cargo run --bin inbox-server

use std::process::ExitCode;

use networking_inbox::start_inbox_server;

fn main() -> ExitCode {
    start_inbox_server::run()
}
