//! Access broker controller.
//!
//! Parses flags, bridges OS signals onto the supervisor's control queues and
//! runs the supervisor until shutdown. Exits 0 on graceful shutdown and 1 when
//! any startup stage fails.

use std::process::ExitCode;

use clap::Parser;

use broker_controller::cli::Args;
use broker_controller::lifecycle::{forward_os_signals, Collaborators, Supervisor};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let supervisor = Supervisor::new(args, Collaborators::default());
    tokio::spawn(forward_os_signals(supervisor.handle()));

    match supervisor.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
