//! hlink — host-side control tool for the console daemon.
//!
//! Talks the binary transaction protocol: authenticates (which drives
//! the on-console trust prompt), queues titles, launches one, or puts
//! the console to sleep.

use std::time::Duration;

use clap::Parser;

use hlink::proto::client::TransactionClient;

#[derive(Parser)]
#[command(name = "hlink")]
#[command(about = "Remote-control a console on the LAN", long_about = None)]
struct Cli {
    /// Console address; the well-known transaction port is appended
    /// when none is given.
    address: String,

    /// Put the console to sleep (runs after the other commands).
    #[arg(short, long)]
    sleep: bool,

    /// Pause between successive commands, in milliseconds.
    #[arg(short, long, value_name = "MS")]
    wait: Option<u64>,

    /// Title ids to append to the install queue (decimal or 0x-hex).
    #[arg(short = 'a', long = "add-queue", value_name = "ID", num_args = 1.., value_parser = parse_title_id)]
    add_queue: Vec<u64>,

    /// Title id to launch (decimal or 0x-hex).
    #[arg(short, long, value_name = "TID", value_parser = parse_title_id)]
    launch: Option<u64>,
}

fn parse_title_id(raw: &str) -> Result<u64, String> {
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("bad title id '{}': {}", raw, e))
}

#[tokio::main]
async fn main() {
    // Usage errors exit 1; everything else exits 0 with failures on
    // stderr.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let client = match TransactionClient::connect(&cli.address).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("hlink: {}", e);
            return;
        }
    };

    if let Err(e) = client.auth().await {
        eprintln!("hlink: auth: {}", e);
        return;
    }

    let wait_ms = cli.wait.unwrap_or(0);

    if !cli.add_queue.is_empty() {
        pause(wait_ms).await;
        match client.add_queue(&cli.add_queue).await {
            Ok(()) => println!("queued {} title(s)", cli.add_queue.len()),
            Err(e) => eprintln!("hlink: add-queue: {}", e),
        }
    }

    if let Some(title_id) = cli.launch {
        pause(wait_ms).await;
        match client.launch(title_id).await {
            Ok(()) => println!("launched {:#018x}", title_id),
            Err(e) => eprintln!("hlink: launch: {}", e),
        }
    }

    if cli.sleep {
        pause(wait_ms).await;
        match client.sleep().await {
            Ok(()) => println!("console going to sleep"),
            Err(e) => eprintln!("hlink: sleep: {}", e),
        }
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
