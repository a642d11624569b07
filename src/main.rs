//! # AckLink Relay
//!
//! A relay service that sponsors stablecoin payments for smart accounts.

use clap::Parser;
use relay::cli::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = args.run().await {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
