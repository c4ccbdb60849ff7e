// src/bin/taskmasterctl.rs

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use taskmaster::cli::CtlArgs;
use taskmaster::server::Client;

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("taskmasterctl error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> Result<()> {
    let args = CtlArgs::parse();
    let mut client = Client::connect(&args.socket)
        .await
        .with_context(|| format!("cannot connect to {}", args.socket))?;

    if !args.command.is_empty() {
        let reply = client.send(&args.command.join(" ")).await?;
        println!("{reply}");
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }
        let reply = client.send(line).await.context("daemon closed the connection")?;
        if !reply.is_empty() {
            println!("{reply}");
        }
    }

    Ok(())
}
