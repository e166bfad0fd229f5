use anyhow::{Context as _, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use voting_client::{
    client::{ClientState, VotingClient},
    config::{Config, Mode},
    wallet::{RpcWallet, WalletProvider},
};

#[derive(Parser)]
#[command(name = "voting-client", version, about = "Voting contract client")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the candidates and the voting window.
    Status,
    /// Vote for the candidate at the specified index.
    Vote { index: usize },
    /// Keep the state up to date, following wallet account changes.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    tracing::debug!(config = ?cli.config, "starting");

    let poll_interval = cli.config.poll_interval()?;
    let client = VotingClient::new(
        cli.config.contract_address()?,
        cli.config.descriptor()?,
        poll_interval,
    );

    // Keeps the account poller alive for the lifetime of the client.
    let mut _wallet = None;
    match cli.config.mode()? {
        Mode::Headless { key, rpc_url } => client.connect_headless(&key, rpc_url)?,
        Mode::Interactive { wallet_url } => {
            let provider = match wallet_url {
                Some(url) => {
                    let wallet: Arc<dyn WalletProvider> =
                        Arc::new(RpcWallet::start(url, poll_interval)?);
                    _wallet = Some(wallet.clone());
                    Some(wallet)
                }
                None => None,
            };
            client.connect_interactive(provider).await?;
        }
    }

    client.refresh().await?;
    match cli.command {
        Command::Status => print_state(&client.state()),
        Command::Vote { index } => {
            let receipt = client
                .submit_vote(index)
                .await
                .with_context(|| format!("failed to vote for candidate {index}"))?;
            println!("vote confirmed in transaction {}", receipt.tx_hash);
            print_state(&client.state());
        }
        Command::Watch => watch(&client, poll_interval).await?,
    }

    Ok(())
}

async fn watch(client: &VotingClient, poll_interval: std::time::Duration) -> Result<()> {
    let (tx, mut identities) = mpsc::unbounded_channel();
    let _subscription = client.watch_accounts(move |identity| {
        let _ = tx.send(identity);
    });

    print_state(&client.state());
    let mut interval = tokio::time::interval(poll_interval.max(std::time::Duration::from_secs(5)));
    interval.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(identity) = identities.recv() => {
                match client.apply_account_change(identity).await {
                    Ok(()) => {}
                    Err(err) if err.is_stale() => {
                        tracing::debug!(%err, "account change superseded");
                        continue;
                    }
                    Err(err) => tracing::warn!(%err, "failed to follow account change"),
                }
            }
            _ = interval.tick() => {
                if let Err(err) = client.refresh().await {
                    tracing::warn!(%err, "failed to refresh contract state");
                    continue;
                }
            }
        }
        print_state(&client.state());
    }

    Ok(())
}

fn print_state(state: &ClientState) {
    println!("account: {}", state.identity);
    println!("status: {:?}", state.status());

    let snapshot = &state.snapshot;
    match snapshot.candidates() {
        Some(candidates) => {
            for (index, candidate) in candidates.iter().enumerate() {
                println!("  [{index}] {}: {} votes", candidate.name, candidate.vote_count);
            }
        }
        None => println!("  candidates unknown"),
    }
    match snapshot.voting_open() {
        Some(true) => println!("voting open"),
        Some(false) => println!("voting closed"),
        None => println!("voting status unknown"),
    }
    if let Some(remaining) = snapshot.remaining_seconds() {
        println!("remaining: {remaining}s");
    }
    for (field, err) in snapshot.failures() {
        println!("stale {field}: {err}");
    }
}
