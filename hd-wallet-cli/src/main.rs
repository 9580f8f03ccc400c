//! hd-wallet: command-line front end for the multi-chain key and transfer engine
//!
//! Nothing is persisted. Commands that need keys take the recovery phrase
//! through `--phrase` or `HD_WALLET_PHRASE`; endpoints and transfer policy
//! come from the environment (see `WalletConfig::from_env`).

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hd_wallet::config::WalletConfig;
use hd_wallet::{ChainKeyPair, ChainKind, Ledgers, Session, TransactionEngine, TransferRequest};

#[derive(Parser)]
#[command(name = "hd-wallet")]
#[command(version, about = "Deterministic EVM and Solana accounts from one recovery phrase")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new 12-word recovery phrase
    Generate,
    /// Derive consecutive accounts from a phrase
    Derive(DeriveArgs),
    /// Query the balance of an address
    Balance(BalanceArgs),
    /// Request test SOL from the devnet faucet
    Airdrop(AirdropArgs),
    /// Send a native transfer from a derived account
    Transfer(TransferArgs),
}

#[derive(Args)]
struct PhraseArgs {
    /// Space-separated recovery phrase
    #[arg(long, env = "HD_WALLET_PHRASE", hide_env_values = true)]
    phrase: String,
}

#[derive(Args)]
struct DeriveArgs {
    #[command(flatten)]
    phrase: PhraseArgs,

    /// Chain to derive for (evm or solana)
    #[arg(short, long)]
    chain: ChainKind,

    /// Number of accounts to derive, starting at index 0
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u32,

    /// Also print private keys
    #[arg(long)]
    show_secrets: bool,
}

#[derive(Args)]
struct BalanceArgs {
    #[arg(short, long)]
    chain: ChainKind,

    #[arg(short, long)]
    address: String,
}

#[derive(Args)]
struct AirdropArgs {
    /// Solana address to fund
    #[arg(short, long)]
    address: String,
}

#[derive(Args)]
struct TransferArgs {
    #[command(flatten)]
    phrase: PhraseArgs,

    #[arg(short, long)]
    chain: ChainKind,

    /// Account index of the source keypair
    #[arg(long, default_value_t = 0)]
    from_account: u32,

    /// Destination address
    #[arg(long)]
    to: String,

    /// Amount in native units (ETH or SOL)
    #[arg(long)]
    amount: String,

    /// Wait for the ledger to confirm the transfer
    #[arg(long)]
    confirm: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!("hd-wallet {} running {}", hd_wallet::VERSION, cli.command.name());
    match cli.command {
        Commands::Generate => generate(),
        Commands::Derive(args) => derive(args),
        Commands::Balance(args) => balance(args).await,
        Commands::Airdrop(args) => airdrop(args).await,
        Commands::Transfer(args) => transfer(args).await,
    }
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Derive(_) => "derive",
            Self::Balance(_) => "balance",
            Self::Airdrop(_) => "airdrop",
            Self::Transfer(_) => "transfer",
        }
    }
}

fn engine(config: &WalletConfig) -> Result<TransactionEngine> {
    info!(
        evm = %config.network.evm.url,
        solana = %config.network.solana.url,
        "Connecting ledger clients"
    );
    let ledgers = Ledgers::connect(&config.network).context("Failed to set up ledger clients")?;
    Ok(TransactionEngine::new(config.transfer.clone(), ledgers))
}

fn session_from(args: &PhraseArgs) -> Result<Session> {
    let words: Vec<&str> = args.phrase.split_whitespace().collect();
    Session::from_words(&words).context("Invalid recovery phrase")
}

fn key_pair_json(key_pair: &ChainKeyPair, show_secret: bool) -> serde_json::Value {
    let mut value = json!({
        "chain": key_pair.chain(),
        "account": key_pair.account_index(),
        "path": key_pair.path().to_string(),
        "address": key_pair.address(),
    });
    if show_secret {
        value["private_key"] = json!(key_pair.export_private_key());
    }
    value
}

fn print(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn generate() -> Result<()> {
    let mut session = Session::generate()?;
    let phrase = session.phrase().map(|p| p.phrase()).unwrap_or_default();
    let evm = key_pair_json(session.derive_next(ChainKind::Evm)?, false);
    let solana = key_pair_json(session.derive_next(ChainKind::Solana)?, false);

    print(&json!({
        "phrase": phrase,
        "accounts": [evm, solana],
    }))
}

fn derive(args: DeriveArgs) -> Result<()> {
    let mut session = session_from(&args.phrase)?;
    info!(chain = %args.chain, count = args.count, "Deriving accounts");
    let mut accounts = Vec::with_capacity(args.count as usize);
    for _ in 0..args.count {
        let key_pair = session.derive_next(args.chain)?;
        accounts.push(key_pair_json(key_pair, args.show_secrets));
    }
    print(&json!(accounts))
}

async fn balance(args: BalanceArgs) -> Result<()> {
    let config = WalletConfig::from_env()?;
    let balance = engine(&config)?.balance(args.chain, &args.address).await?;

    print(&json!({
        "chain": args.chain,
        "address": args.address,
        "base_units": balance.base_units.to_string(),
        "balance": balance.to_string(),
    }))
}

async fn airdrop(args: AirdropArgs) -> Result<()> {
    let config = WalletConfig::from_env()?;
    let signature = engine(&config)?
        .airdrops()
        .request_funds(&args.address, ChainKind::Solana)
        .await
        .context("Airdrop failed; the devnet faucet may be rate limiting, try again later")?;

    print(&json!({ "address": args.address, "signature": signature }))
}

async fn transfer(args: TransferArgs) -> Result<()> {
    let mut config = WalletConfig::from_env()?;
    if args.confirm {
        config.transfer.await_confirmation = true;
    }

    let session = session_from(&args.phrase)?;
    let source = session.derive_at(args.chain, args.from_account)?;
    info!(chain = %args.chain, from = source.address(), to = %args.to, amount = %args.amount, "Submitting transfer");
    let request = TransferRequest::new(source, args.to, args.amount);

    let receipt = engine(&config)?.transfer(&request).await?;
    print(&json!({
        "chain": receipt.chain,
        "from": receipt.from,
        "to": receipt.to,
        "amount": receipt.amount.to_string(),
        "id": receipt.id,
        "confirmed": receipt.confirmed,
        "states": receipt.states,
    }))
}
