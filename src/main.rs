//! Draw Ledger CLI
//!
//! Works on a ledger persisted in `--data-dir`. Each mutating command loads
//! the snapshot, applies one operation and commits the new snapshot together
//! with the events it emitted.

use clap::{Parser, Subcommand};
use draw_ledger::{
    draw_seed, Address, Amount, DrawIndex, DrawLedger, Hash, LedgerConfig, Storage, U256,
    DEFAULT_BRANCHING_FACTOR, DEFAULT_MAX_REDUCER_ROUNDS,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "draw-ledger", version, about = "Draw Ledger: weighted prize selection")]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Sortition tree branching factor (only used when creating a ledger)
    #[arg(long, default_value_t = DEFAULT_BRANCHING_FACTOR)]
    branching_factor: usize,

    /// Cap on entropy re-hash rounds (only used when creating a ledger)
    #[arg(long, default_value_t = DEFAULT_MAX_REDUCER_ROUNDS)]
    max_reducer_rounds: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the next draw
    OpenDraw,
    /// Deposit into the open draw
    Deposit { depositor: Address, amount: Amount },
    /// Deposit directly into committed balance
    DepositCommitted { depositor: Address, amount: Amount },
    /// Withdraw from the open balance
    WithdrawOpen { depositor: Address, amount: Amount },
    /// Withdraw from the committed balance
    WithdrawCommitted { depositor: Address, amount: Amount },
    /// Withdraw everything
    Withdraw { depositor: Address },
    /// Select the depositor owning a position of the committed supply
    Draw { value: Amount },
    /// Select a winner from raw entropy, or from the previous block hash
    /// seeded with the current draw index
    DrawEntropy {
        /// 256-bit entropy (hex)
        #[arg(long, conflicts_with = "prev_hash")]
        entropy: Option<String>,
        /// 32-byte hash (hex) the draw seed is derived from
        #[arg(long)]
        prev_hash: Option<String>,
    },
    /// Show balances of a depositor
    Balance { depositor: Address },
    /// Show supplies and the current draw
    Supply,
    /// Print the event journal
    Events,
}

impl Command {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Command::OpenDraw
                | Command::Deposit { .. }
                | Command::DepositCommitted { .. }
                | Command::WithdrawOpen { .. }
                | Command::WithdrawCommitted { .. }
                | Command::Withdraw { .. }
        )
    }
}

fn parse_entropy(
    entropy: Option<String>,
    prev_hash: Option<String>,
    draw_index: DrawIndex,
) -> Result<U256, String> {
    match (entropy, prev_hash) {
        (Some(hex_value), _) => {
            let stripped = hex_value.strip_prefix("0x").unwrap_or(&hex_value);
            U256::from_str_radix(stripped, 16).map_err(|e| format!("bad entropy {}: {:?}", hex_value, e))
        }
        (None, Some(hex_value)) => {
            let stripped = hex_value.strip_prefix("0x").unwrap_or(&hex_value);
            let bytes = hex::decode(stripped).map_err(|e| format!("bad prev hash {}: {}", hex_value, e))?;
            let prev: Hash = bytes
                .try_into()
                .map_err(|_| format!("prev hash must be 32 bytes: {}", hex_value))?;
            Ok(draw_seed(&prev, draw_index))
        }
        (None, None) => Err("either --entropy or --prev-hash is required".into()),
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&args.data_dir)?;
    let storage = Storage::open(&args.data_dir)?;

    let mut ledger = match storage.load_ledger()? {
        Some(ledger) => ledger,
        None => {
            let config = LedgerConfig {
                branching_factor: args.branching_factor,
                max_reducer_rounds: args.max_reducer_rounds,
            };
            info!("Initializing new ledger in {} ({:?})", args.data_dir.display(), config);
            DrawLedger::new(config)?
        }
    };

    let mutates = args.command.mutates();

    match args.command {
        Command::OpenDraw => {
            let index = ledger.open_next_draw()?;
            println!("draw {} open (committed supply {})", index, ledger.committed_supply());
        }
        Command::Deposit { depositor, amount } => {
            ledger.deposit(depositor, amount)?;
            println!("open balance of {}: {}", depositor, ledger.open_balance_of(&depositor));
        }
        Command::DepositCommitted { depositor, amount } => {
            ledger.deposit_committed(depositor, amount)?;
            println!("committed balance of {}: {}", depositor, ledger.committed_balance_of(&depositor));
        }
        Command::WithdrawOpen { depositor, amount } => {
            ledger.withdraw_open(depositor, amount)?;
            println!("open balance of {}: {}", depositor, ledger.open_balance_of(&depositor));
        }
        Command::WithdrawCommitted { depositor, amount } => {
            ledger.withdraw_committed(depositor, amount)?;
            println!("committed balance of {}: {}", depositor, ledger.committed_balance_of(&depositor));
        }
        Command::Withdraw { depositor } => {
            let receipt = ledger.withdraw(depositor)?;
            println!("withdrew {} ({} open, {} committed)", receipt.total(), receipt.open, receipt.committed);
        }
        Command::Draw { value } => {
            println!("{}", ledger.draw(value)?);
        }
        Command::DrawEntropy { entropy, prev_hash } => {
            let entropy = parse_entropy(entropy, prev_hash, ledger.current_draw_index())?;
            let winner = ledger.draw_with_entropy(entropy)?;
            info!("Draw {} resolved to {}", ledger.current_draw_index(), winner);
            println!("{}", winner);
        }
        Command::Balance { depositor } => {
            println!("open:                {}", ledger.open_balance_of(&depositor));
            println!("committed:           {}", ledger.committed_balance_of(&depositor));
            println!("total:               {}", ledger.balance_of(&depositor));
            println!("consolidated draw:   {}", ledger.consolidated_draw_index(&depositor));
            println!("latest draw:         {}", ledger.latest_draw_index(&depositor));
        }
        Command::Supply => {
            println!("current draw:        {}", ledger.current_draw_index());
            println!("open supply:         {}", ledger.open_supply());
            println!("committed supply:    {}", ledger.committed_supply());
            println!("depositors:          {}", ledger.depositor_count());
        }
        Command::Events => {
            for (seq, event) in storage.events()?.iter().enumerate() {
                println!("{:>6}  {}", seq, event);
            }
        }
    }

    if mutates {
        storage.commit(&mut ledger)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("draw_ledger=info".parse().expect("static directive")),
        )
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_entropy() {
        assert_eq!(parse_entropy(Some("0x1f".into()), None, 5), Ok(U256::from(31)));
        assert_eq!(parse_entropy(Some("ff".into()), None, 5), Ok(U256::from(255)));
        assert!(parse_entropy(Some("xyz".into()), None, 5).is_err());
    }

    #[test]
    fn test_parse_prev_hash_uses_draw_index() {
        let prev = [0xabu8; 32];
        let text = format!("0x{}", hex::encode(prev));
        assert_eq!(parse_entropy(None, Some(text.clone()), 4), Ok(draw_seed(&prev, 4)));
        assert_ne!(parse_entropy(None, Some(text), 4), parse_entropy(None, Some(hex::encode(prev)), 5));
    }

    #[test]
    fn test_parse_prev_hash_rejects_bad_input() {
        assert!(parse_entropy(None, Some("0x1234".into()), 1).is_err());
        assert!(parse_entropy(None, Some("zz".into()), 1).is_err());
        assert!(parse_entropy(None, None, 1).is_err());
    }
}
