#![forbid(unsafe_code)]
use assetchain::blockchain::{validate_no_duplicates, Block};
use assetchain::config::{load_config, DEFAULT_CONFIG_PATH};
use assetchain::crypto::KeyPair;
use assetchain::policy::check_script;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generates a fresh key pair
    Keygen,
    /// Checks the hash, transactions and signature of a serialized block
    VerifyBlock {
        /// JSON file holding the block's dict form
        file: PathBuf,
    },
    /// Screens and parses an asset policy script without running it
    CheckScript {
        /// File holding the script source
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Keygen => keygen()?,
        Commands::VerifyBlock { file } => verify_block(file)?,
        Commands::CheckScript { file } => check(&cli.config, file)?,
    }

    Ok(())
}

fn keygen() -> Result<(), Box<dyn std::error::Error>> {
    let keypair = KeyPair::generate()?;
    println!("{}", "New key pair".bright_cyan().bold());
    println!("  {} {}", "public: ".bright_green(), keypair.public_key_hex());
    println!("  {} {}", "secret: ".bright_yellow(), keypair.secret_key_hex());
    println!("{}", "Keep the secret key private.".yellow());
    Ok(())
}

fn verify_block(file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "Verifying block...".bright_cyan());

    let data: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(file)?)?;
    let outcome = Block::from_dict(&data).and_then(|block| {
        validate_no_duplicates(&block)?;
        block.verify_signature()?;
        Ok(block)
    });

    match outcome {
        Ok(block) => {
            println!("{} {}", "Block is well formed:".bright_green(), block.id()?);
            println!("  transactions: {}", block.transactions.len());
            println!("  signer:       {}", block.node_pubkey.unwrap_or_default());
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "Block rejected:".bright_red().bold(), e);
            Err(e.into())
        }
    }
}

fn check(config_path: &PathBuf, file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let script = std::fs::read_to_string(file)?;

    match check_script(&script, &config.policy) {
        Ok(program) => {
            println!(
                "{} {} condition(s)",
                "Script accepted:".bright_green(),
                program.conditions.len()
            );
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "Script refused:".bright_red().bold(), e);
            Err(e.into())
        }
    }
}
