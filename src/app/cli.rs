use crate::config::Config;
use crate::exchange::ExchangeSet;
use crate::{Error, Result};
use std::env;
use std::path::Path;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "tradebridge.toml";
const BOOK_LEVELS_SHOWN: usize = 10;

#[derive(Debug, PartialEq)]
enum Command {
    Coins,
    Pairs,
    Book { base: String, quote: String },
    Balances,
}

#[derive(Debug)]
struct CliArgs {
    config_path: Option<String>,
    exchange: Option<String>,
    command: Option<Command>,
    show_help: bool,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let cli = parse_args(&args)?;

    if cli.show_help {
        print_usage();
        return Ok(());
    }

    let exchange_name = cli
        .exchange
        .ok_or_else(|| Error::InvalidInput("--exchange must be set".to_string()))?;
    let command = cli
        .command
        .ok_or_else(|| Error::InvalidInput("missing command".to_string()))?;
    let config = load_config(cli.config_path.as_deref())?;

    let set = ExchangeSet::live(config);
    let exchange = set.get(&exchange_name)?;
    info!(exchange = exchange.name(), ?command, "running command");

    match command {
        Command::Coins => {
            for constraint in exchange.context().coins().list() {
                println!(
                    "{}\t{}\tlisted={}",
                    constraint.coin.code, constraint.ex_symbol, constraint.listed
                );
            }
        }
        Command::Pairs => {
            for constraint in exchange.context().pairs().list() {
                println!(
                    "{}\t{}\tlot={}\ttick={}\tlisted={}",
                    constraint.pair.code(),
                    constraint.ex_symbol,
                    display_step(constraint.lot_size),
                    display_step(constraint.price_filter),
                    constraint.listed
                );
            }
        }
        Command::Book { base, quote } => {
            let pair = set.registry().find_pair(&base, &quote).ok_or_else(|| {
                Error::NotFound(format!("pair {base}/{quote} is not listed"))
            })?;
            let book = exchange.order_book(&pair)?;
            println!("{} latency={}ms", pair.code(), book.latency_ms());
            for level in book.asks.iter().take(BOOK_LEVELS_SHOWN).rev() {
                println!("ask\t{}\t{}", level.rate, level.quantity);
            }
            for level in book.bids.iter().take(BOOK_LEVELS_SHOWN) {
                println!("bid\t{}\t{}", level.rate, level.quantity);
            }
        }
        Command::Balances => {
            exchange.refresh_balances();
            for balance in exchange.context().balances().list() {
                println!(
                    "{}\tavailable={}\tfrozen={}",
                    balance.coin.code, balance.available, balance.frozen
                );
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH),
        None => {
            let mut config = Config::default();
            config.apply_env_overrides()?;
            config.validate()?;
            Ok(config)
        }
    }
}

fn display_step(step: Option<rust_decimal::Decimal>) -> String {
    step.map(|value| value.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut config_path = None;
    let mut exchange = None;
    let mut positional = Vec::new();
    let mut show_help = false;

    let mut index = 1;
    while index < args.len() {
        match args[index].as_str() {
            "--help" | "-h" => {
                show_help = true;
                index += 1;
            }
            "--config" | "-c" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| Error::InvalidInput("missing value for --config".to_string()))?;
                config_path = Some(value.to_string());
                index += 2;
            }
            "--exchange" | "-e" => {
                let value = args.get(index + 1).ok_or_else(|| {
                    Error::InvalidInput("missing value for --exchange".to_string())
                })?;
                exchange = Some(value.to_lowercase());
                index += 2;
            }
            flag if flag.starts_with('-') => {
                return Err(Error::InvalidInput(format!("unknown argument: {flag}")));
            }
            value => {
                positional.push(value.to_string());
                index += 1;
            }
        }
    }

    let command = parse_command(&positional)?;
    Ok(CliArgs {
        config_path,
        exchange,
        command,
        show_help,
    })
}

fn parse_command(positional: &[String]) -> Result<Option<Command>> {
    let Some((name, rest)) = positional.split_first() else {
        return Ok(None);
    };
    let command = match (name.as_str(), rest) {
        ("coins", []) => Command::Coins,
        ("pairs", []) => Command::Pairs,
        ("balances", []) => Command::Balances,
        ("book", [base, quote]) => Command::Book {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
        },
        ("book", _) => {
            return Err(Error::InvalidInput(
                "book expects BASE and QUOTE".to_string(),
            ))
        }
        (other, _) => {
            return Err(Error::InvalidInput(format!(
                "unknown command or extra arguments: {other}"
            )))
        }
    };
    Ok(Some(command))
}

fn print_usage() {
    println!("usage: tradebridge [--config <path>] --exchange <name> <command>");
    println!("  -c, --config     Path to config file (default: tradebridge.toml if present)");
    println!("  -e, --exchange   binance | okx | bigone | coinex | lbank");
    println!("  -h, --help       Show this help");
    println!("commands:");
    println!("  coins            Refresh and list coin constraints");
    println!("  pairs            Refresh and list pair constraints");
    println!("  book BASE QUOTE  Fetch an order book snapshot");
    println!("  balances         Refresh and list balances");
}
