use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use kartenservice::config::cli::{date_range, Cli, Command};
use kartenservice::utils::{csv_export, logger};
use kartenservice::{CardClient, ClientConfig, KartenError};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

// 0 success, 1 terminal (fix input or wait for an adapter update),
// 2 retryable transport trouble, 3 expired session.
fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<KartenError>() {
        Some(KartenError::Transport { .. }) => 2,
        Some(KartenError::SessionExpired { .. }) => 3,
        _ => 1,
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let (location, credentials) = cli.resolve_connection()?;
    let config = ClientConfig::default().with_timeout(Duration::from_secs(cli.timeout));
    let client = CardClient::with_config(location, config);

    // Texts need no login; everything else does.
    if let Command::Texts { lang } = &cli.command {
        for text in client.get_texts(lang)? {
            println!("{}\t{}", text.id, text.text);
        }
        return Ok(());
    }

    let session = client.connect(&credentials)?;

    match &cli.command {
        Command::Balance => {
            let info = client.get_card_info(&session)?;
            println!("card:    {}", info.card_number);
            if let Some(holder) = &info.holder {
                println!("holder:  {holder}");
            }
            println!("balance: {} EUR", info.balance);
            println!("status:  {:?}", info.status);
        }
        Command::Transactions { from, to, csv } => {
            let range = date_range(*from, *to)?;
            let transactions = client.get_transactions(&session, range)?;
            match csv {
                Some(path) => {
                    csv_export::write_transactions_csv(path, &transactions)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("{} transactions written to {}", transactions.len(), path.display());
                }
                None => {
                    for t in &transactions {
                        println!(
                            "{}  {:>8}  {}  {}",
                            t.timestamp.format("%d.%m.%Y %H:%M"),
                            t.amount,
                            t.location,
                            t.kind
                        );
                    }
                }
            }
        }
        Command::Positions { from, to } => {
            let range = date_range(*from, *to)?;
            for p in client.get_transaction_positions(&session, range)? {
                println!(
                    "{}/{}  {:>2} x {:>6}  {:>8}  {}",
                    p.transaction_id, p.position, p.quantity, p.unit_price, p.total_price, p.name
                );
            }
        }
        Command::Texts { .. } => unreachable!("handled before login"),
    }
    Ok(())
}
