//! Mailer
//!
//! Renders a template and sends it with the configured transport, or checks
//! that the transport is reachable.

use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::Environment;
use eyre::Result;
use mail::Mailer;
use tracing::info;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();
    let config = cli.mail_config()?;

    let mailer = Mailer::new(config, environment)?;
    if let Some(setup) = mailer.init().await? {
        info!(transport = setup.name, "Mail transport ready");
    }

    match cli.command {
        Commands::Send {
            template,
            to,
            from,
            subject,
            locals,
        } => {
            let request = cli::send_request(template, to, from, subject, &locals)?;
            let result = mailer.send(request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Verify => {
            let verification = mailer.verify().await;
            println!("{}", serde_json::to_string_pretty(&verification)?);
            if !verification.verified {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
