mod cli;
mod commands;

use anon_config::Config;
use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = Some(data_dir);
    }

    match cli.command {
        cli::Commands::Serve {
            host,
            port,
            public_url,
        } => commands::serve::handle(config, host, port, public_url).await,
        cli::Commands::Register {
            url,
            branch,
            terms,
            id,
            strip_links,
            strip_images,
            no_whole_url,
            no_word_boundary,
        } => {
            let options = anon_core::RedactionOptions {
                link: !strip_links,
                image: !strip_images,
                whole_url: !no_whole_url,
                word_boundary: !no_word_boundary,
            };
            commands::register::handle(&config, url, branch, terms, id, options).await
        }
        cli::Commands::Invalidate { id } => commands::invalidate::handle(&config, id).await,
        cli::Commands::List => commands::register::list(&config).await,
    }
}
