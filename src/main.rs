use clap::Parser;

use gator::app::{shutdown, AppContext, Shutdown};
use gator::cli::{commands, Cli, Commands};
use gator::config::Config;
use gator::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_config_path()?,
    };
    let config = Config::load_from(&config_path)?;
    logging::init(&config.log)?;

    let mut ctx = AppContext::new(config, config_path)?;

    match cli.command {
        Commands::Register { name } => {
            commands::register(&mut ctx, &name)?;
        }
        Commands::Login { name } => {
            commands::login(&mut ctx, &name)?;
        }
        Commands::Users => {
            commands::list_users(&ctx)?;
        }
        Commands::Reset => {
            commands::reset(&mut ctx)?;
        }
        Commands::AddFeed { name, url } => {
            let user = commands::current_user(&ctx)?;
            commands::add_feed(&ctx, &user, &name, &url)?;
        }
        Commands::Feeds => {
            commands::list_feeds(&ctx)?;
        }
        Commands::Follow { url } => {
            let user = commands::current_user(&ctx)?;
            commands::follow(&ctx, &user, &url)?;
        }
        Commands::Following => {
            let user = commands::current_user(&ctx)?;
            commands::following(&ctx, &user)?;
        }
        Commands::Unfollow { url } => {
            let user = commands::current_user(&ctx)?;
            commands::unfollow(&ctx, &user, &url)?;
        }
        Commands::Browse { limit } => {
            let user = commands::current_user(&ctx)?;
            commands::browse(&ctx, &user, limit)?;
        }
        Commands::Scrape => {
            commands::scrape(&ctx).await?;
        }
        Commands::Agg { time_between_reqs } => {
            let (trigger, signal) = Shutdown::channel();
            shutdown::listen_for_signals(trigger);
            commands::aggregate(&ctx, &time_between_reqs, signal).await?;
        }
    }

    Ok(())
}
