use anyhow::Context;
use clap::{Parser, Subcommand};

use coc_core::{config::Config, models::Resource};
use coc_http::{endpoints, CocClient};

/// Fetch one resource from the Clash of Clans API and print it as JSON.
///
/// Credentials come from `COC_EMAIL` / `COC_PASSWORD` (or `./.env`).
#[derive(Parser, Debug)]
#[command(name = "coc", version, about, long_about = None)]
#[command(after_help = endpoint_help())]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Player profile
    Player { tag: String },
    /// Clan profile
    Clan { tag: String },
    /// Clan member list
    Members { tag: String },
    /// The clan's current war
    War { tag: String },
    /// The clan's war log
    Warlog { tag: String },
    /// The clan's current war league group
    LeagueGroup { tag: String },
    /// One war league war, by war tag
    LeagueWar { tag: String },
}

impl Command {
    async fn run(&self, client: &CocClient) -> anyhow::Result<()> {
        match self {
            Command::Player { tag } => print(client.get_player(tag).await?),
            Command::Clan { tag } => print(client.get_clan(tag).await?),
            Command::Members { tag } => print(client.get_clan_members(tag).await?),
            Command::War { tag } => print(client.get_clan_current_war(tag).await?),
            Command::Warlog { tag } => print(client.get_clan_war_log(tag).await?),
            Command::LeagueGroup { tag } => print(client.get_clan_war_league_group(tag).await?),
            Command::LeagueWar { tag } => print(client.get_clan_war_league_war(tag).await?),
        }
    }
}

fn endpoint_help() -> String {
    let routes = endpoints::catalog()
        .iter()
        .map(|(name, route)| format!("  {name:<28} {route}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Endpoints:\n{routes}")
}

fn print<R: Resource>(resource: R) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&resource.record().to_json())?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    coc_core::logging::init("coc")?;

    let cfg = Config::load().context("loading configuration")?;
    let client = CocClient::connect(cfg).await.context("logging in")?;

    cli.command.run(&client).await
}
