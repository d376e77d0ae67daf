use anyhow::Result;
use clap::Parser;
use colored::*;

mod api_client;
mod auth;
mod output;
mod scenarios;
mod ws_client;

use api_client::ApiClient;
use auth::{login, UserCredentials};
use output::print_test_summary;
use ws_client::Connection;

#[derive(Parser)]
#[command(name = "ws-test-client")]
#[command(about = "WebSocket broadcast integration testing tool")]
struct Cli {
    /// Base URL of the backend (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// User 1 credentials (format: email:password)
    #[arg(long)]
    user1: String,

    /// User 2 credentials (format: email:password)
    #[arg(long)]
    user2: String,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, PartialEq)]
enum ScenarioChoice {
    /// Open both connections without triggering any event
    ConnectionTest,
    /// User 1 creates a location, both users receive it
    LocationCreate,
    /// Create then rename a location
    LocationUpdate,
    /// Create then delete a location
    LocationDelete,
    /// Run every scenario in order
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let user1_creds = UserCredentials::parse(&cli.user1)?;
    let user2_creds = UserCredentials::parse(&cli.user2)?;

    println!("{} Authenticating users...", "→".blue());
    let client = reqwest::Client::new();
    let user1 = login(&client, &cli.base_url, &user1_creds).await?;
    let user2 = login(&client, &cli.base_url, &user2_creds).await?;

    println!("{} User 1 authenticated (ID: {})", "✓".green(), user1.user_id);
    println!("{} User 2 authenticated (ID: {})", "✓".green(), user2.user_id);

    println!("\n{} Establishing WebSocket connections...", "→".blue());
    let mut ws1 = Connection::establish(&cli.base_url, &user1.token, "User 1".to_string()).await?;
    let mut ws2 = Connection::establish(&cli.base_url, &user2.token, "User 2".to_string()).await?;

    println!("{} User 1 WebSocket connection established", "✓".green());
    println!("{} User 2 WebSocket connection established", "✓".green());

    let api_client = ApiClient::new(client, cli.base_url.clone());

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    if matches!(cli.scenario, ScenarioChoice::ConnectionTest | ScenarioChoice::All) {
        results.push(scenarios::test_connection(&user1, &user2, &mut ws1, &mut ws2).await?);
    }

    if cli.scenario != ScenarioChoice::ConnectionTest {
        let (created, location_id) =
            scenarios::test_location_create(&user1, &api_client, &mut ws1, &mut ws2).await?;
        let create_passed = created.passed;
        if matches!(cli.scenario, ScenarioChoice::LocationCreate | ScenarioChoice::All) {
            results.push(created);
        } else if !create_passed {
            println!("{} Location setup failed, aborting", "✗".red());
            results.push(created);
        }

        if let (true, Some(location_id)) = (create_passed, location_id) {
            if matches!(cli.scenario, ScenarioChoice::LocationUpdate | ScenarioChoice::All) {
                results.push(
                    scenarios::test_location_update(
                        &user1,
                        &location_id,
                        &api_client,
                        &mut ws1,
                        &mut ws2,
                    )
                    .await?,
                );
            }
            if matches!(cli.scenario, ScenarioChoice::LocationDelete | ScenarioChoice::All) {
                results.push(
                    scenarios::test_location_delete(
                        &user1,
                        &location_id,
                        &api_client,
                        &mut ws1,
                        &mut ws2,
                    )
                    .await?,
                );
            }
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
