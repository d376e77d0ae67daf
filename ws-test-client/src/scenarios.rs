use crate::api_client::ApiClient;
use crate::auth::AuthenticatedUser;
use crate::output::TestResult;
use crate::ws_client::Connection;
use anyhow::{Context, Result};
use colored::*;
use serde_json::Value;
use std::time::{Duration, Instant};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Both users are connected; nothing is broadcast yet.
pub async fn test_connection(
    user1: &AuthenticatedUser,
    user2: &AuthenticatedUser,
    ws1: &mut Connection,
    ws2: &mut Connection,
) -> Result<TestResult> {
    let scenario = "connection_test";
    println!("\n{} {}", "Running".bright_white(), scenario);
    let start = Instant::now();

    println!(
        "{} {} ({}) and {} ({}) are connected",
        "✓".green(),
        ws1.user_label,
        user1.role,
        ws2.user_label,
        user2.role
    );

    Ok(TestResult::pass(scenario, start.elapsed()))
}

/// User 1 creates a location; every open connection hears about it.
pub async fn test_location_create(
    user1: &AuthenticatedUser,
    api_client: &ApiClient,
    ws1: &mut Connection,
    ws2: &mut Connection,
) -> Result<(TestResult, Option<String>)> {
    let scenario = "location_create";
    println!("\n{} {}", "Running".bright_white(), scenario);
    let start = Instant::now();

    let location = api_client
        .create_location(&user1.token, 1003, "Lausanne")
        .await?;
    let location_id = location["id"]
        .as_str()
        .context("No location ID in response")?
        .to_string();
    println!("{} Location created (ID: {})", "→".blue(), location_id);

    let outcome = expect_on_both(ws1, ws2, "location_created", |data| {
        data["location"]["id"] == Value::String(location_id.clone())
            && data["owner_id"] == Value::String(user1.user_id.clone())
    })
    .await;

    Ok((into_result(scenario, start, outcome), Some(location_id)))
}

pub async fn test_location_update(
    user1: &AuthenticatedUser,
    location_id: &str,
    api_client: &ApiClient,
    ws1: &mut Connection,
    ws2: &mut Connection,
) -> Result<TestResult> {
    let scenario = "location_update";
    println!("\n{} {}", "Running".bright_white(), scenario);
    let start = Instant::now();

    api_client
        .update_location(&user1.token, location_id, "Lausanne-Ouchy")
        .await?;
    println!("{} Location {} renamed", "→".blue(), location_id);

    let outcome = expect_on_both(ws1, ws2, "location_updated", |data| {
        data["location"]["city"] == "Lausanne-Ouchy"
    })
    .await;

    Ok(into_result(scenario, start, outcome))
}

pub async fn test_location_delete(
    user1: &AuthenticatedUser,
    location_id: &str,
    api_client: &ApiClient,
    ws1: &mut Connection,
    ws2: &mut Connection,
) -> Result<TestResult> {
    let scenario = "location_delete";
    println!("\n{} {}", "Running".bright_white(), scenario);
    let start = Instant::now();

    api_client.delete_location(&user1.token, location_id).await?;
    println!("{} Location {} deleted", "→".blue(), location_id);

    let outcome = expect_on_both(ws1, ws2, "location_deleted", |data| {
        data["location_id"] == location_id
    })
    .await;

    Ok(into_result(scenario, start, outcome))
}

async fn expect_on_both<F>(
    ws1: &mut Connection,
    ws2: &mut Connection,
    kind: &str,
    matches: F,
) -> Result<()>
where
    F: Fn(&Value) -> bool,
{
    for connection in [ws1, ws2] {
        let event = connection.wait_for_event(kind, EVENT_TIMEOUT).await?;
        if !matches(&event.data) {
            anyhow::bail!(
                "{} received {} with unexpected data: {}",
                connection.user_label,
                kind,
                event.data
            );
        }
        println!("{} {} received {}", "✓".green(), connection.user_label, kind);
    }
    Ok(())
}

fn into_result(scenario: &str, start: Instant, outcome: Result<()>) -> TestResult {
    match outcome {
        Ok(()) => TestResult::pass(scenario, start.elapsed()),
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            TestResult::fail(scenario, start.elapsed(), e.to_string())
        }
    }
}
