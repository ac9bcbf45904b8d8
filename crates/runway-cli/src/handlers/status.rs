//! `status` and `runners` command handlers.

use anyhow::Result;

use crate::client::GatewayClient;

pub async fn status(client: &GatewayClient) -> Result<()> {
    let status = client.status().await?;
    match &status.active {
        Some(name) => {
            println!("Active runner: {name}");
            println!("Healthy:       {}", status.healthy);
            if let Some(url) = &status.base_url {
                println!("Base URL:      {url}");
            }
            if let Some(model) = &status.current_model {
                println!("Model:         {model}");
            }
        }
        None => println!("No active runner (degraded)"),
    }
    if let Some(at) = status.last_health_check {
        println!("Last check:    {}", at.to_rfc3339());
    }
    println!("Configured:    {}", status.runners.join(", "));
    Ok(())
}

pub async fn runners(client: &GatewayClient) -> Result<()> {
    let list = client.runners().await?;
    if list.runners.is_empty() {
        println!("No runners configured");
        return Ok(());
    }
    println!("{:<2} {:<24} {:<14} {:<32} MODEL", "", "NAME", "KIND", "BASE URL");
    for runner in &list.runners {
        println!(
            "{:<2} {:<24} {:<14} {:<32} {}",
            if runner.active { "*" } else { "" },
            runner.name,
            runner.kind.as_str(),
            runner.base_url,
            runner.current_model.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
