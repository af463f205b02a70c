//! Show service status

use svcctl::ServiceControl;

pub async fn status(
    control: &ServiceControl,
    keyword: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = control.get_service_name(keyword).await?;
    let status = control.status(keyword).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let symbol = if status.is_active { "●" } else { "○" };
    println!("{} {}", symbol, name);
    println!(
        "     Active: {}",
        if status.is_active { "active" } else { "inactive" }
    );
    println!(
        "    Enabled: {}",
        if status.is_enabled { "enabled" } else { "disabled" }
    );

    let output = status.output.trim_end();
    if !output.is_empty() {
        println!();
        println!("{}", output);
    }
    Ok(())
}

pub async fn is_active(control: &ServiceControl, keyword: &str) -> Result<(), Box<dyn std::error::Error>> {
    let active = control.is_active(keyword).await;
    println!("{}", if active { "active" } else { "inactive" });
    Ok(())
}

pub async fn is_enabled(control: &ServiceControl, keyword: &str) -> Result<(), Box<dyn std::error::Error>> {
    let enabled = control.is_enabled(keyword).await;
    println!("{}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}
