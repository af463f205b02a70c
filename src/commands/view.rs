//! Log and config file viewing

use std::path::Path;
use svcctl::{ConfigOptions, LogOptions, ServiceControl};

pub async fn log(
    control: &ServiceControl,
    path: &Path,
    lines: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let opts = match lines {
        Some(tail_lines) => LogOptions { tail_lines },
        None => LogOptions::default(),
    };
    print!("{}", control.view_log(path, &opts).await?);
    Ok(())
}

pub async fn config(
    control: &ServiceControl,
    path: &Path,
    lines: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let opts = ConfigOptions {
        tail_lines: lines.unwrap_or_default(),
    };
    print!("{}", control.view_config(path, &opts).await?);
    Ok(())
}
