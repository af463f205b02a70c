//! Start, stop and friends

use std::path::PathBuf;
use svcctl::{SafeRestart, ServiceControl};

/// Any verb: the built-in ones and whatever else the init tool accepts
pub async fn action(
    control: &ServiceControl,
    verb: &str,
    keyword: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = control.custom_action(verb, keyword).await?;

    println!("● {}", result.message);
    let output = result.output.trim_end();
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

pub async fn safe_restart(
    control: &ServiceControl,
    keyword: &str,
    config_paths: Vec<PathBuf>,
    check: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let check = match check {
        Some(line) => Some(shlex::split(&line).ok_or("unbalanced quotes in --check")?),
        None => None,
    };
    let opts = SafeRestart {
        config_paths,
        check,
    };

    control.safe_restart(keyword, &opts).await?;
    println!("● {} - restarted and active", keyword);
    Ok(())
}
