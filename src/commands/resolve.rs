//! Name resolution and lookup

use svcctl::ServiceControl;

pub async fn resolve(control: &ServiceControl, keyword: &str) -> Result<(), Box<dyn std::error::Error>> {
    let name = control.get_service_name(keyword).await?;
    println!("{}", name);
    Ok(())
}

/// Prints "yes"/"no"; never fails on an unknown keyword
pub async fn exists(control: &ServiceControl, keyword: &str) -> Result<(), Box<dyn std::error::Error>> {
    let found = control.is_exist(keyword).await;
    println!("{}", if found { "yes" } else { "no" });
    Ok(())
}

pub async fn path(control: &ServiceControl, keyword: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = control.service_path(keyword).await?;
    println!("{}", path.display());
    Ok(())
}

pub async fn manager(control: &ServiceControl) -> Result<(), Box<dyn std::error::Error>> {
    let mgr = control.manager()?;
    let priority: Vec<String> = control
        .registry()
        .priority()
        .iter()
        .map(|k| k.to_string())
        .collect();

    println!("● {} ({})", mgr.kind(), mgr.name());
    println!("   Priority: {}", priority.join(", "));
    match control.aliases().path() {
        Some(path) => println!("    Aliases: {}", path.display()),
        None => println!("    Aliases: (in memory)"),
    }
    Ok(())
}
