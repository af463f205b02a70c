//! Inspect and seed the alias table

use std::path::Path;
use svcctl::{AliasStore, ServiceControl};

pub async fn aliases_list(control: &ServiceControl) -> Result<(), Box<dyn std::error::Error>> {
    let table = control.aliases().snapshot();
    if table.is_empty() {
        println!("No learned aliases");
        return Ok(());
    }

    for (keyword, names) in &table {
        println!("{:<20} {}", keyword, names.join(", "));
    }
    println!();
    println!("{} keywords", table.len());
    Ok(())
}

/// Merge a JSON alias table into the store and persist it
pub async fn aliases_import(control: &ServiceControl, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let table = AliasStore::load(file).await?;
    let count = table.len();

    control.aliases().import(table);
    control.aliases().flush().await?;

    println!("Imported {} keywords from {}", count, file.display());
    Ok(())
}
