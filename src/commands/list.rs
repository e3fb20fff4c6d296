//! List unit files

use std::path::Path;

pub async fn list(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.exists() {
        println!("No unit directory at {}", dir.display());
        return Ok(());
    }

    println!("{:<24} DESCRIPTION", "SERVICE");

    let mut count = 0;
    for path in svcd::units::unit_files(dir).await? {
        match svcd::units::load_unit(&path).await {
            Ok(unit) => {
                println!(
                    "{:<24} {}",
                    unit.name,
                    unit.description.as_deref().unwrap_or("")
                );
                count += 1;
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
            }
        }
    }

    println!("\n{} unit files in {}", count, dir.display());
    Ok(())
}
