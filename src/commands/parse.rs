//! Parse a unit file and display the service it describes

use std::path::Path;

pub async fn parse(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let unit = svcd::units::load_unit(path).await?;

    println!("Service: {}", unit.name);
    if let Some(ref desc) = unit.description {
        println!("Description: {}", desc);
    }

    let commands = [
        ("ExecStart", &unit.exec_start),
        ("ExecStop", &unit.exec_stop),
        ("ExecPause", &unit.exec_pause),
        ("ExecContinue", &unit.exec_continue),
    ];
    for (key, value) in commands {
        match value {
            Some(cmd) => println!("{}: {}", key, cmd),
            None => println!("{}: (default)", key),
        }
    }

    let timeout = unit.timeout_stop.unwrap_or(svcd::units::DEFAULT_TIMEOUT_STOP);
    println!("TimeoutStopSec: {:?}", timeout);

    if !unit.environment.is_empty() {
        println!("Environment:");
        for (key, value) in &unit.environment {
            println!("  {}={}", key, value);
        }
    }

    Ok(())
}
