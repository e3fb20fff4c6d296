//! Console host: start every unit, then take commands from stdin
//!
//! Ctrl-C, `quit`, end of input or a read error stops all services and exits.

use std::path::Path;

use svcd::console::{self, Request, Response};
use svcd::coordinator::{AggregateReport, ServiceCoordinator};
use svcd::units::{self, CommandUnit};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

pub async fn run(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let units = units::load_dir(dir).await?;
    if units.is_empty() {
        log::warn!("No unit files found in {}", dir.display());
    }

    let mut coordinator = ServiceCoordinator::new(
        |c| log::info!("{} services started", c.len()),
        |c| log::info!("{} services stopped", c.len()),
        |fault| log::error!("{}", fault),
    );
    coordinator.register_services(units.into_iter().map(CommandUnit::into_factory))?;

    // Service actions block on child processes
    let report = tokio::task::block_in_place(|| coordinator.start());
    print_lines(&console::render(&Response::Report(report)));

    let report = serve(&coordinator, BufReader::new(tokio::io::stdin())).await;
    print_lines(&console::render(&Response::Report(report)));
    Ok(())
}

/// Execute console lines from `input` until told to quit, then stop every service
async fn serve<R>(coordinator: &ServiceCoordinator, input: R) -> AggregateReport
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        log::error!("Failed to read console input: {}", e);
                        break;
                    }
                };

                let request = match Request::parse(&line) {
                    Ok(Some(request)) => request,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("error: {}", e);
                        continue;
                    }
                };

                let response =
                    tokio::task::block_in_place(|| console::execute(coordinator, request));
                if response == Response::Quit {
                    break;
                }
                print_lines(&console::render(&response));
            }
        }
    }

    tokio::task::block_in_place(|| coordinator.stop())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcd::coordinator::{from_fn, ServiceHandle};
    use svcd::ServiceState;

    fn started_coordinator() -> ServiceCoordinator {
        let mut coordinator = ServiceCoordinator::default();
        coordinator
            .register_services(vec![
                ServiceHandle::<()>::builder("web", from_fn(|_| Ok(()))).into_factory(),
                ServiceHandle::<()>::builder("db", from_fn(|_| Ok(()))).into_factory(),
            ])
            .unwrap();
        assert!(coordinator.start().is_clean());
        coordinator
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_error_still_stops_services() {
        let coordinator = started_coordinator();
        let input: &[u8] = b"pause web\n\xff\xfe\nresume web\n";

        let report = serve(&coordinator, input).await;

        assert_eq!(report.transitioned, vec!["web", "db"]);
        assert_eq!(coordinator.state("web").unwrap(), ServiceState::Stopped);
        assert_eq!(coordinator.state("db").unwrap(), ServiceState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_quit_stops_services() {
        let coordinator = started_coordinator();
        let input: &[u8] = b"status\nquit\nstop web\n";

        let report = serve(&coordinator, input).await;

        assert!(report.is_clean());
        assert_eq!(report.transitioned, vec!["web", "db"]);
    }
}
