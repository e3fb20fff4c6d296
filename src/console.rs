//! Console protocol for the interactive host
//!
//! One request per input line, e.g. `start`, `stop web`, `status`.

use crate::coordinator::{
    AggregateReport, Command, ServiceCoordinator, ServiceError, ServiceInfo, ServiceState,
};

/// Request parsed from a console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Lifecycle command for every service, or one service by name
    Lifecycle {
        command: Command,
        name: Option<String>,
    },
    /// Restart one service
    Restart { name: String },
    /// Status of every service, or one service by name
    Status { name: Option<String> },
    /// Print available commands
    Help,
    /// Stop everything and exit
    Quit,
}

impl Request {
    /// Parse a console line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let words = shlex::split(line).ok_or_else(|| format!("Invalid quoting: {}", line))?;
        let mut words = words.into_iter();

        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let name = words.next();
        if let Some(extra) = words.next() {
            return Err(format!("Unexpected argument: {}", extra));
        }

        let request = match verb.to_lowercase().as_str() {
            "restart" => Request::Restart {
                name: name.ok_or("restart requires a service name")?,
            },
            "status" | "list" => Request::Status { name },
            "help" | "?" => Request::Help,
            "quit" | "exit" => Request::Quit,
            other => match Command::parse(other) {
                Some(command) => Request::Lifecycle { command, name },
                None => return Err(format!("Unknown command: {}", verb)),
            },
        };

        Ok(Some(request))
    }
}

/// Outcome of a console request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Targeted command succeeded
    Ok,
    /// Aggregate command finished
    Report(AggregateReport),
    /// Service status lines
    Status(Vec<ServiceInfo>),
    /// Help text
    Help(&'static str),
    /// Error with message
    Error(String),
    /// Host should shut down
    Quit,
}

pub const HELP: &str = "\
start|stop|pause|continue [NAME]   apply to all services or one
restart NAME                       stop then start one service
status [NAME]                      show service state
quit                               stop all services and exit";

/// Execute a request against the coordinator
pub fn execute(coordinator: &ServiceCoordinator, request: Request) -> Response {
    let result: Result<Response, ServiceError> = match request {
        Request::Lifecycle { command, name } => coordinator
            .apply(command, name.as_deref())
            .map(|report| report.map_or(Response::Ok, Response::Report)),
        Request::Restart { name } => coordinator.restart_service(&name).map(|()| Response::Ok),
        Request::Status { name: Some(name) } => coordinator
            .status(&name)
            .map(|info| Response::Status(vec![info])),
        Request::Status { name: None } => Ok(Response::Status(coordinator.services())),
        Request::Help => Ok(Response::Help(HELP)),
        Request::Quit => Ok(Response::Quit),
    };

    result.unwrap_or_else(|e| Response::Error(e.to_string()))
}

/// Format a status line like `● web - Web frontend (started)`
pub fn status_line(info: &ServiceInfo) -> String {
    let symbol = match info.state {
        ServiceState::Started => "●",
        ServiceState::Paused => "◐",
        ServiceState::Stopped => "○",
    };
    format!(
        "{} {} - {} ({})",
        symbol,
        info.name,
        info.description.as_deref().unwrap_or("(no description)"),
        info.state
    )
}

/// Render a response as console output lines
pub fn render(response: &Response) -> Vec<String> {
    match response {
        Response::Ok => vec!["ok".to_string()],
        Response::Report(report) => {
            let mut lines = vec![format!(
                "{}: {} ok, {} failed",
                report.command,
                report.transitioned.len(),
                report.faulted.len()
            )];
            lines.extend(report.faulted.iter().map(|name| format!("  × {}", name)));
            lines
        }
        Response::Status(services) => services.iter().map(status_line).collect(),
        Response::Help(text) => text.lines().map(str::to_string).collect(),
        Response::Error(message) => vec![format!("error: {}", message)],
        Response::Quit => Vec::new(),
    }
}
