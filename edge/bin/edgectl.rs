//! Command-line utility for administering a running edge robot command
//! service over its Unix control socket.
//!
//! A clap derive `Cli`/`Subcommand` tree, one socket-path arg, and a
//! `ControlClient` built once and dispatched by matching on the parsed
//! command against `edge-control`'s protocol.

#![allow(clippy::items_after_statements)]

use clap::{Parser, Subcommand};
use edge_common::Priority;
use edge_control::{
    protocol::{CoordinatorCommand, OfflineCommand, QueueCommand, RequestCommand, ResponsePayload, SystemCommand},
    ControlClient, Request, DEFAULT_CONTROL_SOCKET,
};

/// Administer a running edge robot command service
#[derive(Parser, Debug)]
#[command(name = "edgectl")]
#[command(about = "Administer a running edge robot command service", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the control socket
    #[arg(short = 'c', long, default_value = DEFAULT_CONTROL_SOCKET)]
    control_socket: String,

    /// Bearer token, if the server requires authentication
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// System status and health
    System {
        #[command(subcommand)]
        action: SystemAction,
    },
    /// Queue inspection and management
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Coordinator-managed service inspection and control
    Coordinator {
        #[command(subcommand)]
        action: CoordinatorAction,
    },
    /// Offline buffer inspection and control
    Offline {
        #[command(subcommand)]
        action: OfflineAction,
    },
}

#[derive(Subcommand, Debug)]
enum SystemAction {
    /// Check if the service is responding
    Ping,
    /// Get system status and statistics
    Status,
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// Non-destructively inspect the next queued message
    Peek,
    /// Acknowledge successful processing of an in-flight message
    Ack { message_id: String },
    /// Report a failed message
    Nack {
        message_id: String,
        #[arg(long)]
        requeue: bool,
    },
    /// Drop every queued message
    Clear,
    /// Queue size and backend health
    Stats,
    /// Submit a new command payload
    Submit {
        /// Payload as a JSON object, e.g. '{"action_name": "wave"}'
        payload: String,
        #[arg(long, default_value = "normal")]
        priority: String,
        #[arg(long)]
        trace_id: Option<String>,
        #[arg(long)]
        correlation_id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CoordinatorAction {
    /// List every registered service and its state
    List,
    /// Start a specific service
    Start { name: String },
    /// Stop a specific service
    Stop { name: String },
    /// Aggregate health across every registered service
    Health,
}

#[derive(Subcommand, Debug)]
enum OfflineAction {
    /// Force a flush attempt
    Flush,
    /// Entries currently buffered, by status
    Stats,
}

fn parse_priority(s: &str) -> Priority {
    match s.to_ascii_lowercase().as_str() {
        "low" => Priority::Low,
        "high" => Priority::High,
        "urgent" => Priority::Urgent,
        _ => Priority::Normal,
    }
}

#[tokio::main]
async fn main() -> edge_control::Result<()> {
    let cli = Cli::parse();
    let client = ControlClient::new(&cli.control_socket);

    let command = match cli.command {
        Commands::System { action } => RequestCommand::System(match action {
            SystemAction::Ping => SystemCommand::Ping,
            SystemAction::Status => SystemCommand::Status,
        }),
        Commands::Queue { action } => RequestCommand::Queue(match action {
            QueueAction::Peek => QueueCommand::Peek,
            QueueAction::Ack { message_id } => QueueCommand::Ack { message_id },
            QueueAction::Nack { message_id, requeue } => QueueCommand::Nack { message_id, requeue },
            QueueAction::Clear => QueueCommand::Clear,
            QueueAction::Stats => QueueCommand::Stats,
            QueueAction::Submit { payload, priority, trace_id, correlation_id } => {
                let payload = serde_json::from_str(&payload).unwrap_or_else(|err| {
                    eprintln!("error: invalid payload JSON: {err}");
                    std::process::exit(1);
                });
                QueueCommand::Submit {
                    payload,
                    priority: parse_priority(&priority),
                    trace_id,
                    correlation_id,
                }
            }
        }),
        Commands::Coordinator { action } => RequestCommand::Coordinator(match action {
            CoordinatorAction::List => CoordinatorCommand::ListServices,
            CoordinatorAction::Start { name } => CoordinatorCommand::StartService { name },
            CoordinatorAction::Stop { name } => CoordinatorCommand::StopService { name },
            CoordinatorAction::Health => CoordinatorCommand::HealthCheck,
        }),
        Commands::Offline { action } => RequestCommand::Offline(match action {
            OfflineAction::Flush => OfflineCommand::Flush,
            OfflineAction::Stats => OfflineCommand::Stats,
        }),
    };

    let mut request = Request::new(command);
    if let Some(token) = cli.token {
        request = request.with_token(token);
    }

    let response = client.send_request(request).await?;
    match response.payload {
        ResponsePayload::Ok => println!("ok"),
        ResponsePayload::Data(data) => println!("{data:#?}"),
        ResponsePayload::Error(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }

    Ok(())
}
