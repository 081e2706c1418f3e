//! Integration tests for control socket client/server communication
//!
//! These tests verify the full request/response cycle between the control
//! client and server, including error handling, timeouts, and protocol correctness.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unreachable
)]

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use edge_control::{
    ControlAuthConfig, ControlClient, ControlError, ControlServer, Result,
    protocol::{
        CoordinatorCommand, OfflineCommand, OfflineStats, QueueCommand, QueueMessageSummary, QueueStats, Request,
        RequestCommand, Response, ResponseData, ResponsePayload, ServiceSummary, SystemCommand, SystemStatus,
    },
    server::CommandHandler,
};
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Mock command handler for testing
struct MockHandler {
    services: HashMap<String, ServiceSummary>,
}

impl MockHandler {
    fn new() -> Self {
        let mut services = HashMap::new();
        services.insert(
            "worker-pool".to_string(),
            ServiceSummary {
                status: "running".to_string(),
                restart_attempts: 0,
                consecutive_failures: 0,
                last_error: None,
            },
        );

        Self { services }
    }
}

#[async_trait]
impl CommandHandler for MockHandler {
    async fn handle_request(&self, request: Request) -> Result<Response> {
        match request.command {
            RequestCommand::System(cmd) => match cmd {
                SystemCommand::Ping => Ok(Response::ok()),
                SystemCommand::Status => {
                    Ok(Response::data(ResponseData::SystemStatus(SystemStatus {
                        version: "0.0.2".to_string(),
                        uptime_secs: 12345,
                        queue_size: 42,
                        service_count: self.services.len(),
                    })))
                }
            },
            RequestCommand::Queue(cmd) => match cmd {
                QueueCommand::Peek => Ok(Response::data(ResponseData::QueueMessage(Some(QueueMessageSummary {
                    id: "01J00000000000000000000000".to_string(),
                    priority: "NORMAL".to_string(),
                    timestamp: "2026-07-29T00:00:00Z".to_string(),
                    retry_count: 0,
                    trace_id: None,
                })))),
                QueueCommand::Ack { message_id } => Ok(Response::data(ResponseData::Message(format!(
                    "acked {message_id}"
                )))),
                QueueCommand::Nack { message_id, requeue } => Ok(Response::data(ResponseData::Message(format!(
                    "nacked {message_id} requeue={requeue}"
                )))),
                QueueCommand::Clear => Ok(Response::data(ResponseData::Message("cleared".to_string()))),
                QueueCommand::Stats => Ok(Response::data(ResponseData::QueueStats(QueueStats {
                    size: 42,
                    health_status: "healthy".to_string(),
                    backend: "memory".to_string(),
                }))),
            },
            RequestCommand::Coordinator(cmd) => match cmd {
                CoordinatorCommand::ListServices => {
                    Ok(Response::data(ResponseData::ServiceStates(self.services.clone())))
                }
                CoordinatorCommand::StartService { name } => {
                    Ok(Response::data(ResponseData::Message(format!("started {name}"))))
                }
                CoordinatorCommand::StopService { name } => {
                    Ok(Response::data(ResponseData::Message(format!("stopped {name}"))))
                }
                CoordinatorCommand::HealthCheck => {
                    Ok(Response::data(ResponseData::CoordinatorHealth("healthy".to_string())))
                }
            },
            RequestCommand::Offline(cmd) => match cmd {
                OfflineCommand::Flush => Ok(Response::data(ResponseData::Message("flushed".to_string()))),
                OfflineCommand::Stats => Ok(Response::data(ResponseData::OfflineStats(OfflineStats {
                    pending: 0,
                    failed: 0,
                }))),
            },
        }
    }
}

/// Helper to start a test control server
async fn start_test_server(
    socket_path: &str,
    handler: Arc<dyn CommandHandler>,
) -> (
    tokio::task::JoinHandle<()>,
    broadcast::Sender<edge_common::Signal>,
) {
    let server = ControlServer::new(socket_path, handler).expect("Failed to create server");
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.serve(shutdown_rx).await {
            eprintln!("Server error: {e}");
        }
    });

    // Give server time to bind
    tokio::time::sleep(Duration::from_millis(100)).await;

    (server_handle, shutdown_tx)
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_queue_peek() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::Queue(QueueCommand::Peek));
    let response = client.send_request(request).await.unwrap();

    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::QueueMessage(Some(msg)) => {
                assert_eq!(msg.priority, "NORMAL");
                assert_eq!(msg.retry_count, 0);
            }
            _ => panic!("Expected QueueMessage response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_queue_nack_with_requeue() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::Queue(QueueCommand::Nack {
        message_id: "abc123".to_string(),
        requeue: true,
    }));
    let response = client.send_request(request).await.unwrap();

    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::Message(msg) => {
                assert_eq!(msg, "nacked abc123 requeue=true");
            }
            _ => panic!("Expected Message response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_coordinator_list_services() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::Coordinator(CoordinatorCommand::ListServices));
    let response = client.send_request(request).await.unwrap();

    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::ServiceStates(services) => {
                assert!(services.contains_key("worker-pool"));
                assert_eq!(services.get("worker-pool").unwrap().status, "running");
            }
            _ => panic!("Expected ServiceStates response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_coordinator_start_stop_service() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);

    let request = Request::new(RequestCommand::Coordinator(CoordinatorCommand::StartService {
        name: "worker-pool".to_string(),
    }));
    let response = client.send_request(request).await.unwrap();
    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::Message(msg) => assert_eq!(msg, "started worker-pool"),
            _ => panic!("Expected Message response"),
        },
        _ => panic!("Expected Data response"),
    }

    let request = Request::new(RequestCommand::Coordinator(CoordinatorCommand::StopService {
        name: "worker-pool".to_string(),
    }));
    let response = client.send_request(request).await.unwrap();
    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::Message(msg) => assert_eq!(msg, "stopped worker-pool"),
            _ => panic!("Expected Message response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_offline_flush_and_stats() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);

    let request = Request::new(RequestCommand::Offline(OfflineCommand::Flush));
    let response = client.send_request(request).await.unwrap();
    assert!(response.is_success());

    let request = Request::new(RequestCommand::Offline(OfflineCommand::Stats));
    let response = client.send_request(request).await.unwrap();
    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::OfflineStats(stats) => {
                assert_eq!(stats.pending, 0);
                assert_eq!(stats.failed, 0);
            }
            _ => panic!("Expected OfflineStats response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_system_ping() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::System(SystemCommand::Ping));
    let response = client.send_request(request).await.unwrap();

    match response.payload {
        ResponsePayload::Ok => {}
        _ => panic!("Expected Ok response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_system_status() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::System(SystemCommand::Status));
    let response = client.send_request(request).await.unwrap();

    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::SystemStatus(status) => {
                assert_eq!(status.version, "0.0.2");
                assert_eq!(status.uptime_secs, 12345);
                assert_eq!(status.queue_size, 42);
                assert_eq!(status.service_count, 1);
            }
            _ => panic!("Expected SystemStatus response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_socket_not_exist_error() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("nonexistent.sock");
    let socket_str = socket_path.to_str().unwrap();

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::System(SystemCommand::Ping));
    let result = client.send_request(request).await;

    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), ControlError::Io(_)));
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_check_socket_exists() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let client = ControlClient::new(socket_str);
    let result = client.check_socket_exists();
    assert!(result.is_err());
    assert!(matches!(
        result.unwrap_err(),
        ControlError::InvalidSocketPath(_)
    ));

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let result = client.check_socket_exists();
    assert!(result.is_ok());
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_client_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str).with_timeout(Duration::from_millis(50));
    let request = Request::new(RequestCommand::System(SystemCommand::Ping));
    let result = client.send_request(request).await;

    match result {
        Ok(_) | Err(ControlError::Timeout) => {}
        Err(e) => panic!("Unexpected error: {e}"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_graceful_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (server_handle, shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::System(SystemCommand::Ping));
    let response = client.send_request(request).await.unwrap();
    assert!(matches!(response.payload, ResponsePayload::Ok));

    shutdown_tx.send(edge_common::Signal::Shutdown).unwrap();

    tokio::time::timeout(Duration::from_secs(5), server_handle)
        .await
        .expect("Server did not shut down within timeout")
        .expect("Server task panicked");

    assert!(!socket_path.exists());
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_concurrent_requests() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap().to_string();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(&socket_str, handler).await;

    let mut join_handles = vec![];

    for i in 0..10 {
        let socket_str = socket_str.clone();
        let handle = tokio::spawn(async move {
            let client = ControlClient::new(&socket_str);
            let request = if i % 2 == 0 {
                Request::new(RequestCommand::System(SystemCommand::Ping))
            } else {
                Request::new(RequestCommand::Queue(QueueCommand::Stats))
            };
            client.send_request(request).await
        });
        join_handles.push(handle);
    }

    for handle in join_handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_multiple_sequential_requests() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);

    for _ in 0..5 {
        let request = Request::new(RequestCommand::System(SystemCommand::Ping));
        let response = client.send_request(request).await.unwrap();
        assert!(matches!(response.payload, ResponsePayload::Ok));
    }

    let request = Request::new(RequestCommand::Queue(QueueCommand::Peek));
    let response = client.send_request(request).await.unwrap();
    assert!(matches!(response.payload, ResponsePayload::Data(_)));

    let request = Request::new(RequestCommand::System(SystemCommand::Status));
    let response = client.send_request(request).await.unwrap();
    assert!(matches!(response.payload, ResponsePayload::Data(_)));
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_persistent_connection_mode() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str).with_persistent_connection();

    for i in 0..10 {
        let request = if i % 2 == 0 {
            Request::new(RequestCommand::System(SystemCommand::Ping))
        } else {
            Request::new(RequestCommand::Queue(QueueCommand::Peek))
        };
        let response = client.send_request(request).await.unwrap();
        assert!(response.is_success());
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_persistent_connection_reconnect() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap().to_string();

    let handler = Arc::new(MockHandler::new());
    let (server_handle, shutdown_tx) = start_test_server(&socket_str, handler).await;

    let client = ControlClient::new(&socket_str).with_persistent_connection();

    let request = Request::new(RequestCommand::System(SystemCommand::Ping));
    let response = client.send_request(request).await.unwrap();
    assert!(matches!(response.payload, ResponsePayload::Ok));

    shutdown_tx.send(edge_common::Signal::Shutdown).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server_handle)
        .await
        .expect("Server did not shut down within timeout")
        .expect("Server task panicked");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let handler = Arc::new(MockHandler::new());
    let (_server_handle2, _shutdown_tx2) = start_test_server(&socket_str, handler).await;

    let request = Request::new(RequestCommand::System(SystemCommand::Status));
    let response = client.send_request(request).await.unwrap();
    assert!(matches!(response.payload, ResponsePayload::Data(_)));
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_auth_token_required_and_validated() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let auth = ControlAuthConfig {
        enabled: true,
        token_hashes: vec!["0".repeat(64)],
    };
    let server = ControlServer::new(socket_str, handler).unwrap().with_auth(auth);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let server_handle = tokio::spawn(async move {
        let _ = server.serve(shutdown_rx).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = ControlClient::new(socket_str);

    let request = Request::new(RequestCommand::System(SystemCommand::Ping));
    let response = client.send_request(request).await.unwrap();
    assert!(!response.is_success(), "request without a token should be rejected");

    let request = Request::new(RequestCommand::System(SystemCommand::Ping)).with_token("wrong-token");
    let response = client.send_request(request).await.unwrap();
    assert!(!response.is_success(), "request with a wrong token should be rejected");

    shutdown_tx.send(edge_common::Signal::Shutdown).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server_handle)
        .await
        .expect("Server did not shut down within timeout")
        .expect("Server task panicked");
}
