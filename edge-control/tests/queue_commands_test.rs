//! Serialization round-trip tests for queue and coordinator control commands
#![allow(clippy::expect_used, clippy::unwrap_used)]

use edge_control::protocol::{
    CoordinatorCommand, OfflineCommand, OfflineStats, QueueCommand, QueueMessageSummary, QueueStats, Request,
    RequestCommand, Response, ResponseData, ResponsePayload, ServiceSummary,
};

fn roundtrip_request(request: Request) -> Request {
    let bytes = bincode::serde::encode_to_vec(&request, bincode::config::legacy()).expect("encode request");
    bincode::serde::decode_from_slice(&bytes, bincode::config::legacy())
        .expect("decode request")
        .0
}

fn roundtrip_response(response: Response) -> Response {
    let bytes = bincode::serde::encode_to_vec(&response, bincode::config::legacy()).expect("encode response");
    bincode::serde::decode_from_slice(&bytes, bincode::config::legacy())
        .expect("decode response")
        .0
}

#[test]
fn test_queue_peek_roundtrip() {
    let request = Request::new(RequestCommand::Queue(QueueCommand::Peek));
    let decoded = roundtrip_request(request);

    assert!(matches!(
        decoded.command,
        RequestCommand::Queue(QueueCommand::Peek)
    ));
}

#[test]
fn test_queue_ack_roundtrip() {
    let request = Request::new(RequestCommand::Queue(QueueCommand::Ack {
        message_id: "01JCXYZ123ABC".to_string(),
    }));
    let decoded = roundtrip_request(request);

    match decoded.command {
        RequestCommand::Queue(QueueCommand::Ack { message_id }) => {
            assert_eq!(message_id, "01JCXYZ123ABC");
        }
        _ => panic!("Expected QueueCommand::Ack"),
    }
}

#[test]
fn test_queue_nack_roundtrip() {
    let request = Request::new(RequestCommand::Queue(QueueCommand::Nack {
        message_id: "01JCXYZ456DEF".to_string(),
        requeue: true,
    }));
    let decoded = roundtrip_request(request);

    match decoded.command {
        RequestCommand::Queue(QueueCommand::Nack { message_id, requeue }) => {
            assert_eq!(message_id, "01JCXYZ456DEF");
            assert!(requeue);
        }
        _ => panic!("Expected QueueCommand::Nack"),
    }
}

#[test]
fn test_queue_clear_roundtrip() {
    let request = Request::new(RequestCommand::Queue(QueueCommand::Clear));
    let decoded = roundtrip_request(request);

    assert!(matches!(
        decoded.command,
        RequestCommand::Queue(QueueCommand::Clear)
    ));
}

#[test]
fn test_queue_stats_roundtrip() {
    let request = Request::new(RequestCommand::Queue(QueueCommand::Stats));
    let decoded = roundtrip_request(request);

    assert!(matches!(
        decoded.command,
        RequestCommand::Queue(QueueCommand::Stats)
    ));
}

#[test]
fn test_queue_message_response_roundtrip() {
    let response = Response::data(ResponseData::QueueMessage(Some(QueueMessageSummary {
        id: "01JCXYZ123ABC".to_string(),
        priority: "HIGH".to_string(),
        timestamp: "2026-07-29T00:00:00Z".to_string(),
        retry_count: 2,
        trace_id: Some("trace-abc".to_string()),
    })));
    let decoded = roundtrip_response(response);

    match decoded.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::QueueMessage(Some(msg)) => {
                assert_eq!(msg.id, "01JCXYZ123ABC");
                assert_eq!(msg.priority, "HIGH");
                assert_eq!(msg.retry_count, 2);
                assert_eq!(msg.trace_id.as_deref(), Some("trace-abc"));
            }
            _ => panic!("Expected QueueMessage(Some(_))"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[test]
fn test_queue_empty_peek_response_roundtrip() {
    let response = Response::data(ResponseData::QueueMessage(None));
    let decoded = roundtrip_response(response);

    assert!(matches!(
        decoded.payload,
        ResponsePayload::Data(data) if matches!(*data, ResponseData::QueueMessage(None))
    ));
}

#[test]
fn test_queue_stats_response_roundtrip() {
    let response = Response::data(ResponseData::QueueStats(QueueStats {
        size: 17,
        health_status: "degraded".to_string(),
        backend: "amqp".to_string(),
    }));
    let decoded = roundtrip_response(response);

    match decoded.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::QueueStats(stats) => {
                assert_eq!(stats.size, 17);
                assert_eq!(stats.health_status, "degraded");
                assert_eq!(stats.backend, "amqp");
            }
            _ => panic!("Expected QueueStats"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[test]
fn test_coordinator_list_services_roundtrip() {
    let request = Request::new(RequestCommand::Coordinator(CoordinatorCommand::ListServices));
    let decoded = roundtrip_request(request);

    assert!(matches!(
        decoded.command,
        RequestCommand::Coordinator(CoordinatorCommand::ListServices)
    ));
}

#[test]
fn test_coordinator_start_stop_roundtrip() {
    let start = Request::new(RequestCommand::Coordinator(CoordinatorCommand::StartService {
        name: "worker-pool".to_string(),
    }));
    let decoded = roundtrip_request(start);
    match decoded.command {
        RequestCommand::Coordinator(CoordinatorCommand::StartService { name }) => {
            assert_eq!(name, "worker-pool");
        }
        _ => panic!("Expected CoordinatorCommand::StartService"),
    }

    let stop = Request::new(RequestCommand::Coordinator(CoordinatorCommand::StopService {
        name: "worker-pool".to_string(),
    }));
    let decoded = roundtrip_request(stop);
    match decoded.command {
        RequestCommand::Coordinator(CoordinatorCommand::StopService { name }) => {
            assert_eq!(name, "worker-pool");
        }
        _ => panic!("Expected CoordinatorCommand::StopService"),
    }
}

#[test]
fn test_coordinator_service_states_response_roundtrip() {
    let mut services = std::collections::HashMap::new();
    services.insert(
        "worker-pool".to_string(),
        ServiceSummary {
            status: "healthy".to_string(),
            restart_attempts: 1,
            consecutive_failures: 0,
            last_error: None,
        },
    );
    services.insert(
        "offline-buffer".to_string(),
        ServiceSummary {
            status: "error".to_string(),
            restart_attempts: 3,
            consecutive_failures: 3,
            last_error: Some("connection refused".to_string()),
        },
    );

    let response = Response::data(ResponseData::ServiceStates(services));
    let decoded = roundtrip_response(response);

    match decoded.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::ServiceStates(states) => {
                assert_eq!(states.len(), 2);
                let offline = states.get("offline-buffer").unwrap();
                assert_eq!(offline.restart_attempts, 3);
                assert_eq!(offline.last_error.as_deref(), Some("connection refused"));
            }
            _ => panic!("Expected ServiceStates"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[test]
fn test_offline_flush_and_stats_roundtrip() {
    let flush = Request::new(RequestCommand::Offline(OfflineCommand::Flush));
    assert!(matches!(
        roundtrip_request(flush).command,
        RequestCommand::Offline(OfflineCommand::Flush)
    ));

    let stats_request = Request::new(RequestCommand::Offline(OfflineCommand::Stats));
    assert!(matches!(
        roundtrip_request(stats_request).command,
        RequestCommand::Offline(OfflineCommand::Stats)
    ));

    let stats_response = Response::data(ResponseData::OfflineStats(OfflineStats {
        pending: 4,
        failed: 1,
    }));
    let decoded = roundtrip_response(stats_response);
    match decoded.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::OfflineStats(stats) => {
                assert_eq!(stats.pending, 4);
                assert_eq!(stats.failed, 1);
            }
            _ => panic!("Expected OfflineStats"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[test]
fn test_error_response_roundtrip() {
    let response = Response::error("queue backend unreachable");
    let decoded = roundtrip_response(response);

    assert!(!decoded.is_success());
    match decoded.payload {
        ResponsePayload::Error(message) => assert_eq!(message, "queue backend unreachable"),
        _ => panic!("Expected Error response"),
    }
}

#[test]
fn test_request_with_token_roundtrip() {
    let request = Request::new(RequestCommand::System(edge_control::SystemCommand::Ping)).with_token("abc123");
    let decoded = roundtrip_request(request);

    assert_eq!(decoded.token.as_deref(), Some("abc123"));
}
