//! The actual robot actuation call is out of scope -- concrete robot
//! actuation is an external collaborator the core dispatches
//! to via an injected interface); this is the default injected dispatcher
//! and the `CommandHandler` that normalizes and forwards to it.

use async_trait::async_trait;
use edge_common::{command::CommandProcessor, Message};

/// The contract the worker pool dispatches normalized commands to. A real
/// deployment injects one that talks to the robot fleet; this module only
/// supplies a logging stand-in.
#[async_trait]
pub trait RobotDispatcher: Send + Sync {
    async fn dispatch(&self, robot_id: &str, actions: &[String]) -> bool;
}

/// Logs every dispatch instead of actuating anything. Used when no real
/// dispatcher is configured, and by tests.
#[derive(Debug, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl RobotDispatcher for LoggingDispatcher {
    async fn dispatch(&self, robot_id: &str, actions: &[String]) -> bool {
        tracing::info!(robot_id, ?actions, "dispatching robot command");
        true
    }
}

/// Normalizes a queued [`Message`]'s payload via [`CommandProcessor`] and
/// forwards `(robot_id, actions)` to the configured [`RobotDispatcher`].
pub struct CommandDispatchHandler<D: RobotDispatcher> {
    processor: CommandProcessor,
    dispatcher: D,
}

impl<D: RobotDispatcher> CommandDispatchHandler<D> {
    pub fn new(dispatcher: D) -> Self {
        Self {
            processor: CommandProcessor,
            dispatcher,
        }
    }
}

#[async_trait]
impl<D: RobotDispatcher> edge_worker::CommandHandler for CommandDispatchHandler<D> {
    #[tracing::instrument(skip_all, fields(message_id = %message.id))]
    async fn handle(&self, message: &Message) -> edge_worker::Result<bool> {
        let (robot_id, actions) = self.processor.extract(&message.payload);

        if actions.is_empty() {
            tracing::warn!(robot_id, "no recognized actions in payload, acking without dispatch");
            return Ok(true);
        }

        Ok(self.dispatcher.dispatch(&robot_id, &actions).await)
    }
}
