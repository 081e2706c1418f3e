//! Normalizes the heterogeneous payload shapes producers submit into a
//! `(robot_id, actions[])` pair ready for dispatch.
//!
//! Five shapes are recognized, tried in the order below; the first shape
//! whose required keys are present wins.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

/// The closed vocabulary of actions a dispatcher understands. Anything not
/// in this set is dropped by [`CommandProcessor::extract_actions`] with a
/// warning, never propagated as an error.
pub const ACTIONS: &[&str] = &[
    "back_fast",
    "bow",
    "chest",
    "dance_eight",
    "dance_five",
    "dance_four",
    "dance_nine",
    "dance_seven",
    "dance_six",
    "dance_ten",
    "dance_three",
    "dance_two",
    "go_forward",
    "kung_fu",
    "left_kick",
    "left_move_fast",
    "left_shot_fast",
    "left_uppercut",
    "push_ups",
    "right_kick",
    "right_move_fast",
    "right_shot_fast",
    "right_uppercut",
    "sit_ups",
    "squat",
    "squat_up",
    "stand",
    "stand_up_back",
    "stand_up_front",
    "stepping",
    "stop",
    "turn_left",
    "turn_right",
    "twist",
    "wave",
    "weightlifting",
    "wing_chun",
];

/// `wait` is a valid scheduling directive but not an actuation action.
/// It passes through untouched when every other action in the same list
/// is recognized; once any other action in the list is invalid, `wait` is
/// dropped along with it rather than surviving on its own.
const PASSTHROUGH: &str = "wait";

const DEFAULT_ROBOT_ID: &str = "default";

/// Normalizes a raw JSON payload into `(robot_id, actions)`.
///
/// Never fails: an unrecognized shape, or a shape with zero valid actions
/// after filtering, yields `(robot_id, vec![])` -- an invalid payload
/// shape dispatches successfully with zero actions rather than erroring.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandProcessor;

impl CommandProcessor {
    #[must_use]
    pub fn extract(&self, payload: &HashMap<String, Value>) -> (String, Vec<String>) {
        let robot_id = Self::extract_robot_id(payload);
        let actions = Self::extract_actions(payload);
        (robot_id, actions)
    }

    fn extract_robot_id(payload: &HashMap<String, Value>) -> String {
        if let Some(id) = payload.get("robot_id").and_then(Value::as_str) {
            return id.to_string();
        }

        if let Some(id) = payload
            .get("command")
            .and_then(|c| c.get("target"))
            .and_then(|t| t.get("robot_id"))
            .and_then(Value::as_str)
        {
            return id.to_string();
        }

        DEFAULT_ROBOT_ID.to_string()
    }

    fn extract_actions(payload: &HashMap<String, Value>) -> Vec<String> {
        // Shape 1: {actions: [string | {action_name|command}], ...}
        if let Some(Value::Array(items)) = payload.get("actions") {
            return Self::filter(items.iter().filter_map(Self::action_from_value));
        }

        // Shape 2: {action_name: string, ...}
        if let Some(name) = payload.get("action_name").and_then(Value::as_str) {
            return Self::filter(std::iter::once(name.to_string()));
        }

        // Shape 3: {command: {target, params: {action_name | actions}}}
        if let Some(command) = payload.get("command") {
            if let Some(params) = command.get("params") {
                if let Some(name) = params.get("action_name").and_then(Value::as_str) {
                    return Self::filter(std::iter::once(name.to_string()));
                }
                if let Some(Value::Array(items)) = params.get("actions") {
                    return Self::filter(items.iter().filter_map(Self::action_from_value));
                }
            }
        }

        // Shape 4: {base_commands: [{command: string}, ...]}
        if let Some(Value::Array(items)) = payload.get("base_commands") {
            let names = items.iter().filter_map(|item| {
                let cmd = item.get("command").and_then(Value::as_str)?;
                if cmd == "wait" || cmd == "advanced_command" {
                    None
                } else {
                    Some(cmd.to_string())
                }
            });
            return Self::filter(names);
        }

        // Shape 5: {toolName: string} -- legacy, single action.
        if let Some(name) = payload.get("toolName").and_then(Value::as_str) {
            return Self::filter(std::iter::once(name.to_string()));
        }

        warn!("payload matched none of the recognized shapes");
        Vec::new()
    }

    fn action_from_value(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("action_name")
                .or_else(|| map.get("command"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    /// Mirrors the two-pass validation this is grounded on: first collect
    /// the genuinely invalid actions (anything not in [`ACTIONS`], except
    /// `wait`); if there are none, the list passes through unchanged
    /// (`wait` included). If there are any, drop them along with `wait`,
    /// keeping only recognized actuation actions.
    fn filter(actions: impl Iterator<Item = String>) -> Vec<String> {
        let actions: Vec<String> = actions.collect();
        let invalid: Vec<&str> = actions
            .iter()
            .map(String::as_str)
            .filter(|action| *action != PASSTHROUGH && !ACTIONS.contains(action))
            .collect();

        if invalid.is_empty() {
            return actions;
        }

        warn!(?invalid, "dropping unrecognized actions");
        actions
            .into_iter()
            .filter(|action| ACTIONS.contains(&action.as_str()))
            .collect()
    }
}
