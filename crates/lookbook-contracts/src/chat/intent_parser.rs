use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, CATEGORY_COMMANDS, ID_LIST_COMMANDS, MULTI_PATH_COMMANDS, NO_ARG_COMMANDS,
    RAW_TEXT_COMMANDS, SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: Value) -> Self {
        self.command_args.insert(key.to_string(), value);
        self
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = split_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

fn string_list(values: Vec<String>) -> Value {
    Value::Array(values.into_iter().map(Value::String).collect())
}

fn parse_category_args(action: &str, raw: &str, arg: &str) -> Intent {
    let parts = split_args(arg);
    let category = parts.first().cloned().unwrap_or_default();
    let intent = Intent::new(action, raw).with_arg("category", Value::String(category));
    if action != "remove_image" {
        return intent;
    }
    let index = parts
        .get(1)
        .and_then(|value| value.parse::<u64>().ok())
        .map(|value| Value::Number(value.into()))
        .unwrap_or(Value::Null);
    intent.with_arg("index", index)
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return Intent::new("unknown", text)
            .with_arg("command", Value::String(String::new()))
            .with_arg("arg", Value::String(raw_trimmed.to_string()));
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(action) = find_action(&command, MULTI_PATH_COMMANDS) {
        return Intent::new(action, text).with_arg("paths", string_list(split_args(arg)));
    }

    if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
        return Intent::new(action, text)
            .with_arg("path", Value::String(parse_single_path_arg(arg)));
    }

    if let Some(action) = find_action(&command, RAW_TEXT_COMMANDS) {
        return Intent::new(action, text).with_arg("text", Value::String(arg.to_string()));
    }

    if let Some(action) = find_action(&command, ID_LIST_COMMANDS) {
        let ids = arg
            .replace(',', " ")
            .split_whitespace()
            .map(str::to_string)
            .collect::<Vec<_>>();
        return Intent::new(action, text).with_arg("ids", string_list(ids));
    }

    if let Some(action) = find_action(&command, CATEGORY_COMMANDS) {
        return parse_category_args(action, text, arg);
    }

    if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
        return Intent::new(action, text);
    }

    Intent::new("unknown", text)
        .with_arg("command", Value::String(command))
        .with_arg("arg", Value::String(arg.to_string()))
}
