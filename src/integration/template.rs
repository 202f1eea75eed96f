//! Typed schema for the JSON templates stored on agents.
//!
//! Admin writes go through the `validate_*` functions, which reject unknown
//! keys and wrong shapes. Renderers use the `from_stored_*` functions, which
//! skip unknown keys and turn any other failure into `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{template} is invalid: {source}")]
    Invalid {
        template: &'static str,
        source: serde_json::Error,
    },
    #[error("unknown transport type '{0}'")]
    UnknownTransport(String),
    #[error("mcp_transport_types must be a list of transport names")]
    TransportList,
}

/// Connection mechanisms an agent may use to talk to an MCP server.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Local,
    Http,
    Sse,
    Remote,
}

impl Transport {
    /// Preference order for servers spawned locally.
    pub const LOCAL_PRIORITY: [Transport; 2] = [Transport::Stdio, Transport::Local];
    /// Preference order for servers reached over the network.
    pub const REMOTE_PRIORITY: [Transport; 3] = [Transport::Http, Transport::Sse, Transport::Remote];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "stdio" => Some(Self::Stdio),
            "local" => Some(Self::Local),
            "http" => Some(Self::Http),
            "sse" => Some(Self::Sse),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Local => "local",
            Self::Http => "http",
            Self::Sse => "sse",
            Self::Remote => "remote",
        }
    }
}

/// `agents.mcp_config_template`
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct McpConfigTemplate {
    #[serde(default = "default_wrapper_key")]
    pub wrapper_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdio: Option<TransportTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<TransportTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<TransportTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse: Option<TransportTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<TransportTemplate>,
}

fn default_wrapper_key() -> String {
    "mcpServers".to_owned()
}

impl McpConfigTemplate {
    pub fn transport(&self, transport: Transport) -> Option<&TransportTemplate> {
        match transport {
            Transport::Stdio => self.stdio.as_ref(),
            Transport::Local => self.local.as_ref(),
            Transport::Http => self.http.as_ref(),
            Transport::Sse => self.sse.as_ref(),
            Transport::Remote => self.remote.as_ref(),
        }
    }
}

/// How one transport is written in an agent's config file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportTemplate {
    /// Fixed value written under the mapped `type` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_value: Option<String>,
    /// Logical field name to the key the agent expects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
    /// Shell command with `{name}`, `{command}`, `{url}` and `{env_flags}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_add_command: Option<String>,
    /// Write the command as one `[command, ...args]` array.
    #[serde(default)]
    pub command_array: bool,
}

/// Install locations. Used for `agents.skills_config_template` and for each
/// entry of `agents.config_type_templates`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstallPaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
}

impl InstallPaths {
    pub fn is_empty(&self) -> bool {
        self.global_path.is_none() && self.project_path.is_none()
    }
}

/// `agents.config_type_templates`, keyed by config type slug.
pub type ConfigTypeTemplates = BTreeMap<String, InstallPaths>;

pub fn validate_mcp_template(value: &Value) -> Result<McpConfigTemplate, TemplateError> {
    serde_json::from_value(value.clone()).map_err(|source| TemplateError::Invalid {
        template: "mcp_config_template",
        source,
    })
}

pub fn validate_skills_template(value: &Value) -> Result<InstallPaths, TemplateError> {
    serde_json::from_value(value.clone()).map_err(|source| TemplateError::Invalid {
        template: "skills_config_template",
        source,
    })
}

pub fn validate_config_type_templates(value: &Value) -> Result<ConfigTypeTemplates, TemplateError> {
    serde_json::from_value(value.clone()).map_err(|source| TemplateError::Invalid {
        template: "config_type_templates",
        source,
    })
}

/// Checks that every entry names a known transport. Order is kept.
pub fn validate_transport_list(value: &Value) -> Result<Vec<Transport>, TemplateError> {
    let list = value.as_array().ok_or(TemplateError::TransportList)?;
    list.iter()
        .map(|item| {
            let name = item.as_str().ok_or(TemplateError::TransportList)?;
            Transport::from_name(name).ok_or_else(|| TemplateError::UnknownTransport(name.to_owned()))
        })
        .collect()
}

const MCP_KEYS: &[&str] = &["wrapper_key", "stdio", "local", "http", "sse", "remote"];
const TRANSPORT_KEYS: &[&str] = &["type_value", "fields", "cli_add_command", "command_array"];
const PATH_KEYS: &[&str] = &["global_path", "project_path"];

/// Unknown keys in stored rows are dropped before parsing.
pub fn from_stored_mcp_template(value: Option<&Value>) -> Option<McpConfigTemplate> {
    let mut value = known_keys(value?, MCP_KEYS);
    if let Value::Object(map) = &mut value {
        for (key, transport) in map.iter_mut() {
            if key != "wrapper_key" {
                *transport = known_keys(transport, TRANSPORT_KEYS);
            }
        }
    }
    lenient(&value, validate_mcp_template)
}

pub fn from_stored_skills_template(value: Option<&Value>) -> Option<InstallPaths> {
    lenient(&known_keys(value?, PATH_KEYS), validate_skills_template)
}

pub fn from_stored_config_type_templates(value: Option<&Value>) -> Option<ConfigTypeTemplates> {
    let mut value = value?.clone();
    if let Value::Object(map) = &mut value {
        for paths in map.values_mut() {
            *paths = known_keys(paths, PATH_KEYS);
        }
    }
    lenient(&value, validate_config_type_templates)
}

/// Known transports in stored order; unknown names are skipped.
pub fn from_stored_transport_list(value: &Value) -> Vec<Transport> {
    value
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .filter_map(Transport::from_name)
                .collect()
        })
        .unwrap_or_default()
}

/// Copy of `value` holding only `keys`. Non-objects are returned as is.
fn known_keys(value: &Value, keys: &[&str]) -> Value {
    match value {
        Value::Object(map) => {
            let kept: serde_json::Map<String, Value> = map
                .iter()
                .filter(|(key, _)| keys.contains(&key.as_str()))
                .map(|(key, v)| (key.clone(), v.clone()))
                .collect();
            if kept.len() < map.len() {
                log::debug!("dropping unknown keys from stored agent template");
            }
            Value::Object(kept)
        }
        other => other.clone(),
    }
}

fn lenient<T>(value: &Value, parse: fn(&Value) -> Result<T, TemplateError>) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match parse(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!("ignoring stored agent template: {}", e);
            None
        }
    }
}
