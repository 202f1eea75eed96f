use super::shell::shell_quote;
use super::template::{
    from_stored_mcp_template, from_stored_transport_list, McpConfigTemplate, Transport,
    TransportTemplate,
};
use crate::orm::mcp_servers::{self, ServerType};
use crate::orm::agents;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(name|command|url|env_flags)\}").unwrap());

/// Logical fields that may carry a remote server URL, in lookup order.
const URL_FIELDS: [&str; 3] = ["httpUrl", "serverUrl", "url"];

/// A server rendered for one agent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct McpIntegration {
    pub transport: Transport,
    /// Ready-to-paste config block.
    pub config: Value,
    pub cli_command: Option<String>,
}

/// The parts of an agent that matter for MCP rendering.
#[derive(Clone, Debug, Default)]
pub struct AgentMcp {
    pub supports_mcp: bool,
    pub transports: Vec<Transport>,
    pub template: Option<McpConfigTemplate>,
}

impl From<&agents::Model> for AgentMcp {
    fn from(agent: &agents::Model) -> Self {
        Self {
            supports_mcp: agent.supports_mcp,
            transports: from_stored_transport_list(&agent.mcp_transport_types),
            template: from_stored_mcp_template(agent.mcp_config_template.as_ref()),
        }
    }
}

/// The parts of a server that end up in a config block.
#[derive(Clone, Debug)]
pub struct ServerSpec {
    pub slug: String,
    pub server_type: ServerType,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub url: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl From<&mcp_servers::Model> for ServerSpec {
    fn from(server: &mcp_servers::Model) -> Self {
        Self {
            slug: server.slug.to_owned(),
            server_type: server.server_type,
            command: server.command.clone().filter(|c| !c.trim().is_empty()),
            args: string_list(&server.args),
            env: string_map(&server.env),
            url: server.url.clone().filter(|u| !u.trim().is_empty()),
            headers: string_map(&server.headers),
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_owned(),
        other => other.to_string(),
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|list| list.iter().map(scalar_to_string).collect())
        .unwrap_or_default()
}

fn string_map(value: &Value) -> BTreeMap<String, String> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.to_owned(), scalar_to_string(v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Renders `server` for `agent`, or `None` when the agent cannot host it.
pub fn render_mcp(agent: &agents::Model, server: &mcp_servers::Model) -> Option<McpIntegration> {
    render(&AgentMcp::from(agent), &ServerSpec::from(server))
}

pub fn render(agent: &AgentMcp, server: &ServerSpec) -> Option<McpIntegration> {
    if !agent.supports_mcp {
        return None;
    }
    let template = agent.template.as_ref()?;

    let priority: &[Transport] = match server.server_type {
        ServerType::Local => &Transport::LOCAL_PRIORITY,
        ServerType::Remote => &Transport::REMOTE_PRIORITY,
    };
    let transport = priority
        .iter()
        .copied()
        .find(|t| agent.transports.contains(t))?;

    let sub = template.transport(transport)?;
    let fields = sub.fields.as_ref()?;

    let mut entry = Map::new();
    entry.insert(server.slug.to_owned(), Value::Object(server_object(sub, fields, server)));
    let mut config = Map::new();
    config.insert(template.wrapper_key.to_owned(), Value::Object(entry));

    Some(McpIntegration {
        transport,
        config: Value::Object(config),
        cli_command: sub
            .cli_add_command
            .as_deref()
            .map(|command| render_cli_command(command, server)),
    })
}

fn server_object(
    sub: &TransportTemplate,
    fields: &BTreeMap<String, String>,
    server: &ServerSpec,
) -> Map<String, Value> {
    let key = |logical: &str| {
        fields
            .get(logical)
            .cloned()
            .unwrap_or_else(|| logical.to_owned())
    };

    let mut object = Map::new();
    if let (Some(type_value), Some(type_key)) = (&sub.type_value, fields.get("type")) {
        object.insert(type_key.to_owned(), Value::from(type_value.as_str()));
    }

    match server.server_type {
        ServerType::Local => {
            if let Some(command) = &server.command {
                if sub.command_array {
                    let mut parts = Vec::with_capacity(server.args.len() + 1);
                    parts.push(command.to_owned());
                    parts.extend(server.args.iter().cloned());
                    object.insert(key("command"), Value::from(parts));
                } else {
                    object.insert(key("command"), Value::from(command.as_str()));
                    if !server.args.is_empty() {
                        object.insert(key("args"), Value::from(server.args.clone()));
                    }
                }
            }
            if !server.env.is_empty() {
                let env_key = fields
                    .get("env")
                    .or_else(|| fields.get("environment"))
                    .cloned()
                    .unwrap_or_else(|| "env".to_owned());
                object.insert(env_key, string_map_value(&server.env));
            }
        }
        ServerType::Remote => {
            if let Some(url) = &server.url {
                let url_key = URL_FIELDS
                    .iter()
                    .find_map(|logical| fields.get(*logical))
                    .cloned()
                    .unwrap_or_else(|| "url".to_owned());
                object.insert(url_key, Value::from(url.as_str()));
            }
            if !server.headers.is_empty() {
                object.insert(key("headers"), string_map_value(&server.headers));
            }
        }
    }

    object
}

fn string_map_value(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.to_owned(), Value::from(v.as_str())))
            .collect(),
    )
}

/// Fills the placeholders of an install command in a single pass.
pub fn render_cli_command(template: &str, server: &ServerSpec) -> String {
    let command_line = match (&server.server_type, &server.command) {
        (ServerType::Local, Some(command)) => std::iter::once(command)
            .chain(server.args.iter())
            .map(|word| shell_quote(word).into_owned())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    };
    let url = match server.server_type {
        ServerType::Remote => server.url.clone().unwrap_or_default(),
        ServerType::Local => String::new(),
    };
    let env_flags = server
        .env
        .iter()
        .map(|(k, v)| format!("-e {}", shell_quote(&format!("{}={}", k, v))))
        .collect::<Vec<_>>()
        .join(" ");

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| match &caps[1] {
        "name" => server.slug.to_owned(),
        "command" => command_line.to_owned(),
        "url" => url.to_owned(),
        _ => env_flags.to_owned(),
    });

    rendered.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn local_server() -> ServerSpec {
        ServerSpec {
            slug: "pkg-server".to_owned(),
            server_type: ServerType::Local,
            command: Some("npx".to_owned()),
            args: vec!["-y".to_owned(), "pkg".to_owned()],
            env: BTreeMap::new(),
            url: None,
            headers: BTreeMap::new(),
        }
    }

    fn remote_server() -> ServerSpec {
        ServerSpec {
            slug: "remote-docs".to_owned(),
            server_type: ServerType::Remote,
            command: None,
            args: Vec::new(),
            env: BTreeMap::new(),
            url: Some("https://mcp.example.com/mcp".to_owned()),
            headers: BTreeMap::from([("Authorization".to_owned(), "Bearer x".to_owned())]),
        }
    }

    fn agent(transports: &[Transport], template: Value) -> AgentMcp {
        AgentMcp {
            supports_mcp: true,
            transports: transports.to_vec(),
            template: Some(serde_json::from_value(template).unwrap()),
        }
    }

    #[test]
    fn test_local_stdio_block() {
        let agent = agent(
            &[Transport::Stdio],
            json!({
                "wrapper_key": "mcpServers",
                "stdio": { "type_value": "stdio", "fields": { "command": "command" } }
            }),
        );

        let rendered = render(&agent, &local_server()).unwrap();
        assert_eq!(rendered.transport, Transport::Stdio);
        assert_eq!(
            rendered.config,
            json!({ "mcpServers": { "pkg-server": { "command": "npx", "args": ["-y", "pkg"] } } })
        );
        assert_eq!(rendered.cli_command, None);
    }

    #[test]
    fn test_no_mcp_support_renders_nothing() {
        let mut agent = agent(
            &[Transport::Stdio],
            json!({ "stdio": { "fields": { "command": "command" } } }),
        );
        agent.supports_mcp = false;
        assert!(render(&agent, &local_server()).is_none());
    }

    #[test]
    fn test_missing_pieces_render_nothing() {
        // no template
        let bare = AgentMcp {
            supports_mcp: true,
            transports: vec![Transport::Stdio],
            template: None,
        };
        assert!(render(&bare, &local_server()).is_none());

        // transport not offered by the agent
        let http_only = agent(&[Transport::Http], json!({ "http": { "fields": {} } }));
        assert!(render(&http_only, &local_server()).is_none());

        // sub-template without fields
        let no_fields = agent(&[Transport::Stdio], json!({ "stdio": { "type_value": "stdio" } }));
        assert!(render(&no_fields, &local_server()).is_none());
    }

    #[test]
    fn test_type_key_needs_mapping() {
        let agent = agent(
            &[Transport::Stdio],
            json!({ "stdio": {
                "type_value": "stdio",
                "fields": { "type": "type", "command": "command" }
            } }),
        );
        let rendered = render(&agent, &local_server()).unwrap();
        assert_eq!(rendered.config["mcpServers"]["pkg-server"]["type"], "stdio");
    }

    #[test]
    fn test_command_array_and_environment() {
        let agent = agent(
            &[Transport::Local, Transport::Remote],
            json!({
                "wrapper_key": "mcp",
                "local": {
                    "type_value": "local",
                    "fields": { "type": "type", "command": "command", "environment": "environment" },
                    "command_array": true
                }
            }),
        );
        let mut server = local_server();
        server.env.insert("TOKEN".to_owned(), "abc".to_owned());

        let rendered = render(&agent, &server).unwrap();
        assert_eq!(rendered.transport, Transport::Local);
        assert_eq!(
            rendered.config,
            json!({ "mcp": { "pkg-server": {
                "type": "local",
                "command": ["npx", "-y", "pkg"],
                "environment": { "TOKEN": "abc" }
            } } })
        );
    }

    #[test]
    fn test_local_prefers_stdio_over_local() {
        let agent = agent(
            &[Transport::Local, Transport::Stdio],
            json!({
                "stdio": { "fields": {} },
                "local": { "fields": {}, "command_array": true }
            }),
        );
        assert_eq!(render(&agent, &local_server()).unwrap().transport, Transport::Stdio);
    }

    #[test]
    fn test_remote_url_alias_and_headers() {
        let agent = agent(
            &[Transport::Stdio, Transport::Sse, Transport::Http],
            json!({
                "http": { "fields": { "httpUrl": "httpUrl", "headers": "requestHeaders" } },
                "sse": { "fields": { "url": "url" } }
            }),
        );

        let rendered = render(&agent, &remote_server()).unwrap();
        assert_eq!(rendered.transport, Transport::Http);
        assert_eq!(
            rendered.config,
            json!({ "mcpServers": { "remote-docs": {
                "httpUrl": "https://mcp.example.com/mcp",
                "requestHeaders": { "Authorization": "Bearer x" }
            } } })
        );
    }

    #[test]
    fn test_cli_command_local() {
        let mut server = local_server();
        server.args.push("--dir".to_owned());
        server.args.push("my files".to_owned());
        server.env.insert("B".to_owned(), "two words".to_owned());
        server.env.insert("A".to_owned(), "1".to_owned());

        assert_eq!(
            render_cli_command("claude mcp add {name}  {env_flags} -- {command} {url}", &server),
            "claude mcp add pkg-server -e A=1 -e 'B=two words' -- npx -y pkg --dir 'my files'"
        );
    }

    #[test]
    fn test_cli_command_remote() {
        assert_eq!(
            render_cli_command(
                "claude mcp add --transport http {name} {url} {command} {env_flags}",
                &remote_server()
            ),
            "claude mcp add --transport http remote-docs https://mcp.example.com/mcp"
        );
    }

    #[test]
    fn test_rendering_from_models() {
        let now = chrono::Utc::now().naive_utc();
        let agent = agents::Model {
            id: 1,
            name: "Claude Code".to_owned(),
            slug: "claude-code".to_owned(),
            description: None,
            website: None,
            supports_mcp: true,
            supports_skills: false,
            mcp_transport_types: json!(["stdio", "websocket"]),
            mcp_config_template: Some(json!({
                "stdio": {
                    "fields": { "command": "command" },
                    "cli_add_command": "claude mcp add {name} -- {command}"
                }
            })),
            skills_config_template: None,
            config_type_templates: None,
            sort_order: 0,
            created_at: now,
        };
        let server = mcp_servers::Model {
            id: 1,
            user_id: None,
            name: "Pkg".to_owned(),
            slug: "pkg".to_owned(),
            description: None,
            server_type: ServerType::Local,
            command: Some("npx".to_owned()),
            args: json!(["-y", "pkg"]),
            env: json!({}),
            url: None,
            headers: json!({}),
            source_url: None,
            vote_score: 0,
            created_at: now,
            updated_at: now,
        };

        let rendered = render_mcp(&agent, &server).unwrap();
        assert_eq!(rendered.cli_command.as_deref(), Some("claude mcp add pkg -- npx -y pkg"));

        let broken = agents::Model {
            mcp_config_template: Some(json!({ "stdio": "nope" })),
            ..agent
        };
        assert!(render_mcp(&broken, &server).is_none());
    }
}
