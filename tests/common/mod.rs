#![allow(dead_code)]

use agentshelf::agent::{create_agent, AgentForm};
use agentshelf::config::{create_config, ConfigFileForm, ConfigForm};
use agentshelf::db::create_schema;
use agentshelf::mcp_server::{create_mcp_server, McpServerForm};
use agentshelf::orm::{agents, config_types, configs, mcp_servers, users};
use agentshelf::taxonomy::{create_config_type, TaxonomyForm};
use agentshelf::user::{register_user, RegisterForm};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::json;

/// A fresh in-memory database with every table created.
/// One connection, or each checkout would see its own empty database.
pub async fn test_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.expect("sqlite connection");
    create_schema(&db).await.expect("schema");
    db
}

pub async fn user(db: &DatabaseConnection, name: &str) -> users::Model {
    register_user(
        db,
        &RegisterForm {
            name: name.to_owned(),
            email: Some(format!("{}@example.com", name)),
            password: "correct horse".to_owned(),
        },
    )
    .await
    .expect("register user")
}

pub async fn agent(db: &DatabaseConnection) -> agents::Model {
    let form: AgentForm = serde_json::from_value(json!({
        "name": "Claude Code",
        "supports_mcp": true,
        "supports_skills": true,
        "mcp_transport_types": ["stdio", "http"],
        "mcp_config_template": {
            "wrapper_key": "mcpServers",
            "stdio": { "type_value": "stdio", "fields": { "command": "command" } },
            "http": { "type_value": "http", "fields": { "type": "type", "url": "url" } }
        },
        "skills_config_template": {
            "global_path": "~/.claude/skills",
            "project_path": ".claude/skills/"
        },
        "config_type_templates": {
            "rules": { "global_path": "~/.claude/CLAUDE.md", "project_path": "CLAUDE.md" }
        }
    }))
    .expect("agent form");
    create_agent(db, &form).await.expect("create agent")
}

pub async fn config_type(db: &DatabaseConnection, name: &str) -> config_types::Model {
    create_config_type(
        db,
        &TaxonomyForm {
            name: name.to_owned(),
            slug: None,
            description: None,
        },
    )
    .await
    .expect("create config type")
}

pub async fn config(
    db: &DatabaseConnection,
    owner: &users::Model,
    agent: &agents::Model,
    config_type: &config_types::Model,
    title: &str,
) -> configs::Model {
    let form = ConfigForm {
        title: title.to_owned(),
        description: None,
        agent_id: agent.id,
        config_type_id: config_type.id,
        category_id: None,
        files: vec![ConfigFileForm {
            filename: "CLAUDE.md".to_owned(),
            content: "Be terse.".to_owned(),
            language: Some("markdown".to_owned()),
            is_primary: true,
        }],
    };
    create_config(db, owner.id, &form).await.expect("create config")
}

pub async fn local_server(db: &DatabaseConnection, owner: &users::Model, name: &str) -> mcp_servers::Model {
    let form: McpServerForm = serde_json::from_value(json!({
        "name": name,
        "type": "local",
        "command": "npx",
        "args": ["-y", "pkg"],
    }))
    .expect("server form");
    create_mcp_server(db, owner.id, &form).await.expect("create server")
}
