//! Agent-specific integration snippets rendered from admin-authored templates.
//!
//! Every renderer here is pure. A missing or malformed template means the
//! agent has no integration for that record; it is never an error.

pub mod mcp;
pub mod shell;
pub mod skill;
pub mod template;

pub use mcp::{render_mcp, McpIntegration};
pub use skill::{
    render_config_paths, render_skill, render_skill_md, skill_install_paths, SkillIntegration,
};
pub use template::{
    InstallPaths, McpConfigTemplate, TemplateError, Transport, TransportTemplate,
};
