//! sea-orm entities. One module per table.

pub mod agents;
pub mod categories;
pub mod comments;
pub mod config_files;
pub mod config_types;
pub mod configs;
pub mod favorites;
pub mod mcp_servers;
pub mod prompts;
pub mod sessions;
pub mod skills;
pub mod user_identities;
pub mod users;
pub mod votes;
