pub mod agent;
pub mod comment;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod favorite;
pub mod frontend;
pub mod global;
pub mod integration;
pub mod interaction;
pub mod listing;
pub mod mcp_server;
pub mod middleware;
pub mod oauth;
pub mod orm;
pub mod prompt;
pub mod session;
pub mod skill;
pub mod slug;
pub mod taxonomy;
pub mod user;
pub mod vote;
pub mod web;

pub use db::{get_db_pool, init_db};
