// ABOUTME: Library crate for binlog-replicator
// ABOUTME: Binlog shipping core plus CLI command implementations

pub mod binlog;
pub mod commands;
pub mod config;
pub mod mysql;
pub mod tools;
