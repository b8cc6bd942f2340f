pub mod clock;
pub mod commands;
pub mod config;
pub mod connection;
pub mod output;
pub mod paramset;
pub mod schedule;
pub mod xmlrpc;
