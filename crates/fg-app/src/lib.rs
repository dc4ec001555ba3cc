pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod quota;
pub mod tracker;
