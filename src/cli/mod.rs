//! CLI module for the world data service

pub mod serve;

use clap::{Parser, Subcommand};

/// World data service - cached CRUD API for mobs, items and rooms
#[derive(Parser)]
#[command(name = "world-data-service")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(serve::ServeArgs),
}
