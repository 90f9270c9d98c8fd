//! Command-line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mealient CLI
#[derive(Parser, Debug)]
#[command(name = "mealient")]
#[command(about = "Sign in to a Mealie server and manage the stored session", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output (no short flag to avoid conflicts)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Settings file (defaults to <config dir>/mealient/config.json)
    #[arg(long, global = true, env = "MEALIENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Keep credentials in memory only for this invocation
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a server and remember it
    Server(ServerArgs),
    /// Sign in with email and password
    Login(LoginArgs),
    /// Sign in through the server's single sign-on
    Sso,
    /// Store a token copied from the server's web session
    Token(TokenArgs),
    /// Refresh the stored session
    Refresh,
    /// Show the signed-in user
    Whoami,
    /// Show server and session status
    Status,
    /// Remove stored credentials
    Logout,
}

#[derive(Parser, Debug)]
pub struct ServerArgs {
    /// Server base URL, e.g. https://mealie.example.com
    pub url: String,
}

#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Account email or username
    #[arg(short = 'e', long)]
    pub email: Option<String>,

    /// Account password
    #[arg(short = 'p', long)]
    pub password: Option<String>,
}

#[derive(Parser, Debug)]
pub struct TokenArgs {
    /// Value of `mealie.access_token` from the logged-in browser session
    pub token: String,
}
