// CLI surface: clap argument definitions for the three migration
// scenarios, plus the interactive password prompt used when a password
// flag is omitted. Every flag can also come from a `WBMOVE_`-prefixed
// environment variable.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use dialoguer::Password;

use crate::error::Result;

#[derive(Parser, Debug)]
#[command(
    name = "wbmove",
    version,
    about = "Moves a workbook between projects, servers and sites over the server REST API"
)]
pub struct Cli {
    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true, env = "WBMOVE_VERBOSE")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Move a workbook to another project on the same site.
    #[command(name = "move_to_project")]
    MoveToProject(MoveToProjectArgs),
    /// Move a workbook to the 'default' project on another server.
    #[command(name = "move_to_server")]
    MoveToServer(MoveToServerArgs),
    /// Move a workbook to the 'default' project on another site of the
    /// same server.
    #[command(name = "move_to_site")]
    MoveToSite(MoveToSiteArgs),
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// The server address, e.g. https://analytics.example.com
    #[arg(short, long, env = "WBMOVE_SERVER")]
    pub server: String,

    /// The username (not ID) of the user to sign in as.
    #[arg(short, long, env = "WBMOVE_USERNAME")]
    pub username: String,

    /// The password of the user; prompted for interactively when omitted.
    #[arg(short, long, env = "WBMOVE_PASSWORD")]
    pub password: Option<String>,

    /// The name of the workbook to move.
    #[arg(short, long = "workbook_name", env = "WBMOVE_WORKBOOK_NAME")]
    pub workbook_name: String,

    /// HTTP timeout in seconds applied to every request.
    #[arg(long, default_value_t = 300, env = "WBMOVE_TIMEOUT")]
    pub timeout: u64,
}

impl CommonArgs {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Args, Debug)]
pub struct MoveToProjectArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// The destination project name.
    #[arg(short = 'd', long = "dest_project", env = "WBMOVE_DEST_PROJECT")]
    pub dest_project: String,
}

#[derive(Args, Debug)]
pub struct MoveToServerArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// The destination server address.
    #[arg(long = "dest_server", env = "WBMOVE_DEST_SERVER")]
    pub dest_server: String,

    /// The username to sign in as on the destination server.
    #[arg(long = "dest_username", env = "WBMOVE_DEST_USERNAME")]
    pub dest_username: String,

    /// The destination user's password; prompted for when omitted.
    #[arg(long = "dest_password", env = "WBMOVE_DEST_PASSWORD")]
    pub dest_password: Option<String>,

    /// Content URL of the destination site ("" for the default site).
    #[arg(long = "dest_site_id", env = "WBMOVE_DEST_SITE_ID")]
    pub dest_site_id: String,
}

#[derive(Args, Debug)]
pub struct MoveToSiteArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Content URL of the destination site on the same server.
    #[arg(long = "dest_site", env = "WBMOVE_DEST_SITE")]
    pub dest_site: String,
}

/// Use the password from the flag/environment when present, otherwise
/// prompt for it with hidden input.
pub fn resolve_password(flag: Option<&str>, prompt: &str) -> Result<String> {
    match flag {
        Some(password) => Ok(password.to_string()),
        None => Ok(Password::new().with_prompt(prompt).interact()?),
    }
}
