//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "shotlift", author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a file, or stdin when the path is `-`
    Upload(UploadArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// File to upload (`-` reads from stdin)
    pub path: PathBuf,

    /// Remote file name (defaults to the local file name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// MIME type (defaults to one derived from the file name)
    #[arg(long)]
    pub content_type: Option<String>,

    /// Force a `.png` suffix on the remote file name
    #[arg(long)]
    pub png: bool,

    /// API endpoint, overriding the configuration file
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Upload token, overriding the configuration file
    #[arg(long)]
    pub token: Option<String>,
}

impl UploadArgs {
    pub fn reads_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration with the token masked
    Show,
    /// Print the configuration file location
    Path,
}
