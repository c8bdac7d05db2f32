use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use sitedesk_protocol::ContentKind;

mod cli;
mod config;
mod error;
mod ui;
mod version;

mod client;
mod events;
mod export;
mod interceptor;
mod notice;
mod refresh;
mod resource;
mod scheduler;
mod session;
mod store;
mod token;

#[cfg(test)]
mod tests;

use cli::CliHandler;
use version::CURRENT_VERSION;

#[derive(Parser)]
#[command(
    name = "sitedesk",
    about = "Admin console for the marketing site content backend",
    long_about = "Sitedesk - Command line admin console for the marketing site

OVERVIEW:
  Manage certificates, partners, FAQs, counters, team members, testimonials,
  services, projects, news and gallery media on the site backend. The session
  is kept alive automatically while commands run.

CONTENT KINDS:
  certificates, partners, faqs, counters, team, testimonials, services,
  projects, news, gallery

QUICK START:
  sitedesk login                               # Sign in with email and password
  sitedesk change-password                     # Required after the first login
  sitedesk list faqs --search shipping         # List and filter a collection
  sitedesk create partners --data '{\"name\":\"Acme\"}' --file logo=./acme.png
  sitedesk export news --output news.csv       # Export a collection to CSV
  sitedesk status                              # Check session and server status",
    version = CURRENT_VERSION,
    author = "Sitedesk Team",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use a different settings file
    #[arg(long, global = true, env = "SITEDESK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login(LoginArgs),

    /// Sign out and clear the stored session
    Logout,

    /// Show session and server status
    #[command(aliases = &["st"])]
    Status,

    /// Replace the current password
    ChangePassword(ChangePasswordArgs),

    /// List records of a collection
    #[command(aliases = &["ls"])]
    List(ListArgs),

    /// Show one record
    Show(ShowArgs),

    /// Create a record
    Create(RecordArgs),

    /// Update fields of a record
    Update(UpdateArgs),

    /// Delete a record
    #[command(aliases = &["rm"])]
    Delete(DeleteArgs),

    /// Export a collection to CSV
    Export(ExportArgs),

    /// Configure settings
    #[command(aliases = &["cfg"])]
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct LoginArgs {
    #[arg(short, long, env = "SITEDESK_EMAIL")]
    pub email: Option<String>,

    #[arg(long, env = "SITEDESK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct ChangePasswordArgs {
    #[arg(long, hide = true)]
    pub current: Option<String>,

    #[arg(long, hide = true)]
    pub new: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    pub kind: ContentKind,

    #[arg(short, long)]
    pub page: Option<u32>,

    #[arg(short, long)]
    pub limit: Option<u32>,

    #[arg(short, long)]
    pub search: Option<String>,

    /// Print the raw page as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    pub kind: ContentKind,

    pub id: String,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct RecordArgs {
    pub kind: ContentKind,

    /// Record fields as a JSON object
    #[arg(short, long)]
    pub data: Option<String>,

    /// Read record fields from a JSON file
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Upload a file as `field=path`; may be repeated
    #[arg(short, long = "file")]
    pub files: Vec<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub record: RecordArgs,

    pub id: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub kind: ContentKind,

    pub id: String,

    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    pub kind: ContentKind,

    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(short, long)]
    pub search: Option<String>,

    #[arg(short, long)]
    pub limit: Option<u32>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Show,
    SetEndpoint { url: String },
    SetTimeout { seconds: u64 },
    SetVerbose { enabled: String },
    SetRefreshLead { seconds: u64 },
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(format!("sitedesk={}", log_level))
        .with_target(false);
    subscriber.init();

    let mut handler = CliHandler::with_config_path(cli.config);

    if let Err(e) = handler.execute(cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
