use dialoguer::{Confirm, Input, Password};
use serde_json::Value;
use std::path::{Path, PathBuf};

use sitedesk_protocol::ListQuery;

use crate::client::{FormPart, HttpClient};
use crate::config::{default_config_path, ConsoleConfig};
use crate::error::{DeskError, Result};
use crate::events::SessionEvent;
use crate::export::export_to_path;
use crate::resource::ContentService;
use crate::session::SessionService;
use crate::ui::{listing_columns, UI};
use crate::version::format_version_info;
use crate::{
    ChangePasswordArgs, Commands, ConfigArgs, ConfigCommand, DeleteArgs, ExportArgs, ListArgs,
    LoginArgs, RecordArgs, ShowArgs, UpdateArgs,
};

/// Columns shown by `list` unless `--json` is given
const LISTING_COLUMNS: usize = 6;

/// CLI handler for processing commands
pub struct CliHandler {
    config_path: Option<PathBuf>,
    ui: UI,
}

impl CliHandler {
    /// Create a new CLI handler with a custom config path
    pub fn with_config_path(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            ui: UI::new(),
        }
    }

    /// Load configuration using the handler's config path
    async fn load_config(&self) -> Result<ConsoleConfig> {
        ConsoleConfig::load(self.config_path.as_deref()).await
    }

    /// Build a session on top of the configured client and resume any stored token
    async fn open_session(&self) -> Result<SessionService> {
        let config = self.load_config().await?;
        let client = HttpClient::connect(config.to_client_config()?)?;

        client.set_notice_callback(Box::new(|notice| UI::new().notice(notice)));
        client.set_event_callback(Box::new(|event| {
            if let SessionEvent::Invalidated { .. } = event {
                UI::new().warning("Your session has ended. Run `sitedesk login` to sign in again.");
            }
        }));

        let session = SessionService::new(client);
        let _ = session.restore();
        Ok(session)
    }

    /// Session for content commands: admin only, nagging until the initial
    /// password is replaced
    async fn open_admin_session(&self) -> Result<SessionService> {
        let session = self.open_session().await?;
        session.require_admin()?;
        if session.status().first_time_login {
            self.ui.warning(
                "You are still using the initial password. Run `sitedesk change-password`.",
            );
        }
        Ok(session)
    }

    /// Execute a CLI command
    pub async fn execute(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login(args) => self.handle_login(args).await,
            Commands::Logout => self.handle_logout().await,
            Commands::Status => self.handle_status().await,
            Commands::ChangePassword(args) => self.handle_change_password(args).await,
            Commands::List(args) => self.handle_list(args).await,
            Commands::Show(args) => self.handle_show(args).await,
            Commands::Create(args) => self.handle_create(args).await,
            Commands::Update(args) => self.handle_update(args).await,
            Commands::Delete(args) => self.handle_delete(args).await,
            Commands::Export(args) => self.handle_export(args).await,
            Commands::Config(args) => self.handle_config(args).await,
        }
    }

    /// Handle login command
    async fn handle_login(&mut self, args: LoginArgs) -> Result<()> {
        let session = self.open_session().await?;

        let email = match args.email {
            Some(email) => email,
            None => Input::<String>::new().with_prompt("Email").interact_text()?,
        };
        let password = match args.password {
            Some(password) => password,
            None => Password::new().with_prompt("Password").interact()?,
        };

        let data = session.login(&email, &password).await?;
        self.ui.success(&format!("Logged in as {} ({})", email, data.role));

        if !data.role.is_admin() {
            self.ui
                .warning("This account is not an administrator; content commands are disabled.");
        }
        if data.first_time_login {
            self.ui.warning(
                "This is your first login. Change your password with `sitedesk change-password`.",
            );
        }
        Ok(())
    }

    /// Handle logout command
    async fn handle_logout(&mut self) -> Result<()> {
        let session = self.open_session().await?;
        session.logout().await?;
        self.ui.success("Logged out");
        Ok(())
    }

    /// Handle status command
    async fn handle_status(&mut self) -> Result<()> {
        let session = self.open_session().await?;
        let status = session.status();
        let reachable = session.client().probe().await;

        let mut content = vec![
            ("Version", format_version_info()),
            ("Endpoint", session.client().config().base_url.clone()),
            (
                "Authentication",
                self.ui
                    .format_auth_status(status.logged_in, status.is_expired()),
            ),
        ];

        if status.logged_in {
            content.push(("Role", self.ui.format_user_field(status.role.clone())));
            content.push((
                "First login",
                if status.first_time_login { "yes" } else { "no" }.to_string(),
            ));
            content.push((
                "Token expires",
                self.ui
                    .format_user_field(status.expires_at.map(|t| t.to_rfc3339())),
            ));
            content.push((
                "Auto refresh",
                if session.client().has_scheduled_refresh() {
                    "scheduled"
                } else {
                    "not scheduled"
                }
                .to_string(),
            ));
        }
        content.push(("Server", self.ui.format_server_status(reachable)));
        content.push((
            "Session file",
            self.ui.format_user_field(
                session
                    .client()
                    .store()
                    .storage_path()
                    .map(|p| p.display().to_string()),
            ),
        ));

        self.ui.card("Status", content);
        Ok(())
    }

    async fn handle_change_password(&mut self, args: ChangePasswordArgs) -> Result<()> {
        let session = self.open_session().await?;

        let current = match args.current {
            Some(current) => current,
            None => Password::new().with_prompt("Current password").interact()?,
        };
        let new = match args.new {
            Some(new) => new,
            None => Password::new()
                .with_prompt("New password")
                .with_confirmation("Confirm new password", "Passwords do not match")
                .interact()?,
        };

        session.change_password(&current, &new).await?;
        self.ui.success("Password changed");
        Ok(())
    }

    /// Handle list command
    async fn handle_list(&mut self, args: ListArgs) -> Result<()> {
        let session = self.open_admin_session().await?;
        let service = ContentService::new(session.client().clone());

        let query = ListQuery {
            page: args.page,
            limit: args.limit,
            search: args.search,
        };
        let page = service.list(args.kind, &query).await?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&page)?);
            return Ok(());
        }

        if page.items.is_empty() {
            self.ui.info(&format!("No {} found", args.kind));
            return Ok(());
        }

        let columns = listing_columns(&page.items, LISTING_COLUMNS);
        self.ui.table(&columns, &page.items);
        self.ui.blank_line();
        self.ui.info(&format!(
            "Page {} · showing {} of {} {}",
            page.page,
            page.items.len(),
            page.total,
            args.kind
        ));
        Ok(())
    }

    async fn handle_show(&mut self, args: ShowArgs) -> Result<()> {
        let session = self.open_admin_session().await?;
        let service = ContentService::new(session.client().clone());

        let mut record = service.get(args.kind, &args.id).await?;
        service.resolve_media(&mut record);

        if args.json {
            println!("{}", serde_json::to_string_pretty(&record)?);
        } else {
            self.ui.record(&format!("{} {}", args.kind, args.id), &record);
        }
        Ok(())
    }

    async fn handle_create(&mut self, args: RecordArgs) -> Result<()> {
        let session = self.open_admin_session().await?;
        let service = ContentService::new(session.client().clone());

        let fields = read_fields(args.data.as_deref(), args.data_file.as_deref()).await?;
        let files = read_files(&args.files).await?;

        let created = service.create(args.kind, fields, files).await?;
        self.ui.success(&format!("Created {} record", args.kind));
        if let Some(id) = record_id(&created) {
            self.ui.info(&format!("id: {}", id));
        }
        Ok(())
    }

    async fn handle_update(&mut self, args: UpdateArgs) -> Result<()> {
        let session = self.open_admin_session().await?;
        let service = ContentService::new(session.client().clone());

        let fields = read_fields(
            args.record.data.as_deref(),
            args.record.data_file.as_deref(),
        )
        .await?;
        let files = read_files(&args.record.files).await?;

        service
            .update(args.record.kind, &args.id, fields, files)
            .await?;
        self.ui
            .success(&format!("Updated {} {}", args.record.kind, args.id));
        Ok(())
    }

    async fn handle_delete(&mut self, args: DeleteArgs) -> Result<()> {
        let session = self.open_admin_session().await?;
        let service = ContentService::new(session.client().clone());

        if !args.force {
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete {} {}?", args.kind, args.id))
                .default(false)
                .interact()?;
            if !confirmed {
                return Err(DeskError::user_cancelled());
            }
        }

        service.delete(args.kind, &args.id).await?;
        self.ui.success(&format!("Deleted {} {}", args.kind, args.id));
        Ok(())
    }

    async fn handle_export(&mut self, args: ExportArgs) -> Result<()> {
        let session = self.open_admin_session().await?;
        let service = ContentService::new(session.client().clone());

        let query = ListQuery {
            page: None,
            limit: args.limit,
            search: args.search,
        };
        let page = service.list(args.kind, &query).await?;

        let output = args
            .output
            .unwrap_or_else(|| PathBuf::from(format!("{}.csv", args.kind)));
        let rows = export_to_path(&page.items, &output)?;
        self.ui.success(&format!(
            "Exported {} {} to {}",
            rows,
            args.kind,
            output.display()
        ));
        Ok(())
    }

    /// Handle config command
    async fn handle_config(&mut self, args: ConfigArgs) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_config_path);
        let mut config = self.load_config().await?;

        match args.command {
            ConfigCommand::Show => {
                self.ui.card(
                    "Configuration",
                    vec![
                        ("File", path.display().to_string()),
                        ("Endpoint", config.endpoint.clone()),
                        ("Timeout", format!("{}s", config.timeout)),
                        ("Verbose", config.verbose.to_string()),
                        ("Session file", session_file_label(&config)),
                        ("Refresh lead", format!("{}s", config.refresh_lead_secs)),
                        ("Notice window", format!("{}s", config.notice_window_secs)),
                        ("Asset prefix", config.asset_prefix.clone()),
                        (
                            "Asset root",
                            config.to_client_config()?.asset_root(),
                        ),
                    ],
                );
                return Ok(());
            }
            ConfigCommand::SetEndpoint { url } => config.endpoint = url,
            ConfigCommand::SetTimeout { seconds } => config.timeout = seconds,
            ConfigCommand::SetVerbose { enabled } => config.verbose = parse_flag(&enabled)?,
            ConfigCommand::SetRefreshLead { seconds } => config.refresh_lead_secs = seconds,
            ConfigCommand::Reset => config = ConsoleConfig::default(),
        }

        // Reject settings the client would refuse before writing them
        config.to_client_config()?;
        config.save(&path).await?;
        self.ui.success("Configuration saved");
        Ok(())
    }
}

fn session_file_label(config: &ConsoleConfig) -> String {
    if config.session_storage_enabled {
        config.storage_dir.join("session.json").display().to_string()
    } else {
        "disabled (memory only)".to_string()
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(DeskError::invalid_input(format!(
            "Expected true or false, got '{}'",
            other
        ))),
    }
}

/// Split a `field=path` upload argument
pub fn parse_file_arg(arg: &str) -> Result<(String, PathBuf)> {
    match arg.split_once('=') {
        Some((field, path)) if !field.trim().is_empty() && !path.trim().is_empty() => {
            Ok((field.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(DeskError::invalid_input(format!(
            "Expected --file field=path, got '{}'",
            arg
        ))),
    }
}

async fn read_files(args: &[String]) -> Result<Vec<FormPart>> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        let (field, path) = parse_file_arg(arg)?;
        parts.push(FormPart::file(field, &path).await?);
    }
    Ok(parts)
}

/// Record fields from `--data` or `--data-file`
async fn read_fields(data: Option<&str>, data_file: Option<&Path>) -> Result<Value> {
    let raw = match (data, data_file) {
        (Some(_), Some(_)) => {
            return Err(DeskError::invalid_input(
                "Use either --data or --data-file, not both",
            ))
        }
        (Some(data), None) => data.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DeskError::io_from_error(format!("Reading {}", path.display()), e))?,
        (None, None) => "{}".to_string(),
    };

    let fields: Value = serde_json::from_str(&raw)
        .map_err(|e| DeskError::invalid_input(format!("Record data is not valid JSON: {}", e)))?;
    if !fields.is_object() {
        return Err(DeskError::invalid_input("Record data must be a JSON object"));
    }
    Ok(fields)
}

fn record_id(record: &Value) -> Option<String> {
    ["_id", "id"]
        .iter()
        .find_map(|k| record.get(*k))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}
