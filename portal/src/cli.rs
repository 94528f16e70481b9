use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use uuid::Uuid;

use crate::models::{EventCategory, Role, Sector};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Clinic admin portal", long_about = None)]
pub struct Args {
    /// Hosted backend URL
    #[arg(long, env = "CLINIC_BACKEND_URL", global = true)]
    pub backend_url: Option<String>,

    /// Public (anon) API key of the backend
    #[arg(long, env = "CLINIC_ANON_KEY", global = true, hide_env_values = true)]
    pub anon_key: Option<String>,

    /// Where the signed-in session is persisted
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,

    /// Log verbosity
    #[arg(short, long, value_name = "LEVEL", default_value_t = LogLevel::Warn, global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in with email and password
    Login {
        email: Option<String>,
    },
    /// Register a new account; it starts inactive until an admin enables it
    Signup {
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = Role::User)]
        role: Role,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Send the signup confirmation email again
    ResendConfirmation {
        email: String,
    },
    /// Update your display name or avatar
    Profile {
        #[arg(long)]
        name: Option<String>,
        /// Image file uploaded as the new avatar
        #[arg(long)]
        avatar: Option<PathBuf>,
    },
    /// Show what the portal does when a path is opened
    Route {
        path: String,
    },
    #[command(subcommand)]
    Notices(NoticeCommand),
    #[command(subcommand)]
    Chat(ChatCommand),
    #[command(subcommand)]
    Events(EventCommand),
    #[command(subcommand)]
    Documents(DocumentCommand),
    #[command(subcommand)]
    Polls(PollCommand),
    #[command(subcommand)]
    Users(UserCommand),
    #[command(subcommand)]
    Presence(PresenceCommand),
}

impl Command {
    /// Commands that still make sense when no session could be restored.
    pub fn works_signed_out(&self) -> bool {
        matches!(
            self,
            Command::Login { .. }
                | Command::Logout
                | Command::Signup { .. }
                | Command::ResendConfirmation { .. }
        )
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum NoticeCommand {
    List {
        #[arg(long, value_parser = parse_sector)]
        sector: Option<Sector>,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long, value_parser = parse_sector, default_value = "geral")]
        sector: Sector,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, value_parser = parse_sector)]
        sector: Option<Sector>,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ChatCommand {
    /// Print the latest messages
    History,
    Send {
        text: String,
    },
    /// Send one or more files as a single message
    Attach {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Follow new messages as they arrive
    Watch,
    /// Delete every message (admins only)
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum EventCommand {
    List {
        /// Hide events that already ended
        #[arg(long)]
        upcoming: bool,
    },
    Create {
        title: String,
        /// Local time, "YYYY-MM-DD HH:MM"
        #[arg(long, value_parser = parse_local_datetime)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_local_datetime)]
        end: DateTime<Utc>,
        #[arg(long, value_parser = parse_category, default_value = "outro")]
        category: EventCategory,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, value_parser = parse_local_datetime)]
        start: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_local_datetime)]
        end: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_category)]
        category: Option<EventCategory>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    Delete {
        id: Uuid,
    },
    /// Confirm or decline attendance for this session
    Respond {
        id: Uuid,
        #[arg(long)]
        decline: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum DocumentCommand {
    List {
        #[arg(long, value_parser = parse_sector)]
        sector: Option<Sector>,
    },
    Upload {
        path: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long, value_parser = parse_sector, default_value = "geral")]
        sector: Sector,
    },
    Download {
        id: Uuid,
        /// File or directory to write to
        #[arg(long, default_value = ".")]
        to: PathBuf,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PollCommand {
    List,
    Create {
        question: String,
        /// Repeat for each option
        #[arg(long = "option", required = true)]
        options: Vec<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_local_datetime)]
        ends_at: Option<DateTime<Utc>>,
    },
    /// Cast or withdraw your vote on one option
    Vote {
        poll: Uuid,
        /// Option id or text
        option: String,
    },
    Close {
        id: Uuid,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    List,
    Create {
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = Role::Staff)]
        role: Role,
        /// Generated when omitted
        #[arg(long)]
        password: Option<String>,
    },
    Delete {
        id: Uuid,
        #[arg(long)]
        yes: bool,
    },
    SetRole {
        id: Uuid,
        #[arg(value_enum)]
        role: Role,
    },
    Activate {
        id: Uuid,
    },
    Deactivate {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PresenceCommand {
    /// List users currently online
    Online,
    /// Keep this user marked online until interrupted
    Run,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl From<LogLevel> for LevelFilter {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Off => write!(f, "off"),
        }
    }
}

fn parse_sector(value: &str) -> Result<Sector, String> {
    if value.trim().is_empty() {
        return Err("sector cannot be empty".into());
    }
    Ok(Sector::from(value))
}

fn parse_category(value: &str) -> Result<EventCategory, String> {
    Ok(EventCategory::categorize(value))
}

/// Accepts "YYYY-MM-DD HH:MM", "YYYY-MM-DDTHH:MM" or a bare date (midnight), in local time.
pub fn parse_local_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    let naive = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("invalid date \"{value}\", expected YYYY-MM-DD HH:MM"))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("\"{value}\" does not exist in the local time zone"))
}
