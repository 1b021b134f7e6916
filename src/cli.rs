//! Command-line interface for auth-store.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::BackendKind;

/// What the binary should do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the rehydrated session state.
    Status,
    /// Store a session.
    Login {
        token: String,
        user: serde_json::Value,
    },
    /// Clear the stored session.
    Logout,
    /// Print the access decision for a location.
    Check { path: String, roles: Vec<String> },
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Subcommand, if one was given.
    pub command: Option<Command>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Storage key (overrides config file).
    pub key: Option<String>,
    /// Persistence backend (overrides config file).
    pub backend: Option<BackendKind>,
    /// Data directory for the file backend.
    pub data_dir: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut subcommand: Option<String> = None;
    let mut token: Option<String> = None;
    let mut user: Option<serde_json::Value> = None;
    let mut path: Option<String> = None;
    let mut roles: Vec<String> = Vec::new();

    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('k') | Long("key") => {
                result.key = Some(parser.value()?.parse()?);
            }
            Short('b') | Long("backend") => {
                let value: String = parser.value()?.parse()?;
                let backend = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("backend", value))?;
                result.backend = Some(backend);
            }
            Short('d') | Long("data-dir") => {
                result.data_dir = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("token") => {
                token = Some(parser.value()?.parse()?);
            }
            Long("user") => {
                let value: String = parser.value()?.parse()?;
                let parsed = serde_json::from_str(&value)
                    .map_err(|_| ArgsError::InvalidValue("user", value))?;
                user = Some(parsed);
            }
            Long("path") => {
                path = Some(parser.value()?.parse()?);
            }
            Short('r') | Long("role") => {
                roles.push(parser.value()?.parse()?);
            }
            Value(val) if subcommand.is_none() => {
                subcommand = Some(val.string()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    result.command = match subcommand.as_deref() {
        None => None,
        Some("status") => Some(Command::Status),
        Some("login") => Some(Command::Login {
            token: token.ok_or(ArgsError::MissingOption("token"))?,
            user: user.ok_or(ArgsError::MissingOption("user"))?,
        }),
        Some("logout") => Some(Command::Logout),
        Some("check") => Some(Command::Check {
            path: path.unwrap_or_else(|| "/".to_string()),
            roles,
        }),
        Some(other) => return Err(ArgsError::UnknownCommand(other.to_string())),
    };

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"auth-store {version}
Persisted session store with rehydration gating

USAGE:
    auth-store [OPTIONS] <COMMAND>

COMMANDS:
    status                          Print the stored session state
    login --token <T> --user <JSON> Store a session
    logout                          Clear the stored session
    check [--path <P>] [-r <ROLE>]  Print the access decision for a location

OPTIONS:
    -c, --config <FILE>     Path to configuration file (JSON)
    -k, --key <KEY>         Storage key [default: session-store]
    -b, --backend <KIND>    Persistence backend: file, memory [default: file]
    -d, --data-dir <DIR>    Directory for the file backend [default: .auth-store]
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    AUTH_STORE_KEY          Storage key (overrides config)
    AUTH_STORE_BACKEND      Persistence backend (overrides config)
    AUTH_STORE_DATA_DIR     Data directory (overrides config)
    AUTH_STORE_LOG_LEVEL    Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Store a session, then read it back in a new process
    auth-store login --token abc123 --user '{{"id":"u1","role":"rep"}}'
    auth-store status

    # Gate a location on an admin role
    auth-store check --path /reports -r admin
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("auth-store {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Required option missing for the chosen command.
    MissingOption(&'static str),
    /// Unknown subcommand.
    UnknownCommand(String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::MissingOption(name) => write!(f, "missing required option --{}", name),
            Self::UnknownCommand(cmd) => write!(f, "unknown command: '{}'", cmd),
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
