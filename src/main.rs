//! auth-store binary entry point.

use std::process::ExitCode;

use auth_store::cli::{self, Command};
use auth_store::config::Config;
use auth_store::{gate, logging, RoleGate, SessionStore, Snapshot};
use serde_json::json;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'auth-store --help' for usage");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _ = logging::init_with_level(config.log_filter());

    let Some(command) = args.command else {
        cli::print_help();
        return ExitCode::from(2);
    };

    match run(&config, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config, command: Command) -> auth_store::Result<()> {
    let store = SessionStore::with_backend(config.build_backend(), config.store.key.clone())?;
    let outcome = store.rehydrate().await;
    info!(key = %store.key(), ?outcome, "session store ready");

    match command {
        Command::Status => print_status(&store.snapshot())?,
        Command::Login { token, user } => {
            store.set_session(token, user)?;
            store.flush().await?;
            print_status(&store.snapshot())?;
        }
        Command::Logout => {
            store.clear_session();
            store.flush().await?;
            print_status(&store.snapshot())?;
        }
        Command::Check { path, roles } => {
            let decision = RoleGate::new(&roles).evaluate(&store.snapshot(), &path);
            let mut output = serde_json::to_value(&decision)?;
            if decision.is_granted() {
                output["location"] = json!(path);
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn print_status(snapshot: &Snapshot) -> auth_store::Result<()> {
    let status = json!({
        "hydrated": snapshot.is_hydrated(),
        "authenticated": snapshot.is_authenticated(),
        "user": snapshot.user(),
        "role": snapshot.user().map(gate::user_role),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
