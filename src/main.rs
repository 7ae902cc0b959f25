use clap::{Parser, Subcommand};
use log::{error, info};
use neviweb::config::Config;
use neviweb::{Mode, Session};

#[derive(Debug, Parser)]
#[command(name = "neviweb", version, about = "Read and control Neviweb thermostats")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List gateways and their thermostats (default)
    List,
    /// Switch a thermostat to manual mode and set its setpoint
    SetSetpoint { name: String, value: f64 },
    /// Set a thermostat's mode: manual or automatic
    SetMode { name: String, mode: Mode },
}

fn run(command: Command) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!("Config loaded (base_url={}, timeout={}s)", cfg.base_url, cfg.timeout.as_secs());

    // 2) Log in
    let mut session = cfg.session_builder().build();
    session
        .connect()
        .map_err(|e| format!("Neviweb login failed: {}", e))?;
    info!("Authenticated to Neviweb");

    // 3) Run, then always log out
    let result = execute(&mut session, command);
    session.disconnect();
    result
}

fn execute(session: &mut Session, command: Command) -> Result<(), String> {
    session
        .refresh_gateways()
        .map_err(|e| format!("refresh_gateways failed: {}", e))?;

    match command {
        Command::List => {
            print_inventory(session);
            Ok(())
        }
        Command::SetSetpoint { name, value } => {
            let thermostat = session.get_thermostat_mut(&name).map_err(|e| e.to_string())?;
            thermostat
                .set_setpoint(value)
                .map_err(|e| format!("set_setpoint({name}) failed: {}", e))?;
            println!("{}: setpoint {}", name, show(thermostat.setpoint().ok().flatten()));
            Ok(())
        }
        Command::SetMode { name, mode } => {
            let thermostat = session.get_thermostat_mut(&name).map_err(|e| e.to_string())?;
            thermostat
                .set_mode(mode)
                .map_err(|e| format!("set_mode({name}) failed: {}", e))?;
            println!("{}: {}", name, show(thermostat.mode().ok().flatten()));
            Ok(())
        }
    }
}

fn print_inventory(session: &Session) {
    for gateway in session.gateways() {
        println!(
            "{} [{}] {} ({} thermostat(s))",
            gateway.name(),
            gateway.id(),
            if gateway.is_active() { "active" } else { "inactive" },
            gateway.thermostats().len()
        );
        for t in gateway.thermostats() {
            println!(
                "  {:<24} temperature={:<6} setpoint={:<6} mode={}",
                t.name(),
                show(t.temperature().ok().flatten()),
                show(t.setpoint().ok().flatten()),
                show(t.mode().ok().flatten()),
            );
        }
    }
}

fn show<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn main() {
    let cli = Cli::parse();

    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    info!(
        "neviweb {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli.command.unwrap_or(Command::List)) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
