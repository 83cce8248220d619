use std::io::Read;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use rollcall_core::client::{now_ms, PaymentReport, Registrar};
use rollcall_core::config::RegistrarConfig;
use rollcall_core::error::EnrollmentError;
use rollcall_core::types::{Attendance, Offering};

use crate::handlers::*;
use crate::{Cli, Commands, OfferingCommand, WaitlistCommand};

/// Why a command produced no data
enum Failure {
    /// Malformed input, never reached the registrar
    Request(String),
    /// Refused by the registrar
    Refused(EnrollmentError),
}

impl From<String> for Failure {
    fn from(msg: String) -> Self {
        Failure::Request(msg)
    }
}

impl From<EnrollmentError> for Failure {
    fn from(err: EnrollmentError) -> Self {
        Failure::Refused(err)
    }
}

type Outcome = Result<Value, Failure>;

fn to_value<T: Serialize>(data: T) -> Outcome {
    serde_json::to_value(data).map_err(|e| Failure::Request(format!("Failed to encode response: {}", e)))
}

/// Runs one CLI invocation and prints its response. Returns whether it succeeded.
pub async fn run(cli: Cli) -> bool {
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(msg) => return emit(Err(Failure::Request(msg))),
    };
    let mut registrar = match create_registrar(&cli.storage) {
        Ok(registrar) => registrar.with_config(config),
        Err(msg) => return emit(Err(Failure::Request(msg))),
    };

    if let Commands::Sweep { every: Some(secs) } = cli.command {
        run_sweeper(registrar, Duration::from_secs(secs.max(1))).await;
        return true;
    }

    let now = cli.now.unwrap_or_else(now_ms);
    emit(execute(&mut registrar, cli.command, now))
}

fn emit(outcome: Outcome) -> bool {
    let (response, ok) = match outcome {
        Ok(data) => (ApiResponse::ok(data), true),
        Err(Failure::Request(msg)) => (ApiResponse::err(msg), false),
        Err(Failure::Refused(err)) => {
            tracing::warn!(code = err.code(), error = %err, "Request refused");
            (ApiResponse::from_error(&err), false)
        }
    };

    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to encode response: {}", e),
    }
    ok
}

fn execute(registrar: &mut Registrar, command: Commands, now: u64) -> Outcome {
    match command {
        Commands::Offering { action } => offering(registrar, action),
        Commands::Enroll { learner, offering } => {
            validate_id("learner", &learner)?;
            validate_id("offering", &offering)?;
            to_value(registrar.enroll(&learner, &offering, now)?)
        }
        Commands::Cancel { enrollment } => to_value(registrar.cancel(&enrollment, now)?),
        Commands::Pay {
            enrollment,
            amount,
            declined,
        } => {
            let report = PaymentReport {
                enrollment_id: enrollment,
                outcome: payment_outcome(declined),
                amount,
            };
            to_value(registrar.record_payment(&report, now)?)
        }
        Commands::Complete {
            enrollment,
            attended,
            sessions,
        } => {
            if attended > sessions {
                return Err(Failure::Request(format!(
                    "attended ({}) cannot exceed sessions ({})",
                    attended, sessions
                )));
            }
            to_value(registrar.complete(&enrollment, Attendance::new(attended, sessions), now)?)
        }
        Commands::Conflicts { learner, offering } => {
            let conflicting = registrar.conflicts(&learner, &offering)?;
            to_value(ConflictsResponse {
                has_conflict: !conflicting.is_empty(),
                learner_id: learner,
                offering_id: offering,
                conflicting,
            })
        }
        Commands::Waitlist { action } => waitlist(registrar, action, now),
        Commands::Sweep { .. } => to_value(sweep_pass(registrar, now)?),
        Commands::Version => to_value(env!("CARGO_PKG_VERSION")),
    }
}

fn offering(registrar: &mut Registrar, action: OfferingCommand) -> Outcome {
    match action {
        OfferingCommand::Add => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            let offering: Offering =
                serde_json::from_str(&input).map_err(|e| format!("Invalid offering JSON: {}", e))?;
            to_value(registrar.add_offering(offering)?)
        }
        OfferingCommand::Show { id } => to_value(registrar.offering(&id)?),
        OfferingCommand::Seats { id } => {
            let available_seats = registrar.available_seats(&id)?;
            to_value(SeatsResponse {
                offering_id: id,
                available_seats,
            })
        }
        OfferingCommand::Stats { id } => to_value(registrar.stats(&id)?),
        OfferingCommand::Capacity { id, max } => to_value(registrar.set_capacity(&id, max)?),
        OfferingCommand::Status { id, status } => {
            let status = parse_status(&status)?;
            to_value(registrar.set_status(&id, status)?)
        }
    }
}

fn waitlist(registrar: &mut Registrar, action: WaitlistCommand, now: u64) -> Outcome {
    match action {
        WaitlistCommand::Join { learner, offering } => {
            validate_id("learner", &learner)?;
            let entry = registrar.join_waitlist(&learner, &offering, now)?;
            let position = registrar.waitlist_position(&entry.id)?;
            to_value(WaitlistJoinResponse { entry, position })
        }
        WaitlistCommand::Leave { entry } => to_value(registrar.leave_waitlist(&entry)?),
        WaitlistCommand::Show { offering } => {
            registrar.offering(&offering)?;
            to_value(registrar.waitlist(&offering)?)
        }
    }
}

// ─── Sweeps ─────────────────────────────────────────────────────────────────

fn sweep_pass(registrar: &mut Registrar, now: u64) -> Result<SweepResponse, EnrollmentError> {
    Ok(SweepResponse {
        expired_payments: registrar.sweep_expired_payments(now)?,
        reminders: registrar.sweep_reminders(now)?,
    })
}

async fn run_sweeper(mut registrar: Registrar, every: Duration) {
    tracing::info!(every_secs = every.as_secs(), "Sweeper started");

    let mut ticker = tokio::time::interval(every);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sweep_pass(&mut registrar, now_ms()) {
                    tracing::error!(code = e.code(), error = %e, "Sweep pass failed");
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Sweeper stopping");
                break;
            }
        }
    }
}

// ─── Setup ──────────────────────────────────────────────────────────────────

fn load_config(path: Option<&str>) -> Result<RegistrarConfig, String> {
    let Some(path) = path else {
        return Ok(RegistrarConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config '{}': {}", path, e))?;
    let config = RegistrarConfig::from_json(&raw)
        .map_err(|e| format!("Invalid config '{}': {}", path, e))?;
    tracing::info!(path = %path, "Loaded registrar config");
    Ok(config)
}

fn create_registrar(storage: &str) -> Result<Registrar, String> {
    if storage == "memory" {
        tracing::info!("Storage backend: in-memory (nothing persists past this run)");
        Ok(Registrar::new())
    } else if let Some(path) = storage.strip_prefix("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            tracing::info!("Storage backend: SQLite ({})", path);
            Registrar::with_sqlite(path).map_err(|e| format!("Failed to open SQLite: {}", e))
        }
        #[cfg(not(feature = "sqlite"))]
        {
            let _ = path;
            Err("SQLite storage requested but the `sqlite` feature is not enabled. \
                 Rebuild with: cargo build --features sqlite"
                .to_string())
        }
    } else {
        Err(format!(
            "Unknown storage backend: '{}'. Use 'memory' or 'sqlite:<path>'",
            storage
        ))
    }
}
