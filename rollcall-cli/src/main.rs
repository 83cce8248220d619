mod commands;
mod handlers;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rollcall",
    about = "Rollcall: enrollment, capacity and waitlists for courses and workshops",
    version
)]
pub struct Cli {
    /// Storage backend: "memory" or "sqlite:<path>"
    #[arg(long, global = true, default_value = "memory", env = "ROLLCALL_STORAGE")]
    pub storage: String,

    /// JSON file with registrar settings
    #[arg(long, global = true, env = "ROLLCALL_CONFIG")]
    pub config: Option<String>,

    /// Override the clock (ms since epoch)
    #[arg(long, global = true)]
    pub now: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage offerings
    Offering {
        #[command(subcommand)]
        action: OfferingCommand,
    },

    /// Enroll a learner in an offering
    Enroll { learner: String, offering: String },

    /// Cancel an enrollment
    Cancel { enrollment: String },

    /// Report a payment outcome for a pending enrollment
    Pay {
        enrollment: String,
        /// Amount in minor currency units
        #[arg(long, default_value_t = 0)]
        amount: u64,
        #[arg(long)]
        declined: bool,
    },

    /// Mark a confirmed enrollment completed
    Complete {
        enrollment: String,
        #[arg(long)]
        attended: u32,
        #[arg(long)]
        sessions: u32,
    },

    /// List the learner's offerings that overlap the given one
    Conflicts { learner: String, offering: String },

    /// Manage waitlists
    Waitlist {
        #[command(subcommand)]
        action: WaitlistCommand,
    },

    /// Expire unpaid enrollments and send reminders, once or on an interval
    Sweep {
        /// Repeat every N seconds until interrupted
        #[arg(long)]
        every: Option<u64>,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand)]
pub enum OfferingCommand {
    /// Add an offering from a JSON document on stdin
    Add,
    Show { id: String },
    /// Free seats left
    Seats { id: String },
    Stats { id: String },
    /// Change maximum capacity
    Capacity { id: String, max: u32 },
    /// Change publication status
    Status { id: String, status: String },
}

#[derive(Subcommand)]
pub enum WaitlistCommand {
    Join { learner: String, offering: String },
    Leave { entry: String },
    Show { offering: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("rollcall {}", env!("CARGO_PKG_VERSION"));
        println!("Enrollment kernel for courses and workshops");
        return;
    }

    let ok = commands::run(cli).await;
    if !ok {
        std::process::exit(1);
    }
}
