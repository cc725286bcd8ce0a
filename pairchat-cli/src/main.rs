use clap::{Parser, Subcommand, ValueEnum};
use pairchat_cli::{ConfigSource, LogConfig, Result, Scenario, Simulator};
use pairchat_core::{EngineConfig, EventProfile};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pairchat")]
#[command(
    version,
    about = "pairchat - session engine configuration and loopback simulation"
)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    Voice,
    Video,
}

impl From<ProfileArg> for EventProfile {
    fn from(profile: ProfileArg) -> Self {
        match profile {
            ProfileArg::Voice => EventProfile::Voice,
            ProfileArg::Video => EventProfile::Video,
        }
    }
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// JSON config file (defaults to the preset of --profile)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Signaling profile
    #[arg(short = 'p', long, value_enum)]
    profile: Option<ProfileArg>,

    /// Display name sent with hang-ups and room joins
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// TURN server URL (optional, format: turn:host:port)
    #[arg(long)]
    turn_server: Option<String>,

    /// TURN username (required if turn-server is set)
    #[arg(long)]
    turn_username: Option<String>,

    /// TURN credential (required if turn-server is set)
    #[arg(long)]
    turn_credential: Option<String>,
}

impl ConfigArgs {
    fn source(self) -> ConfigSource {
        ConfigSource {
            path: self.config,
            profile: self.profile.map(EventProfile::from),
            display_name: self.name,
            turn_server: self.turn_server,
            turn_username: self.turn_username,
            turn_credential: self.turn_credential,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration and print it with every default filled in
    CheckConfig {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the JSON schema of the engine configuration
    Schema,

    /// Run a scripted chat between two in-process clients
    Simulate {
        #[command(flatten)]
        config: ConfigArgs,

        /// Scenario to run (all of them when omitted)
        #[arg(short = 's', long, value_enum)]
        scenario: Option<Scenario>,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,

        /// Include every relayed signal
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging = if cli.verbose {
        LogConfig::dev()
    } else {
        LogConfig::quiet()
    };
    if cli.log_json {
        logging = logging.with_json();
    }
    logging.init()?;

    match cli.command {
        Commands::CheckConfig { config } => {
            let config = config.source().load()?;
            tracing::info!("✅ Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(EngineConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::Simulate {
            config,
            scenario,
            json,
            trace,
        } => {
            let config = config.source().load()?;
            let scenarios = match scenario {
                Some(scenario) => vec![scenario],
                None => Scenario::all().to_vec(),
            };

            for scenario in scenarios {
                let mut simulator = Simulator::new(config.clone(), scenario)?;
                if trace {
                    simulator = simulator.with_trace();
                }
                let report = simulator.run()?;

                if json {
                    println!("{}", serde_json::to_string(&report)?);
                } else {
                    print!("{}", report);
                }
            }
        }
    }

    Ok(())
}
