//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use qltb_core::api::ApiClient;
use qltb_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "qltb")]
#[command(version)]
#[command(about = "Equipment lending client: sign in and follow your dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,

        /// Password (read from stdin when omitted)
        #[arg(long, env = "QLTB_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// When rate limited, wait out the cool-down and retry once
        #[arg(long)]
        wait: bool,
    },

    /// Create a student account and sign in
    Register(RegisterArgs),

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Show notifications, upcoming returns and the borrowing summary
    Dashboard {
        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Args)]
struct RegisterArgs {
    #[arg(long)]
    full_name: String,

    #[arg(long)]
    email: String,

    /// Password (read from stdin when omitted)
    #[arg(long, env = "QLTB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long)]
    confirm_password: String,

    #[arg(long)]
    student_id: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    #[arg(long)]
    faculty: Option<String>,

    /// Class name, e.g. K65
    #[arg(long = "class", value_name = "CLASS")]
    class_name: Option<String>,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Print a fresh config rendered from defaults
    Generate,
    /// Set the service base URL
    SetUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load().context("load config")?;
    let _log_guard = logging::init(&config.logging).context("init logging")?;

    // single-threaded runtime; everything below is cooperative
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli, config).await })
}

async fn dispatch(cli: Cli, config: config::Config) -> Result<()> {
    match cli.command {
        Commands::Login {
            email,
            password,
            wait,
        } => {
            let api = ApiClient::from_config(&config)?;
            commands::auth::login(api, &email, password, wait).await
        }
        Commands::Register(args) => {
            let api = ApiClient::from_config(&config)?;
            commands::auth::register(api, args.into_profile()?).await
        }
        Commands::Logout => commands::auth::logout(ApiClient::from_config(&config)?),
        Commands::Whoami => commands::auth::whoami(ApiClient::from_config(&config)?),
        Commands::Dashboard { watch } => {
            let api = ApiClient::from_config(&config)?;
            if watch {
                commands::dashboard::watch(api, config.refresh_interval()).await
            } else {
                commands::dashboard::show(api).await
            }
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
            ConfigCommands::SetUrl { url } => commands::config::set_url(&url),
        },
    }
}

impl RegisterArgs {
    fn into_profile(self) -> Result<qltb_core::auth::RegistrationProfile> {
        let password = match self.password {
            Some(password) => password,
            None => commands::auth::read_password()?,
        };
        Ok(qltb_core::auth::RegistrationProfile {
            full_name: self.full_name,
            email: self.email,
            password,
            confirm_password: self.confirm_password,
            student_id: self.student_id,
            phone: self.phone,
            faculty: self.faculty,
            class_name: self.class_name,
        })
    }
}
