mod assemble;
mod sink;
mod view;
mod watch;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use webscope_core::BootstrapConfig;

#[derive(Parser)]
#[command(
    name = "webscope",
    version,
    about = "Assembles the effective deployment descriptor of a Java web application",
    long_about = "Webscope scans an exploded web application the way a servlet container does: \
                  it reads web.xml, the web-fragment.xml of every jar and the component annotations \
                  of every class, orders and merges them, and reports the resulting effective descriptor."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one assembly pass and print the effective components
    Assemble {
        /// Root of the exploded web application (the directory holding WEB-INF)
        #[arg(value_name = "WEBAPP")]
        webapp: PathBuf,

        /// JSON bootstrap configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Skip classpath scanning; merge descriptors only
        #[arg(long)]
        no_scan: bool,

        /// Shared library root; locations below it are never scanned
        #[arg(long, value_name = "PATH")]
        shared: Vec<PathBuf>,

        /// Print the effective descriptor as JSON
        #[arg(long)]
        dump: bool,
    },
    /// Deploy, then redeploy whenever a scanned file changes
    #[command(
        long_about = "Deploys the application, arms the reload watcher and runs a new assembly \
                            pass after every burst of changes. Press Ctrl+C to stop."
    )]
    Watch {
        /// Root of the exploded web application (the directory holding WEB-INF)
        #[arg(value_name = "WEBAPP")]
        webapp: PathBuf,

        /// JSON bootstrap configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Debounce window in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 1000)]
        bounce: u64,
    },
}

fn load_config(path: Option<&Path>) -> Result<BootstrapConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(BootstrapConfig::load(path)?),
        None => Ok(BootstrapConfig::default()),
    }
}

pub fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = webscope_runtime::init_logging("cli", true);

    match cli.command {
        Commands::Assemble {
            webapp,
            config,
            no_scan,
            shared,
            dump,
        } => {
            let mut config = load_config(config.as_deref())?;
            if no_scan {
                config.tomcat_scanning = false;
            }
            config.shared_libraries.extend(shared);
            assemble::run(&webapp, config, dump)
        }
        Commands::Watch {
            webapp,
            config,
            bounce,
        } => {
            let mut config = load_config(config.as_deref())?;
            config.watcher_bounce_millis = bounce;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(watch::run(&webapp, config))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
