use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use argh::FromArgs;
use exitcode::ExitCode;
use natscope::config::Config;
use natscope::console::ConsoleAccumulator;
use natscope::sources::nats::Nats;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[derive(FromArgs)]
#[argh(
    description = "natscope collects server stats from NATS monitoring endpoints",
    help_triggers("-h", "--help")
)]
pub struct RootCommand {
    #[argh(switch, short = 'v', description = "show version")]
    version: bool,

    #[argh(
        option,
        short = 'l',
        default = "\"info\".to_string()",
        description = "log level"
    )]
    log_level: String,

    #[argh(switch, description = "write logs in JSON format")]
    log_json: bool,

    #[argh(
        option,
        short = 'c',
        long = "config",
        description = "read configuration from the file, defaults are used if not set"
    )]
    config: Option<PathBuf>,

    #[argh(switch, description = "run one collection cycle and exit")]
    once: bool,
}

impl RootCommand {
    #![allow(clippy::print_stdout)]
    fn show_version(&self) {
        println!("natscope {}", env!("CARGO_PKG_VERSION"));
    }

    pub fn run(&self) -> Result<(), ExitCode> {
        if self.version {
            self.show_version();
            return Ok(());
        }

        let log_level = std::env::var("NATSCOPE_LOG").unwrap_or(self.log_level.clone());
        let color = std::io::stderr().is_terminal();
        framework::trace::init(color, self.log_json, &log_level);

        let config = match &self.config {
            Some(path) => Config::load(path).map_err(|err| {
                error!(message = "load config failed", ?path, %err);
                exitcode::CONFIG
            })?,
            None => Config::default(),
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("natscope-worker")
            .enable_io()
            .enable_time()
            .build()
            .map_err(|err| {
                error!(message = "build tokio runtime failed", %err);
                exitcode::OSERR
            })?;

        runtime.block_on(collect(config, self.once))
    }
}

async fn collect(config: Config, once: bool) -> Result<(), ExitCode> {
    info!(
        message = "start natscope",
        interval = ?config.interval,
        urls = ?config.nats.urls,
    );

    let acc = Arc::new(ConsoleAccumulator::stdout());
    let mut nats = Nats::new(config.nats);

    // a slow cycle postpones the next one instead of bursting
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {},
            _ = &mut shutdown => {
                info!(message = "signal received, shutting down");
                break;
            }
        }

        if let Err(err) = nats.gather(&acc).await {
            error!(message = "collection cycle failed", %err);

            if once {
                return Err(exitcode::SOFTWARE);
            }
        }

        if once {
            break;
        }
    }

    Ok(())
}
