use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};

use catlight::config::Config;
use catlight::queue::EffectQueue;
use catlight::server::{ControlServer, Dispatch};
use catlight::sink;
use clap::Parser;

#[derive(Parser)]
#[command(name = "catlightd", about = "Plays light effects sent over TCP")]
struct Cli {
    /// Configuration file (toml, json or yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    /// Host to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not block other connections while executing an effect
    #[arg(long = "async")]
    concurrent: bool,

    /// Let a new effect interrupt the running one (with --async)
    #[arg(long)]
    preempt: bool,

    /// Driver command reading "R G B" lines on stdin, `-` for stdout
    #[arg(long, value_name = "CMD", num_args = 1..)]
    driver: Option<Vec<String>>,
}

impl Cli {
    fn into_config(self) -> Result<Config, config_file::ConfigFileError> {
        let mut config = match self.config.as_deref() {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(driver) = self.driver {
            config.driver = driver;
        }
        config.concurrent |= self.concurrent;
        config.preempt |= self.preempt;

        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Cannot read configuration: {err}");
            return ExitCode::from(1);
        }
    };

    let sink = match sink::open(&config.driver) {
        Ok(sink) => sink,
        Err(err) => {
            log::error!("Unable to hook up to the light driver: {err}");
            return ExitCode::from(1);
        }
    };

    let queue = Arc::new(Mutex::new(EffectQueue::new(sink)));
    let interrupter = queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .interrupter();

    {
        let queue = Arc::clone(&queue);
        let res = ctrlc::set_handler(move || {
            log::info!("Shutting down, turning the light off");
            interrupter.close();
            let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = queue.turn_off() {
                log::warn!("Could not turn the light off: {err}");
            }
            std::process::exit(0);
        });
        if let Err(err) = res {
            log::warn!("Failed to install Ctrl-C handler: {err}");
        }
    }

    let dispatch = if config.concurrent {
        Dispatch::Concurrent
    } else {
        Dispatch::Serial
    };

    let server = match ControlServer::bind(&config.listen_addr(), queue, dispatch, config.preempt)
    {
        Ok(server) => server,
        Err(err) => {
            log::error!("Error listening on {}: {err}", config.listen_addr());
            return ExitCode::from(2);
        }
    };

    match server.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::from(3)
        }
    }
}
