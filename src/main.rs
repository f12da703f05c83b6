//! IMAP monitor for the Amperka Cube
//!
//! Polls an IMAP mailbox for unseen messages and blinks the cube green or
//! red when the count passes the configured thresholds.
//!
//! ## Architecture
//! - **Render thread** (std::thread): owns the cube, blinks the latest color
//! - **Monitor** (tokio, main task): polls IMAP, pushes the desired color
//! - **Ctrl+C / SIGTERM**: cube off and closed, IMAP logout, exit status 1
//!
//! ## Usage
//! ```sh
//! ./target/release/cube-mail --config cube-gmail.json -v
//! ```

#[cfg(not(feature = "hardware"))]
fn main() {
    eprintln!("This binary requires the 'hardware' feature (serialport).");
    eprintln!("Build with: cargo build --release");
    eprintln!("Tests can run without it: cargo test --no-default-features");
    std::process::exit(1);
}

#[cfg(feature = "hardware")]
fn main() {
    hardware_main();
    std::process::exit(1);
}

#[cfg(feature = "hardware")]
#[tokio::main(flavor = "current_thread")]
async fn hardware_main() {
    use clap::Parser;
    use cube_mail::config::DEFAULT_CONFIG_PATH;
    use cube_mail::cube::CubeOpener;
    use cube_mail::imap::ImapConnector;
    use cube_mail::retry::ThreadSleeper;
    use cube_mail::{
        BANNER, Config, Controller, ControllerTiming, Monitor, Pacing, Palette, ShutdownSignal,
        Watch, run_monitor, shut_down,
    };
    use std::path::PathBuf;
    use tracing_subscriber::EnvFilter;

    /// IMAP monitor for Amperka Cube
    #[derive(Parser)]
    #[command(name = "cube-mail")]
    #[command(about = "Blink an Amperka Cube when an IMAP mailbox has unread mail")]
    #[command(version)]
    struct Args {
        /// Path to config file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Enable verbose logging (IMAP connection and cube details)
        #[arg(short, long)]
        verbose: bool,

        /// Print state changes without terminal colors
        #[arg(long)]
        no_color: bool,
    }

    let args = Args::parse();

    // RUST_LOG wins over -v when both are given.
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(args.verbose)
        .with_ansi(!args.no_color)
        .compact()
        .init();

    let palette = if args.no_color {
        Palette::plain()
    } else {
        Palette::colored()
    };

    tracing::info!("{} v{}", BANNER, env!("CARGO_PKG_VERSION"));

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{}", err);
            panic!("cannot start without a valid configuration: {err}");
        }
    };
    tracing::debug!(?config, "configuration loaded");
    tracing::info!("Cube: {}", config.cube);
    tracing::info!("Mailbox: {} on {}", config.label, config.addr);
    tracing::info!(
        "Thresholds: green if more than {}, red if more than {}",
        config.green_if_more,
        config.red_if_more
    );

    let shutdown = ShutdownSignal::install().expect("Error setting Ctrl-C handler");

    let controller = Controller::spawn(
        CubeOpener::new(&config.cube),
        ControllerTiming::default(),
        ThreadSleeper,
        palette,
    )
    .expect("Failed to start the cube render thread");

    let monitor = Monitor::new(
        ImapConnector::from_config(&config),
        Watch::from(&config),
        controller.handle(),
        palette,
    );

    let monitor = run_monitor(monitor, Pacing::monitor(), shutdown.wait()).await;
    shut_down(controller, monitor).await;
}
