use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use netdiag::app::App;
use netdiag::config::AppConfig;
use netdiag::menu::Menu;
use netdiag::render::Renderer;
use netdiag::settings::Settings;

#[derive(Parser)]
#[command(
    name = "netdiag",
    about = "Interactive network diagnostics: ping, traceroute, DNS, public IP and speedtest",
    version,
    long_about = None
)]
struct Cli {
    /// One-time setup: desktop launcher and dependency check
    #[arg(long)]
    setup: bool,

    /// Path to a netdiag.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the enabled probes once and print the summary
    Run {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Do not draw progress bars
        #[arg(long)]
        quiet: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Loading settings decides whether a log file is written, so problems
    // found on the way only reach the console.
    let (config, settings) = netdiag::logging::bootstrap(|| -> Result<_> {
        let config = AppConfig::resolve(cli.config.as_deref())?;
        let settings = Settings::load(&config.paths.settings_file);
        Ok((config, settings))
    })?;
    let app = App::new(config, Renderer::for_terminal());

    let _log_guard = netdiag::logging::init(settings.logging_enabled(), &app.config().paths.log_dir)?;
    tracing::info!("starting netdiag");

    if cli.setup {
        let report = netdiag::setup::run(&app.config().probes);
        match &report.launcher {
            Some(path) => println!("Shortcut created at {}", path.display()),
            None => println!(
                "Could not create desktop shortcut: {}",
                report.launcher_error.as_deref().unwrap_or("unknown error")
            ),
        }
        let missing: Vec<_> = report.missing().collect();
        if missing.is_empty() {
            println!("All probe dependencies found.");
        } else {
            for tool in missing {
                println!("Missing '{}' (needed by {}): {}", tool.program, tool.probe, tool.install_hint);
            }
        }
        return Ok(());
    }

    match cli.command {
        Some(Commands::Run { json, quiet }) => {
            let show_progress = !(json || quiet);
            let results = app.run_probes(&settings, show_progress).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print!("{}", app.renderer().summary(&results));
            }
            if let Some(path) = app.persist_results(&settings, &results) {
                if !json {
                    println!("Results successfully saved at {}", path.display());
                }
            }
        }
        None => {
            let renderer = app.renderer();
            print!("{}{}", renderer.clear_screen(), renderer.banner());
            let stdin = std::io::stdin();
            let mut menu = Menu::new(stdin.lock(), std::io::stdout(), renderer);
            app.interactive(&mut menu).await?;
        }
    }

    Ok(())
}
