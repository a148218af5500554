//! A diagnostics session: settings, one or more runs, saved results.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::StoreError;
use crate::menu::{MainChoice, Menu, PostTestChoice};
use crate::orchestrator::Orchestrator;
use crate::probes;
use crate::progress::ProgressSink;
use crate::render::{self, Renderer};
use crate::results::{self, ResultSet};
use crate::settings::Settings;

pub struct App {
    config: AppConfig,
    renderer: Renderer,
}

impl App {
    pub fn new(config: AppConfig, renderer: Renderer) -> Self {
        Self { config, renderer }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn renderer(&self) -> Renderer {
        self.renderer
    }

    pub fn load_settings(&self) -> Settings {
        Settings::load(&self.config.paths.settings_file)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        settings.save(&self.config.paths.settings_file)
    }

    /// Run the probes `settings` enables.
    ///
    /// With `show_progress`, bars are drawn to stdout by a separate task
    /// that finishes once the orchestrator (and with it the sink) is gone.
    pub async fn run_probes(&self, settings: &Settings, show_progress: bool) -> Result<ResultSet> {
        let (sink, events) = if show_progress {
            let (sink, rx) = ProgressSink::channel();
            (sink, Some(rx))
        } else {
            (ProgressSink::disabled(), None)
        };

        let orchestrator = Orchestrator::system(&self.config, sink)?;
        let renderer = self.renderer;
        let drawer = events.map(|rx| {
            tokio::spawn(async move { render::draw_progress(renderer, rx, std::io::stdout()).await })
        });

        let plan = probes::enabled_plan(settings, &self.config.probes);
        let outcome = orchestrator.run(&plan, settings.notifications_enabled()).await;
        drop(orchestrator);

        if let Some(handle) = drawer {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "progress display failed"),
                Err(e) => warn!(error = %e, "progress task panicked"),
            }
        }

        Ok(outcome?)
    }

    /// Save `results` if the settings ask for it. Failures are logged and
    /// otherwise ignored.
    pub fn persist_results(&self, settings: &Settings, results: &ResultSet) -> Option<PathBuf> {
        if !results::should_save(settings) {
            return None;
        }
        match results::save(results, &self.config.paths.results_dir, Local::now()) {
            Ok(path) => {
                info!(path = %path.display(), "results saved");
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "error saving results");
                None
            }
        }
    }

    /// Main menu loop. Returns when the user exits or input runs out.
    pub async fn interactive<R: BufRead, W: Write>(&self, menu: &mut Menu<R, W>) -> Result<()> {
        let mut settings = self.load_settings();

        loop {
            match menu.main_menu()? {
                MainChoice::RunNow => {
                    info!("running network tests chosen");
                    writeln!(menu.output(), "Please wait, running tests...")?;

                    let results = match self.run_probes(&settings, true).await {
                        Ok(results) => results,
                        Err(e) => {
                            error!(error = %e, "network tests could not run");
                            writeln!(menu.output(), "{}", self.renderer.failure(&format!("Error: {:#}", e)))?;
                            continue;
                        }
                    };

                    write!(menu.output(), "{}", self.renderer.summary(&results))?;
                    if let Some(path) = self.persist_results(&settings, &results) {
                        writeln!(menu.output(), "Results successfully saved at {}\n", path.display())?;
                    }

                    if menu.post_test_menu(&results)? == PostTestChoice::Exit {
                        break;
                    }
                }
                MainChoice::Settings => {
                    info!("accessing settings");
                    menu.settings_menu(&mut settings)?;
                    if let Err(e) = self.save_settings(&settings) {
                        error!(error = %e, "error saving settings");
                    }
                    settings = self.load_settings();
                }
                MainChoice::Exit => break,
            }
        }

        info!("exiting main menu");
        Ok(())
    }
}
