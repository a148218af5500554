//! Interactive text menus.
//!
//! Menus read from any `BufRead` and write to any `Write`, so the whole
//! interaction can be driven from a byte slice in tests. Invalid input
//! re-prompts. End of input counts as choosing "exit" or "back".

use std::io::{self, BufRead, Write};

use tracing::info;

use crate::probes::ProbeKind;
use crate::render::Renderer;
use crate::results::ResultSet;
use crate::settings::Settings;

const PROMPT: &str = "Enter your choice: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainChoice {
    RunNow,
    Settings,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostTestChoice {
    MainMenu,
    Exit,
}

pub struct Menu<R, W> {
    input: R,
    out: W,
    renderer: Renderer,
}

impl<R: BufRead, W: Write> Menu<R, W> {
    pub fn new(input: R, out: W, renderer: Renderer) -> Self {
        Self {
            input,
            out,
            renderer,
        }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Read one line and parse it as a choice in `0..=max`.
    ///
    /// `Ok(None)` means the input is exhausted. Anything unparsable or out
    /// of range prompts again.
    fn read_choice(&mut self, prompt: &str, max: usize) -> io::Result<Option<usize>> {
        loop {
            write!(self.out, "{}", prompt)?;
            self.out.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            match line.trim().parse::<usize>() {
                Ok(n) if n <= max => return Ok(Some(n)),
                _ => writeln!(self.out, "Invalid choice, try again.")?,
            }
        }
    }

    fn heading(&mut self, title: &str) -> io::Result<()> {
        write!(self.out, "{}", self.renderer.clear_screen())?;
        writeln!(self.out, "\n==================== {} ====================", title)
    }

    pub fn main_menu(&mut self) -> io::Result<MainChoice> {
        info!("displaying main menu");
        self.heading("Main Menu")?;
        writeln!(self.out, "1. Run Now")?;
        writeln!(self.out, "2. Settings")?;
        writeln!(self.out, "0. Exit")?;

        Ok(match self.read_choice(PROMPT, 2)? {
            Some(1) => MainChoice::RunNow,
            Some(2) => MainChoice::Settings,
            _ => MainChoice::Exit,
        })
    }

    /// Compact summary followed by the return-or-exit prompt.
    pub fn post_test_menu(&mut self, results: &ResultSet) -> io::Result<PostTestChoice> {
        let summary = self.renderer.compact_summary(results);
        write!(self.out, "{}", summary)?;
        writeln!(self.out, "============ Summary Menu ============")?;
        writeln!(self.out, "1. Return to Main Menu")?;
        writeln!(self.out, "0. Exit")?;

        Ok(match self.read_choice(PROMPT, 1)? {
            Some(1) => PostTestChoice::MainMenu,
            _ => PostTestChoice::Exit,
        })
    }

    /// Edit `settings` in place until the user backs out.
    pub fn settings_menu(&mut self, settings: &mut Settings) -> io::Result<()> {
        loop {
            self.heading("Settings Menu")?;
            writeln!(self.out, "1. Test Preferences")?;
            writeln!(self.out, "2. Notification Settings")?;
            writeln!(self.out, "3. Save Summaries")?;
            writeln!(self.out, "4. Logging Settings")?;
            writeln!(self.out, "0. Back")?;

            match self.read_choice(PROMPT, 4)? {
                Some(1) => self.test_preferences(settings)?,
                Some(2) => {
                    let on = self.switch_menu("Notification Settings", "Notifications", settings.notifications_enabled())?;
                    settings.set_notifications(on);
                    info!(enabled = on, "notification settings updated");
                }
                Some(3) => {
                    let on = self.switch_menu("Save Summaries Settings", "Save Summaries", settings.save_summaries_enabled())?;
                    settings.set_save_summaries(on);
                    info!(enabled = on, "save summaries settings updated");
                }
                Some(4) => {
                    let on = self.switch_menu("Logging Settings", "Logging", settings.logging_enabled())?;
                    settings.set_logging(on);
                    info!(enabled = on, "logging settings updated");
                }
                _ => return Ok(()),
            }
        }
    }

    fn test_preferences(&mut self, settings: &mut Settings) -> io::Result<()> {
        loop {
            self.heading("Test Preferences")?;
            for (i, kind) in ProbeKind::ALL.iter().enumerate() {
                let line = if settings.is_enabled(*kind) {
                    self.renderer.success(&format!("{}. {} - Enabled", i + 1, kind.settings_key()))
                } else {
                    self.renderer.failure(&format!("{}. {} - Disabled", i + 1, kind.settings_key()))
                };
                writeln!(self.out, "{}", line)?;
            }
            writeln!(self.out, "0. Back")?;

            match self.read_choice("Enter test number to toggle or 0 to go back: ", ProbeKind::ALL.len())? {
                Some(n) if n > 0 => {
                    let kind = ProbeKind::ALL[n - 1];
                    let on = settings.toggle(kind);
                    info!(probe = kind.settings_key(), enabled = on, "test preference toggled");
                }
                _ => return Ok(()),
            }
        }
    }

    /// Enable/disable sub-menu. The current state is marked with `<--`.
    fn switch_menu(&mut self, title: &str, subject: &str, mut on: bool) -> io::Result<bool> {
        loop {
            self.heading(title)?;
            let marker_on = if on { self.renderer.success("<--") } else { String::new() };
            let marker_off = if on { String::new() } else { self.renderer.failure("<--") };
            writeln!(self.out, "1. Enable {}{}", subject, marker_on)?;
            writeln!(self.out, "2. Disable {}{}", subject, marker_off)?;
            writeln!(self.out, "0. Back")?;

            match self.read_choice(PROMPT, 2)? {
                Some(1) => on = true,
                Some(2) => on = false,
                _ => return Ok(on),
            }
        }
    }
}
