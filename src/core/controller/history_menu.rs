//! Interactive history manager

use super::{ConnectedMode, Controller, ControllerError, ControllerState};
use crate::core::history::{HistoryEntry, HistoryError, HistoryScope};
use crate::core::input::LineEditor;
use tracing::warn;

impl Controller {
    /// Run one history operation, then return to the command menu
    pub(super) fn manage_history(&mut self) -> Result<(), ControllerError> {
        self.set_state(ControllerState::Connected(ConnectedMode::ManagingHistory));

        self.screen.line("\n=== History ===");
        self.screen.line("1. List all entries");
        self.screen.line("2. Delete entry");
        self.screen.line("3. Remove duplicates");
        self.screen.line("4. Clear all");

        let Some(choice) = self.read_choice("Select (1-4), Esc goes back: ", &['1', '2', '3', '4'])? else {
            return Ok(());
        };

        match choice {
            '1' => self.print_history(HistoryScope::All),
            '2' => self.delete_history_entry()?,
            '3' => match self.history.dedupe(HistoryScope::All) {
                Ok(removed) => self
                    .screen
                    .line(&format!("Removed {} duplicate entries", removed)),
                Err(e) => self.report_history_error(&e),
            },
            _ => {
                if self.confirm("Clear the whole history? (y/n): ")? {
                    match self.history.clear(HistoryScope::All) {
                        Ok(removed) => self
                            .screen
                            .line(&format!("History cleared ({} entries)", removed)),
                        Err(e) => self.report_history_error(&e),
                    }
                }
            }
        }
        Ok(())
    }

    pub(super) fn print_history(&self, scope: HistoryScope) {
        let entries = self.history.list(scope);
        if entries.is_empty() {
            self.screen.line(&format!("(no {} history)", scope));
            return;
        }
        for HistoryEntry { index, mode, value } in entries {
            self.screen
                .line(&format!("  {:>3}. [{}] {}", index + 1, mode.label(), value));
        }
    }

    fn delete_history_entry(&mut self) -> Result<(), ControllerError> {
        if self.history.is_empty() {
            self.screen.line("History is empty.");
            return Ok(());
        }
        self.print_history(HistoryScope::All);

        let line = LineEditor::new(self.input.as_mut(), &self.screen)
            .read_line("Entry number to delete: ", None)?;
        let Some(line) = line else {
            return Ok(());
        };

        match line.trim().parse::<usize>() {
            Ok(n) if n >= 1 => match self.history.remove_at(n - 1) {
                Ok(entry) => self
                    .screen
                    .line(&format!("Deleted [{}] {}", entry.mode.label(), entry.value)),
                Err(e) => self.report_history_error(&e),
            },
            _ => self.screen.line("Enter a valid entry number!"),
        }
        Ok(())
    }

    fn report_history_error(&self, error: &HistoryError) {
        if !matches!(error, HistoryError::IndexOutOfRange { .. }) {
            warn!(error = %error, "History update failed");
        }
        self.screen.line(&format!("Error: {}", error));
    }
}
