//! Application state for the TUI.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::TableState;
use tably_core::{
    Database, RawLineItem, RecognizerClient, Session, SplitRecord, Stage, TipMode,
};

/// Which Review field currently receives typed input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ReviewFocus {
    #[default]
    None,
    Tax,
    Tip,
}

/// Main application state.
///
/// All bill semantics live in [`Session`]; this struct only adds the
/// presentation state (selections, text prompts, the in-flight scan).
pub struct App {
    /// The capture-to-finalize state machine
    pub session: Session,
    /// History store; `None` means history is unavailable this run
    store: Option<Database>,
    /// Recognizer client; `None` means captures fail with a config hint
    recognizer: Option<Arc<RecognizerClient>>,
    /// Recent records shown on the Home screen
    pub recent: Vec<SplitRecord>,
    /// Home table selection state
    pub recent_state: TableState,
    /// Assign/Review item selection state
    pub item_state: TableState,
    /// Index into `session.participants()` for the active assignee
    pub active_participant: usize,
    /// Receipt image path being typed on the Capture screen
    pub path_input: String,
    /// Participant name being typed in the add prompt
    pub name_input: String,
    /// Whether the add-participant prompt is open
    pub adding_participant: bool,
    /// Label being typed in the finalize prompt
    pub label_input: String,
    /// Whether the finalize label prompt is open
    pub entering_label: bool,
    /// Which Review field is being edited
    pub review_focus: ReviewFocus,
    /// Pending recognizer result; `Some` while a scan is in flight
    capture_rx: Option<Receiver<tably_core::Result<Vec<RawLineItem>>>>,
    /// Whether the app should exit
    pub should_quit: bool,
}

impl App {
    /// Create a new App over optional store and recognizer handles.
    pub fn new(store: Option<Database>, recognizer: Option<Arc<RecognizerClient>>) -> Self {
        Self {
            session: Session::new(),
            store,
            recognizer,
            recent: Vec::new(),
            recent_state: TableState::default(),
            item_state: TableState::default(),
            active_participant: 0,
            path_input: String::new(),
            name_input: String::new(),
            adding_participant: false,
            label_input: String::new(),
            entering_label: false,
            review_focus: ReviewFocus::None,
            capture_rx: None,
            should_quit: false,
        }
    }

    /// Reload the recent-splits list from the store.
    ///
    /// A missing or broken store reads as an empty history.
    pub fn load_recent(&mut self) {
        self.recent = match &self.store {
            Some(store) => store.load_recent().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to load history");
                Vec::new()
            }),
            None => Vec::new(),
        };
        if self.recent.is_empty() {
            self.recent_state.select(None);
        } else if self.recent_state.selected().is_none() {
            self.recent_state.select(Some(0));
        }
    }

    /// True while a recognizer call is outstanding.
    pub fn scanning(&self) -> bool {
        self.capture_rx.is_some()
    }

    /// Check for a finished scan and advance the session (call each tick).
    pub fn poll_capture(&mut self) {
        let Some(rx) = &self.capture_rx else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(items)) => {
                self.capture_rx = None;
                self.session.complete_capture(items);
                self.item_state.select(if self.session.items().is_empty() {
                    None
                } else {
                    Some(0)
                });
                self.active_participant = 0;
            }
            Ok(Err(e)) => {
                self.capture_rx = None;
                self.session.capture_failed(e.to_string());
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.capture_rx = None;
                self.session.capture_failed("scan worker exited unexpectedly");
            }
        }
    }

    /// Handle keyboard input.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.session.stage() {
            Stage::Home => self.handle_home_key(key),
            Stage::Capturing { .. } => self.handle_capture_key(key),
            Stage::Assigning => self.handle_assign_key(key),
            Stage::Reviewing => self.handle_review_key(key),
        }
    }

    // ========== Home ==========

    fn handle_home_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Char('s') => {
                self.path_input.clear();
                self.session.start_capture();
            }
            KeyCode::Enter => {
                self.open_selected_record();
            }
            KeyCode::Down | KeyCode::Char('j') => {
                select_next(&mut self.recent_state, self.recent.len());
            }
            KeyCode::Up | KeyCode::Char('k') => {
                select_previous(&mut self.recent_state, self.recent.len());
            }
            _ => {}
        }
    }

    /// Reopen the selected record in Review.
    fn open_selected_record(&mut self) {
        let Some(record) = self
            .recent_state
            .selected()
            .and_then(|idx| self.recent.get(idx))
        else {
            return;
        };
        self.session.open_record(record.clone());
        self.review_focus = ReviewFocus::None;
        self.item_state.select(if self.session.items().is_empty() {
            None
        } else {
            Some(0)
        });
        self.active_participant = 0;
    }

    // ========== Capture ==========

    fn handle_capture_key(&mut self, key: KeyEvent) {
        // Input is frozen while the scan is in flight
        if self.scanning() {
            return;
        }
        match key.code {
            KeyCode::Esc => {
                self.session.cancel_capture();
            }
            KeyCode::Enter => {
                self.submit_capture();
            }
            KeyCode::Backspace => {
                self.path_input.pop();
            }
            KeyCode::Char(c) => {
                self.path_input.push(c);
            }
            _ => {}
        }
    }

    /// Read the typed image path and start the recognizer on a worker
    /// thread. Exactly one scan can be outstanding.
    fn submit_capture(&mut self) {
        let path = self.path_input.trim().to_string();
        if path.is_empty() {
            return;
        }

        let Some(recognizer) = self.recognizer.clone() else {
            self.session
                .capture_failed("recognizer not configured (set [recognizer] api_key)");
            return;
        };

        let image = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.session
                    .capture_failed(format!("cannot read {}: {}", path, e));
                return;
            }
        };

        // Clear any previous error and show the scanning indicator
        self.session.start_capture();

        let (tx, rx) = std::sync::mpsc::channel();
        self.capture_rx = Some(rx);
        std::thread::spawn(move || {
            let result = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(tably_core::Error::Io)
                .and_then(|rt| rt.block_on(recognizer.scan_receipt_with_retry(&image)));
            // Receiver may be gone if the app quit mid-scan
            let _ = tx.send(result);
        });
        tracing::info!(path = %path, "receipt scan started");
    }

    // ========== Assign ==========

    fn handle_assign_key(&mut self, key: KeyEvent) {
        if self.adding_participant {
            self.handle_name_prompt_key(key);
            return;
        }
        match key.code {
            KeyCode::Esc => {
                self.session.cancel_assigning();
                self.load_recent();
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.toggle_selected_item();
            }
            KeyCode::Tab => {
                self.cycle_active_participant();
            }
            KeyCode::Char('a') => {
                self.name_input.clear();
                self.adding_participant = true;
            }
            KeyCode::Char('r') => {
                self.session.finish_assigning();
                self.review_focus = ReviewFocus::None;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                select_next(&mut self.item_state, self.session.items().len());
            }
            KeyCode::Up | KeyCode::Char('k') => {
                select_previous(&mut self.item_state, self.session.items().len());
            }
            _ => {}
        }
    }

    fn handle_name_prompt_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.adding_participant = false;
            }
            KeyCode::Enter => {
                // Empty names are silently rejected by the session
                if self.session.add_participant(&self.name_input).is_some() {
                    self.active_participant = self.session.participants().len() - 1;
                }
                self.adding_participant = false;
            }
            KeyCode::Backspace => {
                self.name_input.pop();
            }
            KeyCode::Char(c) => {
                self.name_input.push(c);
            }
            _ => {}
        }
    }

    /// Toggle the active participant on the selected item.
    fn toggle_selected_item(&mut self) {
        let Some(item_id) = self
            .item_state
            .selected()
            .and_then(|idx| self.session.items().get(idx))
            .map(|item| item.id.clone())
        else {
            return;
        };
        let Some(participant_id) = self
            .session
            .participants()
            .get(self.active_participant)
            .map(|p| p.id.clone())
        else {
            return;
        };
        self.session.toggle_item(&item_id, &participant_id);
    }

    fn cycle_active_participant(&mut self) {
        let count = self.session.participants().len();
        if count > 0 {
            self.active_participant = (self.active_participant + 1) % count;
        }
    }

    // ========== Review ==========

    fn handle_review_key(&mut self, key: KeyEvent) {
        if self.entering_label {
            self.handle_label_prompt_key(key);
            return;
        }
        if self.review_focus != ReviewFocus::None {
            self.handle_amount_edit_key(key);
            return;
        }
        match key.code {
            KeyCode::Esc => {
                self.session.back_to_assigning();
            }
            KeyCode::Char('t') => {
                self.review_focus = ReviewFocus::Tax;
            }
            KeyCode::Char('p') => {
                self.review_focus = ReviewFocus::Tip;
            }
            KeyCode::Char('%') => {
                self.session.toggle_tip_mode();
            }
            KeyCode::Char('f') => {
                self.label_input.clear();
                self.entering_label = true;
            }
            _ => {}
        }
    }

    /// Digit entry into the focused tax or tip field. Anything the
    /// calculator cannot parse simply computes as zero.
    fn handle_amount_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => {
                self.review_focus = ReviewFocus::None;
            }
            KeyCode::Backspace => {
                let mut text = self.focused_amount_text().to_string();
                text.pop();
                self.set_focused_amount_text(text);
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                let mut text = self.focused_amount_text().to_string();
                text.push(c);
                self.set_focused_amount_text(text);
            }
            _ => {}
        }
    }

    fn focused_amount_text(&self) -> &str {
        match self.review_focus {
            ReviewFocus::Tip => self.session.tip_text(),
            _ => self.session.tax_text(),
        }
    }

    fn set_focused_amount_text(&mut self, text: String) {
        match self.review_focus {
            ReviewFocus::Tax => self.session.set_tax_text(text),
            ReviewFocus::Tip => self.session.set_tip_text(text),
            ReviewFocus::None => {}
        }
    }

    fn handle_label_prompt_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.entering_label = false;
            }
            KeyCode::Enter => {
                self.entering_label = false;
                self.finalize_session();
            }
            KeyCode::Backspace => {
                self.label_input.pop();
            }
            KeyCode::Char(c) => {
                self.label_input.push(c);
            }
            _ => {}
        }
    }

    /// Freeze the session into a record, save it best-effort, and land
    /// back on Home with the history refreshed.
    fn finalize_session(&mut self) {
        let label = {
            let trimmed = self.label_input.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };

        let Some(record) = self.session.finalize(label) else {
            return;
        };

        match &self.store {
            Some(store) => {
                // A failed save never blocks the settlement the user saw
                if let Err(e) = store.save_record(&record) {
                    tracing::warn!(error = %e, "failed to save split record");
                    self.recent.insert(0, record);
                    self.recent.truncate(tably_core::db::DEFAULT_HISTORY_CAP);
                } else {
                    self.load_recent();
                }
            }
            None => {
                self.recent.insert(0, record);
                self.recent.truncate(tably_core::db::DEFAULT_HISTORY_CAP);
            }
        }

        if !self.recent.is_empty() {
            self.recent_state.select(Some(0));
        }
        self.active_participant = 0;
        self.review_focus = ReviewFocus::None;
    }

    /// Tip mode for the Review footer hint.
    pub fn tip_mode(&self) -> TipMode {
        self.session.tip_mode()
    }
}

/// Select the next row, wrapping.
fn select_next(state: &mut TableState, len: usize) {
    if len == 0 {
        return;
    }
    let i = match state.selected() {
        Some(i) if i >= len - 1 => 0,
        Some(i) => i + 1,
        None => 0,
    };
    state.select(Some(i));
}

/// Select the previous row, wrapping.
fn select_previous(state: &mut TableState, len: usize) {
    if len == 0 {
        return;
    }
    let i = match state.selected() {
        Some(0) | None => len - 1,
        Some(i) => i - 1,
    };
    state.select(Some(i));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_in_assigning() -> App {
        let mut app = App::new(None, None);
        app.session.start_capture();
        app.session.complete_capture(vec![
            RawLineItem {
                name: Some("Burger".to_string()),
                price: Some(serde_json::json!(10.0)),
                quantity: Some(1),
            },
            RawLineItem {
                name: Some("Fries".to_string()),
                price: Some(serde_json::json!(4.0)),
                quantity: Some(1),
            },
        ]);
        app.item_state.select(Some(0));
        app
    }

    #[test]
    fn test_home_quit() {
        let mut app = App::new(None, None);
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn test_home_starts_capture() {
        let mut app = App::new(None, None);
        app.handle_key(key(KeyCode::Char('s')));
        assert!(matches!(app.session.stage(), Stage::Capturing { .. }));
    }

    #[test]
    fn test_capture_without_recognizer_surfaces_error() {
        let mut app = App::new(None, None);
        app.handle_key(key(KeyCode::Char('s')));
        for c in "receipt.jpg".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert!(app
            .session
            .capture_error()
            .is_some_and(|e| e.contains("not configured")));
        // Still on the capture screen, retryable
        assert!(matches!(app.session.stage(), Stage::Capturing { .. }));
    }

    #[test]
    fn test_space_toggles_active_participant() {
        let mut app = app_in_assigning();
        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.session.items()[0]
            .assigned_to
            .contains(tably_core::DEFAULT_PARTICIPANT_ID));

        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.session.items()[0].assigned_to.is_empty());
    }

    #[test]
    fn test_add_participant_prompt() {
        let mut app = app_in_assigning();
        app.handle_key(key(KeyCode::Char('a')));
        assert!(app.adding_participant);
        for c in "Alice".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert!(!app.adding_participant);
        assert_eq!(app.session.participants().len(), 2);
        // The new participant becomes the active assignee
        assert_eq!(app.active_participant, 1);
    }

    #[test]
    fn test_tab_cycles_participants() {
        let mut app = app_in_assigning();
        app.session.add_participant("Alice");
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.active_participant, 1);
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.active_participant, 0);
    }

    #[test]
    fn test_review_amount_editing() {
        let mut app = app_in_assigning();
        app.handle_key(key(KeyCode::Char(' ')));
        app.handle_key(key(KeyCode::Char('r')));
        assert_eq!(*app.session.stage(), Stage::Reviewing);

        app.handle_key(key(KeyCode::Char('t')));
        assert_eq!(app.review_focus, ReviewFocus::Tax);
        // The "0" default is edited in place
        app.handle_key(key(KeyCode::Backspace));
        for c in "1.40".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.session.tax_text(), "1.40");
        assert_eq!(app.review_focus, ReviewFocus::None);
    }

    #[test]
    fn test_finalize_with_label_lands_home() {
        let mut app = app_in_assigning();
        app.handle_key(key(KeyCode::Char(' ')));
        app.handle_key(key(KeyCode::Char('r')));
        app.handle_key(key(KeyCode::Char('f')));
        assert!(app.entering_label);
        for c in "Diner".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(*app.session.stage(), Stage::Home);
        assert_eq!(app.recent.len(), 1);
        assert_eq!(app.recent[0].label.as_deref(), Some("Diner"));
    }

    #[test]
    fn test_reopen_record_from_home() {
        let mut app = app_in_assigning();
        app.handle_key(key(KeyCode::Char(' ')));
        app.handle_key(key(KeyCode::Char('r')));
        app.handle_key(key(KeyCode::Char('f')));
        app.handle_key(key(KeyCode::Enter));

        app.recent_state.select(Some(0));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(*app.session.stage(), Stage::Reviewing);
        assert_eq!(app.session.items().len(), 2);
    }

    #[test]
    fn test_selection_wraps() {
        let mut state = TableState::default();
        select_next(&mut state, 2);
        assert_eq!(state.selected(), Some(0));
        select_next(&mut state, 2);
        assert_eq!(state.selected(), Some(1));
        select_next(&mut state, 2);
        assert_eq!(state.selected(), Some(0));
        select_previous(&mut state, 2);
        assert_eq!(state.selected(), Some(1));
    }
}
