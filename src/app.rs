use anyhow::Result;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ChatRequest, ChatResponse, IngestResponse, Mode};
use crate::config::Config;
use crate::panel::ContextPanel;
use crate::transcript::{EntryId, MessageEntry, Transcript};

/// Sample questions offered in the welcome banner; Ctrl-P cycles them into
/// the input editor.
pub const QUICK_PROMPTS: &[&str] = &[
    "What factors affect construction project delays?",
    "What are the payment terms?",
    "How do I handle change orders?",
    "What safety requirements must be followed?",
    "What are the quality standards?",
];

/// How long a finished ingest status line stays visible, in tick events.
const INGEST_STATUS_TICKS: u8 = 10;

/// One turn runs `Idle -> AwaitingResponse -> Idle`; the submit guard and
/// placeholder append happen on the same tick, so the transient submitting
/// phase never needs its own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse { placeholder: EntryId },
}

pub struct App {
    pub should_quit: bool,

    // Input editor
    pub input: String,
    pub cursor: usize,
    quick_prompt_idx: usize,

    // Selected response mode; editable at any time, read at submit.
    pub mode: Mode,

    // Turn state machine. `turn` is the single in-flight gate: while a turn
    // is awaiting its response, submit attempts are no-ops.
    turn: TurnState,
    pub turn_task: Option<JoinHandle<Result<ChatResponse>>>,

    pub transcript: Transcript,
    pub panel: ContextPanel,

    // Ingest state, gated independently of the chat turn.
    pub ingest_running: bool,
    pub ingest_task: Option<JoinHandle<Result<IngestResponse>>>,
    pub ingest_status: Option<String>,
    ingest_status_ticks: u8,

    // Transcript scroll state. The view re-pins to the newest entry after
    // every mutation; manual scrolling unpins until the next append.
    pub transcript_scroll: u16,
    pub stick_to_bottom: bool,
    pub transcript_height: u16,
    pub transcript_total_lines: u16,

    // Ellipsis animation for the placeholder, advanced on Tick.
    pub animation_frame: u8,

    pub api: ApiClient,
}

impl App {
    pub fn new(config: &Config) -> Self {
        Self {
            should_quit: false,

            input: String::new(),
            cursor: 0,
            quick_prompt_idx: 0,

            mode: config.default_mode,

            turn: TurnState::Idle,
            turn_task: None,

            transcript: Transcript::new(),
            panel: ContextPanel::new(),

            ingest_running: false,
            ingest_task: None,
            ingest_status: None,
            ingest_status_ticks: 0,

            transcript_scroll: 0,
            stick_to_bottom: true,
            transcript_height: 0,
            transcript_total_lines: 0,

            animation_frame: 0,

            api: ApiClient::new(&config.server_url),
        }
    }

    pub fn turn_in_flight(&self) -> bool {
        !matches!(self.turn, TurnState::Idle)
    }

    /// Submit guard plus the submitting-phase work. Returns the request to
    /// issue, or None when the action is a no-op (blank question, or a turn
    /// already in flight). On Some: the user entry and the placeholder have
    /// been appended, the input is cleared, and the gate is closed.
    pub fn begin_turn(&mut self) -> Option<ChatRequest> {
        if self.turn_in_flight() {
            return None;
        }
        let question = self.input.trim().to_string();
        if question.is_empty() {
            return None;
        }

        self.transcript.append(MessageEntry::user(question.clone()));
        self.input.clear();
        self.cursor = 0;

        let placeholder = self.transcript.append(MessageEntry::thinking());
        self.turn = TurnState::AwaitingResponse { placeholder };
        self.animation_frame = 0;
        self.stick_to_bottom = true;

        Some(ChatRequest {
            question,
            mode: self.mode,
        })
    }

    /// Resolve the in-flight turn. Placeholder removal and gate re-opening
    /// run before the outcome is inspected, so no path can strand them.
    pub fn finish_turn(&mut self, result: Result<ChatResponse>) {
        let TurnState::AwaitingResponse { placeholder } = self.turn else {
            return;
        };
        self.transcript.remove(placeholder);
        self.turn = TurnState::Idle;

        match result {
            Ok(response) if response.is_ok() => {
                // The panel always reflects the latest resolved turn, even
                // when the backend retrieved nothing.
                self.panel.render(response.contexts);
                let answer = response.answer.unwrap_or_default();
                // The response's mode is authoritative for the badge; it may
                // differ from the mode that was requested.
                self.transcript
                    .append(MessageEntry::assistant(answer, response.mode));
            }
            Ok(response) => {
                let message = response
                    .message
                    .unwrap_or_else(|| "Unknown error".to_string());
                self.transcript
                    .append(MessageEntry::assistant(format!("Error: {message}"), None));
            }
            Err(_) => {
                self.transcript.append(MessageEntry::assistant(
                    "Error contacting server.".to_string(),
                    None,
                ));
            }
        }
        self.stick_to_bottom = true;
    }

    /// Ingest guard; returns false while a build is already running.
    pub fn begin_ingest(&mut self) -> bool {
        if self.ingest_running {
            return false;
        }
        self.ingest_running = true;
        self.ingest_status = Some("Building index...".to_string());
        self.ingest_status_ticks = 0;
        true
    }

    pub fn finish_ingest(&mut self, result: Result<IngestResponse>) {
        self.ingest_running = false;
        self.ingest_status = Some(match result {
            Ok(response) => response
                .message
                .unwrap_or_else(|| "Index built successfully".to_string()),
            Err(_) => "Error building index".to_string(),
        });
        self.ingest_status_ticks = INGEST_STATUS_TICKS;
    }

    pub fn tick(&mut self) {
        if self.turn_in_flight() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        // A finished ingest status fades out; the "Building index..." line
        // stays up for as long as the build runs.
        if !self.ingest_running && self.ingest_status.is_some() {
            self.ingest_status_ticks = self.ingest_status_ticks.saturating_sub(1);
            if self.ingest_status_ticks == 0 {
                self.ingest_status = None;
            }
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    pub fn cycle_quick_prompt(&mut self) {
        let prompt = QUICK_PROMPTS[self.quick_prompt_idx % QUICK_PROMPTS.len()];
        self.quick_prompt_idx = (self.quick_prompt_idx + 1) % QUICK_PROMPTS.len();
        self.input = prompt.to_string();
        self.cursor = self.input.chars().count();
    }

    // Input editing. Cursor is a char index; conversions go through
    // char_to_byte_index for UTF-8 safety.

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_char(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    // Transcript scrolling

    pub fn scroll_up(&mut self) {
        self.stick_to_bottom = false;
        self.transcript_scroll = self.transcript_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let max = self.max_scroll();
        self.transcript_scroll = self.transcript_scroll.saturating_add(1).min(max);
        if self.transcript_scroll == max {
            self.stick_to_bottom = true;
        }
    }

    pub fn scroll_page_up(&mut self) {
        self.stick_to_bottom = false;
        let half = self.transcript_height / 2;
        self.transcript_scroll = self.transcript_scroll.saturating_sub(half.max(1));
    }

    pub fn scroll_page_down(&mut self) {
        let half = self.transcript_height / 2;
        let max = self.max_scroll();
        self.transcript_scroll = self
            .transcript_scroll
            .saturating_add(half.max(1))
            .min(max);
        if self.transcript_scroll == max {
            self.stick_to_bottom = true;
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.stick_to_bottom = true;
        self.transcript_scroll = self.max_scroll();
    }

    fn max_scroll(&self) -> u16 {
        self.transcript_total_lines
            .saturating_sub(self.transcript_height)
    }
}

/// Convert a character index to a byte index for UTF-8 safe string edits.
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::ContextChunk;
    use crate::transcript::Role;
    use anyhow::anyhow;

    fn test_app() -> App {
        App::new(&Config::new())
    }

    fn ok_response(answer: &str, mode: Mode, contexts: Vec<ContextChunk>) -> ChatResponse {
        ChatResponse {
            status: "ok".to_string(),
            message: None,
            answer: Some(answer.to_string()),
            mode: Some(mode),
            contexts: Some(contexts),
        }
    }

    fn error_response(message: &str) -> ChatResponse {
        ChatResponse {
            status: "error".to_string(),
            message: Some(message.to_string()),
            answer: None,
            mode: None,
            contexts: None,
        }
    }

    fn chunk(source: &str, score: f64, text: &str) -> ContextChunk {
        ContextChunk {
            source: source.to_string(),
            score,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_blank_submit_is_noop() {
        let mut app = test_app();
        assert!(app.begin_turn().is_none());

        app.input = "   \t  ".to_string();
        assert!(app.begin_turn().is_none());
        assert!(app.transcript.is_empty());
        assert!(!app.turn_in_flight());
    }

    #[test]
    fn test_submit_appends_user_entry_and_placeholder() {
        let mut app = test_app();
        app.input = "  What are the payment terms?  ".to_string();

        let request = app.begin_turn().expect("guard should pass");
        assert_eq!(request.question, "What are the payment terms?");
        assert_eq!(request.mode, Mode::Online);

        assert!(app.turn_in_flight());
        assert!(app.input.is_empty());
        assert_eq!(app.transcript.len(), 2);

        let entries: Vec<_> = app.transcript.entries().collect();
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].text, "What are the payment terms?");
        assert!(!entries[0].placeholder);
        assert_eq!(entries[1].role, Role::Assistant);
        assert!(entries[1].placeholder);
    }

    #[test]
    fn test_submit_blocked_while_turn_in_flight() {
        let mut app = test_app();
        app.input = "first".to_string();
        app.begin_turn().unwrap();

        app.input = "second".to_string();
        assert!(app.begin_turn().is_none());
        // No entries added for the blocked attempt.
        assert_eq!(app.transcript.len(), 2);
        // The blocked attempt does not clear the input either.
        assert_eq!(app.input, "second");
    }

    #[test]
    fn test_success_replaces_placeholder_with_badged_answer() {
        let mut app = test_app();
        app.input = "What is the refund policy?".to_string();
        app.begin_turn().unwrap();

        app.finish_turn(Ok(ok_response(
            "Refunds within 30 days.",
            Mode::Online,
            vec![chunk("policy.md", 0.912, "Refunds...")],
        )));

        assert!(!app.turn_in_flight());
        assert_eq!(app.transcript.len(), 2);
        let entries: Vec<_> = app.transcript.entries().collect();
        assert!(entries.iter().all(|e| !e.placeholder));
        assert_eq!(entries[1].text, "Refunds within 30 days.");
        assert_eq!(entries[1].mode, Some(Mode::Online));

        assert_eq!(app.panel.chunks().len(), 1);
        assert_eq!(app.panel.chunks()[0].source, "policy.md");
    }

    #[test]
    fn test_response_mode_wins_over_requested_mode() {
        let mut app = test_app();
        app.mode = Mode::Online;
        app.input = "hello".to_string();
        let request = app.begin_turn().unwrap();
        assert_eq!(request.mode, Mode::Online);

        // Backend fell back to offline; the badge must say offline.
        app.finish_turn(Ok(ok_response("hi", Mode::Offline, Vec::new())));
        let last = app.transcript.entries().last().unwrap();
        assert_eq!(last.mode, Some(Mode::Offline));
    }

    #[test]
    fn test_success_with_no_contexts_clears_panel() {
        let mut app = test_app();
        app.input = "first".to_string();
        app.begin_turn().unwrap();
        app.finish_turn(Ok(ok_response(
            "a",
            Mode::Online,
            vec![chunk("old.md", 0.5, "stale")],
        )));
        assert!(!app.panel.is_empty());

        app.input = "second".to_string();
        app.begin_turn().unwrap();
        let mut response = ok_response("b", Mode::Online, Vec::new());
        response.contexts = None;
        app.finish_turn(Ok(response));
        // Missing list counts as empty; no stale chunks survive.
        assert!(app.panel.is_empty());
    }

    #[test]
    fn test_logical_failure_appends_error_and_leaves_panel() {
        let mut app = test_app();
        app.input = "seed".to_string();
        app.begin_turn().unwrap();
        app.finish_turn(Ok(ok_response(
            "a",
            Mode::Online,
            vec![chunk("keep.md", 0.7, "kept")],
        )));

        app.input = "will fail".to_string();
        app.begin_turn().unwrap();
        app.finish_turn(Ok(error_response("index not built")));

        assert!(!app.turn_in_flight());
        let last = app.transcript.entries().last().unwrap();
        assert_eq!(last.text, "Error: index not built");
        assert_eq!(last.mode, None);
        assert!(!last.placeholder);
        assert!(app.transcript.entries().all(|e| !e.placeholder));

        // Panel still shows the previous resolved turn.
        assert_eq!(app.panel.chunks().len(), 1);
        assert_eq!(app.panel.chunks()[0].source, "keep.md");
    }

    #[test]
    fn test_logical_failure_without_message_uses_fallback() {
        let mut app = test_app();
        app.input = "q".to_string();
        app.begin_turn().unwrap();
        let mut response = error_response("ignored");
        response.message = None;
        app.finish_turn(Ok(response));

        let last = app.transcript.entries().last().unwrap();
        assert_eq!(last.text, "Error: Unknown error");
    }

    #[test]
    fn test_transport_failure_appends_generic_error() {
        let mut app = test_app();
        app.input = "q".to_string();
        app.begin_turn().unwrap();
        app.finish_turn(Err(anyhow!("connection refused")));

        assert!(!app.turn_in_flight());
        let last = app.transcript.entries().last().unwrap();
        assert_eq!(last.text, "Error contacting server.");
        assert_eq!(last.mode, None);
        assert!(app.transcript.entries().all(|e| !e.placeholder));
        assert!(app.panel.is_empty());
    }

    #[test]
    fn test_gate_reopens_after_every_outcome() {
        let mut app = test_app();

        for outcome in [
            Ok(ok_response("a", Mode::Online, Vec::new())),
            Ok(error_response("nope")),
            Err(anyhow!("boom")),
        ] {
            app.input = "question".to_string();
            app.begin_turn().unwrap();
            assert!(app.turn_in_flight());
            app.finish_turn(outcome);
            assert!(!app.turn_in_flight());
        }

        // After the cycle above, a fresh submit still works.
        app.input = "again".to_string();
        assert!(app.begin_turn().is_some());
    }

    #[test]
    fn test_finish_without_in_flight_turn_is_noop() {
        let mut app = test_app();
        app.finish_turn(Ok(ok_response("stray", Mode::Online, Vec::new())));
        assert!(app.transcript.is_empty());
        assert!(app.panel.is_empty());
    }

    #[test]
    fn test_exactly_one_placeholder_per_turn() {
        let mut app = test_app();
        app.input = "q".to_string();
        app.begin_turn().unwrap();

        let placeholders = app.transcript.entries().filter(|e| e.placeholder).count();
        assert_eq!(placeholders, 1);

        app.finish_turn(Ok(ok_response("a", Mode::Offline, Vec::new())));
        let placeholders = app.transcript.entries().filter(|e| e.placeholder).count();
        assert_eq!(placeholders, 0);
    }

    #[test]
    fn test_mode_toggle_allowed_while_in_flight() {
        let mut app = test_app();
        app.input = "q".to_string();
        app.begin_turn().unwrap();

        app.toggle_mode();
        assert_eq!(app.mode, Mode::Offline);
        // Toggling mid-flight never affects the turn that already started.
        app.finish_turn(Ok(ok_response("a", Mode::Online, Vec::new())));
        let last = app.transcript.entries().last().unwrap();
        assert_eq!(last.mode, Some(Mode::Online));
    }

    #[test]
    fn test_ingest_gate_and_status_lifecycle() {
        let mut app = test_app();
        assert!(app.begin_ingest());
        assert!(!app.begin_ingest());
        assert_eq!(app.ingest_status.as_deref(), Some("Building index..."));

        // Status holds while the build runs, however long that takes.
        for _ in 0..50 {
            app.tick();
        }
        assert!(app.ingest_status.is_some());

        app.finish_ingest(Ok(IngestResponse {
            message: Some("Documents ingested and index built.".to_string()),
        }));
        assert!(!app.ingest_running);
        assert_eq!(
            app.ingest_status.as_deref(),
            Some("Documents ingested and index built.")
        );

        // Finished status fades out after a few ticks.
        for _ in 0..INGEST_STATUS_TICKS {
            app.tick();
        }
        assert!(app.ingest_status.is_none());
    }

    #[test]
    fn test_ingest_failure_shows_generic_message() {
        let mut app = test_app();
        app.begin_ingest();
        app.finish_ingest(Err(anyhow!("500")));
        assert_eq!(app.ingest_status.as_deref(), Some("Error building index"));
        assert!(app.begin_ingest());
    }

    #[test]
    fn test_placeholder_animation_only_while_in_flight() {
        let mut app = test_app();
        app.tick();
        assert_eq!(app.animation_frame, 0);

        app.input = "q".to_string();
        app.begin_turn().unwrap();
        app.tick();
        app.tick();
        assert_eq!(app.animation_frame, 2);
        app.tick();
        assert_eq!(app.animation_frame, 0);
    }

    #[test]
    fn test_input_editing_utf8() {
        let mut app = test_app();
        for c in "héllo".chars() {
            app.insert_char(c);
        }
        assert_eq!(app.input, "héllo");
        assert_eq!(app.cursor, 5);

        app.cursor_left();
        app.cursor_left();
        app.delete_char();
        assert_eq!(app.input, "hélo");

        app.cursor_home();
        app.cursor_right();
        app.backspace();
        assert_eq!(app.input, "élo");

        app.cursor_end();
        assert_eq!(app.cursor, 3);
    }

    #[test]
    fn test_scroll_to_bottom_repins_after_manual_scroll() {
        let mut app = test_app();
        app.transcript_height = 10;
        app.transcript_total_lines = 50;
        app.transcript_scroll = 40;

        app.scroll_up();
        app.scroll_up();
        assert!(!app.stick_to_bottom);
        assert_eq!(app.transcript_scroll, 38);

        app.scroll_to_bottom();
        assert!(app.stick_to_bottom);
        assert_eq!(app.transcript_scroll, 40);
    }

    #[test]
    fn test_quick_prompts_cycle() {
        let mut app = test_app();
        app.cycle_quick_prompt();
        assert_eq!(app.input, QUICK_PROMPTS[0]);
        assert_eq!(app.cursor, QUICK_PROMPTS[0].chars().count());

        app.cycle_quick_prompt();
        assert_eq!(app.input, QUICK_PROMPTS[1]);

        for _ in 0..QUICK_PROMPTS.len() - 1 {
            app.cycle_quick_prompt();
        }
        assert_eq!(app.input, QUICK_PROMPTS[0]);
    }
}
