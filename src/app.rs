use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend, layout::Rect};
use zeroize::Zeroize;

use crate::actions::{self, ActionEffect};
use crate::backend::{GpgGitBackend, SecretBackend};
use crate::error::ClientError;
use crate::form::{
    FORMAT_OPTIONS, FormState, PANEL_FIELDS, PANEL_SCHEMA, SECRET_FIELDS, SECRET_SCHEMA,
    ValidationCtx, secret,
};
use crate::gate::{AnswerOutcome, AuthGate, GatePhase};
use crate::models::RecordSummary;
use crate::notify::NotificationQueue;
use crate::startup::StartupState;
use crate::storage;
use crate::ui::{self, Pane, ViewState};

const IDLE_TIMEOUT_SECS: u64 = 120;
const STATUS_MESSAGE_SECS: u64 = 2;
const NAV_HINT: &str =
    "Tab focus | ↑/↓ move | Enter next/submit | / search | r decrypt | d delete | Esc quit";

pub fn run() -> Result<()> {
    let bin_name = executable_name();
    let mut self_check = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("{bin_name} v{}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                print_usage(&bin_name);
                return Ok(());
            }
            "--self-check" => self_check = true,
            _ => {}
        }
    }

    if self_check {
        #[cfg(debug_assertions)]
        {
            return run_self_check();
        }
        #[cfg(not(debug_assertions))]
        {
            return Err(anyhow!("--self-check is only available in development builds"));
        }
    }

    let data_dir = storage::ensure_data_dir()?;
    if storage::load_config()?.is_none() {
        storage::save_config(&data_dir)?;
    }
    let mut backend = GpgGitBackend::new(data_dir);
    backend
        .init_workspace()
        .map_err(|e| anyhow!("Failed to prepare the secrets workspace: {e}"))?;
    let startup = StartupState::load(&mut backend);

    let mut app = App::new(backend, startup);
    run_tui(&mut app)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateId {
    Secret,
    Panel,
    Records,
}

struct RevealView {
    title: String,
    payload: String,
}

struct App<B: SecretBackend> {
    backend: B,
    startup: StartupState,
    notifications: NotificationQueue,
    focus: Pane,
    secret_form: FormState<SECRET_FIELDS>,
    secret_step: usize,
    panel_form: FormState<PANEL_FIELDS>,
    panel_step: usize,
    secret_gate: AuthGate,
    panel_gate: AuthGate,
    records_gate: AuthGate,
    records: Vec<RecordSummary>,
    record_idx: usize,
    search: String,
    search_editing: bool,
    answer_input: String,
    show_answer: bool,
    reveal: Option<RevealView>,
    env_blocked: bool,
    quit_overlay: bool,
    status: String,
    status_until: Option<Instant>,
    should_quit: bool,
}

impl<B: SecretBackend> App<B> {
    fn new(backend: B, startup: StartupState) -> Self {
        let env_blocked = !startup.environment.git || !startup.environment.gpg;
        Self {
            backend,
            startup,
            notifications: NotificationQueue::new(),
            focus: Pane::SecretForm,
            secret_form: FormState::new(&SECRET_SCHEMA),
            secret_step: 0,
            panel_form: FormState::new(&PANEL_SCHEMA),
            panel_step: 0,
            secret_gate: AuthGate::new(),
            panel_gate: AuthGate::new(),
            records_gate: AuthGate::new(),
            records: Vec::new(),
            record_idx: 0,
            search: String::new(),
            search_editing: false,
            answer_input: String::new(),
            show_answer: false,
            reveal: None,
            env_blocked,
            quit_overlay: false,
            status: NAV_HINT.to_string(),
            status_until: None,
            should_quit: false,
        }
    }

    fn ctx(&self) -> ValidationCtx {
        ValidationCtx {
            has_remote: self.startup.has_remote,
        }
    }

    fn busy(&self) -> bool {
        self.secret_gate.busy() || self.panel_gate.busy() || self.records_gate.busy()
    }

    fn active_gate_id(&self) -> Option<GateId> {
        if self.secret_gate.phase() != GatePhase::Idle {
            Some(GateId::Secret)
        } else if self.panel_gate.phase() != GatePhase::Idle {
            Some(GateId::Panel)
        } else if self.records_gate.phase() != GatePhase::Idle {
            Some(GateId::Records)
        } else {
            None
        }
    }

    fn gate(&self, id: GateId) -> &AuthGate {
        match id {
            GateId::Secret => &self.secret_gate,
            GateId::Panel => &self.panel_gate,
            GateId::Records => &self.records_gate,
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.status_until = Some(Instant::now() + Duration::from_secs(STATUS_MESSAGE_SECS));
    }

    fn reload_records(&mut self, search: &str, surface_errors: bool) {
        match self.backend.list_records(search) {
            Ok(records) => {
                self.records = records;
                self.record_idx = self.record_idx.min(self.records.len().saturating_sub(1));
            }
            Err(e) => {
                // Initial loads fail quietly, explicit searches are told why.
                if surface_errors {
                    self.notifications.error(e.to_string());
                }
            }
        }
    }

    fn apply_effects(&mut self, effects: &[ActionEffect]) {
        for effect in effects {
            match effect {
                ActionEffect::RefreshRecords => self.reload_records("", false),
                ActionEffect::RecordDeleted(id) => {
                    self.records.retain(|r| &r.id != id);
                    self.record_idx = self.record_idx.min(self.records.len().saturating_sub(1));
                }
                ActionEffect::Revealed { title, payload } => {
                    self.reveal = Some(RevealView {
                        title: title.clone(),
                        payload: payload.clone(),
                    });
                }
                ActionEffect::CredentialsRegistered { email, question } => {
                    self.startup.record_registration(email, question);
                }
                ActionEffect::RemoteRegistered => self.startup.has_remote = true,
            }
        }
    }

    fn after_execution(&mut self, id: GateId, effects: Vec<ActionEffect>) {
        let refreshed = effects
            .iter()
            .any(|e| matches!(e, ActionEffect::RefreshRecords));
        self.apply_effects(&effects);
        match id {
            GateId::Secret => {
                self.secret_form
                    .clear_fields(&[secret::APP, secret::DESC, secret::SECRETS]);
                self.secret_step = 0;
                // The record list changed server-side even when the add failed
                // halfway, so refresh on the failure path too.
                if !refreshed {
                    self.reload_records("", false);
                }
            }
            GateId::Panel => self.panel_form.reset(),
            GateId::Records => {}
        }
    }

    fn cancel_gate(&mut self, id: GateId) {
        match id {
            GateId::Secret => {
                self.secret_gate.cancel();
                self.secret_form
                    .clear_fields(&[secret::APP, secret::DESC, secret::SECRETS]);
                self.secret_step = 0;
            }
            GateId::Panel => {
                self.panel_gate.cancel();
                self.panel_form.reset();
                self.panel_step = 0;
            }
            GateId::Records => self.records_gate.cancel(),
        }
        self.answer_input.zeroize();
        self.answer_input.clear();
        self.show_answer = false;
    }

    fn handle_gate_key(&mut self, id: GateId, key: KeyEvent) {
        let toggle_visibility = matches!(key.code, KeyCode::Char('h') | KeyCode::Char('H'))
            && key.modifiers.contains(KeyModifiers::CONTROL);
        match self.gate(id).phase() {
            GatePhase::AwaitingConfirmation => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    let effects = match id {
                        GateId::Secret => self
                            .secret_gate
                            .confirm(&mut self.backend, &mut self.notifications),
                        GateId::Panel => self
                            .panel_gate
                            .confirm(&mut self.backend, &mut self.notifications),
                        GateId::Records => self
                            .records_gate
                            .confirm(&mut self.backend, &mut self.notifications),
                    };
                    self.after_execution(id, effects);
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.cancel_gate(id);
                    self.set_status("Cancelled");
                }
                _ => {}
            },
            GatePhase::AwaitingChallenge => {
                if toggle_visibility {
                    self.show_answer = !self.show_answer;
                    return;
                }
                match key.code {
                    KeyCode::Esc => {
                        self.cancel_gate(id);
                        self.set_status("Cancelled");
                    }
                    KeyCode::Backspace => {
                        self.answer_input.pop();
                    }
                    KeyCode::Enter => {
                        let answer = self.answer_input.clone();
                        let outcome = match id {
                            GateId::Secret => self.secret_gate.submit_answer(
                                &answer,
                                &mut self.backend,
                                &mut self.notifications,
                            ),
                            GateId::Panel => self.panel_gate.submit_answer(
                                &answer,
                                &mut self.backend,
                                &mut self.notifications,
                            ),
                            GateId::Records => self.records_gate.submit_answer(
                                &answer,
                                &mut self.backend,
                                &mut self.notifications,
                            ),
                        };
                        match outcome {
                            AnswerOutcome::Executed(effects) => {
                                self.answer_input.zeroize();
                                self.answer_input.clear();
                                self.show_answer = false;
                                self.after_execution(id, effects);
                            }
                            AnswerOutcome::Rejected { clear_input } => {
                                if clear_input {
                                    self.answer_input.zeroize();
                                    self.answer_input.clear();
                                }
                            }
                            AnswerOutcome::Ignored => {}
                        }
                    }
                    KeyCode::Char(c) => self.answer_input.push(c),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn submit_secret_form(&mut self) {
        if !self.startup.has_email || !self.startup.has_question {
            self.notifications
                .error(ClientError::PrerequisiteMissing.to_string());
            return;
        }
        let ctx = self.ctx();
        if !self.secret_form.validate_all(&ctx) {
            return;
        }
        match actions::submit_secret(
            self.secret_form.values(),
            self.startup.has_email,
            self.startup.has_question,
            self.startup.has_remote,
            &self.startup.question,
        ) {
            Ok(request) => {
                if let Err(e) = self.secret_gate.guard(request) {
                    self.notifications.error(e.to_string());
                } else {
                    self.answer_input.clear();
                    self.show_answer = false;
                }
            }
            Err(e) => {
                self.notifications.error(e.to_string());
            }
        }
    }

    fn submit_panel_form(&mut self) {
        let ctx = self.ctx();
        if !self.panel_form.validate_all(&ctx) {
            return;
        }
        let request = actions::register_credentials(self.panel_form.values());
        if let Err(e) = self.panel_gate.guard(request) {
            self.notifications.error(e.to_string());
        }
    }

    fn guard_record_action(&mut self, decrypt: bool) {
        let Some(record) = self.records.get(self.record_idx) else {
            self.set_status("No secrets selected");
            return;
        };
        let id = record.id.clone();
        let built = if decrypt {
            actions::decrypt_record(
                &id,
                self.startup.has_email,
                self.startup.has_question,
                &self.startup.question,
            )
        } else {
            actions::delete_record(
                &id,
                self.startup.has_email,
                self.startup.has_question,
                &self.startup.question,
            )
        };
        match built {
            Ok(request) => {
                if let Err(e) = self.records_gate.guard(request) {
                    self.notifications.error(e.to_string());
                } else {
                    self.answer_input.clear();
                    self.show_answer = false;
                    self.set_status("Confirm with y/n or answer the question");
                }
            }
            Err(e) => {
                self.notifications.error(e.to_string());
            }
        }
    }

    fn run_search(&mut self) {
        if !self.startup.has_email || !self.startup.has_question {
            self.notifications
                .error(ClientError::PrerequisiteMissing.to_string());
            return;
        }
        let search = self.search.clone();
        self.reload_records(&search, true);
        self.notifications.success("Search secrets successfully");
        self.search.clear();
        self.search_editing = false;
    }

    fn secret_last_step(&self) -> usize {
        if self.secret_form.value(secret::PUSH) == "yes" && !self.startup.has_remote {
            secret::REPO
        } else {
            secret::PUSH
        }
    }

    fn cycle_format(&mut self, step: i32) {
        let ctx = self.ctx();
        let current = self.secret_form.value(secret::FORMAT);
        let idx = FORMAT_OPTIONS
            .iter()
            .position(|o| *o == current)
            .unwrap_or(0);
        let next = (idx as i32 + step).rem_euclid(FORMAT_OPTIONS.len() as i32) as usize;
        self.secret_form
            .set_value(secret::FORMAT, FORMAT_OPTIONS[next].to_string(), &ctx);
    }

    fn set_push(&mut self, push: bool) {
        let ctx = self.ctx();
        self.secret_form.set_value(
            secret::PUSH,
            if push { "yes" } else { "no" }.to_string(),
            &ctx,
        );
        if self.secret_step > self.secret_last_step() {
            self.secret_step = self.secret_last_step();
        }
    }

    fn format_payload(&mut self) {
        let ctx = self.ctx();
        let payload = self.secret_form.value(secret::SECRETS).to_string();
        match self.secret_form.value(secret::FORMAT) {
            ".json" => match serde_json::from_str::<serde_json::Value>(&payload) {
                Ok(value) => {
                    let pretty = serde_json::to_string_pretty(&value)
                        .unwrap_or_else(|_| payload.clone());
                    self.secret_form.set_value(secret::SECRETS, pretty, &ctx);
                }
                Err(_) => {
                    self.notifications
                        .error(ClientError::Validation("Invalid .json format".into()).to_string());
                }
            },
            ".yml" => {
                let formatted = format_yaml(&payload);
                self.secret_form.set_value(secret::SECRETS, formatted, &ctx);
            }
            _ => {}
        }
    }

    fn handle_secret_form_key(&mut self, key: KeyEvent) {
        let wants_format = matches!(key.code, KeyCode::Char('f') | KeyCode::Char('F'))
            && key.modifiers.contains(KeyModifiers::CONTROL);
        if wants_format && self.secret_step == secret::SECRETS {
            self.format_payload();
            return;
        }
        let ctx = self.ctx();
        match key.code {
            KeyCode::Up | KeyCode::BackTab => self.secret_step = self.secret_step.saturating_sub(1),
            KeyCode::Down => self.secret_step = (self.secret_step + 1).min(self.secret_last_step()),
            KeyCode::Left => match self.secret_step {
                secret::FORMAT => self.cycle_format(-1),
                secret::PUSH => self.set_push(false),
                _ => {}
            },
            KeyCode::Right => match self.secret_step {
                secret::FORMAT => self.cycle_format(1),
                secret::PUSH => self.set_push(true),
                _ => {}
            },
            KeyCode::Backspace => match self.secret_step {
                secret::APP | secret::DESC | secret::SECRETS | secret::REPO => {
                    self.secret_form.pop_char(self.secret_step, &ctx);
                }
                _ => {}
            },
            KeyCode::Enter => {
                if self.secret_step < self.secret_last_step() {
                    self.secret_step += 1;
                } else {
                    self.submit_secret_form();
                }
            }
            KeyCode::Char(c) => match self.secret_step {
                secret::APP | secret::DESC | secret::SECRETS | secret::REPO => {
                    self.secret_form.push_char(self.secret_step, c, &ctx);
                }
                secret::PUSH => match c {
                    'y' => self.set_push(true),
                    'n' => self.set_push(false),
                    _ => {}
                },
                _ => {}
            },
            _ => {}
        }
    }

    fn handle_panel_key(&mut self, key: KeyEvent) {
        if self.startup.has_question {
            return;
        }
        let ctx = self.ctx();
        match key.code {
            KeyCode::Up | KeyCode::BackTab => self.panel_step = self.panel_step.saturating_sub(1),
            KeyCode::Down => self.panel_step = (self.panel_step + 1).min(PANEL_FIELDS - 1),
            KeyCode::Backspace => self.panel_form.pop_char(self.panel_step, &ctx),
            KeyCode::Enter => {
                if self.panel_step < PANEL_FIELDS - 1 {
                    self.panel_step += 1;
                } else {
                    self.submit_panel_form();
                }
            }
            KeyCode::Char(c) => self.panel_form.push_char(self.panel_step, c, &ctx),
            _ => {}
        }
    }

    fn handle_records_key(&mut self, key: KeyEvent) {
        if self.search_editing {
            match key.code {
                KeyCode::Enter => self.run_search(),
                KeyCode::Backspace => {
                    self.search.pop();
                }
                KeyCode::Char(c) => self.search.push(c),
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Up => self.record_idx = self.record_idx.saturating_sub(1),
            KeyCode::Down => {
                if !self.records.is_empty() {
                    self.record_idx = (self.record_idx + 1).min(self.records.len() - 1);
                }
            }
            KeyCode::Char('/') => self.search_editing = true,
            KeyCode::Char('r') | KeyCode::Enter => self.guard_record_action(true),
            KeyCode::Char('d') => self.guard_record_action(false),
            KeyCode::Char('R') => self.reload_records("", false),
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.env_blocked {
            if matches!(key.code, KeyCode::Enter | KeyCode::Char('y')) {
                self.should_quit = true;
            }
            return;
        }
        if self.quit_overlay {
            match key.code {
                KeyCode::Char('y') => self.should_quit = true,
                KeyCode::Char('n') | KeyCode::Esc => self.quit_overlay = false,
                _ => {}
            }
            return;
        }
        if self.reveal.is_some() {
            match key.code {
                KeyCode::Char('c') | KeyCode::Enter => {
                    if let Some(reveal) = &self.reveal {
                        match ui::copy_to_clipboard(&reveal.payload) {
                            Ok(()) => {
                                self.notifications.success("The secrets has been copied");
                            }
                            Err(e) => {
                                self.notifications.error(e.to_string());
                            }
                        }
                    }
                }
                KeyCode::Esc | KeyCode::Char('q') => {
                    if let Some(mut reveal) = self.reveal.take() {
                        reveal.payload.zeroize();
                    }
                }
                _ => {}
            }
            return;
        }
        if let Some(id) = self.active_gate_id() {
            self.handle_gate_key(id, key);
            return;
        }
        match key.code {
            KeyCode::Esc => {
                if self.search_editing {
                    self.search_editing = false;
                } else {
                    self.quit_overlay = true;
                }
            }
            KeyCode::Tab if !self.search_editing => {
                self.focus = match self.focus {
                    Pane::SecretForm => Pane::Credentials,
                    Pane::Credentials => Pane::Records,
                    Pane::Records => Pane::SecretForm,
                };
            }
            _ => match self.focus {
                Pane::SecretForm => self.handle_secret_form_key(key),
                Pane::Credentials => self.handle_panel_key(key),
                Pane::Records => self.handle_records_key(key),
            },
        }
    }

    fn handle_mouse(&mut self, me: MouseEvent, frame: Rect) {
        let areas = ui::notification_areas(frame, self.notifications.items().len());
        let hit = self
            .notifications
            .items()
            .iter()
            .zip(&areas)
            .find(|(_, area)| contains(area, me.column, me.row))
            .map(|(n, _)| n.id);
        match me.kind {
            MouseEventKind::Moved => self.notifications.set_hovered(hit),
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(id) = hit {
                    self.notifications.dismiss(id);
                }
            }
            _ => {}
        }
    }

    fn overlay(&self) -> Option<(String, Vec<String>)> {
        if self.env_blocked {
            return Some(("Exit Secretsafe".into(), self.env_overlay_lines()));
        }
        if let Some(reveal) = &self.reveal {
            return Some((reveal.title.clone(), reveal_overlay_lines(&reveal.payload)));
        }
        if let Some(id) = self.active_gate_id() {
            let gate = self.gate(id);
            if let Some(request) = gate.pending() {
                let lines = match gate.phase() {
                    GatePhase::AwaitingConfirmation => confirm_overlay_lines(&request.prompt),
                    GatePhase::AwaitingChallenge | GatePhase::Verifying => challenge_overlay_lines(
                        &request.prompt,
                        &self.answer_input,
                        self.show_answer,
                        gate.answer_error(),
                        gate.phase() == GatePhase::Verifying,
                    ),
                    _ => Vec::new(),
                };
                if !lines.is_empty() {
                    return Some((request.title.clone(), lines));
                }
            }
        }
        if self.quit_overlay {
            return Some((
                "Confirm quit".into(),
                vec![
                    "Quit?".to_string(),
                    String::new(),
                    "[y] Yes   [n] No".to_string(),
                ],
            ));
        }
        None
    }

    fn env_overlay_lines(&self) -> Vec<String> {
        let mut lines = vec![
            "Welcome to Secretsafe!".to_string(),
            String::new(),
            "Before using Secretsafe, please ensure:".to_string(),
        ];
        if !self.startup.environment.git {
            lines.push("  - Git is not installed. Please install Git first.".to_string());
        }
        if !self.startup.environment.gpg {
            lines.push("  - GPG is not installed. Please install GPG first.".to_string());
        }
        let word = if !self.startup.environment.git && !self.startup.environment.gpg {
            "Those are"
        } else {
            "That is"
        };
        lines.push(String::new());
        lines.push(format!(
            "{word} required for Secretsafe to function properly."
        ));
        lines.push(String::new());
        lines.push("[Enter] Exit".to_string());
        lines
    }

    fn zeroize_sensitive(&mut self) {
        self.secret_form.zeroize_values();
        self.panel_form.zeroize_values();
        self.answer_input.zeroize();
        if let Some(reveal) = &mut self.reveal {
            reveal.payload.zeroize();
        }
    }
}

fn contains(area: &Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

fn run_tui<B: SecretBackend>(app: &mut App<B>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        crossterm::cursor::Hide
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.reload_records("", false);

    let result = (|| -> Result<()> {
        let mut last_activity = Instant::now();
        loop {
            if let Some(until) = app.status_until {
                if Instant::now() >= until {
                    app.status = NAV_HINT.to_string();
                    app.status_until = None;
                }
            }

            if last_activity.elapsed() >= Duration::from_secs(IDLE_TIMEOUT_SECS) {
                break;
            }

            app.notifications.tick();

            terminal.draw(|f| {
                let view = ViewState {
                    startup: &app.startup,
                    focus: app.focus,
                    secret_form: &app.secret_form,
                    secret_step: app.secret_step,
                    panel_form: &app.panel_form,
                    panel_step: app.panel_step,
                    records: &app.records,
                    record_idx: app.record_idx,
                    search: &app.search,
                    search_editing: app.search_editing,
                    busy: app.busy(),
                    status: app.status.clone(),
                    overlay: app.overlay(),
                    notifications: app.notifications.items(),
                };
                ui::draw(f, &view);
            })?;

            if event::poll(Duration::from_millis(200))? {
                match event::read()? {
                    Event::Key(key_event) => {
                        last_activity = Instant::now();
                        app.handle_key(key_event);
                    }
                    Event::Mouse(mouse_event) => {
                        last_activity = Instant::now();
                        let (width, height) = crossterm::terminal::size()?;
                        app.handle_mouse(mouse_event, Rect::new(0, 0, width, height));
                    }
                    _ => {}
                }
            }

            if app.should_quit {
                break;
            }
        }
        Ok(())
    })();

    app.zeroize_sensitive();

    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        crossterm::cursor::Show
    )
    .ok();
    terminal.show_cursor().ok();

    result
}

const OVERLAY_WIDTH: usize = 56;

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn confirm_overlay_lines(prompt: &str) -> Vec<String> {
    let mut lines = wrap_text(prompt, OVERLAY_WIDTH);
    lines.push(String::new());
    lines.push("[y] Yes   [n] No".to_string());
    lines
}

fn challenge_overlay_lines(
    question: &str,
    answer: &str,
    show_answer: bool,
    error: Option<&str>,
    verifying: bool,
) -> Vec<String> {
    let shown = if show_answer {
        answer.to_string()
    } else {
        "*".repeat(answer.chars().count())
    };
    let mut lines = Vec::new();
    for (i, line) in wrap_text(question, OVERLAY_WIDTH).into_iter().enumerate() {
        if i == 0 {
            lines.push(format!("Q: {line}"));
        } else {
            lines.push(format!("   {line}"));
        }
    }
    lines.push(String::new());
    lines.push(format!("A: {shown}"));
    if let Some(error) = error {
        lines.push(format!("   {error}"));
    }
    lines.push(String::new());
    lines.push(if verifying {
        "Verifying...".to_string()
    } else {
        "Enter verify | Esc cancel | Ctrl+h show/hide".to_string()
    });
    lines
}

fn reveal_overlay_lines(payload: &str) -> Vec<String> {
    let all: Vec<&str> = payload.split('\n').collect();
    let truncated = all.len() > 5;
    let mut lines: Vec<String> = all.iter().take(5).map(|s| s.to_string()).collect();
    if truncated {
        lines.push("...".to_string());
        lines.push(String::new());
        lines.push("Content truncated, full content can be obtained via copy.".to_string());
    }
    lines.push(String::new());
    lines.push("[c] Copy   [Esc] Close".to_string());
    lines
}

fn format_yaml(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return line.to_string();
            }
            let indent = line.chars().count() - line.trim_start().chars().count();
            let spaces = " ".repeat(indent);
            if let Some((key, value)) = trimmed.split_once(':') {
                let value = value.trim();
                if value.is_empty() {
                    format!("{spaces}{}:", key.trim())
                } else {
                    format!("{spaces}{}: {value}", key.trim())
                }
            } else if let Some(rest) = trimmed.strip_prefix('-') {
                format!("{spaces}- {}", rest.trim())
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<String>>()
        .join("\n")
}

fn executable_name() -> String {
    let fallback = "secretsafe".to_string();
    let arg0 = match std::env::args().next() {
        Some(v) => v,
        None => return fallback,
    };
    let path = Path::new(&arg0);
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => fallback,
    }
}

fn print_usage(bin_name: &str) {
    eprintln!("Usage: {bin_name} [OPTIONS]");
    eprintln!("  (no options)            Open the secrets UI");
    #[cfg(debug_assertions)]
    eprintln!("      --self-check        Run integrity checks");
    eprintln!("  -V, --version           Show version and exit");
    eprintln!("  -h, --help              Show this help");
}

#[cfg(debug_assertions)]
fn run_self_check() -> Result<()> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    let mut warnings = 0u32;
    let mut failures = 0u32;

    println!("Secretsafe self-check (development build)");
    println!("Home: {}", home.display());

    let data_dir = match storage::load_config()? {
        Some(cfg) => {
            match storage::resolve_dir_under_home(Path::new(&cfg.data_dir), &home) {
                Ok(dir) => {
                    println!("[PASS] Configured data directory is valid: {}", dir.display());
                    dir
                }
                Err(e) => {
                    println!("[FAIL] Invalid configured data directory: {e}");
                    failures += 1;
                    storage::default_base_dir()?
                }
            }
        }
        None => {
            let dir = storage::default_base_dir()?;
            println!(
                "[WARN] No config found at {}; using default {}",
                storage::config_path()?.display(),
                dir.display()
            );
            warnings += 1;
            dir
        }
    };

    if data_dir.exists() {
        println!("[PASS] Data directory exists: {}", data_dir.display());
    } else {
        println!("[WARN] Data directory does not exist yet: {}", data_dir.display());
        warnings += 1;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if data_dir.exists() {
            let mode = std::fs::metadata(&data_dir)?.permissions().mode() & 0o777;
            if mode == 0o700 {
                println!("[PASS] Data directory permissions are 0o700");
            } else {
                println!("[WARN] Data directory permissions are {mode:o}, expected 700");
                warnings += 1;
            }
        }
    }

    let mut backend = GpgGitBackend::new(data_dir.clone());
    match backend.probe_environment() {
        Ok(report) => {
            if report.git {
                println!("[PASS] Git is available");
            } else {
                println!("[FAIL] Git not found in system");
                failures += 1;
            }
            if report.gpg {
                println!("[PASS] GPG is available");
            } else {
                println!("[FAIL] GPG not found in system");
                failures += 1;
            }
        }
        Err(e) => {
            println!("[FAIL] Environment probe failed: {e}");
            failures += 1;
        }
    }

    if data_dir.join(".git").exists() {
        println!("[PASS] Git history is initialized");
    } else {
        println!("[WARN] Git history not initialized yet");
        warnings += 1;
    }

    for (file, label) in [
        ("email.gpg", "GPG email"),
        ("question.gpg", "secret question"),
        ("answer.gpg", "answer verifier"),
    ] {
        if data_dir.join(file).exists() {
            println!("[PASS] Registered {label} present ({file})");
        } else {
            println!("[WARN] No registered {label} yet ({file})");
            warnings += 1;
        }
    }

    match backend.remote_exists() {
        Ok(true) => println!("[PASS] Cloud remote is configured"),
        Ok(false) => {
            println!("[WARN] No cloud remote configured");
            warnings += 1;
        }
        Err(e) => {
            println!("[WARN] Could not check remote: {e}");
            warnings += 1;
        }
    }

    println!("Self-check complete: {failures} failure(s), {warnings} warning(s).");
    if failures > 0 {
        Err(anyhow!("Self-check failed"))
    } else {
        Ok(())
    }
}
