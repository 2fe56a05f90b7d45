//! Parley Desktop — egui app state and UI.

use crate::worker::{Command, Outcome, Worker};
use eframe::egui;
use parley::{Message, MessageId};
use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

const LOG_BUFFER_MAX_LINES: usize = 2000;
const INPUT_HEIGHT: f32 = 28.0;

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Debug
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} [{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        );
        push_log_line(line);
    }

    fn flush(&self) {}
}

static LOGGER: DesktopLogger = DesktopLogger;

pub fn install_logger() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Debug);
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    Chat,
    Logs,
}

/// A failed command shown in the error banner until retried or dismissed.
struct Failure {
    command: Command,
    message: String,
}

/// What the user clicked while the message list was drawn; applied after the frame's borrows end.
enum UiAction {
    StartEdit(MessageId, String),
    SaveEdit,
    CancelEdit,
    Delete(MessageId),
}

pub struct ParleyApp {
    screen: Screen,
    worker: Worker,
    /// Last snapshot from the worker. Only replaced by outcomes, never edited here.
    messages: Vec<Message>,
    /// True once the first load has finished (ok or not).
    loaded: bool,
    /// Commands submitted and not yet answered.
    in_flight: usize,
    input: String,
    /// Message being edited and its draft text.
    editing: Option<(MessageId, String)>,
    failure: Option<Failure>,
}

impl ParleyApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let base_url = match parley::config::load_config(None) {
            Ok((config, _)) => parley::config::resolve_base_url(&config),
            Err(e) => {
                log::warn!("config not loaded, using defaults: {:#}", e);
                parley::config::resolve_base_url(&parley::config::Config::default())
            }
        };
        log::info!("message service at {}", base_url);
        Self::with_worker(Worker::spawn_http(base_url))
    }

    fn with_worker(worker: Worker) -> Self {
        let mut app = Self {
            screen: Screen::default(),
            worker,
            messages: Vec::new(),
            loaded: false,
            in_flight: 0,
            input: String::new(),
            editing: None,
            failure: None,
        };
        app.submit(Command::Load);
        app
    }

    fn submit(&mut self, command: Command) {
        if self.worker.submit(command.clone()) {
            self.in_flight += 1;
        } else {
            self.failure = Some(Failure {
                command,
                message: "store worker stopped".to_string(),
            });
        }
    }

    /// Drain finished commands. Call each frame.
    fn poll_outcomes(&mut self) {
        while let Some(outcome) = self.worker.try_recv() {
            self.handle_outcome(outcome);
        }
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if outcome.command == Command::Load {
            self.loaded = true;
        }
        self.messages = outcome.messages;
        if let Some((id, _)) = &self.editing {
            if !self.messages.iter().any(|m| m.id == *id) {
                self.editing = None;
            }
        }
        match outcome.error {
            Some(message) => {
                self.failure = Some(Failure {
                    command: outcome.command,
                    message,
                })
            }
            None => {
                if self.failure.as_ref().map(|f| &f.command) == Some(&outcome.command) {
                    self.failure = None;
                }
            }
        }
    }

    fn send_input(&mut self) {
        if !parley::message::has_content(&self.input) {
            return;
        }
        let text = std::mem::take(&mut self.input);
        self.submit(Command::Send(text));
    }

    fn retry(&mut self) {
        if let Some(f) = self.failure.take() {
            log::info!("retrying {}", f.command.label());
            self.submit(f.command);
        }
    }

    fn apply_action(&mut self, action: UiAction) {
        match action {
            UiAction::StartEdit(id, text) => self.editing = Some((id, text)),
            UiAction::CancelEdit => self.editing = None,
            UiAction::SaveEdit => match self.editing.take() {
                Some((id, text)) if parley::message::has_content(&text) => {
                    self.submit(Command::Edit(id, text));
                }
                // Blank draft: keep the editor open.
                other => self.editing = other,
            },
            UiAction::Delete(id) => self.submit(Command::Delete(id)),
        }
    }

    fn ui_error_banner(&mut self, ui: &mut egui::Ui) {
        let Some(failure) = &self.failure else {
            return;
        };
        let mut retry = false;
        let mut dismiss = false;
        egui::Frame::none()
            .fill(ui.style().visuals.extreme_bg_color)
            .stroke(egui::Stroke::new(1.0, ui.style().visuals.error_fg_color))
            .rounding(egui::Rounding::same(6.0))
            .inner_margin(egui::Margin::same(8.0))
            .show(ui, |ui| {
                let color = ui.style().visuals.error_fg_color;
                ui.horizontal_wrapped(|ui| {
                    ui.colored_label(
                        color,
                        format!("Could not {}: {}", failure.command.label(), failure.message),
                    );
                    retry = ui.button("Retry").clicked();
                    dismiss = ui.button("Dismiss").clicked();
                });
            });
        ui.add_space(6.0);
        if retry {
            self.retry();
        } else if dismiss {
            self.failure = None;
        }
    }

    fn render_message(
        ui: &mut egui::Ui,
        m: &Message,
        editing: &mut Option<(MessageId, String)>,
    ) -> Option<UiAction> {
        let mut action = None;
        let frame = egui::Frame::none()
            .fill(ui.style().visuals.panel_fill)
            .stroke(egui::Stroke::new(
                1.0,
                ui.style().visuals.widgets.noninteractive.bg_stroke.color,
            ))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(8.0));

        frame.show(ui, |ui| {
            ui.set_width(ui.available_width());
            let is_editing = matches!(editing.as_ref(), Some((id, _)) if *id == m.id);
            let draft = match editing.as_mut() {
                Some((id, text)) if *id == m.id => Some(text),
                _ => None,
            };
            ui.horizontal_wrapped(|ui| {
                ui.label(egui::RichText::new("User:").strong());
                match draft {
                    Some(text) => {
                        let res = ui.text_edit_singleline(text);
                        if res.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                            action = Some(UiAction::SaveEdit);
                        }
                    }
                    None => {
                        ui.label(&m.user_message);
                    }
                }
            });
            ui.horizontal_wrapped(|ui| {
                ui.label(egui::RichText::new("Bot:").strong());
                ui.label(&m.bot_response);
            });
            let can_save =
                matches!(editing.as_ref(), Some((_, t)) if parley::message::has_content(t));
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(&m.timestamp).small().weak());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if is_editing {
                        if ui.small_button("Cancel").clicked() {
                            action = Some(UiAction::CancelEdit);
                        }
                        if ui
                            .add_enabled(can_save, egui::Button::new("Save").small())
                            .clicked()
                        {
                            action = Some(UiAction::SaveEdit);
                        }
                    } else {
                        if ui.small_button("Delete").clicked() {
                            action = Some(UiAction::Delete(m.id));
                        }
                        if ui.small_button("Edit").clicked() {
                            action = Some(UiAction::StartEdit(m.id, m.user_message.clone()));
                        }
                    }
                });
            });
        });
        action
    }

    /// Render the chat widget: header, message list, input bar.
    fn ui_chat(&mut self, ui: &mut egui::Ui) {
        self.ui_error_banner(ui);

        let busy = self.in_flight > 0;
        let mut action = None;
        let list_height = (ui.available_height() - INPUT_HEIGHT - 16.0).max(80.0);
        egui::ScrollArea::vertical()
            .max_height(list_height)
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                if !self.loaded {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Loading messages…");
                    });
                } else if self.messages.is_empty() {
                    ui.weak("No messages yet. Say hi!");
                }
                for m in &self.messages {
                    if let Some(a) = Self::render_message(ui, m, &mut self.editing) {
                        action = Some(a);
                    }
                    ui.add_space(6.0);
                }
            });
        if let Some(a) = action {
            self.apply_action(a);
        }

        ui.add_space(8.0);
        let mut send = false;
        ui.horizontal(|ui| {
            let button_width = 64.0;
            let res = ui.add_sized(
                [ui.available_width() - button_width - 8.0, INPUT_HEIGHT],
                egui::TextEdit::singleline(&mut self.input).hint_text("Type your message..."),
            );
            if res.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                send = true;
                res.request_focus();
            }
            let can_send = parley::message::has_content(&self.input);
            let send_button =
                egui::Button::new("Send").min_size(egui::vec2(button_width, INPUT_HEIGHT));
            if ui.add_enabled(can_send, send_button).clicked() {
                send = true;
            }
            if busy {
                ui.spinner();
            }
        });
        if send {
            self.send_input();
        }
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.monospace(line);
                }
            });
    }
}

impl eframe::App for ParleyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_outcomes();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Chatbot");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.selectable_value(&mut self.screen, Screen::Logs, "Logs");
                    ui.selectable_value(&mut self.screen, Screen::Chat, "Chat");
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.screen {
            Screen::Chat => self.ui_chat(ui),
            Screen::Logs => self.ui_logs_screen(ui),
        });

        if self.in_flight > 0 {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }
}
