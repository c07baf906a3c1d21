//! Chat panel: header badges, transcript and input field.

use egui::{self, Align, Layout, RichText, ScrollArea, Vec2};
use chat_types::config::SessionConfig;
use chat_types::message::{Message, Role};
use crate::state::UiState;
use crate::theme::*;

pub const TITLE: &str = "Claude AI Assistant";
pub const NO_API_KEY_WARNING: &str =
    "Please enter your Anthropic API key in the sidebar to start chatting.";

/// What the chat panel needs from the session for one frame
pub struct ChatView<'a> {
    pub chat_id: &'a str,
    pub messages: &'a [Message],
    pub config: &'a SessionConfig,
    pub has_api_key: bool,
}

/// Header badge labels: model, token limit, temperature, current chat
pub fn header_badges(config: &SessionConfig, chat_id: &str) -> [String; 4] {
    [
        config.model.short_label().to_string(),
        format!("{}K tokens", config.max_tokens() / 1000),
        format!("Temp {:.1}", config.temperature()),
        chat_id.to_string(),
    ]
}

/// Render the chat panel. Returns Some(message) when user submits input.
pub fn chat_panel(ui: &mut egui::Ui, state: &mut UiState, view: &ChatView<'_>) -> Option<String> {
    let mut submitted = None;

    egui::Frame::default()
        .fill(BG_PRIMARY)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            ui.vertical(|ui| {
                render_header(ui, state, view);
                ui.separator();

                if !view.has_api_key {
                    ui.add_space(8.0);
                    ui.colored_label(WARNING, NO_API_KEY_WARNING);
                    return;
                }

                // Messages area
                let available_height = ui.available_height() - 60.0;
                ScrollArea::vertical()
                    .max_height(available_height)
                    .auto_shrink([false, false])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for message in view.messages {
                            render_message(ui, message);
                            ui.add_space(4.0);
                        }

                        if state.is_busy() {
                            render_streaming(ui, &state.streaming_text);
                        }

                        if let Some(notice) = &state.notice {
                            egui::Frame::default()
                                .fill(ERROR_BG)
                                .corner_radius(PANEL_ROUNDING)
                                .inner_margin(8.0)
                                .show(ui, |ui| {
                                    ui.label(RichText::new(notice).color(ERROR));
                                });
                        }
                    });

                ui.add_space(8.0);

                if let Some(text) = render_input(ui, state) {
                    submitted = Some(text);
                }
            });
        });

    submitted
}

fn render_header(ui: &mut egui::Ui, state: &UiState, view: &ChatView<'_>) {
    ui.horizontal(|ui| {
        ui.heading(RichText::new(TITLE).color(TEXT_PRIMARY).strong());
        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            let status_color = if state.notice.is_some() {
                ERROR
            } else if state.is_busy() {
                WARNING
            } else {
                SUCCESS
            };
            ui.label(RichText::new(&state.status_text).color(status_color).small());
        });
    });

    ui.horizontal_wrapped(|ui| {
        for (i, label) in header_badges(view.config, view.chat_id).iter().enumerate() {
            // The chat badge stands out from the settings badges
            let fill = if i == 3 { ACCENT_ALT.linear_multiply(0.35) } else { BG_SECONDARY };
            egui::Frame::default()
                .fill(fill)
                .corner_radius(BADGE_ROUNDING)
                .inner_margin(Vec2::new(8.0, 3.0))
                .show(ui, |ui| {
                    ui.label(RichText::new(label).color(TEXT_PRIMARY).small());
                });
        }
        if !state.is_busy() && state.is_saved(view.chat_id) {
            ui.label(RichText::new("✓ Saved").color(SUCCESS).small());
        }
    });
}

fn render_streaming(ui: &mut egui::Ui, text: &str) {
    egui::Frame::default()
        .fill(BG_SECONDARY)
        .corner_radius(PANEL_ROUNDING)
        .inner_margin(8.0)
        .show(ui, |ui| {
            ui.label(RichText::new("Claude").color(ACCENT).strong().small());
            ui.label(RichText::new(format!("{}▌", text)).color(TEXT_PRIMARY));
        });
}

fn render_input(ui: &mut egui::Ui, state: &mut UiState) -> Option<String> {
    let mut submitted = None;
    let enabled = !state.is_busy();

    ui.horizontal(|ui| {
        let input = egui::TextEdit::singleline(&mut state.input_text)
            .hint_text("What would you like to know?")
            .desired_width(ui.available_width() - 70.0)
            .font(egui::FontId::proportional(14.0));

        let response = ui.add_enabled(enabled, input);

        let send_enabled = enabled && !state.input_text.trim().is_empty();
        let send_btn = ui.add_enabled(
            send_enabled,
            egui::Button::new(RichText::new("Send").color(TEXT_PRIMARY))
                .fill(if send_enabled { ACCENT } else { BG_SURFACE })
                .corner_radius(PANEL_ROUNDING)
                .min_size(Vec2::new(60.0, 0.0)),
        );

        // Submit on Enter or button click
        let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if enter || send_btn.clicked() {
            if let Some(text) = state.take_input() {
                submitted = Some(text);
                response.request_focus();
            }
        }
    });

    submitted
}

fn render_message(ui: &mut egui::Ui, message: &Message) {
    let (label, label_color, bg) = match message.role {
        Role::User => ("You", ACCENT_ALT, USER_BUBBLE),
        Role::Assistant => ("Claude", ACCENT, BG_SECONDARY),
    };

    egui::Frame::default()
        .fill(bg)
        .corner_radius(PANEL_ROUNDING)
        .inner_margin(8.0)
        .show(ui, |ui| {
            ui.label(RichText::new(label).color(label_color).strong().small());
            ui.label(RichText::new(&message.content).color(TEXT_PRIMARY));
        });
}
