//! Sidebar: API key, model settings, chat management and chat history.
//!
//! Model settings are edited in place on the session config. Everything
//! that touches the chat store or persistence is returned as an action
//! for the app layer to apply.

use egui::{self, RichText, Vec2};
use chat_types::config::{ClaudeModel, SessionConfig, TokenMode, MAX_TOKENS_STEP, TEMPERATURE_STEP};
use crate::state::UiState;
use crate::theme::*;

pub const CONSOLE_URL: &str = "https://console.anthropic.com/";

/// What the caller should do after rendering the sidebar
#[derive(Debug, Clone, PartialEq)]
pub enum SidebarAction {
    ApiKeyChanged(String),
    CreateChat(String),
    SelectChat(String),
    DeleteChat(String),
}

/// Chat history as the sidebar lists it
pub struct ChatList<'a> {
    pub ids: Vec<&'a str>,
    pub current: &'a str,
    pub default_id: &'a str,
}

/// "Current setting: 4,000 tokens", suffixed in extended mode
pub fn token_caption(config: &SessionConfig) -> String {
    let mut caption = format!(
        "Current setting: {} tokens",
        group_thousands(config.max_tokens())
    );
    if config.token_mode() == TokenMode::Extended {
        caption.push_str(" (Extended)");
    }
    caption
}

/// "Current setting: 0.7 (More Creative)"
pub fn temperature_caption(config: &SessionConfig) -> String {
    format!(
        "Current setting: {:.1} ({})",
        config.temperature(),
        config.temperature_caption()
    )
}

/// 8192 -> "8,192"
fn group_thousands(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Render the sidebar. Returns at most one action per frame.
pub fn sidebar_panel(
    ui: &mut egui::Ui,
    state: &mut UiState,
    config: &mut SessionConfig,
    chats: &ChatList<'_>,
) -> Option<SidebarAction> {
    let mut action = None;

    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.heading(RichText::new("Settings").color(TEXT_PRIMARY));
        ui.separator();

        if let Some(a) = api_key_section(ui, state) {
            action = Some(a);
        }
        section_break(ui);

        model_section(ui, config);
        section_break(ui);

        if let Some(a) = chat_management_section(ui, state) {
            action = Some(a);
        }
        section_break(ui);

        if let Some(a) = chat_history_section(ui, chats, state.is_busy()) {
            action = Some(a);
        }
    });

    action
}

fn section_break(ui: &mut egui::Ui) {
    ui.add_space(12.0);
    ui.separator();
    ui.add_space(4.0);
}

fn api_key_section(ui: &mut egui::Ui, state: &mut UiState) -> Option<SidebarAction> {
    ui.label(RichText::new("API Key").color(ACCENT).strong());
    ui.add_space(2.0);

    ui.label(RichText::new("Anthropic API Key").color(TEXT_SECONDARY).small());
    let edit = egui::TextEdit::singleline(&mut state.api_key_input)
        .password(true)
        .hint_text("sk-ant-api...");
    let changed = ui.add(edit).changed();

    ui.horizontal(|ui| {
        ui.label(RichText::new("Get your key from the").color(TEXT_SECONDARY).small());
        ui.hyperlink_to(RichText::new("Anthropic Console").small(), CONSOLE_URL);
    });

    changed.then(|| SidebarAction::ApiKeyChanged(state.api_key_input.trim().to_string()))
}

fn model_section(ui: &mut egui::Ui, config: &mut SessionConfig) {
    ui.label(RichText::new("Model Settings").color(ACCENT).strong());
    ui.add_space(2.0);

    // Model
    ui.label(RichText::new("Model").color(TEXT_SECONDARY).small());
    egui::ComboBox::from_id_salt("claude_model")
        .selected_text(config.model.label())
        .width(ui.available_width())
        .show_ui(ui, |ui| {
            for model in ClaudeModel::all() {
                ui.selectable_value(&mut config.model, *model, model.label());
            }
        });

    ui.add_space(4.0);

    // System prompt
    ui.label(RichText::new("System Prompt").color(TEXT_SECONDARY).small());
    ui.add(
        egui::TextEdit::multiline(&mut config.system_prompt)
            .desired_rows(4)
            .desired_width(f32::INFINITY),
    );

    ui.add_space(4.0);

    // Token mode
    ui.label(RichText::new("Token Mode").color(TEXT_SECONDARY).small());
    let mut mode = config.token_mode();
    for m in TokenMode::all() {
        ui.radio_value(&mut mode, *m, m.label());
    }
    if mode != config.token_mode() {
        config.set_token_mode(mode);
    }

    // Max tokens
    ui.label(RichText::new("Max Tokens").color(TEXT_SECONDARY).small());
    let mut tokens = config.max_tokens();
    if ui
        .add(
            egui::Slider::new(&mut tokens, mode.min()..=mode.max())
                .step_by(MAX_TOKENS_STEP as f64),
        )
        .changed()
    {
        config.set_max_tokens(tokens);
    }
    ui.label(RichText::new(token_caption(config)).color(TEXT_SECONDARY).small().italics());

    ui.add_space(4.0);

    // Temperature
    ui.label(RichText::new("Temperature").color(TEXT_SECONDARY).small());
    let mut temperature = config.temperature();
    if ui
        .add(egui::Slider::new(&mut temperature, 0.0..=1.0).step_by(TEMPERATURE_STEP as f64))
        .changed()
    {
        config.set_temperature(temperature);
    }
    ui.label(
        RichText::new(temperature_caption(config))
            .color(TEXT_SECONDARY)
            .small()
            .italics(),
    );
}

fn chat_management_section(ui: &mut egui::Ui, state: &mut UiState) -> Option<SidebarAction> {
    ui.label(RichText::new("Chat Management").color(ACCENT).strong());
    ui.add_space(2.0);

    ui.label(RichText::new("New Chat Name").color(TEXT_SECONDARY).small());
    let response = ui.add(
        egui::TextEdit::singleline(&mut state.new_chat_name).hint_text("Enter chat name..."),
    );

    // Creating a chat switches to it, so not while a reply streams
    let create_enabled = !state.is_busy() && !state.new_chat_name.trim().is_empty();
    let btn = ui.add_enabled(
        create_enabled,
        egui::Button::new(RichText::new("Create New Chat").color(TEXT_PRIMARY))
            .fill(if create_enabled { ACCENT } else { BG_SURFACE })
            .corner_radius(PANEL_ROUNDING)
            .min_size(Vec2::new(ui.available_width(), 26.0)),
    );

    let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
    if create_enabled && (btn.clicked() || enter) {
        return state.take_new_chat_name().map(SidebarAction::CreateChat);
    }
    None
}

fn chat_history_section(ui: &mut egui::Ui, chats: &ChatList<'_>, busy: bool) -> Option<SidebarAction> {
    let mut action = None;

    ui.label(RichText::new("Chat History").color(ACCENT).strong());
    ui.add_space(2.0);

    for id in &chats.ids {
        ui.horizontal(|ui| {
            let is_current = *id == chats.current;
            let is_default = *id == chats.default_id;
            let delete_width = if is_default { 0.0 } else { 32.0 };

            let label = if is_current { format!("▸ {}", id) } else { id.to_string() };
            let select = ui.add_enabled(
                !busy,
                egui::Button::new(RichText::new(label).color(TEXT_PRIMARY))
                    .selected(is_current)
                    .min_size(Vec2::new(ui.available_width() - delete_width, 24.0)),
            );
            if select.clicked() && !is_current {
                action = Some(SidebarAction::SelectChat(id.to_string()));
            }

            if !is_default {
                let delete = ui
                    .add_enabled(!busy, egui::Button::new(RichText::new("✕").color(ERROR)))
                    .on_hover_text("Delete chat");
                if delete.clicked() {
                    action = Some(SidebarAction::DeleteChat(id.to_string()));
                }
            }
        });
    }

    action
}
