//! egui panels and the UI-side projection of the chat session.

pub mod panels;
pub mod state;
pub mod theme;
