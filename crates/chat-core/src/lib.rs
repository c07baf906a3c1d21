//! Chat core: session state, chat store and persistence logic.
//!
//! Talks to the outside world only through the traits in [`ports`].

pub mod ports;
pub mod event_bus;
pub mod chat_store;
pub mod persistence;
pub mod session;

#[cfg(test)]
mod tests;
