pub mod config;
pub mod deck_library;
pub mod gemini_adapter;
pub mod keyboard;
pub mod mic;
pub mod phrase_loader;
pub mod speech;
pub mod terminal;
pub mod uplink;
