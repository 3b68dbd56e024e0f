pub mod config;
pub mod engine;
pub mod event;
pub mod id;
pub mod logging;
pub mod provider;
pub mod storage;
pub mod stream;
pub mod tui;
