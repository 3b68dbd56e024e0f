//! Terminal front end: prompt line, thinking panel, answer pane

mod app;
mod keybind;
mod ui;

pub use app::{App, Focus};

use crate::config::Config;
use crate::engine::Engine;
use anyhow::Result;

/// Take over the terminal until the user quits.
pub async fn run(engine: Engine, cfg: &Config) -> Result<()> {
    let terminal = ratatui::init();
    let app = App::new(engine, cfg);
    let result = app.run(terminal).await;
    ratatui::restore();
    result
}
