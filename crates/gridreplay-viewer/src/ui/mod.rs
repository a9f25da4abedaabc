pub mod hud;
pub mod shortcuts;

pub use hud::{day_summary_line, hud_line};
pub use shortcuts::Shortcut;
