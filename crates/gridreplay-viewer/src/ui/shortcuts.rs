use anyhow::Result;

use crate::playback::ControllerHandle;

pub const MIN_SPEED_MS: u64 = 10;
pub const MAX_SPEED_MS: u64 = 60_000;

pub const HELP: &str = "\
p        pause
r        resume
s, n     skip one step
q        stop playback
+ / -    faster / slower
? / h    this help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Pause,
    Resume,
    Skip,
    Stop,
    Faster,
    Slower,
    Help,
}

impl Shortcut {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "p" => Some(Self::Pause),
            "r" => Some(Self::Resume),
            "s" | "n" => Some(Self::Skip),
            "q" => Some(Self::Stop),
            "+" => Some(Self::Faster),
            "-" => Some(Self::Slower),
            "?" | "h" => Some(Self::Help),
            _ => None,
        }
    }

    /// New step interval for speed shortcuts, clamped to a sane range.
    pub fn next_speed(self, current_ms: u64) -> Option<u64> {
        let next = match self {
            Self::Faster => current_ms / 2,
            Self::Slower => current_ms.saturating_mul(2),
            _ => return None,
        };
        Some(next.clamp(MIN_SPEED_MS, MAX_SPEED_MS))
    }

    /// Forwards the shortcut to the controller. Returns true for help, which
    /// the caller prints itself.
    pub fn apply(self, handle: &ControllerHandle, current_speed_ms: u64) -> Result<bool> {
        match self {
            Self::Pause => handle.pause()?,
            Self::Resume => handle.resume()?,
            Self::Skip => handle.skip()?,
            Self::Stop => handle.stop()?,
            Self::Faster | Self::Slower => {
                if let Some(ms) = self.next_speed(current_speed_ms) {
                    handle.set_speed(ms)?;
                }
            }
            Self::Help => return Ok(true),
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_key_lines() {
        assert_eq!(Shortcut::parse("p\n"), Some(Shortcut::Pause));
        assert_eq!(Shortcut::parse(" r "), Some(Shortcut::Resume));
        assert_eq!(Shortcut::parse("n"), Some(Shortcut::Skip));
        assert_eq!(Shortcut::parse("s"), Some(Shortcut::Skip));
        assert_eq!(Shortcut::parse("q"), Some(Shortcut::Stop));
        assert_eq!(Shortcut::parse("?"), Some(Shortcut::Help));
        assert_eq!(Shortcut::parse("pause"), None);
        assert_eq!(Shortcut::parse(""), None);
    }

    #[test]
    fn speed_steps_halve_and_double_within_bounds() {
        assert_eq!(Shortcut::Faster.next_speed(500), Some(250));
        assert_eq!(Shortcut::Slower.next_speed(500), Some(1000));
        assert_eq!(Shortcut::Faster.next_speed(12), Some(MIN_SPEED_MS));
        assert_eq!(Shortcut::Slower.next_speed(u64::MAX), Some(MAX_SPEED_MS));
        assert_eq!(Shortcut::Pause.next_speed(500), None);
    }
}
