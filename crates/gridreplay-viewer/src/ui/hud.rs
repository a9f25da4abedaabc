use gridreplay_core::{DaySummary, VoltageBand};

use crate::graph::ViewCounts;
use crate::playback::PlaybackSession;

/// One status line per session update.
pub fn hud_line(session: &PlaybackSession, counts: &ViewCounts) -> String {
    let mut parts: Vec<String> = Vec::new();

    if session.total_days == 0 {
        parts.push("idle".to_string());
    } else {
        parts.push(format!(
            "day {}/{} {}",
            session.day_index + 1,
            session.total_days,
            session.current_date.as_deref().unwrap_or("----------")
        ));
    }

    match &session.live_metrics {
        Some(live) => {
            parts.push(format!("{} step {}", live.time_label, session.step_index));
            if live.converged {
                parts.push(format!("P {:.1} kW", live.total_power_kw));
                parts.push(format!("loss {:.1} kW", live.total_losses_kw));
                parts.push(format!(
                    "V {:.3}-{:.3} pu",
                    live.min_voltage_pu, live.max_voltage_pu
                ));
                parts.push(format!("viol {}", live.voltage_violations));
                parts.push(format!(
                    "gen {:.1} (pv {:.1} wind {:.1} th {:.1}) kW",
                    live.total_generation_kw,
                    live.total_solar_kw,
                    live.total_wind_kw,
                    live.total_thermal_kw
                ));
            } else {
                parts.push("not converged".to_string());
            }
        }
        None if session.total_days > 0 => parts.push("--:--".to_string()),
        None => {}
    }

    parts.push(format!(
        "buses {} {} {} {} n/a {} | reverse {}",
        VoltageBand::Low.as_str(),
        counts.low,
        VoltageBand::High.as_str(),
        counts.high,
        counts.unknown,
        counts.reverse_flow
    ));
    parts.push(format!("{} ms/step", session.speed_ms));

    if session.paused {
        parts.push("[paused]".to_string());
    }
    if session.fetching {
        parts.push("[fetching]".to_string());
    }
    if !session.playing && session.total_days > 0 && session.error.is_none() {
        parts.push("[done]".to_string());
    }
    if let Some(err) = &session.error {
        parts.push(format!("error: {err}"));
    }
    parts.join(" | ")
}

pub fn day_summary_line(summary: &DaySummary) -> String {
    let mut line = format!(
        "{} {}/{} converged",
        summary.date, summary.converged_steps, summary.total_steps
    );
    if let (Some(avg), Some(peak)) = (summary.avg_power_kw, summary.peak_power_kw) {
        line.push_str(&format!(" | avg {avg:.1} kW peak {peak:.1} kW"));
    }
    if let (Some(lo), Some(hi)) = (summary.min_voltage_pu, summary.max_voltage_pu) {
        line.push_str(&format!(" | V {lo:.3}-{hi:.3} pu"));
    }
    if let Some(violations) = summary.total_violations {
        line.push_str(&format!(" | viol {violations}"));
    }
    line
}
