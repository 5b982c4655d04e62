use std::time::Duration;

use chrono::{Local, TimeDelta};

use crate::identity::CurrentUser;
use crate::session::SessionPhase;

/// `mm:ss`, minutes not capped at 59.
pub fn format_countdown(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Countdown lines are printed every ten seconds and then every second for the last ten.
pub fn should_announce(secs: u64) -> bool {
    secs <= 10 || secs % 10 == 0
}

pub fn warning_banner(secs: u64) -> String {
    format!(
        "*** Your session expires in {}. Type `extend` to stay signed in or `logout` to leave. ***",
        format_countdown(secs)
    )
}

pub fn countdown_line(secs: u64) -> String {
    if secs == 0 {
        "session expiring now".to_string()
    } else {
        format!("session expires in {}", format_countdown(secs))
    }
}

pub fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Idle => "idle",
        SessionPhase::Counting => "active",
        SessionPhase::Warning => "expiring",
        SessionPhase::Expired => "expired",
    }
}

pub fn status_line(user: Option<&CurrentUser>, phase: SessionPhase, expires_in: Option<Duration>) -> String {
    let who = user.map(|u| u.username.as_str()).unwrap_or("<signed out>");
    match expires_in {
        Some(left) => {
            let at = TimeDelta::from_std(left)
                .ok()
                .and_then(|d| Local::now().checked_add_signed(d))
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "?".to_string());
            format!(
                "user: {}, session: {}, expires in {} (at {})",
                who,
                phase_label(phase),
                format_countdown(left.as_secs()),
                at
            )
        }
        None => format!("user: {}, session: {}", who, phase_label(phase)),
    }
}
