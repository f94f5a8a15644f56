//! Outbound message template

use crate::telegram::InboundMessage;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;

pub const HEADER: &str = "🔥 TRADING SIGNAL 🔥";

/// Build the forwarded text for `message` stamped with `now`.
///
/// Falls back to the caption, then to an empty body.
pub fn format<Tz>(message: &InboundMessage, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{}\n\n{}\n\n⏰ Time: {}",
        HEADER,
        message.body(),
        render_time(now)
    )
}

/// `3/5/2024, 2:07:09 PM`
pub fn render_time<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    now.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}
