//! Trading Signal Relay Bot
//!
//! Watches one Telegram source chat for trading-signal messages and
//! republishes the matching ones, reformatted, to a destination channel.
//!
//! ## Architecture
//!
//! ```text
//! Telegram getUpdates → PollingSession → Relay (SignalMatcher → formatter) → ChannelPublisher
//!                            ↑                         │
//!                       Supervisor ←── errors ─────────┘
//!                            ↑
//!          Health endpoint (/restart) · OS signals (shutdown)
//! ```

pub mod config;
pub mod error;
pub mod monitor;
pub mod relay;
pub mod session;
pub mod telegram;

#[cfg(test)]
mod testing;
