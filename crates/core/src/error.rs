//! Shared error surface.
//!
//! Each subsystem defines its own `thiserror` enum; this module only carries
//! the cross-cutting contract: every rejection the orchestration core can
//! emit has a stable machine-readable code so the UI layer can render
//! specific, actionable feedback.

/// Stable machine-readable code for a rejection.
///
/// Codes are SCREAMING_SNAKE_CASE and never change once shipped; the display
/// message may.
pub trait ErrorCode {
    fn code(&self) -> &'static str;
}
