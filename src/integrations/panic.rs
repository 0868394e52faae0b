//! The panic integration.
//!
//! Registers a panic hook which captures every panic as a critical error
//! event and flushes it before the process unwinds further.

use std::panic::{self, PanicHookInfo};
use std::sync::Once;

use crate::backtrace_support::current_stacktrace;
use crate::clientoptions::ClientOptions;
use crate::integrations::Integration;
use crate::protocol::{Event, EventType, Level};

/// A panic handler that sends to the globally bound client.
fn panic_handler(info: &PanicHookInfo<'_>) {
    if let Some(client) = crate::api::client() {
        client.capture_event(event_from_panic_info(info));
        client.flush(None);
    }
}

/// Integration to capture panics.
#[derive(Debug, Default)]
pub struct PanicIntegration;

static INIT: Once = Once::new();

impl PanicIntegration {
    /// Creates a new panic integration.
    pub fn new() -> Self {
        Self
    }
}

impl Integration for PanicIntegration {
    fn name(&self) -> &'static str {
        "panic"
    }

    fn setup(
        &self,
        _options: &mut ClientOptions,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        INIT.call_once(|| {
            let next = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                panic_handler(info);
                next(info);
            }));
        });
        Ok(())
    }
}

/// Extract the message of a panic.
pub fn message_from_panic_info<'a>(info: &'a PanicHookInfo<'_>) -> &'a str {
    match info.payload().downcast_ref::<&'static str>() {
        Some(s) => s,
        None => match info.payload().downcast_ref::<String>() {
            Some(s) => &s[..],
            None => "Box<Any>",
        },
    }
}

/// Creates an event from the given panic info.
///
/// The stacktrace is trimmed to the frames below the panic machinery, and
/// the panic location becomes the event's file and line.
pub fn event_from_panic_info(info: &PanicHookInfo<'_>) -> Event {
    let message = message_from_panic_info(info);
    let (file, line) = match info.location() {
        Some(location) => (Some(location.file().to_string()), Some(location.line())),
        None => (None, None),
    };

    Event {
        ty: EventType::Error,
        level: Level::Critical,
        message: message.to_string(),
        exception_name: Some("panic".into()),
        file,
        line,
        trace: current_stacktrace(),
        ..Default::default()
    }
}
