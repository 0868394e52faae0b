//! Integrations extend the client with automatic capture behavior.
//!
//! An integration is set up exactly once when the client is created and
//! may hook into event processing via
//! [`process_event`](Integration::process_event).

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use crate::clientoptions::ClientOptions;
use crate::protocol::Event;

#[cfg(feature = "panic")]
mod panic;

#[cfg(feature = "panic")]
pub use panic::PanicIntegration;

/// Integration abstraction.
///
/// An integration in streply has two primary purposes.  It can act as an
/// *event source*, feeding captured events into the bound client, or as an
/// *event processor*, enriching or discarding every event right before
/// submission.
pub trait Integration: Sync + Send + Any + AsAny {
    /// Name of this integration.
    ///
    /// This will default to the type name of the integration.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Whether the integration can be used in the current environment.
    ///
    /// Unavailable integrations are skipped during client setup.
    fn is_available(&self) -> bool {
        true
    }

    /// Called when the integration is attached to the client.
    fn setup(
        &self,
        options: &mut ClientOptions,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _ = options;
        Ok(())
    }

    /// The Integrations Event Processor Hook.
    ///
    /// An integration can process, or even completely drop an event by
    /// returning `None`.
    fn process_event(&self, event: Event, options: &ClientOptions) -> Option<Event> {
        let _ = options;
        Some(event)
    }
}

// This is a dirty workaround necessary to be able to safely downcast
// integrations.
#[doc(hidden)]
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Looks up an integration by type from a set-up list.
pub(crate) fn find_integration<I: Integration>(
    integrations: &[(TypeId, Arc<dyn Integration>)],
) -> Option<&I> {
    integrations
        .iter()
        .find(|(id, _)| *id == TypeId::of::<I>())
        .and_then(|(_, integration)| integration.as_ref().as_any().downcast_ref())
}

/// The integrations attached to every client by default.
pub(crate) fn default_integrations() -> Vec<Arc<dyn Integration>> {
    #[allow(unused_mut)]
    let mut integrations: Vec<Arc<dyn Integration>> = vec![];
    #[cfg(feature = "panic")]
    integrations.push(Arc::new(PanicIntegration::new()));
    integrations
}
