use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::USER_AGENT;
use crate::dsn::Dsn;
use crate::integrations::Integration;
use crate::intodsn::IntoDsn;
use crate::protocol::{Breadcrumb, Event};
use crate::transport::TransportFactory;

/// Type alias for before event/breadcrumb handlers.
pub type BeforeCallback<T> = Arc<dyn Fn(T) -> Option<T> + Send + Sync>;

/// Configuration settings for the client.
///
/// These options are explained in more detail in the general docs of this
/// crate.
///
/// # Examples
///
/// ```
/// let _options = streply::ClientOptions {
///     debug: true,
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    /// The DSN to use.  If not set the client is effectively disabled.
    pub dsn: Option<Dsn>,
    /// Enables diagnostic logging of the client itself.
    pub debug: bool,
    /// The release to be sent with events.
    pub release: Option<Cow<'static, str>>,
    /// The environment to be sent with events.
    ///
    /// Defaults to either `"development"` or `"production"` depending on the
    /// compilation profile.
    pub environment: Option<Cow<'static, str>>,
    /// The sample rate for event submission. (0.0 - 1.0, defaults to 1.0)
    pub sample_rate: f32,
    /// Maximum number of breadcrumbs kept on a scope. (defaults to 100)
    pub max_breadcrumbs: usize,
    /// Attach a stacktrace to message events. (defaults to false)
    pub attach_stacktrace: bool,
    /// If request data such as cookies, query parameters and client IPs
    /// should be sent along. (defaults to false)
    pub send_default_pii: bool,
    /// Callback that is executed before an event is sent.
    pub before_send: Option<BeforeCallback<Event>>,
    /// Callback that is executed for each breadcrumb being added.
    pub before_breadcrumb: Option<BeforeCallback<Breadcrumb>>,
    /// The transport factory creating the delivery backend.
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// The integrations to use.
    pub integrations: Vec<Arc<dyn Integration>>,
    /// Whether to add the default integrations. (defaults to true)
    pub default_integrations: bool,
    /// Maximum number of events waiting for delivery before new ones are
    /// discarded. (defaults to 100)
    pub buffer_size: usize,
    /// How often a failed delivery is attempted before the event is
    /// dropped. (defaults to 5)
    pub retry_max: u32,
    /// Base delay between delivery attempts. (defaults to 1 second)
    pub retry_delay: Duration,
    /// How long the worker waits for pending deliveries on shutdown.
    /// (defaults to 2 seconds)
    pub shutdown_timeout: Duration,
    /// The user agent that should be reported.
    pub user_agent: Cow<'static, str>,
}

impl ClientOptions {
    /// Creates new options.
    pub fn new() -> ClientOptions {
        Default::default()
    }

    /// Adds a configured integration to the options.
    ///
    /// # Examples
    ///
    /// ```
    /// struct MyIntegration;
    ///
    /// impl streply::integrations::Integration for MyIntegration {}
    ///
    /// let options = streply::ClientOptions::new().add_integration(MyIntegration);
    /// assert_eq!(options.integrations.len(), 1);
    /// ```
    #[must_use]
    pub fn add_integration<I: Integration>(mut self, integration: I) -> Self {
        self.integrations.push(Arc::new(integration));
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct BeforeSend;
        let before_send = self.before_send.as_ref().map(|_| BeforeSend);
        #[derive(Debug)]
        struct BeforeBreadcrumb;
        let before_breadcrumb = self.before_breadcrumb.as_ref().map(|_| BeforeBreadcrumb);
        #[derive(Debug)]
        struct TransportFactory;
        let transport = self.transport.as_ref().map(|_| TransportFactory);

        let integrations: Vec<_> = self.integrations.iter().map(|i| i.name()).collect();

        f.debug_struct("ClientOptions")
            .field("dsn", &self.dsn)
            .field("debug", &self.debug)
            .field("release", &self.release)
            .field("environment", &self.environment)
            .field("sample_rate", &self.sample_rate)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("attach_stacktrace", &self.attach_stacktrace)
            .field("send_default_pii", &self.send_default_pii)
            .field("before_send", &before_send)
            .field("before_breadcrumb", &before_breadcrumb)
            .field("transport", &transport)
            .field("integrations", &integrations)
            .field("default_integrations", &self.default_integrations)
            .field("buffer_size", &self.buffer_size)
            .field("retry_max", &self.retry_max)
            .field("retry_delay", &self.retry_delay)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            dsn: None,
            debug: false,
            release: None,
            environment: None,
            sample_rate: 1.0,
            max_breadcrumbs: 100,
            attach_stacktrace: false,
            send_default_pii: false,
            before_send: None,
            before_breadcrumb: None,
            transport: None,
            integrations: vec![],
            default_integrations: true,
            buffer_size: 100,
            retry_max: 5,
            retry_delay: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(2),
            user_agent: Cow::Borrowed(USER_AGENT),
        }
    }
}

impl<T: IntoDsn> From<(T, ClientOptions)> for ClientOptions {
    fn from((into_dsn, mut opts): (T, ClientOptions)) -> ClientOptions {
        opts.dsn = into_dsn.into_dsn().unwrap_or_else(|err| {
            panic!("invalid DSN: {}", err);
        });
        opts
    }
}

impl<T: IntoDsn> From<T> for ClientOptions {
    fn from(into_dsn: T) -> ClientOptions {
        (into_dsn, ClientOptions::default()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_options_debug() {
        let options = ClientOptions::new();
        let debug = format!("{:?}", options);
        assert!(debug.contains("dsn: None"));
        assert!(debug.contains("sample_rate: 1.0"));
        assert!(debug.contains("retry_max: 5"));
    }

    #[test]
    fn test_options_from_dsn_string() {
        let options: ClientOptions = "https://public@streply.example.com/1".into();
        assert_eq!(options.dsn.as_ref().unwrap().public_key(), "public");
    }
}
