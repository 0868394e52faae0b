use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::random;

use crate::backtrace_support::current_stacktrace;
use crate::clientoptions::ClientOptions;
use crate::context::Context;
use crate::dsn::Dsn;
use crate::error::Error;
use crate::integrations::{self, Integration};
use crate::protocol::{Breadcrumb, Event, EventType, Level, Param, User, Value};
use crate::scope::Scope;
use crate::session::Session;
use crate::transport::{DefaultTransportFactory, Transport};
use crate::utils::{local_date_parts, microtime, parse_type_from_debug, server_hostname};

/// The streply client.
///
/// The client captures events, runs them through the configured pipeline
/// (scope projection, sampling, integrations, `before_send`) and hands the
/// survivors to the transport.  If the client is not bound to a DSN it is
/// disabled and silently discards everything.
pub struct Client {
    options: ClientOptions,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    context: Context,
    session: Session,
    integrations: Vec<(TypeId, Arc<dyn Integration>)>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("dsn", &self.dsn())
            .field("options", &self.options)
            .field("session", &self.session)
            .finish()
    }
}

impl<T: Into<ClientOptions>> From<T> for Client {
    fn from(o: T) -> Client {
        Client::with_options(o.into())
    }
}

impl Client {
    /// Creates a new client with the given options.
    ///
    /// If the DSN in the options is `None` the client will be entirely
    /// disabled.
    pub fn with_options(mut options: ClientOptions) -> Client {
        crate::macros::set_debug_enabled(options.debug);

        // integrations are set up exactly once each, user-supplied ones
        // take precedence over same-typed defaults
        let mut candidates = options.integrations.clone();
        if options.default_integrations {
            candidates.extend(integrations::default_integrations());
        }
        let mut integrations: Vec<(TypeId, Arc<dyn Integration>)> = Vec::new();
        for integration in candidates {
            let id = integration.as_ref().as_any().type_id();
            if integrations.iter().any(|(other, _)| *other == id) {
                continue;
            }
            if !integration.is_available() {
                streply_debug!("integration {} is not available", integration.name());
                continue;
            }
            if let Err(err) = integration.setup(&mut options) {
                streply_debug!("setup of integration {} failed: {}", integration.name(), err);
                continue;
            }
            integrations.push((id, integration));
        }

        let transport = if options.dsn.is_some() {
            let factory = options
                .transport
                .clone()
                .unwrap_or_else(|| Arc::new(DefaultTransportFactory));
            Some(factory.create_transport(&options))
        } else {
            None
        };

        Client {
            options,
            transport: RwLock::new(transport),
            context: Context::new(),
            session: Session::new(),
            integrations,
        }
    }

    /// The options of this client.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The DSN that constructed this client.
    pub fn dsn(&self) -> Option<&Dsn> {
        self.options.dsn.as_ref()
    }

    /// Whether the client is enabled, that is bound to a transport.
    pub fn is_enabled(&self) -> bool {
        self.transport
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Looks up a set-up integration by type.
    pub fn get_integration<I: Integration>(&self) -> Option<&I> {
        integrations::find_integration(&self.integrations)
    }

    /// Captures a message as an event.
    ///
    /// Returns the delivery handle of the queued event, or `None` when the
    /// event was sampled out, dropped by a hook, or the client is disabled.
    pub fn capture_message(
        &self,
        message: &str,
        ty: EventType,
        level: Level,
        params: Vec<Param>,
    ) -> Result<Option<String>, Error> {
        if message.is_empty() {
            return Err(Error::EmptyMessage);
        }
        let mut event = Event {
            message: message.into(),
            ty,
            level,
            params,
            ..Default::default()
        };
        if self.options.attach_stacktrace {
            event.trace = current_stacktrace();
        }
        Ok(self.capture_event(event))
    }

    /// Captures a plain log entry.
    pub fn log(&self, message: &str, params: Vec<Param>) -> Result<Option<String>, Error> {
        self.capture_message(message, EventType::Log, Level::Normal, params)
    }

    /// Captures an error-typed event from a message.
    pub fn error(
        &self,
        message: &str,
        level: Level,
        params: Vec<Param>,
    ) -> Result<Option<String>, Error> {
        self.capture_message(message, EventType::Error, level, params)
    }

    /// Captures an activity record.
    pub fn activity(&self, message: &str, params: Vec<Param>) -> Result<Option<String>, Error> {
        self.capture_message(message, EventType::Activity, Level::Normal, params)
    }

    /// Captures a `std::error::Error` as an error event.
    ///
    /// The event message comes from the error's `Display` output, the
    /// exception name from its type, and the stack trace from the capture
    /// point.  The chain of sources is attached as `causedBy` parameters.
    pub fn capture_error<E: std::error::Error + ?Sized>(&self, error: &E) -> Option<String> {
        self.capture_error_with(error, Level::High, vec![])
    }

    /// Like [`capture_error`](Client::capture_error) with an explicit
    /// level and extra parameters.
    pub fn capture_error_with<E: std::error::Error + ?Sized>(
        &self,
        error: &E,
        level: Level,
        mut params: Vec<Param>,
    ) -> Option<String> {
        let exception_name = parse_type_from_debug(error);
        let message = match error.to_string() {
            ref s if s.is_empty() => exception_name.clone(),
            s => s,
        };

        let mut source = error.source();
        while let Some(cause) = source {
            params.push(Param::new("causedBy", cause.to_string()));
            source = cause.source();
        }

        let trace = current_stacktrace();
        let (file, line) = match trace.first() {
            Some(frame) => (Some(frame.file.clone()), Some(frame.line)),
            None => (None, None),
        };

        self.capture_event(Event {
            ty: EventType::Error,
            level,
            message,
            exception_name: Some(exception_name),
            params,
            trace,
            file,
            line,
            ..Default::default()
        })
    }

    /// Captures an already assembled event.
    ///
    /// Identifier, timing and environment fields the caller left unset are
    /// filled in, then the scope is projected onto the event and it runs
    /// through sampling, the integrations and `before_send`.
    pub fn capture_event(&self, event: Event) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        if event.message.is_empty() {
            streply_debug!("discarding event without a message");
            return None;
        }
        if !self.sample_should_send() {
            return None;
        }

        let event = self.finalize_event(event);
        let event = self.prepare_event(event)?;
        let handle = event.trace_unique_id.clone();

        let transport = self
            .transport
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match transport {
            Some(transport) => {
                transport.send_event(event);
                Some(handle)
            }
            None => None,
        }
    }

    /// Records a breadcrumb on the current scope.
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
        let breadcrumb = match self.options.before_breadcrumb {
            Some(ref callback) => match callback(breadcrumb) {
                Some(breadcrumb) => breadcrumb,
                None => return,
            },
            None => breadcrumb,
        };
        let max = self.options.max_breadcrumbs;
        self.context
            .with_current_mut(|scope| scope.add_breadcrumb(breadcrumb, max));
    }

    /// Sets the user on the current scope.
    pub fn set_user(&self, user: Option<User>) {
        self.context.with_current_mut(|scope| scope.set_user(user));
    }

    /// Sets a tag on the current scope.
    pub fn set_tag<V: ToString>(&self, key: &str, value: V) {
        let value = value.to_string();
        self.context
            .with_current_mut(|scope| scope.set_tag(key, value));
    }

    /// Sets an extra on the current scope.
    pub fn set_extra(&self, key: &str, value: Value) {
        self.context
            .with_current_mut(|scope| scope.set_extra(key, value));
    }

    /// Invokes a callback with the current scope.
    pub fn with_scope_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scope) -> R,
    {
        self.context.with_current_mut(f)
    }

    /// Pushes a copy of the global scope for the calling thread.
    pub fn push_scope(&self) {
        self.context.push_scope();
    }

    /// Pops the innermost pushed scope of the calling thread.
    pub fn pop_scope(&self) {
        self.context.pop_scope();
    }

    /// The context holding this client's scopes.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The session identifiers of this client.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The collector-assigned id of the last delivered event, if any.
    pub fn last_event_id(&self) -> Option<String> {
        self.transport
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(|transport| transport.last_event_id())
    }

    /// Blocks until all queued events were delivered or the timeout was
    /// reached.  `None` uses the configured `shutdown_timeout`.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        let transport = self
            .transport
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match transport {
            Some(transport) => transport.flush(Some(timeout.unwrap_or(self.options.shutdown_timeout))),
            None => true,
        }
    }

    /// Flushes and disables the client.
    pub fn close(&self, timeout: Option<Duration>) -> bool {
        let transport = self
            .transport
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match transport {
            Some(transport) => {
                transport.shutdown(Some(timeout.unwrap_or(self.options.shutdown_timeout)))
            }
            None => true,
        }
    }

    fn finalize_event(&self, mut event: Event) -> Event {
        if event.trace_unique_id.is_empty() {
            event.trace_unique_id = self.session.next_trace_unique_id();
        }
        if event.trace_id.is_empty() {
            event.trace_id = self.session.trace_id().into();
        }
        if event.session_id.is_empty() {
            event.session_id = self.session.session_id().into();
        }
        if event.user_id.is_empty() {
            event.user_id = self.session.user_id().into();
        }
        if event.time == 0.0 {
            event.time = microtime();
        }
        event.start_time = self.session.start_time();
        event.load_time = (event.time - event.start_time).max(0.0);
        if event.date.is_empty() {
            let (date, zone) = local_date_parts();
            event.date = date;
            event.date_time_zone = zone;
        }

        if event.environment.is_none() {
            event.environment = Some(
                self.options
                    .environment
                    .clone()
                    .unwrap_or_else(|| default_environment())
                    .into_owned(),
            );
        }
        if event.release.is_none() {
            event.release = self.options.release.clone().map(Cow::into_owned);
        }
        if event.project_id.is_none() {
            event.project_id = self.dsn().map(|dsn| dsn.project_id());
        }
        if event.request_user_agent.is_none() {
            event.request_user_agent = server_hostname();
        }
        if event.request_params.is_empty() {
            event.request_params = std::env::args().collect();
        }
        if event.dir.is_none() {
            event.dir = std::env::current_dir()
                .ok()
                .map(|dir| dir.to_string_lossy().into_owned());
        }

        self.context.with_current(|scope| {
            scope.apply_to_event(&mut event, self.options.send_default_pii)
        });

        event
    }

    fn prepare_event(&self, mut event: Event) -> Option<Event> {
        for (_, integration) in &self.integrations {
            event = match integration.process_event(event, &self.options) {
                Some(event) => event,
                None => {
                    streply_debug!("integration dropped an event");
                    return None;
                }
            };
        }
        if let Some(ref before_send) = self.options.before_send {
            event = match before_send(event) {
                Some(event) => event,
                None => {
                    streply_debug!("before_send dropped an event");
                    return None;
                }
            };
        }
        Some(event)
    }

    fn sample_should_send(&self) -> bool {
        let rate = self.options.sample_rate;
        if rate >= 1.0 {
            true
        } else {
            random::<f32>() <= rate
        }
    }
}

fn default_environment() -> Cow<'static, str> {
    if cfg!(debug_assertions) {
        Cow::Borrowed("development")
    } else {
        Cow::Borrowed("production")
    }
}
