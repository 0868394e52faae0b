use std::sync::{Arc, RwLock};
use std::time::Duration;

use lazy_static::lazy_static;

use crate::client::Client;
use crate::error::Error;
use crate::protocol::{Breadcrumb, EventType, Level, Param, RequestData, User, Value};
use crate::scope::Scope;

lazy_static! {
    static ref GLOBAL_CLIENT: RwLock<Option<Arc<Client>>> = RwLock::new(None);
}

/// Helper struct that is returned from `init`.
///
/// When this is dropped the global client flushes, shuts down and is
/// unbound again.
#[must_use = "when the init guard is dropped the client is closed"]
pub struct ClientInitGuard(Arc<Client>);

impl std::ops::Deref for ClientInitGuard {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.0
    }
}

impl ClientInitGuard {
    /// Whether the client is enabled.
    pub fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }
}

impl Drop for ClientInitGuard {
    fn drop(&mut self) {
        if self.0.is_enabled() {
            streply_debug!("dropping client guard -> disposing client");
        } else {
            streply_debug!("dropping client guard (no client to dispose)");
        }
        self.0.close(None);
        let mut global = GLOBAL_CLIENT.write().unwrap_or_else(|e| e.into_inner());
        if let Some(ref bound) = *global {
            if Arc::ptr_eq(bound, &self.0) {
                *global = None;
            }
        }
    }
}

/// Creates the streply client for the given configuration and binds it
/// globally.
///
/// The client is automatically disposed when the returned guard goes out
/// of scope, so the guard should be held for the lifetime of the program:
///
/// ```
/// let _streply = streply::init("");
/// ```
///
/// The configuration can be a DSN string, a parsed [`Dsn`](crate::Dsn),
/// [`ClientOptions`](crate::ClientOptions), or a `(dsn, options)` tuple.
/// An empty string disables the client.
pub fn init<C: Into<Client>>(cfg: C) -> ClientInitGuard {
    let client = Arc::new(cfg.into());
    {
        let mut global = GLOBAL_CLIENT.write().unwrap_or_else(|e| e.into_inner());
        if global.is_some() {
            streply_debug!("rebinding the global client");
        }
        *global = Some(client.clone());
    }
    if !client.is_enabled() {
        streply_debug!("initialized disabled streply client due to missing DSN");
    }
    ClientInitGuard(client)
}

/// The currently bound client, if `init` was called.
pub fn client() -> Option<Arc<Client>> {
    GLOBAL_CLIENT
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

fn with_client<F, R>(f: F) -> Result<R, Error>
where
    F: FnOnce(&Client) -> R,
{
    match client() {
        Some(client) => Ok(f(&client)),
        None => Err(Error::NotInitialized),
    }
}

/// Captures a message on the global client.
///
/// Fails with [`Error::NotInitialized`] when `init` was not called and
/// with [`Error::EmptyMessage`] for an empty message.  On success the
/// delivery handle of the queued event is returned, or `None` when the
/// event was sampled out or dropped by a hook.
pub fn capture_message(
    message: &str,
    ty: EventType,
    level: Level,
    params: Vec<Param>,
) -> Result<Option<String>, Error> {
    with_client(|client| client.capture_message(message, ty, level, params))?
}

/// Captures a plain log entry on the global client.
pub fn log(message: &str, params: Vec<Param>) -> Result<Option<String>, Error> {
    with_client(|client| client.log(message, params))?
}

/// Captures an error-typed event on the global client.
pub fn error(message: &str, level: Level, params: Vec<Param>) -> Result<Option<String>, Error> {
    with_client(|client| client.error(message, level, params))?
}

/// Captures an activity record on the global client.
pub fn activity(message: &str, params: Vec<Param>) -> Result<Option<String>, Error> {
    with_client(|client| client.activity(message, params))?
}

/// Captures a `std::error::Error` on the global client.
pub fn capture_exception<E: std::error::Error + ?Sized>(error: &E) -> Result<Option<String>, Error> {
    with_client(|client| client.capture_error(error))
}

/// Records a breadcrumb on the global client's current scope.
///
/// Does nothing when no client is bound.
pub fn add_breadcrumb(breadcrumb: Breadcrumb) {
    with_client(|client| client.add_breadcrumb(breadcrumb)).ok();
}

/// Sets the user on the global client's current scope.
pub fn set_user(user: Option<User>) {
    with_client(|client| client.set_user(user)).ok();
}

/// Sets a tag on the global client's current scope.
pub fn set_tag<V: ToString>(key: &str, value: V) {
    with_client(|client| client.set_tag(key, value)).ok();
}

/// Sets an extra on the global client's current scope.
pub fn set_extra(key: &str, value: Value) {
    with_client(|client| client.set_extra(key, value)).ok();
}

/// The collector-assigned id of the last event the global client
/// delivered.
pub fn last_event_id() -> Option<String> {
    with_client(|client| client.last_event_id()).ok().flatten()
}

/// Flushes the global client's transport.
pub fn flush(timeout: Option<Duration>) -> bool {
    with_client(|client| client.flush(timeout)).unwrap_or(true)
}

/// A RAII guard for a temporarily pushed scope.
///
/// Data set through the guard lives on a copy of the global scope and is
/// discarded again when the guard is dropped.
#[must_use = "the scope is popped again when the guard is dropped"]
pub struct ScopeGuard {
    client: Arc<Client>,
}

impl ScopeGuard {
    /// Sets the user for the duration of the scope.
    pub fn set_user(&self, user: Option<User>) {
        self.client.set_user(user);
    }

    /// Sets a tag for the duration of the scope.
    pub fn set_tag<V: ToString>(&self, key: &str, value: V) {
        self.client.set_tag(key, value);
    }

    /// Sets an extra for the duration of the scope.
    pub fn set_extra(&self, key: &str, value: Value) {
        self.client.set_extra(key, value);
    }

    /// Sets the flag string for the duration of the scope.
    pub fn set_flag<S: Into<String>>(&self, flag: S) {
        self.client.with_scope_mut(|scope| scope.set_flag(flag));
    }

    /// Sets the url string for the duration of the scope.
    pub fn set_url<S: Into<String>>(&self, url: S) {
        self.client.with_scope_mut(|scope| scope.set_url(url));
    }

    /// Sets the channel string for the duration of the scope.
    pub fn set_channel<S: Into<String>>(&self, channel: S) {
        self.client.with_scope_mut(|scope| scope.set_channel(channel));
    }

    /// Sets the dir string for the duration of the scope.
    pub fn set_dir<S: Into<String>>(&self, dir: S) {
        self.client.with_scope_mut(|scope| scope.set_dir(dir));
    }

    /// Sets the request data snapshot for the duration of the scope.
    pub fn set_request_data(&self, request: RequestData) {
        self.client
            .with_scope_mut(|scope| scope.set_request_data(request));
    }

    /// Clears the request data snapshot of the scope.
    pub fn clear_request_data(&self) {
        self.client.with_scope_mut(Scope::clear_request_data);
    }

    /// Records a breadcrumb on the scope, honoring `before_breadcrumb`
    /// and the breadcrumb bound.
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
        self.client.add_breadcrumb(breadcrumb);
    }

    /// Invokes a callback with mutable access to the scope.
    pub fn with_scope_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scope) -> R,
    {
        self.client.with_scope_mut(f)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.client.pop_scope();
    }
}

/// Pushes a new scope on the global client for the calling thread.
///
/// The scope starts out as a copy of the global scope and is popped when
/// the returned guard is dropped:
///
/// ```no_run
/// let _streply = streply::init("https://public@streply.example.com/1");
/// {
///     let scope = streply::configure_scope().unwrap();
///     scope.set_tag("worker", "imports");
///     // events captured here carry the tag
/// }
/// // the tag is gone again
/// ```
pub fn configure_scope() -> Result<ScopeGuard, Error> {
    match client() {
        Some(client) => {
            client.push_scope();
            Ok(ScopeGuard { client })
        }
        None => Err(Error::NotInitialized),
    }
}
