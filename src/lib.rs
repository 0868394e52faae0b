//! This crate provides support for logging events, errors and activities
//! to [Streply](https://streply.com/).
//!
//! # Quickstart
//!
//! The most convenient way to use this library is via the [`init`]
//! function, which configures and binds a client for the rest of the
//! program:
//!
//! ```no_run
//! let _streply = streply::init("https://public-key@api.streply.com/1234");
//!
//! streply::log("user signed up", vec![]).ok();
//! ```
//!
//! The client uses a background worker thread for delivery, so it is
//! important to keep the returned guard alive for the lifetime of the
//! program; dropping it flushes and shuts the worker down.
//!
//! More complex setups pass [`ClientOptions`] instead of a plain DSN:
//!
//! ```no_run
//! let _streply = streply::init((
//!     "https://public-key@api.streply.com/1234",
//!     streply::ClientOptions {
//!         release: Some("backend@1.3.0".into()),
//!         environment: Some("production".into()),
//!         ..Default::default()
//!     },
//! ));
//! ```
//!
//! # Scopes
//!
//! Contextual data such as the user, tags and breadcrumbs lives on the
//! scope and is attached to every event captured while it is set.  Global
//! scope data is set with [`set_user`], [`set_tag`] and [`set_extra`];
//! [`configure_scope`] pushes a temporary scope that is discarded again
//! when its guard drops.
//!
//! # Features
//!
//! - `transport` (default): the `ureq` based HTTP transport.
//! - `panic` (default): capture panics as critical error events.
//! - `test`: an event-collecting transport for tests.
//! - `debug-logs`: route internal diagnostics through the `log` crate.

#![warn(missing_docs)]

#[macro_use]
mod macros;

mod api;
mod backtrace_support;
mod client;
mod clientoptions;
mod constants;
mod context;
mod dsn;
mod error;
mod intodsn;
mod project_id;
mod scope;
mod session;
mod source;
mod transport;

pub mod integrations;
pub mod protocol;
pub mod utils;


pub use crate::api::{
    activity, add_breadcrumb, capture_exception, capture_message, client, configure_scope, error,
    flush, init, last_event_id, log, set_extra, set_tag, set_user, ClientInitGuard, ScopeGuard,
};
pub use crate::client::Client;
pub use crate::clientoptions::{BeforeCallback, ClientOptions};
pub use crate::context::Context;
pub use crate::dsn::{Dsn, ParseDsnError, Scheme};
pub use crate::error::Error;
pub use crate::intodsn::IntoDsn;
pub use crate::project_id::{ParseProjectIdError, ProjectId};
pub use crate::protocol::{Breadcrumb, Event, EventType, Frame, Level, Param, RequestData, User};
pub use crate::scope::Scope;
pub use crate::session::Session;
pub use crate::transport::{
    DefaultTransportFactory, DeliveryError, SendFn, Transport, TransportFactory, TransportWorker,
};

#[cfg(feature = "transport")]
pub use crate::transport::HttpTransport;
