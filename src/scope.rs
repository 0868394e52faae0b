use std::collections::VecDeque;
use std::fmt;

use crate::protocol::{Breadcrumb, Event, Map, Param, RequestData, User, Value};

/// Holds contextual data attached to subsequently captured events.
///
/// A scope is a plain bag of values: the user, tags, extras, breadcrumbs,
/// request data and the free-form `flag`/`url`/`channel`/`dir` strings.  The
/// [`Context`](crate::Context) decides which scope is current; this type only
/// stores and projects the data.
#[derive(Clone, Default, PartialEq)]
pub struct Scope {
    pub(crate) user: Option<User>,
    pub(crate) tags: Map<String, String>,
    pub(crate) extras: Map<String, Value>,
    pub(crate) breadcrumbs: VecDeque<Breadcrumb>,
    pub(crate) request: Option<RequestData>,
    pub(crate) flag: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) channel: Option<String>,
    pub(crate) dir: Option<String>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("user", &self.user)
            .field("tags", &self.tags)
            .field("extras", &self.extras)
            .field("breadcrumbs", &self.breadcrumbs.len())
            .field("request", &self.request)
            .field("flag", &self.flag)
            .field("url", &self.url)
            .field("channel", &self.channel)
            .field("dir", &self.dir)
            .finish()
    }
}

impl Scope {
    /// Creates a new empty scope.
    pub fn new() -> Scope {
        Default::default()
    }

    /// Sets or clears the user for this scope.
    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&mut self, key: &str, value: V) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    /// Removes a tag.
    pub fn remove_tag(&mut self, key: &str) {
        self.tags.remove(key);
    }

    /// Sets an extra to a specific value.
    ///
    /// An extra is free-form JSON data sent along as an event parameter.
    pub fn set_extra(&mut self, key: &str, value: Value) {
        self.extras.insert(key.to_string(), value);
    }

    /// Removes an extra.
    pub fn remove_extra(&mut self, key: &str) {
        self.extras.remove(key);
    }

    /// Appends a breadcrumb, discarding the oldest ones beyond `max`.
    pub fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb, max: usize) {
        self.breadcrumbs.push_back(breadcrumb);
        while self.breadcrumbs.len() > max {
            self.breadcrumbs.pop_front();
        }
    }

    /// Sets the request data snapshot for this scope.
    pub fn set_request_data(&mut self, request: RequestData) {
        self.request = Some(request);
    }

    /// Clears the request data snapshot.
    pub fn clear_request_data(&mut self) {
        self.request = None;
    }

    /// Sets the flag string.
    pub fn set_flag<S: Into<String>>(&mut self, flag: S) {
        self.flag = Some(flag.into());
    }

    /// Sets the url string.
    pub fn set_url<S: Into<String>>(&mut self, url: S) {
        self.url = Some(url.into());
    }

    /// Sets the channel string.
    pub fn set_channel<S: Into<String>>(&mut self, channel: S) {
        self.channel = Some(channel.into());
    }

    /// Sets the dir string.
    pub fn set_dir<S: Into<String>>(&mut self, dir: S) {
        self.dir = Some(dir.into());
    }

    /// Projects the scope's data onto an event.
    ///
    /// This is a sparse override: values only land on the event when they
    /// are present and non-empty, so an untouched scope never clobbers the
    /// defaults the event builder filled in.  Tags and extras extend the
    /// event's parameter list in that order.
    pub fn apply_to_event(&self, event: &mut Event, send_default_pii: bool) {
        event.params.extend(
            self.tags
                .iter()
                .map(|(k, v)| Param::new(k.clone(), v.clone())),
        );
        event.params.extend(
            self.extras
                .iter()
                .map(|(k, v)| Param::new(k.clone(), v.clone())),
        );

        if event.user.is_none() {
            event.user.clone_from(&self.user);
        }

        if let Some(ref flag) = self.flag {
            if !flag.is_empty() {
                event.flag = Some(flag.clone());
            }
        }
        if let Some(ref url) = self.url {
            if !url.is_empty() {
                event.url = Some(url.clone());
            }
        }
        if let Some(ref channel) = self.channel {
            if !channel.is_empty() {
                event.channel = Some(channel.clone());
            }
        }
        if let Some(ref dir) = self.dir {
            if !dir.is_empty() {
                event.dir = Some(dir.clone());
            }
        }

        if let Some(ref request) = self.request {
            let mut request = request.clone();
            if !send_default_pii {
                request.cookies.clear();
                request.ip = None;
                request.params.clear();
            }
            event.request = Some(request);
        }

        event.breadcrumbs.extend(self.breadcrumbs.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_scope_keeps_event_defaults() {
        let scope = Scope::new();
        let mut event = Event {
            dir: Some("/srv/app".into()),
            ..Default::default()
        };
        scope.apply_to_event(&mut event, true);
        assert_eq!(event.dir.as_deref(), Some("/srv/app"));
        assert!(event.params.is_empty());
        assert!(event.user.is_none());
    }

    #[test]
    fn test_tags_become_params() {
        let mut scope = Scope::new();
        scope.set_tag("k", "v");
        scope.set_extra("answer", Value::from(42));

        let mut event = Event::default();
        scope.apply_to_event(&mut event, true);
        assert_eq!(event.params[0], Param::new("k", "v"));
        assert_eq!(event.params[1], Param::new("answer", 42));
    }

    #[test]
    fn test_breadcrumbs_are_bounded() {
        let mut scope = Scope::new();
        for n in 0..10 {
            scope.add_breadcrumb(
                Breadcrumb {
                    message: Some(format!("crumb {}", n)),
                    ..Default::default()
                },
                3,
            );
        }
        assert_eq!(scope.breadcrumbs.len(), 3);
        assert_eq!(
            scope.breadcrumbs.front().unwrap().message.as_deref(),
            Some("crumb 7")
        );
    }

    #[test]
    fn test_pii_is_stripped_without_opt_in() {
        let mut scope = Scope::new();
        let mut request = RequestData {
            url: Some("https://shop.example.com/checkout".into()),
            method: Some("POST".into()),
            ip: Some("10.0.0.1".into()),
            ..Default::default()
        };
        request.cookies.insert("session".into(), "secret".into());
        request.params.insert("card".into(), Value::from("4111"));
        scope.set_request_data(request.clone());

        let mut event = Event::default();
        scope.apply_to_event(&mut event, false);
        let snapshot = event.request.unwrap();
        assert_eq!(
            snapshot.url.as_deref(),
            Some("https://shop.example.com/checkout")
        );
        assert!(snapshot.cookies.is_empty());
        assert!(snapshot.params.is_empty());
        assert!(snapshot.ip.is_none());

        let mut event = Event::default();
        scope.apply_to_event(&mut event, true);
        assert_eq!(event.request.unwrap(), request);
    }
}
