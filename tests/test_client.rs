use std::sync::{Arc, Mutex};

use streply::protocol::{Breadcrumb, Event, EventType, Level, Param, Value};
use streply::{Client, ClientOptions, Error, Transport, User};

#[derive(Default)]
struct CollectingTransport(Mutex<Vec<Event>>);

impl CollectingTransport {
    fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

impl Transport for CollectingTransport {
    fn send_event(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }
}

fn client_with_sink(mut options: ClientOptions) -> (Client, Arc<CollectingTransport>) {
    let sink = Arc::new(CollectingTransport::default());
    options.dsn = Some("https://pub123@collector.example.com/42".parse().unwrap());
    options.transport = Some(Arc::new(sink.clone()));
    (Client::with_options(options), sink)
}

#[test]
fn test_captured_message_fields() {
    let (client, sink) = client_with_sink(ClientOptions {
        release: Some("backend@1.3.0".into()),
        environment: Some("staging".into()),
        ..Default::default()
    });

    let handle = client
        .capture_message("hello", EventType::Log, Level::Normal, vec![])
        .unwrap()
        .expect("event should be queued");

    let events = sink.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];

    assert_eq!(event.message, "hello");
    assert_eq!(event.ty, EventType::Log);
    assert_eq!(event.level, Level::Normal);
    assert_eq!(event.event_type, "event");
    assert_eq!(event.status, 0);
    assert_eq!(event.http_status_code, 200);
    assert_eq!(event.project_id.map(|id| id.value()), Some(42));
    assert_eq!(event.release.as_deref(), Some("backend@1.3.0"));
    assert_eq!(event.environment.as_deref(), Some("staging"));
    assert_eq!(event.technology, "rust");

    // the handle is the per-event trace id, derived from the session
    assert_eq!(handle, event.trace_unique_id);
    assert_eq!(event.trace_unique_id, format!("{}_1", event.trace_id));
    assert_eq!(event.trace_id, client.session().trace_id());
    assert_eq!(event.session_id, client.session().session_id());
    assert!(event.time >= event.start_time);
    assert!(event.load_time >= 0.0);
    assert!(!event.date.is_empty());
    assert!(!event.date_time_zone.is_empty());
}

#[test]
fn test_empty_message_fails_fast() {
    let (client, sink) = client_with_sink(Default::default());
    assert!(matches!(
        client.capture_message("", EventType::Log, Level::Normal, vec![]),
        Err(Error::EmptyMessage)
    ));
    assert!(sink.events().is_empty());
}

#[test]
fn test_shorthand_types_and_levels() {
    let (client, sink) = client_with_sink(Default::default());
    client.log("a log line", vec![]).unwrap();
    client.error("it failed", Level::Critical, vec![]).unwrap();
    client
        .activity("user.registered", vec![Param::new("plan", "pro")])
        .unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].ty, EventType::Log);
    assert_eq!(events[1].ty, EventType::Error);
    assert_eq!(events[1].level, Level::Critical);
    assert_eq!(events[2].ty, EventType::Activity);
    assert_eq!(events[2].params[0], Param::new("plan", "pro"));
}

#[test]
fn test_capture_error_derives_exception_fields() {
    let (client, sink) = client_with_sink(Default::default());
    let err = "NaN".parse::<usize>().unwrap_err();
    client.capture_error(&err).expect("event should be queued");

    let events = sink.events();
    let event = &events[0];
    assert_eq!(event.ty, EventType::Error);
    assert_eq!(event.level, Level::High);
    assert_eq!(event.exception_name.as_deref(), Some("ParseIntError"));
    assert_eq!(event.message, err.to_string());
}

#[test]
fn test_scope_data_lands_on_events() {
    let (client, sink) = client_with_sink(Default::default());
    client.set_user(Some(User::new("u-1000")));
    client.set_tag("worker", "imports");
    client.set_extra("batch", Value::from(7));
    client.log("processing", vec![]).unwrap();

    let events = sink.events();
    let event = &events[0];
    assert_eq!(event.user.as_ref().unwrap().user_id, "u-1000");
    assert!(event
        .params
        .contains(&Param::new("worker", "imports")));
    assert!(event.params.contains(&Param::new("batch", 7)));
}

#[test]
fn test_pushed_scope_is_discarded_on_pop() {
    let (client, sink) = client_with_sink(Default::default());
    client.set_tag("stage", "outer");

    client.push_scope();
    client.set_tag("stage", "inner");
    client.set_tag("only-inner", "yes");
    client.log("inside", vec![]).unwrap();
    client.pop_scope();

    client.log("outside", vec![]).unwrap();

    let events = sink.events();
    assert!(events[0].params.contains(&Param::new("stage", "inner")));
    assert!(events[0].params.contains(&Param::new("only-inner", "yes")));
    assert!(events[1].params.contains(&Param::new("stage", "outer")));
    assert!(!events[1]
        .params
        .iter()
        .any(|param| param.name == "only-inner"));
}

#[test]
fn test_before_send_can_mutate_and_drop() {
    let (client, sink) = client_with_sink(ClientOptions {
        before_send: Some(Arc::new(|mut event| {
            if event.message.contains("secret") {
                return None;
            }
            event.message = event.message.to_uppercase();
            Some(event)
        })),
        ..Default::default()
    });

    assert!(client.log("keep me", vec![]).unwrap().is_some());
    assert!(client.log("a secret thing", vec![]).unwrap().is_none());

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "KEEP ME");
}

#[test]
fn test_sampled_out_events_are_not_sent() {
    let (client, sink) = client_with_sink(ClientOptions {
        sample_rate: 0.0,
        ..Default::default()
    });
    for _ in 0..1000 {
        assert!(client.log("noise", vec![]).unwrap().is_none());
    }
    assert!(sink.events().is_empty());

    let (client, sink) = client_with_sink(ClientOptions {
        sample_rate: 1.0,
        ..Default::default()
    });
    for _ in 0..1000 {
        assert!(client.log("signal", vec![]).unwrap().is_some());
    }
    assert_eq!(sink.events().len(), 1000);
}

#[test]
fn test_breadcrumbs_are_attached_and_bounded() {
    let (client, sink) = client_with_sink(ClientOptions {
        max_breadcrumbs: 5,
        ..Default::default()
    });
    for n in 0..20 {
        client.add_breadcrumb(Breadcrumb {
            message: Some(format!("step {}", n)),
            ..Default::default()
        });
    }
    client.log("done", vec![]).unwrap();

    let events = sink.events();
    let crumbs = &events[0].breadcrumbs;
    assert_eq!(crumbs.len(), 5);
    assert_eq!(crumbs[0].message.as_deref(), Some("step 15"));
    assert_eq!(crumbs[4].message.as_deref(), Some("step 19"));
}

#[test]
fn test_before_breadcrumb_can_drop() {
    let (client, sink) = client_with_sink(ClientOptions {
        before_breadcrumb: Some(Arc::new(|crumb| {
            if crumb.category.as_deref() == Some("noise") {
                None
            } else {
                Some(crumb)
            }
        })),
        ..Default::default()
    });
    client.add_breadcrumb(Breadcrumb {
        category: Some("noise".into()),
        ..Default::default()
    });
    client.add_breadcrumb(Breadcrumb {
        category: Some("db".into()),
        ..Default::default()
    });
    client.log("done", vec![]).unwrap();

    let events = sink.events();
    assert_eq!(events[0].breadcrumbs.len(), 1);
    assert_eq!(events[0].breadcrumbs[0].category.as_deref(), Some("db"));
}

#[test]
fn test_concurrent_captures_get_unique_trace_ids() {
    let (client, sink) = client_with_sink(Default::default());
    let client = Arc::new(client);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..25 {
                client.log("concurrent", vec![]).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let events = sink.events();
    assert_eq!(events.len(), 200);
    let unique: std::collections::BTreeSet<_> =
        events.iter().map(|e| e.trace_unique_id.clone()).collect();
    assert_eq!(unique.len(), 200);
}

#[test]
fn test_close_disables_the_client() {
    let (client, sink) = client_with_sink(Default::default());
    client.log("before close", vec![]).unwrap();
    assert!(client.close(None));
    assert!(!client.is_enabled());
    assert_eq!(client.log("after close", vec![]).unwrap(), None);
    assert_eq!(sink.events().len(), 1);
}
