use std::sync::{Arc, Mutex};

use streply::protocol::{Event, EventType, Level};
use streply::{ClientOptions, Error, Transport};

#[derive(Default)]
struct CollectingTransport(Mutex<Vec<Event>>);

impl Transport for CollectingTransport {
    fn send_event(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }
}

// the global client is process-wide state, so everything touching it
// lives in a single test
#[test]
fn test_global_api_lifecycle() {
    assert!(matches!(
        streply::log("too early", vec![]),
        Err(Error::NotInitialized)
    ));
    assert!(streply::client().is_none());
    assert!(streply::last_event_id().is_none());

    let sink = Arc::new(CollectingTransport::default());
    let guard = streply::init((
        "https://pub123@collector.example.com/42",
        ClientOptions {
            transport: Some(Arc::new(sink.clone())),
            ..Default::default()
        },
    ));
    assert!(guard.is_enabled());
    assert!(streply::client().is_some());

    streply::set_tag("service", "api");
    streply::capture_message("booted", EventType::Log, Level::Normal, vec![]).unwrap();

    {
        let scope = streply::configure_scope().unwrap();
        scope.set_tag("request", "abc123");
        scope.set_flag("beta");
        scope.set_url("https://api.example.com/orders");
        scope.set_channel("web");
        streply::error("request failed", Level::High, vec![]).unwrap();
    }
    streply::activity("request.finished", vec![]).unwrap();

    let err = "NaN".parse::<usize>().unwrap_err();
    streply::capture_exception(&err).unwrap();

    {
        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(events[0]
            .params
            .iter()
            .any(|p| p.name == "service"));
        assert!(events[1].params.iter().any(|p| p.name == "request"));
        assert_eq!(events[1].flag.as_deref(), Some("beta"));
        assert_eq!(
            events[1].url.as_deref(),
            Some("https://api.example.com/orders")
        );
        assert_eq!(events[1].channel.as_deref(), Some("web"));
        // the pushed scope was popped again
        assert!(!events[2].params.iter().any(|p| p.name == "request"));
        assert!(events[2].flag.is_none());
        assert!(events[2].url.is_none());
        assert_eq!(events[3].exception_name.as_deref(), Some("ParseIntError"));
    }

    // the scope guard pops even when the protected code panics, and the
    // panic itself is captured by the default panic integration
    let result = std::panic::catch_unwind(|| {
        let scope = streply::configure_scope().unwrap();
        scope.set_tag("request", "zzz999");
        panic!("boom");
    });
    assert!(result.is_err());
    streply::log("after panic", vec![]).unwrap();

    {
        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(events[4].message, "boom");
        assert_eq!(events[4].level, Level::Critical);
        assert_eq!(events[4].exception_name.as_deref(), Some("panic"));
        // the hook ran while the scope was still pushed
        assert!(events[4].params.iter().any(|p| p.name == "request"));
        assert!(!events[5].params.iter().any(|p| p.name == "request"));
    }

    drop(guard);
    assert!(streply::client().is_none());
    assert!(matches!(
        streply::log("too late", vec![]),
        Err(Error::NotInitialized)
    ));
}
