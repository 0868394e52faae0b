use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::utils::microtime;

/// Identifiers created once per client lifetime.
///
/// The trace counter is the only mutable part; it is incremented exactly
/// once per built event so that concurrent captures never share a
/// `traceUniqueId`.
#[derive(Debug)]
pub struct Session {
    session_id: String,
    trace_id: String,
    user_id: String,
    start_time: f64,
    counter: AtomicU64,
}

impl Session {
    pub(crate) fn new() -> Session {
        Session {
            session_id: Uuid::new_v4().simple().to_string(),
            trace_id: Uuid::new_v4().simple().to_string(),
            user_id: Uuid::new_v4().simple().to_string(),
            start_time: microtime(),
            counter: AtomicU64::new(0),
        }
    }

    /// The opaque session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The opaque trace identifier shared by all events of this session.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// The anonymous session user identifier.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The unix timestamp of client start.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Derives the next per-event trace identifier.
    ///
    /// The first event of a session gets the `_1` suffix.
    pub fn next_trace_unique_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}_{}", self.trace_id, n)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_trace_unique_id_sequence() {
        let session = Session::new();
        assert_eq!(
            session.next_trace_unique_id(),
            format!("{}_1", session.trace_id())
        );
        assert_eq!(
            session.next_trace_unique_id(),
            format!("{}_2", session.trace_id())
        );
    }

    #[test]
    fn test_trace_counter_is_atomic() {
        let session = Arc::new(Session::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = session.clone();
            handles.push(std::thread::spawn(move || {
                (0..50)
                    .map(|_| session.next_trace_unique_id())
                    .collect::<Vec<_>>()
            }));
        }

        let mut suffixes = BTreeSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                let (_, n) = id.rsplit_once('_').unwrap();
                suffixes.insert(n.parse::<u64>().unwrap());
            }
        }

        // no duplicates, no gaps
        assert_eq!(suffixes.len(), 400);
        assert_eq!(suffixes.iter().next(), Some(&1));
        assert_eq!(suffixes.iter().next_back(), Some(&400));
    }
}
