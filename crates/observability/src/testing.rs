//! In-memory log capture for tests.
//!
//! ```ignore
//! let capture = LogCapture::install();
//! service.process(&order)?;
//! assert_eq!(capture.messages(), vec!["enteringMethod OrderService::process", /* ... */]);
//! ```

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::{
    Dispatch, Event, Level, Subscriber,
    field::{Field, Visit},
    subscriber::DefaultGuard,
};
use tracing_subscriber::{Layer, layer::Context, prelude::*};

/// One captured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl CapturedRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

type Records = Arc<Mutex<Vec<CapturedRecord>>>;

/// Records every event of the current thread while alive.
///
/// Use [`dispatch`](Self::dispatch) to record events from other threads.
pub struct LogCapture {
    records: Records,
    dispatch: Dispatch,
    _guard: DefaultGuard,
}

impl LogCapture {
    pub fn install() -> Self {
        let records = Records::default();
        let dispatch = Dispatch::new(tracing_subscriber::registry().with(CaptureLayer {
            records: Arc::clone(&records),
        }));
        let guard = tracing::dispatcher::set_default(&dispatch);
        Self {
            records,
            dispatch,
            _guard: guard,
        }
    }

    /// Same sink, for `tracing::dispatcher::with_default` on spawned threads.
    pub fn dispatch(&self) -> Dispatch {
        self.dispatch.clone()
    }

    pub fn records(&self) -> Vec<CapturedRecord> {
        lock(&self.records).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.records).iter().map(|r| r.message.clone()).collect()
    }

    pub fn clear(&self) {
        lock(&self.records).clear();
    }
}

fn lock(records: &Records) -> MutexGuard<'_, Vec<CapturedRecord>> {
    // A panicking test thread must not hide what was captured before it.
    records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct CaptureLayer {
    records: Records,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        lock(&self.records).push(CapturedRecord {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}
