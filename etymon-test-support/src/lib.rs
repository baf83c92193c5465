//! Shared test utilities used across etymon crates.

pub mod tracing {
    //! Recording layer for asserting on emitted diagnostics.
    use std::{
        collections::HashMap,
        fmt,
        sync::{Arc, Mutex, PoisonError},
    };

    use tracing::{
        Dispatch, Event, Level, Subscriber,
        field::{Field, Visit},
        span::{Attributes, Id},
    };
    use tracing_subscriber::{
        Layer,
        layer::{Context, SubscriberExt},
        registry::LookupSpan,
    };

    /// Captures opened spans and emitted events so tests can assert on them.
    ///
    /// # Examples
    /// ```
    /// use etymon_test_support::tracing::RecordingLayer;
    ///
    /// let (layer, dispatch) = RecordingLayer::dispatch();
    /// tracing::dispatcher::with_default(&dispatch, || tracing::warn!(attempt = 1, "retrying"));
    /// assert_eq!(layer.count(tracing::Level::WARN, "retrying"), 1);
    /// ```
    #[derive(Clone, Default)]
    pub struct RecordingLayer {
        spans: Arc<Mutex<Vec<String>>>,
        events: Arc<Mutex<Vec<EventRecord>>>,
    }

    /// One captured event.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EventRecord {
        /// Event level.
        pub level: Level,
        /// The `message` field, empty when absent.
        pub message: String,
        /// Every other field rendered as text.
        pub fields: HashMap<String, String>,
    }

    impl RecordingLayer {
        /// Creates a layer and a dispatcher that routes everything to it.
        #[must_use]
        pub fn dispatch() -> (Self, Dispatch) {
            let layer = Self::default();
            let subscriber = tracing_subscriber::registry().with(layer.clone());
            (layer, Dispatch::new(subscriber))
        }

        /// Names of the spans opened so far, in creation order.
        #[must_use]
        pub fn spans(&self) -> Vec<String> {
            self.spans
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Events emitted so far, in emission order.
        #[must_use]
        pub fn events(&self) -> Vec<EventRecord> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of events at `level` whose message equals `message`.
        #[must_use]
        pub fn count(&self, level: Level, message: &str) -> usize {
            self.events()
                .iter()
                .filter(|event| event.level == level && event.message == message)
                .count()
        }
    }

    impl<S> Layer<S> for RecordingLayer
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            self.spans
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(attrs.metadata().name().to_owned());
        }

        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            event.record(&mut FieldRecorder {
                fields: &mut fields,
            });
            let message = fields.remove("message").unwrap_or_default();
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(EventRecord {
                    level: *event.metadata().level(),
                    message,
                    fields,
                });
        }
    }

    struct FieldRecorder<'a> {
        fields: &'a mut HashMap<String, String>,
    }

    impl Visit for FieldRecorder<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.fields
                .insert(field.name().to_owned(), format!("{value:?}"));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.fields
                .insert(field.name().to_owned(), value.to_owned());
        }

        fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
            self.fields
                .insert(field.name().to_owned(), value.to_string());
        }
    }

}
