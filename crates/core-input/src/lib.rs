//! Byte-stream input decoder.
//!
//! Contract:
//! - Input: arbitrary byte chunks from a raw-mode terminal, possibly
//!   splitting a UTF-8 code point or an escape sequence anywhere.
//! - Output: zero or more logical [`InputEvent`]s per chunk, in arrival
//!   order. Unconsumed trailing bytes are kept for the next chunk; an
//!   unterminated escape sequence leaves the machine suspended, never reset.
//! - Recovery: leading bytes that cannot begin a valid UTF-8 sequence are
//!   discarded one at a time (counted, logged as lengths only) until the
//!   remaining prefix decodes. Malformed CSI sequences are dropped and the
//!   machine returns to `Free` (a soft failure, never fatal).

mod decoder;

pub use decoder::Decoder;

#[cfg(test)]
mod logging_policy {
    use super::Decoder;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tracing::Subscriber;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::Registry;

    #[derive(Clone, Default)]
    struct Capture {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    #[derive(Clone, Debug)]
    struct CapturedEvent {
        target: String,
        fields: Vec<(String, String)>,
    }

    #[derive(Default)]
    struct FieldCollector {
        fields: Vec<(String, String)>,
    }

    impl Visit for FieldCollector {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S> Layer<S> for Capture
    where
        S: Subscriber,
    {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut collector = FieldCollector::default();
            event.record(&mut collector);
            self.events.lock().unwrap().push(CapturedEvent {
                target: event.metadata().target().to_string(),
                fields: collector.fields,
            });
        }
    }

    #[test]
    fn paste_logs_carry_lengths_never_content() {
        let capture = Capture::default();
        let events = capture.events.clone();
        let subscriber = Registry::default().with(capture);
        let dispatch = tracing::Dispatch::new(subscriber);

        tracing::dispatcher::with_default(&dispatch, || {
            let mut dec = Decoder::new();
            let _ = dec.feed(b"\x1b[200~secret paste payload \xf0\x9f\x92\xa3\x1b[201~");
        });

        let events = events.lock().unwrap();
        let end_event = events
            .iter()
            .find(|e| e.target == "input.paste" && e.fields.iter().any(|(k, _)| k == "len"))
            .expect("missing input.paste length event");
        assert!(
            end_event.fields.iter().any(|(name, _)| name == "len"),
            "len field missing"
        );
        for event in events.iter() {
            for (_, value) in &event.fields {
                assert!(
                    !value.contains("secret paste payload"),
                    "event leaked raw paste content: {value}"
                );
            }
        }
    }
}
