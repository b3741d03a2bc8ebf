//! A `tracing` layer that records what the middleware emitted.
use std::{
    fmt,
    sync::{Arc, Mutex},
};

use tracing::{
    field::{Field, Visit},
    span, Event, Subscriber,
};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

#[derive(Debug, Default)]
struct Recorded {
    spans: Vec<String>,
    fields: Vec<(String, Vec<String>)>,
    events: Vec<String>,
}

/// Cheap to clone; every clone shares the same records
#[derive(Debug, Clone, Default)]
pub(crate) struct Captured {
    inner: Arc<Mutex<Recorded>>,
}

impl Captured {
    /// Span names in creation order, as `name` or `name<-parent`
    pub(crate) fn spans(&self) -> Vec<String> {
        self.inner.lock().unwrap().spans.clone()
    }

    /// Event messages, prefixed with the name of the span they were emitted in
    pub(crate) fn events(&self) -> Vec<String> {
        self.inner.lock().unwrap().events.clone()
    }

    /// `key=value` pairs recorded when the first span called `name` was created
    pub(crate) fn fields(&self, name: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .fields
            .iter()
            .find(|(span, _)| span == name)
            .map(|(_, fields)| fields.clone())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct Collect {
    fields: Vec<String>,
    message: Option<String>,
}

impl Visit for Collect {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.push(format!("{}={value}", field.name()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

impl<S> Layer<S> for Captured
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let name = attrs.metadata().name();
        let parent = ctx
            .span(id)
            .and_then(|span| span.parent())
            .map(|parent| parent.name());
        let mut collect = Collect::default();
        attrs.record(&mut collect);

        let mut recorded = self.inner.lock().unwrap();
        recorded.spans.push(match parent {
            Some(parent) => format!("{name}<-{parent}"),
            None => name.to_owned(),
        });
        recorded.fields.push((name.to_owned(), collect.fields));
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut collect = Collect::default();
        event.record(&mut collect);
        let message = collect.message.unwrap_or_default();
        let line = match ctx.event_span(event) {
            Some(span) => format!("{}: {message}", span.name()),
            None => message,
        };
        self.inner.lock().unwrap().events.push(line);
    }
}
