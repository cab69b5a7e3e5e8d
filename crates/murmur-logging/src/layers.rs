//! Custom tracing layers for Murmur
//!
//! [`UserContextLayer`] tags spans with the acting user, and
//! [`jsonl_layer`] builds the JSON formatter shared by console and file
//! output.

use tracing::{Subscriber, span};
use tracing_subscriber::{
    fmt::{
        self, MakeWriter,
        format::{Format, Json, JsonFields},
    },
    layer::{Context, Layer},
    registry::LookupSpan,
};

use murmur_core::StorageKey;

use crate::config::JsonlConfig;
use crate::context::UserContextGuard;

/// Layer that attaches the current user context to new spans
///
/// Spans opened while a [`UserContextGuard`] is alive carry a
/// [`UserContextExtension`] that later layers can read back, even when the
/// span is entered from another thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserContextLayer;

impl UserContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContextExtension {
    pub key: StorageKey,
}

impl<S> Layer<S> for UserContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        // Explicit guard wins, otherwise inherit from the parent span
        let key = UserContextGuard::current_key().or_else(|| {
            span.parent().and_then(|parent| {
                parent
                    .extensions()
                    .get::<UserContextExtension>()
                    .map(|ext| ext.key.clone())
            })
        });

        if let Some(key) = key {
            span.extensions_mut().insert(UserContextExtension { key });
        }
    }
}

/// JSONL formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(
    config: &JsonlConfig,
    writer: W,
) -> fmt::Layer<S, JsonFields, Format<Json>, W>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_writer(writer)
}
