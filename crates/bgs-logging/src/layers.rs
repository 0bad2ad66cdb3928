//! Custom tracing layers

use tracing::span;
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{ServiceContext, ServiceContextGuard};

/// Layer that records the active service context on every new span
///
/// Child spans inherit their parent's context, so work handed to another
/// thread under an explicit parent span stays attributed to the service.
#[derive(Debug, Default)]
pub struct ServiceContextLayer;

impl ServiceContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct ServiceContextExtension {
    pub context: ServiceContext,
}

impl<S> Layer<S> for ServiceContextLayer
where
    S: tracing::Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        // Inherit from the parent span before falling back to the thread-local guard
        let inherited = span.parent().and_then(|parent| {
            let extensions = parent.extensions();
            extensions.get::<ServiceContextExtension>().cloned()
        });
        let extension = inherited.or_else(|| {
            ServiceContextGuard::current().map(|context| ServiceContextExtension { context })
        });

        if let Some(extension) = extension {
            span.extensions_mut().insert(extension);
        }
    }
}
