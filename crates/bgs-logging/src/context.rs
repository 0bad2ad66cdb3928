//! Service context for multi-instance logging
//!
//! Several store processes (API servers, game servers, the admin CLI) write
//! to the same log sink. [`ServiceContextGuard`] tags everything logged in a
//! scope with the service name and a per-process instance id.

use std::cell::RefCell;

use tracing::span::EnteredSpan;
use uuid::Uuid;

/// Service context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContext {
    /// Name of the running service, e.g. `bgs-store`
    pub service: String,
    /// Unique id of this process instance
    pub instance_id: Uuid,
}

thread_local! {
    static SERVICE_CONTEXT: RefCell<Option<ServiceContext>> = const { RefCell::new(None) };
}

/// RAII guard for service context
///
/// Creating the guard sets the context for the current thread and enters a
/// `service` span carrying `service` and `instance_id`, so JSONL output
/// includes both on every event. Dropping it restores the previous context.
///
/// ```ignore
/// let _guard = ServiceContextGuard::new("bgs-store");
/// tracing::info!("Provisioned collections");
/// ```
pub struct ServiceContextGuard {
    previous: Option<ServiceContext>,
    _span: EnteredSpan,
}

impl ServiceContextGuard {
    /// Tag the current scope with a fresh instance id
    pub fn new(service: impl Into<String>) -> Self {
        Self::with_instance_id(service, Uuid::new_v4())
    }

    /// Tag the current scope with a known instance id
    pub fn with_instance_id(service: impl Into<String>, instance_id: Uuid) -> Self {
        let context = ServiceContext {
            service: service.into(),
            instance_id,
        };
        let span = tracing::info_span!(
            "service",
            service = %context.service,
            instance_id = %context.instance_id
        )
        .entered();

        let previous = SERVICE_CONTEXT.with(|ctx| ctx.borrow_mut().replace(context));
        Self {
            previous,
            _span: span,
        }
    }

    /// Get the current service context (if any)
    pub fn current() -> Option<ServiceContext> {
        SERVICE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current instance id (if set)
    pub fn current_instance_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.instance_id)
    }
}

impl Drop for ServiceContextGuard {
    fn drop(&mut self) {
        SERVICE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_sets_and_clears() {
        assert!(ServiceContextGuard::current().is_none());
        {
            let _guard = ServiceContextGuard::new("bgs-store");
            let ctx = ServiceContextGuard::current().unwrap();
            assert_eq!(ctx.service, "bgs-store");
        }
        assert!(ServiceContextGuard::current().is_none());
    }

    #[test]
    fn test_nested_guards_restore() {
        let outer_id = Uuid::new_v4();
        let _outer = ServiceContextGuard::with_instance_id("api", outer_id);
        {
            let _inner = ServiceContextGuard::new("worker");
            assert_eq!(ServiceContextGuard::current().unwrap().service, "worker");
        }
        assert_eq!(ServiceContextGuard::current_instance_id(), Some(outer_id));
    }
}
