/// Lifecycle hooks invoked by the connection supervisor
///
/// Collaborators register interest in two moments of a connection's life:
/// the readiness transition (safe to start issuing requests) and terminal
/// failure (reconnection attempts exhausted or the handshake never
/// completed). Both default to no-ops.
///
/// Hooks are called from the supervisor's internal tasks. Panics inside a
/// hook are caught and logged; they never take down the listening loop.
/// `on_ready` fires at most once per successful connection epoch,
/// `on_connection_failed` at most once per client lifetime.
pub trait ConnectionHooks: Send + Sync + 'static {
    /// The readiness heuristic has been met; requests can be sent.
    fn on_ready(&self) {}

    /// The connection is gone for good; dependent features should degrade.
    fn on_connection_failed(&self) {}
}

/// A no-op hook implementation for clients that don't care about lifecycle
pub struct NoopHooks;

impl ConnectionHooks for NoopHooks {}

/// Closure-backed hooks for callers that don't want a dedicated type
///
/// ```ignore
/// let hooks = FnHooks::new()
///     .on_ready(|| println!("control plane ready"))
///     .on_connection_failed(|| println!("control plane gone"));
/// ```
#[derive(Default)]
pub struct FnHooks {
    on_ready: Option<Box<dyn Fn() + Send + Sync>>,
    on_connection_failed: Option<Box<dyn Fn() + Send + Sync>>,
}

impl FnHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_ready(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_ready = Some(Box::new(f));
        self
    }

    pub fn on_connection_failed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connection_failed = Some(Box::new(f));
        self
    }
}

impl ConnectionHooks for FnHooks {
    fn on_ready(&self) {
        if let Some(f) = &self.on_ready {
            f();
        }
    }

    fn on_connection_failed(&self) {
        if let Some(f) = &self.on_connection_failed {
            f();
        }
    }
}
