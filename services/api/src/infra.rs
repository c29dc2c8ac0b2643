use course_market::config::ModerationConfig;
use course_market::workflows::moderation::{
    InMemoryDispatcher, InMemoryEnrollmentLedger, InMemoryEntityStore,
    InMemoryInstructorDirectory, ModerationService, RetryingDispatcher,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Attempts per notification before the dispatcher gives up and the failure is logged.
pub(crate) const NOTIFICATION_ATTEMPTS: u32 = 3;

pub(crate) type Dispatcher = RetryingDispatcher<InMemoryDispatcher>;
pub(crate) type Service = ModerationService<InMemoryEntityStore, Dispatcher>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process collaborators backing the service when no external systems are wired in.
#[derive(Clone, Default)]
pub(crate) struct InMemoryAdapters {
    pub(crate) store: InMemoryEntityStore,
    pub(crate) notifications: InMemoryDispatcher,
    pub(crate) profiles: InMemoryInstructorDirectory,
    pub(crate) enrollments: InMemoryEnrollmentLedger,
}

pub(crate) fn in_memory_service(config: &ModerationConfig) -> (Arc<Service>, InMemoryAdapters) {
    let adapters = InMemoryAdapters::default();
    let dispatcher = RetryingDispatcher::new(adapters.notifications.clone(), NOTIFICATION_ATTEMPTS);
    let service = ModerationService::new(
        Arc::new(adapters.store.clone()),
        Arc::new(dispatcher),
        Arc::new(adapters.profiles.clone()),
        Arc::new(adapters.enrollments.clone()),
        config,
    );
    (Arc::new(service), adapters)
}
