mod feed;

pub use feed::ScriptedFeed;

use crate::host::SentinelApp;
use sentinel_core::{Service, ServiceContext, ServiceFactories};

/// Factory keys usable as service targets in the settings.
pub fn service_factories() -> ServiceFactories<SentinelApp> {
    let mut factories = ServiceFactories::new();
    factories.register("scripted_feed", |cx: ServiceContext<SentinelApp>| {
        Ok(Box::new(ScriptedFeed::from_context(cx)?) as Box<dyn Service>)
    });
    factories
}
