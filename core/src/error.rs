use std::any::Any;

/// Contract violations raised by the module manager and factories.
///
/// These indicate a bootstrap bug rather than a runtime condition: the host
/// either fails fast or skips the offending module and keeps loading the rest.
#[derive(thiserror::Error, Debug)]
pub enum ModuleError {
    #[error("module '{0}' already registered")]
    AlreadyRegistered(String),

    #[error("module is not bound to a manager")]
    NotBound,

    #[error("module configuration must include a target")]
    MissingTarget,

    #[error("cannot instantiate from target '{0}': no factory registered")]
    UnknownTarget(String),

    #[error("module '{name}' failed to load: {source}")]
    LoadFailed {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Best-effort extraction of a panic payload for logging.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
