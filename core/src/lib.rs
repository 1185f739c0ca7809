//! Module orchestration and priority arbitration for a fixed dashboard
//! display.
//!
//! Background services publish onto the [`EventBus`]; screen modules
//! subscribe and report their status to the [`ModuleManager`]. Once per
//! frame the manager expires stale reports, ticks every module, resolves the
//! weighted rule table and either shows the winning screen or advances the
//! idle cycle. Rendering and input go to the active screen only.

pub mod bootstrap;
pub use bootstrap::{bootstrap, load_modules, select_startup_screen};

pub mod error;
pub use error::ModuleError;

pub mod event_bus;
pub use event_bus::{EventBus, Payload, SubscriptionId};

pub mod factory;
pub use factory::{ModuleFactories, ServiceContext, ServiceFactories};

pub mod manager;
pub use manager::ModuleManager;

pub mod module;
pub use module::{Host, ModuleContext, ScreenModule};

pub mod priority;
pub use priority::{config_schema, IdleConfig, PriorityConfig, PriorityRule};

pub mod service;
pub use service::{Service, ServiceManager};

pub mod settings;
pub use settings::{ModuleSettings, ServiceSettings};

pub mod state;
pub use state::{
    Clock, ManualClock, Metadata, ModuleState, StateHandle, StateReport, StateReporter, SystemClock,
};

pub type Result<T> = std::result::Result<T, anyhow::Error>;
