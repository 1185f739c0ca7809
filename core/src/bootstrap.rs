//! Startup wiring: build modules from configuration, register them and pick
//! the first screen. Construction failures only cost the offending module.

use crate::factory::ModuleFactories;
use crate::manager::ModuleManager;
use crate::module::Host;
use crate::priority::PriorityConfig;
use crate::settings::ModuleSettings;
use std::sync::Arc;

/// Construct and register every enabled module, in configuration order.
/// Returns how many were registered.
pub fn load_modules<H: Host>(
    manager: &mut ModuleManager<H>,
    modules: &[(String, ModuleSettings)],
    factories: &ModuleFactories<H>,
) -> usize {
    let mut loaded = 0;
    for (name, settings) in modules {
        if !settings.enabled {
            log::debug!("bootstrap: module '{}' disabled", name);
            continue;
        }
        let module = match factories.create_from_config(settings) {
            Ok(module) => module,
            Err(e) => {
                log::warn!("bootstrap: unable to load module '{}': {:#}", name, e);
                continue;
            }
        };
        match manager.register(name, module) {
            Ok(()) => loaded += 1,
            Err(e) => log::warn!("bootstrap: unable to register module '{}': {}", name, e),
        }
    }
    if loaded == 0 {
        log::warn!("bootstrap: no modules enabled; module manager starts empty");
    }
    loaded
}

/// Activate `startup_screen` if it is registered. `None`, `"auto"` or an
/// unknown name fall back to the first registered module.
pub fn select_startup_screen<H: Host>(manager: &mut ModuleManager<H>, startup_screen: Option<&str>) {
    let requested = startup_screen.filter(|s| !s.eq_ignore_ascii_case("auto"));
    let target = match requested {
        Some(name) if manager.contains(name) => Some(name.to_string()),
        _ => manager.module_names().first().cloned(),
    };
    if let Some(name) = target {
        log::info!("bootstrap: startup screen '{}'", name);
        manager.set_active(&name);
    }
}

/// Build a ready-to-run manager: modules loaded, idle cycle finalized,
/// startup screen active.
pub fn bootstrap<H: Host>(
    app: Arc<H>,
    modules: &[(String, ModuleSettings)],
    factories: &ModuleFactories<H>,
    priorities: PriorityConfig,
    startup_screen: Option<&str>,
) -> ModuleManager<H> {
    let mut manager = ModuleManager::new(app, priorities);
    load_modules(&mut manager, modules, factories);
    manager.finalize_idle_cycle();
    select_startup_screen(&mut manager, startup_screen);
    manager
}
