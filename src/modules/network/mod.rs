//! Network Resource Modules
//!
//! Each network resource manages one configuration domain of a device as
//! structured data: facts are parsed from the running configuration, compared
//! with the desired configuration under a state mode, and the difference is
//! rendered as CLI commands.
//!
//! # Supported Platforms
//!
//! - **Cisco IOS/IOS-XE**: `ios_*` resources in [`ios`]
//!
//! # Example Usage
//!
//! ```yaml
//! - name: Configure uplink
//!   ios_interfaces:
//!     state: merged
//!     config:
//!       - name: GigabitEthernet0/1
//!         description: uplink
//!         enabled: true
//! ```
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +-------------------+
//! |  ResourceModule  |---->|  NetworkDevice    |
//! |  (ios_* table)   |     |  get_config       |
//! +------------------+     |  send_commands    |
//!         |                +-------------------+
//!         v
//! +------------------+
//! |  resource::run   |
//! |  facts / differ  |
//! +------------------+
//! ```

pub mod common;
pub mod ios;
pub mod resource;

pub use common::{config_session, generate_config_diff, NetworkDevice, StaticConfigDevice};
pub use resource::ResourceModule;

use crate::modules::ModuleRegistry;
use crate::resource::Resource;
use std::sync::Arc;

/// Register all network resource modules with the registry
pub fn register_network_modules(registry: &mut ModuleRegistry) {
    for resource in ios::resources() {
        registry.register(Arc::new(ResourceModule::new(resource)));
    }
}

/// Look up a resource by module name
pub fn find_resource(name: &str) -> Option<Arc<dyn Resource>> {
    ios::resources().into_iter().find(|r| r.name() == name)
}

/// Get a list of all available network module names
pub fn network_module_names() -> Vec<&'static str> {
    ios::resources().iter().map(|r| r.name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_names() {
        let names = network_module_names();
        assert_eq!(names.len(), 9);
        assert!(names.contains(&"ios_interfaces"));
        assert!(names.contains(&"ios_bgp_address_family"));
    }

    #[test]
    fn test_find_resource() {
        assert_eq!(
            find_resource("ios_prefix_lists").map(|r| r.name()),
            Some("ios_prefix_lists")
        );
        assert!(find_resource("ios_vlans").is_none());
    }

    #[test]
    fn test_registered_as_modules() {
        let mut registry = ModuleRegistry::new();
        register_network_modules(&mut registry);
        assert_eq!(registry.names().len(), network_module_names().len());
    }
}
