//! Resource module adapter
//!
//! Exposes any [`Resource`] through the [`Module`] contract. Parameters:
//!
//! - `state`: one of the reconciliation states, `merged` when omitted
//! - `config`: desired configuration (list or keyed map)
//! - `running_config`: configuration text for `state: parsed`
//!
//! Facts come from the device in the [`ModuleContext`]. Commands are sent only
//! outside check mode, after which the facts are read again for `after`.

use crate::error::{Error, Result};
use crate::modules::network::common::generate_config_diff;
use crate::modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use crate::resource::{facts, run, Resource, RunResult, State};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// A [`Module`] driving one network resource
pub struct ResourceModule<R: Resource + ?Sized = dyn Resource> {
    resource: Arc<R>,
}

impl<R: Resource + ?Sized> ResourceModule<R> {
    pub fn new(resource: Arc<R>) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    fn state(params: &ModuleParams) -> ModuleResult<State> {
        let state = params.get_string("state")?;
        Ok(state.as_deref().unwrap_or("merged").parse::<State>()?)
    }

    fn output(&self, result: RunResult, context: &ModuleContext) -> Result<ModuleOutput> {
        let name = self.resource.name();
        let count = result.command_list().len();
        let mut output = if result.changed {
            let verb = if context.check_mode { "would send" } else { "sent" };
            ModuleOutput::changed(format!("{}: {} {} command(s)", name, verb, count))
        } else {
            ModuleOutput::ok(format!("{}: no changes", name))
        };

        if context.diff_mode {
            if let (Some(before), Some(after)) = (&result.before, &result.after) {
                output = output.with_diff(generate_config_diff(
                    &serde_yaml::to_string(before)?,
                    &serde_yaml::to_string(after)?,
                ));
            }
        }

        let RunResult {
            before,
            after,
            commands,
            warnings,
            gathered,
            parsed,
            rendered,
            ..
        } = result;
        let nodes = [
            ("before", before),
            ("after", after),
            ("gathered", gathered),
            ("parsed", parsed),
        ];
        for (key, node) in nodes {
            if let Some(node) = node {
                output = output.with_data(key, node.to_json());
            }
        }
        if let Some(commands) = commands {
            output = output.with_data("commands", serde_json::to_value(commands)?);
        }
        if let Some(rendered) = rendered {
            output = output.with_data("rendered", serde_json::to_value(rendered)?);
        }
        if !warnings.is_empty() {
            output = output.with_data("warnings", serde_json::to_value(warnings)?);
        }
        Ok(output)
    }
}

impl<R: Resource + ?Sized> Module for ResourceModule<R> {
    fn name(&self) -> &'static str {
        self.resource.name()
    }

    fn description(&self) -> &'static str {
        "Reconcile a network resource against its desired configuration"
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        Self::state(params)?;
        match params.get("config") {
            None | Some(Value::Null) | Some(Value::Array(_)) | Some(Value::Object(_)) => {}
            Some(_) => {
                return Err(ModuleError::InvalidParameter(
                    "config must be a list or a mapping".to_string(),
                ))
            }
        }
        params.get_string("running_config")?;
        Ok(())
    }

    fn execute(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        let state = Self::state(params)?;
        let config = params.get("config").filter(|v| !v.is_null());
        let running_config = params.get_string("running_config")?;
        let name = self.resource.name();

        let read_device = || -> Result<String> {
            match &context.device {
                Some(device) => device.get_config(),
                None => Err(Error::Device {
                    device: "none".to_string(),
                    message: format!("{} needs a device to read configuration from", name),
                }),
            }
        };

        let mut result = run(&*self.resource, state, config, running_config.as_deref(), read_device)?;

        if state.is_action() && result.changed && !context.check_mode {
            let device = context
                .device
                .as_ref()
                .ok_or_else(|| ModuleError::NoDevice(name.to_string()))?;
            device.send_commands(result.command_list())?;
            info!(
                resource = name,
                device = %device.identifier(),
                commands = result.command_list().len(),
                "applied"
            );
            result.after = Some(facts::get_facts(&*self.resource, || device.get_config())?);
        } else if context.check_mode {
            debug!(resource = name, state = %state, "check mode, nothing sent");
        }

        Ok(self.output(result, context)?)
    }
}
