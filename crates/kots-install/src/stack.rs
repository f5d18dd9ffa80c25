//! Stack output lookup.
//!
//! Stacks are addressed by their base name (e.g. `WickrRds`); the configured
//! suffix is appended before querying, so one account can host several
//! deployments side by side.

use tracing::debug;

use crate::aws::{AwsError, StackOutputResolver};
use crate::error::{InstallError, InstallResult};

/// Resolves outputs of suffixed stacks.
#[derive(Clone, Copy)]
pub struct StackLookup<'a> {
    resolver: &'a dyn StackOutputResolver,
    suffix: &'a str,
}

impl<'a> StackLookup<'a> {
    /// Create a lookup appending `suffix` to every stack name.
    #[must_use]
    pub fn new(resolver: &'a dyn StackOutputResolver, suffix: &'a str) -> Self {
        Self { resolver, suffix }
    }

    /// Full stack name for `base`.
    #[must_use]
    pub fn stack_name(&self, base: &str) -> String {
        format!("{base}{}", self.suffix)
    }

    /// Resolve output `key` of stack `base`.
    ///
    /// A present key always wins over `default`. An absent key returns
    /// `default` when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::ConfigResolution`] if the stack cannot be
    /// described, has no outputs, or lacks `key` and no default was given.
    pub async fn resolve(&self, base: &str, key: &str, default: Option<&str>) -> InstallResult<String> {
        let stack_name = self.stack_name(base);

        let outputs = match self.resolver.stack_outputs(&stack_name).await {
            Ok(Some(outputs)) => outputs,
            Ok(None) => {
                return Err(InstallError::ConfigResolution(format!(
                    "stack {stack_name} has no outputs"
                )))
            }
            Err(AwsError::NotFound(_)) => {
                return Err(InstallError::ConfigResolution(format!(
                    "could not find stack {stack_name}"
                )))
            }
            Err(e) => {
                return Err(InstallError::ConfigResolution(format!(
                    "could not describe stack {stack_name}: {e}"
                )))
            }
        };

        if let Some(output) = outputs.into_iter().find(|o| o.output_key == key) {
            debug!(stack = %stack_name, key, "Resolved stack output");
            return Ok(output.output_value);
        }

        match default {
            Some(value) => {
                debug!(stack = %stack_name, key, "Stack output missing, using default");
                Ok(value.to_string())
            }
            None => Err(InstallError::ConfigResolution(format!(
                "could not find output key {key} in stack {stack_name}"
            ))),
        }
    }
}
