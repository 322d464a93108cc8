//! Echo tool — returns its parameters unchanged.

use anyhow::Result;

use super::Tool;

pub const ENTRY: &str = "echo";

#[derive(Debug, Default)]
pub struct Echo;

impl Tool for Echo {
    fn name(&self) -> &str {
        ENTRY
    }

    fn execute(&self, parameters: serde_json::Value) -> Result<serde_json::Value> {
        Ok(parameters)
    }
}

pub fn construct(_config: &serde_json::Value) -> Result<Box<dyn Tool>> {
    Ok(Box::new(Echo))
}
