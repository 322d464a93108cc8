//! Add tool — sums two integers.

use anyhow::{Context, Result};
use serde::Deserialize;

use super::Tool;

pub const ENTRY: &str = "add";

/// Parameters for the add tool.
#[derive(Debug, Deserialize)]
pub struct AddParams {
    pub a: i64,
    pub b: i64,
}

#[derive(Debug, Default)]
pub struct Add;

impl Tool for Add {
    fn name(&self) -> &str {
        ENTRY
    }

    fn execute(&self, parameters: serde_json::Value) -> Result<serde_json::Value> {
        let params: AddParams =
            serde_json::from_value(parameters).context("invalid add parameters")?;
        let sum = params
            .a
            .checked_add(params.b)
            .with_context(|| format!("{} + {} overflows", params.a, params.b))?;
        Ok(serde_json::Value::from(sum))
    }
}

pub fn construct(_config: &serde_json::Value) -> Result<Box<dyn Tool>> {
    Ok(Box::new(Add))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add() {
        assert_eq!(Add.execute(json!({"a": 2, "b": 3})).expect("add"), json!(5));
        assert_eq!(Add.execute(json!({"a": -7, "b": 3})).expect("add"), json!(-4));
    }

    #[test]
    fn test_add_overflow() {
        assert!(Add.execute(json!({"a": i64::MAX, "b": 1})).is_err());
    }

    #[test]
    fn test_add_bad_params() {
        assert!(Add.execute(json!({"a": "two", "b": 3})).is_err());
        assert!(Add.execute(json!(null)).is_err());
    }
}
