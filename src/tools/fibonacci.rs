//! Fibonacci tool — nth Fibonacci number, iteratively.

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use super::Tool;

pub const ENTRY: &str = "fibonacci";

/// Largest index whose value fits in a `u64` is 93; keep a margin by default.
const DEFAULT_MAX_N: u64 = 90;

#[derive(Debug, Deserialize)]
struct FibonacciConfig {
    #[serde(default = "default_max_n")]
    max_n: u64,
}

const fn default_max_n() -> u64 {
    DEFAULT_MAX_N
}

#[derive(Debug)]
pub struct Fibonacci {
    max_n: u64,
}

impl Tool for Fibonacci {
    fn name(&self) -> &str {
        ENTRY
    }

    fn execute(&self, parameters: serde_json::Value) -> Result<serde_json::Value> {
        let n: u64 = serde_json::from_value(parameters)
            .context("fibonacci expects a non-negative integer")?;
        if n > self.max_n {
            bail!("n = {n} exceeds limit {}", self.max_n);
        }
        let (mut prev, mut curr) = (0u64, 1u64);
        for _ in 0..n {
            let next = prev.checked_add(curr).context("fibonacci overflow")?;
            prev = curr;
            curr = next;
        }
        Ok(serde_json::Value::from(prev))
    }
}

pub fn construct(config: &serde_json::Value) -> Result<Box<dyn Tool>> {
    let max_n = if config.is_null() {
        DEFAULT_MAX_N
    } else {
        let cfg: FibonacciConfig =
            serde_json::from_value(config.clone()).context("invalid fibonacci config")?;
        cfg.max_n
    };
    // fib(93) is the last value that fits; the loop computes one step past n.
    if max_n > 92 {
        bail!("max_n {max_n} would overflow u64 (limit 92)");
    }
    Ok(Box::new(Fibonacci { max_n }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_small_values() {
        let tool = construct(&serde_json::Value::Null).expect("construct");
        let values: Vec<_> = (0..8)
            .map(|n| tool.execute(json!(n)).expect("fib"))
            .collect();
        assert_eq!(
            values,
            vec![
                json!(0),
                json!(1),
                json!(1),
                json!(2),
                json!(3),
                json!(5),
                json!(8),
                json!(13)
            ]
        );
    }

    #[test]
    fn test_limit_from_config() {
        let tool = construct(&json!({"max_n": 10})).expect("construct");
        assert_eq!(tool.execute(json!(10)).expect("fib"), json!(55));
        assert!(tool.execute(json!(11)).is_err());
    }

    #[test]
    fn test_negative_rejected() {
        let tool = construct(&serde_json::Value::Null).expect("construct");
        assert!(tool.execute(json!(-1)).is_err());
    }

    #[test]
    fn test_construct_rejects_overflowing_limit() {
        assert!(construct(&json!({"max_n": 100})).is_err());
        assert!(construct(&json!({"max_n": "lots"})).is_err());
    }
}
