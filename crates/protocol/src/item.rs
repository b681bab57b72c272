//! Pipeline payload type
//!
//! `Item` is the opaque unit of work flowing between stages. The substrate
//! never inspects payloads; only user modules and partition functions do.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of work flowing through the pipeline
///
/// Wraps a JSON value so user modules can carry anything serializable
/// without the substrate caring about the shape. Accessors are provided
/// for the common scalar cases.
///
/// # Example
///
/// ```
/// use plumb_protocol::Item;
///
/// let item = Item::from(21i64);
/// assert_eq!(item.as_i64(), Some(21));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(Value);

impl Item {
    /// Create an item from any JSON value
    #[inline]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying JSON value
    #[inline]
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Consume the item, returning the underlying JSON value
    #[inline]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Interpret the payload as a signed integer
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        self.0.as_i64()
    }

    /// Interpret the payload as a string slice
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<i64> for Item {
    fn from(n: i64) -> Self {
        Self(Value::from(n))
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Self(Value::from(s))
    }
}

impl From<String> for Item {
    fn from(s: String) -> Self {
        Self(Value::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_accessors() {
        assert_eq!(Item::from(5i64).as_i64(), Some(5));
        assert_eq!(Item::from("abc").as_str(), Some("abc"));
        assert_eq!(Item::from("abc").as_i64(), None);
    }

    #[test]
    fn test_structured_payload() {
        let item = Item::new(json!({"host": "db1", "lat_ms": 12}));
        assert_eq!(item.value()["host"], "db1");
        assert_eq!(item.value()["lat_ms"], 12);
    }

    #[test]
    fn test_display() {
        assert_eq!(Item::from(3i64).to_string(), "3");
        assert_eq!(Item::from("x").to_string(), "\"x\"");
    }

    #[test]
    fn test_round_trip_serde() {
        let item = Item::new(json!([1, 2, 3]));
        let encoded = serde_json::to_string(&item).unwrap();
        let decoded: Item = serde_json::from_str(&encoded).unwrap();
        assert_eq!(item, decoded);
    }
}
