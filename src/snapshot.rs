//! Unit property snapshots
//!
//! A [`UnitSnapshot`] is the set of property values for one unit captured at
//! a single point in time. Snapshots are immutable once built; the engine
//! replaces them wholesale on every refresh instead of patching fields.

use std::collections::HashMap;
use std::fmt;

use zbus::zvariant::{OwnedValue, Value};

/// A single property value as reported by systemd.
///
/// systemd properties are heterogeneous; the states this crate mirrors
/// (load state, active state, sub state, description) are all scalars, so
/// only scalar signatures and string arrays are retained.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    StrList(Vec<String>),
}

impl PropertyValue {
    /// Convert a D-Bus value, if it has a representable signature.
    pub fn from_value(value: &Value<'_>) -> Option<Self> {
        match value {
            Value::Str(s) => Some(Self::Str(s.as_str().to_string())),
            Value::ObjectPath(p) => Some(Self::Str(p.as_str().to_string())),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::U8(n) => Some(Self::U64(u64::from(*n))),
            Value::U16(n) => Some(Self::U64(u64::from(*n))),
            Value::U32(n) => Some(Self::U64(u64::from(*n))),
            Value::U64(n) => Some(Self::U64(*n)),
            Value::I16(n) => Some(Self::I64(i64::from(*n))),
            Value::I32(n) => Some(Self::I64(i64::from(*n))),
            Value::I64(n) => Some(Self::I64(*n)),
            Value::F64(f) => Some(Self::F64(*f)),
            Value::Value(inner) => Self::from_value(inner),
            Value::Array(array) => {
                let mut items = Vec::with_capacity(array.len());
                for item in array.iter() {
                    match item {
                        Value::Str(s) => items.push(s.as_str().to_string()),
                        _ => return None,
                    }
                }
                Some(Self::StrList(items))
            }
            _ => None,
        }
    }

    /// The string content, or `""` for non-string values.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Str(s) => s,
            _ => "",
        }
    }
}

impl Default for PropertyValue {
    fn default() -> Self {
        Self::Str(String::new())
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::I64(n) => write!(f, "{}", n),
            Self::U64(n) => write!(f, "{}", n),
            Self::F64(n) => write!(f, "{}", n),
            Self::StrList(items) => write!(f, "{}", items.join(" ")),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        Self::I64(n)
    }
}

impl From<u64> for PropertyValue {
    fn from(n: u64) -> Self {
        Self::U64(n)
    }
}

/// Properties of one unit, captured at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSnapshot {
    object_path: String,
    properties: HashMap<String, PropertyValue>,
}

impl UnitSnapshot {
    pub fn new(
        object_path: impl Into<String>,
        properties: HashMap<String, PropertyValue>,
    ) -> Self {
        Self {
            object_path: object_path.into(),
            properties,
        }
    }

    /// Build a snapshot from a raw D-Bus property map.
    ///
    /// Values with non-scalar signatures are dropped.
    pub fn from_dbus(
        object_path: impl Into<String>,
        properties: HashMap<String, OwnedValue>,
    ) -> Self {
        let properties = properties
            .iter()
            .filter_map(|(name, value)| {
                PropertyValue::from_value(value).map(|v| (name.clone(), v))
            })
            .collect();
        Self {
            object_path: object_path.into(),
            properties,
        }
    }

    /// D-Bus object path of the unit this snapshot was read from.
    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    /// Property value by name, or the empty-string value when absent.
    pub fn get(&self, name: &str) -> PropertyValue {
        self.properties.get(name).cloned().unwrap_or_default()
    }

    /// String property by name; `""` when absent or not a string.
    pub fn get_str(&self, name: &str) -> &str {
        self.properties.get(name).map_or("", PropertyValue::as_str)
    }

    pub fn properties(&self) -> &HashMap<String, PropertyValue> {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UnitSnapshot {
        let props = HashMap::from([
            ("ActiveState".to_string(), PropertyValue::from("active")),
            ("SubState".to_string(), PropertyValue::from("running")),
            ("MainPID".to_string(), PropertyValue::from(1234u64)),
        ]);
        UnitSnapshot::new("/org/freedesktop/systemd1/unit/nginx_2eservice", props)
    }

    #[test]
    fn test_get_present() {
        let snap = sample();
        assert_eq!(snap.get("ActiveState"), PropertyValue::from("active"));
        assert_eq!(snap.get("MainPID"), PropertyValue::U64(1234));
    }

    #[test]
    fn test_get_missing_is_empty_string() {
        let snap = sample();
        assert_eq!(snap.get("NoSuchProperty"), PropertyValue::Str(String::new()));
        assert_eq!(snap.get_str("NoSuchProperty"), "");
    }

    #[test]
    fn test_get_str_on_non_string() {
        let snap = sample();
        assert_eq!(snap.get_str("MainPID"), "");
        assert_eq!(snap.get_str("SubState"), "running");
    }

    #[test]
    fn test_from_dbus_keeps_scalars() {
        let raw = HashMap::from([
            (
                "Id".to_string(),
                OwnedValue::try_from(Value::from("nginx.service")).unwrap(),
            ),
            (
                "MainPID".to_string(),
                OwnedValue::try_from(Value::from(42u32)).unwrap(),
            ),
            (
                "CanStart".to_string(),
                OwnedValue::try_from(Value::from(true)).unwrap(),
            ),
            (
                "Wants".to_string(),
                OwnedValue::try_from(Value::from(vec!["network.target"])).unwrap(),
            ),
        ]);
        let snap = UnitSnapshot::from_dbus("/org/freedesktop/systemd1/unit/x", raw);
        assert_eq!(snap.get_str("Id"), "nginx.service");
        assert_eq!(snap.get("MainPID"), PropertyValue::U64(42));
        assert_eq!(snap.get("CanStart"), PropertyValue::Bool(true));
        assert_eq!(
            snap.get("Wants"),
            PropertyValue::StrList(vec!["network.target".to_string()])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(PropertyValue::from("active").to_string(), "active");
        assert_eq!(PropertyValue::U64(7).to_string(), "7");
        assert_eq!(
            PropertyValue::StrList(vec!["a.target".into(), "b.target".into()]).to_string(),
            "a.target b.target"
        );
    }
}
