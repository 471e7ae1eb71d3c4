//! systemd D-Bus plumbing
//!
//! Constants for the org.freedesktop.systemd1 bus API, the unit-name to
//! object-path encoding, and unit category resolution. The path encoding is
//! fixed by systemd, not by this crate, and must match it byte for byte.

mod client;

pub use client::{ClientError, ListedUnit, ManagerClient, StartMode, SystemdClient};

/// Bus name of the systemd manager.
pub const SYSTEMD_SERVICE: &str = "org.freedesktop.systemd1";
/// Object path of the manager itself.
pub const SYSTEMD_PATH: &str = "/org/freedesktop/systemd1";
/// Collection path under which unit objects live.
pub const UNIT_PATH: &str = "/org/freedesktop/systemd1/unit";
/// The manager interface (ListUnits, StartUnit, ...).
pub const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";
/// The generic unit interface every unit object implements.
pub const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";

/// Convert a unit name to its D-Bus object path.
///
/// Percent-encode the name, lower-case it, then rewrite `%` to `_`,
/// `.` to `_2e` and `-` to `_2d` and prepend the unit collection path.
/// e.g. `"foo.service"` -> `/org/freedesktop/systemd1/unit/foo_2eservice`.
pub fn unit_dbus_path(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'.' | b'-' | b'~' => {
                escaped.push(byte as char)
            }
            b' ' => escaped.push('+'),
            _ => escaped.push_str(&format!("%{:02X}", byte)),
        }
    }
    let escaped = escaped
        .to_ascii_lowercase()
        .replace('%', "_")
        .replace('.', "_2e")
        .replace('-', "_2d");
    format!("{}/{}", UNIT_PATH, escaped)
}

/// Unit category, resolved from the suffix of a unit name (after the last
/// `.`) or of an already-encoded object path (after the last `_2e`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitCategory {
    Service,
    Socket,
    Target,
    Device,
    Mount,
    Automount,
    Swap,
    Timer,
    Path,
    Slice,
    Scope,
    Busname,
    Other(String),
}

impl UnitCategory {
    pub fn from_identifier(identifier: &str) -> Self {
        let suffix = if let Some(pos) = identifier.rfind('.') {
            &identifier[pos + 1..]
        } else if let Some(pos) = identifier.rfind("_2e") {
            &identifier[pos + 3..]
        } else {
            identifier
        };
        match suffix {
            "service" => Self::Service,
            "socket" => Self::Socket,
            "target" => Self::Target,
            "device" => Self::Device,
            "mount" => Self::Mount,
            "automount" => Self::Automount,
            "swap" => Self::Swap,
            "timer" => Self::Timer,
            "path" => Self::Path,
            "slice" => Self::Slice,
            "scope" => Self::Scope,
            "busname" => Self::Busname,
            other => Self::Other(other.to_string()),
        }
    }

    /// Category name with the first letter capitalized, as it appears in
    /// interface names ("service" -> "Service").
    pub fn type_name(&self) -> String {
        match self {
            Self::Service => "Service".to_string(),
            Self::Socket => "Socket".to_string(),
            Self::Target => "Target".to_string(),
            Self::Device => "Device".to_string(),
            Self::Mount => "Mount".to_string(),
            Self::Automount => "Automount".to_string(),
            Self::Swap => "Swap".to_string(),
            Self::Timer => "Timer".to_string(),
            Self::Path => "Path".to_string(),
            Self::Slice => "Slice".to_string(),
            Self::Scope => "Scope".to_string(),
            Self::Busname => "Busname".to_string(),
            Self::Other(suffix) => {
                let mut chars = suffix.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }

    /// The category-specific properties interface, for categories the
    /// manager serves one for. Unknown suffixes get only the generic
    /// unit interface.
    pub fn interface(&self) -> Option<String> {
        match self {
            Self::Busname | Self::Other(_) => None,
            _ => Some(format!("{}.{}", SYSTEMD_SERVICE, self.type_name())),
        }
    }

    /// Whether unit objects of this category can be queried at all.
    /// `.busname` units are not served by current systemd and must be
    /// skipped rather than fetched.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Busname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_dbus_path() {
        assert_eq!(
            unit_dbus_path("foo.service"),
            "/org/freedesktop/systemd1/unit/foo_2eservice"
        );
        assert_eq!(
            unit_dbus_path("my-app.service"),
            "/org/freedesktop/systemd1/unit/my_2dapp_2eservice"
        );
        assert_eq!(
            unit_dbus_path("user@1000.service"),
            "/org/freedesktop/systemd1/unit/user_401000_2eservice"
        );
        assert_eq!(
            unit_dbus_path("dev-sda1.swap"),
            "/org/freedesktop/systemd1/unit/dev_2dsda1_2eswap"
        );
    }

    #[test]
    fn test_category_from_name() {
        assert_eq!(
            UnitCategory::from_identifier("foo.service"),
            UnitCategory::Service
        );
        assert_eq!(
            UnitCategory::from_identifier("foo.timer"),
            UnitCategory::Timer
        );
        assert_eq!(
            UnitCategory::from_identifier("backup.tar.service"),
            UnitCategory::Service
        );
        assert_eq!(
            UnitCategory::from_identifier("foo.fancy"),
            UnitCategory::Other("fancy".to_string())
        );
    }

    #[test]
    fn test_category_from_encoded_path() {
        assert_eq!(
            UnitCategory::from_identifier("/org/freedesktop/systemd1/unit/foo_2eservice"),
            UnitCategory::Service
        );
        assert_eq!(
            UnitCategory::from_identifier("/org/freedesktop/systemd1/unit/b_2etimer"),
            UnitCategory::Timer
        );
    }

    #[test]
    fn test_category_interface() {
        assert_eq!(
            UnitCategory::Service.interface().as_deref(),
            Some("org.freedesktop.systemd1.Service")
        );
        assert_eq!(
            UnitCategory::Timer.interface().as_deref(),
            Some("org.freedesktop.systemd1.Timer")
        );
        assert_eq!(UnitCategory::Busname.interface(), None);
        assert_eq!(UnitCategory::Other("fancy".into()).interface(), None);
        assert_eq!(UnitCategory::Other("fancy".into()).type_name(), "Fancy");
    }

    #[test]
    fn test_category_supported() {
        assert!(UnitCategory::Service.is_supported());
        assert!(UnitCategory::Other("fancy".into()).is_supported());
        assert!(!UnitCategory::Busname.is_supported());
    }
}
