//! Manager client
//!
//! Facade over the org.freedesktop.systemd1 bus API: list units, fetch a
//! unit's properties, and issue start/stop/restart/reload calls. The
//! [`ManagerClient`] trait is the seam the sync engine depends on;
//! [`SystemdClient`] is the zbus implementation over the system bus.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Type};
use zbus::{proxy, Connection};

use super::{unit_dbus_path, UnitCategory, UNIT_INTERFACE};
use crate::snapshot::UnitSnapshot;

const NO_SUCH_UNIT_ERROR: &str = "org.freedesktop.systemd1.NoSuchUnit";
const UNKNOWN_OBJECT_ERROR: &str = "org.freedesktop.DBus.Error.UnknownObject";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unit not found: {0}")]
    UnitNotFound(String),

    #[error("manager transport error: {0}")]
    Transport(String),
}

impl From<zbus::Error> for ClientError {
    fn from(err: zbus::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Map a bus error for a specific unit, distinguishing "no such unit"
/// from transport failures.
fn classify(err: zbus::Error, unit: &str) -> ClientError {
    if let zbus::Error::MethodError(ref name, _, _) = err {
        let name = name.as_str();
        if name == NO_SUCH_UNIT_ERROR || name == UNKNOWN_OBJECT_ERROR {
            return ClientError::UnitNotFound(unit.to_string());
        }
    }
    err.into()
}

/// Job mode for unit control calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    #[default]
    Replace,
    Fail,
    Isolate,
}

impl StartMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Fail => "fail",
            Self::Isolate => "isolate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "replace" => Some(Self::Replace),
            "fail" => Some(Self::Fail),
            "isolate" => Some(Self::Isolate),
            _ => None,
        }
    }
}

/// One row of the manager's ListUnits reply, signature `(ssssssouso)`.
#[derive(Debug, Clone, Deserialize, Type)]
pub struct ListedUnit {
    /// Primary unit name, e.g. "nginx.service".
    pub name: String,
    pub description: String,
    pub load_state: String,
    pub active_state: String,
    pub sub_state: String,
    /// Unit being followed in its state, or "".
    pub followed: String,
    pub object_path: OwnedObjectPath,
    /// Queued job id, 0 if none.
    pub job_id: u32,
    pub job_type: String,
    pub job_object_path: OwnedObjectPath,
}

/// What the sync engine needs from the service manager.
#[async_trait]
pub trait ManagerClient: Send + Sync {
    /// Every unit currently known to the manager.
    async fn list_units(&self) -> Result<Vec<ListedUnit>, ClientError>;

    /// All properties of one unit, generic and category-specific merged.
    /// `identifier` is a unit name or a unit object path.
    async fn fetch_unit(&self, identifier: &str) -> Result<UnitSnapshot, ClientError>;

    /// Start a unit; returns the job object path.
    async fn start_unit(&self, name: &str, mode: StartMode) -> Result<String, ClientError>;

    /// Stop a unit; returns the job object path.
    async fn stop_unit(&self, name: &str, mode: StartMode) -> Result<String, ClientError>;

    /// Restart a unit; returns the job object path.
    async fn restart_unit(&self, name: &str, mode: StartMode) -> Result<String, ClientError>;

    /// Reload a unit's configuration; returns the job object path.
    async fn reload_unit(&self, name: &str, mode: StartMode) -> Result<String, ClientError>;
}

#[proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1",
    gen_blocking = false
)]
trait Manager {
    fn list_units(&self) -> zbus::Result<Vec<ListedUnit>>;

    fn start_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    fn stop_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    fn restart_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    fn reload_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
}

#[proxy(
    interface = "org.freedesktop.DBus.Properties",
    default_service = "org.freedesktop.systemd1",
    gen_blocking = false
)]
trait Properties {
    fn get_all(&self, interface: &str) -> zbus::Result<HashMap<String, OwnedValue>>;
}

/// Manager client over a live D-Bus connection.
pub struct SystemdClient {
    connection: Connection,
    manager: ManagerProxy<'static>,
}

impl SystemdClient {
    /// Connect to the system bus.
    pub async fn system() -> Result<Self, ClientError> {
        let connection = Connection::system().await?;
        Self::new(&connection).await
    }

    pub async fn new(connection: &Connection) -> Result<Self, ClientError> {
        let manager = ManagerProxy::new(connection).await?;
        Ok(Self {
            connection: connection.clone(),
            manager,
        })
    }

    async fn properties(&self, path: &str) -> Result<PropertiesProxy<'static>, zbus::Error> {
        PropertiesProxy::builder(&self.connection)
            .path(path.to_string())?
            .build()
            .await
    }
}

#[async_trait]
impl ManagerClient for SystemdClient {
    async fn list_units(&self) -> Result<Vec<ListedUnit>, ClientError> {
        Ok(self.manager.list_units().await?)
    }

    async fn fetch_unit(&self, identifier: &str) -> Result<UnitSnapshot, ClientError> {
        let path = if identifier.starts_with('/') {
            identifier.to_string()
        } else {
            unit_dbus_path(identifier)
        };

        let properties = self
            .properties(&path)
            .await
            .map_err(|e| classify(e, identifier))?;

        // Generic unit properties first, then the category-specific set on
        // top. Categories without an interface get the generic set only.
        let mut merged = properties
            .get_all(UNIT_INTERFACE)
            .await
            .map_err(|e| classify(e, identifier))?;
        if let Some(interface) = UnitCategory::from_identifier(identifier).interface() {
            let specific = properties
                .get_all(&interface)
                .await
                .map_err(|e| classify(e, identifier))?;
            merged.extend(specific);
        }

        Ok(UnitSnapshot::from_dbus(path, merged))
    }

    async fn start_unit(&self, name: &str, mode: StartMode) -> Result<String, ClientError> {
        let job = self
            .manager
            .start_unit(name, mode.as_str())
            .await
            .map_err(|e| classify(e, name))?;
        Ok(job.to_string())
    }

    async fn stop_unit(&self, name: &str, mode: StartMode) -> Result<String, ClientError> {
        let job = self
            .manager
            .stop_unit(name, mode.as_str())
            .await
            .map_err(|e| classify(e, name))?;
        Ok(job.to_string())
    }

    async fn restart_unit(&self, name: &str, mode: StartMode) -> Result<String, ClientError> {
        let job = self
            .manager
            .restart_unit(name, mode.as_str())
            .await
            .map_err(|e| classify(e, name))?;
        Ok(job.to_string())
    }

    async fn reload_unit(&self, name: &str, mode: StartMode) -> Result<String, ClientError> {
        let job = self
            .manager
            .reload_unit(name, mode.as_str())
            .await
            .map_err(|e| classify(e, name))?;
        Ok(job.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_mode_as_str() {
        assert_eq!(StartMode::Replace.as_str(), "replace");
        assert_eq!(StartMode::Fail.as_str(), "fail");
        assert_eq!(StartMode::Isolate.as_str(), "isolate");
    }

    #[test]
    fn test_start_mode_parse() {
        assert_eq!(StartMode::parse("replace"), Some(StartMode::Replace));
        assert_eq!(StartMode::parse("fail"), Some(StartMode::Fail));
        assert_eq!(StartMode::parse("isolate"), Some(StartMode::Isolate));
        assert_eq!(StartMode::parse("merge"), None);
        assert_eq!(StartMode::default(), StartMode::Replace);
    }

    #[test]
    fn test_classify_transport() {
        let err = classify(zbus::Error::Failure("bus gone".into()), "a.service");
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
