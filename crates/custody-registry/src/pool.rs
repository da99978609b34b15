//! The preloaded, finite pool of application identities.

use std::{collections::HashSet, path::Path};

use custody_types::{AppId, Application, CustodyError, Result};

/// Pool entries in configuration order. Selection always walks this order.
#[derive(Debug, Clone, Default)]
pub struct ApplicationPool {
    apps: Vec<Application>,
}

impl ApplicationPool {
    /// Build a pool, rejecting duplicate application ids.
    pub fn new(apps: Vec<Application>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(apps.len());
        for app in &apps {
            if !seen.insert(app.app_id) {
                return Err(CustodyError::Configuration(format!(
                    "duplicate app id {} in application pool",
                    app.app_id
                )));
            }
        }
        Ok(Self { apps })
    }

    /// Load a JSON array of applications.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CustodyError::Configuration(format!("read {}: {e}", path.display()))
        })?;
        let apps: Vec<Application> = serde_json::from_str(&text).map_err(|e| {
            CustodyError::Configuration(format!("parse {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), size = apps.len(), "application pool loaded");
        Self::new(apps)
    }

    /// First application whose id is not in `claimed`.
    #[must_use]
    pub fn first_unclaimed(&self, claimed: &HashSet<AppId>) -> Option<&Application> {
        self.apps.iter().find(|app| !claimed.contains(&app.app_id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn first_unclaimed_follows_pool_order() {
        let pool = ApplicationPool::new((1..=3).map(Application::dummy).collect()).unwrap();
        let mut claimed = HashSet::new();
        assert_eq!(pool.first_unclaimed(&claimed).unwrap().app_id, Application::dummy(1).app_id);

        claimed.insert(Application::dummy(1).app_id);
        assert_eq!(pool.first_unclaimed(&claimed).unwrap().app_id, Application::dummy(2).app_id);

        claimed.insert(Application::dummy(3).app_id);
        claimed.insert(Application::dummy(2).app_id);
        assert!(pool.first_unclaimed(&claimed).is_none());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = ApplicationPool::new(vec![Application::dummy(1), Application::dummy(1)]).unwrap_err();
        assert!(matches!(err, CustodyError::Configuration(_)));
    }

    #[test]
    fn load_from_json_file() {
        let apps: Vec<_> = (1..=2).map(Application::dummy).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&apps).unwrap().as_bytes()).unwrap();

        let pool = ApplicationPool::load(file.path()).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let err = ApplicationPool::load("/nonexistent/apps.json").unwrap_err();
        assert!(matches!(err, CustodyError::Configuration(_)));
    }
}
