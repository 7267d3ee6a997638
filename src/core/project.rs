//! Project discovery and structure
//!
//! A shopqc project is a directory with a `.shopqc/` folder holding the
//! quality database, the config file, the roster, and stored attachments.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::roster::QualityRoster;
use crate::core::store::{QualityStore, StoreError};

/// Represents a shopqc project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .shopqc/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current =
            std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(".shopqc").is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let shopqc_dir = root.join(".shopqc");
        if shopqc_dir.exists() {
            return Err(ProjectError::AlreadyExists(root.clone()));
        }
        Self::materialize(&root)
    }

    /// Force initialization even if .shopqc/ exists (database and roster
    /// are kept if already present)
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::materialize(&root)
    }

    fn materialize(root: &Path) -> Result<Self, ProjectError> {
        let shopqc_dir = root.join(".shopqc");
        std::fs::create_dir_all(shopqc_dir.join("attachments"))
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        let config_path = shopqc_dir.join("config.yaml");
        if !config_path.exists() {
            std::fs::write(&config_path, Self::default_config())
                .map_err(|e| ProjectError::IoError(e.to_string()))?;
        }

        let roster_path = shopqc_dir.join("roster.yaml");
        if !roster_path.exists() {
            std::fs::write(&roster_path, QualityRoster::default_template())
                .map_err(|e| ProjectError::IoError(e.to_string()))?;
        }

        let project = Self {
            root: root.to_path_buf(),
        };
        // Creates the database with its schema on first open
        project.open_store()?;
        Ok(project)
    }

    fn default_config() -> &'static str {
        r#"# shopqc project configuration

# Default actor recorded on audit entries (can be overridden by the
# global config or SHOPQC_AUTHOR)
# author: ""
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .shopqc configuration directory
    pub fn shopqc_dir(&self) -> PathBuf {
        self.root.join(".shopqc")
    }

    /// Path of the quality database
    pub fn db_path(&self) -> PathBuf {
        self.shopqc_dir().join("quality.db")
    }

    /// Path of the roster file
    pub fn roster_path(&self) -> PathBuf {
        self.shopqc_dir().join("roster.yaml")
    }

    /// Directory where attachments are stored
    pub fn attachments_dir(&self) -> PathBuf {
        self.shopqc_dir().join("attachments")
    }

    /// Open the project's quality database
    pub fn open_store(&self) -> Result<QualityStore, StoreError> {
        QualityStore::open(&self.db_path())
    }

    /// Load the project's roster
    pub fn load_roster(&self) -> QualityRoster {
        QualityRoster::load(&self.roster_path())
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a shopqc project (searched from {searched_from:?}). Run 'shopqc init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("shopqc project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("could not open quality database: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.shopqc_dir().is_dir());
        assert!(project.shopqc_dir().join("config.yaml").is_file());
        assert!(project.roster_path().is_file());
        assert!(project.attachments_dir().is_dir());
        assert!(project.db_path().is_file());
    }

    #[test]
    fn test_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let err = Project::init(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
    }

    #[test]
    fn test_init_force_keeps_database() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        {
            let mut store = project.open_store().unwrap();
            crate::core::lifecycle::create_job(
                &mut store,
                crate::core::lifecycle::NewJob {
                    po_number: "PO-1".to_string(),
                    part_number: "X-1".to_string(),
                    quantity: 1,
                    ..Default::default()
                },
                "t",
            )
            .unwrap();
        }

        let project = Project::init_force(tmp.path()).unwrap();
        let store = project.open_store().unwrap();
        let jobs = crate::core::store::list_jobs(store.conn(), None).unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("shop/floor");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(
            project.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_discover_fails_outside_project() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }
}
