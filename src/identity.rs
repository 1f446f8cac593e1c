use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The signed-in user as handed over by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Identity {
    /// Key used for start, history and list calls.
    pub fn user_id(&self) -> &str {
        &self.email
    }

    /// `userId` carried by published chat messages.
    pub fn publish_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.email)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    /// Avatar fallback letter.
    pub fn initial(&self) -> char {
        self.name
            .as_deref()
            .and_then(|n| n.chars().next())
            .unwrap_or('U')
    }
}

/// Where the authenticated session comes from. Sign-in and sign-out are
/// entirely the provider's business.
pub trait IdentityProvider {
    fn current_identity(&self) -> Option<Identity>;
    fn sign_in(&self, identity: &Identity) -> Result<(), ConfigError>;
    fn sign_out(&self) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Chat(Identity),
}

/// Gate the chat view on an authenticated identity. No identity is a route,
/// not an error.
pub fn bootstrap(provider: &dyn IdentityProvider) -> Route {
    match provider.current_identity() {
        Some(identity) if !identity.email.trim().is_empty() => Route::Chat(identity),
        _ => Route::Landing,
    }
}

/// Session kept as a small TOML file next to the client config.
#[derive(Debug, Clone)]
pub struct FileIdentityProvider {
    path: PathBuf,
}

impl FileIdentityProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> Option<PathBuf> {
        let proj = ProjectDirs::from("com", "example", "Tripper")?;
        Some(proj.config_dir().join("session.toml"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl IdentityProvider for FileIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        let text = fs::read_to_string(&self.path).ok()?;
        match toml::from_str::<Identity>(&text) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!("ignoring unreadable session file {}: {e}", self.path.display());
                None
            }
        }
    }

    fn sign_in(&self, identity: &Identity) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(identity)?)?;
        debug!("session written to {}", self.path.display());
        Ok(())
    }

    fn sign_out(&self) -> Result<(), ConfigError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
