use serde::{Deserialize, Serialize};

use crate::api::Author;
use crate::config::ViewerConfig;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("viewer identity unavailable")]
    Unavailable,
}

/// The signed-in viewer as supplied by the frame-identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub fid: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
}

impl Viewer {
    pub fn author(&self) -> Author {
        Author {
            fid: self.fid,
            username: self.username.clone().unwrap_or_default(),
            display_name: self.display_name.clone(),
            pfp_url: self.pfp_url.clone(),
        }
    }

    pub fn handle(&self) -> String {
        match self.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("@{name}"),
            _ => format!("fid:{}", self.fid),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Identity {
    viewer: Option<Viewer>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(viewer: Viewer) -> Self {
        Self {
            viewer: Some(viewer),
        }
    }

    /// A fid of zero or a blank username means no identity was configured.
    pub fn from_config(cfg: &ViewerConfig) -> Self {
        let username = cfg.username.trim();
        if cfg.fid <= 0 || username.is_empty() {
            return Self::anonymous();
        }
        let non_empty = |value: &str| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };
        Self::signed_in(Viewer {
            fid: cfg.fid,
            username: Some(username.to_string()),
            display_name: non_empty(&cfg.display_name),
            pfp_url: non_empty(&cfg.pfp_url),
        })
    }

    pub fn current(&self) -> Option<Viewer> {
        self.viewer.clone()
    }

    pub fn require(&self) -> Result<Viewer, IdentityError> {
        self.current().ok_or(IdentityError::Unavailable)
    }

    pub fn is_known(&self) -> bool {
        self.viewer.is_some()
    }
}
