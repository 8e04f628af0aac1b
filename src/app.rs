use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::config;
use crate::data::Services;
use crate::feed::{Session, SessionOptions};
use crate::identity::Identity;
use crate::logging;
use crate::ui;
use crate::video::{MediaFactory, MpvFactory};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Video to show first, fetched on its own.
    pub pinned_video: Option<String>,
}

pub fn run(opts: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let display_path = friendly_path(config::default_path().as_ref());

    let logging_enabled = logging::init(&cfg.log).context("init logging")?;
    tracing::info!(
        version = crate::VERSION,
        config = %display_path,
        "starting"
    );

    let user_agent = if !cfg.api.user_agent.trim().is_empty() {
        cfg.api.user_agent.clone()
    } else {
        format!("reels/{}", crate::VERSION)
    };
    let client = api::Client::new(api::ClientConfig {
        base_url: cfg.api.base_url.clone(),
        user_agent,
        timeout: cfg.api.timeout,
        http_client: None,
    })
    .context("create api client")?;
    tracing::info!(base_url = %client.base_url(), "remote store");
    let services = Services::from_client(Arc::new(client));

    let identity = Arc::new(Identity::from_config(&cfg.viewer));
    let media: Option<Box<dyn MediaFactory>> = if cfg.player.enabled {
        Some(Box::new(MpvFactory::new(
            cfg.player.mpv_path.clone(),
            cfg.api.gateway_url.clone(),
        )))
    } else {
        None
    };

    let mut session_opts = SessionOptions::new(services, identity.clone());
    session_opts.media = media;
    session_opts.swipe_threshold = cfg.feed.swipe_threshold;
    session_opts.share_origin = cfg.api.share_origin.clone();
    session_opts.pinned_video = opts.pinned_video;

    let status_message = match identity.current() {
        Some(viewer) => format!("Signed in as {}.", viewer.handle()),
        None => format!("Browsing anonymously. Set viewer.fid in {display_path} to like and comment."),
    };

    let mut model = ui::Model::new(ui::Options {
        session: Session::new(session_opts),
        cell_height: cfg.feed.cell_height,
        status_message,
    });
    let result = model.run();
    if logging_enabled {
        tracing::info!("exiting");
    }
    result
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/reels/config.yaml".to_string()
    }
}
