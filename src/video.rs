use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::json;

#[cfg(any(unix, target_os = "windows"))]
use rand::{distributions::Alphanumeric, Rng};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::api::VideoItem;

const IPC_RETRIES: usize = 5;
const IPC_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Maps a content identifier onto the gateway. Pure; no network involved.
pub fn playback_url(gateway: &str, cid: &str) -> Option<String> {
    let cid = cid.trim().trim_start_matches('/');
    if cid.is_empty() {
        return None;
    }
    let gateway = gateway.trim();
    if gateway.ends_with('/') {
        Some(format!("{gateway}{cid}"))
    } else {
        Some(format!("{gateway}/{cid}"))
    }
}

/// One playable element in the feed. Only the playback controller drives these.
pub trait MediaHandle: Send {
    fn set_muted(&mut self, muted: bool) -> Result<()>;
    fn play(&mut self) -> Result<()>;
}

pub trait MediaFactory: Send + Sync {
    fn create(&self, video: &VideoItem) -> Box<dyn MediaHandle>;
}

pub struct MpvFactory {
    mpv_path: String,
    gateway: String,
}

impl MpvFactory {
    pub fn new(mpv_path: impl Into<String>, gateway: impl Into<String>) -> Self {
        Self {
            mpv_path: mpv_path.into(),
            gateway: gateway.into(),
        }
    }
}

impl MediaFactory for MpvFactory {
    fn create(&self, video: &VideoItem) -> Box<dyn MediaHandle> {
        Box::new(MpvHandle {
            mpv_path: self.mpv_path.clone(),
            url: playback_url(&self.gateway, &video.video_cid),
            label: video.title.trim().to_string(),
            muted: true,
            process: None,
        })
    }
}

/// An mpv window for one video, started on first `play` and steered over JSON IPC.
pub struct MpvHandle {
    mpv_path: String,
    url: Option<String>,
    label: String,
    muted: bool,
    process: Option<MpvProcess>,
}

struct MpvProcess {
    child: Child,
    ipc_path: Option<String>,
}

impl MpvHandle {
    fn launch(&self, url: &str) -> Result<MpvProcess> {
        let ipc_path = unique_ipc_path();
        if let Some(path) = &ipc_path {
            cleanup_ipc_path(path);
        }

        let mut args = vec![
            url.to_string(),
            "--force-window=yes".to_string(),
            "--keep-open=no".to_string(),
            "--loop-file=inf".to_string(),
            "--really-quiet".to_string(),
            "--no-config".to_string(),
            "--ytdl=no".to_string(),
            format!("--mute={}", if self.muted { "yes" } else { "no" }),
        ];
        if let Some(path) = &ipc_path {
            args.push(format!("--input-ipc-server={path}"));
        }
        if !self.label.is_empty() {
            args.push(format!("--force-media-title={}", self.label));
        }

        let child = Command::new(&self.mpv_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("launch mpv for {url}"))?;
        tracing::debug!(url, ipc = ?ipc_path, "spawned mpv");
        Ok(MpvProcess { child, ipc_path })
    }

    fn send(&mut self, command: VideoCommand) -> Result<()> {
        let Some(process) = self.process.as_mut() else {
            return Ok(());
        };
        if let Ok(Some(status)) = process.child.try_wait() {
            tracing::debug!(%status, "mpv exited; dropping handle");
            self.process = None;
            return Ok(());
        }
        let Some(path) = &process.ipc_path else {
            return Err(anyhow!("video controls are not supported on this platform"));
        };
        send_ipc_command(path, command)
    }
}

impl MediaHandle for MpvHandle {
    fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.muted = muted;
        self.send(VideoCommand::SetMute(muted))?;
        // Off-screen windows keep their place but stop decoding.
        if muted {
            self.send(VideoCommand::SetPause(true))?;
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.process.is_some() {
            return self.send(VideoCommand::SetPause(false));
        }
        let Some(url) = self.url.clone() else {
            return Err(anyhow!("video has no content locator"));
        };
        self.process = Some(self.launch(&url)?);
        Ok(())
    }
}

impl Drop for MpvHandle {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            let _ = process.child.kill();
            let _ = process.child.wait();
            if let Some(path) = &process.ipc_path {
                cleanup_ipc_path(path);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VideoCommand {
    SetMute(bool),
    SetPause(bool),
}

fn send_ipc_command(path: &str, command: VideoCommand) -> Result<()> {
    let payload = json!({
        "command": command_payload(command),
    });
    let serialized = serde_json::to_string(&payload).context("serialize mpv command")?;
    send_ipc_command_inner(path, &serialized)
}

#[cfg(unix)]
fn send_ipc_command_inner(path: &str, serialized: &str) -> Result<()> {
    use std::io::ErrorKind;

    for attempt in 0..IPC_RETRIES {
        match UnixStream::connect(path) {
            Ok(mut stream) => {
                stream
                    .write_all(serialized.as_bytes())
                    .context("write mpv IPC command")?;
                stream
                    .write_all(b"\n")
                    .context("write mpv IPC command terminator")?;
                return Ok(());
            }
            Err(err)
                if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused)
                    && attempt + 1 < IPC_RETRIES =>
            {
                thread::sleep(IPC_RETRY_DELAY);
            }
            Err(err) => {
                return Err(anyhow!(err)).context(format!("connect to mpv IPC socket {path}"));
            }
        }
    }

    Err(anyhow!("connect to mpv IPC socket {}", path))
}

#[cfg(target_os = "windows")]
fn send_ipc_command_inner(path: &str, serialized: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::ErrorKind;

    for attempt in 0..IPC_RETRIES {
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(mut pipe) => {
                pipe.write_all(serialized.as_bytes())
                    .with_context(|| format!("write mpv IPC command to {path}"))?;
                pipe.write_all(b"\n")
                    .with_context(|| format!("write mpv IPC command terminator to {path}"))?;
                pipe.flush().ok();
                return Ok(());
            }
            Err(err) if err.kind() == ErrorKind::NotFound && attempt + 1 < IPC_RETRIES => {
                thread::sleep(IPC_RETRY_DELAY);
            }
            Err(err) => {
                return Err(anyhow!(err)).context(format!("connect to mpv IPC named pipe {path}"));
            }
        }
    }

    Err(anyhow!("connect to mpv IPC named pipe {}", path))
}

#[cfg(all(not(unix), not(target_os = "windows")))]
fn send_ipc_command_inner(_path: &str, _serialized: &str) -> Result<()> {
    Err(anyhow!("video controls are not supported on this platform"))
}

#[cfg(unix)]
fn unique_ipc_path() -> Option<String> {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    let mut path = std::env::temp_dir();
    path.push(format!("reels-mpv-{}-{suffix}.sock", std::process::id()));
    Some(path.to_string_lossy().to_string())
}

#[cfg(target_os = "windows")]
fn unique_ipc_path() -> Option<String> {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    Some(format!(r"\\.\pipe\reels-mpv-{}-{suffix}", std::process::id()))
}

#[cfg(all(not(unix), not(target_os = "windows")))]
fn unique_ipc_path() -> Option<String> {
    None
}

#[cfg(unix)]
fn cleanup_ipc_path(path: &str) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!("failed to remove mpv ipc path {path}: {err}");
        }
    }
}

#[cfg(not(unix))]
fn cleanup_ipc_path(_path: &str) {}

fn command_payload(command: VideoCommand) -> serde_json::Value {
    match command {
        VideoCommand::SetMute(muted) => json!(["set_property", "mute", muted]),
        VideoCommand::SetPause(paused) => json!(["set_property", "pause", paused]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_url_joins_gateway_and_cid() {
        assert_eq!(
            playback_url("https://gw.test/ipfs/", "bafy1").as_deref(),
            Some("https://gw.test/ipfs/bafy1")
        );
        assert_eq!(
            playback_url("https://gw.test/ipfs", "/bafy1").as_deref(),
            Some("https://gw.test/ipfs/bafy1")
        );
    }

    #[test]
    fn playback_url_requires_cid() {
        assert_eq!(playback_url("https://gw.test/ipfs/", "  "), None);
    }

    #[test]
    fn mute_payload_uses_set_property() {
        assert_eq!(
            command_payload(VideoCommand::SetMute(true)),
            json!(["set_property", "mute", true])
        );
        assert_eq!(
            command_payload(VideoCommand::SetPause(false)),
            json!(["set_property", "pause", false])
        );
    }

    #[test]
    fn handle_without_locator_refuses_to_play() {
        let factory = MpvFactory::new("mpv", "https://gw.test/ipfs/");
        let mut handle = factory.create(&VideoItem::default());
        assert!(handle.play().is_err());
        assert!(handle.set_muted(false).is_ok());
    }
}
