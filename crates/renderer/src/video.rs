//! Video encoding through the system `ffmpeg` binary.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, info, instrument, warn};

use crate::error::{RenderError, Result};
use crate::frame::{ChannelOrder, RenderedImage};

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: usize,
    pub height: usize,
    pub fps: u32,
    pub out_path: PathBuf,
    /// Byte order of the frames that will be written.
    pub channel_order: ChannelOrder,
    /// ffmpeg video codec for the output container.
    pub codec: String,
    pub overwrite: bool,
}

impl EncodeConfig {
    /// H.264 mp4 settings for `width x height` frames.
    pub fn mp4(out_path: impl Into<PathBuf>, width: usize, height: usize, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            out_path: out_path.into(),
            channel_order: ChannelOrder::Bgr,
            codec: "libx264".to_string(),
            overwrite: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::validation("encode width/height must be non-zero"));
        }
        if self.fps == 0 {
            return Err(RenderError::validation("encode fps must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(RenderError::validation(
                "encode width/height must be even (required for yuv420p output)",
            ));
        }
        Ok(())
    }

    fn frame_len(&self) -> usize {
        self.width * self.height * 3
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| RenderError::io(parent, e))?;
    }
    Ok(())
}

/// Streams rendered frames into an ffmpeg child process.
///
/// Dropping an encoder before [`FfmpegEncoder::finish`] kills ffmpeg and
/// removes the partial output.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    /// `None` once finished.
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames: usize,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig) -> Result<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(RenderError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.arg(if cfg.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            cfg.channel_order.pix_fmt(),
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            &cfg.codec,
            "-pix_fmt",
            "yuv420p",
        ])
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            RenderError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::encode("failed to open ffmpeg stdin"))?;

        debug!(path = %cfg.out_path.display(), codec = %cfg.codec, "Started ffmpeg");

        Ok(Self {
            cfg,
            child: Some(child),
            stdin: Some(stdin),
            frames: 0,
        })
    }

    pub fn encode_frame(&mut self, frame: &RenderedImage) -> Result<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(RenderError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.order != self.cfg.channel_order {
            return Err(RenderError::validation(format!(
                "frame channel order {:?} does not match encoder {:?}",
                frame.order, self.cfg.channel_order
            )));
        }
        if frame.data.len() != self.cfg.frame_len() {
            return Err(RenderError::validation(
                "frame data size mismatch with width*height*3",
            ));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(RenderError::encode("ffmpeg encoder is already finalized"));
        };

        stdin.write_all(&frame.data).map_err(|e| {
            RenderError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames += 1;

        Ok(())
    }

    /// Close the input and wait for ffmpeg. Returns the output path.
    pub fn finish(mut self) -> Result<PathBuf> {
        drop(self.stdin.take());

        let child = self
            .child
            .take()
            .ok_or_else(|| RenderError::encode("ffmpeg encoder is already finalized"))?;
        let output = child.wait_with_output().map_err(|e| {
            RenderError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        info!(path = %self.cfg.out_path.display(), frames = self.frames, "Encoded video");
        Ok(self.cfg.out_path.clone())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        drop(self.stdin.take());

        if let Err(e) = child.kill() {
            debug!(error = %e, "ffmpeg already exited");
        }
        if let Err(e) = child.wait() {
            warn!(error = %e, "Failed to reap ffmpeg");
        }
        if self.cfg.out_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.cfg.out_path) {
                warn!(path = %self.cfg.out_path.display(), error = %e, "Failed to remove partial video");
            }
        }
        warn!(
            path = %self.cfg.out_path.display(),
            frames = self.frames,
            "Aborted unfinished encode"
        );
    }
}

/// Convert `src` into the container implied by `dst`'s extension.
#[instrument]
pub fn transcode(src: &Path, dst: &Path) -> Result<()> {
    if !src.exists() {
        return Err(RenderError::validation(format!(
            "transcode source '{}' does not exist",
            src.display()
        )));
    }
    ensure_parent_dir(dst)?;

    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(src)
        .arg(dst)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| RenderError::encode(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        return Err(RenderError::encode(format!(
            "ffmpeg transcode exited with status {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    debug!(src = %src.display(), dst = %dst.display(), "Transcoded video");
    Ok(())
}
