//! Synthetic camera (`stub://` URLs).
//!
//! Produces frames on a background producer thread at roughly `target_fps`, with random
//! jitter so arrival is not periodic. Every `hit_every` frames it stamps a barcode marker
//! and a text marker that the stub recognizers decode.

use anyhow::{anyhow, Result};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::{CameraCapabilities, FrameSink, FrameSource};
use crate::frame::{CameraFacing, Frame, Rotation};
use crate::recognize::stub;

/// Configuration for a synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticCameraConfig {
    /// Must start with `stub://`.
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    pub camera_count: usize,
    pub has_torch: bool,
    /// Stamp recognizable markers every N frames. 0 disables markers.
    pub hit_every: u64,
}

impl Default for SyntheticCameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://rear_camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            camera_count: 2,
            has_torch: true,
            hit_every: 30,
        }
    }
}

/// Statistics for a synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticStats {
    pub frames_captured: u64,
    pub url: String,
    pub facing: CameraFacing,
    pub torch_on: bool,
}

/// Synthetic frame source.
pub struct SyntheticCamera {
    config: SyntheticCameraConfig,
    facing: CameraFacing,
    torch_on: bool,
    frame_count: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticCameraConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!(
                "only stub:// cameras are built in (got {})",
                config.url
            ));
        }
        if config.target_fps == 0 {
            return Err(anyhow!("target_fps must be >= 1"));
        }
        Ok(Self {
            config,
            facing: CameraFacing::Back,
            torch_on: false,
            frame_count: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            producer: None,
        })
    }

    pub fn is_streaming(&self) -> bool {
        self.producer.is_some()
    }

    pub fn stats(&self) -> SyntheticStats {
        SyntheticStats {
            frames_captured: self.frame_count.load(Ordering::Relaxed),
            url: self.config.url.clone(),
            facing: self.facing,
            torch_on: self.torch_on,
        }
    }

    fn stop_producer(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                log::error!("SyntheticCamera: producer thread panicked");
            }
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn camera_count(&self) -> usize {
        self.config.camera_count
    }

    fn acquire(&mut self, facing: CameraFacing, sink: FrameSink) -> Result<CameraCapabilities> {
        if facing == CameraFacing::Front && self.config.camera_count < 2 {
            return Err(anyhow!("{} has no front camera", self.config.url));
        }
        self.stop_producer();
        self.facing = facing;
        self.running.store(true, Ordering::SeqCst);

        let producer = Producer {
            config: self.config.clone(),
            facing,
            frame_count: self.frame_count.clone(),
            running: self.running.clone(),
            sink,
        };
        let handle = std::thread::Builder::new()
            .name("synthetic-camera".to_string())
            .spawn(move || producer.run())
            .map_err(|e| anyhow!("failed to start synthetic camera thread: {}", e))?;
        self.producer = Some(handle);

        log::info!(
            "SyntheticCamera: streaming {} ({:?}, {}x{} @ {} fps)",
            self.config.url,
            facing,
            self.config.width,
            self.config.height,
            self.config.target_fps
        );
        Ok(CameraCapabilities {
            has_torch: self.config.has_torch,
            width: self.config.width,
            height: self.config.height,
        })
    }

    fn halt(&mut self) {
        self.stop_producer();
    }

    fn set_facing(&mut self, facing: CameraFacing) -> Result<()> {
        if facing == CameraFacing::Front && self.config.camera_count < 2 {
            return Err(anyhow!("{} has no front camera", self.config.url));
        }
        self.facing = facing;
        Ok(())
    }

    fn set_torch(&mut self, on: bool) -> Result<()> {
        if !self.config.has_torch {
            return Err(anyhow!("{} has no flash unit", self.config.url));
        }
        self.torch_on = on;
        Ok(())
    }

    fn release(&mut self) {
        self.stop_producer();
        self.torch_on = false;
        log::info!("SyntheticCamera: released {}", self.config.url);
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop_producer();
    }
}

struct Producer {
    config: SyntheticCameraConfig,
    facing: CameraFacing,
    frame_count: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    sink: FrameSink,
}

impl Producer {
    fn run(self) {
        let interval_ms = (1000 / self.config.target_fps.max(1)) as u64;
        let mut rng = rand::thread_rng();
        while self.running.load(Ordering::SeqCst) {
            let n = self.frame_count.fetch_add(1, Ordering::Relaxed) + 1;
            let frame = self.generate(n);
            let disposition = self.sink.submit(frame);
            log::trace!("SyntheticCamera: frame {} -> {:?}", n, disposition);

            let jitter = rng.gen_range(0..=interval_ms / 4);
            std::thread::sleep(Duration::from_millis(interval_ms + jitter));
        }
    }

    fn generate(&self, n: u64) -> Frame {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + n) % 251) as u8 | 1;
        }

        if self.config.hit_every > 0 && n % self.config.hit_every == 0 {
            let facing = match self.facing {
                CameraFacing::Front => "front",
                CameraFacing::Back => "back",
            };
            stub::stamp_barcode(&mut pixels, 0, "qr_code", &format!("{}-frame-{}", facing, n));
            stub::stamp_text(&mut pixels, pixel_count / 2, &format!("{} frame {}", facing, n));
        }

        let rotation = match self.facing {
            CameraFacing::Back => Rotation::Deg90,
            CameraFacing::Front => Rotation::Deg270,
        };
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            rotation,
            self.facing,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::FrameDisposition;
    use std::sync::mpsc;

    fn small_config() -> SyntheticCameraConfig {
        SyntheticCameraConfig {
            url: "stub://test".to_string(),
            target_fps: 100,
            width: 32,
            height: 32,
            camera_count: 2,
            has_torch: false,
            hit_every: 1,
        }
    }

    #[test]
    fn rejects_non_stub_urls() {
        let config = SyntheticCameraConfig {
            url: "rtsp://camera".to_string(),
            ..small_config()
        };
        assert!(SyntheticCamera::new(config).is_err());
    }

    #[test]
    fn pushes_frames_with_requested_facing() {
        let mut camera = SyntheticCamera::new(small_config()).unwrap();
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let sink = FrameSink::new(move |frame| {
            let _ = tx.lock().unwrap().send((frame.facing(), frame.width()));
            FrameDisposition::Dispatched
        });

        camera.acquire(CameraFacing::Front, sink).unwrap();
        let (facing, width) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        camera.halt();

        assert_eq!(facing, CameraFacing::Front);
        assert_eq!(width, 32);
        assert!(!camera.is_streaming());
        assert!(camera.stats().frames_captured >= 1);
    }

    #[test]
    fn torch_requires_flash_unit() {
        let mut camera = SyntheticCamera::new(small_config()).unwrap();
        assert!(camera.set_torch(true).is_err());

        let mut lit = SyntheticCamera::new(SyntheticCameraConfig {
            has_torch: true,
            ..small_config()
        })
        .unwrap();
        lit.set_torch(true).unwrap();
        assert!(lit.stats().torch_on);
    }

    #[test]
    fn single_camera_device_has_no_front() {
        let mut camera = SyntheticCamera::new(SyntheticCameraConfig {
            camera_count: 1,
            ..small_config()
        })
        .unwrap();
        assert!(camera.set_facing(CameraFacing::Front).is_err());
        assert!(camera
            .acquire(CameraFacing::Front, FrameSink::discard())
            .is_err());
    }
}
