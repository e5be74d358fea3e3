use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::Request;
use clap::Parser;
use tokio::sync::Notify;

use facemark_core::detection::domain::face_detector::{DetectorFactory, FaceDetector};
use facemark_core::shared::face_region::FaceRegion;
use facemark_core::shared::frame::Frame;
use facemark_core::shared::frame_name::frame_path;
use facemark_core::shared::jpeg;
use facemark_core::shared::stage_control::StageControl;
use facemark_core::video::domain::frame_remuxer::FrameRemuxer;
use facemark_core::video::infrastructure::ffmpeg_frame_remuxer::FfmpegFrameRemuxer;

use crate::config::ServerConfig;
use crate::state::AppState;

const BOUNDARY: &str = "facemark-test-boundary";

/// Reports one face in the middle of every frame.
pub struct CentreFaceFactory;

struct CentreFaceDetector;

impl FaceDetector for CentreFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>> {
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        Ok(vec![FaceRegion::new(w * 0.25, h * 0.25, w * 0.75, h * 0.75)])
    }
}

impl DetectorFactory for CentreFaceFactory {
    fn create(&self) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
        Ok(Box::new(CentreFaceDetector))
    }
}

/// Like [`CentreFaceFactory`], but signals `started` when a job loads its
/// detector and then spends `per_frame` on every frame.
pub struct SlowFaceFactory {
    pub started: Arc<Notify>,
    pub per_frame: Duration,
}

struct SlowFaceDetector {
    per_frame: Duration,
}

impl FaceDetector for SlowFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>> {
        std::thread::sleep(self.per_frame);
        CentreFaceDetector.detect(frame)
    }
}

impl DetectorFactory for SlowFaceFactory {
    fn create(&self) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
        self.started.notify_one();
        Ok(Box::new(SlowFaceDetector {
            per_frame: self.per_frame,
        }))
    }
}

pub fn test_state(root: &Path) -> AppState {
    test_state_with(root, Arc::new(CentreFaceFactory))
}

pub fn test_state_with(root: &Path, detectors: Arc<dyn DetectorFactory>) -> AppState {
    let uploads = root.join("uploads");
    let output = root.join("output");
    let config = ServerConfig::try_parse_from([
        "facemark-server",
        "--uploads-dir",
        uploads.to_str().unwrap(),
        "--output-dir",
        output.to_str().unwrap(),
        "--live-attach-timeout",
        "10",
    ])
    .unwrap();
    AppState::new(config, detectors)
}

/// Encodes `n` flat 64x48 stills into an MP4 at `fps`.
pub fn make_video(dir: &Path, n: u32, fps: u32) -> PathBuf {
    let stills = dir.join("stills");
    std::fs::create_dir_all(&stills).unwrap();
    for i in 1..=n {
        let shade = ((i * 7) % 256) as u8;
        let frame = Frame::new(vec![shade; 64 * 48 * 3], 64, 48, i);
        std::fs::write(frame_path(&stills, i), jpeg::encode(&frame, 90).unwrap()).unwrap();
    }
    FfmpegFrameRemuxer
        .remux(&stills, &dir.join("source.mp4"), fps, &StageControl::new())
        .unwrap()
}

pub struct Part {
    name: &'static str,
    file_name: Option<&'static str>,
    data: Vec<u8>,
}

impl Part {
    pub fn text(name: &'static str, value: &str) -> Self {
        Self {
            name,
            file_name: None,
            data: value.as_bytes().to_vec(),
        }
    }

    pub fn file(name: &'static str, file_name: &'static str, data: &[u8]) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            data: data.to_vec(),
        }
    }
}

pub fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    part.name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}
