//! Frame ingestion: skeleton frames streamed by the external pose process.

use anyhow::Result;
use log::{info, warn};
use serde::Deserialize;
use std::{
    io::{BufRead, BufReader},
    os::unix::net::{UnixListener, UnixStream},
    sync::{Arc, Mutex},
};

use crate::pose::Skeleton;
use crate::session::SessionAggregator;

/// One line on the frame socket: every detected person in one video frame.
#[derive(Debug, Deserialize)]
struct FrameMsg {
    #[serde(default)]
    detections: Vec<Skeleton>,
}

/// Accept one pose producer at a time and drive the aggregator with its
/// frames. The aggregator lock is held only for the duration of one
/// `process_frame` call, so control-socket reads interleave cleanly.
pub fn run_pipeline(aggregator: Arc<Mutex<SessionAggregator>>) -> Result<()> {
    let sock = super::runtime::frames_socket_path();
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("pipeline: listening for frames on {}", sock.display());

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                info!("pipeline: pose producer connected");
                feed_frames(stream, &aggregator);
                info!("pipeline: pose producer disconnected");
            }
            Err(e) => warn!("pipeline: accept failed: {e}"),
        }
    }
    Ok(())
}

fn feed_frames(stream: UnixStream, aggregator: &Arc<Mutex<SessionAggregator>>) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("pipeline: read error: {e}");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        // A malformed line costs one frame, never the session.
        let msg: FrameMsg = match serde_json::from_str(&line) {
            Ok(m) => m,
            Err(e) => {
                warn!("pipeline: skipping malformed frame: {e}");
                continue;
            }
        };
        let mut agg = aggregator.lock().unwrap();
        agg.process_frame(&msg.detections);
    }
}
