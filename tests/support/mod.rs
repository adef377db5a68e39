#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use perplexity_api::{CancellationSignal, FrameSource, PerplexityApiError};
use plexctl::PacerConfig;
use thread_store::{Thread, ThreadStore, ThreadStoreError};

pub enum Step {
    Frame(Vec<u8>),
    Fail(String),
    /// Blocks until the caller gives up.
    Hang,
}

/// Frame source that replays a fixed script, then reports EOF.
pub struct ScriptedFrames {
    steps: VecDeque<Step>,
    reads: usize,
}

impl ScriptedFrames {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            reads: 0,
        }
    }

    pub fn frames(frames: &[&str]) -> Self {
        Self::new(
            frames
                .iter()
                .map(|frame| Step::Frame(frame.as_bytes().to_vec()))
                .collect(),
        )
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

#[async_trait]
impl FrameSource for ScriptedFrames {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, PerplexityApiError> {
        self.reads += 1;
        match self.steps.pop_front() {
            None => Ok(None),
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Fail(message)) => Err(PerplexityApiError::Transport(message)),
            Some(Step::Hang) => Ok(std::future::pending::<Option<Vec<u8>>>().await),
        }
    }
}

/// Display sink that records output and flags when the pacing task drops it.
pub struct CaptureSink {
    output: Arc<Mutex<Vec<u8>>>,
    finished: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct CaptureHandle {
    output: Arc<Mutex<Vec<u8>>>,
    finished: Arc<AtomicBool>,
}

pub fn capture() -> (CaptureSink, CaptureHandle) {
    let output = Arc::new(Mutex::new(Vec::new()));
    let finished = Arc::new(AtomicBool::new(false));
    (
        CaptureSink {
            output: Arc::clone(&output),
            finished: Arc::clone(&finished),
        },
        CaptureHandle { output, finished },
    )
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output
            .lock()
            .expect("capture lock poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for CaptureSink {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

impl CaptureHandle {
    pub fn text(&self) -> String {
        String::from_utf8(self.output.lock().expect("capture lock poisoned").clone())
            .expect("display output should be utf-8")
    }

    /// True once the pacing task has exited and released its sink.
    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

pub fn fast_pacer() -> PacerConfig {
    PacerConfig::default().with_interval(Duration::from_micros(100))
}

pub fn cancel_after(signal: &CancellationSignal, delay: Duration) {
    let signal = Arc::clone(signal);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        perplexity_api::cancel::cancel(&signal);
    });
}

pub fn delta_frame(content: &str) -> String {
    format!(
        "data: {}",
        serde_json::json!({"choices": [{"delta": {"content": content}}]})
    )
}

/// Store whose saves always fail.
pub struct ReadOnlyStore;

impl ThreadStore for ReadOnlyStore {
    fn load(&self, id_prefix: &str) -> Result<Thread, ThreadStoreError> {
        Err(ThreadStoreError::NotFound {
            prefix: id_prefix.to_owned(),
        })
    }

    fn save(&self, thread: &Thread) -> Result<PathBuf, ThreadStoreError> {
        Err(ThreadStoreError::io(
            "replacing thread file",
            format!("/read-only/{}.json", thread.id),
            io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system"),
        ))
    }

    fn list(&self) -> Result<Vec<Thread>, ThreadStoreError> {
        Ok(Vec::new())
    }
}
