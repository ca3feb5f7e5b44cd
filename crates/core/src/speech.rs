//! Speech capabilities the session drives: an output that speaks a question
//! and an input that transcribes the answer.
//!
//! Recognizers never touch session state directly. They push [`Fragment`]s
//! into a [`FragmentSink`], which forwards them to the session task tagged with
//! the session and question they were started for. A [`ListenHandle`] closes
//! the sink when stopped, so nothing is delivered after `stop()` no matter how
//! the backing recognizer behaves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::error::{RecognitionUnavailable, SynthesisError};
use crate::transcript::Fragment;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speaks `text`, returning once playback has finished.
    async fn speak(&self, text: &str) -> Result<(), SynthesisError>;

    /// Aborts any in-flight utterance. Must be safe to call at any time.
    fn cancel(&self);
}

#[cfg_attr(test, automock)]
pub trait SpeechInput: Send + Sync {
    /// Starts recognition, delivering fragments into `sink` until the returned
    /// handle is stopped or dropped.
    fn start(&self, sink: FragmentSink) -> Result<ListenHandle, RecognitionUnavailable>;
}

/// Identifies which listening phase a recognizer was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ListenTag {
    pub session: u64,
    pub question: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    Fragment(Fragment),
    /// The recognizer stopped on its own.
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub tag: ListenTag,
    pub event: RecognizerEvent,
}

pub type FragmentReceiver = mpsc::UnboundedReceiver<TaggedEvent>;

#[derive(Debug, Clone)]
pub struct FragmentSink {
    tx: mpsc::UnboundedSender<TaggedEvent>,
    tag: ListenTag,
    open: Arc<AtomicBool>,
}

impl FragmentSink {
    /// Creates a sink and the receiver its events arrive on.
    pub fn channel(tag: ListenTag) -> (Self, FragmentReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, tag), rx)
    }

    pub(crate) fn new(tx: mpsc::UnboundedSender<TaggedEvent>, tag: ListenTag) -> Self {
        Self {
            tx,
            tag,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn tag(&self) -> ListenTag {
        self.tag
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Delivers a fragment. Returns `false` if the sink was already closed.
    pub fn fragment(&self, text: impl Into<String>, is_final: bool) -> bool {
        self.send(RecognizerEvent::Fragment(Fragment {
            text: text.into(),
            is_final,
        }))
    }

    /// Reports that the recognizer ended by itself.
    pub fn end(&self) -> bool {
        let delivered = self.send(RecognizerEvent::Ended);
        self.close();
        delivered
    }

    fn send(&self, event: RecognizerEvent) -> bool {
        if !self.is_open() {
            return false;
        }
        self.tx
            .send(TaggedEvent {
                tag: self.tag,
                event,
            })
            .is_ok()
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

/// Stops a running recognizer. Stopping is idempotent and never fails.
pub struct ListenHandle {
    sink: FragmentSink,
    on_stop: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenHandle {
    /// Wraps a recognizer whose teardown is `on_stop`. The closure runs at most once.
    pub fn new(sink: &FragmentSink, on_stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            sink: sink.clone(),
            on_stop: Some(Box::new(on_stop)),
        }
    }

    /// A handle with nothing to tear down besides closing the sink.
    pub fn detached(sink: &FragmentSink) -> Self {
        Self {
            sink: sink.clone(),
            on_stop: None,
        }
    }

    pub fn stop(&mut self) {
        self.sink.close();
        if let Some(on_stop) = self.on_stop.take() {
            on_stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.sink.is_open()
    }
}

impl Drop for ListenHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ListenHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenHandle")
            .field("tag", &self.sink.tag)
            .field("active", &self.is_active())
            .finish()
    }
}
