#![allow(dead_code)]

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use interview_core::evaluator::parse_feedback;
use interview_core::{
    Collaborators, EvaluationError, FeedbackEvaluator, FeedbackResult, FragmentSink,
    GenerationError, ListenHandle, Phase, QaPair, QuestionItem, QuestionSource,
    RecognitionUnavailable, SessionController, SessionSettings, SessionState, SpeechInput,
    SpeechOutput, SynthesisError,
};
use serde_json::json;
use tokio::sync::watch;

/// Tracks what is audible and what is being listened to, counting every
/// moment both are true at once.
#[derive(Debug, Default)]
pub struct Monitor {
    speaking: AtomicUsize,
    listening: AtomicUsize,
    overlaps: AtomicUsize,
}

impl Monitor {
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst) > 0
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst) > 0
    }

    fn begin_speaking(self: &Arc<Self>) -> SpeakingGuard {
        if self.is_listening() {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.speaking.fetch_add(1, Ordering::SeqCst);
        SpeakingGuard(self.clone())
    }

    fn begin_listening(&self) {
        if self.is_speaking() {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.listening.fetch_add(1, Ordering::SeqCst);
    }

    fn end_listening(&self) {
        self.listening.fetch_sub(1, Ordering::SeqCst);
    }
}

struct SpeakingGuard(Arc<Monitor>);

impl Drop for SpeakingGuard {
    fn drop(&mut self) {
        self.0.speaking.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct FakeSpeaker {
    monitor: Arc<Monitor>,
    delay: Mutex<Duration>,
    failure: Mutex<Option<SynthesisError>>,
    spoken: Mutex<Vec<String>>,
    cancels: AtomicUsize,
}

impl FakeSpeaker {
    pub fn new(monitor: Arc<Monitor>, delay: Duration) -> Self {
        Self {
            monitor,
            delay: Mutex::new(delay),
            failure: Mutex::new(None),
            spoken: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        }
    }

    pub fn failing(monitor: Arc<Monitor>, error: SynthesisError) -> Self {
        let speaker = Self::new(monitor, Duration::from_millis(10));
        *speaker.failure.lock().unwrap() = Some(error);
        speaker
    }

    pub fn set_failure(&self, failure: Option<SynthesisError>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechOutput for FakeSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        self.spoken.lock().unwrap().push(text.to_string());
        let delay = *self.delay.lock().unwrap();
        let failure = self.failure.lock().unwrap().clone();

        let _guard = self.monitor.begin_speaking();
        tokio::time::sleep(delay).await;
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeRecognizer {
    monitor: Arc<Monitor>,
    current: Arc<Mutex<Option<FragmentSink>>>,
    unavailable: bool,
    starts: AtomicUsize,
}

impl FakeRecognizer {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            monitor,
            current: Arc::new(Mutex::new(None)),
            unavailable: false,
            starts: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(monitor: Arc<Monitor>) -> Self {
        Self {
            unavailable: true,
            ..Self::new(monitor)
        }
    }

    /// Delivers a fragment to the running recognition, if any.
    pub fn say(&self, text: &str, is_final: bool) -> bool {
        match self.current.lock().unwrap().as_ref() {
            Some(sink) => sink.fragment(text, is_final),
            None => false,
        }
    }

    /// The sink of the running recognition, kept to deliver fragments late.
    pub fn current_sink(&self) -> Option<FragmentSink> {
        self.current.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl SpeechInput for FakeRecognizer {
    fn start(&self, sink: FragmentSink) -> Result<ListenHandle, RecognitionUnavailable> {
        if self.unavailable {
            return Err(RecognitionUnavailable::new("no microphone in test"));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.monitor.begin_listening();
        *self.current.lock().unwrap() = Some(sink.clone());

        let monitor = self.monitor.clone();
        let current = self.current.clone();
        let tag = sink.tag();
        Ok(ListenHandle::new(&sink, move || {
            monitor.end_listening();
            let mut current = current.lock().unwrap();
            if current.as_ref().is_some_and(|s| s.tag() == tag) {
                *current = None;
            }
        }))
    }
}

pub enum Script {
    Questions(Vec<QuestionItem>),
    Fail(GenerationError),
    Hang,
}

/// Answers each `generate` call with the next script entry. Once the scripts
/// run out it produces numbered questions of the requested count.
#[derive(Default)]
pub struct FakeQuestions {
    scripts: Mutex<VecDeque<Script>>,
    calls: AtomicUsize,
}

impl FakeQuestions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, script: Script) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionSource for FakeQuestions {
    async fn generate(&self, count: NonZeroUsize) -> Result<Vec<QuestionItem>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Questions(items)) => Ok(items),
            Some(Script::Fail(e)) => Err(e),
            Some(Script::Hang) => std::future::pending().await,
            None => Ok(numbered(count.get())),
        }
    }
}

/// Scores 80 per answered question and 0 otherwise, replying in the same JSON
/// shape a model would so the reply goes through `parse_feedback`.
pub struct FakeEvaluator;

#[async_trait]
impl FeedbackEvaluator for FakeEvaluator {
    async fn evaluate(&self, pairs: &[QaPair]) -> Result<FeedbackResult, EvaluationError> {
        let breakdown: Vec<_> = pairs
            .iter()
            .map(|p| {
                json!({
                    "question": p.question,
                    "answer": p.answer,
                    "topic": p.topic,
                    "score": if p.is_unanswered() { 0 } else { 80 },
                    "remark": "Scored by the fake evaluator",
                    "suggestedAnswer": format!("A model answer about {}", p.topic),
                })
            })
            .collect();
        let reply = json!({
            "overallScore": 50,
            "overallRemark": "Mixed",
            "breakdown": breakdown,
        });
        parse_feedback(&reply.to_string(), pairs.len())
    }
}

pub fn numbered(count: usize) -> Vec<QuestionItem> {
    (1..=count)
        .map(|i| QuestionItem::new(format!("Question number {i}?"), format!("Topic {i}")))
        .collect()
}

pub struct Harness {
    pub monitor: Arc<Monitor>,
    pub questions: Arc<FakeQuestions>,
    pub speaker: Arc<FakeSpeaker>,
    pub recognizer: Arc<FakeRecognizer>,
    pub controller: SessionController,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeQuestions::new(), None, None, quick_settings())
    }

    pub fn with(
        questions: FakeQuestions,
        speaker: Option<FakeSpeaker>,
        recognizer: Option<FakeRecognizer>,
        settings: SessionSettings,
    ) -> Self {
        Self::with_monitor(Arc::new(Monitor::default()), questions, speaker, recognizer, settings)
    }

    /// Like [`Harness::with`], for fakes that were built around `monitor`.
    pub fn with_monitor(
        monitor: Arc<Monitor>,
        questions: FakeQuestions,
        speaker: Option<FakeSpeaker>,
        recognizer: Option<FakeRecognizer>,
        settings: SessionSettings,
    ) -> Self {
        let questions = Arc::new(questions);
        let speaker = Arc::new(
            speaker.unwrap_or_else(|| FakeSpeaker::new(monitor.clone(), Duration::from_millis(500))),
        );
        let recognizer =
            Arc::new(recognizer.unwrap_or_else(|| FakeRecognizer::new(monitor.clone())));

        let controller = SessionController::new(
            Collaborators::new(questions.clone(), speaker.clone(), recognizer.clone()),
            settings,
        );
        Self {
            monitor,
            questions,
            speaker,
            recognizer,
            controller,
        }
    }
}

pub fn quick_settings() -> SessionSettings {
    SessionSettings {
        reveal_interval: Duration::ZERO,
        ..SessionSettings::default()
    }
}

/// Waits until the published state satisfies `f` and returns a copy of it.
pub async fn wait_until(
    rx: &mut watch::Receiver<SessionState>,
    f: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    let state = tokio::time::timeout(Duration::from_secs(600), rx.wait_for(f))
        .await
        .expect("state never reached")
        .expect("controller dropped");
    state.clone()
}

pub async fn wait_listening(rx: &mut watch::Receiver<SessionState>, index: usize) -> SessionState {
    wait_until(rx, |s| s.phase == Phase::Listening && s.question_index == index).await
}
