pub mod error;
pub mod evaluator;
pub mod gemini;
pub mod model;
pub mod prompts;
pub mod question_source;
pub mod session;
pub mod speech;
pub mod transcript;

pub use error::{
    EvaluationError, GenerationError, RecognitionUnavailable, SessionError, SynthesisError,
};
pub use evaluator::{FeedbackEvaluator, GeminiEvaluator};
pub use model::{FeedbackItem, FeedbackResult, NO_ANSWER, QaPair, QuestionItem};
pub use question_source::{GeminiQuestionSource, QuestionSource};
pub use session::{
    Collaborators, Phase, SessionCompletion, SessionController, SessionOutcome, SessionSettings,
    SessionState,
};
pub use speech::{FragmentSink, ListenHandle, ListenTag, SpeechInput, SpeechOutput};
pub use transcript::{Fragment, TranscriptAccumulator};
