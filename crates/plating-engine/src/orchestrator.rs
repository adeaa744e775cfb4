use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use plating_contracts::chat::{classify_reply, ModelReply};
use plating_contracts::events::{SessionEvent, SessionLog};
use plating_contracts::resources::ImageResource;
use plating_contracts::transcript::{Message, Transcript};

use crate::config::EngineConfig;
use crate::conversation::{ChatSession, GeminiChatSession};
use crate::imaging::{ImageService, ImagenProvider};
use crate::synthesizer::ImageSynthesizer;
use crate::{describe_error, text};

const ERROR_TEXT_MAX_CHARS: usize = 600;

/// Where the orchestrator is in its turn cycle. Front ends derive loading
/// indicators and input enablement from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Uninitialized,
    Idle,
    AwaitingResponse,
    AwaitingImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    Busy,
    Uninitialized,
}

/// How one `submit` call settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ignored(IgnoreReason),
    Replied,
    ConversationFailed,
    ImageGenerated,
    ImageFailed,
}

struct Services {
    session: Mutex<Box<dyn ChatSession>>,
    synthesizer: ImageSynthesizer,
}

/// Owns the chat session, the image synthesizer and the transcript, and runs
/// at most one turn at a time.
///
/// All methods take `&self`; share it behind an `Arc` to run turns on a
/// worker thread while another thread watches `phase()` and `transcript()`.
pub struct ChatOrchestrator {
    services: Option<Services>,
    transcript: Mutex<Transcript>,
    phase: Mutex<TurnPhase>,
    busy: AtomicBool,
    turns: AtomicU64,
    events: Option<SessionLog>,
}

impl ChatOrchestrator {
    /// Builds the Gemini session and Imagen provider from `config`. A failure
    /// here is reported in the transcript, not returned.
    pub fn connect(config: &EngineConfig, events: Option<SessionLog>) -> Self {
        let services = GeminiChatSession::new(config).and_then(|session| {
            let images = ImagenProvider::new(config)?;
            Ok((
                Box::new(session) as Box<dyn ChatSession>,
                Box::new(images) as Box<dyn ImageService>,
            ))
        });
        Self::start(services, events)
    }

    pub fn start(
        services: Result<(Box<dyn ChatSession>, Box<dyn ImageService>)>,
        events: Option<SessionLog>,
    ) -> Self {
        match services {
            Ok((session, images)) => Self::new(session, images, events),
            Err(err) => Self::failed(&err, events),
        }
    }

    pub fn new(
        session: Box<dyn ChatSession>,
        images: Box<dyn ImageService>,
        events: Option<SessionLog>,
    ) -> Self {
        let mut transcript = Transcript::new();
        transcript.push(Message::model(text::GREETING));
        let orchestrator = Self {
            services: Some(Services {
                session: Mutex::new(session),
                synthesizer: ImageSynthesizer::new(images),
            }),
            transcript: Mutex::new(transcript),
            phase: Mutex::new(TurnPhase::Idle),
            busy: AtomicBool::new(false),
            turns: AtomicU64::new(0),
            events,
        };
        if let Some(services) = orchestrator.services.as_ref() {
            let text_model = lock(&services.session).model().to_string();
            orchestrator.emit(SessionEvent::SessionStarted {
                text_model,
                image_provider: services.synthesizer.service_name().to_string(),
                image_model: services.synthesizer.model().to_string(),
            });
        }
        orchestrator
    }

    fn failed(err: &anyhow::Error, events: Option<SessionLog>) -> Self {
        let detail = describe_error(err, ERROR_TEXT_MAX_CHARS);
        tracing::error!(error = %detail, "chat session could not be initialized");
        let mut transcript = Transcript::new();
        transcript.push(Message::model(text::GREETING));
        transcript.push(Message::model(format!(
            "{}{}",
            text::INIT_FAILURE_PREFIX,
            detail
        )));
        let orchestrator = Self {
            services: None,
            transcript: Mutex::new(transcript),
            phase: Mutex::new(TurnPhase::Uninitialized),
            busy: AtomicBool::new(false),
            turns: AtomicU64::new(0),
            events,
        };
        orchestrator.emit(SessionEvent::SessionFailed { error: detail });
        orchestrator
    }

    pub fn is_initialized(&self) -> bool {
        self.services.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> TurnPhase {
        *lock(&self.phase)
    }

    pub fn transcript(&self) -> Transcript {
        lock(&self.transcript).clone()
    }

    pub fn transcript_len(&self) -> usize {
        lock(&self.transcript).len()
    }

    pub fn messages_since(&self, start: usize) -> Vec<Message> {
        lock(&self.transcript)
            .messages()
            .iter()
            .skip(start)
            .cloned()
            .collect()
    }

    pub fn latest_image(&self) -> Option<ImageResource> {
        lock(&self.transcript).latest_image().cloned()
    }

    /// Runs one user turn to completion. Blank input, an uninitialized
    /// session, or a turn already in flight make this a no-op.
    pub fn submit(&self, input: &str) -> SubmitOutcome {
        let input = input.trim();
        if input.is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::EmptyInput);
        }
        let Some(services) = self.services.as_ref() else {
            return SubmitOutcome::Ignored(IgnoreReason::Uninitialized);
        };
        let Some(_claim) = TurnGuard::claim(&self.busy, &self.phase) else {
            return SubmitOutcome::Ignored(IgnoreReason::Busy);
        };

        let turn = self.turns.fetch_add(1, Ordering::Relaxed) + 1;
        self.push(Message::user(input));
        self.emit(SessionEvent::TurnStarted {
            turn,
            chars: input.chars().count(),
        });

        let reply = lock(&services.session).send_message(input);
        let raw = match reply {
            Ok(raw) => raw,
            Err(err) => {
                let detail = describe_error(&err, ERROR_TEXT_MAX_CHARS);
                tracing::warn!(error = %detail, "chat turn failed");
                self.push(Message::model(format!(
                    "{}{}",
                    text::CHAT_FAILURE_PREFIX,
                    detail
                )));
                self.emit(SessionEvent::TurnFailed {
                    turn,
                    error: detail,
                });
                return SubmitOutcome::ConversationFailed;
            }
        };

        match classify_reply(&raw) {
            ModelReply::Conversation(reply) => {
                self.emit(SessionEvent::ChatReply {
                    turn,
                    chars: reply.chars().count(),
                });
                self.push(Message::model(reply));
                SubmitOutcome::Replied
            }
            ModelReply::Directive(directive) => {
                self.emit(SessionEvent::DirectiveDetected {
                    turn,
                    action: directive.action,
                    prompt: directive.prompt.clone(),
                });
                self.push(Message::model(text::PLACEHOLDER));
                self.set_phase(TurnPhase::AwaitingImage);
                self.synthesize_into_transcript(&services.synthesizer, turn, &directive.prompt)
            }
        }
    }

    /// The placeholder becomes a status line while the image is generated,
    /// and the status line becomes the result. Nothing is left dangling.
    fn synthesize_into_transcript(
        &self,
        synthesizer: &ImageSynthesizer,
        turn: u64,
        prompt: &str,
    ) -> SubmitOutcome {
        self.replace_last(Message::model(text::GENERATING));
        match synthesizer.synthesize(prompt) {
            Ok(image) => {
                self.emit(SessionEvent::image_generated(Some(turn), &image));
                self.replace_last(Message::model_with_image(text::IMAGE_READY, image));
                SubmitOutcome::ImageGenerated
            }
            Err(err) => {
                let detail = describe_error(&err, ERROR_TEXT_MAX_CHARS);
                tracing::warn!(error = %detail, "image synthesis failed");
                self.replace_last(Message::model(format!(
                    "{}{}",
                    text::IMAGE_FAILURE_PREFIX,
                    detail
                )));
                self.emit(SessionEvent::ImageFailed {
                    turn,
                    error: detail,
                });
                SubmitOutcome::ImageFailed
            }
        }
    }

    fn push(&self, message: Message) {
        lock(&self.transcript).push(message);
    }

    fn replace_last(&self, message: Message) {
        lock(&self.transcript).replace_last(message);
    }

    fn set_phase(&self, phase: TurnPhase) {
        *lock(&self.phase) = phase;
    }

    fn emit(&self, event: SessionEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let kind = event.kind();
        if let Err(err) = events.record(event) {
            tracing::warn!(kind, error = %err, "failed to write session event");
        }
    }
}

/// Holds the busy flag for the length of one turn. Claiming moves the phase
/// to `AwaitingResponse` together with the flag; dropping hands it back to
/// `Idle` however the turn ends.
struct TurnGuard<'a> {
    busy: &'a AtomicBool,
    phase: &'a Mutex<TurnPhase>,
}

impl<'a> TurnGuard<'a> {
    fn claim(busy: &'a AtomicBool, phase: &'a Mutex<TurnPhase>) -> Option<Self> {
        let mut current = lock(phase);
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        *current = TurnPhase::AwaitingResponse;
        drop(current);
        Some(Self { busy, phase })
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        *lock(self.phase) = TurnPhase::Idle;
        self.busy.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::thread;

    use anyhow::{anyhow, bail, Result};
    use plating_contracts::events::{EventRecord, SessionEvent, SessionLog};
    use plating_contracts::transcript::{Message, Role};

    use super::{ChatOrchestrator, IgnoreReason, SubmitOutcome, TurnGuard, TurnPhase};
    use crate::config::EngineConfig;
    use crate::conversation::{ChatSession, DryrunChatSession};
    use crate::imaging::{DryrunImageService, ImageRequest, ImageResponse, ImageService};
    use crate::text;

    struct ScriptedSession {
        replies: VecDeque<Result<String>>,
        calls: Arc<AtomicUsize>,
    }

    impl ChatSession for ScriptedSession {
        fn model(&self) -> &str {
            "scripted-text-1"
        }

        fn send_message(&mut self, _text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }
    }

    struct CountingImages {
        inner: DryrunImageService,
        fail: bool,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ImageService for CountingImages {
        fn name(&self) -> &str {
            "counting"
        }

        fn model(&self) -> &str {
            "counting-image-1"
        }

        fn generate(&self, request: &ImageRequest) -> Result<ImageResponse> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(request.prompt.clone());
            }
            if self.fail {
                bail!("simulated network error");
            }
            self.inner.generate(request)
        }
    }

    struct Harness {
        orchestrator: ChatOrchestrator,
        chat_calls: Arc<AtomicUsize>,
        image_prompts: Arc<Mutex<Vec<String>>>,
    }

    impl Harness {
        fn image_prompts(&self) -> Vec<String> {
            self.image_prompts
                .lock()
                .map(|prompts| prompts.clone())
                .unwrap_or_default()
        }
    }

    fn harness(replies: Vec<Result<String>>, fail_images: bool, events: Option<SessionLog>) -> Harness {
        let chat_calls = Arc::new(AtomicUsize::new(0));
        let image_prompts = Arc::new(Mutex::new(Vec::new()));
        let session = ScriptedSession {
            replies: replies.into_iter().collect(),
            calls: chat_calls.clone(),
        };
        let images = CountingImages {
            inner: DryrunImageService::with_size(8),
            fail: fail_images,
            prompts: image_prompts.clone(),
        };
        Harness {
            orchestrator: ChatOrchestrator::new(Box::new(session), Box::new(images), events),
            chat_calls,
            image_prompts,
        }
    }

    fn directive_reply(prompt: &str) -> String {
        format!(
            "```json\n{{\n  \"action\": \"generate_image\",\n  \"prompt\": \"{prompt}\"\n}}\n```"
        )
    }

    #[test]
    fn starts_idle_with_greeting() {
        let h = harness(Vec::new(), false, None);
        assert!(h.orchestrator.is_initialized());
        assert!(!h.orchestrator.is_busy());
        assert_eq!(h.orchestrator.phase(), TurnPhase::Idle);
        let transcript = h.orchestrator.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].content(), text::GREETING);
    }

    #[test]
    fn missing_credentials_leave_send_disabled() {
        let config = EngineConfig::from_lookup(|_| None);
        let orchestrator = ChatOrchestrator::connect(&config, None);

        assert!(!orchestrator.is_initialized());
        assert_eq!(orchestrator.phase(), TurnPhase::Uninitialized);
        let transcript = orchestrator.transcript();
        assert_eq!(transcript.len(), 2);
        let error = transcript.last().expect("init error message");
        assert_eq!(error.role(), Role::Model);
        assert!(error.content().starts_with("Error"));
        assert!(error.content().contains("GEMINI_API_KEY"));

        assert_eq!(
            orchestrator.submit("Recipe for pancakes"),
            SubmitOutcome::Ignored(IgnoreReason::Uninitialized)
        );
        assert_eq!(orchestrator.transcript_len(), 2);
    }

    #[test]
    fn blank_input_is_ignored() {
        let h = harness(vec![Ok("unused".to_string())], false, None);
        for input in ["", "   ", "\n\t"] {
            assert_eq!(
                h.orchestrator.submit(input),
                SubmitOutcome::Ignored(IgnoreReason::EmptyInput)
            );
        }
        assert_eq!(h.orchestrator.transcript_len(), 1);
        assert_eq!(h.chat_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn plain_reply_adds_user_and_model_messages() {
        let h = harness(vec![Ok("What toppings?".to_string())], false, None);
        let before = h.orchestrator.transcript_len();

        let outcome = h.orchestrator.submit("  Recipe for pancakes ");

        assert_eq!(outcome, SubmitOutcome::Replied);
        let added = h.orchestrator.messages_since(before);
        assert_eq!(added.len(), 2);
        assert_eq!(added[0], Message::user("Recipe for pancakes"));
        assert_eq!(added[1], Message::model("What toppings?"));
        assert!(h.image_prompts().is_empty());
        assert!(!h.orchestrator.is_busy());
        assert_eq!(h.orchestrator.phase(), TurnPhase::Idle);
    }

    #[test]
    fn directive_triggers_exactly_one_image_call() {
        let h = harness(
            vec![Ok(directive_reply("photo of pancakes with syrup"))],
            false,
            None,
        );
        let before = h.orchestrator.transcript_len();

        let outcome = h.orchestrator.submit("maple syrup and berries");

        assert_eq!(outcome, SubmitOutcome::ImageGenerated);
        assert_eq!(h.image_prompts(), vec!["photo of pancakes with syrup"]);
        let added = h.orchestrator.messages_since(before);
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].role(), Role::User);
        assert_eq!(added[1].content(), text::IMAGE_READY);
        let image = added[1].image().expect("generated image");
        assert_eq!(image.mime_type(), "image/jpeg");
        assert!(added
            .iter()
            .all(|message| message.content() != text::PLACEHOLDER && message.content() != text::GENERATING));
        assert_eq!(h.orchestrator.latest_image().as_ref(), Some(image));
        assert!(!h.orchestrator.is_busy());
    }

    #[test]
    fn image_failure_replaces_placeholder_with_explanation() {
        let h = harness(
            vec![Ok(directive_reply("photo of pancakes with syrup"))],
            true,
            None,
        );
        let before = h.orchestrator.transcript_len();

        let outcome = h.orchestrator.submit("maple syrup");

        assert_eq!(outcome, SubmitOutcome::ImageFailed);
        assert_eq!(h.image_prompts().len(), 1);
        let added = h.orchestrator.messages_since(before);
        assert_eq!(added.len(), 2);
        let failure = &added[1];
        assert!(failure.image().is_none());
        assert!(failure.content().starts_with(text::IMAGE_FAILURE_PREFIX));
        assert!(failure.content().contains("simulated network error"));
        assert!(!h.orchestrator.is_busy());
        assert_eq!(h.orchestrator.phase(), TurnPhase::Idle);
    }

    #[test]
    fn chat_failure_is_reported_and_turn_can_be_retried() {
        let h = harness(
            vec![Err(anyhow!("503 Service Unavailable")), Ok("What toppings?".to_string())],
            false,
            None,
        );

        assert_eq!(
            h.orchestrator.submit("Recipe for pancakes"),
            SubmitOutcome::ConversationFailed
        );
        let transcript = h.orchestrator.transcript();
        let last = transcript.last().expect("failure message");
        assert!(last.content().starts_with(text::CHAT_FAILURE_PREFIX));
        assert!(last.content().contains("503 Service Unavailable"));
        assert!(!h.orchestrator.is_busy());

        assert_eq!(h.orchestrator.submit("Recipe for pancakes"), SubmitOutcome::Replied);
        assert_eq!(h.chat_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn malformed_directive_is_shown_as_text() {
        let raw = "```json\n{\"action\": \"generate_image\", \"prompt\": \n```".to_string();
        let h = harness(vec![Ok(raw.clone())], false, None);
        assert_eq!(h.orchestrator.submit("go"), SubmitOutcome::Replied);
        assert_eq!(
            h.orchestrator.transcript().last().map(Message::content),
            Some(raw.as_str())
        );
        assert!(h.image_prompts().is_empty());
    }

    struct GatedSession {
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
        calls: Arc<AtomicUsize>,
    }

    impl ChatSession for GatedSession {
        fn model(&self) -> &str {
            "gated-text-1"
        }

        fn send_message(&mut self, _text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.send(())?;
            self.release.recv()?;
            Ok("What toppings?".to_string())
        }
    }

    #[test]
    fn submit_while_busy_is_ignored() -> Result<()> {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = Arc::new(ChatOrchestrator::new(
            Box::new(GatedSession {
                entered: entered_tx,
                release: release_rx,
                calls: calls.clone(),
            }),
            Box::new(DryrunImageService::with_size(8)),
            None,
        ));

        let worker = {
            let orchestrator = orchestrator.clone();
            thread::spawn(move || orchestrator.submit("Recipe for pancakes"))
        };
        entered_rx.recv()?;

        assert!(orchestrator.is_busy());
        assert_eq!(orchestrator.phase(), TurnPhase::AwaitingResponse);
        let len_during_turn = orchestrator.transcript_len();
        assert_eq!(
            orchestrator.submit("second message"),
            SubmitOutcome::Ignored(IgnoreReason::Busy)
        );
        assert_eq!(orchestrator.transcript_len(), len_during_turn);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        release_tx.send(())?;
        let outcome = worker
            .join()
            .map_err(|_| anyhow!("worker thread panicked"))?;
        assert_eq!(outcome, SubmitOutcome::Replied);
        assert!(!orchestrator.is_busy());
        assert_eq!(orchestrator.phase(), TurnPhase::Idle);
        Ok(())
    }

    struct GatedImages {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl ImageService for GatedImages {
        fn name(&self) -> &str {
            "gated"
        }

        fn model(&self) -> &str {
            "gated-image-1"
        }

        fn generate(&self, request: &ImageRequest) -> Result<ImageResponse> {
            self.entered
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .send(())?;
            self.release
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .recv()?;
            DryrunImageService::with_size(8).generate(request)
        }
    }

    #[test]
    fn generating_status_is_visible_while_image_is_pending() -> Result<()> {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let orchestrator = Arc::new(ChatOrchestrator::new(
            Box::new(ScriptedSession {
                replies: VecDeque::from(vec![Ok(directive_reply("a mojito"))]),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(GatedImages {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            }),
            None,
        ));

        let worker = {
            let orchestrator = orchestrator.clone();
            thread::spawn(move || orchestrator.submit("mint, lime, crushed ice"))
        };
        entered_rx.recv()?;

        assert_eq!(orchestrator.phase(), TurnPhase::AwaitingImage);
        assert_eq!(
            orchestrator.transcript().last().map(Message::content),
            Some(text::GENERATING)
        );
        assert_eq!(
            orchestrator.submit("another"),
            SubmitOutcome::Ignored(IgnoreReason::Busy)
        );

        release_tx.send(())?;
        let outcome = worker
            .join()
            .map_err(|_| anyhow!("worker thread panicked"))?;
        assert_eq!(outcome, SubmitOutcome::ImageGenerated);
        assert!(orchestrator.transcript().last().and_then(Message::image).is_some());
        Ok(())
    }

    #[test]
    fn dryrun_session_reaches_an_image_in_two_turns() {
        let orchestrator = ChatOrchestrator::new(
            Box::new(DryrunChatSession::new()),
            Box::new(DryrunImageService::with_size(8)),
            None,
        );
        assert_eq!(orchestrator.submit("Recipe for pancakes"), SubmitOutcome::Replied);
        assert_eq!(
            orchestrator.submit("stacked, with maple syrup"),
            SubmitOutcome::ImageGenerated
        );
        assert_eq!(orchestrator.transcript_len(), 5);
    }

    #[test]
    fn claiming_a_turn_moves_busy_and_phase_together() {
        let busy = AtomicBool::new(false);
        let phase = Mutex::new(TurnPhase::Idle);

        let claim = TurnGuard::claim(&busy, &phase);
        assert!(claim.is_some());
        assert!(busy.load(Ordering::SeqCst));
        assert_eq!(*phase.lock().expect("phase lock"), TurnPhase::AwaitingResponse);
        assert!(TurnGuard::claim(&busy, &phase).is_none());

        drop(claim);
        assert!(!busy.load(Ordering::SeqCst));
        assert_eq!(*phase.lock().expect("phase lock"), TurnPhase::Idle);
    }

    #[test]
    fn turn_events_are_logged() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let h = harness(
            vec![
                Ok("What toppings?".to_string()),
                Ok(directive_reply("photo of pancakes with syrup")),
            ],
            false,
            Some(SessionLog::open(&events_path, "session-1")),
        );
        h.orchestrator.submit("Recipe for pancakes");
        h.orchestrator.submit("syrup");

        let raw = std::fs::read_to_string(&events_path)?;
        let records = raw
            .lines()
            .map(serde_json::from_str::<EventRecord>)
            .collect::<Result<Vec<_>, _>>()?;
        let kinds: Vec<&str> = records.iter().map(|record| record.event.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "session_started",
                "turn_started",
                "chat_reply",
                "turn_started",
                "directive_detected",
                "image_generated",
            ]
        );
        assert!(records.iter().all(|record| record.session_id == "session-1"));
        assert_eq!(
            records.iter().map(|record| record.seq).collect::<Vec<_>>(),
            (0..6).collect::<Vec<u64>>()
        );
        assert_eq!(
            records[4].event,
            SessionEvent::DirectiveDetected {
                turn: 2,
                action: plating_contracts::chat::DirectiveAction::GenerateImage,
                prompt: "photo of pancakes with syrup".to_string(),
            }
        );
        assert!(matches!(
            records[5].event,
            SessionEvent::ImageGenerated { turn: Some(2), .. }
        ));
        assert!(!raw.contains("base64"));
        Ok(())
    }
}
