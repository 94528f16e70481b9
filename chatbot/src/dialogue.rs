//! Scripted chatbot conversation.
//!
//! The conversation is a small state machine. Everything the bot says lives in
//! [`SCRIPT`]: each step names the cue that triggers it, the stage it applies to,
//! its pause and the stage it leaves the conversation in. [`Dialogue::play`] is the
//! only place that walks the script.

use std::time::Duration;

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::{ChatbotError, Result};
use crate::scheduler::{Scheduler, TypingDelay};
use crate::units::{self, Unit};
use crate::whatsapp::{self, Inquiry, LinkOpener};

pub const MIN_NAME_CHARS: usize = 2;
pub const MIN_MESSAGE_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Greeting,
    UnitSelection,
    Form,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Start,
    UnitChosen,
    InvalidUnit,
    InvalidName,
    InvalidMessage,
    Redirected,
    PopupBlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Random pause drawn from the dialogue's [`TypingDelay`].
    Typing,
    After(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub cue: Cue,
    pub stage: Stage,
    /// May contain `{unit}`, `{name}` and `{link}` placeholders.
    pub message: &'static str,
    pub pace: Pace,
    pub next: Stage,
}

pub static SCRIPT: &[Step] = &[
    Step {
        cue: Cue::Start,
        stage: Stage::Greeting,
        message: "Olá! Sou a assistente virtual da clínica. Vou te ajudar a falar com a nossa equipe.",
        pace: Pace::Typing,
        next: Stage::Greeting,
    },
    Step {
        cue: Cue::Start,
        stage: Stage::Greeting,
        message: "Em qual unidade você gostaria de ser atendido(a)?",
        pace: Pace::Typing,
        next: Stage::UnitSelection,
    },
    Step {
        cue: Cue::InvalidUnit,
        stage: Stage::UnitSelection,
        message: "Por favor, escolha uma das unidades da lista.",
        pace: Pace::Typing,
        next: Stage::UnitSelection,
    },
    Step {
        cue: Cue::UnitChosen,
        stage: Stage::UnitSelection,
        message: "Ótimo, {unit}!",
        pace: Pace::Typing,
        next: Stage::UnitSelection,
    },
    Step {
        cue: Cue::UnitChosen,
        stage: Stage::UnitSelection,
        message: "Me conte seu nome, telefone e como podemos ajudar. Depois eu te levo para o WhatsApp.",
        pace: Pace::Typing,
        next: Stage::Form,
    },
    Step {
        cue: Cue::InvalidName,
        stage: Stage::Form,
        message: "Por favor, informe seu nome (pelo menos 2 letras).",
        pace: Pace::Typing,
        next: Stage::Form,
    },
    Step {
        cue: Cue::InvalidMessage,
        stage: Stage::Form,
        message: "Conte um pouco mais, a mensagem precisa ter pelo menos 10 caracteres.",
        pace: Pace::Typing,
        next: Stage::Form,
    },
    Step {
        cue: Cue::Redirected,
        stage: Stage::Form,
        message: "Obrigada, {name}! Abrimos o WhatsApp da {unit} com a sua mensagem.",
        pace: Pace::After(Duration::from_millis(300)),
        next: Stage::Completed,
    },
    Step {
        cue: Cue::PopupBlocked,
        stage: Stage::Form,
        message: "Não consegui abrir o WhatsApp automaticamente. Toque no link para continuar: {link}",
        pace: Pace::After(Duration::from_millis(300)),
        next: Stage::Completed,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Bot,
    Visitor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub sender: Sender,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The form was rejected; the bot asked again.
    Rejected(Cue),
    Redirected { link: String },
    /// The link could not be opened and was posted in the transcript instead.
    Blocked { link: String },
}

type Observer = Box<dyn Fn(&Entry) + Send + Sync>;

pub struct Dialogue<S, O> {
    scheduler: S,
    opener: O,
    typing: TypingDelay,
    rng: StdRng,
    stage: Stage,
    unit: Option<&'static Unit>,
    transcript: Vec<Entry>,
    observer: Option<Observer>,
}

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{key}}}"), value)
    })
}

impl<S: Scheduler, O: LinkOpener> Dialogue<S, O> {
    pub fn new(scheduler: S, opener: O, typing: TypingDelay) -> Self {
        Self {
            scheduler,
            opener,
            typing,
            rng: StdRng::from_entropy(),
            stage: Stage::Greeting,
            unit: None,
            transcript: Vec::new(),
            observer: None,
        }
    }

    /// Calls `observer` with every entry as soon as it is appended.
    pub fn with_observer(mut self, observer: impl Fn(&Entry) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn unit(&self) -> Option<&'static Unit> {
        self.unit
    }

    pub fn transcript(&self) -> &[Entry] {
        &self.transcript
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Plays the greeting once; later calls do nothing.
    pub async fn start(&mut self) {
        if self.stage == Stage::Greeting && self.transcript.is_empty() {
            self.play(Cue::Start, &[]).await;
        }
    }

    pub async fn select_unit(&mut self, index: usize) -> Result<&'static Unit> {
        self.expect_stage(Stage::UnitSelection, "select a unit")?;

        let Some(unit) = units::unit(index) else {
            self.play(Cue::InvalidUnit, &[]).await;
            return Err(ChatbotError::UnknownUnit(index));
        };

        self.unit = Some(unit);
        self.push(Sender::Visitor, unit.name.to_string());
        self.play(Cue::UnitChosen, &[("unit", unit.name)]).await;
        Ok(unit)
    }

    /// Validates the form and, when it passes, opens the WhatsApp hand-off.
    ///
    /// A rejected form adds exactly one bot message and leaves the stage alone.
    pub async fn submit(&mut self, inquiry: &Inquiry) -> Result<Outcome> {
        self.expect_stage(Stage::Form, "submit the form")?;
        let unit = self.unit.unwrap_or_else(units::default_unit);

        if let Some(cue) = validate(inquiry) {
            debug!("form rejected: {cue:?}");
            self.play(cue, &[]).await;
            return Ok(Outcome::Rejected(cue));
        }

        self.push(Sender::Visitor, inquiry.message.trim().to_string());

        let text = whatsapp::chatbot_message(inquiry, unit);
        let link = whatsapp::build_link(unit.whatsapp, &text);
        let name = inquiry.name.trim();

        if self.opener.open(&link) {
            self.play(Cue::Redirected, &[("name", name), ("unit", unit.name)])
                .await;
            Ok(Outcome::Redirected { link })
        } else {
            self.play(Cue::PopupBlocked, &[("link", link.as_str())]).await;
            Ok(Outcome::Blocked { link })
        }
    }

    /// Back to an empty greeting, as if the widget had just been opened.
    pub async fn reset(&mut self) {
        self.stage = Stage::Greeting;
        self.unit = None;
        self.transcript.clear();
        self.start().await;
    }

    /// Runs every step scripted for `cue` at the current stage, in order.
    async fn play(&mut self, cue: Cue, vars: &[(&str, &str)]) {
        let stage = self.stage;
        for step in SCRIPT.iter().filter(|step| step.cue == cue && step.stage == stage) {
            let delay = match step.pace {
                Pace::Typing => self.typing.sample(&mut self.rng),
                Pace::After(delay) => delay,
            };
            self.scheduler.sleep(delay).await;
            self.push(Sender::Bot, render(step.message, vars));
            self.stage = step.next;
        }
    }

    fn push(&mut self, sender: Sender, text: String) {
        let entry = Entry { sender, text };
        if let Some(observer) = &self.observer {
            observer(&entry);
        }
        self.transcript.push(entry);
    }

    fn expect_stage(&self, stage: Stage, action: &'static str) -> Result<()> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(ChatbotError::WrongStage {
                action,
                stage: self.stage,
            })
        }
    }
}

/// First failing rule, if any. Lengths are counted in characters after trimming.
pub fn validate(inquiry: &Inquiry) -> Option<Cue> {
    if inquiry.name.trim().chars().count() < MIN_NAME_CHARS {
        return Some(Cue::InvalidName);
    }
    if inquiry.message.trim().chars().count() < MIN_MESSAGE_CHARS {
        return Some(Cue::InvalidMessage);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::InstantScheduler;
    use crate::whatsapp::RecordingOpener;

    async fn at_form() -> Dialogue<InstantScheduler, RecordingOpener> {
        let mut dialogue = Dialogue::new(
            InstantScheduler::new(),
            RecordingOpener::new(),
            TypingDelay::default(),
        );
        dialogue.start().await;
        dialogue.select_unit(1).await.unwrap();
        dialogue
    }

    fn bot_messages(dialogue: &Dialogue<InstantScheduler, RecordingOpener>) -> usize {
        dialogue
            .transcript()
            .iter()
            .filter(|entry| entry.sender == Sender::Bot)
            .count()
    }

    #[tokio::test]
    async fn test_greeting_leads_to_unit_selection() {
        let mut dialogue = Dialogue::new(
            InstantScheduler::new(),
            RecordingOpener::new(),
            TypingDelay::default(),
        );
        dialogue.start().await;

        assert_eq!(dialogue.stage(), Stage::UnitSelection);
        assert_eq!(dialogue.transcript().len(), 2);
        assert_eq!(dialogue.scheduler().delays().len(), 2);

        dialogue.start().await;
        assert_eq!(dialogue.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_forms_add_one_message_and_never_redirect() {
        let long_message = "Gostaria de agendar uma avaliação";
        let cases = [
            ("", long_message),
            ("A", long_message),
            ("  B  ", long_message),
            ("Ana", ""),
            ("Ana", "curta"),
            ("Ana", "  123456789  "),
            ("", ""),
            (" ", "oi"),
        ];

        for (name, message) in cases {
            let mut dialogue = at_form().await;
            let before = bot_messages(&dialogue);
            let entries_before = dialogue.transcript().len();

            let outcome = dialogue
                .submit(&Inquiry::new(name, "83999999999", message))
                .await
                .unwrap();

            assert!(matches!(outcome, Outcome::Rejected(_)), "{name:?}/{message:?}");
            assert_eq!(bot_messages(&dialogue), before + 1);
            assert_eq!(dialogue.transcript().len(), entries_before + 1);
            assert_eq!(dialogue.stage(), Stage::Form);
            assert!(dialogue.opener().opened().is_empty());
        }
    }

    #[tokio::test]
    async fn test_character_counts_not_bytes() {
        let mut dialogue = at_form().await;
        // two characters, four bytes
        let outcome = dialogue
            .submit(&Inquiry::new("Zé", "", "Quero agendar"))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Redirected { .. }));
    }

    #[tokio::test]
    async fn test_valid_form_redirects_once() {
        let mut dialogue = at_form().await;
        let outcome = dialogue
            .submit(&Inquiry::new("Ana Silva", "83999999999", "Quero agendar"))
            .await
            .unwrap();

        let opened = dialogue.opener().opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(outcome, Outcome::Redirected { link: opened[0].clone() });
        assert!(opened[0].starts_with("https://wa.me/5583988776655?text="));
        assert_eq!(dialogue.stage(), Stage::Completed);
    }

    #[tokio::test]
    async fn test_blocked_popup_posts_the_link() {
        let mut dialogue = Dialogue::new(
            InstantScheduler::new(),
            RecordingOpener::blocked(),
            TypingDelay::default(),
        );
        dialogue.start().await;
        dialogue.select_unit(0).await.unwrap();

        let outcome = dialogue
            .submit(&Inquiry::new("Ana Silva", "", "Quero agendar uma consulta"))
            .await
            .unwrap();

        let Outcome::Blocked { link } = outcome else {
            panic!("expected a blocked popup, got {outcome:?}");
        };
        let last = dialogue.transcript().last().unwrap();
        assert_eq!(last.sender, Sender::Bot);
        assert!(last.text.ends_with(&link));
        assert_eq!(dialogue.opener().opened().len(), 1);
        assert_eq!(dialogue.stage(), Stage::Completed);
    }

    #[tokio::test]
    async fn test_unknown_unit_reprompts() {
        let mut dialogue = Dialogue::new(
            InstantScheduler::new(),
            RecordingOpener::new(),
            TypingDelay::default(),
        );
        dialogue.start().await;

        assert!(matches!(
            dialogue.select_unit(3).await,
            Err(ChatbotError::UnknownUnit(3))
        ));
        assert_eq!(dialogue.stage(), Stage::UnitSelection);
        assert_eq!(dialogue.transcript().len(), 3);
        assert!(dialogue.unit().is_none());
    }

    #[tokio::test]
    async fn test_reset_replays_the_greeting() {
        let mut dialogue = at_form().await;
        dialogue
            .submit(&Inquiry::new("Ana", "", "Quero agendar"))
            .await
            .unwrap();

        dialogue.reset().await;

        assert_eq!(dialogue.stage(), Stage::UnitSelection);
        assert_eq!(dialogue.transcript().len(), 2);
        assert!(dialogue.unit().is_none());
    }

    #[tokio::test]
    async fn test_submit_before_choosing_a_unit_is_refused() {
        let mut dialogue = Dialogue::new(
            InstantScheduler::new(),
            RecordingOpener::new(),
            TypingDelay::default(),
        );
        dialogue.start().await;
        let err = dialogue
            .submit(&Inquiry::new("Ana", "", "Quero agendar"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatbotError::WrongStage { .. }));
    }

    #[test]
    fn test_every_stage_reaches_completion_in_script() {
        assert!(SCRIPT.iter().any(|step| step.next == Stage::Completed));
        assert_eq!(
            render("{name} na {unit}", &[("name", "Ana"), ("unit", "Unidade Bessa")]),
            "Ana na Unidade Bessa"
        );
    }
}
