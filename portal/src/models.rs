pub mod chat;
pub mod document;
pub mod event;
pub mod notice;
pub mod poll;
pub mod presence;
pub mod profile;

pub use chat::{AttachmentKind, ChatMessage, FileDescriptor, NewChatMessage};
pub use document::{Document, DocumentDraft};
pub use event::{Event, EventCategory, EventDraft};
pub use notice::{Notice, NoticeDraft, Sector};
pub use poll::{Poll, PollDraft, PollOption, PollVote};
pub use presence::Presence;
pub use profile::{Profile, Role};

/// Color family used for badges; the terminal renderer maps it to ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Blue,
    Green,
    Red,
    Yellow,
    Magenta,
    Cyan,
    Gray,
}
