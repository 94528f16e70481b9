use std::sync::Mutex;

use log::{info, warn};

use crate::units::Unit;

pub const WHATSAPP_BASE: &str = "https://wa.me";

/// Keeps only the digits of a phone number, as the deep link expects.
pub fn digits(number: &str) -> String {
    number.chars().filter(char::is_ascii_digit).collect()
}

pub fn build_link(number: &str, text: &str) -> String {
    format!(
        "{WHATSAPP_BASE}/{}?text={}",
        digits(number),
        urlencoding::encode(text)
    )
}

/// What the visitor typed in the chatbot form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inquiry {
    pub name: String,
    pub phone: String,
    pub message: String,
}

impl Inquiry {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            message: message.into(),
        }
    }
}

pub fn chatbot_message(inquiry: &Inquiry, unit: &Unit) -> String {
    let mut text = format!("Olá! Meu nome é {}.", inquiry.name.trim());
    let phone = inquiry.phone.trim();
    if !phone.is_empty() {
        text.push_str(&format!("\nTelefone: {phone}"));
    }
    text.push_str(&format!("\nUnidade: {}", unit.name));
    text.push_str(&format!("\n\n{}", inquiry.message.trim()));
    text
}

/// Hands a URL to whatever shows it to the visitor.
///
/// Returns `false` when the link could not be opened, the equivalent of a blocked popup.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> bool;
}

/// Opens links in the system browser.
pub struct BrowserOpener;

impl LinkOpener for BrowserOpener {
    fn open(&self, url: &str) -> bool {
        match open::that(url) {
            Ok(()) => {
                info!("opened {url}");
                true
            }
            Err(e) => {
                warn!("could not open browser: {e}");
                false
            }
        }
    }
}

/// Never opens anything; the link only shows up in the transcript.
pub struct PrintOpener;

impl LinkOpener for PrintOpener {
    fn open(&self, url: &str) -> bool {
        info!("browser disabled, not opening {url}");
        false
    }
}

/// Keeps every URL it is asked to open and answers with a fixed result.
#[derive(Debug, Default)]
pub struct RecordingOpener {
    opened: Mutex<Vec<String>>,
    blocked: bool,
}

impl RecordingOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocked() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            blocked: true,
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|opened| opened.clone())
            .unwrap_or_default()
    }
}

impl LinkOpener for RecordingOpener {
    fn open(&self, url: &str) -> bool {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
        !self.blocked
    }
}
