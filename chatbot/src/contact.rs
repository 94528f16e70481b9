//! Contact page form. Same WhatsApp hand-off as the chatbot, without the conversation.

use log::debug;

use crate::error::{ChatbotError, Result};
use crate::units::{self, Unit};
use crate::whatsapp::{self, Inquiry, LinkOpener};

pub const MIN_NAME_CHARS: usize = 2;
pub const MIN_MESSAGE_CHARS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub link: String,
    /// `false` when the opener refused, so the caller has to show the link.
    pub opened: bool,
}

pub fn validate(inquiry: &Inquiry) -> Result<()> {
    if inquiry.name.trim().chars().count() < MIN_NAME_CHARS {
        return Err(ChatbotError::Validation(
            "Informe seu nome com pelo menos 2 caracteres.".into(),
        ));
    }
    if inquiry.message.trim().chars().count() < MIN_MESSAGE_CHARS {
        return Err(ChatbotError::Validation(
            "A mensagem precisa ter pelo menos 5 caracteres.".into(),
        ));
    }
    Ok(())
}

pub fn contact_message(inquiry: &Inquiry) -> String {
    let mut text = format!(
        "Olá! Vim pelo site da clínica.\nNome: {}",
        inquiry.name.trim()
    );
    let phone = inquiry.phone.trim();
    if !phone.is_empty() {
        text.push_str(&format!("\nTelefone: {phone}"));
    }
    text.push_str(&format!("\n\n{}", inquiry.message.trim()));
    text
}

/// Validates the form, then opens the deep link for the clinic's main number.
pub fn submit_contact(inquiry: &Inquiry, opener: &dyn LinkOpener) -> Result<Delivery> {
    validate(inquiry)?;

    let unit: &Unit = units::default_unit();
    let link = whatsapp::build_link(unit.whatsapp, &contact_message(inquiry));
    let opened = opener.open(&link);
    debug!("contact form handed off (opened: {opened})");

    Ok(Delivery { link, opened })
}
