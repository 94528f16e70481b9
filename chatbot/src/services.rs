use anyhow::{Context, Result};
use inquire::error::InquireError;
use inquire::{Confirm, Select, Text};
use log::{debug, info};
use owo_colors::OwoColorize;

use crate::cli::{Args, Command};
use crate::contact;
use crate::dialogue::{Dialogue, Entry, Outcome, Sender, Stage};
use crate::scheduler::TokioScheduler;
use crate::settings::{self, Options};
use crate::units::UNITS;
use crate::whatsapp::{BrowserOpener, Inquiry, LinkOpener, PrintOpener};

pub async fn run(args: Args) -> Result<()> {
    let settings = settings::load_settings()?;
    let options = settings::merge_settings_with_args(&args, &settings);

    match args.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            if options.open_browser {
                chat(&options, BrowserOpener).await
            } else {
                chat(&options, PrintOpener).await
            }
        }
        Command::Contact {
            name,
            phone,
            message,
        } => {
            let inquiry = Inquiry::new(name, phone, message);
            let delivery = if options.open_browser {
                contact::submit_contact(&inquiry, &BrowserOpener)
            } else {
                contact::submit_contact(&inquiry, &PrintOpener)
            }
            .context("Contact form rejected")?;

            if delivery.opened {
                println!("{} WhatsApp opened", "✓".bright_green());
            } else {
                println!("Open this link to continue: {}", delivery.link.underline());
            }
            Ok(())
        }
        Command::Units => {
            for (index, unit) in UNITS.iter().enumerate() {
                println!(
                    "{} {} {}",
                    (index + 1).bold(),
                    unit.name.bright_cyan(),
                    unit.address.dimmed()
                );
            }
            Ok(())
        }
    }
}

fn print_entry(entry: &Entry) {
    if entry.sender == Sender::Bot {
        println!("{} {}", "Clínica:".bright_cyan().bold(), entry.text);
    }
}

/// `None` when the visitor pressed Esc or Ctrl-C.
fn answered<T>(result: inquire::error::InquireResult<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn chat<O: LinkOpener>(options: &Options, opener: O) -> Result<()> {
    let mut dialogue =
        Dialogue::new(TokioScheduler, opener, options.typing).with_observer(print_entry);
    dialogue.start().await;

    loop {
        match dialogue.stage() {
            Stage::Greeting => dialogue.start().await,
            Stage::UnitSelection => {
                let labels: Vec<String> = UNITS
                    .iter()
                    .map(|unit| format!("{} ({})", unit.name, unit.address))
                    .collect();
                let Some(choice) = answered(Select::new("Unidade:", labels).raw_prompt())? else {
                    break;
                };
                dialogue.select_unit(choice.index).await?;
            }
            Stage::Form => {
                let Some(inquiry) = ask_form()? else {
                    break;
                };
                match dialogue.submit(&inquiry).await? {
                    Outcome::Rejected(cue) => debug!("asking again after {cue:?}"),
                    Outcome::Redirected { link } | Outcome::Blocked { link } => {
                        info!("hand-off link: {link}")
                    }
                }
            }
            Stage::Completed => {
                let again = answered(
                    Confirm::new("Começar uma nova conversa?")
                        .with_default(false)
                        .prompt(),
                )?;
                if again != Some(true) {
                    break;
                }
                dialogue.reset().await;
            }
        }
    }

    Ok(())
}

fn ask_form() -> Result<Option<Inquiry>> {
    let Some(name) = answered(Text::new("Nome:").prompt())? else {
        return Ok(None);
    };
    let Some(phone) = answered(
        Text::new("Telefone:")
            .with_help_message("Opcional")
            .prompt(),
    )?
    else {
        return Ok(None);
    };
    let Some(message) = answered(Text::new("Mensagem:").prompt())? else {
        return Ok(None);
    };
    Ok(Some(Inquiry::new(name, phone, message)))
}
