//! Terminal rendering of portal lists.

use chrono::{DateTime, Local, Utc};
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL_CONDENSED};
use owo_colors::OwoColorize;

use crate::models::{
    AttachmentKind, ChatMessage, Document, Event, Notice, Profile, Role, Tone,
};
use crate::routes::Access;
use crate::services::documents::MB;
use crate::services::events::Participation;
use crate::services::polls::PollSummary;

fn color(tone: Tone) -> Color {
    match tone {
        Tone::Blue => Color::Blue,
        Tone::Green => Color::Green,
        Tone::Red => Color::Red,
        Tone::Yellow => Color::Yellow,
        Tone::Magenta => Color::Magenta,
        Tone::Cyan => Color::Cyan,
        Tone::Gray => Color::Grey,
    }
}

fn badge(label: impl ToString, tone: Tone) -> Cell {
    Cell::new(label).fg(color(tone))
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header);
    table
}

pub fn local_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string()
}

pub fn human_size(bytes: u64) -> String {
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

fn role_tone(role: Role) -> Tone {
    match role {
        Role::Admin => Tone::Red,
        Role::Psychologist => Tone::Green,
        Role::Staff => Tone::Blue,
        Role::User => Tone::Gray,
    }
}

pub fn notices(notices: &[Notice]) -> Table {
    let mut table = new_table(vec!["id", "sector", "title", "content", "published"]);
    for notice in notices {
        table.add_row(vec![
            Cell::new(notice.id),
            badge(&notice.sector, notice.sector.tone()),
            Cell::new(&notice.title),
            Cell::new(&notice.content),
            Cell::new(local_time(&notice.created_at)),
        ]);
    }
    table
}

pub fn events<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    participation: impl Fn(&Event) -> Option<Participation>,
) -> Table {
    let mut table = new_table(vec!["id", "category", "title", "start", "end", "location", "rsvp"]);
    for event in events {
        let rsvp = match participation(event) {
            Some(Participation::Confirmed) => "confirmed",
            Some(Participation::Declined) => "declined",
            None => "",
        };
        table.add_row(vec![
            Cell::new(event.id),
            badge(event.category, event.category.tone()),
            Cell::new(&event.title),
            Cell::new(local_time(&event.start_time)),
            Cell::new(local_time(&event.end_time)),
            Cell::new(event.location.as_deref().unwrap_or("")),
            Cell::new(rsvp),
        ]);
    }
    table
}

pub fn documents(documents: &[Document]) -> Table {
    let mut table = new_table(vec!["id", "sector", "title", "file", "size", "uploaded"]);
    for document in documents {
        table.add_row(vec![
            Cell::new(document.id),
            badge(&document.sector, document.sector.tone()),
            Cell::new(&document.title),
            Cell::new(&document.file_name),
            Cell::new(human_size(document.file_size)),
            Cell::new(local_time(&document.uploaded_at)),
        ]);
    }
    table
}

pub fn users(profiles: &[Profile]) -> Table {
    let mut table = new_table(vec!["id", "name", "email", "role", "active"]);
    for profile in profiles {
        let active = if profile.active {
            badge("yes", Tone::Green)
        } else {
            badge("no", Tone::Red)
        };
        table.add_row(vec![
            Cell::new(profile.id),
            Cell::new(profile.display_name()),
            Cell::new(&profile.email),
            badge(profile.role.label(), role_tone(profile.role)),
            active,
        ]);
    }
    table
}

pub fn poll(summary: &PollSummary) -> String {
    let poll = &summary.poll;
    let state = if poll.is_open(Utc::now()) {
        "open".green().to_string()
    } else {
        "closed".red().to_string()
    };

    let mut out = format!("{} [{state}] {}\n", poll.question.bold(), poll.id.dimmed());
    if let Some(description) = &poll.description {
        out.push_str(&format!("  {}\n", description.italic()));
    }
    if let Some(ends_at) = &poll.ends_at {
        out.push_str(&format!("  ends {}\n", local_time(ends_at)));
    }

    let total = summary.total_votes();
    for tally in &summary.options {
        let share = if total == 0 {
            0.0
        } else {
            tally.votes as f64 * 100.0 / total as f64
        };
        let mark = if tally.mine { "✓".bright_green().to_string() } else { " ".into() };
        out.push_str(&format!(
            "  {mark} {:<30} {:>3} votes {:>5.1}%  {}\n",
            tally.option.text,
            tally.votes,
            share,
            tally.option.id.dimmed()
        ));
    }
    out.push_str(&format!("  {total} votes in total\n"));
    out
}

pub fn chat_message(message: &ChatMessage) -> String {
    let time = message
        .created_at
        .with_timezone(&Local)
        .format("%H:%M")
        .to_string();
    let role = message
        .sender_role
        .map(|role| format!(" ({})", role.label()))
        .unwrap_or_default();

    let mut out = format!(
        "{} {}{}: {}",
        time.dimmed(),
        message.sender_display().bright_cyan(),
        role.dimmed(),
        message.content
    );
    for file in message.attachments() {
        let icon = match file.kind() {
            AttachmentKind::Image => "[image]",
            AttachmentKind::Video => "[video]",
            AttachmentKind::Audio => "[audio]",
            AttachmentKind::File => "[file]",
        };
        out.push_str(&format!(
            "\n    {} {} ({}) {}",
            icon.yellow(),
            file.name,
            human_size(file.size),
            file.url.dimmed()
        ));
    }
    out
}

pub fn access(path: &str, access: Access) -> String {
    match access {
        Access::Render => format!("{path}: {}", "render".green()),
        Access::Loading => format!("{path}: {}", "loading".yellow()),
        Access::Forbidden => format!("{path}: {}", "forbidden".red()),
        Access::RedirectLogin | Access::RedirectInactive => {
            let target = access.redirect_target().map(|route| route.path()).unwrap_or("");
            format!("{path}: {} {target}", "redirect".yellow())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * MB), "5.0 MB");
    }
}
