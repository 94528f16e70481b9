pub mod chat;
pub mod documents;
pub mod events;
pub mod notices;
pub mod polls;
pub mod presence;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Password, Text};
use log::{debug, info, warn};
use owo_colors::OwoColorize;
use tokio::sync::mpsc;

use crate::api::realtime;
use crate::api::tables::{MESSAGES, USER_PRESENCE};
use crate::api::BackendClient;
use crate::cli::{
    Args, ChatCommand, Command, DocumentCommand, EventCommand, NoticeCommand, PollCommand,
    PresenceCommand, UserCommand,
};
use crate::error::PortalError;
use crate::models::{EventDraft, NoticeDraft, PollDraft, Profile};
use crate::render;
use crate::routes::{self, Access, Route};
use crate::session::SessionStore;
use crate::settings::{load_settings, merge_settings_with_args};

use self::chat::ChatService;
use self::documents::{DocumentService, UploadRequest};
use self::events::{EventService, Participation};
use self::notices::NoticeService;
use self::polls::{PollService, VoteOutcome};
use self::presence::{PresenceService, PresenceSignal};
use self::users::{NewUser, UserService};

type Session = SessionStore<BackendClient>;

pub async fn run(args: Args) -> Result<()> {
    let settings = load_settings()?;
    let args = merge_settings_with_args(&args, settings);

    let backend_url = args
        .backend_url
        .clone()
        .filter(|url| !url.trim().is_empty())
        .context("backend URL is not configured, use --backend-url or CLINIC_BACKEND_URL")?;
    let anon_key = args
        .anon_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .context("anon key is not configured, use --anon-key or CLINIC_ANON_KEY")?;

    let api = Arc::new(
        BackendClient::new(backend_url, anon_key).context("Failed to build the backend client")?,
    );
    let session = SessionStore::new(api.clone(), args.session_file.clone());

    match session.restore().await {
        Ok(state) => debug!("restored session, signed in: {}", state.user.is_some()),
        Err(PortalError::SessionExpired) => {
            eprintln!("{} Session expired, please sign in again.", "!".yellow())
        }
        Err(e) if args.command.works_signed_out() => {
            warn!("could not restore the saved session: {e}")
        }
        Err(e) => return Err(e.into()),
    }

    match args.command {
        Command::Login { email } => login(&session, email).await,
        Command::Signup { email, name, role } => {
            let password = Password::new("Password:")
                .prompt()
                .context("Failed to read password")?;
            let user = session.sign_up(&email, &password, &name, role).await?;
            println!(
                "{} Account {} created. Confirm the email, then wait for an administrator to activate it.",
                "✓".bright_green(),
                user.email.as_deref().unwrap_or(&email).bright_cyan()
            );
            Ok(())
        }
        Command::Logout => {
            session.sign_out().await?;
            println!("{} Signed out.", "✓".bright_green());
            Ok(())
        }
        Command::Whoami => {
            whoami(&session);
            Ok(())
        }
        Command::ResendConfirmation { email } => {
            session.resend_confirmation(&email).await?;
            println!("{} Confirmation email sent to {}.", "✓".bright_green(), email);
            Ok(())
        }
        Command::Profile { name, avatar } => {
            let (user, _) = session.require_user()?;
            let avatar_url = match avatar {
                Some(path) => {
                    let spinner = spinner("Uploading avatar...")?;
                    let url = users::upload_avatar(api.as_ref(), user.id, &path).await;
                    spinner.finish_and_clear();
                    Some(url?)
                }
                None => None,
            };
            let profile = session
                .update_profile(name.as_deref(), avatar_url.as_deref())
                .await?;
            println!("{} Profile updated: {}", "✓".bright_green(), profile.display_name());
            Ok(())
        }
        Command::Route { path } => {
            println!("{}", render::access(&path, routes::guard(&session.current(), Route::parse(&path))));
            Ok(())
        }
        Command::Notices(command) => notices_page(&session, api, command).await,
        Command::Chat(command) => chat_page(&session, api, command).await,
        Command::Events(command) => events_page(&session, api, command).await,
        Command::Documents(command) => documents_page(&session, api, command).await,
        Command::Polls(command) => polls_page(&session, api, command).await,
        Command::Users(command) => users_page(&session, api, command).await,
        Command::Presence(command) => presence_page(&session, api, command).await,
    }
}

/// Applies the route guard for a page and returns the profile allowed to use it.
fn enter(session: &Session, route: Route) -> Result<Profile> {
    match routes::guard(&session.current(), route) {
        Access::Render => Ok(session.require_user()?.1),
        Access::Loading | Access::RedirectLogin => Err(PortalError::NotAuthenticated.into()),
        Access::RedirectInactive => Err(PortalError::Forbidden(
            "account is inactive, ask an administrator to activate it".into(),
        )
        .into()),
        Access::Forbidden => Err(PortalError::Forbidden(format!(
            "{} is restricted to administrators",
            route.path()
        ))
        .into()),
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn confirm(question: &str) -> Result<bool> {
    Confirm::new(question)
        .with_default(false)
        .prompt()
        .context("Failed to get confirmation")
}

async fn login(session: &Session, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => Text::new("Email:").prompt().context("Failed to read email")?,
    };
    let password = Password::new("Password:")
        .without_confirmation()
        .prompt()
        .context("Failed to read password")?;

    let state = session.sign_in(&email, &password).await?;
    match (&state.profile, routes::guard(&state, Route::Dashboard)) {
        (Some(profile), Access::Render) => println!(
            "{} Signed in as {} ({})",
            "✓".bright_green(),
            profile.display_name().bright_cyan(),
            profile.role.label()
        ),
        _ => println!(
            "{} Signed in, but the account is not active yet.",
            "!".yellow()
        ),
    }
    Ok(())
}

fn whoami(session: &Session) {
    let state = session.current();
    match (state.user, state.profile) {
        (None, _) => println!("Not signed in."),
        (Some(user), None) => println!(
            "{} (no profile)",
            user.email.as_deref().unwrap_or("unknown email")
        ),
        (Some(_), Some(profile)) => {
            let status = if profile.active {
                "active".green().to_string()
            } else {
                "inactive".red().to_string()
            };
            println!(
                "{} <{}> {} [{status}]",
                profile.display_name().bright_cyan(),
                profile.email,
                profile.role.label()
            );
        }
    }
}

async fn notices_page(session: &Session, api: Arc<BackendClient>, command: NoticeCommand) -> Result<()> {
    let me = enter(session, Route::Notices)?;
    let mut service = NoticeService::new(api);

    match command {
        NoticeCommand::List { sector } => {
            let notices = service.refresh(sector.as_ref()).await?;
            println!("{}", render::notices(notices));
        }
        NoticeCommand::Create {
            title,
            content,
            sector,
        } => {
            let notice = service
                .create(NoticeDraft::new(title, content, sector), &me)
                .await?;
            println!("{} Published notice {}", "✓".bright_green(), notice.id);
        }
        NoticeCommand::Update {
            id,
            title,
            content,
            sector,
        } => {
            service.refresh(None).await?;
            let current = service
                .notices()
                .iter()
                .find(|notice| notice.id == id)
                .cloned()
                .ok_or_else(|| PortalError::NotFound(format!("notice {id}")))?;
            let draft = NoticeDraft::new(
                title.unwrap_or(current.title),
                content.unwrap_or(current.content),
                sector.unwrap_or(current.sector),
            );
            service.update(id, draft).await?;
            println!("{} Notice updated.", "✓".bright_green());
        }
        NoticeCommand::Delete { id } => {
            service.refresh(None).await?;
            service.delete(id).await?;
            println!("{} Notice deleted.", "✓".bright_green());
        }
    }
    Ok(())
}

async fn chat_page(session: &Session, api: Arc<BackendClient>, command: ChatCommand) -> Result<()> {
    let me = enter(session, Route::Chat)?;
    let mut service = ChatService::new(api.clone(), me);

    match command {
        ChatCommand::History => {
            for message in service.load_recent().await?.messages() {
                println!("{}", render::chat_message(message));
            }
        }
        ChatCommand::Send { text } => {
            let message = service.send(&text).await?;
            println!("{}", render::chat_message(&message));
        }
        ChatCommand::Attach { files, caption } => {
            let spinner = spinner(&format!("Uploading {} file(s)...", files.len()))?;
            let sent = service.send_attachments(&files, caption.as_deref()).await;
            spinner.finish_and_clear();
            println!("{}", render::chat_message(&sent?));
        }
        ChatCommand::Watch => {
            for message in service.load_recent().await?.messages() {
                println!("{}", render::chat_message(message));
            }

            let mut feed = realtime::subscribe_inserts(api.as_ref(), &[MESSAGES])
                .await
                .context("Failed to join the chat feed")?;
            println!("{}", "Watching for new messages, Ctrl-C to stop.".dimmed());

            loop {
                tokio::select! {
                    event = feed.recv() => {
                        let Some(event) = event else {
                            bail!("chat feed closed");
                        };
                        if let Some(message) = service.on_change(&event).await? {
                            println!("{}", render::chat_message(message));
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
        ChatCommand::Clear { yes } => {
            if !yes && !confirm("Delete every chat message? This cannot be undone.")? {
                println!("{} Cancelled.", "✗".yellow());
                return Ok(());
            }
            let deleted = service.clear_all().await?;
            println!("{} Deleted {deleted} messages.", "✓".bright_green());
        }
    }
    Ok(())
}

async fn events_page(session: &Session, api: Arc<BackendClient>, command: EventCommand) -> Result<()> {
    let me = enter(session, Route::Calendar)?;
    let mut service = EventService::new(api);

    match command {
        EventCommand::List { upcoming } => {
            service.refresh().await?;
            let table = if upcoming {
                render::events(service.upcoming(Utc::now()), |event| {
                    service.participation(&event.id)
                })
            } else {
                render::events(service.events(), |event| service.participation(&event.id))
            };
            println!("{table}");
        }
        EventCommand::Create {
            title,
            start,
            end,
            category,
            description,
            location,
        } => {
            let mut draft = EventDraft::new(title, start, end, category);
            draft.description = description;
            draft.location = location;
            let event = service.create(draft, &me).await?;
            println!("{} Created event {}", "✓".bright_green(), event.id);
        }
        EventCommand::Update {
            id,
            title,
            start,
            end,
            category,
            description,
            location,
        } => {
            service.refresh().await?;
            let current = service
                .events()
                .iter()
                .find(|event| event.id == id)
                .ok_or_else(|| PortalError::NotFound(format!("event {id}")))?;

            let mut draft = EventDraft::from(current);
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(start) = start {
                draft.start_time = start;
            }
            if let Some(end) = end {
                draft.end_time = end;
            }
            if let Some(category) = category {
                draft.category = category;
            }
            if description.is_some() {
                draft.description = description;
            }
            if location.is_some() {
                draft.location = location;
            }
            service.update(id, draft).await?;
            println!("{} Event updated.", "✓".bright_green());
        }
        EventCommand::Delete { id } => {
            service.refresh().await?;
            service.delete(id).await?;
            println!("{} Event deleted.", "✓".bright_green());
        }
        EventCommand::Respond { id, decline } => {
            service.refresh().await?;
            let answer = if decline {
                Participation::Declined
            } else {
                Participation::Confirmed
            };
            service.respond(id, answer)?;
            info!("participation in {id} set to {answer:?} for this session only");
            println!("{} Answer recorded locally.", "✓".bright_green());
        }
    }
    Ok(())
}

async fn documents_page(
    session: &Session,
    api: Arc<BackendClient>,
    command: DocumentCommand,
) -> Result<()> {
    let me = enter(session, Route::Documents)?;
    let mut service = DocumentService::new(api);

    match command {
        DocumentCommand::List { sector } => {
            let documents = service.refresh(sector.as_ref()).await?;
            println!("{}", render::documents(documents));
        }
        DocumentCommand::Upload {
            path,
            title,
            sector,
        } => {
            let spinner = spinner(&format!("Uploading {}...", path.display()))?;
            let uploaded = service
                .upload(UploadRequest { title, sector, path }, &me)
                .await;
            spinner.finish_and_clear();
            let document = uploaded?;
            println!(
                "{} Uploaded {} ({})",
                "✓".bright_green(),
                document.title.bright_cyan(),
                render::human_size(document.file_size)
            );
        }
        DocumentCommand::Download { id, to } => {
            service.refresh(None).await?;
            let document = service
                .find(&id)
                .cloned()
                .ok_or_else(|| PortalError::NotFound(format!("document {id}")))?;
            let target = service.download(&document, &to).await?;
            println!("{} Saved {}", "✓".bright_green(), target.display());
        }
        DocumentCommand::Delete { id } => {
            service.refresh(None).await?;
            let document = service
                .find(&id)
                .cloned()
                .ok_or_else(|| PortalError::NotFound(format!("document {id}")))?;
            service.delete(&document).await?;
            println!("{} Document deleted.", "✓".bright_green());
        }
    }
    Ok(())
}

async fn polls_page(session: &Session, api: Arc<BackendClient>, command: PollCommand) -> Result<()> {
    let me = enter(session, Route::Polls)?;
    let service = PollService::new(api);

    match command {
        PollCommand::List => {
            let summaries = service.list(me.id).await?;
            if summaries.is_empty() {
                println!("No polls yet.");
            }
            for summary in &summaries {
                println!("{}", render::poll(summary));
            }
        }
        PollCommand::Create {
            question,
            options,
            description,
            ends_at,
        } => {
            let mut draft = PollDraft::new(question);
            draft.description = description;
            draft.ends_at = ends_at;
            let summary = service.create(draft, &options, &me).await?;
            println!("{}", render::poll(&summary));
        }
        PollCommand::Vote { poll, option } => {
            let summary = service.summary(poll, me.id).await?;
            let option = summary
                .find_option(&option)
                .ok_or_else(|| anyhow!("poll has no option \"{option}\""))?;
            match service.toggle_vote(&summary.poll, option.id, me.id).await? {
                VoteOutcome::Cast => println!("{} Voted for {}", "✓".bright_green(), option.text),
                VoteOutcome::Withdrawn => {
                    println!("{} Withdrew vote for {}", "✓".bright_green(), option.text)
                }
            }
        }
        PollCommand::Close { id } => {
            service.close(id, &me).await?;
            println!("{} Poll closed.", "✓".bright_green());
        }
        PollCommand::Delete { id } => {
            service.delete(id, &me).await?;
            println!("{} Poll deleted.", "✓".bright_green());
        }
    }
    Ok(())
}

async fn users_page(session: &Session, api: Arc<BackendClient>, command: UserCommand) -> Result<()> {
    let me = enter(session, Route::Users)?;
    let service = UserService::new(api);

    match command {
        UserCommand::List => {
            println!("{}", render::users(&service.list().await?));
        }
        UserCommand::Create {
            email,
            name,
            role,
            password,
        } => {
            let generated = password.is_none();
            let created = service
                .create(
                    &me,
                    NewUser {
                        email,
                        password,
                        name,
                        role,
                    },
                )
                .await?;
            println!("{} Created {}", "✓".bright_green(), created.email.bright_cyan());
            if generated {
                println!("  temporary password: {}", created.password.bold());
            }
        }
        UserCommand::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete user {id}?"))? {
                println!("{} Cancelled.", "✗".yellow());
                return Ok(());
            }
            service.delete(&me, id).await?;
            println!("{} User deleted.", "✓".bright_green());
        }
        UserCommand::SetRole { id, role } => {
            let profile = service.set_role(&me, id, role).await?;
            println!(
                "{} {} is now {}",
                "✓".bright_green(),
                profile.display_name(),
                profile.role.label()
            );
        }
        UserCommand::Activate { id } => {
            let profile = service.set_active(&me, id, true).await?;
            println!("{} {} activated.", "✓".bright_green(), profile.display_name());
        }
        UserCommand::Deactivate { id } => {
            let profile = service.set_active(&me, id, false).await?;
            println!("{} {} deactivated.", "✓".bright_green(), profile.display_name());
        }
    }
    Ok(())
}

async fn presence_page(
    session: &Session,
    api: Arc<BackendClient>,
    command: PresenceCommand,
) -> Result<()> {
    let me = enter(session, Route::Dashboard)?;
    let service = PresenceService::new(api.clone(), me.id);

    match command {
        PresenceCommand::Online => {
            println!("{}", render::users(&service.online_users().await?));
        }
        PresenceCommand::Run => {
            let mut feed = realtime::subscribe_inserts(api.as_ref(), &[USER_PRESENCE])
                .await
                .context("Failed to join the presence feed")?;
            let (signals, receiver) = mpsc::channel(4);
            let resumes = presence::forward_resumes(signals.clone())?;
            let heartbeat = service.run(receiver);
            tokio::pin!(heartbeat);

            println!("{}", "Online, Ctrl-C to leave.".dimmed());
            loop {
                tokio::select! {
                    _ = &mut heartbeat => break,
                    _ = tokio::signal::ctrl_c() => {
                        let _ = signals.send(PresenceSignal::Unload).await;
                    }
                    Some(_) = feed.recv() => {
                        let online = service.online_users().await?;
                        let names: Vec<&str> = online.iter().map(Profile::display_name).collect();
                        println!("online: {}", names.join(", ").bright_cyan());
                    }
                }
            }
            resumes.abort();
        }
    }
    Ok(())
}
