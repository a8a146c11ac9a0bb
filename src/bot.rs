use anyhow::{Context, Result};
use axum::body::Bytes;
use serde_json::Value;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, ParseMode};
use tracing::{debug, info, warn, Instrument};

use crate::backend::Backend;
use crate::config::Config;
use crate::i18n::{language_picker, main_keyboard, Lang};
use crate::platform::telegram::send_chunked;
use crate::platform::{CallbackQuery, InboundUpdate, Message};

const STATS_BUTTON: &str = "📊 Statistics";
const HEALTH_BUTTON: &str = "🔍 System Health";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Help,
    Lang,
    Version,
    Stats,
    Check,
}

impl Command {
    /// Recognise slash commands (with optional `@botname` and arguments) and
    /// the reply-keyboard labels of either locale.
    fn parse(text: &str) -> Option<Self> {
        if let Some(rest) = text.strip_prefix('/') {
            let name = rest.split_whitespace().next().unwrap_or("");
            let name = name.split('@').next().unwrap_or(name);
            return match name {
                "start" => Some(Command::Start),
                "help" => Some(Command::Help),
                "lang" => Some(Command::Lang),
                "version" => Some(Command::Version),
                "stats" => Some(Command::Stats),
                "check" => Some(Command::Check),
                _ => None,
            };
        }

        if text == STATS_BUTTON {
            return Some(Command::Stats);
        }
        if text == HEALTH_BUTTON {
            return Some(Command::Check);
        }
        Lang::ALL.iter().find_map(|lang| {
            let m = lang.messages();
            if text == m.main_menu_button {
                Some(Command::Start)
            } else if text == m.help_button || text == m.convert_button {
                Some(Command::Help)
            } else if text == m.language_button {
                Some(Command::Lang)
            } else {
                None
            }
        })
    }

    fn admin_only(self) -> bool {
        matches!(self, Command::Stats | Command::Check)
    }
}

/// Fire the `log_user` / `log_event` backend calls without waiting on them.
pub fn spawn_activity_log(backend: &Backend, update: &InboundUpdate) {
    let Some(user) = update.sender().cloned() else {
        debug!("Update has no sender, skipping activity log");
        return;
    };
    let backend = backend.clone();
    let summary = update.summary();

    tokio::spawn(
        async move {
            let user_id = user.id.to_string();
            let username = user.username.unwrap_or_default();
            let first_name = user.first_name.unwrap_or_default();

            let user_params = [
                ("userId", user_id.as_str()),
                ("username", username.as_str()),
                ("firstName", first_name.as_str()),
            ];
            let event_params = [
                ("type", "INBOUND"),
                ("details", summary.as_str()),
                ("status", "OK"),
                ("userId", user_id.as_str()),
                ("username", username.as_str()),
            ];

            let (user_res, event_res) = futures::join!(
                backend.notify("log_user", &user_params),
                backend.notify("log_event", &event_params)
            );
            if let Err(e) = user_res {
                warn!("log_user failed: {:#}", e);
            }
            if let Err(e) = event_res {
                warn!("log_event failed: {:#}", e);
            }
        }
        .in_current_span(),
    );
}

/// Language chosen by a `lang_<code>` callback. Anything after the code is
/// ignored, so `lang_en_extra` still selects English.
fn callback_lang(data: &str) -> Option<Result<Lang, &str>> {
    let rest = data.strip_prefix("lang_")?;
    let code = rest.split('_').next().unwrap_or(rest);
    Some(Lang::from_code(code).ok_or(code))
}

/// Per-update command handling. Replies go straight to the Bot API.
pub struct Interaction<'a> {
    config: &'a Config,
    backend: Backend,
    bot: Bot,
}

impl<'a> Interaction<'a> {
    pub fn new(config: &'a Config, backend: Backend, bot: Bot) -> Self {
        Self {
            config,
            backend,
            bot,
        }
    }

    /// `raw` is the original request body, forwarded as-is for documents.
    pub async fn handle(&self, update: InboundUpdate, raw: Bytes) -> Result<()> {
        let chat_id = ChatId(update.chat_id());
        let user_id = update.user_id();
        match update {
            InboundUpdate::Callback(cb) => self.handle_callback(cb, chat_id).await,
            InboundUpdate::Message(msg) => self.handle_message(msg, chat_id, user_id, raw).await,
        }
    }

    async fn handle_callback(&self, cb: CallbackQuery, chat_id: ChatId) -> Result<()> {
        let lang = match cb.data.as_deref().and_then(callback_lang) {
            Some(Ok(lang)) => lang,
            Some(Err(code)) => {
                warn!("Unsupported language code in callback: {}", code);
                return Ok(());
            }
            None => {
                debug!("Ignoring callback data {:?}", cb.data);
                return Ok(());
            }
        };

        let user_id = cb.from.id.to_string();
        self.backend
            .notify(
                "set_user_lang",
                &[("userId", user_id.as_str()), ("lang", lang.code())],
            )
            .await?;

        let m = lang.messages();
        if let Err(e) = self
            .bot
            .answer_callback_query(CallbackQueryId(cb.id.clone()))
            .text(m.lang_set)
            .await
        {
            warn!("Failed to answer callback query: {}", e);
        }
        self.bot
            .send_message(chat_id, m.welcome)
            .reply_markup(main_keyboard(lang))
            .await
            .context("Failed to send welcome")?;

        info!("User {} switched language to {}", user_id, lang.code());
        Ok(())
    }

    async fn handle_message(
        &self,
        msg: Message,
        chat_id: ChatId,
        user_id: i64,
        raw: Bytes,
    ) -> Result<()> {
        let text = msg.text.as_deref().unwrap_or("");

        match Command::parse(text) {
            Some(cmd) if !cmd.admin_only() || self.config.is_admin(chat_id.0) => {
                info!("Command {:?} from chat {}", cmd, chat_id.0);
                return self.run_command(cmd, chat_id, user_id).await;
            }
            Some(cmd) => debug!("Admin command {:?} refused for chat {}", cmd, chat_id.0),
            None => {}
        }

        if msg.document.is_some() {
            // Conversion happens in the backend; we only hand over the update.
            self.backend.forward_update(raw).await?;
            info!("Forwarded document from chat {} to backend", chat_id.0);
            return Ok(());
        }

        if !text.is_empty() {
            let lang = self.user_lang(user_id).await;
            self.bot
                .send_message(chat_id, lang.messages().unknown)
                .await
                .context("Failed to send fallback reply")?;
        }
        Ok(())
    }

    async fn run_command(&self, cmd: Command, chat_id: ChatId, user_id: i64) -> Result<()> {
        match cmd {
            Command::Start => {
                let lang = self.user_lang(user_id).await;
                self.bot
                    .send_message(chat_id, lang.messages().welcome)
                    .reply_markup(main_keyboard(lang))
                    .await?;
            }
            Command::Help => {
                let lang = self.user_lang(user_id).await;
                self.bot.send_message(chat_id, lang.messages().help).await?;
            }
            Command::Lang => {
                let lang = self.user_lang(user_id).await;
                self.bot
                    .send_message(chat_id, lang.messages().select_lang)
                    .reply_markup(language_picker())
                    .await?;
            }
            Command::Version => {
                let lang = self.user_lang(user_id).await;
                self.bot.send_message(chat_id, lang.version_text()).await?;
            }
            Command::Stats => {
                let report = self.report("get_stats").await?;
                #[allow(deprecated)]
                let mode = ParseMode::Markdown;
                send_chunked(&self.bot, chat_id, &report, Some(mode)).await?;
            }
            Command::Check => {
                let report = self.report("get_health_report").await?;
                send_chunked(&self.bot, chat_id, &report, None).await?;
            }
        }
        Ok(())
    }

    /// Stored language, or the default when unset or unreachable.
    async fn user_lang(&self, user_id: i64) -> Lang {
        let id = user_id.to_string();
        match self
            .backend
            .call("get_user_lang", &[("userId", id.as_str())])
            .await
        {
            Ok(value) => value
                .get("lang")
                .and_then(Value::as_str)
                .and_then(Lang::from_code)
                .unwrap_or_default(),
            Err(e) => {
                warn!("Using default language for {}: {:#}", user_id, e);
                Lang::default()
            }
        }
    }

    /// Precomputed admin report text from the backend.
    async fn report(&self, action: &str) -> Result<String> {
        let value = self.backend.call(action, &[]).await?;
        value
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .with_context(|| format!("Backend {action} reply has no text"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/start ref123"), Some(Command::Start));
        assert_eq!(Command::parse("/help@ConvertBot"), Some(Command::Help));
        assert_eq!(Command::parse("/lang"), Some(Command::Lang));
        assert_eq!(Command::parse("/version"), Some(Command::Version));
        assert_eq!(Command::parse("/stats"), Some(Command::Stats));
        assert_eq!(Command::parse("/check"), Some(Command::Check));
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("/"), None);
    }

    #[test]
    fn test_parse_button_labels() {
        assert_eq!(Command::parse("🏠 Main Menu"), Some(Command::Start));
        assert_eq!(Command::parse("❓ Help"), Some(Command::Help));
        assert_eq!(Command::parse("❓ مساعدة"), Some(Command::Help));
        assert_eq!(Command::parse("📄 Convert"), Some(Command::Help));
        assert_eq!(Command::parse("🌐 Language"), Some(Command::Lang));
        assert_eq!(Command::parse("🌐 اللغة"), Some(Command::Lang));
        assert_eq!(Command::parse("📊 Statistics"), Some(Command::Stats));
        assert_eq!(Command::parse("🔍 System Health"), Some(Command::Check));
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("start"), None);
    }

    #[test]
    fn test_callback_lang() {
        assert_eq!(callback_lang("lang_en"), Some(Ok(Lang::En)));
        assert_eq!(callback_lang("lang_ar"), Some(Ok(Lang::Ar)));
        assert_eq!(callback_lang("lang_en_extra"), Some(Ok(Lang::En)));
        assert_eq!(callback_lang("lang_fr"), Some(Err("fr")));
        assert_eq!(callback_lang("menu_main"), None);
    }

    #[test]
    fn test_admin_only() {
        assert!(Command::Stats.admin_only());
        assert!(Command::Check.admin_only());
        assert!(!Command::Start.admin_only());
        assert!(!Command::Lang.admin_only());
    }
}
