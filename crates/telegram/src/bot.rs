use std::{sync::Arc, time::Duration};

use {
    joingate_gate::Dispatcher,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{Error, Result, config::TelegramAccountConfig, handlers, platform::TelegramPlatform};

/// Commands published to Telegram clients for autocomplete.
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Check access and show the welcome message"),
        BotCommand::new("help", "Show available commands"),
        BotCommand::new("set", "Set the channels members of this group must join"),
        BotCommand::new("fsub", "Show or toggle force-subscribe for this group"),
        BotCommand::new("reset", "Remove force-subscribe from this group"),
        BotCommand::new("stats", "Show user and group counts (owner)"),
        BotCommand::new("broadcast", "Send a message to every user and group (owner)"),
        BotCommand::new("cancel", "Stop the running broadcast (owner)"),
        BotCommand::new("ban", "Block a user from the bot (owner)"),
        BotCommand::new("unban", "Unblock a user (owner)"),
    ]
}

/// A connected bot account.
pub struct TelegramBot {
    bot: Bot,
    config: TelegramAccountConfig,
    username: Option<String>,
}

impl TelegramBot {
    /// Verify the token, clear any webhook so long polling works, and
    /// register the command list.
    pub async fn connect(config: TelegramAccountConfig) -> Result<Self> {
        if config.token.expose_secret().is_empty() {
            return Err(Error::message("telegram bot token is not set"));
        }

        // The client timeout must exceed the long-polling timeout so the
        // request is not aborted before Telegram responds.
        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs) + 15))
            .build()?;
        let bot = Bot::with_client(config.token.expose_secret(), client);
        Self::connect_with(bot, config).await
    }

    pub async fn connect_with(bot: Bot, config: TelegramAccountConfig) -> Result<Self> {
        let me = bot.get_me().await?;
        bot.delete_webhook().send().await?;

        if config.register_commands
            && let Err(e) = bot.set_my_commands(bot_commands()).await
        {
            warn!("failed to register bot commands: {e}");
        }

        info!(username = ?me.username, "telegram bot connected (webhook cleared)");
        Ok(Self {
            bot,
            config,
            username: me.username.clone(),
        })
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn platform(&self) -> TelegramPlatform {
        TelegramPlatform::new(self.bot.clone())
    }

    /// Long-poll for updates and hand each one to the dispatcher on its own
    /// task. Returns when `cancel` fires, or when another instance takes
    /// over the token.
    pub async fn run_polling(&self, dispatcher: Arc<Dispatcher>, cancel: CancellationToken) {
        info!("starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let request = self
                .bot
                .get_updates()
                .offset(offset)
                .timeout(self.config.poll_timeout_secs)
                .allowed_updates(vec![
                    AllowedUpdate::Message,
                    AllowedUpdate::CallbackQuery,
                    AllowedUpdate::MyChatMember,
                ]);

            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        let Some(event) = handlers::inbound_event(update) else {
                            continue;
                        };
                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(async move { dispatcher.dispatch(event).await });
                    }
                },
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    warn!(
                        "telegram polling stopped: another instance is already running with this token"
                    );
                    cancel.cancel();
                    break;
                },
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_secs(5)) => {},
                    }
                },
            }
        }
        info!("telegram polling stopped");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{Json, Router, extract::State, routing::post},
        serde_json::{Value, json},
        std::sync::Mutex,
        tokio::net::TcpListener,
    };

    type Calls = Arc<Mutex<Vec<(String, Value)>>>;

    async fn handler(
        State(calls): State<Calls>,
        axum::extract::Path(path): axum::extract::Path<String>,
        body: String,
    ) -> Json<Value> {
        let method = path.rsplit('/').next().unwrap_or_default().to_string();
        let params: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        calls.lock().unwrap().push((method.clone(), params));
        let result = match method.to_ascii_lowercase().as_str() {
            "getme" => json!({
                "id": 99,
                "is_bot": true,
                "first_name": "Gate",
                "username": "gate_bot",
                "can_join_groups": true,
                "can_read_all_group_messages": false,
                "supports_inline_queries": false
            }),
            "getupdates" => json!([]),
            _ => json!(true),
        };
        Json(json!({ "ok": true, "result": result }))
    }

    async fn mock_bot() -> (Bot, Calls) {
        let calls: Calls = Arc::default();
        let app = Router::new()
            .route("/{*path}", post(handler))
            .with_state(Arc::clone(&calls));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let bot = Bot::new("test-token")
            .set_api_url(reqwest::Url::parse(&format!("http://{addr}/")).unwrap());
        (bot, calls)
    }

    fn methods(calls: &Calls) -> Vec<String> {
        calls
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.to_ascii_lowercase())
            .collect()
    }

    #[tokio::test]
    async fn connect_clears_webhook_and_registers_commands() {
        let (bot, calls) = mock_bot().await;
        let connected = TelegramBot::connect_with(bot, TelegramAccountConfig::default())
            .await
            .unwrap();
        assert_eq!(connected.username(), Some("gate_bot"));

        let methods = methods(&calls);
        assert_eq!(methods, vec!["getme", "deletewebhook", "setmycommands"]);
        let registered = calls.lock().unwrap()[2].1["commands"].clone();
        let names: Vec<&str> = registered
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["command"].as_str())
            .collect();
        assert!(names.contains(&"broadcast"));
        assert!(names.contains(&"fsub"));
    }

    #[tokio::test]
    async fn command_registration_can_be_disabled() {
        let (bot, calls) = mock_bot().await;
        let config = TelegramAccountConfig {
            register_commands: false,
            ..Default::default()
        };
        TelegramBot::connect_with(bot, config).await.unwrap();
        assert!(!methods(&calls).contains(&"setmycommands".to_string()));
    }

    #[tokio::test]
    async fn empty_token_is_rejected() {
        let err = TelegramBot::connect(TelegramAccountConfig::default())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("token"));
    }
}
