//! Bot startup: wire the registry, the gate and the Telegram adapter
//! together and poll until interrupted.

use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    joingate_channels::MessagingPlatform,
    joingate_common::types::parse_channel_list,
    joingate_config::{JoingateConfig, Severity, validate},
    joingate_gate::{
        Authorizer, Broadcaster, CommandRouter, Dispatcher, EnforcementPolicy, EventGate,
        MembershipVerifier,
    },
    joingate_store::SubscriptionStore,
    joingate_telegram::{TelegramAccountConfig, TelegramBot},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::db_commands::open_store;

pub async fn run_bot(config: JoingateConfig) -> anyhow::Result<()> {
    let diagnostics = validate(&config);
    for d in &diagnostics.diagnostics {
        match d.severity {
            Severity::Error => tracing::error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
        }
    }
    if diagnostics.has_errors() {
        anyhow::bail!("invalid configuration, run `joingate config check` for details");
    }

    let global = parse_channel_list(config.required_channels.iter().map(String::as_str))
        .context("invalid required_channels")?;

    let store: Arc<dyn SubscriptionStore> = Arc::new(open_store(&config.database_url).await?);

    let telegram = TelegramAccountConfig::from_value(config.telegram.clone())?;
    let bot = TelegramBot::connect(telegram).await?;
    let platform: Arc<dyn MessagingPlatform> = Arc::new(bot.platform());

    let verifier = MembershipVerifier::new(
        Arc::clone(&platform),
        Duration::from_secs(config.gate.verify_timeout_secs),
    );
    let policy = EnforcementPolicy::new(
        Arc::clone(&platform),
        Arc::clone(&store),
        verifier,
        config.owner_id,
    )
    .with_global_channels(global.channels)
    .with_global_indeterminate(config.gate.global_indeterminate);

    let authz = Authorizer::new(Arc::clone(&platform), config.owner_id);
    let gate = Arc::new(
        EventGate::new(
            Arc::new(policy),
            Arc::clone(&store),
            Arc::clone(&platform),
            authz.clone(),
        )
        .with_global_scope(config.gate.global_scope)
        .with_log_chat(config.log_chat_id),
    );
    let broadcaster = Arc::new(Broadcaster::new(
        Arc::clone(&platform),
        Arc::clone(&store),
        Duration::from_millis(config.broadcast.delay_ms),
    ));
    let router = Arc::new(CommandRouter::new(
        Arc::clone(&platform),
        Arc::clone(&store),
        Arc::clone(&gate),
        authz,
        broadcaster,
    ));

    let mut dispatcher = Dispatcher::new(gate, Arc::clone(&platform));
    dispatcher.register(router.clone());
    let dispatcher = Arc::new(dispatcher);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            info!("shutdown requested");
            cancel.cancel();
        });
    }

    info!(
        owner_id = config.owner_id,
        global_channels = config.required_channels.len(),
        "joingate running"
    );
    bot.run_polling(dispatcher, cancel).await;

    router.shutdown().await;
    info!("joingate stopped");
    Ok(())
}
