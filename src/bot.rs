//! Bot front-end
//!
//! Long-polling teloxide dispatcher for `/start` and `/scrape`. Each `/scrape`
//! gets its own session client and its own status message.

use std::sync::Arc;
use std::time::Instant;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode};
use tracing::{error, info, warn};

use crate::commands::scrape::{self, Reporter, ScrapeRequest, SCRAPING_TEXT};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::ExportBuffer;
use crate::metrics;
use crate::session::SessionClient;

pub const START_TEXT: &str = "👋 Send command like:\n\
<code>/scrape &lt;channel_link_or_username&gt; [start_id] [end_id]</code>\n\n\
<b>Examples</b>\n\
• <code>/scrape @testchannel</code>\n\
• <code>/scrape https://t.me/testchannel 100 300</code>\n\
• <code>/scrape https://t.me/c/1234567890 1 500</code>\n\n\
<i>Private channels: your user session must be a member.</i>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Scrape(Vec<String>),
}

/// Username of the running bot, for `/cmd@BotName` addressing.
#[derive(Debug, Clone, Default)]
pub struct BotIdentity {
    pub username: Option<String>,
}

/// Parse a command message. Commands addressed to another bot are ignored.
pub fn parse_command(text: &str, identity: &BotIdentity) -> Option<BotCommand> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?.strip_prefix('/')?;

    let (name, addressee) = match head.split_once('@') {
        Some((name, addressee)) => (name, Some(addressee)),
        None => (head, None),
    };
    if let (Some(addressee), Some(own)) = (addressee, identity.username.as_deref()) {
        if !addressee.eq_ignore_ascii_case(own) {
            return None;
        }
    }

    match name.to_ascii_lowercase().as_str() {
        "start" => Some(BotCommand::Start),
        "scrape" => Some(BotCommand::Scrape(parts.map(str::to_string).collect())),
        _ => None,
    }
}

/// Reports into a single status message in the requesting chat.
pub struct ChatReporter {
    bot: Bot,
    chat_id: ChatId,
    status_id: MessageId,
}

impl Reporter for ChatReporter {
    async fn update(&self, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(self.chat_id, self.status_id, text)
            .await?;
        Ok(())
    }

    async fn deliver(
        &self,
        file_name: &str,
        caption: &str,
        document: &ExportBuffer,
    ) -> Result<()> {
        let file = InputFile::memory(document.as_bytes().to_vec()).file_name(file_name.to_string());
        self.bot
            .send_document(self.chat_id, file)
            .caption(caption)
            .await?;
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        self.bot.delete_message(self.chat_id, self.status_id).await?;
        Ok(())
    }
}

async fn reply(bot: &Bot, msg: &Message, text: &str) -> Result<()> {
    bot.send_message(msg.chat.id, text)
        .reply_to_message_id(msg.id)
        .await?;
    Ok(())
}

async fn handle_scrape(bot: &Bot, msg: &Message, config: &Config, args: &[String]) -> Result<()> {
    let caller = msg.from().map(|u| u.id.0 as i64);
    if !config.is_authorized(caller) {
        warn!(?caller, "Rejected scrape from unauthorized user");
        metrics::record_rejected("unauthorized");
        return reply(bot, msg, &Error::Unauthorized.to_string()).await;
    }

    let request = match ScrapeRequest::from_args(args) {
        Ok(request) => request,
        Err(err) => {
            metrics::record_rejected("usage");
            return reply(bot, msg, &err.to_string()).await;
        }
    };

    info!(
        ?caller,
        reference = %request.reference,
        start_id = ?request.range.start_id,
        end_id = ?request.range.end_id,
        "Scrape requested"
    );

    let status = bot
        .send_message(msg.chat.id, SCRAPING_TEXT)
        .reply_to_message_id(msg.id)
        .await?;
    let reporter = ChatReporter {
        bot: bot.clone(),
        chat_id: msg.chat.id,
        status_id: status.id,
    };

    metrics::record_scrape_start();
    let started = Instant::now();

    let outcome = match SessionClient::connect(config).await {
        Ok(client) => {
            let outcome = scrape::execute(&client, &request, &reporter).await;
            client.disconnect().await;
            outcome
        }
        Err(err) => scrape::report_failure(&reporter, &err).await,
    };

    metrics::record_scrape_result(started.elapsed(), outcome.label(), outcome.rows());
    info!(
        outcome = outcome.label(),
        rows = outcome.rows(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Scrape finished"
    );
    Ok(())
}

pub async fn handle_message(
    bot: Bot,
    msg: Message,
    config: Arc<Config>,
    identity: Arc<BotIdentity>,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    match parse_command(text, &identity) {
        Some(BotCommand::Start) => {
            bot.send_message(msg.chat.id, START_TEXT)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Some(BotCommand::Scrape(args)) => handle_scrape(&bot, &msg, &config, &args).await?,
        None => {}
    }
    Ok(())
}

/// Run the dispatcher until Ctrl-C.
pub async fn run(config: Arc<Config>) -> Result<()> {
    config.validate_for_bot()?;

    let bot = Bot::new(config.bot_token.clone());
    let me = bot.get_me().await?;
    let identity = Arc::new(BotIdentity {
        username: me.user.username.clone(),
    });
    info!(
        bot = identity.username.as_deref().unwrap_or("-"),
        restricted = config.owner_id != 0,
        "Bot started"
    );

    let handler = dptree::entry().branch(Update::filter_message().endpoint(
        |bot: Bot, msg: Message, config: Arc<Config>, identity: Arc<BotIdentity>| async move {
            if let Err(err) = handle_message(bot, msg, config, identity).await {
                error!("Handler error: {err:?}");
            }
            Ok::<_, teloxide::RequestError>(())
        },
    ));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![config, identity])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
    Ok(())
}
