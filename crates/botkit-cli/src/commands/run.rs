//! `botkit run`: the console channel.
//!
//! Each non-empty stdin line becomes a message activity in one console
//! conversation.  Replies are printed as they come back from the turn.
//! End of input finishes the conversation; Ctrl-C cancels the turn in
//! flight and exits.

use botkit_core::prelude::{
    Activity, ActivityType, Bot, CancellationToken, ChannelAccount, ConversationAccount,
    CoreBotAdapter,
};
use botkit_core::{application::ApplicationError, error::BotError};
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    cli::RunArgs,
    error::{CliError, CliResult},
    output::OutputManager,
};

/// Channel id stamped on console activities.
pub const CONSOLE_CHANNEL: &str = "console";

pub fn execute(args: RunArgs, output: OutputManager) -> CliResult<()> {
    let settings = super::load_settings(&args.bot)?;
    let services = super::compose(&settings)?;
    let adapter = services.adapter()?;
    let bot = services.bot()?;

    let channel = ConsoleChannel::new(&args.user);
    info!(conversation = %channel.conversation.id, "Console conversation started");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(converse(&adapter, bot.as_ref(), &channel, &output))
}

#[instrument(skip_all, fields(conversation = %channel.conversation.id))]
async fn converse(
    adapter: &CoreBotAdapter,
    bot: &dyn Bot,
    channel: &ConsoleChannel,
    output: &OutputManager,
) -> CliResult<()> {
    let cancellation = CancellationToken::new();
    let interrupt = {
        let token = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        })
    };

    if output.is_human() {
        output.info("Type a message and press Enter. Ctrl-D ends the conversation.")?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = cancellation.cancelled() => break Err(CliError::Cancelled),
        };
        let Some(line) = line else {
            debug!("End of input");
            break Ok(());
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let replies = match adapter
            .process_activity(channel.message(text), None, bot, cancellation.clone())
            .await
        {
            Ok(replies) => replies,
            Err(BotError::Application(ApplicationError::TurnCancelled)) => {
                break Err(CliError::Cancelled);
            }
            Err(e) => break Err(e.into()),
        };
        for reply in &replies {
            show(output, channel, reply)?;
        }
    };

    interrupt.abort();
    result
}

fn show(output: &OutputManager, channel: &ConsoleChannel, activity: &Activity) -> CliResult<()> {
    if output.is_json() {
        output.json(activity)?;
        return Ok(());
    }
    match activity.activity_type {
        ActivityType::Message => {
            let speaker = activity
                .from
                .name
                .as_deref()
                .unwrap_or(channel.bot_name());
            output.reply(speaker, activity.text())?;
        }
        ActivityType::EndOfConversation => {
            output.info("The bot ended the conversation")?;
        }
        _ => debug!(activity_type = ?activity.activity_type, "Activity not shown"),
    }
    Ok(())
}

/// Addresses for the single console conversation.
#[derive(Debug, Clone)]
struct ConsoleChannel {
    conversation: ConversationAccount,
    user: ChannelAccount,
    bot: ChannelAccount,
}

impl ConsoleChannel {
    fn new(user_name: &str) -> Self {
        Self {
            conversation: ConversationAccount::new(Uuid::new_v4().to_string()),
            user: ChannelAccount::new("user", user_name),
            bot: ChannelAccount::new("bot", "Bot"),
        }
    }

    fn bot_name(&self) -> &str {
        self.bot.name.as_deref().unwrap_or(&self.bot.id)
    }

    /// An inbound message from the console user.
    fn message(&self, text: &str) -> Activity {
        Activity {
            id: Some(Uuid::new_v4().to_string()),
            timestamp: Some(Utc::now()),
            channel_id: CONSOLE_CHANNEL.into(),
            from: self.user.clone(),
            recipient: self.bot.clone(),
            conversation: self.conversation.clone(),
            ..Activity::message(text)
        }
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_addressed_to_the_bot() {
        let channel = ConsoleChannel::new("Ada");
        let activity = channel.message("hi");

        assert_eq!(activity.activity_type, ActivityType::Message);
        assert_eq!(activity.text(), "hi");
        assert_eq!(activity.channel_id, CONSOLE_CHANNEL);
        assert_eq!(activity.from.name.as_deref(), Some("Ada"));
        assert_eq!(activity.recipient.id, "bot");
        assert!(activity.id.is_some());
        assert!(activity.timestamp.is_some());
    }

    #[test]
    fn one_conversation_per_channel() {
        let channel = ConsoleChannel::new("User");
        let first = channel.message("one");
        let second = channel.message("two");

        assert_eq!(first.conversation.id, second.conversation.id);
        assert_ne!(first.id, second.id);
        assert_ne!(
            ConsoleChannel::new("User").conversation.id,
            channel.conversation.id
        );
    }
}
