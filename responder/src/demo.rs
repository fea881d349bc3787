//! Example bot wired into the receiver binary
//!
//! - greets users who say "hi"
//! - echoes added reactions, once right away and once after a delay
//! - logs verification failures
//!
//! The immediate reaction echo posts from a detached task, so that handler
//! reports success before the post completes. A failed post is only logged
//! there and never counted as a handler failure.

use crate::{
    app::SlackEventApp,
    client::MessagingClient,
    registry::{ERROR_EVENT, EventData, Handler, HandlerResult},
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};

pub const REPEAT_DELAY: Duration = Duration::from_secs(5);

/// A message to post: `(channel, text)`
pub type Reply = (String, String);

/// Registers the example handlers with the default repeat delay.
pub fn register(app: &SlackEventApp, client: Arc<dyn MessagingClient>) -> Vec<Handler> {
    register_with_delay(app, client, REPEAT_DELAY)
}

/// Registers the example handlers, in this order:
/// `message`, `reaction_added` (sync), `reaction_added` (async), `error`.
pub fn register_with_delay(
    app: &SlackEventApp,
    client: Arc<dyn MessagingClient>,
    repeat_delay: Duration,
) -> Vec<Handler> {
    let greeter = client.clone();
    let echo = client.clone();
    let repeater = client;

    vec![
        app.on(
            "message",
            Handler::from_async(move |data| {
                let client = greeter.clone();
                async move {
                    match data.envelope().and_then(greeting_reply) {
                        Some((channel, text)) => post(client.as_ref(), &channel, &text).await,
                        None => Ok(()),
                    }
                }
            }),
        ),
        app.on(
            "reaction_added",
            Handler::from_fn(move |data| {
                let Some((channel, text)) = data.envelope().and_then(reaction_echo) else {
                    return Ok(());
                };

                let client = echo.clone();
                ntex::rt::spawn(async move {
                    if let Err(e) = post(client.as_ref(), &channel, &text).await {
                        logfire::error!("Failed to echo reaction: {error}", error = format!("{e:#}"));
                    }
                });
                Ok(())
            }),
        ),
        app.on(
            "reaction_added",
            Handler::from_async(move |data| {
                let client = repeater.clone();
                async move {
                    let Some((channel, text)) = data.envelope().and_then(reaction_echo) else {
                        return Ok(());
                    };

                    tokio::time::sleep(repeat_delay).await;
                    let text = format!("I will say twice because it's important\n{text}");
                    post(client.as_ref(), &channel, &text).await
                }
            }),
        ),
        app.on(ERROR_EVENT, Handler::from_fn(log_error)),
    ]
}

/// Replies `Hello <@user>! :tada:` to plain messages containing "hi".
pub fn greeting_reply(envelope: &Value) -> Option<Reply> {
    let message = envelope.get("event")?;
    if message.get("subtype").is_some_and(|subtype| !subtype.is_null()) {
        return None;
    }

    let text = message.get("text")?.as_str()?;
    if !text.contains("hi") {
        return None;
    }

    let channel = message.get("channel")?.as_str()?;
    let user = message.get("user")?.as_str()?;

    Some((channel.to_string(), format!("Hello <@{user}>! :tada:")))
}

/// `reaction_added :<emoji>:` for the channel of the reacted item
pub fn reaction_echo(envelope: &Value) -> Option<Reply> {
    let event = envelope.get("event")?;
    let emoji = event.get("reaction")?.as_str()?;
    let channel = event.get("item")?.get("channel")?.as_str()?;

    Some((channel.to_string(), format!("reaction_added :{emoji}:")))
}

fn log_error(data: &EventData) -> HandlerResult {
    if let Some(err) = data.error() {
        logfire::error!("ERROR: {error}", error = err.log_message());
    }
    Ok(())
}

async fn post(client: &dyn MessagingClient, channel: &str, text: &str) -> HandlerResult {
    let response = client.post_message(channel, text).await?;
    logfire::debug!(
        "Posted message to {channel} at {ts}",
        channel = channel.to_string(),
        ts = response.ts.unwrap_or_default()
    );
    Ok(())
}
