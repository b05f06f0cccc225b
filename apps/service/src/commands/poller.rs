use std::time::Duration;

use super::CommandResponder;
use crate::notifier::TelegramClient;
use crate::notifier::telegram::Update;

/// Pause after a failed `getUpdates` before polling again
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Long-polls the bot API and answers commands in each reply's parse mode
pub struct CommandPoller {
    client: TelegramClient,
    responder: CommandResponder,
    poll_timeout: Duration,
    offset: Option<i64>,
}

impl CommandPoller {
    pub fn new(client: TelegramClient, responder: CommandResponder, poll_timeout: Duration) -> Self {
        Self { client, responder, poll_timeout, offset: None }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Poll forever. API errors are logged and retried after [`ERROR_BACKOFF`].
    pub async fn run(mut self) {
        tracing::info!(
            commands = ?self.responder.commands().collect::<Vec<_>>(),
            "Command poller started"
        );

        loop {
            if let Err(e) = self.poll_once().await {
                tracing::warn!(error = %e, "Polling for commands failed");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }

    /// Fetch one batch of updates and reply to every command in it
    pub async fn poll_once(&mut self) -> Result<usize, crate::notifier::NotifyError> {
        let updates = self.client.get_updates(self.offset, self.poll_timeout).await?;
        let mut replied = 0;

        for update in updates {
            self.offset = Some(update.update_id + 1);
            if self.handle(update).await {
                replied += 1;
            }
        }

        Ok(replied)
    }

    async fn handle(&self, update: Update) -> bool {
        let Some(message) = update.message else {
            return false;
        };
        let Some(text) = message.text else {
            return false;
        };
        let Some(reply) = self.responder.respond(message.chat.id, &text).await else {
            return false;
        };

        match self.client.send_message(message.chat.id, &reply.text, reply.parse_mode).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(chat_id = message.chat.id, error = %e, "Failed to send command reply");
                false
            }
        }
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }
}
