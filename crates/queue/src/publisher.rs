//! AMQP publisher for voting events.
//!
//! The Telegram bridge consumes `voting.created` from the `votings` topic
//! exchange. Messages are persistent and every publish waits for the
//! broker's confirm. A lost connection is reopened on the next publish.

use async_trait::async_trait;
use condo_common::{AppError, AppResult, config::AmqpConfig};
use condo_core::{VotingCreatedEvent, VotingEventPublisher};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
    options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions},
    types::FieldTable,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

const CONTENT_TYPE_JSON: &str = "application/json";

/// One broker connection with its confirm-mode channel.
struct AmqpSession {
    connection: Connection,
    channel: Channel,
}

impl AmqpSession {
    async fn open(config: &AmqpConfig) -> AppResult<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| AppError::Queue(format!("Failed to connect to AMQP broker: {e}")))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| AppError::Queue(format!("Failed to open AMQP channel: {e}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| AppError::Queue(format!("Failed to enable publisher confirms: {e}")))?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                AppError::Queue(format!(
                    "Failed to declare exchange {}: {e}",
                    config.exchange
                ))
            })?;

        Ok(Self {
            connection,
            channel,
        })
    }

    fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}

/// Voting event publisher backed by an AMQP broker.
///
/// A dropped connection is re-established on the next publish.
pub struct AmqpVotingPublisher {
    config: AmqpConfig,
    session: Mutex<AmqpSession>,
}

impl AmqpVotingPublisher {
    /// Connect, enable publisher confirms and declare the exchange.
    pub async fn connect(config: &AmqpConfig) -> AppResult<Self> {
        let session = AmqpSession::open(config).await?;
        info!(exchange = %config.exchange, "Connected to AMQP broker");

        Ok(Self {
            config: config.clone(),
            session: Mutex::new(session),
        })
    }

    /// Whether the current connection and channel are open.
    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_connected()
    }

    /// Close the broker connection. A later publish reconnects.
    pub async fn close(&self) -> AppResult<()> {
        let session = self.session.lock().await;
        if !session.connection.status().connected() {
            return Ok(());
        }
        session
            .connection
            .close(200, "Shutting down")
            .await
            .map_err(|e| AppError::Queue(format!("Failed to close AMQP connection: {e}")))
    }

    /// A channel on a live connection, reconnecting first if needed.
    async fn channel(&self) -> AppResult<Channel> {
        let mut session = self.session.lock().await;
        if !session.is_connected() {
            warn!(exchange = %self.config.exchange, "AMQP connection lost, reconnecting");
            *session = AmqpSession::open(&self.config).await?;
            info!(exchange = %self.config.exchange, "Reconnected to AMQP broker");
        }
        Ok(session.channel.clone())
    }

    async fn publish(&self, routing_key: &str, payload: &[u8]) -> AppResult<()> {
        let channel = self.channel().await?;
        match publish_confirmed(&channel, &self.config.exchange, routing_key, payload).await {
            Err(e) if !channel.status().connected() => {
                warn!(error = %e, "Publish failed on a closed channel, retrying once");
                let channel = self.channel().await?;
                publish_confirmed(&channel, &self.config.exchange, routing_key, payload).await
            }
            result => result,
        }
    }
}

async fn publish_confirmed(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    payload: &[u8],
) -> AppResult<()> {
    let properties = BasicProperties::default()
        .with_delivery_mode(PERSISTENT)
        .with_content_type(CONTENT_TYPE_JSON.into());

    let confirmation = channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            payload,
            properties,
        )
        .await
        .map_err(|e| AppError::Queue(format!("Failed to publish: {e}")))?
        .await
        .map_err(|e| AppError::Queue(format!("Publish not confirmed: {e}")))?;

    if confirmation.is_nack() {
        return Err(AppError::Queue(format!(
            "Broker rejected message on {routing_key}"
        )));
    }
    Ok(())
}

/// JSON body of a voting-created message.
pub fn encode_voting_created(event: &VotingCreatedEvent) -> AppResult<Vec<u8>> {
    serde_json::to_vec(event)
        .map_err(|e| AppError::Internal(format!("Failed to serialize voting event: {e}")))
}

#[async_trait]
impl VotingEventPublisher for AmqpVotingPublisher {
    async fn publish_voting_created(&self, event: &VotingCreatedEvent) -> AppResult<()> {
        let payload = encode_voting_created(event)?;
        self.publish(&self.config.created_routing_key, &payload).await?;
        debug!(
            voting_id = %event.voting_id,
            participants = event.participants.len(),
            "Published voting created event"
        );
        Ok(())
    }
}
