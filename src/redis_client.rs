use redis::{aio::MultiplexedConnection, AsyncCommands, Client};

#[derive(Clone)]
pub struct RedisClient {
    pub conn: MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(RedisClient { conn })
    }

    /// PUBLISH в канал, возвращает число получателей.
    pub async fn publish(&self, channel: &str, message: &str) -> redis::RedisResult<i64> {
        let mut conn = self.conn.clone();
        conn.publish(channel, message).await
    }
}
