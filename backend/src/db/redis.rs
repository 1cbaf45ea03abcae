use crate::config::Config;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use std::time::Duration;

pub type RedisPool = Pool<RedisConnectionManager>;

/// Builds the shared Redis pool, or `None` when no `REDIS_URL` is configured.
///
/// Connections are opened lazily; an unreachable server surfaces on the first
/// checkout, bounded by `redis_connect_timeout`.
pub async fn create_redis_pool(config: &Config) -> anyhow::Result<Option<RedisPool>> {
    let Some(url) = &config.redis_url else {
        tracing::info!("Redis URL not set, remote activity tracking disabled");
        return Ok(None);
    };

    let manager = RedisConnectionManager::new(url.clone())?;
    let pool = Pool::builder()
        .max_size(config.redis_pool_size.max(1))
        .connection_timeout(Duration::from_secs(config.redis_connect_timeout.max(1)))
        .build(manager)
        .await?;

    tracing::info!(
        pool_size = config.redis_pool_size,
        connect_timeout_secs = config.redis_connect_timeout,
        "Redis connection pool created"
    );
    Ok(Some(pool))
}
