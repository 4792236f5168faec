//! Redis Cache Integration Tests
//!
//! Tests the Redis backend against a real server.
//! Requires Redis on localhost:6379 or `REDIS_URL`; tests are skipped otherwise.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use advanced_cache::cache::{ServerCapability, ServerCommands};
use advanced_cache::{
    BlockingCache, CacheError, DistributedCache, EntryOptions, RedisCache, RedisCacheOptions,
};
use tokio_util::sync::CancellationToken;

/// Get Redis URL from environment or default to localhost
fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Check if Redis is available
async fn is_redis_available() -> bool {
    let Ok(client) = redis::Client::open(get_redis_url()) else {
        return false;
    };
    let ping = async {
        let mut conn = client.get_multiplexed_async_connection().await.ok()?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .ok()
    };
    matches!(
        tokio::time::timeout(Duration::from_secs(2), ping).await,
        Ok(Some(_))
    )
}

/// Helper to skip test if Redis is not available
macro_rules! skip_if_no_redis {
    () => {
        if !is_redis_available().await {
            eprintln!("Skipping test: Redis not available at {}", get_redis_url());
            return;
        }
    };
}

/// Unique instance prefix so concurrent tests never share keys.
fn unique_instance(test: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("it:{}:{}:", test, nanos)
}

fn redis_cache(test: &str, commands: ServerCommands) -> RedisCache {
    let options = RedisCacheOptions::from_url(get_redis_url())
        .with_instance_name(unique_instance(test))
        .with_server_commands(commands);
    RedisCache::new(options).unwrap()
}

async fn raw_pttl(physical_key: &str) -> i64 {
    let client = redis::Client::open(get_redis_url()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    redis::cmd("PTTL")
        .arg(physical_key)
        .query_async::<i64>(&mut conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_redis_set_and_get_roundtrip() {
    skip_if_no_redis!();
    let cache = redis_cache("roundtrip", ServerCommands::Six);

    assert!(!cache.is_connected());
    cache
        .set("greeting", &[0, 159, 146, 150], &EntryOptions::new())
        .await
        .unwrap();
    assert!(cache.is_connected());

    let value = cache.get("greeting").await.unwrap();
    assert_eq!(value, Some(vec![0, 159, 146, 150]));
    assert_eq!(cache.get("missing").await.unwrap(), None);

    cache.remove("greeting").await.unwrap();
    assert_eq!(cache.get("greeting").await.unwrap(), None);
}

#[tokio::test]
async fn test_redis_absolute_expiration() {
    skip_if_no_redis!();
    let cache = redis_cache("absolute", ServerCommands::Six);
    let options = EntryOptions::new().with_absolute_expiration_relative_to_now(Duration::from_secs(1));

    cache.set("short", b"v", &options).await.unwrap();
    assert!(cache.get("short").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cache.get("short").await.unwrap(), None);
}

#[tokio::test]
async fn test_redis_sliding_refresh_rearms_ttl() {
    skip_if_no_redis!();
    let cache = redis_cache("sliding", ServerCommands::Six);
    let options = EntryOptions::new().with_sliding_expiration(Duration::from_secs(5));

    cache.set("session", b"v", &options).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let physical = format!("{}session", cache.instance_name());
    assert!(raw_pttl(&physical).await < 4_000);

    cache.refresh("session").await.unwrap();
    assert!(raw_pttl(&physical).await > 4_000);
}

#[tokio::test]
async fn test_redis_sliding_window_capped_by_absolute() {
    skip_if_no_redis!();
    let cache = redis_cache("capped", ServerCommands::Six);
    let options = EntryOptions::new()
        .with_absolute_expiration_relative_to_now(Duration::from_secs(10))
        .with_sliding_expiration(Duration::from_secs(3));

    cache.set("capped", b"v", &options).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cache.get("capped").await.unwrap(), Some(b"v".to_vec()));

    // The read re-arms the full sliding window, still below the absolute deadline
    let physical = format!("{}capped", cache.instance_name());
    let pttl = raw_pttl(&physical).await;
    assert!(pttl <= 3_000, "pttl {} exceeds the sliding window", pttl);
    assert!(pttl > 2_000, "pttl {} was not re-armed", pttl);
}

#[tokio::test]
async fn test_redis_lock_is_exclusive_until_ttl() {
    skip_if_no_redis!();
    let cache = redis_cache("lock", ServerCommands::Six);

    assert!(cache
        .try_acquire_lock("job", Duration::from_millis(500), None)
        .await
        .unwrap());
    assert!(!cache
        .try_acquire_lock("job", Duration::from_millis(500), Some("other"))
        .await
        .unwrap());

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(cache
        .try_acquire_lock("job", Duration::from_millis(500), Some("other"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_redis_remove_pattern() {
    skip_if_no_redis!();
    let cache = redis_cache("pattern", ServerCommands::Six);
    for key in ["user:1", "user:2", "order:1"] {
        cache.set(key, b"v", &EntryOptions::new()).await.unwrap();
    }

    let mut keys = cache.find_keys("user:*").await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["user:1".to_string(), "user:2".to_string()]);

    assert_eq!(cache.remove_pattern("user:*").await.unwrap(), 2);
    assert_eq!(cache.find_keys("*").await.unwrap(), vec!["order:1".to_string()]);
}

#[tokio::test]
async fn test_redis_hash_operations() {
    skip_if_no_redis!();
    let cache = redis_cache("hash", ServerCommands::Six);

    assert!(cache.hash_set("profile", "name", "ada", None).await.unwrap());
    assert!(!cache.hash_set("profile", "name", "grace", None).await.unwrap());
    assert_eq!(
        cache.hash_get("profile", "name").await.unwrap(),
        Some("grace".to_string())
    );

    // A new field arms the default one hour bucket lifetime
    let physical = format!("{}profile", cache.instance_name());
    assert!(raw_pttl(&physical).await > 3_500_000);

    assert_eq!(cache.hash_increment("profile", "visits", 5, None).await.unwrap(), 5);
    assert_eq!(cache.hash_decrement("profile", "visits", 5, None).await.unwrap(), 0);

    let all = cache.hash_get_all("profile").await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["name"], "grace");

    assert!(cache.hash_field_exists("profile", "name").await.unwrap());
    assert!(cache.hash_remove("profile", "name").await.unwrap());
    assert!(!cache.hash_field_exists("profile", "name").await.unwrap());

    assert!(cache.key_expire("profile", Duration::from_secs(30)).await.unwrap());
    assert!(!cache.key_expire("absent", Duration::from_secs(30)).await.unwrap());
}

#[tokio::test]
async fn test_redis_field_ttl_gated_on_declared_capability() {
    skip_if_no_redis!();
    let cache = redis_cache("gate", ServerCommands::Six);

    let result = cache
        .hash_fields_expire("bucket", &["f".to_string()], Duration::from_secs(10))
        .await;
    assert!(matches!(result, Err(CacheError::NotSupported(_))));
    assert!(!cache.is_connected());
}

#[tokio::test]
async fn test_redis_field_ttl_auto_detected() {
    skip_if_no_redis!();
    let cache = redis_cache("auto", ServerCommands::Auto);

    let capability = cache.connect(&CancellationToken::new()).await.unwrap();
    cache.hash_set("bucket", "f", "1", None).await.unwrap();

    let result = cache
        .hash_fields_expire("bucket", &["f".to_string()], Duration::from_secs(10))
        .await;
    match capability {
        ServerCapability::FieldExpiration => assert!(result.unwrap()),
        ServerCapability::Standard => {
            assert!(matches!(result, Err(CacheError::NotSupported(_))))
        }
    }
}

#[tokio::test]
async fn test_redis_close_reconnects_lazily() {
    skip_if_no_redis!();
    let cache = redis_cache("close", ServerCommands::Six);

    cache.set("k", b"v", &EntryOptions::new()).await.unwrap();
    cache.close();
    assert!(!cache.is_connected());

    assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    assert!(cache.is_connected());
}

#[test]
fn test_blocking_and_async_paths_agree() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    if !runtime.block_on(is_redis_available()) {
        eprintln!("Skipping test: Redis not available at {}", get_redis_url());
        return;
    }

    let cache = Arc::new(redis_cache("blocking", ServerCommands::Six));
    let blocking = BlockingCache::new(cache.clone()).unwrap();
    let options = EntryOptions::new().with_sliding_expiration(Duration::from_secs(60));

    blocking.set("shared", b"payload", &options).unwrap();
    let from_async = runtime.block_on(cache.get("shared")).unwrap();
    let from_blocking = blocking.get("shared").unwrap();

    assert_eq!(from_async, Some(b"payload".to_vec()));
    assert_eq!(from_async, from_blocking);

    assert_eq!(blocking.hash_increment("counters", "n", 3, None).unwrap(), 3);
    assert_eq!(
        runtime
            .block_on(cache.hash_increment("counters", "n", 3, None))
            .unwrap(),
        6
    );
}
