//! Service configuration.
//!
//! Read from an optional TOML file, then overridden by `RECS_`-prefixed
//! environment variables using `__` between nested keys, for example
//! `RECS_CACHE__TTL_SECS=60` or `RECS_POLICY__ON_WRITE_ERROR=skip`.

use std::{path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment, File};
use recs_engine::{
  CacheWritePolicy, DeletePolicy, DispatchPolicy, DispatcherConfig, OnError, RepositoryConfig,
  Topics,
};
use serde::Deserialize;

const ENV_PREFIX: &str = "RECS";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  pub host: String,
  pub port: u16,
}

impl Default for HttpConfig {
  fn default() -> Self { Self { host: "0.0.0.0".to_owned(), port: 8080 } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// SQLite database file; a leading `~/` is expanded.
  pub path: PathBuf,
}

impl Default for StoreConfig {
  fn default() -> Self { Self { path: PathBuf::from("recs.sqlite") } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
  Memory,
  Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub backend:     CacheBackend,
  pub url:         String,
  pub ttl_secs:    u64,
  /// Capacity of the in-memory backend.
  pub max_entries: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend:     CacheBackend::Redis,
      url:         DEFAULT_REDIS_URL.to_owned(),
      ttl_secs:    3600,
      max_entries: 10_000,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
  pub url:            String,
  pub user_topic:     String,
  pub product_topic:  String,
  /// Consumer group shared by every replica.
  pub group:          String,
  /// This replica's name in the group. Keep it stable across restarts so
  /// unacknowledged entries are redelivered to it.
  pub consumer:       String,
  pub queue_capacity: usize,
}

impl Default for BusConfig {
  fn default() -> Self {
    let topics = Topics::default();
    Self {
      url:            DEFAULT_REDIS_URL.to_owned(),
      user_topic:     topics.user_updates,
      product_topic:  topics.product_updates,
      group:          "recs".to_owned(),
      consumer:       "recs-1".to_owned(),
      queue_capacity: recs_engine::dispatcher::DEFAULT_QUEUE_CAPACITY,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
  pub on_decode_error:  OnError,
  pub on_write_error:   OnError,
  pub cache_write:      CacheWritePolicy,
  pub product_delete:   DeletePolicy,
  pub restart_delay_ms: u64,
}

impl Default for PolicyConfig {
  fn default() -> Self {
    let dispatch = DispatchPolicy::default();
    Self {
      on_decode_error:  dispatch.on_decode_error,
      on_write_error:   dispatch.on_write_error,
      cache_write:      CacheWritePolicy::default(),
      product_delete:   DeletePolicy::default(),
      restart_delay_ms: 1000,
    }
  }
}

impl PolicyConfig {
  pub fn restart_delay(&self) -> Duration { Duration::from_millis(self.restart_delay_ms) }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
  #[default]
  Text,
  Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  pub format: LogFormat,
}

// ─── Root ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
  pub http:   HttpConfig,
  pub store:  StoreConfig,
  pub cache:  CacheConfig,
  pub bus:    BusConfig,
  pub policy: PolicyConfig,
  pub log:    LogConfig,
}

impl ServiceConfig {
  /// Load `path` (if it exists) layered under the process environment.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
    Self::load_with(path, environment())
  }

  fn load_with(path: impl Into<PathBuf>, env: Environment) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(File::from(path.into()).required(false))
      .add_source(env)
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.http.host, self.http.port) }

  pub fn repository_config(&self) -> RepositoryConfig {
    RepositoryConfig {
      cache_ttl:      Duration::from_secs(self.cache.ttl_secs),
      cache_write:    self.policy.cache_write,
      product_delete: self.policy.product_delete,
    }
  }

  pub fn dispatcher_config(&self) -> DispatcherConfig {
    DispatcherConfig {
      topics:         Topics {
        user_updates:    self.bus.user_topic.clone(),
        product_updates: self.bus.product_topic.clone(),
      },
      queue_capacity: self.bus.queue_capacity,
      policy:         DispatchPolicy {
        on_decode_error: self.policy.on_decode_error,
        on_write_error:  self.policy.on_write_error,
      },
    }
  }
}

fn environment() -> Environment {
  Environment::with_prefix(ENV_PREFIX)
    .prefix_separator("_")
    .separator("__")
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  fn temp_file(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("recs-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
  }

  fn no_env() -> Environment { environment().source(Some(HashMap::new())) }

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServiceConfig::load_with("/nonexistent/recs.toml", no_env()).unwrap();

    assert_eq!(cfg.address(), "0.0.0.0:8080");
    assert_eq!(cfg.cache.ttl_secs, 3600);
    assert_eq!(cfg.log.format, LogFormat::Text);
    assert_eq!(cfg.bus.group, "recs");
    assert_eq!(cfg.bus.consumer, "recs-1");

    let dispatcher = cfg.dispatcher_config();
    assert_eq!(dispatcher.topics, Topics::default());
    assert_eq!(dispatcher.queue_capacity, 10);
    assert_eq!(dispatcher.policy, DispatchPolicy::default());

    let repo = cfg.repository_config();
    assert_eq!(repo.cache_ttl, Duration::from_secs(3600));
    assert_eq!(repo.cache_write, CacheWritePolicy::BestEffort);
    assert_eq!(repo.product_delete, DeletePolicy::Tombstone);
    assert_eq!(cfg.policy.restart_delay(), Duration::from_secs(1));
  }

  #[test]
  fn file_values_override_defaults() {
    let path = temp_file(
      "override.toml",
      r#"
[http]
port = 9000

[cache]
backend = "memory"
max_entries = 50

[bus]
user_topic = "users.v2"
consumer = "recs-eu-2"

[policy]
on_decode_error = "halt"
cache_write = "propagate"
product_delete = "clear"

[log]
format = "json"
"#,
    );
    let cfg = ServiceConfig::load_with(&path, no_env()).unwrap();

    assert_eq!(cfg.http.port, 9000);
    assert_eq!(cfg.http.host, "0.0.0.0");
    assert_eq!(cfg.cache.backend, CacheBackend::Memory);
    assert_eq!(cfg.cache.max_entries, 50);
    assert_eq!(cfg.bus.user_topic, "users.v2");
    assert_eq!(cfg.bus.product_topic, "product_updates");
    assert_eq!(cfg.bus.group, "recs");
    assert_eq!(cfg.bus.consumer, "recs-eu-2");
    assert_eq!(cfg.policy.on_decode_error, OnError::Halt);
    assert_eq!(cfg.policy.on_write_error, OnError::Halt);
    assert_eq!(cfg.policy.cache_write, CacheWritePolicy::Propagate);
    assert_eq!(cfg.policy.product_delete, DeletePolicy::Clear);
    assert_eq!(cfg.log.format, LogFormat::Json);
  }

  #[test]
  fn environment_overrides_file() {
    let path = temp_file("env.toml", "[cache]\nttl_secs = 120\n");
    let env = environment().source(Some(HashMap::from([
      ("RECS_CACHE__TTL_SECS".to_owned(), "60".to_owned()),
      ("RECS_POLICY__ON_WRITE_ERROR".to_owned(), "skip".to_owned()),
    ])));
    let cfg = ServiceConfig::load_with(&path, env).unwrap();

    assert_eq!(cfg.cache.ttl_secs, 60);
    assert_eq!(cfg.policy.on_write_error, OnError::Skip);
  }

  #[test]
  fn unknown_policy_is_rejected() {
    let path = temp_file("bad.toml", "[policy]\non_write_error = \"retry\"\n");
    assert!(ServiceConfig::load_with(&path, no_env()).is_err());
  }
}
