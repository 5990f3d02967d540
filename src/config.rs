use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "linkshelf")]
#[command(about = "Saves bookmarks and follows the live bookmark feed", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config", global = true)]
    pub config_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a single bookmark
    Submit {
        #[arg(long)]
        title: String,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long)]
        private: bool,
    },
    /// Follow the bookmark feed (or a tag feed) and print events as they arrive
    Watch {
        #[arg(long)]
        tag: Option<String>,
    },
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".linkshelf")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for Server {
    fn default() -> Self {
        Server {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:4000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Submit {
    #[serde(default = "default_bookmarks_path")]
    pub path: String,
    #[serde(default = "default_dismiss_delay_ms")]
    pub dismiss_delay_ms: u64,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for Submit {
    fn default() -> Self {
        Submit {
            path: default_bookmarks_path(),
            dismiss_delay_ms: default_dismiss_delay_ms(),
            timeout_seconds: None,
        }
    }
}

impl Submit {
    pub fn dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.dismiss_delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

fn default_bookmarks_path() -> String {
    "/api/bookmarks".to_string()
}

fn default_dismiss_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct Feed {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
}

impl Default for Feed {
    fn default() -> Self {
        Feed {
            socket_path: default_socket_path(),
            topic: default_topic(),
            heartbeat_interval_seconds: default_heartbeat_interval(),
            reconnect_delay_seconds: default_reconnect_delay(),
        }
    }
}

impl Feed {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }
}

fn default_socket_path() -> String {
    "/socket".to_string()
}

fn default_topic() -> String {
    "bookmark:feed".to_string()
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_reconnect_delay() -> u64 {
    5
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub submit: Submit,
    #[serde(default)]
    pub feed: Feed,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    /// Loads `path` when given. Without an explicit path the default location
    /// is tried and built-in defaults are used if nothing is there.
    pub fn resolve(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Config::new(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    let path = path.to_str().context("config path is not valid utf-8")?;
                    Config::new(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        Config::from_yaml(&yaml_str)
    }

    pub fn bookmarks_endpoint(&self) -> String {
        format!("{}{}", self.server.base_url.trim_end_matches('/'), self.submit.path)
    }

    /// The socket endpoint with the http scheme swapped for its websocket
    /// counterpart.
    pub fn socket_endpoint(&self) -> String {
        let base = self.server.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}{}", base, self.feed.socket_path)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!("environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}
