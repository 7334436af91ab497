//! Typed collector configuration.
//!
//! A host agent hands configuration over as a flat list of [`ConfigEntry`]
//! nodes (`Host "10.0.0.10"`, `Port 3306`, ...). [`Config::apply`] folds them
//! into a [`Config`]; the rest of the crate only ever sees the typed struct.
//!
//! [`parse_module_block`] reads the collectd `<Module>` body syntax so the
//! daemon can load the same configuration a collectd plugin block would carry.

use std::fmt;
use std::path::Path;

use tracing::debug;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3306;
const DEFAULT_USER: &str = "root";

/// Error type for configuration handling.
#[derive(Debug)]
pub enum ConfigError {
    /// No configuration entries were supplied.
    Empty,
    /// A recognized key carried a missing or malformed value.
    InvalidValue { key: String, message: String },
    /// Module block text could not be parsed.
    Parse { line: usize, message: String },
    /// Configuration file could not be read.
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Empty => write!(f, "module configuration missing"),
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid value for {}: {}", key, message)
            }
            ConfigError::Parse { line, message } => {
                write!(f, "config parse error at line {}: {}", line, message)
            }
            ConfigError::Io(msg) => write!(f, "config read error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A single configuration node: a key and its values in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub values: Vec<String>,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: vec![value.into()],
        }
    }
}

/// How the collector reaches the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Unix domain socket path.
    Socket(String),
    /// TCP host and port.
    Tcp { host: String, port: u16 },
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::Socket(path) => write!(f, "unix:{}", path),
            ConnectTarget::Tcp { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

/// Collector configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Non-empty selects socket-based connection over TCP.
    pub socket: String,
    /// Enables per-value debug logging.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            socket: String::new(),
            verbose: false,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("socket", &self.socket)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl Config {
    /// Applies configuration entries on top of the current values.
    ///
    /// Unknown keys are ignored. Every recognized key is applied even when an
    /// earlier one was invalid; the first error is returned.
    pub fn apply(&mut self, entries: &[ConfigEntry]) -> Result<(), ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut first_error = None;
        for entry in entries {
            if let Err(e) = self.apply_entry(entry) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn apply_entry(&mut self, entry: &ConfigEntry) -> Result<(), ConfigError> {
        let key = entry.key.as_str();
        let value = entry.values.first();

        match key {
            "Host" => self.host = required(key, value)?.clone(),
            "Port" => self.port = parse_port(required(key, value)?)?,
            "User" => self.user = required(key, value)?.clone(),
            "Password" => {
                self.password = required(key, value)?.clone();
                debug!(key, "config key set");
                return Ok(());
            }
            "Socket" => self.socket = required(key, value)?.clone(),
            "Verbose" => self.verbose = parse_bool(key, required(key, value)?)?,
            _ => {
                debug!(key, "ignoring unknown config key");
                return Ok(());
            }
        }

        debug!(key, value = ?value, "config key set");
        Ok(())
    }

    /// Returns the connection strategy. A configured socket takes precedence.
    pub fn connect_target(&self) -> ConnectTarget {
        if self.socket.is_empty() {
            ConnectTarget::Tcp {
                host: self.host.clone(),
                port: self.port,
            }
        } else {
            ConnectTarget::Socket(self.socket.clone())
        }
    }

    /// Checks that some connection strategy can be selected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.socket.is_empty() {
            return Ok(());
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "Host".to_string(),
                message: "neither Host nor Socket is set".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "Port".to_string(),
                message: "port 0 is not connectable".to_string(),
            });
        }
        Ok(())
    }
}

fn required<'a>(key: &str, value: Option<&'a String>) -> Result<&'a String, ConfigError> {
    value.ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        message: "no value given".to_string(),
    })
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| ConfigError::InvalidValue {
            key: "Port".to_string(),
            message: format!("'{}': {}", value, e),
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}' is not a boolean", value),
        }),
    }
}

/// Parses the body of a collectd `<Module>` block.
///
/// Each non-empty line is `Key value...` where values are bare words or
/// double-quoted strings (`\"` and `\\` escapes). `#` starts a comment outside
/// quotes. Enclosing `<Module ...>` / `</Module>` tag lines are skipped.
pub fn parse_module_block(text: &str) -> Result<Vec<ConfigEntry>, ConfigError> {
    let mut entries = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('<') {
            continue;
        }

        let tokens = tokenize(line).map_err(|message| ConfigError::Parse {
            line: line_no,
            message,
        })?;
        let mut tokens = tokens.into_iter();
        let Some(key) = tokens.next() else {
            continue;
        };
        entries.push(ConfigEntry {
            key,
            values: tokens.collect(),
        });
    }

    Ok(entries)
}

/// Reads and parses a module block file.
pub fn load_module_file(path: &Path) -> Result<Vec<ConfigEntry>, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    parse_module_block(&text)
}

fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '#' {
            break;
        } else if c == '"' {
            chars.next();
            let mut token = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some(escaped) => token.push(escaped),
                        None => return Err("dangling escape".to_string()),
                    },
                    _ => token.push(c),
                }
            }
            if !closed {
                return Err("unterminated quoted string".to_string());
            }
            tokens.push(token);
        } else {
            let mut token = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '#' {
                    break;
                }
                if c == '"' {
                    return Err(format!("unexpected quote after '{}'", token));
                }
                token.push(c);
                chars.next();
            }
            tokens.push(token);
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3306);
        assert_eq!(config.user, "root");
        assert!(config.password.is_empty());
        assert!(config.socket.is_empty());
        assert!(!config.verbose);
    }

    #[test]
    fn apply_sets_known_keys_and_ignores_unknown() {
        let mut config = Config::default();
        config
            .apply(&[
                ConfigEntry::new("Host", "10.0.0.10"),
                ConfigEntry::new("Port", "3307"),
                ConfigEntry::new("Bogus", "x"),
                ConfigEntry::new("Verbose", "true"),
            ])
            .unwrap();

        assert_eq!(config.host, "10.0.0.10");
        assert_eq!(config.port, 3307);
        assert!(config.verbose);
        assert_eq!(config.user, "root");
    }

    #[test]
    fn apply_empty_is_an_error_and_keeps_defaults() {
        let mut config = Config::default();
        assert!(matches!(config.apply(&[]), Err(ConfigError::Empty)));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn apply_continues_past_invalid_value() {
        let mut config = Config::default();
        let err = config
            .apply(&[
                ConfigEntry::new("Port", "not-a-port"),
                ConfigEntry::new("User", "monitor"),
            ])
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "Port"));
        assert_eq!(config.port, 3306);
        assert_eq!(config.user, "monitor");
    }

    #[test]
    fn apply_rejects_key_without_value() {
        let mut config = Config::default();
        let entry = ConfigEntry {
            key: "Host".to_string(),
            values: Vec::new(),
        };
        assert!(config.apply(&[entry]).is_err());
    }

    #[test]
    fn socket_takes_precedence_over_tcp() {
        let mut config = Config::default();
        assert_eq!(
            config.connect_target(),
            ConnectTarget::Tcp {
                host: "127.0.0.1".to_string(),
                port: 3306
            }
        );

        config.socket = "/tmp/mysql.sock".to_string();
        assert_eq!(
            config.connect_target(),
            ConnectTarget::Socket("/tmp/mysql.sock".to_string())
        );
    }

    #[test]
    fn validate_requires_a_strategy() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.host = String::new();
        assert!(config.validate().is_err());

        config.socket = "/tmp/mysql.sock".to_string();
        assert!(config.validate().is_ok());

        config.socket.clear();
        config.host = "db".to_string();
        config.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let config = Config {
            password: "mysecretpassword".to_string(),
            ..Config::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("mysecretpassword"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn parse_module_block_reads_collectd_syntax() {
        let text = r#"
            <Module "mysql_innodb_io">
                Host "10.0.0.10"
                User "root"
                Password "my \"secret\""   # inline comment
                Socket "/tmp/mysql.sock"
                Port 3306
                Verbose true
            </Module>
        "#;

        let entries = parse_module_block(text).unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0], ConfigEntry::new("Host", "10.0.0.10"));
        assert_eq!(entries[2], ConfigEntry::new("Password", "my \"secret\""));
        assert_eq!(entries[4], ConfigEntry::new("Port", "3306"));

        let mut config = Config::default();
        config.apply(&entries).unwrap();
        assert_eq!(
            config.connect_target(),
            ConnectTarget::Socket("/tmp/mysql.sock".to_string())
        );
        assert!(config.verbose);
    }

    #[test]
    fn parse_module_block_reports_unterminated_quote() {
        let err = parse_module_block("Host \"oops\nUser root").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 1, .. }));
    }

    #[test]
    fn load_module_file_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "User \"monitor\"").unwrap();
        writeln!(file, "Port 3310").unwrap();

        let entries = load_module_file(file.path()).unwrap();
        let mut config = Config::default();
        config.apply(&entries).unwrap();
        assert_eq!(config.user, "monitor");
        assert_eq!(config.port, 3310);
    }

    #[test]
    fn load_module_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_module_file(&dir.path().join("absent.conf")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
