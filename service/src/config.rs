use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Credentials stay valid for 7 days after issuance unless overridden.
pub const DEFAULT_CREDENTIAL_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;

/// Upper bound accepted for `--credential-lifetime-secs` (10 years).
pub const MAX_CREDENTIAL_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

/// Where request authorization takes the caller's role from.
///
/// `Token` trusts the role snapshot embedded in the credential at issuance.
/// `Directory` re-resolves the role from the identity directory on every
/// authenticated call, so promotions and demotions apply immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleCheck {
    Token,
    Directory,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RoleCheckParseError;

impl FromStr for RoleCheck {
    type Err = RoleCheckParseError;
    fn from_str(value: &str) -> Result<RoleCheck, Self::Err> {
        match value.to_lowercase().as_str() {
            "token" => Ok(RoleCheck::Token),
            "directory" => Ok(RoleCheck::Directory),
            _ => Err(RoleCheckParseError),
        }
    }
}

impl fmt::Display for RoleCheck {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RoleCheck::Token => write!(f, "token"),
            RoleCheck::Directory => write!(f, "directory"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The secret used to sign and verify bearer credentials.
    #[arg(long, env)]
    jwt_secret: Option<String>,

    /// How long an issued credential stays valid, in seconds.
    #[arg(
        long,
        env,
        default_value_t = DEFAULT_CREDENTIAL_LIFETIME_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_CREDENTIAL_LIFETIME_SECS),
    )]
    pub credential_lifetime_secs: u64,

    /// Whether request authorization trusts the role inside the credential (token)
    /// or looks it up again in the identity directory (directory).
    #[arg(
        long,
        env,
        default_value_t = RoleCheck::Token,
        value_parser = clap::builder::PossibleValuesParser::new(["token", "directory", "TOKEN", "DIRECTORY"])
            .map(|s| s.parse::<RoleCheck>().unwrap()),
    )]
    pub role_check: RoleCheck,

    /// Upper bound in milliseconds for a single directory lookup made while
    /// broadcasting to a role.
    #[arg(long, env, default_value_t = 500)]
    pub directory_lookup_timeout_ms: u64,

    /// Number of outbound messages that may queue for one WebSocket connection
    /// before further sends to it fail.
    #[arg(long, env, default_value_t = 64)]
    pub connection_buffer_size: usize,

    /// Optional JSON file of users loaded into the identity directory at start-up.
    #[arg(long, env)]
    directory_seed_file: Option<PathBuf>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn set_jwt_secret(mut self, jwt_secret: String) -> Self {
        self.jwt_secret = Some(jwt_secret);
        self
    }

    pub fn jwt_secret(&self) -> Option<String> {
        self.jwt_secret.clone()
    }

    pub fn set_directory_seed_file(mut self, path: PathBuf) -> Self {
        self.directory_seed_file = Some(path);
        self
    }

    pub fn directory_seed_file(&self) -> Option<&PathBuf> {
        self.directory_seed_file.as_ref()
    }

    pub fn credential_lifetime(&self) -> Duration {
        Duration::from_secs(self.credential_lifetime_secs)
    }

    pub fn directory_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_lookup_timeout_ms)
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_development(&self) -> bool {
        self.runtime_env() == RustEnv::Development
    }
}
