use anyhow::{
    Context,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
    time::Duration,
};

pub const PROFILES_ROOT: &str = "~/.activity-center/profiles";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub action_timeout_ms: u64,
    pub refresh_after_success: bool,
    pub gacha_reveal_delay_ms: u64,
    /// Percentage of the foil that must be scratched off before the card is
    /// revealed.
    pub scratch_reveal_threshold: f64,
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer_token: None,
            action_timeout_ms: 10_000,
            refresh_after_success: true,
            gacha_reveal_delay_ms: 2_000,
            scratch_reveal_threshold: 40.0,
            poll_interval_ms: 500,
        }
    }
}

impl ClientConfig {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn gacha_reveal_delay(&self) -> Duration {
        Duration::from_millis(self.gacha_reveal_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProfileEnv {
    #[default]
    Local,
    Dev,
    Test,
}

impl ProfileEnv {
    pub fn file_name(self) -> &'static str {
        match self {
            ProfileEnv::Local => "local.json",
            ProfileEnv::Dev => "dev.json",
            ProfileEnv::Test => "test.json",
        }
    }
}

impl fmt::Display for ProfileEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfileEnv::Local => "local",
            ProfileEnv::Dev => "dev",
            ProfileEnv::Test => "test",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ProfileEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ProfileEnv::Local),
            "dev" => Ok(ProfileEnv::Dev),
            "test" => Ok(ProfileEnv::Test),
            other => Err(format!("unknown profile `{other}` (expected local, dev or test)")),
        }
    }
}

/// One JSON [`ClientConfig`] per environment.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(env: ProfileEnv) -> Self {
        let root = shellexpand::tilde(PROFILES_ROOT);
        Self::in_dir(Path::new(root.as_ref()), env)
    }

    pub fn in_dir(root: impl AsRef<Path>, env: ProfileEnv) -> Self {
        Self {
            path: root.as_ref().join(env.file_name()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no profile was saved yet.
    pub fn load(&self) -> Result<Option<ClientConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path)
            .with_context(|| format!("Failed to read profile {}", self.path.display()))?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let config = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse profile {}", self.path.display()))?;
        Ok(Some(config))
    }

    pub fn load_or_default(&self) -> Result<ClientConfig> {
        Ok(self.load()?.unwrap_or_default())
    }

    pub fn save(&self, config: &ClientConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create profile directory {}", parent.display())
            })?;
        }
        let json =
            serde_json::to_vec_pretty(config).context("Failed to serialize profile")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write profile {}", self.path.display()))?;
        Ok(())
    }
}
