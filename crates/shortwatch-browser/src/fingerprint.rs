use rand::Rng;

/// Common desktop Chrome user agents
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Request identity shared by browser sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl FingerprintConfig {
    /// Fixed identity, typically the configured HTTP user agent so browser
    /// and plain HTTP requests look alike
    pub fn new(user_agent: impl Into<String>, viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            user_agent: user_agent.into(),
            accept_language: "en-GB,en;q=0.9".to_string(),
            viewport_width,
            viewport_height,
        }
    }

    /// Pick one of the common desktop user agents at random
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();
        let ua_idx = rng.gen_range(0..USER_AGENTS.len());
        Self::new(USER_AGENTS[ua_idx], 1920, 1080)
    }
}
