use serde::Serialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Timeout applied to health probes regardless of the integration timeout
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_BURST_LIMIT: u32 = 10;
const DEFAULT_HOURLY_LIMIT: u32 = 100;
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);
const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Freshness class of a response, used to pick a cache TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClass {
    Live,
    Fixtures,
    Events,
    Standings,
    Teams,
    Players,
    Leagues,
}

#[derive(Debug, Clone)]
pub struct HealthProbe {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
}

/// Static description of one third-party integration
#[derive(Debug, Clone)]
pub struct IntegrationDescriptor {
    pub name: String,
    pub base_url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub burst_limit: u32,
    pub hourly_limit: u32,
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub ttls: HashMap<DataClass, Duration>,
    pub default_ttl: Duration,
    pub cache_capacity: NonZeroUsize,
    pub health_probe: Option<HealthProbe>,
}

impl IntegrationDescriptor {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            burst_limit: DEFAULT_BURST_LIMIT,
            hourly_limit: DEFAULT_HOURLY_LIMIT,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
            ttls: HashMap::new(),
            default_ttl: DEFAULT_TTL,
            cache_capacity: NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            health_probe: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_limits(mut self, burst_limit: u32, hourly_limit: u32) -> Self {
        self.burst_limit = burst_limit;
        self.hourly_limit = hourly_limit;
        self
    }

    pub fn with_circuit(mut self, failure_threshold: u32, cooldown: Duration) -> Self {
        self.failure_threshold = failure_threshold;
        self.cooldown = cooldown;
        self
    }

    pub fn with_ttl(mut self, class: DataClass, ttl: Duration) -> Self {
        self.ttls.insert(class, ttl);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_health_probe<K, V>(
        mut self,
        endpoint: impl Into<String>,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.health_probe = Some(HealthProbe {
            endpoint: endpoint.into(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
        self
    }

    pub fn ttl_for(&self, class: DataClass) -> Duration {
        self.ttls.get(&class).copied().unwrap_or(self.default_ttl)
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}
