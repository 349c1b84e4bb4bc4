use crate::error::ClientError;
use rand::Rng;
use rand::seq::SliceRandom;
use std::time::Duration;

/// Random courtesy pause taken before every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    pub fn new(min_secs: f64, max_secs: f64) -> Result<Self, ClientError> {
        let min = seconds(min_secs)?;
        let max = seconds(max_secs)?;
        if min > max {
            return Err(ClientError::InvalidPacing(format!(
                "min delay {}s exceeds max delay {}s",
                min_secs, max_secs
            )));
        }
        Ok(Self { min, max })
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn next_delay(&self) -> Duration {
        if self.max.is_zero() {
            return Duration::ZERO;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn seconds(value: f64) -> Result<Duration, ClientError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| ClientError::InvalidPacing(format!("{} is not a valid delay", value)))
}

/// Pick a User-Agent from the pool, falling back to the crate's own.
pub fn pick_user_agent(pool: &[String]) -> String {
    pool.choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| crate::config::CRATE_USER_AGENT.to_string())
}
