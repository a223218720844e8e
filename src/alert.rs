//! Debounced limb-fault alerts.
//!
//! A fault must persist for the policy duration before an alert fires, and
//! alerts for the same limb are spaced by the policy cooldown. Time is the
//! session clock (elapsed since the first frame), not the frame count.

use crate::{
    config::AlertConfig,
    scorer::{Limb, LimbFaults},
    Result,
};
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io::Write, sync::Arc, time::Duration};

/// Debounce policy and delivery details for one limb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    /// Seconds a fault must persist before alerting
    pub duration_secs: f64,
    /// Minimum seconds between alerts for this limb
    pub cooldown_secs: f64,
    /// Device-messaging topic
    pub topic: String,
    /// Message carried by the alert
    pub message: String,
}

impl AlertPolicy {
    /// Default policy for a limb
    #[must_use]
    pub fn for_limb(limb: Limb) -> Self {
        let message = match limb {
            Limb::LeftArm => "Left arm form needs correction",
            Limb::RightArm => "Right arm form needs correction",
            Limb::LeftLeg => "Left leg form needs correction",
            Limb::RightLeg => "Right leg form needs correction",
        };
        Self {
            duration_secs: crate::constants::DEFAULT_ALERT_DURATION_SECS,
            cooldown_secs: crate::constants::DEFAULT_ALERT_COOLDOWN_SECS,
            topic: format!("form/{}", limb.id()),
            message: message.to_string(),
        }
    }
}

/// A fired alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Limb at fault
    pub limb: Limb,
    /// Fixed human-readable message
    pub message: String,
    /// Session time at which the alert fired
    pub timestamp: Duration,
}

#[derive(Debug, Default, Clone, Copy)]
struct LimbTimers {
    fault_started: Option<Duration>,
    last_alert: Option<Duration>,
}

/// Per-limb duration/cooldown debouncer
#[derive(Debug, Clone)]
pub struct AlertDebouncer {
    policies: HashMap<Limb, AlertPolicy>,
    timers: HashMap<Limb, LimbTimers>,
}

impl AlertDebouncer {
    /// Create a debouncer from the alert configuration
    #[must_use]
    pub fn new(config: &AlertConfig) -> Self {
        let policies = Limb::ALL.into_iter().map(|limb| (limb, config.policy(limb).clone())).collect();
        Self {
            policies,
            timers: HashMap::new(),
        }
    }

    /// Feed one limb's fault flag at session time `now`
    pub fn update(&mut self, limb: Limb, has_error: bool, now: Duration) -> Option<Alert> {
        let timers = self.timers.entry(limb).or_default();
        if !has_error {
            timers.fault_started = None;
            return None;
        }

        let started = *timers.fault_started.get_or_insert(now);
        let policy = self.policies.get(&limb)?;

        let persisted = now.saturating_sub(started).as_secs_f64() >= policy.duration_secs;
        let cooled = timers
            .last_alert
            .map_or(true, |last| now.saturating_sub(last).as_secs_f64() >= policy.cooldown_secs);
        if !(persisted && cooled) {
            return None;
        }

        timers.last_alert = Some(now);
        Some(Alert {
            limb,
            message: policy.message.clone(),
            timestamp: now,
        })
    }

    /// Feed all four limbs at once; returns alerts in limb order
    pub fn update_all(&mut self, faults: &LimbFaults, now: Duration) -> Vec<Alert> {
        Limb::ALL
            .into_iter()
            .filter_map(|limb| self.update(limb, faults.is_set(limb), now))
            .collect()
    }

    /// Topic for a limb
    #[must_use]
    pub fn topic(&self, limb: Limb) -> &str {
        self.policies.get(&limb).map_or("", |p| p.topic.as_str())
    }
}

/// Delivery channel for alerts
pub trait AlertNotifier: Send + Sync {
    /// Deliver one alert to `device_id` on `topic`
    fn notify(&self, device_id: &str, topic: &str, alert: &Alert) -> Result<()>;

    /// Notifier name
    fn name(&self) -> &str;
}

/// Logs alerts and never fails
pub struct LogNotifier;

impl AlertNotifier for LogNotifier {
    fn notify(&self, device_id: &str, topic: &str, alert: &Alert) -> Result<()> {
        info!(
            "ALERT [{}] {} -> {}: {} at {:.1}s",
            alert.limb,
            device_id,
            topic,
            alert.message,
            alert.timestamp.as_secs_f64()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "LogNotifier"
    }
}

/// Drops alerts
pub struct NullNotifier;

impl AlertNotifier for NullNotifier {
    fn notify(&self, _device_id: &str, _topic: &str, _alert: &Alert) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "NullNotifier"
    }
}

#[derive(Serialize)]
struct AlertRecord<'a> {
    device_id: &'a str,
    topic: &'a str,
    limb: Limb,
    message: &'a str,
    timestamp_ms: u64,
}

/// Writes one JSON object per alert to a writer
pub struct JsonLinesNotifier<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesNotifier<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> AlertNotifier for JsonLinesNotifier<W> {
    fn notify(&self, device_id: &str, topic: &str, alert: &Alert) -> Result<()> {
        let record = AlertRecord {
            device_id,
            topic,
            limb: alert.limb,
            message: &alert.message,
            timestamp_ms: u64::try_from(alert.timestamp.as_millis()).unwrap_or(u64::MAX),
        };
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, &record)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "JsonLinesNotifier"
    }
}

/// Delivers alerts without letting failures escape
pub struct AlertDispatcher {
    device_id: String,
    notifier: Arc<dyn AlertNotifier>,
}

impl AlertDispatcher {
    /// Create a dispatcher for a device
    pub fn new(device_id: impl Into<String>, notifier: Arc<dyn AlertNotifier>) -> Self {
        Self {
            device_id: device_id.into(),
            notifier,
        }
    }

    /// Deliver an alert; returns whether delivery succeeded
    pub fn dispatch(&self, topic: &str, alert: &Alert) -> bool {
        match self.notifier.notify(&self.device_id, topic, alert) {
            Ok(()) => true,
            Err(e) => {
                warn!("{} failed to deliver {} alert: {}", self.notifier.name(), alert.limb, e);
                false
            }
        }
    }
}
