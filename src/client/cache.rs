use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::db::{Activity, ActivityKind};
use crate::sync::{Action, Envelope};

/// Per-device view of the family's activity log. `order` is the display
/// order (newest first as delivered); `by_id` is the reconcile index, holding
/// at most one entry per activity id.
#[derive(Debug)]
pub struct ActivityCache {
    device_id: Uuid,
    order: Vec<Uuid>,
    by_id: HashMap<Uuid, Activity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStats {
    pub feeding_count: u32,
    pub sleep_hours: f64,
    pub diaper_count: u32,
}

impl ActivityCache {
    pub fn new(device_id: Uuid) -> Self {
        Self {
            device_id,
            order: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn device_id(&self) -> Uuid {
        self.device_id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Activity> {
        self.by_id.get(&id)
    }

    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Reconciles one inbound frame. Frames this device itself sent are
    /// discarded. Returns true if the cache changed.
    pub fn apply(&mut self, envelope: &Envelope) -> bool {
        match envelope {
            Envelope::Activity { sender_id, .. } if *sender_id == Some(self.device_id) => false,
            Envelope::Sync { data } => {
                self.replace_all(data);
                true
            }
            Envelope::Activity { action, data, .. } => self.apply_action(*action, data.clone()),
            Envelope::Unknown => false,
        }
    }

    /// Applies this device's own write directly, so its view updates without
    /// waiting for (or depending on) the broadcast echo.
    pub fn record_local(&mut self, action: Action, activity: Activity) -> bool {
        self.apply_action(action, activity)
    }

    fn apply_action(&mut self, action: Action, activity: Activity) -> bool {
        match action {
            Action::Create => self.insert(activity),
            Action::Update => self.update(activity),
            Action::Delete => self.remove(activity.id),
        }
    }

    fn replace_all(&mut self, data: &[Activity]) {
        self.order.clear();
        self.by_id.clear();
        for activity in data {
            if self.by_id.insert(activity.id, activity.clone()).is_none() {
                self.order.push(activity.id);
            }
        }
    }

    fn insert(&mut self, activity: Activity) -> bool {
        if self.by_id.contains_key(&activity.id) {
            // Duplicate delivery.
            return false;
        }
        self.order.insert(0, activity.id);
        self.by_id.insert(activity.id, activity);
        true
    }

    fn update(&mut self, activity: Activity) -> bool {
        match self.by_id.get_mut(&activity.id) {
            Some(slot) => {
                *slot = activity;
                true
            }
            // An update racing ahead of its create is dropped; the next
            // snapshot repairs the gap.
            None => false,
        }
    }

    fn remove(&mut self, id: Uuid) -> bool {
        if self.by_id.remove(&id).is_some() {
            self.order.retain(|entry| *entry != id);
            true
        } else {
            false
        }
    }

    /// Entries whose start time falls on or after `day_start_ms`.
    pub fn today(&self, day_start_ms: i64) -> Vec<&Activity> {
        self.activities()
            .filter(|activity| activity.started_at >= day_start_ms)
            .collect()
    }

    pub fn today_stats(&self, day_start_ms: i64) -> TodayStats {
        let mut feeding_count = 0;
        let mut diaper_count = 0;
        let mut sleep_ms: i64 = 0;

        for activity in self.today(day_start_ms) {
            match activity.kind {
                ActivityKind::Feeding => feeding_count += 1,
                ActivityKind::Diaper => diaper_count += 1,
                ActivityKind::Sleep => {
                    // Open-ended sessions count once they close.
                    if let Some(ended_at) = activity.ended_at {
                        sleep_ms += ended_at - activity.started_at;
                    }
                }
            }
        }

        TodayStats {
            feeding_count,
            sleep_hours: (sleep_ms as f64 / 3_600_000.0 * 10.0).round() / 10.0,
            diaper_count,
        }
    }
}
