//! Device roster kept by the editor surface

use shared::Timestamp;
use shared::models::{DeviceId, DeviceRecord, DeviceStatus, Role};

/// Roster of announced devices, one entry per id, sorted by id.
///
/// Entries are never evicted; silent devices stay as OFFLINE.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<DeviceRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an announcement received at `now` (local clock, ms)
    pub fn upsert(&mut self, device_id: DeviceId, role: Role, ip: Option<String>, now: Timestamp) {
        let record = DeviceRecord {
            device_id,
            role,
            ip,
            last_seen: now,
            status: DeviceStatus::Online,
        };
        match self
            .entries
            .binary_search_by(|e| e.device_id.cmp(&record.device_id))
        {
            Ok(idx) => self.entries[idx] = record,
            Err(idx) => self.entries.insert(idx, record),
        }
    }

    /// Mark entries silent for longer than `offline_after_ms` as OFFLINE.
    /// Returns how many entries changed.
    pub fn sweep(&mut self, now: Timestamp, offline_after_ms: i64) -> usize {
        let mut changed = 0;
        for entry in &mut self.entries {
            if entry.status == DeviceStatus::Online && now - entry.last_seen > offline_after_ms {
                entry.status = DeviceStatus::Offline;
                changed += 1;
            }
        }
        changed
    }

    pub fn entries(&self) -> &[DeviceRecord] {
        &self.entries
    }

    pub fn get(&self, device_id: &DeviceId) -> Option<&DeviceRecord> {
        self.entries.iter().find(|e| &e.device_id == device_id)
    }

    pub fn online_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_online()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: i64 = 1000;
    const OFFLINE_AFTER: i64 = 40 * SEC;

    fn id(s: &str) -> DeviceId {
        DeviceId::new(s)
    }

    #[test]
    fn upsert_keeps_one_entry_sorted() {
        let mut roster = Roster::new();
        roster.upsert(id("DEV-C"), Role::Display, None, 0);
        roster.upsert(id("DEV-A"), Role::Companion, None, 0);
        roster.upsert(id("DEV-C"), Role::Companion, Some("10.0.0.7".into()), 5 * SEC);

        let ids: Vec<_> = roster.entries().iter().map(|e| e.device_id.as_str()).collect();
        assert_eq!(ids, vec!["DEV-A", "DEV-C"]);
        let c = roster.get(&id("DEV-C")).unwrap();
        assert_eq!(c.role, Role::Companion);
        assert_eq!(c.ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(c.last_seen, 5 * SEC);
    }

    #[test]
    fn silent_device_goes_offline_on_sweep() {
        let mut roster = Roster::new();
        roster.upsert(id("TV"), Role::Display, None, 0);

        // Sweeps every 20s: still within 40s at t=40
        assert_eq!(roster.sweep(20 * SEC, OFFLINE_AFTER), 0);
        assert_eq!(roster.sweep(40 * SEC, OFFLINE_AFTER), 0);
        assert_eq!(roster.sweep(60 * SEC, OFFLINE_AFTER), 1);
        assert!(!roster.get(&id("TV")).unwrap().is_online());
        assert_eq!(roster.sweep(80 * SEC, OFFLINE_AFTER), 0);
    }

    #[test]
    fn reannounce_flips_online_without_duplicate() {
        let mut roster = Roster::new();
        roster.upsert(id("TV"), Role::Display, None, 0);
        roster.sweep(60 * SEC, OFFLINE_AFTER);
        assert_eq!(roster.online_count(), 0);

        roster.upsert(id("TV"), Role::Display, None, 600 * SEC);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.online_count(), 1);
    }

    #[test]
    fn offline_entries_never_evicted() {
        let mut roster = Roster::new();
        for n in 0..5 {
            roster.upsert(id(&format!("DEV-{n}")), Role::Companion, None, 0);
        }
        roster.sweep(3600 * SEC, OFFLINE_AFTER);
        assert_eq!(roster.len(), 5);
        assert_eq!(roster.online_count(), 0);
    }
}
