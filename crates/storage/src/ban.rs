//! # Ban Store
//!
//! Flat append-only list of ban records. Records are never removed; a ban
//! is lifted by clearing its `ACTIVE` bit, patched in place at the flag
//! field's byte offset.
//!
//! # Versions
//! - 3: no prefix length (reads as 32, a single address)
//! - 4: no hardware id (reads as empty)
//! - 5: current

use crate::engine::{OpenOutcome, VersionedFile};
use crate::error::{Result, StorageError};
use crate::schema::{Field, FieldKind, Record, RecordReader, RecordWriter, Schema};
use rcon_core::{same_network, u32_to_ipv4, unix_now, BanFlags};
use rcon_game::Player;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

const BAN_FIELDS: [Field; 12] = [
    Field::new("flags", FieldKind::U16, 0),
    Field::new("timestamp", FieldKind::U64, 0),
    Field::new("duration", FieldKind::U64, 0),
    Field::new("account_id", FieldKind::U64, 0),
    Field::new("ip", FieldKind::U32, 0),
    Field::new("prefix_length", FieldKind::U8, 4).with_default(32),
    Field::new("hwid", FieldKind::Str, 5),
    Field::new("rdns", FieldKind::Str, 0),
    Field::new("name", FieldKind::Str, 0),
    Field::new("banner", FieldKind::Str, 0),
    Field::new("reason", FieldKind::Str, 0),
    Field::new("extra", FieldKind::Table, 0),
];

/// Ban file layout
pub const BAN_SCHEMA: Schema = Schema {
    name: "bans",
    current: 5,
    oldest: 3,
    fields: &BAN_FIELDS,
};

/// One persisted ban
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BanRecord {
    pub flags: BanFlags,

    /// Creation time, unix seconds
    pub timestamp: u64,

    /// Length in seconds, 0 for permanent
    pub duration: u64,

    pub account_id: u64,
    pub ip: u32,
    pub prefix_length: u8,
    pub hwid: String,
    pub rdns: String,
    pub name: String,
    pub banner: String,
    pub reason: String,

    /// Extension data (plugin annotations)
    pub extra: BTreeMap<String, String>,
}

impl Default for BanRecord {
    fn default() -> Self {
        Self {
            flags: BanFlags::ACTIVE | BanFlags::GAME,
            timestamp: unix_now(),
            duration: 0,
            account_id: 0,
            ip: 0,
            prefix_length: 32,
            hwid: String::new(),
            rdns: String::new(),
            name: String::new(),
            banner: String::new(),
            reason: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl BanRecord {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.flags.contains(BanFlags::ACTIVE)
    }

    #[inline]
    pub fn is_permanent(&self) -> bool {
        self.duration == 0
    }

    /// Unix time the ban runs out (`None` when permanent)
    pub fn expires_at(&self) -> Option<u64> {
        (!self.is_permanent()).then(|| self.timestamp.saturating_add(self.duration))
    }

    /// Whether a time-boxed ban has run out at `now`
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at().map(|end| end <= now).unwrap_or(false)
    }

    /// Whether this record identifies `player`
    ///
    /// # Matching
    /// Any of: equal non-zero account id, same network under the record's
    /// prefix length, equal non-empty hardware id
    pub fn matches(&self, player: &Player) -> bool {
        if self.account_id != 0 && self.account_id == player.account_id {
            return true;
        }
        if self.ip != 0 && player.ip32 != 0 && same_network(self.ip, player.ip32, self.prefix_length) {
            return true;
        }
        !self.hwid.is_empty() && self.hwid == player.hwid
    }

    /// `a.b.c.d/len`
    pub fn ip_string(&self) -> String {
        format!("{}/{}", u32_to_ipv4(self.ip), self.prefix_length)
    }
}

impl Record for BanRecord {
    const SCHEMA: &'static Schema = &BAN_SCHEMA;

    fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        Ok(Self {
            flags: BanFlags(reader.u16("flags")?),
            timestamp: reader.u64("timestamp")?,
            duration: reader.u64("duration")?,
            account_id: reader.u64("account_id")?,
            ip: reader.u32("ip")?,
            prefix_length: reader.u8("prefix_length")?,
            hwid: reader.string("hwid")?,
            rdns: reader.string("rdns")?,
            name: reader.string("name")?,
            banner: reader.string("banner")?,
            reason: reader.string("reason")?,
            extra: reader.table("extra")?,
        })
    }

    fn write(&self, writer: &mut RecordWriter<'_>) -> Result<()> {
        writer.u16("flags", self.flags.bits())?;
        writer.u64("timestamp", self.timestamp)?;
        writer.u64("duration", self.duration)?;
        writer.u64("account_id", self.account_id)?;
        writer.u32("ip", self.ip)?;
        writer.u8("prefix_length", self.prefix_length)?;
        writer.string("hwid", &self.hwid)?;
        writer.string("rdns", &self.rdns)?;
        writer.string("name", &self.name)?;
        writer.string("banner", &self.banner)?;
        writer.string("reason", &self.reason)?;
        writer.table("extra", &self.extra)
    }
}

/// Ban list backed by a versioned file
#[derive(Debug)]
pub struct BanStore {
    file: VersionedFile<BanRecord>,
    entries: Vec<BanRecord>,
}

impl BanStore {
    /// Open (or create) the ban file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (file, entries, outcome) = VersionedFile::open(path)?;
        if outcome != OpenOutcome::Loaded {
            tracing::info!("Ban list {}: {:?}", file.path().display(), outcome);
        }
        tracing::info!("Loaded {} bans ({} active)", entries.len(), entries.iter().filter(|b: &&BanRecord| b.is_active()).count());
        Ok(Self { file, entries })
    }

    /// Ban a player
    ///
    /// # Arguments
    /// * `player` - Who to ban (account id, IP, hardware id, names are copied)
    /// * `banner` - Who issued the ban
    /// * `reason` - Free text
    /// * `duration` - Seconds, 0 for permanent
    /// * `kinds` - Ban kinds (`ACTIVE` is added)
    /// * `annotate` - Asked once for extra key/value pairs to store with the
    ///   record (observer annotations)
    ///
    /// # Returns
    /// Index of the new record
    pub fn add<F>(
        &mut self,
        player: &Player,
        banner: &str,
        reason: &str,
        duration: u64,
        kinds: BanFlags,
        annotate: F,
    ) -> Result<usize>
    where
        F: FnOnce(&BanRecord) -> Vec<(String, String)>,
    {
        let mut record = BanRecord {
            flags: kinds.kinds() | BanFlags::ACTIVE,
            timestamp: unix_now(),
            duration,
            account_id: player.account_id,
            ip: player.ip32,
            prefix_length: 32,
            hwid: player.hwid.clone(),
            rdns: if player.rdns.is_pending() {
                String::new()
            } else {
                player.rdns.get().to_string()
            },
            name: player.name.clone(),
            banner: banner.to_string(),
            reason: reason.to_string(),
            extra: BTreeMap::new(),
        };

        let annotations = annotate(&record);
        record.extra.extend(annotations);

        tracing::info!("{} banned {} ({}): {}", banner, player.name, record.flags, reason);
        self.add_record(record)
    }

    /// Append a prepared record (imports)
    pub fn add_record(&mut self, record: BanRecord) -> Result<usize> {
        self.file.append(&record)?;
        self.entries.push(record);
        Ok(self.entries.len() - 1)
    }

    /// Lift ban `index`
    ///
    /// Clears `ACTIVE` in memory and patches only the flag field on disk.
    ///
    /// # Returns
    /// `false` when the ban was already inactive
    pub fn deactivate(&mut self, index: usize) -> Result<bool> {
        let record = self.entries.get_mut(index).ok_or(StorageError::OutOfRange(index))?;
        if !record.is_active() {
            return Ok(false);
        }
        record.flags.remove(BanFlags::ACTIVE);
        let flags = record.flags.bits();

        let field_offset = BAN_SCHEMA
            .fixed_offset("flags", BAN_SCHEMA.current)
            .ok_or_else(|| StorageError::Schema("bans: flags has no fixed offset".into()))?;
        let record_offset = self.file.offset_of(index).ok_or(StorageError::OutOfRange(index))?;
        self.file.write_at(record_offset + field_offset as u64, &flags.to_le_bytes())?;

        tracing::info!("Deactivated ban #{} ({})", index, self.entries[index].name);
        Ok(true)
    }

    /// Check a player against every active ban
    ///
    /// Matching bans add their kinds to `player.ban_flags`. Time-boxed bans
    /// that have run out are deactivated instead of applied.
    ///
    /// # Returns
    /// The kinds that matched
    pub fn check(&mut self, player: &mut Player) -> Result<BanFlags> {
        let now = unix_now();
        let mut matched = BanFlags::NONE;
        let mut expired = Vec::new();

        for (index, record) in self.entries.iter().enumerate() {
            if !record.is_active() || !record.matches(player) {
                continue;
            }
            if record.is_expired(now) {
                expired.push(index);
                continue;
            }
            matched |= record.flags.kinds();
        }

        for index in expired {
            tracing::debug!("Ban #{} expired", index);
            self.deactivate(index)?;
        }

        player.ban_flags |= matched;
        Ok(matched)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&BanRecord> {
        self.entries.get(index)
    }

    /// Every record, in file order
    #[inline]
    pub fn entries(&self) -> &[BanRecord] {
        &self.entries
    }

    /// Active records with their indexes
    pub fn active_entries(&self) -> impl Iterator<Item = (usize, &BanRecord)> {
        self.entries.iter().enumerate().filter(|(_, r)| r.is_active())
    }

    /// Indexes of records for an account
    pub fn find_by_account(&self, account_id: u64) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, r)| account_id != 0 && r.account_id == account_id)
            .map(|(i, _)| i)
            .collect()
    }

    /// Indexes of records whose network contains `ip`
    pub fn find_by_ip(&self, ip: u32) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, r)| r.ip != 0 && same_network(r.ip, ip, r.prefix_length))
            .map(|(i, _)| i)
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
