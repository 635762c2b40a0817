// 🗄️ Persistence - SQLite storage and CSV import for donors and income
//
// Tables: donors (current version per id), income (idempotent by hash),
// events (audit trail). Rows are read raw and converted to entities outside
// the rusqlite closures so a malformed start date surfaces as a DuesError.

use crate::entities::{
    parse_start_date, Donor, DonorStatus, IncomeSource, Payment, MONTHLY_DONATION_TAG,
};
use crate::errors::DuesError;
use crate::repository::{DonorBatch, DonorRepository};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

// ============================================================================
// EVENTS (audit trail)
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL keeps readers (the web server) from blocking imports
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS donors (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            monthly_amount REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'Active',
            start_date TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            valid_from TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS income (
            id TEXT PRIMARY KEY,
            idempotency_hash TEXT UNIQUE NOT NULL,
            donor_id TEXT,
            source TEXT NOT NULL,
            month TEXT NOT NULL DEFAULT '',
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_income_donor ON income(donor_id, source)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// One row of a donors CSV
#[derive(Debug, Clone, Deserialize)]
pub struct DonorRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    pub monthly_amount: f64,
    #[serde(default)]
    pub status: String,
    pub start_date: String,
}

impl DonorRecord {
    pub fn into_donor(self) -> std::result::Result<Donor, DuesError> {
        let id = if self.id.trim().is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            self.id.trim().to_string()
        };
        let start_date = parse_start_date(&id, &self.start_date)?;
        let status = DonorStatus::parse(&self.status)?;

        Ok(Donor::new(self.name, self.phone, self.address, self.monthly_amount, start_date)
            .with_id(id)
            .with_status(status))
    }
}

/// One row of an income CSV
#[derive(Debug, Clone, Deserialize)]
pub struct IncomeRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub donor_id: String,
    pub source: String,
    #[serde(default)]
    pub month: String,
    pub amount: f64,
    pub date: String,
}

impl IncomeRecord {
    pub fn into_payment(self) -> std::result::Result<Payment, DuesError> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|_| {
            DuesError::InvalidRecord(format!("Invalid income date: '{}'", self.date))
        })?;
        let id = if self.id.trim().is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            self.id.trim().to_string()
        };
        let donor_id = Some(self.donor_id.trim().to_string()).filter(|d| !d.is_empty());

        Ok(Payment {
            id,
            donor_id,
            source: IncomeSource::parse(&self.source),
            month: self.month.trim().to_string(),
            amount: self.amount,
            date,
        })
    }
}

pub fn read_donors<R: io::Read>(reader: R) -> Result<Vec<Donor>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut donors = Vec::new();

    for (line, result) in rdr.deserialize::<DonorRecord>().enumerate() {
        let record =
            result.with_context(|| format!("Failed to deserialize donor row {}", line + 1))?;
        let donor = record
            .into_donor()
            .with_context(|| format!("Invalid donor row {}", line + 1))?;
        donors.push(donor);
    }

    Ok(donors)
}

pub fn read_income<R: io::Read>(reader: R) -> Result<Vec<Payment>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut payments = Vec::new();

    for (line, result) in rdr.deserialize::<IncomeRecord>().enumerate() {
        let record =
            result.with_context(|| format!("Failed to deserialize income row {}", line + 1))?;
        let payment = record
            .into_payment()
            .with_context(|| format!("Invalid income row {}", line + 1))?;
        payments.push(payment);
    }

    Ok(payments)
}

pub fn load_donors_csv(csv_path: &Path) -> Result<Vec<Donor>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open donors CSV {}", csv_path.display()))?;
    read_donors(file)
}

pub fn load_income_csv(csv_path: &Path) -> Result<Vec<Payment>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open income CSV {}", csv_path.display()))?;
    read_income(file)
}

// ============================================================================
// WRITES
// ============================================================================

/// Insert or update donors by id. Updates bump the stored version.
pub fn insert_donors(conn: &Connection, donors: &[Donor]) -> Result<usize> {
    let mut written = 0;

    for donor in donors {
        written += conn.execute(
            "INSERT INTO donors (
                id, name, phone, address, monthly_amount, status, start_date, version, valid_from
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                phone = excluded.phone,
                address = excluded.address,
                monthly_amount = excluded.monthly_amount,
                status = excluded.status,
                start_date = excluded.start_date,
                version = donors.version + 1,
                valid_from = excluded.valid_from",
            params![
                donor.id,
                donor.name,
                donor.phone,
                donor.address,
                donor.monthly_amount,
                donor.status.as_str(),
                donor.start_date.format("%Y-%m-%d").to_string(),
                donor.version,
                donor.valid_from.to_rfc3339(),
            ],
        )?;
    }

    info!("Wrote {} donor(s)", written);
    Ok(written)
}

/// Outcome of an income import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    /// New rows
    pub inserted: usize,

    /// Existing ids whose content changed (e.g. a fixed month label)
    pub corrected: usize,

    /// Rows already stored with the same content
    pub duplicates: usize,
}

/// Insert income entries.
///
/// A row whose idempotency hash is already stored is a duplicate and skipped.
/// A row reusing a stored id with different content replaces that row.
pub fn insert_payments(conn: &Connection, payments: &[Payment]) -> Result<ImportCounts> {
    let mut counts = ImportCounts::default();

    for payment in payments {
        let hash = payment.compute_idempotency_hash();

        let known_hash: i64 = conn.query_row(
            "SELECT COUNT(*) FROM income WHERE idempotency_hash = ?1",
            params![hash],
            |row| row.get(0),
        )?;
        if known_hash > 0 {
            counts.duplicates += 1;
            continue;
        }

        let previous_month: Option<String> = conn
            .query_row(
                "SELECT month FROM income WHERE id = ?1",
                params![payment.id],
                |row| row.get(0),
            )
            .optional()?;

        let date = payment.date.format("%Y-%m-%d").to_string();
        let event_type = match &previous_month {
            Some(_) => {
                conn.execute(
                    "UPDATE income SET
                        idempotency_hash = ?2, donor_id = ?3, source = ?4,
                        month = ?5, amount = ?6, date = ?7
                     WHERE id = ?1",
                    params![
                        payment.id,
                        hash,
                        payment.donor_id,
                        payment.source.as_str(),
                        payment.month,
                        payment.amount,
                        date,
                    ],
                )?;
                counts.corrected += 1;
                "income_corrected"
            }
            None => {
                conn.execute(
                    "INSERT INTO income (
                        id, idempotency_hash, donor_id, source, month, amount, date
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        payment.id,
                        hash,
                        payment.donor_id,
                        payment.source.as_str(),
                        payment.month,
                        payment.amount,
                        date,
                    ],
                )?;
                counts.inserted += 1;
                "income_recorded"
            }
        };

        let event = Event::new(
            event_type,
            "income",
            &payment.id,
            serde_json::json!({
                "donor_id": payment.donor_id,
                "source": payment.source.as_str(),
                "month": payment.month,
                "previous_month": previous_month,
                "amount": payment.amount,
            }),
            "import",
        );
        insert_event(conn, &event)?;
    }

    info!(
        "Income import: {} inserted, {} corrected, {} duplicate(s) skipped",
        counts.inserted, counts.corrected, counts.duplicates
    );
    Ok(counts)
}

/// Change a donor's stored status and record who did it.
pub fn update_donor_status(
    conn: &Connection,
    donor_id: &str,
    status: DonorStatus,
    actor: &str,
) -> Result<()> {
    let previous = get_donor(conn, donor_id)?
        .ok_or_else(|| DuesError::DonorNotFound(donor_id.to_string()))?;

    conn.execute(
        "UPDATE donors SET status = ?1, version = version + 1, valid_from = ?2 WHERE id = ?3",
        params![status.as_str(), Utc::now().to_rfc3339(), donor_id],
    )?;

    let event = Event::new(
        "status_changed",
        "donor",
        donor_id,
        serde_json::json!({
            "from": previous.status.as_str(),
            "to": status.as_str(),
        }),
        actor,
    );
    insert_event(conn, &event)?;

    debug!("Donor {} status {} -> {}", donor_id, previous.status.as_str(), status.as_str());
    Ok(())
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

// ============================================================================
// READS
// ============================================================================

struct DonorRow {
    id: String,
    name: String,
    phone: String,
    address: String,
    monthly_amount: f64,
    status: String,
    start_date: String,
    version: i64,
    valid_from: String,
}

impl DonorRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(DonorRow {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            address: row.get(3)?,
            monthly_amount: row.get(4)?,
            status: row.get(5)?,
            start_date: row.get(6)?,
            version: row.get(7)?,
            valid_from: row.get(8)?,
        })
    }

    fn into_donor(self) -> std::result::Result<Donor, DuesError> {
        let start_date = parse_start_date(&self.id, &self.start_date)?;
        let status = DonorStatus::parse(&self.status)?;
        let valid_from = DateTime::parse_from_rfc3339(&self.valid_from)
            .map_err(|_| {
                DuesError::InvalidRecord(format!(
                    "Invalid valid_from '{}' for donor {}",
                    self.valid_from, self.id
                ))
            })?
            .with_timezone(&Utc);

        Ok(Donor {
            id: self.id,
            name: self.name,
            phone: self.phone,
            address: self.address,
            monthly_amount: self.monthly_amount,
            status,
            start_date,
            version: self.version,
            valid_from,
            valid_until: None,
        })
    }
}

const DONOR_COLUMNS: &str =
    "id, name, phone, address, monthly_amount, status, start_date, version, valid_from";

pub fn get_donor(conn: &Connection, id: &str) -> std::result::Result<Option<Donor>, DuesError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM donors WHERE id = ?1", DONOR_COLUMNS),
            params![id],
            DonorRow::from_row,
        )
        .optional()?;

    row.map(DonorRow::into_donor).transpose()
}

/// Every stored donor. A row that fails to convert is reported in
/// `skipped` instead of failing the whole load.
pub fn load_all_donors(conn: &Connection) -> std::result::Result<DonorBatch, DuesError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM donors ORDER BY name, id",
        DONOR_COLUMNS
    ))?;

    let rows = stmt
        .query_map([], DonorRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut batch = DonorBatch::default();
    for row in rows {
        let id = row.id.clone();
        match row.into_donor() {
            Ok(donor) => batch.donors.push(donor),
            Err(e) => batch.skip(&id, &e),
        }
    }

    Ok(batch)
}

struct IncomeRow {
    id: String,
    donor_id: Option<String>,
    source: String,
    month: String,
    amount: f64,
    date: String,
}

impl IncomeRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(IncomeRow {
            id: row.get(0)?,
            donor_id: row.get(1)?,
            source: row.get(2)?,
            month: row.get(3)?,
            amount: row.get(4)?,
            date: row.get(5)?,
        })
    }

    fn into_payment(self) -> std::result::Result<Payment, DuesError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|_| {
            DuesError::InvalidRecord(format!("Invalid date '{}' on income {}", self.date, self.id))
        })?;

        Ok(Payment {
            id: self.id,
            donor_id: self.donor_id,
            source: IncomeSource::parse(&self.source),
            month: self.month,
            amount: self.amount,
            date,
        })
    }
}

/// Monthly-donation income credited to one donor
pub fn get_payments_for_donor(
    conn: &Connection,
    donor_id: &str,
) -> std::result::Result<Vec<Payment>, DuesError> {
    let mut stmt = conn.prepare(
        "SELECT id, donor_id, source, month, amount, date
         FROM income
         WHERE donor_id = ?1 AND source = ?2
         ORDER BY date, id",
    )?;

    let rows = stmt
        .query_map(params![donor_id, MONTHLY_DONATION_TAG], IncomeRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(IncomeRow::into_payment).collect()
}

pub fn get_all_payments(conn: &Connection) -> std::result::Result<Vec<Payment>, DuesError> {
    let mut stmt = conn.prepare(
        "SELECT id, donor_id, source, month, amount, date FROM income ORDER BY date, id",
    )?;

    let rows = stmt
        .query_map([], IncomeRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(IncomeRow::into_payment).collect()
}

pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let raw = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    raw.into_iter()
        .map(|row| -> Result<Event> {
            let (event_id, timestamp, event_type, entity_type, entity_id, data, actor) = row;
            Ok(Event {
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .with_context(|| format!("Invalid timestamp on event {}", event_id))?
                    .with_timezone(&Utc),
                data: serde_json::from_str(&data)
                    .with_context(|| format!("Invalid data on event {}", event_id))?,
                event_id,
                event_type,
                entity_type,
                entity_id,
                actor,
            })
        })
        .collect()
}

/// (donor count, income count)
pub fn verify_counts(conn: &Connection) -> Result<(i64, i64)> {
    let donors: i64 = conn.query_row("SELECT COUNT(*) FROM donors", [], |row| row.get(0))?;
    let income: i64 = conn.query_row("SELECT COUNT(*) FROM income", [], |row| row.get(0))?;
    Ok((donors, income))
}

// ============================================================================
// SQLITE REPOSITORY
// ============================================================================

/// `DonorRepository` over a borrowed connection.
pub struct SqliteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteRepository { conn }
    }
}

impl DonorRepository for SqliteRepository<'_> {
    fn find_donor(&self, id: &str) -> std::result::Result<Option<Donor>, DuesError> {
        get_donor(self.conn, id)
    }

    fn all_donors(&self) -> std::result::Result<DonorBatch, DuesError> {
        load_all_donors(self.conn)
    }

    fn payments_for_donor(&self, donor_id: &str) -> std::result::Result<Vec<Payment>, DuesError> {
        get_payments_for_donor(self.conn, donor_id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
