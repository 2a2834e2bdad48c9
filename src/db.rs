use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::{OffsetDateTime, Time, UtcOffset};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: Uuid,
    pub code: String,
    pub baby_name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Feeding,
    Sleep,
    Diaper,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Feeding => "feeding",
            ActivityKind::Sleep => "sleep",
            ActivityKind::Diaper => "diaper",
        }
    }

    fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "feeding" => ActivityKind::Feeding,
            "sleep" => ActivityKind::Sleep,
            "diaper" => ActivityKind::Diaper,
            other => anyhow::bail!("unknown activity type {other}"),
        })
    }
}

/// Timestamps are unix milliseconds throughout; `ended_at` absent means the
/// activity is still in progress (or instantaneous).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub family_id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub data: serde_json::Value,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub created_by: Option<Uuid>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    Bottle,
    Breast,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedUnit {
    Oz,
    Ml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSide {
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedingData {
    pub feed_type: FeedType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<FeedUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<FeedSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// 1 (restless) to 5 (sound).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiaperType {
    Wet,
    Dirty,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaperData {
    pub diaper_type: DiaperType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_rash: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Local midnight in unix milliseconds; falls back to UTC when the local
/// offset cannot be determined.
pub fn start_of_today_ms() -> i64 {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let midnight = OffsetDateTime::now_utc()
        .to_offset(offset)
        .replace_time(Time::MIDNIGHT);
    (midnight.unix_timestamp_nanos() / 1_000_000) as i64
}

pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS families (
            id TEXT PRIMARY KEY,
            code TEXT UNIQUE NOT NULL,
            baby_name TEXT NOT NULL DEFAULT 'Baby',
            created_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS activities (
            id TEXT PRIMARY KEY,
            family_id TEXT NOT NULL,
            type TEXT NOT NULL,
            data TEXT NOT NULL,
            started_at INTEGER NOT NULL,
            ended_at INTEGER,
            created_by TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (family_id) REFERENCES families(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_activities_family ON activities(family_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_activities_type ON activities(type)")
        .execute(pool)
        .await?;

    Ok(())
}

const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| *CODE_CHARS.choose(&mut rng).unwrap() as char)
        .collect()
}

pub async fn create_family(pool: &SqlitePool, baby_name: &str) -> anyhow::Result<Family> {
    let id = Uuid::now_v7();
    let created_at = now_ms();

    // Codes are random; on the rare collision, roll a new one.
    for _ in 0..10 {
        let code = generate_code();
        let inserted = sqlx::query("INSERT INTO families (id,code,baby_name,created_at) VALUES (?,?,?,?)")
            .bind(id.to_string())
            .bind(&code)
            .bind(baby_name)
            .bind(created_at)
            .execute(pool)
            .await;

        match inserted {
            Ok(_) => {
                return Ok(Family {
                    id,
                    code,
                    baby_name: baby_name.to_owned(),
                    created_at,
                });
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => continue,
            Err(e) => return Err(e.into()),
        }
    }

    anyhow::bail!("could not allocate a unique family code")
}

pub async fn family_by_code(pool: &SqlitePool, code: &str) -> anyhow::Result<Option<Family>> {
    let row: Option<(String, String, String, i64)> =
        sqlx::query_as("SELECT id,code,baby_name,created_at FROM families WHERE code=?")
            .bind(code.to_uppercase())
            .fetch_optional(pool)
            .await?;

    let Some((id, code, baby_name, created_at)) = row else {
        return Ok(None);
    };

    Ok(Some(Family {
        id: Uuid::parse_str(&id)?,
        code,
        baby_name,
        created_at,
    }))
}

type ActivityRow = (
    String,
    String,
    String,
    String,
    i64,
    Option<i64>,
    Option<String>,
    i64,
);

fn activity_from_row(row: ActivityRow) -> anyhow::Result<Activity> {
    let (id, family_id, kind, data, started_at, ended_at, created_by, created_at) = row;

    Ok(Activity {
        id: Uuid::parse_str(&id)?,
        family_id: Uuid::parse_str(&family_id)?,
        kind: ActivityKind::parse(&kind)?,
        data: serde_json::from_str(&data)?,
        started_at,
        ended_at,
        created_by: created_by.as_deref().map(Uuid::parse_str).transpose()?,
        created_at,
    })
}

const SELECT_ACTIVITY: &str =
    "SELECT id,family_id,type,data,started_at,ended_at,created_by,created_at FROM activities";

pub async fn create_activity(
    pool: &SqlitePool,
    family_id: Uuid,
    kind: ActivityKind,
    data: serde_json::Value,
    started_at: i64,
    ended_at: Option<i64>,
    created_by: Option<Uuid>,
) -> anyhow::Result<Activity> {
    let id = Uuid::now_v7();
    let created_at = now_ms();

    sqlx::query(
        "INSERT INTO activities (id,family_id,type,data,started_at,ended_at,created_by,created_at)
         VALUES (?,?,?,?,?,?,?,?)",
    )
    .bind(id.to_string())
    .bind(family_id.to_string())
    .bind(kind.as_str())
    .bind(data.to_string())
    .bind(started_at)
    .bind(ended_at)
    .bind(created_by.as_ref().map(Uuid::to_string))
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(Activity {
        id,
        family_id,
        kind,
        data,
        started_at,
        ended_at,
        created_by,
        created_at,
    })
}

pub async fn get_activity(pool: &SqlitePool, id: Uuid) -> anyhow::Result<Option<Activity>> {
    let row: Option<ActivityRow> = sqlx::query_as(&format!("{SELECT_ACTIVITY} WHERE id=?"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(activity_from_row).transpose()
}

pub async fn list_activities(
    pool: &SqlitePool,
    family_id: Uuid,
    limit: u32,
) -> anyhow::Result<Vec<Activity>> {
    let rows: Vec<ActivityRow> = sqlx::query_as(&format!(
        "{SELECT_ACTIVITY} WHERE family_id=? ORDER BY started_at DESC LIMIT ?"
    ))
    .bind(family_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(activity_from_row).collect()
}

pub async fn list_today_activities(
    pool: &SqlitePool,
    family_id: Uuid,
) -> anyhow::Result<Vec<Activity>> {
    let rows: Vec<ActivityRow> = sqlx::query_as(&format!(
        "{SELECT_ACTIVITY} WHERE family_id=? AND started_at>=? ORDER BY started_at DESC"
    ))
    .bind(family_id.to_string())
    .bind(start_of_today_ms())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(activity_from_row).collect()
}

/// Partial update: only the fields that were supplied are touched.
pub async fn update_activity(
    pool: &SqlitePool,
    id: Uuid,
    data: Option<&serde_json::Value>,
    ended_at: Option<i64>,
) -> anyhow::Result<()> {
    if let Some(data) = data {
        sqlx::query("UPDATE activities SET data=? WHERE id=?")
            .bind(data.to_string())
            .bind(id.to_string())
            .execute(pool)
            .await?;
    }

    if let Some(ended_at) = ended_at {
        sqlx::query("UPDATE activities SET ended_at=? WHERE id=?")
            .bind(ended_at)
            .bind(id.to_string())
            .execute(pool)
            .await?;
    }

    Ok(())
}

pub async fn delete_activity(pool: &SqlitePool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM activities WHERE id=?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}
