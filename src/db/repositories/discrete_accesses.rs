use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{
    helpers::{to_optional_u32, to_u32},
    Database,
};
use crate::models::{DiscreteAccess, OpUsage, PackageAccessBatch, PackageOpUsage};
use crate::sources::{AccessRecordSource, SourceError};

struct AccessRow {
    package_name: String,
    user_id: i64,
    op_name: String,
    access_time_ms: i64,
    duration_ms: i64,
    attribution_tag: Option<String>,
    proxy_package_name: Option<String>,
    proxy_user_id: Option<i64>,
}

pub struct DiscreteAccessRepository<'a> {
    conn: &'a Connection,
}

impl<'a> DiscreteAccessRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn register_op(&self, op_name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO tracked_ops (op_name, registered_at) VALUES (?1, ?2)",
            params![op_name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn is_tracked(&self, op_name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM tracked_ops WHERE op_name = ?1",
                params![op_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn tracked_ops(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT op_name FROM tracked_ops ORDER BY op_name")?;
        let ops = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ops)
    }

    /// Stores `access` at minute granularity.
    pub fn insert(&self, package_name: &str, user_id: u32, access: &DiscreteAccess) -> Result<()> {
        if !self.is_tracked(&access.op_name)? {
            bail!("cannot record access of untracked op {}", access.op_name);
        }
        let access = access.clone().truncated_to_minute();

        self.conn.execute(
            "INSERT INTO discrete_accesses
                 (id, op_name, package_name, user_id, access_time_ms, duration_ms,
                  attribution_tag, proxy_package_name, proxy_user_id, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                uuid::Uuid::new_v4().to_string(),
                access.op_name,
                package_name,
                i64::from(user_id),
                access.access_time_millis,
                access.duration_millis,
                access.attribution_tag,
                access.proxy_package_name,
                access.proxy_user_id.map(i64::from),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Accesses of `op_name` in `[begin_millis, end_millis)`, one batch per
    /// package and user, each in time order.
    pub fn in_range(
        &self,
        op_name: &str,
        begin_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<PackageAccessBatch>> {
        let mut stmt = self.conn.prepare(
            "SELECT package_name, user_id, op_name, access_time_ms, duration_ms,
                    attribution_tag, proxy_package_name, proxy_user_id
             FROM discrete_accesses
             WHERE op_name = ?1 AND access_time_ms >= ?2 AND access_time_ms < ?3
             ORDER BY package_name, user_id, access_time_ms",
        )?;

        let rows = stmt
            .query_map(params![op_name, begin_millis, end_millis], |row| {
                Ok(AccessRow {
                    package_name: row.get(0)?,
                    user_id: row.get(1)?,
                    op_name: row.get(2)?,
                    access_time_ms: row.get(3)?,
                    duration_ms: row.get(4)?,
                    attribution_tag: row.get(5)?,
                    proxy_package_name: row.get(6)?,
                    proxy_user_id: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut batches: Vec<PackageAccessBatch> = Vec::new();
        for row in rows {
            let user_id = to_u32(row.user_id, "user_id")?;
            let access = DiscreteAccess {
                op_name: row.op_name,
                access_time_millis: row.access_time_ms,
                duration_millis: row.duration_ms,
                attribution_tag: row.attribution_tag,
                proxy_package_name: row.proxy_package_name,
                proxy_user_id: to_optional_u32(row.proxy_user_id, "proxy_user_id")?,
            };

            match batches.last_mut() {
                Some(batch) if batch.package_name == row.package_name && batch.user_id == user_id => {
                    batch.accesses.push(access)
                }
                _ => batches.push(PackageAccessBatch::new(row.package_name, user_id, vec![access])),
            }
        }

        Ok(batches)
    }

    /// Latest access time of `op_name` per package and user.
    pub fn last_access_per_package(&self, op_name: &str) -> Result<Vec<PackageOpUsage>> {
        let mut stmt = self.conn.prepare(
            "SELECT package_name, user_id, MAX(access_time_ms)
             FROM discrete_accesses
             WHERE op_name = ?1
             GROUP BY package_name, user_id
             ORDER BY package_name, user_id",
        )?;

        let rows = stmt
            .query_map(params![op_name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(package_name, user_id, last_access_millis)| {
                Ok(PackageOpUsage {
                    package_name,
                    user_id: to_u32(user_id, "user_id")?,
                    op_usages: vec![OpUsage {
                        op_name: op_name.to_string(),
                        last_access_millis,
                    }],
                })
            })
            .collect()
    }

    /// Delete accesses that started before `cutoff_millis`. Returns the number removed.
    pub fn delete_before(&self, cutoff_millis: i64) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM discrete_accesses WHERE access_time_ms < ?1",
            params![cutoff_millis],
        )?;
        Ok(removed)
    }
}

impl Database {
    /// Start tracking ops. Already tracked ops are left untouched.
    pub async fn register_ops(&self, op_names: &[&str]) -> Result<()> {
        let op_names: Vec<String> = op_names.iter().map(|op| op.to_string()).collect();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            {
                let repo = DiscreteAccessRepository::new(&tx);
                for op_name in &op_names {
                    repo.register_op(op_name)?;
                }
            }
            tx.commit().context("failed to register tracked ops")?;
            Ok(())
        })
        .await
    }

    pub async fn tracked_ops(&self) -> Result<Vec<String>> {
        self.execute(|conn| DiscreteAccessRepository::new(conn).tracked_ops())
            .await
    }

    pub async fn record_access(&self, package_name: &str, user_id: u32, access: DiscreteAccess) -> Result<()> {
        self.record_accesses(package_name, user_id, vec![access]).await
    }

    /// Record several accesses of one package atomically.
    pub async fn record_accesses(
        &self,
        package_name: &str,
        user_id: u32,
        accesses: Vec<DiscreteAccess>,
    ) -> Result<()> {
        let package_name = package_name.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            {
                let repo = DiscreteAccessRepository::new(&tx);
                for access in &accesses {
                    repo.insert(&package_name, user_id, access)
                        .with_context(|| format!("failed to record access for {package_name}"))?;
                }
            }
            tx.commit().context("failed to commit recorded accesses")?;
            Ok(())
        })
        .await
    }

    /// Drop history older than `cutoff_millis`.
    pub async fn prune_before(&self, cutoff_millis: i64) -> Result<usize> {
        self.execute(move |conn| DiscreteAccessRepository::new(conn).delete_before(cutoff_millis))
            .await
    }

    async fn read_tracked<T, F>(&self, op_name: &str, read: F) -> Result<Option<T>>
    where
        F: FnOnce(&DiscreteAccessRepository<'_>, &str) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let op_name = op_name.to_string();
        self.execute(move |conn| {
            let repo = DiscreteAccessRepository::new(conn);
            if !repo.is_tracked(&op_name)? {
                return Ok(None);
            }
            read(&repo, &op_name).map(Some)
        })
        .await
    }
}

fn unavailable(err: anyhow::Error) -> SourceError {
    SourceError::Unavailable(format!("{err:#}"))
}

#[async_trait]
impl AccessRecordSource for Database {
    async fn discrete_accesses(
        &self,
        op_name: &str,
        begin_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<PackageAccessBatch>, SourceError> {
        self.read_tracked(op_name, move |repo, op| repo.in_range(op, begin_millis, end_millis))
            .await
            .map_err(unavailable)?
            .ok_or_else(|| SourceError::UnknownOp(op_name.to_string()))
    }

    async fn last_access_usages(&self, op_name: &str) -> Result<Vec<PackageOpUsage>, SourceError> {
        self.read_tracked(op_name, |repo, op| repo.last_access_per_package(op))
            .await
            .map_err(unavailable)?
            .ok_or_else(|| SourceError::UnknownOp(op_name.to_string()))
    }
}
