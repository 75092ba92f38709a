use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::models::{PackageAccessBatch, PackageOpUsage};
use crate::settings::FeatureFlags;

use super::{AccessRecordSource, SourceError};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const ONE_DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// How far back discrete history is read.
pub fn history_window_millis(features: &FeatureFlags) -> i64 {
    if features.handheld {
        7 * ONE_DAY_MS
    } else {
        ONE_DAY_MS
    }
}

/// Read discrete accesses of every op and merge them per package and user.
///
/// An op the platform does not recognize contributes nothing; any other
/// source failure aborts the load.
pub async fn load_discrete_accesses(
    source: &dyn AccessRecordSource,
    op_names: &[&str],
    begin_millis: i64,
    end_millis: i64,
) -> Result<Vec<PackageAccessBatch>> {
    let mut merged: Vec<PackageAccessBatch> = Vec::new();
    let mut index: HashMap<(String, u32), usize> = HashMap::new();

    for op_name in op_names {
        let batches = match source.discrete_accesses(op_name, begin_millis, end_millis).await {
            Ok(batches) => batches,
            Err(SourceError::UnknownOp(op)) => {
                log_warn!("App op not recognized, skipping discrete history for {op}");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read discrete history of {op_name}"))
            }
        };

        for batch in batches {
            let key = (batch.package_name.clone(), batch.user_id);
            match index.get(&key) {
                Some(&position) => merged[position].accesses.extend(batch.accesses),
                None => {
                    index.insert(key, merged.len());
                    merged.push(batch);
                }
            }
        }
    }

    log_debug!(
        "Loaded discrete history of {} ops for {} packages",
        op_names.len(),
        merged.len()
    );
    Ok(merged)
}

/// Read last-access usage of every op and merge it per package and user.
pub async fn load_last_access_usages(
    source: &dyn AccessRecordSource,
    op_names: &[&str],
) -> Result<Vec<PackageOpUsage>> {
    let mut merged: Vec<PackageOpUsage> = Vec::new();
    let mut index: HashMap<(String, u32), usize> = HashMap::new();

    for op_name in op_names {
        let usages = match source.last_access_usages(op_name).await {
            Ok(usages) => usages,
            Err(SourceError::UnknownOp(op)) => {
                log_warn!("App op not recognized, skipping usage of {op}");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read usage of {op_name}"))
            }
        };

        for usage in usages {
            let key = (usage.package_name.clone(), usage.user_id);
            match index.get(&key) {
                Some(&position) => merged[position].op_usages.extend(usage.op_usages),
                None => {
                    index.insert(key, merged.len());
                    merged.push(usage);
                }
            }
        }
    }

    Ok(merged)
}
