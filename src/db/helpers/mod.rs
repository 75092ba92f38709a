use std::convert::TryFrom;

use anyhow::{anyhow, Result};

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out of range value {value}"))
}

pub fn to_optional_u32(value: Option<i64>, field: &str) -> Result<Option<u32>> {
    value.map(|raw| to_u32(raw, field)).transpose()
}
