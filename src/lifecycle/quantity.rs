//! Resource quantity arithmetic
//!
//! Converts CPU quantities to millicores and memory quantities to megabytes
//! (2^20 bytes) so requirements across slots can be summed for reporting.
//! Binary suffixes (Ki, Mi, Gi, ...) are powers of 1024, decimal suffixes
//! (k, M, G, ...) are powers of 1000.

use crate::crd::ResourceRequirements;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Summed CPU and memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityTotals {
    pub cpu_millicores: u64,
    pub memory_mb: u64,
}

/// Summed requests and limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTotals {
    pub requests: QuantityTotals,
    pub limits: QuantityTotals,
}

/// Split "250m" into (250.0, "m") and "1e3" into (1000.0, "").
///
/// An `e`/`E` followed only by an optionally signed integer is a decimal
/// exponent; otherwise `E` is the exa suffix.
fn split_quantity(s: &str) -> Result<(f64, &str)> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::QuantityParse("empty quantity".into()));
    }

    let mut num_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let rest = &s[num_end..];
    if let Some(exponent) = rest.strip_prefix(['e', 'E']) {
        let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            num_end = s.len();
        }
    }

    let (num_str, unit) = s.split_at(num_end);
    let num: f64 = num_str
        .parse()
        .map_err(|_| Error::QuantityParse(format!("invalid number in quantity: {}", s)))?;

    Ok((num, unit))
}

/// Round a non-negative amount into `u64`, rejecting values it cannot hold
fn to_whole(value: f64, quantity: &str) -> Result<u64> {
    let rounded = value.round();
    // 2^64 is the first f64 above u64::MAX
    if !rounded.is_finite() || rounded < 0.0 || rounded >= 18_446_744_073_709_551_616.0 {
        return Err(Error::QuantityParse(format!("quantity out of range: {}", quantity)));
    }
    Ok(rounded as u64)
}

/// Parse a CPU quantity into millicores ("100m" -> 100, "1.5" -> 1500)
pub fn parse_cpu_millicores(s: &str) -> Result<u64> {
    let (num, unit) = split_quantity(s)?;
    let millis = match unit {
        "" => num * 1000.0,
        "m" => num,
        "k" => num * 1_000_000.0,
        _ => {
            return Err(Error::QuantityParse(format!(
                "unknown cpu unit '{}' (expected m, k or none)",
                unit
            )))
        }
    };
    to_whole(millis, s)
}

/// Parse a memory quantity into bytes
pub fn parse_memory_bytes(s: &str) -> Result<f64> {
    let (num, unit) = split_quantity(s)?;
    let multiplier: f64 = match unit {
        "" => 1.0,
        "m" => 1e-3,
        "k" | "K" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Pi" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Ei" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => {
            return Err(Error::QuantityParse(format!(
                "unknown memory unit '{}' (expected a decimal or binary SI suffix)",
                unit
            )))
        }
    };
    let bytes = num * multiplier;
    if !bytes.is_finite() {
        return Err(Error::QuantityParse(format!("quantity out of range: {}", s)));
    }
    Ok(bytes)
}

/// Parse a memory quantity into megabytes, rounded to the nearest unit
pub fn parse_memory_mb(s: &str) -> Result<u64> {
    to_whole(parse_memory_bytes(s)? / BYTES_PER_MB, s)
}

fn sum_side(values: &[&BTreeMap<String, String>]) -> Result<QuantityTotals> {
    let mut cpu = 0u64;
    let mut memory_bytes = 0f64;

    for map in values {
        if let Some(q) = map.get("cpu") {
            cpu = cpu
                .checked_add(parse_cpu_millicores(q)?)
                .ok_or_else(|| Error::QuantityParse(format!("cpu total out of range at {}", q)))?;
        }
        if let Some(q) = map.get("memory") {
            memory_bytes += parse_memory_bytes(q)?;
        }
    }

    Ok(QuantityTotals {
        cpu_millicores: cpu,
        memory_mb: to_whole(memory_bytes / BYTES_PER_MB, "memory total")?,
    })
}

/// Sum CPU and memory over a set of slot requirements
pub fn total_resources<'a, I>(requirements: I) -> Result<ResourceTotals>
where
    I: IntoIterator<Item = &'a ResourceRequirements>,
{
    let requirements: Vec<&ResourceRequirements> = requirements.into_iter().collect();
    let requests: Vec<&BTreeMap<String, String>> =
        requirements.iter().map(|r| &r.requests).collect();
    let limits: Vec<&BTreeMap<String, String>> = requirements.iter().map(|r| &r.limits).collect();

    Ok(ResourceTotals {
        requests: sum_side(&requests)?,
        limits: sum_side(&limits)?,
    })
}
