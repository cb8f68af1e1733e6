//! # Compute Device Selection
//!
//! GPU visibility is controlled outside the process through
//! `CUDA_VISIBLE_DEVICES`; this module only interprets that value.

use candle_core::Device;
use tracing::{info, warn};

use crate::error::{GlossaError, Result};

/// Environment variable listing the GPUs visible to the process.
pub const VISIBLE_DEVICES_ENV: &str = "CUDA_VISIBLE_DEVICES";

/// Parse a comma-separated GPU list such as `"0,1"`.
///
/// An empty value or `-1` means no GPU is visible.
pub fn parse_gpu_list(value: &str) -> Result<Vec<usize>> {
    let value = value.trim();
    if value.is_empty() || value == "-1" {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| GlossaError::InvalidDevice(value.to_string()))
        })
        .collect()
}

/// Pick the device for a visible GPU list: the first GPU when any is listed
/// (falling back to CPU without CUDA support), otherwise the CPU.
pub fn select_device(gpus: &[usize]) -> Result<Device> {
    let Some(&first) = gpus.first() else {
        info!("No GPU visible, running on CPU");
        return Ok(Device::Cpu);
    };
    if gpus.len() > 1 {
        warn!(
            "{} GPUs visible ({:?}); training runs on GPU {} only",
            gpus.len(),
            gpus,
            first
        );
    }
    let device = Device::cuda_if_available(first)?;
    if device.is_cpu() {
        warn!("CUDA is not available, running on CPU");
    } else {
        info!("Running on GPU {}", first);
    }
    Ok(device)
}

/// Select the device from `CUDA_VISIBLE_DEVICES`.
pub fn device_from_env() -> Result<Device> {
    let value = std::env::var(VISIBLE_DEVICES_ENV).unwrap_or_default();
    select_device(&parse_gpu_list(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gpu_list() {
        assert_eq!(parse_gpu_list("0").unwrap(), vec![0]);
        assert_eq!(parse_gpu_list("0,1, 3").unwrap(), vec![0, 1, 3]);
        assert!(parse_gpu_list("").unwrap().is_empty());
        assert!(parse_gpu_list("-1").unwrap().is_empty());
    }

    #[test]
    fn test_parse_gpu_list_rejects_garbage() {
        assert!(matches!(
            parse_gpu_list("0,gpu1"),
            Err(GlossaError::InvalidDevice(_))
        ));
        assert!(parse_gpu_list("0,,1").is_err());
    }

    #[test]
    fn test_no_gpu_selects_cpu() {
        assert!(select_device(&[]).unwrap().is_cpu());
    }
}
