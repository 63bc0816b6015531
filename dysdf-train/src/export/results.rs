use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::error::Result;

/// Write metric means as a YAML mapping with sorted keys.
pub fn write_results_yaml<'a>(
    path: &Path,
    metrics: impl IntoIterator<Item = (&'a str, f64)>,
) -> Result<()> {
    let sorted: BTreeMap<&str, f64> = metrics.into_iter().collect();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_yaml::to_string(&sorted)?)?;
    info!("Wrote {} results to {}", sorted.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results_it000010-test.yaml");
        write_results_yaml(&path, [("test/psnr", 30.5), ("test/loss", 0.25)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let loss_at = text.find("test/loss").unwrap();
        let psnr_at = text.find("test/psnr").unwrap();
        assert!(loss_at < psnr_at);

        let parsed: BTreeMap<String, f64> = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed["test/loss"], 0.25);
        assert_eq!(parsed["test/psnr"], 30.5);
    }
}
