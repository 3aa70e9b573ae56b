//! `syncq select <file>` – run the download file selector offline.

use anyhow::{Context, Result};
use std::path::Path;
use syncq_core::selection::{select_candidate, Candidate, QualityPreference};

pub fn run_select(path: &Path, quality: QualityPreference) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read candidates {}", path.display()))?;
    let candidates: Vec<Candidate> = serde_json::from_str(&text)
        .with_context(|| format!("parse candidates {}", path.display()))?;

    match select_candidate(&candidates, quality) {
        Some(chosen) => println!("{}", serde_json::to_string_pretty(chosen)?),
        None => println!(
            "No candidate matches quality `{quality}` ({} considered)",
            candidates.len()
        ),
    }
    Ok(())
}
