use std::{
    env,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::Result;

/// Overrides the data directory when set and non-empty.
pub const HOME_ENV: &str = "MONEY_MANAGER_HOME";
const DEFAULT_DIR_NAME: &str = ".money_manager";
const TMP_SUFFIX: &str = "tmp";

pub const BACKUP_EXTENSION: &str = "json";
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";

pub fn default_data_dir() -> PathBuf {
    if let Ok(value) = env::var(HOME_ENV) {
        if !value.trim().is_empty() {
            return PathBuf::from(value);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Stages `data` next to `path` and renames it into place.
pub fn write_atomic(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = tmp_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

/// `{prefix}_{YYYYmmdd}_{HHMM}[_{note}].json`
pub fn backup_file_name(prefix: &str, at: DateTime<Utc>, note: Option<&str>) -> String {
    let mut name = format!("{}_{}", prefix, at.format(BACKUP_TIMESTAMP_FORMAT));
    if let Some(label) = sanitize_note(note) {
        name.push('_');
        name.push_str(&label);
    }
    name.push('.');
    name.push_str(BACKUP_EXTENSION);
    name
}

/// [`backup_file_name`], with a `_{n}` counter appended while the name is
/// already taken in `dir`.
pub fn unused_backup_name(
    dir: &Path,
    prefix: &str,
    at: DateTime<Utc>,
    note: Option<&str>,
) -> String {
    let base = backup_file_name(prefix, at, note);
    if !dir.join(&base).exists() {
        return base;
    }
    let stem = base
        .strip_suffix(&format!(".{}", BACKUP_EXTENSION))
        .unwrap_or(&base)
        .to_string();
    (2u32..)
        .map(|n| format!("{}_{}.{}", stem, n, BACKUP_EXTENSION))
        .find(|candidate| !dir.join(candidate).exists())
        .unwrap_or(base)
}

/// Lowercases the note and collapses separators to single dashes.
pub fn sanitize_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    if raw.is_empty() {
        return None;
    }
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.' | '_'))
            && !sanitized.is_empty()
            && !last_dash
        {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-').to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Reads the timestamp back out of a name built by [`backup_file_name`].
pub fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(&format!(".{}", BACKUP_EXTENSION))?;
    let segments: Vec<&str> = stem.split('_').collect();
    segments.windows(2).find_map(|pair| {
        if !is_digits(pair[0], 8) || !is_digits(pair[1], 4) {
            return None;
        }
        let raw = format!("{}{}", pair[0], pair[1]);
        NaiveDateTime::parse_from_str(&raw, "%Y%m%d%H%M")
            .ok()
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    })
}

/// Backup file names in `dir`, newest first.
pub fn list_backup_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            entries.push(name.to_string());
        }
    }
    entries.sort_by(|a, b| {
        parse_backup_timestamp(b)
            .cmp(&parse_backup_timestamp(a))
            .then_with(|| b.cmp(a))
    });
    Ok(entries)
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn backup_names_round_trip_their_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let name = backup_file_name("config", at, Some("Before  Trip!"));
        assert_eq!(name, "config_20240309_1405_before-trip.json");
        assert_eq!(parse_backup_timestamp(&name), Some(at));
        assert_eq!(parse_backup_timestamp("notes.json"), None);
    }

    #[test]
    fn taken_backup_names_get_a_counter() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let first = unused_backup_name(dir.path(), "store", at, None);
        assert_eq!(first, "store_20240309_1405.json");
        fs::write(dir.path().join(&first), "{}").unwrap();
        let second = unused_backup_name(dir.path(), "store", at, None);
        assert_eq!(second, "store_20240309_1405_2.json");
        fs::write(dir.path().join(&second), "{}").unwrap();
        assert_eq!(
            unused_backup_name(dir.path(), "store", at, None),
            "store_20240309_1405_3.json"
        );
        assert_eq!(parse_backup_timestamp(&second), Some(at));
    }

    #[test]
    fn blank_notes_are_dropped() {
        assert_eq!(sanitize_note(Some("  ")), None);
        assert_eq!(sanitize_note(Some("--")), None);
        assert_eq!(sanitize_note(None), None);
    }

    #[test]
    fn write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");
        write_atomic(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(!dir.path().join("nested").join("data.json.tmp").exists());
    }

    #[test]
    fn listing_sorts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "store_20240101_0900.json",
            "store_20240301_0900_pre-import.json",
            "store_20240201_0900.json",
            "ignored.txt",
        ] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        let names = list_backup_files(dir.path()).unwrap();
        assert_eq!(
            names,
            vec![
                "store_20240301_0900_pre-import.json",
                "store_20240201_0900.json",
                "store_20240101_0900.json",
            ]
        );
    }
}
