use mpdqueue_core::{ImportUnit, ImportedFile};
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportEventError {
    #[error("failed to read import events: {0}")]
    Read(#[from] io::Error),
    #[error("invalid import event on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

/// Parse one JSON import unit per line. Blank lines are ignored.
///
/// ```text
/// {"top_level_path": "/incoming/Album", "files": [{"path": "Artist/Album/01.flac", "track_number": 1}]}
/// {"files": [{"path": "Artist/Old/01.flac", "track_number": 1}]}
/// ```
pub fn read_import_events<R: BufRead>(reader: R) -> Result<Vec<ImportUnit>, ImportEventError> {
    let mut units = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let unit = serde_json::from_str(&line).map_err(|source| ImportEventError::Parse {
            line: index + 1,
            source,
        })?;
        units.push(unit);
    }
    Ok(units)
}

/// Paths given on the command line form one fresh import, queued in argument order.
pub fn unit_from_arguments(paths: &[String]) -> ImportUnit {
    let files = paths
        .iter()
        .enumerate()
        .map(|(index, path)| ImportedFile::new(path.as_str(), index as u32 + 1))
        .collect();
    ImportUnit::fresh("command line", files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fresh_and_rescan_units() {
        let input = concat!(
            "{\"top_level_path\": \"/in/Album\", \"files\": [{\"path\": \"A/02.flac\", \"track_number\": 2}, {\"path\": \"A/01.flac\", \"track_number\": 1}]}\n",
            "\n",
            "{\"files\": [{\"path\": \"Old/01.flac\"}]}\n",
        );
        let units = read_import_events(input.as_bytes()).expect("parse");

        assert_eq!(units.len(), 2);
        assert!(units[0].is_fresh_import());
        assert_eq!(units[0].files[1], ImportedFile::new("A/01.flac", 1));
        assert!(!units[1].is_fresh_import());
        assert_eq!(units[1].files[0].track_number, 0);
    }

    #[test]
    fn empty_top_level_path_reads_as_rescan() {
        let input = r#"{"top_level_path": "", "files": [{"path": "A/01.flac", "track_number": 1}]}"#;
        let units = read_import_events(input.as_bytes()).expect("parse");
        assert!(!units[0].is_fresh_import());
    }

    #[test]
    fn reports_the_bad_line() {
        let input = "{\"files\": []}\nnot json\n";
        let err = read_import_events(input.as_bytes()).expect_err("bad line");
        assert!(matches!(err, ImportEventError::Parse { line: 2, .. }));
    }

    #[test]
    fn argument_order_becomes_track_order() {
        let unit = unit_from_arguments(&["b.flac".into(), "a.flac".into()]);
        assert!(unit.is_fresh_import());
        assert_eq!(unit.files[0], ImportedFile::new("b.flac", 1));
        assert_eq!(unit.files[1], ImportedFile::new("a.flac", 2));
    }
}
