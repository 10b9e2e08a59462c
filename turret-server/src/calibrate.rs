//! Distance Calibration (C10) server half: a terminal-driven stand-in for
//! the out-of-scope click-to-calibrate overlay (§4.10, §11). Reads typed
//! `row,distance` pairs from stdin, feeds them into
//! `turret_core::calibration::CaptureSession`, and on `done` persists a
//! named [`CalibrationRecord`] via [`CalibrationStore`].

use std::io::{BufRead, Write};

use turret_core::calibration::{CalibrationMetadata, CaptureResolution, CaptureSession};
use turret_core::CaptureError;

use crate::storage::{CalibrationStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum CaptureInputError {
    #[error("expected \"row,distance\" or \"done\", got: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SaveCaptureError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn parse_line(line: &str) -> Result<Option<(i32, f32)>, CaptureInputError> {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("done") || trimmed.is_empty() {
        return Ok(None);
    }
    let (row, distance) = trimmed
        .split_once(',')
        .ok_or_else(|| CaptureInputError::Malformed(trimmed.to_string()))?;
    let row: i32 = row
        .trim()
        .parse()
        .map_err(|_| CaptureInputError::Malformed(trimmed.to_string()))?;
    let distance: f32 = distance
        .trim()
        .parse()
        .map_err(|_| CaptureInputError::Malformed(trimmed.to_string()))?;
    Ok(Some((row, distance)))
}

/// Drives an interactive capture session over `input`/`output`, typing
/// `row,distance` one per line, `done` to finish. Returns the accumulated
/// session regardless of whether it is long enough to save; the caller
/// decides via [`CaptureSession::finish`].
pub fn run_capture_session(
    mut input: impl BufRead,
    mut output: impl Write,
) -> std::io::Result<CaptureSession> {
    let mut session = CaptureSession::new();
    writeln!(output, "Distance calibration: type \"row,distance\" per line, \"done\" to finish.")?;

    let mut line = String::new();
    loop {
        write!(output, "[{} points] > ", session.points().len())?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break; // EOF
        }
        match parse_line(&line) {
            Ok(None) if line.trim().eq_ignore_ascii_case("done") => break,
            Ok(None) => continue, // blank line
            Ok(Some((row, distance))) => session.add_point(row, distance),
            Err(e) => writeln!(output, "{e}")?,
        }
    }
    Ok(session)
}

/// Validate and save a completed capture as `name`, tagging it with the
/// resolution the points were captured at.
pub fn save_capture(
    store: &mut CalibrationStore,
    session: &CaptureSession,
    name: &str,
    source: &str,
    resolution: CaptureResolution,
    captured_at: u64,
) -> Result<(), SaveCaptureError> {
    let record = session.finish(
        name,
        CalibrationMetadata {
            source: source.to_string(),
            capture_resolution: resolution,
            captured_at,
        },
    )?;
    store.save(record)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_row_distance_pairs_until_done() {
        let input = Cursor::new(b"100,20.0\n200,10.0\n300,5.0\ndone\n".to_vec());
        let mut output = Vec::new();
        let session = run_capture_session(input, &mut output).unwrap();
        assert_eq!(session.points().len(), 3);
    }

    #[test]
    fn malformed_line_is_reported_but_does_not_abort() {
        let input = Cursor::new(b"nonsense\n100,20.0\ndone\n".to_vec());
        let mut output = Vec::new();
        let session = run_capture_session(input, &mut output).unwrap();
        assert_eq!(session.points().len(), 1);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let input = Cursor::new(b"\n100,20.0\n\ndone\n".to_vec());
        let mut output = Vec::new();
        let session = run_capture_session(input, &mut output).unwrap();
        assert_eq!(session.points().len(), 1);
    }
}
