//! Narrative notes ingest.
//!
//! `notes.json` carries the clinician-authored commentary that accompanies
//! the numbers. Its lines may reference projection results through `{key}`
//! placeholders; substitution happens in the report layer, this module only
//! loads and checks the file shape.

use std::fs::File;
use std::path::Path;

use crate::domain::NotesFile;
use crate::error::{AppError, EXIT_INPUT};

/// Read a `notes.json` narrative file.
pub fn load_notes_file(path: &Path) -> Result<NotesFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to open notes file '{}': {e}", path.display()),
        )
    })?;
    let notes: NotesFile = serde_json::from_reader(file).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Invalid notes file '{}': {e}", path.display()),
        )
    })?;
    Ok(notes)
}

/// Write a `notes.json` narrative file, pretty-printed for hand editing.
pub fn write_notes_file(path: &Path, notes: &NotesFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to create notes file '{}': {e}", path.display()),
        )
    })?;
    serde_json::to_writer_pretty(file, notes)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write notes file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_schema_parses() {
        let notes: NotesFile = serde_json::from_str(
            r#"{
              "title": "Free Light Chain Analysis",
              "sections": [
                {
                  "title": "Current Status",
                  "content": [
                    "Latest kappa: {latest_kappa:.1f} mg/L on {latest_date}.",
                    "VGPR threshold ({vgpr} mg/L) projected for {vgpr_date}."
                  ]
                },
                { "title": "Caveats", "content": [] }
              ]
            }"#,
        )
        .unwrap();
        assert_eq!(notes.title, "Free Light Chain Analysis");
        assert_eq!(notes.sections.len(), 2);
        assert_eq!(notes.sections[0].content.len(), 2);
        assert!(notes.sections[1].content.is_empty());
    }
}
