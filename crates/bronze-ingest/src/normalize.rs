//! Column-name normalization applied to every incoming frame.

use bronze_model::Frame;

/// Trims, lower-cases and replaces spaces with underscores.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Normalizes every column name in place.
///
/// When two names normalize to the same value the later column's cells win.
pub fn normalize_columns(frame: &mut Frame) {
    frame.rename_columns_with(normalize_column_name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_lowered_and_underscored() {
        assert_eq!(normalize_column_name(" Version Season "), "version_season");
        assert_eq!(normalize_column_name("castaway_id"), "castaway_id");
        assert_eq!(normalize_column_name("Played For ID"), "played_for_id");
    }
}
