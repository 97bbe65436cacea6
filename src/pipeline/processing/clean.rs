//! Text column cleaning shared by both dataset normalizers.

use deunicode::deunicode;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{EtlError, Result};
use crate::frame::{RecordSet, Value};

/// Cleans one text cell: trim, lowercase, transliterate to ASCII.
/// Missing input and input that ends up empty both yield `None`.
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    let lowered = raw.unwrap_or("").trim().to_lowercase();
    let stripped: String = lowered.nfd().filter(|c| !is_combining_mark(*c)).collect();
    // Transliteration can emit capitals and padding ("北京" -> "Bei Jing ")
    let ascii = deunicode(&stripped).trim().to_lowercase();
    if ascii.is_empty() {
        None
    } else {
        Some(ascii)
    }
}

/// Cleans a single cell of a text column.
pub fn clean_value(column: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::from(clean_text(None))),
        Value::Text(s) => Ok(Value::from(clean_text(Some(s)))),
        other => Err(EtlError::TypeMismatch {
            column: column.to_string(),
            expected: "text",
            found: other.type_name(),
        }),
    }
}

/// Cleans the named text columns in place.
///
/// Every column is checked for existence before anything is rewritten, so a
/// missing column leaves the record set untouched.
pub fn clean_columns(records: &mut RecordSet, columns: &[&str]) -> Result<()> {
    for column in columns {
        records.column_index(column)?;
    }
    for column in columns {
        records.map_column(column, |value| clean_value(column, value))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_and_lowercases() {
        assert_eq!(clean_text(Some("  Café Tacvba ")), Some("cafe tacvba".to_string()));
        assert_eq!(clean_text(Some("BEYONCÉ")), Some("beyonce".to_string()));
        assert_eq!(clean_text(Some("Sigur Rós")), Some("sigur ros".to_string()));
    }

    #[test]
    fn test_clean_text_blank_becomes_missing() {
        assert_eq!(clean_text(Some("   ")), None);
        assert_eq!(clean_text(Some("")), None);
        assert_eq!(clean_text(None), None);
    }

    #[test]
    fn test_cleaned_output_has_no_uppercase_or_marks() {
        let inputs = ["Ñandú", " ÀÉÎÕÜ ", "Mötley Crüe", "naïve\t"];
        for input in inputs {
            let cleaned = clean_text(Some(input)).unwrap();
            assert_eq!(cleaned, cleaned.trim());
            assert!(!cleaned.chars().any(char::is_uppercase), "{cleaned}");
            assert!(!cleaned.chars().any(is_combining_mark), "{cleaned}");
            assert!(cleaned.is_ascii(), "{cleaned}");
        }
    }

    #[test]
    fn test_clean_text_transliterates_precomposed_and_non_latin() {
        assert_eq!(clean_text(Some("Røyksopp")), Some("royksopp".to_string()));
        assert_eq!(clean_text(Some("Straße")), Some("strasse".to_string()));
        assert_eq!(clean_text(Some("Łódź")), Some("lodz".to_string()));
        assert_eq!(
            clean_text(Some("Don\u{2019}t Know Why")),
            clean_text(Some("Don't Know Why"))
        );
        for input in ["MØ", "Æther", "Беларусь", "Сплин", "北京"] {
            let cleaned = clean_text(Some(input)).unwrap();
            assert!(cleaned.is_ascii(), "{input} -> {cleaned}");
            assert!(!cleaned.chars().any(char::is_uppercase), "{input} -> {cleaned}");
            assert_eq!(cleaned, cleaned.trim());
        }
    }

    #[test]
    fn test_clean_columns_rejects_non_text() {
        let mut records =
            RecordSet::from_rows(["artist"], vec![vec![Value::Integer(3)]]).unwrap();
        let err = clean_columns(&mut records, &["artist"]).unwrap_err();
        assert!(matches!(err, EtlError::TypeMismatch { found: "integer", .. }));
    }

    #[test]
    fn test_clean_columns_checks_all_columns_first() {
        let mut records = RecordSet::from_rows(
            ["artist"],
            vec![vec![Value::text(" ABBA ")]],
        )
        .unwrap();
        let err = clean_columns(&mut records, &["artist", "nominee"]).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn(c) if c == "nominee"));
        assert_eq!(records.rows()[0][0], Value::text(" ABBA "));
    }
}
