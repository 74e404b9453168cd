//! The editable signature record.
//!
//! `SignatureDraft` holds the four text fields shown on the card. Setters store
//! exactly what they are given and then notify the registered change handler,
//! which is how the preview gets redrawn after every edit.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

type OnChangeHandler = Arc<dyn Fn(&SignatureDraft) + Send + Sync>;

/// Separator placed between non-empty phone numbers on the card.
pub const PHONE_SEPARATOR: &str = ", ";

/// One of the four user-editable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    JobTitle,
    Phone1,
    Phone2,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Name, Field::JobTitle, Field::Phone1, Field::Phone2];

    /// Label shown next to the input.
    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "Full Name",
            Field::JobTitle => "Job Title",
            Field::Phone1 => "Phone Number 1",
            Field::Phone2 => "Phone Number 2",
        }
    }

    /// Short key used by the interactive prompt (`name=...`).
    pub fn key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::JobTitle => "title",
            Field::Phone1 => "phone1",
            Field::Phone2 => "phone2",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// In-memory record of user-entered name, title and phone numbers.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SignatureDraft {
    name: String,
    job_title: String,
    phone_numbers: [String; 2],

    #[serde(skip)]
    on_change: Option<OnChangeHandler>,
}

impl Default for SignatureDraft {
    fn default() -> Self {
        Self {
            name: "Mkhanyisi Simelane".to_string(),
            job_title: "IT Technician".to_string(),
            phone_numbers: ["+268 2417 9700".to_string(), "+268 7602 9885".to_string()],
            on_change: None,
        }
    }
}

impl fmt::Debug for SignatureDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureDraft")
            .field("name", &self.name)
            .field("job_title", &self.job_title)
            .field("phone_numbers", &self.phone_numbers)
            .finish()
    }
}

impl PartialEq for SignatureDraft {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.job_title == other.job_title
            && self.phone_numbers == other.phone_numbers
    }
}

impl SignatureDraft {
    /// A draft with the given field values and no change handler.
    pub fn new(
        name: impl Into<String>,
        job_title: impl Into<String>,
        phone1: impl Into<String>,
        phone2: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            job_title: job_title.into(),
            phone_numbers: [phone1.into(), phone2.into()],
            on_change: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job_title(&self) -> &str {
        &self.job_title
    }

    /// Phone number at `index` (0 or 1); out of range reads as empty.
    pub fn phone(&self, index: usize) -> &str {
        self.phone_numbers.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn phone_numbers(&self) -> &[String; 2] {
        &self.phone_numbers
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::JobTitle => &self.job_title,
            Field::Phone1 => &self.phone_numbers[0],
            Field::Phone2 => &self.phone_numbers[1],
        }
    }

    /// Replace `field` with `value` verbatim and notify the change handler.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        match field {
            Field::Name => self.name = value,
            Field::JobTitle => self.job_title = value,
            Field::Phone1 => self.phone_numbers[0] = value,
            Field::Phone2 => self.phone_numbers[1] = value,
        }
        if let Some(cb) = &self.on_change {
            cb(self);
        }
    }

    pub fn set_name(&mut self, value: impl Into<String>) {
        self.set(Field::Name, value);
    }

    pub fn set_job_title(&mut self, value: impl Into<String>) {
        self.set(Field::JobTitle, value);
    }

    pub fn set_phone1(&mut self, value: impl Into<String>) {
        self.set(Field::Phone1, value);
    }

    pub fn set_phone2(&mut self, value: impl Into<String>) {
        self.set(Field::Phone2, value);
    }

    /// Non-empty phone numbers joined with ", ".
    ///
    /// Both numbers empty yields an empty string, never a lone separator.
    pub fn phone_display(&self) -> String {
        self.phone_numbers
            .iter()
            .filter(|p| !p.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(PHONE_SEPARATOR)
    }

    /// Register a callback invoked after every successful set.
    pub fn on_change<F>(&mut self, cb: F)
    where
        F: Fn(&SignatureDraft) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(cb));
    }

    /// Remove previously registered change callback if any
    pub fn clear_on_change(&mut self) {
        self.on_change = None;
    }

    /// Load field values from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: &std::path::Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::ConfigError(format!("Failed to read draft {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            crate::Error::ConfigError(format!("Invalid draft {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn defaults_match_the_seeded_card() {
        let d = SignatureDraft::default();
        assert_eq!(d.name(), "Mkhanyisi Simelane");
        assert_eq!(d.job_title(), "IT Technician");
        assert_eq!(d.phone_display(), "+268 2417 9700, +268 7602 9885");
    }

    #[test]
    fn setters_store_the_last_value_verbatim() {
        let mut d = SignatureDraft::default();
        let edits = ["J", "Ja", "Jane", "  Jane Doe  ", "", "Jane Doe\t"];
        for e in edits {
            d.set_name(e);
        }
        assert_eq!(d.name(), "Jane Doe\t");

        let long = "9".repeat(10_000);
        d.set_phone2(long.clone());
        assert_eq!(d.phone(1), long);

        for field in Field::ALL {
            d.set(field, format!(" {} ", field.key()));
            assert_eq!(d.get(field), format!(" {} ", field.key()));
        }
    }

    #[test]
    fn second_phone_empty_is_omitted() {
        let d = SignatureDraft::new("Jane Doe", "Radiologist", "+268 1111 1111", "");
        assert_eq!(d.phone_display(), "+268 1111 1111");

        let d = SignatureDraft::new("Jane Doe", "Radiologist", "", "+268 2222 2222");
        assert_eq!(d.phone_display(), "+268 2222 2222");
    }

    #[test]
    fn both_phones_empty_join_to_nothing() {
        let d = SignatureDraft::new("", "", "", "");
        assert_eq!(d.phone_display(), "");
    }

    #[test]
    fn change_handler_fires_after_each_set() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        let mut d = SignatureDraft::default();
        let (c, s) = (calls.clone(), seen.clone());
        d.on_change(move |draft| {
            c.fetch_add(1, Ordering::SeqCst);
            *s.lock().unwrap() = draft.job_title().to_string();
        });

        d.set_job_title("Radiologist");
        d.set_phone1("");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*seen.lock().unwrap(), "Radiologist");

        d.clear_on_change();
        d.set_name("x");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let d: SignatureDraft = serde_json::from_str(r#"{"name":"Jane Doe"}"#).unwrap();
        assert_eq!(d.name(), "Jane Doe");
        assert_eq!(d.job_title(), "IT Technician");
    }

    #[test]
    fn field_keys_roundtrip() {
        for f in Field::ALL {
            assert_eq!(Field::from_key(f.key()), Some(f));
        }
        assert_eq!(Field::from_key("email"), None);
    }
}
