//! Institutional branding
//!
//! Stored locally as four independent keys and remotely as `{key, value}`
//! rows of the settings table.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sms_common::models::Setting;

pub const DEFAULT_SCHOOL_NAME: &str = "IvorSmartSchools Academy";
pub const DEFAULT_SCHOOL_MOTTO: &str = "Smart Learning for a Smart Future";
pub const DEFAULT_SCHOOL_CONTACT: &str = "+260 977 134049";

/// One branding attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrandingField {
    SchoolName,
    SchoolMotto,
    SchoolContact,
    SchoolLogo,
}

impl BrandingField {
    pub const ALL: [BrandingField; 4] = [
        BrandingField::SchoolName,
        BrandingField::SchoolMotto,
        BrandingField::SchoolContact,
        BrandingField::SchoolLogo,
    ];

    /// Key used in the remote settings table
    pub fn key(self) -> &'static str {
        match self {
            BrandingField::SchoolName => "schoolName",
            BrandingField::SchoolMotto => "schoolMotto",
            BrandingField::SchoolContact => "schoolContact",
            BrandingField::SchoolLogo => "schoolLogo",
        }
    }

    /// Key used in the local store
    pub fn local_key(self) -> &'static str {
        match self {
            BrandingField::SchoolName => "sms_schoolName",
            BrandingField::SchoolMotto => "sms_schoolMotto",
            BrandingField::SchoolContact => "sms_schoolContact",
            BrandingField::SchoolLogo => "sms_schoolLogo",
        }
    }

    pub fn default_value(self) -> &'static str {
        match self {
            BrandingField::SchoolName => DEFAULT_SCHOOL_NAME,
            BrandingField::SchoolMotto => DEFAULT_SCHOOL_MOTTO,
            BrandingField::SchoolContact => DEFAULT_SCHOOL_CONTACT,
            BrandingField::SchoolLogo => "",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        BrandingField::ALL.into_iter().find(|f| f.key() == key)
    }
}

/// School name, motto, contact line and logo (data URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    pub school_name: String,
    pub school_motto: String,
    pub school_contact: String,
    pub school_logo: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            school_name: DEFAULT_SCHOOL_NAME.to_string(),
            school_motto: DEFAULT_SCHOOL_MOTTO.to_string(),
            school_contact: DEFAULT_SCHOOL_CONTACT.to_string(),
            school_logo: String::new(),
        }
    }
}

impl Branding {
    pub fn get(&self, field: BrandingField) -> &str {
        match field {
            BrandingField::SchoolName => &self.school_name,
            BrandingField::SchoolMotto => &self.school_motto,
            BrandingField::SchoolContact => &self.school_contact,
            BrandingField::SchoolLogo => &self.school_logo,
        }
    }

    pub fn set(&mut self, field: BrandingField, value: String) {
        match field {
            BrandingField::SchoolName => self.school_name = value,
            BrandingField::SchoolMotto => self.school_motto = value,
            BrandingField::SchoolContact => self.school_contact = value,
            BrandingField::SchoolLogo => self.school_logo = value,
        }
    }

    /// Rows for the remote settings upsert
    pub fn to_rows(&self) -> Vec<Setting> {
        BrandingField::ALL
            .into_iter()
            .map(|field| Setting {
                key: field.key().to_string(),
                value: self.get(field).to_string(),
            })
            .collect()
    }

    /// Apply remote settings rows; unknown keys and malformed rows are ignored
    ///
    /// Returns the fields that were updated, in row order.
    pub fn apply_rows(&mut self, rows: &[Value]) -> Vec<BrandingField> {
        let mut applied = Vec::new();
        for row in rows {
            let Ok(setting) = serde_json::from_value::<Setting>(row.clone()) else {
                continue;
            };
            if let Some(field) = BrandingField::from_key(&setting.key) {
                self.set(field, setting.value);
                applied.push(field);
            }
        }
        applied
    }
}
