use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{InventoryError, Result};
use crate::lot::Conditions;
use crate::schema::{Field, Schema};

/// A storage location shown in the forms, backed by one worksheet.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Location {
    /// Display name used in forms and written into the storage location column.
    pub name: String,
    /// Worksheet title in the stock workbook.
    pub sheet: String,
}

/// Canned notes the ledger writes on behalf of the user.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Phrases {
    pub new_stock: String,
    /// Prefix for notes on consumed rows when none are given: "<used_from> <source>".
    pub used_from: String,
    /// Prefix for notes when a usage date is given: "<used_on> <date>".
    pub used_on: String,
}

impl Default for Phrases {
    fn default() -> Self {
        Phrases {
            new_stock: "New stock".to_string(),
            used_from: "Used from".to_string(),
            used_on: "Used on".to_string(),
        }
    }
}

/// Everything that differs between deployments of the dashboard: which
/// worksheets exist, their header layouts, and the wording of conditions.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Profile {
    pub title: String,
    pub locations: Vec<Location>,
    /// Worksheet receiving consumed or shipped goods.
    pub consumed_sheet: String,
    #[serde(default = "Schema::stock")]
    pub stock_schema: Schema,
    #[serde(default = "Schema::consumed")]
    pub consumed_schema: Schema,
    #[serde(default = "Schema::audit")]
    pub log_schema: Schema,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub phrases: Phrases,
}

/// Where a transfer ends up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination<'a> {
    Location(&'a Location),
    Consumed,
}

impl Default for Profile {
    fn default() -> Self {
        Profile {
            title: "Inventory Dashboard".to_string(),
            locations: vec![Location {
                name: "Main Warehouse".to_string(),
                sheet: "Stock".to_string(),
            }],
            consumed_sheet: "Consumed".to_string(),
            stock_schema: Schema::stock(),
            consumed_schema: Schema::consumed(),
            log_schema: Schema::audit(),
            conditions: Conditions::default(),
            phrases: Phrases::default(),
        }
    }
}

impl Profile {
    /// Load and validate a profile from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let profile: Profile = serde_json::from_str(&contents)?;
        profile.validate()?;
        log::info!(
            "loaded profile '{}' from {} ({} location(s))",
            profile.title,
            path.display(),
            profile.locations.len()
        );
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        if self.locations.is_empty() {
            return Err(InventoryError::Config(
                "profile needs at least one location".to_string(),
            ));
        }
        for (i, loc) in self.locations.iter().enumerate() {
            if loc.name.trim().is_empty() || loc.sheet.trim().is_empty() {
                return Err(InventoryError::Config(format!(
                    "location #{} has an empty name or sheet",
                    i + 1
                )));
            }
            if self.locations[..i].iter().any(|l| l.name == loc.name) {
                return Err(InventoryError::Config(format!(
                    "location '{}' is listed twice",
                    loc.name
                )));
            }
            if self.locations[..i].iter().any(|l| l.sheet == loc.sheet) {
                return Err(InventoryError::Config(format!(
                    "location '{}' shares worksheet '{}' with another location",
                    loc.name, loc.sheet
                )));
            }
            if loc.sheet == self.consumed_sheet {
                return Err(InventoryError::Config(format!(
                    "location '{}' shares the consumed worksheet",
                    loc.name
                )));
            }
        }

        let keyed = [Field::Seq, Field::Name, Field::Quantity, Field::Condition];
        let mut stock_fields = keyed.to_vec();
        stock_fields.push(Field::DateIn);
        self.stock_schema
            .require(&stock_fields)
            .map_err(|e| InventoryError::Config(format!("stock {}", e)))?;
        self.consumed_schema
            .require(&keyed)
            .map_err(|e| InventoryError::Config(format!("consumed {}", e)))?;
        self.log_schema
            .require(&[Field::Seq])
            .map_err(|e| InventoryError::Config(format!("log {}", e)))?;
        Ok(())
    }

    pub fn location(&self, name: &str) -> Result<&Location> {
        self.locations
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| InventoryError::UnknownLocation(name.to_string()))
    }

    /// Resolve a transfer target: a location display name, or the consumed
    /// worksheet's title.
    pub fn destination(&self, name: &str) -> Result<Destination<'_>> {
        if name == self.consumed_sheet {
            return Ok(Destination::Consumed);
        }
        self.location(name).map(Destination::Location)
    }

    /// Every worksheet title of the stock workbook this profile uses.
    pub fn sheets(&self) -> Vec<(&str, &Schema)> {
        let mut sheets: Vec<(&str, &Schema)> = self
            .locations
            .iter()
            .map(|l| (l.sheet.as_str(), &self.stock_schema))
            .collect();
        sheets.push((self.consumed_sheet.as_str(), &self.consumed_schema));
        sheets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_valid() {
        let profile = Profile::default();
        profile.validate().unwrap();
        assert_eq!(profile.sheets().len(), 2);
    }

    #[test]
    fn locations_need_their_own_worksheet() {
        let mut profile = Profile::default();
        profile.locations.push(Location {
            name: "Back Room".to_string(),
            sheet: "Stock".to_string(),
        });
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("shares worksheet 'Stock'"));
    }

    #[test]
    fn destination_resolves_locations_and_consumed_sheet() {
        let profile = Profile::default();
        assert_eq!(profile.destination("Consumed").unwrap(), Destination::Consumed);
        match profile.destination("Main Warehouse").unwrap() {
            Destination::Location(loc) => assert_eq!(loc.sheet, "Stock"),
            other => panic!("unexpected destination {:?}", other),
        }
        assert!(matches!(
            profile.destination("Attic"),
            Err(InventoryError::UnknownLocation(_))
        ));
    }

    #[test]
    fn load_applies_defaults_for_omitted_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(
            &path,
            r#"{
                "title": "Lab",
                "locations": [{"name": "Shelf A", "sheet": "Shelf A"}],
                "consumed_sheet": "Used",
                "conditions": {"good": "Baik", "damaged": "Rusak", "needs_repair": "Perlu Perbaikan"}
            }"#,
        )
        .unwrap();

        let profile = Profile::load(&path).unwrap();
        assert_eq!(profile.stock_schema, Schema::stock());
        assert_eq!(profile.conditions.damaged, "Rusak");
        assert_eq!(profile.phrases, Phrases::default());
    }

    #[test]
    fn validation_rejects_duplicates_and_incomplete_schemas() {
        let mut profile = Profile::default();
        profile.locations.push(profile.locations[0].clone());
        assert!(matches!(profile.validate(), Err(InventoryError::Config(_))));

        let mut profile = Profile::default();
        profile.stock_schema.columns.retain(|c| c.field != Field::Quantity);
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("Quantity"));

        let mut profile = Profile::default();
        profile.locations[0].sheet = "Consumed".to_string();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn shipped_variant_profile_is_valid() {
        let json = include_str!("../profiles/air-quality.json");
        let profile: Profile = serde_json::from_str(json).unwrap();
        profile.validate().unwrap();
        assert_eq!(profile.consumed_schema.len(), 9);
    }
}
