//! Menu catalog
//!
//! Read-only mapping from item code to name and unit price. Loaded once at
//! startup (built-in defaults or a TOML file) and immutable for the process
//! lifetime; price changes take effect on restart and never rewrite history,
//! because every order snapshots its item name and unit price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single menu item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Human-readable name
    pub name: String,

    /// Unit price (exact decimal)
    pub unit_price: Decimal,
}

/// Immutable item catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Menu {
    items: BTreeMap<String, MenuItem>,
}

impl Menu {
    /// Build from explicit items
    pub fn new(items: BTreeMap<String, MenuItem>) -> Self {
        Self { items }
    }

    /// The stock cafeteria menu
    pub fn builtin() -> Self {
        let mut items = BTreeMap::new();
        let mut add = |code: &str, name: &str, cents: i64| {
            items.insert(
                code.to_string(),
                MenuItem {
                    name: name.to_string(),
                    unit_price: Decimal::new(cents, 2),
                },
            );
        };

        add("coffee", "Coffee", 250);
        add("tea", "Tea", 200);
        add("sandwich", "Sandwich", 500);
        add("burger", "Burger", 800);
        add("pizza", "Pizza Slice", 450);
        add("salad", "Salad", 600);
        add("juice", "Fresh Juice", 350);
        add("cake", "Cake Slice", 400);

        Self { items }
    }

    /// Load from a TOML file
    ///
    /// Expected shape: `[items.coffee] name = "Coffee" unit_price = "2.50"`.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        #[derive(Deserialize)]
        struct MenuFile {
            items: BTreeMap<String, MenuItem>,
        }

        let content = std::fs::read_to_string(path)?;
        let file: MenuFile = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse menu: {}", e)))?;

        if file.items.is_empty() {
            return Err(crate::Error::Config("Menu has no items".to_string()));
        }
        for (code, item) in &file.items {
            if item.unit_price < Decimal::ZERO {
                return Err(crate::Error::Config(format!(
                    "Menu item {} has negative price",
                    code
                )));
            }
        }

        Ok(Self { items: file.items })
    }

    /// Resolve an item code (case-insensitive, as typed in chat)
    pub fn resolve(&self, code: &str) -> Option<&MenuItem> {
        self.items.get(&code.to_lowercase())
    }

    /// Iterate items in code order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MenuItem)> {
        self.items.iter()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the menu is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
