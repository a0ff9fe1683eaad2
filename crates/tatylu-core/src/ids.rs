//! # Identifiers
//!
//! Product references and object-id generation.
//!
//! ## Two Ways To Name A Product
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client sends          ProductRef                 Looked up by          │
//! │  ─────────────         ──────────────────────     ───────────────────   │
//! │  "65a1b2...d0e1"  ──►  Canonical("65a1...")  ──►  products.id           │
//! │  101 / "0101"     ──►  Alternate("101")      ──►  products.code         │
//! │  "CAM-XL"         ──►  Alternate("CAM-XL")   ──►  products.code         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both forms resolve through one [`ProductLookup`] keyed by the normalized
//! reference: every spelling of one identifier (`101`, `"0101"`, `" 101 "`)
//! shares one entry.

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use uuid::Uuid;

use crate::types::Product;

/// Length of a canonical object id in hex characters.
pub const OBJECT_ID_LEN: usize = 24;

// =============================================================================
// Object Id
// =============================================================================

/// Generates a new 24-hex object id: 4 bytes of seconds since the epoch
/// followed by 8 random bytes.
///
/// Ids generated later sort after earlier ones (at second granularity).
pub fn new_object_id() -> String {
    let seconds = Utc::now().timestamp().max(0) as u32;
    let random = Uuid::new_v4();
    let mut id = format!("{:08x}", seconds);
    for byte in &random.as_bytes()[..8] {
        id.push_str(&format!("{:02x}", byte));
    }
    id
}

/// Checks whether `value` is a canonical object id (24 hex characters).
pub fn is_object_id(value: &str) -> bool {
    value.len() == OBJECT_ID_LEN && value.chars().all(|c| c.is_ascii_hexdigit())
}

// =============================================================================
// Product Reference
// =============================================================================

/// A product reference as sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductRef {
    /// Primary key, lower-cased.
    Canonical(String),
    /// External code. Integer codes are normalized (`"0101"` → `"101"`).
    Alternate(String),
}

impl ProductRef {
    /// Classifies a raw identifier. Returns `None` for blank input.
    ///
    /// ## Example
    /// ```rust
    /// use tatylu_core::ids::ProductRef;
    ///
    /// assert!(matches!(ProductRef::parse("65A1B2C3D4E5F6A7B8C9D0E1"), Some(ProductRef::Canonical(_))));
    /// assert_eq!(ProductRef::parse(" 0101 "), Some(ProductRef::Alternate("101".into())));
    /// assert_eq!(ProductRef::parse("   "), None);
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if is_object_id(raw) {
            return Some(ProductRef::Canonical(raw.to_ascii_lowercase()));
        }
        let code = match raw.parse::<i64>() {
            Ok(n) => n.to_string(),
            Err(_) => raw.to_string(),
        };
        Some(ProductRef::Alternate(code))
    }

    /// The normalized identifier, used as the lookup key.
    pub fn key(&self) -> &str {
        match self {
            ProductRef::Canonical(id) | ProductRef::Alternate(id) => id,
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, ProductRef::Canonical(_))
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// Product Lookup
// =============================================================================

/// Products resolved for a batch of references, keyed by the normalized
/// [`ProductRef`] (see [`ProductRef::parse`]).
///
/// Unresolved references are simply absent.
#[derive(Debug, Clone, Default)]
pub struct ProductLookup {
    by_ref: HashMap<ProductRef, Product>,
}

impl ProductLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a lookup from fetched rows, indexing each product under every
    /// requested reference it satisfies.
    pub fn from_products<'a>(
        refs: impl IntoIterator<Item = &'a ProductRef>,
        products: impl IntoIterator<Item = Product>,
    ) -> Self {
        let mut by_id = HashMap::new();
        let mut by_code = HashMap::new();
        for product in products {
            if let Some(code) = &product.code {
                by_code.insert(code.clone(), product.clone());
            }
            by_id.insert(product.id.clone(), product);
        }

        let mut lookup = Self::new();
        for reference in refs {
            let found = match reference {
                ProductRef::Canonical(id) => by_id.get(id),
                ProductRef::Alternate(code) => by_code.get(code),
            };
            if let Some(product) = found {
                lookup.insert(reference.clone(), product.clone());
            }
        }
        lookup
    }

    pub fn insert(&mut self, reference: ProductRef, product: Product) {
        self.by_ref.insert(reference, product);
    }

    pub fn get(&self, reference: &ProductRef) -> Option<&Product> {
        self.by_ref.get(reference)
    }

    pub fn contains(&self, reference: &ProductRef) -> bool {
        self.by_ref.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.by_ref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ref.is_empty()
    }
}
