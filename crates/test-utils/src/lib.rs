//! Tessera test utilities.
//!
//! Helpers for integration testing: type document fixtures, a builder for
//! flattened form posts, and assertion utilities for JSON responses.

use serde_json::{Value as JsonValue, json};

/// Block types used across the fixtures.
pub fn block_types_document() -> JsonValue {
    json!({
        "blockTypes": [
            {
                "name": "TextBlock",
                "title": "Text",
                "fields": [
                    {"name": "Title", "kind": "string"},
                    {"name": "Body", "kind": "html"}
                ]
            },
            {
                "name": "ImageBlock",
                "title": "Image",
                "fields": [
                    {"name": "Caption", "kind": "string"},
                    {"name": "Width", "kind": "integer"},
                    {"name": "Link", "kind": "object", "fields": [
                        {"name": "Url", "kind": "string"},
                        {"name": "NewWindow", "kind": "boolean"}
                    ]}
                ]
            },
            {
                "name": "QuoteBlock",
                "title": "Quote",
                "fields": [
                    {"name": "Quote", "kind": "text"},
                    {"name": "Author", "kind": "string"}
                ]
            }
        ]
    })
}

/// Page types referencing [`block_types_document`].
///
/// `Start` mirrors a typical landing page: a heading, an intro object, a
/// slider of blocks and a body of blocks.
pub fn page_types_document() -> JsonValue {
    json!({
        "pageTypes": [
            {
                "name": "Start",
                "title": "Start page",
                "kind": "page",
                "route": "start",
                "regions": [
                    {"name": "Heading", "kind": "string"},
                    {"name": "Intro", "kind": "object", "fields": [
                        {"name": "Title", "kind": "string"},
                        {"name": "Body", "kind": "html"},
                        {"name": "Cta", "kind": "object", "fields": [
                            {"name": "Label", "kind": "string"},
                            {"name": "Url", "kind": "string"}
                        ]}
                    ]},
                    {"name": "Slider", "kind": "blocks", "allowedBlocks": ["ImageBlock"]},
                    {"name": "Body", "kind": "blocks", "allowedBlocks": ["TextBlock", "ImageBlock"]}
                ]
            },
            {
                "name": "Standard",
                "title": "Standard page",
                "kind": "page",
                "regions": [
                    {"name": "Body", "kind": "blocks", "allowedBlocks": ["TextBlock", "QuoteBlock"]}
                ]
            },
            {
                "name": "Article",
                "title": "Article",
                "kind": "post",
                "regions": [
                    {"name": "Lead", "kind": "text"},
                    {"name": "Featured", "kind": "boolean"},
                    {"name": "Body", "kind": "blocks", "allowedBlocks": ["TextBlock"]}
                ]
            }
        ]
    })
}

/// Block and page types in a single document.
pub fn site_document() -> JsonValue {
    let mut doc = block_types_document();
    if let (Some(target), Some(pages)) = (
        doc.as_object_mut(),
        page_types_document().get("pageTypes").cloned(),
    ) {
        target.insert("pageTypes".to_string(), pages);
    }
    doc
}

/// A page type whose block region names a block type that doesn't exist.
pub fn broken_page_types_document() -> JsonValue {
    json!({
        "pageTypes": [
            {
                "name": "Broken",
                "regions": [
                    {"name": "Gallery", "kind": "blocks", "allowedBlocks": ["CarouselBlock"]}
                ]
            }
        ]
    })
}

/// Builder for flattened form posts.
#[derive(Debug, Clone, Default)]
pub struct FormPost {
    fields: Vec<(String, String)>,
}

impl FormPost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw key/value pair.
    pub fn field(mut self, key: &str, value: &str) -> Self {
        self.fields.push((key.to_string(), value.to_string()));
        self
    }

    /// Start block `index` of `region` with its `__type` discriminator.
    pub fn block(self, region: &str, index: usize, block_type: &str) -> Self {
        self.field(&format!("{region}[{index}].__type"), block_type)
    }

    /// Set a field of block `index` of `region`; `path` may be dotted.
    pub fn block_field(self, region: &str, index: usize, path: &str, value: &str) -> Self {
        self.field(&format!("{region}[{index}].{path}"), value)
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<(String, String)> {
        self.fields
    }

    /// Encode as an `application/x-www-form-urlencoded` body.
    pub fn to_urlencoded(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a JSON array has `len` elements.
    pub fn array_len(value: &Value, len: usize) {
        let actual = value.as_array().map(Vec::len);
        assert_eq!(actual, Some(len), "Expected array of {len}, got: {value}");
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }
}
