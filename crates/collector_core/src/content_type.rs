use std::fmt;

use serde::{Deserialize, Serialize};

/// Domain category an extracted record is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    RealEstate,
    Tour,
    Restaurant,
    Transportation,
    LocalTips,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::RealEstate,
        ContentType::Tour,
        ContentType::Restaurant,
        ContentType::Transportation,
        ContentType::LocalTips,
    ];

    /// Case-insensitive match against the canonical tag and known aliases.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let parsed = match normalized.as_str() {
            "real_estate" | "realestate" | "property" | "properties" => ContentType::RealEstate,
            "tour" | "tours" | "travel" | "tourism" => ContentType::Tour,
            "restaurant" | "restaurants" | "food" | "dining" => ContentType::Restaurant,
            "transportation" | "transport" | "transit" => ContentType::Transportation,
            "local_tips" | "localtips" | "local_tip" | "tips" => ContentType::LocalTips,
            _ => return None,
        };
        Some(parsed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::RealEstate => "real_estate",
            ContentType::Tour => "tour",
            ContentType::Restaurant => "restaurant",
            ContentType::Transportation => "transportation",
            ContentType::LocalTips => "local_tips",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContentType::RealEstate => "Real estate",
            ContentType::Tour => "Tour",
            ContentType::Restaurant => "Restaurant",
            ContentType::Transportation => "Transportation",
            ContentType::LocalTips => "Local tips",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering strategy for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    RealEstate,
    Tour,
    Restaurant,
    Transportation,
    LocalTips,
    Generic,
}

impl From<ContentType> for Template {
    fn from(content_type: ContentType) -> Self {
        match content_type {
            ContentType::RealEstate => Template::RealEstate,
            ContentType::Tour => Template::Tour,
            ContentType::Restaurant => Template::Restaurant,
            ContentType::Transportation => Template::Transportation,
            ContentType::LocalTips => Template::LocalTips,
        }
    }
}

/// Unknown or absent tags fall back to the generic template.
pub fn select_template(content_type: Option<&str>) -> Template {
    content_type
        .and_then(ContentType::parse)
        .map(Template::from)
        .unwrap_or(Template::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_tags_round_trip() {
        for content_type in ContentType::ALL {
            assert_eq!(ContentType::parse(content_type.as_str()), Some(content_type));
        }
    }

    #[test]
    fn aliases_and_case_are_accepted() {
        assert_eq!(select_template(Some("Real Estate")), Template::RealEstate);
        assert_eq!(select_template(Some("REAL-ESTATE")), Template::RealEstate);
        assert_eq!(select_template(Some(" tours ")), Template::Tour);
        assert_eq!(select_template(Some("Dining")), Template::Restaurant);
        assert_eq!(select_template(Some("transit")), Template::Transportation);
        assert_eq!(select_template(Some("Local-Tips")), Template::LocalTips);
    }

    #[test]
    fn unknown_or_missing_tag_is_generic() {
        assert_eq!(select_template(None), Template::Generic);
        assert_eq!(select_template(Some("")), Template::Generic);
        assert_eq!(select_template(Some("news_article")), Template::Generic);
    }
}
