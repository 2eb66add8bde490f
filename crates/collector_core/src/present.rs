//! Content-type specific presentation of extracted records.
//!
//! Each template picks the groups it knows about (pricing, schedule,
//! location, details, images, contact) and includes a group only when at
//! least one of its rows has a value.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::content_type::{select_template, ContentType, Template};
use crate::format::{format_area, format_currency, format_relative_time};
use crate::model::{display_value, is_empty_value, Classification, ExtractedRecord};

/// Number of image URLs listed before the rest are summarized.
pub const MAX_LISTED_IMAGES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordView {
    pub template: Template,
    pub title: String,
    pub url: Option<String>,
    pub badge: String,
    pub extracted: Option<String>,
    pub sections: Vec<Section>,
}

impl RecordView {
    pub fn section(&self, heading: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.heading == heading)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub rows: Vec<Row>,
}

impl Section {
    pub fn value(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub label: String,
    pub value: String,
}

struct SectionBuilder {
    heading: &'static str,
    rows: Vec<Row>,
}

impl SectionBuilder {
    fn new(heading: &'static str) -> Self {
        Self {
            heading,
            rows: Vec::new(),
        }
    }

    fn row(mut self, label: &str, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.rows.push(Row {
                label: label.to_string(),
                value,
            });
        }
        self
    }

    fn list(self, label: &str, items: Vec<String>) -> Self {
        let joined = (!items.is_empty()).then(|| items.join(", "));
        self.row(label, joined)
    }

    fn push_into(self, sections: &mut Vec<Section>) {
        if !self.rows.is_empty() {
            sections.push(Section {
                heading: self.heading.to_string(),
                rows: self.rows,
            });
        }
    }
}

/// Builds the view for `record`, dispatching on the classification's content
/// type and falling back to the record's own tag.
pub fn present(
    record: &ExtractedRecord,
    classification: &Classification,
    now: DateTime<Utc>,
) -> RecordView {
    let tag = classification
        .content_type
        .clone()
        .or_else(|| record.content_type());
    let template = select_template(tag.as_deref());

    let mut sections = Vec::new();
    match template {
        Template::RealEstate => real_estate(record, &mut sections),
        Template::Tour => tour(record, &mut sections),
        Template::Restaurant => restaurant(record, &mut sections),
        Template::Transportation => transportation(record, &mut sections),
        Template::LocalTips => local_tips(record, &mut sections),
        Template::Generic => generic(record, &mut sections),
    }
    if template != Template::Generic {
        images(record, &mut sections);
        contact(record, &mut sections);
    }

    let badge = match template {
        Template::Generic => tag.unwrap_or_else(|| "Unclassified".to_string()),
        _ => tag
            .as_deref()
            .and_then(ContentType::parse)
            .map(|ct| ct.label().to_string())
            .unwrap_or_default(),
    };
    let badge = match classification.confidence {
        Some(confidence) => format!("{badge} ({:.0}%)", confidence * 100.0),
        None => badge,
    };

    RecordView {
        template,
        title: record.title().unwrap_or_else(|| "Untitled".to_string()),
        url: record.url(),
        badge,
        extracted: record.timestamp().map(|ts| format_relative_time(ts, now)),
        sections,
    }
}

fn price(record: &ExtractedRecord, amount_paths: &[&str]) -> Option<String> {
    let currency = record.text(&["currency", "pricing.currency", "price_currency"]);
    match record.number(amount_paths) {
        Some(amount) => Some(format_currency(amount, currency.as_deref())),
        // Free-form prices such as "Contact for price" are shown as-is.
        None => record.text(amount_paths),
    }
}

fn area(record: &ExtractedRecord) -> Option<String> {
    let unit = record.text(&["area_unit", "details.area_unit"]);
    record
        .number(&["area", "size", "details.area"])
        .map(|value| format_area(value, unit.as_deref()))
}

fn location(record: &ExtractedRecord, sections: &mut Vec<Section>) {
    SectionBuilder::new("Location")
        .row("Address", record.text(&["address", "location.address"]))
        .row("Ward", record.text(&["ward", "location.ward"]))
        .row("District", record.text(&["district", "location.district"]))
        .row("City", record.text(&["city", "location.city", "province"]))
        .row("Country", record.text(&["country", "location.country"]))
        .push_into(sections);
}

fn images(record: &ExtractedRecord, sections: &mut Vec<Section>) {
    let urls = record.images();
    if urls.is_empty() {
        return;
    }
    let mut builder = SectionBuilder::new("Images").row("Count", Some(urls.len().to_string()));
    for (index, url) in urls.iter().take(MAX_LISTED_IMAGES).enumerate() {
        builder = builder.row(&format!("#{}", index + 1), Some(url.clone()));
    }
    builder.push_into(sections);
}

fn contact(record: &ExtractedRecord, sections: &mut Vec<Section>) {
    SectionBuilder::new("Contact")
        .row(
            "Name",
            record.text(&["contact.name", "contact_name", "agent", "operator"]),
        )
        .row("Phone", record.text(&["contact.phone", "contact_phone", "phone"]))
        .row("Email", record.text(&["contact.email", "contact_email", "email"]))
        .row("Website", record.text(&["contact.website", "website"]))
        .push_into(sections);
}

fn description(record: &ExtractedRecord, sections: &mut Vec<Section>) {
    SectionBuilder::new("Description")
        .row("Summary", record.text(&["description", "summary"]))
        .push_into(sections);
}

fn real_estate(record: &ExtractedRecord, sections: &mut Vec<Section>) {
    SectionBuilder::new("Pricing")
        .row("Price", price(record, &["price", "pricing.price"]))
        .row(
            "Price per m²",
            price(record, &["price_per_m2", "pricing.price_per_m2"]),
        )
        .row("Period", record.text(&["rent_period", "pricing.period"]))
        .push_into(sections);
    SectionBuilder::new("Details")
        .row("Property type", record.text(&["property_type", "details.property_type"]))
        .row("Listing type", record.text(&["listing_type", "transaction_type"]))
        .row("Area", area(record))
        .row("Bedrooms", record.text(&["bedrooms", "details.bedrooms"]))
        .row("Bathrooms", record.text(&["bathrooms", "details.bathrooms"]))
        .row("Floors", record.text(&["floors", "details.floors"]))
        .row("Direction", record.text(&["direction", "details.direction"]))
        .row("Legal status", record.text(&["legal_status", "details.legal_status"]))
        .push_into(sections);
    location(record, sections);
    description(record, sections);
}

fn tour(record: &ExtractedRecord, sections: &mut Vec<Section>) {
    SectionBuilder::new("Pricing")
        .row("Price", price(record, &["price", "pricing.price", "price_per_person"]))
        .row("Price for children", price(record, &["child_price", "pricing.child_price"]))
        .push_into(sections);
    SectionBuilder::new("Schedule")
        .row("Duration", record.text(&["duration", "schedule.duration"]))
        .row(
            "Departure",
            record.text(&["departure_date", "schedule.departure", "start_date"]),
        )
        .row("Return", record.text(&["return_date", "schedule.return", "end_date"]))
        .list("Itinerary", record.list(&["itinerary", "schedule.itinerary"]))
        .push_into(sections);
    SectionBuilder::new("Location")
        .list("Destinations", record.list(&["destinations", "destination"]))
        .row("Meeting point", record.text(&["departure_point", "meeting_point"]))
        .push_into(sections);
    SectionBuilder::new("Details")
        .row("Tour type", record.text(&["tour_type"]))
        .row("Group size", record.text(&["group_size", "max_participants"]))
        .list("Includes", record.list(&["includes", "inclusions"]))
        .list("Excludes", record.list(&["excludes", "exclusions"]))
        .push_into(sections);
    description(record, sections);
}

fn restaurant(record: &ExtractedRecord, sections: &mut Vec<Section>) {
    SectionBuilder::new("Details")
        .list("Cuisine", record.list(&["cuisine", "cuisine_type"]))
        .row("Rating", record.text(&["rating"]))
        .row("Price range", record.text(&["price_range"]))
        .list("Specialties", record.list(&["specialties", "menu_highlights"]))
        .push_into(sections);
    SectionBuilder::new("Pricing")
        .row("Average price", price(record, &["average_price", "pricing.average"]))
        .push_into(sections);
    SectionBuilder::new("Schedule")
        .row("Opening hours", opening_hours(record))
        .push_into(sections);
    location(record, sections);
    description(record, sections);
}

fn opening_hours(record: &ExtractedRecord) -> Option<String> {
    match record.lookup("opening_hours")? {
        Value::Object(days) => {
            let parts: Vec<String> = days
                .iter()
                .filter_map(|(day, hours)| display_value(hours).map(|h| format!("{day}: {h}")))
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => {
            let items = record.list(&["opening_hours"]);
            if items.is_empty() {
                record.text(&["opening_hours"])
            } else {
                Some(items.join("; "))
            }
        }
    }
}

fn transportation(record: &ExtractedRecord, sections: &mut Vec<Section>) {
    SectionBuilder::new("Route")
        .row("Type", record.text(&["transport_type", "vehicle_type"]))
        .row("Operator", record.text(&["operator", "company"]))
        .row("From", record.text(&["from", "origin", "route.from"]))
        .row("To", record.text(&["to", "destination", "route.to"]))
        .list("Stops", record.list(&["stops", "route.stops"]))
        .push_into(sections);
    SectionBuilder::new("Schedule")
        .row("Departure", record.text(&["departure_time", "schedule.departure"]))
        .row("Arrival", record.text(&["arrival_time", "schedule.arrival"]))
        .row("Duration", record.text(&["duration", "schedule.duration"]))
        .row("Frequency", record.text(&["frequency", "schedule.frequency"]))
        .push_into(sections);
    SectionBuilder::new("Pricing")
        .row("Fare", price(record, &["price", "fare", "pricing.price"]))
        .push_into(sections);
    description(record, sections);
}

fn local_tips(record: &ExtractedRecord, sections: &mut Vec<Section>) {
    SectionBuilder::new("Details")
        .row("Category", record.text(&["category", "tip_category"]))
        .list("Tips", record.list(&["tips", "recommendations"]))
        .row("Best time", record.text(&["best_time", "best_time_to_visit"]))
        .row("Cost", price(record, &["price", "estimated_cost"]))
        .push_into(sections);
    location(record, sections);
    description(record, sections);
}

/// Every non-empty top-level field, in key order. Arrays are summarized as a
/// count and objects are flattened one level with dotted labels.
fn generic(record: &ExtractedRecord, sections: &mut Vec<Section>) {
    let mut fields: Vec<_> = record.fields().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let mut rows = Vec::new();
    for (key, value) in fields {
        if is_empty_value(value) {
            continue;
        }
        match value {
            Value::Array(items) => rows.push(Row {
                label: key.clone(),
                value: format!("{} items", items.len()),
            }),
            Value::Object(children) => {
                let mut children: Vec<_> = children.iter().collect();
                children.sort_by(|a, b| a.0.cmp(b.0));
                for (child, child_value) in children {
                    if let Some(text) = display_value(child_value) {
                        rows.push(Row {
                            label: format!("{key}.{child}"),
                            value: text,
                        });
                    }
                }
            }
            scalar => {
                if let Some(text) = display_value(scalar) {
                    rows.push(Row {
                        label: key.clone(),
                        value: text,
                    });
                }
            }
        }
    }
    if !rows.is_empty() {
        sections.push(Section {
            heading: "Fields".to_string(),
            rows,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn real_estate_renders_nested_groups_and_skips_empty_ones() {
        let record = ExtractedRecord::from_value(json!({
            "title": "Riverside apartment",
            "url": "https://example.com/listing/1",
            "pricing": {"price": 3500000000u64, "currency": "VND"},
            "area": 72,
            "bedrooms": 2,
            "address": "12 Nguyen Hue",
            "city": "Ho Chi Minh City",
            "contact": {"name": "Lan", "phone": "0900 000 000"},
            "images": ["https://img/1.jpg", "https://img/2.jpg", "https://img/3.jpg", "https://img/4.jpg"],
            "created_at": "2024-06-10T09:00:00Z"
        }));
        let classification = Classification {
            content_type: Some("real_estate".to_string()),
            ..Classification::default()
        };

        let view = present(&record, &classification, now());

        assert_eq!(view.template, Template::RealEstate);
        assert_eq!(view.badge, "Real estate");
        assert_eq!(view.extracted.as_deref(), Some("3 hours ago"));
        let pricing = view.section("Pricing").unwrap();
        assert_eq!(pricing.value("Price"), Some("3,500,000,000 ₫"));
        assert_eq!(pricing.rows.len(), 1);
        assert_eq!(view.section("Details").unwrap().value("Area"), Some("72 m²"));
        assert_eq!(view.section("Location").unwrap().value("City"), Some("Ho Chi Minh City"));
        let images = view.section("Images").unwrap();
        assert_eq!(images.value("Count"), Some("4"));
        assert_eq!(images.rows.len(), 1 + MAX_LISTED_IMAGES);
        assert_eq!(view.section("Contact").unwrap().value("Phone"), Some("0900 000 000"));
        assert!(view.section("Description").is_none());
    }

    #[test]
    fn free_form_price_is_kept_verbatim() {
        let record = ExtractedRecord::from_value(json!({"price": "Contact for price"}));
        let view = present(
            &record,
            &Classification {
                content_type: Some("property".to_string()),
                ..Classification::default()
            },
            now(),
        );
        assert_eq!(
            view.section("Pricing").unwrap().value("Price"),
            Some("Contact for price")
        );
    }

    #[test]
    fn record_tag_is_used_when_classification_is_missing() {
        let record = ExtractedRecord::from_value(json!({
            "title": "Pho 24",
            "content_type": "Restaurant",
            "cuisine": ["Vietnamese", "Noodles"],
            "opening_hours": {"mon": "07:00-22:00", "tue": "07:00-22:00"}
        }));
        let view = present(&record, &Classification::default(), now());
        assert_eq!(view.template, Template::Restaurant);
        assert_eq!(
            view.section("Details").unwrap().value("Cuisine"),
            Some("Vietnamese, Noodles")
        );
        assert_eq!(
            view.section("Schedule").unwrap().value("Opening hours"),
            Some("mon: 07:00-22:00; tue: 07:00-22:00")
        );
    }

    #[test]
    fn tour_transport_and_tips_pick_their_groups() {
        let tour_view = present(
            &ExtractedRecord::from_value(json!({
                "duration": "3 days", "itinerary": ["Hanoi", "Ha Long"], "price": 199, "currency": "USD"
            })),
            &Classification { content_type: Some("tour".into()), ..Classification::default() },
            now(),
        );
        assert_eq!(tour_view.section("Schedule").unwrap().value("Itinerary"), Some("Hanoi, Ha Long"));
        assert_eq!(tour_view.section("Pricing").unwrap().value("Price"), Some("$199"));

        let transport_view = present(
            &ExtractedRecord::from_value(json!({"from": "Hanoi", "to": "Hue", "departure_time": "19:00"})),
            &Classification { content_type: Some("transport".into()), ..Classification::default() },
            now(),
        );
        assert_eq!(transport_view.template, Template::Transportation);
        assert_eq!(transport_view.section("Route").unwrap().value("To"), Some("Hue"));

        let tips_view = present(
            &ExtractedRecord::from_value(json!({"tips": ["Go early", "Bring cash"]})),
            &Classification { content_type: Some("tips".into()), ..Classification::default() },
            now(),
        );
        assert_eq!(tips_view.section("Details").unwrap().value("Tips"), Some("Go early, Bring cash"));
    }

    #[test]
    fn generic_view_lists_non_empty_fields_in_key_order() {
        let record = ExtractedRecord::from_value(json!({
            "title": "Something",
            "empty": "",
            "nothing": null,
            "tags": ["a", "b"],
            "meta": {"author": "x", "blank": " "},
            "score": 3.5
        }));
        let view = present(&record, &Classification::default(), now());
        assert_eq!(view.template, Template::Generic);
        assert_eq!(view.badge, "Unclassified");
        let labels: Vec<_> = view.sections[0].rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["meta.author", "score", "tags", "title"]);
        assert_eq!(view.sections[0].value("tags"), Some("2 items"));
    }

    #[test]
    fn confidence_is_appended_to_badge() {
        let view = present(
            &ExtractedRecord::default(),
            &Classification {
                content_type: Some("tour".into()),
                page_type: Some("detail".into()),
                confidence: Some(0.87),
            },
            now(),
        );
        assert_eq!(view.badge, "Tour (87%)");
        assert_eq!(view.title, "Untitled");
        assert!(view.sections.is_empty());
    }
}
