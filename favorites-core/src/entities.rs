//! Concrete asset variants and their validation rules

use crate::{AssetId, AssetKind, OwnerId, ValidationError};
use serde::{Deserialize, Serialize};

/// Fields shared by every asset variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHeader {
    pub id: AssetId,
    #[serde(rename = "user_id", default, skip_serializing_if = "String::is_empty")]
    pub owner_id: OwnerId,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AssetHeader {
    pub fn new(
        kind: AssetKind,
        id: impl Into<AssetId>,
        owner_id: impl Into<OwnerId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            kind,
            name: name.into(),
            description: None,
        }
    }

    /// Validate the shared fields and check the discriminator agrees with
    /// the variant carrying this header.
    pub fn validate_common(&self, expected: AssetKind) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::missing("id"));
        }
        if self.name.is_empty() {
            return Err(ValidationError::missing("name"));
        }
        if self.kind != expected {
            return Err(ValidationError::KindMismatch {
                expected,
                got: self.kind,
            });
        }
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

/// Chart - a visualization asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chart {
    #[serde(flatten)]
    pub header: AssetHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_axis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<String>,
}

impl Chart {
    pub fn new(
        id: impl Into<AssetId>,
        owner_id: impl Into<OwnerId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            header: AssetHeader::new(AssetKind::Chart, id, owner_id, name),
            x_axis: None,
            y_axis: None,
        }
    }

    pub fn with_axes(mut self, x_axis: Option<String>, y_axis: Option<String>) -> Self {
        self.x_axis = x_axis;
        self.y_axis = y_axis;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.header.validate_common(AssetKind::Chart)?;
        if !non_empty(&self.x_axis) && !non_empty(&self.y_axis) {
            return Err(ValidationError::constraint(
                "chart_axes",
                "chart requires at least one axis to be defined",
            ));
        }
        Ok(())
    }
}

/// Insight - a textual finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(flatten)]
    pub header: AssetHeader,
    #[serde(default)]
    pub content: String,
}

impl Insight {
    pub fn new(
        id: impl Into<AssetId>,
        owner_id: impl Into<OwnerId>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            header: AssetHeader::new(AssetKind::Insight, id, owner_id, name),
            content: content.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.header.validate_common(AssetKind::Insight)?;
        if self.content.is_empty() {
            return Err(ValidationError::missing("content"));
        }
        Ok(())
    }
}

/// Targeting rules for an [`Audience`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_max: Option<i32>,
}

impl AudienceRules {
    pub fn for_country(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            ..Default::default()
        }
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_age_range(mut self, min: Option<i32>, max: Option<i32>) -> Self {
        self.age_min = min;
        self.age_max = max;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.country.is_empty() {
            return Err(ValidationError::missing("rules.country"));
        }
        if self.age_min.is_some_and(|min| min < 0) {
            return Err(ValidationError::invalid("rules.age_min", "cannot be negative"));
        }
        if self.age_max.is_some_and(|max| max < 0) {
            return Err(ValidationError::invalid("rules.age_max", "cannot be negative"));
        }
        if let (Some(min), Some(max)) = (self.age_min, self.age_max) {
            if min > max {
                return Err(ValidationError::constraint(
                    "age_range",
                    "age_min cannot be greater than age_max",
                ));
            }
        }
        Ok(())
    }
}

/// Audience - a targeting segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audience {
    #[serde(flatten)]
    pub header: AssetHeader,
    #[serde(default)]
    pub rules: AudienceRules,
}

impl Audience {
    pub fn new(
        id: impl Into<AssetId>,
        owner_id: impl Into<OwnerId>,
        name: impl Into<String>,
        rules: AudienceRules,
    ) -> Self {
        Self {
            header: AssetHeader::new(AssetKind::Audience, id, owner_id, name),
            rules,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.header.validate_common(AssetKind::Audience)?;
        self.rules.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_with_single_axis_is_valid() {
        let chart = Chart::new("1", "u1", "Revenue").with_axes(Some("month".into()), None);
        assert_eq!(chart.validate(), Ok(()));

        let chart = Chart::new("1", "u1", "Revenue").with_axes(None, Some("usd".into()));
        assert_eq!(chart.validate(), Ok(()));
    }

    #[test]
    fn test_chart_without_axes_is_rejected() {
        let chart = Chart::new("1", "u1", "Revenue");
        assert_eq!(
            chart.validate(),
            Err(ValidationError::constraint(
                "chart_axes",
                "chart requires at least one axis to be defined"
            ))
        );

        // Empty strings do not count as labels.
        let chart = Chart::new("1", "u1", "Revenue").with_axes(Some(String::new()), Some(String::new()));
        assert!(chart.validate().is_err());
    }

    #[test]
    fn test_common_fields_checked_before_variant_rules() {
        let chart = Chart::new("", "u1", "Revenue");
        assert_eq!(chart.validate(), Err(ValidationError::missing("id")));

        let insight = Insight::new("1", "u1", "", "");
        assert_eq!(insight.validate(), Err(ValidationError::missing("name")));
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let mut insight = Insight::new("1", "u1", "Note", "Knowledge");
        insight.header.kind = AssetKind::Chart;
        assert_eq!(
            insight.validate(),
            Err(ValidationError::KindMismatch {
                expected: AssetKind::Insight,
                got: AssetKind::Chart,
            })
        );
    }

    #[test]
    fn test_insight_requires_content() {
        let insight = Insight::new("1", "u1", "Note", "");
        assert_eq!(insight.validate(), Err(ValidationError::missing("content")));
    }

    #[test]
    fn test_audience_rules() {
        let ok = Audience::new(
            "1",
            "u1",
            "Adults",
            AudienceRules::for_country("PT").with_age_range(Some(18), Some(65)),
        );
        assert_eq!(ok.validate(), Ok(()));

        let no_country = Audience::new("1", "u1", "Adults", AudienceRules::default());
        assert_eq!(
            no_country.validate(),
            Err(ValidationError::missing("rules.country"))
        );

        let negative = Audience::new(
            "1",
            "u1",
            "Adults",
            AudienceRules::for_country("PT").with_age_range(Some(-1), None),
        );
        assert_eq!(
            negative.validate(),
            Err(ValidationError::invalid("rules.age_min", "cannot be negative"))
        );

        let negative_max = Audience::new(
            "1",
            "u1",
            "Adults",
            AudienceRules::for_country("PT").with_age_range(None, Some(-3)),
        );
        assert_eq!(
            negative_max.validate(),
            Err(ValidationError::invalid("rules.age_max", "cannot be negative"))
        );

        let inverted = Audience::new(
            "1",
            "u1",
            "Adults",
            AudienceRules::for_country("PT").with_age_range(Some(40), Some(20)),
        );
        assert_eq!(
            inverted.validate(),
            Err(ValidationError::constraint(
                "age_range",
                "age_min cannot be greater than age_max"
            ))
        );

        // Open-ended range is fine.
        let open = Audience::new(
            "1",
            "u1",
            "Adults",
            AudienceRules::for_country("PT").with_age_range(Some(40), None),
        );
        assert_eq!(open.validate(), Ok(()));
    }

    #[test]
    fn test_header_serializes_wire_names() {
        let insight = Insight::new("1", "u1", "Note", "Knowledge");
        let value = serde_json::to_value(&insight).unwrap();
        assert_eq!(value["id"], "1");
        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["type"], "insight");
        assert_eq!(value["content"], "Knowledge");
        assert!(value.get("description").is_none());
    }
}
