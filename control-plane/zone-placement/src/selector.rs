//! Validation and extraction of the zone/region preferences carried by a claim's selector.
//!
//! Only the zone and region failure-domain labels may be used, either as `matchLabels`
//! equality entries or as `matchExpressions` with the `In` and `NotIn` operators.
use crate::ZoneSet;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use snafu::Snafu;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};

/// The selector label keys which a claim may use to express its placement preference.
#[derive(AsRefStr, EnumString, Display, Debug, Copy, Clone, Eq, PartialEq)]
pub enum TopologyKey {
    #[strum(serialize = "failure-domain.beta.kubernetes.io/zone")]
    Zone,
    #[strum(serialize = "failure-domain.beta.kubernetes.io/region")]
    Region,
}

/// The selector expression operators which a claim may use.
#[derive(AsRefStr, EnumString, Display, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operator {
    In,
    NotIn,
}

/// Selector validation error variants.
#[derive(Debug, Snafu, Clone, Eq, PartialEq)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum SelectorError {
    #[snafu(display("Key {:?} is not permitted in selector.{}", key, section))]
    UnsupportedKey { key: String, section: &'static str },
    #[snafu(display("Operator {:?} is not permitted in selector.matchExpressions", operator))]
    UnsupportedOperator { operator: String },
    #[snafu(display(
        "Key {:?}, operator {:?} pair does not contain any value(s) in selector.matchExpressions",
        key,
        operator
    ))]
    MissingValues { key: String, operator: String },
}

/// Validates the selector of a claim.
/// Returns `true` when there's no selector or when it has neither labels nor expressions, in
/// which case the selector places no constraint on the zones.
pub fn validate(selector: Option<&LabelSelector>) -> Result<bool, SelectorError> {
    let Some(selector) = selector else {
        return Ok(true);
    };
    let labels = selector.match_labels.as_ref().filter(|l| !l.is_empty());
    let expressions = selector.match_expressions.as_ref().filter(|e| !e.is_empty());
    if labels.is_none() && expressions.is_none() {
        return Ok(true);
    }

    for key in labels.into_iter().flat_map(|labels| labels.keys()) {
        if TopologyKey::from_str(key).is_err() {
            return UnsupportedKey {
                key,
                section: "matchLabels",
            }
            .fail();
        }
    }
    for expr in expressions.into_iter().flatten() {
        if TopologyKey::from_str(&expr.key).is_err() {
            return UnsupportedKey {
                key: &expr.key,
                section: "matchExpressions",
            }
            .fail();
        }
        if Operator::from_str(&expr.operator).is_err() {
            return UnsupportedOperator {
                operator: &expr.operator,
            }
            .fail();
        }
        if expr.values.as_ref().map_or(true, Vec::is_empty) {
            return MissingValues {
                key: &expr.key,
                operator: &expr.operator,
            }
            .fail();
        }
    }
    Ok(false)
}

/// Get the `matchLabels` value for the given key, if any.
pub fn match_label(selector: Option<&LabelSelector>, key: TopologyKey) -> Option<&str> {
    selector?
        .match_labels
        .as_ref()?
        .get(key.as_ref())
        .map(String::as_str)
}

/// Get the values of every `matchExpressions` entry with the given key and operator.
/// Each expression yields its own set, in selector order, as each one constrains the zones
/// on its own.
pub fn match_expressions(
    selector: Option<&LabelSelector>,
    key: TopologyKey,
    operator: Operator,
) -> Option<Vec<ZoneSet>> {
    let sets = selector?
        .match_expressions
        .as_ref()?
        .iter()
        .filter(|expr| expr.key == key.as_ref() && expr.operator == operator.as_ref())
        .filter_map(|expr| expr.values.as_ref().filter(|values| !values.is_empty()))
        .map(|values| values.iter().cloned().collect::<ZoneSet>())
        .collect::<Vec<_>>();
    (!sets.is_empty()).then_some(sets)
}
