/**
 * OPTIONS - Typage et fusion des options de collecteurs
 *
 * RÔLE :
 * Un collecteur déclare ses options dans le catalogue (type, défaut, description,
 * choix éventuels). L'installation peut surcharger n'importe laquelle. Ce module
 * produit la vue typée finale passée au constructeur du collecteur.
 *
 * FONCTIONNEMENT :
 * - `OptionSpec` : déclaration brute telle qu'écrite dans services.json
 * - `OptionValue` : valeur typée `Bool | Text` après fusion
 * - `resolve_options` : défauts du catalogue + surcharges, avec coercition sans perte
 *   ("true" → true, 5 → "5") et rejet (retour au défaut) sinon
 * - Les clés surchargées non déclarées sont passées telles quelles (best effort)
 *
 * EXEMPLE :
 * ```json
 * "unit": {"type": "string", "default": "MB", "description": "Unité", "options": ["MB", "GB"]}
 * ```
 */

use crate::storage::json_kind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Type déclaré d'une option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Boolean,
    String,
}

impl OptionKind {
    /// Accepte les orthographes historiques du catalogue ("bool", "str")
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Some(OptionKind::Boolean),
            "string" | "str" => Some(OptionKind::String),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKind::Boolean => "boolean",
            OptionKind::String => "string",
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Déclaration d'une option dans le catalogue.
///
/// Les champs sont optionnels à la lecture : un catalogue incomplet se charge
/// quand même, c'est `ServiceRegistry::validate` qui le signale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Tag brut ("boolean", "bool", "string", "str"...), conservé pour l'aller-retour disque
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// `"default": null` est une valeur déclarée (`Some(Null)`), pas une absence
    #[serde(default, deserialize_with = "present_value", skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Valeurs autorisées (option énumérée)
    #[serde(rename = "options", default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

impl OptionSpec {
    pub fn boolean(default: bool, description: &str) -> Self {
        Self {
            kind: Some(OptionKind::Boolean.as_str().to_string()),
            default: Some(Value::Bool(default)),
            description: Some(description.to_string()),
            choices: None,
        }
    }

    pub fn string(default: &str, description: &str) -> Self {
        Self {
            kind: Some(OptionKind::String.as_str().to_string()),
            default: Some(Value::String(default.to_string())),
            description: Some(description.to_string()),
            choices: None,
        }
    }

    pub fn choice(default: &str, choices: &[&str], description: &str) -> Self {
        Self {
            choices: Some(choices.iter().map(|c| c.to_string()).collect()),
            ..Self::string(default, description)
        }
    }

    pub fn option_kind(&self) -> Option<OptionKind> {
        self.kind.as_deref().and_then(OptionKind::parse)
    }

    /// Choix déclarés, uniquement si la liste est non vide
    pub fn allowed_values(&self) -> Option<&[String]> {
        self.choices.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_enumerated(&self) -> bool {
        self.allowed_values().is_some()
    }

    /// type + default + description présents
    pub fn is_complete(&self) -> bool {
        self.kind.is_some() && self.default.is_some() && self.description.is_some()
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.kind.is_none() {
            missing.push("type");
        }
        if self.default.is_none() {
            missing.push("default");
        }
        if self.description.is_none() {
            missing.push("description");
        }
        missing
    }
}

/// Champ présent → `Some`, même quand il vaut `null`
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Valeur d'option typée, après fusion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Text(String),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            OptionValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s),
            OptionValue::Bool(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            OptionValue::Bool(b) => Value::Bool(*b),
            OptionValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

/// Paramètres nommés passés au constructeur d'un collecteur
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectorOptions(BTreeMap<String, OptionValue>);

impl CollectorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<OptionValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.get(name)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(OptionValue::as_bool)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(OptionValue::as_text)
    }

    pub fn flag_or(&self, name: &str, default: bool) -> bool {
        self.flag(name).unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Surcharge écartée par la fusion validante
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedOverride {
    pub option: String,
    pub value: Value,
    pub reason: String,
}

/// Résultat de la fusion défauts + surcharges
#[derive(Debug, Clone, Default)]
pub struct ResolvedOptions {
    pub options: CollectorOptions,
    pub rejected: Vec<RejectedOverride>,
}

/// Fusionne les défauts du catalogue avec les surcharges de l'installation.
///
/// Pour chaque option déclarée, la surcharge gagne si elle est convertible
/// sans perte vers le type déclaré (et, pour une énumération, fait partie des
/// choix) ; sinon elle est rejetée et le défaut s'applique. Une option sans
/// défaut exploitable et sans surcharge valide est absente du résultat.
pub fn resolve_options(
    specs: &BTreeMap<String, OptionSpec>,
    overrides: &Map<String, Value>,
) -> ResolvedOptions {
    let mut resolved = ResolvedOptions::default();

    for (name, spec) in specs {
        let kind = spec.option_kind();

        if let Some(raw) = overrides.get(name) {
            match coerce(raw, kind).and_then(|v| check_choice(v, spec)) {
                Ok(value) => {
                    resolved.options.insert(name, value);
                    continue;
                }
                Err(reason) => resolved.rejected.push(RejectedOverride {
                    option: name.clone(),
                    value: raw.clone(),
                    reason,
                }),
            }
        }

        if let Some(default) = &spec.default {
            if let Ok(value) = coerce(default, kind) {
                resolved.options.insert(name, value);
            }
        }
    }

    for (name, raw) in overrides {
        if specs.contains_key(name) {
            continue;
        }
        match coerce(raw, None) {
            Ok(value) => resolved.options.insert(name, value),
            Err(reason) => resolved.rejected.push(RejectedOverride {
                option: name.clone(),
                value: raw.clone(),
                reason,
            }),
        }
    }

    resolved
}

/// Conversion d'une valeur JSON vers le type déclaré.
/// `kind == None` (type absent ou inconnu) : conversion libre bool/texte.
pub fn coerce(raw: &Value, kind: Option<OptionKind>) -> Result<OptionValue, String> {
    match (kind, raw) {
        (Some(OptionKind::Boolean), Value::Bool(b)) => Ok(OptionValue::Bool(*b)),
        (Some(OptionKind::Boolean), Value::String(s)) => parse_bool(s)
            .map(OptionValue::Bool)
            .ok_or_else(|| format!("'{}' is not a boolean", s)),
        (Some(OptionKind::Boolean), Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(OptionValue::Bool(false)),
            Some(1) => Ok(OptionValue::Bool(true)),
            _ => Err(format!("number {} is not a boolean", n)),
        },
        (Some(OptionKind::String), Value::String(s)) => Ok(OptionValue::Text(s.clone())),
        (Some(OptionKind::String), Value::Number(n)) => Ok(OptionValue::Text(n.to_string())),
        (None, Value::Bool(b)) => Ok(OptionValue::Bool(*b)),
        (None, Value::String(s)) => Ok(OptionValue::Text(s.clone())),
        (None, Value::Number(n)) => Ok(OptionValue::Text(n.to_string())),
        (Some(kind), other) => Err(format!("expected {}, found {}", kind, json_kind(other))),
        (None, other) => Err(format!("unsupported option value of type {}", json_kind(other))),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn check_choice(value: OptionValue, spec: &OptionSpec) -> Result<OptionValue, String> {
    match (spec.allowed_values(), &value) {
        (Some(choices), OptionValue::Text(text)) if !choices.iter().any(|c| c == text) => Err(
            format!("'{}' is not one of [{}]", text, choices.join(", ")),
        ),
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ram_specs() -> BTreeMap<String, OptionSpec> {
        let mut specs = BTreeMap::new();
        specs.insert("unit".to_string(), OptionSpec::choice("MB", &["MB", "GB"], "Display unit"));
        specs.insert("show_swap".to_string(), OptionSpec::boolean(false, "Include swap"));
        specs
    }

    fn overrides(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!(OptionKind::parse("bool"), Some(OptionKind::Boolean));
        assert_eq!(OptionKind::parse("Boolean"), Some(OptionKind::Boolean));
        assert_eq!(OptionKind::parse("str"), Some(OptionKind::String));
        assert_eq!(OptionKind::parse("integer"), None);
    }

    #[test]
    fn test_defaults_apply_without_overrides() {
        let resolved = resolve_options(&ram_specs(), &Map::new());

        assert_eq!(resolved.options.text("unit"), Some("MB"));
        assert_eq!(resolved.options.flag("show_swap"), Some(false));
        assert!(resolved.rejected.is_empty());
    }

    #[test]
    fn test_override_wins_and_is_coerced() {
        let resolved = resolve_options(
            &ram_specs(),
            &overrides(json!({"unit": "GB", "show_swap": "true"})),
        );

        assert_eq!(resolved.options.text("unit"), Some("GB"));
        assert_eq!(resolved.options.flag("show_swap"), Some(true));
    }

    #[test]
    fn test_number_coerces_to_string_option() {
        let mut specs = BTreeMap::new();
        specs.insert("label".to_string(), OptionSpec::string("x", "Label"));

        let resolved = resolve_options(&specs, &overrides(json!({"label": 5})));
        assert_eq!(resolved.options.text("label"), Some("5"));
    }

    #[test]
    fn test_invalid_choice_falls_back_to_default() {
        let resolved = resolve_options(&ram_specs(), &overrides(json!({"unit": "TB"})));

        assert_eq!(resolved.options.text("unit"), Some("MB"));
        assert_eq!(resolved.rejected.len(), 1);
        assert_eq!(resolved.rejected[0].option, "unit");
        assert!(resolved.rejected[0].reason.contains("TB"));
    }

    #[test]
    fn test_mistyped_override_is_rejected() {
        let resolved = resolve_options(&ram_specs(), &overrides(json!({"show_swap": [1, 2]})));

        assert_eq!(resolved.options.flag("show_swap"), Some(false));
        assert_eq!(resolved.rejected[0].reason, "expected boolean, found array");
    }

    #[test]
    fn test_undeclared_overrides_pass_through() {
        let resolved = resolve_options(
            &ram_specs(),
            &overrides(json!({"verbose": true, "nested": {"a": 1}})),
        );

        assert_eq!(resolved.options.flag("verbose"), Some(true));
        assert!(resolved.options.get("nested").is_none());
        assert_eq!(resolved.rejected.len(), 1);
    }

    #[test]
    fn test_spec_completeness() {
        let full = OptionSpec::boolean(true, "desc");
        assert!(full.is_complete());

        let partial = OptionSpec {
            kind: Some("boolean".into()),
            ..Default::default()
        };
        assert!(!partial.is_complete());
        assert_eq!(partial.missing_fields(), vec!["default", "description"]);
    }

    #[test]
    fn test_null_default_is_declared() {
        let spec: OptionSpec =
            serde_json::from_value(json!({"type": "string", "default": null, "description": "Card"})).unwrap();
        assert_eq!(spec.default, Some(Value::Null));
        assert!(spec.is_complete());
        assert_eq!(serde_json::to_value(&spec).unwrap()["default"], Value::Null);

        let absent: OptionSpec = serde_json::from_value(json!({"type": "string"})).unwrap();
        assert_eq!(absent.default, None);
    }

    #[test]
    fn test_spec_reads_catalog_shape() {
        let spec: OptionSpec = serde_json::from_value(json!({
            "type": "str",
            "default": "MB",
            "description": "Unit",
            "options": ["MB", "GB"]
        }))
        .unwrap();

        assert_eq!(spec.option_kind(), Some(OptionKind::String));
        assert!(spec.is_enumerated());
        // le tag d'origine est conservé à l'écriture
        assert_eq!(serde_json::to_value(&spec).unwrap()["type"], json!("str"));
    }

    #[test]
    fn test_options_json_view() {
        let options = CollectorOptions::new().with("unit", "GB").with("show_swap", true);
        assert_eq!(options.to_json(), json!({"show_swap": true, "unit": "GB"}));
    }
}
