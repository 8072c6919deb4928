//! # Definição do Espaço de Parâmetros
//!
//! Define as dimensões de busca sobre os pesos dos termos de recompensa.
//! A ordem de declaração é parte do contrato: o grid é gerado em laços
//! aninhados com a primeira dimensão no laço mais externo, e os nomes de
//! checkpoint embutem os valores nessa mesma ordem.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Valor de um parâmetro estático de termo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => f.write_str(&format_weight(*v)),
            Self::String(v) => f.write_str(v),
        }
    }
}

/// Formata um peso do jeito que aparece nos nomes de checkpoint.
///
/// Decimal mais curto que faz round-trip. Expoente decimal abaixo de -4 ou a
/// partir de 16 usa notação científica com expoente de sinal explícito e ao
/// menos dois dígitos (`1e-05`, `1e+16`); fora disso, notação fixa com ao
/// menos uma casa (`1.0`, `-0.04`).
pub fn format_weight(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    }

    let fixed = format!("{}", value);
    if fixed.contains('.') {
        fixed
    } else {
        format!("{}.0", fixed)
    }
}

/// Range de valores para uma dimensão
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterRange {
    /// Lista finita de candidatos (busca em grade)
    Discrete { values: Vec<f64> },
    /// Intervalo fechado [low, high] (busca guiada)
    Continuous { low: f64, high: f64 },
}

impl ParameterRange {
    pub fn discrete(values: Vec<f64>) -> Self {
        Self::Discrete { values }
    }

    pub fn continuous(low: f64, high: f64) -> Self {
        Self::Continuous { low, high }
    }

    /// Número de candidatos (`None` para intervalos contínuos)
    pub fn cardinality(&self) -> Option<usize> {
        match self {
            Self::Discrete { values } => Some(values.len()),
            Self::Continuous { .. } => None,
        }
    }
}

/// Definição de uma dimensão de busca
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Nome do parâmetro (igual ao nome do termo de recompensa)
    pub name: String,
    /// Tag curta usada nos nomes de checkpoint (`d`, `z`, `a`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Range de valores válidos
    #[serde(flatten)]
    pub range: ParameterRange,
}

impl ParameterDef {
    pub fn new(name: &str, range: ParameterRange) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            range,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Tag para nomes de checkpoint; cai no nome completo sem label
    pub fn tag(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match &self.range {
            ParameterRange::Discrete { values } => {
                if values.is_empty() {
                    return Err(ConfigError::EmptyDimension(self.name.clone()));
                }
                if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                    return Err(ConfigError::NonFiniteValue {
                        name: self.name.clone(),
                        value: *bad,
                    });
                }
            }
            ParameterRange::Continuous { low, high } => {
                if !low.is_finite() || !high.is_finite() || low > high {
                    return Err(ConfigError::InvalidRange {
                        name: self.name.clone(),
                        low: *low,
                        high: *high,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Uma atribuição concreta de valores, na ordem do espaço
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Assignment(Vec<(String, f64)>);

impl Assignment {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, name: &str, value: f64) {
        self.0.push((name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(name, value)| format!("{}={}", name, format_weight(value)))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Espaço completo de parâmetros, em ordem de declaração
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSpace {
    pub parameters: Vec<ParameterDef>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, param: ParameterDef) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn add_parameter(&mut self, param: ParameterDef) {
        self.parameters.push(param);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Nomes únicos, candidatos finitos e não vazios, intervalos ordenados
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, param) in self.parameters.iter().enumerate() {
            if self.parameters[..i].iter().any(|p| p.name == param.name) {
                return Err(ConfigError::DuplicateDimension(param.name.clone()));
            }
            param.validate()?;
        }
        Ok(())
    }

    /// Tamanho do produto cartesiano das dimensões discretas
    pub fn grid_size(&self) -> usize {
        self.parameters
            .iter()
            .map(|p| p.range.cardinality().unwrap_or(1))
            .product()
    }

    /// Gera o produto cartesiano das dimensões discretas.
    ///
    /// A primeira dimensão declarada varia mais devagar. Dimensões contínuas
    /// entram com o ponto médio do intervalo.
    pub fn generate_grid(&self) -> Vec<Assignment> {
        let mut grid = vec![Assignment::new()];

        for def in &self.parameters {
            let values = match &def.range {
                ParameterRange::Discrete { values } => values.clone(),
                ParameterRange::Continuous { low, high } => vec![(low + high) / 2.0],
            };
            let mut new_grid = Vec::with_capacity(grid.len() * values.len());

            for config in &grid {
                for value in &values {
                    let mut new_config = config.clone();
                    new_config.push(&def.name, *value);
                    new_grid.push(new_config);
                }
            }

            grid = new_grid;
        }

        grid
    }
}

// =============================================================================
// TESTES
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn three_dims() -> ParameterSpace {
        ParameterSpace::new()
            .with_parameter(ParameterDef::new("a", ParameterRange::discrete(vec![1.0, 2.0])))
            .with_parameter(ParameterDef::new("b", ParameterRange::discrete(vec![3.0, 4.0, 5.0])))
            .with_parameter(ParameterDef::new("c", ParameterRange::discrete(vec![6.0])))
    }

    #[test]
    fn test_grid_size_is_product() {
        let space = three_dims();
        assert_eq!(space.grid_size(), 6);
        assert_eq!(space.generate_grid().len(), 6);
    }

    #[test]
    fn test_grid_first_dimension_outermost() {
        let grid = three_dims().generate_grid();
        let firsts: Vec<f64> = grid.iter().map(|g| g.get("a").unwrap()).collect();
        let seconds: Vec<f64> = grid.iter().map(|g| g.get("b").unwrap()).collect();

        assert_eq!(firsts, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(seconds, vec![3.0, 4.0, 5.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_assignment_keeps_declared_order() {
        let grid = three_dims().generate_grid();
        let names: Vec<&str> = grid[0].iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        let dup = three_dims()
            .with_parameter(ParameterDef::new("a", ParameterRange::discrete(vec![0.0])));
        assert!(matches!(dup.validate(), Err(ConfigError::DuplicateDimension(n)) if n == "a"));

        let empty = ParameterSpace::new()
            .with_parameter(ParameterDef::new("x", ParameterRange::discrete(vec![])));
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyDimension(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let space = ParameterSpace::new()
            .with_parameter(ParameterDef::new("x", ParameterRange::continuous(1.0, 0.0)));
        assert!(matches!(space.validate(), Err(ConfigError::InvalidRange { .. })));
    }

    #[test]
    fn test_format_weight_keeps_one_decimal() {
        assert_eq!(format_weight(1.0), "1.0");
        assert_eq!(format_weight(0.5), "0.5");
        assert_eq!(format_weight(-0.04), "-0.04");
        assert_eq!(format_weight(-0.1), "-0.1");
        assert_eq!(format_weight(50.0), "50.0");
    }

    #[test]
    fn test_format_weight_exponent_form_at_extremes() {
        assert_eq!(format_weight(1e-5), "1e-05");
        assert_eq!(format_weight(1.5e-7), "1.5e-07");
        assert_eq!(format_weight(1e16), "1e+16");
        assert_eq!(format_weight(-2.5e20), "-2.5e+20");
        assert_eq!(format_weight(1.2345678901234568e17), "1.2345678901234568e+17");
        assert_eq!(format_weight(1e-100), "1e-100");
        // limites da notação fixa
        assert_eq!(format_weight(0.0001), "0.0001");
        assert_eq!(format_weight(1e15), "1000000000000000.0");
        assert_eq!(format_weight(0.0), "0.0");
        assert_eq!(format_weight(f64::NAN), "nan");
        assert_eq!(format_weight(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_range_deserializes_both_shapes() {
        let discrete: ParameterDef =
            serde_json::from_str(r#"{"name": "d", "label": "d", "values": [0.5, 1.0]}"#).unwrap();
        assert_eq!(discrete.range, ParameterRange::discrete(vec![0.5, 1.0]));
        assert_eq!(discrete.tag(), "d");

        let continuous: ParameterDef =
            serde_json::from_str(r#"{"name": "z", "low": 0.05, "high": 0.5}"#).unwrap();
        assert_eq!(continuous.range, ParameterRange::continuous(0.05, 0.5));
        assert_eq!(continuous.tag(), "z");
    }
}
