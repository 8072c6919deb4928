//! # Plano de Recompensa
//!
//! Descrição serializável de um `RewardManager`: os termos referenciam funções
//! por identificador (`TermFunction`) em vez de ponteiros, então o plano pode
//! atravessar a fronteira com um treinador externo como JSON.
//!
//! - `RewardPlan`: pesos concretos de um trial
//! - `RewardTemplate`: termos fixos + quais pesos vêm das dimensões de busca
//! - `RewardCatalog`: resolve identificadores em funções para montar o manager

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::param_space::{Assignment, ParameterSpace};
use crate::reward::{EventTerm, RewTerm, RewardFunction, RewardManager, TermParams};

/// Sinal do ambiente emitido quando o agente vence
pub const WIN_SIGNAL: &str = "win_signal";

/// Funções de pontuação conhecidas pelo ambiente de treino
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TermFunction {
    #[serde(rename = "danger_zone_reward")]
    DangerZone,
    #[serde(rename = "damage_interaction_reward")]
    DamageInteraction,
    #[serde(rename = "in_state_reward")]
    InState,
    #[serde(rename = "holding_more_than_3_keys")]
    HoldingMoreThan3Keys,
    #[serde(rename = "on_win_reward")]
    OnWin,
}

impl TermFunction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DangerZone => "danger_zone_reward",
            Self::DamageInteraction => "damage_interaction_reward",
            Self::InState => "in_state_reward",
            Self::HoldingMoreThan3Keys => "holding_more_than_3_keys",
            Self::OnWin => "on_win_reward",
        }
    }
}

impl fmt::Display for TermFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Termo por passo com peso concreto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSpec {
    pub name: String,
    pub function: TermFunction,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: TermParams,
}

/// Termo por evento com peso concreto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    pub name: String,
    pub signal: String,
    pub function: TermFunction,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: TermParams,
}

/// Plano completo de um trial
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RewardPlan {
    pub terms: Vec<TermSpec>,
    #[serde(default)]
    pub events: Vec<EventSpec>,
}

impl RewardPlan {
    pub fn term(&self, name: &str) -> Option<&TermSpec> {
        self.terms.iter().find(|t| t.name == name)
    }

    pub fn event(&self, name: &str) -> Option<&EventSpec> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Resolve as funções no catálogo e monta o manager.
    ///
    /// Nomes duplicados e pesos não finitos falham aqui, pela validação do
    /// próprio `RewardManager`.
    pub fn assemble<S, C>(&self, catalog: &C) -> Result<RewardManager<S>, ConfigError>
    where
        C: RewardCatalog<S> + ?Sized,
    {
        let mut steps = Vec::with_capacity(self.terms.len());
        for spec in &self.terms {
            let func = resolve(catalog, &spec.name, spec.function)?;
            let term = RewTerm::from_shared(func, spec.weight).with_params(spec.params.clone());
            steps.push((spec.name.clone(), term));
        }

        let mut events = Vec::with_capacity(self.events.len());
        for spec in &self.events {
            let func = resolve(catalog, &spec.name, spec.function)?;
            let term = RewTerm::from_shared(func, spec.weight).with_params(spec.params.clone());
            events.push((
                spec.name.clone(),
                EventTerm {
                    signal: spec.signal.clone(),
                    term,
                },
            ));
        }

        RewardManager::new(steps, events)
    }
}

fn resolve<S, C>(
    catalog: &C,
    term: &str,
    function: TermFunction,
) -> Result<Arc<dyn RewardFunction<S>>, ConfigError>
where
    C: RewardCatalog<S> + ?Sized,
{
    catalog
        .resolve(function)
        .ok_or_else(|| ConfigError::UnknownFunction {
            term: term.to_string(),
            function: function.name().to_string(),
        })
}

/// Fonte das implementações das funções de pontuação
pub trait RewardCatalog<S> {
    fn resolve(&self, function: TermFunction) -> Option<Arc<dyn RewardFunction<S>>>;
}

/// Catálogo em memória
pub struct FnCatalog<S> {
    functions: BTreeMap<TermFunction, Arc<dyn RewardFunction<S>>>,
}

impl<S> Default for FnCatalog<S> {
    fn default() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }
}

impl<S> FnCatalog<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, function: TermFunction, func: impl RewardFunction<S> + 'static) -> Self {
        self.functions.insert(function, Arc::new(func));
        self
    }
}

impl<S> RewardCatalog<S> for FnCatalog<S> {
    fn resolve(&self, function: TermFunction) -> Option<Arc<dyn RewardFunction<S>>> {
        self.functions.get(&function).cloned()
    }
}

// =============================================================================
// TEMPLATE
// =============================================================================

/// Termo por passo cujo peso é fixo ou vem da dimensão de mesmo nome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermTemplate {
    pub name: String,
    pub function: TermFunction,
    /// `None`: o peso é a dimensão de busca com este nome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: TermParams,
}

impl TermTemplate {
    pub fn swept(name: &str, function: TermFunction) -> Self {
        Self {
            name: name.to_string(),
            function,
            weight: None,
            params: TermParams::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Termos da recompensa antes de receberem os pesos de um trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardTemplate {
    pub terms: Vec<TermTemplate>,
    #[serde(default)]
    pub events: Vec<EventSpec>,
}

impl RewardTemplate {
    /// Termos da busca em grade: dano, zona de perigo e penalidade de ataque
    pub fn grid_default() -> Self {
        Self {
            terms: vec![
                TermTemplate::swept("danger_zone_reward", TermFunction::DangerZone),
                TermTemplate::swept("damage_interaction_reward", TermFunction::DamageInteraction),
                TermTemplate::swept("penalize_attack_reward", TermFunction::InState)
                    .with_param("desired_state", "AttackState"),
            ],
            events: vec![Self::win_event()],
        }
    }

    /// Termos da busca guiada: os da grade + penalidade por segurar chaves
    pub fn guided_default() -> Self {
        let mut template = Self::grid_default();
        template.terms.push(TermTemplate::swept(
            "holding_more_than_3_keys",
            TermFunction::HoldingMoreThan3Keys,
        ));
        template
    }

    fn win_event() -> EventSpec {
        EventSpec {
            name: "on_win_reward".to_string(),
            signal: WIN_SIGNAL.to_string(),
            function: TermFunction::OnWin,
            weight: 50.0,
            params: TermParams::new(),
        }
    }

    /// Toda dimensão precisa nomear um termo, e todo termo sem peso fixo
    /// precisa de uma dimensão.
    pub fn check_space(&self, space: &ParameterSpace) -> Result<(), ConfigError> {
        for name in space.names() {
            if !self.terms.iter().any(|t| t.name == name) {
                return Err(ConfigError::Invalid(format!(
                    "search dimension '{}' does not match any reward term",
                    name
                )));
            }
        }
        for term in &self.terms {
            if term.weight.is_none() && space.get(&term.name).is_none() {
                return Err(ConfigError::MissingDimension(term.name.clone()));
            }
        }
        Ok(())
    }

    /// Aplica os pesos de um trial.
    ///
    /// Valores da atribuição têm precedência sobre pesos fixos.
    pub fn instantiate(&self, assignment: &Assignment) -> Result<RewardPlan, ConfigError> {
        let mut terms = Vec::with_capacity(self.terms.len());
        for template in &self.terms {
            let weight = assignment
                .get(&template.name)
                .or(template.weight)
                .ok_or_else(|| ConfigError::MissingDimension(template.name.clone()))?;
            terms.push(TermSpec {
                name: template.name.clone(),
                function: template.function,
                weight,
                params: template.params.clone(),
            });
        }

        Ok(RewardPlan {
            terms,
            events: self.events.clone(),
        })
    }
}

// =============================================================================
// TESTES
// =============================================================================
