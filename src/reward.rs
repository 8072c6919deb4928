//! # Montagem da Recompensa
//!
//! Combina termos nomeados e ponderados num único sinal de recompensa:
//!
//! ```text
//! r(s) = Σ wᵢ · fᵢ(s, pᵢ)                  (termos por passo)
//!      + Σ wⱼ · fⱼ(s, pⱼ) · [sinalⱼ ativo]  (termos por evento)
//! ```
//!
//! Os termos são guardados em `BTreeMap` por nome, então a soma é feita
//! sempre na mesma ordem, qualquer que tenha sido a ordem de inserção.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::param_space::ParameterValue;

/// Parâmetros estáticos de um termo (ex.: `desired_state`)
pub type TermParams = BTreeMap<String, ParameterValue>;

/// Função de pontuação de um termo
pub trait RewardFunction<S>: Send + Sync {
    fn evaluate(&self, state: &S, params: &TermParams) -> f64;
}

impl<S, F> RewardFunction<S> for F
where
    F: Fn(&S, &TermParams) -> f64 + Send + Sync,
{
    fn evaluate(&self, state: &S, params: &TermParams) -> f64 {
        self(state, params)
    }
}

/// Termo de recompensa: função, peso e parâmetros opcionais
pub struct RewTerm<S> {
    func: Arc<dyn RewardFunction<S>>,
    weight: f64,
    params: TermParams,
}

impl<S> RewTerm<S> {
    pub fn new(func: impl RewardFunction<S> + 'static, weight: f64) -> Self {
        Self::from_shared(Arc::new(func), weight)
    }

    pub fn from_shared(func: Arc<dyn RewardFunction<S>>, weight: f64) -> Self {
        Self {
            func,
            weight,
            params: TermParams::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<ParameterValue>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_params(mut self, params: TermParams) -> Self {
        self.params = params;
        self
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn params(&self) -> &TermParams {
        &self.params
    }

    /// Contribuição ponderada deste termo
    pub fn weighted(&self, state: &S) -> f64 {
        self.weight * self.func.evaluate(state, &self.params)
    }
}

impl<S> Clone for RewTerm<S> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
            weight: self.weight,
            params: self.params.clone(),
        }
    }
}

impl<S> fmt::Debug for RewTerm<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewTerm")
            .field("weight", &self.weight)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Termo disparado por um sinal discreto do ambiente (ex.: `win_signal`)
#[derive(Debug)]
pub struct EventTerm<S> {
    pub signal: String,
    pub term: RewTerm<S>,
}

impl<S> Clone for EventTerm<S> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            term: self.term.clone(),
        }
    }
}

/// Sinais discretos ativos num passo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepSignals(BTreeSet<String>);

impl StepSignals {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, signal: &str) -> Self {
        self.assert(signal);
        self
    }

    pub fn assert(&mut self, signal: &str) {
        self.0.insert(signal.to_string());
    }

    pub fn is_asserted(&self, signal: &str) -> bool {
        self.0.contains(signal)
    }
}

/// Recompensa de um passo com a decomposição por termo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReward {
    pub total: f64,
    pub components: BTreeMap<String, f64>,
}

/// Gerenciador de recompensa: termos por passo + termos por evento
#[derive(Debug)]
pub struct RewardManager<S> {
    step_terms: BTreeMap<String, RewTerm<S>>,
    event_terms: BTreeMap<String, EventTerm<S>>,
}

impl<S> Clone for RewardManager<S> {
    fn clone(&self) -> Self {
        Self {
            step_terms: self.step_terms.clone(),
            event_terms: self.event_terms.clone(),
        }
    }
}

impl<S> RewardManager<S> {
    /// Constrói a partir das duas listas; nomes repetidos num mesmo grupo
    /// ou pesos não finitos são rejeitados.
    pub fn new(
        step_terms: Vec<(String, RewTerm<S>)>,
        event_terms: Vec<(String, EventTerm<S>)>,
    ) -> Result<Self, ConfigError> {
        let mut steps = BTreeMap::new();
        for (name, term) in step_terms {
            check_weight(&name, term.weight)?;
            if steps.contains_key(&name) {
                return Err(ConfigError::DuplicateTerm { group: "step", name });
            }
            steps.insert(name, term);
        }

        let mut events = BTreeMap::new();
        for (name, event) in event_terms {
            check_weight(&name, event.term.weight)?;
            if events.contains_key(&name) {
                return Err(ConfigError::DuplicateTerm { group: "event", name });
            }
            events.insert(name, event);
        }

        Ok(Self {
            step_terms: steps,
            event_terms: events,
        })
    }

    pub fn builder() -> RewardManagerBuilder<S> {
        RewardManagerBuilder::default()
    }

    pub fn step_term(&self, name: &str) -> Option<&RewTerm<S>> {
        self.step_terms.get(name)
    }

    pub fn event_term(&self, name: &str) -> Option<&EventTerm<S>> {
        self.event_terms.get(name)
    }

    pub fn step_term_names(&self) -> impl Iterator<Item = &str> {
        self.step_terms.keys().map(String::as_str)
    }

    pub fn event_term_names(&self) -> impl Iterator<Item = &str> {
        self.event_terms.keys().map(String::as_str)
    }

    /// Recompensa total do passo
    pub fn reward(&self, state: &S, signals: &StepSignals) -> f64 {
        self.step(state, signals).total
    }

    /// Recompensa do passo com a contribuição de cada termo.
    ///
    /// Termos de evento cujo sinal não está ativo contribuem 0.
    pub fn step(&self, state: &S, signals: &StepSignals) -> StepReward {
        let mut components = BTreeMap::new();
        let mut total = 0.0;

        for (name, term) in &self.step_terms {
            let value = term.weighted(state);
            total += value;
            components.insert(name.clone(), value);
        }

        for (name, event) in &self.event_terms {
            let value = if signals.is_asserted(&event.signal) {
                event.term.weighted(state)
            } else {
                0.0
            };
            total += value;
            components.insert(name.clone(), value);
        }

        StepReward { total, components }
    }
}

fn check_weight(name: &str, weight: f64) -> Result<(), ConfigError> {
    if weight.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidWeight {
            name: name.to_string(),
            weight,
        })
    }
}

/// Builder incremental; a validação acontece em `build`
pub struct RewardManagerBuilder<S> {
    step_terms: Vec<(String, RewTerm<S>)>,
    event_terms: Vec<(String, EventTerm<S>)>,
}

impl<S> Default for RewardManagerBuilder<S> {
    fn default() -> Self {
        Self {
            step_terms: Vec::new(),
            event_terms: Vec::new(),
        }
    }
}

impl<S> RewardManagerBuilder<S> {
    pub fn term(mut self, name: &str, term: RewTerm<S>) -> Self {
        self.step_terms.push((name.to_string(), term));
        self
    }

    pub fn event(mut self, name: &str, signal: &str, term: RewTerm<S>) -> Self {
        self.event_terms.push((
            name.to_string(),
            EventTerm {
                signal: signal.to_string(),
                term,
            },
        ));
        self
    }

    pub fn build(self) -> Result<RewardManager<S>, ConfigError> {
        RewardManager::new(self.step_terms, self.event_terms)
    }
}

// =============================================================================
// TESTES
// =============================================================================
