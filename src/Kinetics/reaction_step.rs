//! # Elementary reaction step
//!
//! ## Purpose
//! `Step` holds the stoichiometry of one elementary reaction `aA + bB -> cC + dD` (or the
//! reversible `<-->` form) together with its rate constants, and evaluates the law of mass action
//! for it:
//! ```text
//! W_f = kf * Π [reactant]^ν          forward rate
//! W_r = kr * Π [product]^ν           reverse rate (reversible steps only)
//! d[reactant]/dt = -ν * (W_f - W_r)
//! d[product]/dt  = +ν * (W_f - W_r)
//! ```
//! Stoichiometric coefficients may be fractional, so powers are real-valued.
//!
//! ## Main structures
//! - `StoichTerm`: coefficient + species name
//! - `RateConstants`: partial or full {kf, kr} assignment
//! - `Step`: reactants, products, reversibility flag and rate constants
//!
//! ## Non-obvious features
//! - species with `(s)` or `(l)` suffix are condensed-phase participants: they stay in the
//!   equation but have unit activity, so they neither enter the rate law nor get a derivative
//! - repeated species on one side are merged: `A + A -> B` is stored as `2A -> B`
//! - `kr` of an irreversible step is stored but never used
//! - the symbolic form of the rate law is a RustedSciThe `Expr`, so it can be printed,
//!   lambdified or handed to symbolic solvers
use crate::Kinetics::equation_parser::parse_step;
use crate::Kinetics::kinetics_errors::{ConfigurationError, ParseError};
use crate::Kinetics::rate_model::State;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// phase suffixes of species with unit activity
const CONDENSED_PHASES: [&str; 2] = ["(s)", "(l)"];

/// one `coefficient * species` entry of a reaction side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoichTerm {
    pub coefficient: f64,
    pub species: String,
    /// exact reduced numerator and denominator when the coefficient came from a fraction
    #[serde(default)]
    pub ratio: Option<(u64, u64)>,
}

impl StoichTerm {
    pub fn new(coefficient: f64, species: &str) -> Self {
        Self {
            coefficient,
            species: species.to_string(),
            ratio: None,
        }
    }
    /// exact coefficient numerator/denominator, stored in lowest terms
    pub fn from_ratio(numerator: u64, denominator: u64, species: &str) -> Self {
        let divisor = gcd(numerator as u128, denominator as u128).max(1) as u64;
        let (numerator, denominator) = (numerator / divisor, denominator / divisor);
        Self {
            coefficient: numerator as f64 / denominator as f64,
            species: species.to_string(),
            ratio: Some((numerator, denominator)),
        }
    }
    /// solids and liquids do not enter the rate law
    pub fn is_condensed(&self) -> bool {
        CONDENSED_PHASES
            .iter()
            .any(|phase| self.species.ends_with(phase))
    }
    /// adds the coefficient of another term of the same species, exactly when both are fractions
    fn absorb(&mut self, other: &StoichTerm) {
        self.ratio = match (self.ratio, other.ratio) {
            (Some(a), Some(b)) => add_ratios(a, b),
            _ => None,
        };
        self.coefficient = match self.ratio {
            Some((numerator, denominator)) => numerator as f64 / denominator as f64,
            None => self.coefficient + other.coefficient,
        };
    }
}

/// terms are equal when they have the same species and the same coefficient value
impl PartialEq for StoichTerm {
    fn eq(&self, other: &Self) -> bool {
        self.coefficient == other.coefficient && self.species == other.species
    }
}

impl fmt::Display for StoichTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coefficient = match self.ratio {
            Some((numerator, denominator)) => format_ratio(numerator, denominator),
            None => format_coefficient(self.coefficient),
        };
        write!(f, "{}{}", coefficient, self.species)
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn add_ratios((a, b): (u64, u64), (c, d): (u64, u64)) -> Option<(u64, u64)> {
    let numerator = (a as u128).checked_mul(d as u128)?.checked_add((c as u128).checked_mul(b as u128)?)?;
    let denominator = (b as u128).checked_mul(d as u128)?;
    let divisor = gcd(numerator, denominator).max(1);
    let numerator = u64::try_from(numerator / divisor).ok()?;
    let denominator = u64::try_from(denominator / divisor).ok()?;
    Some((numerator, denominator))
}

/// 1 is omitted, whole numbers print without denominator
fn format_ratio(numerator: u64, denominator: u64) -> String {
    match (numerator, denominator) {
        (n, d) if n == d => String::new(),
        (n, 1) => n.to_string(),
        (n, d) => format!("{}/{}", n, d),
    }
}

/// smallest fraction whose f64 value is exactly `value`, searched along the continued fraction
/// expansion; None if the numerator or denominator leaves u64
pub fn rational_approximation(value: f64) -> Option<(u64, u64)> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    // h/k convergents, the pair holds (n-2, n-1)
    let (mut h_prev, mut h_last) = (0_u128, 1_u128);
    let (mut k_prev, mut k_last) = (1_u128, 0_u128);
    let mut x = value;
    for _ in 0..96 {
        let whole = x.floor();
        if whole > u64::MAX as f64 {
            return None;
        }
        let a = whole as u128;
        let h = a.checked_mul(h_last)?.checked_add(h_prev)?;
        let k = a.checked_mul(k_last)?.checked_add(k_prev)?;
        let (h64, k64) = (u64::try_from(h).ok()?, u64::try_from(k).ok()?);
        if k64 > 0 && h64 as f64 / k64 as f64 == value {
            return Some((h64, k64));
        }
        (h_prev, h_last, k_prev, k_last) = (h_last, h, k_last, k);
        let remainder = x - whole;
        if remainder <= 0.0 {
            return None;
        }
        x = 1.0 / remainder;
    }
    None
}

/// prints 1 as nothing, integers as integers and other values as the exact fraction n/d, so that
/// the output can be parsed back
pub fn format_coefficient(coefficient: f64) -> String {
    match rational_approximation(coefficient) {
        Some((numerator, denominator)) => format_ratio(numerator, denominator),
        None => format!("{}", coefficient),
    }
}

/// partial or full assignment of rate constants; `None` leaves the current value unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateConstants {
    #[serde(default)]
    pub kf: Option<f64>,
    #[serde(default)]
    pub kr: Option<f64>,
}

impl RateConstants {
    pub fn forward(kf: f64) -> Self {
        Self {
            kf: Some(kf),
            kr: None,
        }
    }
    pub fn reversible(kf: f64, kr: f64) -> Self {
        Self {
            kf: Some(kf),
            kr: Some(kr),
        }
    }
}

/// elementary reaction step with mass-action kinetics
#[derive(Debug, Clone)]
pub struct Step {
    reactants: Vec<StoichTerm>,
    products: Vec<StoichTerm>,
    is_reversible: bool,
    kf: Option<f64>,
    kr: Option<f64>,
}

impl Step {
    /// creates a step from reactant and product terms; repeated species on one side are merged.
    /// Fails if a side is empty, a coefficient is not positive or a species is on both sides
    pub fn new(
        reactants: Vec<StoichTerm>,
        products: Vec<StoichTerm>,
        is_reversible: bool,
    ) -> Result<Self, ParseError> {
        let equation = display_equation(&reactants, &products, is_reversible);
        if reactants.is_empty() {
            return Err(ParseError::EmptySide {
                side: "reactant",
                equation,
            });
        }
        if products.is_empty() {
            return Err(ParseError::EmptySide {
                side: "product",
                equation,
            });
        }
        let reactants = merge_terms(reactants)?;
        let products = merge_terms(products)?;
        if let Some(term) = reactants
            .iter()
            .find(|r| products.iter().any(|p| p.species == r.species))
        {
            return Err(ParseError::DegenerateStep(term.species.clone()));
        }
        Ok(Self {
            reactants,
            products,
            is_reversible,
            kf: None,
            kr: None,
        })
    }

    pub fn reactants(&self) -> &[StoichTerm] {
        &self.reactants
    }
    pub fn products(&self) -> &[StoichTerm] {
        &self.products
    }
    pub fn is_reversible(&self) -> bool {
        self.is_reversible
    }
    pub fn kf(&self) -> Option<f64> {
        self.kf
    }
    pub fn kr(&self) -> Option<f64> {
        self.kr
    }
    /// species that enter the rate law, reactants first, in equation order
    pub fn species(&self) -> Vec<String> {
        self.reactants
            .iter()
            .chain(self.products.iter())
            .filter(|term| !term.is_condensed())
            .map(|term| term.species.clone())
            .collect()
    }
    /////////////////////////////////RATE CONSTANTS///////////////////////////////////////////
    /// applies a partial assignment of rate constants
    pub fn set_rate_constants(&mut self, constants: RateConstants) {
        if let Some(kf) = constants.kf {
            self.kf = Some(kf);
        }
        if let Some(kr) = constants.kr {
            if !self.is_reversible {
                warn!(
                    "reverse rate constant {} assigned to irreversible step '{}', it will be ignored",
                    kr, self
                );
            }
            self.kr = Some(kr);
        }
    }
    /// sets kr and kf = K*kr from the equilibrium constant K = kf/kr
    pub fn set_rate_constants_from_equilibrium(&mut self, k_equilibrium: f64, kr: f64) {
        self.set_rate_constants(RateConstants::reversible(k_equilibrium * kr, kr));
    }
    /// returns kf and, for reversible steps, kr; fails if a required constant is not set
    pub fn required_rate_constants(&self) -> Result<(f64, Option<f64>), ConfigurationError> {
        let kf = self
            .kf
            .ok_or_else(|| ConfigurationError::MissingForwardConstant(self.to_string()))?;
        if !self.is_reversible {
            return Ok((kf, None));
        }
        let kr = self
            .kr
            .ok_or_else(|| ConfigurationError::MissingReverseConstant(self.to_string()))?;
        Ok((kf, Some(kr)))
    }
    /////////////////////////////////NUMERICAL RATE LAW///////////////////////////////////////////
    /// net rate of the step W_f - W_r at the given concentrations (absent species read as 0)
    pub fn net_rate(&self, state: &State) -> Result<f64, ConfigurationError> {
        let (kf, kr) = self.required_rate_constants()?;
        let forward = kf * mass_action(&self.reactants, state);
        let reverse = match kr {
            Some(kr) => kr * mass_action(&self.products, state),
            None => 0.0,
        };
        Ok(forward - reverse)
    }
    /// signed contribution of this step to the time derivative of every species it involves
    pub fn rate_of_change(&self, state: &State) -> Result<HashMap<String, f64>, ConfigurationError> {
        let rate = self.net_rate(state)?;
        let mut derivatives = HashMap::new();
        for term in self.reactants.iter().filter(|t| !t.is_condensed()) {
            derivatives.insert(term.species.clone(), -term.coefficient * rate);
        }
        for term in self.products.iter().filter(|t| !t.is_condensed()) {
            derivatives.insert(term.species.clone(), term.coefficient * rate);
        }
        Ok(derivatives)
    }
    /////////////////////////////////SYMBOLIC RATE LAW///////////////////////////////////////////
    /// symbolic net rate kf*Π[R]^ν - kr*Π[P]^ν with concentrations as variables named by species
    pub fn rate_expression(&self) -> Result<Expr, ConfigurationError> {
        let (kf, kr) = self.required_rate_constants()?;
        let forward = mass_action_expr(kf, &self.reactants);
        match kr {
            Some(kr) => Ok(forward - mass_action_expr(kr, &self.products)),
            None => Ok(forward),
        }
    }
    /// symbolic right hand sides d[species]/dt of this step alone
    pub fn differential_equations(&self) -> Result<HashMap<String, Expr>, ConfigurationError> {
        let rate = self.rate_expression()?;
        let mut equations = HashMap::new();
        for term in self.reactants.iter().filter(|t| !t.is_condensed()) {
            equations.insert(
                term.species.clone(),
                Expr::Const(-term.coefficient) * rate.clone(),
            );
        }
        for term in self.products.iter().filter(|t| !t.is_condensed()) {
            equations.insert(
                term.species.clone(),
                Expr::Const(term.coefficient) * rate.clone(),
            );
        }
        Ok(equations)
    }
}

/// Π c^ν over the terms that enter the rate law
fn mass_action(terms: &[StoichTerm], state: &State) -> f64 {
    terms
        .iter()
        .filter(|term| !term.is_condensed())
        .map(|term| {
            let concentration = state.get(&term.species).copied().unwrap_or(0.0);
            concentration.powf(term.coefficient)
        })
        .product()
}

fn mass_action_expr(k: f64, terms: &[StoichTerm]) -> Expr {
    let mut expr = Expr::Const(k);
    for term in terms.iter().filter(|term| !term.is_condensed()) {
        let concentration = Expr::Var(term.species.clone());
        expr = expr * Expr::Pow(Box::new(concentration), Box::new(Expr::Const(term.coefficient)));
    }
    expr
}

/// sums coefficients of repeated species keeping the position of the first occurrence
fn merge_terms(terms: Vec<StoichTerm>) -> Result<Vec<StoichTerm>, ParseError> {
    let mut merged: Vec<StoichTerm> = Vec::with_capacity(terms.len());
    for term in terms {
        if term.coefficient == 0.0 {
            return Err(ParseError::ZeroCoefficient(term.to_string()));
        }
        if !term.coefficient.is_finite() || term.coefficient < 0.0 || term.species.is_empty() {
            return Err(ParseError::InvalidTerm(term.to_string()));
        }
        match merged.iter_mut().find(|m| m.species == term.species) {
            Some(existing) => existing.absorb(&term),
            None => merged.push(term),
        }
    }
    Ok(merged)
}

fn display_equation(reactants: &[StoichTerm], products: &[StoichTerm], is_reversible: bool) -> String {
    let join = |terms: &[StoichTerm]| {
        terms
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<String>>()
            .join(" + ")
    };
    let arrow = if is_reversible { "<-->" } else { "->" };
    format!("{} {} {}", join(reactants), arrow, join(products))
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            display_equation(&self.reactants, &self.products, self.is_reversible)
        )
    }
}

/// steps are equal when they have the same terms and the same reversibility
impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.reactants == other.reactants
            && self.products == other.products
            && self.is_reversible == other.is_reversible
    }
}

impl FromStr for Step {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_step(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn state(pairs: &[(&str, f64)]) -> State {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_mass_action_irreversible() {
        let mut step: Step = "A+B->C".parse().unwrap();
        step.set_rate_constants(RateConstants::forward(2.0));
        let d = step
            .rate_of_change(&state(&[("A", 3.0), ("B", 4.0), ("C", 0.0)]))
            .unwrap();
        assert_relative_eq!(d["A"], -24.0);
        assert_relative_eq!(d["B"], -24.0);
        assert_relative_eq!(d["C"], 24.0);
    }

    #[test]
    fn test_mass_action_reversible() {
        let mut step: Step = "A+B<-->C+D".parse().unwrap();
        step.set_rate_constants(RateConstants::reversible(1.0, 0.5));
        let s = state(&[("A", 2.0), ("B", 2.0), ("C", 1.0), ("D", 1.0)]);
        assert_relative_eq!(step.net_rate(&s).unwrap(), 3.5);
        let d = step.rate_of_change(&s).unwrap();
        assert_relative_eq!(d["A"], -3.5);
        assert_relative_eq!(d["B"], -3.5);
        assert_relative_eq!(d["C"], 3.5);
        assert_relative_eq!(d["D"], 3.5);
    }

    #[test]
    fn test_coefficients_scale_rate_and_contributions() {
        let mut step: Step = "2A -> 1/2B".parse().unwrap();
        step.set_rate_constants(RateConstants::forward(0.1));
        let d = step.rate_of_change(&state(&[("A", 3.0)])).unwrap();
        // W = 0.1 * 3^2 = 0.9
        assert_relative_eq!(d["A"], -1.8, epsilon = 1e-12);
        assert_relative_eq!(d["B"], 0.45, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_species_is_read_as_zero() {
        let mut step: Step = "A + B -> C".parse().unwrap();
        step.set_rate_constants(RateConstants::forward(5.0));
        let d = step.rate_of_change(&state(&[("A", 1.0)])).unwrap();
        assert_eq!(d["C"], 0.0);
    }

    #[test]
    fn test_unset_constants_are_configuration_errors() {
        let step: Step = "A -> B".parse().unwrap();
        assert!(matches!(
            step.rate_of_change(&state(&[("A", 1.0)])),
            Err(ConfigurationError::MissingForwardConstant(_))
        ));
        let mut step: Step = "A <--> B".parse().unwrap();
        step.set_rate_constants(RateConstants::forward(1.0));
        assert!(matches!(
            step.net_rate(&state(&[("A", 1.0)])),
            Err(ConfigurationError::MissingReverseConstant(_))
        ));
    }

    #[test]
    fn test_kr_of_irreversible_step_is_ignored() {
        let mut step: Step = "A -> B".parse().unwrap();
        step.set_rate_constants(RateConstants::reversible(1.0, 100.0));
        let rate = step.net_rate(&state(&[("A", 2.0), ("B", 5.0)])).unwrap();
        assert_relative_eq!(rate, 2.0);
    }

    #[test]
    fn test_partial_assignment_keeps_previous_values() {
        let mut step: Step = "A <--> B".parse().unwrap();
        step.set_rate_constants(RateConstants::reversible(1.0, 2.0));
        step.set_rate_constants(RateConstants {
            kf: None,
            kr: Some(3.0),
        });
        assert_eq!(step.kf(), Some(1.0));
        assert_eq!(step.kr(), Some(3.0));
        step.set_rate_constants_from_equilibrium(4.0, 0.5);
        assert_eq!(step.kf(), Some(2.0));
        assert_eq!(step.kr(), Some(0.5));
    }

    #[test]
    fn test_condensed_species_do_not_enter_rate_law() {
        let mut step: Step = "CaCO3(s) -> CaO(s) + CO2".parse().unwrap();
        step.set_rate_constants(RateConstants::forward(0.3));
        assert_eq!(step.species(), vec!["CO2".to_string()]);
        let d = step.rate_of_change(&state(&[("CO2", 1.0)])).unwrap();
        assert_eq!(d.len(), 1);
        assert_relative_eq!(d["CO2"], 0.3);
    }

    #[test]
    fn test_repeated_species_are_merged() {
        let step: Step = "A + A -> B".parse().unwrap();
        assert_eq!(step.reactants(), &[StoichTerm::new(2.0, "A")]);
        let step: Step = "1/2A + 1/3A -> B".parse().unwrap();
        assert_eq!(step.reactants()[0].ratio, Some((5, 6)));
        assert_eq!(step.reactants()[0].coefficient, 5.0 / 6.0);
        assert_eq!(step.to_string(), "5/6A -> B");
    }

    #[test]
    fn test_degenerate_step_is_rejected() {
        let result = Step::new(
            vec![StoichTerm::new(1.0, "A")],
            vec![StoichTerm::new(2.0, "A")],
            false,
        );
        assert_eq!(result, Err(ParseError::DegenerateStep("A".to_string())));
    }

    #[test]
    fn test_display() {
        let step: Step = "1/2A+2B<-->C".parse().unwrap();
        assert_eq!(step.to_string(), "1/2A + 2B <--> C");
        assert_eq!(format_coefficient(1.0 / 3.0), "1/3");
        assert_eq!(format_coefficient(3.0), "3");
        assert_eq!(format_coefficient(1.0), "");
        assert_eq!(format_coefficient(1.0 / 128.0), "1/128");
        assert_eq!(format_coefficient(355.0 / 113.0), "355/113");
        assert_eq!(StoichTerm::from_ratio(4, 6, "A").ratio, Some((2, 3)));
        assert_eq!(StoichTerm::from_ratio(1, 1024, "A").to_string(), "1/1024A");
    }

    #[test]
    fn test_symbolic_rate_matches_numerical() {
        let mut step: Step = "A + 2B <--> C".parse().unwrap();
        step.set_rate_constants(RateConstants::reversible(1.5, 0.25));
        let s = state(&[("A", 0.7), ("B", 1.3), ("C", 0.4)]);
        let rate_fun = step.rate_expression().unwrap().lambdify_owned(vec!["A", "B", "C"]);
        assert_relative_eq!(
            rate_fun(vec![0.7, 1.3, 0.4]),
            step.net_rate(&s).unwrap(),
            epsilon = 1e-12
        );
        let equations = step.differential_equations().unwrap();
        let d = step.rate_of_change(&s).unwrap();
        for species in ["A", "B", "C"] {
            let fun = equations[species].clone().lambdify_owned(vec!["A", "B", "C"]);
            assert_relative_eq!(fun(vec![0.7, 1.3, 0.4]), d[species], epsilon = 1e-12);
        }
    }
}
