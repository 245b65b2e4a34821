//! # Reaction equation parser
//!
//! Turns text like `1/2A + 2B <--> C` into a `Step` and a multi-line text into a `Mechanism`.
//!
//! Grammar
//! ```text
//! term        := [coefficient] species_name [phase]
//! coefficient := integer | integer "/" integer
//! phase       := "(s)" | "(l)" | "(g)" | "(aq)"
//! side        := term ("+" term)*
//! arrow       := "->" | "=>" | "→" | "<-->" | "<->" | "<=>" | "⇌" | "="
//! step_line   := side arrow side
//! ```
//! All whitespace is removed before parsing, so `2 A+B->C` and `2A + B -> C` are the same
//! equation. Exactly one arrow must be present. In a mechanism text every non-empty line that
//! does not start with `#` is one step; errors carry the 1-based line number.
use crate::Kinetics::kinetics_errors::ParseError;
use crate::Kinetics::mechanism::Mechanism;
use crate::Kinetics::reaction_step::{StoichTerm, Step};
use log::debug;
use regex::Regex;
use std::sync::OnceLock;

/// arrows and whether they mark a reversible step; longer tokens go first so that `<-->` is not
/// read as `->` and `=>` is not read as `=`
const ARROWS: [(&str, bool); 8] = [
    ("<-->", true),
    ("<->", true),
    ("<=>", true),
    ("->", false),
    ("=>", false),
    ("⇌", true),
    ("→", false),
    ("=", true),
];

static TERM_REGEX: OnceLock<Regex> = OnceLock::new();

fn term_regex() -> &'static Regex {
    TERM_REGEX.get_or_init(|| {
        Regex::new(r"^(?:(\d+)(?:/(\d+))?)?([A-Za-z][A-Za-z0-9_]*(?:\((?:s|l|g|aq)\))?)$")
            .expect("term pattern is a valid regex")
    })
}

/// position, length and reversibility of every arrow found in the equation
fn find_arrows(equation: &str) -> Vec<(usize, usize, bool)> {
    let mut found = Vec::new();
    let mut skip_until = 0;
    for (i, _) in equation.char_indices() {
        if i < skip_until {
            continue;
        }
        if let Some((arrow, reversible)) = ARROWS
            .iter()
            .find(|(arrow, _)| equation[i..].starts_with(arrow))
        {
            found.push((i, arrow.len(), *reversible));
            skip_until = i + arrow.len();
        }
    }
    found
}

/// parses one `[coefficient]species` term
pub fn parse_term(term: &str) -> Result<StoichTerm, ParseError> {
    let captures = term_regex()
        .captures(term)
        .ok_or_else(|| ParseError::InvalidTerm(term.to_string()))?;
    let species = captures
        .get(3)
        .map(|m| m.as_str())
        .ok_or_else(|| ParseError::InvalidTerm(term.to_string()))?;
    let (numerator, denominator) = match captures.get(1) {
        None => (1, 1),
        Some(numerator) => {
            let numerator: u64 = numerator
                .as_str()
                .parse()
                .map_err(|_| ParseError::InvalidTerm(term.to_string()))?;
            let denominator: u64 = match captures.get(2) {
                Some(d) => d
                    .as_str()
                    .parse()
                    .map_err(|_| ParseError::InvalidTerm(term.to_string()))?,
                None => 1,
            };
            if denominator == 0 {
                return Err(ParseError::ZeroDenominator(term.to_string()));
            }
            if numerator == 0 {
                return Err(ParseError::ZeroCoefficient(term.to_string()));
            }
            (numerator, denominator)
        }
    };
    Ok(StoichTerm::from_ratio(numerator, denominator, species))
}

fn parse_side(
    side: &str,
    side_name: &'static str,
    equation: &str,
) -> Result<Vec<StoichTerm>, ParseError> {
    if side.is_empty() {
        return Err(ParseError::EmptySide {
            side: side_name,
            equation: equation.to_string(),
        });
    }
    side.split('+').map(parse_term).collect()
}

/// parses a single reaction equation into a `Step` without rate constants
pub fn parse_step(equation: &str) -> Result<Step, ParseError> {
    let cleaned: String = equation.chars().filter(|c| !c.is_whitespace()).collect();
    let arrows = find_arrows(&cleaned);
    let (position, length, is_reversible) = match arrows.as_slice() {
        [] => return Err(ParseError::MissingArrow(equation.trim().to_string())),
        [single] => *single,
        _ => return Err(ParseError::MultipleArrows(equation.trim().to_string())),
    };
    let reactants = parse_side(&cleaned[..position], "reactant", equation.trim())?;
    let products = parse_side(&cleaned[position + length..], "product", equation.trim())?;
    let step = Step::new(reactants, products, is_reversible)?;
    debug!("parsed '{}' into '{}'", equation.trim(), step);
    Ok(step)
}

/// parses a newline-separated list of equations; blank lines and `#` comments are skipped
pub fn parse_mechanism(text: &str) -> Result<Mechanism, ParseError> {
    let mut steps = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step = parse_step(line).map_err(|e| ParseError::AtLine {
            line: i + 1,
            source: Box::new(e),
        })?;
        steps.push(step);
    }
    Mechanism::new(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractional_coefficients() {
        let step = parse_step("1/2A+2B->C").unwrap();
        assert_eq!(
            step.reactants(),
            &[StoichTerm::new(0.5, "A"), StoichTerm::new(2.0, "B")]
        );
        assert_eq!(step.products(), &[StoichTerm::new(1.0, "C")]);
        assert!(!step.is_reversible());
    }

    #[test]
    fn test_arrow_synonyms() {
        for (equation, reversible) in [
            ("A -> B", false),
            ("A => B", false),
            ("A → B", false),
            ("A <--> B", true),
            ("A <-> B", true),
            ("A <=> B", true),
            ("A ⇌ B", true),
            ("A = B", true),
        ] {
            let step = parse_step(equation).unwrap();
            assert_eq!(step.is_reversible(), reversible, "{}", equation);
            assert_eq!(step.species(), vec!["A".to_string(), "B".to_string()]);
        }
    }

    #[test]
    fn test_whitespace_is_insignificant() {
        assert_eq!(
            parse_step(" 2 A +B   ->  C ").unwrap(),
            parse_step("2A+B->C").unwrap()
        );
    }

    #[test]
    fn test_species_names_and_phases() {
        let step = parse_step("2H2O(l) + CO2(g) -> H2CO3_aq + O(s)").unwrap();
        assert_eq!(step.reactants()[0], StoichTerm::new(2.0, "H2O(l)"));
        assert_eq!(step.reactants()[1].species, "CO2(g)");
        assert_eq!(
            step.species(),
            vec!["CO2(g)".to_string(), "H2CO3_aq".to_string()]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_step("A--C"), Err(ParseError::MissingArrow(_))));
        assert!(matches!(parse_step("A + B"), Err(ParseError::MissingArrow(_))));
        assert!(matches!(
            parse_step("A -> B -> C"),
            Err(ParseError::MultipleArrows(_))
        ));
        assert!(matches!(
            parse_step("-> B"),
            Err(ParseError::EmptySide { side: "reactant", .. })
        ));
        assert!(matches!(
            parse_step("A <-->"),
            Err(ParseError::EmptySide { side: "product", .. })
        ));
        assert!(matches!(parse_step("1/0A -> B"), Err(ParseError::ZeroDenominator(_))));
        assert!(matches!(parse_step("0A -> B"), Err(ParseError::ZeroCoefficient(_))));
        assert!(matches!(parse_step("A + -> B"), Err(ParseError::InvalidTerm(_))));
        assert!(matches!(parse_step("2 -> B"), Err(ParseError::InvalidTerm(_))));
        assert!(matches!(parse_step("A -> 2.5B"), Err(ParseError::InvalidTerm(_))));
        assert!(matches!(parse_step("A + B -> A"), Err(ParseError::DegenerateStep(_))));
    }

    #[test]
    fn test_display_round_trip() {
        for equation in [
            "A+B->C",
            "1/2A + 2B <--> C",
            "2NO + O2 -> 2NO2",
            "S + E <=> C",
            "1/3X + 3/4Y -> Z(s) + W",
            "1/128A -> B",
            "2/6A + 1/3A -> 7/1000003B",
        ] {
            let step = parse_step(equation).unwrap();
            let reparsed = parse_step(&step.to_string()).unwrap();
            assert_eq!(step, reparsed);
        }
        assert_eq!(parse_step("1/128A -> B").unwrap().to_string(), "1/128A -> B");
    }

    #[test]
    fn test_parse_mechanism() {
        let text = "# enzyme kinetics\nS + E <--> C\n\n   C -> E + P\n";
        let mechanism = parse_mechanism(text).unwrap();
        assert_eq!(mechanism.steps().len(), 2);
        assert!(mechanism.steps()[0].is_reversible());
        assert_eq!(mechanism.species(), &["S", "E", "C", "P"]);
    }

    #[test]
    fn test_mechanism_errors_carry_line() {
        let err = parse_mechanism("A -> B\nB -- C").unwrap_err();
        match err {
            ParseError::AtLine { line, source } => {
                assert_eq!(line, 2);
                assert!(matches!(*source, ParseError::MissingArrow(_)));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(
            parse_mechanism("# nothing\n\n").unwrap_err(),
            ParseError::EmptyMechanism
        );
    }
}
