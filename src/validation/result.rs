//! Validation results: the problem list plus the match-quality
//! counters that drive alternative-arm ranking.
use crate::problems::{ErrorCode, Problem, ProblemType};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Clone, Debug, Default)]
pub struct ValidationResult {
    pub problems: Vec<Problem>,
    /// Properties of the node that a schema said anything about.
    pub properties_matches: u32,
    /// Properties whose value validated cleanly (or matched an enum).
    pub properties_value_matches: u32,
    /// Properties pinned to a single-value enum, the strongest signal a
    /// discriminating property can give.
    pub primary_value_matches: u32,
    pub enum_value_match: bool,
    pub enum_values: Vec<Value>,
}

impl ValidationResult {
    pub fn new() -> ValidationResult {
        ValidationResult::default()
    }

    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    /// Absorb another result's problems.
    pub fn merge(&mut self, other: ValidationResult) {
        self.problems.extend(other.problems);
    }

    /// Merge the result of validating one property value and update the
    /// match counters from it.
    pub fn merge_property_match(&mut self, property: ValidationResult) {
        let enum_match = property.enum_value_match;
        let single_enum = enum_match && property.enum_values.len() == 1;
        let clean_with_properties = !property.has_problems() && property.properties_matches > 0;
        self.merge(property);
        self.properties_matches += 1;
        if enum_match || clean_with_properties {
            self.properties_value_matches += 1;
        }
        if single_enum {
            self.primary_value_matches += 1;
        }
    }

    /// When neither side matched its enum, pool the accepted values and
    /// rewrite the enum problems to list the union.
    pub fn merge_enum_values(&mut self, other: &ValidationResult) {
        if self.enum_value_match || other.enum_value_match || other.enum_values.is_empty() {
            return;
        }
        self.enum_values.extend(other.enum_values.iter().cloned());
        let listing = self
            .enum_values
            .iter()
            .map(|v| serde_json::to_string(v).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(", ");
        for problem in &mut self.problems {
            if problem.code == Some(ErrorCode::EnumValueMismatch) {
                problem.message = format!("Value is not accepted. Valid values: {}.", listing);
            }
        }
    }

    /// Merge warnings of the same family, offset and (for missing
    /// properties) arguments from a tied alternative arm, pooling
    /// arguments and schema attribution.
    pub fn merge_similar_warnings(&mut self, other: &ValidationResult) {
        const MERGEABLE: [ProblemType; 3] = [
            ProblemType::MissingRequiredProp,
            ProblemType::TypeMismatch,
            ProblemType::ConstMismatch,
        ];
        for problem_type in MERGEABLE {
            for best in self
                .problems
                .iter_mut()
                .filter(|p| p.problem_type == Some(problem_type))
            {
                let candidate = other.problems.iter().find(|p| {
                    p.problem_type == Some(problem_type)
                        && p.location.offset == best.location.offset
                        && (problem_type != ProblemType::MissingRequiredProp
                            || p.problem_args == best.problem_args)
                });
                if let Some(candidate) = candidate {
                    for arg in &candidate.problem_args {
                        if !best.problem_args.contains(arg) {
                            best.problem_args.push(arg.clone());
                        }
                    }
                    best.message = problem_type.message(&best.problem_args);
                    for uri in &candidate.schema_uris {
                        if !best.schema_uris.contains(uri) {
                            best.schema_uris.push(uri.clone());
                        }
                    }
                }
            }
        }
    }

    /// Generic ranking: clean beats broken, then enum match, then the
    /// value/primary/property counters.
    pub fn compare_generic(&self, other: &ValidationResult) -> Ordering {
        let has_problems = self.has_problems();
        if has_problems != other.has_problems() {
            return if has_problems {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        if self.enum_value_match != other.enum_value_match {
            return if other.enum_value_match {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        if self.properties_value_matches != other.properties_value_matches {
            return self
                .properties_value_matches
                .cmp(&other.properties_value_matches);
        }
        if self.primary_value_matches != other.primary_value_matches {
            return self.primary_value_matches.cmp(&other.primary_value_matches);
        }
        self.properties_matches.cmp(&other.properties_matches)
    }

    /// Kubernetes ranking: property coverage dominates; problems only
    /// break near-ties.
    pub fn compare_kubernetes(&self, other: &ValidationResult) -> Ordering {
        if self.properties_matches != other.properties_matches {
            return self.properties_matches.cmp(&other.properties_matches);
        }
        if self.enum_value_match != other.enum_value_match {
            return if other.enum_value_match {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        if self.primary_value_matches != other.primary_value_matches {
            return self.primary_value_matches.cmp(&other.primary_value_matches);
        }
        if self.properties_value_matches != other.properties_value_matches {
            return self
                .properties_value_matches
                .cmp(&other.properties_value_matches);
        }
        if self.has_problems() != other.has_problems() {
            return if self.has_problems() {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        self.properties_matches.cmp(&other.properties_matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(problems: usize, enum_match: bool, pvm: u32, primary: u32, pm: u32) -> ValidationResult {
        ValidationResult {
            problems: (0..problems)
                .map(|i| Problem::warning(i, 1, "problem"))
                .collect(),
            properties_matches: pm,
            properties_value_matches: pvm,
            primary_value_matches: primary,
            enum_value_match: enum_match,
            enum_values: Vec::new(),
        }
    }

    #[test]
    fn generic_prefers_problem_free() {
        let clean = result(0, false, 0, 0, 0);
        let broken = result(2, true, 5, 5, 5);
        assert_eq!(clean.compare_generic(&broken), Ordering::Greater);
        assert_eq!(broken.compare_generic(&clean), Ordering::Less);
    }

    #[test]
    fn generic_breaks_ties_on_enum_then_counters() {
        let with_enum = result(0, true, 0, 0, 0);
        let without = result(0, false, 3, 0, 3);
        assert_eq!(with_enum.compare_generic(&without), Ordering::Greater);
        let more_values = result(1, false, 2, 0, 2);
        let fewer_values = result(1, false, 1, 0, 4);
        assert_eq!(more_values.compare_generic(&fewer_values), Ordering::Greater);
    }

    #[test]
    fn kubernetes_prefers_property_coverage_despite_problems() {
        let covered_but_broken = result(3, false, 0, 0, 4);
        let clean_but_sparse = result(0, true, 2, 2, 1);
        assert_eq!(
            covered_but_broken.compare_kubernetes(&clean_but_sparse),
            Ordering::Greater
        );
    }

    #[test]
    fn property_match_counters() {
        let mut outer = ValidationResult::new();
        let mut clean = ValidationResult::new();
        clean.properties_matches = 1;
        outer.merge_property_match(clean);
        assert_eq!(outer.properties_matches, 1);
        assert_eq!(outer.properties_value_matches, 1);
        assert_eq!(outer.primary_value_matches, 0);

        let mut single_enum = ValidationResult::new();
        single_enum.enum_value_match = true;
        single_enum.enum_values = vec![serde_json::json!("only")];
        outer.merge_property_match(single_enum);
        assert_eq!(outer.properties_matches, 2);
        assert_eq!(outer.properties_value_matches, 2);
        assert_eq!(outer.primary_value_matches, 1);
    }

    #[test]
    fn similar_type_warnings_pool_expected_types() {
        let mut best = ValidationResult::new();
        best.problems.push(Problem {
            code: None,
            problem_type: Some(ProblemType::TypeMismatch),
            problem_args: vec!["string".to_string()],
            ..Problem::warning(4, 2, "Incorrect type. Expected \"string\".")
        });
        let mut other = ValidationResult::new();
        other.problems.push(Problem {
            code: None,
            problem_type: Some(ProblemType::TypeMismatch),
            problem_args: vec!["number".to_string()],
            ..Problem::warning(4, 2, "Incorrect type. Expected \"number\".")
        });
        best.merge_similar_warnings(&other);
        assert_eq!(
            best.problems[0].message,
            "Incorrect type. Expected \"string | number\"."
        );
    }
}
