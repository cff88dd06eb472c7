//! Protocol planning: turning a high-level loading protocol into an ordered
//! list of primitive increments bounded by a maximum increment size.
//!
//! Both planners are pure; the [`Controller`](crate::controller::Controller)
//! wraps them to record the planned segment count for progress reporting.

use crate::error::{Result, SmartStepError};

/// Sections with a smaller absolute displacement change are treated as no
/// movement and skipped.
pub(crate) const SECTION_EPS: f64 = 1e-12;

/// Plans a transient protocol of `total_steps` time increments.
///
/// The returned sequence is simply `1..=total_steps`; its length sizes the
/// progress denominator.
pub fn plan_transient(total_steps: usize) -> Result<Vec<usize>> {
    if total_steps < 1 {
        return Err(SmartStepError::invalid_protocol(
            "a transient protocol requires at least one step",
        ));
    }
    Ok((1..=total_steps).collect())
}

/// Plans a piecewise-linear static displacement protocol.
///
/// `targets` lists successive target displacements; a leading `0.0` is
/// inserted when the protocol does not start there. Each section between
/// consecutive targets is chopped into segments of magnitude `max_step`
/// (signed like the section) with the remainder emitted last. When
/// `max_step` is `None` it defaults to the first section's length, which
/// requires at least two targets after normalization.
///
/// Guarantees, for every non-skipped section: emitted magnitudes sum to the
/// section's magnitude, no emitted magnitude exceeds `max_step` by more than
/// [`SECTION_EPS`], and no emitted segment is zero.
pub fn plan_static(targets: &[f64], max_step: Option<f64>) -> Result<Vec<f64>> {
    if let Some(&bad) = targets.iter().find(|target| !target.is_finite()) {
        return Err(SmartStepError::invalid_protocol(format!(
            "targets must be finite, found {bad}"
        )));
    }

    let mut path = Vec::with_capacity(targets.len() + 1);
    if targets.first().map_or(true, |&first| first != 0.0) {
        path.push(0.0);
    }
    path.extend_from_slice(targets);

    let max_step = match max_step {
        Some(step) => {
            if !(step > 0.0 && step.is_finite()) {
                return Err(SmartStepError::invalid_protocol(format!(
                    "max_step must be positive and finite, found {step}"
                )));
            }
            step
        }
        None => {
            if path.len() < 2 {
                return Err(SmartStepError::invalid_protocol(
                    "max_step can only default to the first section when the protocol has at \
                     least two targets",
                ));
            }
            let first_section = (path[1] - path[0]).abs();
            if first_section < SECTION_EPS {
                return Err(SmartStepError::invalid_protocol(
                    "max_step cannot default to a zero-length first section",
                ));
            }
            first_section
        }
    };

    let mut plan = Vec::new();
    for pair in path.windows(2) {
        let section = pair[1] - pair[0];
        if section.abs() < SECTION_EPS {
            continue;
        }
        let direction = section.signum();
        let mut remaining = section.abs();
        while remaining > max_step + SECTION_EPS {
            plan.push(direction * max_step);
            remaining -= max_step;
        }
        plan.push(direction * remaining);
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn total_travel(targets: &[f64]) -> f64 {
        let mut path = Vec::new();
        if targets.first().map_or(true, |&first| first != 0.0) {
            path.push(0.0);
        }
        path.extend_from_slice(targets);
        path.windows(2)
            .map(|pair| (pair[1] - pair[0]).abs())
            .filter(|section| *section >= SECTION_EPS)
            .sum()
    }

    #[test]
    fn transient_plan_enumerates_steps() {
        assert_eq!(plan_transient(5).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn transient_plan_rejects_zero_steps() {
        assert!(matches!(
            plan_transient(0),
            Err(SmartStepError::InvalidProtocol { .. })
        ));
    }

    #[test]
    fn cyclic_protocol_is_chunked_per_section() {
        let plan = plan_static(&[0.0, 1.0, -1.0, 0.0], Some(0.4)).unwrap();

        // Sections are +1.0, -2.0, +1.0: three, five, and three segments.
        assert_eq!(plan.len(), 11);
        let expected: [f64; 11] = [
            0.4, 0.4, 0.2, -0.4, -0.4, -0.4, -0.4, -0.4, 0.4, 0.4, 0.2,
        ];
        for (segment, want) in plan.iter().zip(expected.iter()) {
            assert_relative_eq!(*segment, *want, epsilon = 1e-9);
        }
    }

    #[test]
    fn leading_zero_is_inserted() {
        let plan = plan_static(&[1.0], Some(0.5)).unwrap();
        assert_eq!(plan.len(), 2);
        assert_relative_eq!(plan.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn segments_conserve_travel_and_respect_the_cap() {
        let cases: [(&[f64], Option<f64>); 4] = [
            (&[0.0, 1.0, -1.0, 0.0], Some(0.4)),
            (&[0.5, 2.5, 0.5], Some(0.3)),
            (&[0.0, 0.1, 0.1, 0.7], Some(0.25)),
            (&[0.0, 1.0, 3.0], None),
        ];
        for (targets, max_step) in cases {
            let plan = plan_static(targets, max_step).unwrap();
            let cap = max_step.unwrap_or(1.0);
            let travel: f64 = plan.iter().map(|segment| segment.abs()).sum();
            assert_relative_eq!(travel, total_travel(targets), epsilon = 1e-9);
            for segment in &plan {
                assert!(segment.abs() > 0.0);
                assert!(segment.abs() <= cap + SECTION_EPS, "segment {segment} exceeds cap {cap}");
            }
        }
    }

    #[test]
    fn zero_length_sections_are_skipped() {
        let plan = plan_static(&[0.0, 1.0, 1.0, 2.0], Some(1.0)).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn defaulted_max_step_requires_two_targets() {
        assert!(matches!(
            plan_static(&[], None),
            Err(SmartStepError::InvalidProtocol { .. })
        ));
        assert!(matches!(
            plan_static(&[0.0], None),
            Err(SmartStepError::InvalidProtocol { .. })
        ));
    }

    #[test]
    fn non_finite_targets_are_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(
                matches!(
                    plan_static(&[0.0, bad], Some(0.4)),
                    Err(SmartStepError::InvalidProtocol { .. })
                ),
                "target {bad} must be rejected"
            );
        }
    }

    #[test]
    fn non_finite_max_step_is_rejected() {
        for bad in [f64::NAN, f64::INFINITY] {
            assert!(
                matches!(
                    plan_static(&[0.0, 1.0], Some(bad)),
                    Err(SmartStepError::InvalidProtocol { .. })
                ),
                "max_step {bad} must be rejected"
            );
        }
    }

    #[test]
    fn exact_multiple_emits_full_sized_remainder() {
        let plan = plan_static(&[0.0, 1.2], Some(0.4)).unwrap();
        assert_eq!(plan.len(), 3);
        for segment in &plan {
            assert_relative_eq!(*segment, 0.4, epsilon = 1e-9);
        }
    }
}
