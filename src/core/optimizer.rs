use super::error::SimError;

const REL_TOLERANCE: f64 = 1e-9;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Objective {
    Maximize,
    Minimize,
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= REL_TOLERANCE * a.abs().max(b.abs())
}

/// Index of the last score that is not worse than the best seen before it.
pub fn select_last_best<I>(scores: I, objective: Objective) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, score) in scores.into_iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        let not_worse = match best {
            None => true,
            Some((_, current)) => {
                approx_eq(score, current)
                    || match objective {
                        Objective::Maximize => score >= current,
                        Objective::Minimize => score <= current,
                    }
            }
        };
        if not_worse {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

pub fn pick_last_best<'a, T>(
    candidates: &'a [T],
    objective: Objective,
    sweep: &'static str,
    score: impl Fn(&T) -> f64,
) -> Result<&'a T, SimError> {
    select_last_best(candidates.iter().map(score), objective)
        .map(|idx| &candidates[idx])
        .ok_or(SimError::EmptySweepResult { sweep })
}

pub fn summed_squared_distance(
    reference: &[(f64, f64)],
    candidate: &[(f64, f64)],
) -> Result<f64, SimError> {
    if reference.len() != candidate.len() {
        let index = reference.len().min(candidate.len());
        return Err(SimError::GridMismatch {
            index,
            expected: reference.get(index).map_or(f64::NAN, |p| p.0),
            actual: candidate.get(index).map_or(f64::NAN, |p| p.0),
        });
    }

    let mut total = 0.0;
    for (index, (&(expected, optimum), &(actual, value))) in
        reference.iter().zip(candidate).enumerate()
    {
        if !approx_eq(expected, actual) {
            return Err(SimError::GridMismatch {
                index,
                expected,
                actual,
            });
        }
        total += (optimum - value).powi(2);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_eq_follows_relative_tolerance() {
        assert!(approx_eq(1.0, 1.0 + 1e-12));
        assert!(approx_eq(1e6, 1e6 + 1e-4));
        assert!(!approx_eq(1.0, 1.0001));
        assert!(approx_eq(f64::INFINITY, f64::INFINITY));
        assert!(!approx_eq(f64::NEG_INFINITY, -1e300));
    }

    #[test]
    fn maximize_prefers_later_candidate_on_tie() {
        let scores = [1.0, 3.0, 3.0 + 1e-12, 2.0];
        assert_eq!(select_last_best(scores, Objective::Maximize), Some(2));

        let exact = [5.0, 5.0, 5.0];
        assert_eq!(select_last_best(exact, Objective::Maximize), Some(2));
    }

    #[test]
    fn maximize_keeps_earlier_strictly_better_candidate() {
        let scores = [1.0, 4.0, 3.9, 2.0];
        assert_eq!(select_last_best(scores, Objective::Maximize), Some(1));
    }

    #[test]
    fn minimize_prefers_later_candidate_on_tie() {
        let scores = [9.0, 2.0, 4.0, 2.0 - 1e-12, 7.0];
        assert_eq!(select_last_best(scores, Objective::Minimize), Some(3));
    }

    #[test]
    fn nan_scores_are_never_selected() {
        let scores = [f64::NAN, 1.0, f64::NAN];
        assert_eq!(select_last_best(scores, Objective::Maximize), Some(1));
        assert_eq!(select_last_best([f64::NAN], Objective::Maximize), None);
    }

    #[test]
    fn empty_grid_is_an_explicit_error() {
        let empty: [u32; 0] = [];
        let err = pick_last_best(&empty, Objective::Maximize, "retirement_age", |v| {
            f64::from(*v)
        })
        .expect_err("empty grid must fail");
        assert_eq!(
            err,
            SimError::EmptySweepResult {
                sweep: "retirement_age"
            }
        );
    }

    #[test]
    fn pick_returns_candidate_reference() {
        let ages = [30u32, 31, 32, 33];
        let happiness = [1.0, 2.5, 2.5, 0.0];
        let best = pick_last_best(&ages, Objective::Maximize, "ages", |age| {
            happiness[(*age - 30) as usize]
        })
        .expect("non-empty");
        assert_eq!(*best, 32);
    }

    #[test]
    fn summed_squared_distance_requires_aligned_grids() {
        let reference = [(1.0, 10.0), (1.1, 12.0)];
        let candidate = [(1.0, 7.0), (1.1, 12.5)];
        let total = summed_squared_distance(&reference, &candidate).expect("aligned");
        assert!((total - 9.25).abs() <= 1e-12);

        let shifted = [(1.0, 7.0), (1.2, 12.5)];
        assert!(matches!(
            summed_squared_distance(&reference, &shifted),
            Err(SimError::GridMismatch { index: 1, .. })
        ));
        assert!(matches!(
            summed_squared_distance(&reference, &candidate[..1]),
            Err(SimError::GridMismatch { index: 1, .. })
        ));
    }
}
