//! Tolerance evaluator - pure pass/fail verdicts for measured values

use crate::entities::dimension::JobDimension;
use crate::entities::measurement::PassFail;

/// Evaluate a measured value against a dimension's tolerances.
///
/// Rules, in order:
/// 1. A `go/nogo` dimension is a binary gauge check: pass iff the reading
///    is exactly 1 (nominal and tolerances are ignored).
/// 2. With both tolerances defined, the acceptance band is
///    `nominal + tolerance_minus ..= nominal + tolerance_plus`, inclusive
///    on both bounds. The minus tolerance is stored signed, so the lower
///    bound is an addition (a subtraction in the common case).
/// 3. With no tolerance band defined, the value passes unconditionally.
pub fn evaluate(dimension: &JobDimension, actual_value: f64) -> PassFail {
    if dimension.is_go_nogo() {
        return if actual_value == 1.0 {
            PassFail::Pass
        } else {
            PassFail::Fail
        };
    }

    match dimension.bounds() {
        Some((lower, upper)) => {
            if lower <= actual_value && actual_value <= upper {
                PassFail::Pass
            } else {
                PassFail::Fail
            }
        }
        None => PassFail::Pass,
    }
}
