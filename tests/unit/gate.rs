// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use mailforge::reconcile::gate::decide;
    use mailforge::reconcile::{GateDecision, GateInput, GateVeto, ReconcileError};

    #[test]
    fn test_full_truth_table() {
        let cases = [
            (false, Some(false), GateDecision::NoOp),
            (false, Some(true), GateDecision::EnableLast),
            (false, None, GateDecision::NoOp),
            (true, Some(false), GateDecision::DisableFirst),
            (true, Some(true), GateDecision::NoOp),
            (true, None, GateDecision::NoOp),
        ];
        for (observed, desired, expected) in cases {
            let input = GateInput { observed, desired, observed_methods: 1, desired_methods: Some(1) };
            assert_eq!(decide(input), Ok(expected), "observed={} desired={:?}", observed, desired);
        }
    }

    #[test]
    fn test_disable_with_drain_is_allowed() {
        let input = GateInput { observed: true, desired: Some(false), observed_methods: 3, desired_methods: Some(0) };
        assert_eq!(decide(input), Ok(GateDecision::DisableFirst));
    }

    #[test]
    fn test_veto_becomes_precondition_error() {
        let input = GateInput { observed: true, desired: Some(true), observed_methods: 1, desired_methods: Some(0) };
        let veto = decide(input).unwrap_err();
        assert_eq!(veto, GateVeto::DrainWhileRequired { observed_methods: 1 });

        let error: ReconcileError = veto.into();
        assert!(matches!(error, ReconcileError::Precondition(_)));
        assert!(error.is_user_facing());
    }

    #[test]
    fn test_already_empty_is_not_a_drain() {
        let input = GateInput { observed: true, desired: Some(true), observed_methods: 0, desired_methods: Some(0) };
        assert_eq!(decide(input), Ok(GateDecision::NoOp));
    }
}
