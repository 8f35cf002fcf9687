// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Failures and interruptions part-way through a pass. Nothing is rolled back
//! and the partial snapshot has to show every step that went through.

#[cfg(test)]
mod tests {
    use crate::common::{fake, kinds, reconciler, seed};
    use mailforge::api::fake::CallKind;
    use mailforge::api::{ApiError, InMemoryApi};
    use mailforge::model::{AccountConfig, Field, RecoveryMethod};
    use mailforge::reconcile::{AccountReconciler, ConvergeContext, ConvergeWarning, ReconcileError, Step};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn three_methods() -> Vec<RecoveryMethod> {
        vec![RecoveryMethod::email("a@r.com"), RecoveryMethod::email("b@r.com"), RecoveryMethod::email("c@r.com")]
    }

    fn with_two_factor(handle: &str) -> AccountConfig {
        let mut desired = AccountConfig::new(handle);
        desired.require_two_factor = Field::Known(true);
        desired.recovery_methods = Field::Known(three_methods());
        desired
    }

    #[tokio::test]
    async fn test_cancel_mid_sequence_stops_further_calls() {
        let api = fake();
        let token = CancellationToken::new();
        let trigger = token.clone();
        api.set_hook(move |call| {
            if call.kind() == CallKind::UpsertRecoveryMethod {
                trigger.cancel();
            }
        });
        let ctx = ConvergeContext::new().with_cancellation(token);

        let failure = reconciler(&api).create(&with_two_factor("alice"), &ctx).await.unwrap_err();

        // The upsert that observed the cancellation had already been handed over.
        assert_eq!(kinds(&api.calls()), vec![CallKind::CreateAccount, CallKind::UpsertRecoveryMethod]);
        assert_eq!(failure.step, Step::UpsertRecoveryMethod("b@r.com".into()));
        assert!(failure.error.is_interrupt());
        let partial = failure.partial.unwrap();
        assert_eq!(partial.recovery_methods, vec![RecoveryMethod::email("a@r.com")]);
        assert_eq!(partial.require_two_factor, None);
        assert_eq!(api.methods("alice").len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_start_makes_no_calls() {
        let api = fake();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ConvergeContext::new().with_cancellation(token);

        let failure = reconciler(&api).create(&with_two_factor("bob"), &ctx).await.unwrap_err();

        assert_eq!(failure.step, Step::CreateAccount);
        assert_eq!(failure.error, ReconcileError::Api(ApiError::Cancelled));
        assert!(failure.partial.is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_after_disable_keeps_disable() {
        let api = fake();
        let observed = seed(&api, "carol", true, &three_methods());
        let token = CancellationToken::new();
        let trigger = token.clone();
        api.set_hook(move |call| {
            if call.kind() == CallKind::ModifyAccount {
                trigger.cancel();
            }
        });
        let mut desired = observed.as_config();
        desired.require_two_factor = Field::Known(false);
        desired.recovery_methods = Field::Null;

        let failure = reconciler(&api)
            .update(&desired, &observed, &ConvergeContext::new().with_cancellation(token))
            .await
            .unwrap_err();

        assert_eq!(failure.step, Step::DeleteRecoveryMethod("a@r.com".into()));
        let partial = failure.partial.unwrap();
        assert_eq!(partial.require_two_factor, Some(false));
        assert_eq!(partial.recovery_methods.len(), 3);
        assert_eq!(api.count(CallKind::DeleteRecoveryMethod), 0);
    }

    #[tokio::test]
    async fn test_failed_upsert_reports_target_and_progress() {
        let api = fake();
        api.fail_on(
            CallKind::UpsertRecoveryMethod,
            1,
            ApiError::Status { status: 500, message: Some("internal error".into()) },
        );

        let failure = reconciler(&api)
            .create(&with_two_factor("dan"), &ConvergeContext::new())
            .await
            .unwrap_err();

        assert_eq!(failure.step, Step::UpsertRecoveryMethod("b@r.com".into()));
        assert!(matches!(&failure.error, ReconcileError::Api(ApiError::Status { status: 500, .. })));
        assert_eq!(
            failure.to_string(),
            "upsert recovery method 'b@r.com' failed: API returned status 500: internal error"
        );

        let partial = failure.partial.unwrap();
        assert_eq!(partial.recovery_methods, vec![RecoveryMethod::email("a@r.com")]);
        assert_eq!(partial.require_two_factor, Some(false));
        assert_eq!(api.count(CallKind::UpsertRecoveryMethod), 2);
        assert_eq!(api.count(CallKind::ModifyAccount), 0);
    }

    #[tokio::test]
    async fn test_failed_modify_keeps_earlier_disable_in_partial() {
        let api = fake();
        let observed = seed(&api, "erin", true, &[RecoveryMethod::email("e@r.com")]);
        api.fail_on(CallKind::ModifyAccount, 1, ApiError::Transport("connection reset".into()));
        let mut desired = observed.as_config();
        desired.require_two_factor = Field::Known(false);
        desired.search_indexing = Field::Known(false);

        let failure = reconciler(&api)
            .update(&desired, &observed, &ConvergeContext::new())
            .await
            .unwrap_err();

        assert_eq!(failure.step, Step::ModifyAccount);
        let partial = failure.partial.unwrap();
        assert_eq!(partial.require_two_factor, Some(false));
        assert_eq!(partial.search_indexing, Some(true));
    }

    #[tokio::test]
    async fn test_partial_falls_back_to_local_progress_when_read_fails() {
        let api = fake();
        api.fail_on(CallKind::ModifyAccount, 0, ApiError::Status { status: 400, message: None });
        api.fail_on(CallKind::GetAccount, 0, ApiError::Transport("timeout".into()));

        let failure = reconciler(&api)
            .create(&with_two_factor("fay"), &ConvergeContext::new())
            .await
            .unwrap_err();

        assert_eq!(failure.step, Step::EnableTwoFactor);
        let partial = failure.partial.unwrap();
        assert_eq!(partial.recovery_methods, three_methods());
        assert_eq!(partial.require_two_factor, None);
    }

    #[tokio::test]
    async fn test_read_back_failure_is_only_a_warning() {
        let api = fake();
        api.fail_on(CallKind::ListRecoveryMethods, 0, ApiError::Transport("connection reset".into()));

        let converged = reconciler(&api)
            .create(&with_two_factor("gina"), &ConvergeContext::new())
            .await
            .unwrap();

        assert_eq!(converged.state.recovery_methods, three_methods());
        assert_eq!(converged.state.require_two_factor, Some(true));
        assert!(matches!(
            converged.warnings.as_slice(),
            [ConvergeWarning::ReadBackFailed { step: Step::ListRecoveryMethods, .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_before_apply_reads_back_server_state() {
        let api = Arc::new(InMemoryApi::new().with_latency(Duration::from_secs(2)));
        let rec = AccountReconciler::new(api.clone());
        let ctx = ConvergeContext::new().with_timeout(Duration::from_secs(3));

        let failure = rec.create(&with_two_factor("hank"), &ctx).await.unwrap_err();

        // createUser lands at t=2s; the first upsert would land at t=4s.
        assert_eq!(failure.step, Step::UpsertRecoveryMethod("a@r.com".into()));
        assert_eq!(failure.error, ReconcileError::Api(ApiError::Abandoned));
        assert_eq!(
            kinds(&api.calls()),
            vec![CallKind::CreateAccount, CallKind::GetAccount, CallKind::ListRecoveryMethods]
        );
        let partial = failure.partial.unwrap();
        assert!(partial.recovery_methods.is_empty());
        assert_eq!(partial.require_two_factor, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_after_apply_reports_applied_method() {
        let api = Arc::new(InMemoryApi::new().with_reply_latency(Duration::from_secs(2)));
        let rec = AccountReconciler::new(api.clone());
        let ctx = ConvergeContext::new().with_timeout(Duration::from_secs(3));

        let failure = rec.create(&with_two_factor("iris"), &ctx).await.unwrap_err();

        // The first upsert is applied at t=2s but its reply is still pending at t=3s.
        assert_eq!(failure.step, Step::UpsertRecoveryMethod("a@r.com".into()));
        assert!(failure.error.is_interrupt());
        let partial = failure.partial.unwrap();
        assert_eq!(partial.recovery_methods, vec![RecoveryMethod::email("a@r.com")]);
        assert_eq!(partial.recovery_methods.len(), api.methods("iris").len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_waits_for_call_in_flight() {
        let api = Arc::new(InMemoryApi::new().with_reply_latency(Duration::from_millis(200)));
        let observed = seed(&api, "jack", false, &[]);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let mut desired = observed.as_config();
        desired.recovery_methods =
            Field::Known(vec![RecoveryMethod::email("a@r.com"), RecoveryMethod::email("b@r.com")]);

        let failure = AccountReconciler::new(api.clone())
            .update(&desired, &observed, &ConvergeContext::new().with_cancellation(token))
            .await
            .unwrap_err();

        assert_eq!(failure.step, Step::UpsertRecoveryMethod("b@r.com".into()));
        assert_eq!(failure.error, ReconcileError::Api(ApiError::Cancelled));
        let partial = failure.partial.unwrap();
        assert_eq!(partial.recovery_methods, vec![RecoveryMethod::email("a@r.com")]);
        assert_eq!(partial.recovery_methods.len(), api.methods("jack").len());
        assert_eq!(api.count(CallKind::UpsertRecoveryMethod), 1);
    }
}
