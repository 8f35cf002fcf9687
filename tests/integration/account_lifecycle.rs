// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::common::{fake, item, kinds, reconciler, seed};
    use mailforge::api::fake::{ApiCall, CallKind};
    use mailforge::api::types::{ModifyUserRequest, UpsertPasswordResetRequest};
    use mailforge::model::{AccountConfig, AccountState, Credential, Field, MethodKind, RecoveryMethod, Secret};
    use mailforge::reconcile::{ConvergeContext, ReadOutcome, ReconcileError, Step};

    #[tokio::test]
    async fn test_read_of_missing_account_signals_removal() {
        let api = fake();
        let outcome = reconciler(&api)
            .read(&AccountState::seed("ghost"), &ConvergeContext::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReadOutcome::NotFound);
        assert_eq!(api.calls(), vec![ApiCall::GetAccount("ghost".into())]);
    }

    #[tokio::test]
    async fn test_update_to_observed_only_reads() {
        let api = fake();
        let methods = [
            RecoveryMethod::email("a@r.com").with_description("personal"),
            RecoveryMethod::phone("+15550100").with_mfa_reset(true),
        ];
        let observed = seed(&api, "alice", true, &methods);

        let converged = reconciler(&api)
            .update(&observed.as_config(), &observed, &ConvergeContext::new())
            .await
            .unwrap();

        assert!(api.mutations().is_empty());
        assert_eq!(kinds(&api.calls()), vec![CallKind::GetAccount, CallKind::ListRecoveryMethods]);
        assert_eq!(converged.state, observed);
    }

    #[tokio::test]
    async fn test_changed_description_upserts_only_that_method() {
        let api = fake();
        let a = RecoveryMethod::email("a@r.com");
        let b = RecoveryMethod::email("b@r.com");
        let observed = seed(&api, "bob", false, &[a.clone(), b.clone()]);
        let mut desired = observed.as_config();
        let a2 = a.with_description("work");
        let c = RecoveryMethod::phone("+15550199");
        desired.recovery_methods = Field::Known(vec![a2.clone(), b.clone(), c.clone()]);

        let converged = reconciler(&api).update(&desired, &observed, &ConvergeContext::new()).await.unwrap();

        let touched: Vec<String> = api
            .mutations()
            .into_iter()
            .map(|call| match call {
                ApiCall::UpsertRecoveryMethod(UpsertPasswordResetRequest { target, .. }) => target,
                other => panic!("unexpected call {:?}", other),
            })
            .collect();
        assert_eq!(touched.len(), 2);
        assert!(touched.contains(&"a@r.com".to_string()));
        assert!(touched.contains(&"+15550199".to_string()));
        assert_eq!(converged.state.recovery_methods, vec![a2, b, c]);
    }

    #[tokio::test]
    async fn test_delete_is_one_call() {
        let api = fake();
        let observed = seed(&api, "carol", true, &[RecoveryMethod::email("a@r.com"), RecoveryMethod::email("b@r.com")]);

        reconciler(&api).delete(&observed, &ConvergeContext::new()).await.unwrap();

        assert_eq!(api.calls(), vec![ApiCall::DeleteAccount("carol".into())]);
        assert!(api.account("carol").is_none());
    }

    #[tokio::test]
    async fn test_import_then_read() {
        let api = fake();
        seed(&api, "dan", true, &[RecoveryMethod::email("d@r.com")]);
        let rec = reconciler(&api);

        let seeded = rec.import("dan").unwrap();
        assert_eq!(seeded, AccountState::seed("dan"));
        assert!(api.calls().is_empty());

        let state = rec.read(&seeded, &ConvergeContext::new()).await.unwrap().found().unwrap();
        assert_eq!(state.require_two_factor, Some(true));
        assert_eq!(state.search_indexing, Some(true));
        assert_eq!(state.recovery_methods, vec![RecoveryMethod::email("d@r.com")]);
    }

    #[tokio::test]
    async fn test_import_of_unknown_handle_reads_not_found() {
        let api = fake();
        let rec = reconciler(&api);
        let seeded = rec.import("nobody").unwrap();
        assert!(rec.read(&seeded, &ConvergeContext::new()).await.unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_rename_then_methods_use_new_handle() {
        let api = fake();
        let observed = seed(&api, "erin", false, &[RecoveryMethod::email("e@r.com")]);
        let mut desired = observed.as_config();
        desired.new_handle = Field::Known("erin.s".into());
        desired.recovery_methods =
            Field::Known(vec![RecoveryMethod::email("e@r.com"), RecoveryMethod::email("s@r.com")]);

        let converged = reconciler(&api).update(&desired, &observed, &ConvergeContext::new()).await.unwrap();

        let mutations = api.mutations();
        assert_eq!(
            mutations[0],
            ApiCall::ModifyAccount(ModifyUserRequest {
                new_user_name: Some("erin.s".into()),
                ..ModifyUserRequest::new("erin")
            })
        );
        assert!(matches!(&mutations[1], ApiCall::UpsertRecoveryMethod(req) if req.user_name == "erin.s"));
        assert_eq!(mutations.len(), 2);
        assert_eq!(api.calls().last(), Some(&ApiCall::ListRecoveryMethods("erin.s".into())));
        assert_eq!(converged.state.handle, "erin.s");
        assert!(api.account("erin").is_none());
    }

    #[tokio::test]
    async fn test_rename_is_combined_with_attributes() {
        let api = fake();
        let observed = seed(&api, "fay", false, &[]);
        let mut desired = observed.as_config();
        desired.new_handle = Field::Known("faye".into());
        desired.search_indexing = Field::Known(false);
        desired.credential = Field::Known(Credential::Tracked(Secret::new("s3cret")));

        reconciler(&api).update(&desired, &observed, &ConvergeContext::new()).await.unwrap();

        assert_eq!(
            api.mutations(),
            vec![ApiCall::ModifyAccount(ModifyUserRequest {
                new_user_name: Some("faye".into()),
                new_password: Some("s3cret".into()),
                enable_search_indexing: Some(false),
                ..ModifyUserRequest::new("fay")
            })]
        );
        assert_eq!(api.password("faye").as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_tracked_credential_sent_only_when_changed() {
        let api = fake();
        let mut observed = seed(&api, "gina", false, &[]);
        observed.tracked_credential = Some(Secret::new("pw1"));
        let rec = reconciler(&api);

        let unchanged = observed.as_config();
        let converged = rec.update(&unchanged, &observed, &ConvergeContext::new()).await.unwrap();
        assert!(api.mutations().is_empty());
        assert_eq!(converged.state.tracked_credential, Some(Secret::new("pw1")));

        let mut changed = observed.as_config();
        changed.credential = Field::Known(Credential::Tracked(Secret::new("pw2")));
        let converged = rec.update(&changed, &observed, &ConvergeContext::new()).await.unwrap();
        assert_eq!(api.count(CallKind::ModifyAccount), 1);
        assert_eq!(api.password("gina").as_deref(), Some("pw2"));
        assert_eq!(converged.state.tracked_credential, Some(Secret::new("pw2")));
    }

    #[tokio::test]
    async fn test_write_only_credential_is_always_sent_and_never_kept() {
        let api = fake();
        let observed = seed(&api, "hank", false, &[]);
        let mut desired = observed.as_config();
        desired.credential = Field::Known(Credential::WriteOnly(Secret::new("rotate-me")));
        let rec = reconciler(&api);

        let first = rec.update(&desired, &observed, &ConvergeContext::new()).await.unwrap();
        let second = rec.update(&desired, &first.state, &ConvergeContext::new()).await.unwrap();

        assert_eq!(api.count(CallKind::ModifyAccount), 2);
        assert_eq!(first.state.tracked_credential, None);
        assert_eq!(second.state.tracked_credential, None);
    }

    #[tokio::test]
    async fn test_unknown_values_are_left_alone() {
        let api = fake();
        let observed = seed(&api, "ivy", true, &[RecoveryMethod::email("i@r.com")]);
        let mut desired = AccountConfig::new("ivy");
        desired.require_two_factor = Field::Unknown;
        desired.recovery_methods = Field::Unknown;
        desired.search_indexing = Field::Unknown;
        desired.new_handle = Field::Unknown;

        let converged = reconciler(&api).update(&desired, &observed, &ConvergeContext::new()).await.unwrap();

        assert!(api.mutations().is_empty());
        assert_eq!(converged.state.recovery_methods, observed.recovery_methods);
    }

    #[tokio::test]
    async fn test_duplicate_targets_fail_before_any_call() {
        let api = fake();
        let mut desired = AccountConfig::new("jack");
        desired.recovery_methods =
            Field::Known(vec![RecoveryMethod::email("j@r.com"), RecoveryMethod::phone("j@r.com")]);

        let failure = reconciler(&api).create(&desired, &ConvergeContext::new()).await.unwrap_err();

        assert_eq!(failure.step, Step::Plan);
        assert_eq!(failure.error, ReconcileError::DuplicateTarget("j@r.com".into()));
        assert!(failure.partial.is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_of_existing_handle_is_rejected() {
        let api = fake();
        seed(&api, "kim", false, &[]);

        let failure = reconciler(&api).create(&AccountConfig::new("kim"), &ConvergeContext::new()).await.unwrap_err();

        assert_eq!(failure.step, Step::CreateAccount);
        assert!(matches!(failure.error, ReconcileError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_read_keeps_prior_method_order() {
        let api = fake();
        let z = RecoveryMethod::email("z@r.com");
        let a = RecoveryMethod::email("a@r.com");
        let n = RecoveryMethod::phone("+15550123");
        api.seed_account("lee", Default::default(), vec![item(&a), item(&n), item(&z)]);

        let prior = AccountState { recovery_methods: vec![z.clone(), a.clone()], ..AccountState::seed("lee") };
        let state = reconciler(&api).read(&prior, &ConvergeContext::new()).await.unwrap().found().unwrap();

        assert_eq!(state.recovery_methods, vec![z, a, n]);
    }

    #[tokio::test]
    async fn test_unfamiliar_method_type_still_reads() {
        let api = fake();
        let methods = [
            RecoveryMethod::email("a@r.com"),
            RecoveryMethod::new(MethodKind::Other("sms".into()), "+15550100"),
        ];
        let observed = seed(&api, "uma", true, &methods);

        let state = reconciler(&api)
            .read(&AccountState::seed("uma"), &ConvergeContext::new())
            .await
            .unwrap()
            .found()
            .unwrap();
        assert_eq!(state.recovery_methods, methods.to_vec());

        let converged = reconciler(&api)
            .update(&observed.as_config(), &observed, &ConvergeContext::new())
            .await
            .unwrap();
        assert!(api.mutations().is_empty());
        assert_eq!(converged.state.recovery_methods[1].kind.as_str(), "sms");
    }

    #[tokio::test]
    async fn test_different_accounts_converge_concurrently() {
        let api = fake();
        let rec = reconciler(&api);
        let ctx = ConvergeContext::new();

        let configs: Vec<AccountConfig> = (0..8)
            .map(|i| {
                let mut cfg = AccountConfig::new(format!("user{}", i));
                cfg.require_two_factor = Field::Known(true);
                cfg.recovery_methods = Field::Known(vec![RecoveryMethod::email(format!("user{}@r.com", i))]);
                cfg
            })
            .collect();

        let handles: Vec<_> = configs
            .into_iter()
            .map(|cfg| {
                let rec = rec.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move { rec.create(&cfg, &ctx).await })
            })
            .collect();

        for handle in handles {
            let converged = handle.await.unwrap().unwrap();
            assert_eq!(converged.state.require_two_factor, Some(true));
            assert_eq!(converged.state.recovery_methods.len(), 1);
        }
        assert_eq!(api.count(CallKind::CreateAccount), 8);
    }
}
