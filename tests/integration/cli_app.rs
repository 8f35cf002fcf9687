// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::common::{fake, seed};
    use mailforge::api::fake::CallKind;
    use mailforge::api::InMemoryApi;
    use mailforge::cli::{describe, App, CliError, Kind, Manifest};
    use mailforge::model::RecoveryMethod;
    use mailforge::reconcile::{ConvergeContext, Step};
    use mailforge::state_store::StateStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn app(api: &Arc<InMemoryApi>, dir: &TempDir) -> App {
        App::new(api.clone(), api.clone(), StateStore::new(dir.path().join("state.json")))
    }

    fn manifest(dir: &TempDir, body: &str) -> Manifest {
        let path = dir.path().join("accounts.toml");
        std::fs::write(&path, body).unwrap();
        Manifest::from_path(&path).unwrap()
    }

    #[tokio::test]
    async fn test_apply_rename_across_runs() {
        let api = fake();
        let dir = TempDir::new().unwrap();
        let app = app(&api, &dir);
        let ctx = ConvergeContext::new();

        let first = manifest(
            &dir,
            r#"
[[accounts]]
handle = "alice"
require_two_factor = true

[[accounts.recovery_methods]]
type = "email"
target = "alice@r.com"
"#,
        );
        let summary = app.apply(&first, &ctx).await.unwrap();
        assert_eq!(summary.created, vec!["account alice".to_string()]);

        let renamed = manifest(
            &dir,
            r#"
[[accounts]]
handle = "alice"
new_handle = "alicia"
require_two_factor = true

[[accounts.recovery_methods]]
type = "email"
target = "alice@r.com"
"#,
        );
        let summary = app.apply(&renamed, &ctx).await.unwrap();
        assert_eq!(summary.updated, vec!["account alicia".to_string()]);

        let tracked: Vec<String> = app.show().await.unwrap().into_iter().map(|s| s.handle).collect();
        assert_eq!(tracked, vec!["alicia".to_string()]);

        // Re-applying the renamed manifest finds the account under its new handle.
        api.clear_calls();
        app.apply(&renamed, &ctx).await.unwrap();
        assert!(api.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_import_refresh_destroy() {
        let api = fake();
        let dir = TempDir::new().unwrap();
        let app = app(&api, &dir);
        let ctx = ConvergeContext::new();
        seed(&api, "bob", true, &[RecoveryMethod::phone("+15550100")]);

        let imported = app.import("bob", &ctx).await.unwrap();
        assert_eq!(
            describe(&imported),
            "bob two_factor=true search_indexing=true recovery_enabled=false methods=[+15550100]"
        );

        let refreshed = app.refresh("bob", &ctx).await.unwrap().unwrap();
        assert_eq!(refreshed, imported);

        app.destroy("bob", &ctx).await.unwrap();
        assert_eq!(api.count(CallKind::DeleteAccount), 1);
        assert!(app.show().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_of_missing_account() {
        let api = fake();
        let dir = TempDir::new().unwrap();
        let err = app(&api, &dir).import("ghost", &ConvergeContext::new()).await.unwrap_err();
        assert!(matches!(err, CliError::NotFound { kind: Kind::Account, key } if key == "ghost"));
    }

    #[tokio::test]
    async fn test_veto_is_reported_with_step() {
        let api = fake();
        let dir = TempDir::new().unwrap();
        let app = app(&api, &dir);
        let ctx = ConvergeContext::new();

        app.apply(
            &manifest(
                &dir,
                r#"
[[accounts]]
handle = "carol"
require_two_factor = true

[[accounts.recovery_methods]]
type = "email"
target = "c@r.com"
"#,
            ),
            &ctx,
        )
        .await
        .unwrap();

        let drained = manifest(&dir, "[[accounts]]\nhandle = \"carol\"\nrequire_two_factor = true\n");
        let err = app.apply(&drained, &ctx).await.unwrap_err();
        match &err {
            CliError::Account { handle, source } => {
                assert_eq!(handle, "carol");
                assert_eq!(source.step, Step::Plan);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.partial().unwrap().recovery_methods.len(), 1);
        assert_eq!(api.methods("carol").len(), 1);
    }

    const FULL_MANIFEST: &str = r#"
[[domains]]
name = "example.com"
allow_account_reset = true

[[accounts]]
handle = "alice"
recovery_methods = "(known after apply)"

[[recovery_methods]]
label = "desk"
handle = "alice"
type = "email"
target = "desk@r.com"

[[routing_rules]]
label = "sales"
domain_name = "example.com"
match_user = "sales"
target_addresses = ["alice@example.com"]

[[app_passwords]]
label = "alice-phone"
user_handle = "alice"
name = "phone"
"#;

    #[tokio::test]
    async fn test_apply_every_section() {
        let api = fake();
        let dir = TempDir::new().unwrap();
        let app = app(&api, &dir);
        let ctx = ConvergeContext::new();
        let manifest = manifest(&dir, FULL_MANIFEST);

        let summary = app.apply(&manifest, &ctx).await.unwrap();
        assert_eq!(
            summary.created,
            vec![
                "domain example.com".to_string(),
                "account alice".to_string(),
                "recovery method desk".to_string(),
                "routing rule sales".to_string(),
                "app password alice-phone".to_string(),
            ]
        );
        assert!(api.domain("example.com").unwrap().allow_account_reset.unwrap());
        assert_eq!(api.methods("alice").len(), 1);
        assert_eq!(api.routing_rules().len(), 1);
        assert_eq!(api.app_passwords().len(), 1);

        api.clear_calls();
        let again = app.apply(&manifest, &ctx).await.unwrap();
        assert_eq!(again.updated.len(), 5);
        assert!(api.mutations().is_empty());

        let inventory = app.inventory().await.unwrap();
        assert_eq!(inventory.len(), 5);
        let rule = "routing rule: sales id=1 sales@example.com catchall=false targets=[alice@example.com]";
        assert!(inventory.contains(&rule.to_string()));
        assert!(inventory.contains(&"app password: alice-phone user=alice name=phone".to_string()));
        assert!(inventory.iter().all(|line| !line.contains("app-password-1")));

        let state = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
        assert!(state.contains("\"routing_rules\""));
        assert!(state.contains("app-password-1"));
    }

    #[tokio::test]
    async fn test_import_and_destroy_by_kind() {
        let api = fake();
        let dir = TempDir::new().unwrap();
        let app = app(&api, &dir);
        let ctx = ConvergeContext::new();
        app.apply(&manifest(&dir, FULL_MANIFEST), &ctx).await.unwrap();

        let line = app.import_entry(Kind::RecoveryMethod, "alice:desk@r.com", Some("desk-copy"), &ctx).await.unwrap();
        assert_eq!(line, "desk-copy alice:desk@r.com type=email allow_mfa_reset=false");
        let line = app.import_entry(Kind::RoutingRule, "1", None, &ctx).await.unwrap();
        assert!(line.starts_with("1 id=1 sales@example.com"));
        let err = app.import_entry(Kind::RoutingRule, "42", None, &ctx).await.unwrap_err();
        assert!(matches!(err, CliError::NotFound { kind: Kind::RoutingRule, .. }));

        app.destroy_entry(Kind::AppPassword, "alice-phone", &ctx).await.unwrap();
        app.destroy_entry(Kind::RoutingRule, "sales", &ctx).await.unwrap();
        assert!(api.app_passwords().is_empty());
        assert!(api.routing_rules().is_empty());

        // The copy imported above still points at the deleted rule.
        assert_eq!(app.refresh_entry(Kind::RoutingRule, "1", &ctx).await.unwrap(), None);
        let err = app.destroy_entry(Kind::RoutingRule, "1", &ctx).await.unwrap_err();
        assert!(matches!(err, CliError::NotTracked { kind: Kind::RoutingRule, .. }));

        app.destroy_entry(Kind::RecoveryMethod, "desk", &ctx).await.unwrap();
        assert!(api.methods("alice").is_empty());
        app.destroy("alice", &ctx).await.unwrap();
        app.destroy_entry(Kind::Domain, "example.com", &ctx).await.unwrap();
        assert!(api.domain("example.com").is_none());

        // Only the recovery method copy, whose method is gone, is left.
        assert_eq!(app.inventory().await.unwrap().len(), 1);
        assert_eq!(app.refresh_entry(Kind::RecoveryMethod, "desk-copy", &ctx).await.unwrap(), None);
        assert!(app.inventory().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ownership_code() {
        let api = fake();
        let dir = TempDir::new().unwrap();
        let code = app(&api, &dir).ownership_code(&ConvergeContext::new()).await.unwrap();
        assert!(code.starts_with("purelymail_ownership_proof="));
    }
}
