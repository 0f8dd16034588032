/// End-to-end lifecycle tests against a real on-disk database.
use driftmail::{
    config::MailConfig,
    db,
    prune,
    sysfiles,
    token::TokenUpdate,
    util,
    AppContext, Error,
};
use std::path::PathBuf;
use tempfile::TempDir;

/// Open a fresh database in its own temp directory. No config row yet.
async fn fresh_ctx() -> (TempDir, AppContext) {
    let dir = TempDir::new().unwrap();
    let ctx = AppContext::new(&dir.path().join("driftmail.db")).await.unwrap();
    (dir, ctx)
}

/// Open a fresh database and run init with the standard test config.
/// Generated-file paths land inside the temp directory.
async fn init_ctx() -> (TempDir, AppContext) {
    let (dir, ctx) = fresh_ctx().await;
    let config = test_config(&dir.path().join("driftmail.db"));
    db::init_config(&ctx.db, &config, false).await.unwrap();
    (dir, ctx)
}

fn test_config(db_path: &PathBuf) -> MailConfig {
    MailConfig::new(
        db_path,
        "x.org".to_string(),
        "https://x.org/new_email".to_string(),
        "vmail".to_string(),
        None,
        None,
    )
}

#[tokio::test]
async fn init_lifecycle() {
    let (dir, ctx) = fresh_ctx().await;

    // Nothing configured yet
    assert!(!db::is_initialized(&ctx.db).await.unwrap());
    let err = db::config(&ctx.db).await.unwrap_err();
    assert!(matches!(err, Error::NotInitialized));

    let db_path = dir.path().join("driftmail.db");
    db::init_config(&ctx.db, &test_config(&db_path), false)
        .await
        .unwrap();
    assert!(db::is_initialized(&ctx.db).await.unwrap());

    // Second init without force is refused and leaves the config alone
    let mut other = test_config(&db_path);
    other.mail_domain = "y.org".to_string();
    let err = db::init_config(&ctx.db, &other, false).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyInitialized));
    assert_eq!(db::config(&ctx.db).await.unwrap().mail_domain, "x.org");

    // Force replaces it
    db::init_config(&ctx.db, &other, true).await.unwrap();
    assert_eq!(db::config(&ctx.db).await.unwrap().mail_domain, "y.org");
}

#[tokio::test]
async fn token_round_trip_and_duplicates() {
    let (_dir, ctx) = init_ctx().await;

    let token = ctx
        .tokens
        .add_token("promo", None, util::parse_duration("1d").unwrap(), "tmp.", 50)
        .await
        .unwrap();
    assert_eq!(token.use_count, 0);
    assert_eq!(token.uses_left(), 50);
    assert!(token.token.starts_with("1d_"));
    assert_eq!(
        token.web_url("https://x.org/new_email"),
        format!("https://x.org/new_email?t={}", token.token)
    );

    let listed = ctx.tokens.list_tokens().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "promo");

    let by_value = ctx.tokens.get_token_by_value(&token.token).await.unwrap();
    assert_eq!(by_value.name, "promo");
    let err = ctx.tokens.get_token_by_value("nope").await.unwrap_err();
    assert!(matches!(err, Error::InvalidToken));

    let err = ctx
        .tokens
        .add_token("promo", None, 3600, "other.", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateName(_)));

    let err = ctx
        .tokens
        .add_token("second", Some(token.token.clone()), 3600, "tmp.", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateTokenValue));
}

#[tokio::test]
async fn quota_is_enforced_exactly() {
    let (_dir, ctx) = init_ctx().await;
    ctx.tokens
        .add_token("promo", None, 86400, "tmp.", 2)
        .await
        .unwrap();

    let first = ctx
        .accounts
        .create_account("promo", Some("tmp.alice@x.org"), None)
        .await
        .unwrap();
    assert_eq!(first.account.addr, "tmp.alice@x.org");
    assert!(first.account.password_hash.starts_with("$argon2id$"));
    assert_eq!(first.password.len(), 16);
    assert_eq!(ctx.tokens.get_token("promo").await.unwrap().use_count, 1);

    ctx.accounts
        .create_account("promo", Some("tmp.bob@x.org"), Some("hunter2"))
        .await
        .unwrap();
    assert_eq!(ctx.tokens.get_token("promo").await.unwrap().use_count, 2);

    let err = ctx
        .accounts
        .create_account("promo", Some("tmp.carol@x.org"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded { max_use: 2, .. }));

    // The failed attempt consumed nothing
    let token = ctx.tokens.get_token("promo").await.unwrap();
    assert_eq!(token.use_count, 2);
    assert_eq!(token.uses_left(), 0);

    let err = ctx
        .accounts
        .create_account("ghost", Some("tmp.x@x.org"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenNotFound(_)));
}

#[tokio::test]
async fn failed_creation_returns_the_claimed_use() {
    let (_dir, ctx) = init_ctx().await;
    ctx.tokens
        .add_token("promo", None, 86400, "tmp.", 10)
        .await
        .unwrap();

    // Wrong prefix
    let err = ctx
        .accounts
        .create_account("promo", Some("user@x.org"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAddress { .. }));
    assert_eq!(ctx.tokens.get_token("promo").await.unwrap().use_count, 0);

    // Wrong domain
    let err = ctx
        .accounts
        .create_account("promo", Some("tmp.a@other.org"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAddress { .. }));

    // Two @ signs
    let err = ctx
        .accounts
        .create_account("promo", Some("tmp.a@b@x.org"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAddress { .. }));

    // Address collision rolls the claim back too
    ctx.accounts
        .create_account("promo", Some("tmp.a@x.org"), None)
        .await
        .unwrap();
    let err = ctx
        .accounts
        .create_account("promo", Some("tmp.a@x.org"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AddressExists(_)));

    assert_eq!(ctx.tokens.get_token("promo").await.unwrap().use_count, 1);
}

#[tokio::test]
async fn deleting_accounts_never_returns_quota() {
    let (_dir, ctx) = init_ctx().await;
    ctx.tokens
        .add_token("promo", None, 86400, "tmp.", 5)
        .await
        .unwrap();
    ctx.accounts
        .create_account("promo", Some("tmp.a@x.org"), None)
        .await
        .unwrap();

    ctx.accounts.delete_account("tmp.a@x.org").await.unwrap();
    assert_eq!(ctx.tokens.get_token("promo").await.unwrap().use_count, 1);

    let err = ctx.accounts.delete_account("tmp.a@x.org").await.unwrap_err();
    assert!(matches!(err, Error::AccountNotFound(_)));
}

#[tokio::test]
async fn token_deletion_blocked_while_referenced() {
    let (_dir, ctx) = init_ctx().await;
    ctx.tokens
        .add_token("promo", None, 86400, "tmp.", 5)
        .await
        .unwrap();
    ctx.accounts
        .create_account("promo", Some("tmp.a@x.org"), None)
        .await
        .unwrap();

    let err = ctx.tokens.delete_token("promo").await.unwrap_err();
    assert!(matches!(err, Error::TokenInUse(_)));
    assert!(ctx.tokens.get_token("promo").await.is_ok());

    ctx.accounts.delete_account("tmp.a@x.org").await.unwrap();
    ctx.tokens.delete_token("promo").await.unwrap();

    let err = ctx.tokens.delete_token("promo").await.unwrap_err();
    assert!(matches!(err, Error::TokenNotFound(_)));
}

#[tokio::test]
async fn modifying_a_token_leaves_existing_accounts_alone() {
    let (_dir, ctx) = init_ctx().await;
    ctx.tokens
        .add_token("promo", None, 86400, "tmp.", 5)
        .await
        .unwrap();
    let before = ctx
        .accounts
        .create_account("promo", Some("tmp.a@x.org"), None)
        .await
        .unwrap();
    assert_eq!(before.account.ttl_secs, 86400);

    // Partial update: only expiry changes
    let updated = ctx
        .tokens
        .modify_token(
            "promo",
            TokenUpdate {
                expiry_secs: Some(3600),
                prefix: None,
                max_use: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.expiry_secs, 3600);
    assert_eq!(updated.prefix, "tmp.");
    assert_eq!(updated.max_use, 5);

    // The existing account keeps the lifetime granted at creation
    let account = ctx.accounts.get_account("tmp.a@x.org").await.unwrap();
    assert_eq!(account.ttl_secs, 86400);

    // New accounts get the new lifetime
    let after = ctx
        .accounts
        .create_account("promo", Some("tmp.b@x.org"), None)
        .await
        .unwrap();
    assert_eq!(after.account.ttl_secs, 3600);

    // Lowering max_use below use_count blocks further creation
    ctx.tokens
        .modify_token(
            "promo",
            TokenUpdate {
                expiry_secs: None,
                prefix: None,
                max_use: Some(1),
            },
        )
        .await
        .unwrap();
    let token = ctx.tokens.get_token("promo").await.unwrap();
    assert_eq!(token.use_count, 2);
    assert_eq!(token.uses_left(), 0);
    let err = ctx
        .accounts
        .create_account("promo", Some("tmp.c@x.org"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded { .. }));

    let err = ctx
        .tokens
        .modify_token(
            "ghost",
            TokenUpdate {
                expiry_secs: None,
                prefix: None,
                max_use: Some(1),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenNotFound(_)));
}

#[tokio::test]
async fn expired_accounts_are_pruned() {
    let (_dir, ctx) = init_ctx().await;
    // Zero lifetime: expired the second it is created
    ctx.tokens
        .add_token("burner", None, 0, "tmp.", 5)
        .await
        .unwrap();
    ctx.tokens
        .add_token("longer", None, 864000, "keep.", 5)
        .await
        .unwrap();

    let doomed = ctx
        .accounts
        .create_account("burner", Some("tmp.a@x.org"), None)
        .await
        .unwrap();
    ctx.accounts
        .create_account("longer", Some("keep.b@x.org"), None)
        .await
        .unwrap();

    // Expiry boundary is inclusive
    assert!(doomed.account.is_expired(doomed.account.created_at));
    let expired = ctx
        .accounts
        .get_expired(doomed.account.created_at)
        .await
        .unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].addr, "tmp.a@x.org");

    // Dry run deletes nothing
    let report = prune::prune(&ctx.db, util::unix_now(), true).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.pruned.len(), 1);
    assert!(ctx.accounts.get_account("tmp.a@x.org").await.is_ok());

    // Real run removes the expired account and keeps the other
    let report = prune::prune(&ctx.db, util::unix_now(), false).await.unwrap();
    assert_eq!(report.pruned.len(), 1);
    assert!(report.failed.is_empty());
    let err = ctx.accounts.get_account("tmp.a@x.org").await.unwrap_err();
    assert!(matches!(err, Error::AccountNotFound(_)));
    assert!(ctx.accounts.get_account("keep.b@x.org").await.is_ok());
    let remaining = ctx.accounts.list_accounts(None).await.unwrap();
    let addrs: Vec<_> = remaining.iter().map(|a| a.addr.as_str()).collect();
    assert_eq!(addrs, ["keep.b@x.org"]);

    // Quota stays consumed after pruning
    assert_eq!(ctx.tokens.get_token("burner").await.unwrap().use_count, 1);

    // A second sweep finds nothing
    let report = prune::prune(&ctx.db, util::unix_now(), false).await.unwrap();
    assert!(report.pruned.is_empty());
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn listing_accounts_by_token() {
    let (_dir, ctx) = init_ctx().await;
    ctx.tokens
        .add_token("a", None, 86400, "tmp.", 5)
        .await
        .unwrap();
    ctx.tokens
        .add_token("b", None, 86400, "alt.", 5)
        .await
        .unwrap();
    ctx.accounts
        .create_account("a", Some("tmp.z@x.org"), None)
        .await
        .unwrap();
    ctx.accounts
        .create_account("a", Some("tmp.a@x.org"), None)
        .await
        .unwrap();
    ctx.accounts
        .create_account("b", Some("alt.m@x.org"), None)
        .await
        .unwrap();

    let all = ctx.accounts.list_accounts(None).await.unwrap();
    let addrs: Vec<_> = all.iter().map(|a| a.addr.as_str()).collect();
    assert_eq!(addrs, ["alt.m@x.org", "tmp.a@x.org", "tmp.z@x.org"]);

    let only_a = ctx.accounts.list_accounts(Some("a")).await.unwrap();
    let addrs: Vec<_> = only_a.iter().map(|a| a.addr.as_str()).collect();
    assert_eq!(addrs, ["tmp.a@x.org", "tmp.z@x.org"]);

    let none = ctx.accounts.list_accounts(Some("ghost")).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn generated_addresses_follow_prefix_and_domain() {
    let (_dir, ctx) = init_ctx().await;
    ctx.tokens
        .add_token("promo", None, 86400, "tmp.", 5)
        .await
        .unwrap();

    let created = ctx.accounts.create_account("promo", None, None).await.unwrap();
    assert!(created.account.addr.starts_with("tmp."));
    assert!(created.account.addr.ends_with("@x.org"));
    let localpart = created.account.addr.split_once('@').unwrap().0;
    assert_eq!(localpart.len(), "tmp.".len() + 5);
}

#[tokio::test]
async fn sysfiles_track_the_account_set() {
    let (dir, ctx) = init_ctx().await;
    ctx.tokens
        .add_token("promo", None, 86400, "tmp.", 5)
        .await
        .unwrap();
    ctx.accounts
        .create_account("promo", Some("tmp.a@x.org"), None)
        .await
        .unwrap();

    sysfiles::regenerate(&ctx.db).await.unwrap();

    let mailboxes =
        std::fs::read_to_string(dir.path().join("virtual_mailboxes")).unwrap();
    assert_eq!(mailboxes, "tmp.a@x.org x.org/tmp.a/\n");

    let users = std::fs::read_to_string(dir.path().join("dovecot_users")).unwrap();
    assert!(users.starts_with("tmp.a@x.org:{ARGON2ID}$argon2id$"));
    assert!(users.trim_end().ends_with(":vmail:vmail::/home/vmail/mail/x.org/tmp.a/::"));

    // Removal empties the files again
    ctx.accounts.delete_account("tmp.a@x.org").await.unwrap();
    sysfiles::regenerate(&ctx.db).await.unwrap();
    let mailboxes =
        std::fs::read_to_string(dir.path().join("virtual_mailboxes")).unwrap();
    assert_eq!(mailboxes, "");
}

#[tokio::test]
async fn concurrent_redemption_honors_the_quota() {
    let (_dir, ctx) = init_ctx().await;
    ctx.tokens
        .add_token("single", None, 86400, "tmp.", 1)
        .await
        .unwrap();

    let a = ctx.clone();
    let b = ctx.clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.accounts.create_account("single", None, None).await }),
        tokio::spawn(async move { b.accounts.create_account("single", None, None).await }),
    );
    let results = [first.unwrap(), second.unwrap()];

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let quota = results
        .iter()
        .filter(|r| matches!(r, Err(Error::QuotaExceeded { .. })))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(quota, 1);

    let token = ctx.tokens.get_token("single").await.unwrap();
    assert_eq!(token.use_count, 1);
    assert_eq!(ctx.accounts.list_accounts(Some("single")).await.unwrap().len(), 1);
}
