//! Credit-ledger behaviour over the in-memory backend.

use std::time::Duration;

use anyhow::Result;
use icfs_core::StatusClass;
use icfs_core::model::{ContentId, ContentPatch, ReviewPatch};

#[path = "support/mod.rs"]
mod support;

use support::Harness;
use support::faults::{Fault, FaultyContentStore};

#[tokio::test]
async fn uploading_credits_the_declared_size() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;

    let content = h.upload(alice, "bafy-c1", 25).await?;

    assert_eq!(h.credit(alice).await?, 25);
    let stored = h.ledger.get_content(content).await?;
    assert_eq!(stored.uploader_id, alice);
    assert_eq!(stored.downloads, 0);
    assert_eq!(stored.uploaded_at, stored.last_modified);
    Ok(())
}

#[tokio::test]
async fn grant_moves_credit_from_downloader_to_uploader() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;
    h.upload(bob, "bafy-c2", 40).await?;

    let granted = h.ledger.grant_access(bob, c1).await?;

    assert_eq!(granted.id, c1);
    assert_eq!(granted.downloads, 1);
    assert_eq!(h.credit(bob).await?, 15);
    assert_eq!(h.credit(alice).await?, 50);
    assert_eq!(h.downloads(c1).await?, 1);

    let downloads = h.ledger.get_user_downloads(bob).await?;
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].id, c1);
    Ok(())
}

#[tokio::test]
async fn uploaders_cannot_fund_themselves() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;

    let err = h.ledger.grant_access(alice, c1).await.unwrap_err();

    assert_eq!(err.status(), StatusClass::Forbidden);
    assert_eq!(h.credit(alice).await?, 25);
    assert_eq!(h.downloads(c1).await?, 0);
    assert!(h.ledger.get_user_downloads(alice).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn insufficient_credit_leaves_everything_untouched() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;
    h.upload(bob, "bafy-c2", 24).await?;

    let err = h.ledger.grant_access(bob, c1).await.unwrap_err();

    assert_eq!(err.status(), StatusClass::PaymentRequired);
    assert_eq!(err.status_code(), 402);
    assert_eq!(h.credit(bob).await?, 24);
    assert_eq!(h.credit(alice).await?, 25);
    assert_eq!(h.downloads(c1).await?, 0);
    assert!(h.ledger.get_user_downloads(bob).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn exact_balance_is_enough() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;
    h.upload(bob, "bafy-c2", 25).await?;

    h.ledger.grant_access(bob, c1).await?;

    assert_eq!(h.credit(bob).await?, 0);
    Ok(())
}

#[tokio::test]
async fn unknown_parties_are_not_found() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;

    let ghost = icfs_core::model::AccountId::new();
    let err = h.ledger.grant_access(ghost, c1).await.unwrap_err();
    assert_eq!(err.status(), StatusClass::NotFound);

    let err = h
        .ledger
        .grant_access(alice, ContentId::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusClass::NotFound);
    Ok(())
}

#[tokio::test]
async fn repeated_grants_charge_once() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let c1 = h.upload(alice, "bafy-c1", 10).await?;
    h.upload(bob, "bafy-c2", 40).await?;

    h.ledger.grant_access(bob, c1).await?;
    let again = h.ledger.grant_access(bob, c1).await?;

    assert_eq!(again.id, c1);
    assert_eq!(h.credit(bob).await?, 30);
    assert_eq!(h.credit(alice).await?, 20);
    assert_eq!(h.downloads(c1).await?, 1);
    assert_eq!(h.ledger.get_user_downloads(bob).await?.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_grants_for_one_pair_charge_once() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let c1 = h.upload(alice, "bafy-c1", 10).await?;
    h.upload(bob, "bafy-c2", 100).await?;

    let grants = (0..8).map(|_| {
        let ledger = h.ledger.clone();
        tokio::spawn(async move { ledger.grant_access(bob, c1).await })
    });
    for outcome in futures::future::join_all(grants).await {
        outcome??;
    }

    assert_eq!(h.credit(bob).await?, 90);
    assert_eq!(h.credit(alice).await?, 20);
    assert_eq!(h.downloads(c1).await?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_grants_never_overdraw() -> Result<()> {
    let h = Harness::new();
    let bob = h.account("bob").await?;
    h.upload(bob, "bafy-seed", 30).await?;

    let mut items = Vec::new();
    for i in 0..5 {
        let owner = h.account(&format!("owner{i}")).await?;
        items.push(h.upload(owner, &format!("bafy-item{i}"), 10).await?);
    }

    let grants = items.iter().map(|item| {
        let ledger = h.ledger.clone();
        let item = *item;
        tokio::spawn(async move { ledger.grant_access(bob, item).await })
    });
    let outcomes = futures::future::join_all(grants).await;

    let mut granted = 0;
    for outcome in outcomes {
        match outcome? {
            Ok(_) => granted += 1,
            Err(err) => assert_eq!(err.status(), StatusClass::PaymentRequired),
        }
    }

    assert_eq!(granted, 3);
    assert_eq!(h.credit(bob).await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_grants_report_their_own_download_count() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let c1 = h.upload(alice, "bafy-c1", 5).await?;

    let mut downloaders = Vec::new();
    for i in 0..6 {
        let who = h.account(&format!("reader{i}")).await?;
        h.upload(who, &format!("bafy-seed{i}"), 5).await?;
        downloaders.push(who);
    }

    let grants = downloaders.iter().map(|who| {
        let ledger = h.ledger.clone();
        let who = *who;
        tokio::spawn(async move { ledger.grant_access(who, c1).await })
    });
    let mut counts = Vec::new();
    for outcome in futures::future::join_all(grants).await {
        counts.push(outcome??.downloads);
    }
    counts.sort_unstable();

    assert_eq!(counts, (1..=6).collect::<Vec<i64>>());
    assert_eq!(h.downloads(c1).await?, 6);
    Ok(())
}

#[tokio::test]
async fn uploads_by_unknown_accounts_are_not_found() -> Result<()> {
    let h = Harness::new();
    let ghost = icfs_core::model::AccountId::new();

    let err = h
        .ledger
        .register_content(ghost, support::upload("bafy-ghost", 25))
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusClass::NotFound);
    assert!(h.ledger.get_all().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn two_party_exchange_scenario() -> Result<()> {
    let h = Harness::new();
    let a = h.account("account-a").await?;
    let b = h.account("account-b").await?;

    let c1 = h.upload(a, "bafy-c1", 25).await?;
    assert_eq!(h.credit(a).await?, 25);

    let err = h.ledger.grant_access(b, c1).await.unwrap_err();
    assert_eq!(err.status(), StatusClass::PaymentRequired);

    let c2 = h.upload(b, "bafy-c2", 40).await?;
    assert_eq!(h.credit(b).await?, 40);

    h.ledger.grant_access(b, c1).await?;
    assert_eq!(h.credit(b).await?, 15);
    assert_eq!(h.credit(a).await?, 50);
    assert_eq!(h.downloads(c1).await?, 1);

    h.ledger.grant_access(a, c2).await?;
    assert_eq!(h.credit(a).await?, 10);
    assert_eq!(h.credit(b).await?, 55);
    assert_eq!(h.downloads(c2).await?, 1);

    h.ledger.grant_access(b, c1).await?;
    assert_eq!(h.credit(a).await?, 10);
    assert_eq!(h.credit(b).await?, 55);
    assert_eq!(h.downloads(c1).await?, 1);
    Ok(())
}

#[tokio::test]
async fn only_the_uploader_may_edit_or_delete() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let mallory = h.account("mallory").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;
    let before = h.ledger.get_content(c1).await?;

    let patch = ContentPatch {
        name: Some("defaced".into()),
        description: None,
    };
    let err = h
        .ledger
        .update_content(mallory, c1, patch)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusClass::Forbidden);

    let err = h.ledger.delete_content(mallory, c1).await.unwrap_err();
    assert_eq!(err.status(), StatusClass::Forbidden);

    assert_eq!(h.ledger.get_content(c1).await?, before);
    assert_eq!(h.credit(alice).await?, 25);
    Ok(())
}

#[tokio::test]
async fn deleting_reverses_the_upload_credit() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;
    h.upload(bob, "bafy-c2", 40).await?;
    h.ledger.grant_access(bob, c1).await?;

    h.ledger.delete_content(alice, c1).await?;

    // Download earnings are kept; only the upload credit is reversed
    assert_eq!(h.credit(alice).await?, 25);
    let err = h.ledger.get_content(c1).await.unwrap_err();
    assert_eq!(err.status(), StatusClass::NotFound);
    assert!(h.ledger.get_user_downloads(bob).await?.is_empty());

    let err = h.ledger.delete_content(alice, c1).await.unwrap_err();
    assert_eq!(err.status(), StatusClass::NotFound);
    Ok(())
}

#[tokio::test]
async fn update_applies_only_name_and_description() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;
    let before = h.ledger.get_content(c1).await?;

    let updated = h
        .ledger
        .update_content(
            alice,
            c1,
            ContentPatch {
                name: Some("renamed.pdf".into()),
                description: Some("d".repeat(260)),
            },
        )
        .await?;

    assert_eq!(updated.name, "renamed.pdf");
    assert_eq!(updated.description.chars().count(), 200);
    assert_eq!(updated.size, before.size);
    assert_eq!(updated.uploader_id, alice);
    assert!(updated.last_modified >= before.last_modified);

    let err = h
        .ledger
        .update_content(alice, c1, ContentPatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusClass::BadRequest);
    Ok(())
}

#[tokio::test]
async fn long_descriptions_are_truncated_on_upload() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let mut upload = support::upload("bafy-long", 5);
    upload.description = "ü".repeat(300);

    let id = h.ledger.register_content(alice, upload).await?;

    let stored = h.ledger.get_content(id).await?;
    assert_eq!(stored.description.chars().count(), 200);
    Ok(())
}

#[tokio::test]
async fn duplicate_cids_conflict_without_crediting() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    h.upload(alice, "bafy-c1", 25).await?;

    let err = h.upload(alice, "bafy-c1", 25).await.unwrap_err();
    let err = err.downcast::<icfs_core::LedgerError>()?;

    assert_eq!(err.status(), StatusClass::Conflict);
    assert_eq!(h.credit(alice).await?, 25);
    assert_eq!(h.ledger.get_user_contents(alice).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn reviews_require_a_prior_download() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;

    let err = h.ledger.rate(bob, c1, 4.0).await.unwrap_err();
    assert_eq!(err.status(), StatusClass::Forbidden);
    let err = h.ledger.comment(bob, c1, "great").await.unwrap_err();
    assert_eq!(err.status(), StatusClass::Forbidden);

    // Uploaders hold no download record for their own content
    let err = h.ledger.rate(alice, c1, 5.0).await.unwrap_err();
    assert_eq!(err.status(), StatusClass::Forbidden);

    assert!(h.ledger.get_comments(c1).await?.is_empty());
    assert_eq!(h.ledger.get_content(c1).await?.rating, 0.0);
    Ok(())
}

#[tokio::test]
async fn reviews_feed_the_average_and_the_comment_list() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let carol = h.account("carol").await?;
    let c1 = h.upload(alice, "bafy-c1", 10).await?;
    h.upload(bob, "bafy-c2", 10).await?;
    h.upload(carol, "bafy-c3", 10).await?;
    h.ledger.grant_access(bob, c1).await?;
    h.ledger.grant_access(carol, c1).await?;

    h.ledger.rate(bob, c1, 5.0).await?;
    h.ledger
        .review(
            carol,
            c1,
            ReviewPatch {
                rating: Some(2.0),
                comment: Some("missing chapter 3".into()),
            },
        )
        .await?;
    tokio::time::sleep(Duration::from_millis(5)).await;
    h.ledger.comment(bob, c1, "very thorough").await?;

    let content = h.ledger.get_content(c1).await?;
    assert!((content.rating - 3.5).abs() < 1e-6);

    let comments = h.ledger.get_comments(c1).await?;
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].username, "bob");
    assert_eq!(comments[0].comment_text.as_deref(), Some("very thorough"));
    assert_eq!(comments[0].rating, Some(5.0));
    assert_eq!(comments[1].username, "carol");
    assert!(comments[1].comment_time.is_some());

    let err = h.ledger.rate(bob, c1, 7.5).await.unwrap_err();
    assert_eq!(err.status(), StatusClass::BadRequest);
    Ok(())
}

#[tokio::test]
async fn read_paths_list_and_search() -> Result<()> {
    let h = Harness::new();
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let mut upload = support::upload("bafy-algebra", 5);
    upload.name = "Linear Algebra".into();
    upload.description = "eigenvalues and eigenvectors".into();
    let algebra = h.ledger.register_content(alice, upload).await?;
    h.upload(bob, "bafy-other", 5).await?;

    assert_eq!(h.ledger.get_all().await?.len(), 2);
    assert_eq!(h.ledger.get_user_contents(alice).await?.len(), 1);

    let hits = h.ledger.text_search("EIGENVALUES").await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, algebra);
    assert!(h.ledger.text_search("   ").await?.is_empty());
    assert!(h.ledger.text_search("topology").await?.is_empty());

    let err = h.ledger.get_comments(ContentId::new()).await.unwrap_err();
    assert_eq!(err.status(), StatusClass::NotFound);
    Ok(())
}

#[tokio::test]
async fn failed_grant_step_rolls_back_the_transfer() -> Result<()> {
    for fault in [Fault::IncrementDownloads, Fault::InsertDownloadRecord] {
        let store = FaultyContentStore::new(fault);
        let h = Harness::with_content_store(store.clone());
        let alice = h.account("alice").await?;
        let bob = h.account("bob").await?;
        let c1 = h.upload(alice, "bafy-c1", 25).await?;
        h.upload(bob, "bafy-c2", 40).await?;
        store.arm();

        let err = h.ledger.grant_access(bob, c1).await.unwrap_err();

        assert_eq!(err.status(), StatusClass::Internal, "{fault:?}");
        assert_eq!(h.credit(bob).await?, 40, "{fault:?}");
        assert_eq!(h.credit(alice).await?, 25, "{fault:?}");
        assert_eq!(h.downloads(c1).await?, 0, "{fault:?}");
        assert!(h.ledger.get_user_downloads(bob).await?.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn unrecorded_grant_is_a_conflict_and_charges_nothing() -> Result<()> {
    let store = FaultyContentStore::new(Fault::DuplicateDownloadRecord);
    let h = Harness::with_content_store(store.clone());
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;
    h.upload(bob, "bafy-c2", 40).await?;
    store.arm();

    let err = h.ledger.grant_access(bob, c1).await.unwrap_err();

    assert_eq!(err.status(), StatusClass::Conflict);
    assert_eq!(h.credit(bob).await?, 40);
    assert_eq!(h.credit(alice).await?, 25);
    assert_eq!(h.downloads(c1).await?, 0);
    Ok(())
}

#[tokio::test]
async fn failed_upload_is_never_visible() -> Result<()> {
    let store = FaultyContentStore::new(Fault::Insert);
    let h = Harness::with_content_store(store.clone());
    let alice = h.account("alice").await?;
    store.arm();

    let err = h.upload(alice, "bafy-c1", 25).await.unwrap_err();
    let err = err.downcast::<icfs_core::LedgerError>()?;

    assert_eq!(err.status(), StatusClass::Internal);
    assert_eq!(h.credit(alice).await?, 0);
    assert!(h.ledger.get_all().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_delete_keeps_the_upload_credit() -> Result<()> {
    let store = FaultyContentStore::new(Fault::Delete);
    let h = Harness::with_content_store(store.clone());
    let alice = h.account("alice").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;
    store.arm();

    let err = h.ledger.delete_content(alice, c1).await.unwrap_err();

    assert_eq!(err.status(), StatusClass::Internal);
    assert_eq!(h.credit(alice).await?, 25);
    assert!(h.ledger.get_content(c1).await.is_ok());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stalled_units_of_work_time_out() -> Result<()> {
    let store = FaultyContentStore::new(Fault::SlowLookup(Duration::from_secs(60)));
    let h = Harness::build(store.clone(), Duration::from_secs(1));
    let alice = h.account("alice").await?;
    let bob = h.account("bob").await?;
    let c1 = h.upload(alice, "bafy-c1", 25).await?;
    h.upload(bob, "bafy-c2", 40).await?;
    store.arm();

    let err = h.ledger.grant_access(bob, c1).await.unwrap_err();

    assert_eq!(err.status(), StatusClass::Internal);
    assert!(err.message().contains("timed out"));
    assert_eq!(h.credit(bob).await?, 40);
    assert_eq!(h.credit(alice).await?, 25);
    Ok(())
}
