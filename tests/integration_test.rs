// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the pingback receiver.

mod harness;

use harness::blog::{
    blog_config, page_linking_to, remote_ip, FakeWeb, TestBlog, HELLO_WORLD,
};
use pingback_receiver::{
    models::{PingbackRecord, Post},
    service::SUCCESS_MESSAGE,
    xmlrpc::encode_ping_call,
    FaultCode, NoopCallback, PingbackError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

const SOURCE: &str = "https://a.example/post1";

fn linking_web() -> FakeWeb {
    FakeWeb::new().with_page(SOURCE, 200, page_linking_to("A post", HELLO_WORLD))
}

#[tokio::test]
async fn test_hello_world_pingback_is_recorded() {
    let blog = TestBlog::new(linking_web());
    let calls = AtomicUsize::new(0);
    let callback = |record: &PingbackRecord| -> anyhow::Result<()> {
        calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(record.target_post_title, "Hello World");
        Ok(())
    };

    let response = blog
        .service
        .receive_ping(&encode_ping_call(SOURCE, HELLO_WORLD), remote_ip(), &callback)
        .await;

    assert!(response.success, "unexpected fault: {}", response.message);
    assert_eq!(response.message, SUCCESS_MESSAGE);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let history = tokio_test::assert_ok!(blog.service.get_history().await);
    assert_eq!(history.len(), 1);
    let record = &history[0];
    assert_eq!(record.source_uri, SOURCE);
    assert_eq!(record.target_uri, HELLO_WORLD);
    assert_eq!(record.source_title, "A post");
    assert_eq!(record.source_ip, remote_ip().to_string());
    assert_eq!(record.target_post_id, blog.hello_world.id);
}

#[tokio::test]
async fn test_repeated_ping_is_idempotent() {
    let blog = TestBlog::new(linking_web());
    let calls = AtomicUsize::new(0);
    let callback = |_: &PingbackRecord| -> anyhow::Result<()> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };
    let body = encode_ping_call(SOURCE, HELLO_WORLD);

    let first = blog.service.receive_ping(&body, remote_ip(), &callback).await;
    let second = blog.service.receive_ping(&body, remote_ip(), &callback).await;

    assert!(first.success);
    assert!(second.success, "duplicates are accepted silently");
    assert_eq!(blog.store.len().await, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // Duplicate short-circuits before the source is fetched again
    assert_eq!(blog.web.fetch_count(), 1);
}

#[tokio::test]
async fn test_duplicate_reported_when_configured() {
    let mut config = blog_config();
    config.validation.report_duplicates_as_fault = true;
    let blog = TestBlog::with_config(config, linking_web());
    let body = encode_ping_call(SOURCE, HELLO_WORLD);

    assert!(blog.service.receive_ping(&body, remote_ip(), &NoopCallback).await.success);
    let second = blog.service.receive_ping(&body, remote_ip(), &NoopCallback).await;

    assert!(!second.success);
    assert_eq!(second.fault_code, FaultCode::AlreadyRegistered);
    assert_eq!(second.fault_code.code(), 48);
}

#[tokio::test]
async fn test_unknown_target_is_fault_32() {
    let target = "https://blog.example/posts/no-such-post";
    let web = FakeWeb::new().with_page(SOURCE, 200, page_linking_to("A post", target));
    let blog = TestBlog::new(web);

    let response = blog
        .service
        .receive_ping(&encode_ping_call(SOURCE, target), remote_ip(), &NoopCallback)
        .await;

    assert_eq!(response.fault_code.code(), 32);
    assert!(blog.store.is_empty().await);
    assert_eq!(blog.web.fetch_count(), 0, "target is resolved before fetching");
}

#[tokio::test]
async fn test_draft_and_deleted_targets_are_fault_32() {
    let mut draft = Post::new("Unfinished", "unfinished");
    draft.published = false;
    let mut deleted = Post::new("Retracted", "retracted");
    deleted.deleted = true;

    let targets = [
        "https://blog.example/posts/unfinished",
        "https://blog.example/posts/retracted",
    ];
    let body = format!(
        "<a href=\"{}\">draft</a> <a href=\"{}\">gone</a>",
        targets[0], targets[1]
    );
    let web = FakeWeb::new().with_page(SOURCE, 200, body);
    let blog = TestBlog::with_posts(blog_config(), web, vec![draft, deleted]);

    for target in targets {
        let response = blog
            .service
            .receive_ping(&encode_ping_call(SOURCE, target), remote_ip(), &NoopCallback)
            .await;

        assert!(!response.success, "{target}");
        assert_eq!(response.fault_code.code(), 32, "{target}");
    }
    assert!(blog.store.is_empty().await);
    assert_eq!(blog.web.fetch_count(), 0);
}

#[tokio::test]
async fn test_foreign_target_host_is_fault_33() {
    let target = "https://elsewhere.example/posts/hello-world";
    let blog = TestBlog::new(linking_web());

    let response = blog
        .service
        .receive_ping(&encode_ping_call(SOURCE, target), remote_ip(), &NoopCallback)
        .await;

    assert_eq!(response.fault_code, FaultCode::TargetNotPingable);
    assert!(blog.store.is_empty().await);
}

#[tokio::test]
async fn test_unreachable_source_is_fault_16() {
    let blog = TestBlog::new(FakeWeb::new());

    let response = blog
        .service
        .receive_ping(&encode_ping_call(SOURCE, HELLO_WORLD), remote_ip(), &NoopCallback)
        .await;

    assert_eq!(response.fault_code.code(), 16);
    assert!(blog.store.is_empty().await);
}

#[tokio::test]
async fn test_non_success_source_is_fault_16() {
    for status in [301u16, 404, 410, 500] {
        let web = FakeWeb::new().with_page(SOURCE, status, page_linking_to("Gone", HELLO_WORLD));
        let blog = TestBlog::new(web);

        let response = blog
            .service
            .receive_ping(&encode_ping_call(SOURCE, HELLO_WORLD), remote_ip(), &NoopCallback)
            .await;

        assert_eq!(response.fault_code.code(), 16, "status {status}");
        assert!(blog.store.is_empty().await);
    }
}

#[tokio::test]
async fn test_slow_source_times_out_with_fault_16() {
    let web = linking_web().with_delay(Duration::from_secs(5));
    let blog = TestBlog::new(web);

    let response = blog
        .service
        .receive_ping(&encode_ping_call(SOURCE, HELLO_WORLD), remote_ip(), &NoopCallback)
        .await;

    assert_eq!(response.fault_code, FaultCode::SourceNotExist);
    assert!(blog.store.is_empty().await);
}

#[tokio::test]
async fn test_source_without_link_is_fault_17() {
    let web = FakeWeb::new().with_page(
        SOURCE,
        200,
        "<html><body>Mentions blog.example/posts/hello-world only as text \
         and links <a href=\"https://blog.example/posts/hello-world-2\">elsewhere</a>.</body></html>",
    );
    let blog = TestBlog::new(web);

    let response = blog
        .service
        .receive_ping(&encode_ping_call(SOURCE, HELLO_WORLD), remote_ip(), &NoopCallback)
        .await;

    assert_eq!(response.fault_code.code(), 17);
    assert!(blog.store.is_empty().await);
}

#[tokio::test]
async fn test_relative_link_counts() {
    let web = FakeWeb::new().with_page(
        "https://blog.example/posts/other",
        200,
        page_linking_to("Sibling post", "/posts/hello-world"),
    );
    let blog = TestBlog::new(web);

    let response = blog
        .service
        .receive_ping(
            &encode_ping_call("https://blog.example/posts/other", HELLO_WORLD),
            remote_ip(),
            &NoopCallback,
        )
        .await;

    assert!(response.success, "unexpected fault: {}", response.message);
}

#[tokio::test]
async fn test_concurrent_identical_pings_store_one_record() {
    // Delay keeps both calls in flight past the duplicate check
    let web = linking_web().with_delay(Duration::from_millis(50));
    let blog = TestBlog::new(web);
    let calls = AtomicUsize::new(0);
    let callback = |_: &PingbackRecord| -> anyhow::Result<()> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };
    let body = encode_ping_call(SOURCE, HELLO_WORLD);

    let (a, b) = tokio::join!(
        blog.service.receive_ping(&body, remote_ip(), &callback),
        blog.service.receive_ping(&body, remote_ip(), &callback),
    );

    assert!(a.success);
    assert!(b.success);
    assert_eq!(blog.store.len().await, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let sources = [
        "https://a.example/1",
        "https://a.example/2",
        "https://a.example/3",
    ];
    let web = sources.iter().fold(FakeWeb::new(), |web, source| {
        web.with_page(source, 200, page_linking_to(source, HELLO_WORLD))
    });
    let blog = TestBlog::new(web);

    for source in sources {
        let response = blog
            .service
            .receive_ping(&encode_ping_call(source, HELLO_WORLD), remote_ip(), &NoopCallback)
            .await;
        assert!(response.success);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let history = blog.service.get_history().await.unwrap();
    let order: Vec<&str> = history.iter().map(|r| r.source_uri.as_str()).collect();
    assert_eq!(order, ["https://a.example/3", "https://a.example/2", "https://a.example/1"]);
}

#[tokio::test]
async fn test_delete_history() {
    let blog = TestBlog::new(linking_web());
    blog.service
        .receive_ping(&encode_ping_call(SOURCE, HELLO_WORLD), remote_ip(), &NoopCallback)
        .await;
    let id = blog.service.get_history().await.unwrap()[0].id;

    tokio_test::assert_ok!(blog.service.delete_history(id).await);
    assert!(blog.store.is_empty().await);

    let err = tokio_test::assert_err!(blog.service.delete_history(id).await);
    assert_eq!(err, PingbackError::NotFound(id));
    assert!(matches!(
        blog.service.delete_history(Uuid::new_v4()).await,
        Err(PingbackError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_deleted_pair_can_be_pinged_again() {
    let blog = TestBlog::new(linking_web());
    let body = encode_ping_call(SOURCE, HELLO_WORLD);
    blog.service.receive_ping(&body, remote_ip(), &NoopCallback).await;
    let id = blog.service.get_history().await.unwrap()[0].id;
    blog.service.delete_history(id).await.unwrap();

    let response = blog.service.receive_ping(&body, remote_ip(), &NoopCallback).await;

    assert!(response.success);
    assert_eq!(blog.store.len().await, 1);
    assert_eq!(blog.web.fetch_count(), 2);
}

#[tokio::test]
async fn test_callback_failure_still_succeeds() {
    let blog = TestBlog::new(linking_web());
    let failing = |_: &PingbackRecord| -> anyhow::Result<()> { anyhow::bail!("counter offline") };

    let response = blog
        .service
        .receive_ping(&encode_ping_call(SOURCE, HELLO_WORLD), remote_ip(), &failing)
        .await;

    assert!(response.success);
    assert_eq!(blog.store.len().await, 1);
}

#[tokio::test]
async fn test_outcomes_are_counted() {
    let blog = TestBlog::new(linking_web());
    let body = encode_ping_call(SOURCE, HELLO_WORLD);

    blog.service.receive_ping(&body, remote_ip(), &NoopCallback).await;
    blog.service.receive_ping(&body, remote_ip(), &NoopCallback).await;
    blog.service
        .receive_ping("<methodCall/>", remote_ip(), &NoopCallback)
        .await;

    assert_eq!(blog.metrics.outcome_count("recorded"), 1);
    assert_eq!(blog.metrics.outcome_count("duplicate"), 1);
    let text = blog.metrics.render().unwrap();
    assert!(text.contains("pingback_requests_total"));
}
