use crate::common::{TestApp, routes};
use ::common::SubmissionState;
use nitpick_server::store::{Progress, ReactionKind, Reviews, VersionChain};

const LOGIN_REQUIRED: &str = "You have to be logged in to do that.";

mod show {
    use super::*;

    #[tokio::test]
    async fn renders_title_and_next_submission() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "two-fer").await;
        let alice = app.create_user("alice");
        let bob = app.create_user("bob");
        let carol = app.create_user("carol");
        let alices = app.submit(&alice, "ruby", "two-fer", &[("a.rb", "1")]).await;
        let bobs = app.submit(&bob, "ruby", "two-fer", &[("b.rb", "1")]).await;

        let token = app.session_token(&carol);
        let res = app
            .get_with_token(&routes::submission(&alices), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["title"], "Two Fer by alice in Ruby");
        assert_eq!(res.body["submission"]["key"], alices.as_str());
        assert_eq!(res.body["submission"]["state"], "pending");
        assert_eq!(res.body["next_submission"]["key"], bobs.as_str());

        let submission = app.store.submission_by_key(&alices).await.unwrap().unwrap();
        assert_eq!(app.store.view_count(submission.id, carol.id).unwrap(), 1);
        assert!(
            app.store
                .is_looking(submission.user_exercise_id, carol.id)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn next_submission_wraps_and_skips_muted() {
        let app = TestApp::spawn().await;
        app.register_exercise("go", "leap").await;
        let carol = app.create_user("carol");
        let mut keys = Vec::new();
        for name in ["alice", "bob", "dave"] {
            let user = app.create_user(name);
            keys.push(app.submit(&user, "go", "leap", &[("leap.go", name)]).await);
        }
        let token = app.session_token(&carol);

        let res = app.get_with_token(&routes::submission(&keys[2]), &token).await;
        assert_eq!(res.body["next_submission"]["key"], keys[0].as_str());

        let muted = app
            .post_with_token(&routes::submission_action(&keys[0], "mute"), &token)
            .await;
        assert_eq!(muted.status, 303);

        let res = app.get_with_token(&routes::submission(&keys[2]), &token).await;
        assert_eq!(res.body["next_submission"]["key"], keys[1].as_str());
    }

    #[tokio::test]
    async fn guest_sees_page_without_next_submission() {
        let app = TestApp::spawn().await;
        app.register_exercise("go", "leap").await;
        let alice = app.create_user("alice");
        let bob = app.create_user("bob");
        let key = app.submit(&alice, "go", "leap", &[("leap.go", "1")]).await;
        app.submit(&bob, "go", "leap", &[("leap.go", "2")]).await;

        let res = app.get_without_token(&routes::submission(&key)).await;

        assert_eq!(res.status, 200);
        assert!(res.body["next_submission"].is_null());
    }

    #[tokio::test]
    async fn viewing_marks_notifications_read() {
        let app = TestApp::spawn().await;
        app.register_exercise("go", "leap").await;
        let alice = app.create_user("alice");
        let bob = app.create_user("bob");
        let key = app.submit(&alice, "go", "leap", &[("leap.go", "1")]).await;

        let bob_token = app.session_token(&bob);
        app.post_with_token(&routes::submission_action(&key, "like"), &bob_token)
            .await;
        let unread = app.store.notifications_for(alice.id).unwrap();
        assert_eq!(unread.len(), 1);
        assert!(!unread[0].read);

        let alice_token = app.session_token(&alice);
        app.get_with_token(&routes::submission(&key), &alice_token)
            .await;

        let notifications = app.store.notifications_for(alice.id).unwrap();
        assert!(notifications.iter().all(|n| n.read));
    }

    #[tokio::test]
    async fn unknown_key_redirects_home_with_error() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(&routes::submission("missing")).await;

        assert_eq!(res.status, 303);
        assert_eq!(res.location.as_deref(), Some("/"));
        assert_eq!(res.flash_message(), "We can't find that submission.");
    }
}

mod reactions {
    use super::*;

    #[tokio::test]
    async fn like_requires_login() {
        let app = TestApp::spawn().await;
        app.register_exercise("go", "leap").await;
        let alice = app.create_user("alice");
        let key = app.submit(&alice, "go", "leap", &[("leap.go", "1")]).await;

        let res = app
            .post_without_token(&routes::submission_action(&key, "like"))
            .await;

        assert_eq!(res.status, 303);
        assert_eq!(res.location.as_deref(), Some("/"));
        assert_eq!(res.flash_message(), LOGIN_REQUIRED);
    }

    #[tokio::test]
    async fn like_and_unlike_toggle_and_notify_owner() {
        let app = TestApp::spawn().await;
        app.register_exercise("go", "leap").await;
        let alice = app.create_user("alice");
        let bob = app.create_user("bob");
        let key = app.submit(&alice, "go", "leap", &[("leap.go", "1")]).await;
        let submission = app.store.submission_by_key(&key).await.unwrap().unwrap();
        let token = app.session_token(&bob);

        let res = app
            .post_with_token(&routes::submission_action(&key, "like"), &token)
            .await;
        assert_eq!(res.status, 303);
        assert_eq!(res.location, Some(routes::submission(&key)));
        assert_eq!(res.flash_message(), "The submission has been liked.");
        assert!(
            app.store
                .has_reaction(
                    submission.id,
                    bob.id,
                    ReactionKind::Like
                )
                .await
                .unwrap()
        );
        let notifications = app.store.notifications_for(alice.id).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].actor_id, bob.id);

        let res = app
            .post_with_token(&routes::submission_action(&key, "unlike"), &token)
            .await;
        assert_eq!(res.flash_message(), "The submission has been unliked.");
        assert!(
            !app.store
                .has_reaction(
                    submission.id,
                    bob.id,
                    ReactionKind::Like
                )
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn liking_own_submission_does_not_notify() {
        let app = TestApp::spawn().await;
        app.register_exercise("go", "leap").await;
        let alice = app.create_user("alice");
        let key = app.submit(&alice, "go", "leap", &[("leap.go", "1")]).await;
        let token = app.session_token(&alice);

        app.post_with_token(&routes::submission_action(&key, "like"), &token)
            .await;

        assert!(app.store.notifications_for(alice.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn mute_and_unmute_confirm() {
        let app = TestApp::spawn().await;
        app.register_exercise("go", "leap").await;
        let alice = app.create_user("alice");
        let bob = app.create_user("bob");
        let key = app.submit(&alice, "go", "leap", &[("leap.go", "1")]).await;
        let token = app.session_token(&bob);

        let res = app
            .post_with_token(&routes::submission_action(&key, "mute"), &token)
            .await;
        assert_eq!(
            res.flash_message(),
            "The submission has been muted. It will reappear when there has been some activity."
        );

        let res = app
            .post_with_token(&routes::submission_action(&key, "unmute"), &token)
            .await;
        assert_eq!(res.flash_message(), "The submission has been unmuted.");
        assert_eq!(res.location, Some(routes::submission(&key)));
    }

    #[tokio::test]
    async fn unknown_submission_redirects_home() {
        let app = TestApp::spawn().await;
        let bob = app.create_user("bob");
        let token = app.session_token(&bob);

        let res = app
            .post_with_token(&routes::submission_action("missing", "like"), &token)
            .await;

        assert_eq!(res.location.as_deref(), Some("/"));
        assert_eq!(res.flash_message(), "No such exercise found");
    }

    #[tokio::test]
    async fn session_cookie_authenticates() {
        let app = TestApp::spawn().await;
        app.register_exercise("go", "leap").await;
        let alice = app.create_user("alice");
        let bob = app.create_user("bob");
        let key = app.submit(&alice, "go", "leap", &[("leap.go", "1")]).await;

        let res = app
            .post_with_cookie(
                &routes::submission_action(&key, "like"),
                &app.session_token(&bob),
            )
            .await;

        assert_eq!(res.flash_message(), "The submission has been liked.");
    }

    #[tokio::test]
    async fn invalid_token_is_treated_as_guest() {
        let app = TestApp::spawn().await;
        app.register_exercise("go", "leap").await;
        let alice = app.create_user("alice");
        let key = app.submit(&alice, "go", "leap", &[("leap.go", "1")]).await;

        let res = app
            .post_with_token(&routes::submission_action(&key, "like"), "garbage")
            .await;

        assert_eq!(res.flash_message(), LOGIN_REQUIRED);
    }

    #[tokio::test]
    async fn legacy_action_links_redirect_to_submission() {
        let app = TestApp::spawn().await;

        for action in ["like", "unmute", "nitpick", "+like", "+mute"] {
            let res = app
                .get_without_token(&routes::submission_action("abc", action))
                .await;
            assert_eq!(res.status, 303, "{action}");
            assert_eq!(res.location.as_deref(), Some("/submissions/abc"));
            assert!(res.flash.is_none());
        }
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn done_completes_head_and_redirects_home() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "bob").await;
        let alice = app.create_user("alice");
        let first = app.submit(&alice, "ruby", "bob", &[("bob.rb", "1")]).await;
        let second = app.submit(&alice, "ruby", "bob", &[("bob.rb", "2")]).await;
        let token = app.session_token(&alice);

        let res = app
            .post_with_token(&routes::submission_action(&first, "done"), &token)
            .await;

        assert_eq!(res.status, 303);
        assert_eq!(res.location.as_deref(), Some("/"));
        assert_eq!(
            res.flash_message(),
            "Bob in ruby will no longer appear in the nitpick lists."
        );
        let head = app.store.submission_by_key(&second).await.unwrap().unwrap();
        assert_eq!(head.state, SubmissionState::Done);
        assert!(head.done_at.is_some());
        assert_eq!(app.store.lifecycle_events_for(alice.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn done_by_someone_else_changes_nothing() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "bob").await;
        let alice = app.create_user("alice");
        let mallory = app.create_user("mallory");
        let key = app.submit(&alice, "ruby", "bob", &[("bob.rb", "1")]).await;

        let res = app
            .post_with_token(
                &routes::submission_action(&key, "done"),
                &app.session_token(&mallory),
            )
            .await;

        assert_eq!(res.location, Some(routes::submission(&key)));
        assert_eq!(res.flash_message(), "Only the author may complete the exercise.");
        let submission = app.store.submission_by_key(&key).await.unwrap().unwrap();
        assert_eq!(submission.state, SubmissionState::Pending);
    }

    #[tokio::test]
    async fn actions_require_login() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "bob").await;
        let alice = app.create_user("alice");
        let key = app.submit(&alice, "ruby", "bob", &[("bob.rb", "1")]).await;

        for action in ["done", "reopen", "hibernate", "wakeup"] {
            let res = app
                .post_without_token(&routes::submission_action(&key, action))
                .await;
            assert_eq!(res.location.as_deref(), Some("/"), "{action}");
            assert_eq!(res.flash_message(), LOGIN_REQUIRED);
        }
    }

    #[tokio::test]
    async fn reopen_returns_done_submission_to_review() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "bob").await;
        let alice = app.create_user("alice");
        let key = app.submit(&alice, "ruby", "bob", &[("bob.rb", "1")]).await;
        let token = app.session_token(&alice);
        app.post_with_token(&routes::submission_action(&key, "done"), &token)
            .await;

        let res = app
            .post_with_token(&routes::submission_action(&key, "reopen"), &token)
            .await;

        assert_eq!(res.location, Some(routes::submission(&key)));
        assert!(res.flash.is_none());
        let submission = app.store.submission_by_key(&key).await.unwrap().unwrap();
        assert_eq!(submission.state, SubmissionState::Pending);
        assert!(submission.done_at.is_none());
    }

    #[tokio::test]
    async fn reopen_by_someone_else_is_refused() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "bob").await;
        let alice = app.create_user("alice");
        let mallory = app.create_user("mallory");
        let key = app.submit(&alice, "ruby", "bob", &[("bob.rb", "1")]).await;
        app.post_with_token(
            &routes::submission_action(&key, "done"),
            &app.session_token(&alice),
        )
        .await;

        let res = app
            .post_with_token(
                &routes::submission_action(&key, "reopen"),
                &app.session_token(&mallory),
            )
            .await;

        assert_eq!(res.location.as_deref(), Some("/"));
        assert_eq!(
            res.flash_message(),
            "Only the current author may reopen the exercise"
        );
    }

    #[tokio::test]
    async fn hibernate_then_wakeup() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "bob").await;
        let alice = app.create_user("alice");
        let key = app.submit(&alice, "ruby", "bob", &[("bob.rb", "1")]).await;
        let token = app.session_token(&alice);

        let res = app
            .post_with_token(&routes::submission_action(&key, "hibernate"), &token)
            .await;
        assert_eq!(res.flash_message(), "Bob in ruby is now hibernating.");
        let submission = app.store.submission_by_key(&key).await.unwrap().unwrap();
        assert_eq!(submission.state, SubmissionState::Hibernating);

        let res = app
            .post_with_token(&routes::submission_action(&key, "wakeup"), &token)
            .await;
        assert_eq!(res.flash_message(), "Bob in ruby is now active.");
        let submission = app.store.submission_by_key(&key).await.unwrap().unwrap();
        assert_eq!(submission.state, SubmissionState::Pending);
    }

    #[tokio::test]
    async fn hibernate_and_wakeup_by_someone_else_are_refused() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "bob").await;
        let alice = app.create_user("alice");
        let mallory = app.create_user("mallory");
        let key = app.submit(&alice, "ruby", "bob", &[("bob.rb", "1")]).await;
        let token = app.session_token(&mallory);

        let res = app
            .post_with_token(&routes::submission_action(&key, "hibernate"), &token)
            .await;
        assert_eq!(
            res.flash_message(),
            "Only the author may hibernate this exercise."
        );

        let res = app
            .post_with_token(&routes::submission_action(&key, "wakeup"), &token)
            .await;
        assert_eq!(
            res.flash_message(),
            "Only the author may reactivate the exercise."
        );
        assert_eq!(res.location, Some(routes::submission(&key)));
    }

    #[tokio::test]
    async fn delete_head_restores_prior() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "bob").await;
        let alice = app.create_user("alice");
        let first = app.submit(&alice, "ruby", "bob", &[("bob.rb", "1")]).await;
        let second = app.submit(&alice, "ruby", "bob", &[("bob.rb", "2")]).await;
        let token = app.session_token(&alice);

        let res = app
            .delete_with_token(&routes::submission(&second), &token)
            .await;

        assert_eq!(res.status, 303);
        assert_eq!(res.location.as_deref(), Some("/"));
        assert!(app.store.submission_by_key(&second).await.unwrap().is_none());
        let head = app.store.head(alice.id, "ruby", "bob").await.unwrap().unwrap();
        assert_eq!(head.key, first);
        assert_eq!(head.state, SubmissionState::Pending);
        let aggregate = app
            .store
            .user_exercise(alice.id, "ruby", "bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(aggregate.iteration_count, 1);

        // The freed version number is reused.
        let third = app.submit(&alice, "ruby", "bob", &[("bob.rb", "3")]).await;
        let head = app.store.submission_by_key(&third).await.unwrap().unwrap();
        assert_eq!(head.version, 2);
    }

    #[tokio::test]
    async fn delete_older_version_is_refused() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "bob").await;
        let alice = app.create_user("alice");
        let first = app.submit(&alice, "ruby", "bob", &[("bob.rb", "1")]).await;
        app.submit(&alice, "ruby", "bob", &[("bob.rb", "2")]).await;

        let res = app
            .delete_with_token(&routes::submission(&first), &app.session_token(&alice))
            .await;

        assert_eq!(res.location, Some(routes::submission(&first)));
        assert_eq!(
            res.flash_message(),
            "Only the most recent iteration may be deleted."
        );
        assert_eq!(
            app.store.chain(alice.id, "ruby", "bob").await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn delete_by_someone_else_is_refused() {
        let app = TestApp::spawn().await;
        app.register_exercise("ruby", "bob").await;
        let alice = app.create_user("alice");
        let mallory = app.create_user("mallory");
        let key = app.submit(&alice, "ruby", "bob", &[("bob.rb", "1")]).await;

        let res = app
            .delete_with_token(&routes::submission(&key), &app.session_token(&mallory))
            .await;

        assert_eq!(res.location.as_deref(), Some("/"));
        assert_eq!(res.flash_message(), "Only the author may delete the exercise.");
        assert!(app.store.submission_by_key(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_key_flashes_no_such_submission() {
        let app = TestApp::spawn().await;
        let alice = app.create_user("alice");

        let res = app
            .post_with_token(
                &routes::submission_action("missing", "done"),
                &app.session_token(&alice),
            )
            .await;

        assert_eq!(res.location.as_deref(), Some("/"));
        assert_eq!(res.flash_message(), "No such submission");
    }
}
