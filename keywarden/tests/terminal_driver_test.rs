//! End-to-end tests for the interactive terminal driver.
//!
//! Each test scripts a small shell session inside a real pseudo-terminal.
//! The scripts disable echo first so the driver only observes the prompts,
//! never its own injected answers.

#![cfg(unix)]

use keywarden::terminal::{drive, Action, TerminalError};

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

fn action(question: &str, answer: &str) -> Action {
    Action::new(question, answer).expect("test pattern is valid")
}

#[tokio::test]
async fn test_two_prompts_answered_in_order() {
    let script = "stty -echo; printf 'First? '; read a; printf 'Second? '; read b; exit 0";
    let actions = vec![action("First", "one"), action("Second", "two")];
    drive("/bin/sh", &sh(script), actions)
        .await
        .expect("scripted exchange should succeed");
}

#[tokio::test]
async fn test_prompt_order_is_not_permutable() {
    // The second chunk matches the first pattern again, not the second.
    let script = "stty -echo; printf 'First? '; read a; printf 'First? '; read b";
    let actions = vec![action("First", "one"), action("Second", "two")];
    let err = drive("/bin/sh", &sh(script), actions)
        .await
        .expect_err("repeated prompt must not match the second action");
    match err {
        TerminalError::UnexpectedOutput { chunk, pattern } => {
            assert!(chunk.contains("First"), "chunk was: {chunk:?}");
            assert_eq!(pattern, "Second");
        }
        other => panic!("expected UnexpectedOutput, got {other:?}"),
    }
}

#[tokio::test]
async fn test_trailing_unconsumed_action_is_not_an_error() {
    let script = "stty -echo; printf 'Only? '; read a; exit 0";
    let actions = vec![action("Only", "yes"), action("Never shown", "unused")];
    drive("/bin/sh", &sh(script), actions)
        .await
        .expect("optional trailing action should be ignored");
}

#[tokio::test]
async fn test_nonzero_exit_fails_after_all_actions_fired() {
    let script = "stty -echo; printf 'Pass? '; read a; exit 3";
    let actions = vec![action("Pass", "secret")];
    let err = drive("/bin/sh", &sh(script), actions)
        .await
        .expect_err("non-zero exit must fail the session");
    assert!(matches!(err, TerminalError::ChildProcessFailed { code: 3 }));
}

#[tokio::test]
async fn test_output_with_no_action_left_is_exhaustion() {
    let err = drive("/bin/sh", &sh("printf 'Hello'"), Vec::new())
        .await
        .expect_err("unexpected output must exhaust an empty script");
    assert!(matches!(err, TerminalError::ProtocolExhausted { .. }));
}
