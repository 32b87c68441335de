//! Integration tests for the Action retry/fallback combinator
//!
//! These tests verify:
//! - Retry counts and attempt numbering through async work
//! - Fallback chains and the error of the last attempt
//! - Unwrapping attempt-annotated values
//! - Actions driving a LoadingManager from its failure state

use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, timeout};
use unloader::action::{Action, ActionValue, UnwrapError};
use unloader::models::{AppError, NetworkError};
use unloader::{LoadableState, LoadingManager};

fn async_counter(calls: Arc<AtomicU32>, succeed_on: u32) -> Action {
    Action::from_async(move || {
        let calls = Arc::clone(&calls);
        async move {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::task::yield_now().await;
            if call >= succeed_on {
                Ok(ActionValue::new(call))
            } else {
                Err(anyhow::Error::from(NetworkError::NoResponse))
            }
        }
    })
}

#[tokio::test]
async fn test_async_retry_runs_four_times() {
    let calls = Arc::new(AtomicU32::new(0));
    let action = async_counter(Arc::clone(&calls), u32::MAX).retry(3);

    let error = timeout(Duration::from_secs(1), action.run())
        .await
        .expect("Timeout waiting for action")
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(error.attempt(), 3);
    assert!(error.error().downcast_ref::<NetworkError>().is_some());
}

#[tokio::test]
async fn test_async_retry_stops_on_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let action = async_counter(Arc::clone(&calls), 2).retry(5);

    let value = action.run().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(value.attempt_count(), Some(1));
    assert_eq!(*value.downcast_ref::<u32>().unwrap(), 2);
}

#[tokio::test]
async fn test_fallback_success_yields_done_at_attempt_one() {
    let failing = Action::new(|done| done(Err(anyhow::anyhow!("primary down"))));
    let fallback = Action::from_async(|| async { Ok::<_, anyhow::Error>(ActionValue::new("done")) });

    let value = failing.fallback_to(&fallback).run().await.unwrap();

    assert_eq!(value.attempt_count(), Some(1));
    assert_eq!(*value.downcast_ref::<&str>().unwrap(), "done");
}

#[test]
fn test_exhausted_chain_reports_last_error() {
    let first = Action::new(|done| done(Err(anyhow::anyhow!("first"))));
    let second = Action::new(|done| done(Err(anyhow::anyhow!("second"))));
    let third = Action::new(|done| done(Err(anyhow::anyhow!("third"))));

    let chain = first.fallback_to(&second.fallback_to(&third));
    let error = tokio_test::block_on(chain.run()).unwrap_err();

    assert_eq!(error.attempt(), 2);
    assert_eq!(error.to_string(), "attempt 2 failed: third");
}

#[test]
fn test_from_async_outside_runtime_fails() {
    let failures = Arc::new(AtomicU32::new(0));
    let sink = Arc::clone(&failures);

    Action::from_async(|| async { Ok::<_, anyhow::Error>(ActionValue::placeholder()) })
        .retry(2)
        .call(move |result| {
            if result.is_err() {
                sink.fetch_add(1, Ordering::SeqCst);
            }
        });

    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_action_in_failure_state_reloads_manager() {
    let manager = LoadingManager::default();
    let weak = manager.downgrade();
    let retry = Action::from_fn(move || {
        if let Some(manager) = weak.upgrade() {
            manager.show_loading();
        }
    });

    manager.show_failure(AppError::from(NetworkError::Inaccessible), Some(retry));
    let state = manager.state();
    assert_eq!(
        state.error_description().as_deref(),
        Some("The network is inaccessible. Please check your internet connection.")
    );

    // What a renderer's Retry button does
    let action = state.retry_action().cloned().unwrap();
    action.run().await.unwrap();

    assert_eq!(manager.state(), LoadableState::Loading);
}

#[tokio::test]
async fn test_late_retry_result_is_applied() {
    let manager = LoadingManager::default();
    manager.show_loading();

    let slow = Action::from_async(|| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, anyhow::Error>(ActionValue::new("late"))
    });

    let pending = {
        let manager = manager.clone();
        tokio::spawn(async move {
            if let Ok(value) = slow.run().await {
                manager.show_success(value.downcast_ref::<&str>().unwrap());
            }
        })
    };

    // Manager moves on before the action completes
    manager.hide();
    pending.await.unwrap();

    assert_eq!(manager.state(), LoadableState::success("late"));
}

proptest! {
    #[test]
    fn prop_unwrap_ignores_wrap_depth(payload in any::<i64>(), depth in 0usize..16) {
        let mut value = ActionValue::new(payload);
        for attempt in 0..depth {
            value = value.with_attempt(attempt as u32);
        }

        let unwrapped = value.unwrap_nested().unwrap();
        prop_assert!(matches!(unwrapped, ActionValue::Plain(_)));
        prop_assert_eq!(*unwrapped.downcast_ref::<i64>().unwrap(), payload);
    }

    #[test]
    fn prop_retry_runs_n_plus_one_times(retries in 0u32..20) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let action = Action::new(move |done| {
            counter.fetch_add(1, Ordering::SeqCst);
            done(Err(anyhow::anyhow!("always")));
        })
        .retry(retries);

        let attempt = Arc::new(AtomicU32::new(u32::MAX));
        let sink = Arc::clone(&attempt);
        action.call(move |result| {
            if let Err(error) = result {
                sink.store(error.attempt(), Ordering::SeqCst);
            }
        });

        prop_assert_eq!(calls.load(Ordering::SeqCst), retries + 1);
        prop_assert_eq!(attempt.load(Ordering::SeqCst), retries);
    }
}

#[test]
fn test_unwrap_missing_value() {
    let value = ActionValue::empty(4);
    assert_eq!(
        value.unwrap_nested().unwrap_err(),
        UnwrapError::MissingValue { attempt: 4 }
    );
}
