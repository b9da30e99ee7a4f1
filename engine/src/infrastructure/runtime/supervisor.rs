// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Supervision Utilities
//!
//! Supervised concurrent task execution with structured logging and
//! propagated errors, used for the tick loop's collaborator calls so a
//! panicking `ProjectRpc`/`Executor`/`ResourceProbe` adapter call never
//! silently disappears (`spec.md` §5: "nothing in the core blocks").

use core_domain::CoreError;
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub type AppResult<T> = Result<T, CoreError>;

/// Spawns a supervised task: logs start/completion/failure and returns a
/// handle the caller must await, preventing spawn-and-forget.
pub fn spawn_supervised<F, T>(name: &'static str, fut: F) -> JoinHandle<AppResult<T>>
where
    F: std::future::Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    debug!(task = name, "task starting");

    tokio::spawn(async move {
        let result = fut.await;

        match &result {
            Ok(_) => debug!(task = name, "task completed successfully"),
            Err(e) => error!(task = name, error = ?e, "task failed"),
        }

        result
    })
}

/// Awaits a supervised task handle, converting panics and cancellations
/// into `CoreError` rather than letting them propagate as `JoinError`.
pub async fn join_supervised<T>(handle: JoinHandle<AppResult<T>>) -> AppResult<T> {
    let join_result: Result<AppResult<T>, tokio::task::JoinError> = handle.await;

    match join_result {
        Ok(task_result) => task_result,
        Err(e) => {
            if e.is_panic() {
                Err(CoreError::internal(format!("task panicked: {}", e)))
            } else if e.is_cancelled() {
                Err(CoreError::Cancelled(format!("task cancelled: {}", e)))
            } else {
                Err(CoreError::internal(format!("task join failed: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_supervised_propagates_success() {
        let handle = spawn_supervised("test-success", async { Ok::<i32, CoreError>(42) });

        let result: AppResult<i32> = join_supervised(handle).await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn spawn_supervised_propagates_error() {
        let handle = spawn_supervised("test-error", async { Err::<(), _>(CoreError::invariant("test error")) });

        let result: AppResult<()> = join_supervised(handle).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn join_supervised_converts_panic_to_error() {
        let handle = tokio::spawn(async {
            panic!("test panic");
            #[allow(unreachable_code)]
            Ok::<(), CoreError>(())
        });

        let result: AppResult<()> = join_supervised(handle).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("panicked"));
    }
}
