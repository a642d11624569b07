//! Settlement orchestration.
//!
//! The orchestrator turns a validated settlement request into an
//! account-abstraction operation: it builds the operation, obtains gas
//! estimates from a bundler, computes the canonical hash and either signs
//! and submits directly (relay-signed flows) or hands the unsigned hash
//! back for the end-user wallet to sign (the two-phase continuation).
//!
//! [`SettlementBackend`] decouples protocol semantics from transport. The
//! production transport is a supervised subprocess ([`SubprocessBackend`]);
//! an in-process library call or an RPC call slot in behind the same trait.

mod subprocess;
pub use subprocess::SubprocessBackend;

use crate::{
    error::{OrchestratorError, RelayResult},
    supervisor::SupervisedOutput,
    types::{OrchestratorRequest, OrchestratorResult, SettlementOutcome},
};
use async_trait::async_trait;
use std::fmt::Debug;

/// Executes settlement requests.
#[async_trait]
pub trait SettlementBackend: Debug + Send + Sync {
    /// Builds and submits (or prepares) the operation for `request`.
    async fn execute(&self, request: &OrchestratorRequest) -> RelayResult<SettlementOutcome>;
}

/// Interprets a finished run into a typed outcome.
///
/// The continuation signal wins over the exit code: a result carrying
/// `needsUserOpSignature` is a successful first phase even when the process
/// exited non-zero. Any other non-zero exit is a hard failure carrying the
/// captured output for operator logs.
pub fn interpret_run(
    output: &SupervisedOutput,
    result: Option<OrchestratorResult>,
) -> Result<SettlementOutcome, OrchestratorError> {
    if let Some(result) = result {
        if result.needs_user_op_signature {
            let (Some(user_op_hash), Some(draft)) = (result.user_op_hash, result.user_op_draft)
            else {
                return Err(OrchestratorError::MalformedResult(
                    "continuation signal without hash or draft".into(),
                ));
            };
            return Ok(SettlementOutcome::NeedsSignature { user_op_hash, draft });
        }

        if output.exit_code == Some(0) && result.error.is_none() {
            let Some(user_op_hash) = result.user_op_hash else {
                return Err(OrchestratorError::MalformedResult(
                    "successful run without a user operation hash".into(),
                ));
            };
            return Ok(SettlementOutcome::Submitted { user_op_hash, tx_hash: result.tx_hash });
        }
    } else if output.exit_code == Some(0) && output.error.is_none() {
        return Err(OrchestratorError::MalformedResult("missing result file".into()));
    }

    Err(OrchestratorError::Failed {
        exit_code: output.exit_code,
        stdout: output.stdout.clone(),
        stderr: output
            .error
            .clone()
            .unwrap_or_else(|| output.stderr.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;
    use serde_json::json;

    fn ok_exit() -> SupervisedOutput {
        SupervisedOutput { exit_code: Some(0), ..Default::default() }
    }

    #[test]
    fn clean_exit_with_hash_is_submitted() {
        let result = OrchestratorResult {
            user_op_hash: Some(B256::repeat_byte(1)),
            tx_hash: Some(B256::repeat_byte(2)),
            ..Default::default()
        };
        let outcome = interpret_run(&ok_exit(), Some(result)).unwrap();
        assert_eq!(
            outcome,
            SettlementOutcome::Submitted {
                user_op_hash: B256::repeat_byte(1),
                tx_hash: Some(B256::repeat_byte(2)),
            }
        );
    }

    #[test]
    fn continuation_wins_over_nonzero_exit() {
        let output = SupervisedOutput { exit_code: Some(3), ..Default::default() };
        let result = OrchestratorResult {
            needs_user_op_signature: true,
            user_op_hash: Some(B256::repeat_byte(7)),
            user_op_draft: Some(json!({"nonce": "0x1"})),
            ..Default::default()
        };
        let outcome = interpret_run(&output, Some(result)).unwrap();
        assert!(matches!(outcome, SettlementOutcome::NeedsSignature { .. }));
    }

    #[test]
    fn continuation_without_draft_is_malformed() {
        let result = OrchestratorResult {
            needs_user_op_signature: true,
            user_op_hash: Some(B256::repeat_byte(7)),
            ..Default::default()
        };
        assert!(matches!(
            interpret_run(&ok_exit(), Some(result)),
            Err(OrchestratorError::MalformedResult(_))
        ));
    }

    #[test]
    fn nonzero_exit_without_result_is_failure_with_output() {
        let output = SupervisedOutput {
            exit_code: Some(1),
            stdout: "building op".into(),
            stderr: "bundler rejected".into(),
            ..Default::default()
        };
        let err = interpret_run(&output, None).unwrap_err();
        match err {
            OrchestratorError::Failed { exit_code, stdout, stderr } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stdout, "building op");
                assert_eq!(stderr, "bundler rejected");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn clean_exit_without_result_is_malformed() {
        assert!(matches!(
            interpret_run(&ok_exit(), None),
            Err(OrchestratorError::MalformedResult(_))
        ));
    }

    #[test]
    fn spawn_failure_is_carried_in_stderr() {
        let output = SupervisedOutput {
            error: Some("spawn failed: No such file".into()),
            ..Default::default()
        };
        let err = interpret_run(&output, None).unwrap_err();
        match err {
            OrchestratorError::Failed { stderr, .. } => {
                assert!(stderr.contains("spawn failed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
