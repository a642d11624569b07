//! Subprocess transport for the settlement orchestrator.
//!
//! The external transaction-construction process receives its inputs
//! through environment variables and writes its result to a uniquely-named
//! temporary JSON file it is told about via `ORCHESTRATOR_RESULT_FILE`.
//! The process runs detached in its own group under the bounded-call
//! supervisor; a timeout takes the whole group down.

use super::{interpret_run, SettlementBackend};
use crate::{
    config::OrchestratorConfig,
    error::RelayResult,
    supervisor::{run_supervised, SupervisedCommand, TimeoutMeta},
    types::{OrchestratorRequest, OrchestratorResult, SettlementOutcome},
};
use async_trait::async_trait;
use tracing::{debug, error, instrument};

/// [`SettlementBackend`] over a supervised subprocess.
#[derive(Debug, Clone)]
pub struct SubprocessBackend {
    config: OrchestratorConfig,
}

impl SubprocessBackend {
    /// Creates a backend running the configured program.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    fn build_env(
        &self,
        request: &OrchestratorRequest,
        result_file: &std::path::Path,
    ) -> RelayResult<Vec<(String, String)>> {
        let payload = serde_json::to_string(request)
            .map_err(|err| eyre::eyre!("failed to encode orchestrator request: {err}"))?;

        let mut env = vec![
            ("ORCHESTRATOR_RESULT_FILE".into(), result_file.display().to_string()),
            ("ORCHESTRATOR_REQUEST".into(), payload),
            ("ORCHESTRATOR_ACTION".into(), request.action.to_string()),
            ("ORCHESTRATOR_CHAIN_ID".into(), request.chain_id.to_string()),
            ("ORCHESTRATOR_RPC_URL".into(), request.rpc_url.to_string()),
            ("ORCHESTRATOR_BUNDLER_URL".into(), request.bundler_url.to_string()),
        ];
        // The signing key never crosses through the request payload; it is
        // injected from configuration only, for relay-signed flows.
        if let Some(key) = &self.config.signer_key {
            env.push(("ORCHESTRATOR_SIGNER_KEY".into(), key.clone()));
        }
        Ok(env)
    }
}

#[async_trait]
impl SettlementBackend for SubprocessBackend {
    #[instrument(skip(self, request), fields(action = %request.action, sender = %request.sender))]
    async fn execute(&self, request: &OrchestratorRequest) -> RelayResult<SettlementOutcome> {
        let workdir = tempfile::tempdir()
            .map_err(|err| eyre::eyre!("failed to create orchestrator workdir: {err}"))?;
        let result_file = workdir.path().join("result.json");

        let command = SupervisedCommand {
            program: self.config.program.clone(),
            args: self.config.args.clone(),
            env: self.build_env(request, &result_file)?,
        };

        let output = run_supervised(
            command,
            self.config.timeout,
            TimeoutMeta::orchestrator(format!("orchestrator {}", request.action)),
        )
        .await?;

        let result = match tokio::fs::read(&result_file).await {
            Ok(bytes) => match serde_json::from_slice::<OrchestratorResult>(&bytes) {
                Ok(result) => Some(result),
                Err(err) => {
                    error!(%err, "orchestrator result file did not parse");
                    None
                }
            },
            Err(_) => None,
        };
        // The workdir (and with it the result file) is removed on drop.

        debug!(exit_code = ?output.exit_code, has_result = result.is_some(), "orchestrator finished");
        let outcome = interpret_run(&output, result);
        if let Err(err) = &outcome {
            // Captured output is operator-only; callers get a generic
            // message.
            error!(
                action = %request.action,
                exit_code = ?output.exit_code,
                stdout = %output.stdout,
                stderr = %output.stderr,
                %err,
                "orchestrator run failed"
            );
        }
        Ok(outcome?)
    }
}
