//! ECS Fargate implementation of the [`Orchestrator`](super::Orchestrator)
//! trait.

use super::{LaunchedTask, Orchestrator};
use crate::config::Config;
use async_trait::async_trait;
use aws_sdk_ecs::types::{AwsVpcConfiguration, AssignPublicIp, LaunchType, NetworkConfiguration};
use aws_sdk_ecs::Client;
use tracing::{info, warn};

/// Soft API cap on tasks per `RunTask` call — the orchestrator's own quota,
/// not a control-plane policy. The autoscaler batches around this.
pub const RUN_TASK_BATCH_LIMIT: u32 = 10;

/// Thin wrapper around the AWS ECS SDK client plus the network parameters
/// every `RunTask` call needs.
pub struct EcsOrchestrator {
    client: Client,
    cluster: String,
    task_definition: String,
    subnets: Vec<String>,
    security_group: String,
}

impl EcsOrchestrator {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            cluster: config.fargate_cluster_name.clone(),
            task_definition: config.task_definition.clone(),
            subnets: vec![config.subnet_1.clone(), config.subnet_2.clone()],
            security_group: config.security_group.clone(),
        }
    }

    /// Build a client from the ambient AWS config (environment/credentials
    /// chain), the way a long-running service process resolves credentials.
    pub async fn connect(config: &Config) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&aws_config), config)
    }
}

#[async_trait]
impl Orchestrator for EcsOrchestrator {
    async fn count_running_tasks(&self) -> crate::Result<u32> {
        let mut count = 0u32;
        let mut next_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_tasks()
                .cluster(&self.cluster)
                .launch_type(LaunchType::Fargate);
            if let Some(token) = &next_token {
                req = req.next_token(token);
            }

            let resp = req.send().await.map_err(|e| {
                crate::Error::OrchestratorTransient(format!("list_tasks failed: {e}"))
            })?;

            count += resp.task_arns().len() as u32;
            next_token = resp.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(count)
    }

    async fn run_tasks(&self, count: u32) -> crate::Result<Vec<LaunchedTask>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if count > RUN_TASK_BATCH_LIMIT {
            warn!(
                count,
                limit = RUN_TASK_BATCH_LIMIT,
                "run_tasks called over the batch limit; the caller should have chunked this"
            );
        }

        let network_config = NetworkConfiguration::builder()
            .awsvpc_configuration(
                AwsVpcConfiguration::builder()
                    .set_subnets(Some(self.subnets.clone()))
                    .assign_public_ip(AssignPublicIp::Enabled)
                    .security_groups(&self.security_group)
                    .build()
                    .map_err(|e| crate::Error::Config(format!("invalid network config: {e}")))?,
            )
            .build();

        let resp = self
            .client
            .run_task()
            .cluster(&self.cluster)
            .launch_type(LaunchType::Fargate)
            .task_definition(&self.task_definition)
            .count(count as i32)
            .platform_version("1.4.0")
            .network_configuration(network_config)
            .send()
            .await
            .map_err(|e| crate::Error::OrchestratorTransient(format!("run_task failed: {e}")))?;

        let tasks = resp
            .tasks()
            .iter()
            .filter_map(|t| {
                let task_arn = t.task_arn()?.to_string();
                let container_count = t.containers().len() as u32;
                Some(LaunchedTask {
                    task_arn,
                    container_count,
                })
            })
            .collect::<Vec<_>>();

        info!(launched = tasks.len(), requested = count, "RunTask batch submitted");
        Ok(tasks)
    }
}
